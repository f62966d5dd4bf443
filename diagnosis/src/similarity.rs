//! String and set similarity measures used by the scorer and the
//! same-topic check.

use std::collections::BTreeSet;

/// Ratcliff/Obershelp ratio over chars: `2 * M / T`, where `M` counts chars
/// in the recursively found longest common blocks and `T` is the combined
/// length. Two empty strings are identical (1.0).
pub fn sequence_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f32 / total as f32
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// `(start_in_a, start_in_b, len)` of the longest common contiguous block;
/// the earliest block in `a` wins ties.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let run = cur[j + 1];
            if run > best.2 {
                best = (i + 1 - run, j + 1 - run, run);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

pub fn shared_count(a: &BTreeSet<String>, b: &BTreeSet<String>) -> usize {
    a.intersection(b).count()
}

/// |A ∩ B| / |A ∪ B|; 0.0 when both sets are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    shared_count(a, b) as f32 / union as f32
}

/// Fraction of `phrases` found verbatim inside `text` (both lowercase).
pub fn containment_ratio(phrases: &[String], text: &str) -> f32 {
    if phrases.is_empty() {
        return 0.0;
    }
    let hits = phrases
        .iter()
        .filter(|p| text.contains(p.to_lowercase().as_str()))
        .count();
    hits as f32 / phrases.len() as f32
}
