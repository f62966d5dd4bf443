//! Session-aware post-processing of ranked matches: cause filtering, the
//! same-topic check and user corrections.

use crate::config::EngineConfig;
use crate::knowledge::ComponentMap;
use crate::rules::{contains_any, CORRECTION_MARKERS};
use crate::session::ProblemContext;
use crate::similarity::{jaccard, shared_count};
use motodiag_types::{KnowledgeRecord, PossibleCause, Probability};
use std::collections::BTreeSet;

/// A cause prepared for display in one session.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredCause {
    pub cause: PossibleCause,
    /// Checked component whose keyword appears in the cause text.
    pub already_checked: Option<String>,
}

/// Annotate causes touching checked components, then drop the excluded
/// ones. An excluded cause that is also already checked stays, demoted to
/// low probability.
pub fn filter_causes(
    record: &KnowledgeRecord,
    problem: &ProblemContext,
    components: &ComponentMap,
) -> Vec<FilteredCause> {
    let excluded: Vec<String> = problem
        .excluded_causes
        .iter()
        .map(|e| e.to_lowercase())
        .collect();

    let mut kept = Vec::with_capacity(record.possible_causes.len());
    for cause in &record.possible_causes {
        let text = cause.cause.to_lowercase();
        let already_checked = problem
            .checked_components
            .iter()
            .find(|name| {
                components
                    .get(name)
                    .is_some_and(|component| component.mentioned_in(&text))
            })
            .cloned();
        let is_excluded = excluded.iter().any(|e| text.contains(e.as_str()));

        match (is_excluded, already_checked) {
            (false, already_checked) => kept.push(FilteredCause {
                cause: cause.clone(),
                already_checked,
            }),
            (true, Some(component)) => {
                let mut demoted = cause.clone();
                demoted.probability = Probability::Low;
                kept.push(FilteredCause {
                    cause: demoted,
                    already_checked: Some(component),
                });
            }
            (true, None) => {}
        }
    }
    kept
}

/// Whether `record` continues the topic the session is already on:
/// same category, or enough keyword overlap.
pub fn is_same_context(record: &KnowledgeRecord, problem: &ProblemContext, config: &EngineConfig) -> bool {
    if problem.main_problem.is_none() {
        return false;
    }
    if let Some(category) = &problem.main_category {
        if category.to_lowercase() == record.category.to_lowercase() {
            return true;
        }
    }

    let record_keywords: BTreeSet<String> = record.keywords.iter().map(|k| k.to_lowercase()).collect();
    let main_keywords: BTreeSet<String> = problem
        .main_keywords
        .iter()
        .map(|k| k.to_lowercase())
        .collect();
    shared_count(&record_keywords, &main_keywords) >= config.same_context_min_shared
        && jaccard(&record_keywords, &main_keywords) >= config.same_context_min_jaccard
}

// ── Corrections ─────────────────────────────────────────────────────────

/// What the user meant when they say "bukan, maksud saya <word> ...".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    pub trigger: &'static str,
    pub category: &'static str,
    pub keywords: &'static [&'static str],
    /// Problem text re-run through classification and matching.
    pub problem_text: &'static str,
}

const CORRECTIONS: &[Correction] = &[
    Correction {
        trigger: "lampu",
        category: "Kelistrikan",
        keywords: &["lampu", "bohlam", "sein", "reflektor", "mika"],
        problem_text: "lampu motor kadang idup kadang mati",
    },
    Correction {
        trigger: "rem",
        category: "Pengereman",
        keywords: &["rem", "kampas", "blong", "pakem", "cakram"],
        problem_text: "rem motor ga makan",
    },
    Correction {
        trigger: "mesin",
        category: "Mesin",
        keywords: &["mesin", "piston", "silinder", "kompresi", "oli"],
        problem_text: "mesin motor bermasalah",
    },
    Correction {
        trigger: "aki",
        category: "Kelistrikan",
        keywords: &["aki", "battery", "setrum", "listrik", "starter"],
        problem_text: "aki motor bermasalah",
    },
    Correction {
        trigger: "rantai",
        category: "Transmisi",
        keywords: &["rantai", "gir", "sprocket", "chain"],
        problem_text: "rantai motor bermasalah",
    },
    Correction {
        trigger: "ban",
        category: "Ban",
        keywords: &["ban", "velg", "pentil", "angin"],
        problem_text: "ban motor bermasalah",
    },
    Correction {
        trigger: "karbu",
        category: "Bahan Bakar",
        keywords: &["karburator", "karbu", "spuyer", "bensin"],
        problem_text: "karburator motor bermasalah",
    },
];

pub fn has_correction_marker(lower: &str) -> bool {
    contains_any(lower, CORRECTION_MARKERS)
}

/// First correction (in table order) whose trigger word appears.
pub fn detect_correction(lower: &str) -> Option<&'static Correction> {
    CORRECTIONS.iter().find(|c| lower.contains(c.trigger))
}

impl Correction {
    /// Overwrite the session's topic with the corrected one.
    pub fn apply(&self, problem: &mut ProblemContext) {
        problem.main_problem = Some(self.problem_text.to_string());
        problem.main_category = Some(self.category.to_string());
        problem.main_keywords = self.keywords.iter().map(|k| k.to_string()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBase;

    fn record(id: &str) -> KnowledgeRecord {
        KnowledgeBase::builtin()
            .records()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .unwrap()
    }

    #[test]
    fn excluded_cause_is_dropped() {
        let mut problem = ProblemContext::default();
        problem.excluded_causes.insert("Kampas rem".into());
        let kept = filter_causes(&record("rem_001"), &problem, &ComponentMap::builtin().unwrap());
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|c| !c.cause.cause.to_lowercase().contains("kampas rem")));
    }

    #[test]
    fn excluded_but_checked_cause_is_demoted() {
        let mut problem = ProblemContext::default();
        problem.checked_components.insert("aki".into());
        problem.excluded_causes.insert("aki soak".into());
        let kept = filter_causes(&record("listrik_001"), &problem, &ComponentMap::builtin().unwrap());

        let aki = kept.iter().find(|c| c.cause.cause == "Aki soak").unwrap();
        assert_eq!(aki.already_checked.as_deref(), Some("aki"));
        assert_eq!(aki.cause.probability, Probability::Low);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn checked_annotation_without_exclusion_keeps_probability() {
        let mut problem = ProblemContext::default();
        problem.checked_components.insert("busi".into());
        let kept = filter_causes(&record("mesin_001"), &problem, &ComponentMap::builtin().unwrap());
        let busi = &kept[0];
        assert_eq!(busi.already_checked.as_deref(), Some("busi"));
        assert_eq!(busi.cause.probability, Probability::High);
    }

    #[test]
    fn same_context_by_category_or_keyword_overlap() {
        let config = EngineConfig::default();
        let brake = record("rem_001");

        let mut problem = ProblemContext::default();
        assert!(!is_same_context(&brake, &problem, &config));

        problem.main_problem = Some("Rem blong".into());
        problem.main_category = Some("rem".into());
        assert!(is_same_context(&brake, &problem, &config));

        problem.main_category = Some("Pengereman".into());
        problem.main_keywords = ["rem", "kampas", "blong", "pakem", "cakram"]
            .iter()
            .map(|k| k.to_string())
            .collect();
        // 5 shared of 6 total.
        assert!(is_same_context(&brake, &problem, &config));

        problem.main_keywords = ["rem", "lampu", "sein", "mika"]
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert!(!is_same_context(&brake, &problem, &config));
    }

    #[test]
    fn correction_lookup_and_apply() {
        assert!(has_correction_marker("bukan, maksud saya lampunya"));
        assert!(!has_correction_marker("lampunya redup"));

        let correction = detect_correction("bukan rem, maksud saya lampunya").unwrap();
        assert_eq!(correction.category, "Kelistrikan");

        let mut problem = ProblemContext::default();
        correction.apply(&mut problem);
        assert_eq!(problem.main_problem.as_deref(), Some("lampu motor kadang idup kadang mati"));
        assert!(problem.main_keywords.contains("bohlam"));
        assert!(detect_correction("bukan itu").is_none());
    }
}
