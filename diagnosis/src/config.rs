use std::env;
use std::path::{Path, PathBuf};

// ── Defaults ────────────────────────────────────────────────────────────

/// Knowledge base file relative to home.
const DEFAULT_KNOWLEDGE_REL: &str = ".motodiag/knowledge.json";

/// Session id used when a front end does not supply one.
pub const DEFAULT_SESSION_ID: &str = "default";

const DEFAULT_SCORE_THRESHOLD: f32 = 0.05;
const DEFAULT_MAX_CANDIDATES: usize = 3;
const DEFAULT_SHORT_INPUT_CHARS: usize = 15;
const DEFAULT_SAME_CONTEXT_MIN_SHARED: usize = 2;
const DEFAULT_SAME_CONTEXT_MIN_JACCARD: f32 = 0.30;
const DEFAULT_SESSION_MAX_AGE_HOURS: u64 = 24;

// ── Scoring weights ─────────────────────────────────────────────────────

/// Every constant the relevance scorer uses. Heuristic values; kept here so
/// they can be calibrated against real transcripts.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoringWeights {
    /// Contextual mode: session main problem found in the record problem.
    pub main_problem: f32,
    /// Contextual mode: a checked component's related problem overlaps.
    pub checked_component: f32,
    /// Contextual mode: per session symptom found in a record symptom.
    pub context_symptom: f32,
    /// Optional cap on the contextual partial sum (before post-adjustments).
    pub contextual_cap: Option<f32>,
    /// Direct mode: brake category boost.
    pub brake_category: f32,
    /// Direct mode: extra when the brake record itself names blong/pakem/kampas.
    pub brake_specific: f32,
    /// Direct mode: every other category boost.
    pub category: f32,
    pub symptom_ratio: f32,
    pub keyword_ratio: f32,
    pub problem_similarity: f32,
    /// Multiplier per checked component named in the record problem.
    pub checked_penalty: f32,
    /// Multiplier per cause matching an excluded substring.
    pub exclusion_penalty: f32,
    /// Multiplier applied while the running average confidence is low.
    pub low_confidence_boost: f32,
    /// Running average below which `low_confidence_boost` applies.
    pub low_confidence_below: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            main_problem: 0.5,
            checked_component: 0.3,
            context_symptom: 0.2,
            contextual_cap: None,
            brake_category: 0.8,
            brake_specific: 0.2,
            category: 0.6,
            symptom_ratio: 0.25,
            keyword_ratio: 0.20,
            problem_similarity: 0.15,
            checked_penalty: 0.8,
            exclusion_penalty: 0.6,
            low_confidence_boost: 1.2,
            low_confidence_below: 0.5,
        }
    }
}

// ── Config struct ───────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub knowledge_path: PathBuf,
    /// Records must score strictly above this to become candidates.
    pub score_threshold: f32,
    pub max_candidates: usize,
    /// Inputs shorter than this (in chars) are short follow-ups once a
    /// session has history.
    pub short_input_chars: usize,
    pub same_context_min_shared: usize,
    pub same_context_min_jaccard: f32,
    pub session_max_age_hours: u64,
    pub reply_seed: Option<u64>,
    pub weights: ScoringWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_default();
        Self {
            knowledge_path: home.join(DEFAULT_KNOWLEDGE_REL),
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            short_input_chars: DEFAULT_SHORT_INPUT_CHARS,
            same_context_min_shared: DEFAULT_SAME_CONTEXT_MIN_SHARED,
            same_context_min_jaccard: DEFAULT_SAME_CONTEXT_MIN_JACCARD,
            session_max_age_hours: DEFAULT_SESSION_MAX_AGE_HOURS,
            reply_seed: None,
            weights: ScoringWeights::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let home = dirs::home_dir().unwrap_or_default();

        let mut weights = defaults.weights.clone();
        weights.contextual_cap = env_opt_f32("MOTODIAG_CONTEXTUAL_CAP");

        Self {
            knowledge_path: env_path(
                "MOTODIAG_KNOWLEDGE_PATH",
                defaults.knowledge_path,
                home.as_path(),
            ),
            score_threshold: env_f32("MOTODIAG_SCORE_THRESHOLD", defaults.score_threshold),
            max_candidates: env_usize("MOTODIAG_MAX_CANDIDATES", defaults.max_candidates),
            short_input_chars: env_usize("MOTODIAG_SHORT_INPUT_CHARS", defaults.short_input_chars),
            same_context_min_shared: env_usize(
                "MOTODIAG_SAME_CONTEXT_MIN_SHARED",
                defaults.same_context_min_shared,
            ),
            same_context_min_jaccard: env_f32(
                "MOTODIAG_SAME_CONTEXT_MIN_JACCARD",
                defaults.same_context_min_jaccard,
            ),
            session_max_age_hours: env_u64(
                "MOTODIAG_SESSION_MAX_AGE_HOURS",
                defaults.session_max_age_hours,
            ),
            reply_seed: env_opt_u64("MOTODIAG_REPLY_SEED"),
            weights,
        }
    }
}

fn env_path(key: &str, default: PathBuf, home: &Path) -> PathBuf {
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => expand_tilde(&val, home),
        _ => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt_u64(key).unwrap_or(default)
}

fn env_opt_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|val| val.trim().parse::<u64>().ok())
}

fn env_usize(key: &str, default: usize) -> usize {
    match env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    env_opt_f32(key).unwrap_or(default)
}

fn env_opt_f32(key: &str) -> Option<f32> {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
}

fn expand_tilde(input: &str, home: &Path) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(input)
}
