//! Utterance classification and the cheap pre-filters that run before it.
//!
//! Everything here is a pure function of the text and a read-only view of
//! the session; nothing is written back.

use crate::knowledge::ComponentMap;
use crate::rules::{
    contains_any, RuleSet, COST_TIME_WORDS, DANGER_WORDS, KEYBOARD_MASHING, POSITIVE_STATE_WORDS,
    REPLACEMENT_WORDS, RIDE_WORDS,
};
use crate::session::SessionContext;
use serde::Serialize;

const MIN_LETTER_RATIO: f32 = 0.6;
const MAX_CHAR_RUN: usize = 3;
const MEANINGFUL_WORD_MAX_CHARS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    ShortFollowUp,
    FollowUpQuestion,
    ComponentConfirmation,
    ProblemDescription,
    Unknown,
}

impl InputType {
    fn base_confidence(self) -> f32 {
        match self {
            InputType::FollowUpQuestion => 0.8,
            InputType::ComponentConfirmation => 0.85,
            InputType::ProblemDescription => 0.75,
            InputType::ShortFollowUp => 0.5,
            InputType::Unknown => 0.0,
        }
    }

    pub fn is_follow_up(self) -> bool {
        matches!(self, InputType::ShortFollowUp | InputType::FollowUpQuestion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Good,
    Replaced,
    Checked,
}

impl ComponentStatus {
    pub fn label(self) -> &'static str {
        match self {
            ComponentStatus::Good => "kondisi bagus",
            ComponentStatus::Replaced => "udah ganti baru",
            ComponentStatus::Checked => "udah dicek",
        }
    }

    /// Good or replaced; a merely checked part may still be the culprit.
    pub fn is_healthy(self) -> bool {
        matches!(self, ComponentStatus::Good | ComponentStatus::Replaced)
    }
}

/// How a short follow-up should be read given what the session knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStrategy {
    Diagnosis,
    ContextualNextSteps,
    ProgressiveDiagnosis,
    FocusedTroubleshooting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIntent {
    Diagnosis,
    Solution,
    Cost,
    Prevention,
    #[default]
    Unknown,
}

impl UserIntent {
    pub fn label(self) -> &'static str {
        match self {
            UserIntent::Diagnosis => "cari penyebab",
            UserIntent::Solution => "cari solusi",
            UserIntent::Cost => "tanya biaya",
            UserIntent::Prevention => "pencegahan",
            UserIntent::Unknown => "belum jelas",
        }
    }
}

/// Sub-intent of a conversational follow-up ("bahaya ga?", "masih bisa
/// dipake?", "berapa lama?").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpIntent {
    Danger,
    CanRide,
    CostOrTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub input_type: InputType,
    pub confidence: f32,
    /// Confirmed components in component-map order.
    pub extracted: Vec<(String, ComponentStatus)>,
    pub context_clues: Vec<String>,
    pub strategy: ResponseStrategy,
    pub intent: UserIntent,
    pub intent_confidence: f32,
}

/// Label an utterance. The first rule that fires picks `input_type`; the
/// confirmation rule still fills `extracted` when an earlier rule won.
pub fn classify(
    rules: &RuleSet,
    components: &ComponentMap,
    utterance: &str,
    session: &SessionContext,
    short_input_chars: usize,
) -> Classification {
    let trimmed = utterance.trim();
    let lower = trimmed.to_lowercase();
    let mut input_type = None;
    let mut clues = Vec::new();
    let mut extracted = Vec::new();

    if trimmed.chars().count() < short_input_chars && session.has_history() {
        input_type = Some(InputType::ShortFollowUp);
        clues.push("input pendek setelah percakapan".to_string());
    }

    if let Some(pattern) = rules.follow_up.first_match(&lower) {
        if input_type.is_none() {
            input_type = Some(InputType::FollowUpQuestion);
            clues.push(format!("pola follow-up: {pattern}"));
        }
    }

    if let Some(pattern) = rules.confirmation.first_match(&lower) {
        extracted = extract_components(components, &lower);
        if input_type.is_none() {
            input_type = Some(InputType::ComponentConfirmation);
            clues.push(format!("konfirmasi komponen: {pattern}"));
        }
    }

    if let Some(pattern) = rules.problem_indicators.first_match(&lower) {
        if input_type.is_none() {
            input_type = Some(InputType::ProblemDescription);
            clues.push(format!("deskripsi masalah: {pattern}"));
        }
    }

    let input_type = input_type.unwrap_or(InputType::Unknown);
    let mut confidence = input_type.base_confidence();
    let mut strategy = ResponseStrategy::Diagnosis;

    if input_type == InputType::ShortFollowUp {
        if session.current_diagnosis.is_some() {
            strategy = ResponseStrategy::ContextualNextSteps;
            confidence = 0.8;
            clues.push("ada diagnosis sebelumnya".to_string());
        }
        if !session.problem.checked_components.is_empty() {
            strategy = ResponseStrategy::ProgressiveDiagnosis;
            confidence = 0.7;
            let checked: Vec<&str> = session
                .problem
                .checked_components
                .iter()
                .map(String::as_str)
                .collect();
            clues.push(format!("komponen dicek: {}", checked.join(", ")));
        }
        if let Some(main) = &session.problem.main_problem {
            strategy = ResponseStrategy::FocusedTroubleshooting;
            confidence = 0.9;
            clues.push(format!("masalah utama: {main}"));
        }
    }

    let (intent, intent_confidence) = detect_intent(rules, &lower);

    Classification {
        input_type,
        confidence,
        extracted,
        context_clues: clues,
        strategy,
        intent,
        intent_confidence,
    }
}

fn extract_components(components: &ComponentMap, lower: &str) -> Vec<(String, ComponentStatus)> {
    let status = if contains_any(lower, POSITIVE_STATE_WORDS) {
        ComponentStatus::Good
    } else if contains_any(lower, REPLACEMENT_WORDS) {
        ComponentStatus::Replaced
    } else {
        ComponentStatus::Checked
    };
    components
        .iter()
        .filter(|component| component.mentioned_in(lower))
        .map(|component| (component.name.clone(), status))
        .collect()
}

/// Winning intent and its share of all intent pattern hits.
fn detect_intent(rules: &RuleSet, lower: &str) -> (UserIntent, f32) {
    let mut total = 0usize;
    let mut best = (UserIntent::Unknown, 0usize);
    for (intent, patterns) in &rules.intents {
        let hits = patterns.hit_count(lower);
        total += hits;
        if hits > best.1 {
            best = (*intent, hits);
        }
    }
    if total == 0 {
        return (UserIntent::Unknown, 0.0);
    }
    (best.0, best.1 as f32 / total as f32)
}

// ── Pre-filters ─────────────────────────────────────────────────────────

pub fn is_gibberish(utterance: &str) -> bool {
    let lower = utterance.trim().to_lowercase();
    if lower.is_empty() || !lower.chars().any(char::is_alphabetic) {
        return true;
    }

    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
    let letters = compact.chars().filter(|c| c.is_alphabetic()).count();
    if (letters as f32) / (compact.chars().count() as f32) < MIN_LETTER_RATIO {
        return true;
    }

    if contains_any(&compact, KEYBOARD_MASHING) {
        return true;
    }

    if longest_char_run(&lower) > MAX_CHAR_RUN {
        return true;
    }

    let words: Vec<&str> = lower.split_whitespace().collect();
    words.len() > 2
        && !words.iter().any(|word| {
            word.chars().count() <= MEANINGFUL_WORD_MAX_CHARS && word.chars().any(is_vowel)
        })
}

/// Longest run of one repeated non-whitespace character. Whitespace breaks
/// a run.
fn longest_char_run(text: &str) -> usize {
    let mut longest = 0;
    let mut run = 0;
    let mut prev = None;
    for c in text.chars() {
        if c.is_whitespace() {
            run = 0;
            prev = None;
            continue;
        }
        run = if Some(c) == prev { run + 1 } else { 1 };
        prev = Some(c);
        longest = longest.max(run);
    }
    longest
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'i' | 'u' | 'e' | 'o')
}

/// Thanks that is not also a question or a complaint.
pub fn is_thank_you(rules: &RuleSet, lower: &str) -> bool {
    if rules.question_markers.is_match(lower) || rules.problem_indicators.is_match(lower) {
        return false;
    }
    rules.thanks.is_match(lower)
}

pub fn is_follow_up_question(rules: &RuleSet, lower: &str) -> bool {
    rules.natural_follow_up.is_match(lower)
}

pub fn follow_up_intent(lower: &str) -> Option<FollowUpIntent> {
    if contains_any(lower, DANGER_WORDS) {
        Some(FollowUpIntent::Danger)
    } else if contains_any(lower, RIDE_WORDS) {
        Some(FollowUpIntent::CanRide)
    } else if contains_any(lower, COST_TIME_WORDS) {
        Some(FollowUpIntent::CostOrTime)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;
    use chrono::Utc;

    fn fixtures() -> (RuleSet, ComponentMap) {
        (RuleSet::new().unwrap(), ComponentMap::builtin().unwrap())
    }

    fn with_history() -> SessionContext {
        let mut session = SessionContext::new("t", Utc::now());
        session.turns.push(Turn {
            timestamp: Utc::now(),
            utterance: "motor saya remnya blong".into(),
            response: String::new(),
            input_type: InputType::Unknown,
            intent: UserIntent::Unknown,
            intent_confidence: 0.0,
            confidence: 1.0,
            is_clarification: false,
            corrected: false,
        });
        session
    }

    #[test]
    fn confirmation_extracts_component_and_status() {
        let (rules, components) = fixtures();
        let result = classify(&rules, &components, "aki udah dicek, masih bagus", &with_history(), 15);
        assert_eq!(result.input_type, InputType::ComponentConfirmation);
        assert_eq!(result.extracted, vec![("aki".to_string(), ComponentStatus::Good)]);
        assert!((result.confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn replacement_word_marks_replaced() {
        let (rules, components) = fixtures();
        let result = classify(&rules, &components, "busi juga udah ganti baru", &with_history(), 15);
        assert_eq!(result.input_type, InputType::ComponentConfirmation);
        assert!(result
            .extracted
            .iter()
            .any(|(name, status)| name == "busi" && *status == ComponentStatus::Replaced));
    }

    #[test]
    fn follow_up_pattern_wins_over_later_rules() {
        let (rules, components) = fixtures();
        let result = classify(&rules, &components, "terus gimana dong?", &with_history(), 15);
        assert_eq!(result.input_type, InputType::FollowUpQuestion);
    }

    #[test]
    fn short_input_needs_history() {
        let (rules, components) = fixtures();
        let fresh = SessionContext::new("fresh", Utc::now());
        let first = classify(&rules, &components, "rem blong", &fresh, 15);
        assert_eq!(first.input_type, InputType::Unknown);

        let mut session = with_history();
        session.problem.main_problem = Some("Rem blong atau tidak pakem".into());
        let later = classify(&rules, &components, "rem blong", &session, 15);
        assert_eq!(later.input_type, InputType::ShortFollowUp);
        assert_eq!(later.strategy, ResponseStrategy::FocusedTroubleshooting);
        assert!((later.confidence - 0.9).abs() < 1e-6);
        assert!(later.context_clues.iter().any(|c| c.starts_with("masalah utama")));
    }

    #[test]
    fn short_confirmation_still_extracts_components() {
        let (rules, components) = fixtures();
        let result = classify(&rules, &components, "aki udah cek", &with_history(), 15);
        assert_eq!(result.input_type, InputType::ShortFollowUp);
        assert_eq!(result.extracted, vec![("aki".to_string(), ComponentStatus::Checked)]);
    }

    #[test]
    fn keyword_inside_another_word_is_not_a_component() {
        let (rules, components) = fixtures();
        let result = classify(
            &rules,
            &components,
            "aki udah dicek tapi tetep susah hidup",
            &with_history(),
            15,
        );
        assert_eq!(result.extracted, vec![("aki".to_string(), ComponentStatus::Checked)]);
    }

    #[test]
    fn problem_indicator_labels_description() {
        let (rules, components) = fixtures();
        let result = classify(&rules, &components, "motor gua susah hidup pagi hari", &with_history(), 15);
        assert_eq!(result.input_type, InputType::ProblemDescription);
    }

    #[test]
    fn intent_share_of_hits() {
        let (rules, components) = fixtures();
        let fresh = SessionContext::new("fresh", Utc::now());
        let result = classify(&rules, &components, "berapa biaya dan harga ganti kampas, gimana", &fresh, 15);
        assert_eq!(result.intent, UserIntent::Cost);
        assert!(result.intent_confidence > 0.5 && result.intent_confidence < 1.0);
    }

    #[test]
    fn gibberish_rules() {
        assert!(is_gibberish(""));
        assert!(is_gibberish("   "));
        assert!(is_gibberish("asdfgh"));
        assert!(is_gibberish("12345 !!!"));
        assert!(is_gibberish("rem blonggggg"));
        assert!(is_gibberish("#$% ab *&^ 9"));
        assert!(is_gibberish("brrrt pffft zzz"));
        assert!(is_gibberish("rem bermasalah !!!!"));
        assert!(is_gibberish("motor mogok 00000"));
        assert!(is_gibberish("habis 100000 buat servis rem...."));

        assert!(!is_gibberish("motor saya remnya blong"));
        assert!(!is_gibberish("habis 150 ribu buat servis rem"));
        assert!(!is_gibberish("tolong dong!!!"));
        assert!(!is_gibberish("terus gimana dong?"));
    }

    #[test]
    fn thanks_is_blocked_by_questions_and_complaints() {
        let (rules, _) = fixtures();
        assert!(is_thank_you(&rules, "makasih banyak bro"));
        assert!(is_thank_you(&rules, "oke makasih"));
        assert!(!is_thank_you(&rules, "makasih, tapi masih ga bisa jalan"));
        assert!(!is_thank_you(&rules, "thanks, kenapa ya"));
        assert!(!is_thank_you(&rules, "makasih tapi motor masih susah hidup"));
    }

    #[test]
    fn follow_up_sub_intents() {
        let (rules, _) = fixtures();
        assert!(is_follow_up_question(&rules, "ini bahaya banget ga?"));
        assert_eq!(follow_up_intent("ini bahaya banget ga?"), Some(FollowUpIntent::Danger));
        assert_eq!(
            follow_up_intent("masih bisa dipake ga?"),
            Some(FollowUpIntent::CanRide)
        );
        assert_eq!(
            follow_up_intent("berapa lama benerinnya"),
            Some(FollowUpIntent::CostOrTime)
        );
        assert!(is_follow_up_question(&rules, "terus gimana dong?"));
        assert_eq!(follow_up_intent("terus gimana dong?"), None);
    }
}
