//! Writes a turn's effects back into its session.
//!
//! `absorb` runs before matching so the turn's own confirmations already
//! steer scoring; `commit` runs after the response is composed.

use crate::classifier::{Classification, InputType};
use crate::knowledge::ComponentMap;
use crate::rules::{RuleSet, KNOWN_TOOLS, TECHNICAL_TERMS};
use crate::scorer::ScoredMatch;
use crate::session::{SessionContext, TechnicalLevel, Turn};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Record confirmed components and what the utterance reveals about the
/// rider. Only ever adds to the session.
///
/// Every mentioned component counts as checked. Its related problems are
/// excluded only when it was reported good or freshly replaced.
pub fn absorb(
    session: &mut SessionContext,
    rules: &RuleSet,
    components: &ComponentMap,
    lower: &str,
    classification: &Classification,
) {
    for (name, status) in &classification.extracted {
        session.problem.checked_components.insert(name.clone());
        if status.is_healthy() {
            if let Some(component) = components.get(name) {
                session
                    .problem
                    .excluded_causes
                    .extend(component.related_problems.iter().cloned());
            }
        }
        session
            .user
            .previous_actions
            .push(format!("{name}: {}", status.label()));
        debug!(component = %name, status = ?status, "component confirmed");
    }

    for tool in KNOWN_TOOLS {
        if lower.contains(tool) {
            session.user.tools_available.insert(tool.to_string());
        }
    }

    let level = match TECHNICAL_TERMS.iter().filter(|t| lower.contains(*t)).count() {
        0 => TechnicalLevel::Beginner,
        1 => TechnicalLevel::Intermediate,
        _ => TechnicalLevel::Advanced,
    };
    session.user.technical_level = session.user.technical_level.max(level);

    if let Some(brand) = rules.vehicle_brand.find(lower) {
        session.vehicle.brand = Some(brand.as_str().to_string());
    }
    if let Some(year) = rules
        .vehicle_year
        .find(lower)
        .and_then(|m| m.as_str().parse::<u16>().ok())
    {
        session.vehicle.year = Some(year);
    }
}

/// Everything `commit` needs to know about the finished turn.
#[derive(Debug)]
pub struct TurnOutcome<'a, 'k> {
    pub utterance: &'a str,
    pub response: String,
    pub classification: &'a Classification,
    pub top: Option<ScoredMatch<'k>>,
    /// Whether `top` continues the session's current topic.
    pub continuing: bool,
    pub is_clarification: bool,
    /// The previous turn is being corrected by this one.
    pub corrects_previous: bool,
}

pub fn commit(session: &mut SessionContext, rules: &RuleSet, outcome: TurnOutcome<'_, '_>, now: DateTime<Utc>) {
    let lower = outcome.utterance.trim().to_lowercase();

    if outcome.corrects_previous {
        if let Some(previous) = session.turns.last_mut() {
            previous.corrected = true;
        }
    }

    if let Some(top) = &outcome.top {
        session.confidence_history.push(top.score);

        let sets_topic = match outcome.classification.input_type {
            InputType::ProblemDescription => true,
            InputType::Unknown => session.problem.main_problem.is_none() || !outcome.continuing,
            _ => false,
        };
        // A mapped correction has already written the topic it stands for.
        if sets_topic && !outcome.corrects_previous {
            session.problem.main_problem = Some(top.record.problem.clone());
            session.problem.main_category = Some(top.record.category.clone());
            session.problem.main_keywords = top.record.keywords.iter().cloned().collect();
        }
        if !outcome.is_clarification {
            session.current_diagnosis = Some(top.record.clone());
        }
    }

    for symptom in rules.problem_indicators.matched_spans(&lower) {
        session.problem.symptoms.insert(symptom.to_string());
    }

    session.turns.push(Turn {
        timestamp: now,
        utterance: outcome.utterance.to_string(),
        response: outcome.response,
        input_type: outcome.classification.input_type,
        intent: outcome.classification.intent,
        intent_confidence: outcome.classification.intent_confidence,
        confidence: outcome.top.map_or(0.0, |m| m.score),
        is_clarification: outcome.is_clarification,
        corrected: false,
    });
}
