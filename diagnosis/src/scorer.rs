//! Multi-factor relevance scoring of knowledge records against an utterance
//! and the session accumulated so far.

use crate::classifier::Classification;
use crate::config::{EngineConfig, ScoringWeights};
use crate::knowledge::ComponentMap;
use crate::similarity::{containment_ratio, sequence_ratio};
use crate::session::SessionContext;
use motodiag_types::KnowledgeRecord;
use tracing::debug;

/// Category → phrases that name it. The longest phrase found in the
/// utterance decides the category.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "rem",
        &[
            "rem blong", "blong", "rem pakem", "pakem", "kampas rem", "minyak rem", "rem", "brake",
            "kampas", "cakram", "master",
        ],
    ),
    (
        "mesin",
        &["piston macet", "bunyi mesin", "suara mesin", "mesin", "engine", "piston", "silinder"],
    ),
    (
        "transmisi",
        &[
            "rantai", "chain", "transmisi", "gear", "cvt", "belt", "roller", "v-belt", "pulley",
            "kopling",
        ],
    ),
    (
        "kelistrikan",
        &["aki", "battery", "listrik", "sekring", "starter", "spul", "stator", "kabel", "lampu"],
    ),
    (
        "pengapian",
        &["busi", "spark", "pengapian", "koil", "cdi", "ecu", "pulser", "api", "percikan"],
    ),
    (
        "pelumasan",
        &["oli mesin bocor", "filter oli", "bocor oli", "pelumasan", "oli", "oil", "pelumas"],
    ),
    (
        "pendinginan",
        &["radiator", "coolant", "overheat", "panas", "kipas", "thermostat", "pendingin"],
    ),
];

const BRAKE_SPECIFIC: &[&str] = &["blong", "pakem", "kampas"];
const BRAKE_CONTEXT: &[&str] = &["blong", "pakem", "makan", "rem"];

#[derive(Debug, Clone, Copy)]
pub struct ScoredMatch<'a> {
    pub record: &'a KnowledgeRecord,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
    threshold: f32,
    max_candidates: usize,
}

impl RelevanceScorer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            threshold: config.score_threshold,
            max_candidates: config.max_candidates,
        }
    }

    /// Score in [0, 1]. `lower` is the lowercased utterance.
    pub fn score(
        &self,
        lower: &str,
        record: &KnowledgeRecord,
        session: &SessionContext,
        classification: &Classification,
        components: &ComponentMap,
    ) -> f32 {
        let mut score = if classification.input_type.is_follow_up() {
            let partial = self.contextual(record, session, components);
            match self.weights.contextual_cap {
                Some(cap) => partial.min(cap),
                None => partial,
            }
        } else {
            self.direct(lower, record)
        };

        let problem = record.problem.to_lowercase();
        for name in &session.problem.checked_components {
            let Some(component) = components.get(name) else {
                continue;
            };
            if component.mentioned_in(&problem) {
                score *= self.weights.checked_penalty;
            }
        }

        let excluded = &session.problem.excluded_causes;
        if !excluded.is_empty() {
            for cause in &record.possible_causes {
                let text = cause.cause.to_lowercase();
                if excluded.iter().any(|e| text.contains(e.to_lowercase().as_str())) {
                    score *= self.weights.exclusion_penalty;
                }
            }
        }

        if let Some(average) = session.average_confidence() {
            if average < self.weights.low_confidence_below {
                score *= self.weights.low_confidence_boost;
            }
        }

        score.clamp(0.0, 1.0)
    }

    /// Top candidates above the threshold, best first. Equal scores keep
    /// knowledge-base order.
    pub fn rank<'k>(
        &self,
        lower: &str,
        records: &'k [KnowledgeRecord],
        session: &SessionContext,
        classification: &Classification,
        components: &ComponentMap,
    ) -> Vec<ScoredMatch<'k>> {
        let mut matches: Vec<ScoredMatch<'k>> = records
            .iter()
            .map(|record| ScoredMatch {
                record,
                score: self.score(lower, record, session, classification, components),
            })
            .filter(|m| m.score > self.threshold)
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(self.max_candidates);

        for m in &matches {
            debug!(id = %m.record.id, score = m.score, "candidate");
        }
        matches
    }

    fn contextual(
        &self,
        record: &KnowledgeRecord,
        session: &SessionContext,
        components: &ComponentMap,
    ) -> f32 {
        let problem = record.problem.to_lowercase();
        let mut score = 0.0;

        if let Some(main) = &session.problem.main_problem {
            if problem.contains(main.to_lowercase().as_str()) {
                score += self.weights.main_problem;
            }
        }

        for name in &session.problem.checked_components {
            let Some(component) = components.get(name) else {
                continue;
            };
            if component
                .related_problems
                .iter()
                .any(|related| problem.contains(related.to_lowercase().as_str()))
            {
                score += self.weights.checked_component;
            }
        }

        for symptom in &session.problem.symptoms {
            let symptom = symptom.to_lowercase();
            for record_symptom in &record.symptoms {
                if record_symptom.to_lowercase().contains(symptom.as_str()) {
                    score += self.weights.context_symptom;
                }
            }
        }

        score
    }

    fn direct(&self, lower: &str, record: &KnowledgeRecord) -> f32 {
        let mut score = 0.0;
        let category = record.category.to_lowercase();

        if let Some(mentioned) = mentioned_category(lower) {
            if category_corresponds(mentioned, &category) {
                if mentioned == "rem" {
                    score += self.weights.brake_category;
                    let described = record
                        .keywords
                        .iter()
                        .chain(&record.symptoms)
                        .map(|s| s.to_lowercase())
                        .collect::<Vec<_>>()
                        .join(" ");
                    if BRAKE_SPECIFIC.iter().any(|w| described.contains(w)) {
                        score += self.weights.brake_specific;
                    }
                } else {
                    score += self.weights.category;
                }
            }
        }

        score += containment_ratio(&record.symptoms, lower) * self.weights.symptom_ratio;

        if !record.keywords.is_empty() {
            let mut hits = 0usize;
            for keyword in &record.keywords {
                let keyword = keyword.to_lowercase();
                if !lower.contains(keyword.as_str()) {
                    continue;
                }
                hits += 1;
                if BRAKE_SPECIFIC.contains(&keyword.as_str())
                    && BRAKE_CONTEXT.iter().any(|w| lower.contains(w))
                {
                    hits += 1;
                }
            }
            score += (hits as f32 / record.keywords.len() as f32) * self.weights.keyword_ratio;
        }

        score += sequence_ratio(lower, &record.problem.to_lowercase()) * self.weights.problem_similarity;
        score
    }
}

/// Category whose longest phrase occurs in `lower`; earlier table rows win
/// equal lengths.
fn mentioned_category(lower: &str) -> Option<&'static str> {
    let mut best: Option<(&'static str, usize)> = None;
    for &(category, phrases) in CATEGORY_KEYWORDS {
        for &phrase in phrases {
            if lower.contains(phrase) && best.map_or(true, |(_, len)| phrase.len() > len) {
                best = Some((category, phrase.len()));
            }
        }
    }
    best.map(|(category, _)| category)
}

fn category_corresponds(mentioned: &str, record_category: &str) -> bool {
    match mentioned {
        "rem" => record_category.contains("rem") || record_category.contains("pengereman"),
        "transmisi" => record_category.contains("transmisi") || record_category.contains("cvt"),
        "pengapian" => {
            record_category.contains("pengapian") || record_category.contains("starter")
        }
        other => record_category.contains(other),
    }
}
