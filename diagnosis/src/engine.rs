use crate::classifier::{self, Classification, InputType};
use crate::compose;
use crate::config::EngineConfig;
use crate::knowledge::{ComponentMap, KnowledgeBase};
use crate::matcher::{self, Correction};
use crate::replies::{ReplyPicker, NO_DIAGNOSIS_YET};
use crate::rules::RuleSet;
use crate::scorer::{RelevanceScorer, ScoredMatch};
use crate::session::{SessionContext, SessionStore};
use crate::tracker::{self, TurnOutcome};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::PoisonError;
use tracing::debug;

/// Context-aware diagnosis over a shared knowledge base. `Send + Sync`;
/// distinct sessions can be served from many threads at once.
#[derive(Debug)]
pub struct DiagnosisEngine {
    knowledge: KnowledgeBase,
    components: ComponentMap,
    rules: RuleSet,
    scorer: RelevanceScorer,
    config: EngineConfig,
    sessions: SessionStore,
    replies: ReplyPicker,
}

impl DiagnosisEngine {
    pub fn new(knowledge: KnowledgeBase, config: EngineConfig) -> Result<Self> {
        let rules = RuleSet::new().context("compile utterance rules")?;
        let components = ComponentMap::builtin().context("compile component keywords")?;
        let replies = match config.reply_seed {
            Some(seed) => ReplyPicker::seeded(seed),
            None => ReplyPicker::from_entropy(),
        };
        Ok(Self {
            knowledge,
            components,
            rules,
            scorer: RelevanceScorer::new(&config),
            config,
            sessions: SessionStore::new(),
            replies,
        })
    }

    /// Load the knowledge base named by `config`, falling back to the
    /// built-in set when it is missing or unusable.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let knowledge = KnowledgeBase::load_or_fallback(&config.knowledge_path);
        Self::new(knowledge, config)
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn end_session(&self, session_id: &str) -> bool {
        self.sessions.end(session_id)
    }

    /// Forget everything the session learned, keeping its id.
    pub fn reset_session(&self, session_id: &str) {
        self.sessions.reset(session_id);
    }

    pub fn cleanup_sessions(&self) -> usize {
        self.sessions.cleanup(self.config.session_max_age_hours)
    }

    /// Answer one utterance. Never fails: bad input gets a canned reply.
    pub fn diagnose(&self, utterance: &str, session_id: &str) -> String {
        let shared = self.sessions.get_or_create(session_id);
        let mut session = shared.lock().unwrap_or_else(PoisonError::into_inner);
        self.run_turn(&mut session, utterance)
    }

    pub fn summary(&self, session_id: &str) -> String {
        match self.sessions.snapshot(session_id) {
            Some(session) => compose::summary(&session),
            None => "Belum ada percakapan.".to_string(),
        }
    }

    fn run_turn(&self, session: &mut SessionContext, utterance: &str) -> String {
        let lower = utterance.trim().to_lowercase();

        if classifier::is_gibberish(&lower) {
            debug!(session = %session.session_id, "gibberish input");
            return self.replies.gibberish();
        }
        if classifier::is_thank_you(&self.rules, &lower) {
            debug!(session = %session.session_id, "thank-you input");
            return self.replies.thanks();
        }
        if session.has_history() && classifier::is_follow_up_question(&self.rules, &lower) {
            match (&session.current_diagnosis, classifier::follow_up_intent(&lower)) {
                (None, _) => return NO_DIAGNOSIS_YET.to_string(),
                (Some(diagnosis), Some(intent)) => {
                    debug!(session = %session.session_id, ?intent, "conversational follow-up");
                    return self.replies.follow_up_answer(intent, diagnosis);
                }
                (Some(_), None) => {}
            }
        }

        let is_clarification = session.has_history() && matcher::has_correction_marker(&lower);
        if is_clarification {
            if let Some(correction) = matcher::detect_correction(&lower) {
                if let Some(response) = self.corrected_turn(session, utterance, correction) {
                    return response;
                }
            }
        }

        let classification = classifier::classify(
            &self.rules,
            &self.components,
            utterance,
            session,
            self.config.short_input_chars,
        );
        debug!(
            session = %session.session_id,
            input_type = ?classification.input_type,
            confidence = classification.confidence,
            "classified"
        );
        tracker::absorb(session, &self.rules, &self.components, &lower, &classification);

        let matches = self.rank(&lower, session, &classification);
        let top = matches.first().copied();
        let continuing = top.is_some_and(|m| {
            session.has_history() && matcher::is_same_context(m.record, &session.problem, &self.config)
        });
        let response = self.compose(&classification, top.as_ref(), session, continuing);

        tracker::commit(
            session,
            &self.rules,
            TurnOutcome {
                utterance,
                response: response.clone(),
                classification: &classification,
                top,
                continuing,
                is_clarification,
                corrects_previous: false,
            },
            Utc::now(),
        );
        response
    }

    /// Re-run the turn against the problem the user says they meant. `None`
    /// when the corrected text matches nothing, so the caller falls back to
    /// the ordinary path.
    fn corrected_turn(
        &self,
        session: &mut SessionContext,
        utterance: &str,
        correction: &Correction,
    ) -> Option<String> {
        let corrected = correction.problem_text;
        let classification = classifier::classify(
            &self.rules,
            &self.components,
            corrected,
            session,
            self.config.short_input_chars,
        );
        let matches = self.rank(corrected, session, &classification);
        let top = matches.first().copied()?;
        debug!(
            session = %session.session_id,
            category = correction.category,
            id = %top.record.id,
            "applying user correction"
        );

        correction.apply(&mut session.problem);
        let lower = utterance.trim().to_lowercase();
        tracker::absorb(session, &self.rules, &self.components, &lower, &classification);
        let continuing = matcher::is_same_context(top.record, &session.problem, &self.config);
        let body = self.compose(&classification, Some(&top), session, continuing);
        let response = format!("{}\n\n{body}", compose::APOLOGY);

        tracker::commit(
            session,
            &self.rules,
            TurnOutcome {
                utterance,
                response: response.clone(),
                classification: &classification,
                top: Some(top),
                continuing,
                is_clarification: true,
                corrects_previous: true,
            },
            Utc::now(),
        );
        Some(response)
    }

    fn rank<'k>(
        &'k self,
        lower: &str,
        session: &SessionContext,
        classification: &Classification,
    ) -> Vec<ScoredMatch<'k>> {
        self.scorer.rank(
            lower,
            self.knowledge.records(),
            session,
            classification,
            &self.components,
        )
    }

    fn compose(
        &self,
        classification: &Classification,
        top: Option<&ScoredMatch<'_>>,
        session: &SessionContext,
        continuing: bool,
    ) -> String {
        match (classification.input_type, top) {
            (InputType::ComponentConfirmation, _) => {
                compose::confirmation(classification, session, &self.components)
            }
            (_, None) => compose::clarification_request(session),
            (InputType::FollowUpQuestion | InputType::ShortFollowUp, Some(best)) => {
                compose::follow_up(best, session, &self.components)
            }
            (InputType::ProblemDescription | InputType::Unknown, Some(best)) => {
                compose::full_diagnosis(best, session, continuing, &self.components)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replies::{GIBBERISH, THANKS};
    use std::sync::Arc;
    use std::thread;

    fn engine() -> DiagnosisEngine {
        let config = EngineConfig {
            reply_seed: Some(42),
            ..EngineConfig::default()
        };
        DiagnosisEngine::new(KnowledgeBase::builtin(), config).unwrap()
    }

    fn snapshot(engine: &DiagnosisEngine, id: &str) -> SessionContext {
        engine.sessions().snapshot(id).unwrap()
    }

    #[test]
    fn brake_scenario_then_confirmation_then_follow_up() {
        let engine = engine();

        let first = engine.diagnose("motor saya remnya blong", "s1");
        assert!(first.to_lowercase().contains("rem"));
        assert!(first.contains("Rp 50.000 - Rp 150.000"));
        let session = snapshot(&engine, "s1");
        assert_eq!(session.problem.main_problem.as_deref(), Some("Rem blong atau tidak pakem"));
        assert_eq!(session.confidence_history, vec![1.0]);

        let second = engine.diagnose("aki udah dicek, masih bagus", "s1");
        assert!(second.contains("AKI: kondisi bagus"));
        let session = snapshot(&engine, "s1");
        assert_eq!(
            session.turns.last().map(|t| t.input_type),
            Some(InputType::ComponentConfirmation)
        );
        assert!(session.problem.checked_components.contains("aki"));
        for related in ["susah hidup", "lampu redup", "starter lemah"] {
            assert!(session.problem.excluded_causes.contains(related));
        }
        // Confirmation keeps the topic.
        assert_eq!(session.problem.main_problem.as_deref(), Some("Rem blong atau tidak pakem"));

        let third = engine.diagnose("terus gimana dong?", "s1");
        let session = snapshot(&engine, "s1");
        assert_eq!(
            session.turns.last().map(|t| t.input_type),
            Some(InputType::FollowUpQuestion)
        );
        assert!(third.contains("KEMUNGKINAN PENYEBAB YANG TERSISA"));
        assert!(third.contains("Kampas rem habis"));
        let shown = third.to_lowercase();
        for excluded in &session.problem.excluded_causes {
            assert!(!shown.contains(excluded.as_str()));
        }
    }

    #[test]
    fn gibberish_is_idempotent_and_never_mutates() {
        let engine = engine();
        engine.diagnose("motor saya remnya blong", "g");
        let before = snapshot(&engine, "g");

        let first = engine.diagnose("asdfgh", "g");
        let second = engine.diagnose("asdfgh", "g");
        for reply in [&first, &second] {
            assert!(GIBBERISH.iter().any(|g| reply.starts_with(g)));
        }

        let after = snapshot(&engine, "g");
        assert_eq!(before.problem, after.problem);
        assert_eq!(before.turns.len(), after.turns.len());
        assert_eq!(before.confidence_history, after.confidence_history);
    }

    #[test]
    fn thanks_short_circuits() {
        let engine = engine();
        engine.diagnose("motor saya remnya blong", "t");
        let reply = engine.diagnose("makasih banyak bro", "t");
        assert!(THANKS.contains(&reply.as_str()));
        assert_eq!(snapshot(&engine, "t").turns.len(), 1);
    }

    #[test]
    fn summary_after_first_turn() {
        let engine = engine();
        assert_eq!(engine.summary("nobody"), "Belum ada percakapan.");
        assert!(engine.sessions().get("nobody").is_none());

        engine.diagnose("motor saya remnya blong", "sum");
        let summary = engine.summary("sum");
        assert!(summary.contains("Total interaksi: 1"));
        assert!(summary.contains("**MASALAH UTAMA:** Rem blong atau tidak pakem"));
        assert!(summary.contains("**DIAGNOSIS TERKINI:** Rem blong atau tidak pakem"));
    }

    #[test]
    fn conversational_follow_up_uses_severity() {
        let engine = engine();
        engine.diagnose("motor saya remnya blong", "f");
        let reply = engine.diagnose("masih bisa dipake ga?", "f");
        assert!(reply.starts_with("Waduh jangan bro!"));
        assert_eq!(snapshot(&engine, "f").turns.len(), 1);
    }

    #[test]
    fn follow_up_without_diagnosis_asks_for_problem() {
        let engine = engine();
        engine.diagnose("halo", "n");
        assert!(snapshot(&engine, "n").current_diagnosis.is_none());
        assert_eq!(engine.diagnose("ini bahaya banget ga?", "n"), NO_DIAGNOSIS_YET);
    }

    #[test]
    fn first_contact_without_match_asks_for_details() {
        let engine = engine();
        let reply = engine.diagnose("halo", "new");
        assert!(reply.contains("Info yang gue butuhin"));
        let session = snapshot(&engine, "new");
        assert_eq!(session.turns.len(), 1);
        assert!(session.confidence_history.is_empty());
    }

    #[test]
    fn unmatched_follow_up_asks_for_clarification() {
        let engine = engine();
        engine.diagnose("halo", "q");
        let reply = engine.diagnose("rem blong", "q");

        let session = snapshot(&engine, "q");
        assert_eq!(session.turns[1].input_type, InputType::ShortFollowUp);
        assert!(reply.contains("butuh klarifikasi"));
        assert!(!reply.contains("BAWA KE BENGKEL"));
        assert!(session.confidence_history.is_empty());
    }

    #[test]
    fn correction_word_without_mapping_still_sets_new_topic() {
        let engine = engine();
        engine.diagnose("motor saya remnya blong", "w");
        let reply = engine.diagnose("salah, motor gua susah hidup tiap pagi", "w");

        assert!(reply.contains("**Kategori:** Starter"));
        let session = snapshot(&engine, "w");
        assert!(session.turns[1].is_clarification);
        assert_eq!(session.problem.main_problem.as_deref(), Some("Motor susah hidup"));
        assert_eq!(session.problem.main_category.as_deref(), Some("Starter"));
    }

    #[test]
    fn correction_reroutes_topic_and_marks_previous_turn() {
        let engine = engine();
        engine.diagnose("motor saya remnya blong", "c");
        let reply = engine.diagnose("bukan itu, maksud saya lampunya kadang idup kadang mati", "c");

        assert!(reply.starts_with(compose::APOLOGY));
        assert!(reply.contains("Kelistrikan"));
        let session = snapshot(&engine, "c");
        assert!(session.turns[0].corrected);
        assert!(session.turns[1].is_clarification);
        assert_eq!(session.problem.main_category.as_deref(), Some("Kelistrikan"));
        assert_eq!(
            session.problem.main_problem.as_deref(),
            Some("lampu motor kadang idup kadang mati")
        );
        // A clarification does not replace the standing diagnosis.
        assert_eq!(
            session.current_diagnosis.as_ref().map(|r| r.id.as_str()),
            Some("rem_001")
        );
    }

    #[test]
    fn confidence_history_counts_matched_turns_only() {
        let engine = engine();
        let turns = [
            "motor gua susah hidup",
            "asdfgh",
            "makasih bro",
            "halo",
            "aki udah dicek, masih bagus",
        ];
        for text in turns {
            engine.diagnose(text, "h");
        }
        let session = snapshot(&engine, "h");
        let matched = session.turns.iter().filter(|t| t.confidence > 0.0).count();
        assert_eq!(session.confidence_history.len(), matched);
        assert_eq!(session.turns.len(), 3);
    }

    #[test]
    fn checked_and_excluded_sets_only_grow() {
        let engine = engine();
        let script = [
            "motor gua susah hidup",
            "aki udah dicek, masih bagus",
            "busi juga udah ganti baru",
            "terus gimana dong?",
            "masih ga bisa juga nih",
            "bukan, maksud saya karbu",
        ];
        let mut checked = 0;
        let mut excluded = 0;
        for text in script {
            engine.diagnose(text, "m");
            let session = snapshot(&engine, "m");
            assert!(session.problem.checked_components.len() >= checked);
            assert!(session.problem.excluded_causes.len() >= excluded);
            checked = session.problem.checked_components.len();
            excluded = session.problem.excluded_causes.len();
        }
        assert!(checked >= 2);
    }

    #[test]
    fn parallel_sessions_do_not_share_state() {
        let engine = Arc::new(engine());
        let handles: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|id| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    engine.diagnose("motor saya remnya blong", id);
                    if id == "a" {
                        engine.diagnose("aki udah dicek, masih bagus", id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(snapshot(&engine, "a").problem.checked_components.contains("aki"));
        for id in ["b", "c", "d"] {
            let session = snapshot(&engine, id);
            assert!(session.problem.checked_components.is_empty());
            assert!(session.problem.excluded_causes.is_empty());
            assert_eq!(session.turns.len(), 1);
        }
    }

    #[test]
    fn ended_sessions_start_over() {
        let engine = engine();
        engine.diagnose("motor saya remnya blong", "e");
        assert!(engine.end_session("e"));
        assert_eq!(engine.summary("e"), "Belum ada percakapan.");
        engine.diagnose("motor saya remnya blong", "e");
        assert_eq!(snapshot(&engine, "e").turns.len(), 1);
        assert_eq!(engine.cleanup_sessions(), 0);

        engine.diagnose("aki udah dicek, masih bagus", "e");
        engine.reset_session("e");
        let fresh = snapshot(&engine, "e");
        assert!(fresh.turns.is_empty());
        assert!(fresh.problem.checked_components.is_empty());
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DiagnosisEngine>();
    }
}
