//! Per-conversation state and the keyed store that owns it.

use crate::classifier::{InputType, UserIntent};
use chrono::{DateTime, Duration, Utc};
use motodiag_types::KnowledgeRecord;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::info;
use uuid::Uuid;

/// One committed exchange.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    pub utterance: String,
    pub response: String,
    pub input_type: InputType,
    pub intent: UserIntent,
    pub intent_confidence: f32,
    /// Top match score, 0.0 when nothing cleared the threshold.
    pub confidence: f32,
    pub is_clarification: bool,
    /// Set when a later turn corrected this one.
    pub corrected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProblemContext {
    pub main_problem: Option<String>,
    pub main_category: Option<String>,
    pub main_keywords: BTreeSet<String>,
    pub symptoms: BTreeSet<String>,
    /// Grows only; cleared by [`SessionStore::reset`].
    pub checked_components: BTreeSet<String>,
    /// Grows only; cleared by [`SessionStore::reset`].
    pub excluded_causes: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserKnowledge {
    pub technical_level: TechnicalLevel,
    pub tools_available: BTreeSet<String>,
    pub previous_actions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VehicleProfile {
    pub brand: Option<String>,
    pub year: Option<u16>,
}

impl VehicleProfile {
    pub fn is_known(&self) -> bool {
        self.brand.is_some() && self.year.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
    pub problem: ProblemContext,
    pub user: UserKnowledge,
    pub vehicle: VehicleProfile,
    /// Copy of the record last selected as the diagnosis.
    pub current_diagnosis: Option<KnowledgeRecord>,
    /// One entry per turn that produced a match.
    pub confidence_history: Vec<f32>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at,
            turns: Vec::new(),
            problem: ProblemContext::default(),
            user: UserKnowledge::default(),
            vehicle: VehicleProfile::default(),
            current_diagnosis: None,
            confidence_history: Vec::new(),
        }
    }

    pub fn has_history(&self) -> bool {
        !self.turns.is_empty()
    }

    pub fn average_confidence(&self) -> Option<f32> {
        if self.confidence_history.is_empty() {
            return None;
        }
        let sum: f32 = self.confidence_history.iter().sum();
        Some(sum / self.confidence_history.len() as f32)
    }
}

pub type SharedSession = Arc<Mutex<SessionContext>>;

/// About a century; keeps the age arithmetic inside chrono's range.
const MAX_AGE_HOURS_CEILING: u64 = 24 * 365 * 100;

/// Keyed session storage. Distinct ids never share state; each session
/// sits behind its own mutex so a turn holds only its own session.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn get_or_create(&self, session_id: &str) -> SharedSession {
        if let Some(existing) = self.get(session_id) {
            return existing;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!(session = %session_id, "session created");
                Arc::new(Mutex::new(SessionContext::new(session_id, Utc::now())))
            })
            .clone()
    }

    pub fn get(&self, session_id: &str) -> Option<SharedSession> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session_id).cloned()
    }

    /// Detached copy of a session's current state.
    pub fn snapshot(&self, session_id: &str) -> Option<SessionContext> {
        self.get(session_id)
            .map(|shared| shared.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    pub fn end(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.remove(session_id).is_some();
        if removed {
            info!(session = %session_id, "session ended");
        }
        removed
    }

    /// Replace the session with an empty one under the same id.
    pub fn reset(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(
            session_id.to_string(),
            Arc::new(Mutex::new(SessionContext::new(session_id, Utc::now()))),
        );
        info!(session = %session_id, "session reset");
    }

    pub fn cleanup(&self, max_age_hours: u64) -> usize {
        self.cleanup_at(Utc::now(), max_age_hours)
    }

    /// Drop sessions created more than `max_age_hours` before `now`.
    pub fn cleanup_at(&self, now: DateTime<Utc>, max_age_hours: u64) -> usize {
        let max_age = Duration::hours(max_age_hours.min(MAX_AGE_HOURS_CEILING) as i64);
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, shared| {
            let created_at = shared.lock().unwrap_or_else(PoisonError::into_inner).created_at;
            now.signed_duration_since(created_at) <= max_age
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "expired sessions cleaned up");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
