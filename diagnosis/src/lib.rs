//! Rule-based, context-aware motorcycle diagnosis over Indonesian
//! conversational input.

pub mod classifier;
pub mod compose;
pub mod config;
pub mod engine;
pub mod knowledge;
pub mod matcher;
pub mod replies;
pub mod rules;
pub mod scorer;
pub mod session;
pub mod similarity;
pub mod tracker;

pub use classifier::{Classification, ComponentStatus, InputType, ResponseStrategy, UserIntent};
pub use config::{EngineConfig, ScoringWeights, DEFAULT_SESSION_ID};
pub use engine::DiagnosisEngine;
pub use knowledge::{Component, ComponentMap, KnowledgeBase, KnowledgeError};
pub use replies::ReplyPicker;
pub use session::{SessionContext, SessionStore};
