// src/engine/mod.rs

//! Scoring and session-progression rules.
//!
//! Everything here is a pure function over plain values. Persisting the
//! results and serializing concurrent callers is left to `crate::store`.

pub mod error;
pub mod leaderboard;
pub mod scoring;
pub mod session;

pub use error::EngineError;
pub use leaderboard::{LeaderboardRow, ParticipantEntries, build_leaderboard};
pub use scoring::{AnswerSubmission, QuestionKey, ScoreEntry, ScoringPolicy, compute_score};
pub use session::{SessionAction, SessionState, SessionStatus, transition};
