// src/engine/error.rs

use thiserror::Error;

use crate::engine::session::{SessionAction, SessionStatus};

/// Errors raised by the scoring and session engine.
///
/// Both kinds signal a caller mistake rather than an environmental failure,
/// so retrying with the same inputs always reproduces them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A structurally invalid input, such as a zero time limit.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The action does not apply to the session's current status.
    #[error("Cannot {action} a session that is {status}")]
    InvalidTransition {
        status: SessionStatus,
        action: SessionAction,
    },
}
