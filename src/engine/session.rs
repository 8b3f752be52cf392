// src/engine/session.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::engine::error::EngineError;

/// Index reported before the first question is shown.
pub const NO_QUESTION: i32 = -1;

/// Lifecycle status of a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Draft,
    Live,
    QuestionActive,
    QuestionClosed,
    Completed,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 5] = [
        SessionStatus::Draft,
        SessionStatus::Live,
        SessionStatus::QuestionActive,
        SessionStatus::QuestionClosed,
        SessionStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::Live => "live",
            SessionStatus::QuestionActive => "question_active",
            SessionStatus::QuestionClosed => "question_closed",
            SessionStatus::Completed => "completed",
        }
    }

    /// Started and not yet completed.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            SessionStatus::Live | SessionStatus::QuestionActive | SessionStatus::QuestionClosed
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SessionStatus::Draft),
            "live" => Ok(SessionStatus::Live),
            "question_active" => Ok(SessionStatus::QuestionActive),
            "question_closed" => Ok(SessionStatus::QuestionClosed),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// Instructor action against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Start,
    Advance,
    Close,
    End,
}

impl SessionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAction::Start => "start",
            SessionAction::Advance => "advance",
            SessionAction::Close => "close",
            SessionAction::End => "end",
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus the index of the question on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub status: SessionStatus,
    pub current_question_index: i32,
}

impl SessionState {
    pub const fn initial() -> Self {
        Self {
            status: SessionStatus::Draft,
            current_question_index: NO_QUESTION,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    fn with_status(self, status: SessionStatus) -> Self {
        Self { status, ..self }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Computes the state that follows `current` when `action` is applied.
///
/// * `total_questions` decides whether `advance` out of a closed question
///   opens the next one or completes the session.
/// * Pairs that are not part of the lifecycle return `InvalidTransition`.
///   Nothing is corrected silently, and a completed session accepts no action.
pub fn transition(
    current: SessionState,
    action: SessionAction,
    total_questions: usize,
) -> Result<SessionState, EngineError> {
    use SessionAction::*;
    use SessionStatus::*;

    let next = match (current.status, action) {
        (Completed, _) => None,
        (_, End) => Some(current.with_status(Completed)),
        (Draft, Start) => Some(SessionState {
            status: Live,
            current_question_index: NO_QUESTION,
        }),
        (Live, Advance) if total_questions == 0 => Some(current.with_status(Completed)),
        (Live, Advance) => Some(SessionState {
            status: QuestionActive,
            current_question_index: 0,
        }),
        (QuestionActive, Close) => Some(current.with_status(QuestionClosed)),
        (QuestionClosed, Advance) => {
            let next_index = current.current_question_index + 1;
            if next_index >= 0 && (next_index as usize) < total_questions {
                Some(SessionState {
                    status: QuestionActive,
                    current_question_index: next_index,
                })
            } else {
                Some(current.with_status(Completed))
            }
        }
        _ => None,
    };

    next.ok_or(EngineError::InvalidTransition {
        status: current.status,
        action,
    })
}
