// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::{SessionAction, SessionState, SessionStatus},
    models::quiz::PublicQuestion,
};

/// Represents the 'quiz_sessions' table.
/// One instructor-run instance of a quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSession {
    pub id: Uuid,
    pub quiz_id: Uuid,
    /// Numeric code participants type in to join.
    pub code: String,
    pub status: SessionStatus,
    /// -1 until the first question is shown.
    pub current_question_index: i32,
    pub question_started_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QuizSession {
    pub fn new(quiz_id: Uuid, code: String, now: DateTime<Utc>) -> Self {
        let initial = SessionState::initial();
        Self {
            id: Uuid::new_v4(),
            quiz_id,
            code,
            status: initial.status,
            current_question_index: initial.current_question_index,
            question_started_at: None,
            started_at: None,
            ended_at: None,
            created_at: now,
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            status: self.status,
            current_question_index: self.current_question_index,
        }
    }

    /// Stores a state produced by the engine and stamps the matching timestamps.
    pub fn apply(&mut self, next: SessionState, now: DateTime<Utc>) {
        let previous = self.state();

        if previous.status == SessionStatus::Draft && next.status == SessionStatus::Live {
            self.started_at = Some(now);
        }
        if next.status == SessionStatus::QuestionActive && previous != next {
            self.question_started_at = Some(now);
        }
        if next.status == SessionStatus::Completed && previous.status != SessionStatus::Completed {
            self.ended_at = Some(now);
        }

        self.status = next.status;
        self.current_question_index = next.current_question_index;
    }

    /// Index of the question on screen, if any.
    pub fn current_question(&self) -> Option<usize> {
        usize::try_from(self.current_question_index).ok()
    }
}

/// Represents the 'session_participants' table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub session_id: Uuid,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

/// DTO for joining a session with its code.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinSessionRequest {
    #[validate(length(min = 1, max = 10))]
    pub code: String,
    #[validate(length(
        min = 1,
        max = 100,
        message = "Display name length must be between 1 and 100 characters."
    ))]
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct JoinSessionResponse {
    pub participant: Participant,
    pub session: QuizSession,
}

/// DTO for an instructor action.
#[derive(Debug, Deserialize)]
pub struct SessionActionRequest {
    pub action: SessionAction,
}

/// Dashboard row for a session that has started and not yet completed.
#[derive(Debug, Serialize)]
pub struct ActiveSession {
    pub session: QuizSession,
    pub quiz_title: String,
    pub participant_count: usize,
}

/// Optional `?status=` filter when listing a quiz's sessions.
#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    pub status: Option<SessionStatus>,
}

/// Polling view of a session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session: QuizSession,
    pub total_questions: usize,
    pub participant_count: usize,
    /// Present while a question is on screen (active or closed).
    pub current_question: Option<PublicQuestion>,
    /// Whole seconds left on the active question.
    pub seconds_remaining: Option<u32>,
    /// How long clients should wait before polling again.
    pub poll_after_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::transition;
    use chrono::Duration;

    #[test]
    fn test_apply_stamps_lifecycle() {
        let t0 = Utc::now();
        let mut session = QuizSession::new(Uuid::new_v4(), "12345".to_string(), t0);
        assert_eq!(session.current_question(), None);

        let t1 = t0 + Duration::seconds(5);
        let live = transition(session.state(), SessionAction::Start, 2).unwrap();
        session.apply(live, t1);
        assert_eq!(session.started_at, Some(t1));
        assert_eq!(session.question_started_at, None);

        let t2 = t1 + Duration::seconds(5);
        let active = transition(session.state(), SessionAction::Advance, 2).unwrap();
        session.apply(active, t2);
        assert_eq!(session.question_started_at, Some(t2));
        assert_eq!(session.current_question(), Some(0));

        let t3 = t2 + Duration::seconds(5);
        let closed = transition(session.state(), SessionAction::Close, 2).unwrap();
        session.apply(closed, t3);
        assert_eq!(session.question_started_at, Some(t2));

        let t4 = t3 + Duration::seconds(5);
        let next = transition(session.state(), SessionAction::Advance, 2).unwrap();
        session.apply(next, t4);
        assert_eq!(session.question_started_at, Some(t4));
        assert_eq!(session.current_question(), Some(1));

        let t5 = t4 + Duration::seconds(5);
        let done = transition(session.state(), SessionAction::End, 2).unwrap();
        session.apply(done, t5);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.ended_at, Some(t5));
    }
}
