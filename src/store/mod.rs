// src/store/mod.rs

//! Persistence for quizzes, sessions, participants and answers.
//!
//! Implementations must serialize `apply_action` per session so the
//! state machine never runs against a stale state.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    engine::SessionAction,
    error::AppError,
    models::{
        answer::StudentAnswer,
        quiz::{Question, Quiz, QuizSummary},
        session::{ActiveSession, Participant, QuizSession},
    },
};

pub use memory::MemoryQuizStore;
pub use postgres::PgQuizStore;

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn save_quiz(&self, quiz: &Quiz) -> Result<(), AppError>;

    async fn get_quiz(&self, quiz_id: Uuid) -> Result<Option<Quiz>, AppError>;

    /// Newest first.
    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, AppError>;

    /// Persists title and description only. `NotFound` when the quiz is gone.
    async fn update_quiz_details(&self, quiz: &Quiz) -> Result<(), AppError>;

    /// Swaps a question's text, time limit and options in place.
    ///
    /// Fails with `Conflict` once any session of the quiz has left DRAFT,
    /// since recorded answers point at the question and its options.
    async fn replace_question(&self, question: &Question) -> Result<(), AppError>;

    /// Removes a quiz with its sessions, participants and answers.
    /// Fails with `Conflict` while one of its sessions is running.
    async fn delete_quiz(&self, quiz_id: Uuid) -> Result<(), AppError>;

    /// Fails with `Conflict` when the join code is already taken.
    async fn insert_session(&self, session: &QuizSession) -> Result<(), AppError>;

    async fn get_session(&self, session_id: Uuid) -> Result<Option<QuizSession>, AppError>;

    async fn find_session_by_code(&self, code: &str) -> Result<Option<QuizSession>, AppError>;

    /// Sessions of one quiz, newest first.
    async fn list_sessions(&self, quiz_id: Uuid) -> Result<Vec<QuizSession>, AppError>;

    /// Every running session across quizzes, most recently started first.
    async fn list_active_sessions(&self) -> Result<Vec<ActiveSession>, AppError>;

    /// Runs one state-machine transition and persists the result atomically.
    async fn apply_action(
        &self,
        session_id: Uuid,
        action: SessionAction,
        now: DateTime<Utc>,
    ) -> Result<QuizSession, AppError>;

    async fn add_participant(&self, participant: &Participant) -> Result<(), AppError>;

    async fn get_participant(&self, participant_id: Uuid) -> Result<Option<Participant>, AppError>;

    async fn list_participants(&self, session_id: Uuid) -> Result<Vec<Participant>, AppError>;

    /// Fails with `Conflict` when the participant already answered the question.
    async fn record_answer(&self, answer: &StudentAnswer) -> Result<(), AppError>;

    async fn list_answers(&self, session_id: Uuid) -> Result<Vec<StudentAnswer>, AppError>;
}

pub(crate) fn duplicate_answer() -> AppError {
    AppError::Conflict("Answer already submitted for this question".to_string())
}

pub(crate) fn session_not_found() -> AppError {
    AppError::NotFound("Session not found".to_string())
}

pub(crate) fn quiz_not_found() -> AppError {
    AppError::NotFound("Quiz not found".to_string())
}

pub(crate) fn question_not_found() -> AppError {
    AppError::NotFound("Question not found".to_string())
}

pub(crate) fn quiz_has_started_sessions() -> AppError {
    AppError::Conflict("Questions cannot change once a session of this quiz has started".to_string())
}

pub(crate) fn quiz_has_running_sessions() -> AppError {
    AppError::Conflict("Quiz has a running session".to_string())
}
