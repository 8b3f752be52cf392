// src/models/answer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ScoreEntry;

/// Represents the 'student_answers' table.
/// At most one row exists per (participant, question).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentAnswer {
    pub id: Uuid,
    pub session_id: Uuid,
    pub participant_id: Uuid,
    pub question_id: Uuid,
    /// `None` when the participant explicitly skipped.
    pub option_id: Option<Uuid>,
    pub is_correct: bool,
    pub points: u32,
    pub elapsed_secs: f64,
    pub submitted_at: DateTime<Utc>,
}

impl StudentAnswer {
    pub fn score_entry(&self) -> ScoreEntry {
        ScoreEntry {
            participant_id: self.participant_id,
            question_id: self.question_id,
            points: self.points,
            is_correct: self.is_correct,
            answered: self.option_id.is_some(),
        }
    }
}

/// DTO for submitting an answer to the active question.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub participant_id: Uuid,
    pub question_id: Uuid,
    pub option_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub answer_id: Uuid,
    pub is_correct: bool,
    pub points: u32,
    pub elapsed_secs: f64,
}
