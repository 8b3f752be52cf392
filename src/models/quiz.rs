// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::engine::QuestionKey;

/// A quiz authored by an instructor, with its questions in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'questions' table, with its options attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub text: String,
    /// 0-based position inside the quiz.
    pub position: i32,
    pub time_limit_secs: u32,
    pub options: Vec<QuestionOption>,
}

/// Represents the 'question_options' table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub position: i32,
    pub is_correct: bool,
}

impl Question {
    pub fn correct_option_id(&self) -> Option<Uuid> {
        self.options.iter().find(|o| o.is_correct).map(|o| o.id)
    }

    pub fn has_option(&self, option_id: Uuid) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    /// Builds a question at `position`. Options always get fresh identifiers.
    pub fn from_request(
        id: Uuid,
        quiz_id: Uuid,
        position: i32,
        req: CreateQuestionRequest,
        default_time_limit_secs: u32,
    ) -> Self {
        Self {
            id,
            quiz_id,
            text: req.text.trim().to_string(),
            position,
            time_limit_secs: req.time_limit_secs.unwrap_or(default_time_limit_secs),
            options: req
                .options
                .into_iter()
                .enumerate()
                .map(|(o_idx, o)| QuestionOption {
                    id: Uuid::new_v4(),
                    question_id: id,
                    text: o.text,
                    position: o_idx as i32,
                    is_correct: o.is_correct,
                })
                .collect(),
        }
    }

    /// Scoring view of the question. `None` if no option is marked correct.
    pub fn key(&self) -> Option<QuestionKey> {
        Some(QuestionKey {
            question_id: self.id,
            correct_option_id: self.correct_option_id()?,
            time_limit_secs: self.time_limit_secs,
        })
    }
}

impl Quiz {
    /// Builds a quiz with fresh identifiers from a validated request.
    pub fn from_request(req: CreateQuizRequest, default_time_limit_secs: u32) -> Self {
        let quiz_id = Uuid::new_v4();
        let questions = req
            .questions
            .into_iter()
            .enumerate()
            .map(|(q_idx, q)| {
                Question::from_request(
                    Uuid::new_v4(),
                    quiz_id,
                    q_idx as i32,
                    q,
                    default_time_limit_secs,
                )
            })
            .collect();

        Self {
            id: quiz_id,
            title: req.title.trim().to_string(),
            description: req.description,
            questions,
            created_at: Utc::now(),
        }
    }

    pub fn question(&self, question_id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Applies the fields present in an update. Absent fields are left alone.
    pub fn apply_update(&mut self, req: UpdateQuizRequest) {
        if let Some(title) = req.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = req.description {
            self.description = Some(description);
        }
    }
}

/// Listing row for the instructor dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub question_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Quiz> for QuizSummary {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            question_count: quiz.questions.len(),
            created_at: quiz.created_at,
        }
    }
}

/// DTO for sending a question to participants (no correctness flags).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub text: String,
    pub position: i32,
    pub time_limit_secs: u32,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: Uuid,
    pub text: String,
    pub position: i32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            text: q.text.clone(),
            position: q.position,
            time_limit_secs: q.time_limit_secs,
            options: q
                .options
                .iter()
                .map(|o| PublicOption {
                    id: o.id,
                    text: o.text.clone(),
                    position: o.position,
                })
                .collect(),
        }
    }
}

/// DTO for creating a quiz together with its questions.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 255, message = "Title length must be between 1 and 255 characters."))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A quiz needs at least one question."), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// DTO for renaming a quiz or changing its description.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 255, message = "Title length must be between 1 and 255 characters."))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Also used to replace an existing question wholesale.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 5, max = 1000, message = "Question text must be between 5 and 1000 characters."))]
    pub text: String,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_secs: Option<u32>,
    #[validate(length(min = 2, max = 6), custom(function = validate_options))]
    pub options: Vec<CreateOptionRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOptionRequest {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

fn validate_options(options: &[CreateOptionRequest]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.text.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.text.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    if options.iter().filter(|o| o.is_correct).count() != 1 {
        return Err(validator::ValidationError::new(
            "exactly_one_correct_option_required",
        ));
    }
    Ok(())
}
