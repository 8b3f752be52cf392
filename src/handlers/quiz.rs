// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::quiz::{CreateQuestionRequest, CreateQuizRequest, Question, Quiz, UpdateQuizRequest},
    store::QuizStore,
};

/// Creates a quiz with all of its questions and options.
///
/// * Each question needs 2-6 options with exactly one marked correct.
/// * Questions without a time limit get `DEFAULT_QUESTION_TIME`.
/// * Returns 201 Created and the stored quiz (instructor view).
pub async fn create_quiz(
    State(store): State<Arc<dyn QuizStore>>,
    State(config): State<Config>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = Quiz::from_request(payload, config.default_question_time_secs);
    store.save_quiz(&quiz).await.map_err(|e| {
        tracing::error!("Failed to save quiz: {:?}", e);
        e
    })?;

    tracing::info!(quiz_id = %quiz.id, questions = quiz.questions.len(), "Quiz created");

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Returns a quiz including correct answers. Instructor view.
pub async fn get_quiz(
    State(store): State<Arc<dyn QuizStore>>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(store.as_ref(), quiz_id).await?;
    Ok(Json(quiz))
}

/// Lists every quiz with its question count, newest first.
pub async fn list_quizzes(
    State(store): State<Arc<dyn QuizStore>>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = store.list_quizzes().await?;
    Ok(Json(quizzes))
}

/// Renames a quiz or changes its description.
///
/// * Absent fields are left unchanged.
/// * Allowed at any time; questions are edited separately.
pub async fn update_quiz(
    State(store): State<Arc<dyn QuizStore>>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut quiz = load_quiz(store.as_ref(), quiz_id).await?;
    quiz.apply_update(payload);
    store.update_quiz_details(&quiz).await?;

    tracing::info!(quiz_id = %quiz.id, "Quiz updated");

    Ok(Json(quiz))
}

/// Replaces one question's text, time limit and options.
///
/// * Same rules as on creation: 2-6 options, exactly one correct.
/// * The question keeps its id and position; options get new ids.
/// * 409 Conflict once any session of the quiz has started.
pub async fn update_question(
    State(store): State<Arc<dyn QuizStore>>,
    State(config): State<Config>,
    Path((quiz_id, question_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = load_quiz(store.as_ref(), quiz_id).await?;
    let position = quiz
        .question(question_id)
        .map(|q| q.position)
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let question = Question::from_request(
        question_id,
        quiz.id,
        position,
        payload,
        config.default_question_time_secs,
    );
    store.replace_question(&question).await?;

    tracing::info!(quiz_id = %quiz.id, question_id = %question.id, "Question replaced");

    Ok(Json(question))
}

/// Deletes a quiz together with its finished and draft sessions.
/// Answers 409 Conflict while one of its sessions is running.
pub async fn delete_quiz(
    State(store): State<Arc<dyn QuizStore>>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    store.delete_quiz(quiz_id).await?;
    tracing::info!(quiz_id = %quiz_id, "Quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn load_quiz(store: &dyn QuizStore, quiz_id: Uuid) -> Result<Quiz, AppError> {
    store
        .get_quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))
}
