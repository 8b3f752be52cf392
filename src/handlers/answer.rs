// src/handlers/answer.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    engine::{AnswerSubmission, ScoreEntry, ScoringPolicy, SessionStatus},
    error::AppError,
    handlers::{
        quiz::load_quiz,
        session::{current_question, elapsed_secs, load_session},
    },
    models::{
        answer::{StudentAnswer, SubmitAnswerRequest, SubmitAnswerResponse},
        session::Participant,
    },
    store::QuizStore,
};

/// Submits a participant's answer to the active question.
///
/// * The session must be QUESTION_ACTIVE and the question the one on screen.
/// * Elapsed time runs from the moment the question was opened.
/// * Points come from the configured `ScoringPolicy`.
/// * A second submission for the same question is rejected with 409.
pub async fn submit_answer(
    State(store): State<Arc<dyn QuizStore>>,
    State(policy): State<ScoringPolicy>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let session = load_session(store.as_ref(), session_id).await?;

    let participant =
        load_session_participant(store.as_ref(), session.id, req.participant_id).await?;

    if session.status != SessionStatus::QuestionActive {
        return Err(AppError::Conflict(format!(
            "Session is {}, not accepting answers",
            session.status
        )));
    }

    let quiz = load_quiz(store.as_ref(), session.quiz_id).await?;
    let question = current_question(&session, &quiz.questions).ok_or_else(|| {
        AppError::InternalServerError("Active question index out of range".to_string())
    })?;

    if question.id != req.question_id {
        return Err(AppError::Conflict(
            "Question is not the active question".to_string(),
        ));
    }
    if let Some(option_id) = req.option_id {
        if !question.has_option(option_id) {
            return Err(AppError::BadRequest(
                "Option does not belong to this question".to_string(),
            ));
        }
    }

    let key = question.key().ok_or_else(|| {
        AppError::InternalServerError("Question has no correct option".to_string())
    })?;
    let started_at = session.question_started_at.ok_or_else(|| {
        AppError::InternalServerError("Active question has no start time".to_string())
    })?;

    let elapsed = elapsed_secs(started_at, now);
    let entry = policy.score_answer(
        &key,
        &AnswerSubmission {
            participant_id: participant.id,
            question_id: question.id,
            selected_option_id: req.option_id,
            elapsed_secs: elapsed,
        },
    )?;

    let answer = StudentAnswer {
        id: Uuid::new_v4(),
        session_id: session.id,
        participant_id: participant.id,
        question_id: question.id,
        option_id: req.option_id,
        is_correct: entry.is_correct,
        points: entry.points,
        elapsed_secs: elapsed,
        submitted_at: now,
    };
    store.record_answer(&answer).await?;

    tracing::debug!(
        session_id = %session.id,
        participant_id = %participant.id,
        points = answer.points,
        "Answer recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitAnswerResponse {
            answer_id: answer.id,
            is_correct: answer.is_correct,
            points: answer.points,
            elapsed_secs: answer.elapsed_secs,
        }),
    ))
}

/// Lists one participant's score entries for the session.
/// A participant from another session answers 404.
pub async fn list_participant_answers(
    State(store): State<Arc<dyn QuizStore>>,
    Path((session_id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let session = load_session(store.as_ref(), session_id).await?;
    load_session_participant(store.as_ref(), session.id, participant_id).await?;

    let entries: Vec<ScoreEntry> = store
        .list_answers(session_id)
        .await?
        .iter()
        .filter(|a| a.participant_id == participant_id)
        .map(StudentAnswer::score_entry)
        .collect();

    Ok(Json(entries))
}

async fn load_session_participant(
    store: &dyn QuizStore,
    session_id: Uuid,
    participant_id: Uuid,
) -> Result<Participant, AppError> {
    store
        .get_participant(participant_id)
        .await?
        .filter(|p| p.session_id == session_id)
        .ok_or(AppError::NotFound(
            "Participant not found in this session".to_string(),
        ))
}
