// src/handlers/session.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    engine::SessionStatus,
    error::AppError,
    handlers::quiz::load_quiz,
    models::{
        quiz::{PublicQuestion, Question},
        session::{
            JoinSessionRequest, JoinSessionResponse, Participant, QuizSession,
            SessionActionRequest, SessionListQuery, SessionView,
        },
    },
    store::QuizStore,
    utils::session_code::{MAX_CODE_ATTEMPTS, generate_session_code},
};

/// Opens a new DRAFT session for a quiz.
///
/// * Picks a random numeric join code, retrying on collisions.
/// * Returns 201 Created and the session.
pub async fn create_session(
    State(store): State<Arc<dyn QuizStore>>,
    State(config): State<Config>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(store.as_ref(), quiz_id).await?;
    if quiz.questions.is_empty() {
        return Err(AppError::BadRequest("Quiz has no questions".to_string()));
    }

    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_session_code(config.session_code_length);
        let session = QuizSession::new(quiz.id, code, Utc::now());

        match store.insert_session(&session).await {
            Ok(()) => {
                tracing::info!(session_id = %session.id, code = %session.code, "Session created");
                return Ok((StatusCode::CREATED, Json(session)));
            }
            Err(AppError::Conflict(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(AppError::InternalServerError(format!(
        "Could not generate unique session code after {} attempts",
        MAX_CODE_ATTEMPTS
    )))
}

/// Lists a quiz's sessions, newest first, optionally filtered by `?status=`.
pub async fn list_quiz_sessions(
    State(store): State<Arc<dyn QuizStore>>,
    Path(quiz_id): Path<Uuid>,
    Query(query): Query<SessionListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(store.as_ref(), quiz_id).await?;
    let sessions: Vec<QuizSession> = store
        .list_sessions(quiz.id)
        .await?
        .into_iter()
        .filter(|s| query.status.is_none_or(|status| s.status == status))
        .collect();
    Ok(Json(sessions))
}

/// Dashboard of running sessions with quiz titles and participant counts.
pub async fn list_active_sessions(
    State(store): State<Arc<dyn QuizStore>>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = store.list_active_sessions().await?;
    Ok(Json(sessions))
}

/// Joins a session by its code.
/// Completed sessions no longer accept participants.
pub async fn join_session(
    State(store): State<Arc<dyn QuizStore>>,
    Json(payload): Json<JoinSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let session = store
        .find_session_by_code(payload.code.trim())
        .await?
        .ok_or(AppError::NotFound("Invalid session code".to_string()))?;

    if session.status == SessionStatus::Completed {
        return Err(AppError::Conflict("This session has ended".to_string()));
    }

    let participant = Participant {
        id: Uuid::new_v4(),
        session_id: session.id,
        display_name: payload.display_name.trim().to_string(),
        joined_at: Utc::now(),
    };
    store.add_participant(&participant).await?;

    tracing::info!(
        session_id = %session.id,
        participant_id = %participant.id,
        "Participant joined"
    );

    Ok((
        StatusCode::CREATED,
        Json(JoinSessionResponse {
            participant,
            session,
        }),
    ))
}

/// Polling endpoint for instructors and participants.
///
/// Returns the session state, the question on screen without its answer,
/// and the seconds left while the question is active.
pub async fn get_session(
    State(store): State<Arc<dyn QuizStore>>,
    State(config): State<Config>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = load_session(store.as_ref(), session_id).await?;
    let quiz = load_quiz(store.as_ref(), session.quiz_id).await?;
    let participant_count = store.list_participants(session_id).await?.len();

    let on_screen = matches!(
        session.status,
        SessionStatus::QuestionActive | SessionStatus::QuestionClosed
    );
    let question = if on_screen {
        current_question(&session, &quiz.questions)
    } else {
        None
    };

    let seconds_remaining = match (session.status, question, session.question_started_at) {
        (SessionStatus::QuestionActive, Some(q), Some(started_at)) => {
            Some(seconds_remaining(q.time_limit_secs, started_at, Utc::now()))
        }
        _ => None,
    };

    Ok(Json(SessionView {
        total_questions: quiz.questions.len(),
        participant_count,
        current_question: question.map(PublicQuestion::from),
        seconds_remaining,
        poll_after_secs: config.poll_interval_secs,
        session,
    }))
}

/// Applies an instructor action (start, advance, close, end).
///
/// An action that does not fit the current status answers 409 Conflict and
/// leaves the session unchanged.
pub async fn apply_action(
    State(store): State<Arc<dyn QuizStore>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SessionActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = store
        .apply_action(session_id, payload.action, Utc::now())
        .await?;

    tracing::info!(
        session_id = %session.id,
        action = %payload.action,
        status = %session.status,
        question_index = session.current_question_index,
        "Session transition applied"
    );

    Ok(Json(session))
}

/// Lists the participants of a session in join order.
pub async fn list_participants(
    State(store): State<Arc<dyn QuizStore>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    load_session(store.as_ref(), session_id).await?;
    let participants = store.list_participants(session_id).await?;
    Ok(Json(participants))
}

pub(crate) async fn load_session(
    store: &dyn QuizStore,
    session_id: Uuid,
) -> Result<QuizSession, AppError> {
    store
        .get_session(session_id)
        .await?
        .ok_or(AppError::NotFound("Session not found".to_string()))
}

pub(crate) fn current_question<'a>(
    session: &QuizSession,
    questions: &'a [Question],
) -> Option<&'a Question> {
    session.current_question().and_then(|idx| questions.get(idx))
}

/// Seconds since `started_at`, with millisecond precision.
pub(crate) fn elapsed_secs(started_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - started_at).num_milliseconds() as f64 / 1000.0
}

fn seconds_remaining(time_limit_secs: u32, started_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let left = f64::from(time_limit_secs) - elapsed_secs(started_at, now);
    left.ceil().clamp(0.0, f64::from(time_limit_secs)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_elapsed_secs() {
        let start = Utc::now();
        assert_eq!(elapsed_secs(start, start + Duration::milliseconds(2500)), 2.5);
        assert_eq!(elapsed_secs(start, start - Duration::seconds(1)), -1.0);
    }

    #[test]
    fn test_seconds_remaining() {
        let start = Utc::now();
        assert_eq!(seconds_remaining(30, start, start), 30);
        assert_eq!(
            seconds_remaining(30, start, start + Duration::milliseconds(10_200)),
            20
        );
        assert_eq!(seconds_remaining(30, start, start + Duration::seconds(45)), 0);
    }
}
