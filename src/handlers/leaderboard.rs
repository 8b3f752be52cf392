// src/handlers/leaderboard.rs

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    engine::{ParticipantEntries, ScoreEntry, build_leaderboard},
    error::AppError,
    handlers::{quiz::load_quiz, session::load_session},
    store::QuizStore,
};

/// Ranked leaderboard for a session.
///
/// Every participant appears, including those who have not answered yet.
pub async fn get_leaderboard(
    State(store): State<Arc<dyn QuizStore>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = load_session(store.as_ref(), session_id).await?;
    let quiz = load_quiz(store.as_ref(), session.quiz_id).await?;

    let participants = store.list_participants(session_id).await?;
    let answers = store.list_answers(session_id).await?;

    let mut entries_by_participant: HashMap<Uuid, Vec<ScoreEntry>> = HashMap::new();
    for answer in &answers {
        entries_by_participant
            .entry(answer.participant_id)
            .or_default()
            .push(answer.score_entry());
    }

    let rows = build_leaderboard(participants.into_iter().map(|p| ParticipantEntries {
        entries: entries_by_participant.remove(&p.id).unwrap_or_default(),
        participant_id: p.id,
        display_name: p.display_name,
    }));

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "status": session.status,
        "total_questions": quiz.questions.len(),
        "rows": rows,
    })))
}
