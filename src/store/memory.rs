// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    engine::{SessionAction, SessionStatus, transition},
    error::AppError,
    models::{
        answer::StudentAnswer,
        quiz::{Question, Quiz, QuizSummary},
        session::{ActiveSession, Participant, QuizSession},
    },
    store::{
        QuizStore, duplicate_answer, question_not_found, quiz_has_running_sessions,
        quiz_has_started_sessions, quiz_not_found, session_not_found,
    },
};

#[derive(Default)]
struct Tables {
    quizzes: HashMap<Uuid, Quiz>,
    sessions: HashMap<Uuid, QuizSession>,
    participants: HashMap<Uuid, Participant>,
    // Insertion order is kept so listings are reproducible.
    answers: Vec<StudentAnswer>,
}

/// Process-local store used when no database is configured.
/// Every write takes the single write lock, which serializes transitions.
#[derive(Default)]
pub struct MemoryQuizStore {
    tables: RwLock<Tables>,
}

impl MemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizStore for MemoryQuizStore {
    async fn save_quiz(&self, quiz: &Quiz) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.quizzes.insert(quiz.id, quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, quiz_id: Uuid) -> Result<Option<Quiz>, AppError> {
        Ok(self.tables.read().await.quizzes.get(&quiz_id).cloned())
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, AppError> {
        let tables = self.tables.read().await;
        let mut quizzes: Vec<QuizSummary> =
            tables.quizzes.values().map(QuizSummary::from).collect();
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(quizzes)
    }

    async fn update_quiz_details(&self, quiz: &Quiz) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let stored = tables.quizzes.get_mut(&quiz.id).ok_or_else(quiz_not_found)?;
        stored.title = quiz.title.clone();
        stored.description = quiz.description.clone();
        Ok(())
    }

    async fn replace_question(&self, question: &Question) -> Result<(), AppError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let started = tables
            .sessions
            .values()
            .any(|s| s.quiz_id == question.quiz_id && s.status != SessionStatus::Draft);

        let slot = tables
            .quizzes
            .get_mut(&question.quiz_id)
            .and_then(|quiz| quiz.questions.iter_mut().find(|q| q.id == question.id))
            .ok_or_else(question_not_found)?;
        if started {
            return Err(quiz_has_started_sessions());
        }

        *slot = question.clone();
        Ok(())
    }

    async fn delete_quiz(&self, quiz_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if !tables.quizzes.contains_key(&quiz_id) {
            return Err(quiz_not_found());
        }

        let session_ids: Vec<Uuid> = tables
            .sessions
            .values()
            .filter(|s| s.quiz_id == quiz_id)
            .map(|s| s.id)
            .collect();
        if session_ids
            .iter()
            .any(|id| tables.sessions[id].status.is_running())
        {
            return Err(quiz_has_running_sessions());
        }

        tables.quizzes.remove(&quiz_id);
        tables.sessions.retain(|_, s| s.quiz_id != quiz_id);
        tables
            .participants
            .retain(|_, p| !session_ids.contains(&p.session_id));
        tables
            .answers
            .retain(|a| !session_ids.contains(&a.session_id));
        Ok(())
    }

    async fn insert_session(&self, session: &QuizSession) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.sessions.values().any(|s| s.code == session.code) {
            return Err(AppError::Conflict(format!(
                "Session code '{}' already exists",
                session.code
            )));
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<QuizSession>, AppError> {
        Ok(self.tables.read().await.sessions.get(&session_id).cloned())
    }

    async fn find_session_by_code(&self, code: &str) -> Result<Option<QuizSession>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .values()
            .find(|s| s.code == code)
            .cloned())
    }

    async fn list_sessions(&self, quiz_id: Uuid) -> Result<Vec<QuizSession>, AppError> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<QuizSession> = tables
            .sessions
            .values()
            .filter(|s| s.quiz_id == quiz_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn list_active_sessions(&self) -> Result<Vec<ActiveSession>, AppError> {
        let tables = self.tables.read().await;
        let mut active: Vec<ActiveSession> = tables
            .sessions
            .values()
            .filter(|s| s.status.is_running())
            .map(|s| ActiveSession {
                session: s.clone(),
                quiz_title: tables
                    .quizzes
                    .get(&s.quiz_id)
                    .map(|q| q.title.clone())
                    .unwrap_or_default(),
                participant_count: tables
                    .participants
                    .values()
                    .filter(|p| p.session_id == s.id)
                    .count(),
            })
            .collect();
        active.sort_by(|a, b| {
            b.session
                .started_at
                .cmp(&a.session.started_at)
                .then(a.session.id.cmp(&b.session.id))
        });
        Ok(active)
    }

    async fn apply_action(
        &self,
        session_id: Uuid,
        action: SessionAction,
        now: DateTime<Utc>,
    ) -> Result<QuizSession, AppError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or_else(session_not_found)?;
        let total_questions = tables
            .quizzes
            .get(&session.quiz_id)
            .map(|q| q.questions.len())
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "Quiz {} of session {} is missing",
                    session.quiz_id, session_id
                ))
            })?;

        let next = transition(session.state(), action, total_questions)?;
        session.apply(next, now);

        Ok(session.clone())
    }

    async fn add_participant(&self, participant: &Participant) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables
            .participants
            .insert(participant.id, participant.clone());
        Ok(())
    }

    async fn get_participant(&self, participant_id: Uuid) -> Result<Option<Participant>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .participants
            .get(&participant_id)
            .cloned())
    }

    async fn list_participants(&self, session_id: Uuid) -> Result<Vec<Participant>, AppError> {
        let tables = self.tables.read().await;
        let mut participants: Vec<Participant> = tables
            .participants
            .values()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect();
        participants.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        Ok(participants)
    }

    async fn record_answer(&self, answer: &StudentAnswer) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.answers.iter().any(|a| {
            a.participant_id == answer.participant_id && a.question_id == answer.question_id
        });
        if duplicate {
            return Err(duplicate_answer());
        }
        tables.answers.push(answer.clone());
        Ok(())
    }

    async fn list_answers(&self, session_id: Uuid) -> Result<Vec<StudentAnswer>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .answers
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{CreateOptionRequest, CreateQuestionRequest, CreateQuizRequest};

    fn sample_quiz(questions: usize) -> Quiz {
        let req = CreateQuizRequest {
            title: "Sample".to_string(),
            description: None,
            questions: (0..questions)
                .map(|i| CreateQuestionRequest {
                    text: format!("Question number {}", i),
                    time_limit_secs: Some(20),
                    options: vec![
                        CreateOptionRequest {
                            text: "yes".to_string(),
                            is_correct: true,
                        },
                        CreateOptionRequest {
                            text: "no".to_string(),
                            is_correct: false,
                        },
                    ],
                })
                .collect(),
        };
        Quiz::from_request(req, 30)
    }

    #[tokio::test]
    async fn test_apply_action_persists_transitions() {
        let store = MemoryQuizStore::new();
        let quiz = sample_quiz(1);
        store.save_quiz(&quiz).await.unwrap();
        let session = QuizSession::new(quiz.id, "11111".to_string(), Utc::now());
        store.insert_session(&session).await.unwrap();

        for action in [
            SessionAction::Start,
            SessionAction::Advance,
            SessionAction::Close,
            SessionAction::Advance,
        ] {
            store
                .apply_action(session.id, action, Utc::now())
                .await
                .unwrap();
        }

        let stored = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);

        let err = store
            .apply_action(session.id, SessionAction::Advance, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let unchanged = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(unchanged.state(), stored.state());
    }

    async fn seeded(questions: usize) -> (MemoryQuizStore, Quiz, QuizSession) {
        let store = MemoryQuizStore::new();
        let quiz = sample_quiz(questions);
        store.save_quiz(&quiz).await.unwrap();
        let session = QuizSession::new(quiz.id, "44444".to_string(), Utc::now());
        store.insert_session(&session).await.unwrap();
        (store, quiz, session)
    }

    fn edited(question: &Question) -> Question {
        Question {
            text: "Edited question text".to_string(),
            time_limit_secs: 45,
            ..question.clone()
        }
    }

    #[tokio::test]
    async fn test_replace_question_while_draft() {
        let (store, quiz, _) = seeded(2).await;
        store.replace_question(&edited(&quiz.questions[1])).await.unwrap();

        let stored = store.get_quiz(quiz.id).await.unwrap().unwrap();
        assert_eq!(stored.questions[1].text, "Edited question text");
        assert_eq!(stored.questions[1].time_limit_secs, 45);
        assert_eq!(stored.questions[0].text, quiz.questions[0].text);
    }

    #[tokio::test]
    async fn test_replace_question_rejected_once_started() {
        let (store, quiz, session) = seeded(1).await;
        store
            .apply_action(session.id, SessionAction::Start, Utc::now())
            .await
            .unwrap();

        let err = store
            .replace_question(&edited(&quiz.questions[0]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Still rejected after the session completes: answers reference the question.
        store
            .apply_action(session.id, SessionAction::End, Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            store.replace_question(&edited(&quiz.questions[0])).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_unknown_question_is_not_found() {
        let (store, quiz, _) = seeded(1).await;
        let stranger = Question {
            id: Uuid::new_v4(),
            ..quiz.questions[0].clone()
        };
        assert!(matches!(
            store.replace_question(&stranger).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_quiz_blocked_while_running_then_cascades() {
        let (store, quiz, session) = seeded(1).await;
        let participant = Participant {
            id: Uuid::new_v4(),
            session_id: session.id,
            display_name: "Ada".to_string(),
            joined_at: Utc::now(),
        };
        store.add_participant(&participant).await.unwrap();
        store
            .apply_action(session.id, SessionAction::Start, Utc::now())
            .await
            .unwrap();

        assert!(matches!(
            store.delete_quiz(quiz.id).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(store.list_active_sessions().await.unwrap().len(), 1);

        store
            .apply_action(session.id, SessionAction::End, Utc::now())
            .await
            .unwrap();
        store.delete_quiz(quiz.id).await.unwrap();

        assert!(store.get_quiz(quiz.id).await.unwrap().is_none());
        assert!(store.get_session(session.id).await.unwrap().is_none());
        assert!(store.get_participant(participant.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete_quiz(quiz.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listings() {
        let (store, quiz, first) = seeded(2).await;
        let second = QuizSession::new(
            quiz.id,
            "55555".to_string(),
            first.created_at + chrono::Duration::seconds(1),
        );
        store.insert_session(&second).await.unwrap();

        let summaries = store.list_quizzes().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].question_count, 2);

        let sessions = store.list_sessions(quiz.id).await.unwrap();
        assert_eq!(
            sessions.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert!(store.list_sessions(Uuid::new_v4()).await.unwrap().is_empty());

        assert!(store.list_active_sessions().await.unwrap().is_empty());
        store
            .apply_action(first.id, SessionAction::Start, Utc::now())
            .await
            .unwrap();
        let active = store.list_active_sessions().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session.id, first.id);
        assert_eq!(active[0].quiz_title, "Sample");
        assert_eq!(active[0].participant_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let store = MemoryQuizStore::new();
        let first = QuizSession::new(Uuid::new_v4(), "22222".to_string(), Utc::now());
        let second = QuizSession::new(Uuid::new_v4(), "22222".to_string(), Utc::now());
        store.insert_session(&first).await.unwrap();
        assert!(matches!(
            store.insert_session(&second).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_answer_rejected() {
        let store = MemoryQuizStore::new();
        let answer = StudentAnswer {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            participant_id: Uuid::new_v4(),
            question_id: Uuid::new_v4(),
            option_id: None,
            is_correct: false,
            points: 0,
            elapsed_secs: 2.0,
            submitted_at: Utc::now(),
        };
        store.record_answer(&answer).await.unwrap();

        let again = StudentAnswer {
            id: Uuid::new_v4(),
            ..answer.clone()
        };
        assert!(matches!(
            store.record_answer(&again).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(store.list_answers(answer.session_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_session_without_quiz_is_internal_error() {
        let store = MemoryQuizStore::new();
        let orphan = QuizSession::new(Uuid::new_v4(), "33333".to_string(), Utc::now());
        store.insert_session(&orphan).await.unwrap();

        let err = store
            .apply_action(orphan.id, SessionAction::Start, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InternalServerError(_)));
        let stored = store.get_session(orphan.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Draft);
    }

    #[tokio::test]
    async fn test_missing_session_is_not_found() {
        let store = MemoryQuizStore::new();
        let err = store
            .apply_action(Uuid::new_v4(), SessionAction::Start, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
