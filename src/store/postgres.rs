// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    engine::{SessionAction, SessionStatus, transition},
    error::AppError,
    models::{
        answer::StudentAnswer,
        quiz::{Question, QuestionOption, Quiz, QuizSummary},
        session::{ActiveSession, Participant, QuizSession},
    },
    store::{
        QuizStore, duplicate_answer, question_not_found, quiz_has_running_sessions,
        quiz_has_started_sessions, quiz_not_found, session_not_found,
    },
};

const SESSION_COLUMNS: &str = "id, quiz_id, session_code, status, current_question_index, \
     question_started_at, started_at, ended_at, created_at";

const ANSWER_COLUMNS: &str = "id, session_id, participant_id, question_id, option_id, \
     is_correct, points, elapsed_secs, submitted_at";

/// Postgres-backed store.
///
/// Writes that depend on a quiz's sessions lock the quiz row first and the
/// session row second: transitions take the quiz `FOR SHARE` and the session
/// `FOR UPDATE`, question edits and deletes take the quiz `FOR UPDATE`.
#[derive(Clone)]
pub struct PgQuizStore {
    pool: PgPool,
}

impl PgQuizStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct QuizRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct QuizSummaryRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    question_count: i64,
    created_at: DateTime<Utc>,
}

impl From<QuizSummaryRow> for QuizSummary {
    fn from(row: QuizSummaryRow) -> Self {
        QuizSummary {
            id: row.id,
            title: row.title,
            description: row.description,
            question_count: row.question_count.max(0) as usize,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    quiz_id: Uuid,
    question_text: String,
    position: i32,
    time_limit_secs: i32,
}

#[derive(FromRow)]
struct OptionRow {
    id: Uuid,
    question_id: Uuid,
    option_text: String,
    position: i32,
    is_correct: bool,
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    quiz_id: Uuid,
    session_code: String,
    status: String,
    current_question_index: i32,
    question_started_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for QuizSession {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status: SessionStatus = row
            .status
            .parse()
            .map_err(AppError::InternalServerError)?;
        Ok(QuizSession {
            id: row.id,
            quiz_id: row.quiz_id,
            code: row.session_code,
            status,
            current_question_index: row.current_question_index,
            question_started_at: row.question_started_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ActiveSessionRow {
    #[sqlx(flatten)]
    session: SessionRow,
    quiz_title: String,
    participant_count: i64,
}

impl TryFrom<ActiveSessionRow> for ActiveSession {
    type Error = AppError;

    fn try_from(row: ActiveSessionRow) -> Result<Self, Self::Error> {
        Ok(ActiveSession {
            session: row.session.try_into()?,
            quiz_title: row.quiz_title,
            participant_count: row.participant_count.max(0) as usize,
        })
    }
}

#[derive(FromRow)]
struct ParticipantRow {
    id: Uuid,
    session_id: Uuid,
    display_name: String,
    joined_at: DateTime<Utc>,
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Participant {
            id: row.id,
            session_id: row.session_id,
            display_name: row.display_name,
            joined_at: row.joined_at,
        }
    }
}

#[derive(FromRow)]
struct AnswerRow {
    id: Uuid,
    session_id: Uuid,
    participant_id: Uuid,
    question_id: Uuid,
    option_id: Option<Uuid>,
    is_correct: bool,
    points: i32,
    elapsed_secs: f64,
    submitted_at: DateTime<Utc>,
}

impl TryFrom<AnswerRow> for StudentAnswer {
    type Error = AppError;

    fn try_from(row: AnswerRow) -> Result<Self, Self::Error> {
        Ok(StudentAnswer {
            id: row.id,
            session_id: row.session_id,
            participant_id: row.participant_id,
            question_id: row.question_id,
            option_id: row.option_id,
            is_correct: row.is_correct,
            points: non_negative(row.points, "points")?,
            elapsed_secs: row.elapsed_secs,
            submitted_at: row.submitted_at,
        })
    }
}

fn non_negative(value: i32, column: &str) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::InternalServerError(format!("Negative {} in database", column)))
}

fn running_statuses() -> Vec<&'static str> {
    SessionStatus::ALL
        .iter()
        .filter(|s| s.is_running())
        .map(SessionStatus::as_str)
        .collect()
}

async fn insert_options(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    question: &Question,
) -> Result<(), sqlx::Error> {
    for option in &question.options {
        sqlx::query(
            r#"
            INSERT INTO question_options (id, question_id, option_text, position, is_correct)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(option.id)
        .bind(question.id)
        .bind(&option.text)
        .bind(option.position)
        .bind(option.is_correct)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl QuizStore for PgQuizStore {
    async fn save_quiz(&self, quiz: &Quiz) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quizzes (id, title, description, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(quiz.created_at)
        .execute(&mut *tx)
        .await?;

        for question in &quiz.questions {
            sqlx::query(
                r#"
                INSERT INTO questions (id, quiz_id, question_text, position, time_limit_secs)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(question.id)
            .bind(quiz.id)
            .bind(&question.text)
            .bind(question.position)
            .bind(question.time_limit_secs as i32)
            .execute(&mut *tx)
            .await?;

            insert_options(&mut tx, question).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_quiz(&self, quiz_id: Uuid) -> Result<Option<Quiz>, AppError> {
        let Some(quiz) = sqlx::query_as::<_, QuizRow>(
            "SELECT id, title, description, created_at FROM quizzes WHERE id = $1",
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let question_rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, quiz_id, question_text, position, time_limit_secs
            FROM questions
            WHERE quiz_id = $1
            ORDER BY position
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let option_rows = sqlx::query_as::<_, OptionRow>(
            r#"
            SELECT o.id, o.question_id, o.option_text, o.position, o.is_correct
            FROM question_options o
            JOIN questions q ON q.id = o.question_id
            WHERE q.quiz_id = $1
            ORDER BY o.position
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let mut options_by_question: HashMap<Uuid, Vec<QuestionOption>> = HashMap::new();
        for row in option_rows {
            options_by_question
                .entry(row.question_id)
                .or_default()
                .push(QuestionOption {
                    id: row.id,
                    question_id: row.question_id,
                    text: row.option_text,
                    position: row.position,
                    is_correct: row.is_correct,
                });
        }

        let mut questions = Vec::with_capacity(question_rows.len());
        for row in question_rows {
            questions.push(Question {
                id: row.id,
                quiz_id: row.quiz_id,
                text: row.question_text,
                position: row.position,
                time_limit_secs: non_negative(row.time_limit_secs, "time_limit_secs")?,
                options: options_by_question.remove(&row.id).unwrap_or_default(),
            });
        }

        Ok(Some(Quiz {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            questions,
            created_at: quiz.created_at,
        }))
    }

    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, AppError> {
        let rows = sqlx::query_as::<_, QuizSummaryRow>(
            r#"
            SELECT q.id, q.title, q.description, q.created_at, COUNT(qs.id) AS question_count
            FROM quizzes q
            LEFT JOIN questions qs ON qs.quiz_id = q.id
            GROUP BY q.id
            ORDER BY q.created_at DESC, q.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(QuizSummary::from).collect())
    }

    async fn update_quiz_details(&self, quiz: &Quiz) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE quizzes SET title = $2, description = $3 WHERE id = $1")
            .bind(quiz.id)
            .bind(&quiz.title)
            .bind(&quiz.description)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(quiz_not_found());
        }
        Ok(())
    }

    async fn replace_question(&self, question: &Question) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM quizzes WHERE id = $1 FOR UPDATE")
            .bind(question.quiz_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(question_not_found)?;

        let started: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM quiz_sessions WHERE quiz_id = $1 AND status <> $2)",
        )
        .bind(question.quiz_id)
        .bind(SessionStatus::Draft.as_str())
        .fetch_one(&mut *tx)
        .await?;
        if started {
            return Err(quiz_has_started_sessions());
        }

        let result = sqlx::query(
            r#"
            UPDATE questions
            SET question_text = $3, time_limit_secs = $4
            WHERE id = $1 AND quiz_id = $2
            "#,
        )
        .bind(question.id)
        .bind(question.quiz_id)
        .bind(&question.text)
        .bind(question.time_limit_secs as i32)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(question_not_found());
        }

        sqlx::query("DELETE FROM question_options WHERE question_id = $1")
            .bind(question.id)
            .execute(&mut *tx)
            .await?;
        insert_options(&mut tx, question).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_quiz(&self, quiz_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM quizzes WHERE id = $1 FOR UPDATE")
            .bind(quiz_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(quiz_not_found)?;

        let running: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM quiz_sessions WHERE quiz_id = $1 AND status = ANY($2))",
        )
        .bind(quiz_id)
        .bind(running_statuses())
        .fetch_one(&mut *tx)
        .await?;
        if running {
            return Err(quiz_has_running_sessions());
        }

        // Sessions, participants, answers, questions and options cascade.
        sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_session(&self, session: &QuizSession) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO quiz_sessions
                (id, quiz_id, session_code, status, current_question_index, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.id)
        .bind(session.quiz_id)
        .bind(&session.code)
        .bind(session.status.as_str())
        .bind(session.current_question_index)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Session code '{}' already exists", session.code))
            } else {
                tracing::error!("Failed to insert session: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<QuizSession>, AppError> {
        let sql = format!("SELECT {} FROM quiz_sessions WHERE id = $1", SESSION_COLUMNS);
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .map(QuizSession::try_from)
            .transpose()
    }

    async fn find_session_by_code(&self, code: &str) -> Result<Option<QuizSession>, AppError> {
        let sql = format!(
            "SELECT {} FROM quiz_sessions WHERE session_code = $1",
            SESSION_COLUMNS
        );
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(QuizSession::try_from)
            .transpose()
    }

    async fn list_sessions(&self, quiz_id: Uuid) -> Result<Vec<QuizSession>, AppError> {
        let sql = format!(
            "SELECT {} FROM quiz_sessions WHERE quiz_id = $1 ORDER BY created_at DESC, id",
            SESSION_COLUMNS
        );
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(QuizSession::try_from)
            .collect()
    }

    async fn list_active_sessions(&self) -> Result<Vec<ActiveSession>, AppError> {
        sqlx::query_as::<_, ActiveSessionRow>(
            r#"
            SELECT s.id, s.quiz_id, s.session_code, s.status, s.current_question_index,
                   s.question_started_at, s.started_at, s.ended_at, s.created_at,
                   q.title AS quiz_title,
                   COUNT(p.id) AS participant_count
            FROM quiz_sessions s
            JOIN quizzes q ON q.id = s.quiz_id
            LEFT JOIN session_participants p ON p.session_id = s.id
            WHERE s.status = ANY($1)
            GROUP BY s.id, q.title
            ORDER BY s.started_at DESC NULLS LAST, s.id
            "#,
        )
        .bind(running_statuses())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ActiveSession::try_from)
        .collect()
    }

    async fn apply_action(
        &self,
        session_id: Uuid,
        action: SessionAction,
        now: DateTime<Utc>,
    ) -> Result<QuizSession, AppError> {
        let mut tx = self.pool.begin().await?;

        let quiz_id: Uuid = sqlx::query_scalar("SELECT quiz_id FROM quiz_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(session_not_found)?;

        // Quiz before session, matching question edits and deletes.
        sqlx::query("SELECT id FROM quizzes WHERE id = $1 FOR SHARE")
            .bind(quiz_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "Quiz {} of session {} is missing",
                    quiz_id, session_id
                ))
            })?;

        let sql = format!(
            "SELECT {} FROM quiz_sessions WHERE id = $1 FOR UPDATE",
            SESSION_COLUMNS
        );
        let mut session: QuizSession = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(session_not_found)?
            .try_into()?;

        let total_questions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
                .bind(session.quiz_id)
                .fetch_one(&mut *tx)
                .await?;

        // Dropping `tx` on error rolls back and releases the row lock.
        let next = transition(session.state(), action, total_questions.max(0) as usize)?;
        session.apply(next, now);

        sqlx::query(
            r#"
            UPDATE quiz_sessions
            SET status = $2,
                current_question_index = $3,
                question_started_at = $4,
                started_at = $5,
                ended_at = $6
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(session.status.as_str())
        .bind(session.current_question_index)
        .bind(session.question_started_at)
        .bind(session.started_at)
        .bind(session.ended_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(session)
    }

    async fn add_participant(&self, participant: &Participant) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO session_participants (id, session_id, display_name, joined_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(participant.id)
        .bind(participant.session_id)
        .bind(&participant.display_name)
        .bind(participant.joined_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_participant(&self, participant_id: Uuid) -> Result<Option<Participant>, AppError> {
        let row = sqlx::query_as::<_, ParticipantRow>(
            "SELECT id, session_id, display_name, joined_at FROM session_participants WHERE id = $1",
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Participant::from))
    }

    async fn list_participants(&self, session_id: Uuid) -> Result<Vec<Participant>, AppError> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT id, session_id, display_name, joined_at
            FROM session_participants
            WHERE session_id = $1
            ORDER BY joined_at, id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Participant::from).collect())
    }

    async fn record_answer(&self, answer: &StudentAnswer) -> Result<(), AppError> {
        let sql = format!(
            "INSERT INTO student_answers ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            ANSWER_COLUMNS
        );
        sqlx::query(&sql)
            .bind(answer.id)
            .bind(answer.session_id)
            .bind(answer.participant_id)
            .bind(answer.question_id)
            .bind(answer.option_id)
            .bind(answer.is_correct)
            .bind(answer.points as i32)
            .bind(answer.elapsed_secs)
            .bind(answer.submitted_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    duplicate_answer()
                } else {
                    tracing::error!("Failed to record answer: {:?}", e);
                    AppError::from(e)
                }
            })?;
        Ok(())
    }

    async fn list_answers(&self, session_id: Uuid) -> Result<Vec<StudentAnswer>, AppError> {
        let sql = format!(
            "SELECT {} FROM student_answers WHERE session_id = $1 ORDER BY submitted_at, id",
            ANSWER_COLUMNS
        );
        sqlx::query_as::<_, AnswerRow>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(StudentAnswer::try_from)
            .collect()
    }
}
