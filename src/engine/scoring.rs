// src/engine/scoring.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::error::EngineError;

/// Upper bound for a single answer's points.
pub const MAX_POINTS: u32 = 1000;

pub const DEFAULT_BASE_POINTS: u32 = 1000;
pub const DEFAULT_SPEED_PENALTY_MULTIPLIER: f64 = 0.3;

/// The parts of a question that scoring needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionKey {
    pub question_id: Uuid,
    pub correct_option_id: Uuid,
    pub time_limit_secs: u32,
}

/// One participant's submission for one question.
///
/// `selected_option_id` is `None` when the participant gave no answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerSubmission {
    pub participant_id: Uuid,
    pub question_id: Uuid,
    pub selected_option_id: Option<Uuid>,
    pub elapsed_secs: f64,
}

/// Points awarded for one (participant, question) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub participant_id: Uuid,
    pub question_id: Uuid,
    pub points: u32,
    pub is_correct: bool,
    /// False when the submission carried no selected option.
    pub answered: bool,
}

/// Time-decayed scoring rule.
///
/// A correct answer earns `base_points` when given instantly and loses
/// `base_points * speed_penalty_multiplier` linearly over the time limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringPolicy {
    base_points: u32,
    speed_penalty_multiplier: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            base_points: DEFAULT_BASE_POINTS,
            speed_penalty_multiplier: DEFAULT_SPEED_PENALTY_MULTIPLIER,
        }
    }
}

impl ScoringPolicy {
    pub fn new(base_points: u32, speed_penalty_multiplier: f64) -> Result<Self, EngineError> {
        if base_points == 0 || base_points > MAX_POINTS {
            return Err(EngineError::InvalidConfiguration(format!(
                "base points must be between 1 and {}, got {}",
                MAX_POINTS, base_points
            )));
        }
        if !speed_penalty_multiplier.is_finite() || !(0.0..=1.0).contains(&speed_penalty_multiplier)
        {
            return Err(EngineError::InvalidConfiguration(format!(
                "speed penalty multiplier must be within [0, 1], got {}",
                speed_penalty_multiplier
            )));
        }
        Ok(Self {
            base_points,
            speed_penalty_multiplier,
        })
    }

    pub fn base_points(&self) -> u32 {
        self.base_points
    }

    pub fn speed_penalty_multiplier(&self) -> f64 {
        self.speed_penalty_multiplier
    }

    /// Points for one answer.
    ///
    /// * Incorrect answers score 0 regardless of speed.
    /// * `elapsed_secs` is clamped into `[0, time_limit_secs]` (NaN counts as 0).
    /// * The result is rounded half-up, so equal inputs give equal points.
    pub fn score(
        &self,
        is_correct: bool,
        elapsed_secs: f64,
        time_limit_secs: u32,
    ) -> Result<u32, EngineError> {
        if time_limit_secs == 0 {
            return Err(EngineError::InvalidConfiguration(
                "time limit must be a positive number of seconds".to_string(),
            ));
        }
        if !is_correct {
            return Ok(0);
        }

        let limit = f64::from(time_limit_secs);
        let elapsed = elapsed_secs.max(0.0).min(limit);
        let base = f64::from(self.base_points);
        let penalty_span = base * self.speed_penalty_multiplier;
        let raw = base - (elapsed / limit) * penalty_span;
        let rounded = (raw + 0.5).floor().clamp(0.0, base);

        Ok(rounded as u32)
    }

    /// Scores a submission against the question it answers.
    pub fn score_answer(
        &self,
        question: &QuestionKey,
        submission: &AnswerSubmission,
    ) -> Result<ScoreEntry, EngineError> {
        let is_correct = submission.selected_option_id == Some(question.correct_option_id);
        let points = self.score(is_correct, submission.elapsed_secs, question.time_limit_secs)?;

        Ok(ScoreEntry {
            participant_id: submission.participant_id,
            question_id: question.question_id,
            points,
            is_correct,
            answered: submission.selected_option_id.is_some(),
        })
    }
}

/// Scores one answer with the default 1000-point policy.
pub fn compute_score(
    is_correct: bool,
    elapsed_secs: f64,
    time_limit_secs: u32,
) -> Result<u32, EngineError> {
    ScoringPolicy::default().score(is_correct, elapsed_secs, time_limit_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_points() {
        assert_eq!(compute_score(true, 0.0, 30).unwrap(), 1000);
        assert_eq!(compute_score(true, 30.0, 30).unwrap(), 700);
        assert_eq!(compute_score(true, 15.0, 30).unwrap(), 850);
    }

    #[test]
    fn test_incorrect_scores_zero() {
        for elapsed in [0.0, 3.5, 30.0, 120.0, -4.0] {
            assert_eq!(compute_score(false, elapsed, 30).unwrap(), 0);
        }
    }

    #[test]
    fn test_zero_time_limit_rejected() {
        assert!(matches!(
            compute_score(true, 1.0, 0),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            compute_score(false, 1.0, 0),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_elapsed_is_clamped() {
        assert_eq!(compute_score(true, -5.0, 20).unwrap(), 1000);
        assert_eq!(compute_score(true, 45.0, 20).unwrap(), 700);
        assert_eq!(compute_score(true, f64::INFINITY, 20).unwrap(), 700);
        assert_eq!(compute_score(true, f64::NAN, 20).unwrap(), 1000);
    }

    #[test]
    fn test_rounds_half_up() {
        // 1000 - (1/4) * 300 = 925.0, 1000 - (1/8) * 300 = 962.5
        assert_eq!(compute_score(true, 1.0, 4).unwrap(), 925);
        assert_eq!(compute_score(true, 1.0, 8).unwrap(), 963);
    }

    #[test]
    fn test_bounded_and_monotonic() {
        for limit in [1u32, 7, 10, 30, 60, 600] {
            let mut previous = u32::MAX;
            let steps = 200;
            for step in 0..=steps {
                let elapsed = f64::from(limit) * f64::from(step) / f64::from(steps);
                let points = compute_score(true, elapsed, limit).unwrap();
                assert!((700..=1000).contains(&points), "{} out of range", points);
                assert!(points <= previous);
                previous = points;
            }
        }
    }

    #[test]
    fn test_repeatable() {
        let a = compute_score(true, 12.345, 30).unwrap();
        let b = compute_score(true, 12.345, 30).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_policy_validation() {
        assert!(ScoringPolicy::new(0, 0.3).is_err());
        assert!(ScoringPolicy::new(1001, 0.3).is_err());
        assert!(ScoringPolicy::new(1000, 1.5).is_err());
        assert!(ScoringPolicy::new(1000, -0.1).is_err());
        assert!(ScoringPolicy::new(1000, f64::NAN).is_err());
        assert_eq!(ScoringPolicy::new(1000, 0.3).unwrap(), ScoringPolicy::default());
    }

    #[test]
    fn test_custom_policy() {
        let policy = ScoringPolicy::new(500, 0.5).unwrap();
        assert_eq!(policy.score(true, 0.0, 10).unwrap(), 500);
        assert_eq!(policy.score(true, 10.0, 10).unwrap(), 250);
        assert_eq!(policy.score(false, 0.0, 10).unwrap(), 0);
    }

    #[test]
    fn test_score_answer() {
        let correct = Uuid::new_v4();
        let wrong = Uuid::new_v4();
        let question = QuestionKey {
            question_id: Uuid::new_v4(),
            correct_option_id: correct,
            time_limit_secs: 30,
        };
        let participant_id = Uuid::new_v4();
        let policy = ScoringPolicy::default();

        let hit = policy
            .score_answer(
                &question,
                &AnswerSubmission {
                    participant_id,
                    question_id: question.question_id,
                    selected_option_id: Some(correct),
                    elapsed_secs: 15.0,
                },
            )
            .unwrap();
        assert_eq!(hit.points, 850);
        assert!(hit.is_correct && hit.answered);

        let miss = policy
            .score_answer(
                &question,
                &AnswerSubmission {
                    participant_id,
                    question_id: question.question_id,
                    selected_option_id: Some(wrong),
                    elapsed_secs: 1.0,
                },
            )
            .unwrap();
        assert_eq!(miss.points, 0);
        assert!(!miss.is_correct && miss.answered);

        let skipped = policy
            .score_answer(
                &question,
                &AnswerSubmission {
                    participant_id,
                    question_id: question.question_id,
                    selected_option_id: None,
                    elapsed_secs: 30.0,
                },
            )
            .unwrap();
        assert_eq!(skipped.points, 0);
        assert!(!skipped.is_correct && !skipped.answered);
    }
}
