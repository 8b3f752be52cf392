// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::{
    engine::{
        EngineError, ScoringPolicy,
        scoring::{DEFAULT_BASE_POINTS, DEFAULT_SPEED_PENALTY_MULTIPLIER},
    },
    utils::session_code::MAX_SESSION_CODE_LENGTH,
};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_QUESTION_TIME_SECS: u32 = 30;
pub const SESSION_CODE_LENGTH: usize = 5;
pub const POLL_INTERVAL_SECS: u64 = 3;
pub const MAX_QUESTION_TIME_SECS: u32 = 600;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,
    pub rust_log: String,
    pub port: u16,
    pub base_points: u32,
    pub speed_penalty_multiplier: f64,
    pub default_question_time_secs: u32,
    pub session_code_length: usize,
    /// Refresh hint handed to polling clients.
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            rust_log: "info".to_string(),
            port: DEFAULT_PORT,
            base_points: DEFAULT_BASE_POINTS,
            speed_penalty_multiplier: DEFAULT_SPEED_PENALTY_MULTIPLIER,
            default_question_time_secs: DEFAULT_QUESTION_TIME_SECS,
            session_code_length: SESSION_CODE_LENGTH,
            poll_interval_secs: POLL_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Reads the environment (and `.env`).
    ///
    /// Malformed values fall back to their defaults. The fallbacks are
    /// returned as messages so they can be logged once tracing is up.
    pub fn from_env() -> (Self, Vec<String>) {
        dotenv().ok();

        let defaults = Self::default();
        let mut warnings = Vec::new();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let rust_log = env::var("RUST_LOG").unwrap_or(defaults.rust_log);

        let config = Self {
            database_url,
            rust_log,
            port: env_or("PORT", defaults.port, &mut warnings),
            base_points: env_or("BASE_POINTS", defaults.base_points, &mut warnings),
            speed_penalty_multiplier: env_or(
                "SPEED_PENALTY_MULTIPLIER",
                defaults.speed_penalty_multiplier,
                &mut warnings,
            ),
            default_question_time_secs: env_or(
                "DEFAULT_QUESTION_TIME",
                defaults.default_question_time_secs,
                &mut warnings,
            ),
            session_code_length: env_or(
                "SESSION_CODE_LENGTH",
                defaults.session_code_length,
                &mut warnings,
            ),
            poll_interval_secs: env_or(
                "POLL_INTERVAL_SECS",
                defaults.poll_interval_secs,
                &mut warnings,
            ),
        };

        (config, warnings)
    }

    /// Checks the bounded settings and builds the scoring rule.
    ///
    /// * `SESSION_CODE_LENGTH` must be 1..=10 so every generated code can be joined.
    /// * `DEFAULT_QUESTION_TIME` must be 1..=600, the range authored questions accept.
    pub fn validate(&self) -> Result<ScoringPolicy, EngineError> {
        if !(1..=MAX_SESSION_CODE_LENGTH).contains(&self.session_code_length) {
            return Err(EngineError::InvalidConfiguration(format!(
                "session code length must be between 1 and {}, got {}",
                MAX_SESSION_CODE_LENGTH, self.session_code_length
            )));
        }
        if !(1..=MAX_QUESTION_TIME_SECS).contains(&self.default_question_time_secs) {
            return Err(EngineError::InvalidConfiguration(format!(
                "default question time must be between 1 and {} seconds, got {}",
                MAX_QUESTION_TIME_SECS, self.default_question_time_secs
            )));
        }
        self.scoring_policy()
    }

    /// Builds the scoring rule from the configured points and penalty.
    pub fn scoring_policy(&self) -> Result<ScoringPolicy, EngineError> {
        ScoringPolicy::new(self.base_points, self.speed_penalty_multiplier)
    }
}

/// Reads and parses an env var, falling back when it is missing or malformed.
fn env_or<T: FromStr>(key: &str, default: T, warnings: &mut Vec<String>) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warnings.push(format!("Ignoring unparseable {}={:?}, using default", key, raw));
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        let config = Config::default();
        assert_eq!(config.scoring_policy().unwrap(), ScoringPolicy::default());
    }

    #[test]
    fn test_invalid_policy_is_reported() {
        let config = Config {
            base_points: 5000,
            ..Config::default()
        };
        assert!(matches!(
            config.scoring_policy(),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_env_or_falls_back() {
        // Keys are unique to this test to avoid racing other tests on the environment.
        let mut warnings = Vec::new();
        assert_eq!(env_or("QUIZ_ARENA_TEST_MISSING_KEY", 42u32, &mut warnings), 42);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_env_or_reports_unparseable_values() {
        // SAFETY: the key is only touched by this test.
        unsafe { env::set_var("QUIZ_ARENA_TEST_BAD_PORT", "eighty") };
        let mut warnings = Vec::new();
        assert_eq!(env_or("QUIZ_ARENA_TEST_BAD_PORT", 3000u16, &mut warnings), 3000);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("QUIZ_ARENA_TEST_BAD_PORT"));
    }

    #[test]
    fn test_validate_session_code_length() {
        for length in [1, SESSION_CODE_LENGTH, MAX_SESSION_CODE_LENGTH] {
            let config = Config {
                session_code_length: length,
                ..Config::default()
            };
            assert!(config.validate().is_ok(), "length {} should be accepted", length);
        }
        for length in [0, MAX_SESSION_CODE_LENGTH + 1, 12] {
            let config = Config {
                session_code_length: length,
                ..Config::default()
            };
            assert!(matches!(
                config.validate(),
                Err(EngineError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_validate_default_question_time() {
        let config = Config {
            default_question_time_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            default_question_time_secs: MAX_QUESTION_TIME_SECS + 1,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_includes_scoring_policy() {
        let config = Config {
            speed_penalty_multiplier: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(Config::default().validate().unwrap(), ScoringPolicy::default());
    }
}
