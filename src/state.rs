// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, engine::ScoringPolicy, store::QuizStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QuizStore>,
    pub config: Config,
    pub scoring: ScoringPolicy,
}

impl FromRef<AppState> for Arc<dyn QuizStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ScoringPolicy {
    fn from_ref(state: &AppState) -> Self {
        state.scoring
    }
}
