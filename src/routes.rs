// src/routes.rs

use axum::{
    Router,
    http::Method,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{answer, leaderboard, quiz, session},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (quizzes, sessions).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store, config, scoring policy).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes).post(quiz::create_quiz))
        .route(
            "/{id}",
            get(quiz::get_quiz)
                .put(quiz::update_quiz)
                .delete(quiz::delete_quiz),
        )
        .route("/{id}/questions/{question_id}", put(quiz::update_question))
        .route(
            "/{id}/sessions",
            get(session::list_quiz_sessions).post(session::create_session),
        );

    let session_routes = Router::new()
        .route("/join", post(session::join_session))
        .route("/active", get(session::list_active_sessions))
        .route("/{id}", get(session::get_session))
        .route("/{id}/actions", post(session::apply_action))
        .route("/{id}/participants", get(session::list_participants))
        .route(
            "/{id}/participants/{participant_id}/answers",
            get(answer::list_participant_answers),
        )
        .route("/{id}/answers", post(answer::submit_answer))
        .route("/{id}/leaderboard", get(leaderboard::get_leaderboard));

    Router::new()
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/sessions", session_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{config::Config, engine::ScoringPolicy, store::MemoryQuizStore};

    fn app() -> Router {
        create_router(AppState {
            store: Arc::new(MemoryQuizStore::new()),
            config: Config::default(),
            scoring: ScoringPolicy::default(),
        })
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/sessions/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_session_id_is_400() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/sessions/not-a-uuid/leaderboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_actions_require_json_body() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/sessions/{}/actions", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
