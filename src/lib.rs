use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod state;
pub mod store;

pub use state::AppState;

/// Build the HTTP router. Paths keep the inherited contract's trailing
/// slashes.
pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/quests/", get(handlers::quests::list_quests))
        // Bearer-token endpoints (GET /comments/ stays public)
        .route("/profile/", get(handlers::profile::get_profile))
        .route("/book/", post(handlers::bookings::book_quest))
        .route("/rate/", post(handlers::ratings::rate_quest))
        .route(
            "/comments/",
            get(handlers::comments::list_comments).post(handlers::comments::post_comment),
        )
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "Quest API (Rust)",
        "version": version,
        "description": "Quest booking backend built with Rust (Axum)",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "profile": "GET /profile/ (bearer)",
            "quests": "GET /quests/?difficulty= (public)",
            "book": "POST /book/ (bearer)",
            "rate": "POST /rate/ (bearer)",
            "comments": "GET /comments/?quest_id= (public), POST /comments/ (bearer)",
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok",
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "timestamp": now,
                "database_error": e.to_string(),
            })),
        ),
    }
}
