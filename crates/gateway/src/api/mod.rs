pub mod error;
pub mod health;
pub mod sessions;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Request/response header carrying the session identifier.
pub const SESSION_HEADER: &str = "session";

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/v1/sessions",
            post(sessions::create_session).delete(sessions::cleanup),
        )
        .route("/v1/sessions/logged-in", get(sessions::logged_in))
        .route("/v1/sessions/send", post(sessions::send))
        .route("/v1/sessions/logs", get(sessions::logs))
}

/// The router with state attached and the upload limit applied.  Outer
/// middleware (CORS, compression, tracing) is added by the binary.
pub fn app(state: AppState) -> Router {
    let limit = state.config.server.max_upload_bytes;
    router()
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}
