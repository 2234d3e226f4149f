pub mod calls;
pub mod dev;
pub mod health;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/calls", get(calls::list_calls).post(calls::start_call))
        .route(
            "/api/calls/active",
            get(calls::active_call).delete(calls::hang_up),
        )
        .route("/api/dev/transcript", post(dev::send_transcript))
        .with_state(state)
}
