mod handlers;

use std::sync::Arc;

use axum::{Router, routing::post};

use crate::server::AppState;

pub fn session_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth", post(handlers::login))
        .route("/jwt", post(handlers::issue_jwt))
}
