use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::response::ApiError;
use crate::tracking::query;

pub async fn get_stats(
    RequireAdmin(claims): RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let stats = query::get_stats(state.store.as_ref(), &claims)?;
    Ok::<_, ApiError>(Json(stats))
}
