use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{DeviceParams, ScopeParams};
use crate::server::response::{ApiError, SuccessResponse};
use crate::tracking::devices;

pub async fn list_devices(
    RequireAuth(claims): RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeviceParams>,
) -> impl IntoResponse {
    let found = devices::list_devices(state.store.as_ref(), &claims, params.into_filter())?;
    Ok::<_, ApiError>(Json(found))
}

pub async fn delete_device(
    RequireAuth(claims): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ScopeParams>,
) -> impl IntoResponse {
    devices::delete_device(state.store.as_ref(), &claims, &params.into_scope(), &id)?;
    Ok::<_, ApiError>(Json(SuccessResponse::ok()))
}

pub async fn list_company_tokens(
    RequireAuth(claims): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let orgs = devices::list_orgs(state.store.as_ref(), &claims)?;
    Ok::<_, ApiError>(Json(orgs))
}
