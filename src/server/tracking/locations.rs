use std::sync::Arc;

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::auth::{OptionalAuth, RequireAuth};
use crate::crypto::is_encrypted;
use crate::error::{Error, Result};
use crate::server::AppState;
use crate::server::dto::{LatestParams, LocationParams, ScopeParams};
use crate::server::response::{ApiError, DeletedResponse, SuccessResponse};
use crate::tracking::{IngestBody, ingest, query};

pub async fn create_location(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
    headers: HeaderMap,
    body: Body,
) -> Response {
    ingest_request(&state, None, auth, &headers, body).await
}

pub async fn create_location_for_org(
    State(state): State<Arc<AppState>>,
    Path(company_token): Path<String>,
    auth: OptionalAuth,
    headers: HeaderMap,
    body: Body,
) -> Response {
    ingest_request(&state, Some(&company_token), auth, &headers, body).await
}

/// Accepts and discards template submissions, asking the client to back off.
pub async fn locations_template() -> impl IntoResponse {
    (
        [(RETRY_AFTER, HeaderValue::from_static("5"))],
        Json(SuccessResponse::ok()),
    )
}

pub async fn list_locations(
    RequireAuth(claims): RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LocationParams>,
) -> impl IntoResponse {
    let filter = params.into_filter()?;
    let locations = query::get_locations(state.store.as_ref(), &claims, filter)?;
    Ok::<_, ApiError>(Json(locations))
}

pub async fn latest_location(
    RequireAuth(claims): RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LatestParams>,
) -> impl IntoResponse {
    let device_id = params
        .device_id
        .ok_or_else(|| ApiError::bad_request("user_id or device_id is required"))?;
    let scope = ScopeParams {
        company_id: params.company_id,
        org: params.org,
    }
    .into_scope();

    let latest = query::get_latest_location(state.store.as_ref(), &claims, &scope, &device_id)?;
    Ok::<_, ApiError>(Json(latest))
}

pub async fn delete_locations(
    RequireAuth(claims): RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LocationParams>,
) -> impl IntoResponse {
    let filter = params.into_filter()?;
    let deleted = query::delete_locations(state.store.as_ref(), &claims, filter)?;
    Ok::<_, ApiError>(Json(DeletedResponse {
        success: true,
        deleted,
    }))
}

/// Largest ingestion body read into memory.
pub const MAX_INGEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared write path of both ingestion routes.
///
/// The abuse guard runs first, before the credential is verified, so a flagged
/// org is throttled whether or not its credential is genuine. Orgs named by
/// the route or the bearer credential are checked before the body is read at
/// all, so neither size nor content of the body changes their response.
async fn ingest_request(
    state: &AppState,
    path_token: Option<&str>,
    auth: OptionalAuth,
    headers: &HeaderMap,
    body: Body,
) -> Response {
    if let Some(org) = state
        .guard
        .first_flagged([path_token, auth.claimed_org.as_deref()])
    {
        tracing::warn!(org, "Tarpitting submission from flagged org");
        return state.guard.punitive_response();
    }

    let body = match to_bytes(body, MAX_INGEST_BODY_BYTES).await {
        Ok(body) => body,
        Err(_) => return ApiError::payload_too_large("Request body too large").into_response(),
    };
    let decoded = decode_body(state, headers, &body);

    let body_token = decoded
        .as_ref()
        .ok()
        .and_then(|v| v.get("company_token"))
        .and_then(Value::as_str);
    if let Some(org) = state.guard.first_flagged([body_token]) {
        tracing::warn!(org, "Tarpitting submission from flagged org");
        return state.guard.punitive_response();
    }

    let claims = match auth.into_claims() {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    let result = decoded.and_then(|value| {
        if state.log_payloads {
            tracing::debug!(payload = %value, "Location payload");
        }
        let body = IngestBody::from_value(value)?;
        ingest::create(
            state.store.as_ref(),
            &state.retention,
            body,
            path_token,
            claims.as_ref(),
        )
    });

    match result {
        Ok(outcome) => {
            tracing::debug!(
                org = %outcome.company_token,
                device_id = %outcome.device_id,
                received = outcome.received,
                inserted = outcome.inserted,
                evicted = outcome.evicted,
                "Stored locations"
            );
            Json(SuccessResponse::ok()).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn decode_body(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Value> {
    if is_encrypted(headers) {
        let cipher = state
            .cipher
            .as_ref()
            .ok_or_else(|| Error::Decrypt("encrypted submissions are not enabled".to_string()))?;
        let plaintext = cipher.decrypt(body)?;
        return serde_json::from_slice(&plaintext)
            .map_err(|e| Error::Decrypt(format!("decrypted body is not JSON: {e}")));
    }

    serde_json::from_slice(body).map_err(|e| Error::validation(format!("malformed body: {e}")))
}
