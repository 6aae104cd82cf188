use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use bytes::Bytes;

use crate::auth::{Argon2Hasher, TOKEN_TYPE};
use crate::server::AppState;
use crate::server::dto::{AuthRequest, JwtRequest, TokenResponse};
use crate::server::response::ApiError;
use crate::types::ORG_LEVEL_COMPANY_ID;

/// `POST /auth`: exchanges the admin login and password for an admin credential.
pub async fn login(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let request: AuthRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::unauthorized("Invalid credentials"))?;
    let Some(admin) = &state.admin else {
        return Err(ApiError::unauthorized("Invalid credentials"));
    };
    if request.login != admin.login {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let hash = admin.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || {
        Argon2Hasher::new()?.verify(&request.password, &hash)
    })
    .await
    .map_err(|_| ApiError::internal("Internal server error"))??;

    if !verified {
        tracing::warn!("Rejected admin login attempt");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let access_token = state
        .tokens
        .issue(&admin.login, ORG_LEVEL_COMPANY_ID, true)?;

    Ok::<_, ApiError>(Json(TokenResponse {
        access_token,
        token_type: TOKEN_TYPE,
        org: admin.login.clone(),
    }))
}

/// `POST /jwt`: issues a tenant credential for `{org}`.
pub async fn issue_jwt(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let request: JwtRequest = if body.iter().all(u8::is_ascii_whitespace) {
        JwtRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Malformed body"))?
    };

    let org = match request.org.filter(|o| !o.is_empty()) {
        Some(org) => org,
        None if !state.with_auth => state
            .admin
            .as_ref()
            .map(|a| a.login.clone())
            .ok_or_else(|| ApiError::unauthorized("org is required"))?,
        None => return Err(ApiError::unauthorized("org is required")),
    };

    let access_token = state.tokens.issue(&org, ORG_LEVEL_COMPANY_ID, false)?;
    tracing::info!(org = %org, "Issued tenant credential");

    Ok::<_, ApiError>(Json(TokenResponse {
        access_token,
        token_type: TOKEN_TYPE,
        org,
    }))
}
