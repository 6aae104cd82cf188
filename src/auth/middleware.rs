use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{TokenExtractionError, extract_bearer_token};
use crate::server::AppState;
use crate::types::Claims;

/// Extractor that requires a valid bearer credential.
pub struct RequireAuth(pub Claims);

/// Extractor that requires a valid admin credential.
pub struct RequireAdmin(pub Claims);

/// Extractor for legacy ingestion routes. It never rejects on its own: the
/// handler first runs the abuse guard, then decides what a failed
/// verification means.
pub struct OptionalAuth {
    /// `Ok(None)` when no credential was presented.
    pub claims: Result<Option<Claims>, AuthError>,
    /// Org named by the presented credential, read without verification.
    pub claimed_org: Option<String>,
}

impl OptionalAuth {
    pub fn into_claims(self) -> Result<Option<Claims>, AuthError> {
        self.claims
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    NotAdmin,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::NotAdmin => (StatusCode::FORBIDDEN, "Admin access required"),
        };

        let body = json!({ "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"geoping\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claims = verify_request(parts, state)?.ok_or(AuthError::MissingAuth)?;
        Ok(RequireAuth(claims))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claims = verify_request(parts, state)?.ok_or(AuthError::MissingAuth)?;

        if !claims.admin {
            return Err(AuthError::NotAdmin);
        }

        Ok(RequireAdmin(claims))
    }
}

impl FromRequestParts<Arc<AppState>> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claimed_org = extract_bearer_token(&parts.headers)
            .ok()
            .flatten()
            .and_then(|token| state.tokens.peek_org(&token));

        Ok(OptionalAuth {
            claims: verify_request(parts, state),
            claimed_org,
        })
    }
}

fn verify_request(parts: &Parts, state: &Arc<AppState>) -> Result<Option<Claims>, AuthError> {
    let Some(raw_token) = extract_bearer_token(&parts.headers).map_err(|e| match e {
        TokenExtractionError::InvalidScheme => AuthError::InvalidScheme,
        TokenExtractionError::InvalidToken => AuthError::InvalidToken,
    })?
    else {
        return Ok(None);
    };

    let claims = state
        .tokens
        .verify(&raw_token)
        .map_err(|_| AuthError::InvalidToken)?;

    Ok(Some(claims))
}
