use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::session::session_router;
use super::tracking::tracking_router;
use crate::auth::TokenIssuer;
use crate::config::ServerConfig;
use crate::crypto::PayloadCipher;
use crate::error::Result;
use crate::guard::AbuseGuard;
use crate::store::Store;
use crate::tracking::{RetentionManager, RetentionPolicy};

/// Login and password hash accepted by `POST /auth`.
pub struct AdminCredentials {
    pub login: String,
    pub password_hash: String,
}

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: TokenIssuer,
    /// `None` when no encryption secret is configured.
    pub cipher: Option<PayloadCipher>,
    pub guard: AbuseGuard,
    pub retention: RetentionManager,
    pub admin: Option<AdminCredentials>,
    pub with_auth: bool,
    pub log_payloads: bool,
}

impl AppState {
    pub fn from_config(store: Arc<dyn Store>, config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let cipher = config
            .encryption_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(PayloadCipher::new)
            .transpose()?;

        let admin = match (&config.admin_token, &config.admin_password_hash) {
            (Some(login), Some(hash)) => Some(AdminCredentials {
                login: login.clone(),
                password_hash: hash.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            store,
            tokens: TokenIssuer::new(&config.jwt_secret, config.token_ttl_secs)?,
            cipher,
            guard: AbuseGuard::new(config.abuse_orgs.iter().cloned(), config.filler_bytes),
            retention: RetentionManager::new(RetentionPolicy::from_config(config)),
            admin,
            with_auth: config.with_auth,
            log_payloads: config.log_payloads,
        })
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(session_router())
        .merge(tracking_router())
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
