use std::sync::{Arc, LazyLock};

use geoping::auth::Argon2Hasher;
use geoping::config::ServerConfig;
use geoping::crypto::PayloadCipher;
use geoping::server::{AppState, create_router};
use geoping::store::{SqliteStore, Store};
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub const ADMIN_LOGIN: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct horse battery staple";
pub const ENCRYPTION_SECRET: &str = "test-encryption-secret";
pub const FILLER_BYTES: u64 = 256 * 1024;

static ADMIN_PASSWORD_HASH: LazyLock<String> = LazyLock::new(|| {
    Argon2Hasher::new()
        .and_then(|h| h.hash(ADMIN_PASSWORD))
        .expect("hash admin password")
});

/// Router served in-process on an ephemeral port, backed by a temp data dir.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub state: Arc<AppState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(customize: impl FnOnce(&mut ServerConfig)) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");

        let mut config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            jwt_secret: "test-jwt-secret".to_string(),
            admin_token: Some(ADMIN_LOGIN.to_string()),
            admin_password_hash: Some(ADMIN_PASSWORD_HASH.clone()),
            encryption_secret: Some(ENCRYPTION_SECRET.to_string()),
            abuse_orgs: vec!["spammer".to_string()],
            filler_bytes: FILLER_BYTES,
            // Fixture points are dated years back; keep them out of reach of eviction.
            retention_days: 100 * 365,
            ..ServerConfig::default()
        };
        customize(&mut config);

        let store = SqliteStore::new(config.db_path()).expect("open store");
        store.initialize().expect("initialize store");
        let state = Arc::new(AppState::from_config(Arc::new(store), &config).expect("build state"));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let app = create_router(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self::wait_for_ready(&base_url).await;

        Self {
            temp_dir,
            base_url,
            state,
            handle,
        }
    }

    async fn wait_for_ready(base_url: &str) {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", base_url))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("Server did not become ready");
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    /// Mints a tenant credential directly, bypassing `POST /jwt`.
    pub fn tenant_token(&self, org: &str, company_id: i64) -> String {
        self.state
            .tokens
            .issue(org, company_id, false)
            .expect("issue tenant token")
    }

    pub fn admin_token(&self) -> String {
        self.state
            .tokens
            .issue(ADMIN_LOGIN, 0, true)
            .expect("issue admin token")
    }

    pub fn cipher(&self) -> PayloadCipher {
        PayloadCipher::new(ENCRYPTION_SECRET).expect("build cipher")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
