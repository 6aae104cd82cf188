use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rand::RngCore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use geoping::auth::{Argon2Hasher, TokenIssuer};
use geoping::config::{CONFIG_FILE_NAME, ServerConfig};
use geoping::server::{AppState, create_router};
use geoping::store::{SqliteStore, Store};

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Parser)]
#[command(name = "geoping")]
#[command(about = "A multi-tenant location telemetry server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, database and a config file with fresh secrets
    Init {
        /// Data directory for the database and config file
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Admin login accepted by POST /auth
        #[arg(long)]
        admin_token: Option<String>,

        /// Admin password; a random one is generated and printed when omitted
        #[arg(long, requires = "admin_token")]
        admin_password: Option<String>,
    },

    /// Print an Argon2id hash for `admin_password_hash`
    HashPassword {
        password: String,
    },

    /// Mint a bearer credential signed with the configured secret
    IssueToken {
        /// Config file holding `jwt_secret`
        #[arg(long)]
        config: PathBuf,

        /// Organization token the credential is scoped to
        #[arg(long)]
        org: String,

        #[arg(long, default_value_t = 0)]
        company_id: i64,

        /// Grant cross-tenant admin capability
        #[arg(long)]
        admin: bool,
    },

    /// Start the server
    Serve(ServeArgs),
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Config file; defaults to geoping.toml in the data directory when present
    #[arg(long, env = "GEOPING_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, env = "GEOPING_HOST")]
    host: Option<String>,

    /// Port to bind to
    #[arg(long, short, env = "GEOPING_PORT")]
    port: Option<u16>,

    /// Data directory for the database
    #[arg(long, env = "GEOPING_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long, env = "GEOPING_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    #[arg(long, env = "GEOPING_ADMIN_TOKEN")]
    admin_token: Option<String>,

    #[arg(long, env = "GEOPING_ADMIN_PASSWORD_HASH", hide_env_values = true)]
    admin_password_hash: Option<String>,

    /// Require an org for POST /jwt
    #[arg(long, env = "GEOPING_WITH_AUTH")]
    with_auth: Option<bool>,

    #[arg(long, env = "GEOPING_ENCRYPTION_SECRET", hide_env_values = true)]
    encryption_secret: Option<String>,

    /// Organizations to tarpit, comma separated
    #[arg(long, env = "GEOPING_ABUSE_ORGS", value_delimiter = ',')]
    abuse_orgs: Option<Vec<String>>,

    #[arg(long, env = "GEOPING_FILLER_BYTES")]
    filler_bytes: Option<u64>,

    #[arg(long, env = "GEOPING_RETENTION_DAYS")]
    retention_days: Option<u32>,

    /// Log ingested payloads at debug level
    #[arg(long, env = "GEOPING_LOG_PAYLOADS")]
    log_payloads: bool,
}

impl ServeArgs {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let config_path = self.config.clone().or_else(|| {
            let default = self
                .data_dir
                .clone()
                .unwrap_or_else(|| ServerConfig::default().data_dir)
                .join(CONFIG_FILE_NAME);
            default.exists().then_some(default)
        });

        let mut config = match &config_path {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(secret) = self.jwt_secret {
            config.jwt_secret = secret;
        }
        if self.admin_token.is_some() {
            config.admin_token = self.admin_token;
        }
        if self.admin_password_hash.is_some() {
            config.admin_password_hash = self.admin_password_hash;
        }
        if let Some(with_auth) = self.with_auth {
            config.with_auth = with_auth;
        }
        if self.encryption_secret.is_some() {
            config.encryption_secret = self.encryption_secret;
        }
        if let Some(orgs) = self.abuse_orgs {
            config.abuse_orgs = orgs;
        }
        if let Some(bytes) = self.filler_bytes {
            config.filler_bytes = bytes;
        }
        if let Some(days) = self.retention_days {
            config.retention_days = days;
        }
        config.log_payloads |= self.log_payloads;

        Ok(config)
    }
}

fn run_init(
    data_dir: &Path,
    admin_token: Option<String>,
    admin_password: Option<String>,
) -> anyhow::Result<()> {
    let config_path = data_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        bail!(
            "Server already initialized. Config exists at: {}",
            config_path.display()
        );
    }

    fs::create_dir_all(data_dir)?;

    let mut config = ServerConfig {
        data_dir: data_dir.to_path_buf(),
        jwt_secret: random_secret(),
        encryption_secret: Some(random_secret()),
        ..ServerConfig::default()
    };

    let mut generated_password = None;
    if let Some(login) = admin_token {
        let password = match admin_password {
            Some(password) => password,
            None => {
                let password = random_secret();
                generated_password = Some(password.clone());
                password
            }
        };
        config.admin_password_hash = Some(Argon2Hasher::new()?.hash(&password)?);
        config.admin_token = Some(login);
    }

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    store.close()?;

    fs::write(&config_path, config.to_toml()?)?;

    #[cfg(unix)]
    set_restrictive_permissions(&config_path);

    println!("Initialized {}", data_dir.display());
    println!("Config written to: {}", config_path.display());

    if let (Some(login), Some(password)) = (&config.admin_token, generated_password) {
        println!();
        println!("========================================");
        println!("Admin password for '{login}' (save this, it won't be shown again):");
        println!();
        println!("  {password}");
        println!();
        println!("========================================");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(SqliteStore::new(config.db_path())?);
    store.initialize()?;

    let state = Arc::new(AppState::from_config(store.clone(), &config)?);

    if config.abuse_orgs.is_empty() {
        info!("No organizations flagged for tarpitting");
    } else {
        info!("Tarpitting {} flagged organizations", config.abuse_orgs.len());
    }
    if state.cipher.is_none() {
        info!("Encrypted submissions disabled: no encryption_secret configured");
    }

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("geoping=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            data_dir,
            admin_token,
            admin_password,
        } => {
            run_init(&data_dir, admin_token, admin_password)?;
        }
        Commands::HashPassword { password } => {
            println!("{}", Argon2Hasher::new()?.hash(&password)?);
        }
        Commands::IssueToken {
            config,
            org,
            company_id,
            admin,
        } => {
            let config = ServerConfig::from_file(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            let issuer = TokenIssuer::new(&config.jwt_secret, config.token_ttl_secs)?;
            println!("{}", issuer.issue(&org, company_id, admin)?);
        }
        Commands::Serve(args) => {
            run_serve(args.into_config()?).await?;
        }
    }

    Ok(())
}
