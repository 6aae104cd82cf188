//! # Geoping
//!
//! A multi-tenant location telemetry server, usable both as a standalone
//! binary and as a library.
//!
//! Devices post location pings scoped to an organization (and optionally a
//! company within it). Reads are confined to the caller's tenant unless the
//! bearer credential carries admin capability. Old points are evicted after
//! each write, and organizations flagged as abusive are tarpitted.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! geoping = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use geoping::config::ServerConfig;
//! use geoping::server::{AppState, create_router};
//! use geoping::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::from_file("./data/geoping.toml".as_ref()).unwrap();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::from_config(Arc::new(store), &config).unwrap());
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `geoping` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod guard;
pub mod server;
pub mod store;
pub mod tracking;
pub mod types;
