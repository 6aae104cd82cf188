//! Location tracking services: ingestion, retention, queries and the device
//! registry. Handlers in `server` are thin wrappers over these functions.

pub mod devices;
pub mod ingest;
pub mod payload;
pub mod query;
pub mod retention;

pub use ingest::IngestOutcome;
pub use payload::{IngestBody, MAX_LOCATIONS_PER_REQUEST};
pub use retention::{RetentionManager, RetentionPolicy};
