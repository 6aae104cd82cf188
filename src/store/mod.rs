mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Org operations
    fn list_orgs(&self, company_token: Option<&str>) -> Result<Vec<Org>>;

    // Device operations
    fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>>;
    /// Removes matching devices and their locations in one transaction.
    /// Returns the number of device rows removed.
    fn delete_devices(&self, scope: &Scope, device_id: &str) -> Result<usize>;

    // Location operations
    /// Registers the org, upserts the device of every point with `device`
    /// metadata, then inserts the points, all in one transaction.
    /// Points already stored for the same device and instant are skipped.
    /// Returns the number of rows actually inserted.
    fn insert_locations(&self, device: &DeviceInfo, locations: &[NewLocation]) -> Result<usize>;
    fn list_locations(&self, filter: &LocationFilter) -> Result<Vec<Location>>;
    fn latest_location(&self, scope: &Scope, device_id: &str) -> Result<Option<Location>>;
    fn delete_locations(&self, filter: &LocationFilter) -> Result<usize>;

    // Retention support
    /// Highest location row id currently assigned, 0 when empty.
    fn max_location_id(&self) -> Result<i64>;
    /// Deletes up to `batch` rows of `company_token` with `recorded_at < cutoff`
    /// and `id <= max_id`. Returns the number deleted.
    fn delete_expired_batch(
        &self,
        company_token: &str,
        cutoff: DateTime<Utc>,
        max_id: i64,
        batch: usize,
    ) -> Result<usize>;

    fn stats(&self) -> Result<Stats>;

    fn close(&self) -> Result<()>;
}
