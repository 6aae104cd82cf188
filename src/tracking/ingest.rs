use serde::Serialize;

use super::payload::IngestBody;
use super::retention::RetentionManager;
use crate::auth::resolve_write_scope;
use crate::error::Result;
use crate::store::Store;
use crate::types::Claims;

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub company_token: String,
    pub company_id: i64,
    pub device_id: String,
    /// Points in the request.
    pub received: usize,
    /// Points newly stored; re-delivered points are not counted.
    pub inserted: usize,
    /// Rows removed by the retention pass that followed.
    pub evicted: usize,
}

/// Validates and stores a submission, then trims the org's expired points.
///
/// `path_token` is the org named in the route, if any. A credential whose
/// scope disagrees with what the payload declares fails with
/// `Error::AccessDenied` before anything is written. A failing retention pass
/// is logged and does not undo the write.
pub fn create(
    store: &dyn Store,
    retention: &RetentionManager,
    body: IngestBody,
    path_token: Option<&str>,
    claims: Option<&Claims>,
) -> Result<IngestOutcome> {
    let declared = body.declared_scope(path_token)?;
    let (company_token, company_id) = resolve_write_scope(claims, &declared)?;

    let (device, locations) = body.into_locations(&company_token, company_id)?;
    let device_id = locations
        .first()
        .map(|l| l.device_id.clone())
        .unwrap_or_default();

    let inserted = store.insert_locations(&device, &locations)?;

    let evicted = match retention.evict(store, &company_token) {
        Ok(evicted) => evicted,
        Err(e) => {
            tracing::warn!(org = %company_token, "Retention pass failed: {e}");
            0
        }
    };

    Ok(IngestOutcome {
        company_token,
        company_id,
        device_id,
        received: locations.len(),
        inserted,
        evicted,
    })
}
