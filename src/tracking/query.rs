use crate::auth::resolve_scope;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Claims, Location, LocationFilter, Scope, Stats};

pub const DEFAULT_LIMIT: u32 = 1000;
pub const MAX_LIMIT: u32 = 10_000;

/// Applies the caller's scope and the limit bounds to a requested filter.
fn forced(claims: &Claims, requested: LocationFilter) -> LocationFilter {
    LocationFilter {
        scope: resolve_scope(claims, &requested.scope),
        limit: Some(requested.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)),
        ..requested
    }
}

/// Locations within the caller's scope, oldest capture first.
pub fn get_locations(
    store: &dyn Store,
    claims: &Claims,
    requested: LocationFilter,
) -> Result<Vec<Location>> {
    let filter = forced(claims, requested);
    if let (Some(start), Some(end)) = (filter.range.start, filter.range.end) {
        if start > end {
            return Err(Error::validation("start_date must not be after end_date"));
        }
    }
    store.list_locations(&filter)
}

/// Most recent location of a device within the caller's scope.
pub fn get_latest_location(
    store: &dyn Store,
    claims: &Claims,
    requested: &Scope,
    device_id: &str,
) -> Result<Option<Location>> {
    if device_id.trim().is_empty() {
        return Err(Error::validation("user_id or device_id is required"));
    }
    let scope = resolve_scope(claims, requested);
    store.latest_location(&scope, device_id)
}

pub fn get_stats(store: &dyn Store, claims: &Claims) -> Result<Stats> {
    if !claims.admin {
        return Err(Error::Forbidden);
    }
    store.stats()
}

/// Bulk delete within the caller's scope. Returns the number of rows removed.
///
/// An admin request that narrows nothing would wipe every tenant, so it is
/// rejected.
pub fn delete_locations(
    store: &dyn Store,
    claims: &Claims,
    requested: LocationFilter,
) -> Result<usize> {
    let filter = LocationFilter {
        scope: resolve_scope(claims, &requested.scope),
        limit: None,
        ..requested
    };

    let narrowed = filter.scope.org.is_some()
        || filter.scope.company_id.is_some()
        || filter.device_id.is_some()
        || filter.range.start.is_some()
        || filter.range.end.is_some();
    if !narrowed {
        return Err(Error::validation(
            "refusing to delete without an org, company, device or date filter",
        ));
    }

    let deleted = store.delete_locations(&filter)?;
    tracing::info!(
        org = filter.scope.org.as_deref().unwrap_or("*"),
        deleted,
        "Deleted locations"
    );
    Ok(deleted)
}
