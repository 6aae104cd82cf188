use crate::auth::resolve_scope;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Claims, Device, DeviceFilter, Org, Scope};

pub fn list_devices(store: &dyn Store, claims: &Claims, requested: DeviceFilter) -> Result<Vec<Device>> {
    let filter = DeviceFilter {
        scope: resolve_scope(claims, &requested.scope),
        ..requested
    };
    store.list_devices(&filter)
}

/// Removes a device and all of its locations within the caller's scope.
/// Returns the number of device rows removed, 0 when nothing in scope matched.
pub fn delete_device(
    store: &dyn Store,
    claims: &Claims,
    requested: &Scope,
    device_id: &str,
) -> Result<usize> {
    if device_id.trim().is_empty() {
        return Err(Error::validation("device id is required"));
    }

    let scope = resolve_scope(claims, requested);
    let removed = store.delete_devices(&scope, device_id)?;
    tracing::info!(device_id, removed, "Deleted device");
    Ok(removed)
}

/// Registered organizations. Admins see all of them, tenants only their own.
pub fn list_orgs(store: &dyn Store, claims: &Claims) -> Result<Vec<Org>> {
    if claims.admin {
        store.list_orgs(None)
    } else {
        store.list_orgs(Some(&claims.org))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{DeviceInfo, LocationFilter, LocationMeta, NewLocation};

    fn claims(org: &str, admin: bool) -> Claims {
        Claims {
            org: org.to_string(),
            company_id: 0,
            admin,
            iat: 0,
            exp: i64::MAX,
            jti: String::new(),
        }
    }

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        for (org, device) in [("orgA", "d1"), ("orgA", "d2"), ("orgB", "d1")] {
            store
                .insert_locations(
                    &DeviceInfo::default(),
                    &[NewLocation {
                        device_id: device.to_string(),
                        company_token: org.to_string(),
                        company_id: 0,
                        latitude: 1.0,
                        longitude: 2.0,
                        recorded_at: Utc.timestamp_opt(100, 0).unwrap(),
                        meta: LocationMeta::default(),
                    }],
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_list_devices_forces_scope() {
        let store = seeded();
        let requested = DeviceFilter {
            scope: Scope::tenant("orgB", 0),
            device_id: None,
        };
        let devices = list_devices(&store, &claims("orgA", false), requested).unwrap();
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.company_token == "orgA"));

        let all = list_devices(&store, &claims("root", true), DeviceFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_delete_device_cascades_in_scope_only() {
        let store = seeded();
        delete_device(&store, &claims("orgA", false), &Scope::default(), "d1").unwrap();

        let remaining = store.list_locations(&LocationFilter::default()).unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(
            remaining
                .iter()
                .any(|l| l.company_token == "orgB" && l.device_id == "d1")
        );
    }

    #[test]
    fn test_delete_out_of_scope_device_removes_nothing() {
        let store = seeded();
        let removed = delete_device(&store, &claims("orgC", false), &Scope::tenant("orgA", 0), "d1").unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.stats().unwrap().locations, 3);
    }

    #[test]
    fn test_list_orgs_by_role() {
        let store = seeded();
        let mine = list_orgs(&store, &claims("orgA", false)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].company_token, "orgA");
        assert_eq!(list_orgs(&store, &claims("root", true)).unwrap().len(), 2);
    }
}
