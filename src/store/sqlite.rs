use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const LOCATION_COLUMNS: &str = "id, device_id, company_token, company_id, latitude, longitude, \
     recorded_at, created_at, accuracy, speed, heading, altitude, odometer, is_moving, event, \
     activity_type, battery_level, battery_is_charging, geofence";

const DEVICE_COLUMNS: &str = "id, device_id, company_token, company_id, model, platform, \
     manufacturer, version, framework, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database, mostly useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(|| {
        tracing::error!("Invalid timestamp in database: {ms}");
        DateTime::<Utc>::default()
    })
}

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<Location> {
    let geofence: Option<String> = row.get(18)?;
    Ok(Location {
        id: row.get(0)?,
        device_id: row.get(1)?,
        company_token: row.get(2)?,
        company_id: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        recorded_at: from_millis(row.get(6)?),
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        meta: LocationMeta {
            accuracy: row.get(8)?,
            speed: row.get(9)?,
            heading: row.get(10)?,
            altitude: row.get(11)?,
            odometer: row.get(12)?,
            is_moving: row.get(13)?,
            event: row.get(14)?,
            activity_type: row.get(15)?,
            battery_level: row.get(16)?,
            battery_is_charging: row.get(17)?,
            geofence: geofence.and_then(|g| serde_json::from_str(&g).ok()),
        },
    })
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        device_id: row.get(1)?,
        company_token: row.get(2)?,
        company_id: row.get(3)?,
        info: DeviceInfo {
            model: row.get(4)?,
            platform: row.get(5)?,
            manufacturer: row.get(6)?,
            version: row.get(7)?,
            framework: row.get(8)?,
        },
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

/// Accumulates WHERE clauses with positional arguments.
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    args: Vec<Value>,
}

impl Conditions {
    fn push(&mut self, clause: &str, arg: impl Into<Value>) {
        self.args.push(arg.into());
        self.clauses
            .push(clause.replace('?', &format!("?{}", self.args.len())));
    }

    fn scope(&mut self, scope: &Scope) {
        if let Some(org) = &scope.org {
            self.push("company_token = ?", org.clone());
        }
        if let Some(company_id) = scope.company_id {
            self.push("company_id = ?", company_id);
        }
    }

    fn location_filter(&mut self, filter: &LocationFilter) {
        self.scope(&filter.scope);
        if let Some(device_id) = &filter.device_id {
            self.push("device_id = ?", device_id.clone());
        }
        if let Some(start) = filter.range.start {
            self.push("recorded_at >= ?", start.timestamp_millis());
        }
        if let Some(end) = filter.range.end {
            self.push("recorded_at <= ?", end.timestamp_millis());
        }
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Org operations

    fn list_orgs(&self, company_token: Option<&str>) -> Result<Vec<Org>> {
        let mut conditions = Conditions::default();
        if let Some(token) = company_token {
            conditions.push("company_token = ?", token.to_string());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, company_token, created_at FROM orgs{} ORDER BY id",
            conditions.where_sql()
        ))?;

        let rows = stmt.query_map(params_from_iter(conditions.args.iter()), |row| {
            Ok(Org {
                id: row.get(0)?,
                company_token: row.get(1)?,
                created_at: parse_datetime(&row.get::<_, String>(2)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Device operations

    fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>> {
        let mut conditions = Conditions::default();
        conditions.scope(&filter.scope);
        if let Some(device_id) = &filter.device_id {
            conditions.push("device_id = ?", device_id.clone());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices{} ORDER BY updated_at DESC, id",
            conditions.where_sql()
        ))?;

        let rows = stmt.query_map(params_from_iter(conditions.args.iter()), device_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_devices(&self, scope: &Scope, device_id: &str) -> Result<usize> {
        let mut conditions = Conditions::default();
        conditions.push("device_id = ?", device_id.to_string());
        conditions.scope(scope);
        let where_sql = conditions.where_sql();

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            &format!("DELETE FROM locations{where_sql}"),
            params_from_iter(conditions.args.iter()),
        )?;
        let removed = tx.execute(
            &format!("DELETE FROM devices{where_sql}"),
            params_from_iter(conditions.args.iter()),
        )?;
        tx.commit()?;

        Ok(removed)
    }

    // Location operations

    fn insert_locations(&self, device: &DeviceInfo, locations: &[NewLocation]) -> Result<usize> {
        let now = format_datetime(&Utc::now());
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut inserted = 0;

        for loc in locations {
            tx.execute(
                "INSERT INTO orgs (company_token, created_at) VALUES (?1, ?2)
                 ON CONFLICT(company_token) DO NOTHING",
                params![loc.company_token, now],
            )?;

            tx.execute(
                "INSERT INTO devices (device_id, company_token, company_id, model, platform,
                     manufacturer, version, framework, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                 ON CONFLICT(company_token, company_id, device_id) DO UPDATE SET
                     model = COALESCE(excluded.model, devices.model),
                     platform = COALESCE(excluded.platform, devices.platform),
                     manufacturer = COALESCE(excluded.manufacturer, devices.manufacturer),
                     version = COALESCE(excluded.version, devices.version),
                     framework = COALESCE(excluded.framework, devices.framework),
                     updated_at = excluded.updated_at",
                params![
                    loc.device_id,
                    loc.company_token,
                    loc.company_id,
                    device.model,
                    device.platform,
                    device.manufacturer,
                    device.version,
                    device.framework,
                    now,
                ],
            )?;

            let meta = &loc.meta;
            inserted += tx.execute(
                "INSERT INTO locations (device_id, company_token, company_id, latitude, longitude,
                     recorded_at, accuracy, speed, heading, altitude, odometer, is_moving, event,
                     activity_type, battery_level, battery_is_charging, geofence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                 ON CONFLICT DO NOTHING",
                params![
                    loc.device_id,
                    loc.company_token,
                    loc.company_id,
                    loc.latitude,
                    loc.longitude,
                    loc.recorded_at.timestamp_millis(),
                    meta.accuracy,
                    meta.speed,
                    meta.heading,
                    meta.altitude,
                    meta.odometer,
                    meta.is_moving,
                    meta.event,
                    meta.activity_type,
                    meta.battery_level,
                    meta.battery_is_charging,
                    meta.geofence.as_ref().map(|g| g.to_string()),
                    now,
                ],
            )?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn list_locations(&self, filter: &LocationFilter) -> Result<Vec<Location>> {
        let mut conditions = Conditions::default();
        conditions.location_filter(filter);
        let limit = filter.limit.map_or(-1, i64::from);

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations{} ORDER BY recorded_at ASC, id ASC LIMIT {limit}",
            conditions.where_sql()
        ))?;

        let rows = stmt.query_map(params_from_iter(conditions.args.iter()), location_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn latest_location(&self, scope: &Scope, device_id: &str) -> Result<Option<Location>> {
        let mut conditions = Conditions::default();
        conditions.push("device_id = ?", device_id.to_string());
        conditions.scope(scope);

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations{} ORDER BY recorded_at DESC, id DESC LIMIT 1",
            conditions.where_sql()
        ))?;

        let mut rows = stmt.query_map(params_from_iter(conditions.args.iter()), location_from_row)?;
        rows.next().transpose().map_err(Error::from)
    }

    fn delete_locations(&self, filter: &LocationFilter) -> Result<usize> {
        let mut conditions = Conditions::default();
        conditions.location_filter(filter);

        let removed = self.conn().execute(
            &format!("DELETE FROM locations{}", conditions.where_sql()),
            params_from_iter(conditions.args.iter()),
        )?;
        Ok(removed)
    }

    // Retention support

    fn max_location_id(&self) -> Result<i64> {
        self.conn()
            .query_row("SELECT COALESCE(MAX(id), 0) FROM locations", [], |row| {
                row.get(0)
            })
            .map_err(Error::from)
    }

    fn delete_expired_batch(
        &self,
        company_token: &str,
        cutoff: DateTime<Utc>,
        max_id: i64,
        batch: usize,
    ) -> Result<usize> {
        let batch = i64::try_from(batch).unwrap_or(i64::MAX);
        let removed = self.conn().execute(
            "DELETE FROM locations WHERE id IN (
                 SELECT id FROM locations
                 WHERE company_token = ?1 AND recorded_at < ?2 AND id <= ?3
                 ORDER BY id LIMIT ?4
             )",
            params![company_token, cutoff.timestamp_millis(), max_id, batch],
        )?;
        Ok(removed)
    }

    fn stats(&self) -> Result<Stats> {
        let conn = self.conn();
        let orgs: i64 = conn.query_row("SELECT COUNT(*) FROM orgs", [], |row| row.get(0))?;
        let devices: i64 = conn.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?;
        let (locations, oldest, newest): (i64, Option<i64>, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MIN(recorded_at), MAX(recorded_at) FROM locations",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(Stats {
            orgs,
            devices,
            locations,
            oldest_recorded_at: oldest.map(from_millis),
            newest_recorded_at: newest.map(from_millis),
        })
    }

    fn close(&self) -> Result<()> {
        self.conn()
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn point(org: &str, company_id: i64, device: &str, secs: i64) -> NewLocation {
        NewLocation {
            device_id: device.to_string(),
            company_token: org.to_string(),
            company_id,
            latitude: 10.0,
            longitude: 20.0,
            recorded_at: Utc.timestamp_opt(secs, 0).unwrap(),
            meta: LocationMeta::default(),
        }
    }

    #[test]
    fn test_insert_registers_org_and_device() {
        let store = store();
        let info = DeviceInfo {
            model: Some("Pixel".to_string()),
            ..DeviceInfo::default()
        };
        let inserted = store
            .insert_locations(&info, &[point("orgA", 0, "d1", 100)])
            .unwrap();
        assert_eq!(inserted, 1);

        let orgs = store.list_orgs(None).unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].company_token, "orgA");

        let devices = store.list_devices(&DeviceFilter::default()).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].info.model.as_deref(), Some("Pixel"));
    }

    #[test]
    fn test_duplicate_point_is_ignored() {
        let store = store();
        let info = DeviceInfo::default();
        store
            .insert_locations(&info, &[point("orgA", 0, "d1", 100)])
            .unwrap();
        let inserted = store
            .insert_locations(&info, &[point("orgA", 0, "d1", 100)])
            .unwrap();

        assert_eq!(inserted, 0);
        assert_eq!(store.stats().unwrap().locations, 1);
    }

    #[test]
    fn test_device_upsert_keeps_known_metadata() {
        let store = store();
        let info = DeviceInfo {
            platform: Some("ios".to_string()),
            ..DeviceInfo::default()
        };
        store
            .insert_locations(&info, &[point("orgA", 0, "d1", 100)])
            .unwrap();
        store
            .insert_locations(&DeviceInfo::default(), &[point("orgA", 0, "d1", 200)])
            .unwrap();

        let devices = store.list_devices(&DeviceFilter::default()).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].info.platform.as_deref(), Some("ios"));
    }

    #[test]
    fn test_list_locations_scoped_and_ordered() {
        let store = store();
        let info = DeviceInfo::default();
        store
            .insert_locations(
                &info,
                &[
                    point("orgA", 0, "d1", 300),
                    point("orgA", 0, "d1", 100),
                    point("orgA", 0, "d1", 200),
                ],
            )
            .unwrap();
        store
            .insert_locations(&info, &[point("orgB", 0, "d1", 150)])
            .unwrap();

        let filter = LocationFilter {
            scope: Scope::tenant("orgA", 0),
            device_id: Some("d1".to_string()),
            ..LocationFilter::default()
        };
        let locations = store.list_locations(&filter).unwrap();
        let secs: Vec<i64> = locations.iter().map(|l| l.recorded_at.timestamp()).collect();
        assert_eq!(secs, vec![100, 200, 300]);
        assert!(locations.iter().all(|l| l.company_token == "orgA"));
    }

    #[test]
    fn test_list_locations_time_range_and_limit() {
        let store = store();
        let points: Vec<_> = (1..=5).map(|i| point("orgA", 0, "d1", i * 100)).collect();
        store
            .insert_locations(&DeviceInfo::default(), &points)
            .unwrap();

        let filter = LocationFilter {
            scope: Scope::tenant("orgA", 0),
            range: TimeRange {
                start: Some(Utc.timestamp_opt(200, 0).unwrap()),
                end: Some(Utc.timestamp_opt(400, 0).unwrap()),
            },
            limit: Some(2),
            ..LocationFilter::default()
        };
        let secs: Vec<i64> = store
            .list_locations(&filter)
            .unwrap()
            .iter()
            .map(|l| l.recorded_at.timestamp())
            .collect();
        assert_eq!(secs, vec![200, 300]);
    }

    #[test]
    fn test_latest_location_respects_scope() {
        let store = store();
        let info = DeviceInfo::default();
        store
            .insert_locations(&info, &[point("orgA", 0, "d1", 100), point("orgA", 0, "d1", 300)])
            .unwrap();
        store
            .insert_locations(&info, &[point("orgB", 0, "d1", 900)])
            .unwrap();

        let latest = store
            .latest_location(&Scope::tenant("orgA", 0), "d1")
            .unwrap()
            .unwrap();
        assert_eq!(latest.recorded_at.timestamp(), 300);

        let across = store
            .latest_location(&Scope::unrestricted(), "d1")
            .unwrap()
            .unwrap();
        assert_eq!(across.company_token, "orgB");

        assert!(
            store
                .latest_location(&Scope::tenant("orgA", 0), "missing")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_delete_devices_cascades_within_scope() {
        let store = store();
        let info = DeviceInfo::default();
        store
            .insert_locations(&info, &[point("orgA", 0, "d1", 100)])
            .unwrap();
        store
            .insert_locations(&info, &[point("orgB", 0, "d1", 100)])
            .unwrap();

        let removed = store
            .delete_devices(&Scope::tenant("orgA", 0), "d1")
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = store.list_locations(&LocationFilter::default()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].company_token, "orgB");
        assert_eq!(store.list_devices(&DeviceFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_expired_batch_honors_snapshot() {
        let store = store();
        let points: Vec<_> = (1..=4).map(|i| point("orgA", 0, "d1", i * 100)).collect();
        store
            .insert_locations(&DeviceInfo::default(), &points)
            .unwrap();
        let snapshot = store.max_location_id().unwrap();
        store
            .insert_locations(&DeviceInfo::default(), &[point("orgA", 0, "d1", 50)])
            .unwrap();

        let cutoff = Utc.timestamp_opt(1_000, 0).unwrap();
        assert_eq!(store.delete_expired_batch("orgA", cutoff, snapshot, 3).unwrap(), 3);
        assert_eq!(store.delete_expired_batch("orgA", cutoff, snapshot, 3).unwrap(), 1);
        assert_eq!(store.delete_expired_batch("orgA", cutoff, snapshot, 3).unwrap(), 0);

        let remaining = store.list_locations(&LocationFilter::default()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].recorded_at.timestamp(), 50);
    }

    #[test]
    fn test_geofence_round_trips_as_json() {
        let store = store();
        let mut loc = point("orgA", 0, "d1", 100);
        loc.meta.geofence = Some(serde_json::json!({"identifier": "home", "action": "ENTER"}));
        store
            .insert_locations(&DeviceInfo::default(), &[loc])
            .unwrap();

        let stored = store.list_locations(&LocationFilter::default()).unwrap();
        assert_eq!(
            stored[0].meta.geofence.as_ref().unwrap()["identifier"],
            "home"
        );
    }

    #[test]
    fn test_stats_counts() {
        let store = store();
        store
            .insert_locations(
                &DeviceInfo::default(),
                &[point("orgA", 0, "d1", 100), point("orgA", 0, "d2", 500)],
            )
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.orgs, 1);
        assert_eq!(stats.devices, 2);
        assert_eq!(stats.locations, 2);
        assert_eq!(stats.oldest_recorded_at.unwrap().timestamp(), 100);
        assert_eq!(stats.newest_recorded_at.unwrap().timestamp(), 500);
    }
}
