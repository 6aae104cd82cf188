pub const SCHEMA: &str = r#"
-- Organizations are tenants, identified by their company token
CREATE TABLE IF NOT EXISTS orgs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company_token TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Devices are registered implicitly by their first location
CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id TEXT NOT NULL,
    company_token TEXT NOT NULL REFERENCES orgs(company_token),
    company_id INTEGER NOT NULL DEFAULT 0,

    model TEXT,
    platform TEXT,
    manufacturer TEXT,
    version TEXT,
    framework TEXT,

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    UNIQUE(company_token, company_id, device_id)
);

-- Append-only points; recorded_at is epoch milliseconds
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id TEXT NOT NULL,
    company_token TEXT NOT NULL,
    company_id INTEGER NOT NULL DEFAULT 0,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    recorded_at INTEGER NOT NULL,

    accuracy REAL,
    speed REAL,
    heading REAL,
    altitude REAL,
    odometer REAL,
    is_moving INTEGER,
    event TEXT,
    activity_type TEXT,
    battery_level REAL,
    battery_is_charging INTEGER,
    geofence TEXT,             -- raw JSON

    created_at TEXT DEFAULT (datetime('now'))
);

-- Re-delivered points are dropped
CREATE UNIQUE INDEX IF NOT EXISTS idx_locations_point
    ON locations(company_token, company_id, device_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_locations_org_recorded ON locations(company_token, recorded_at);
CREATE INDEX IF NOT EXISTS idx_locations_device_recorded ON locations(device_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_devices_org ON devices(company_token, company_id);
"#;
