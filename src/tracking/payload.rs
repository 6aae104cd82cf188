//! Ingestion payloads.
//!
//! Two body shapes are accepted. The flat one carries a single point:
//!
//! ```json
//! {"company_token": "acme", "device_id": "d1", "lat": 10.0, "lng": 20.0, "ts": "2024-01-01T00:00:00Z"}
//! ```
//!
//! The nested one is what mobile SDKs post, with one or many locations:
//!
//! ```json
//! {"device": {"uuid": "d1", "model": "Pixel"},
//!  "location": [{"coords": {"latitude": 10.0, "longitude": 20.0}, "timestamp": "..."}]}
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{DeviceInfo, LocationMeta, NewLocation, Scope};

pub const MAX_LOCATIONS_PER_REQUEST: usize = 1000;
const MAX_DEVICE_ID_LEN: usize = 255;

#[derive(Debug, Default, Deserialize)]
pub struct IngestBody {
    #[serde(default)]
    pub company_token: Option<String>,
    #[serde(default)]
    pub company_id: Option<i64>,

    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default, alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(default, alias = "longitude")]
    pub lng: Option<f64>,
    #[serde(default, alias = "timestamp", alias = "recorded_at")]
    pub ts: Option<Timestamp>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub geofence: Option<serde_json::Value>,

    #[serde(default)]
    pub device: Option<DevicePayload>,
    #[serde(default)]
    pub location: Option<OneOrMany<LocationPayload>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DevicePayload {
    #[serde(default, alias = "id")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub framework: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationPayload {
    #[serde(default)]
    pub coords: Coords,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub is_moving: Option<bool>,
    #[serde(default)]
    pub odometer: Option<f64>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub activity: Option<Activity>,
    #[serde(default)]
    pub battery: Option<Battery>,
    #[serde(default)]
    pub geofence: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Coords {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Activity {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Battery {
    #[serde(default)]
    pub level: Option<f64>,
    #[serde(default)]
    pub is_charging: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

/// Capture time as RFC 3339 text or epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    FractionalMillis(f64),
    Text(String),
}

impl Timestamp {
    pub fn to_datetime(&self) -> Result<DateTime<Utc>> {
        let parsed = match self {
            Timestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            Timestamp::FractionalMillis(ms) if ms.is_finite() => {
                DateTime::from_timestamp_millis(ms.round() as i64)
            }
            Timestamp::FractionalMillis(_) => None,
            Timestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        };

        parsed.ok_or_else(|| Error::validation("timestamp is not a valid RFC 3339 date or epoch milliseconds"))
    }
}

impl IngestBody {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::validation(format!("malformed body: {e}")))
    }

    /// The scope the payload asks to be written under. `path_token` is the
    /// org from `POST /locations/{company_token}`.
    pub fn declared_scope(&self, path_token: Option<&str>) -> Result<Scope> {
        let org = match (path_token, self.company_token.as_deref()) {
            (Some(path), Some(body)) if path != body => {
                return Err(Error::validation(
                    "company_token in body does not match the request path",
                ));
            }
            (Some(path), _) => Some(path.to_string()),
            (None, body) => body.map(str::to_string),
        };

        Ok(Scope {
            org,
            company_id: self.company_id,
        })
    }

    /// Validates the body and turns it into points for one device.
    pub fn into_locations(
        self,
        company_token: &str,
        company_id: i64,
    ) -> Result<(DeviceInfo, Vec<NewLocation>)> {
        let device = self.device.unwrap_or_default();
        let device_id = device
            .uuid
            .clone()
            .or(self.device_id)
            .ok_or_else(|| Error::validation("device_id is required"))?;
        validate_device_id(&device_id)?;

        let info = DeviceInfo {
            model: device.model,
            platform: device.platform,
            manufacturer: device.manufacturer,
            version: device.version,
            framework: device.framework,
        };

        let point = |latitude: Option<f64>,
                     longitude: Option<f64>,
                     ts: Option<&Timestamp>,
                     meta: LocationMeta|
         -> Result<NewLocation> {
            let latitude = latitude.ok_or_else(|| Error::validation("latitude is required"))?;
            let longitude = longitude.ok_or_else(|| Error::validation("longitude is required"))?;
            validate_coordinates(latitude, longitude)?;
            let recorded_at = ts
                .ok_or_else(|| Error::validation("timestamp is required"))?
                .to_datetime()?;

            Ok(NewLocation {
                device_id: device_id.clone(),
                company_token: company_token.to_string(),
                company_id,
                latitude,
                longitude,
                recorded_at,
                meta,
            })
        };

        let locations = match self.location {
            Some(nested) => {
                let nested = match nested {
                    OneOrMany::One(loc) => vec![loc],
                    OneOrMany::Many(locs) => locs,
                };
                if nested.is_empty() {
                    return Err(Error::validation("location list is empty"));
                }
                if nested.len() > MAX_LOCATIONS_PER_REQUEST {
                    return Err(Error::validation(format!(
                        "at most {MAX_LOCATIONS_PER_REQUEST} locations per request"
                    )));
                }

                nested
                    .into_iter()
                    .map(|loc| {
                        let meta = LocationMeta {
                            accuracy: loc.coords.accuracy,
                            speed: loc.coords.speed,
                            heading: loc.coords.heading,
                            altitude: loc.coords.altitude,
                            odometer: loc.odometer,
                            is_moving: loc.is_moving,
                            event: loc.event,
                            activity_type: loc.activity.and_then(|a| a.kind),
                            battery_level: loc.battery.as_ref().and_then(|b| b.level),
                            battery_is_charging: loc.battery.as_ref().and_then(|b| b.is_charging),
                            geofence: loc.geofence,
                        };
                        point(
                            loc.coords.latitude,
                            loc.coords.longitude,
                            loc.timestamp.as_ref(),
                            meta,
                        )
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            None => {
                let meta = LocationMeta {
                    accuracy: self.accuracy,
                    speed: self.speed,
                    heading: self.heading,
                    altitude: self.altitude,
                    geofence: self.geofence,
                    ..LocationMeta::default()
                };
                vec![point(self.lat, self.lng, self.ts.as_ref(), meta)?]
            }
        };

        Ok((info, locations))
    }
}

fn validate_device_id(device_id: &str) -> Result<()> {
    if device_id.trim().is_empty() {
        return Err(Error::validation("device_id cannot be empty"));
    }
    if device_id.len() > MAX_DEVICE_ID_LEN {
        return Err(Error::validation(format!(
            "device_id cannot exceed {MAX_DEVICE_ID_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::validation("latitude must be between -90 and 90"));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::validation("longitude must be between -180 and 180"));
    }
    Ok(())
}
