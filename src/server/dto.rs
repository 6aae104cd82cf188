use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{DeviceFilter, LocationFilter, Scope, TimeRange};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct JwtRequest {
    #[serde(default)]
    pub org: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub org: String,
}

/// Tenant selectors a client may pass as query parameters. Only admins have
/// them honored.
#[derive(Debug, Default, Deserialize)]
pub struct ScopeParams {
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub org: Option<String>,
}

impl ScopeParams {
    #[must_use]
    pub fn into_scope(self) -> Scope {
        Scope {
            org: self.org.filter(|o| !o.is_empty()),
            company_id: self.company_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationParams {
    #[serde(default, alias = "user_id")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub org: Option<String>,
}

impl LocationParams {
    pub fn into_filter(self) -> Result<LocationFilter> {
        let range = TimeRange {
            start: parse_date("start_date", self.start_date.as_deref())?,
            end: parse_date("end_date", self.end_date.as_deref())?,
        };

        Ok(LocationFilter {
            scope: ScopeParams {
                company_id: self.company_id,
                org: self.org,
            }
            .into_scope(),
            device_id: self.device_id.filter(|d| !d.is_empty()),
            range,
            limit: self.limit,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestParams {
    #[serde(default, alias = "user_id")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub org: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceParams {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub org: Option<String>,
}

impl DeviceParams {
    #[must_use]
    pub fn into_filter(self) -> DeviceFilter {
        DeviceFilter {
            scope: ScopeParams {
                company_id: self.company_id,
                org: self.org,
            }
            .into_scope(),
            device_id: self.device_id.filter(|d| !d.is_empty()),
        }
    }
}

fn parse_date(name: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    DateTime::parse_from_rfc3339(value)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| Error::validation(format!("{name} must be an RFC 3339 timestamp")))
}
