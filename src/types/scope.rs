use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried by a verified bearer credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub org: String,
    #[serde(rename = "companyId", default)]
    pub company_id: i64,
    #[serde(default)]
    pub admin: bool,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub jti: String,
}

/// The (organization, company) pair a request reads or writes.
/// `None` on either side means "unrestricted", which only admins obtain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub org: Option<String>,
    pub company_id: Option<i64>,
}

impl Scope {
    #[must_use]
    pub fn tenant(org: impl Into<String>, company_id: i64) -> Self {
        Self {
            org: Some(org.into()),
            company_id: Some(company_id),
        }
    }

    #[must_use]
    pub fn unrestricted() -> Self {
        Self::default()
    }
}

/// Inclusive capture-time window used by location filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct LocationFilter {
    pub scope: Scope,
    pub device_id: Option<String>,
    pub range: TimeRange,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub scope: Scope,
    pub device_id: Option<String>,
}
