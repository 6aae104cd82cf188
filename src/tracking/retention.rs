use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::store::Store;

/// Age-based retention windows, with per-organization overrides.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub default_days: u32,
    pub overrides: HashMap<String, u32>,
    /// Upper bound on rows removed per delete statement.
    pub batch_size: usize,
}

impl RetentionPolicy {
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            default_days: config.retention_days,
            overrides: config.retention_overrides.clone(),
            batch_size: config.retention_batch_size.max(1),
        }
    }

    #[must_use]
    pub fn window(&self, company_token: &str) -> Duration {
        let days = self
            .overrides
            .get(company_token)
            .copied()
            .unwrap_or(self.default_days);
        Duration::days(i64::from(days))
    }

    /// Oldest instant still retained. Clamps to the earliest representable
    /// time when the window reaches past it.
    #[must_use]
    pub fn cutoff(&self, company_token: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window(company_token))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

pub struct RetentionManager {
    policy: RetentionPolicy,
}

impl RetentionManager {
    #[must_use]
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Deletes the org's locations captured before its retention cutoff.
    pub fn evict(&self, store: &dyn Store, company_token: &str) -> Result<usize> {
        let cutoff = self.policy.cutoff(company_token, Utc::now());
        self.evict_before(store, company_token, cutoff)
    }

    /// Deletes the org's locations captured before `cutoff`.
    ///
    /// The highest row id is read before any delete runs, and only rows at or
    /// below it are candidates, so a point inserted while this runs is never
    /// removed by it. Rows go in batches so the store is released between
    /// statements.
    pub fn evict_before(
        &self,
        store: &dyn Store,
        company_token: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<usize> {
        let snapshot = store.max_location_id()?;
        let mut total = 0;

        loop {
            let removed =
                store.delete_expired_batch(company_token, cutoff, snapshot, self.policy.batch_size)?;
            total += removed;
            if removed < self.policy.batch_size {
                break;
            }
        }

        if total > 0 {
            tracing::debug!(
                org = company_token,
                removed = total,
                cutoff = %cutoff,
                "Evicted expired locations"
            );
        }

        Ok(total)
    }
}
