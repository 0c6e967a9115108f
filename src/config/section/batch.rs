//! `[batch]` section configuration.
//!
//! ```toml
//! [batch]
//! page_size = 100        # Source records per step
//! time_limit = 30        # Seconds a cron run may spend on a batch
//! lease = 120            # Seconds a worker holds the job before others may take over
//! auto_rebuild = false   # Let cron run full rebuilds on its own
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ConfigDiagnostics, FieldPath};

const PAGE_SIZE: FieldPath = FieldPath::new("batch.page_size");
const TIME_LIMIT: FieldPath = FieldPath::new("batch.time_limit");
const LEASE: FieldPath = FieldPath::new("batch.lease");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub page_size: usize,
    pub time_limit: u64,
    pub lease: u64,
    pub auto_rebuild: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            time_limit: 30,
            lease: 120,
            auto_rebuild: false,
        }
    }
}

impl BatchConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.page_size == 0 {
            diag.error(PAGE_SIZE, "must be at least 1");
        }
        if self.time_limit == 0 {
            diag.error(TIME_LIMIT, "must be at least 1 second");
        }
        if self.lease < self.time_limit {
            diag.error_with_hint(
                LEASE,
                format!("lease ({}s) is shorter than {TIME_LIMIT} ({}s)", self.lease, self.time_limit),
                "a lease must outlive one run or another worker may take over mid-step",
            );
        }
    }
}
