//! `[store]` section configuration.
//!
//! ```toml
//! [store]
//! path = ".sitemill/links.db"   # SQLite database, relative to the project root
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".sitemill/links.db"),
        }
    }
}
