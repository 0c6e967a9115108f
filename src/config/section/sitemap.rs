//! `[sitemap]` section configuration.
//!
//! ```toml
//! [sitemap]
//! output = ".sitemill/sitemaps"   # One directory per context below this
//! max_links = 50000               # URLs per chunk (protocol maximum)
//! max_bytes = 52428800            # Bytes per chunk (protocol maximum)
//! minify = false                  # Strip whitespace from written XML
//! stylesheet = true               # Link chunks to the XSL stylesheet
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::generator::writer::{MAX_BYTES_PER_CHUNK, MAX_LINKS_PER_CHUNK};

const MAX_LINKS: FieldPath = FieldPath::new("sitemap.max_links");
const MAX_BYTES: FieldPath = FieldPath::new("sitemap.max_bytes");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapSectionConfig {
    pub output: PathBuf,
    pub max_links: u32,
    pub max_bytes: u64,
    pub minify: bool,
    pub stylesheet: bool,
}

impl Default for SitemapSectionConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from(".sitemill/sitemaps"),
            max_links: MAX_LINKS_PER_CHUNK,
            max_bytes: MAX_BYTES_PER_CHUNK,
            minify: false,
            stylesheet: true,
        }
    }
}

impl SitemapSectionConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.max_links == 0 || self.max_links > MAX_LINKS_PER_CHUNK {
            diag.error(
                MAX_LINKS,
                format!("must be between 1 and {MAX_LINKS_PER_CHUNK}, got {}", self.max_links),
            );
        }
        // Room for at least the XML frame and one entry
        if self.max_bytes < 1024 || self.max_bytes > MAX_BYTES_PER_CHUNK {
            diag.error(
                MAX_BYTES,
                format!("must be between 1024 and {MAX_BYTES_PER_CHUNK}, got {}", self.max_bytes),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_sitemap_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.sitemap.max_links, 50_000);
        assert_eq!(config.sitemap.max_bytes, 52_428_800);
        assert!(config.sitemap.stylesheet);
        assert!(!config.sitemap.minify);
    }

    #[test]
    fn test_limits_validated() {
        let config = test_parse_config("[sitemap]\nmax_links = 60000\nmax_bytes = 10");
        let mut diag = ConfigDiagnostics::new();
        config.sitemap.validate(&mut diag);
        assert_eq!(diag.len(), 2);

        let config = test_parse_config("[sitemap]\nmax_links = 1000");
        let mut diag = ConfigDiagnostics::new();
        config.sitemap.validate(&mut diag);
        assert!(diag.is_empty());
    }
}
