//! `[xsl]` section configuration.
//!
//! The stylesheet that renders sitemaps in a browser carries a fixed set of
//! English strings. Any of them can be replaced:
//!
//! ```toml
//! [xsl.strings]
//! "Sitemap file" = "Fichier sitemap"
//! "Priority" = "Priorité"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{ConfigDiagnostics, FieldPath};

const STRINGS: FieldPath = FieldPath::new("xsl.strings");

/// Replaceable strings in the sitemap stylesheet.
pub const XSL_STRINGS: &[&str] = &[
    "Sitemap file",
    "Generated by the sitemill XML sitemap generator.",
    "Number of sitemaps in this index",
    "Click on the table headers to change sorting.",
    "Sitemap URL",
    "Last modification date",
    "Number of URLs in this sitemap",
    "URL location",
    "Change frequency",
    "Priority",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XslConfig {
    pub strings: BTreeMap<String, String>,
}

impl XslConfig {
    /// Replacement for `source`, or the source itself.
    pub fn translate<'a>(&'a self, source: &'a str) -> &'a str {
        self.strings.get(source).map_or(source, String::as_str)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        for key in self.strings.keys() {
            if !XSL_STRINGS.contains(&key.as_str()) {
                diag.error_with_hint(
                    STRINGS,
                    format!("unknown stylesheet string `{key}`"),
                    format!("known strings: {}", XSL_STRINGS.join(", ")),
                );
            }
        }
    }
}
