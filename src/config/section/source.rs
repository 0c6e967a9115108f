//! `[frontpage]` and `[[sources]]` configuration.
//!
//! Every source registers one rebuildable link type. Sources are enumerated
//! in the order they appear, after the front page.
//!
//! ```toml
//! [frontpage]
//! enable = true
//! priority = 1.0
//! changefreq = "daily"
//!
//! [[sources]]
//! type = "posts"                 # Link type name
//! kind = "directory"             # One link per file below `path`
//! path = "content/posts"
//! url_prefix = "/posts/"
//! extensions = ["md", "html"]
//! priority = 0.6
//! changefreq = "weekly"
//!
//! [[sources]]
//! type = "catalog"
//! kind = "manifest"              # One link per JSON line in `path`
//! path = "data/catalog.jsonl"
//! ```

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::core::{CUSTOM_TYPE, ChangeFreq, FRONTPAGE_TYPE, Priority};

const FRONTPAGE_PRIORITY: FieldPath = FieldPath::new("frontpage.priority");
const SOURCE_TYPE: FieldPath = FieldPath::new("sources.type");
const SOURCE_PATH: FieldPath = FieldPath::new("sources.path");
const SOURCE_PRIORITY: FieldPath = FieldPath::new("sources.priority");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontpageConfig {
    pub enable: bool,
    pub priority: f64,
    pub changefreq: ChangeFreq,
}

impl Default for FrontpageConfig {
    fn default() -> Self {
        Self {
            enable: true,
            priority: 1.0,
            changefreq: ChangeFreq::Daily,
        }
    }
}

impl FrontpageConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if Priority::new(self.priority).is_err() {
            diag.error(
                FRONTPAGE_PRIORITY,
                format!("must be between 0.0 and 1.0, got {}", self.priority),
            );
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Files below a directory.
    #[default]
    Directory,
    /// A JSON Lines file, one object per link.
    Manifest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub link_type: String,
    pub kind: SourceKind,
    /// Relative to the project root.
    pub path: PathBuf,
    pub url_prefix: String,
    pub priority: f64,
    pub changefreq: ChangeFreq,
    /// Language of records that do not carry one.
    pub language: Option<String>,
    /// File extensions a directory source accepts; empty accepts all.
    pub extensions: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            link_type: String::new(),
            kind: SourceKind::default(),
            path: PathBuf::new(),
            url_prefix: "/".into(),
            priority: Priority::DEFAULT.get(),
            changefreq: ChangeFreq::None,
            language: None,
            extensions: Vec::new(),
        }
    }
}

impl SourceConfig {
    /// # Checks
    /// - `type` is set, unique and not reserved
    /// - `path` is set
    /// - `priority` is within `0.0..=1.0`
    pub fn validate_all(sources: &[Self], diag: &mut ConfigDiagnostics) {
        let mut seen = FxHashSet::default();
        for (i, source) in sources.iter().enumerate() {
            let name = if source.link_type.is_empty() {
                format!("#{}", i + 1)
            } else {
                format!("`{}`", source.link_type)
            };

            if source.link_type.trim().is_empty() {
                diag.error(SOURCE_TYPE, format!("source {name} has no type"));
            } else if matches!(source.link_type.as_str(), CUSTOM_TYPE | FRONTPAGE_TYPE) {
                diag.error_with_hint(
                    SOURCE_TYPE,
                    format!("type {name} is reserved"),
                    "pick another name for this source",
                );
            } else if !seen.insert(source.link_type.as_str()) {
                diag.error(SOURCE_TYPE, format!("type {name} is declared more than once"));
            }

            if source.path.as_os_str().is_empty() {
                diag.error(SOURCE_PATH, format!("source {name} has no path"));
            }
            if Priority::new(source.priority).is_err() {
                diag.error(
                    SOURCE_PRIORITY,
                    format!("source {name}: must be between 0.0 and 1.0, got {}", source.priority),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_sources_parse() {
        let config = test_parse_config(
            r#"
[frontpage]
changefreq = "hourly"

[[sources]]
type = "posts"
path = "content/posts"
url_prefix = "/posts/"
extensions = ["md"]
changefreq = "weekly"

[[sources]]
type = "catalog"
kind = "manifest"
path = "data/catalog.jsonl"
priority = 0.3
"#,
        );
        assert!(config.frontpage.enable);
        assert_eq!(config.frontpage.changefreq, ChangeFreq::Hourly);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].kind, SourceKind::Directory);
        assert_eq!(config.sources[0].changefreq, ChangeFreq::Weekly);
        assert_eq!(config.sources[1].kind, SourceKind::Manifest);
        assert_eq!(config.sources[1].priority, 0.3);
    }

    #[test]
    fn test_sources_validation() {
        let sources = vec![
            SourceConfig {
                link_type: "posts".into(),
                path: "a".into(),
                ..Default::default()
            },
            SourceConfig {
                link_type: "posts".into(),
                path: "b".into(),
                ..Default::default()
            },
            SourceConfig {
                link_type: "custom".into(),
                path: "c".into(),
                priority: 2.0,
                ..Default::default()
            },
            SourceConfig::default(),
        ];
        let mut diag = ConfigDiagnostics::new();
        SourceConfig::validate_all(&sources, &mut diag);
        // duplicate, reserved, priority, missing type, missing path
        assert_eq!(diag.len(), 5);
    }

    #[test]
    fn test_frontpage_priority_validation() {
        let config = test_parse_config("[frontpage]\npriority = 1.5");
        let mut diag = ConfigDiagnostics::new();
        config.frontpage.validate(&mut diag);
        assert_eq!(diag.len(), 1);
    }
}
