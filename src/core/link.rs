//! Indexable link records.
//!
//! A [`Link`] is the unit stored in the link store and written into sitemap
//! chunks. Every link shares the same base columns; kind-specific data lives
//! in the tagged [`LinkExtension`] payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Language code of links that belong to every sitemap context.
pub const LANGUAGE_NEUTRAL: &str = "und";

/// Link type reserved for operator-managed links.
pub const CUSTOM_TYPE: &str = "custom";

/// Link type of the site front page.
pub const FRONTPAGE_TYPE: &str = "frontpage";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    #[error("priority must be between 0.0 and 1.0, got {0}")]
    Priority(f64),

    #[error("unknown change frequency `{0}`")]
    ChangeFreq(String),

    #[error("link location must not be empty")]
    EmptyLoc,
}

// ============================================================================
// Priority
// ============================================================================

/// Sitemap priority, always within `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Priority(f64);

impl Priority {
    pub const DEFAULT: Self = Self(0.5);

    pub fn new(value: f64) -> Result<Self, LinkError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(LinkError::Priority(value))
        }
    }

    #[inline]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for Priority {
    type Error = LinkError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for f64 {
    fn from(value: Priority) -> Self {
        value.0
    }
}

/// One decimal, as written to `<priority>` and shown in listings.
impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

impl FromStr for Priority {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s.trim().parse().map_err(|_| LinkError::Priority(f64::NAN))?;
        Self::new(value)
    }
}

// ============================================================================
// ChangeFreq
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
    /// No `<changefreq>` element is written.
    #[default]
    None,
}

impl ChangeFreq {
    pub const ALL: [Self; 8] = [
        Self::Always,
        Self::Hourly,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Yearly,
        Self::Never,
        Self::None,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
            Self::None => "none",
        }
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }

    /// Capitalized label for listings.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Always => "Always",
            Self::Hourly => "Hourly",
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
            Self::Yearly => "Yearly",
            Self::Never => "Never",
            Self::None => "None",
        }
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeFreq {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|freq| freq.as_str() == lower)
            .ok_or_else(|| LinkError::ChangeFreq(s.to_string()))
    }
}

// ============================================================================
// Extension payload
// ============================================================================

/// Kind-specific data attached to a link, stored as JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkExtension {
    #[default]
    None,
    Frontpage,
    /// Enumerated from a content file.
    File { path: String, bytes: u64 },
    /// Enumerated from a manifest line; holds the fields not mapped to columns.
    Entry {
        #[serde(default)]
        fields: serde_json::Map<String, serde_json::Value>,
    },
    Custom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
}

// ============================================================================
// Link
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Store row id, `None` until persisted.
    pub id: Option<i64>,
    pub link_type: String,
    pub source_id: String,
    /// Site-relative path or absolute URL.
    pub loc: String,
    pub priority: Priority,
    pub changefreq: ChangeFreq,
    pub language: String,
    /// Unix seconds.
    pub lastmod: Option<i64>,
    pub visible: bool,
    /// Operator overrode priority, changefreq or visibility.
    pub customized: bool,
    pub extension: LinkExtension,
}

impl Link {
    pub fn new(
        link_type: impl Into<String>,
        source_id: impl Into<String>,
        loc: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            link_type: link_type.into(),
            source_id: source_id.into(),
            loc: loc.into(),
            priority: Priority::DEFAULT,
            changefreq: ChangeFreq::None,
            language: LANGUAGE_NEUTRAL.to_string(),
            lastmod: None,
            visible: true,
            customized: false,
            extension: LinkExtension::None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_changefreq(mut self, changefreq: ChangeFreq) -> Self {
        self.changefreq = changefreq;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_lastmod(mut self, lastmod: Option<i64>) -> Self {
        self.lastmod = lastmod;
        self
    }

    pub fn with_extension(mut self, extension: LinkExtension) -> Self {
        self.extension = extension;
        self
    }

    pub fn is_custom(&self) -> bool {
        self.link_type == CUSTOM_TYPE
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        if self.loc.trim().is_empty() {
            return Err(LinkError::EmptyLoc);
        }
        Ok(())
    }

    /// Absolute URL for this link under `base_url`.
    pub fn absolute_loc(&self, base_url: &str) -> String {
        absolute_url(base_url, &self.loc)
    }
}

/// Join a site-relative location onto the base URL; absolute URLs pass through.
pub fn absolute_url(base_url: &str, loc: &str) -> String {
    if loc.starts_with("http://") || loc.starts_with("https://") {
        return loc.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        loc.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_bounds() {
        assert!(Priority::new(0.0).is_ok());
        assert!(Priority::new(1.0).is_ok());
        assert_eq!(Priority::new(1.1), Err(LinkError::Priority(1.1)));
        assert!(Priority::new(-0.1).is_err());
        assert!(Priority::new(f64::NAN).is_err());
    }

    #[test]
    fn test_priority_display_one_decimal() {
        assert_eq!(Priority::new(0.5).unwrap().to_string(), "0.5");
        assert_eq!(Priority::new(1.0).unwrap().to_string(), "1.0");
        assert_eq!(Priority::new(0.26).unwrap().to_string(), "0.3");
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("0.8".parse::<Priority>().unwrap().get(), 0.8);
        assert!("high".parse::<Priority>().is_err());
        assert!("2".parse::<Priority>().is_err());
    }

    #[test]
    fn test_changefreq_parse_and_label() {
        assert_eq!("Weekly".parse::<ChangeFreq>().unwrap(), ChangeFreq::Weekly);
        assert_eq!("none".parse::<ChangeFreq>().unwrap(), ChangeFreq::None);
        assert!("fortnightly".parse::<ChangeFreq>().is_err());
        assert_eq!(ChangeFreq::Daily.label(), "Daily");
        assert_eq!(ChangeFreq::None.label(), "None");
    }

    #[test]
    fn test_extension_json_tagging() {
        let ext = LinkExtension::File {
            path: "posts/a.md".into(),
            bytes: 42,
        };
        let json = serde_json::to_string(&ext).unwrap();
        assert_eq!(json, r#"{"kind":"file","path":"posts/a.md","bytes":42}"#);

        let none: LinkExtension = serde_json::from_str(r#"{"kind":"none"}"#).unwrap();
        assert_eq!(none, LinkExtension::None);
    }

    #[test]
    fn test_absolute_loc() {
        let link = Link::new("page", "about", "/about/");
        assert_eq!(
            link.absolute_loc("https://example.com/"),
            "https://example.com/about/"
        );

        let front = Link::new(FRONTPAGE_TYPE, "frontpage", "/");
        assert_eq!(front.absolute_loc("https://example.com"), "https://example.com/");

        let external = Link::new(CUSTOM_TYPE, "1", "https://cdn.example.com/a.pdf");
        assert_eq!(
            external.absolute_loc("https://example.com"),
            "https://cdn.example.com/a.pdf"
        );
    }

    #[test]
    fn test_link_defaults() {
        let link = Link::new("page", "x", "/x/");
        assert_eq!(link.language, LANGUAGE_NEUTRAL);
        assert!(link.visible);
        assert!(!link.customized);
        assert_eq!(link.priority, Priority::DEFAULT);
        assert!(link.validate().is_ok());
        assert_eq!(
            Link::new("page", "y", " ").validate(),
            Err(LinkError::EmptyLoc)
        );
    }
}
