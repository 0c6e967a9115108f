//! Sitemap contexts.
//!
//! A context identifies one sitemap: which language it covers, under which
//! base path it is served, and an optional variant name. Its fingerprint is
//! the sitemap id and the name of its output directory.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::{hash, path::normalize_base_path};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SitemapContext {
    /// `None` covers every language.
    pub language: Option<String>,
    /// Always in `/segment/` form.
    pub base_path: String,
    pub variant: Option<String>,
}

impl Default for SitemapContext {
    fn default() -> Self {
        Self {
            language: None,
            base_path: "/".to_string(),
            variant: None,
        }
    }
}

impl SitemapContext {
    pub fn new(language: Option<&str>, base_path: &str, variant: Option<&str>) -> Self {
        Self {
            language: language.map(str::to_string),
            base_path: normalize_base_path(base_path),
            variant: variant.map(str::to_string),
        }
    }

    /// Canonical key, stable across runs.
    pub fn key(&self) -> String {
        format!(
            "language={};base={};variant={}",
            self.language.as_deref().unwrap_or("*"),
            self.base_path,
            self.variant.as_deref().unwrap_or("")
        )
    }

    /// Sitemap id derived from the key.
    pub fn id(&self) -> String {
        hash::fingerprint(&self.key())
    }

    pub fn sitemap_route(&self) -> String {
        format!("{}sitemap.xml", self.base_path)
    }

    pub fn stylesheet_route(&self) -> String {
        format!("{}sitemap.xsl", self.base_path)
    }
}

impl fmt::Display for SitemapContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_path)?;
        if let Some(language) = &self.language {
            write!(f, " [{language}]")?;
        }
        if let Some(variant) = &self.variant {
            write!(f, " ({variant})")?;
        }
        Ok(())
    }
}

/// A context plus the link types it includes (empty means all types).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSpec {
    pub context: SitemapContext,
    pub types: Vec<String>,
}

impl ContextSpec {
    pub fn new(context: SitemapContext, types: Vec<String>) -> Self {
        Self { context, types }
    }

    pub fn id(&self) -> String {
        self.context.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_path_normalized() {
        let ctx = SitemapContext::new(Some("fr"), "fr", None);
        assert_eq!(ctx.base_path, "/fr/");
        assert_eq!(ctx.sitemap_route(), "/fr/sitemap.xml");
        assert_eq!(ctx.stylesheet_route(), "/fr/sitemap.xsl");
    }

    #[test]
    fn test_id_stable_and_distinct() {
        let a = SitemapContext::new(Some("fr"), "/fr/", None);
        let b = SitemapContext::new(Some("fr"), "fr", None);
        let c = SitemapContext::new(Some("fr"), "/fr/", Some("news"));
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }
}
