//! `[[contexts]]` configuration.
//!
//! Each entry is one sitemap. Without any entry a single sitemap at `/`
//! covering every language and type is generated.
//!
//! ```toml
//! [[contexts]]
//! language = "fr"        # Links in `fr` plus language-neutral links
//! base_path = "/fr/"     # Served at /fr/sitemap.xml
//!
//! [[contexts]]
//! base_path = "/news/"
//! variant = "news"
//! types = ["posts"]      # Restrict to these link types
//! ```

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::core::{ContextSpec, SitemapContext};

const LANGUAGE: FieldPath = FieldPath::new("contexts.language");
const BASE_PATH: FieldPath = FieldPath::new("contexts.base_path");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub language: Option<String>,
    pub base_path: String,
    pub variant: Option<String>,
    pub types: Vec<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            language: None,
            base_path: "/".into(),
            variant: None,
            types: Vec::new(),
        }
    }
}

impl ContextConfig {
    pub fn to_spec(&self) -> ContextSpec {
        ContextSpec::new(
            SitemapContext::new(
                self.language.as_deref(),
                &self.base_path,
                self.variant.as_deref(),
            ),
            self.types.clone(),
        )
    }

    /// # Checks
    /// - `language`, when set, is not empty
    /// - `base_path` has no `..` segment and no query
    /// - no two contexts share a base path
    pub fn validate_all(contexts: &[Self], diag: &mut ConfigDiagnostics) {
        let mut seen = FxHashSet::default();
        for (i, ctx) in contexts.iter().enumerate() {
            if ctx.language.as_deref().is_some_and(|l| l.trim().is_empty()) {
                diag.error(LANGUAGE, format!("context #{} has an empty language", i + 1));
            }
            if ctx.base_path.contains("..") || ctx.base_path.contains('?') {
                diag.error_with_hint(
                    BASE_PATH,
                    format!("invalid base path `{}`", ctx.base_path),
                    "use a plain path like \"/fr/\"",
                );
            }
            let spec = ctx.to_spec();
            if !seen.insert(spec.context.base_path.clone()) {
                diag.error(
                    BASE_PATH,
                    format!("base path `{}` is used by more than one context", spec.context.base_path),
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
    fn test_contexts_parse() {
        let config = test_parse_config(
            r#"
[[contexts]]
language = "fr"
base_path = "fr"

[[contexts]]
base_path = "/news/"
variant = "news"
types = ["posts"]
"#,
        );
        let specs = config.context_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].context.base_path, "/fr/");
        assert_eq!(specs[0].context.language.as_deref(), Some("fr"));
        assert_eq!(specs[1].types, vec!["posts"]);
    }

    #[test]
    fn test_default_context() {
        let config = test_parse_config("");
        let specs = config.context_specs();
        assert_eq!(specs, vec![ContextSpec::new(SitemapContext::default(), vec![])]);
    }

    #[test]
    fn test_duplicate_base_path_rejected() {
        let contexts = vec![
            ContextConfig {
                base_path: "/fr/".into(),
                ..Default::default()
            },
            ContextConfig {
                base_path: "fr".into(),
                variant: Some("b".into()),
                ..Default::default()
            },
        ];
        let mut diag = ConfigDiagnostics::new();
        ContextConfig::validate_all(&contexts, &mut diag);
        assert_eq!(diag.len(), 1);
    }
}
