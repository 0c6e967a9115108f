//! `[site]` section configuration.
//!
//! ```toml
//! [site]
//! url = "https://example.com"   # Absolute base URL written into every <loc>
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

const URL: FieldPath = FieldPath::new("site.url");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSectionConfig {
    /// Public base URL of the site.
    pub url: String,
}

impl SiteSectionConfig {
    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// # Checks
    /// - `url` is set
    /// - `url` parses, uses http(s) and has a host
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.url.trim().is_empty() {
            diag.error_with_hint(
                URL,
                format!("{URL} is required"),
                "set it to the public address, e.g. \"https://example.com\"",
            );
            return;
        }

        match url::Url::parse(&self.url) {
            Ok(parsed) => {
                if !matches!(parsed.scheme(), "http" | "https") {
                    diag.error_with_hint(
                        URL,
                        format!("scheme '{}' not supported, must be http or https", parsed.scheme()),
                        "use format like https://example.com",
                    );
                }
                if parsed.host_str().is_none() {
                    diag.error_with_hint(
                        URL,
                        "URL must have a valid host",
                        "use format like https://example.com",
                    );
                }
                if parsed.query().is_some() || parsed.fragment().is_some() {
                    diag.error(URL, "URL must not contain a query or fragment");
                }
            }
            Err(e) => {
                diag.error_with_hint(
                    URL,
                    format!("invalid URL: {e}"),
                    "use format like https://example.com",
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ConfigDiagnostics, test_parse_config};

    fn errors(url: &str) -> usize {
        let config = config_with_url(url);
        let mut diag = ConfigDiagnostics::new();
        config.site.validate(&mut diag);
        diag.len()
    }

    fn config_with_url(url: &str) -> crate::config::SiteConfig {
        let mut config = test_parse_config("");
        config.site.url = url.to_string();
        config
    }

    #[test]
    fn test_base_url_trims_slash() {
        let config = config_with_url("https://example.com/blog/");
        assert_eq!(config.site.base_url(), "https://example.com/blog");
    }

    #[test]
    fn test_url_validation() {
        assert_eq!(errors("https://example.com"), 0);
        assert_eq!(errors("http://localhost:5277"), 0);
        assert_eq!(errors(""), 1);
        assert_eq!(errors("ftp://example.com"), 1);
        assert_eq!(errors("not a url"), 1);
        assert_eq!(errors("https://example.com/?a=1"), 1);
    }
}
