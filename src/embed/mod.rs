//! Embedded static resources for sitemill.
//!
//! # Module Structure
//!
//! - `template` - Embedded resources with typed placeholders
//! - `xsl` - Browser stylesheet for sitemap files (XSL, CSS, JS)
//! - `serve` - Server pages (developer diagnostics)
//! - `init` - Starter `sitemill.toml`
//!
//! # Usage
//!
//! ```ignore
//! use embed::xsl::{SITEMAP_XSL, XslVars};
//!
//! let xsl = SITEMAP_XSL.render(&XslVars {
//!     css: "/sitemap.xsl.css",
//!     js: "/sitemap.xsl.js",
//!     strings: &config.xsl,
//! });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod xsl {
    use quick_xml::escape::escape;

    use super::{Template, TemplateVars};
    use crate::config::{XSL_STRINGS, XslConfig};

    const CSS_PLACEHOLDER: &str = "[xsl-css]";
    const JS_PLACEHOLDER: &str = "[xsl-js]";

    /// Variables for sitemap.xsl.
    pub struct XslVars<'a> {
        /// Route of the stylesheet's CSS.
        pub css: &'a str,
        /// Route of the sorting script.
        pub js: &'a str,
        pub strings: &'a XslConfig,
    }

    impl TemplateVars for XslVars<'_> {
        /// Single pass over the content so a replacement is never replaced
        /// again.
        fn apply(&self, content: &str) -> String {
            let mut table: Vec<(&str, String)> = XSL_STRINGS
                .iter()
                .map(|s| (*s, escape(self.strings.translate(s)).into_owned()))
                .collect();
            table.push((CSS_PLACEHOLDER, escape(self.css).into_owned()));
            table.push((JS_PLACEHOLDER, escape(self.js).into_owned()));
            // Longest first, so no key shadows a longer one sharing its prefix
            table.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
            replace_once(content, &table)
        }
    }

    fn replace_once(content: &str, table: &[(&str, String)]) -> String {
        let mut out = String::with_capacity(content.len());
        let mut rest = content;
        'scan: while let Some(c) = rest.chars().next() {
            for (from, to) in table {
                if let Some(tail) = rest.strip_prefix(from) {
                    out.push_str(to);
                    rest = tail;
                    continue 'scan;
                }
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
        out
    }

    /// Stylesheet rendering sitemap and index files as sortable tables.
    pub const SITEMAP_XSL: Template<XslVars<'static>> =
        Template::new(include_str!("xsl/sitemap.xsl"));

    pub const XSL_CSS: &str = include_str!("xsl/sitemap.xsl.css");

    pub const XSL_JS: &str = include_str!("xsl/sitemap.xsl.js");

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::config::test_parse_config;

        fn render(config: &XslConfig) -> String {
            SITEMAP_XSL.render(&XslVars {
                css: "/fr/sitemap.xsl.css",
                js: "/fr/sitemap.xsl.js",
                strings: config,
            })
        }

        #[test]
        fn test_placeholders_replaced() {
            let xsl = render(&XslConfig::default());
            assert!(xsl.contains("href=\"/fr/sitemap.xsl.css\""));
            assert!(xsl.contains("src=\"/fr/sitemap.xsl.js\""));
            assert!(!xsl.contains(CSS_PLACEHOLDER));
            assert!(!xsl.contains(JS_PLACEHOLDER));
            assert!(xsl.contains("<th>Priority</th>"));
        }

        #[test]
        fn test_translated_strings_escaped_once() {
            let config = test_parse_config(
                "[xsl.strings]\n\"Priority\" = \"Priorité & poids\"\n\"Sitemap URL\" = \"Priority URL\"",
            );
            let xsl = render(&config.xsl);
            assert!(xsl.contains("<th>Priorité &amp; poids</th>"));
            // A replacement containing another key is left alone
            assert!(xsl.contains("<th>Priority URL</th>"));
        }

        #[test]
        fn test_every_string_present_in_template() {
            for s in XSL_STRINGS {
                assert!(SITEMAP_XSL.content().contains(s), "missing `{s}`");
            }
        }
    }
}

pub mod serve {
    use quick_xml::escape::escape;

    use super::{Template, TemplateVars};

    /// Variables for developer.html.
    pub struct DeveloperVars<'a> {
        pub context: &'a str,
        pub sitemap: &'a str,
        pub chunk: &'a str,
        pub file: &'a str,
        pub exists: bool,
    }

    impl TemplateVars for DeveloperVars<'_> {
        fn apply(&self, content: &str) -> String {
            let (exists, class) = if self.exists {
                ("Yes", "present")
            } else {
                ("No", "missing")
            };
            content
                .replace("__CONTEXT__", &escape(self.context))
                .replace("__SITEMAP__", &escape(self.sitemap))
                .replace("__CHUNK__", &escape(self.chunk))
                .replace("__FILE__", &escape(self.file))
                .replace("__EXISTS_CLASS__", class)
                .replace("__EXISTS__", exists)
        }
    }

    /// Diagnostics shown instead of the sitemap in developer mode.
    pub const DEVELOPER_HTML: Template<DeveloperVars<'static>> =
        Template::new(include_str!("serve/developer.html"));
}

pub mod init {
    use super::{Template, TemplateVars};

    /// Variables for the starter sitemill.toml.
    pub struct InitVars<'a> {
        pub base_url: &'a str,
    }

    impl TemplateVars for InitVars<'_> {
        fn apply(&self, content: &str) -> String {
            content.replace("__BASE_URL__", self.base_url)
        }
    }

    pub const CONFIG_TOML: Template<InitVars<'static>> =
        Template::new(include_str!("init/sitemill.toml"));

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::config::SiteConfig;

        #[test]
        fn test_starter_config_is_valid() {
            let toml = CONFIG_TOML.render(&InitVars {
                base_url: "https://example.com",
            });
            let config = SiteConfig::from_str(&toml).unwrap();
            assert_eq!(config.site.base_url(), "https://example.com");
            assert_eq!(config.sources.len(), 1);
            config.validate().unwrap();
        }
    }
}
