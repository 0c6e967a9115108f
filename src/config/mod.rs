//! Configuration management for `sitemill.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── batch      # [batch]
//! │   ├── context    # [[contexts]]
//! │   ├── serve      # [serve]
//! │   ├── site       # [site]
//! │   ├── sitemap    # [sitemap]
//! │   ├── source     # [frontpage] and [[sources]]
//! │   ├── store      # [store]
//! │   └── xsl        # [xsl]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   ├── field      # FieldPath
//! │   └── handle     # Global config handle
//! └── mod.rs         # SiteConfig (this file)
//! ```

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{
    BatchConfig, ContextConfig, FrontpageConfig, ServeConfig, SiteSectionConfig,
    SitemapSectionConfig, SourceConfig, SourceKind, StoreConfig, XSL_STRINGS, XslConfig,
};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath, cfg, init_config};

use crate::cli::{Cli, Commands};
use crate::core::ContextSpec;
use crate::generator::WriterOptions;
use crate::log;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name.
pub const CONFIG_FILE: &str = "sitemill.toml";

const CONTEXT_TYPES: FieldPath = FieldPath::new("contexts.types");

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing sitemill.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub site: SiteSectionConfig,

    #[serde(default)]
    pub contexts: Vec<ContextConfig>,

    #[serde(default)]
    pub sitemap: SitemapSectionConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub frontpage: FrontpageConfig,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub xsl: XslConfig,
}

impl SiteConfig {
    /// Load configuration for the parsed command line.
    ///
    /// For every command but `init`, searches upward from cwd for the config
    /// file. The project root is the config file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let (config_path, exists) = Self::resolve_config_path(cli)?;

        if !cli.is_init() && !exists {
            bail!(ConfigError::Validation(format!(
                "config file '{}' not found, run 'sitemill init' to create one",
                cli.config.display()
            )));
        }

        let mut config = if exists && !cli.is_init() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };

        config.config_path = config_path;
        config.finalize(cli);

        if !cli.is_init() {
            config.validate()?;
        }

        Ok(config)
    }

    fn resolve_config_path(cli: &Cli) -> Result<(PathBuf, bool)> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        match &cli.command {
            Commands::Init { name: Some(name), .. } => {
                let path = cwd.join(name).join(&cli.config);
                let exists = path.exists();
                Ok((path, exists))
            }
            Commands::Init { name: None, .. } => {
                let path = cwd.join(&cli.config);
                let exists = path.exists();
                Ok((path, exists))
            }
            _ => match find_config_file(&cli.config) {
                Some(path) => Ok((path, true)),
                None => Ok((cwd.join(&cli.config), false)),
            },
        }
    }

    fn finalize(&mut self, cli: &Cli) {
        let root = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let root = crate::utils::path::normalize_path(&root);

        self.config_path = crate::utils::path::normalize_path(&self.config_path);
        self.sitemap.output = crate::utils::path::resolve_under(&root, &self.sitemap.output);
        self.store.path = crate::utils::path::resolve_under(&root, &self.store.path);
        for source in &mut self.sources {
            source.path = crate::utils::path::resolve_under(&root, &source.path);
        }
        self.root = root;

        self.apply_command_options(cli);
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Unknown fields are reported and skipped; cron runs unattended and must
    /// not block on a prompt.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    // ========================================================================
    // derived values
    // ========================================================================

    /// Configured sitemaps, or a single all-inclusive one at `/`.
    pub fn context_specs(&self) -> Vec<ContextSpec> {
        if self.contexts.is_empty() {
            return vec![ContextConfig::default().to_spec()];
        }
        self.contexts.iter().map(ContextConfig::to_spec).collect()
    }

    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            max_links: self.sitemap.max_links,
            max_bytes: self.sitemap.max_bytes,
            minify: self.sitemap.minify,
            stylesheet: self.sitemap.stylesheet,
            ..WriterOptions::new(&self.sitemap.output, self.site.base_url())
        }
    }

    /// Fingerprint of everything that decides which links exist. A change
    /// means stored links may be stale.
    pub fn sources_fingerprint(&self) -> String {
        let describe = serde_json::json!({
            "frontpage": self.frontpage,
            "sources": self.sources,
            "site": self.site.base_url(),
        });
        crate::utils::hash::fingerprint(&describe.to_string())
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    fn apply_command_options(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.verbose);

        match &cli.command {
            Commands::Serve { interface, port } => {
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
            }
            Commands::Cron { time_limit } => {
                Self::update_option(&mut self.batch.time_limit, time_limit.as_ref());
            }
            _ => {}
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.site.validate(&mut diag);
        ContextConfig::validate_all(&self.contexts, &mut diag);
        self.sitemap.validate(&mut diag);
        self.batch.validate(&mut diag);
        self.frontpage.validate(&mut diag);
        SourceConfig::validate_all(&self.sources, &mut diag);
        self.xsl.validate(&mut diag);
        self.check_context_types(&mut diag);

        diag.print_warnings();

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }

    /// Context type filters naming no configured type select nothing.
    fn check_context_types(&self, diag: &mut ConfigDiagnostics) {
        let known: Vec<&str> = self
            .sources
            .iter()
            .map(|s| s.link_type.as_str())
            .chain([crate::core::FRONTPAGE_TYPE, crate::core::CUSTOM_TYPE])
            .collect();
        for ctx in &self.contexts {
            for t in &ctx.types {
                if !known.contains(&t.as_str()) {
                    diag.warn(
                        CONTEXT_TYPES,
                        format!("context `{}` lists unknown type `{t}`", ctx.base_path),
                    );
                }
            }
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config with the required `[site]` url.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> SiteConfig {
    let config = format!("[site]\nurl = \"https://example.com\"\n{extra}");
    let (parsed, ignored) = SiteConfig::parse_with_ignored(&config).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_collected() {
        let (_, ignored) =
            SiteConfig::parse_with_ignored("[site]\nurl = \"https://a.b\"\ncolour = 1\n[nope]\nx = 1")
                .unwrap();
        assert_eq!(ignored, vec!["site.colour", "nope"]);
    }

    #[test]
    fn test_valid_config_passes() {
        let mut config = test_parse_config(
            "[[sources]]\ntype = \"posts\"\npath = \"content\"\n[[contexts]]\ntypes = [\"posts\"]",
        );
        config.root = PathBuf::from("/site");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config_collects_errors() {
        let config = SiteConfig::from_str("[sitemap]\nmax_links = 0").unwrap();
        let err = config.validate().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("site.url"));
        assert!(text.contains("sitemap.max_links"));
    }

    #[test]
    fn test_sources_fingerprint_tracks_sources() {
        let a = test_parse_config("[[sources]]\ntype = \"posts\"\npath = \"content\"");
        let b = test_parse_config("[[sources]]\ntype = \"posts\"\npath = \"content\"");
        let c = test_parse_config("[[sources]]\ntype = \"posts\"\npath = \"other\"");
        assert_eq!(a.sources_fingerprint(), b.sources_fingerprint());
        assert_ne!(a.sources_fingerprint(), c.sources_fingerprint());

        // Output settings do not affect which links exist
        let d = test_parse_config(
            "[sitemap]\nminify = true\n[[sources]]\ntype = \"posts\"\npath = \"content\"",
        );
        assert_eq!(a.sources_fingerprint(), d.sources_fingerprint());
    }

    #[test]
    fn test_writer_options_from_config() {
        let config = test_parse_config("[sitemap]\nmax_links = 10\nminify = true");
        let options = config.writer_options();
        assert_eq!(options.base_url, "https://example.com");
        assert_eq!(options.max_links, 10);
        assert!(options.minify);
    }
}
