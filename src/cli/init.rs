//! `sitemill init`: starter configuration.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SiteConfig;
use crate::embed::init::{CONFIG_TOML, InitVars};
use crate::log;

/// Directory for the link store and generated files.
const STATE_DIR: &str = ".sitemill/";

/// Write a starter `sitemill.toml` (and a `.gitignore` for the state
/// directory) into the project root. Returns the config path.
pub fn new_project(config: &SiteConfig, site_url: &str, force: bool) -> Result<PathBuf> {
    let url = url::Url::parse(site_url).with_context(|| format!("invalid site URL `{site_url}`"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("site URL must use http or https, got `{site_url}`");
    }

    let path = &config.config_path;
    if path.exists() && !force {
        bail!("{} already exists, use --force to overwrite it", path.display());
    }

    let root = config.get_root();
    fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))?;

    let content = CONFIG_TOML.render(&InitVars {
        base_url: site_url.trim_end_matches('/'),
    });
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    write_ignore_file(root)?;

    log!("init"; "wrote {}", path.display());
    log!("init"; "next: edit [[sources]], then run `sitemill rebuild`");
    Ok(path.clone())
}

/// Add the state directory to `.gitignore`, keeping existing entries.
fn write_ignore_file(root: &Path) -> Result<()> {
    let path = root.join(".gitignore");
    let existing = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    if existing.lines().any(|line| line.trim() == STATE_DIR) {
        return Ok(());
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(STATE_DIR);
    content.push('\n');
    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_at(dir: &Path) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.root = dir.to_path_buf();
        config.config_path = dir.join("sitemill.toml");
        config
    }

    #[test]
    fn test_writes_valid_config() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("site");
        let path = new_project(&config_at(&root), "https://example.org/", false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("url = \"https://example.org\""));
        let parsed = SiteConfig::from_str(&content).unwrap();
        parsed.validate().unwrap();
        assert_eq!(fs::read_to_string(root.join(".gitignore")).unwrap(), ".sitemill/\n");
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let config = config_at(dir.path());
        new_project(&config, "https://example.org", false).unwrap();
        assert!(new_project(&config, "https://example.org", false).is_err());
        new_project(&config, "https://example.org", true).unwrap();

        // Entry is not duplicated
        let ignore = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(ignore.matches(STATE_DIR).count(), 1);
    }

    #[test]
    fn test_rejects_bad_url() {
        let dir = TempDir::new().unwrap();
        assert!(new_project(&config_at(dir.path()), "ftp://example.org", false).is_err());
        assert!(new_project(&config_at(dir.path()), "not a url", false).is_err());
    }
}
