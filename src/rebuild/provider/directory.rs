//! Files below a directory, one link per file.
//!
//! ```text
//! content/posts/                 url_prefix = "/posts/"
//! ├── index.md          →  /posts/
//! ├── hello.md          →  /posts/hello/          language from config or `und`
//! ├── hello.fr.md       →  /posts/hello/          language `fr`
//! └── 2024/notes.html   →  /posts/2024/notes/
//! ```
//!
//! Translations share a source id and differ by language. The listing is
//! sorted so offsets stay stable between pages of one batch.

use jwalk::WalkDir;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Enumerated, LinkProvider};
use crate::config::SourceConfig;
use crate::core::{
    ChangeFreq, EnumerationError, InfrastructureError, LANGUAGE_NEUTRAL, Link, LinkExtension,
    Priority,
};
use crate::utils::date::unix_from_system;
use crate::utils::path::{normalize_base_path, to_slash};

pub struct DirectoryProvider {
    link_type: String,
    root: PathBuf,
    url_prefix: String,
    priority: Priority,
    changefreq: ChangeFreq,
    language: Option<String>,
    extensions: Vec<String>,
    /// Sorted relative paths, listed once per process.
    files: Mutex<Option<Arc<Vec<PathBuf>>>>,
}

impl DirectoryProvider {
    pub fn from_config(source: &SourceConfig) -> Self {
        Self {
            link_type: source.link_type.clone(),
            root: source.path.clone(),
            url_prefix: normalize_base_path(&source.url_prefix),
            priority: Priority::new(source.priority).unwrap_or(Priority::DEFAULT),
            changefreq: source.changefreq,
            language: source.language.clone(),
            extensions: source
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            files: Mutex::new(None),
        }
    }

    fn files(&self) -> Result<Arc<Vec<PathBuf>>, InfrastructureError> {
        let mut cached = self.files.lock();
        if let Some(files) = cached.as_ref() {
            return Ok(Arc::clone(files));
        }

        if !self.root.is_dir() {
            return Err(InfrastructureError::Provider {
                link_type: self.link_type.clone(),
                message: format!("directory `{}` not found", self.root.display()),
            });
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .skip_hidden(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path())
            .filter(|p| self.accepts(p))
            .filter_map(|p| p.strip_prefix(&self.root).ok().map(Path::to_path_buf))
            .collect();
        files.sort();

        let files = Arc::new(files);
        *cached = Some(Arc::clone(&files));
        Ok(files)
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    fn link_for(&self, relative: &Path) -> Enumerated {
        let display = relative.display().to_string();
        let error = |message: &str| EnumerationError::new(&self.link_type, &display, message);

        let slash = to_slash(relative).ok_or_else(|| error("path is not valid UTF-8"))?;
        let (dir, file) = match slash.rsplit_once('/') {
            Some((dir, file)) => (Some(dir), file),
            None => (None, slash.as_str()),
        };
        let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
        let (stem, language) = split_language(stem);
        if stem.is_empty() {
            return Err(error("file name has no stem"));
        }

        let mut route = String::new();
        if let Some(dir) = dir {
            route.push_str(dir);
            route.push('/');
        }
        let source_id = format!("{route}{stem}");
        if stem != "index" {
            route.push_str(stem);
            route.push('/');
        }

        let meta = fs::metadata(self.root.join(relative))
            .map_err(|e| error(&format!("cannot read file: {e}")))?;

        let language = language
            .or(self.language.as_deref())
            .unwrap_or(LANGUAGE_NEUTRAL);

        Ok(Link::new(&self.link_type, source_id, format!("{}{route}", self.url_prefix))
            .with_priority(self.priority)
            .with_changefreq(self.changefreq)
            .with_language(language)
            .with_lastmod(meta.modified().ok().and_then(unix_from_system))
            .with_extension(LinkExtension::File {
                path: slash.clone(),
                bytes: meta.len(),
            }))
    }
}

impl LinkProvider for DirectoryProvider {
    fn link_type(&self) -> &str {
        &self.link_type
    }

    fn count(&self) -> Result<u64, InfrastructureError> {
        Ok(self.files()?.len() as u64)
    }

    fn enumerate(&self, offset: u64, limit: usize) -> Result<Vec<Enumerated>, InfrastructureError> {
        let files = self.files()?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(files
            .iter()
            .skip(start)
            .take(limit)
            .map(|rel| self.link_for(rel))
            .collect())
    }
}

/// `hello.fr` → (`hello`, Some(`fr`)); `hello` → (`hello`, None).
fn split_language(stem: &str) -> (&str, Option<&str>) {
    match stem.rsplit_once('.') {
        Some((base, code)) if is_language_code(code) => (base, Some(code)),
        _ => (stem, None),
    }
}

/// `fr`, `pt-br`, `zh-hant`.
fn is_language_code(code: &str) -> bool {
    let (primary, region) = code.split_once('-').unwrap_or((code, ""));
    let primary_ok =
        (2..=3).contains(&primary.len()) && primary.bytes().all(|b| b.is_ascii_lowercase());
    let region_ok = region.is_empty()
        || ((2..=4).contains(&region.len()) && region.bytes().all(|b| b.is_ascii_alphanumeric()));
    primary_ok && region_ok
}
