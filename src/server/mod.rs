//! Sitemap read path.
//!
//! Maps a request to a sitemap file without touching HTTP types, so the
//! server loop in `cli::serve` only translates [`Reply`] and
//! [`SitemapError`] into responses.
//!
//! The only side effect is the lazy regenerate signal raised when a sitemap
//! record points at a file that is gone.

mod route;

pub use route::{Resource, route};

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{SiteConfig, XslConfig};
use crate::core::{ChunkId, ContextSpec, SitemapError, SitemapRecord, SitemapStatus};
use crate::embed::serve::{DEVELOPER_HTML, DeveloperVars};
use crate::embed::xsl::{SITEMAP_XSL, XSL_CSS, XSL_JS, XslVars};
use crate::store::Store;
use crate::tracker::{Flag, StateTracker};
use crate::utils::mime::types;
use crate::{debug, log};

/// A resolved sitemap file.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkLocation {
    pub record: SitemapRecord,
    pub chunk: ChunkId,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Sitemap file on disk.
    File(PathBuf),
    /// Diagnostics in place of the file (developer mode).
    Developer(String),
    /// Rendered XSL stylesheet.
    Stylesheet(String),
    Asset {
        body: &'static str,
        content_type: &'static str,
    },
}

pub struct SitemapServer {
    store: Arc<Store>,
    tracker: StateTracker,
    output: PathBuf,
    contexts: Vec<ContextSpec>,
    xsl: XslConfig,
}

impl SitemapServer {
    pub fn new(
        store: Arc<Store>,
        output: impl Into<PathBuf>,
        contexts: Vec<ContextSpec>,
        xsl: XslConfig,
    ) -> Self {
        Self {
            tracker: StateTracker::new(Arc::clone(&store)),
            store,
            output: output.into(),
            contexts,
            xsl,
        }
    }

    pub fn from_config(config: &SiteConfig, store: Arc<Store>) -> Self {
        Self::new(
            store,
            &config.sitemap.output,
            config.context_specs(),
            config.xsl.clone(),
        )
    }

    /// Answer a raw request URL.
    pub fn handle(&self, url: &str) -> Result<Reply, SitemapError> {
        let Some(route) = route(&self.contexts, url) else {
            return Err(SitemapError::NotFound(url.to_string()));
        };
        let base = route.spec.context.base_path.as_str();

        match route.resource {
            Resource::Sitemap => self.serve(route.spec, route.page.as_deref()),
            Resource::Stylesheet => Ok(Reply::Stylesheet(SITEMAP_XSL.render(&XslVars {
                css: &format!("{base}sitemap.xsl.css"),
                js: &format!("{base}sitemap.xsl.js"),
                strings: &self.xsl,
            }))),
            Resource::StylesheetCss => Ok(Reply::Asset {
                body: XSL_CSS,
                content_type: types::CSS,
            }),
            Resource::StylesheetJs => Ok(Reply::Asset {
                body: XSL_JS,
                content_type: types::JAVASCRIPT,
            }),
        }
    }

    /// Locate the file a request for `spec` refers to.
    ///
    /// Fails with `NotFound` when the context has no successfully written
    /// sitemap yet or `page` is past the last chunk.
    pub fn resolve(&self, spec: &ContextSpec, page: Option<&str>) -> Result<ChunkLocation, SitemapError> {
        let record = self
            .store
            .load_sitemap(&spec.id())?
            .filter(|record| record.status == SitemapStatus::Ready)
            .ok_or_else(|| SitemapError::NotFound(spec.context.to_string()))?;

        let chunk = current_chunk(&record, page).ok_or_else(|| {
            SitemapError::NotFound(format!("{} page {}", spec.context, page.unwrap_or_default()))
        })?;

        let path = record.dir(&self.output).join(chunk.file_name());
        Ok(ChunkLocation {
            record,
            chunk,
            path,
        })
    }

    /// Serve the sitemap file for `spec`, or the diagnostics page in
    /// developer mode.
    pub fn serve(&self, spec: &ContextSpec, page: Option<&str>) -> Result<Reply, SitemapError> {
        let location = self.resolve(spec, page)?;
        let exists = location.path.is_file();

        if self.tracker.get(Flag::DeveloperMode)? {
            return Ok(Reply::Developer(developer_page(spec, &location, exists)));
        }
        if exists {
            return Ok(Reply::File(location.path));
        }

        if !self.tracker.get(Flag::RegenerateNeeded)? {
            self.tracker.mark_regenerate()?;
            log!("serve"; "{} is missing, regenerate queued", location.path.display());
        } else {
            debug!("serve"; "{} is missing", location.path.display());
        }
        Err(SitemapError::StaleFile {
            sitemap: location.record.id,
            path: location.path,
        })
    }
}

/// Which file `page` selects.
///
/// A missing, non-numeric or zero page selects the index when the sitemap
/// has several chunks, otherwise its only chunk. `None` past the last chunk.
pub fn current_chunk(record: &SitemapRecord, page: Option<&str>) -> Option<ChunkId> {
    match page.and_then(|p| p.trim().parse::<u32>().ok()) {
        None | Some(0) if record.has_index() => Some(ChunkId::Index),
        None | Some(0) => Some(ChunkId::Page(1)),
        Some(n) if n <= record.chunks => Some(ChunkId::Page(n)),
        Some(_) => None,
    }
}

fn developer_page(spec: &ContextSpec, location: &ChunkLocation, exists: bool) -> String {
    DEVELOPER_HTML.render(&DeveloperVars {
        context: &format!("{:#?}", spec),
        sitemap: &format!("{:#?}", location.record),
        chunk: &location.chunk.to_string(),
        file: &location.path.display().to_string(),
        exists,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Link, SitemapContext};
    use crate::generator::{ChunkWriter, WriterOptions};
    use crate::store::test_support::memory_store;
    use std::fs;
    use tempfile::TempDir;

    struct Site {
        _dir: TempDir,
        store: Arc<Store>,
        writer: ChunkWriter,
        server: SitemapServer,
    }

    /// `n` visible links, chunks of 2, one context at `/` and one at `/fr/`.
    fn site(n: usize) -> Site {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(memory_store());
        let tracker = StateTracker::new(Arc::clone(&store));
        tracker.install().unwrap();
        for i in 0..n {
            store
                .insert_link(&Link::new("posts", i.to_string(), format!("/p/{i}/")))
                .unwrap();
        }

        let contexts = vec![
            ContextSpec::new(SitemapContext::default(), vec![]),
            ContextSpec::new(SitemapContext::new(Some("fr"), "/fr/", None), vec![]),
        ];
        let mut options = WriterOptions::new(dir.path(), "https://example.com");
        options.max_links = 2;
        let writer = ChunkWriter::new(Arc::clone(&store), tracker, options, contexts.clone());
        let server = SitemapServer::new(Arc::clone(&store), dir.path(), contexts, XslConfig::default());
        Site {
            _dir: dir,
            store,
            writer,
            server,
        }
    }

    fn record(chunks: u32) -> SitemapRecord {
        SitemapRecord {
            id: "x".into(),
            context: SitemapContext::default(),
            chunks,
            links: 0,
            max_links: 2,
            generated_at: 0,
            epoch: 0,
            status: SitemapStatus::Ready,
        }
    }

    #[test]
    fn test_current_chunk() {
        let single = record(1);
        assert_eq!(current_chunk(&single, None), Some(ChunkId::Page(1)));
        assert_eq!(current_chunk(&single, Some("0")), Some(ChunkId::Page(1)));
        assert_eq!(current_chunk(&single, Some("2")), None);

        let many = record(3);
        assert_eq!(current_chunk(&many, None), Some(ChunkId::Index));
        assert_eq!(current_chunk(&many, Some("abc")), Some(ChunkId::Index));
        assert_eq!(current_chunk(&many, Some("2")), Some(ChunkId::Page(2)));
        assert_eq!(current_chunk(&many, Some("3")), Some(ChunkId::Page(3)));
        assert_eq!(current_chunk(&many, Some("4")), None);
    }

    #[test]
    fn test_serves_index_and_chunks() {
        let site = site(5);
        site.writer.write_all().unwrap();

        let Reply::File(index) = site.server.handle("/sitemap.xml").unwrap() else {
            panic!("expected file");
        };
        assert!(index.ends_with("index.xml"));

        let Reply::File(chunk) = site.server.handle("/fr/sitemap.xml?page=3").unwrap() else {
            panic!("expected file");
        };
        assert!(chunk.ends_with("3.xml"));
        assert!(fs::read_to_string(chunk).unwrap().contains("/p/4/"));

        let err = site.server.handle("/sitemap.xml?page=4").unwrap_err();
        assert!(matches!(err, SitemapError::NotFound(_)));
    }

    #[test]
    fn test_failed_regenerate_keeps_serving_last_sitemap() {
        let site = site(5);
        let records = site.writer.write_all().unwrap();
        assert_eq!(records[0].chunks, 3);

        // Chunk 2 can no longer be replaced
        let blocked = records[0].dir(site._dir.path()).join("2.xml");
        fs::remove_file(&blocked).unwrap();
        fs::create_dir_all(blocked.join("keep")).unwrap();
        let spec = site.writer.contexts()[0].clone();
        site.store
            .insert_link(&Link::new("posts", "new", "/p/new/"))
            .unwrap();
        assert!(site.writer.write(&spec).is_err());

        assert_eq!(site.store.load_sitemap(&spec.id()).unwrap().as_ref(), Some(&records[0]));
        let Reply::File(index) = site.server.handle("/sitemap.xml").unwrap() else {
            panic!("expected file");
        };
        assert!(index.ends_with("index.xml"));
        let Reply::File(last) = site.server.handle("/sitemap.xml?page=3").unwrap() else {
            panic!("expected file");
        };
        assert!(last.ends_with("3.xml"));
    }

    #[test]
    fn test_first_write_failure_is_not_found() {
        let site = site(1);
        let spec = site.writer.contexts()[0].clone();
        fs::write(site._dir.path().join(spec.id()), "not a directory").unwrap();

        assert!(site.writer.write(&spec).is_err());
        let record = site.store.load_sitemap(&spec.id()).unwrap().unwrap();
        assert_eq!(record.status, SitemapStatus::Failed);
        assert!(matches!(
            site.server.handle("/sitemap.xml").unwrap_err(),
            SitemapError::NotFound(_)
        ));
    }

    #[test]
    fn test_unknown_context_not_found() {
        let site = site(1);
        // Nothing generated yet
        assert!(site.server.handle("/sitemap.xml").unwrap_err().is_not_found());
        assert!(site.server.handle("/de/sitemap.xml").unwrap_err().is_not_found());
    }

    #[test]
    fn test_missing_file_signals_regenerate() {
        let site = site(1);
        let records = site.writer.write_all().unwrap();
        let tracker = StateTracker::new(Arc::clone(&site.store));
        tracker.clear_rebuild().unwrap();
        site.writer.settle().unwrap();
        assert!(!tracker.get(Flag::RegenerateNeeded).unwrap());

        let path = match site.server.handle("/sitemap.xml").unwrap() {
            Reply::File(path) => path,
            other => panic!("unexpected {other:?}"),
        };
        fs::remove_file(&path).unwrap();

        let err = site.server.handle("/sitemap.xml").unwrap_err();
        assert!(matches!(err, SitemapError::StaleFile { ref sitemap, .. } if *sitemap == records[0].id));
        assert!(err.is_not_found());
        assert!(tracker.get(Flag::RegenerateNeeded).unwrap());
    }

    #[test]
    fn test_developer_mode_shows_diagnostics() {
        let site = site(1);
        site.writer.write_all().unwrap();
        StateTracker::new(Arc::clone(&site.store))
            .set_developer_mode(true)
            .unwrap();

        let Reply::Developer(html) = site.server.handle("/fr/sitemap.xml").unwrap() else {
            panic!("expected diagnostics");
        };
        assert!(html.contains("1.xml"));
        assert!(html.contains("Yes"));
        assert!(html.contains("base_path: &quot;/fr/&quot;"));
    }

    #[test]
    fn test_stylesheet_resources() {
        let site = site(0);
        let Reply::Stylesheet(xsl) = site.server.handle("/fr/sitemap.xsl").unwrap() else {
            panic!("expected stylesheet");
        };
        assert!(xsl.contains("/fr/sitemap.xsl.css"));
        assert!(xsl.contains("/fr/sitemap.xsl.js"));

        assert!(matches!(
            site.server.handle("/sitemap.xsl.css").unwrap(),
            Reply::Asset { content_type, .. } if content_type == types::CSS
        ));
        assert!(matches!(
            site.server.handle("/sitemap.xsl.js").unwrap(),
            Reply::Asset { content_type, .. } if content_type == types::JAVASCRIPT
        ));
    }
}
