//! Chunk writer.
//!
//! Visible links are read from the store in output order (priority desc,
//! location asc, language asc) and split into `urlset` files bounded by a
//! link count and a byte size. A `sitemapindex` is written only when more than
//! one chunk exists.
//!
//! ```text
//! <output>/<sitemap-id>/
//! ├── 1.xml
//! ├── 2.xml
//! └── index.xml   # only when chunks > 1
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::xml::{self, XmlStyle};
use crate::core::link::absolute_url;
use crate::core::sitemap::{INDEX_FILE, chunk_file_name, parse_chunk_file_name};
use crate::core::{ContextSpec, InfrastructureError, SitemapRecord, SitemapStatus, StoreResult};
use crate::freshness::{self, persist_if_changed};
use crate::store::{LinkFilter, Store};
use crate::tracker::StateTracker;
use crate::utils::date::unix_now;
use crate::{debug, debug_do, log};

/// Protocol limit on URLs per sitemap file.
pub const MAX_LINKS_PER_CHUNK: u32 = 50_000;
/// Protocol limit on uncompressed sitemap file size.
pub const MAX_BYTES_PER_CHUNK: u64 = 50 * 1024 * 1024;

const READ_PAGE: usize = 5_000;

#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub output: PathBuf,
    pub base_url: String,
    pub max_links: u32,
    pub max_bytes: u64,
    pub minify: bool,
    /// Link each file to the context's XSL stylesheet.
    pub stylesheet: bool,
}

impl WriterOptions {
    pub fn new(output: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            base_url: base_url.into(),
            max_links: MAX_LINKS_PER_CHUNK,
            max_bytes: MAX_BYTES_PER_CHUNK,
            minify: false,
            stylesheet: true,
        }
    }
}

pub struct ChunkWriter {
    store: Arc<Store>,
    tracker: StateTracker,
    options: WriterOptions,
    contexts: Vec<ContextSpec>,
}

/// Chunk being filled.
struct Pending {
    body: String,
    links: u32,
    lastmod: Option<i64>,
}

impl Pending {
    fn new() -> Self {
        Self {
            body: String::new(),
            links: 0,
            lastmod: None,
        }
    }
}

impl ChunkWriter {
    pub fn new(
        store: Arc<Store>,
        tracker: StateTracker,
        options: WriterOptions,
        contexts: Vec<ContextSpec>,
    ) -> Self {
        Self {
            store,
            tracker,
            options,
            contexts,
        }
    }

    pub fn contexts(&self) -> &[ContextSpec] {
        &self.contexts
    }

    fn context_ids(&self) -> Vec<String> {
        self.contexts.iter().map(ContextSpec::id).collect()
    }

    /// Write every configured context, then drop records and directories of
    /// contexts no longer configured.
    pub fn write_all(&self) -> StoreResult<Vec<SitemapRecord>> {
        let records = self
            .contexts
            .iter()
            .map(|spec| self.write(spec))
            .collect::<StoreResult<Vec<_>>>()?;
        self.prune()?;
        debug_do! {
            let links: u64 = records.iter().map(|r| r.links).sum();
            let chunks: u32 = records.iter().map(|r| r.chunks).sum();
            debug!("sitemap"; "{} sitemaps, {} chunks, {} links", records.len(), chunks, links);
        }
        Ok(records)
    }

    /// Write one context's sitemap files and record.
    ///
    /// The record carries the regenerate epoch observed before reading any
    /// link, so a change made while writing keeps `regenerate_needed` set.
    /// It is saved only once every file is on disk. A failed write keeps the
    /// last good record, which keeps serving the files it describes; a
    /// context that never succeeded gets a `Failed` record.
    pub fn write(&self, spec: &ContextSpec) -> StoreResult<SitemapRecord> {
        let epoch = self.tracker.current_epoch()?;
        let mut record = SitemapRecord {
            id: spec.id(),
            context: spec.context.clone(),
            chunks: 0,
            links: 0,
            max_links: self.options.max_links.max(1),
            generated_at: unix_now(),
            epoch,
            status: SitemapStatus::Ready,
        };

        if let Err(e) = self.write_files(spec, &mut record) {
            if self.store.load_sitemap(&record.id)?.is_none() {
                record.status = SitemapStatus::Failed;
                record.chunks = 0;
                record.links = 0;
                if let Err(save) = self.store.save_sitemap(&record) {
                    debug!("sitemap"; "could not mark {} failed: {}", record.id, save);
                }
            }
            return Err(e);
        }

        record.generated_at = unix_now();
        self.store.save_sitemap(&record)?;
        self.settle()?;
        log!("sitemap"; "{} ({} links, {} chunks)", spec.context, record.links, record.chunks);
        Ok(record)
    }

    fn write_files(&self, spec: &ContextSpec, record: &mut SitemapRecord) -> StoreResult<()> {
        let dir = record.dir(&self.options.output);
        let style = XmlStyle {
            minify: self.options.minify,
            stylesheet: self
                .options
                .stylesheet
                .then(|| spec.context.stylesheet_route()),
        };
        let open = xml::urlset_open(&style);
        let close = xml::urlset_close(&style);
        let frame = (open.len() + close.len()) as u64;
        let max_links = record.max_links;

        let filter = LinkFilter {
            language: spec.context.language.as_deref(),
            types: &spec.types,
        };

        let mut index_entries = Vec::new();
        let mut pending = Pending::new();
        let mut offset = 0u64;

        loop {
            let page = self.store.visible_links_page(filter, offset, READ_PAGE)?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as u64;

            for link in &page {
                let entry = xml::url_entry(&style, &link.absolute_loc(&self.options.base_url), link);
                let full = pending.links >= max_links
                    || frame + (pending.body.len() + entry.len()) as u64 > self.options.max_bytes;
                if pending.links > 0 && full {
                    let done = std::mem::replace(&mut pending, Pending::new());
                    index_entries.push(self.flush(spec, &dir, &open, &close, done, index_entries.len())?);
                }
                pending.body.push_str(&entry);
                pending.links += 1;
                pending.lastmod = pending.lastmod.max(link.lastmod);
                record.links += 1;
            }
        }

        // An empty sitemap is still a valid single chunk
        if pending.links > 0 || index_entries.is_empty() {
            index_entries.push(self.flush(spec, &dir, &open, &close, pending, index_entries.len())?);
        }

        record.chunks = u32::try_from(index_entries.len()).unwrap_or(u32::MAX);

        let index_path = dir.join(INDEX_FILE);
        if record.has_index() {
            let index = xml::sitemap_index(&style, &index_entries);
            persist_if_changed(&index_path, index.as_bytes())
                .map_err(InfrastructureError::io(&index_path))?;
        } else {
            remove_file(&index_path)?;
        }

        remove_surplus_chunks(&dir, record.chunks)
    }

    /// Write chunk `written + 1` and return its index entry.
    fn flush(
        &self,
        spec: &ContextSpec,
        dir: &Path,
        open: &str,
        close: &str,
        chunk: Pending,
        written: usize,
    ) -> StoreResult<(String, Option<i64>)> {
        let n = u32::try_from(written + 1).unwrap_or(u32::MAX);
        let path = dir.join(chunk_file_name(n));

        let mut bytes = String::with_capacity(open.len() + chunk.body.len() + close.len());
        bytes.push_str(open);
        bytes.push_str(&chunk.body);
        bytes.push_str(close);

        let changed =
            persist_if_changed(&path, bytes.as_bytes()).map_err(InfrastructureError::io(&path))?;
        debug!("sitemap"; "{} chunk {}: {} links{}", spec.id(), n, chunk.links, if changed { "" } else { " (unchanged)" });

        let loc = absolute_url(
            &self.options.base_url,
            &format!("{}?page={n}", spec.context.sitemap_route()),
        );
        Ok((loc, chunk.lastmod))
    }

    /// Clear `regenerate_needed` if every configured context is current.
    pub fn settle(&self) -> StoreResult<bool> {
        self.tracker.settle_regenerate(&self.context_ids())
    }

    /// Drop records and directories of contexts no longer configured.
    pub fn prune(&self) -> StoreResult<()> {
        let removed = self.store.delete_sitemaps_except(&self.context_ids())?;
        if removed.is_empty() {
            return Ok(());
        }
        for id in &removed {
            let dir = self.options.output.join(id);
            if dir.is_dir() {
                fs::remove_dir_all(&dir).map_err(InfrastructureError::io(&dir))?;
            }
            debug!("sitemap"; "removed stale sitemap {}", id);
        }
        freshness::clear_cache();
        Ok(())
    }
}

fn remove_file(path: &Path) -> StoreResult<()> {
    freshness::invalidate(path);
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(InfrastructureError::io(path)(e)),
    }
}

/// Remove `N.xml` files left over from an earlier run with more chunks.
fn remove_surplus_chunks(dir: &Path, chunks: u32) -> StoreResult<()> {
    let entries = fs::read_dir(dir).map_err(InfrastructureError::io(dir))?;
    for entry in entries {
        let entry = entry.map_err(InfrastructureError::io(dir))?;
        let name = entry.file_name();
        let surplus = name
            .to_str()
            .and_then(parse_chunk_file_name)
            .is_some_and(|n| n > chunks);
        if surplus {
            remove_file(&entry.path())?;
        }
    }
    Ok(())
}
