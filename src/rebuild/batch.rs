//! Resumable batch job.
//!
//! A job is a plan plus a cursor. Each call to [`BatchJob::step`] performs
//! one phase or one page of one link type and moves the cursor. The whole
//! job serializes to JSON, so any process can pick it up where the last one
//! stopped.
//!
//! ```text
//! Prepare ─▶ Enumerate(type 0, offset..) ─▶ ... ─▶ Enumerate(type n) ─┐
//!                                                                     │
//!            ┌──────────── Restore (preserve_custom only) ◀───────────┘
//!            ▼
//!   Regenerate(context 0..m) ─▶ Finalize ─▶ Done
//! ```
//!
//! A regenerate-only plan starts at `Regenerate`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::planner::BatchPlan;
use super::provider::{LinkProvider, ProviderRegistry};
use crate::core::{EnumerationError, InfrastructureError, Link, StoreResult};
use crate::generator::ChunkWriter;
use crate::store::Store;
use crate::tracker::StateTracker;
use crate::utils::date::unix_now;
use crate::{debug, log};

/// Collaborators a step needs.
#[derive(Clone)]
pub struct BatchContext {
    pub store: Arc<Store>,
    pub tracker: StateTracker,
    pub registry: Arc<ProviderRegistry>,
    pub writer: Arc<ChunkWriter>,
    /// Source records per enumeration step.
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Cursor {
    Prepare,
    Enumerate { type_index: usize, offset: u64 },
    Restore,
    Regenerate { context_index: usize },
    Finalize,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeProgress {
    pub link_type: String,
    pub processed: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub run_id: i64,
    pub plan: BatchPlan,
    pub cursor: Cursor,
    pub progress: Vec<TypeProgress>,
    /// Records that failed to enumerate.
    pub errors: u64,
    /// Rows removed because their source disappeared.
    pub swept: u64,
    pub restored: u64,
    /// Overrides held between `Prepare` and `Restore`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snapshot: Vec<Link>,
    pub started_at: i64,
}

impl BatchJob {
    pub fn new(run_id: i64, plan: BatchPlan, started_at: i64) -> Self {
        let cursor = if plan.is_regenerate_only() {
            Cursor::Regenerate { context_index: 0 }
        } else {
            Cursor::Prepare
        };
        let progress = plan
            .types
            .iter()
            .map(|t| TypeProgress {
                link_type: t.clone(),
                processed: 0,
                total: 0,
            })
            .collect();
        Self {
            run_id,
            plan,
            cursor,
            progress,
            errors: 0,
            swept: 0,
            restored: 0,
            snapshot: Vec::new(),
            started_at,
        }
    }

    pub fn encode(&self) -> StoreResult<String> {
        serde_json::to_string(self).map_err(InfrastructureError::payload("batch job"))
    }

    pub fn decode(payload: &str) -> StoreResult<Self> {
        serde_json::from_str(payload).map_err(InfrastructureError::payload("batch job"))
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.cursor == Cursor::Done
    }

    pub fn processed(&self) -> u64 {
        self.progress.iter().map(|p| p.processed).sum()
    }

    pub fn total(&self) -> u64 {
        self.progress.iter().map(|p| p.total).sum()
    }

    /// Short description of the current phase.
    pub fn phase(&self) -> String {
        match &self.cursor {
            Cursor::Prepare => "preparing".into(),
            Cursor::Enumerate { type_index, .. } => format!(
                "enumerating {}",
                self.plan.types.get(*type_index).map_or("?", String::as_str)
            ),
            Cursor::Restore => "restoring overrides".into(),
            Cursor::Regenerate { context_index } => {
                format!("writing sitemap {}", context_index + 1)
            }
            Cursor::Finalize => "finalizing".into(),
            Cursor::Done => "done".into(),
        }
    }

    /// Advance by one unit of work.
    ///
    /// On error the cursor is left unchanged, so retrying repeats the failed
    /// unit. Enumeration upserts are idempotent, which makes that safe.
    pub fn step(&mut self, ctx: &BatchContext) -> StoreResult<()> {
        let next = match self.cursor.clone() {
            Cursor::Prepare => self.prepare(ctx)?,
            Cursor::Enumerate { type_index, offset } => self.enumerate(ctx, type_index, offset)?,
            Cursor::Restore => self.restore(ctx)?,
            Cursor::Regenerate { context_index } => self.regenerate(ctx, context_index)?,
            Cursor::Finalize => self.finalize(ctx)?,
            Cursor::Done => Cursor::Done,
        };
        self.cursor = next;
        Ok(())
    }

    fn prepare(&mut self, ctx: &BatchContext) -> StoreResult<Cursor> {
        for progress in &mut self.progress {
            let provider = lookup_provider(ctx, &progress.link_type)?;
            progress.total = provider.count()?;
        }
        if self.plan.preserve_custom {
            self.snapshot = ctx.store.snapshot_overrides(&self.plan.types)?;
            debug!("rebuild"; "holding {} overrides", self.snapshot.len());
        } else {
            let reset = ctx.store.reset_overrides(&self.plan.types)?;
            debug!("rebuild"; "dropped {} overrides", reset);
        }
        Ok(Cursor::Enumerate {
            type_index: 0,
            offset: 0,
        })
    }

    fn enumerate(
        &mut self,
        ctx: &BatchContext,
        type_index: usize,
        offset: u64,
    ) -> StoreResult<Cursor> {
        let Some(link_type) = self.plan.types.get(type_index).cloned() else {
            return Ok(self.after_enumeration());
        };
        let provider = lookup_provider(ctx, &link_type)?;
        let page_size = ctx.page_size.max(1);
        let page = provider.enumerate(offset, page_size)?;
        let fetched = page.len();

        let mut links = Vec::with_capacity(fetched);
        let mut errors = Vec::new();
        for record in page {
            let checked = record.and_then(|mut link| {
                link.link_type.clone_from(&link_type);
                match link.validate() {
                    Ok(()) => Ok(link),
                    Err(e) => Err(EnumerationError::new(&link_type, &link.source_id, e.to_string())),
                }
            });
            match checked {
                Ok(link) => links.push(link),
                Err(error) => errors.push(error),
            }
        }
        ctx.store.upsert_page(&links, &errors, self.run_id, unix_now())?;
        for error in &errors {
            log!("warning"; "skipped {}", error);
        }
        self.errors += errors.len() as u64;

        if let Some(progress) = self.progress.get_mut(type_index) {
            progress.processed += fetched as u64;
            progress.total = progress.total.max(progress.processed);
        }

        if fetched == page_size {
            return Ok(Cursor::Enumerate {
                type_index,
                offset: offset + fetched as u64,
            });
        }

        let swept = ctx.store.sweep_unseen(&link_type, self.run_id)?;
        self.swept += swept as u64;
        if swept > 0 {
            debug!("rebuild"; "{}: removed {} stale links", link_type, swept);
        }

        if type_index + 1 < self.plan.types.len() {
            Ok(Cursor::Enumerate {
                type_index: type_index + 1,
                offset: 0,
            })
        } else {
            Ok(self.after_enumeration())
        }
    }

    fn after_enumeration(&self) -> Cursor {
        if self.plan.preserve_custom {
            Cursor::Restore
        } else {
            Cursor::Regenerate { context_index: 0 }
        }
    }

    fn restore(&mut self, ctx: &BatchContext) -> StoreResult<Cursor> {
        let restored = ctx.store.restore_overrides(&self.snapshot)?;
        self.restored += restored as u64;
        self.snapshot.clear();
        debug!("rebuild"; "restored {} overrides", restored);
        Ok(Cursor::Regenerate { context_index: 0 })
    }

    fn regenerate(&mut self, ctx: &BatchContext, context_index: usize) -> StoreResult<Cursor> {
        match ctx.writer.contexts().get(context_index) {
            Some(spec) => {
                ctx.writer.write(spec)?;
                Ok(Cursor::Regenerate {
                    context_index: context_index + 1,
                })
            }
            None => Ok(Cursor::Finalize),
        }
    }

    fn finalize(&mut self, ctx: &BatchContext) -> StoreResult<Cursor> {
        ctx.writer.prune()?;
        if !self.plan.is_regenerate_only() {
            ctx.tracker.clear_rebuild()?;
        }
        if !ctx.writer.settle()? {
            debug!("rebuild"; "sitemaps changed while writing, regeneration still pending");
        }
        Ok(Cursor::Done)
    }
}

fn lookup_provider<'a>(
    ctx: &'a BatchContext,
    link_type: &str,
) -> StoreResult<&'a dyn LinkProvider> {
    ctx.registry
        .get(link_type)
        .ok_or_else(|| InfrastructureError::Provider {
            link_type: link_type.to_string(),
            message: "no longer registered".into(),
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Batch fixture over an in-memory store and a temporary output dir.

    use super::*;
    use crate::core::{ContextSpec, SitemapContext};
    use crate::generator::WriterOptions;
    use crate::rebuild::provider::CustomProvider;
    use crate::rebuild::provider::test_support::StaticProvider;
    use tempfile::TempDir;

    pub struct Fixture {
        pub dir: TempDir,
        pub ctx: BatchContext,
        pub providers: Vec<Arc<StaticProvider>>,
    }

    impl Fixture {
        pub fn output(&self) -> std::path::PathBuf {
            self.dir.path().join("sitemaps")
        }

        /// Handle on a registered provider, for changing its records.
        pub fn provider(&self, link_type: &str) -> &StaticProvider {
            self.providers
                .iter()
                .find(|p| p.link_type == link_type)
                .unwrap()
        }
    }

    /// Providers are registered in order, followed by custom links.
    /// Chunks hold at most 3 links.
    pub fn fixture(providers: Vec<StaticProvider>, page_size: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let tracker = StateTracker::new(store.clone());
        tracker.install().unwrap();

        let providers: Vec<_> = providers.into_iter().map(Arc::new).collect();
        let mut registry = ProviderRegistry::new();
        for provider in &providers {
            registry.register(Arc::clone(provider));
        }
        registry.register(CustomProvider::new(store.clone()));

        let mut options = WriterOptions::new(dir.path().join("sitemaps"), "https://example.com");
        options.max_links = 3;
        let contexts = vec![ContextSpec::new(SitemapContext::default(), vec![])];
        let writer = ChunkWriter::new(store.clone(), tracker.clone(), options, contexts);

        Fixture {
            dir,
            ctx: BatchContext {
                store,
                tracker,
                registry: Arc::new(registry),
                writer: Arc::new(writer),
                page_size,
            },
            providers,
        }
    }

    pub fn run_to_end(job: &mut BatchJob, ctx: &BatchContext) {
        let mut guard = 0;
        while !job.is_done() {
            job.step(ctx).unwrap();
            guard += 1;
            assert!(guard < 1_000, "batch did not terminate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::core::{CUSTOM_TYPE, ChangeFreq, LANGUAGE_NEUTRAL, Priority};
    use crate::rebuild::planner::plan_rebuild;
    use crate::rebuild::provider::test_support::StaticProvider;
    use crate::store::OverrideChange;
    use crate::store::test_support::dump_links;
    use crate::tracker::Flag;

    fn all_types(ctx: &BatchContext, preserve_custom: bool) -> BatchPlan {
        plan_rebuild(&ctx.registry, &ctx.registry.rebuildable_types(), preserve_custom).unwrap()
    }

    #[test]
    fn test_full_run_writes_and_clears_flags() {
        let f = fixture(
            vec![StaticProvider::numbered("pages", 2), StaticProvider::numbered("posts", 5)],
            2,
        );
        let mut job = BatchJob::new(1, all_types(&f.ctx, false), 0);
        run_to_end(&mut job, &f.ctx);

        assert_eq!(job.processed(), 7);
        assert_eq!(job.total(), 7);
        assert_eq!(f.ctx.store.all_links().unwrap().len(), 7);

        // 7 links at 3 per chunk
        let record = f.ctx.store.list_sitemaps().unwrap().remove(0);
        assert_eq!(record.chunks, 3);
        assert!(record.dir(&f.output()).join("index.xml").exists());

        let state = f.ctx.tracker.snapshot().unwrap();
        assert!(!state.rebuild_needed);
        assert!(!state.regenerate_needed);
    }

    #[test]
    fn test_types_enumerated_in_plan_order() {
        let f = fixture(
            vec![StaticProvider::numbered("pages", 1), StaticProvider::numbered("posts", 1)],
            10,
        );
        let mut job = BatchJob::new(1, all_types(&f.ctx, false), 0);
        job.step(&f.ctx).unwrap();
        assert_eq!(job.cursor, Cursor::Enumerate { type_index: 0, offset: 0 });
        job.step(&f.ctx).unwrap();
        assert_eq!(job.cursor, Cursor::Enumerate { type_index: 1, offset: 0 });
        assert_eq!(job.phase(), "enumerating posts");
    }

    #[test]
    fn test_second_run_is_identical() {
        let f = fixture(vec![StaticProvider::numbered("posts", 5)], 2);
        let mut first = BatchJob::new(1, all_types(&f.ctx, true), 0);
        run_to_end(&mut first, &f.ctx);
        let before = dump_links(&f.ctx.store);

        let mut second = BatchJob::new(2, all_types(&f.ctx, true), 0);
        run_to_end(&mut second, &f.ctx);
        assert_eq!(dump_links(&f.ctx.store), before);
        assert_eq!(second.swept, 0);
    }

    #[test]
    fn test_removed_sources_swept() {
        let f = fixture(vec![StaticProvider::numbered("posts", 4)], 10);
        let mut job = BatchJob::new(1, all_types(&f.ctx, false), 0);
        run_to_end(&mut job, &f.ctx);

        f.provider("posts").records.lock().truncate(2);
        let mut job = BatchJob::new(2, all_types(&f.ctx, false), 0);
        run_to_end(&mut job, &f.ctx);
        assert_eq!(job.swept, 2);
        assert_eq!(f.ctx.store.all_links().unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_record_recorded_and_skipped() {
        let records = vec![
            Ok(Link::new("posts", "a", "/a/")),
            Err(EnumerationError::new("posts", "line 2", "invalid JSON")),
            Ok(Link::new("posts", "c", "/c/")),
            Ok(Link::new("posts", "d", " ")),
        ];
        let f = fixture(vec![StaticProvider::new("posts", records)], 10);
        let mut job = BatchJob::new(7, all_types(&f.ctx, false), 0);
        run_to_end(&mut job, &f.ctx);

        assert_eq!(job.errors, 2);
        assert_eq!(f.ctx.store.all_links().unwrap().len(), 2);
        let errors = f.ctx.store.batch_errors(7).unwrap();
        assert_eq!(errors[0].source_id, "line 2");
        assert!(!f.ctx.tracker.get(Flag::RebuildNeeded).unwrap());
    }

    #[test]
    fn test_failing_record_keeps_previous_row() {
        let f = fixture(vec![StaticProvider::numbered("posts", 2)], 10);
        let mut job = BatchJob::new(1, all_types(&f.ctx, false), 0);
        run_to_end(&mut job, &f.ctx);

        f.provider("posts").records.lock()[1] =
            Err(EnumerationError::new("posts", "1", "temporarily unreadable"));
        let mut job = BatchJob::new(2, all_types(&f.ctx, false), 0);
        run_to_end(&mut job, &f.ctx);
        assert_eq!(job.swept, 0);
        assert_eq!(f.ctx.store.all_links().unwrap().len(), 2);
    }

    #[test]
    fn test_preserve_custom_round_trip() {
        let f = fixture(vec![StaticProvider::numbered("posts", 3)], 10);
        let mut job = BatchJob::new(1, all_types(&f.ctx, true), 0);
        run_to_end(&mut job, &f.ctx);

        let custom = Link::new(CUSTOM_TYPE, "/promo/", "/promo/")
            .with_priority(Priority::new(0.9).unwrap())
            .with_changefreq(ChangeFreq::Hourly);
        f.ctx.store.insert_link(&custom).unwrap();
        f.ctx
            .store
            .set_override(
                "/posts/1/",
                None,
                OverrideChange {
                    priority: Some(Priority::new(0.1).unwrap()),
                    changefreq: Some(ChangeFreq::Never),
                    visible: None,
                },
            )
            .unwrap();

        let mut job = BatchJob::new(2, all_types(&f.ctx, true), 0);
        run_to_end(&mut job, &f.ctx);
        assert!(job.snapshot.is_empty());

        let links = f.ctx.store.all_links().unwrap();
        let promo = links.iter().find(|l| l.loc == "/promo/").unwrap();
        assert_eq!(promo.priority.get(), 0.9);
        assert_eq!(promo.changefreq, ChangeFreq::Hourly);
        let post = links.iter().find(|l| l.loc == "/posts/1/").unwrap();
        assert_eq!(post.priority.get(), 0.1);
        assert_eq!(post.changefreq, ChangeFreq::Never);
        assert!(post.customized);
    }

    #[test]
    fn test_custom_link_removed_mid_rebuild_stays_removed() {
        let f = fixture(vec![StaticProvider::numbered("posts", 3)], 2);
        let id = f
            .ctx
            .store
            .insert_link(&Link::new(CUSTOM_TYPE, "/promo/", "/promo/"))
            .unwrap();

        let mut job = BatchJob::new(1, all_types(&f.ctx, true), 0);
        job.step(&f.ctx).unwrap();
        assert!(f.ctx.store.delete_link(id).unwrap());
        run_to_end(&mut job, &f.ctx);

        assert!(
            f.ctx
                .store
                .find_link(CUSTOM_TYPE, "/promo/", LANGUAGE_NEUTRAL)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_custom_link_edited_mid_rebuild_not_duplicated() {
        let f = fixture(vec![StaticProvider::numbered("posts", 3)], 2);
        let id = f
            .ctx
            .store
            .insert_link(&Link::new(CUSTOM_TYPE, "/promo/", "/promo/"))
            .unwrap();

        let mut job = BatchJob::new(1, all_types(&f.ctx, true), 0);
        job.step(&f.ctx).unwrap();
        let mut edited = f.ctx.store.get_link(id).unwrap().unwrap();
        edited.loc = "/sale/".into();
        edited.source_id = "/sale/".into();
        assert!(f.ctx.store.update_link(&edited).unwrap());
        run_to_end(&mut job, &f.ctx);

        let custom: Vec<_> = f
            .ctx
            .store
            .all_links()
            .unwrap()
            .into_iter()
            .filter(Link::is_custom)
            .map(|l| l.loc)
            .collect();
        assert_eq!(custom, ["/sale/"]);
    }

    #[test]
    fn test_override_set_mid_rebuild_survives() {
        let f = fixture(vec![StaticProvider::numbered("posts", 4)], 2);
        let mut job = BatchJob::new(1, all_types(&f.ctx, true), 0);
        run_to_end(&mut job, &f.ctx);

        let mut job = BatchJob::new(2, all_types(&f.ctx, true), 0);
        job.step(&f.ctx).unwrap();
        assert!(job.snapshot.is_empty());
        f.ctx
            .store
            .set_override("/posts/3/", None, OverrideChange {
                visible: Some(false),
                ..Default::default()
            })
            .unwrap();
        run_to_end(&mut job, &f.ctx);

        let post = f.ctx.store.find_link("posts", "3", LANGUAGE_NEUTRAL).unwrap().unwrap();
        assert!(post.customized);
        assert!(!post.visible);
    }

    #[test]
    fn test_without_preserve_overrides_reset() {
        let f = fixture(vec![StaticProvider::numbered("posts", 1)], 10);
        let mut job = BatchJob::new(1, all_types(&f.ctx, false), 0);
        run_to_end(&mut job, &f.ctx);
        f.ctx
            .store
            .set_override("/posts/0/", None, OverrideChange {
                priority: Some(Priority::new(0.1).unwrap()),
                ..Default::default()
            })
            .unwrap();

        let mut job = BatchJob::new(2, all_types(&f.ctx, false), 0);
        run_to_end(&mut job, &f.ctx);
        let post = f.ctx.store.all_links().unwrap().remove(0);
        assert_eq!(post.priority.get(), 0.5);
        assert!(!post.customized);
    }

    #[test]
    fn test_infrastructure_failure_keeps_cursor() {
        let f = fixture(vec![StaticProvider::numbered("posts", 4)], 2);
        let mut job = BatchJob::new(1, all_types(&f.ctx, false), 0);
        job.step(&f.ctx).unwrap();
        job.step(&f.ctx).unwrap();
        let cursor = job.cursor.clone();

        *f.provider("posts").unavailable.lock() = true;
        assert!(matches!(
            job.step(&f.ctx),
            Err(InfrastructureError::Provider { .. })
        ));
        assert_eq!(job.cursor, cursor);
        assert!(f.ctx.tracker.get(Flag::RebuildNeeded).unwrap());

        *f.provider("posts").unavailable.lock() = false;
        run_to_end(&mut job, &f.ctx);
        assert_eq!(f.ctx.store.all_links().unwrap().len(), 4);
        assert!(!f.ctx.tracker.get(Flag::RebuildNeeded).unwrap());
    }

    #[test]
    fn test_retried_page_logs_errors_once() {
        let records = vec![
            Ok(Link::new("posts", "a", "/a/")),
            Err(EnumerationError::new("posts", "b", "invalid JSON")),
            Ok(Link::new("posts", "c", "/c/")),
        ];
        let f = fixture(vec![StaticProvider::new("posts", records)], 10);
        let mut job = BatchJob::new(4, all_types(&f.ctx, false), 0);
        job.step(&f.ctx).unwrap();
        let cursor = job.cursor.clone();

        *f.provider("posts").unavailable.lock() = true;
        assert!(job.step(&f.ctx).is_err());
        assert_eq!(job.cursor, cursor);
        assert_eq!(job.errors, 0);
        assert!(f.ctx.store.batch_errors(4).unwrap().is_empty());

        *f.provider("posts").unavailable.lock() = false;
        run_to_end(&mut job, &f.ctx);
        assert_eq!(job.errors, 1);
        assert_eq!(f.ctx.store.batch_errors(4).unwrap().len(), 1);
    }

    #[test]
    fn test_regenerate_only_skips_enumeration() {
        let f = fixture(vec![StaticProvider::numbered("posts", 4)], 2);
        let mut job = BatchJob::new(1, BatchPlan::regenerate_only(), 0);
        assert_eq!(job.cursor, Cursor::Regenerate { context_index: 0 });
        run_to_end(&mut job, &f.ctx);

        assert!(f.ctx.store.all_links().unwrap().is_empty());
        // A pending rebuild is untouched by a regenerate
        assert!(f.ctx.tracker.get(Flag::RebuildNeeded).unwrap());
        assert_eq!(f.ctx.store.list_sitemaps().unwrap().len(), 1);
    }

    #[test]
    fn test_job_serializes_cursor() {
        let plan = BatchPlan {
            types: vec!["posts".into()],
            preserve_custom: true,
        };
        let mut job = BatchJob::new(3, plan, 100);
        job.cursor = Cursor::Enumerate {
            type_index: 0,
            offset: 200,
        };
        let json = job.encode().unwrap();
        assert!(json.contains(r#""phase":"enumerate""#));
        assert_eq!(BatchJob::decode(&json).unwrap(), job);
        assert!(matches!(
            BatchJob::decode("{}"),
            Err(InfrastructureError::Payload { .. })
        ));
    }
}
