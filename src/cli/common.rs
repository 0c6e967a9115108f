//! Common utilities shared across CLI commands.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::config::SiteConfig;
use crate::generator::ChunkWriter;
use crate::logger::ProgressLine;
use crate::rebuild::{BatchContext, BatchJob, BatchRunner, ProviderRegistry, RunOutcome};
use crate::store::Store;
use crate::tracker::StateTracker;
use crate::{debug, log};

/// Everything a command needs, wired from the loaded config.
pub struct App {
    pub config: Arc<SiteConfig>,
    pub store: Arc<Store>,
    pub tracker: StateTracker,
    pub registry: Arc<ProviderRegistry>,
    pub writer: Arc<ChunkWriter>,
}

impl App {
    /// Open the link store and seed state on first use.
    ///
    /// A change to the configured sources since the last command marks a
    /// rebuild.
    pub fn open(config: Arc<SiteConfig>) -> Result<Self> {
        let path = &config.store.path;
        let store = Store::open(path)
            .with_context(|| format!("failed to open link store `{}`", path.display()))?;
        let store = Arc::new(store);
        let tracker = StateTracker::new(Arc::clone(&store));

        if tracker.install()? {
            log!("state"; "new link store, run `sitemill rebuild` to collect links");
        }
        if tracker.check_sources_fingerprint(&config.sources_fingerprint())? {
            log!("state"; "sources changed, rebuild needed");
        }

        let registry = Arc::new(ProviderRegistry::from_config(&config, Arc::clone(&store)));
        let writer = Arc::new(ChunkWriter::new(
            Arc::clone(&store),
            tracker.clone(),
            config.writer_options(),
            config.context_specs(),
        ));
        debug!("state"; "store at {}", path.display());

        Ok(Self {
            config,
            store,
            tracker,
            registry,
            writer,
        })
    }

    pub fn batch_context(&self) -> BatchContext {
        BatchContext {
            store: Arc::clone(&self.store),
            tracker: self.tracker.clone(),
            registry: Arc::clone(&self.registry),
            writer: Arc::clone(&self.writer),
            page_size: self.config.batch.page_size,
        }
    }

    pub fn runner(&self) -> BatchRunner {
        BatchRunner::new(
            self.batch_context(),
            Duration::from_secs(self.config.batch.lease),
        )
    }
}

/// Run the queued job in the foreground with a progress line.
pub fn run_with_progress(runner: &BatchRunner, deadline: Option<Instant>) -> Result<RunOutcome> {
    let mut progress: Option<ProgressLine> = None;
    let outcome = runner.run(deadline, |job| {
        let line = progress.get_or_insert_with(|| progress_line(job));
        for p in &job.progress {
            line.set(&p.link_type, to_usize(p.processed), to_usize(p.total));
        }
    });
    if let Some(line) = progress {
        line.finish();
    }
    let outcome = outcome.context("batch aborted; the job is kept, run `sitemill cron` to resume")?;
    report(&outcome);
    Ok(outcome)
}

fn progress_line(job: &BatchJob) -> ProgressLine {
    let items: Vec<(&str, usize)> = job
        .progress
        .iter()
        .map(|p| (p.link_type.as_str(), to_usize(p.total)))
        .collect();
    ProgressLine::new("rebuild", &items)
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Log the end state of a run.
pub fn report(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Idle => log!("batch"; "nothing to do"),
        RunOutcome::Busy { run_id } => {
            log!("batch"; "run {} is held by another worker", run_id);
        }
        RunOutcome::Paused(job) => log!(
            "batch";
            "run {} paused while {} ({}/{}), run `sitemill cron` to continue",
            job.run_id, job.phase(), job.processed(), job.total()
        ),
        RunOutcome::Cancelled { run_id } => log!("batch"; "run {} cancelled", run_id),
        RunOutcome::Completed(job) => {
            let summary = if job.plan.is_regenerate_only() {
                "sitemaps regenerated".to_string()
            } else {
                format!(
                    "{} links, {} removed, {} overrides restored",
                    job.processed(),
                    job.swept,
                    job.restored
                )
            };
            log!("batch"; "run {} done: {}", job.run_id, summary);
            if job.errors > 0 {
                log!("warning"; "{} records failed to enumerate, see `sitemill status`", job.errors);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::app_in;
    use super::*;
    use crate::tracker::Flag;
    use tempfile::TempDir;

    #[test]
    fn test_open_seeds_state() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        assert!(app.tracker.get(Flag::RebuildNeeded).unwrap());
        assert_eq!(app.registry.rebuildable_types(), ["frontpage"]);
    }

    #[test]
    fn test_rebuild_through_runner() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        let runner = app.runner();
        runner
            .start(crate::rebuild::full_plan(&app.registry, true))
            .unwrap();
        let outcome = run_with_progress(&runner, None).unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert!(!app.tracker.get(Flag::RebuildNeeded).unwrap());
        assert!(!app.tracker.get(Flag::RegenerateNeeded).unwrap());
        assert_eq!(app.store.all_links().unwrap().len(), 1);
    }

    #[test]
    fn test_source_change_marks_rebuild() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        app.tracker.clear_rebuild().unwrap();
        drop(app);

        let app = app_in(&dir, "[frontpage]\nchangefreq = \"hourly\"");
        assert!(app.tracker.get(Flag::RebuildNeeded).unwrap());
    }
}
