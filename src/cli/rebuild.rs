//! `sitemill rebuild` and `sitemill regenerate`.

use anyhow::Result;

use super::common::{App, run_with_progress};
use crate::log;
use crate::rebuild::{
    BatchPlan, RebuildAdvice, RunOutcome, StartOutcome, advise, operator_selection, plan_rebuild,
};

/// Options of an operator rebuild request.
#[derive(Debug, Clone, Default)]
pub struct RebuildRequest<'a> {
    pub types: &'a [String],
    pub preserve_custom: bool,
    pub force: bool,
    /// Queue only; cron or the server runs the job.
    pub queue: bool,
}

/// Outcome of a request, for callers that need more than the log output.
#[derive(Debug, Clone, PartialEq)]
pub enum RebuildResponse {
    /// Nothing pending and not forced.
    UpToDate,
    /// Only files are stale; pointed at cron instead.
    NotNecessary,
    Queued(StartOutcome),
    Ran(RunOutcome),
}

pub fn rebuild(app: &App, request: &RebuildRequest<'_>) -> Result<RebuildResponse> {
    let state = app.tracker.snapshot()?;

    if !request.force {
        match advise(&state) {
            RebuildAdvice::UpToDate => {
                log!("rebuild"; "links and sitemaps are up to date, use --force to rebuild anyway");
                return Ok(RebuildResponse::UpToDate);
            }
            RebuildAdvice::RegenerateOnly => {
                log!(
                    "warning";
                    "a rebuild is not necessary, only the sitemap files are stale; run `sitemill cron` to regenerate them"
                );
                return Ok(RebuildResponse::NotNecessary);
            }
            RebuildAdvice::Proceed => {}
        }
    }

    if !request.types.is_empty() && !state.developer_mode {
        log!("warning"; "--type needs developer mode, rebuilding every type");
    }
    let selected = operator_selection(&app.registry, request.types, state.developer_mode);
    let plan = plan_rebuild(&app.registry, &selected, request.preserve_custom)?;

    let runner = app.runner();
    let started = runner.start(plan)?;
    match started {
        StartOutcome::Started(id) => log!("rebuild"; "queued run {}", id),
        StartOutcome::Joined(id) => log!("rebuild"; "run {} is already queued, joining it", id),
    }
    if request.queue {
        return Ok(RebuildResponse::Queued(started));
    }
    Ok(RebuildResponse::Ran(run_with_progress(&runner, None)?))
}

/// Rewrite every sitemap from the stored links.
pub fn regenerate(app: &App) -> Result<RunOutcome> {
    let runner = app.runner();
    if let StartOutcome::Joined(id) = runner.start(BatchPlan::regenerate_only())? {
        log!("rebuild"; "run {} is already queued, finishing it first", id);
    }
    run_with_progress(&runner, None)
}
