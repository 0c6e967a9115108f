//! Drives the persisted batch job.
//!
//! One job exists per deployment. Starting a rebuild while a job exists joins
//! it. Any process may advance the job once it holds the lease; the lease is
//! renewed before every step and released when the run pauses, so a crashed
//! worker only blocks others until its lease expires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::batch::{BatchContext, BatchJob};
use super::planner::{BatchPlan, full_plan};
use crate::core::{StoreResult, is_shutdown};
use crate::utils::date::unix_now;
use crate::{debug, log};

/// Counter key for batch run ids.
const RUN_COUNTER: &str = "batch_run";

static RUNNER_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(i64),
    /// A job was already queued or running.
    Joined(i64),
}

impl StartOutcome {
    #[cfg(test)]
    pub fn run_id(self) -> i64 {
        match self {
            Self::Started(id) | Self::Joined(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No job is queued.
    Idle,
    /// Another worker holds the lease.
    Busy { run_id: i64 },
    /// Stopped at the deadline or on shutdown; resumable.
    Paused(BatchJob),
    Cancelled { run_id: i64 },
    Completed(BatchJob),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    NoJob,
    /// Deleted right away, nobody was running it.
    Cancelled(i64),
    /// The running worker stops after its current step.
    Requested(i64),
}

pub struct BatchRunner {
    ctx: BatchContext,
    owner: String,
    lease_secs: i64,
}

impl BatchRunner {
    pub fn new(ctx: BatchContext, lease: Duration) -> Self {
        let owner = format!(
            "{}-{}-{}",
            std::process::id(),
            unix_now(),
            RUNNER_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        Self {
            ctx,
            owner,
            lease_secs: i64::try_from(lease.as_secs()).unwrap_or(i64::MAX).max(1),
        }
    }

    #[cfg(test)]
    pub fn context(&self) -> &BatchContext {
        &self.ctx
    }

    /// Queue a job for `plan`, or join the one already queued.
    ///
    /// A plan with link types marks a rebuild, so an aborted job leaves the
    /// state asking for one.
    pub fn start(&self, plan: BatchPlan) -> StoreResult<StartOutcome> {
        loop {
            if let Some(row) = self.ctx.store.job_load()? {
                debug!("batch"; "joining run {}", row.run_id);
                return Ok(StartOutcome::Joined(row.run_id));
            }

            let run_id = self.ctx.store.kv_increment(RUN_COUNTER)?;
            let now = unix_now();
            let job = BatchJob::new(run_id, plan.clone(), now);
            if !job.plan.is_regenerate_only() {
                self.ctx.tracker.mark_rebuild()?;
            }
            if self.ctx.store.job_insert(run_id, &job.encode()?, now)? {
                if !job.plan.is_regenerate_only() {
                    self.ctx.store.prune_batch_errors(run_id)?;
                }
                debug!("batch"; "queued run {}", run_id);
                return Ok(StartOutcome::Started(run_id));
            }
            // Lost the race to another process; join its job
        }
    }

    /// Step the queued job until it finishes, `deadline` passes, shutdown is
    /// requested or the job is cancelled. `on_step` sees the job after every
    /// persisted step.
    ///
    /// An infrastructure error aborts the run but keeps the job, so the next
    /// run resumes from the last persisted cursor.
    pub fn run(
        &self,
        deadline: Option<Instant>,
        mut on_step: impl FnMut(&BatchJob),
    ) -> StoreResult<RunOutcome> {
        let store = &self.ctx.store;
        let Some(row) = store.job_load()? else {
            return Ok(RunOutcome::Idle);
        };
        let run_id = row.run_id;
        if !self.renew_lease(run_id)? {
            return Ok(RunOutcome::Busy { run_id });
        }

        let mut job = match BatchJob::decode(&row.payload) {
            Ok(job) => job,
            Err(e) => {
                self.release(run_id);
                return Err(e);
            }
        };
        on_step(&job);

        loop {
            if job.is_done() {
                store.job_delete(run_id)?;
                return Ok(RunOutcome::Completed(job));
            }
            if self.cancel_requested(run_id)? {
                store.job_delete(run_id)?;
                log!("batch"; "run {} cancelled", run_id);
                return Ok(RunOutcome::Cancelled { run_id });
            }
            if is_shutdown() || deadline.is_some_and(|d| Instant::now() >= d) {
                store.job_release_lease(run_id, &self.owner)?;
                return Ok(RunOutcome::Paused(job));
            }
            if !self.renew_lease(run_id)? {
                return Ok(RunOutcome::Busy { run_id });
            }

            if let Err(e) = job.step(&self.ctx) {
                self.abort(&job);
                return Err(e);
            }

            if !store.job_save_payload(run_id, &self.owner, &job.encode()?, unix_now())? {
                // Lease taken over or job deleted underneath us
                return Ok(RunOutcome::Busy { run_id });
            }
            on_step(&job);
        }
    }

    /// Scheduled entry point: resume the queued job, or queue the work the
    /// state asks for, then run within `time_limit`.
    ///
    /// A pending rebuild is only started here when `auto_rebuild` is set;
    /// otherwise the files are regenerated from the links already stored.
    pub fn cron(&self, auto_rebuild: bool, time_limit: Duration) -> StoreResult<RunOutcome> {
        let deadline = Instant::now() + time_limit;

        if self.ctx.store.job_load()?.is_none() {
            let state = self.ctx.tracker.snapshot()?;
            let plan = if state.rebuild_needed && auto_rebuild {
                full_plan(&self.ctx.registry, true)
            } else if state.regenerate_needed {
                if state.rebuild_needed {
                    log!("cron"; "rebuild pending, run `sitemill rebuild`; regenerating from stored links");
                }
                BatchPlan::regenerate_only()
            } else {
                return Ok(RunOutcome::Idle);
            };
            self.start(plan)?;
        }

        self.run(Some(deadline), |job| {
            debug!("cron"; "{} ({}/{})", job.phase(), job.processed(), job.total());
        })
    }

    /// Cancel the queued job. A job with a live lease is flagged and stops
    /// between steps; an idle one is dropped immediately.
    pub fn cancel(&self) -> StoreResult<CancelOutcome> {
        let Some(row) = self.ctx.store.job_load()? else {
            return Ok(CancelOutcome::NoJob);
        };
        let live = row.owner.is_some() && row.lease_until >= unix_now();
        if live {
            self.ctx.store.job_request_cancel()?;
            Ok(CancelOutcome::Requested(row.run_id))
        } else {
            self.ctx.store.job_delete(row.run_id)?;
            Ok(CancelOutcome::Cancelled(row.run_id))
        }
    }

    fn renew_lease(&self, run_id: i64) -> StoreResult<bool> {
        self.ctx
            .store
            .job_acquire_lease(run_id, &self.owner, unix_now(), self.lease_secs)
    }

    fn cancel_requested(&self, run_id: i64) -> StoreResult<bool> {
        Ok(self
            .ctx
            .store
            .job_load()?
            .is_none_or(|row| row.run_id != run_id || row.cancel_requested))
    }

    /// Leave the job resumable and the state asking for the unfinished work.
    fn abort(&self, job: &BatchJob) {
        self.release(job.run_id);
        let marked = if job.plan.is_regenerate_only() {
            self.ctx.tracker.mark_regenerate()
        } else {
            self.ctx.tracker.mark_rebuild()
        };
        if let Err(e) = marked {
            debug!("batch"; "could not mark state after abort: {}", e);
        }
    }

    fn release(&self, run_id: i64) {
        if let Err(e) = self.ctx.store.job_release_lease(run_id, &self.owner) {
            debug!("batch"; "could not release lease on run {}: {}", run_id, e);
        }
    }
}
