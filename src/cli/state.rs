//! State commands: `cron`, `cancel`, `mark`, `dev-mode`.

use anyhow::Result;

use super::args::{MarkTarget, Toggle};
use super::common::{App, report};
use crate::log;
use crate::rebuild::{CancelOutcome, RunOutcome};

/// Scheduled work within the configured time limit.
pub fn cron(app: &App) -> Result<RunOutcome> {
    let batch = &app.config.batch;
    let outcome = app.runner().cron(batch.auto_rebuild, batch.time_limit())?;
    report(&outcome);
    Ok(outcome)
}

pub fn cancel(app: &App) -> Result<CancelOutcome> {
    let outcome = app.runner().cancel()?;
    match outcome {
        CancelOutcome::NoJob => log!("batch"; "no job queued"),
        CancelOutcome::Cancelled(id) => log!("batch"; "run {} cancelled", id),
        CancelOutcome::Requested(id) => {
            log!("batch"; "run {} is running, it stops after the current step", id);
        }
    }
    Ok(outcome)
}

pub fn mark(app: &App, target: MarkTarget) -> Result<()> {
    match target {
        MarkTarget::Rebuild => {
            app.tracker.mark_rebuild()?;
            log!("state"; "rebuild needed");
        }
        MarkTarget::Regenerate => {
            app.tracker.mark_regenerate()?;
            log!("state"; "regenerate needed");
        }
    }
    Ok(())
}

pub fn dev_mode(app: &App, state: Toggle) -> Result<()> {
    let on = state == Toggle::On;
    app.tracker.set_developer_mode(on)?;
    log!("state"; "developer mode {}", if on { "on" } else { "off" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::common::test_support::app_in;
    use crate::tracker::Flag;
    use tempfile::TempDir;

    #[test]
    fn test_cron_regenerates_until_rebuilt() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        let RunOutcome::Completed(job) = cron(&app).unwrap() else {
            panic!("expected completion");
        };
        assert!(job.plan.is_regenerate_only());
        assert!(app.store.all_links().unwrap().is_empty());
    }

    #[test]
    fn test_cron_auto_rebuild_then_idle() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "[batch]\nauto_rebuild = true");
        assert!(matches!(cron(&app).unwrap(), RunOutcome::Completed(_)));
        assert_eq!(app.store.all_links().unwrap().len(), 1);
        assert_eq!(cron(&app).unwrap(), RunOutcome::Idle);
    }

    #[test]
    fn test_mark_and_dev_mode() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        app.tracker.clear_rebuild().unwrap();

        mark(&app, MarkTarget::Rebuild).unwrap();
        assert!(app.tracker.get(Flag::RebuildNeeded).unwrap());

        dev_mode(&app, Toggle::On).unwrap();
        assert!(app.tracker.get(Flag::DeveloperMode).unwrap());
        dev_mode(&app, Toggle::Off).unwrap();
        assert!(!app.tracker.get(Flag::DeveloperMode).unwrap());
    }

    #[test]
    fn test_cancel_without_job() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        assert_eq!(cancel(&app).unwrap(), CancelOutcome::NoJob);
    }
}
