//! `sitemill status`: rebuild flags, the queued job, link counts and
//! generated sitemaps.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;

use super::common::App;
use crate::core::{EnumerationError, SitemapRecord};
use crate::rebuild::BatchJob;
use crate::store::JobRow;
use crate::tracker::RebuildState;
use crate::utils::date::{DateTimeUtc, unix_now};

/// Errors shown per run before truncating.
const MAX_ERRORS_SHOWN: usize = 10;

#[derive(Debug, Serialize)]
pub struct Status {
    pub state: RebuildState,
    pub job: Option<JobStatus>,
    pub links: Vec<(String, u64)>,
    pub sitemaps: Vec<SitemapRecord>,
    pub last_errors: Option<RunErrors>,
}

#[derive(Debug, Serialize)]
pub struct JobStatus {
    pub run_id: i64,
    pub phase: String,
    pub processed: u64,
    pub total: u64,
    pub errors: u64,
    /// Someone holds a live lease.
    pub running: bool,
    pub cancel_requested: bool,
}

#[derive(Debug, Serialize)]
pub struct RunErrors {
    pub run_id: i64,
    pub errors: Vec<EnumerationError>,
}

pub fn collect(app: &App) -> Result<Status> {
    let job = app
        .store
        .job_load()?
        .map(|row| job_status(&row))
        .transpose()?;
    let last_errors = match app.store.last_error_run()? {
        Some(run_id) => Some(RunErrors {
            run_id,
            errors: app.store.batch_errors(run_id)?,
        }),
        None => None,
    };
    Ok(Status {
        state: app.tracker.snapshot()?,
        job,
        links: app.store.count_by_type()?,
        sitemaps: app.store.list_sitemaps()?,
        last_errors,
    })
}

fn job_status(row: &JobRow) -> Result<JobStatus> {
    let job = BatchJob::decode(&row.payload)?;
    Ok(JobStatus {
        run_id: row.run_id,
        phase: job.phase(),
        processed: job.processed(),
        total: job.total(),
        errors: job.errors,
        running: row.owner.is_some() && row.lease_until >= unix_now(),
        cancel_requested: row.cancel_requested,
    })
}

pub fn show(app: &App, as_json: bool) -> Result<()> {
    let status = collect(app)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&to_json(&status))?);
    } else {
        print!("{}", render(&status));
    }
    Ok(())
}

fn to_json(status: &Status) -> serde_json::Value {
    json!({
        "state": status.state,
        "job": status.job,
        "links": status
            .links
            .iter()
            .map(|(t, n)| (t.clone(), json!(n)))
            .collect::<serde_json::Map<_, _>>(),
        "sitemaps": status.sitemaps,
        "last_errors": status.last_errors,
    })
}

fn render(status: &Status) -> String {
    let mut out = String::new();
    let flag = |on: bool| if on { "yes".yellow().to_string() } else { "no".green().to_string() };

    out.push_str(&format!("{}\n", "State".bold()));
    out.push_str(&format!("  rebuild needed:    {}\n", flag(status.state.rebuild_needed)));
    out.push_str(&format!("  regenerate needed: {}\n", flag(status.state.regenerate_needed)));
    out.push_str(&format!(
        "  developer mode:    {}\n",
        if status.state.developer_mode { "on" } else { "off" }
    ));

    out.push_str(&format!("{}\n", "Job".bold()));
    match &status.job {
        None => out.push_str("  none\n"),
        Some(job) => {
            out.push_str(&format!(
                "  run {}: {} ({}/{}){}{}\n",
                job.run_id,
                job.phase,
                job.processed,
                job.total,
                if job.running { ", running" } else { ", paused" },
                if job.cancel_requested { ", cancelling" } else { "" },
            ));
            if job.errors > 0 {
                out.push_str(&format!("  {} records failed\n", job.errors));
            }
        }
    }

    out.push_str(&format!("{}\n", "Links".bold()));
    if status.links.is_empty() {
        out.push_str("  none\n");
    }
    for (link_type, count) in &status.links {
        out.push_str(&format!("  {link_type:<16} {count}\n"));
    }

    out.push_str(&format!("{}\n", "Sitemaps".bold()));
    if status.sitemaps.is_empty() {
        out.push_str("  none\n");
    }
    for record in &status.sitemaps {
        out.push_str(&format!(
            "  {} {:<24} {} links in {} chunk(s), {} at {}\n",
            record.id,
            record.context.to_string(),
            record.links,
            record.chunks,
            record.status.as_str(),
            DateTimeUtc::from_unix(record.generated_at).to_rfc3339(),
        ));
    }

    if let Some(run) = &status.last_errors {
        out.push_str(&format!("{} (run {})\n", "Enumeration errors".bold(), run.run_id));
        for error in run.errors.iter().take(MAX_ERRORS_SHOWN) {
            out.push_str(&format!("  {error}\n"));
        }
        if run.errors.len() > MAX_ERRORS_SHOWN {
            out.push_str(&format!("  ... and {} more\n", run.errors.len() - MAX_ERRORS_SHOWN));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::common::test_support::app_in;
    use crate::rebuild::full_plan;
    use tempfile::TempDir;

    #[test]
    fn test_status_of_fresh_store() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        let status = collect(&app).unwrap();
        assert!(status.state.rebuild_needed);
        assert!(status.job.is_none());
        assert!(status.links.is_empty());
        assert!(status.last_errors.is_none());

        let text = render(&status);
        assert!(text.contains("Sitemaps"));
    }

    #[test]
    fn test_status_reports_queued_job() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        let runner = app.runner();
        let run_id = runner.start(full_plan(&app.registry, true)).unwrap().run_id();

        let status = collect(&app).unwrap();
        let job = status.job.as_ref().unwrap();
        assert_eq!(job.run_id, run_id);
        assert_eq!(job.phase, "preparing");
        assert!(!job.running);

        let value = to_json(&status);
        assert_eq!(value["job"]["run_id"], json!(run_id));
        assert_eq!(value["state"]["rebuild_needed"], json!(true));
    }

    #[test]
    fn test_status_lists_errors() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        let error = EnumerationError::new("posts", "7", "missing `loc`");
        app.store.record_batch_error(3, &error, 0).unwrap();

        let status = collect(&app).unwrap();
        let run = status.last_errors.as_ref().unwrap();
        assert_eq!(run.run_id, 3);
        assert!(render(&status).contains("posts/7: missing `loc`"));
    }
}
