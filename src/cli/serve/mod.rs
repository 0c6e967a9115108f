//! Sitemap server: answers sitemap, chunk and stylesheet requests while a
//! background thread runs cron on the configured interval.

mod lifecycle;
mod response;

use crate::cli::common::App;
use crate::config::cfg;
use crate::core::SitemapError;
use crate::server::SitemapServer;
use crate::{debug, log};
use anyhow::{Context, Result};
use crossbeam::channel;
use std::sync::Arc;
use std::time::Duration;
use tiny_http::{Request, Server};

use lifecycle::CronSchedule;

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    shutdown_rx: channel::Receiver<()>,
}

/// Bind the HTTP server without starting the request loop.
pub fn bind_server(app: &App) -> Result<BoundServer> {
    let serve = &app.config.serve;
    let (server, addr) = lifecycle::bind_with_retry(serve.interface, serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    lifecycle::register_server_for_shutdown(Arc::clone(&server), shutdown_tx);

    log!("serve"; "http://{}", addr);
    for context in &app.config.contexts {
        debug!("serve"; "context at {}", context.base_path);
    }

    Ok(BoundServer {
        server,
        shutdown_rx,
    })
}

impl BoundServer {
    /// Start the cron thread and the request loop (blocking).
    pub fn run(self, app: &App) -> Result<()> {
        let config = cfg();
        let schedule = CronSchedule {
            interval: Duration::from_secs(config.serve.cron_interval),
            time_limit: config.batch.time_limit(),
            auto_rebuild: config.batch.auto_rebuild,
        };
        let cron = lifecycle::spawn_cron(app.runner(), schedule, self.shutdown_rx);

        let sitemaps = Arc::new(SitemapServer::from_config(&config, Arc::clone(&app.store)));
        let result = run_request_loop(&self.server, sitemaps);
        lifecycle::wait_for_shutdown(cron);
        result
    }
}

/// `sitemill serve`
pub fn serve(app: &App) -> Result<()> {
    bind_server(app)?.run(app)
}

fn run_request_loop(server: &Server, sitemaps: Arc<SitemapServer>) -> Result<()> {
    // Chunk reads can be slow on large sites; keep them off the accept loop
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .context("failed to create thread pool")?;

    for request in server.incoming_requests() {
        let sitemaps = Arc::clone(&sitemaps);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &sitemaps) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, sitemaps: &SitemapServer) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }
    if !response::is_read_request(&request) {
        return response::respond_method_not_allowed(request);
    }

    let url = request.url().to_string();
    match sitemaps.handle(&url) {
        Ok(reply) => response::respond_reply(request, reply),
        Err(e @ SitemapError::StaleFile { .. }) => {
            log!("serve"; "{}, regeneration queued", e);
            response::respond_not_found(request)
        }
        Err(e) if e.is_not_found() => {
            debug!("serve"; "404 {}: {}", url, e);
            response::respond_not_found(request)
        }
        Err(e) => {
            log!("error"; "{}: {}", url, e);
            response::respond_error(request)
        }
    }
}
