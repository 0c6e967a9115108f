//! Server lifecycle management.

use anyhow::Result;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::{
    net::SocketAddr,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};
use tiny_http::Server;

use crate::cli::common::report;
use crate::core::{is_shutdown, register_server};
use crate::rebuild::{BatchRunner, RunOutcome};
use crate::{debug, log};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind to the specified interface and port, with automatic port retry.
pub fn bind_with_retry(
    interface: std::net::IpAddr,
    base_port: u16,
) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string())
    ))
}

/// Register server for graceful shutdown.
///
/// When Ctrl+C is pressed, the handler set up in main() unblocks the server
/// and notifies the cron thread.
pub fn register_server_for_shutdown(server: Arc<Server>, shutdown_tx: Sender<()>) {
    register_server(server, shutdown_tx);
}

/// Cron settings for the background thread.
#[derive(Debug, Clone, Copy)]
pub struct CronSchedule {
    pub interval: Duration,
    pub time_limit: Duration,
    pub auto_rebuild: bool,
}

/// Run cron once right away, then every `interval`, until shutdown.
pub fn spawn_cron(
    runner: BatchRunner,
    schedule: CronSchedule,
    shutdown_rx: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        debug!("cron"; "every {}s", schedule.interval.as_secs());
        loop {
            run_cron_once(&runner, schedule);
            match shutdown_rx.recv_timeout(schedule.interval) {
                Err(RecvTimeoutError::Timeout) if !is_shutdown() => {}
                _ => break,
            }
        }
    })
}

fn run_cron_once(runner: &BatchRunner, schedule: CronSchedule) {
    match runner.cron(schedule.auto_rebuild, schedule.time_limit) {
        Ok(RunOutcome::Idle) => {}
        Ok(outcome) => report(&outcome),
        Err(e) => log!("error"; "cron: {}", e),
    }
}

/// Wait for the cron thread to finish its step (max 2 seconds).
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
