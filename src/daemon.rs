//! Fixed-interval loop driving [`CycleRunner`] until shutdown is requested.
//!
//! The first cycle starts immediately. Later cycles start one interval after
//! the previous start; an overrunning cycle delays the next tick rather than
//! causing a burst. Once shutdown is requested no new cycle starts, and an
//! in-flight cycle gets the grace period to finish before it is abandoned.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cycle::{CycleReport, CycleRunner};

/// Exit status for a signal-triggered shutdown (128 + SIGINT).
pub const EXIT_SIGNAL: u8 = 130;

/// Exit status for a configuration refused at startup (`EX_CONFIG`).
pub const EXIT_CONFIG: u8 = 78;

/// Extra time the process watchdog allows beyond the grace period.
pub const WATCHDOG_SLACK: Duration = Duration::from_secs(2);

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonOptions {
    /// Time between cycle starts.
    pub interval: Duration,
    /// How long an in-flight cycle may run after shutdown is requested.
    pub grace: Duration,
}

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonExit {
    /// Cycles that ran to completion.
    pub completed_cycles: u64,
    /// Whether a cycle was still running when the grace period ran out.
    pub abandoned_cycle: bool,
}

/// Create the shutdown channel: send `true` to stop the loop.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

enum CycleEnd {
    Finished(CycleReport),
    Interrupted,
}

/// Run cycles at a fixed interval until shutdown is requested.
pub async fn run_daemon(
    runner: &mut CycleRunner,
    options: DaemonOptions,
    mut shutdown_rx: watch::Receiver<bool>,
) -> DaemonExit {
    info!(
        hosts = runner.monitors().len(),
        interval_secs = options.interval.as_secs(),
        "monitor started"
    );

    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut completed_cycles: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown_rx) => {
                info!(completed_cycles, "shutdown requested, not starting another cycle");
                return DaemonExit { completed_cycles, abandoned_cycle: false };
            }
            _ = ticker.tick() => {}
        }

        let cycle = runner.run_cycle();
        tokio::pin!(cycle);

        let end = tokio::select! {
            report = &mut cycle => CycleEnd::Finished(report),
            _ = shutdown_requested(&mut shutdown_rx) => CycleEnd::Interrupted,
        };

        match end {
            CycleEnd::Finished(report) => {
                completed_cycles = completed_cycles.saturating_add(1);
                log_cycle(completed_cycles, &report);
            }
            CycleEnd::Interrupted => {
                info!(
                    grace_secs = options.grace.as_secs(),
                    "shutdown requested during cycle, waiting for it to finish"
                );
                let abandoned_cycle = match tokio::time::timeout(options.grace, &mut cycle).await {
                    Ok(report) => {
                        completed_cycles = completed_cycles.saturating_add(1);
                        log_cycle(completed_cycles, &report);
                        false
                    }
                    Err(_) => {
                        warn!("grace period exceeded, abandoning in-flight cycle");
                        true
                    }
                };
                return DaemonExit {
                    completed_cycles,
                    abandoned_cycle,
                };
            }
        }
    }
}

fn log_cycle(cycle: u64, report: &CycleReport) {
    if report.failed_notifications > 0 {
        warn!(
            cycle,
            failed = report.failed_notifications,
            "some notifications were not delivered"
        );
    }
    debug!(cycle, transitions = report.transitions.len(), "cycle finished");
}

/// Wait for SIGINT or SIGTERM and return the signal's name.
pub async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                () = ctrl_c() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            },
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler, only SIGINT is handled");
                ctrl_c().await;
                "SIGINT"
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c().await;
        "ctrl-c"
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for SIGINT");
        std::future::pending::<()>().await;
    }
}
