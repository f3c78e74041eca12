//! One probing cycle: concurrent fan-out, barrier, then sequential apply and notify.
//!
//! Probe tasks only produce [`ProbeOutcome`]s. All [`HostMonitor`] mutation
//! and every notifier call happen after the join, on the caller's task, so
//! host state needs no locking and notifications never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::monitor::{HostMonitor, HostState, HostStatus, HostTarget, Thresholds, Transition};
use crate::notify::{Notification, Notifier};
use crate::probe::{ProbeOptions, ProbeOutcome, Prober};

/// Slack added to the probe timeout before a probe is given up on.
pub const PROBE_SLACK: Duration = Duration::from_secs(1);

/// What happened during one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Probe outcome per host, in configured order.
    pub outcomes: Vec<(HostTarget, ProbeOutcome)>,
    /// Status changes produced this cycle.
    pub transitions: Vec<Transition>,
    /// Transitions whose notification could not be delivered.
    pub failed_notifications: usize,
}

impl CycleReport {
    /// Number of hosts whose probe did not report reachable.
    pub fn unreachable_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_reachable())
            .count()
    }
}

/// Probe every host concurrently and wait for all of them.
///
/// Outcomes are returned in the order of `hosts`. Each probe is bounded by
/// `opts.timeout + PROBE_SLACK`; a probe that overruns, or whose task dies,
/// is reported as [`ProbeOutcome::Error`]. Dropping the returned future
/// aborts any probes still running.
pub async fn probe_hosts(
    prober: &Arc<dyn Prober>,
    hosts: &[HostTarget],
    opts: ProbeOptions,
) -> Vec<ProbeOutcome> {
    let limit = opts.timeout.saturating_add(PROBE_SLACK);
    let mut tasks = JoinSet::new();

    for (index, host) in hosts.iter().cloned().enumerate() {
        let prober = Arc::clone(prober);
        tasks.spawn(async move {
            let outcome = match tokio::time::timeout(limit, prober.probe(&host, &opts)).await {
                Ok(outcome) => outcome,
                Err(_) => ProbeOutcome::Error(format!("probe timed out after {limit:?}")),
            };
            (index, outcome)
        });
    }

    let mut outcomes: Vec<Option<ProbeOutcome>> = vec![None; hosts.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                if let Some(slot) = outcomes.get_mut(index) {
                    *slot = Some(outcome);
                }
            }
            Err(e) => warn!(error = %e, "probe task failed"),
        }
    }

    outcomes
        .into_iter()
        .map(|o| o.unwrap_or_else(|| ProbeOutcome::Error("probe task failed".to_owned())))
        .collect()
}

/// Render the alert for a transition. Output depends only on the transition.
pub fn render_notification(transition: &Transition) -> Notification {
    let host = &transition.host;
    let n = transition.confirmations;
    match transition.to {
        HostStatus::Down => Notification {
            subject: format!("{host} is down"),
            body: format!(
                "{host} is not reachable via ping\n\n\
                 No reply to {n} consecutive probes; status changed from {} to {}.\n",
                transition.from, transition.to
            ),
        },
        HostStatus::Up => Notification {
            subject: format!("{host} is up again"),
            body: format!(
                "{host} is reachable via ping again\n\n\
                 Replied to {n} consecutive probes; status changed from {} to {}.\n",
                transition.from, transition.to
            ),
        },
    }
}

/// Owns every host's state machine and the injected probe/notify capabilities.
pub struct CycleRunner {
    monitors: Vec<HostMonitor>,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn Notifier>,
    options: ProbeOptions,
}

impl CycleRunner {
    /// Create one [`HostMonitor`] per target, all starting `Up`.
    pub fn new(
        targets: Vec<HostTarget>,
        thresholds: Thresholds,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
        options: ProbeOptions,
    ) -> Self {
        let monitors = targets
            .into_iter()
            .map(|target| HostMonitor::new(target, thresholds))
            .collect();
        Self {
            monitors,
            prober,
            notifier,
            options,
        }
    }

    /// The per-host monitors, in configured order.
    pub fn monitors(&self) -> &[HostMonitor] {
        &self.monitors
    }

    /// Current state of every host.
    pub fn snapshot(&self) -> Vec<(HostTarget, HostState)> {
        self.monitors
            .iter()
            .map(|m| (m.target().clone(), m.state()))
            .collect()
    }

    /// Run one full cycle: probe all hosts, apply results, notify transitions.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let targets: Vec<HostTarget> = self.monitors.iter().map(|m| m.target().clone()).collect();
        let outcomes = probe_hosts(&self.prober, &targets, self.options).await;

        let transitions = self.apply(&outcomes);
        let failed_notifications = self.dispatch(&transitions).await;

        let report = CycleReport {
            outcomes: targets.into_iter().zip(outcomes).collect(),
            transitions,
            failed_notifications,
        };

        let down = self
            .monitors
            .iter()
            .filter(|m| m.status() == HostStatus::Down)
            .count();
        debug!(
            hosts = self.monitors.len(),
            down,
            unreachable = report.unreachable_count(),
            transitions = report.transitions.len(),
            "cycle complete"
        );
        report
    }

    fn apply(&mut self, outcomes: &[ProbeOutcome]) -> Vec<Transition> {
        let mut transitions = Vec::new();
        for (monitor, outcome) in self.monitors.iter_mut().zip(outcomes) {
            match outcome {
                ProbeOutcome::Reachable => debug!(host = %monitor.target(), "probe ok"),
                ProbeOutcome::Unreachable => debug!(host = %monitor.target(), "no reply"),
                ProbeOutcome::Error(detail) => {
                    debug!(host = %monitor.target(), error = %detail, "probe failed");
                }
            }

            if let Some(transition) = monitor.record_result(outcome.is_reachable()) {
                warn!(
                    host = %transition.host,
                    from = %transition.from,
                    to = %transition.to,
                    confirmations = transition.confirmations,
                    "host status changed"
                );
                transitions.push(transition);
            }
        }
        transitions
    }

    /// Send one notification per transition, in order. Returns the failure count.
    async fn dispatch(&self, transitions: &[Transition]) -> usize {
        let mut failed: usize = 0;
        for transition in transitions {
            let notification = render_notification(transition);
            match self.notifier.notify(&notification).await {
                Ok(()) => debug!(
                    host = %transition.host,
                    subject = %notification.subject,
                    "notification sent"
                ),
                Err(e) => {
                    failed = failed.saturating_add(1);
                    warn!(host = %transition.host, error = %e, "failed to send notification");
                }
            }
        }
        failed
    }
}
