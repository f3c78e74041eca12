//! Per-host status tracking with hysteresis.
//!
//! A [`HostMonitor`] consumes one probe result at a time and only flips the
//! host's status after a run of consecutive contradicting results reaches
//! the configured threshold. Any result that agrees with the current status
//! breaks the run and zeroes its counter.

use std::fmt;
use std::num::NonZeroU32;

use serde::Serialize;

/// Observed reachability status of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    /// Host answers probes.
    Up,
    /// Host has failed enough consecutive probes to be considered down.
    Down,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// Identity of a monitored endpoint (hostname or IP literal).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HostTarget {
    name: String,
}

impl HostTarget {
    /// Wrap a host name or address.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The configured host name or address.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Consecutive-result thresholds that gate status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Consecutive failed probes required for Up -> Down.
    pub max_down: NonZeroU32,
    /// Consecutive successful probes required for Down -> Up.
    pub max_up: NonZeroU32,
}

impl Thresholds {
    /// Build thresholds, returning `None` when either count is zero.
    pub fn new(max_down: u32, max_up: u32) -> Option<Self> {
        Some(Self {
            max_down: NonZeroU32::new(max_down)?,
            max_up: NonZeroU32::new(max_up)?,
        })
    }
}

/// Mutable monitoring state for one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostState {
    /// Current status. Starts optimistic at [`HostStatus::Up`].
    pub status: HostStatus,
    /// Failed probes in a row while the host is up.
    pub consecutive_down: u32,
    /// Successful probes in a row while the host is down.
    pub consecutive_up: u32,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            status: HostStatus::Up,
            consecutive_down: 0,
            consecutive_up: 0,
        }
    }
}

/// A status change produced by [`HostMonitor::record_result`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Host whose status changed.
    pub host: HostTarget,
    /// Status before the change.
    pub from: HostStatus,
    /// Status after the change.
    pub to: HostStatus,
    /// Length of the confirming run that triggered the change.
    pub confirmations: u32,
}

/// Owns the status state machine for a single host.
#[derive(Debug, Clone)]
pub struct HostMonitor {
    target: HostTarget,
    thresholds: Thresholds,
    state: HostState,
}

impl HostMonitor {
    /// Create a monitor in the initial `Up` state with zeroed counters.
    pub fn new(target: HostTarget, thresholds: Thresholds) -> Self {
        Self {
            target,
            thresholds,
            state: HostState::default(),
        }
    }

    /// The monitored host.
    pub fn target(&self) -> &HostTarget {
        &self.target
    }

    /// Current status.
    pub fn status(&self) -> HostStatus {
        self.state.status
    }

    /// Snapshot of status and counters.
    pub fn state(&self) -> HostState {
        self.state
    }

    /// Feed one probe result into the state machine.
    ///
    /// Returns a [`Transition`] when this result completes a run of
    /// `max_down` failures (while up) or `max_up` successes (while down).
    /// Both counters are zero after every transition.
    pub fn record_result(&mut self, reachable: bool) -> Option<Transition> {
        let state = &mut self.state;
        match (state.status, reachable) {
            (HostStatus::Up, true) => {
                state.consecutive_down = 0;
                None
            }
            (HostStatus::Down, false) => {
                state.consecutive_up = 0;
                None
            }
            (HostStatus::Up, false) => {
                state.consecutive_down = state.consecutive_down.saturating_add(1);
                if state.consecutive_down < self.thresholds.max_down.get() {
                    return None;
                }
                Some(self.flip(HostStatus::Down))
            }
            (HostStatus::Down, true) => {
                state.consecutive_up = state.consecutive_up.saturating_add(1);
                if state.consecutive_up < self.thresholds.max_up.get() {
                    return None;
                }
                Some(self.flip(HostStatus::Up))
            }
        }
    }

    fn flip(&mut self, to: HostStatus) -> Transition {
        let confirmations = match to {
            HostStatus::Down => self.state.consecutive_down,
            HostStatus::Up => self.state.consecutive_up,
        };
        let from = self.state.status;
        self.state = HostState {
            status: to,
            consecutive_down: 0,
            consecutive_up: 0,
        };
        Transition {
            host: self.target.clone(),
            from,
            to,
            confirmations,
        }
    }
}
