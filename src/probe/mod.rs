//! Reachability probing abstractions and implementations.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::monitor::HostTarget;

pub mod icmp;
pub mod system;

/// Which probe implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    /// Shell out to the platform `ping` utility.
    #[default]
    System,
    /// Send ICMP echo requests from a raw socket (needs `CAP_NET_RAW` or root).
    Icmp,
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Icmp => write!(f, "icmp"),
        }
    }
}

/// Per-probe settings passed through from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// How long to wait for an echo reply.
    pub timeout: Duration,
    /// ICMP payload size in bytes.
    pub packet_size: u16,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            packet_size: 56,
        }
    }
}

/// Result of a single reachability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum ProbeOutcome {
    /// An echo reply arrived within the timeout.
    Reachable,
    /// The probe ran but no reply arrived.
    Unreachable,
    /// The probe itself could not be carried out.
    Error(String),
}

impl ProbeOutcome {
    /// Only [`ProbeOutcome::Reachable`] counts as reachable; errors count as failures.
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable => write!(f, "reachable"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::Error(detail) => write!(f, "probe error: {detail}"),
        }
    }
}

/// Capability to check whether a host is reachable.
///
/// Implementations must return within roughly `opts.timeout`; callers add
/// their own upper bound on top.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Perform one reachability check.
    async fn probe(&self, host: &HostTarget, opts: &ProbeOptions) -> ProbeOutcome;
}

/// Construct the prober for the configured method.
pub fn build_prober(method: ProbeMethod) -> Arc<dyn Prober> {
    match method {
        ProbeMethod::System => Arc::new(system::SystemPing::new()),
        ProbeMethod::Icmp => Arc::new(icmp::IcmpPing::new()),
    }
}
