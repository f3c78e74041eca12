//! Raw-socket ICMP echo via `surge-ping`.

use std::net::IpAddr;

use async_trait::async_trait;
use surge_ping::SurgeError;
use tracing::debug;

use super::{ProbeOptions, ProbeOutcome, Prober};
use crate::monitor::HostTarget;

/// Prober that sends one ICMP echo request per check.
#[derive(Debug, Clone, Default)]
pub struct IcmpPing;

impl IcmpPing {
    /// Create a raw-socket prober.
    pub fn new() -> Self {
        Self
    }
}

/// Resolve a host name or IP literal to the first address returned.
async fn resolve(host: &HostTarget) -> Result<IpAddr, String> {
    if let Ok(ip) = host.name().parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addrs = tokio::net::lookup_host((host.name(), 0))
        .await
        .map_err(|e| format!("failed to resolve {host}: {e}"))?;
    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| format!("no addresses for {host}"))
}

#[async_trait]
impl Prober for IcmpPing {
    async fn probe(&self, host: &HostTarget, opts: &ProbeOptions) -> ProbeOutcome {
        let ip = match resolve(host).await {
            Ok(ip) => ip,
            Err(detail) => return ProbeOutcome::Error(detail),
        };
        let payload = vec![0u8; usize::from(opts.packet_size)];

        match tokio::time::timeout(opts.timeout, surge_ping::ping(ip, &payload)).await {
            Ok(Ok((_, rtt))) => {
                debug!(host = %host, %ip, rtt_ms = rtt.as_millis(), "echo reply");
                ProbeOutcome::Reachable
            }
            Ok(Err(SurgeError::Timeout { .. })) | Err(_) => ProbeOutcome::Unreachable,
            Ok(Err(e)) => ProbeOutcome::Error(format!("icmp echo to {ip} failed: {e}")),
        }
    }
}
