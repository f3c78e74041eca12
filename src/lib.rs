//! pingwatch: a liveness-monitoring daemon.
//!
//! Periodically pings a set of hosts, tracks each host's status with
//! consecutive-result hysteresis, and sends one mail per up/down transition.
//!
//! See `DESIGN.md` for how the pieces fit together.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod monitor;
pub mod notify;
pub mod probe;

pub mod cycle;
pub mod daemon;
