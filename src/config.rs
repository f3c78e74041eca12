//! Configuration loading and validation.
//!
//! Loads `config.toml` with per-section defaults, then layers environment
//! and command-line overrides on top. Precedence: CLI > env > file > defaults.
//! [`Config::validate`] must pass before anything is probed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};

use crate::monitor::{HostTarget, Thresholds};
use crate::probe::{ProbeMethod, ProbeOptions};

/// Largest ICMP payload accepted.
pub const MAX_PACKET_SIZE: u16 = 65_500;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Hosts, interval, and hysteresis thresholds.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Probe implementation and its parameters.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Alert mail settings.
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Shutdown behaviour.
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hosts to watch and when to change their status.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Host names or IP literals, probed in this order.
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Seconds between the starts of consecutive cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Consecutive failed probes before a host is reported down.
    #[serde(default = "default_max_down")]
    pub max_down: u32,

    /// Consecutive successful probes before a down host is reported up again.
    #[serde(default = "default_max_up")]
    pub max_up: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            interval_secs: default_interval_secs(),
            max_down: default_max_down(),
            max_up: default_max_up(),
        }
    }
}

/// Probe implementation and per-probe parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// `system` (spawn `ping`) or `icmp` (raw socket).
    #[serde(default)]
    pub method: ProbeMethod,

    /// Seconds to wait for an echo reply.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// ICMP payload size in bytes.
    #[serde(default = "default_packet_size")]
    pub packet_size: u16,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            method: ProbeMethod::default(),
            timeout_secs: default_timeout_secs(),
            packet_size: default_packet_size(),
        }
    }
}

/// Transport security for the SMTP connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Plain connection.
    #[default]
    None,
    /// Upgrade with STARTTLS; fail if the server does not offer it.
    Starttls,
    /// TLS from the first byte (SMTPS).
    Tls,
}

/// Alert mail settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpConfig {
    /// Master switch for mail alerts.
    #[serde(default)]
    pub enabled: bool,

    /// SMTP server as `host:port`.
    #[serde(default)]
    pub server: String,

    /// Envelope and header sender address.
    #[serde(default)]
    pub from: String,

    /// Recipient addresses.
    #[serde(default)]
    pub to: Vec<String>,

    /// Connection security.
    #[serde(default)]
    pub tls: SmtpTls,

    /// Accept invalid certificates and host names. For test servers only.
    #[serde(default)]
    pub skip_certificate_verify: bool,

    /// Optional AUTH user name.
    #[serde(default)]
    pub username: Option<String>,

    /// Environment variable holding the AUTH password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Seconds before an SMTP command is abandoned.
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: String::new(),
            from: String::new(),
            to: Vec::new(),
            tls: SmtpTls::default(),
            skip_certificate_verify: false,
            username: None,
            password_env: default_password_env(),
            timeout_secs: default_smtp_timeout_secs(),
        }
    }
}

/// Shutdown behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShutdownConfig {
    /// Seconds an in-flight cycle may keep running after a termination signal.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_secs: default_grace_secs(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// When set, JSON logs are also written here with daily rotation.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Values supplied on the command line. `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Replaces the configured host list when non-empty.
    pub hosts: Vec<String>,
    /// Cycle interval in seconds.
    pub interval_secs: Option<u64>,
    /// Failure threshold.
    pub max_down: Option<u32>,
    /// Recovery threshold.
    pub max_up: Option<u32>,
    /// ICMP payload size.
    pub packet_size: Option<u16>,
    /// SMTP server; setting it enables mail.
    pub smtp_server: Option<String>,
    /// Sender address.
    pub smtp_from: Option<String>,
    /// Replaces the recipient list when non-empty.
    pub smtp_to: Vec<String>,
    /// Force STARTTLS.
    pub smtp_starttls: bool,
    /// Skip certificate verification.
    pub smtp_skip_certificate_verify: bool,
}

/// Reasons a configuration is refused at startup.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment override holds a value of the wrong type.
    #[error("{var}='{value}' is not a valid value")]
    InvalidEnv {
        /// Environment variable name.
        var: &'static str,
        /// The offending value.
        value: String,
    },
    /// No hosts were configured.
    #[error("at least one host must be configured")]
    NoHosts,
    /// A host entry is empty, contains whitespace or non-ASCII, or looks like an option.
    #[error("invalid host '{0}'")]
    InvalidHost(String),
    /// The same host appears twice.
    #[error("host '{0}' is configured more than once")]
    DuplicateHost(String),
    /// A value that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    /// Payload size outside the accepted range.
    #[error("packet_size must be between 1 and {MAX_PACKET_SIZE}, got {0}")]
    PacketSize(u16),
    /// A required SMTP setting is missing while mail is enabled.
    #[error("smtp.{0} is required when mail alerts are enabled")]
    MissingSmtpField(&'static str),
    /// The SMTP server is not `host:port`.
    #[error("smtp.server '{0}' is not host:port")]
    InvalidSmtpServer(String),
    /// A mail address failed to parse.
    #[error("smtp.{field} '{value}' is not a valid mail address")]
    InvalidAddress {
        /// Which setting held the address.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}

impl Config {
    /// Parse a TOML string into config without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or has wrongly typed fields.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests do not need to touch the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a numeric override does not parse.
    pub fn apply_env_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = env("PINGWATCH_HOSTS") {
            self.monitor.hosts = v
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(v) = env("PINGWATCH_INTERVAL_SECS") {
            self.monitor.interval_secs = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    var: "PINGWATCH_INTERVAL_SECS",
                    value: v.clone(),
                })?;
        }
        if let Some(v) = env("PINGWATCH_SMTP_SERVER") {
            self.smtp.server = v;
            self.smtp.enabled = true;
        }
        Ok(())
    }

    /// Apply command-line overrides.
    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if !cli.hosts.is_empty() {
            self.monitor.hosts.clone_from(&cli.hosts);
        }
        if let Some(v) = cli.interval_secs {
            self.monitor.interval_secs = v;
        }
        if let Some(v) = cli.max_down {
            self.monitor.max_down = v;
        }
        if let Some(v) = cli.max_up {
            self.monitor.max_up = v;
        }
        if let Some(v) = cli.packet_size {
            self.probe.packet_size = v;
        }
        if let Some(v) = &cli.smtp_server {
            self.smtp.server.clone_from(v);
            self.smtp.enabled = true;
        }
        if let Some(v) = &cli.smtp_from {
            self.smtp.from.clone_from(v);
        }
        if !cli.smtp_to.is_empty() {
            self.smtp.to.clone_from(&cli.smtp_to);
        }
        if cli.smtp_starttls {
            self.smtp.tls = SmtpTls::Starttls;
        }
        if cli.smtp_skip_certificate_verify {
            self.smtp.skip_certificate_verify = true;
        }
    }

    /// Validate that configuration values are usable.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.hosts.is_empty() {
            return Err(ConfigError::NoHosts);
        }
        let mut seen = HashSet::new();
        for host in &self.monitor.hosts {
            let valid = !host.is_empty()
                && host.is_ascii()
                && !host.starts_with('-')
                && !host.chars().any(|c| c.is_whitespace() || c.is_control());
            if !valid {
                return Err(ConfigError::InvalidHost(host.clone()));
            }
            if !seen.insert(host.to_ascii_lowercase()) {
                return Err(ConfigError::DuplicateHost(host.clone()));
            }
        }

        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::Zero("monitor.interval_secs"));
        }
        self.thresholds()?;
        if self.probe.timeout_secs == 0 {
            return Err(ConfigError::Zero("probe.timeout_secs"));
        }
        if self.probe.packet_size == 0 || self.probe.packet_size > MAX_PACKET_SIZE {
            return Err(ConfigError::PacketSize(self.probe.packet_size));
        }
        if self.shutdown.grace_secs == 0 {
            return Err(ConfigError::Zero("shutdown.grace_secs"));
        }

        if self.smtp.enabled {
            self.validate_smtp()?;
        }
        Ok(())
    }

    fn validate_smtp(&self) -> Result<(), ConfigError> {
        let smtp = &self.smtp;
        if smtp.server.is_empty() {
            return Err(ConfigError::MissingSmtpField("server"));
        }
        if split_server(&smtp.server).is_none() {
            return Err(ConfigError::InvalidSmtpServer(smtp.server.clone()));
        }
        if smtp.from.is_empty() {
            return Err(ConfigError::MissingSmtpField("from"));
        }
        if smtp.from.parse::<Mailbox>().is_err() {
            return Err(ConfigError::InvalidAddress {
                field: "from",
                value: smtp.from.clone(),
            });
        }
        if smtp.to.is_empty() {
            return Err(ConfigError::MissingSmtpField("to"));
        }
        if let Some(bad) = smtp.to.iter().find(|a| a.parse::<Mailbox>().is_err()) {
            return Err(ConfigError::InvalidAddress {
                field: "to",
                value: bad.clone(),
            });
        }
        if smtp.timeout_secs == 0 {
            return Err(ConfigError::Zero("smtp.timeout_secs"));
        }
        Ok(())
    }

    /// Hysteresis thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] when either threshold is zero.
    pub fn thresholds(&self) -> Result<Thresholds, ConfigError> {
        if self.monitor.max_down == 0 {
            return Err(ConfigError::Zero("monitor.max_down"));
        }
        Thresholds::new(self.monitor.max_down, self.monitor.max_up)
            .ok_or(ConfigError::Zero("monitor.max_up"))
    }

    /// Configured hosts as probe targets.
    pub fn targets(&self) -> Vec<HostTarget> {
        self.monitor.hosts.iter().map(HostTarget::new).collect()
    }

    /// Time between cycle starts.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_secs)
    }

    /// Grace period for an in-flight cycle after a termination signal.
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.shutdown.grace_secs)
    }

    /// Options passed to every probe.
    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            timeout: Duration::from_secs(self.probe.timeout_secs),
            packet_size: self.probe.packet_size,
        }
    }
}

/// Split `host:port`, accepting bracketed IPv6 literals (`[::1]:25`).
pub fn split_server(server: &str) -> Option<(&str, u16)> {
    let (host, port) = server.rsplit_once(':')?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    let port = port.parse::<u16>().ok().filter(|p| *p != 0)?;
    Some((host, port))
}

/// Default config file location (`$XDG_CONFIG_HOME/pingwatch/config.toml` on Linux).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let dirs = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(dirs.config_dir().join("pingwatch").join("config.toml"))
}

/// Load configuration from a TOML file.
///
/// An explicitly given path must exist. When no path is given the default
/// location is tried and a missing file yields defaults, so a fully
/// command-line driven invocation needs no file. The result is not validated.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_config_path()?;
            if !path.exists() {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            path
        }
    };

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))
}

// Default value functions for serde.

fn default_interval_secs() -> u64 {
    60
}

fn default_max_down() -> u32 {
    5
}

fn default_max_up() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    1
}

fn default_packet_size() -> u16 {
    56
}

fn default_password_env() -> String {
    "PINGWATCH_SMTP_PASSWORD".to_owned()
}

fn default_smtp_timeout_secs() -> u64 {
    30
}

fn default_grace_secs() -> u64 {
    5
}
