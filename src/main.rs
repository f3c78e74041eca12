//! pingwatch CLI entry point.
//!
//! Provides `start`, `check`, and `validate` subcommands for running the
//! monitor daemon, probing every host once, or checking the configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use pingwatch::config::{load_config, CliOverrides, Config};
use pingwatch::cycle::{probe_hosts, CycleRunner};
use pingwatch::daemon::{
    run_daemon, shutdown_channel, wait_for_signal, DaemonOptions, EXIT_CONFIG, EXIT_SIGNAL,
    WATCHDOG_SLACK,
};
use pingwatch::logging;
use pingwatch::notify::build_notifier;
use pingwatch::probe::{build_prober, ProbeOutcome};

/// Ping hosts and send mail when they go down or come back.
#[derive(Parser)]
#[command(name = "pingwatch", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the monitor daemon until SIGINT/SIGTERM.
    Start(Settings),
    /// Probe every host once, print a JSON report, and exit.
    Check(Settings),
    /// Validate the effective configuration and print it.
    Validate(Settings),
}

/// Settings shared by all subcommands. Flags override the config file.
#[derive(Args)]
struct Settings {
    /// Config file (default: `<config dir>/pingwatch/config.toml`).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to ping. Repeat for several hosts.
    #[arg(long = "host")]
    hosts: Vec<String>,

    /// Seconds between probe cycles.
    #[arg(long)]
    interval: Option<u64>,

    /// Consecutive failed pings before a host is reported down.
    #[arg(long)]
    max_down: Option<u32>,

    /// Consecutive successful pings before a host is reported up again.
    #[arg(long)]
    max_up: Option<u32>,

    /// ICMP payload size in bytes.
    #[arg(long)]
    packet_size: Option<u16>,

    /// SMTP server (`host:port`) for alert mails; enables mail alerts.
    #[arg(long)]
    smtp: Option<String>,

    /// Sender address.
    #[arg(long)]
    smtp_from: Option<String>,

    /// Recipient address. Repeat for several recipients.
    #[arg(long)]
    smtp_to: Vec<String>,

    /// Use STARTTLS for the SMTP connection.
    #[arg(long)]
    smtp_tls: bool,

    /// Do not verify the SMTP server certificate.
    #[arg(long)]
    smtp_skip_certificate_verify: bool,

    /// Log probe and notification outcomes.
    #[arg(short, long)]
    verbose: bool,
}

impl Settings {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            hosts: self.hosts.clone(),
            interval_secs: self.interval,
            max_down: self.max_down,
            max_up: self.max_up,
            packet_size: self.packet_size,
            smtp_server: self.smtp.clone(),
            smtp_from: self.smtp_from.clone(),
            smtp_to: self.smtp_to.clone(),
            smtp_starttls: self.smtp_tls,
            smtp_skip_certificate_verify: self.smtp_skip_certificate_verify,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start(settings) => match effective_config(&settings) {
            Ok(config) => handle_start(config, settings.verbose).await,
            Err(e) => return config_failure(&e),
        },
        Command::Check(settings) => match effective_config(&settings) {
            Ok(config) => handle_check(config, settings.verbose).await,
            Err(e) => return config_failure(&e),
        },
        Command::Validate(settings) => match effective_config(&settings) {
            Ok(config) => handle_validate(&config),
            Err(e) => return config_failure(&e),
        },
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("pingwatch: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Report a configuration that cannot be used and pick the matching exit status.
fn config_failure(e: &anyhow::Error) -> ExitCode {
    eprintln!("pingwatch: {e:#}");
    ExitCode::from(EXIT_CONFIG)
}

/// Load the config file, apply env and CLI overrides, and validate.
fn effective_config(settings: &Settings) -> anyhow::Result<Config> {
    let mut config = load_config(settings.config.as_deref())?;
    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .context("invalid environment override")?;
    config.apply_cli_overrides(&settings.overrides());
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Run the monitor daemon.
async fn handle_start(config: Config, verbose: bool) -> anyhow::Result<ExitCode> {
    let directive = logging::default_directive(verbose);
    let logging_guard = match &config.logging.dir {
        Some(dir) => Some(logging::init_production(dir, directive)?),
        None => {
            logging::init_cli(directive);
            None
        }
    };

    let password = std::env::var(&config.smtp.password_env).ok();
    let notifier = match build_notifier(&config.smtp, password) {
        Ok(notifier) => notifier,
        Err(e) => {
            error!(error = %e, "cannot set up mail alerts");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    let prober = build_prober(config.probe.method);

    let mut runner = CycleRunner::new(
        config.targets(),
        config.thresholds()?,
        prober,
        notifier,
        config.probe_options(),
    );

    info!(
        hosts = ?config.monitor.hosts,
        method = %config.probe.method,
        max_down = config.monitor.max_down,
        max_up = config.monitor.max_up,
        mail = config.smtp.enabled,
        "pingwatch starting"
    );

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let grace = config.grace();
    // `process::exit` skips destructors, so the watchdog owns the logging
    // guard and drops it before exiting.
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(signal, "caught signal, shutting down");
        let _ = shutdown_tx.send(true);

        // The loop honours the grace period itself; this only fires if it is wedged.
        tokio::time::sleep(grace.saturating_add(WATCHDOG_SLACK)).await;
        error!("shutdown did not complete in time, forcing exit");
        drop(logging_guard);
        std::process::exit(i32::from(EXIT_SIGNAL));
    });

    let options = DaemonOptions {
        interval: config.interval(),
        grace,
    };
    let exit = run_daemon(&mut runner, options, shutdown_rx).await;

    if exit.abandoned_cycle {
        warn!(completed_cycles = exit.completed_cycles, "stopped with a cycle in flight");
    } else {
        info!(completed_cycles = exit.completed_cycles, "stopped");
    }
    Ok(ExitCode::from(EXIT_SIGNAL))
}

/// One host's entry in the `check` report.
#[derive(Serialize)]
struct HostCheck {
    host: String,
    reachable: bool,
    outcome: ProbeOutcome,
}

/// JSON report printed by `check`.
#[derive(Serialize)]
struct CheckReport {
    checked_at: String,
    hosts: Vec<HostCheck>,
}

/// Probe every host once. Exits non-zero if any host is unreachable.
async fn handle_check(config: Config, verbose: bool) -> anyhow::Result<ExitCode> {
    logging::init_cli(logging::default_directive(verbose));

    let prober = build_prober(config.probe.method);
    let targets = config.targets();
    let outcomes = probe_hosts(&prober, &targets, config.probe_options()).await;

    let report = CheckReport {
        checked_at: chrono::Utc::now().to_rfc3339(),
        hosts: targets
            .into_iter()
            .zip(outcomes)
            .map(|(target, outcome)| HostCheck {
                host: target.name().to_owned(),
                reachable: outcome.is_reachable(),
                outcome,
            })
            .collect(),
    };

    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    println!("{json}");

    if report.hosts.iter().all(|h| h.reachable) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Print the effective configuration.
fn handle_validate(config: &Config) -> anyhow::Result<ExitCode> {
    let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
    println!("{rendered}");
    Ok(ExitCode::SUCCESS)
}
