//! Coverage for config parsing, overrides, and validation.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use pingwatch::config::{load_config, CliOverrides, Config, ConfigError, SmtpTls, MAX_PACKET_SIZE};
use pingwatch::probe::ProbeMethod;

const FULL: &str = r#"
[monitor]
hosts = ["gw.example.org", "10.0.0.7"]
interval_secs = 30
max_down = 3
max_up = 2

[probe]
method = "icmp"
timeout_secs = 2
packet_size = 64

[smtp]
enabled = true
server = "mail.example.org:587"
from = "pingwatch@example.org"
to = ["ops@example.org", "oncall@example.org"]
tls = "starttls"
username = "pingwatch"

[shutdown]
grace_secs = 10

[logging]
dir = "/var/log/pingwatch"
"#;

fn valid() -> Config {
    let mut config = Config::default();
    config.monitor.hosts = vec!["a.example.org".to_owned()];
    config
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn parses_full_file() {
    let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
    file.write_all(FULL.as_bytes()).expect("should write config");

    let config = load_config(Some(file.path())).expect("config should load");

    assert_eq!(config.monitor.hosts, vec!["gw.example.org", "10.0.0.7"]);
    assert_eq!(config.interval(), Duration::from_secs(30));
    assert_eq!(config.monitor.max_down, 3);
    assert_eq!(config.monitor.max_up, 2);
    assert_eq!(config.probe.method, ProbeMethod::Icmp);
    assert_eq!(config.probe_options().timeout, Duration::from_secs(2));
    assert_eq!(config.probe_options().packet_size, 64);
    assert!(config.smtp.enabled);
    assert_eq!(config.smtp.tls, SmtpTls::Starttls);
    assert_eq!(config.smtp.to.len(), 2);
    assert_eq!(config.smtp.username.as_deref(), Some("pingwatch"));
    assert_eq!(config.smtp.password_env, "PINGWATCH_SMTP_PASSWORD");
    assert_eq!(config.grace(), Duration::from_secs(10));
    assert!(config.logging.dir.is_some());
    assert!(config.validate().is_ok());
}

#[test]
fn empty_file_yields_defaults() {
    let config = Config::from_toml("").expect("empty TOML should parse");
    assert!(config.monitor.hosts.is_empty());
    assert_eq!(config.monitor.interval_secs, 60);
    assert_eq!(config.monitor.max_down, 5);
    assert_eq!(config.monitor.max_up, 5);
    assert_eq!(config.probe.method, ProbeMethod::System);
    assert!(!config.smtp.enabled);
    assert_eq!(config.smtp.tls, SmtpTls::None);
    assert_eq!(config.shutdown.grace_secs, 5);
    assert!(config.logging.dir.is_none());
}

#[test]
fn explicit_missing_file_is_an_error() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let result = load_config(Some(&tmp.path().join("absent.toml")));
    assert!(result.is_err());
}

#[test]
fn malformed_toml_is_an_error() {
    assert!(Config::from_toml("[monitor\nhosts = [").is_err());
}

#[test]
fn unknown_probe_method_is_an_error() {
    assert!(Config::from_toml("[probe]\nmethod = \"carrier-pigeon\"").is_err());
}

#[test]
fn no_hosts_is_refused() {
    assert_eq!(Config::default().validate(), Err(ConfigError::NoHosts));
}

#[test]
fn bad_host_entries_are_refused() {
    for bad in ["", "-f", "two words", "h\u{f6}st.example"] {
        let mut config = valid();
        config.monitor.hosts = vec![bad.to_owned()];
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidHost(bad.to_owned())),
            "host {bad:?}"
        );
    }
}

#[test]
fn duplicate_hosts_are_refused_case_insensitively() {
    let mut config = valid();
    config.monitor.hosts = vec!["Gw.Example.org".to_owned(), "gw.example.org".to_owned()];
    assert_eq!(
        config.validate(),
        Err(ConfigError::DuplicateHost("gw.example.org".to_owned()))
    );
}

#[test]
fn zero_values_are_refused() {
    let mut config = valid();
    config.monitor.interval_secs = 0;
    assert_eq!(config.validate(), Err(ConfigError::Zero("monitor.interval_secs")));

    let mut config = valid();
    config.monitor.max_down = 0;
    assert_eq!(config.validate(), Err(ConfigError::Zero("monitor.max_down")));

    let mut config = valid();
    config.monitor.max_up = 0;
    assert_eq!(config.validate(), Err(ConfigError::Zero("monitor.max_up")));

    let mut config = valid();
    config.probe.timeout_secs = 0;
    assert_eq!(config.validate(), Err(ConfigError::Zero("probe.timeout_secs")));

    let mut config = valid();
    config.shutdown.grace_secs = 0;
    assert_eq!(config.validate(), Err(ConfigError::Zero("shutdown.grace_secs")));
}

#[test]
fn packet_size_bounds() {
    let mut config = valid();
    config.probe.packet_size = 0;
    assert_eq!(config.validate(), Err(ConfigError::PacketSize(0)));

    config.probe.packet_size = MAX_PACKET_SIZE;
    assert!(config.validate().is_ok());

    config.probe.packet_size = MAX_PACKET_SIZE.saturating_add(1);
    assert_eq!(
        config.validate(),
        Err(ConfigError::PacketSize(MAX_PACKET_SIZE.saturating_add(1)))
    );
}

#[test]
fn enabled_smtp_requires_complete_settings() {
    let mut config = valid();
    config.smtp.enabled = true;
    assert_eq!(config.validate(), Err(ConfigError::MissingSmtpField("server")));

    config.smtp.server = "mail.example.org".to_owned();
    assert_eq!(
        config.validate(),
        Err(ConfigError::InvalidSmtpServer("mail.example.org".to_owned()))
    );

    config.smtp.server = "mail.example.org:25".to_owned();
    assert_eq!(config.validate(), Err(ConfigError::MissingSmtpField("from")));

    config.smtp.from = "not an address".to_owned();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidAddress { field: "from", .. })
    ));

    config.smtp.from = "pingwatch@example.org".to_owned();
    assert_eq!(config.validate(), Err(ConfigError::MissingSmtpField("to")));

    config.smtp.to = vec!["ops@example.org".to_owned(), "oops".to_owned()];
    assert_eq!(
        config.validate(),
        Err(ConfigError::InvalidAddress {
            field: "to",
            value: "oops".to_owned()
        })
    );

    config.smtp.to.truncate(1);
    assert!(config.validate().is_ok());
}

#[test]
fn disabled_smtp_settings_are_not_checked() {
    let mut config = valid();
    config.smtp.server = "garbage".to_owned();
    assert!(config.validate().is_ok());
}

#[test]
fn env_overrides_apply() {
    let mut config = valid();
    config
        .apply_env_overrides(env_from(&[
            ("PINGWATCH_HOSTS", "a.example.org, b.example.org,,"),
            ("PINGWATCH_INTERVAL_SECS", "15"),
            ("PINGWATCH_SMTP_SERVER", "smtp.example.org:25"),
        ]))
        .expect("overrides should apply");

    assert_eq!(config.monitor.hosts, vec!["a.example.org", "b.example.org"]);
    assert_eq!(config.monitor.interval_secs, 15);
    assert_eq!(config.smtp.server, "smtp.example.org:25");
    assert!(config.smtp.enabled);
}

#[test]
fn malformed_env_interval_is_refused() {
    for bad in ["soon", "-5", ""] {
        let mut config = valid();
        let result = config.apply_env_overrides(env_from(&[("PINGWATCH_INTERVAL_SECS", bad)]));
        assert_eq!(
            result,
            Err(ConfigError::InvalidEnv {
                var: "PINGWATCH_INTERVAL_SECS",
                value: bad.to_owned(),
            }),
            "value {bad:?}"
        );
    }
}

#[test]
fn cli_overrides_take_precedence_over_env_and_file() {
    let mut config = Config::from_toml(FULL).expect("config should parse");
    config
        .apply_env_overrides(env_from(&[
            ("PINGWATCH_HOSTS", "env.example.org"),
            ("PINGWATCH_INTERVAL_SECS", "15"),
        ]))
        .expect("overrides should apply");
    config.apply_cli_overrides(&CliOverrides {
        hosts: vec!["cli.example.org".to_owned()],
        max_down: Some(7),
        smtp_to: vec!["me@example.org".to_owned()],
        ..CliOverrides::default()
    });

    assert_eq!(config.monitor.hosts, vec!["cli.example.org"]);
    assert_eq!(config.monitor.interval_secs, 15, "env beats file");
    assert_eq!(config.monitor.max_down, 7);
    assert_eq!(config.monitor.max_up, 2, "file value kept");
    assert_eq!(config.smtp.to, vec!["me@example.org"]);
}

#[test]
fn cli_smtp_server_enables_mail() {
    let mut config = valid();
    config.apply_cli_overrides(&CliOverrides {
        smtp_server: Some("localhost:2525".to_owned()),
        smtp_from: Some("pingwatch@localhost".to_owned()),
        smtp_to: vec!["root@localhost".to_owned()],
        smtp_starttls: true,
        smtp_skip_certificate_verify: true,
        ..CliOverrides::default()
    });

    assert!(config.smtp.enabled);
    assert_eq!(config.smtp.tls, SmtpTls::Starttls);
    assert!(config.smtp.skip_certificate_verify);
    assert!(config.validate().is_ok());
}

#[test]
fn empty_cli_overrides_change_nothing() {
    let before = Config::from_toml(FULL).expect("config should parse");
    let mut after = before.clone();
    after.apply_cli_overrides(&CliOverrides::default());

    assert_eq!(after.monitor.hosts, before.monitor.hosts);
    assert_eq!(after.monitor.interval_secs, before.monitor.interval_secs);
    assert_eq!(after.smtp.tls, before.smtp.tls);
}

#[test]
fn validated_config_round_trips_through_toml() {
    let config = Config::from_toml(FULL).expect("config should parse");
    let rendered = toml::to_string_pretty(&config).expect("config should serialize");
    let reparsed = Config::from_toml(&rendered).expect("rendered config should parse");
    assert_eq!(reparsed.monitor.hosts, config.monitor.hosts);
    assert_eq!(reparsed.smtp.tls, config.smtp.tls);
}
