//! Tests for `src/probe/system.rs`: exit status mapping and process handling.

use pingwatch::monitor::HostTarget;
use pingwatch::probe::system::{classify_exit, ping_args, SystemPing};
use pingwatch::probe::{ProbeOptions, ProbeOutcome, Prober};

#[test]
fn zero_exit_is_reachable() {
    assert_eq!(classify_exit(Some(0), ""), ProbeOutcome::Reachable);
}

#[cfg(target_os = "linux")]
#[test]
fn exit_one_is_no_reply_on_linux() {
    assert_eq!(classify_exit(Some(1), ""), ProbeOutcome::Unreachable);
    assert!(matches!(classify_exit(Some(2), ""), ProbeOutcome::Error(_)));
}

#[test]
fn other_exit_codes_carry_stderr() {
    let outcome = classify_exit(Some(68), "ping: unknown host nowhere.invalid\n");
    assert_eq!(
        outcome,
        ProbeOutcome::Error(
            "ping exited with status 68: ping: unknown host nowhere.invalid".to_owned()
        )
    );
}

#[test]
fn signal_termination_is_an_error() {
    assert_eq!(
        classify_exit(None, ""),
        ProbeOutcome::Error("ping terminated by signal".to_owned())
    );
}

#[test]
fn args_request_one_echo_with_configured_size() {
    let opts = ProbeOptions {
        timeout: std::time::Duration::from_secs(3),
        packet_size: 120,
    };
    let args = ping_args(&HostTarget::new("10.0.0.7"), &opts);

    assert!(args.windows(2).any(|w| w[0] == "-c" && w[1] == "1"));
    assert!(args.windows(2).any(|w| w[0] == "-s" && w[1] == "120"));
    assert!(args.iter().any(|a| a == "3"));
    assert_eq!(args.last().map(String::as_str), Some("10.0.0.7"));
}

#[test]
fn outcome_serializes_with_tag() {
    let json = serde_json::to_value(ProbeOutcome::Error("boom".to_owned())).expect("serialize");
    assert_eq!(json, serde_json::json!({"outcome": "error", "detail": "boom"}));

    let json = serde_json::to_value(ProbeOutcome::Reachable).expect("serialize");
    assert_eq!(json, serde_json::json!({"outcome": "reachable"}));
}

#[tokio::test]
async fn option_like_host_is_never_passed_to_ping() {
    let prober = SystemPing::with_program("true");
    let outcome = prober
        .probe(&HostTarget::new("-f"), &ProbeOptions::default())
        .await;
    assert!(matches!(outcome, ProbeOutcome::Error(_)));
}

#[tokio::test]
async fn missing_program_is_an_error() {
    let prober = SystemPing::with_program("/nonexistent/pingwatch-test-ping");
    let outcome = prober
        .probe(&HostTarget::new("127.0.0.1"), &ProbeOptions::default())
        .await;
    match outcome {
        ProbeOutcome::Error(detail) => assert!(detail.contains("failed to run"), "got {detail}"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn exit_status_of_the_program_decides() {
    let opts = ProbeOptions::default();
    let host = HostTarget::new("127.0.0.1");

    let ok = SystemPing::with_program("true").probe(&host, &opts).await;
    assert_eq!(ok, ProbeOutcome::Reachable);

    let no_reply = SystemPing::with_program("false").probe(&host, &opts).await;
    assert_eq!(no_reply, ProbeOutcome::Unreachable);
}
