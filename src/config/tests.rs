use super::{BridgeConfig, Transport, DEFAULT_ARG_TIMEOUT_MS, DEFAULT_HANDSHAKE_TIMEOUT_MS};
use clap::Parser;
use std::time::Duration;

#[test]
fn defaults_match_parsed_empty_command_line() {
    let parsed = BridgeConfig::parse_from(["test-app", "--transport", "inherited-fds"]);
    let built = BridgeConfig::default();
    assert_eq!(parsed.transport, built.transport);
    assert_eq!(parsed.handshake_timeout_ms, built.handshake_timeout_ms);
    assert_eq!(parsed.arg_timeout_ms, built.arg_timeout_ms);
    assert_eq!(parsed.write_timeout_ms, built.write_timeout_ms);
    assert_eq!(parsed.terminate_grace_ms, built.terminate_grace_ms);
    assert_eq!(parsed.max_line_bytes, built.max_line_bytes);
    assert_eq!(parsed.max_messages_per_idle, built.max_messages_per_idle);
    assert!(built.validate().is_ok());
}

#[test]
fn duration_helpers_use_milliseconds() {
    let cfg = BridgeConfig::default();
    assert_eq!(
        cfg.handshake_timeout(),
        Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS)
    );
    assert_eq!(cfg.arg_timeout(), Duration::from_millis(DEFAULT_ARG_TIMEOUT_MS));
    assert_eq!(cfg.channel_options().write_timeout, cfg.write_timeout());
}

#[test]
fn parses_std_streams_transport() {
    let cfg = BridgeConfig::parse_from(["test-app", "--transport", "std-streams"]);
    assert_eq!(cfg.transport, Transport::StdStreams);
    assert_eq!(cfg.transport.label(), "std-streams");
}

#[test]
fn rejects_zero_timeouts() {
    let cfg = BridgeConfig::parse_from(["test-app", "--handshake-timeout-ms", "0"]);
    assert!(cfg.validate().is_err());

    let cfg = BridgeConfig::parse_from(["test-app", "--arg-timeout-ms", "0"]);
    assert!(cfg.validate().is_err());

    let cfg = BridgeConfig::parse_from(["test-app", "--write-timeout-ms", "0"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_arg_timeout_above_limit() {
    let cfg = BridgeConfig::parse_from(["test-app", "--arg-timeout-ms", "5001"]);
    assert!(cfg.validate().is_err());

    let cfg = BridgeConfig::parse_from(["test-app", "--arg-timeout-ms", "5000"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn accepts_zero_terminate_grace() {
    let cfg = BridgeConfig::parse_from(["test-app", "--terminate-grace-ms", "0"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_tiny_line_limit() {
    let cfg = BridgeConfig::parse_from(["test-app", "--max-line-bytes", "8"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_zero_messages_per_idle() {
    let cfg = BridgeConfig::parse_from(["test-app", "--max-messages-per-idle", "0"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn no_logs_overrides_logs() {
    let cfg = BridgeConfig::parse_from(["test-app", "--logs", "--no-logs"]);
    assert!(!cfg.logging_enabled());

    let cfg = BridgeConfig::parse_from(["test-app", "--logs"]);
    assert!(cfg.logging_enabled());
}
