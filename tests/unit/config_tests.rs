//! Unit tests for configuration parsing and validation.

use std::io::Write;
use std::time::Duration;

use modelwar_bridge::config::BridgeConfig;
use modelwar_bridge::AppError;

/// An empty TOML document yields the documented defaults.
#[test]
fn empty_config_uses_defaults() {
    let config = BridgeConfig::from_toml_str("").expect("empty config is valid");

    assert_eq!(config.tool_timeout(), Duration::from_secs(30));
    assert_eq!(config.startup_timeout(), Duration::from_secs(10));
    assert_eq!(config.agent.cli, "modelwar-agent");
    assert!(config.agent.args.is_empty());
}

/// Explicit values override the defaults section by section.
#[test]
fn explicit_values_override_defaults() {
    let config = BridgeConfig::from_toml_str(
        r#"
        [timeouts]
        tool_seconds = 5

        [agent]
        cli = "claude"
        args = ["--output-format", "stream-json"]
        "#,
    )
    .expect("valid config");

    assert_eq!(config.tool_timeout(), Duration::from_secs(5));
    assert_eq!(config.startup_timeout(), Duration::from_secs(10));
    assert_eq!(config.agent.cli, "claude");
    assert_eq!(config.agent.args.len(), 2);
}

/// A zero tool timeout fails validation.
#[test]
fn zero_tool_timeout_is_rejected() {
    let err = BridgeConfig::from_toml_str("[timeouts]\ntool_seconds = 0\n")
        .expect_err("zero timeout must be rejected");
    match err {
        AppError::Config(msg) => assert!(msg.contains("tool_seconds")),
        other => panic!("expected config error, got {other:?}"),
    }
}

/// A blank agent CLI fails validation.
#[test]
fn blank_agent_cli_is_rejected() {
    let err = BridgeConfig::from_toml_str("[agent]\ncli = \"  \"\n")
        .expect_err("blank cli must be rejected");
    assert!(matches!(err, AppError::Config(_)));
}

/// Malformed TOML maps to `AppError::Config`.
#[test]
fn malformed_toml_is_a_config_error() {
    let err = BridgeConfig::from_toml_str("timeouts = nonsense").expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

/// Loading from a file on disk round-trips through the same parser.
#[test]
fn load_reads_config_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[timeouts]\ntool_seconds = 7").expect("write config");

    let config = BridgeConfig::load(file.path()).expect("load config");
    assert_eq!(config.tool_timeout(), Duration::from_secs(7));
}

/// A missing file is reported as a config error, not an I/O panic.
#[test]
fn missing_config_file_is_a_config_error() {
    let err = BridgeConfig::load(std::path::Path::new("/nonexistent/bridge.toml"))
        .expect_err("missing file must fail");
    assert!(matches!(err, AppError::Config(_)));
}
