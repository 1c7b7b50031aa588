//! Unit tests for `AppError` display formats and conversions.

use modelwar_bridge::AppError;

#[test]
fn each_variant_has_a_distinct_prefix() {
    let cases = [
        (AppError::Config("x".into()), "config:"),
        (AppError::Protocol("x".into()), "protocol:"),
        (AppError::Runtime("x".into()), "runtime:"),
        (AppError::Tool("x".into()), "tool:"),
        (AppError::ToolTimeout("x".into()), "tool timeout:"),
        (AppError::Io("x".into()), "io:"),
    ];

    for (err, prefix) in cases {
        assert!(
            err.to_string().starts_with(prefix),
            "{err} must start with {prefix}"
        );
    }
}

#[test]
fn display_includes_message() {
    let err = AppError::ToolTimeout("no response for 'fetch_leaderboard'".into());
    assert_eq!(
        err.to_string(),
        "tool timeout: no response for 'fetch_leaderboard'"
    );
}

#[test]
fn tool_error_is_distinct_from_timeout() {
    let tool = AppError::Tool("upload failed".into());
    let timeout = AppError::ToolTimeout("upload failed".into());
    assert_ne!(tool.to_string(), timeout.to_string());
}

#[test]
fn io_error_converts_from_std() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: AppError = io.into();
    assert!(matches!(err, AppError::Io(_)));
    assert!(err.to_string().contains("pipe closed"));
}

#[test]
fn implements_std_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(AppError::Runtime("gone".into()));
    assert_eq!(err.to_string(), "runtime: gone");
}
