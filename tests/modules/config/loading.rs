//! 配置文件加载测试

use fetch_governor::{GovernorConfig, GovernorError, RateGovernor, Strategy};
use std::io::Write;
use std::time::Duration;
use tempfile::Builder;

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_yaml_file() {
    let file = write_config(
        ".yaml",
        r#"
strategy: sliding_window
cleanup_interval: 10s
sources:
  reddit:
    limit: 60
    window: 60
  jin10:
    limit: 30
    window: 1m
"#,
    );

    let config = GovernorConfig::from_file(file.path()).unwrap();
    assert_eq!(config.strategy, Strategy::SlidingWindow);
    assert_eq!(config.cleanup_interval, Duration::from_secs(10));
    assert_eq!(config.sources.len(), 2);
    assert_eq!(config.sources["reddit"].window, Duration::from_secs(60));
    assert_eq!(config.sources["jin10"].window, Duration::from_secs(60));
}

#[test]
fn test_load_toml_file() {
    let file = write_config(
        ".toml",
        r#"
strategy = "token_bucket"

[sources.twitter]
limit = 15
window = "15m"
burst = 30
"#,
    );

    let config = GovernorConfig::from_file(file.path()).unwrap();
    let governor = RateGovernor::from_config(&config).unwrap();
    assert_eq!(governor.strategy(), Strategy::TokenBucket);
    assert_eq!(governor.get_remaining_quota("twitter"), Some(30));
}

#[test]
fn test_unknown_extension_rejected() {
    let file = write_config(".json", "{}");
    assert!(matches!(
        GovernorConfig::from_file(file.path()),
        Err(GovernorError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    assert!(matches!(
        GovernorConfig::from_file(&path),
        Err(GovernorError::IoError(_))
    ));
}

#[test]
fn test_invalid_limits_rejected_on_load() {
    let file = write_config(
        ".yml",
        r#"
sources:
  broken:
    limit: 10
    window: 1m
    burst: 5
"#,
    );
    assert!(matches!(
        GovernorConfig::from_file(file.path()),
        Err(GovernorError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_malformed_yaml_is_parse_error() {
    let file = write_config(".yaml", "sources: [unterminated");
    assert!(matches!(
        GovernorConfig::from_file(file.path()),
        Err(GovernorError::YamlError(_))
    ));
}
