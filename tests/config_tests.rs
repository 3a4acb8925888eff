//! Integration tests for configuration parsing.

use openservo::common::Error;
use openservo::config::Config;

/// Tests the built-in defaults.
#[test]
fn test_default_config() {
    let config = Config::default();

    assert!(config.bus.locator.is_empty());
    assert_eq!(config.probe.range(), 8..=119);
}

/// Tests that an empty document yields the defaults.
#[test]
fn test_empty_document() {
    let config = Config::from_toml("").unwrap();

    assert!(config.bus.locator.is_empty());
    assert_eq!(config.probe.first, 8);
    assert_eq!(config.probe.last, 119);
}

/// Tests a fully specified document.
#[test]
fn test_full_document() {
    let text = r#"
        [bus]
        locator = "/dev/i2c-3"

        [probe]
        first = 16
        last = 32
    "#;
    let config = Config::from_toml(text).unwrap();

    assert_eq!(config.bus.locator, "/dev/i2c-3");
    assert_eq!(config.probe.range(), 16..=32);
}

/// Tests that a partial probe section keeps the other default.
#[test]
fn test_partial_probe_section() {
    let config = Config::from_toml("[probe]\nlast = 64\n").unwrap();
    assert_eq!(config.probe.range(), 8..=64);
}

/// Tests that an inverted or out-of-range probe range is rejected.
#[test]
fn test_invalid_probe_range() {
    assert!(matches!(
        Config::from_toml("[probe]\nfirst = 50\nlast = 40\n"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Config::from_toml("[probe]\nlast = 200\n"),
        Err(Error::Config(_))
    ));
}

/// Tests that malformed TOML is reported as a configuration error.
#[test]
fn test_malformed_toml() {
    assert!(matches!(
        Config::from_toml("[bus\nlocator = 1"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Config::from_toml("[bus]\nlocator = 1\n"),
        Err(Error::Config(_))
    ));
}

/// Tests that a missing file is reported with its path.
#[test]
fn test_missing_file() {
    match Config::load("/nonexistent/openservo.toml") {
        Err(Error::Config(msg)) => assert!(msg.contains("/nonexistent/openservo.toml")),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}
