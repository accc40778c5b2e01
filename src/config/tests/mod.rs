//! Unit tests for config module
//!
//! Tests configuration types, defaults, and serialization.
//! No filesystem dependencies - all in-memory.

#![allow(clippy::panic)]

use crate::{
    BridgeError,
    config::{BridgeConfig, Config, LogLevel},
};

#[test]
fn config_default() {
    let config = Config::default();

    assert_eq!(config.general.log_level, LogLevel::Info);
    assert!(!config.bridge.disallow_module_loading);
    assert!(!config.bridge.disallow_exit);
    assert_eq!(config.bridge.signal_buffer, 256);
    assert_eq!(config.bridge.server_name, "pulseaudio");
}

#[test]
fn config_serialize_toml() {
    let config = Config::default();

    let toml_str = toml::to_string(&config).unwrap();
    assert!(toml_str.contains("[general]"));
    assert!(toml_str.contains("[bridge]"));
    assert!(toml_str.contains("signal_buffer = 256"));
}

#[test]
fn config_deserialize_toml() {
    let toml_str = r#"
        [general]
        log_level = "debug"

        [bridge]
        disallow_exit = true
        server_version = "17.0"
    "#;

    let config = Config::from_toml(toml_str).unwrap();

    assert_eq!(config.general.log_level, LogLevel::Debug);
    assert!(config.bridge.disallow_exit);
    assert!(!config.bridge.disallow_module_loading);
    assert_eq!(config.bridge.server_version, "17.0");
    assert_eq!(config.bridge.server_name, "pulseaudio");
}

#[test]
fn config_serialize_roundtrip() {
    let original = Config::default();

    let toml_str = toml::to_string(&original).unwrap();
    let deserialized = Config::from_toml(&toml_str).unwrap();

    assert_eq!(original.bridge, deserialized.bridge);
}

#[test]
fn config_minimal_toml() {
    let config = Config::from_toml("[general]\n").unwrap();

    assert_eq!(config.bridge, BridgeConfig::default());
}

#[test]
fn zero_signal_buffer_is_rejected() {
    let result = Config::from_toml("[bridge]\nsignal_buffer = 0\n");

    match result {
        Err(BridgeError::ConfigValidation { component, .. }) => assert_eq!(component, "bridge"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn invalid_toml_reports_location() {
    let result = Config::from_toml("[bridge\n");

    match result {
        Err(BridgeError::TomlParseError { location, .. }) => assert_eq!(location, "string"),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn unknown_log_level_is_rejected() {
    assert!(Config::from_toml("[general]\nlog_level = \"loud\"\n").is_err());
}

#[test]
fn schema_names_every_section() {
    let schema = schemars::schema_for!(Config);
    let json = serde_json::to_string(&schema).unwrap();

    assert!(json.contains("disallow_module_loading"));
    assert!(json.contains("log_level"));
}
