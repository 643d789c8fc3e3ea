#![cfg(test)]

use std::ptr;

use crate::plugin_system::config::{ConfigSource, HostProperties, MapConfig, PluginConfig, parse_bool};
use crate::plugin_system::error::{ConfigError, PluginError};

fn sample() -> MapConfig {
    MapConfig::new()
        .with("Path", "  /var/log/out.json ")
        .with("workers", "4")
        .with("append", "On")
        .with("empty", "   ")
        .with("level", "loud")
}

#[test]
fn test_map_config_keys_are_case_insensitive() {
    let config = sample();
    assert_eq!(config.len(), 5);
    assert!(config.property("path").is_some());
    assert!(config.property("PATH").is_some());
    assert!(config.property("missing").is_none());
}

#[test]
fn test_get_trims_and_treats_empty_as_unset() {
    let map = sample();
    let config = PluginConfig::new(&map);
    assert_eq!(config.get("path").as_deref(), Some("/var/log/out.json"));
    assert_eq!(config.get("empty"), None);
    assert_eq!(config.get_or("empty", "fallback"), "fallback");
    assert_eq!(config.get_or("workers", "1"), "4");
}

#[test]
fn test_require_reports_missing_key() {
    let map = sample();
    let config = PluginConfig::new(&map);
    assert_eq!(config.require("path").unwrap(), "/var/log/out.json");

    let err = config.require("host").unwrap_err();
    assert_eq!(err, ConfigError::Missing { key: "host".to_string() });
    assert_eq!(err.to_string(), "missing required property 'host'");

    // A configuration failure reaches the host as a plain error
    assert!(!PluginError::from(err).is_retry());
}

#[test]
fn test_get_parsed() {
    let map = sample();
    let config = PluginConfig::new(&map);
    assert_eq!(config.get_parsed::<u32>("workers").unwrap(), Some(4));
    assert_eq!(config.get_parsed::<u32>("missing").unwrap(), None);

    match config.get_parsed::<u32>("level") {
        Err(ConfigError::Invalid { key, value, .. }) => {
            assert_eq!(key, "level");
            assert_eq!(value, "loud");
        }
        other => panic!("expected invalid value, got {:?}", other),
    }
}

#[test]
fn test_get_bool() {
    let map = sample();
    let config = PluginConfig::new(&map);
    assert_eq!(config.get_bool("append").unwrap(), Some(true));
    assert_eq!(config.get_bool("missing").unwrap(), None);
    assert!(!config.get_bool_or("missing", false).unwrap());
    assert!(config.get_bool("level").is_err());
}

#[test]
fn test_parse_bool_words() {
    for word in ["on", "ON", "true", "Yes", " yes "] {
        assert_eq!(parse_bool(word), Some(true), "{}", word);
    }
    for word in ["off", "False", "NO"] {
        assert_eq!(parse_bool(word), Some(false), "{}", word);
    }
    for word in ["", "1", "enabled", "y"] {
        assert_eq!(parse_bool(word), None, "{}", word);
    }
}

#[test]
fn test_map_config_from_iterator() {
    let config: MapConfig = [("Format", "msgpack"), ("path", "/tmp/x")].into_iter().collect();
    assert_eq!(config.property("format").as_deref(), Some("msgpack"));
    assert_eq!(config.len(), 2);
}

#[test]
fn test_host_properties_without_api_table() {
    let props = unsafe { HostProperties::new(ptr::null(), ptr::null_mut()) };
    assert_eq!(props.property("path"), None);
    assert_eq!(PluginConfig::new(&props).get("path"), None);
}
