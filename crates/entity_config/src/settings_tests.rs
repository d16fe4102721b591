//! Tests for engine settings.

use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_default_settings() {
    let settings = EngineSettings::default();
    assert_eq!(settings.max_inheritance_depth, DEFAULT_MAX_INHERITANCE_DEPTH);
    assert!(settings.remove_empty_strings);
    assert!(settings.warn_on_cache_miss);
}

#[test]
fn test_empty_toml_yields_defaults() {
    let settings = EngineSettings::from_toml_str("").expect("parse");
    assert_eq!(settings, EngineSettings::default());
}

#[test]
fn test_partial_toml_overrides_only_given_keys() {
    let settings = EngineSettings::from_toml_str("max_inheritance_depth = 8").expect("parse");
    assert_eq!(settings.max_inheritance_depth, 8);
    assert!(settings.remove_empty_strings);
}

#[test]
fn test_invalid_toml_is_settings_load_error() {
    let result = EngineSettings::from_toml_str("max_inheritance_depth = \"deep\"");
    assert!(matches!(
        result,
        Err(ConfigurationError::SettingsLoad { .. })
    ));
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "max_inheritance_depth = 12").expect("write");
    writeln!(file, "warn_on_cache_miss = false").expect("write");

    let settings = EngineSettings::load(file.path()).expect("load");
    assert_eq!(settings.max_inheritance_depth, 12);
    assert!(!settings.warn_on_cache_miss);
    assert!(settings.remove_empty_strings);
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("missing.toml");

    match EngineSettings::load(&path) {
        Err(ConfigurationError::SettingsLoad { path: reported, .. }) => {
            assert!(reported.ends_with("missing.toml"));
        }
        other => panic!("Expected SettingsLoad, got {:?}", other),
    }
}

#[test]
fn test_settings_round_trip_through_toml() {
    let settings = EngineSettings {
        max_inheritance_depth: 5,
        remove_empty_strings: false,
        warn_on_cache_miss: false,
    };
    let content = toml::to_string(&settings).expect("Failed to serialize");
    assert_eq!(EngineSettings::from_toml_str(&content).expect("parse"), settings);
}
