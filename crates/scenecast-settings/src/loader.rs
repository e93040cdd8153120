//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `SCENECAST_*` environment variable overrides (highest priority)

use std::path::{Path, PathBuf};

use scenecast_core::DisconnectScope;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::RelaySettings;

/// Resolve the default settings file (`~/.scenecast/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".scenecast").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SCENECAST_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Empty values are treated as unset. Values that fail to parse or fall
/// outside their range are ignored with a warning.
pub fn apply_overrides(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("SCENECAST_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = parsed(read("SCENECAST_PORT"), "SCENECAST_PORT", |v| {
        parse_u16_range(v, 1, 65535)
    }) {
        settings.server.port = v;
    }
    if let Some(v) = parsed(read("SCENECAST_MAX_SEND_QUEUE"), "SCENECAST_MAX_SEND_QUEUE", |v| {
        parse_usize_range(v, 1, 65_536)
    }) {
        settings.server.max_send_queue = v;
    }
    if let Some(v) = parsed(
        read("SCENECAST_HEARTBEAT_INTERVAL_MS"),
        "SCENECAST_HEARTBEAT_INTERVAL_MS",
        |v| parse_u64_range(v, 1000, 600_000),
    ) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = parsed(
        read("SCENECAST_DISCONNECT_SCOPE"),
        "SCENECAST_DISCONNECT_SCOPE",
        parse_disconnect_scope,
    ) {
        settings.relay.disconnect_scope = v;
    }
    if let Some(v) = read("SCENECAST_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = parsed(read("SCENECAST_LOG_JSON"), "SCENECAST_LOG_JSON", parse_bool) {
        settings.logging.json = v;
    }
}

fn parsed<T>(raw: Option<String>, key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = raw?;
    let result = parse(&raw);
    if result.is_none() {
        warn!(key, value = %raw, "invalid env var, ignoring");
    }
    result
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse `scene` or `all` (case-insensitive).
pub fn parse_disconnect_scope(val: &str) -> Option<DisconnectScope> {
    match val.to_lowercase().as_str() {
        "scene" => Some(DisconnectScope::Scene),
        "all" => Some(DisconnectScope::All),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 4000, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/scenecast/settings.json");
        let settings = read_settings_file(path).unwrap();
        assert_eq!(settings, RelaySettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "relay": {"disconnectScope": "all"}}"#,
        )
        .unwrap();

        let settings = read_settings_file(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.max_send_queue, 256);
        assert_eq!(settings.relay.disconnect_scope, DisconnectScope::All);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = read_settings_file(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": "high"}}"#).unwrap();
        assert!(read_settings_file(&path).is_err());
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply_valid_values() {
        let mut settings = RelaySettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("SCENECAST_HOST", "127.0.0.1"),
                ("SCENECAST_PORT", "5000"),
                ("SCENECAST_MAX_SEND_QUEUE", "64"),
                ("SCENECAST_HEARTBEAT_INTERVAL_MS", "5000"),
                ("SCENECAST_DISCONNECT_SCOPE", "ALL"),
                ("SCENECAST_LOG_LEVEL", "debug"),
                ("SCENECAST_LOG_JSON", "yes"),
            ]),
        );
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.server.max_send_queue, 64);
        assert_eq!(settings.server.heartbeat_interval_ms, 5000);
        assert_eq!(settings.relay.disconnect_scope, DisconnectScope::All);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn overrides_ignore_invalid_and_empty_values() {
        let mut settings = RelaySettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("SCENECAST_HOST", ""),
                ("SCENECAST_PORT", "0"),
                ("SCENECAST_MAX_SEND_QUEUE", "lots"),
                ("SCENECAST_HEARTBEAT_INTERVAL_MS", "10"),
                ("SCENECAST_DISCONNECT_SCOPE", "room"),
                ("SCENECAST_LOG_JSON", "maybe"),
            ]),
        );
        assert_eq!(settings, RelaySettings::default());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in ["true", "1", "yes", "on", "TRUE", "On"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in ["false", "0", "no", "off", "FALSE"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("65535", 1, 65535), Some(65535));
        assert_eq!(parse_u16_range("99999", 1, 65535), None);
        assert_eq!(parse_u64_range("999", 1000, 600_000), None);
        assert_eq!(parse_usize_range("50", 1, 10_000), Some(50));
        assert_eq!(parse_usize_range("", 1, 10_000), None);
    }

    #[test]
    fn parse_scope() {
        assert_eq!(parse_disconnect_scope("scene"), Some(DisconnectScope::Scene));
        assert_eq!(parse_disconnect_scope("All"), Some(DisconnectScope::All));
        assert_eq!(parse_disconnect_scope("none"), None);
    }
}
