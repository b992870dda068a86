// Hook merge: a hook definition becomes `{matcher, hooks}` entries under
// `hooks.<event>` in the app's settings.json. Other settings keys, and
// entries this hook did not contribute, are left as found.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::io;
use std::path::Path;

use crate::atoms::types::{RemoteFile, ResourceKind};
use crate::engine::ssot::write_resource;

pub(crate) const SETTINGS_FILE: &str = "settings.json";

/// Hook definition as published upstream. Both `eventType` and
/// `event_type` spellings occur in the wild.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HookDefinition {
    #[serde(alias = "event_type")]
    event_type: String,
    #[serde(default)]
    rules: Vec<HookRule>,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct HookRule {
    #[serde(default)]
    matcher: String,
    hooks: Vec<Value>,
}

fn enabled_by_default() -> bool {
    true
}

/// One entry a hook contributes to `hooks.<event>`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HookEntry {
    pub event: String,
    pub entry: Value,
}

/// Entries a hook definition contributes. A disabled hook contributes none.
pub(crate) fn hook_entries(definition: &[u8]) -> Result<Vec<HookEntry>, String> {
    let def: HookDefinition = serde_json::from_slice(definition).map_err(|e| e.to_string())?;
    if def.event_type.trim().is_empty() {
        return Err("eventType is empty".into());
    }
    if !def.enabled {
        return Ok(Vec::new());
    }
    Ok(def
        .rules
        .into_iter()
        .map(|rule| HookEntry {
            event: def.event_type.clone(),
            entry: json!({ "matcher": rule.matcher, "hooks": rule.hooks }),
        })
        .collect())
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// A missing settings file reads as `{}`. An unparsable one is an error;
/// it is never overwritten.
fn read_settings(path: &Path) -> io::Result<Value> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| invalid(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Value::Object(Map::new())),
        Err(e) => Err(e),
    }
}

/// Replace `previous` with `next` in the settings file at `path`.
pub(crate) fn merge_into_settings(
    path: &Path,
    previous: &[HookEntry],
    next: &[HookEntry],
) -> io::Result<()> {
    let mut settings = read_settings(path)?;
    let root = settings
        .as_object_mut()
        .ok_or_else(|| invalid(format!("{} is not a JSON object", path.display())))?;
    let hooks = root
        .entry("hooks")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| invalid("`hooks` is not an object"))?;

    for old in previous {
        if let Some(Value::Array(list)) = hooks.get_mut(&old.event) {
            if let Some(pos) = list.iter().position(|e| *e == old.entry) {
                list.remove(pos);
            }
        }
    }
    for new in next {
        let Value::Array(list) = hooks
            .entry(new.event.clone())
            .or_insert_with(|| Value::Array(Vec::new()))
        else {
            return Err(invalid(format!("`hooks.{}` is not an array", new.event)));
        };
        if !list.contains(&new.entry) {
            list.push(new.entry.clone());
        }
    }
    hooks.retain(|_, v| !matches!(v, Value::Array(list) if list.is_empty()));
    if hooks.is_empty() {
        root.remove("hooks");
    }

    let content = serde_json::to_vec_pretty(&settings).map_err(|e| invalid(e.to_string()))?;
    let file = RemoteFile { path: SETTINGS_FILE.into(), content };
    write_resource(path, ResourceKind::Hook, &[file])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(event_key: &str, command: &str, enabled: bool) -> Vec<u8> {
        json!({
            "name": "fmt",
            event_key: "PostToolUse",
            "rules": [{ "matcher": "Edit|Write", "hooks": [{ "type": "command", "command": command }] }],
            "enabled": enabled,
        })
        .to_string()
        .into_bytes()
    }

    fn read(path: &Path) -> Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn both_event_key_spellings_parse() {
        let camel = hook_entries(&definition("eventType", "cargo fmt", true)).unwrap();
        let snake = hook_entries(&definition("event_type", "cargo fmt", true)).unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.len(), 1);
        assert_eq!(camel[0].event, "PostToolUse");
        assert_eq!(camel[0].entry["hooks"][0]["command"], "cargo fmt");
    }

    #[test]
    fn disabled_hook_contributes_nothing() {
        assert!(hook_entries(&definition("eventType", "cargo fmt", false)).unwrap().is_empty());
    }

    #[test]
    fn malformed_definitions_are_rejected() {
        assert!(hook_entries(b"#!/bin/sh\necho hi").is_err());
        assert!(hook_entries(br#"{"rules": []}"#).is_err());
        assert!(hook_entries(br#"{"eventType": " ", "rules": []}"#).is_err());
    }

    #[test]
    fn merge_keeps_foreign_keys_and_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let user_entry = json!({ "matcher": "Bash", "hooks": [{ "type": "command", "command": "audit" }] });
        std::fs::write(
            &path,
            json!({ "model": "opus", "hooks": { "PostToolUse": [user_entry.clone()] } }).to_string(),
        )
        .unwrap();

        let v1 = hook_entries(&definition("eventType", "cargo fmt", true)).unwrap();
        merge_into_settings(&path, &[], &v1).unwrap();
        let v2 = hook_entries(&definition("eventType", "cargo fmt --all", true)).unwrap();
        merge_into_settings(&path, &v1, &v2).unwrap();

        let settings = read(&path);
        assert_eq!(settings["model"], "opus");
        let entries = settings["hooks"]["PostToolUse"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], user_entry);
        assert_eq!(entries[1], v2[0].entry);
    }

    #[test]
    fn removing_last_entry_drops_empty_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let v1 = hook_entries(&definition("eventType", "cargo fmt", true)).unwrap();
        merge_into_settings(&path, &[], &v1).unwrap();
        merge_into_settings(&path, &v1, &[]).unwrap();
        assert_eq!(read(&path), json!({}));
    }

    #[test]
    fn unparsable_settings_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        let v1 = hook_entries(&definition("eventType", "cargo fmt", true)).unwrap();
        let err = merge_into_settings(&path, &[], &v1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }
}
