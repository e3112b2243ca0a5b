//! Read-modify-write of the gateway's JSON configuration document.
//!
//! Only the keys listed in [`apply_patch`] are touched; everything else,
//! including key order, is carried through unchanged.

use clawstack_core::AppError;
use serde_json::{json, Map, Value};
use std::path::Path;

/// Loopback addresses the gateway trusts as a reverse proxy.
pub const TRUSTED_PROXIES: [&str; 2] = ["127.0.0.1", "::1"];

#[derive(Debug, Clone)]
pub struct GatewayPatch<'a> {
    pub port: u16,
    pub plugin_path: &'a str,
    pub plugin_name: &'a str,
    /// Written only when the document has no token of its own.
    pub proposed_token: &'a str,
}

/// Object at `key` inside `parent`, created or replaced if it is missing or
/// not an object.
fn object_at<'v>(parent: &'v mut Map<String, Value>, key: &str) -> &'v mut Map<String, Value> {
    let slot = parent
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just made an object"),
    }
}

/// Plugin entries in the keyed-object shape. Older configs carry a list of
/// `{ "name": ..., ... }` objects; those are converted in place.
fn plugin_entries(plugins: &mut Map<String, Value>) -> &mut Map<String, Value> {
    if let Some(Value::Array(list)) = plugins.get("entries") {
        let mut keyed = Map::new();
        for item in list {
            match item {
                Value::Object(obj) => {
                    if let Some(name) = obj.get("name").and_then(Value::as_str) {
                        let mut rest = obj.clone();
                        rest.remove("name");
                        keyed.insert(name.to_string(), Value::Object(rest));
                    }
                }
                Value::String(name) => {
                    keyed.insert(name.clone(), json!({ "enabled": true }));
                }
                _ => {}
            }
        }
        plugins.insert("entries".to_string(), Value::Object(keyed));
    }
    object_at(plugins, "entries")
}

/// Apply the gateway settings this deployment depends on.
pub fn apply_patch(doc: &mut Value, patch: &GatewayPatch<'_>) -> Result<(), AppError> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| AppError::GatewayConfig("top level is not a JSON object".into()))?;

    let gateway = object_at(root, "gateway");
    gateway.insert("port".into(), json!(patch.port));
    gateway.insert("bind".into(), json!("loopback"));
    gateway.insert("trustedProxies".into(), json!(TRUSTED_PROXIES));

    let chat = object_at(object_at(object_at(gateway, "http"), "endpoints"), "chatCompletions");
    chat.insert("enabled".into(), json!(true));

    let auth = object_at(gateway, "auth");
    let has_token = auth
        .get("token")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty());
    if !has_token {
        auth.insert("token".into(), json!(patch.proposed_token));
    }
    if !auth.contains_key("mode") {
        auth.insert("mode".into(), json!("token"));
    }

    let plugins = object_at(root, "plugins");
    let load = object_at(plugins, "load");
    let paths = load
        .entry("paths".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !paths.is_array() {
        *paths = Value::Array(Vec::new());
    }
    if let Value::Array(list) = paths {
        if !list.iter().any(|p| p.as_str() == Some(patch.plugin_path)) {
            list.push(json!(patch.plugin_path));
        }
    }

    let entry = object_at(plugin_entries(plugins), patch.plugin_name);
    entry.insert("enabled".into(), json!(true));
    Ok(())
}

/// `gateway.auth.token`, if present and non-empty.
pub fn persisted_token(doc: &Value) -> Option<&str> {
    doc.pointer("/gateway/auth/token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
}

pub fn load(path: &Path) -> Result<Value, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::GatewayConfig(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| AppError::GatewayConfig(format!("{} is not valid JSON: {e}", path.display())))
}

/// Write `doc` next to `path` and rename it into place.
pub fn store(path: &Path, doc: &Value) -> Result<(), AppError> {
    let mut text = serde_json::to_string_pretty(doc)?;
    text.push('\n');
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, text)?;
    crate::set_mode(&tmp, 0o600)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
