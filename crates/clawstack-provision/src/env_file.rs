//! The proxy's secrets file: the single source of container configuration.

use clawstack_core::config::OPTIONAL_SECRET_KEYS;
use clawstack_core::session::{AuthoritativeToken, GovernanceSecret};
use clawstack_core::{AppError, Layout};
use clawstack_ui as ui;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

pub struct EnvContents<'a> {
    pub upstream_url: String,
    pub gateway_token: &'a AuthoritativeToken,
    pub governance_secret: &'a GovernanceSecret,
    /// Optional integration keys carried over from an earlier run.
    pub preserved: HashMap<String, String>,
}

/// Quote for dotenv parsing. Single quotes are literal (no `$` expansion);
/// a value that itself holds `'` falls back to double quotes with escapes.
fn quote(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:@+=,".contains(c));
    if plain {
        value.to_string()
    } else if !value.contains('\'') {
        format!("'{value}'")
    } else {
        let escaped = value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('$', "\\$");
        format!("\"{escaped}\"")
    }
}

pub fn render(contents: &EnvContents<'_>) -> String {
    let mut out = String::from("# Managed by clawstack. Optional keys below may be filled in by hand.\n");
    out.push_str(&format!("UPSTREAM_URL={}\n", quote(&contents.upstream_url)));
    out.push_str(&format!(
        "OPENCLAW_GATEWAY_TOKEN={}\n",
        quote(contents.gateway_token.expose())
    ));
    out.push_str(&format!(
        "GOVERNANCE_SECRET={}\n",
        quote(contents.governance_secret.expose())
    ));
    out.push('\n');
    for key in OPTIONAL_SECRET_KEYS {
        let value = contents.preserved.get(*key).map(String::as_str).unwrap_or("");
        out.push_str(&format!("{key}={}\n", quote(value)));
    }
    out
}

/// Optional keys with a non-empty value in an existing secrets file.
pub fn read_preserved(path: &Path) -> HashMap<String, String> {
    let mut kept = HashMap::new();
    if !path.is_file() {
        return kept;
    }
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) => {
            warn!(error = %e, "existing secrets file is unreadable; starting fresh");
            return kept;
        }
    };
    for item in iter {
        match item {
            Ok((key, value)) if OPTIONAL_SECRET_KEYS.contains(&key.as_str()) && !value.is_empty() => {
                kept.insert(key, value);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping malformed line in secrets file"),
        }
    }
    kept
}

/// Step 8: write the secrets file (owner-only) and return the governance
/// secret it holds.
pub fn materialize(
    layout: &Layout,
    gateway_token: &AuthoritativeToken,
) -> Result<GovernanceSecret, AppError> {
    let path = layout.resolve(layout.env_file());
    let governance_secret = GovernanceSecret::generate();
    let preserved = read_preserved(&path);
    let text = render(&EnvContents {
        upstream_url: layout.gateway_upstream_url(),
        gateway_token,
        governance_secret: &governance_secret,
        preserved,
    });

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, text)?;
    crate::set_mode(&tmp, 0o600)?;
    std::fs::rename(&tmp, &path)?;
    ui::ok(&format!("Secrets written to {}", layout.env_file().display()));
    Ok(governance_secret)
}
