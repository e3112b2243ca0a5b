//! The proxy's compose file: rendered from the bundled template, or
//! synthesized from a baseline when the bundle has none.

use crate::commands::{run_root, Host};
use clawstack_core::config::{
    COMPOSE_RENDERED, COMPOSE_TEMPLATE, CONTAINER_GID, CONTAINER_UID, DEFAULT_STORAGE_MOUNT,
    ENV_FILE_NAME, PROXY_DATA_DIR, PROXY_PORT, PROXY_RUNTIME_DIR, PROXY_SERVICE_NAME,
};
use clawstack_core::session::SessionConfig;
use clawstack_core::{AppError, Layout};
use clawstack_ui as ui;
use serde_yaml::Value;
use std::path::Path;
use tracing::info;

/// Compose document equivalent to the bundled template, for bundles that
/// ship without one.
pub fn baseline(storage: &Path) -> String {
    format!(
        r#"services:
  {service}:
    build:
      context: .
    image: {service}:latest
    container_name: {service}
    restart: unless-stopped
    network_mode: host
    user: "{uid}:{gid}"
    read_only: true
    cap_drop:
      - ALL
    security_opt:
      - no-new-privileges:true
    tmpfs:
      - /tmp:size=64m,mode=1777
    env_file:
      - {env}
    environment:
      PROXY_PORT: "{port}"
      AUDIT_DIR: /data/audit
      STATE_DIR: /data/state
    volumes:
      - {storage}/audit:/data/audit
      - {data}:/data/state
"#,
        service = PROXY_SERVICE_NAME,
        uid = CONTAINER_UID,
        gid = CONTAINER_GID,
        env = ENV_FILE_NAME,
        port = PROXY_PORT,
        storage = storage.display(),
        data = PROXY_DATA_DIR,
    )
}

/// Rewrite host-side volume sources under the default storage mount to
/// live under `storage` instead.
pub fn substitute_storage(doc: &mut Value, storage: &Path) -> usize {
    let storage = storage.display().to_string();
    let mut replaced = 0;
    let Some(services) = doc.get_mut("services").and_then(Value::as_mapping_mut) else {
        return 0;
    };
    for (_, service) in services.iter_mut() {
        let Some(volumes) = service.get_mut("volumes").and_then(Value::as_sequence_mut) else {
            continue;
        };
        for volume in volumes.iter_mut() {
            let Some(spec) = volume.as_str() else { continue };
            if let Some(rest) = spec.strip_prefix(DEFAULT_STORAGE_MOUNT) {
                if rest.starts_with('/') || rest.starts_with(':') {
                    *volume = Value::String(format!("{storage}{rest}"));
                    replaced += 1;
                }
            }
        }
    }
    replaced
}

/// Compose text to deploy, plus whether it came from the bundled template.
pub fn render(template: Option<&str>, session: &SessionConfig) -> Result<(String, bool), AppError> {
    match template {
        Some(text) if session.uses_default_storage() => Ok((text.to_string(), true)),
        Some(text) => {
            let mut doc: Value = serde_yaml::from_str(text)?;
            let n = substitute_storage(&mut doc, &session.storage_mount_path);
            info!(volumes = n, "storage path substituted into compose template");
            Ok((serde_yaml::to_string(&doc)?, true))
        }
        None => Ok((baseline(&session.storage_mount_path), false)),
    }
}

/// Step 10: render the compose file, build without cache, start detached.
pub async fn deploy(
    host: &dyn Host,
    layout: &Layout,
    session: &SessionConfig,
) -> Result<(), AppError> {
    let template_path = layout.resolve(layout.proxy_runtime_file(COMPOSE_TEMPLATE));
    let template = match std::fs::read_to_string(&template_path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let (text, from_template) = render(template.as_deref(), session)?;
    let rendered = layout.resolve(layout.proxy_runtime_file(COMPOSE_RENDERED));
    if let Some(parent) = rendered.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&rendered, text)?;
    if from_template {
        ui::ok(&format!("Compose file rendered from {COMPOSE_TEMPLATE}"));
    } else {
        ui::ok("Compose file synthesized (no bundled template)");
    }

    let compose = format!("cd {PROXY_RUNTIME_DIR} && docker compose -f {COMPOSE_RENDERED}");
    let sp = ui::spinner("Building proxy image (no cache)...");
    let built = run_root(host, &format!("{compose} build --no-cache")).await;
    sp.finish_and_clear();
    built.map_err(|e| AppError::provision("proxy image build", e))?;

    run_root(host, &format!("{compose} up -d --force-recreate"))
        .await
        .map_err(|e| AppError::provision("proxy start", e))?;
    ui::ok(&format!("{PROXY_SERVICE_NAME} container started"));
    Ok(())
}
