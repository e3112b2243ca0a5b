use crate::commands::{has_command, run_root, succeeds, Host};
use clawstack_core::config::DOCKER_DAEMON_CONFIG;
use clawstack_core::{AppError, Layout};
use clawstack_ui as ui;

const DAEMON_JSON: &str = r#"{
  "live-restore": true,
  "userland-proxy": false,
  "no-new-privileges": true,
  "log-driver": "json-file",
  "log-opts": {
    "max-size": "10m",
    "max-file": "3"
  }
}
"#;

/// Step 4a: Docker Engine with the compose plugin.
///
/// Writes a hardened daemon.json only when none exists, so operator
/// changes survive re-runs.
pub async fn provision(host: &dyn Host, layout: &Layout) -> Result<(), AppError> {
    if has_command(host, "docker").await {
        ui::ok("Docker already installed");
    } else {
        let sp = ui::spinner("Installing Docker Engine...");
        let result = run_root(host, "curl -fsSL https://get.docker.com | sh").await;
        sp.finish_and_clear();
        result.map_err(|e| AppError::provision("docker install", e))?;
        ui::ok("Docker installed");
    }

    if !succeeds(host, "docker compose version >/dev/null 2>&1").await {
        run_root(
            host,
            "DEBIAN_FRONTEND=noninteractive apt-get install -y -qq docker-compose-plugin",
        )
        .await
        .map_err(|e| AppError::provision("docker compose plugin", e))?;
    }

    let daemon_json = layout.resolve(DOCKER_DAEMON_CONFIG);
    if !daemon_json.exists() {
        if let Some(parent) = daemon_json.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&daemon_json, DAEMON_JSON)?;
        run_root(host, "systemctl restart docker")
            .await
            .map_err(|e| AppError::provision("docker daemon.json", e))?;
    }

    run_root(host, "systemctl enable --now docker")
        .await
        .map_err(|e| AppError::provision("docker service", e))?;
    Ok(())
}
