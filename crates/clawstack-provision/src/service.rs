use crate::commands::{run_root, Host};
use clawstack_core::config::{
    GATEWAY_ENTRYPOINT, GATEWAY_HOME, GATEWAY_SERVICE, GATEWAY_SRC_DIR, GATEWAY_UNIT_PATH,
    GATEWAY_USER,
};
use clawstack_core::{AppError, Layout};
use clawstack_ui as ui;

const DEFAULT_NODE: &str = "/usr/bin/node";

pub fn render_unit(node_bin: &str, port: u16) -> String {
    format!(
        r#"[Unit]
Description=OpenClaw gateway
After=network-online.target
Wants=network-online.target
StartLimitIntervalSec=300
StartLimitBurst=5

[Service]
Type=simple
User={user}
Group={user}
WorkingDirectory={src}
Environment=HOME={home}
Environment=NODE_ENV=production
ExecStart={node} {src}/{entry} gateway --port {port}
Restart=on-failure
RestartSec=5

# Hardening
ProtectSystem=strict
ReadWritePaths={home}
ProtectHome=true
PrivateTmp=true
NoNewPrivileges=true

StandardOutput=journal
StandardError=journal
SyslogIdentifier={service}

[Install]
WantedBy=multi-user.target
"#,
        user = GATEWAY_USER,
        src = GATEWAY_SRC_DIR,
        home = GATEWAY_HOME,
        node = node_bin,
        entry = GATEWAY_ENTRYPOINT,
        port = port,
        service = GATEWAY_SERVICE,
    )
}

async fn node_path(host: &dyn Host) -> String {
    match run_root(host, "command -v node").await {
        Ok(out) if out.trim().starts_with('/') => out.trim().to_string(),
        _ => DEFAULT_NODE.to_string(),
    }
}

/// Step 9: install and enable the gateway unit. Starting it is left to
/// readiness verification.
pub async fn install(host: &dyn Host, layout: &Layout) -> Result<(), AppError> {
    let unit = render_unit(&node_path(host).await, layout.gateway_port);
    let path = layout.resolve(GATEWAY_UNIT_PATH);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, unit)?;
    crate::set_mode(&path, 0o644)?;

    run_root(
        host,
        &format!("systemctl daemon-reload && systemctl enable {GATEWAY_SERVICE}"),
    )
    .await
    .map_err(|e| AppError::provision("gateway service", e))?;
    ui::ok(&format!("{GATEWAY_SERVICE}.service installed and enabled"));
    Ok(())
}
