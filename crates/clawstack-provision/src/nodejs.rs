use crate::commands::{has_command, run_root, ExecRequest, Host};
use clawstack_core::config::MIN_NODE_MAJOR;
use clawstack_core::AppError;
use clawstack_ui as ui;

/// `v22.11.0` -> 22
pub fn parse_node_major(version: &str) -> Option<u32> {
    version
        .trim()
        .trim_start_matches('v')
        .split('.')
        .next()?
        .parse()
        .ok()
}

/// Step 4b: Node.js (NodeSource) and pnpm, each behind a presence check.
pub async fn provision(host: &dyn Host) -> Result<(), AppError> {
    let current = host
        .exec(&ExecRequest::root("node --version"))
        .await
        .ok()
        .filter(|out| out.success())
        .and_then(|out| parse_node_major(&out.stdout));

    match current {
        Some(major) if major >= MIN_NODE_MAJOR => {
            ui::ok(&format!("Node.js {major} already installed"));
        }
        _ => {
            let sp = ui::spinner(&format!("Installing Node.js {MIN_NODE_MAJOR}..."));
            let result = run_root(
                host,
                &format!(
                    "curl -fsSL https://deb.nodesource.com/setup_{MIN_NODE_MAJOR}.x | bash - && \
                     DEBIAN_FRONTEND=noninteractive apt-get install -y -qq nodejs"
                ),
            )
            .await;
            sp.finish_and_clear();
            result.map_err(|e| AppError::provision("nodejs install", e))?;
            ui::ok(&format!("Node.js {MIN_NODE_MAJOR} installed"));
        }
    }

    if !has_command(host, "pnpm").await {
        run_root(host, "npm install -g pnpm")
            .await
            .map_err(|e| AppError::provision("pnpm install", e))?;
        ui::ok("pnpm installed");
    }
    Ok(())
}
