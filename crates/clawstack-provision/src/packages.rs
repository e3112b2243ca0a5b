use crate::commands::{has_command, run_root, Host};
use clawstack_core::AppError;
use clawstack_ui as ui;

/// Command-line tools later phases shell out to, keyed by the apt package that provides them.
const BASE_TOOLS: &[(&str, &str)] = &[("git", "git"), ("curl", "curl"), ("rsync", "rsync")];

/// Install whichever base tools are missing.
pub async fn provision(host: &dyn Host) -> Result<(), AppError> {
    let mut missing = Vec::new();
    for (bin, package) in BASE_TOOLS {
        if !has_command(host, bin).await {
            missing.push(*package);
        }
    }
    if missing.is_empty() {
        ui::ok("git, curl, rsync already present");
        return Ok(());
    }

    let sp = ui::spinner(&format!("Installing {}...", missing.join(", ")));
    let result = run_root(
        host,
        &format!(
            "apt-get update -qq && DEBIAN_FRONTEND=noninteractive apt-get install -y -qq ca-certificates {}",
            missing.join(" ")
        ),
    )
    .await;
    sp.finish_and_clear();
    result.map_err(|e| AppError::provision("base packages", e))?;
    ui::ok(&format!("Installed {}", missing.join(", ")));
    Ok(())
}
