use clawstack_core::config;
use clawstack_core::report::DeployReport;
use console::style;
use std::fmt::Write;

/// Print the deploy summary.
pub fn print_summary(report: &DeployReport) {
    print!("{}", render_summary(report));
}

/// Render the deploy summary as shown to the operator.
pub fn render_summary(report: &DeployReport) -> String {
    let divider = "=".repeat(60);
    let gw = config::GATEWAY_SERVICE;
    let proxy = config::PROXY_SERVICE_NAME;
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "\n{divider}");
    if report.is_degraded() {
        let _ = writeln!(out, "  {}", style("clawstack deployment finished with warnings").yellow().bold());
    } else {
        let _ = writeln!(out, "  {}", style("clawstack deployment complete").green().bold());
    }
    let _ = writeln!(out, "{divider}");
    let _ = writeln!(out, "  OpenClaw release:  {}", report.release_tag);
    let _ = writeln!(out, "  Gateway:           {} (loopback only)", report.gateway_url);
    let _ = writeln!(out, "  Security proxy:    {}", report.proxy_url);
    let _ = writeln!(
        out,
        "  Storage:           {}",
        report.session.storage_mount_path.display()
    );
    match &report.tunnel {
        Some(tunnel) => {
            let _ = writeln!(out, "  Public URL:        https://{}", tunnel.ingress.hostname);
            let _ = writeln!(
                out,
                "  Tunnel:            {} ({}{})",
                tunnel.name,
                tunnel.id,
                if tunnel.reused { ", reused" } else { "" }
            );
        }
        None => {
            let _ = writeln!(out, "  Public URL:        (none, local access only)");
        }
    }
    let _ = writeln!(out, "  Readiness:         {}", report.readiness);
    let _ = writeln!(out);
    let _ = writeln!(out, "  Gateway token:     {}", report.gateway_token.expose());
    let _ = writeln!(
        out,
        "  Secrets file:      {}/{}",
        config::PROXY_RUNTIME_DIR,
        config::ENV_FILE_NAME
    );
    let _ = writeln!(out, "                     (fill in ANTHROPIC_API_KEY, OPENAI_API_KEY, ... as needed)");

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "{divider}");
        let _ = writeln!(out, "  {}", style("Warnings:").yellow().bold());
        for warning in &report.warnings {
            let _ = writeln!(out, "    - [{}] {}", warning.phase, warning.message);
            for hint in &warning.hints {
                let _ = writeln!(out, "        {hint}");
            }
        }
    }

    let _ = writeln!(out, "{divider}");
    let _ = writeln!(out, "  Next steps:");
    let _ = writeln!(out, "    1. curl {}{}", report.proxy_url, config::PROXY_HEALTH_PATH);
    let _ = writeln!(out, "    2. journalctl -u {gw} -f");
    let _ = writeln!(
        out,
        "    3. docker compose -f {}/{} logs -f {proxy}",
        config::PROXY_RUNTIME_DIR,
        config::COMPOSE_RENDERED
    );
    let _ = writeln!(out, "{divider}\n");
    out
}
