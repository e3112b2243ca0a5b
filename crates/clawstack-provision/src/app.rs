use crate::commands::{run, run_gateway, run_root, shell_escape, ExecRequest, Host};
use crate::release::{self, ResolvedRelease};
use clawstack_core::config::{BUNDLE_EXCLUDES, GATEWAY_SRC_DIR, PROXY_RUNTIME_DIR};
use clawstack_core::{AppError, Layout};
use clawstack_ui as ui;
use std::path::Path;

/// rsync invocation that mirrors the bundle into the runtime directory.
///
/// Excluded paths are never deleted on the receiving side, so the secrets
/// file and installed plugin dependencies survive a re-run.
pub fn bundle_sync_command(bundle: &Path) -> String {
    let excludes: Vec<String> = BUNDLE_EXCLUDES
        .iter()
        .map(|e| format!("--exclude={}", shell_escape(e)))
        .collect();
    format!(
        "mkdir -p {dst} && rsync -a --delete {} {}/ {dst}/",
        excludes.join(" "),
        shell_escape(&bundle.display().to_string()),
        dst = PROXY_RUNTIME_DIR,
    )
}

/// Copy this installer's own source tree (proxy sources, compose template,
/// plugin) into its runtime location.
pub async fn sync_bundle(host: &dyn Host, layout: &Layout) -> Result<(), AppError> {
    if !layout.bundle_dir.is_dir() {
        return Err(AppError::provision(
            "bundle copy",
            format!(
                "{} is not a directory (set CLAWSTACK_BUNDLE_DIR)",
                layout.bundle_dir.display()
            ),
        ));
    }
    run_root(host, &bundle_sync_command(&layout.bundle_dir))
        .await
        .map_err(|e| AppError::provision("bundle copy", e))?;
    ui::ok(&format!("Bundle copied to {PROXY_RUNTIME_DIR}"));
    Ok(())
}

/// Clone or update the gateway sources and check out the resolved release.
///
/// An existing checkout is fetched, never reset; local changes that block
/// the checkout fail the run instead of being discarded.
pub async fn checkout_gateway(
    host: &dyn Host,
    layout: &Layout,
) -> Result<ResolvedRelease, AppError> {
    let src = Path::new(GATEWAY_SRC_DIR);
    if layout.resolve(src.join(".git")).exists() {
        run_gateway(host, &format!("git -C {GATEWAY_SRC_DIR} fetch --tags --prune origin"))
            .await
            .map_err(|e| AppError::provision("gateway fetch", e))?;
    } else {
        let sp = ui::spinner("Cloning OpenClaw...");
        let result = run_gateway(
            host,
            &format!(
                "git clone {} {GATEWAY_SRC_DIR}",
                shell_escape(&layout.gateway_repo_url)
            ),
        )
        .await;
        sp.finish_and_clear();
        result.map_err(|e| AppError::provision("gateway clone", e))?;
    }

    let resolved = release::resolve_release(host, src, &release::default_chain()).await?;
    run_gateway(
        host,
        &format!(
            "git -C {GATEWAY_SRC_DIR} -c advice.detachedHead=false checkout --quiet {}",
            shell_escape(&resolved.tag)
        ),
    )
    .await
    .map_err(|e| AppError::provision("gateway checkout", e))?;
    ui::ok(&format!(
        "OpenClaw {} checked out ({:?})",
        resolved.tag, resolved.source
    ));
    Ok(resolved)
}

pub async fn build_gateway(host: &dyn Host) -> Result<(), AppError> {
    let sp = ui::spinner("Building OpenClaw (pnpm install && pnpm build)...");
    let result = run(
        host,
        ExecRequest::gateway(format!(
            "cd {GATEWAY_SRC_DIR} && pnpm install --frozen-lockfile && pnpm build"
        ))
        .env("CI", "true"),
    )
    .await;
    sp.finish_and_clear();
    result.map_err(|e| AppError::provision("gateway build", e))?;
    ui::ok("OpenClaw built");
    Ok(())
}

/// Production dependencies for the in-process security plugin.
pub async fn install_plugin(host: &dyn Host, layout: &Layout) -> Result<(), AppError> {
    let plugin = layout.plugin_dir();
    if !layout.resolve(plugin.join("package.json")).is_file() {
        return Err(AppError::provision(
            "security plugin",
            format!("{}/package.json is missing from the bundle", plugin.display()),
        ));
    }
    let dir = shell_escape(&plugin.display().to_string());
    run_root(
        host,
        &format!("cd {dir} && npm install --omit=dev --no-audit --no-fund && chmod -R a+rX {dir}"),
    )
    .await
    .map_err(|e| AppError::provision("security plugin", e))?;
    ui::ok("Security plugin dependencies installed");
    Ok(())
}

/// Step 6: bundle, gateway release, build, plugin.
pub async fn provision(host: &dyn Host, layout: &Layout) -> Result<ResolvedRelease, AppError> {
    sync_bundle(host, layout).await?;
    let resolved = checkout_gateway(host, layout).await?;
    build_gateway(host).await?;
    install_plugin(host, layout).await?;
    Ok(resolved)
}
