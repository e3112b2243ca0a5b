//! Host provisioning for the OpenClaw gateway and its security proxy.
//!
//! [`run`] walks the numbered phases in order. Every phase is safe to repeat
//! on a host where it already succeeded, so an aborted run is recovered by
//! running again.

pub mod app;
pub mod collect;
pub mod commands;
pub mod compose;
pub mod docker;
pub mod env_file;
pub mod gateway_config;
pub mod interactive;
pub mod nodejs;
pub mod onboard;
pub mod packages;
pub mod preflight;
pub mod release;
pub mod service;
pub mod tunnel;
pub mod user;
pub mod verify;

#[cfg(test)]
mod flow_tests;
#[cfg(test)]
pub(crate) mod testing;

use clawstack_core::phase::Phase;
use clawstack_core::report::DeployReport;
use clawstack_core::session::RunContext;
use clawstack_core::{AppError, Layout};
use clawstack_ui::{self as ui, Prompter};
use commands::Host;
use std::path::Path;
use tracing::info;
use verify::ProbePolicy;

pub use commands::LocalHost;

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<(), AppError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> Result<(), AppError> {
    Ok(())
}

pub struct DeployOptions {
    pub layout: Layout,
    pub probe: ProbePolicy,
}

impl DeployOptions {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            probe: ProbePolicy::default(),
        }
    }
}

/// Tracks the phase in progress so a failure can name it.
struct Cursor(Phase);

impl Cursor {
    fn enter(&mut self, phase: Phase) {
        self.0 = phase;
        info!(step = phase.number(), phase = phase.title(), "entering phase");
        ui::step(phase);
    }
}

/// Run the whole deployment. Returns the report that was printed.
///
/// Errors abort at the failing phase with no rollback; warnings never do.
pub async fn run(
    host: &dyn Host,
    prompter: &dyn Prompter,
    opts: &DeployOptions,
) -> Result<DeployReport, AppError> {
    let mut cursor = Cursor(Phase::Preflight);
    match sequence(host, prompter, opts, &mut cursor).await {
        Ok(report) => Ok(report),
        Err(e) => {
            ui::fail(&format!("{} failed", cursor.0.header()));
            Err(e)
        }
    }
}

async fn sequence(
    host: &dyn Host,
    prompter: &dyn Prompter,
    opts: &DeployOptions,
    cursor: &mut Cursor,
) -> Result<DeployReport, AppError> {
    let layout = &opts.layout;

    cursor.enter(Phase::Preflight);
    let os = preflight::run(host, layout)?;
    ui::ok(&format!(
        "{} on {}",
        os.pretty_name.as_deref().unwrap_or(&os.version_id),
        host.arch()
    ));

    cursor.enter(Phase::Configure);
    let session = collect::collect(prompter, layout)?;
    let mut ctx = RunContext::new(session);

    cursor.enter(Phase::Tunnel);
    if ctx.session.use_public_tunnel {
        let (tunnel, warnings) = tunnel::provision(host, prompter, layout, &ctx.session).await?;
        warnings.iter().for_each(ui::warn);
        ctx = ctx.with_tunnel(Some(tunnel)).with_warnings(warnings);
    } else {
        ui::emit("  Skipped (local access only)");
    }

    cursor.enter(Phase::Dependencies);
    packages::provision(host).await?;
    docker::provision(host, layout).await?;
    nodejs::provision(host).await?;

    cursor.enter(Phase::Identity);
    user::provision(host, layout, &ctx.session).await?;
    ui::ok("Service account and directories in place");

    cursor.enter(Phase::Application);
    let release = app::provision(host, layout).await?;
    ctx = ctx.with_release(release.tag);

    cursor.enter(Phase::Onboarding);
    let token = onboard::provision(host, prompter, layout).await?;
    ctx = ctx.with_gateway_token(token);

    cursor.enter(Phase::Environment);
    let token = ctx
        .gateway_token
        .clone()
        .ok_or_else(|| AppError::provision("environment", "no gateway token"))?;
    let secret = env_file::materialize(layout, &token)?;
    ctx = ctx.with_governance_secret(secret);

    cursor.enter(Phase::GatewayService);
    service::install(host, layout).await?;

    cursor.enter(Phase::Containers);
    compose::deploy(host, layout, &ctx.session).await?;

    cursor.enter(Phase::Verify);
    let readiness = verify::verify(host, layout, &token, opts.probe).await?;
    ctx = ctx.with_warnings(readiness.warnings);

    cursor.enter(Phase::Summary);
    let report = DeployReport {
        release_tag: ctx.release_tag.unwrap_or_default(),
        session: ctx.session,
        tunnel: ctx.tunnel,
        gateway_token: token,
        gateway_url: layout.gateway_upstream_url(),
        proxy_url: layout.proxy_base_url(),
        readiness: readiness.state,
        warnings: ctx.warnings,
    };
    ui::print_summary(&report);
    Ok(report)
}
