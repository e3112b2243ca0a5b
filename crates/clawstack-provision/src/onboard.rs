use crate::commands::{run_root, ExecRequest, Host};
use crate::gateway_config::{self, GatewayPatch};
use crate::interactive::HumanStep;
use clawstack_core::config::{
    GATEWAY_CONFIG_PATH, GATEWAY_ENTRYPOINT, GATEWAY_SRC_DIR, GATEWAY_USER, PLUGIN_NAME,
};
use clawstack_core::session::{AuthoritativeToken, ProposedToken};
use clawstack_core::{AppError, Layout};
use clawstack_ui::{self as ui, Prompter};
use tracing::info;

/// Environment variable carrying the proposed token into onboarding.
const TOKEN_ENV: &str = "OPENCLAW_GATEWAY_TOKEN";

/// Non-interactive onboarding flags. Only the provider sign-in stays
/// interactive; every other sub-wizard is skipped.
pub fn onboard_command(port: u16) -> String {
    format!(
        "cd {GATEWAY_SRC_DIR} && node {GATEWAY_ENTRYPOINT} onboard \
         --mode local \
         --gateway-bind loopback \
         --gateway-port {port} \
         --gateway-auth token \
         --gateway-token \"${TOKEN_ENV}\" \
         --skip-daemon --skip-channels --skip-skills --skip-health --skip-ui"
    )
}

async fn run_onboarding(
    host: &dyn Host,
    prompter: &dyn Prompter,
    layout: &Layout,
    proposed: &ProposedToken,
) -> Result<(), AppError> {
    HumanStep {
        title: "OpenClaw onboarding",
        announcement: &[
            "The gateway's setup wizard runs next. Network, port and auth are preset.",
            "It will ask you to sign in to your model provider (OAuth in a browser).",
            "Finish the sign-in; this installer continues when the wizard exits.",
        ],
        confirm: None,
        request: ExecRequest::gateway(onboard_command(layout.gateway_port))
            .env(TOKEN_ENV, proposed.expose()),
    }
    .run(host, prompter)
    .await
}

/// Step 7: onboard the gateway, patch its configuration, and return the
/// token it actually persisted.
///
/// A host that already has a configuration document is only re-onboarded
/// if the operator asks for it.
pub async fn provision(
    host: &dyn Host,
    prompter: &dyn Prompter,
    layout: &Layout,
) -> Result<AuthoritativeToken, AppError> {
    let config_path = layout.resolve(GATEWAY_CONFIG_PATH);
    let proposed = ProposedToken::generate();

    let onboard = !config_path.is_file()
        || prompter.confirm(
            "OpenClaw is already onboarded. Run onboarding again?",
            false,
        )?;
    if onboard {
        run_onboarding(host, prompter, layout, &proposed).await?;
    }

    if !config_path.is_file() {
        return Err(AppError::GatewayConfig(format!(
            "onboarding finished but {GATEWAY_CONFIG_PATH} was not written"
        )));
    }

    let plugin_path = layout.plugin_dir().display().to_string();
    let mut doc = gateway_config::load(&config_path)?;
    gateway_config::apply_patch(
        &mut doc,
        &GatewayPatch {
            port: layout.gateway_port,
            plugin_path: &plugin_path,
            plugin_name: PLUGIN_NAME,
            proposed_token: proposed.expose(),
        },
    )?;
    gateway_config::store(&config_path, &doc)?;
    run_root(
        host,
        &format!("chown {GATEWAY_USER}:{GATEWAY_USER} {GATEWAY_CONFIG_PATH}"),
    )
    .await
    .map_err(|e| AppError::provision("gateway config", e))?;
    ui::ok("Gateway configuration patched");

    // Onboarding may ignore the proposed token; the document decides.
    let persisted = gateway_config::load(&config_path)?;
    let token = gateway_config::persisted_token(&persisted)
        .ok_or_else(|| AppError::GatewayConfig("gateway.auth.token is missing".into()))?;
    if token != proposed.expose() {
        info!("onboarding persisted its own gateway token");
    }
    Ok(AuthoritativeToken::from_persisted(token))
}
