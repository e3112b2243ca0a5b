//! Readiness verification. Nothing here fails the run: every timeout or
//! bad answer becomes a warning with commands to diagnose by hand.

use crate::commands::{run_root, Host};
use clawstack_core::config::{
    COMPOSE_RENDERED, GATEWAY_SERVICE, PROBE_ATTEMPTS, PROBE_ATTEMPT_TIMEOUT, PROBE_INTERVAL,
    PROXY_CHAT_PATH, PROXY_HEALTH_PATH, PROXY_RUNTIME_DIR, PROXY_SERVICE_NAME,
};
use clawstack_core::phase::Phase;
use clawstack_core::report::{ReadinessState, Warning};
use clawstack_core::session::AuthoritativeToken;
use clawstack_core::{AppError, Layout};
use clawstack_ui as ui;
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Address the synthetic request claims to come from (TEST-NET-3).
const SYNTHETIC_CLIENT_IP: &str = "203.0.113.10";

#[derive(Debug, Clone, Copy)]
pub struct ProbePolicy {
    pub attempts: u32,
    pub interval: Duration,
    pub attempt_timeout: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            attempts: PROBE_ATTEMPTS,
            interval: PROBE_INTERVAL,
            attempt_timeout: PROBE_ATTEMPT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProbeTarget {
    /// Something accepts connections on this address.
    Tcp(SocketAddr),
    /// GET returns a 2xx status.
    Http(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub ready: bool,
    pub attempts: u32,
}

async fn probe_once(target: &ProbeTarget, client: &reqwest::Client, timeout: Duration) -> bool {
    match target {
        ProbeTarget::Tcp(addr) => matches!(
            tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        ),
        ProbeTarget::Http(url) => match client.get(url).timeout(timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(%url, error = %e, "health probe failed");
                false
            }
        },
    }
}

/// Poll `target` until it answers or the attempt budget runs out.
pub async fn poll(target: &ProbeTarget, client: &reqwest::Client, policy: ProbePolicy) -> ProbeOutcome {
    for attempt in 1..=policy.attempts {
        if probe_once(target, client, policy.attempt_timeout).await {
            return ProbeOutcome {
                ready: true,
                attempts: attempt,
            };
        }
        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    ProbeOutcome {
        ready: false,
        attempts: policy.attempts,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum E2eOutcome {
    /// The proxy answered with something other than an upstream failure.
    /// Says nothing about whether the gateway handled the request well.
    PathIntact(u16),
    /// 502/504: the proxy is up but could not reach the gateway.
    UpstreamUnreachable(u16),
    /// No HTTP answer at all.
    NoResponse(String),
}

/// True for statuses that mean "the proxy could not reach its upstream".
pub fn is_upstream_unreachable(status: u16) -> bool {
    matches!(status, 502 | 504)
}

pub fn classify_status(status: u16) -> E2eOutcome {
    if is_upstream_unreachable(status) {
        E2eOutcome::UpstreamUnreachable(status)
    } else {
        E2eOutcome::PathIntact(status)
    }
}

/// One chat request through the proxy, as an authenticated outside caller.
pub async fn end_to_end(
    client: &reqwest::Client,
    proxy_base: &str,
    token: &AuthoritativeToken,
    timeout: Duration,
) -> E2eOutcome {
    let body = json!({
        "model": "openclaw",
        "messages": [{ "role": "user", "content": "readiness check: reply with OK" }],
        "max_tokens": 8,
    });
    let result = client
        .post(format!("{proxy_base}{PROXY_CHAT_PATH}"))
        .bearer_auth(token.expose())
        .header("X-Forwarded-For", SYNTHETIC_CLIENT_IP)
        .json(&body)
        .timeout(timeout)
        .send()
        .await;
    match result {
        Ok(resp) => classify_status(resp.status().as_u16()),
        Err(e) => E2eOutcome::NoResponse(e.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessReport {
    pub state: ReadinessState,
    pub gateway: ProbeOutcome,
    pub proxy: ProbeOutcome,
    pub e2e: Option<E2eOutcome>,
    pub warnings: Vec<Warning>,
}

fn gateway_hints(w: Warning, port: u16) -> Warning {
    w.hint(format!("journalctl -u {GATEWAY_SERVICE} -f"))
        .hint(format!("systemctl status {GATEWAY_SERVICE}"))
        .hint(format!("ss -ltnp | grep {port}"))
}

fn proxy_hints(w: Warning, health_url: &str) -> Warning {
    w.hint(format!(
        "cd {PROXY_RUNTIME_DIR} && docker compose -f {COMPOSE_RENDERED} logs {PROXY_SERVICE_NAME}"
    ))
    .hint(format!("curl -i {health_url}"))
}

/// Step 11: start the gateway, wait for both tiers, then check the path
/// between them.
pub async fn verify(
    host: &dyn Host,
    layout: &Layout,
    token: &AuthoritativeToken,
    policy: ProbePolicy,
) -> Result<ReadinessReport, AppError> {
    let client = reqwest::Client::builder().build()?;
    let mut warnings = Vec::new();
    let mut state = ReadinessState::NotStarted;
    let health_url = format!("{}{PROXY_HEALTH_PATH}", layout.proxy_base_url());

    match run_root(host, &format!("systemctl restart {GATEWAY_SERVICE}")).await {
        Ok(_) => {
            state = ReadinessState::ProcessStarted;
            ui::ok(&format!("{GATEWAY_SERVICE} started"));
        }
        Err(e) => warnings.push(gateway_hints(
            Warning::new(Phase::Verify, format!("Gateway service did not start: {e}")),
            layout.gateway_port,
        )),
    }

    let sp = ui::spinner("Waiting for gateway port and proxy health...");
    let gateway_target = ProbeTarget::Tcp(SocketAddr::from(([127, 0, 0, 1], layout.gateway_port)));
    let proxy_target = ProbeTarget::Http(health_url.clone());
    let (gateway, proxy) = tokio::join!(
        poll(&gateway_target, &client, policy),
        poll(&proxy_target, &client, policy),
    );
    sp.finish_and_clear();

    if gateway.ready {
        ui::ok(&format!(
            "Gateway listening on 127.0.0.1:{} (attempt {})",
            layout.gateway_port, gateway.attempts
        ));
        if state == ReadinessState::ProcessStarted {
            state = ReadinessState::PortBound;
        }
    } else {
        warnings.push(gateway_hints(
            Warning::new(
                Phase::Verify,
                format!(
                    "Gateway port {} not open after {} attempts",
                    layout.gateway_port, gateway.attempts
                ),
            ),
            layout.gateway_port,
        ));
    }

    if proxy.ready {
        ui::ok(&format!("Proxy healthy at {health_url} (attempt {})", proxy.attempts));
    } else {
        warnings.push(proxy_hints(
            Warning::new(
                Phase::Verify,
                format!("Proxy health check failed after {} attempts", proxy.attempts),
            ),
            &health_url,
        ));
    }

    let mut e2e = None;
    if state == ReadinessState::PortBound && proxy.ready {
        state = ReadinessState::HealthOk;
        let outcome = end_to_end(&client, &layout.proxy_base_url(), token, policy.attempt_timeout * 5).await;
        match &outcome {
            E2eOutcome::PathIntact(status) => {
                ui::ok(&format!("Proxy reaches the gateway (HTTP {status})"));
                state = ReadinessState::E2eVerified;
            }
            E2eOutcome::UpstreamUnreachable(status) => warnings.push(gateway_hints(
                proxy_hints(
                    Warning::new(
                        Phase::Verify,
                        format!("Proxy answered HTTP {status}: it cannot reach the gateway"),
                    ),
                    &health_url,
                ),
                layout.gateway_port,
            )),
            E2eOutcome::NoResponse(err) => warnings.push(proxy_hints(
                Warning::new(Phase::Verify, format!("End-to-end request got no answer: {err}")),
                &health_url,
            )),
        }
        e2e = Some(outcome);
    } else {
        warnings.push(
            Warning::new(
                Phase::Verify,
                "End-to-end check skipped: both tiers must be up first",
            )
            .hint("Fix the gateway or proxy warnings above, then retry by hand:")
            .hint(format!(
                "curl -i -X POST -H 'Authorization: Bearer <gateway token>' {}{PROXY_CHAT_PATH}",
                layout.proxy_base_url()
            )),
        );
    }

    if state != ReadinessState::E2eVerified {
        state = ReadinessState::Degraded;
    }
    for w in &warnings {
        ui::warn(w);
    }
    Ok(ReadinessReport {
        state,
        gateway,
        proxy,
        e2e,
        warnings,
    })
}
