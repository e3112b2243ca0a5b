//! Whole-run tests against a scratch root, a scripted host and a scripted
//! operator.

use crate::commands::ExecOutput;
use crate::testing::{FakeHost, ScriptedPrompter};
use crate::verify::ProbePolicy;
use crate::{run, DeployOptions};
use clawstack_core::config::{GATEWAY_CONFIG_PATH, OS_RELEASE_PATH};
use clawstack_core::report::ReadinessState;
use clawstack_core::Layout;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ONBOARDED_TOKEN: &str = "token-chosen-by-onboarding";

fn closed_port() -> u16 {
    let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    l.local_addr().unwrap().port()
}

fn options(root: &Path) -> DeployOptions {
    std::fs::create_dir_all(root.join("etc")).unwrap();
    std::fs::write(
        root.join(OS_RELEASE_PATH.trim_start_matches('/')),
        "ID=ubuntu\nVERSION_ID=\"24.04\"\nPRETTY_NAME=\"Ubuntu 24.04 LTS\"\n",
    )
    .unwrap();

    let mut layout = Layout::rooted(root, PathBuf::from("/srv/bundle"));
    layout.gateway_port = closed_port();
    layout.proxy_port = closed_port();
    DeployOptions {
        layout,
        probe: ProbePolicy {
            attempts: 2,
            interval: Duration::from_millis(5),
            attempt_timeout: Duration::from_millis(100),
        },
    }
}

/// Stand in for the tools whose side effects later phases read back.
fn scripted_host(root: &Path) -> FakeHost {
    let host = FakeHost::new();
    let bundle_root = root.to_path_buf();
    host.on("rsync -a", move |_| {
        let plugin = bundle_root.join("opt/clawstack/plugin");
        std::fs::create_dir_all(&plugin).unwrap();
        std::fs::write(plugin.join("package.json"), "{}").unwrap();
        ExecOutput::default()
    });
    let clone_root = root.to_path_buf();
    host.on("git clone", move |_| {
        std::fs::create_dir_all(clone_root.join("opt/openclaw/.git")).unwrap();
        ExecOutput::default()
    });
    let config = root.join(GATEWAY_CONFIG_PATH.trim_start_matches('/'));
    host.on("onboard --mode local", move |_| {
        std::fs::create_dir_all(config.parent().unwrap()).unwrap();
        let doc = json!({ "gateway": { "auth": { "mode": "token", "token": ONBOARDED_TOKEN } } });
        std::fs::write(&config, doc.to_string()).unwrap();
        ExecOutput::default()
    });
    host
}

fn env_values(root: &Path) -> HashMap<String, String> {
    dotenvy::from_path_iter(root.join("opt/clawstack/.env"))
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
}

#[tokio::test]
async fn local_deploy_reaches_summary_with_degraded_readiness() {
    let tmp = tempfile::tempdir().unwrap();
    let opts = options(tmp.path());
    let host = scripted_host(tmp.path());
    // public access: no; create default storage: yes; storage: default
    let prompter = ScriptedPrompter::new(&[false, true], &[""]);

    let report = run(&host, &prompter, &opts).await.unwrap();

    assert_eq!(report.readiness, ReadinessState::Degraded);
    assert!(report.is_degraded());
    assert!(report.tunnel.is_none());
    assert_eq!(report.release_tag, "v2026.2.9");
    assert_eq!(report.gateway_token.expose(), ONBOARDED_TOKEN);

    let env = env_values(tmp.path());
    assert_eq!(env["OPENCLAW_GATEWAY_TOKEN"], ONBOARDED_TOKEN);
    assert_eq!(env["GOVERNANCE_SECRET"].len(), 64);

    assert!(tmp.path().join("home/openclaw-data/audit").is_dir());
    assert!(tmp.path().join("etc/systemd/system/openclaw-gateway.service").is_file());
    assert!(tmp.path().join("opt/clawstack/docker-compose.deploy.yml").is_file());
    assert!(!host.ran("cloudflared"));

    let scripts = host.scripts();
    let useradd = scripts.iter().position(|s| s.contains("useradd")).unwrap();
    let chown = scripts.iter().position(|s| s.contains("chown -R")).unwrap();
    let build = scripts.iter().position(|s| s.contains("build --no-cache")).unwrap();
    let start = scripts.iter().position(|s| s.contains("systemctl restart openclaw-gateway")).unwrap();
    assert!(useradd < chown && chown < build && build < start);
}

#[tokio::test]
async fn rerun_converges_without_duplicates() {
    let tmp = tempfile::tempdir().unwrap();
    let opts = options(tmp.path());
    let host = scripted_host(tmp.path());

    run(&host, &ScriptedPrompter::new(&[false, true], &[""]), &opts)
        .await
        .unwrap();

    let env_path = tmp.path().join("opt/clawstack/.env");
    let filled = std::fs::read_to_string(&env_path)
        .unwrap()
        .replace("OPENAI_API_KEY=\n", "OPENAI_API_KEY=sk-operator\n");
    std::fs::write(&env_path, filled).unwrap();

    // public access: no; re-run onboarding: no; storage: default (exists now)
    let second = run(&host, &ScriptedPrompter::new(&[false, false], &[""]), &opts)
        .await
        .unwrap();

    assert_eq!(host.count("git clone"), 1);
    assert_eq!(host.count("fetch --tags --prune origin"), 1);
    assert_eq!(host.count("onboard --mode local"), 1);
    assert!(host
        .scripts()
        .iter()
        .filter(|s| s.contains("useradd"))
        .all(|s| s.contains("id -u openclaw")));

    assert_eq!(second.gateway_token.expose(), ONBOARDED_TOKEN);
    let env = env_values(tmp.path());
    assert_eq!(env["OPENAI_API_KEY"], "sk-operator");
    assert_eq!(env["OPENCLAW_GATEWAY_TOKEN"], ONBOARDED_TOKEN);

    let doc: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(tmp.path().join(GATEWAY_CONFIG_PATH.trim_start_matches('/')))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(doc["plugins"]["load"]["paths"], json!(["/opt/clawstack/plugin"]));
}

#[tokio::test]
async fn failed_build_aborts_before_onboarding() {
    let tmp = tempfile::tempdir().unwrap();
    let opts = options(tmp.path());
    let host = scripted_host(tmp.path());
    host.respond("pnpm build", 1, "", "ERR_PNPM_OUTDATED_LOCKFILE");

    let err = run(&host, &ScriptedPrompter::new(&[false, true], &[""]), &opts)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ERR_PNPM_OUTDATED_LOCKFILE"));
    assert!(!host.ran("onboard"));
    assert!(!tmp.path().join("opt/clawstack/.env").exists());
}

#[tokio::test]
async fn non_root_aborts_with_no_side_effects() {
    let tmp = tempfile::tempdir().unwrap();
    let opts = options(tmp.path());
    let mut host = scripted_host(tmp.path());
    host.privileged = false;
    let prompter = ScriptedPrompter::default();

    assert!(run(&host, &prompter, &opts).await.is_err());
    assert!(host.requests().is_empty());
    assert!(prompter.asked.lock().unwrap().is_empty());
}
