//! Cloudflare Tunnel: client install, login, tunnel creation, ingress, DNS,
//! and the cloudflared system service.

use crate::commands::{has_command, run_root, shell_escape, succeeds, ExecRequest, Host};
use crate::interactive::HumanStep;
use chrono::{DateTime, Utc};
use clawstack_core::config::{
    CLOUDFLARED_CONFIG_DIR, CLOUDFLARED_CONFIG_PATH, CLOUDFLARED_ORIGIN_DIR, TUNNEL_NAME_PREFIX,
};
use clawstack_core::phase::Phase;
use clawstack_core::report::Warning;
use clawstack_core::session::{IngressRule, SessionConfig, TunnelResource};
use clawstack_core::{AppError, Layout};
use clawstack_ui::{self as ui, Prompter};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

/// Ways cloudflared has been seen to report a new tunnel's id, tried in order.
pub const TUNNEL_ID_PATTERNS: &[(&str, &str)] = &[
    (
        "created-line",
        r"(?i)created tunnel \S+ with id ([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})",
    ),
    (
        "credentials-file",
        r"(?i)([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\.json",
    ),
];

const NAME_COMMENT: &str = "# tunnel-name: ";

fn id_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        TUNNEL_ID_PATTERNS
            .iter()
            .map(|(name, re)| (*name, Regex::new(re).expect("valid tunnel id pattern")))
            .collect()
    })
}

/// Pull the tunnel id out of `cloudflared tunnel create` output.
pub fn extract_tunnel_id(output: &str) -> Result<String, AppError> {
    for (name, re) in id_patterns() {
        if let Some(id) = re.captures(output).and_then(|c| c.get(1)) {
            info!(pattern = name, "matched tunnel id");
            return Ok(id.as_str().to_ascii_lowercase());
        }
    }
    Err(AppError::TunnelIdNotFound {
        output: output.trim().to_string(),
    })
}

/// Time-based so a re-run never collides with an earlier tunnel.
pub fn tunnel_name(now: DateTime<Utc>) -> String {
    format!("{TUNNEL_NAME_PREFIX}-{}", now.format("%Y%m%d-%H%M%S"))
}

/// Map a Rust target arch onto cloudflared's release asset naming.
pub fn cloudflared_arch(arch: &str) -> Result<&'static str, AppError> {
    match arch {
        "x86_64" => Ok("amd64"),
        "aarch64" => Ok("arm64"),
        "arm" => Ok("arm"),
        other => Err(AppError::UnsupportedArch(other.to_string())),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TunnelConfig {
    tunnel: String,
    #[serde(rename = "credentials-file")]
    credentials_file: String,
    #[serde(default)]
    ingress: Vec<IngressEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IngressEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    service: String,
}

/// The cloudflared config: one route for the proxy and a 404 catch-all.
pub fn render_config(
    name: &str,
    id: &str,
    credentials_file: &Path,
    rule: &IngressRule,
) -> Result<String, AppError> {
    let config = TunnelConfig {
        tunnel: id.to_string(),
        credentials_file: credentials_file.display().to_string(),
        ingress: vec![
            IngressEntry {
                hostname: Some(rule.hostname.clone()),
                service: rule.upstream_url.clone(),
            },
            IngressEntry {
                hostname: None,
                service: "http_status:404".into(),
            },
        ],
    };
    Ok(format!("{NAME_COMMENT}{name}\n{}", serde_yaml::to_string(&config)?))
}

/// A tunnel from a previous run, if its config and credentials are still in place.
fn existing_tunnel(layout: &Layout) -> Option<(String, String, PathBuf)> {
    let text = std::fs::read_to_string(layout.resolve(CLOUDFLARED_CONFIG_PATH)).ok()?;
    let config: TunnelConfig = serde_yaml::from_str(&text).ok()?;
    let credentials = PathBuf::from(&config.credentials_file);
    if config.tunnel.is_empty() || !layout.resolve(&credentials).is_file() {
        return None;
    }
    let name = text
        .lines()
        .find_map(|l| l.strip_prefix(NAME_COMMENT))
        .map(|n| n.trim().to_string())
        .unwrap_or_else(|| config.tunnel.clone());
    Some((name, config.tunnel, credentials))
}

async fn ensure_client(host: &dyn Host) -> Result<(), AppError> {
    if has_command(host, "cloudflared").await {
        return Ok(());
    }
    let arch = cloudflared_arch(&host.arch())?;
    let sp = ui::spinner(&format!("Installing cloudflared ({arch})..."));
    let script = format!(
        "curl -fsSL -o /tmp/cloudflared.deb \
         https://github.com/cloudflare/cloudflared/releases/latest/download/cloudflared-linux-{arch}.deb && \
         dpkg -i /tmp/cloudflared.deb && rm -f /tmp/cloudflared.deb"
    );
    let result = run_root(host, &script).await;
    sp.finish_and_clear();
    result.map_err(|e| AppError::provision("cloudflared install", e))?;
    ui::ok("cloudflared installed");
    Ok(())
}

async fn login(host: &dyn Host, prompter: &dyn Prompter, layout: &Layout) -> Result<(), AppError> {
    let cert = Path::new(CLOUDFLARED_ORIGIN_DIR).join("cert.pem");
    if layout.resolve(&cert).is_file() {
        ui::ok("Cloudflare origin certificate already present, skipping login");
        return Ok(());
    }
    HumanStep {
        title: "Cloudflare login",
        announcement: &[
            "cloudflared will print a URL. Open it in a browser, sign in, and",
            "authorize the zone that holds your domain. The installer resumes",
            "once cloudflared reports the certificate was saved.",
        ],
        confirm: Some("Start the Cloudflare login now?"),
        request: ExecRequest::root("cloudflared tunnel login"),
    }
    .run(host, prompter)
    .await
}

async fn create(host: &dyn Host, name: &str) -> Result<String, AppError> {
    let script = format!("cloudflared tunnel create {}", shell_escape(name));
    let out = host.exec(&ExecRequest::root(&script)).await?;
    let text = out.combined();
    if !out.success() {
        return Err(AppError::Command {
            command: script,
            code: out.code,
            output: text.trim().to_string(),
        });
    }
    extract_tunnel_id(&text)
}

fn install_credentials(layout: &Layout, id: &str) -> Result<PathBuf, AppError> {
    let file = format!("{id}.json");
    let source = Path::new(CLOUDFLARED_ORIGIN_DIR).join(&file);
    let target = Path::new(CLOUDFLARED_CONFIG_DIR).join(&file);
    std::fs::create_dir_all(layout.resolve(CLOUDFLARED_CONFIG_DIR))?;
    std::fs::copy(layout.resolve(&source), layout.resolve(&target)).map_err(|e| {
        AppError::provision(
            "tunnel credentials",
            format!("copy {} -> {}: {e}", source.display(), target.display()),
        )
    })?;
    crate::set_mode(&layout.resolve(&target), 0o600)?;
    Ok(target)
}

async fn route_dns(host: &dyn Host, id: &str, domain: &str) -> Option<Warning> {
    let script = format!(
        "cloudflared tunnel route dns {} {}",
        shell_escape(id),
        shell_escape(domain)
    );
    match run_root(host, &script).await {
        Ok(_) => {
            ui::ok(&format!("DNS route {domain} -> tunnel {id}"));
            None
        }
        Err(e) => Some(
            Warning::new(Phase::Tunnel, format!("DNS route for {domain} was not created: {e}"))
                .hint(format!(
                    "Create a proxied CNAME {domain} -> {id}.cfargotunnel.com in the Cloudflare dashboard"
                ))
                .hint(format!("or retry: cloudflared tunnel route dns {id} {domain}")),
        ),
    }
}

async fn install_service(host: &dyn Host) -> Result<(), AppError> {
    if succeeds(host, "systemctl cat cloudflared.service >/dev/null 2>&1").await {
        run_root(host, "systemctl restart cloudflared").await?;
    } else {
        run_root(
            host,
            &format!("cloudflared --config {CLOUDFLARED_CONFIG_PATH} service install"),
        )
        .await?;
    }
    run_root(host, "systemctl enable --now cloudflared").await?;
    Ok(())
}

/// Step 3: expose the proxy under the operator's domain.
///
/// Returns the tunnel plus any warnings (DNS routing is best effort).
pub async fn provision(
    host: &dyn Host,
    prompter: &dyn Prompter,
    layout: &Layout,
    session: &SessionConfig,
) -> Result<(TunnelResource, Vec<Warning>), AppError> {
    let domain = session.domain_name.clone().ok_or_else(|| {
        AppError::provision("tunnel", "public access was chosen without a domain")
    })?;
    let rule = IngressRule {
        hostname: domain.clone(),
        upstream_url: layout.proxy_base_url(),
    };

    ensure_client(host).await?;

    let (name, id, credentials_file, reused) = match existing_tunnel(layout) {
        Some((name, id, creds)) => {
            info!(%id, "reusing existing tunnel");
            ui::ok(&format!("Reusing tunnel {name} ({id})"));
            (name, id, creds, true)
        }
        None => {
            login(host, prompter, layout).await?;
            let name = tunnel_name(Utc::now());
            let id = create(host, &name).await?;
            ui::ok(&format!("Created tunnel {name} ({id})"));
            let creds = install_credentials(layout, &id)?;
            (name, id, creds, false)
        }
    };

    let config_path = layout.resolve(CLOUDFLARED_CONFIG_PATH);
    std::fs::create_dir_all(layout.resolve(CLOUDFLARED_CONFIG_DIR))?;
    std::fs::write(
        &config_path,
        render_config(&name, &id, &credentials_file, &rule)?,
    )?;
    crate::set_mode(&config_path, 0o600)?;

    let warnings: Vec<Warning> = route_dns(host, &id, &domain).await.into_iter().collect();

    install_service(host)
        .await
        .map_err(|e| AppError::provision("cloudflared service", e))?;
    ui::ok("cloudflared service enabled");

    Ok((
        TunnelResource {
            name,
            id,
            credentials_file,
            ingress: rule,
            reused,
        },
        warnings,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ExecOutput;
    use crate::testing::{FakeHost, ScriptedPrompter};
    use chrono::TimeZone;

    const ID: &str = "6ff42ae2-765d-4adf-8112-31c55c1551ef";

    fn create_output() -> String {
        format!(
            "Tunnel credentials written to /root/.cloudflared/{ID}.json. cloudflared chose this \
             file based on where your origin certificate was found. Keep this file secret.\n\n\
             Created tunnel clawstack-20261019-101010 with id {ID}\n"
        )
    }

    fn layout(tmp: &tempfile::TempDir) -> Layout {
        Layout::rooted(tmp.path(), PathBuf::from("/src"))
    }

    fn fake_cloudflared(tmp: &tempfile::TempDir) -> FakeHost {
        let host = FakeHost::new();
        let origin = tmp.path().join("root/.cloudflared");
        host.on("cloudflared tunnel create", move |_| {
            std::fs::create_dir_all(&origin).unwrap();
            std::fs::write(origin.join(format!("{ID}.json")), "{\"TunnelSecret\":\"x\"}").unwrap();
            ExecOutput {
                code: 0,
                stdout: String::new(),
                stderr: create_output(),
            }
        });
        host
    }

    #[test]
    fn extracts_id_from_created_line() {
        assert_eq!(extract_tunnel_id(&create_output()).unwrap(), ID);
    }

    #[test]
    fn extracts_id_from_credentials_line_alone() {
        let out = format!("2026-10-19T10:10:10Z INF Tunnel credentials written to /root/.cloudflared/{ID}.json.");
        assert_eq!(extract_tunnel_id(&out).unwrap(), ID);
    }

    #[test]
    fn unmatched_output_is_surfaced_in_the_error() {
        let out = "error: something unexpected happened";
        match extract_tunnel_id(out) {
            Err(AppError::TunnelIdNotFound { output }) => assert_eq!(output, out),
            other => panic!("expected TunnelIdNotFound, got {other:?}"),
        }
    }

    #[test]
    fn names_are_time_based() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 5, 3).unwrap();
        assert_eq!(tunnel_name(at), "clawstack-20261019-080503");
    }

    #[test]
    fn arch_mapping() {
        assert_eq!(cloudflared_arch("x86_64").unwrap(), "amd64");
        assert_eq!(cloudflared_arch("aarch64").unwrap(), "arm64");
        assert!(matches!(
            cloudflared_arch("riscv64"),
            Err(AppError::UnsupportedArch(a)) if a == "riscv64"
        ));
    }

    #[test]
    fn config_has_route_and_catch_all() {
        let rule = IngressRule {
            hostname: "claw.example.com".into(),
            upstream_url: "http://127.0.0.1:8080".into(),
        };
        let text = render_config("n", ID, Path::new("/etc/cloudflared/x.json"), &rule).unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(doc["tunnel"].as_str(), Some(ID));
        assert_eq!(doc["credentials-file"].as_str(), Some("/etc/cloudflared/x.json"));
        let ingress = doc["ingress"].as_sequence().unwrap();
        assert_eq!(ingress.len(), 2);
        assert_eq!(ingress[0]["hostname"].as_str(), Some("claw.example.com"));
        assert_eq!(ingress[0]["service"].as_str(), Some("http://127.0.0.1:8080"));
        assert!(ingress[1].get("hostname").is_none());
        assert_eq!(ingress[1]["service"].as_str(), Some("http_status:404"));
    }

    #[tokio::test]
    async fn provisions_new_tunnel() {
        let tmp = tempfile::tempdir().unwrap();
        let host = fake_cloudflared(&tmp);
        let prompter = ScriptedPrompter::new(&[true], &[]);
        let session = SessionConfig::public("claw.example.com", "/data");

        let (tunnel, warnings) = provision(&host, &prompter, &layout(&tmp), &session)
            .await
            .unwrap();

        assert_eq!(tunnel.id, ID);
        assert!(!tunnel.reused);
        assert!(tunnel.name.starts_with("clawstack-"));
        assert!(warnings.is_empty());
        assert!(host.ran("cloudflared tunnel login"));
        assert!(host.ran(&format!("cloudflared tunnel route dns '{ID}' 'claw.example.com'")));
        assert!(host.ran("service install"));

        let creds = tmp.path().join(format!("etc/cloudflared/{ID}.json"));
        assert!(creds.is_file());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&creds).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        let config = std::fs::read_to_string(tmp.path().join("etc/cloudflared/config.yml")).unwrap();
        assert!(config.contains("claw.example.com"));
    }

    #[tokio::test]
    async fn dns_failure_is_a_warning() {
        let tmp = tempfile::tempdir().unwrap();
        let host = fake_cloudflared(&tmp);
        host.respond("tunnel route dns", 1, "", "record already exists");
        let prompter = ScriptedPrompter::new(&[true], &[]);
        let session = SessionConfig::public("claw.example.com", "/data");

        let (_, warnings) = provision(&host, &prompter, &layout(&tmp), &session)
            .await
            .unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].phase, Phase::Tunnel);
        assert!(warnings[0].hints.iter().any(|h| h.contains("cfargotunnel.com")));
        assert!(host.ran("systemctl enable --now cloudflared"));
    }

    #[tokio::test]
    async fn rerun_reuses_existing_tunnel() {
        let tmp = tempfile::tempdir().unwrap();
        let host = fake_cloudflared(&tmp);
        let session = SessionConfig::public("claw.example.com", "/data");
        let prompter = ScriptedPrompter::new(&[true], &[]);
        provision(&host, &prompter, &layout(&tmp), &session)
            .await
            .unwrap();

        let again = fake_cloudflared(&tmp);
        let (tunnel, _) = provision(&again, &ScriptedPrompter::default(), &layout(&tmp), &session)
            .await
            .unwrap();
        assert!(tunnel.reused);
        assert_eq!(tunnel.id, ID);
        assert!(!again.ran("cloudflared tunnel create"));
        assert!(!again.ran("cloudflared tunnel login"));
    }

    #[tokio::test]
    async fn unsupported_arch_fails_before_any_download() {
        let tmp = tempfile::tempdir().unwrap();
        let mut host = FakeHost::new();
        host.arch = "riscv64".into();
        host.respond("command -v cloudflared", 1, "", "");
        let session = SessionConfig::public("claw.example.com", "/data");
        let err = provision(&host, &ScriptedPrompter::default(), &layout(&tmp), &session)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedArch(_)));
        assert!(!host.ran("curl"));
    }

    #[tokio::test]
    async fn unparseable_create_output_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new();
        host.respond("cloudflared tunnel create", 0, "tunnel made, id withheld", "");
        let prompter = ScriptedPrompter::new(&[true], &[]);
        let session = SessionConfig::public("claw.example.com", "/data");
        let err = provision(&host, &prompter, &layout(&tmp), &session)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tunnel made, id withheld"));
    }
}
