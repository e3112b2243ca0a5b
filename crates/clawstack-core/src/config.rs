//! Fixed names, ports, and host paths shared by every phase.

use std::time::Duration;

pub const SUPPORTED_DISTRO: &str = "ubuntu";
pub const MIN_DISTRO_VERSION: (u32, u32) = (22, 4);
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

pub const GATEWAY_USER: &str = "openclaw";
pub const GATEWAY_HOME: &str = "/var/lib/openclaw";
pub const GATEWAY_SRC_DIR: &str = "/opt/openclaw";
pub const GATEWAY_CONFIG_PATH: &str = "/var/lib/openclaw/.openclaw/openclaw.json";
pub const GATEWAY_ENTRYPOINT: &str = "openclaw.mjs";
pub const GATEWAY_PORT: u16 = 18789;
pub const GATEWAY_SERVICE: &str = "openclaw-gateway";
pub const GATEWAY_UNIT_PATH: &str = "/etc/systemd/system/openclaw-gateway.service";
pub const DEFAULT_GATEWAY_REPO: &str = "https://github.com/openclaw/openclaw.git";

/// Known-good release used when no tag can be discovered.
pub const FALLBACK_RELEASE_TAG: &str = "v2026.2.9";

pub const PROXY_RUNTIME_DIR: &str = "/opt/clawstack";
pub const PROXY_DATA_DIR: &str = "/var/lib/clawstack";
pub const PROXY_PORT: u16 = 8080;
pub const PROXY_SERVICE_NAME: &str = "clawstack-proxy";
pub const PROXY_HEALTH_PATH: &str = "/health";
pub const PROXY_CHAT_PATH: &str = "/v1/chat/completions";
pub const PLUGIN_NAME: &str = "clawstack-guard";
pub const PLUGIN_SUBDIR: &str = "plugin";
pub const ENV_FILE_NAME: &str = ".env";
pub const COMPOSE_TEMPLATE: &str = "docker-compose.yml";
pub const COMPOSE_RENDERED: &str = "docker-compose.deploy.yml";

/// UID:GID the proxy container runs as; owns proxy data and audit storage.
pub const CONTAINER_UID: u32 = 1000;
pub const CONTAINER_GID: u32 = 1000;

pub const DEFAULT_STORAGE_MOUNT: &str = "/home/openclaw-data";
pub const AUDIT_SUBDIR: &str = "audit";

pub const CLOUDFLARED_CONFIG_DIR: &str = "/etc/cloudflared";
pub const CLOUDFLARED_CONFIG_PATH: &str = "/etc/cloudflared/config.yml";
pub const CLOUDFLARED_ORIGIN_DIR: &str = "/root/.cloudflared";
pub const TUNNEL_NAME_PREFIX: &str = "clawstack";

pub const DOCKER_DAEMON_CONFIG: &str = "/etc/docker/daemon.json";
pub const MIN_NODE_MAJOR: u32 = 22;

pub const PROBE_ATTEMPTS: u32 = 30;
pub const PROBE_INTERVAL: Duration = Duration::from_secs(2);
pub const PROBE_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Optional third-party keys written empty so the operator can fill them in later.
pub const OPTIONAL_SECRET_KEYS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "GEMINI_API_KEY",
    "TELEGRAM_BOT_TOKEN",
    "WHATSAPP_PHONE_NUMBER",
    "SLACK_BOT_TOKEN",
];

/// Bundle entries that never get copied into the runtime directory.
pub const BUNDLE_EXCLUDES: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    ".venv",
    "__pycache__",
    ".env",
    "*.log",
];
