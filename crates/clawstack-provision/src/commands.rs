use async_trait::async_trait;
use clawstack_core::config::{GATEWAY_HOME, GATEWAY_USER};
use clawstack_core::AppError;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Capture stdout/stderr; stdin is closed.
    Capture,
    /// Hand the terminal to the child and block until it exits.
    Interactive,
}

/// One shell script to run on the host.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub script: String,
    pub user: Option<String>,
    /// Extra environment. Secrets go here rather than into `script`, which is logged.
    pub env: Vec<(String, String)>,
    pub mode: ExecMode,
}

impl ExecRequest {
    /// Run as root (the installer's own identity).
    pub fn root(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            user: None,
            env: Vec::new(),
            mode: ExecMode::Capture,
        }
    }

    /// Run as the gateway's service account with its home directory.
    pub fn gateway(script: impl Into<String>) -> Self {
        Self::root(script)
            .as_user(GATEWAY_USER)
            .env("HOME", GATEWAY_HOME)
    }

    pub fn as_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    pub fn interactive(mut self) -> Self {
        self.mode = ExecMode::Interactive;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// stdout followed by stderr, for parsing tools that write to either.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// The machine being provisioned.
///
/// `exec` returns `Err` only when the process could not be spawned; a
/// non-zero exit is reported through [`ExecOutput::code`].
#[async_trait]
pub trait Host: Send + Sync {
    async fn exec(&self, req: &ExecRequest) -> Result<ExecOutput, AppError>;

    /// Whether the installer runs with root privileges.
    fn is_privileged(&self) -> bool;

    /// CPU architecture as reported by `std::env::consts::ARCH`.
    fn arch(&self) -> String;
}

/// The local machine, driven through `bash -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalHost;

#[async_trait]
impl Host for LocalHost {
    async fn exec(&self, req: &ExecRequest) -> Result<ExecOutput, AppError> {
        debug!(
            user = req.user.as_deref().unwrap_or("root"),
            mode = ?req.mode,
            script = %req.script,
            "exec"
        );

        let mut cmd = match &req.user {
            Some(user) => {
                let mut c = Command::new("runuser");
                c.args(["-u", user, "--", "bash", "-c", &req.script]);
                c
            }
            None => {
                let mut c = Command::new("bash");
                c.args(["-c", &req.script]);
                c
            }
        };
        for (key, value) in &req.env {
            cmd.env(key, value);
        }

        match req.mode {
            ExecMode::Capture => {
                let out = cmd.stdin(Stdio::null()).output().await?;
                Ok(ExecOutput {
                    code: out.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                })
            }
            ExecMode::Interactive => {
                let status = cmd
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await?;
                Ok(ExecOutput {
                    code: status.code().unwrap_or(-1),
                    ..ExecOutput::default()
                })
            }
        }
    }

    fn is_privileged(&self) -> bool {
        #[cfg(unix)]
        {
            // SAFETY: geteuid has no preconditions and cannot fail.
            unsafe { libc::geteuid() == 0 }
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    fn arch(&self) -> String {
        std::env::consts::ARCH.to_string()
    }
}

/// Run a request and fail on a non-zero exit. Returns stdout.
pub async fn run(host: &dyn Host, req: ExecRequest) -> Result<String, AppError> {
    let out = host.exec(&req).await?;
    if !out.success() {
        return Err(AppError::Command {
            command: req.script,
            code: out.code,
            output: out.combined().trim().to_string(),
        });
    }
    Ok(out.stdout)
}

/// Run a script as root and fail on a non-zero exit.
pub async fn run_root(host: &dyn Host, script: &str) -> Result<String, AppError> {
    run(host, ExecRequest::root(script)).await
}

/// Run a script as the gateway account and fail on a non-zero exit.
pub async fn run_gateway(host: &dyn Host, script: &str) -> Result<String, AppError> {
    run(host, ExecRequest::gateway(script)).await
}

/// True when the script exits 0. Spawn failures count as false.
pub async fn succeeds(host: &dyn Host, script: &str) -> bool {
    matches!(host.exec(&ExecRequest::root(script)).await, Ok(out) if out.success())
}

/// `command -v` presence check.
pub async fn has_command(host: &dyn Host, name: &str) -> bool {
    succeeds(host, &format!("command -v {name} >/dev/null 2>&1")).await
}

/// Single-quote a string for bash.
pub fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
