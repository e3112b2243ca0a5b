use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("This installer must run as root (try: sudo clawstack)")]
    NotRoot,

    #[error("Unsupported platform '{found}' (only {expected} is supported)")]
    UnsupportedPlatform { found: String, expected: String },

    #[error("Unsupported {distro} version {found} (minimum is {minimum})")]
    UnsupportedVersion {
        distro: String,
        found: String,
        minimum: String,
    },

    #[error("Unsupported CPU architecture: {0}")]
    UnsupportedArch(String),

    #[error("Storage directory {0} is required but was not created")]
    StorageDeclined(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Command `{command}` exited with status {code}:\n{output}")]
    Command {
        command: String,
        code: i32,
        output: String,
    },

    #[error("Could not find a tunnel id in cloudflared output:\n{output}")]
    TunnelIdNotFound { output: String },

    #[error("Gateway configuration error: {0}")]
    GatewayConfig(String),

    #[error("Provision error ({phase}): {message}")]
    Provision { phase: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AppError {
    /// Wrap any error with the phase it happened in.
    pub fn provision(phase: &str, err: impl std::fmt::Display) -> Self {
        AppError::Provision {
            phase: phase.to_string(),
            message: err.to_string(),
        }
    }
}
