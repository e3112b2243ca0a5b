use crate::config;
use crate::report::Warning;
use crate::secrets;
use std::fmt;
use std::path::{Path, PathBuf};

/// Operator decisions collected once at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub use_public_tunnel: bool,
    pub domain_name: Option<String>,
    pub storage_mount_path: PathBuf,
}

impl SessionConfig {
    pub fn local(storage_mount_path: impl Into<PathBuf>) -> Self {
        Self {
            use_public_tunnel: false,
            domain_name: None,
            storage_mount_path: storage_mount_path.into(),
        }
    }

    pub fn public(domain: impl Into<String>, storage_mount_path: impl Into<PathBuf>) -> Self {
        Self {
            use_public_tunnel: true,
            domain_name: Some(domain.into()),
            storage_mount_path: storage_mount_path.into(),
        }
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.storage_mount_path.join(config::AUDIT_SUBDIR)
    }

    pub fn uses_default_storage(&self) -> bool {
        self.storage_mount_path == Path::new(config::DEFAULT_STORAGE_MOUNT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub hostname: String,
    pub upstream_url: String,
}

/// A named Cloudflare Tunnel and the routing written for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelResource {
    pub name: String,
    pub id: String,
    pub credentials_file: PathBuf,
    pub ingress: IngressRule,
    /// True when an existing tunnel was picked up instead of created.
    pub reused: bool,
}

/// Gateway token offered to onboarding. Onboarding may persist something else.
#[derive(Clone, PartialEq, Eq)]
pub struct ProposedToken(String);

impl ProposedToken {
    pub fn generate() -> Self {
        Self(secrets::generate_token())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProposedToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Gateway token as persisted in the gateway's configuration document.
///
/// Build this only from a value read back from that document; every
/// consumer downstream of onboarding takes this type, never [`ProposedToken`].
#[derive(Clone, PartialEq, Eq)]
pub struct AuthoritativeToken(String);

impl AuthoritativeToken {
    pub fn from_persisted(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

/// Secret shared only with the proxy tier.
#[derive(Clone, PartialEq, Eq)]
pub struct GovernanceSecret(String);

impl GovernanceSecret {
    pub fn generate() -> Self {
        Self(secrets::generate_token())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

macro_rules! redacted_debug {
    ($($ty:ident),*) => {
        $(impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "(<redacted>)"))
            }
        })*
    };
}

redacted_debug!(ProposedToken, AuthoritativeToken, GovernanceSecret);

/// Facts gathered as the run moves forward.
///
/// Each phase reads what it needs and hands new facts back through the
/// `with_*` methods, which consume the context and return the next one.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub session: SessionConfig,
    pub tunnel: Option<TunnelResource>,
    pub release_tag: Option<String>,
    pub gateway_token: Option<AuthoritativeToken>,
    pub governance_secret: Option<GovernanceSecret>,
    pub warnings: Vec<Warning>,
}

impl RunContext {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            tunnel: None,
            release_tag: None,
            gateway_token: None,
            governance_secret: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_tunnel(self, tunnel: Option<TunnelResource>) -> Self {
        Self { tunnel, ..self }
    }

    pub fn with_release(self, tag: String) -> Self {
        Self {
            release_tag: Some(tag),
            ..self
        }
    }

    pub fn with_gateway_token(self, token: AuthoritativeToken) -> Self {
        Self {
            gateway_token: Some(token),
            ..self
        }
    }

    pub fn with_governance_secret(self, secret: GovernanceSecret) -> Self {
        Self {
            governance_secret: Some(secret),
            ..self
        }
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = Warning>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}
