use std::fmt;

/// The fixed, totally ordered provisioning steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Preflight,
    Configure,
    Tunnel,
    Dependencies,
    Identity,
    Application,
    Onboarding,
    Environment,
    GatewayService,
    Containers,
    Verify,
    Summary,
}

impl Phase {
    pub const ALL: [Phase; 12] = [
        Phase::Preflight,
        Phase::Configure,
        Phase::Tunnel,
        Phase::Dependencies,
        Phase::Identity,
        Phase::Application,
        Phase::Onboarding,
        Phase::Environment,
        Phase::GatewayService,
        Phase::Containers,
        Phase::Verify,
        Phase::Summary,
    ];

    /// 1-based position in [`Phase::ALL`].
    pub fn number(self) -> usize {
        Phase::ALL
            .iter()
            .position(|p| *p == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    pub fn title(self) -> &'static str {
        match self {
            Phase::Preflight => "Checking host preconditions",
            Phase::Configure => "Collecting deployment settings",
            Phase::Tunnel => "Provisioning Cloudflare Tunnel",
            Phase::Dependencies => "Installing system dependencies",
            Phase::Identity => "Creating service account and directories",
            Phase::Application => "Deploying application sources",
            Phase::Onboarding => "Onboarding the OpenClaw gateway",
            Phase::Environment => "Writing proxy environment file",
            Phase::GatewayService => "Installing gateway service",
            Phase::Containers => "Building and starting the proxy container",
            Phase::Verify => "Verifying readiness",
            Phase::Summary => "Done",
        }
    }

    /// Only the tunnel may be skipped.
    pub fn is_optional(self) -> bool {
        matches!(self, Phase::Tunnel)
    }

    pub fn header(self) -> String {
        format!(
            "[Step {}/{}] {}...",
            self.number(),
            Phase::ALL.len(),
            self.title()
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_is_one_based_and_ordered() {
        assert_eq!(Phase::Preflight.number(), 1);
        assert_eq!(Phase::Summary.number(), 12);
        assert!(Phase::Onboarding.number() < Phase::Environment.number());
        assert_eq!(
            Phase::Tunnel.header(),
            "[Step 3/12] Provisioning Cloudflare Tunnel..."
        );
    }

    #[test]
    fn only_tunnel_is_optional() {
        let optional: Vec<_> = Phase::ALL.iter().filter(|p| p.is_optional()).collect();
        assert_eq!(optional, vec![&Phase::Tunnel]);
    }
}
