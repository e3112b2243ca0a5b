use crate::phase::Phase;
use crate::session::{AuthoritativeToken, SessionConfig, TunnelResource};
use std::fmt;

/// A non-fatal problem surfaced in the final summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub phase: Phase,
    pub message: String,
    /// Commands or endpoints the operator can use to diagnose by hand.
    pub hints: Vec<String>,
}

impl Warning {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            hints: Vec::new(),
        }
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

/// How far readiness verification got.
///
/// `Degraded` is terminal and reachable from any polling state; it never
/// fails the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    NotStarted,
    ProcessStarted,
    PortBound,
    HealthOk,
    E2eVerified,
    Degraded,
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadinessState::NotStarted => "not started",
            ReadinessState::ProcessStarted => "gateway process started",
            ReadinessState::PortBound => "gateway port bound",
            ReadinessState::HealthOk => "both tiers healthy",
            ReadinessState::E2eVerified => "end-to-end path verified",
            ReadinessState::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

/// Everything the operator needs once the run finishes.
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub session: SessionConfig,
    pub tunnel: Option<TunnelResource>,
    pub release_tag: String,
    pub gateway_token: AuthoritativeToken,
    pub gateway_url: String,
    pub proxy_url: String,
    pub readiness: ReadinessState,
    pub warnings: Vec<Warning>,
}

impl DeployReport {
    pub fn is_degraded(&self) -> bool {
        self.readiness != ReadinessState::E2eVerified || !self.warnings.is_empty()
    }
}
