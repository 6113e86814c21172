//! Composite health verification for the worker.
//!
//! Verification runs three short-circuiting stages: process presence, port
//! listen state and an application probe. Each stage can only lower
//! confidence. Lenient verification records a non-listening port as a warning
//! and carries on; strict verification treats it as fatal.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::system::{HttpProbe, PortTable, ProbeOutcome, ProcessTable};

pub(crate) const HEALTH_TARGET: &str = "warden::health";

/// Tri-state health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// The observable state could not be read.
    Unknown,
    /// The worker is absent or not serving.
    Unhealthy,
    /// The worker is running; warnings may qualify the verdict.
    Healthy,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Unhealthy => f.write_str("unhealthy"),
            Self::Healthy => f.write_str("healthy"),
        }
    }
}

/// How a non-listening port affects the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// A closed port alone makes the worker unhealthy.
    Strict,
    /// A closed port is recorded as a warning.
    #[default]
    Lenient,
}

/// Observation that lowered confidence without failing verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationWarning {
    /// The worker port did not accept connections.
    #[error("port {port} is not listening")]
    PortNotListening {
        /// Worker port.
        port: u16,
    },
    /// The probe answered with a non-success status.
    #[error("probe answered with HTTP {code}")]
    ProbeStatus {
        /// HTTP status code.
        code: u16,
    },
    /// No probing capability is available.
    #[error("application probe unavailable")]
    ProbeUnavailable,
}

/// Result of one verification pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    health: Health,
    diagnostic: String,
    warnings: Vec<VerificationWarning>,
    completed_units: Option<usize>,
}

impl HealthStatus {
    fn new(
        health: Health,
        diagnostic: impl Into<String>,
        warnings: Vec<VerificationWarning>,
    ) -> Self {
        Self {
            health,
            diagnostic: diagnostic.into(),
            warnings,
            completed_units: None,
        }
    }

    /// The verdict.
    #[must_use]
    pub const fn health(&self) -> Health {
        self.health
    }

    /// Reports whether the verdict is [`Health::Healthy`].
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.health == Health::Healthy
    }

    /// Human-readable explanation of the verdict.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }

    /// Warnings recorded while verifying.
    #[must_use]
    pub fn warnings(&self) -> &[VerificationWarning] {
        &self.warnings
    }

    /// Completed units of work parsed from the session log, when healthy.
    #[must_use]
    pub const fn completed_units(&self) -> Option<usize> {
        self.completed_units
    }

    /// Attaches the completed-unit count. Ignored unless healthy.
    #[must_use]
    pub fn with_completed_units(mut self, count: usize) -> Self {
        if self.is_healthy() {
            self.completed_units = Some(count);
        }
        self
    }
}

/// What to verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthTarget {
    /// Command-line fragment identifying the worker.
    pub process_tag: String,
    /// Port the worker listens on.
    pub port: u16,
    /// URL of the application status endpoint.
    pub probe_url: String,
    /// Probe timeout.
    pub timeout: Duration,
}

/// Runs the staged verification against the host capabilities.
#[derive(Clone)]
pub struct HealthVerifier {
    processes: Arc<dyn ProcessTable>,
    ports: Arc<dyn PortTable>,
    probe: Arc<dyn HttpProbe>,
}

impl fmt::Debug for HealthVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthVerifier").finish_non_exhaustive()
    }
}

impl HealthVerifier {
    /// Builds a verifier over the given capabilities.
    #[must_use]
    pub fn new(
        processes: Arc<dyn ProcessTable>,
        ports: Arc<dyn PortTable>,
        probe: Arc<dyn HttpProbe>,
    ) -> Self {
        Self {
            processes,
            ports,
            probe,
        }
    }

    /// Verifies `target` and returns the verdict.
    #[must_use]
    pub fn check(&self, target: &HealthTarget, strictness: Strictness) -> HealthStatus {
        let status = self.evaluate(target, strictness);
        info!(
            target: HEALTH_TARGET,
            health = %status.health,
            diagnostic = %status.diagnostic,
            warnings = status.warnings.len(),
            ?strictness,
            "health verified"
        );
        status
    }

    fn evaluate(&self, target: &HealthTarget, strictness: Strictness) -> HealthStatus {
        let pids = match self.processes.find(&target.process_tag) {
            Ok(pids) => pids,
            Err(error) => {
                return HealthStatus::new(Health::Unknown, error.to_string(), Vec::new());
            }
        };
        if pids.is_empty() {
            return HealthStatus::new(Health::Unhealthy, "process not running", Vec::new());
        }
        debug!(target: HEALTH_TARGET, ?pids, "worker process present");

        let mut warnings = Vec::new();
        if !self.ports.is_listening(target.port) {
            match strictness {
                Strictness::Strict => {
                    return HealthStatus::new(Health::Unhealthy, "port not listening", warnings);
                }
                Strictness::Lenient => {
                    warnings.push(VerificationWarning::PortNotListening { port: target.port });
                }
            }
        }

        match self.probe.probe(&target.probe_url, target.timeout) {
            ProbeOutcome::Status(code) if (200..300).contains(&code) => {
                HealthStatus::new(Health::Healthy, "running", warnings)
            }
            ProbeOutcome::Status(code) => {
                warnings.push(VerificationWarning::ProbeStatus { code });
                HealthStatus::new(
                    Health::Healthy,
                    format!("running, abnormal response (HTTP {code})"),
                    warnings,
                )
            }
            ProbeOutcome::Unreachable(reason) => HealthStatus::new(
                Health::Unhealthy,
                format!("probe unreachable: {reason}"),
                warnings,
            ),
            ProbeOutcome::Unavailable => {
                warnings.push(VerificationWarning::ProbeUnavailable);
                HealthStatus::new(Health::Healthy, "running, unverified", warnings)
            }
        }
    }
}
