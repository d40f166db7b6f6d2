//! Verifier: scores a pipeline's output against the ticket's rubric
//!
//! Deterministic: no agent calls happen here.
//!
//! ```text
//! Policy         | Threshold                     | Content check
//! ---------------|-------------------------------|------------------------------
//! Communication  | clarity_auto_resolve_score    | none
//! WorkTicket     | clarity_clarification_score   | per deliverable type, only
//!                |                               | when acceptance criteria exist
//! Directive      | clarity_clarification_score   | none
//! ```

pub mod content;

use serde::{Deserialize, Serialize};

use crate::agent::AgentResponse;
use crate::config::SchedulerConfig;
use crate::ticket::Ticket;

pub use content::{deliverable_check, has_code, has_component_mention, has_task_language};

/// Outcome of the deliverable content gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Passed,
    Failed,
    /// Not inspected (no acceptance criteria, or no check for this policy)
    Skipped,
}

impl GateOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed | Self::Skipped)
    }
}

impl std::fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "PASS"),
            Self::Failed => write!(f, "FAIL"),
            Self::Skipped => write!(f, "SKIP"),
        }
    }
}

/// Which rubric a ticket is verified against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPolicy {
    Communication,
    WorkTicket,
    Directive,
}

impl VerificationPolicy {
    pub fn for_ticket(ticket: &Ticket) -> Self {
        if ticket.is_directive() {
            Self::Directive
        } else if ticket.is_communication() {
            Self::Communication
        } else {
            Self::WorkTicket
        }
    }
}

/// Verification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub passed: bool,
    pub policy: VerificationPolicy,
    pub confidence: f32,
    pub threshold: f32,
    pub content: GateOutcome,
    pub reason: String,
}

/// Thresholds snapshot taken from the config at decision time
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    auto_resolve_score: f32,
    clarification_score: f32,
}

impl Verifier {
    pub fn new(auto_resolve_score: f32, clarification_score: f32) -> Self {
        Self {
            auto_resolve_score,
            clarification_score,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(
            config.clarity_auto_resolve_score,
            config.clarity_clarification_score,
        )
    }

    /// Verify a specialist (or boss) response for `ticket`.
    pub fn verify(&self, ticket: &Ticket, response: &AgentResponse) -> Verification {
        let policy = VerificationPolicy::for_ticket(ticket);
        let confidence = response.confidence();

        let (threshold, content) = match policy {
            VerificationPolicy::Communication => (self.auto_resolve_score, GateOutcome::Skipped),
            VerificationPolicy::Directive => (self.clarification_score, GateOutcome::Skipped),
            VerificationPolicy::WorkTicket => {
                let content = if ticket.has_acceptance_criteria() {
                    deliverable_check(ticket.operation_type, &response.content)
                } else {
                    GateOutcome::Skipped
                };
                (self.clarification_score, content)
            }
        };

        let confidence_ok = confidence >= threshold;
        let passed = confidence_ok && content.is_passed();

        let reason = if !confidence_ok {
            format!("confidence {confidence:.0} below threshold {threshold:.0}")
        } else if content == GateOutcome::Failed {
            format!(
                "output does not meet {} deliverable check",
                ticket.operation_type
            )
        } else {
            format!("confidence {confidence:.0} >= {threshold:.0}, content {content}")
        };

        Verification {
            passed,
            policy,
            confidence,
            threshold,
            content,
            reason,
        }
    }
}
