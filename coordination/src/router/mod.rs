//! Ticket Router
//!
//! Maps a ticket's attributes to the agent that should work it and the
//! queue lane it waits in. Pure and synchronous.
//!
//! # Decision Table
//!
//! ```text
//! Precedence | Match                                        | Lane       | Agent
//! -----------|----------------------------------------------|------------|-------------
//! 1          | operation_type = boss_directive              | supervisor | boss
//! 2          | title "Phase: Configuration…"                | -          | skip
//! 3          | is_ghost / operation_type = ghost_ticket     | general    | clarity
//! 4          | title "Phase: Task Generation|Design|Data Model" | general | planning
//! 5          | title "Coding:" / "Rework:"                  | general    | coding
//! 6          | title "Verify:"                              | general    | verification
//! 7          | operation_type = code_generation             | general    | coding
//! 8          | operation_type = verification                | general    | verification
//! 9          | operation_type = design_change               | general    | planning
//! 10         | default                                      | general    | planning
//! ```
//!
//! General-lane tickets then pass the AI-level gate ([`ai_level`]).

pub mod ai_level;

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::ticket::{OperationType, Ticket};

pub use ai_level::{automation_allowed, parse_ai_level};

/// Queue lane a ticket waits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Parallel pool for ordinary work
    General,
    /// Serial lane for supervisor directives
    Supervisor,
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Supervisor => write!(f, "supervisor"),
        }
    }
}

/// Router output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Dispatch to `agent` via `lane`
    Dispatch { lane: Lane, agent: Agent },
    /// Explicit drop: no agent is invoked and the ticket is left untouched
    Skip,
}

impl RouteDecision {
    pub fn lane(&self) -> Option<Lane> {
        match self {
            Self::Dispatch { lane, .. } => Some(*lane),
            Self::Skip => None,
        }
    }

    pub fn agent(&self) -> Option<Agent> {
        match self {
            Self::Dispatch { agent, .. } => Some(*agent),
            Self::Skip => None,
        }
    }

    fn general(agent: Agent) -> Self {
        Self::Dispatch {
            lane: Lane::General,
            agent,
        }
    }
}

const SKIP_PREFIX: &str = "Phase: Configuration";
const PLANNING_PREFIXES: [&str; 3] = ["Phase: Task Generation", "Phase: Design", "Phase: Data Model"];
const CODING_PREFIXES: [&str; 2] = ["Coding:", "Rework:"];
const VERIFY_PREFIX: &str = "Verify:";

/// Route a ticket. Rules are evaluated in precedence order; first match wins.
pub fn route(ticket: &Ticket) -> RouteDecision {
    if ticket.is_directive() {
        return RouteDecision::Dispatch {
            lane: Lane::Supervisor,
            agent: Agent::Boss,
        };
    }

    let title = ticket.title.trim_start();

    if title.starts_with(SKIP_PREFIX) {
        return RouteDecision::Skip;
    }

    if ticket.is_communication() {
        return RouteDecision::general(Agent::Clarity);
    }

    if PLANNING_PREFIXES.iter().any(|p| title.starts_with(p)) {
        return RouteDecision::general(Agent::Planning);
    }
    if CODING_PREFIXES.iter().any(|p| title.starts_with(p)) {
        return RouteDecision::general(Agent::Coding);
    }
    if title.starts_with(VERIFY_PREFIX) {
        return RouteDecision::general(Agent::Verification);
    }

    let agent = match ticket.operation_type {
        OperationType::CodeGeneration => Agent::Coding,
        OperationType::Verification => Agent::Verification,
        OperationType::DesignChange => Agent::Planning,
        // Directive and ghost types were matched above
        OperationType::BossDirective
        | OperationType::GhostTicket
        | OperationType::PlanGeneration
        | OperationType::Unclassified => Agent::Planning,
    };
    RouteDecision::general(agent)
}
