//! Core ticket types shared by the router, queues, pipeline and store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for tickets
pub type TicketId = String;

/// Ticket priority. `P1` is the highest.
///
/// The derived ordering follows declaration order, so `P1 < P2 < P3` and a
/// sort ascending puts the most urgent ticket first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    P3,
}

impl Priority {
    /// All priorities, most urgent first
    pub const ALL: [Priority; 3] = [Priority::P1, Priority::P2, Priority::P3];

    /// Zero-based tier index (P1 = 0)
    pub fn index(self) -> usize {
        match self {
            Self::P1 => 0,
            Self::P2 => 1,
            Self::P3 => 2,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::P2
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P1 => write!(f, "P1"),
            Self::P2 => write!(f, "P2"),
            Self::P3 => write!(f, "P3"),
        }
    }
}

/// Classifies the intent of a ticket; also the deliverable type used by the
/// verifier's content checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    BossDirective,
    /// Clarification / communication request
    GhostTicket,
    PlanGeneration,
    DesignChange,
    CodeGeneration,
    Verification,
    #[default]
    #[serde(other)]
    Unclassified,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BossDirective => write!(f, "boss_directive"),
            Self::GhostTicket => write!(f, "ghost_ticket"),
            Self::PlanGeneration => write!(f, "plan_generation"),
            Self::DesignChange => write!(f, "design_change"),
            Self::CodeGeneration => write!(f, "code_generation"),
            Self::Verification => write!(f, "verification"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Coarse ticket lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InReview,
    Resolved,
    Escalated,
    OnHold,
}

impl TicketStatus {
    /// Statuses that are never (re-)admitted to a queue.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Resolved | Self::Escalated | Self::OnHold)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InReview => write!(f, "in_review"),
            Self::Resolved => write!(f, "resolved"),
            Self::Escalated => write!(f, "escalated"),
            Self::OnHold => write!(f, "on_hold"),
        }
    }
}

/// Fine-grained processing state, tracked alongside [`TicketStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Idle,
    Queued,
    Processing,
    /// A human or external actor must claim the ticket next.
    Holding,
    /// Escalation completed; a human must act.
    AwaitingUser,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Holding => write!(f, "holding"),
            Self::AwaitingUser => write!(f, "awaiting_user"),
        }
    }
}

/// A routed unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub operation_type: OperationType,
    #[serde(default)]
    pub is_ghost: bool,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub processing_status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_ticket_id: Option<TicketId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Text handed to the specialist: the body, or the title when the body is blank.
    pub fn prompt_text(&self) -> &str {
        if self.body.trim().is_empty() {
            &self.title
        } else {
            &self.body
        }
    }

    /// Communication-style tickets go through the clarity pipeline.
    pub fn is_communication(&self) -> bool {
        self.is_ghost || self.operation_type == OperationType::GhostTicket
    }

    /// Supervisor-only directive
    pub fn is_directive(&self) -> bool {
        self.operation_type == OperationType::BossDirective
    }

    /// Whether acceptance criteria were supplied (and are not blank)
    pub fn has_acceptance_criteria(&self) -> bool {
        self.acceptance_criteria
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &TicketUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(processing) = update.processing_status {
            self.processing_status = processing;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(ref body) = update.body {
            self.body = body.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// Fields for creating a ticket; the store assigns the id.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub operation_type: OperationType,
    pub is_ghost: bool,
    pub acceptance_criteria: Option<String>,
    pub task_id: Option<String>,
    pub plan_id: Option<String>,
    pub parent_ticket_id: Option<TicketId>,
}

impl NewTicket {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn operation(mut self, operation_type: OperationType) -> Self {
        self.operation_type = operation_type;
        self
    }

    pub fn ghost(mut self) -> Self {
        self.is_ghost = true;
        self
    }

    pub fn acceptance_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.acceptance_criteria = Some(criteria.into());
        self
    }

    pub fn task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    pub fn parent(mut self, parent_ticket_id: impl Into<String>) -> Self {
        self.parent_ticket_id = Some(parent_ticket_id.into());
        self
    }

    /// Materialize into a ticket with the given id.
    pub fn into_ticket(self, id: TicketId) -> Ticket {
        let now = Utc::now();
        Ticket {
            id,
            title: self.title,
            body: self.body,
            priority: self.priority,
            operation_type: self.operation_type,
            is_ghost: self.is_ghost,
            status: TicketStatus::Open,
            processing_status: ProcessingStatus::Idle,
            acceptance_criteria: self.acceptance_criteria,
            task_id: self.task_id,
            plan_id: self.plan_id,
            parent_ticket_id: self.parent_ticket_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial ticket update, applied atomically by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub processing_status: Option<ProcessingStatus>,
    pub priority: Option<Priority>,
    pub body: Option<String>,
}

impl TicketUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn processing(mut self, processing_status: ProcessingStatus) -> Self {
        self.processing_status = Some(processing_status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Append-only audit entry for a pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketReply {
    pub id: String,
    pub ticket_id: TicketId,
    pub author: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarity_score: Option<f32>,
    pub created_at: DateTime<Utc>,
}

impl TicketReply {
    pub fn new(
        ticket_id: impl Into<String>,
        author: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id: ticket_id.into(),
            author: author.into(),
            body: body.into(),
            clarity_score: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_clarity_score(mut self, score: f32) -> Self {
        self.clarity_score = Some(score);
        self
    }
}

/// Task record, used to resolve a ticket's owning plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

/// Plan record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
}
