//! Event types for ticket scheduling
//!
//! The first group is consumed by the scheduler (ticket and task lifecycle
//! notifications from the rest of the system); the second group is emitted
//! by it. Consumed events stamp themselves on arrival when the sender
//! omits `timestamp`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::router::Lane;
use crate::ticket::{Priority, TicketId};

/// All scheduler-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SchedulerEvent {
    // ── Consumed ────────────────────────────────────────────────────────────
    /// A ticket was created; triggers admission
    #[serde(rename = "ticket:created")]
    TicketCreated {
        ticket_id: Option<TicketId>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// A blocked ticket became workable; triggers admission
    #[serde(rename = "ticket:unblocked")]
    TicketUnblocked {
        ticket_id: Option<TicketId>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "ticket:updated")]
    TicketUpdated {
        ticket_id: Option<TicketId>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "ticket:resolved")]
    TicketResolved {
        ticket_id: Option<TicketId>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "task:started")]
    TaskStarted {
        task_id: Option<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "task:completed")]
    TaskCompleted {
        task_id: Option<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "task:verified")]
    TaskVerified {
        task_id: Option<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "agent:completed")]
    AgentCompleted {
        agent: Option<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    // ── Emitted ─────────────────────────────────────────────────────────────
    /// A ticket entered a queue
    #[serde(rename = "ticket:queued")]
    TicketQueued {
        ticket_id: TicketId,
        lane: Lane,
        priority: Priority,
        timestamp: DateTime<Utc>,
    },

    /// A slot picked the ticket up
    #[serde(rename = "ticket:processing_started")]
    ProcessingStarted {
        ticket_id: TicketId,
        agent: Agent,
        lane: Lane,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "ticket:processing_completed")]
    ProcessingCompleted {
        ticket_id: TicketId,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "ticket:verification_passed")]
    VerificationPassed {
        ticket_id: TicketId,
        confidence: f32,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "ticket:verification_failed")]
    VerificationFailed {
        ticket_id: TicketId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Ticket re-admitted after a failure
    #[serde(rename = "ticket:retry")]
    TicketRetry {
        ticket_id: TicketId,
        attempt: u32,
        max_retries: u32,
        timestamp: DateTime<Utc>,
    },

    /// Ticket handed to a human
    #[serde(rename = "ticket:escalated")]
    TicketEscalated {
        ticket_id: TicketId,
        plan_id: Option<String>,
        retries: u32,
        timestamp: DateTime<Utc>,
    },

    /// The idle countdown elapsed while nothing was executing
    #[serde(rename = "boss:idle_watchdog_triggered")]
    IdleWatchdogTriggered {
        idle_minutes: u64,
        timestamp: DateTime<Utc>,
    },
}

impl SchedulerEvent {
    /// `ticket:created` for the given id
    pub fn ticket_created(ticket_id: impl Into<String>) -> Self {
        Self::TicketCreated {
            ticket_id: Some(ticket_id.into()),
            timestamp: Utc::now(),
        }
    }

    /// `ticket:unblocked` for the given id
    pub fn ticket_unblocked(ticket_id: impl Into<String>) -> Self {
        Self::TicketUnblocked {
            ticket_id: Some(ticket_id.into()),
            timestamp: Utc::now(),
        }
    }

    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::TicketCreated { timestamp, .. }
            | Self::TicketUnblocked { timestamp, .. }
            | Self::TicketUpdated { timestamp, .. }
            | Self::TicketResolved { timestamp, .. }
            | Self::TaskStarted { timestamp, .. }
            | Self::TaskCompleted { timestamp, .. }
            | Self::TaskVerified { timestamp, .. }
            | Self::AgentCompleted { timestamp, .. }
            | Self::TicketQueued { timestamp, .. }
            | Self::ProcessingStarted { timestamp, .. }
            | Self::ProcessingCompleted { timestamp, .. }
            | Self::VerificationPassed { timestamp, .. }
            | Self::VerificationFailed { timestamp, .. }
            | Self::TicketRetry { timestamp, .. }
            | Self::TicketEscalated { timestamp, .. }
            | Self::IdleWatchdogTriggered { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TicketCreated { .. } => "ticket:created",
            Self::TicketUnblocked { .. } => "ticket:unblocked",
            Self::TicketUpdated { .. } => "ticket:updated",
            Self::TicketResolved { .. } => "ticket:resolved",
            Self::TaskStarted { .. } => "task:started",
            Self::TaskCompleted { .. } => "task:completed",
            Self::TaskVerified { .. } => "task:verified",
            Self::AgentCompleted { .. } => "agent:completed",
            Self::TicketQueued { .. } => "ticket:queued",
            Self::ProcessingStarted { .. } => "ticket:processing_started",
            Self::ProcessingCompleted { .. } => "ticket:processing_completed",
            Self::VerificationPassed { .. } => "ticket:verification_passed",
            Self::VerificationFailed { .. } => "ticket:verification_failed",
            Self::TicketRetry { .. } => "ticket:retry",
            Self::TicketEscalated { .. } => "ticket:escalated",
            Self::IdleWatchdogTriggered { .. } => "boss:idle_watchdog_triggered",
        }
    }

    /// Get the ticket ID if this event is ticket-scoped
    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            Self::TicketCreated { ticket_id, .. }
            | Self::TicketUnblocked { ticket_id, .. }
            | Self::TicketUpdated { ticket_id, .. }
            | Self::TicketResolved { ticket_id, .. } => ticket_id.as_deref(),
            Self::TicketQueued { ticket_id, .. }
            | Self::ProcessingStarted { ticket_id, .. }
            | Self::ProcessingCompleted { ticket_id, .. }
            | Self::VerificationPassed { ticket_id, .. }
            | Self::VerificationFailed { ticket_id, .. }
            | Self::TicketRetry { ticket_id, .. }
            | Self::TicketEscalated { ticket_id, .. } => Some(ticket_id),
            _ => None,
        }
    }

    /// Events that should trigger admission
    pub fn is_admission_trigger(&self) -> bool {
        matches!(
            self,
            Self::TicketCreated { .. } | Self::TicketUnblocked { .. }
        )
    }

    /// Lifecycle events that only refresh the last-activity timestamp
    pub fn is_activity(&self) -> bool {
        matches!(
            self,
            Self::TicketUpdated { .. }
                | Self::TicketResolved { .. }
                | Self::TaskStarted { .. }
                | Self::TaskCompleted { .. }
                | Self::TaskVerified { .. }
                | Self::AgentCompleted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SchedulerEvent::TicketQueued {
            ticket_id: "t-1".to_string(),
            lane: Lane::General,
            priority: Priority::P1,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ticket:queued");
        assert_eq!(json["lane"], "general");

        let parsed: SchedulerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.event_type(), "ticket:queued");
    }

    #[test]
    fn test_consumed_event_without_ticket_id() {
        let parsed: SchedulerEvent = serde_json::from_str(
            r#"{"type":"ticket:created","ticket_id":null,"timestamp":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(parsed.is_admission_trigger());
        assert_eq!(parsed.ticket_id(), None);
    }

    #[test]
    fn test_consumed_event_without_timestamp_is_stamped() {
        let before = Utc::now();
        let parsed: SchedulerEvent =
            serde_json::from_str(r#"{"type":"ticket:created","ticket_id":"t-9"}"#).unwrap();
        assert_eq!(parsed.ticket_id(), Some("t-9"));
        assert!(parsed.timestamp() >= before);

        let unblocked: SchedulerEvent =
            serde_json::from_str(r#"{"type":"ticket:unblocked"}"#).unwrap();
        assert!(unblocked.is_admission_trigger());
        assert_eq!(unblocked.ticket_id(), None);

        let activity: SchedulerEvent =
            serde_json::from_str(r#"{"type":"agent:completed","agent":"coding"}"#).unwrap();
        assert!(activity.is_activity());
    }

    #[test]
    fn test_event_classification() {
        let created = SchedulerEvent::ticket_created("t-1");
        assert!(created.is_admission_trigger());
        assert!(!created.is_activity());
        assert_eq!(created.ticket_id(), Some("t-1"));

        let task = SchedulerEvent::TaskCompleted {
            task_id: Some("task-1".into()),
            timestamp: Utc::now(),
        };
        assert!(task.is_activity());
        assert_eq!(task.ticket_id(), None);
    }
}
