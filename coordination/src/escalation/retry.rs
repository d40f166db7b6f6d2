//! Retry bookkeeping

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ticket::TicketId;

/// What to do with a ticket that just failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryDecision {
    /// Re-admit; `attempt` is the new retry count (1-indexed)
    Retry { attempt: u32, max_retries: u32 },
    /// Bound exhausted; hand off to a human
    Escalate { retries: u32 },
}

/// Pure decision for a ticket that has already been retried `retry_count` times.
pub fn decide_retry(retry_count: u32, max_retries: u32) -> RetryDecision {
    if retry_count < max_retries {
        RetryDecision::Retry {
            attempt: retry_count + 1,
            max_retries,
        }
    } else {
        RetryDecision::Escalate {
            retries: retry_count,
        }
    }
}

/// Per-ticket retry counters, kept by the scheduler across attempts.
#[derive(Debug, Default)]
pub struct RetryTracker {
    counts: HashMap<TicketId, u32>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure and decide. A `Retry` decision increments the counter;
    /// an `Escalate` decision forgets the ticket.
    pub fn record_failure(&mut self, ticket_id: &str, max_retries: u32) -> RetryDecision {
        let count = self.count(ticket_id);
        let decision = decide_retry(count, max_retries);
        match decision {
            RetryDecision::Retry { attempt, .. } => {
                self.counts.insert(ticket_id.to_string(), attempt);
            }
            RetryDecision::Escalate { .. } => {
                self.counts.remove(ticket_id);
            }
        }
        decision
    }

    pub fn count(&self, ticket_id: &str) -> u32 {
        self.counts.get(ticket_id).copied().unwrap_or(0)
    }

    /// Forget a ticket (after it resolves)
    pub fn clear(&mut self, ticket_id: &str) {
        self.counts.remove(ticket_id);
    }

    /// Tickets with at least one retry in flight
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
