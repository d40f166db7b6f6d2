//! Admission Controller
//!
//! Owns both lane queues and enforces the global `max_active_tickets` cap,
//! which counts every open ticket: queued in either lane plus executing.
//!
//! At capacity a `P1` ticket may preempt: the newest queued `P3` ticket in
//! the general lane is evicted to make room. Any other ticket is rejected
//! and left for the caller to retry later.

use std::fmt;

use super::{PriorityQueue, QueueEntry};
use crate::router::Lane;
use crate::ticket::{Priority, TicketStatus};

/// Outcome of an admission attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Queued normally; `position` is the zero-based dequeue position.
    Queued { lane: Lane, position: usize },
    /// Queued after evicting a lower-priority ticket
    Preempted { lane: Lane, evicted: QueueEntry },
    /// Not queued
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Why a ticket was not queued. None of these are errors.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Scheduler has been disposed
    Disposed,
    /// Already waiting in a queue or executing in a slot
    Duplicate,
    /// Resolved, escalated or on hold
    Closed(TicketStatus),
    /// Parked for an external actor
    Holding,
    /// Router drop rule
    Skipped,
    /// AI level resolved to manual
    Manual,
    /// Ticket limit reached with nothing to preempt
    CapacityReached { limit: usize },
    NotFound,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed => write!(f, "scheduler disposed"),
            Self::Duplicate => write!(f, "already queued or active"),
            Self::Closed(status) => write!(f, "ticket is {status}"),
            Self::Holding => write!(f, "ticket is holding for external action"),
            Self::Skipped => write!(f, "skipped by router"),
            Self::Manual => write!(f, "AI level is manual"),
            Self::CapacityReached { limit } => write!(f, "ticket limit reached ({limit})"),
            Self::NotFound => write!(f, "ticket not found"),
        }
    }
}

/// Both lane queues plus the capacity rule.
#[derive(Debug, Default)]
pub struct AdmissionController {
    general: PriorityQueue,
    supervisor: PriorityQueue,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, lane: Lane) -> &PriorityQueue {
        match lane {
            Lane::General => &self.general,
            Lane::Supervisor => &self.supervisor,
        }
    }

    pub fn queue_mut(&mut self, lane: Lane) -> &mut PriorityQueue {
        match lane {
            Lane::General => &mut self.general,
            Lane::Supervisor => &mut self.supervisor,
        }
    }

    /// Whether the ticket waits in either lane
    pub fn contains(&self, ticket_id: &str) -> bool {
        self.general.contains(ticket_id) || self.supervisor.contains(ticket_id)
    }

    /// Tickets waiting across both lanes
    pub fn queued_len(&self) -> usize {
        self.general.len() + self.supervisor.len()
    }

    /// Admit `entry` into `lane`, given `in_flight` tickets currently
    /// executing and the global `limit`.
    pub fn admit(
        &mut self,
        entry: QueueEntry,
        lane: Lane,
        in_flight: usize,
        limit: usize,
    ) -> Admission {
        if self.contains(&entry.ticket_id) {
            return Admission::Rejected(RejectReason::Duplicate);
        }

        let open = self.queued_len() + in_flight;
        if open < limit {
            return Admission::Queued {
                position: self.push(entry, lane),
                lane,
            };
        }

        if entry.priority == Priority::P1 {
            if let Some(evicted) = self.general.evict_newest(Priority::P3) {
                self.push(entry, lane);
                return Admission::Preempted { lane, evicted };
            }
        }

        Admission::Rejected(RejectReason::CapacityReached { limit })
    }

    /// Put a ticket back without the capacity check. Used for retries,
    /// where the ticket already counts toward the limit.
    pub fn requeue(&mut self, entry: QueueEntry, lane: Lane) -> usize {
        self.queue_mut(lane).remove(&entry.ticket_id);
        self.push(entry, lane)
    }

    /// Next ticket for `lane`, removed from its queue.
    pub fn next(&mut self, lane: Lane) -> Option<QueueEntry> {
        self.queue_mut(lane).pop()
    }

    /// Empty both lanes, returning the number of dropped entries.
    pub fn clear(&mut self) -> usize {
        self.general.clear() + self.supervisor.clear()
    }

    fn push(&mut self, entry: QueueEntry, lane: Lane) -> usize {
        let priority = entry.priority;
        let queue = self.queue_mut(lane);
        queue.push(entry);
        // Position of the entry just pushed: everything ahead of or in its tier
        Priority::ALL
            .iter()
            .filter(|p| **p <= priority)
            .map(|p| queue.count_at(*p))
            .sum::<usize>()
            - 1
    }
}
