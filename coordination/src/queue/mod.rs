//! Priority queues and admission control
//!
//! Each lane owns a [`PriorityQueue`]: strict priority order, FIFO within a
//! priority tier. The queue stores only ticket references and ordering keys;
//! the ticket itself stays in the store.

pub mod admission;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::ticket::{Priority, TicketId};

pub use admission::{Admission, AdmissionController, RejectReason};

/// The unit stored in a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub ticket_id: TicketId,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(ticket_id: impl Into<String>, priority: Priority) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            priority,
            enqueued_at: Utc::now(),
        }
    }
}

/// Priority-then-FIFO queue, one deque per priority tier.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    tiers: [VecDeque<QueueEntry>; 3],
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the back of the entry's priority tier.
    pub fn push(&mut self, entry: QueueEntry) {
        self.tiers[entry.priority.index()].push_back(entry);
    }

    /// Remove the next entry: most urgent tier, oldest first.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.tiers.iter_mut().find_map(|tier| tier.pop_front())
    }

    pub fn peek(&self) -> Option<&QueueEntry> {
        self.tiers.iter().find_map(|tier| tier.front())
    }

    /// Remove a specific ticket wherever it sits.
    pub fn remove(&mut self, ticket_id: &str) -> Option<QueueEntry> {
        for tier in self.tiers.iter_mut() {
            if let Some(pos) = tier.iter().position(|e| e.ticket_id == ticket_id) {
                return tier.remove(pos);
            }
        }
        None
    }

    /// Evict the most recently queued entry of `priority`.
    pub fn evict_newest(&mut self, priority: Priority) -> Option<QueueEntry> {
        self.tiers[priority.index()].pop_back()
    }

    pub fn contains(&self, ticket_id: &str) -> bool {
        self.iter().any(|e| e.ticket_id == ticket_id)
    }

    pub fn len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(VecDeque::is_empty)
    }

    pub fn count_at(&self, priority: Priority) -> usize {
        self.tiers[priority.index()].len()
    }

    /// Entries in dequeue order
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.tiers.iter().flat_map(|tier| tier.iter())
    }

    /// Ticket ids in dequeue order
    pub fn ticket_ids(&self) -> Vec<TicketId> {
        self.iter().map(|e| e.ticket_id.clone()).collect()
    }

    /// Drop every entry, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let n = self.len();
        for tier in self.tiers.iter_mut() {
            tier.clear();
        }
        n
    }
}
