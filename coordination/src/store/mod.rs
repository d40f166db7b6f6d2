//! Ticket store collaborator
//!
//! The store is the single source of truth for tickets. The scheduler only
//! needs the operations below; persistence is up to the implementor.
//! [`MemoryTicketStore`] is the in-process reference implementation.

pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::ticket::{
    NewTicket, Plan, ProcessingStatus, Task, Ticket, TicketReply, TicketStatus, TicketUpdate,
};

pub use memory::MemoryTicketStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Ticket not found: {0}")]
    NotFound(String),

    #[error("Conflicting write for {0}")]
    Conflict(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to a ticket store
pub type SharedTicketStore = Arc<dyn TicketStore>;

/// Operations the scheduler performs against the ticket store.
///
/// `update_ticket` must apply the whole [`TicketUpdate`] atomically for a
/// given ticket id so two writers never interleave a read-modify-write.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create_ticket(&self, ticket: NewTicket) -> StoreResult<Ticket>;

    async fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>>;

    /// Apply a partial update and return the updated ticket.
    async fn update_ticket(&self, id: &str, update: TicketUpdate) -> StoreResult<Ticket>;

    async fn add_reply(&self, reply: TicketReply) -> StoreResult<()>;

    /// Replies for a ticket, oldest first.
    async fn replies(&self, ticket_id: &str) -> StoreResult<Vec<TicketReply>>;

    /// Tickets matching both statuses; used by recovery.
    async fn tickets_by_status(
        &self,
        status: TicketStatus,
        processing_status: ProcessingStatus,
    ) -> StoreResult<Vec<Ticket>>;

    async fn get_task(&self, task_id: &str) -> StoreResult<Option<Task>>;

    /// Any available plan, used as the last-resort escalation target.
    async fn any_plan(&self) -> StoreResult<Option<Plan>>;
}
