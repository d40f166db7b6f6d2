//! Ticket data model
//!
//! Tickets are owned by the external store. The scheduler only holds
//! references (ids) in its queues and reads/mutates tickets through
//! [`crate::store::TicketStore`].

pub mod lifecycle;
pub mod types;

pub use lifecycle::{ensure_transition, is_legal_transition, IllegalTransition};
pub use types::{
    NewTicket, OperationType, Plan, Priority, ProcessingStatus, Task, Ticket, TicketId,
    TicketReply, TicketStatus, TicketUpdate,
};
