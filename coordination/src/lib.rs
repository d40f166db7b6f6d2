//! Ticket Coordination Library
//!
//! Event-driven scheduling for an agent-driven delivery pipeline:
//! - Routing of tickets to specialist agents and queue lanes
//! - Priority admission with a global ticket limit and P1 preemption
//! - A bounded general lane plus a serial supervisor lane for directives
//! - Verification gates, bounded retries and escalation to a human
//! - Restart recovery of tickets stuck mid-pipeline
//! - A boss supervisor with a startup health check and an idle watchdog
//!
//! The ticket store and the agent layer are collaborators behind
//! [`TicketStore`] and [`AgentInvoker`]; [`MemoryTicketStore`] is the
//! in-process store.
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = TicketScheduler::new(config, store, agents, bus.clone(), log);
//! scheduler.start().await?;
//! bus.publish(SchedulerEvent::ticket_created(ticket.id));
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod agent;
pub mod config;
pub mod escalation;
pub mod events;
pub mod log_sink;
pub mod queue;
pub mod router;
pub mod scheduler;
pub mod store;
pub mod supervisor;
pub mod ticket;
pub mod verifier;

// Re-export key ticket types
pub use ticket::{
    NewTicket, OperationType, Plan, Priority, ProcessingStatus, Task, Ticket, TicketId,
    TicketReply, TicketStatus, TicketUpdate,
};

// Re-export collaborator contracts
pub use agent::{
    Agent, AgentAction, AgentContext, AgentError, AgentInvoker, AgentResponse, AgentResult,
    SharedAgentInvoker,
};
pub use store::{MemoryTicketStore, SharedTicketStore, StoreError, StoreResult, TicketStore};

// Re-export scheduler types
pub use scheduler::{
    PipelineOutcome, SchedulerError, SchedulerResult, SchedulerStatus, TicketScheduler,
};
pub use supervisor::{BossSupervisor, IdleWatchdog};

pub use config::{AiMode, SchedulerConfig};
pub use events::{EventBus, EventBusExt, EventFilter, SchedulerEvent, SharedEventBus};
pub use log_sink::{LogSink, MemoryLogSink, NoopLogSink, SharedLogSink};
pub use queue::{Admission, RejectReason};
pub use router::{route, Lane, RouteDecision};
pub use verifier::{GateOutcome, Verification, VerificationPolicy, Verifier};
