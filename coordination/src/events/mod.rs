//! Event-driven coordination for the ticket scheduler
//!
//! # Event Flow
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ ticket store │────▶│  Event Bus   │────▶│  Scheduler   │
//! │ task runner  │     │  (broadcast) │     │  listener    │
//! └──────────────┘     └──────▲───────┘     └──────┬───────┘
//!                             │                    │
//!                             └────────────────────┘
//!                          ticket:queued, ticket:retry, ...
//! ```
//!
//! The scheduler subscribes once in `start()` and drops its subscription in
//! `dispose()`. Events it emits travel on the same bus and are ignored by
//! its own listener.

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventBusExt, EventFilter, FilteredReceiver, SharedEventBus};
pub use types::SchedulerEvent;
