//! Retry & Escalation
//!
//! Deterministic bookkeeping for failed tickets. The scheduler applies the
//! decisions; nothing here talks to agents.
//!
//! ```text
//! verification failed
//!     │
//!     ├─ retry_count < max_ticket_retries → retry_count += 1, ticket:retry,
//!     │                                     back into its original lane
//!     │
//!     └─ otherwise → Escalated / awaiting_user, ticket:escalated,
//!                    plan resolved best-effort (task → plan_id → ancestors → any plan)
//! ```

pub mod plan;
pub mod retry;

pub use plan::{resolve_plan, PlanResolution, PlanSource};
pub use retry::{decide_retry, RetryDecision, RetryTracker};
