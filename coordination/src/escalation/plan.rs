//! Owning-plan resolution for escalated tickets
//!
//! Best effort: store errors are logged and treated as "no plan here".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::TicketStore;
use crate::ticket::Ticket;

/// Parent links followed before giving up on the ancestor walk
pub const MAX_ANCESTOR_DEPTH: usize = 16;

/// Where the plan id came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// The ticket's own task
    Task,
    /// The ticket's direct plan link
    Ticket,
    /// A task-linked ancestor in the parent chain
    Ancestor { ticket_id: String },
    /// No link found; the store's first plan
    Fallback,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanResolution {
    pub plan_id: Option<String>,
    pub source: PlanSource,
}

impl PlanResolution {
    fn found(plan_id: String, source: PlanSource) -> Self {
        Self {
            plan_id: Some(plan_id),
            source,
        }
    }

    fn unresolved() -> Self {
        Self {
            plan_id: None,
            source: PlanSource::Unresolved,
        }
    }
}

/// Resolve the plan that owns `ticket`.
///
/// Order: own task's plan, own plan link, nearest ancestor with a task or
/// plan link, any plan in the store. Never fails.
pub async fn resolve_plan(store: &dyn TicketStore, ticket: &Ticket) -> PlanResolution {
    if let Some(plan_id) = task_plan(store, ticket).await {
        return PlanResolution::found(plan_id, PlanSource::Task);
    }
    if let Some(plan_id) = ticket.plan_id.clone() {
        return PlanResolution::found(plan_id, PlanSource::Ticket);
    }

    let mut visited = HashSet::from([ticket.id.clone()]);
    let mut parent_id = ticket.parent_ticket_id.clone();
    while let Some(id) = parent_id.take() {
        if visited.len() > MAX_ANCESTOR_DEPTH || !visited.insert(id.clone()) {
            break;
        }
        let parent = match store.get_ticket(&id).await {
            Ok(Some(parent)) => parent,
            Ok(None) => break,
            Err(e) => {
                warn!(ticket_id = %ticket.id, ancestor = %id, error = %e, "Ancestor lookup failed");
                break;
            }
        };
        if let Some(plan_id) = task_plan(store, &parent).await.or(parent.plan_id.clone()) {
            return PlanResolution::found(plan_id, PlanSource::Ancestor { ticket_id: id });
        }
        parent_id = parent.parent_ticket_id;
    }

    match store.any_plan().await {
        Ok(Some(plan)) => PlanResolution::found(plan.id, PlanSource::Fallback),
        Ok(None) => PlanResolution::unresolved(),
        Err(e) => {
            warn!(ticket_id = %ticket.id, error = %e, "Fallback plan lookup failed");
            PlanResolution::unresolved()
        }
    }
}

async fn task_plan(store: &dyn TicketStore, ticket: &Ticket) -> Option<String> {
    let task_id = ticket.task_id.as_deref()?;
    match store.get_task(task_id).await {
        Ok(task) => task.and_then(|t| t.plan_id),
        Err(e) => {
            warn!(ticket_id = %ticket.id, task_id, error = %e, "Task lookup failed");
            None
        }
    }
}
