//! In-memory ticket store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{StoreError, StoreResult, TicketStore};
use crate::ticket::{
    NewTicket, Plan, ProcessingStatus, Task, Ticket, TicketReply, TicketStatus, TicketUpdate,
};

#[derive(Default)]
struct Tables {
    tickets: HashMap<String, Ticket>,
    /// Insertion order, so queries are deterministic
    order: Vec<String>,
    replies: Vec<TicketReply>,
    tasks: HashMap<String, Task>,
    plans: Vec<Plan>,
}

/// Process-local store backed by a single `RwLock`.
///
/// Every update holds the write lock for the whole read-modify-write, which
/// gives per-ticket atomicity.
#[derive(Default)]
pub struct MemoryTicketStore {
    tables: RwLock<Tables>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed ticket, replacing any ticket with the same id.
    pub fn insert_ticket(&self, ticket: Ticket) -> StoreResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        if !tables.tickets.contains_key(&ticket.id) {
            tables.order.push(ticket.id.clone());
        }
        tables.tickets.insert(ticket.id.clone(), ticket);
        Ok(())
    }

    pub fn insert_task(&self, task: Task) -> StoreResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        tables.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn insert_plan(&self, plan: Plan) -> StoreResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        tables.plans.push(plan);
        Ok(())
    }

    /// Number of stored tickets
    pub fn len(&self) -> usize {
        self.tables.read().map(|t| t.tickets.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn create_ticket(&self, ticket: NewTicket) -> StoreResult<Ticket> {
        let id = format!("TK-{}", uuid::Uuid::new_v4().simple());
        let ticket = ticket.into_ticket(id);
        self.insert_ticket(ticket.clone())?;
        Ok(ticket)
    }

    async fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(tables.tickets.get(id).cloned())
    }

    async fn update_ticket(&self, id: &str, update: TicketUpdate) -> StoreResult<Ticket> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        let ticket = tables
            .tickets
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        ticket.apply(&update);
        Ok(ticket.clone())
    }

    async fn add_reply(&self, reply: TicketReply) -> StoreResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        if !tables.tickets.contains_key(&reply.ticket_id) {
            return Err(StoreError::NotFound(reply.ticket_id));
        }
        tables.replies.push(reply);
        Ok(())
    }

    async fn replies(&self, ticket_id: &str) -> StoreResult<Vec<TicketReply>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(tables
            .replies
            .iter()
            .filter(|r| r.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn tickets_by_status(
        &self,
        status: TicketStatus,
        processing_status: ProcessingStatus,
    ) -> StoreResult<Vec<Ticket>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(tables
            .order
            .iter()
            .filter_map(|id| tables.tickets.get(id))
            .filter(|t| t.status == status && t.processing_status == processing_status)
            .cloned()
            .collect())
    }

    async fn get_task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(tables.tasks.get(task_id).cloned())
    }

    async fn any_plan(&self) -> StoreResult<Option<Plan>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(tables.plans.first().cloned())
    }
}
