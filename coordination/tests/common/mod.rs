//! Shared fixtures for scheduler integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Semaphore};

use ticket_coordination::{
    Agent, AgentContext, AgentError, AgentInvoker, AgentResponse, AgentResult, EventBus,
    MemoryLogSink, MemoryTicketStore, NewTicket, Plan, ProcessingStatus, SchedulerConfig,
    SchedulerEvent, SharedEventBus, SharedTicketStore, StoreResult, Task, Ticket, TicketReply,
    TicketScheduler, TicketStatus, TicketStore, TicketUpdate,
};

static TRACING: Once = Once::new();

/// Route scheduler logs to the test writer; `RUST_LOG` controls the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("ticket_coordination=debug".parse().unwrap()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Agent layer with canned responses and a call log.
///
/// A gated instance blocks every agent call until [`ScriptedAgents::open_gate`].
pub struct ScriptedAgents {
    responses: Mutex<HashMap<Agent, AgentResponse>>,
    failing: Mutex<HashSet<Agent>>,
    review: Mutex<AgentResponse>,
    /// Consumed one per review call before falling back to `review`
    review_script: Mutex<VecDeque<AgentResult<AgentResponse>>>,
    rewrite_fails: AtomicBool,
    gate: Option<Semaphore>,
    calls: Mutex<Vec<(Agent, String)>>,
    health_checks: AtomicUsize,
}

impl ScriptedAgents {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            review: Mutex::new(AgentResponse::new("Looks good").with_confidence(90.0)),
            review_script: Mutex::new(VecDeque::new()),
            rewrite_fails: AtomicBool::new(false),
            gate: None,
            calls: Mutex::new(Vec::new()),
            health_checks: AtomicUsize::new(0),
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn respond(self, agent: Agent, response: AgentResponse) -> Self {
        self.responses.lock().unwrap().insert(agent, response);
        self
    }

    pub fn fail(self, agent: Agent) -> Self {
        self.failing.lock().unwrap().insert(agent);
        self
    }

    pub fn review_with(self, response: AgentResponse) -> Self {
        *self.review.lock().unwrap() = response;
        self
    }

    pub fn review_script(self, script: Vec<AgentResult<AgentResponse>>) -> Self {
        self.review_script.lock().unwrap().extend(script);
        self
    }

    pub fn fail_rewrite(self) -> Self {
        self.rewrite_fails.store(true, Ordering::SeqCst);
        self
    }

    /// Release every blocked and future call.
    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.close();
        }
    }

    pub fn calls(&self) -> Vec<Agent> {
        self.calls.lock().unwrap().iter().map(|(a, _)| *a).collect()
    }

    pub fn messages_to(&self, agent: Agent) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == agent)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn calls_to(&self, agent: Agent) -> usize {
        self.calls().into_iter().filter(|a| *a == agent).count()
    }

    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            // Closed means open: acquire fails immediately once the gate is released
            let _ = gate.acquire().await;
        }
    }

    fn record(&self, agent: Agent, message: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((agent, message.to_string()));
    }
}

#[async_trait]
impl AgentInvoker for ScriptedAgents {
    async fn call_agent(
        &self,
        agent: Agent,
        message: &str,
        _context: &AgentContext,
    ) -> AgentResult<AgentResponse> {
        self.record(agent, message);
        self.pass_gate().await;
        if self.failing.lock().unwrap().contains(&agent) {
            return Err(AgentError::Invocation {
                agent,
                message: "model endpoint unavailable".into(),
            });
        }
        let response = self.responses.lock().unwrap().get(&agent).cloned();
        Ok(response.unwrap_or_else(|| AgentResponse::new("Done.").with_confidence(90.0)))
    }

    async fn review_ticket(&self, _ticket: &Ticket, output: &str) -> AgentResult<AgentResponse> {
        self.record(Agent::Review, output);
        self.pass_gate().await;
        if self.failing.lock().unwrap().contains(&Agent::Review) {
            return Err(AgentError::Disabled(Agent::Review));
        }
        if let Some(scripted) = self.review_script.lock().unwrap().pop_front() {
            return scripted;
        }
        Ok(self.review.lock().unwrap().clone())
    }

    async fn check_system_health(&self) -> AgentResult<AgentResponse> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        Ok(AgentResponse::new("All systems nominal").with_confidence(95.0))
    }

    async fn rewrite_for_user(&self, text: &str) -> AgentResult<String> {
        if self.rewrite_fails.load(Ordering::SeqCst) {
            return Err(AgentError::Disabled(Agent::Clarity));
        }
        Ok(format!("In plain words: {text}"))
    }
}

/// Memory store whose ticket updates take `delay` to land, so admission
/// and slot writes can interleave the way they do against a remote store.
pub struct DelayedStore {
    inner: Arc<MemoryTicketStore>,
    delay: Duration,
}

#[async_trait]
impl TicketStore for DelayedStore {
    async fn create_ticket(&self, ticket: NewTicket) -> StoreResult<Ticket> {
        self.inner.create_ticket(ticket).await
    }

    async fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>> {
        self.inner.get_ticket(id).await
    }

    async fn update_ticket(&self, id: &str, update: TicketUpdate) -> StoreResult<Ticket> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_ticket(id, update).await
    }

    async fn add_reply(&self, reply: TicketReply) -> StoreResult<()> {
        self.inner.add_reply(reply).await
    }

    async fn replies(&self, ticket_id: &str) -> StoreResult<Vec<TicketReply>> {
        self.inner.replies(ticket_id).await
    }

    async fn tickets_by_status(
        &self,
        status: TicketStatus,
        processing_status: ProcessingStatus,
    ) -> StoreResult<Vec<Ticket>> {
        self.inner.tickets_by_status(status, processing_status).await
    }

    async fn get_task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        self.inner.get_task(task_id).await
    }

    async fn any_plan(&self) -> StoreResult<Option<Plan>> {
        self.inner.any_plan().await
    }
}

/// A scheduler wired to in-memory collaborators.
pub struct Harness {
    pub store: Arc<MemoryTicketStore>,
    pub agents: Arc<ScriptedAgents>,
    pub bus: SharedEventBus,
    pub log: Arc<MemoryLogSink>,
    pub scheduler: Arc<TicketScheduler>,
}

impl Harness {
    pub fn new(config: SchedulerConfig, agents: ScriptedAgents) -> Self {
        let store = Arc::new(MemoryTicketStore::new());
        Self::build(config, agents, Arc::clone(&store), store)
    }

    /// Like [`Harness::new`], but every ticket update the scheduler makes
    /// is delayed by `delay`.
    pub fn with_update_delay(config: SchedulerConfig, agents: ScriptedAgents, delay: Duration) -> Self {
        let store = Arc::new(MemoryTicketStore::new());
        let delayed = Arc::new(DelayedStore {
            inner: Arc::clone(&store),
            delay,
        });
        Self::build(config, agents, store, delayed)
    }

    fn build(
        config: SchedulerConfig,
        agents: ScriptedAgents,
        store: Arc<MemoryTicketStore>,
        scheduler_store: SharedTicketStore,
    ) -> Self {
        init_tracing();
        let agents = Arc::new(agents);
        let bus = EventBus::new().shared();
        let log = Arc::new(MemoryLogSink::new());
        let scheduler = TicketScheduler::new(
            config,
            scheduler_store,
            agents.clone(),
            Arc::clone(&bus),
            log.clone(),
        );
        Self {
            store,
            agents,
            bus,
            log,
            scheduler,
        }
    }

    pub async fn ticket(&self, new: NewTicket) -> Ticket {
        self.store.create_ticket(new).await.unwrap()
    }

    pub async fn reload(&self, ticket: &Ticket) -> Ticket {
        self.store.get_ticket(&ticket.id).await.unwrap().unwrap()
    }

    pub async fn reply_authors(&self, ticket: &Ticket) -> Vec<String> {
        self.store
            .replies(&ticket.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.author)
            .collect()
    }
}

/// Every event currently buffered on `events`.
pub fn drain(events: &mut broadcast::Receiver<SchedulerEvent>) -> Vec<SchedulerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn count(events: &[SchedulerEvent], event_type: &str) -> usize {
    events
        .iter()
        .filter(|e| e.event_type() == event_type)
        .count()
}

/// Wait for the first event of `event_type`, failing the test after `limit`.
pub async fn wait_for(
    events: &mut broadcast::Receiver<SchedulerEvent>,
    event_type: &str,
    limit: Duration,
) -> SchedulerEvent {
    tokio::time::timeout(limit, async {
        loop {
            match events.recv().await {
                Ok(event) if event.event_type() == event_type => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {event_type}"))
}
