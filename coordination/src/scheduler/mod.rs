//! Ticket Scheduler
//!
//! Event-driven admission, two lanes of execution and the retry/escalation
//! loop, all driven from a single [`TicketScheduler`].
//!
//! ```text
//! ticket:created / ticket:unblocked
//!        │
//!        ▼
//!   admit_ticket ── closed / holding / skip / manual / duplicate ──▶ rejected
//!        │
//!        ├─ capacity ok ─────────────▶ lane queue (P1 > P2 > P3, FIFO)
//!        ├─ full, P1, P3 queued ─────▶ evict newest general P3, then queue
//!        └─ full otherwise ──────────▶ "ticket limit reached"
//!
//!   general lane:    up to max_parallel_tickets slots
//!   supervisor lane: one slot, boss directives only
//!
//!   slot: processing_started → assess → specialist → review → verify
//!            ├─ pass → Resolved, processing_completed
//!            ├─ fail → retry (same lane) or escalate
//!            └─ review says escalate → holding
//! ```
//!
//! Queue state lives behind one mutex that is never held across an await.
//! The store remains the source of truth for ticket fields.

mod error;
mod pipeline;
mod recovery;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::agent::SharedAgentInvoker;
use crate::config::SchedulerConfig;
use crate::escalation::RetryTracker;
use crate::events::{SchedulerEvent, SharedEventBus};
use crate::log_sink::SharedLogSink;
use crate::queue::{Admission, AdmissionController, QueueEntry, RejectReason};
use crate::router::{automation_allowed, route, Lane, RouteDecision};
use crate::store::SharedTicketStore;
use crate::supervisor::BossSupervisor;
use crate::ticket::{ProcessingStatus, Ticket, TicketId, TicketUpdate};

pub use error::{SchedulerError, SchedulerResult};
pub use pipeline::PipelineOutcome;

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub general_queue_size: usize,
    pub supervisor_queue_size: usize,
    /// Slots currently executing, both lanes
    pub active_slots: usize,
    pub max_parallel_slots: usize,
    pub general_processing: bool,
    pub supervisor_processing: bool,
    /// Tickets with at least one retry outstanding
    pub retrying: usize,
    pub last_activity: DateTime<Utc>,
    pub disposed: bool,
}

#[derive(Default)]
struct SchedulerState {
    queues: AdmissionController,
    /// Executing tickets and the lane they run in
    active: HashMap<TicketId, Lane>,
    /// Tickets between the admission screen and their queue insert
    admitting: HashSet<TicketId>,
    retries: RetryTracker,
    disposed: bool,
}

impl SchedulerState {
    fn active_in(&self, lane: Lane) -> usize {
        self.active.values().filter(|l| **l == lane).count()
    }

    fn is_tracked(&self, ticket_id: &str) -> bool {
        self.active.contains_key(ticket_id)
            || self.admitting.contains(ticket_id)
            || self.queues.contains(ticket_id)
    }
}

pub struct TicketScheduler {
    store: SharedTicketStore,
    agents: SharedAgentInvoker,
    bus: SharedEventBus,
    log: SharedLogSink,
    config: RwLock<SchedulerConfig>,
    state: Mutex<SchedulerState>,
    /// Executing pipelines, shared with the idle watchdog
    busy: Arc<AtomicUsize>,
    supervisor: Arc<BossSupervisor>,
    shutdown: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
    /// Signalled whenever a slot finishes or the scheduler is disposed
    settled: Notify,
}

impl TicketScheduler {
    pub fn new(
        config: SchedulerConfig,
        store: SharedTicketStore,
        agents: SharedAgentInvoker,
        bus: SharedEventBus,
        log: SharedLogSink,
    ) -> Arc<Self> {
        let config = config.validate();
        let busy = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let supervisor = BossSupervisor::new(
            Arc::clone(&agents),
            Arc::clone(&bus),
            Arc::clone(&log),
            Arc::clone(&busy),
            shutdown.child_token(),
            config.boss_idle_timeout_minutes,
        );
        Arc::new(Self {
            store,
            agents,
            bus,
            log,
            config: RwLock::new(config),
            state: Mutex::new(SchedulerState::default()),
            busy,
            supervisor: Arc::new(supervisor),
            shutdown,
            listener: Mutex::new(None),
            settled: Notify::new(),
        })
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> SchedulerConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration. Thresholds and limits apply to the next
    /// decision; the idle timeout applies to the next countdown.
    pub fn update_config(&self, config: SchedulerConfig) {
        let config = config.validate();
        self.supervisor
            .watchdog()
            .set_timeout_minutes(config.boss_idle_timeout_minutes);
        info!(
            max_active = config.max_active_tickets,
            max_retries = config.max_ticket_retries,
            ai_mode = %config.ai_mode,
            "Scheduler config updated"
        );
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn supervisor(&self) -> &Arc<BossSupervisor> {
        &self.supervisor
    }

    pub fn is_disposed(&self) -> bool {
        self.lock_state().disposed
    }

    /// Subscribe to the bus, start the boss supervisor and recover tickets
    /// left mid-flight by a previous run. Returns the number recovered.
    pub async fn start(self: &Arc<Self>) -> SchedulerResult<usize> {
        if self.is_disposed() {
            return Err(SchedulerError::Disposed);
        }
        let config = self.config();
        {
            let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
            if listener.is_none() {
                *listener = Some(self.spawn_listener());
                self.supervisor
                    .start(config.boss_startup_delay(), config.boss_idle_timeout_minutes);
            }
        }

        let recovered = self.recover_stuck_tickets().await?;
        info!(
            recovered,
            ai_mode = %config.ai_mode,
            max_parallel = config.max_parallel_tickets,
            "Ticket scheduler started"
        );
        Ok(recovered)
    }

    /// Try to queue a ticket by id.
    ///
    /// Rejections are normal outcomes, not errors; only store failures and
    /// a missing ticket's lookup error surface as `Err`.
    pub async fn admit_ticket(self: &Arc<Self>, ticket_id: &str) -> SchedulerResult<Admission> {
        if self.is_disposed() {
            return Ok(Admission::Rejected(RejectReason::Disposed));
        }
        match self.store.get_ticket(ticket_id).await? {
            Some(ticket) => self.admit_loaded(ticket).await,
            None => {
                debug!(ticket_id, "Admission skipped, ticket not found");
                Ok(Admission::Rejected(RejectReason::NotFound))
            }
        }
    }

    async fn admit_loaded(self: &Arc<Self>, ticket: Ticket) -> SchedulerResult<Admission> {
        let config = self.config();
        let lane = match screen(&ticket, &config) {
            Ok(lane) => lane,
            Err(reason) => {
                self.log_rejection(&ticket.id, &reason);
                return Ok(Admission::Rejected(reason));
            }
        };

        {
            let mut state = self.lock_state();
            let early = if state.disposed {
                Some(RejectReason::Disposed)
            } else if state.is_tracked(&ticket.id) {
                Some(RejectReason::Duplicate)
            } else {
                state.admitting.insert(ticket.id.clone());
                None
            };
            if let Some(reason) = early {
                drop(state);
                self.log_rejection(&ticket.id, &reason);
                return Ok(Admission::Rejected(reason));
            }
        }

        // Persist before the entry becomes visible to a slot, so a slot's
        // own status write always lands last. The reservation above keeps a
        // concurrent admission of the same id from writing in between.
        let previous = ticket.processing_status;
        let written = self
            .store
            .update_ticket(
                &ticket.id,
                TicketUpdate::new().processing(ProcessingStatus::Queued),
            )
            .await;

        let entry = QueueEntry::new(&ticket.id, ticket.priority);
        let admission = {
            let mut state = self.lock_state();
            state.admitting.remove(&ticket.id);
            written?;
            if state.disposed {
                Admission::Rejected(RejectReason::Disposed)
            } else {
                let in_flight = state.active.len();
                state
                    .queues
                    .admit(entry, lane, in_flight, config.max_active_tickets)
            }
        };

        match &admission {
            Admission::Queued { lane, position } => {
                info!(ticket_id = %ticket.id, %lane, position, priority = ?ticket.priority, "Ticket queued");
            }
            Admission::Preempted { lane, evicted } => {
                info!(
                    ticket_id = %ticket.id,
                    %lane,
                    evicted = %evicted.ticket_id,
                    "Ticket queued by preempting a P3 ticket"
                );
                self.notice(&format!(
                    "[Scheduler] {} evicted from the queue to make room for P1 ticket {}",
                    evicted.ticket_id, ticket.id
                ));
                if let Err(e) = self
                    .store
                    .update_ticket(
                        &evicted.ticket_id,
                        TicketUpdate::new().processing(ProcessingStatus::Idle),
                    )
                    .await
                {
                    warn!(ticket_id = %evicted.ticket_id, error = %e, "Failed to reset evicted ticket");
                }
            }
            Admission::Rejected(reason) => {
                if let Err(e) = self
                    .store
                    .update_ticket(&ticket.id, TicketUpdate::new().processing(previous))
                    .await
                {
                    warn!(ticket_id = %ticket.id, error = %e, "Failed to restore processing status");
                }
                self.log_rejection(&ticket.id, reason);
            }
        }

        if let Admission::Queued { lane, .. } | Admission::Preempted { lane, .. } = admission {
            self.emit(SchedulerEvent::TicketQueued {
                ticket_id: ticket.id.clone(),
                lane,
                priority: ticket.priority,
                timestamp: Utc::now(),
            });
            self.pump();
        }
        Ok(admission)
    }

    /// Fill free slots from the queues.
    fn pump(self: &Arc<Self>) {
        let parallel = self.config().max_parallel_tickets.max(1);
        let started = {
            let mut state = self.lock_state();
            if state.disposed {
                return;
            }
            let mut started = Vec::new();
            for (lane, slots) in [(Lane::General, parallel), (Lane::Supervisor, 1)] {
                while state.active_in(lane) < slots {
                    let Some(entry) = state.queues.next(lane) else {
                        break;
                    };
                    state.active.insert(entry.ticket_id.clone(), lane);
                    started.push((entry, lane));
                }
            }
            started
        };

        for (entry, lane) in started {
            self.busy.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(Arc::clone(self).run_slot(entry, lane));
        }
    }

    /// Free a slot, optionally putting the ticket back in its lane.
    ///
    /// A ticket that leaves without being requeued (resolved, escalated,
    /// holding, abandoned or failed on a store error) drops its retry count.
    fn release(self: &Arc<Self>, ticket_id: &str, lane: Lane, requeue: Option<QueueEntry>) {
        let requeued = {
            let mut state = self.lock_state();
            state.active.remove(ticket_id);
            match requeue {
                Some(entry) if !state.disposed => {
                    let priority = entry.priority;
                    state.queues.requeue(entry, lane);
                    Some(priority)
                }
                _ => {
                    state.retries.clear(ticket_id);
                    None
                }
            }
        };
        self.busy.fetch_sub(1, Ordering::SeqCst);

        if let Some(priority) = requeued {
            self.emit(SchedulerEvent::TicketQueued {
                ticket_id: ticket_id.to_string(),
                lane,
                priority,
                timestamp: Utc::now(),
            });
        }
        self.pump();
        self.settled.notify_waiters();
    }

    pub fn status(&self) -> SchedulerStatus {
        let max_parallel_slots = self.config().max_parallel_tickets;
        let last_activity = self.supervisor.last_activity();
        let state = self.lock_state();
        SchedulerStatus {
            general_queue_size: state.queues.queue(Lane::General).len(),
            supervisor_queue_size: state.queues.queue(Lane::Supervisor).len(),
            active_slots: state.active.len(),
            max_parallel_slots,
            general_processing: state.active_in(Lane::General) > 0,
            supervisor_processing: state.active_in(Lane::Supervisor) > 0,
            retrying: state.retries.len(),
            last_activity,
            disposed: state.disposed,
        }
    }

    /// Queued ticket ids for `lane`, in dequeue order.
    pub fn queued_ticket_ids(&self, lane: Lane) -> Vec<TicketId> {
        self.lock_state().queues.queue(lane).ticket_ids()
    }

    /// Resolves once nothing is queued or executing.
    pub async fn until_idle(&self) {
        loop {
            let settled = self.settled.notified();
            {
                let state = self.lock_state();
                if state.active.is_empty() && (state.disposed || state.queues.queued_len() == 0) {
                    return;
                }
            }
            settled.await;
        }
    }

    /// Stop listening, stop the supervisor and drop both queues.
    ///
    /// In-flight pipeline steps finish on their own, but their results are
    /// discarded. Idempotent.
    pub fn dispose(&self) {
        let dropped = {
            let mut state = self.lock_state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.queues.clear()
        };
        self.supervisor.stop();
        self.shutdown.cancel();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.abort();
        }
        info!(dropped, "Ticket scheduler disposed");
        self.notice(&format!("[Scheduler] Disposed, {dropped} queued ticket(s) dropped"));
        self.settled.notify_waiters();
    }

    fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.bus.subscribe();
        let shutdown = self.shutdown.clone();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    received = events.recv() => match received {
                        Ok(event) => this.handle_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Scheduler listener lagged, events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Scheduler listener stopped");
        })
    }

    async fn handle_event(self: &Arc<Self>, event: SchedulerEvent) {
        if event.is_activity() {
            self.supervisor.record_activity();
            return;
        }
        if !event.is_admission_trigger() {
            return;
        }
        let Some(ticket_id) = event.ticket_id().map(str::to_string) else {
            debug!(event_type = event.event_type(), "Admission trigger without ticket id, ignored");
            return;
        };
        if !self.config().orchestrator_enabled() {
            debug!(ticket_id = %ticket_id, "Orchestrator disabled, event not admitted");
            return;
        }
        if let Err(e) = self.admit_ticket(&ticket_id).await {
            error!(ticket_id = %ticket_id, error = %e, "Admission from event failed");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SchedulerEvent) {
        self.bus.publish(event);
    }

    fn notice(&self, line: &str) {
        self.log.append_line(line);
    }

    fn log_rejection(&self, ticket_id: &str, reason: &RejectReason) {
        match reason {
            RejectReason::CapacityReached { limit } => {
                info!(ticket_id, limit, "Ticket limit reached");
                self.notice(&format!(
                    "[Scheduler] Ticket limit reached ({limit}), {ticket_id} not queued"
                ));
            }
            RejectReason::Skipped => {
                info!(ticket_id, "Ticket skipped by router");
                self.notice(&format!("[Router] Skipping {ticket_id}"));
            }
            _ => debug!(ticket_id, %reason, "Ticket not admitted"),
        }
    }
}

/// Ticket-level admission rules, independent of queue state.
fn screen(ticket: &Ticket, config: &SchedulerConfig) -> Result<Lane, RejectReason> {
    if ticket.status.is_closed() {
        return Err(RejectReason::Closed(ticket.status));
    }
    if ticket.processing_status == ProcessingStatus::Holding {
        return Err(RejectReason::Holding);
    }
    let lane = match route(ticket) {
        RouteDecision::Dispatch { lane, .. } => lane,
        RouteDecision::Skip => return Err(RejectReason::Skipped),
    };
    if lane == Lane::General && !automation_allowed(&ticket.body, config.ai_mode) {
        return Err(RejectReason::Manual);
    }
    Ok(lane)
}
