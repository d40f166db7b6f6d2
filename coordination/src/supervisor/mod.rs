//! Boss supervisor
//!
//! Runs alongside the scheduler: one delayed health check at startup, then
//! the idle watchdog. Activity events only refresh the last-activity stamp;
//! the watchdog itself decides between firing and deferring.

pub mod watchdog;

use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::SharedAgentInvoker;
use crate::events::SharedEventBus;
use crate::log_sink::SharedLogSink;

pub use watchdog::IdleWatchdog;

pub struct BossSupervisor {
    agents: SharedAgentInvoker,
    log: SharedLogSink,
    watchdog: Arc<IdleWatchdog>,
    last_activity: Mutex<DateTime<Utc>>,
    cancel: CancellationToken,
}

impl BossSupervisor {
    /// `busy` is the scheduler's count of executing pipelines; `cancel` is
    /// cancelled when the owning scheduler is disposed.
    pub fn new(
        agents: SharedAgentInvoker,
        bus: SharedEventBus,
        log: SharedLogSink,
        busy: Arc<AtomicUsize>,
        cancel: CancellationToken,
        idle_timeout_minutes: u64,
    ) -> Self {
        let watchdog = IdleWatchdog::new(
            idle_timeout_minutes,
            busy,
            bus,
            Arc::clone(&log),
            cancel.child_token(),
        );
        Self {
            agents,
            log,
            watchdog: Arc::new(watchdog),
            last_activity: Mutex::new(Utc::now()),
            cancel,
        }
    }

    /// Spawn the startup sequence: delay, health check, then arm the watchdog.
    pub fn start(self: &Arc<Self>, startup_delay: Duration, idle_timeout_minutes: u64) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.watchdog.set_timeout_minutes(idle_timeout_minutes);
        let this = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(startup_delay) => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = this.health_check() => {}
            }
            this.watchdog.arm();
        });
    }

    async fn health_check(&self) {
        match self.agents.check_system_health().await {
            Ok(report) => {
                info!(confidence = report.confidence(), "Boss health check complete");
                self.log
                    .append_line(&format!("[Boss] Health check: {}", report.content));
            }
            Err(e) => {
                warn!(error = %e, "Boss health check failed");
                self.log
                    .append_line(&format!("[Boss] Health check failed: {e}"));
            }
        }
    }

    /// Refresh the last-activity timestamp.
    pub fn record_activity(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn watchdog(&self) -> &Arc<IdleWatchdog> {
        &self.watchdog
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn stop(&self) {
        self.watchdog.disarm();
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentContext, AgentInvoker, AgentResponse, AgentResult};
    use crate::events::EventBus;
    use crate::log_sink::MemoryLogSink;
    use crate::ticket::Ticket;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;

    struct HealthyAgents;

    #[async_trait]
    impl AgentInvoker for HealthyAgents {
        async fn call_agent(
            &self,
            _agent: Agent,
            _message: &str,
            _context: &AgentContext,
        ) -> AgentResult<AgentResponse> {
            Ok(AgentResponse::new("unused"))
        }

        async fn review_ticket(&self, _ticket: &Ticket, _output: &str) -> AgentResult<AgentResponse> {
            Ok(AgentResponse::new("unused"))
        }

        async fn check_system_health(&self) -> AgentResult<AgentResponse> {
            Ok(AgentResponse::new("all green"))
        }

        async fn rewrite_for_user(&self, text: &str) -> AgentResult<String> {
            Ok(text.to_string())
        }
    }

    fn supervisor(busy: Arc<AtomicUsize>, log: Arc<MemoryLogSink>) -> Arc<BossSupervisor> {
        Arc::new(BossSupervisor::new(
            Arc::new(HealthyAgents),
            EventBus::new().shared(),
            log,
            busy,
            CancellationToken::new(),
            1,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_then_watchdog() {
        let log = Arc::new(MemoryLogSink::new());
        let boss = supervisor(Arc::new(AtomicUsize::new(0)), Arc::clone(&log));
        boss.start(Duration::from_secs(3), 1);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(log.contains("Health check: all green"));
        assert!(boss.watchdog().is_armed());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(boss.watchdog().fired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_defers_watchdog() {
        let busy = Arc::new(AtomicUsize::new(1));
        let boss = supervisor(Arc::clone(&busy), Arc::new(MemoryLogSink::new()));
        boss.start(Duration::ZERO, 1);

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(boss.watchdog().fired(), 0);
        assert!(boss.watchdog().is_armed());

        busy.store(0, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(boss.watchdog().fired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_firing() {
        let boss = supervisor(Arc::new(AtomicUsize::new(0)), Arc::new(MemoryLogSink::new()));
        boss.start(Duration::ZERO, 1);
        tokio::time::sleep(Duration::from_secs(1)).await;
        boss.stop();

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(boss.watchdog().fired(), 0);
        assert!(!boss.is_running());
    }

    #[tokio::test]
    async fn test_record_activity_moves_forward() {
        let boss = supervisor(Arc::new(AtomicUsize::new(0)), Arc::new(MemoryLogSink::new()));
        let before = boss.last_activity();
        boss.record_activity();
        assert!(boss.last_activity() >= before);
    }
}
