//! Idle watchdog
//!
//! A single cancellable countdown. Arming always cancels the previous
//! countdown first, so at most one timer is pending at any time.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::{SchedulerEvent, SharedEventBus};
use crate::log_sink::SharedLogSink;

pub struct IdleWatchdog {
    timeout_minutes: Mutex<u64>,
    /// Pipelines currently executing; the countdown defers while non-zero
    busy: Arc<AtomicUsize>,
    bus: SharedEventBus,
    log: SharedLogSink,
    parent: CancellationToken,
    armed: Mutex<Option<CancellationToken>>,
    fired: AtomicU64,
}

impl IdleWatchdog {
    pub fn new(
        timeout_minutes: u64,
        busy: Arc<AtomicUsize>,
        bus: SharedEventBus,
        log: SharedLogSink,
        parent: CancellationToken,
    ) -> Self {
        Self {
            timeout_minutes: Mutex::new(timeout_minutes.max(1)),
            busy,
            bus,
            log,
            parent,
            armed: Mutex::new(None),
            fired: AtomicU64::new(0),
        }
    }

    pub fn timeout_minutes(&self) -> u64 {
        *self
            .timeout_minutes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes().saturating_mul(60))
    }

    /// Takes effect on the next arm.
    pub fn set_timeout_minutes(&self, minutes: u64) {
        *self
            .timeout_minutes
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = minutes.max(1);
    }

    /// Cancel any pending countdown and start a fresh one.
    pub fn arm(self: &Arc<Self>) {
        if self.parent.is_cancelled() {
            return;
        }
        let token = self.parent.child_token();
        let previous = self
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let this = Arc::clone(self);
        let minutes = self.timeout_minutes();
        let timeout = Duration::from_secs(minutes.saturating_mul(60));
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => this.elapsed(minutes),
            }
        });
    }

    /// Cancel the pending countdown, if any.
    pub fn disarm(&self) {
        let armed = self
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = armed {
            token.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }

    /// Number of times the idle event has been emitted
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }

    fn elapsed(self: &Arc<Self>, idle_minutes: u64) {
        if self.parent.is_cancelled() {
            return;
        }
        let busy = self.busy.load(Ordering::SeqCst);
        if busy > 0 {
            debug!(busy, "Idle watchdog deferred, work in progress");
        } else {
            info!(idle_minutes, "Idle watchdog triggered");
            self.log
                .append_line(&format!("[Boss] Idle for {idle_minutes} minute(s)"));
            self.fired.fetch_add(1, Ordering::SeqCst);
            self.bus.publish(SchedulerEvent::IdleWatchdogTriggered {
                idle_minutes,
                timestamp: chrono::Utc::now(),
            });
        }
        self.arm();
    }
}
