//! Startup recovery
//!
//! Tickets left `InReview / processing` by a run that stopped mid-pipeline
//! are re-admitted to the lane their route selects. Tickets this scheduler
//! already tracks are skipped, which makes a second pass a no-op.

use std::sync::Arc;

use tracing::{info, warn};

use super::{SchedulerError, SchedulerResult, TicketScheduler};
use crate::queue::Admission;
use crate::ticket::{ProcessingStatus, TicketStatus};

impl TicketScheduler {
    /// Re-admit stuck tickets. Returns how many were queued.
    pub async fn recover_stuck_tickets(self: &Arc<Self>) -> SchedulerResult<usize> {
        if self.is_disposed() {
            return Err(SchedulerError::Disposed);
        }
        let stuck = self
            .store
            .tickets_by_status(TicketStatus::InReview, ProcessingStatus::Processing)
            .await?;

        let mut recovered = 0;
        for ticket in stuck {
            if self.lock_state().is_tracked(&ticket.id) {
                continue;
            }
            let ticket_id = ticket.id.clone();
            match self.admit_loaded(ticket).await? {
                Admission::Rejected(reason) => {
                    warn!(ticket_id = %ticket_id, %reason, "Stuck ticket not recovered");
                }
                _ => recovered += 1,
            }
        }

        if recovered > 0 {
            info!(recovered, "Recovered stuck tickets");
            self.notice(&format!("[Scheduler] Recovered {recovered} stuck ticket(s)"));
        }
        Ok(recovered)
    }
}
