//! Per-slot pipeline
//!
//! One slot runs one ticket from `processing_started` to a settled state.
//! Every agent failure is recorded on the ticket as a "System" reply and
//! handled like a failed verification.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::{SchedulerError, SchedulerResult, TicketScheduler};
use crate::agent::prompts::AssessmentPrompt;
use crate::agent::{Agent, AgentContext, AgentError, AgentResponse};
use crate::escalation::{resolve_plan, RetryDecision};
use crate::events::SchedulerEvent;
use crate::queue::QueueEntry;
use crate::router::{route, Lane};
use crate::ticket::{
    ensure_transition, ProcessingStatus, Ticket, TicketReply, TicketStatus, TicketUpdate,
};
use crate::verifier::{Verification, Verifier};

const SYSTEM_AUTHOR: &str = "System";
const ESCALATION_AUTHOR: &str = "Escalation";

/// How a pipeline run ended, before any status is written
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Passed(Verification),
    Failed { reason: String },
    /// Review asked for a human; park the ticket
    Holding,
    /// Nothing to settle: the ticket closed under us or the scheduler was disposed
    Abandoned,
}

impl TicketScheduler {
    pub(super) async fn run_slot(self: Arc<Self>, entry: QueueEntry, lane: Lane) {
        let ticket_id = entry.ticket_id.clone();
        let requeue = match self.process(&entry, lane).await {
            Ok(requeue) => requeue,
            Err(e) => {
                error!(ticket_id = %ticket_id, %lane, error = %e, "Ticket pipeline failed");
                self.notice(&format!("[Scheduler] {ticket_id} failed: {e}"));
                None
            }
        };
        self.release(&ticket_id, lane, requeue);
    }

    /// Run the pipeline and settle the outcome. `Some(entry)` means retry.
    async fn process(&self, entry: &QueueEntry, lane: Lane) -> SchedulerResult<Option<QueueEntry>> {
        let Some((ticket, agent)) = self.begin(entry, lane).await? else {
            return Ok(None);
        };

        let outcome = if agent == Agent::Boss {
            self.run_directive(&ticket).await?
        } else {
            self.run_work(&ticket, agent).await?
        };

        if self.is_disposed() {
            info!(ticket_id = %ticket.id, "Scheduler disposed, pipeline result discarded");
            return Ok(None);
        }
        self.settle(&ticket, outcome).await
    }

    /// Mark the ticket in review before any agent is called.
    async fn begin(&self, entry: &QueueEntry, lane: Lane) -> SchedulerResult<Option<(Ticket, Agent)>> {
        let ticket = self
            .store
            .get_ticket(&entry.ticket_id)
            .await?
            .ok_or_else(|| SchedulerError::TicketNotFound(entry.ticket_id.clone()))?;

        if ticket.status.is_closed() || ticket.processing_status == ProcessingStatus::Holding {
            debug!(ticket_id = %ticket.id, status = %ticket.status, "Ticket settled while queued");
            return Ok(None);
        }
        let Some(agent) = route(&ticket).agent() else {
            self.store
                .update_ticket(&ticket.id, TicketUpdate::new().processing(ProcessingStatus::Idle))
                .await?;
            return Ok(None);
        };

        ensure_transition(ticket.status, TicketStatus::InReview)?;
        let ticket = self
            .store
            .update_ticket(
                &ticket.id,
                TicketUpdate::new()
                    .status(TicketStatus::InReview)
                    .processing(ProcessingStatus::Processing),
            )
            .await?;

        info!(ticket_id = %ticket.id, %agent, %lane, "Processing ticket");
        self.emit(SchedulerEvent::ProcessingStarted {
            ticket_id: ticket.id.clone(),
            agent,
            lane,
            timestamp: Utc::now(),
        });
        Ok(Some((ticket, agent)))
    }

    /// Assessment, specialist, review, verification.
    async fn run_work(&self, ticket: &Ticket, agent: Agent) -> SchedulerResult<PipelineOutcome> {
        let history = self.store.replies(&ticket.id).await?;
        let prompt = AssessmentPrompt::new(ticket).with_history(&history).build();
        let context = AgentContext::assessment(ticket, history);
        match self
            .agents
            .call_agent(Agent::Orchestrator, &prompt, &context)
            .await
        {
            Ok(assessment) => {
                self.reply(TicketReply::new(
                    &ticket.id,
                    Agent::Orchestrator.reply_author(),
                    assessment.content,
                ))
                .await?;
            }
            Err(e) => return self.invocation_failed(ticket, Agent::Orchestrator, e).await,
        }
        if self.is_disposed() {
            return Ok(PipelineOutcome::Abandoned);
        }

        let context = AgentContext::deliverable(ticket);
        let response = match self
            .agents
            .call_agent(agent, ticket.prompt_text(), &context)
            .await
        {
            Ok(response) => response,
            Err(e) => return self.invocation_failed(ticket, agent, e).await,
        };
        let mut reply = TicketReply::new(&ticket.id, agent.reply_author(), &response.content);
        if ticket.is_communication() {
            reply = reply.with_clarity_score(response.confidence());
        }
        self.reply(reply).await?;
        if self.is_disposed() {
            return Ok(PipelineOutcome::Abandoned);
        }

        if !ticket.is_communication() {
            let review = match self.agents.review_ticket(ticket, &response.content).await {
                Ok(review) => review,
                Err(e) => return self.invocation_failed(ticket, Agent::Review, e).await,
            };
            self.reply(TicketReply::new(
                &ticket.id,
                Agent::Review.reply_author(),
                &review.content,
            ))
            .await?;
            if review.requests_escalation() {
                return Ok(PipelineOutcome::Holding);
            }
            if self.is_disposed() {
                return Ok(PipelineOutcome::Abandoned);
            }
        }

        Ok(self.verdict(ticket, &response))
    }

    /// Supervisor lane: the boss is the only agent involved.
    async fn run_directive(&self, ticket: &Ticket) -> SchedulerResult<PipelineOutcome> {
        let context = AgentContext::deliverable(ticket);
        let response = match self
            .agents
            .call_agent(Agent::Boss, ticket.prompt_text(), &context)
            .await
        {
            Ok(response) => response,
            Err(e) => return self.invocation_failed(ticket, Agent::Boss, e).await,
        };
        self.reply(TicketReply::new(
            &ticket.id,
            Agent::Boss.reply_author(),
            &response.content,
        ))
        .await?;
        if self.is_disposed() {
            return Ok(PipelineOutcome::Abandoned);
        }
        Ok(self.verdict(ticket, &response))
    }

    fn verdict(&self, ticket: &Ticket, response: &AgentResponse) -> PipelineOutcome {
        let verification = Verifier::from_config(&self.config()).verify(ticket, response);
        debug!(
            ticket_id = %ticket.id,
            policy = ?verification.policy,
            confidence = verification.confidence,
            threshold = verification.threshold,
            passed = verification.passed,
            "Verification"
        );
        if verification.passed {
            PipelineOutcome::Passed(verification)
        } else {
            PipelineOutcome::Failed {
                reason: verification.reason,
            }
        }
    }

    async fn invocation_failed(
        &self,
        ticket: &Ticket,
        agent: Agent,
        err: AgentError,
    ) -> SchedulerResult<PipelineOutcome> {
        error!(ticket_id = %ticket.id, %agent, error = %err, "Agent invocation failed");
        self.notice(&format!("[{}] Failed on {}: {err}", agent.reply_author(), ticket.id));
        self.reply(TicketReply::new(
            &ticket.id,
            SYSTEM_AUTHOR,
            format!("{} failed: {err}", agent.reply_author()),
        ))
        .await?;
        Ok(PipelineOutcome::Failed {
            reason: err.to_string(),
        })
    }

    /// Write the outcome back. Returns the entry to requeue on retry.
    async fn settle(
        &self,
        ticket: &Ticket,
        outcome: PipelineOutcome,
    ) -> SchedulerResult<Option<QueueEntry>> {
        match outcome {
            PipelineOutcome::Passed(verification) => {
                ensure_transition(ticket.status, TicketStatus::Resolved)?;
                self.store
                    .update_ticket(
                        &ticket.id,
                        TicketUpdate::new()
                            .status(TicketStatus::Resolved)
                            .processing(ProcessingStatus::Idle),
                    )
                    .await?;

                info!(ticket_id = %ticket.id, reason = %verification.reason, "Ticket resolved");
                self.notice(&format!("[Scheduler] {} resolved", ticket.id));
                self.emit(SchedulerEvent::VerificationPassed {
                    ticket_id: ticket.id.clone(),
                    confidence: verification.confidence,
                    timestamp: Utc::now(),
                });
                self.emit(SchedulerEvent::ProcessingCompleted {
                    ticket_id: ticket.id.clone(),
                    timestamp: Utc::now(),
                });
                Ok(None)
            }
            PipelineOutcome::Failed { reason } => {
                warn!(ticket_id = %ticket.id, reason = %reason, "Verification failed");
                self.emit(SchedulerEvent::VerificationFailed {
                    ticket_id: ticket.id.clone(),
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                });

                let max_retries = self.config().max_ticket_retries;
                let decision = self
                    .lock_state()
                    .retries
                    .record_failure(&ticket.id, max_retries);
                match decision {
                    RetryDecision::Retry {
                        attempt,
                        max_retries,
                    } => {
                        self.store
                            .update_ticket(
                                &ticket.id,
                                TicketUpdate::new().processing(ProcessingStatus::Queued),
                            )
                            .await?;
                        info!(ticket_id = %ticket.id, attempt, max_retries, "Retrying ticket");
                        self.notice(&format!(
                            "[Scheduler] Retrying {} ({attempt}/{max_retries})",
                            ticket.id
                        ));
                        self.emit(SchedulerEvent::TicketRetry {
                            ticket_id: ticket.id.clone(),
                            attempt,
                            max_retries,
                            timestamp: Utc::now(),
                        });
                        Ok(Some(QueueEntry::new(&ticket.id, ticket.priority)))
                    }
                    RetryDecision::Escalate { retries } => {
                        self.escalate(ticket, retries, &reason).await?;
                        Ok(None)
                    }
                }
            }
            PipelineOutcome::Holding => {
                self.store
                    .update_ticket(
                        &ticket.id,
                        TicketUpdate::new().processing(ProcessingStatus::Holding),
                    )
                    .await?;
                info!(ticket_id = %ticket.id, "Review requested escalation, ticket holding");
                self.notice(&format!("[Review] {} is holding for a human", ticket.id));
                Ok(None)
            }
            PipelineOutcome::Abandoned => Ok(None),
        }
    }

    /// Hand the ticket to a human: Escalated / awaiting_user plus a
    /// plain-language note, emitted once.
    async fn escalate(&self, ticket: &Ticket, retries: u32, reason: &str) -> SchedulerResult<()> {
        let plan = resolve_plan(self.store.as_ref(), ticket).await;

        ensure_transition(ticket.status, TicketStatus::Escalated)?;
        self.store
            .update_ticket(
                &ticket.id,
                TicketUpdate::new()
                    .status(TicketStatus::Escalated)
                    .processing(ProcessingStatus::AwaitingUser),
            )
            .await?;

        let note = escalation_note(ticket, retries, reason, plan.plan_id.as_deref());
        let body = match self.agents.rewrite_for_user(&note).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => rewritten,
            Ok(_) => note,
            Err(e) => {
                warn!(ticket_id = %ticket.id, error = %e, "Escalation rewrite failed, using raw note");
                note
            }
        };
        self.reply(TicketReply::new(&ticket.id, ESCALATION_AUTHOR, body))
            .await?;

        warn!(ticket_id = %ticket.id, retries, plan_id = ?plan.plan_id, "Ticket escalated");
        self.notice(&format!(
            "[Scheduler] {} escalated after {retries} retries",
            ticket.id
        ));
        self.emit(SchedulerEvent::TicketEscalated {
            ticket_id: ticket.id.clone(),
            plan_id: plan.plan_id,
            retries,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn reply(&self, reply: TicketReply) -> SchedulerResult<()> {
        self.store.add_reply(reply).await?;
        Ok(())
    }
}

fn escalation_note(ticket: &Ticket, retries: u32, reason: &str, plan_id: Option<&str>) -> String {
    let mut note = format!(
        "\"{}\" could not be completed automatically after {retries} retries.\nLast failure: {reason}.",
        ticket.title
    );
    if let Some(plan_id) = plan_id {
        note.push_str(&format!("\nPlan: {plan_id}"));
    }
    note.push_str("\nA person needs to review this ticket before work continues.");
    note
}
