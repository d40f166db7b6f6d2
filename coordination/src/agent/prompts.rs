//! Prompt templates for pipeline steps

use crate::ticket::{Ticket, TicketReply};

/// Maximum replies quoted back into an assessment prompt
const MAX_HISTORY_REPLIES: usize = 10;

/// Builder for the structured "ticket assessment" prompt sent to the
/// orchestrator before a specialist runs.
pub struct AssessmentPrompt<'a> {
    ticket: &'a Ticket,
    history: &'a [TicketReply],
    include_criteria: bool,
}

impl<'a> AssessmentPrompt<'a> {
    pub fn new(ticket: &'a Ticket) -> Self {
        Self {
            ticket,
            history: &[],
            include_criteria: true,
        }
    }

    /// Quote prior replies (most recent last)
    pub fn with_history(mut self, history: &'a [TicketReply]) -> Self {
        self.history = history;
        self
    }

    pub fn without_criteria(mut self) -> Self {
        self.include_criteria = false;
        self
    }

    pub fn build(&self) -> String {
        let t = self.ticket;
        let mut prompt = String::from("## Ticket Assessment\n\n");
        prompt.push_str(&format!("**Ticket:** {} ({})\n", t.title, t.id));
        prompt.push_str(&format!("**Priority:** {}\n", t.priority));
        prompt.push_str(&format!("**Deliverable:** {}\n", t.operation_type));
        prompt.push_str(&format!("**Status:** {}\n\n", t.status));

        prompt.push_str("### Description\n\n");
        prompt.push_str(t.prompt_text());
        prompt.push_str("\n\n");

        if self.include_criteria {
            if let Some(criteria) = t.acceptance_criteria.as_deref() {
                prompt.push_str("### Acceptance Criteria\n\n");
                prompt.push_str(criteria);
                prompt.push_str("\n\n");
            }
        }

        if !self.history.is_empty() {
            prompt.push_str("### Conversation So Far\n\n");
            let skip = self.history.len().saturating_sub(MAX_HISTORY_REPLIES);
            for reply in self.history.iter().skip(skip) {
                prompt.push_str(&format!("- **{}:** {}\n", reply.author, reply.body));
            }
            prompt.push('\n');
        }

        prompt.push_str(
            "### Instructions\n\n\
             Assess whether this ticket is actionable, identify missing information, \
             and summarize what the specialist must deliver.\n",
        );
        prompt
    }
}
