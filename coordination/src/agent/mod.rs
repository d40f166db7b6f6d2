//! Agent invocation collaborator
//!
//! The reasoning agents live outside this crate. The scheduler addresses
//! them through the closed [`Agent`] enum and the [`AgentInvoker`] trait, so
//! the router's decision table stays exhaustive.

pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ticket::{OperationType, Ticket, TicketReply};

pub use prompts::AssessmentPrompt;

/// Confidence assumed when an agent response omits one.
pub const DEFAULT_CONFIDENCE: f32 = 85.0;

/// Action name a reviewer uses to hand a ticket to a human.
pub const ESCALATE_ACTION: &str = "escalate";

/// Agents the scheduler can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    /// Ticket assessment
    Orchestrator,
    Planning,
    Coding,
    Verification,
    /// Communication / clarification pipeline
    Clarity,
    /// Supervisor directives and system health
    Boss,
    Review,
}

impl Agent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Planning => "planning",
            Self::Coding => "coding",
            Self::Verification => "verification",
            Self::Clarity => "clarity",
            Self::Boss => "boss",
            Self::Review => "review",
        }
    }

    /// Author name used on ticket replies produced by this agent
    pub fn reply_author(&self) -> &'static str {
        match self {
            Self::Orchestrator => "Orchestrator",
            Self::Planning => "Planning Agent",
            Self::Coding => "Coding Agent",
            Self::Verification => "Verification Agent",
            Self::Clarity => "Clarity Agent",
            Self::Boss => "Boss Agent",
            Self::Review => "Review Agent",
        }
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Side effect requested by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl AgentAction {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: serde_json::Value::Null,
        }
    }
}

/// Response returned by an agent call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    /// 0–100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AgentAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
}

impl AgentResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            confidence: None,
            actions: Vec::new(),
            tokens_used: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_action(mut self, action: AgentAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Confidence, falling back to [`DEFAULT_CONFIDENCE`]
    pub fn confidence(&self) -> f32 {
        self.confidence.unwrap_or(DEFAULT_CONFIDENCE)
    }

    /// Whether the agent asked for a human hand-off
    pub fn requests_escalation(&self) -> bool {
        self.actions
            .iter()
            .any(|a| a.action_type.eq_ignore_ascii_case(ESCALATE_ACTION))
    }
}

/// Context object handed to an agent alongside the prompt
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conversation_history: Vec<TicketReply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deliverable_type: Option<OperationType>,
}

impl AgentContext {
    /// Context for the assessment step
    pub fn assessment(ticket: &Ticket, history: Vec<TicketReply>) -> Self {
        Self {
            ticket: Some(ticket.clone()),
            conversation_history: history,
            deliverable_type: None,
        }
    }

    /// Context for the specialist step
    pub fn deliverable(ticket: &Ticket) -> Self {
        Self {
            ticket: Some(ticket.clone()),
            conversation_history: Vec::new(),
            deliverable_type: Some(ticket.operation_type),
        }
    }
}

/// Error type for agent invocations
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent {agent} invocation failed: {message}")]
    Invocation { agent: Agent, message: String },

    #[error("Agent {0} is disabled")]
    Disabled(Agent),

    #[error("Malformed response from {agent}: {message}")]
    MalformedResponse { agent: Agent, message: String },
}

/// Result type for agent invocations
pub type AgentResult<T> = Result<T, AgentError>;

/// Shared reference to an agent invoker
pub type SharedAgentInvoker = Arc<dyn AgentInvoker>;

/// Capabilities the scheduler needs from the agent layer.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Invoke a named agent with a prompt and context.
    async fn call_agent(
        &self,
        agent: Agent,
        message: &str,
        context: &AgentContext,
    ) -> AgentResult<AgentResponse>;

    /// Review a specialist's output for a ticket.
    async fn review_ticket(&self, ticket: &Ticket, output: &str) -> AgentResult<AgentResponse>;

    /// Supervisor health check.
    async fn check_system_health(&self) -> AgentResult<AgentResponse>;

    /// Rewrite text for a non-technical reader.
    async fn rewrite_for_user(&self, text: &str) -> AgentResult<String>;
}
