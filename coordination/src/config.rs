//! Scheduler configuration
//!
//! Loaded from TOML (all keys optional) and optionally overridden from the
//! environment. The scheduler keeps the active config behind a lock and
//! reads a fresh snapshot for every decision, so runtime updates take effect
//! on the next admission or verification.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Upper bound for the idle watchdog countdown (one week)
pub const MAX_BOSS_IDLE_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;

/// Global automation default, also the vocabulary of the per-ticket
/// "AI level" directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
    /// Automation disabled
    Manual,
    Suggest,
    #[default]
    Smart,
    Hybrid,
}

impl AiMode {
    /// Only `manual` keeps tickets out of the queues.
    pub fn allows_automation(self) -> bool {
        !matches!(self, Self::Manual)
    }
}

impl FromStr for AiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" | "off" => Ok(Self::Manual),
            "suggest" | "suggestions" => Ok(Self::Suggest),
            "smart" | "auto" => Ok(Self::Smart),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown AI mode: {other}")),
        }
    }
}

impl std::fmt::Display for AiMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Suggest => write!(f, "suggest"),
            Self::Smart => write!(f, "smart"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// On/off switch for a single agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentToggle {
    pub enabled: bool,
}

impl Default for AgentToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Per-agent settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub orchestrator: AgentToggle,
}

/// Top-level scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tickets open across the system (queued + executing)
    pub max_active_tickets: usize,
    /// Retries before escalation. 0 escalates on the first failure.
    pub max_ticket_retries: u32,
    /// Communication tickets pass at or above this confidence
    pub clarity_auto_resolve_score: f32,
    /// Work tickets and directives pass at or above this confidence
    pub clarity_clarification_score: f32,
    pub boss_idle_timeout_minutes: u64,
    pub ai_mode: AiMode,
    /// Concurrent general-lane pipelines
    pub max_parallel_tickets: usize,
    /// Delay before the first system health check
    pub boss_startup_delay_secs: u64,
    pub agents: AgentsConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_active_tickets: 10,
            max_ticket_retries: 3,
            clarity_auto_resolve_score: 85.0,
            clarity_clarification_score: 70.0,
            boss_idle_timeout_minutes: 5,
            ai_mode: AiMode::Smart,
            max_parallel_tickets: 3,
            boss_startup_delay_secs: 3,
            agents: AgentsConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Parse from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse scheduler config")?;
        Ok(config.validate())
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Apply `TICKET_*` / `BOSS_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment in production).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = parse_override(&lookup, "TICKET_MAX_ACTIVE") {
            self.max_active_tickets = v;
        }
        if let Some(v) = parse_override(&lookup, "TICKET_MAX_RETRIES") {
            self.max_ticket_retries = v;
        }
        if let Some(v) = parse_override(&lookup, "TICKET_AI_MODE") {
            self.ai_mode = v;
        }
        if let Some(v) = parse_override(&lookup, "BOSS_IDLE_TIMEOUT_MINUTES") {
            self.boss_idle_timeout_minutes = v;
        }
        self.validate()
    }

    /// Clamp values into their valid ranges.
    pub fn validate(mut self) -> Self {
        self.clarity_auto_resolve_score = self.clarity_auto_resolve_score.clamp(0.0, 100.0);
        self.clarity_clarification_score = self.clarity_clarification_score.clamp(0.0, 100.0);
        self.max_parallel_tickets = self.max_parallel_tickets.max(1);
        self.boss_idle_timeout_minutes = self
            .boss_idle_timeout_minutes
            .clamp(1, MAX_BOSS_IDLE_TIMEOUT_MINUTES);
        self
    }

    pub fn boss_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.boss_idle_timeout_minutes.saturating_mul(60))
    }

    pub fn boss_startup_delay(&self) -> Duration {
        Duration::from_secs(self.boss_startup_delay_secs)
    }

    pub fn orchestrator_enabled(&self) -> bool {
        self.agents.orchestrator.enabled
    }
}

fn parse_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<T> {
    let raw = lookup(var)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var, value = %raw, "Ignoring invalid config override");
            None
        }
    }
}
