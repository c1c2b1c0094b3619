/// Agent execution envelope.
///
/// An [`Agent`] wraps an opaque [`AgentLogic`] strategy with status tracking,
/// timing, an execution log, counters and an inbox. The envelope never looks
/// at what the logic computes; it only records how the call went.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::memory::SharedMemory;
use super::tools::{Tool, find_tool};

/// JSON object flowing between agents.
pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Processing,
    Completed,
    Error,
}

impl AgentStatus {
    pub fn label(self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Processing => "processing",
            AgentStatus::Completed => "completed",
            AgentStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub agent: String,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub content: Payload,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Payload,
}

impl Message {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, content: Payload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            receiver: receiver.into(),
            content,
            timestamp: Utc::now(),
            metadata: Payload::new(),
        }
    }
}

/// Raw monotonic counters. Never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExecutionCounters {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub total_time_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentMetrics {
    pub agent_id: String,
    pub agent_name: String,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    /// Percentage in `0.0..=100.0`.
    pub success_rate: f64,
    /// Seconds per execution.
    pub average_execution_time: f64,
}

/// Agent-specific behavior plugged into the envelope.
#[async_trait]
pub trait AgentLogic: Send + Sync {
    async fn execute(&self, ctx: &AgentContext<'_>, input: Payload) -> Result<Payload>;
}

/// Adapts a synchronous closure into an [`AgentLogic`].
pub struct FnLogic<F>(pub F);

#[async_trait]
impl<F> AgentLogic for FnLogic<F>
where
    F: Fn(&AgentContext<'_>, Payload) -> Result<Payload> + Send + Sync,
{
    async fn execute(&self, ctx: &AgentContext<'_>, input: Payload) -> Result<Payload> {
        (self.0)(ctx, input)
    }
}

/// What a running logic function may touch on its agent.
pub struct AgentContext<'a> {
    agent: &'a Agent,
}

impl AgentContext<'_> {
    pub fn agent_id(&self) -> &str {
        &self.agent.id
    }

    pub fn agent_name(&self) -> &str {
        &self.agent.name
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.agent.memory
    }

    pub fn log(&self, message: impl Into<String>) {
        self.agent.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.agent.log(LogLevel::Warn, message);
    }

    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.agent.use_tool(name)
    }
}

#[derive(Debug)]
struct AgentState {
    status: AgentStatus,
    counters: ExecutionCounters,
    log: Vec<LogEntry>,
    inbox: VecDeque<Message>,
}

pub struct Agent {
    id: String,
    name: String,
    role: String,
    tools: Vec<Tool>,
    memory: SharedMemory,
    logic: Arc<dyn AgentLogic>,
    state: Mutex<AgentState>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Returns the agent to `Idle` and counts the execution on every exit path.
/// A cancelled future counts as a failure and leaves a warning in the log.
struct ExecutionGuard<'a> {
    agent: &'a Agent,
}

impl<'a> ExecutionGuard<'a> {
    fn enter(agent: &'a Agent) -> Self {
        agent.lock_state().status = AgentStatus::Processing;
        Self { agent }
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.agent.lock_state();
        // Still processing here means the future was dropped mid-run.
        if state.status == AgentStatus::Processing {
            state.counters.failed_executions += 1;
            let entry = self
                .agent
                .log_entry(LogLevel::Warn, "Cancelled before completion");
            state.log.push(entry);
        }
        state.counters.total_executions += 1;
        state.status = AgentStatus::Idle;
    }
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        logic: Arc<dyn AgentLogic>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            tools: Vec::new(),
            memory: SharedMemory::new(),
            logic,
            state: Mutex::new(AgentState {
                status: AgentStatus::Idle,
                counters: ExecutionCounters::default(),
                log: Vec::new(),
                inbox: VecDeque::new(),
            }),
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_memory(mut self, memory: SharedMemory) -> Self {
        self.memory = memory;
        self
    }

    /// Replace whatever memory the agent held with `memory`.
    pub fn attach_memory(&mut self, memory: SharedMemory) {
        self.memory = memory;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    pub fn status(&self) -> AgentStatus {
        self.lock_state().status
    }

    pub fn counters(&self) -> ExecutionCounters {
        self.lock_state().counters
    }

    pub fn execution_log(&self) -> Vec<LogEntry> {
        self.lock_state().log.clone()
    }

    pub fn use_tool(&self, name: &str) -> Option<&Tool> {
        find_tool(&self.tools, name)
    }

    /// Run the agent's logic on `input`. Failures are recorded and then
    /// returned unchanged to the caller.
    pub async fn process(&self, input: Payload) -> Result<Payload> {
        let _guard = ExecutionGuard::enter(self);
        let started_at = Instant::now();
        tracing::debug!(agent_id = %self.id, "agent processing started");

        let ctx = AgentContext { agent: self };
        match self.logic.execute(&ctx, input).await {
            Ok(output) => {
                let elapsed = started_at.elapsed().as_secs_f64();
                {
                    let mut state = self.lock_state();
                    state.status = AgentStatus::Completed;
                    state.counters.successful_executions += 1;
                    state.counters.total_time_secs += elapsed;
                }
                self.log(
                    LogLevel::Info,
                    format!("Completed processing in {elapsed:.2}s"),
                );
                tracing::info!(
                    agent_id = %self.id,
                    elapsed_ms = (elapsed * 1000.0).round() as u64,
                    "agent completed"
                );
                Ok(output)
            }
            Err(err) => {
                {
                    let mut state = self.lock_state();
                    state.status = AgentStatus::Error;
                    state.counters.failed_executions += 1;
                }
                self.log(LogLevel::Error, format!("Error: {err}"));
                tracing::warn!(agent_id = %self.id, error = %err, "agent failed");
                Err(err)
            }
        }
    }

    /// Build a message addressed to `receiver`. Delivery is up to the caller.
    pub fn send_message(&self, receiver: &str, content: Payload) -> Message {
        let message = Message::new(self.id.clone(), receiver, content);
        self.log(LogLevel::Info, format!("Sent message to {receiver}"));
        message
    }

    pub fn receive_message(&self, message: Message) {
        let sender = message.sender.clone();
        self.lock_state().inbox.push_back(message);
        self.log(LogLevel::Info, format!("Received message from {sender}"));
    }

    pub fn next_message(&self) -> Option<Message> {
        self.lock_state().inbox.pop_front()
    }

    pub fn pending_messages(&self) -> usize {
        self.lock_state().inbox.len()
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = self.log_entry(level, message);
        self.lock_state().log.push(entry);
    }

    fn log_entry(&self, level: LogLevel, message: impl Into<String>) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            agent_id: self.id.clone(),
            agent: self.name.clone(),
            level,
            message: message.into(),
        }
    }

    pub fn metrics(&self) -> AgentMetrics {
        let counters = self.counters();
        let (success_rate, average_execution_time) = if counters.total_executions == 0 {
            (0.0, 0.0)
        } else {
            let total = counters.total_executions as f64;
            (
                counters.successful_executions as f64 / total * 100.0,
                counters.total_time_secs / total,
            )
        };

        AgentMetrics {
            agent_id: self.id.clone(),
            agent_name: self.name.clone(),
            total_executions: counters.total_executions,
            successful_executions: counters.successful_executions,
            failed_executions: counters.failed_executions,
            success_rate,
            average_execution_time,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
