/// Strand - an ordered set of agents plus a communication graph, executed
/// sequentially, in parallel, or by walking the graph.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use super::agent::{Agent, AgentMetrics, LogEntry, Payload};
use super::memory::SharedMemory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
    Graph,
}

impl ExecutionMode {
    pub const ALL: [ExecutionMode; 3] = [
        ExecutionMode::Sequential,
        ExecutionMode::Parallel,
        ExecutionMode::Graph,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::Graph => "graph",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    /// Exact, case-sensitive match on the mode label.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ExecutionMode::ALL
            .into_iter()
            .find(|mode| mode.label() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Lifecycle of the most recent run of a strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrandRun {
    pub strand: String,
    pub mode: ExecutionMode,
    /// Per-agent outputs in visitation order. Parallel runs list them in
    /// strand order.
    pub results: Vec<Payload>,
    /// Only set for sequential runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<Payload>,
}

pub struct Strand {
    name: String,
    agents: Vec<Arc<Agent>>,
    communication_graph: HashMap<String, Vec<String>>,
    shared_memory: SharedMemory,
    last_run: Mutex<RunState>,
}

impl fmt::Debug for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strand")
            .field("name", &self.name)
            .field("agents", &self.agents)
            .field("communication_graph", &self.communication_graph)
            .finish_non_exhaustive()
    }
}

impl Strand {
    pub fn new(name: impl Into<String>, agents: Vec<Agent>) -> Self {
        Self::with_memory(name, agents, SharedMemory::new())
    }

    /// Every agent is rebound to `shared_memory`, dropping any memory it
    /// carried before.
    pub fn with_memory(
        name: impl Into<String>,
        agents: Vec<Agent>,
        shared_memory: SharedMemory,
    ) -> Self {
        let agents = agents
            .into_iter()
            .map(|mut agent| {
                agent.attach_memory(shared_memory.clone());
                Arc::new(agent)
            })
            .collect();

        Self {
            name: name.into(),
            agents,
            communication_graph: HashMap::new(),
            shared_memory,
            last_run: Mutex::new(RunState::NotStarted),
        }
    }

    pub fn add_communication(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.communication_graph
            .entry(from.into())
            .or_default()
            .push(to.into());
    }

    /// Link every agent to the one after it in strand order.
    pub fn link_in_order(&mut self) {
        let pairs = self
            .agents
            .windows(2)
            .filter_map(|pair| match pair {
                [from, to] => Some((from.id().to_string(), to.id().to_string())),
                _ => None,
            })
            .collect::<Vec<_>>();
        for (from, to) in pairs {
            self.add_communication(from, to);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    /// First agent with this id.
    pub fn agent(&self, id: &str) -> Option<&Arc<Agent>> {
        self.agents.iter().find(|agent| agent.id() == id)
    }

    pub fn successors(&self, id: &str) -> &[String] {
        self.communication_graph
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Edges as `(from, to)` pairs, grouped by source in strand order.
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut sources = self
            .communication_graph
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>();
        sources.sort_by_key(|id| {
            self.agents
                .iter()
                .position(|agent| agent.id() == *id)
                .unwrap_or(usize::MAX)
        });
        sources
            .into_iter()
            .flat_map(|from| {
                self.successors(from)
                    .iter()
                    .map(move |to| (from.to_string(), to.clone()))
            })
            .collect()
    }

    pub fn shared_memory(&self) -> &SharedMemory {
        &self.shared_memory
    }

    pub fn last_run_state(&self) -> RunState {
        *self.last_run.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn execute(&self, mode: ExecutionMode, input: Payload) -> Result<StrandRun> {
        match mode {
            ExecutionMode::Sequential => self.execute_sequential(input).await,
            ExecutionMode::Parallel => self.execute_parallel(input).await,
            ExecutionMode::Graph => self.execute_graph(input).await,
        }
    }

    /// Fold the payload through every agent in order. The first failure
    /// ends the run.
    pub async fn execute_sequential(&self, input: Payload) -> Result<StrandRun> {
        self.tracked(ExecutionMode::Sequential, self.run_sequential(input))
            .await
    }

    /// Give every agent the same input and wait for all of them. The first
    /// failure aborts the agents still running and discards every result.
    pub async fn execute_parallel(&self, input: Payload) -> Result<StrandRun> {
        self.tracked(ExecutionMode::Parallel, self.run_parallel(input))
            .await
    }

    /// Depth-first walk of the communication graph from the first agent.
    ///
    /// Each successor receives its predecessor's output. An agent runs at
    /// most once per walk; later arrivals at a visited agent (joins, cycles)
    /// are skipped. Successor ids that name no agent are skipped as well.
    pub async fn execute_graph(&self, input: Payload) -> Result<StrandRun> {
        self.tracked(ExecutionMode::Graph, self.run_graph(input))
            .await
    }

    async fn run_sequential(&self, input: Payload) -> Result<StrandRun> {
        let mut current = input;
        let mut results = Vec::with_capacity(self.agents.len());

        for agent in &self.agents {
            let output = agent
                .process(current)
                .await
                .with_context(|| self.agent_failure(agent))?;
            results.push(output.clone());
            current = output;
        }

        Ok(StrandRun {
            strand: self.name.clone(),
            mode: ExecutionMode::Sequential,
            results,
            final_output: Some(current),
        })
    }

    async fn run_parallel(&self, input: Payload) -> Result<StrandRun> {
        let mut tasks = JoinSet::new();
        for (index, agent) in self.agents.iter().enumerate() {
            let agent = Arc::clone(agent);
            let input = input.clone();
            tasks.spawn(async move {
                let result = agent.process(input).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<Payload>> = vec![None; self.agents.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(done) => done,
                Err(err) => {
                    tasks.abort_all();
                    return Err(anyhow::anyhow!(
                        "agent task in strand '{}' did not finish: {err}",
                        self.name
                    ));
                }
            };

            match result {
                Ok(output) => slots[index] = Some(output),
                Err(err) => {
                    tasks.abort_all();
                    return Err(err.context(self.agent_failure(&self.agents[index])));
                }
            }
        }

        Ok(StrandRun {
            strand: self.name.clone(),
            mode: ExecutionMode::Parallel,
            results: slots.into_iter().flatten().collect(),
            final_output: None,
        })
    }

    async fn run_graph(&self, input: Payload) -> Result<StrandRun> {
        let entry = self
            .agents
            .first()
            .ok_or_else(|| anyhow::anyhow!("no agents in strand '{}'", self.name))?;

        let mut visited: HashSet<&str> = HashSet::new();
        let mut results = Vec::new();
        let mut pending: Vec<(&str, Payload)> = vec![(entry.id(), input)];

        while let Some((agent_id, payload)) = pending.pop() {
            if visited.contains(agent_id) {
                continue;
            }
            let Some(agent) = self.agent(agent_id) else {
                tracing::warn!(strand = %self.name, agent_id, "graph edge targets unknown agent");
                continue;
            };

            let output = agent
                .process(payload)
                .await
                .with_context(|| self.agent_failure(agent))?;
            visited.insert(agent.id());
            results.push(output.clone());

            // Reverse push so the first listed successor is walked first.
            for next in self.successors(agent_id).iter().rev() {
                if !visited.contains(next.as_str()) {
                    pending.push((next.as_str(), output.clone()));
                }
            }
        }

        Ok(StrandRun {
            strand: self.name.clone(),
            mode: ExecutionMode::Graph,
            results,
            final_output: None,
        })
    }

    pub fn all_metrics(&self) -> Vec<AgentMetrics> {
        self.agents.iter().map(|agent| agent.metrics()).collect()
    }

    /// Logs of every agent, oldest first. Ties keep strand order.
    pub fn all_logs(&self) -> Vec<LogEntry> {
        let mut logs = self
            .agents
            .iter()
            .flat_map(|agent| agent.execution_log())
            .collect::<Vec<_>>();
        logs.sort_by_key(|entry| entry.timestamp);
        logs
    }

    async fn tracked<F>(&self, mode: ExecutionMode, run: F) -> Result<StrandRun>
    where
        F: Future<Output = Result<StrandRun>>,
    {
        self.set_run_state(RunState::Running);
        let started_at = Instant::now();
        tracing::info!(
            strand = %self.name,
            %mode,
            agents = self.agents.len(),
            "strand run started"
        );

        let outcome = run.await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        match &outcome {
            Ok(run) => {
                self.set_run_state(RunState::Completed);
                tracing::info!(
                    strand = %self.name,
                    %mode,
                    results = run.results.len(),
                    elapsed_ms,
                    "strand run completed"
                );
            }
            Err(err) => {
                self.set_run_state(RunState::Failed);
                tracing::warn!(
                    strand = %self.name,
                    %mode,
                    elapsed_ms,
                    error = %err,
                    "strand run failed"
                );
            }
        }
        outcome
    }

    fn set_run_state(&self, state: RunState) {
        *self.last_run.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn agent_failure(&self, agent: &Agent) -> String {
        format!("agent '{}' failed in strand '{}'", agent.id(), self.name)
    }
}
