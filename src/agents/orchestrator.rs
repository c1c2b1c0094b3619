/// Orchestrator - registry of strands, dispatch by name and mode, and
/// system-wide metrics/log aggregation.
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use thiserror::Error;

use super::agent::{AgentMetrics, LogEntry, Payload};
use super::memory::SharedMemory;
use super::strand::{ExecutionMode, Strand, StrandRun};

/// Errors from [`Orchestrator::execute_strand`].
///
/// `StrandNotFound` and `UnknownMode` are reported by the dispatcher itself;
/// `Execution` carries a failure raised by an agent during the run.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Strand {name} not found")]
    StrandNotFound { name: String },
    #[error("Unknown execution mode: {mode}")]
    UnknownMode { mode: String },
    #[error("strand '{strand}' failed: {source:#}")]
    Execution {
        strand: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// True for errors produced by dispatch rather than by a running agent.
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            DispatchError::StrandNotFound { .. } | DispatchError::UnknownMode { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    pub system_name: String,
    pub total_strands: usize,
    pub total_agents: usize,
    pub agent_metrics: Vec<AgentMetrics>,
}

pub struct Orchestrator {
    name: String,
    strands: RwLock<Vec<Arc<Strand>>>,
    global_memory: SharedMemory,
}

impl Orchestrator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strands: RwLock::new(Vec::new()),
            global_memory: SharedMemory::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Not used by any execution mode.
    pub fn global_memory(&self) -> &SharedMemory {
        &self.global_memory
    }

    /// Register a strand under its name. A strand already registered under
    /// that name is replaced in place, keeping its position.
    pub fn add_strand(&self, strand: Strand) -> Arc<Strand> {
        let strand = Arc::new(strand);
        let mut strands = self.write_strands();
        match strands.iter_mut().find(|s| s.name() == strand.name()) {
            Some(slot) => {
                tracing::info!(strand = %strand.name(), "replacing registered strand");
                *slot = Arc::clone(&strand);
            }
            None => {
                tracing::info!(
                    strand = %strand.name(),
                    agents = strand.agents().len(),
                    "registered strand"
                );
                strands.push(Arc::clone(&strand));
            }
        }
        strand
    }

    pub fn delete_strand(&self, name: &str) -> Result<Arc<Strand>, DispatchError> {
        let mut strands = self.write_strands();
        let index = strands
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| DispatchError::StrandNotFound {
                name: name.to_string(),
            })?;
        tracing::info!(strand = %name, "deleted strand");
        Ok(strands.remove(index))
    }

    pub fn strand(&self, name: &str) -> Option<Arc<Strand>> {
        self.read_strands()
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// Registered strands in registration order.
    pub fn strands(&self) -> Vec<Arc<Strand>> {
        self.read_strands().clone()
    }

    /// Look up `name`, parse `mode` and run the strand. The registry lock is
    /// not held while agents run.
    pub async fn execute_strand(
        &self,
        name: &str,
        input: Payload,
        mode: &str,
    ) -> Result<StrandRun, DispatchError> {
        let strand = self
            .strand(name)
            .ok_or_else(|| DispatchError::StrandNotFound {
                name: name.to_string(),
            })?;
        let mode = mode
            .parse::<ExecutionMode>()
            .map_err(|mode| DispatchError::UnknownMode { mode })?;

        strand
            .execute(mode, input)
            .await
            .map_err(|source| DispatchError::Execution {
                strand: name.to_string(),
                source,
            })
    }

    pub fn system_metrics(&self) -> SystemMetrics {
        let strands = self.strands();
        SystemMetrics {
            system_name: self.name.clone(),
            total_strands: strands.len(),
            total_agents: strands.iter().map(|s| s.agents().len()).sum(),
            agent_metrics: strands.iter().flat_map(|s| s.all_metrics()).collect(),
        }
    }

    /// Logs of every strand, oldest first. Ties keep registration order.
    pub fn system_logs(&self) -> Vec<LogEntry> {
        let mut logs = self
            .strands()
            .iter()
            .flat_map(|s| s.all_logs())
            .collect::<Vec<_>>();
        logs.sort_by_key(|entry| entry.timestamp);
        logs
    }

    fn read_strands(&self) -> RwLockReadGuard<'_, Vec<Arc<Strand>>> {
        self.strands.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_strands(&self) -> RwLockWriteGuard<'_, Vec<Arc<Strand>>> {
        self.strands.write().unwrap_or_else(|e| e.into_inner())
    }
}
