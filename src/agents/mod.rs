/// Multi-agent orchestration core.
///
/// Leaf-first:
/// - `memory`: store shared by every agent of a strand
/// - `tools`: named callables an agent can look up
/// - `agent`: execution envelope around an opaque [`agent::AgentLogic`]
/// - `strand`: agents plus a communication graph, run in one of three modes
/// - `orchestrator`: registry of strands, dispatch and aggregation
/// - `specialized`: concrete logic used by the workflow factory

pub mod agent;
pub mod memory;
pub mod orchestrator;
pub mod specialized;
pub mod strand;
pub mod tools;

pub use agent::{
    Agent, AgentContext, AgentLogic, AgentMetrics, AgentStatus, FnLogic, LogEntry, Payload,
};
pub use memory::SharedMemory;
pub use orchestrator::{DispatchError, Orchestrator, SystemMetrics};
pub use strand::{ExecutionMode, Strand, StrandRun};
