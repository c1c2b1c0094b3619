use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};

use crate::agents::agent::{Agent, AgentLogic, LogEntry, Payload};
use crate::agents::orchestrator::{DispatchError, Orchestrator};
use crate::agents::specialized::{
    AnalyticsLogic, ClassificationLogic, IntakeLogic, NotificationLogic, ProcessingLogic,
    QualityLogic, ResolutionLogic, SimulatedWork,
};
use crate::agents::strand::Strand;
use crate::config::RuntimeConfig;
use crate::telemetry::TelemetrySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowType {
    CustomerSupport,
    Ecommerce,
    Content,
    Hr,
    Generic,
}

impl WorkflowType {
    pub const ALL: [WorkflowType; 5] = [
        WorkflowType::CustomerSupport,
        WorkflowType::Ecommerce,
        WorkflowType::Content,
        WorkflowType::Hr,
        WorkflowType::Generic,
    ];

    /// Unrecognized names fall back to the generic workflow.
    pub fn parse(name: &str) -> Self {
        match name {
            "customer-support" => WorkflowType::CustomerSupport,
            "ecommerce" => WorkflowType::Ecommerce,
            "content" => WorkflowType::Content,
            "hr" => WorkflowType::Hr,
            _ => WorkflowType::Generic,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WorkflowType::CustomerSupport => "customer-support",
            WorkflowType::Ecommerce => "ecommerce",
            WorkflowType::Content => "content",
            WorkflowType::Hr => "hr",
            WorkflowType::Generic => "generic",
        }
    }

    fn roster(self) -> &'static [AgentSpec] {
        match self {
            WorkflowType::CustomerSupport => CUSTOMER_SUPPORT,
            WorkflowType::Ecommerce => ECOMMERCE,
            WorkflowType::Content => CONTENT,
            WorkflowType::Hr => HR,
            WorkflowType::Generic => GENERIC,
        }
    }
}

const CUSTOMER_SUPPORT: &[AgentSpec] = &[
    AgentSpec::new(
        "intake",
        "Intake Agent",
        "Receives and validates customer inquiries",
        LogicKind::Intake,
    ),
    AgentSpec::new(
        "classifier",
        "Classification Agent",
        "Categorizes issues",
        LogicKind::Classification,
    ),
    AgentSpec::new(
        "resolver",
        "Resolution Agent",
        "Generates solutions",
        LogicKind::Resolution,
    ),
    AgentSpec::new(
        "quality",
        "Quality Agent",
        "Reviews responses",
        LogicKind::Quality,
    ),
    AgentSpec::new(
        "notification",
        "Notification Agent",
        "Sends updates",
        LogicKind::Notification,
    ),
];

const ECOMMERCE: &[AgentSpec] = &[
    AgentSpec::new(
        "order",
        "Order Agent",
        "Processes incoming orders",
        LogicKind::Intake,
    ),
    AgentSpec::new(
        "payment",
        "Payment Agent",
        "Handles payment processing",
        LogicKind::Processing,
    ),
    AgentSpec::new(
        "inventory",
        "Inventory Agent",
        "Manages stock",
        LogicKind::Processing,
    ),
    AgentSpec::new(
        "shipping",
        "Shipping Agent",
        "Coordinates delivery",
        LogicKind::Processing,
    ),
    AgentSpec::new(
        "notification",
        "Notification Agent",
        "Sends customer updates",
        LogicKind::Notification,
    ),
];

const CONTENT: &[AgentSpec] = &[
    AgentSpec::new(
        "planner",
        "Content Planner",
        "Plans content strategy",
        LogicKind::Processing,
    ),
    AgentSpec::new(
        "writer",
        "Content Writer",
        "Creates written content",
        LogicKind::Processing,
    ),
    AgentSpec::new(
        "editor",
        "Content Editor",
        "Reviews and refines content",
        LogicKind::Quality,
    ),
    AgentSpec::new(
        "designer",
        "Visual Designer",
        "Creates visual assets",
        LogicKind::Processing,
    ),
    AgentSpec::new(
        "publisher",
        "Publishing Agent",
        "Publishes content",
        LogicKind::Notification,
    ),
];

const HR: &[AgentSpec] = &[
    AgentSpec::new(
        "sourcing",
        "Sourcing Agent",
        "Finds candidates",
        LogicKind::Intake,
    ),
    AgentSpec::new(
        "screening",
        "Screening Agent",
        "Reviews applications",
        LogicKind::Classification,
    ),
    AgentSpec::new(
        "interview",
        "Interview Agent",
        "Coordinates interviews",
        LogicKind::Processing,
    ),
    AgentSpec::new(
        "assessment",
        "Assessment Agent",
        "Evaluates candidates",
        LogicKind::Analytics,
    ),
    AgentSpec::new(
        "offer",
        "Offer Agent",
        "Manages offers",
        LogicKind::Notification,
    ),
];

const GENERIC: &[AgentSpec] = &[
    AgentSpec::new("input", "Input Agent", "Receives input", LogicKind::Intake),
    AgentSpec::new(
        "processor",
        "Processing Agent",
        "Processes data",
        LogicKind::Processing,
    ),
    AgentSpec::new(
        "output",
        "Output Agent",
        "Delivers output",
        LogicKind::Notification,
    ),
];

#[derive(Debug, Clone, Copy)]
enum LogicKind {
    Intake,
    Classification,
    Processing,
    Resolution,
    Quality,
    Notification,
    Analytics,
}

impl LogicKind {
    fn build(self, work: SimulatedWork) -> Arc<dyn AgentLogic> {
        match self {
            LogicKind::Intake => Arc::new(IntakeLogic { work }),
            LogicKind::Classification => Arc::new(ClassificationLogic { work }),
            LogicKind::Processing => Arc::new(ProcessingLogic { work }),
            LogicKind::Resolution => Arc::new(ResolutionLogic { work }),
            LogicKind::Quality => Arc::new(QualityLogic { work }),
            LogicKind::Notification => Arc::new(NotificationLogic { work }),
            LogicKind::Analytics => Arc::new(AnalyticsLogic { work }),
        }
    }
}

#[derive(Debug)]
struct AgentSpec {
    id: &'static str,
    name: &'static str,
    role: &'static str,
    kind: LogicKind,
}

impl AgentSpec {
    const fn new(
        id: &'static str,
        name: &'static str,
        role: &'static str,
        kind: LogicKind,
    ) -> Self {
        Self {
            id,
            name,
            role,
            kind,
        }
    }
}

/// Fixed roster of agents for a workflow type, with deterministic ids.
pub fn create_agents_for_workflow(workflow_type: &str, work: SimulatedWork) -> Vec<Agent> {
    WorkflowType::parse(workflow_type)
        .roster()
        .iter()
        .map(|spec| Agent::new(spec.id, spec.name, spec.role, spec.kind.build(work)))
        .collect()
}

pub fn strand_name_for(workflow_type: &str) -> String {
    format!("{workflow_type}_strand")
}

/// Strand named `<type>_strand` whose agents are chained in roster order.
pub fn build_workflow_strand(workflow_type: &str, work: SimulatedWork) -> Strand {
    let mut strand = Strand::new(
        strand_name_for(workflow_type),
        create_agents_for_workflow(workflow_type, work),
    );
    strand.link_in_order();
    strand
}

pub fn agent_icon(agent_name: &str) -> &'static str {
    match agent_name {
        "Intake Agent" => "🎯",
        "Classification Agent" => "🏷️",
        "Resolution Agent" => "💡",
        "Quality Agent" => "✅",
        "Notification Agent" => "📧",
        "Order Agent" => "🛒",
        "Payment Agent" => "💳",
        "Inventory Agent" => "📦",
        "Shipping Agent" => "🚚",
        "Content Planner" => "📋",
        "Content Writer" => "✍️",
        "Content Editor" => "📝",
        "Visual Designer" => "🎨",
        "Publishing Agent" => "🚀",
        "Sourcing Agent" => "🔍",
        "Screening Agent" => "📄",
        "Interview Agent" => "🗓️",
        "Assessment Agent" => "📊",
        "Offer Agent" => "🤝",
        "Input Agent" => "📥",
        "Processing Agent" => "⚙️",
        "Output Agent" => "📤",
        _ => "🤖",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    pub role: String,
    pub tools: Vec<String>,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunicationDescriptor {
    pub from: String,
    pub to: String,
    pub protocol: &'static str,
    pub trigger: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemDescription {
    pub system_name: String,
    pub agents: Vec<AgentDescriptor>,
    pub communications: Vec<CommunicationDescriptor>,
    pub memory: Value,
    pub metrics: Value,
}

pub fn describe_strand(strand: &Strand) -> SystemDescription {
    SystemDescription {
        system_name: strand.name().to_string(),
        agents: strand
            .agents()
            .iter()
            .map(|agent| AgentDescriptor {
                id: agent.id().to_string(),
                name: agent.name().to_string(),
                role: agent.role().to_string(),
                tools: agent
                    .tools()
                    .iter()
                    .map(|tool| tool.name().to_string())
                    .collect(),
                icon: agent_icon(agent.name()),
            })
            .collect(),
        communications: strand
            .edges()
            .into_iter()
            .map(|(from, to)| CommunicationDescriptor {
                from,
                to,
                protocol: "async-message",
                trigger: "on-completion",
            })
            .collect(),
        memory: json!({
            "type": "shared",
            "strategy": "event-driven",
            "persistence": "in-memory"
        }),
        metrics: json!({
            "enabled": true,
            "trackResponseTime": true,
            "trackSuccessRate": true
        }),
    }
}

pub fn sample_input() -> Payload {
    let mut input = Payload::new();
    input.insert("customer_id".into(), json!("CUST-12345"));
    input.insert(
        "message".into(),
        json!("I have an urgent payment issue with my last transaction"),
    );
    input.insert("channel".into(), json!("email"));
    input.insert("timestamp".into(), json!(chrono::Utc::now().to_rfc3339()));
    input
}

/// `--input` must be a JSON object. Absent input uses [`sample_input`].
pub fn parse_input(raw: Option<&str>) -> Result<Payload> {
    let Some(raw) = raw else {
        return Ok(sample_input());
    };
    let value = serde_json::from_str::<Value>(raw).context("invalid --input: not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow::anyhow!(
            "invalid --input: expected a JSON object, got {}",
            json_kind(&other)
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Register a strand and record it, overwriting any strand of the same name.
pub fn register_strand(
    system: &Orchestrator,
    strand: Strand,
    telemetry: &TelemetrySink,
) -> Arc<Strand> {
    let strand = system.add_strand(strand);
    telemetry.emit(
        "strand.registered",
        json!({
            "strand": strand.name(),
            "agents": strand.agents().len(),
        }),
    );
    strand
}

/// Dispatch a strand and record the outcome. Reported errors are recorded
/// as failures too.
pub async fn execute_with_telemetry(
    system: &Orchestrator,
    strand_name: &str,
    input: Payload,
    mode: &str,
    telemetry: &TelemetrySink,
) -> std::result::Result<crate::agents::strand::StrandRun, DispatchError> {
    let started_at = std::time::Instant::now();
    let outcome = system.execute_strand(strand_name, input, mode).await;
    let elapsed_ms = started_at.elapsed().as_millis() as u64;
    match &outcome {
        Ok(run) => telemetry.emit(
            "strand.completed",
            json!({
                "strand": strand_name,
                "mode": mode,
                "results": run.results.len(),
                "elapsed_ms": elapsed_ms,
            }),
        ),
        Err(err) => telemetry.emit(
            "strand.failed",
            json!({
                "strand": strand_name,
                "mode": mode,
                "reported": err.is_reported(),
                "error": err.to_string(),
                "elapsed_ms": elapsed_ms,
            }),
        ),
    }
    outcome
}

pub async fn run_workflow_command(
    cfg: &RuntimeConfig,
    telemetry: &TelemetrySink,
    workflow_type: &str,
    mode: &str,
    raw_input: Option<&str>,
    show_logs: bool,
) -> Result<()> {
    let input = parse_input(raw_input)?;
    let system = Orchestrator::new(cfg.system_name.clone());
    let strand = register_strand(
        &system,
        build_workflow_strand(workflow_type, cfg.simulated_work()),
        telemetry,
    );

    let run = execute_with_telemetry(&system, strand.name(), input, mode, telemetry).await?;

    let rendered = serde_json::to_string_pretty(&run).context("failed to render strand result")?;
    println!("{rendered}");

    println!("\nAgent metrics:");
    for metrics in strand.all_metrics() {
        println!(
            "- {} ({}): executions={} success_rate={:.1}% avg_time={:.2}s",
            metrics.agent_name,
            metrics.agent_id,
            metrics.total_executions,
            metrics.success_rate,
            metrics.average_execution_time
        );
    }

    if show_logs {
        println!("\nExecution logs:");
        for entry in tail(system.system_logs(), cfg.log_limit) {
            print_log_entry(&entry);
        }
    }
    Ok(())
}

/// Last `limit` entries, keeping their order.
pub fn tail<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    let skip = items.len().saturating_sub(limit);
    items.split_off(skip)
}

fn print_log_entry(entry: &LogEntry) {
    println!(
        "[{}] {:<5} {}: {}",
        entry.timestamp.format("%H:%M:%S%.3f"),
        format!("{:?}", entry.level).to_ascii_uppercase(),
        entry.agent,
        entry.message
    );
}

pub fn run_workflows_list() -> Result<()> {
    for workflow in WorkflowType::ALL {
        println!(
            "{} (strand '{}')",
            workflow.label(),
            strand_name_for(workflow.label())
        );
        for spec in workflow.roster() {
            println!(
                "  {} {:<12} {:<22} {}",
                agent_icon(spec.name),
                spec.id,
                spec.name,
                spec.role
            );
        }
    }
    Ok(())
}
