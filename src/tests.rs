use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::tempdir;

use crate::agents::agent::{Agent, AgentContext, FnLogic, Payload};
use crate::agents::orchestrator::{DispatchError, Orchestrator};
use crate::agents::specialized::SimulatedWork;
use crate::agents::strand::{ExecutionMode, Strand};
use crate::cli::*;
use crate::config::*;
use crate::error::*;
use crate::telemetry::*;
use crate::workflow::*;

fn base_cfg() -> RuntimeConfig {
    RuntimeConfig {
        profile: "default".to_string(),
        config_path: ".strands/config.toml".to_string(),
        system_name: "Test System".to_string(),
        host: DEFAULT_HOST.to_string(),
        port: DEFAULT_PORT,
        simulate_work: false,
        work_scale: 1.0,
        log_limit: DEFAULT_LOG_LIMIT,
        telemetry_enabled: false,
        telemetry_path: DEFAULT_TELEMETRY_PATH.to_string(),
    }
}

fn test_cli(config_path: &str, profile: &str) -> Cli {
    Cli {
        profile: profile.to_string(),
        config_path: config_path.to_string(),
        system_name: None,
        simulate_work: None,
        work_scale: None,
        log_limit: None,
        telemetry_enabled: None,
        telemetry_path: None,
        log_filter: "warn".to_string(),
        command: Commands::Workflows,
    }
}

fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap_or_default()
}

fn appending_agent(id: &str) -> Agent {
    let key = id.to_ascii_lowercase();
    Agent::new(
        id,
        id,
        "appends its flag",
        Arc::new(FnLogic(
            move |_: &AgentContext<'_>, mut input: Payload| -> anyhow::Result<Payload> {
                input.insert(key.clone(), json!(true));
                Ok(input)
            },
        )),
    )
}

fn read_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("telemetry file should exist")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn runtime_config_uses_selected_profile_defaults() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[profiles.dev]
system_name = "Dev System"
host = "0.0.0.0"
port = 9000
simulate_work = false
work_scale = 0.25
log_limit = 20
telemetry_enabled = false
telemetry_path = "dev/events.jsonl"
"#,
    )
    .expect("config should write");

    let cli = test_cli(path.to_string_lossy().as_ref(), "dev");
    let profiles = load_profiles(&cli.config_path).expect("profiles should load");
    let cfg = resolve_runtime_config(&cli, &profiles).expect("runtime config should resolve");

    assert_eq!(cfg.profile, "dev");
    assert_eq!(cfg.system_name, "Dev System");
    assert_eq!(cfg.host, "0.0.0.0");
    assert_eq!(cfg.port, 9000);
    assert!(!cfg.simulate_work);
    assert_eq!(cfg.work_scale, 0.25);
    assert_eq!(cfg.log_limit, 20);
    assert!(!cfg.telemetry_enabled);
    assert_eq!(cfg.telemetry_path, "dev/events.jsonl");
    assert!(!cfg.simulated_work().is_enabled());
}

#[test]
fn runtime_config_cli_overrides_profile_values() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[profiles.dev]
system_name = "Dev System"
simulate_work = false
log_limit = 20
"#,
    )
    .expect("config should write");

    let mut cli = test_cli(path.to_string_lossy().as_ref(), "dev");
    cli.system_name = Some("Override".to_string());
    cli.simulate_work = Some(true);
    cli.log_limit = Some(0);
    let profiles = load_profiles(&cli.config_path).expect("profiles should load");
    let cfg = resolve_runtime_config(&cli, &profiles).expect("runtime config should resolve");

    assert_eq!(cfg.system_name, "Override");
    assert!(cfg.simulate_work);
    assert_eq!(cfg.log_limit, 1);
}

#[test]
fn runtime_config_defaults_without_file() {
    let cli = test_cli("/nonexistent/strands.toml", "default");
    let profiles = load_profiles(&cli.config_path).expect("missing config should default");
    let cfg = resolve_runtime_config(&cli, &profiles).expect("runtime config should resolve");

    assert_eq!(cfg.system_name, DEFAULT_SYSTEM_NAME);
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert!(cfg.simulate_work);
    assert!(cfg.telemetry_enabled);
    assert_eq!(cfg.telemetry_path, DEFAULT_TELEMETRY_PATH);
}

#[test]
fn runtime_config_reports_missing_profile() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[profiles.dev]\n[profiles.prod]\n").expect("config should write");

    let cli = test_cli(path.to_string_lossy().as_ref(), "ops");
    let profiles = load_profiles(&cli.config_path).expect("profiles should load");
    let err = resolve_runtime_config(&cli, &profiles).expect_err("missing profile should fail");
    let msg = err.to_string();
    assert!(msg.contains("profile 'ops' not found"));
    assert!(msg.contains("Available profiles: dev, prod"));
    assert_eq!(categorize_error(&err), ErrorCategory::Input);
}

#[test]
fn invalid_profile_config_is_actionable() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[profiles.default]\nprovider = \"openai\"\n")
        .expect("config should write");

    let err = load_profiles(path.to_string_lossy().as_ref())
        .expect_err("unknown fields should be rejected");
    assert!(format!("{err:#}").contains("invalid profile configuration"));
    assert_eq!(categorize_error(&err), ErrorCategory::Config);
}

#[test]
fn negative_work_scale_is_rejected() {
    let mut cli = test_cli("/nonexistent/strands.toml", "default");
    cli.work_scale = Some(-1.0);
    let err = resolve_runtime_config(&cli, &ProfilesFile::default())
        .expect_err("negative scale should fail");
    assert!(err.to_string().contains("work_scale"));
}

#[test]
fn telemetry_sink_appends_jsonl_records() {
    let dir = tempdir().expect("temp directory should create");
    let mut cfg = base_cfg();
    cfg.telemetry_enabled = true;
    let path = dir.path().join("nested/events.jsonl");
    cfg.telemetry_path = path.to_string_lossy().to_string();

    let sink = TelemetrySink::new(&cfg, "run.sequential".to_string());
    sink.emit("strand.registered", json!({"strand": "s", "agents": 2}));
    sink.emit("command.completed", json!({}));

    let lines = read_lines(std::path::Path::new(&cfg.telemetry_path));
    assert_eq!(lines.len(), 2);
    let first: Value = serde_json::from_str(&lines[0]).expect("line should be JSON");
    assert_eq!(first["event"], json!("strand.registered"));
    assert_eq!(first["command"], json!("run.sequential"));
    assert_eq!(first["strand"], json!("s"));
    assert!(
        first["ts"]
            .as_str()
            .is_some_and(|ts| chrono::DateTime::parse_from_rfc3339(ts).is_ok())
    );
    assert_eq!(first["run_id"], json!(sink.run_id()));
}

#[test]
fn disabled_telemetry_writes_nothing() {
    let dir = tempdir().expect("temp directory should create");
    let mut cfg = base_cfg();
    let path = dir.path().join("events.jsonl");
    cfg.telemetry_path = path.to_string_lossy().to_string();

    TelemetrySink::new(&cfg, "test".to_string()).emit("command.completed", json!({}));
    assert!(!std::path::Path::new(&cfg.telemetry_path).exists());
}

#[test]
fn telemetry_summary_counts_strand_lifecycle() {
    let lines = vec![
        r#"{"ts":"2026-03-01T10:00:01Z","event":"strand.registered","run_id":"r1","command":"serve","strand":"a"}"#,
        r#"{"ts":"2026-03-01T10:00:02Z","event":"strand.completed","run_id":"r1","command":"serve","strand":"a"}"#,
        "not json",
        r#"{"ts":"2026-03-01T10:00:03Z","event":"strand.failed","run_id":"r2","command":"run.graph","strand":"b"}"#,
        r#"{"ts":"2026-03-01T10:00:04Z","event":"command.failed","run_id":"r2","command":"run.graph"}"#,
    ]
    .into_iter()
    .map(str::to_string)
    .collect::<Vec<_>>();

    let summary = summarize_telemetry_lines(lines.clone(), 100);
    assert_eq!(summary.total_lines, 5);
    assert_eq!(summary.parsed_events, 4);
    assert_eq!(summary.parse_errors, 1);
    assert_eq!(summary.unique_runs.len(), 2);
    assert_eq!(summary.strand_registered, 1);
    assert_eq!(summary.strand_completed, 1);
    assert_eq!(summary.strand_failed, 1);
    assert_eq!(summary.command_failed, 1);
    assert_eq!(summary.strand_counts.get("a"), Some(&2));
    assert_eq!(
        summary.last_event.map(|ts| ts.to_rfc3339()),
        Some("2026-03-01T10:00:04+00:00".to_string())
    );

    let recent = summarize_telemetry_lines(lines, 2);
    assert_eq!(recent.parsed_events, 2);
    assert_eq!(recent.strand_registered, 0);
}

#[test]
fn workflow_factory_returns_fixed_rosters() {
    let expected: [(&str, &[&str]); 5] = [
        (
            "customer-support",
            &["intake", "classifier", "resolver", "quality", "notification"],
        ),
        (
            "ecommerce",
            &["order", "payment", "inventory", "shipping", "notification"],
        ),
        (
            "content",
            &["planner", "writer", "editor", "designer", "publisher"],
        ),
        (
            "hr",
            &["sourcing", "screening", "interview", "assessment", "offer"],
        ),
        ("anything-else", &["input", "processor", "output"]),
    ];

    for (workflow_type, ids) in expected {
        let agents = create_agents_for_workflow(workflow_type, SimulatedWork::DISABLED);
        let actual = agents.iter().map(|a| a.id()).collect::<Vec<_>>();
        assert_eq!(actual, ids.to_vec(), "{workflow_type}");
        for agent in &agents {
            assert_ne!(agent_icon(agent.name()), "🤖", "{}", agent.name());
        }
    }
}

#[test]
fn workflow_strand_is_chained_over_one_memory() {
    let strand = build_workflow_strand("hr", SimulatedWork::DISABLED);
    assert_eq!(strand.name(), "hr_strand");
    assert_eq!(
        strand.edges(),
        vec![
            ("sourcing".to_string(), "screening".to_string()),
            ("screening".to_string(), "interview".to_string()),
            ("interview".to_string(), "assessment".to_string()),
            ("assessment".to_string(), "offer".to_string()),
        ]
    );
    assert!(
        strand
            .agents()
            .iter()
            .all(|agent| agent.memory().same_store(strand.shared_memory()))
    );

    let description = describe_strand(&strand);
    assert_eq!(description.communications.len(), 4);
    let rendered = serde_json::to_value(&description).expect("description should serialize");
    assert_eq!(rendered["systemName"], json!("hr_strand"));
    assert_eq!(
        rendered["communications"][0]["trigger"],
        json!("on-completion"),
    );
}

#[tokio::test]
async fn sequential_scenario_appends_in_order() {
    let system = Orchestrator::new("scenario");
    system.add_strand(Strand::new("ab", vec![appending_agent("A"), appending_agent("B")]));

    let run = system
        .execute_strand("ab", payload(json!({"x": 1})), "sequential")
        .await
        .expect("run should succeed");

    assert_eq!(
        run.final_output.map(Value::Object),
        Some(json!({"x": 1, "a": true, "b": true}))
    );
    assert_eq!(run.results[0], payload(json!({"x": 1, "a": true})));
}

#[tokio::test]
async fn customer_support_graph_run_visits_each_agent_once() {
    let system = Orchestrator::new("scenario");
    let strand = system.add_strand(build_workflow_strand(
        "customer-support",
        SimulatedWork::DISABLED,
    ));

    let run = system
        .execute_strand(
            strand.name(),
            payload(json!({"message": "my account profile is broken"})),
            ExecutionMode::Graph.label(),
        )
        .await
        .expect("graph run should succeed");

    assert_eq!(run.results.len(), 5);
    assert!(run.final_output.is_none());
    assert!(run.results[0].contains_key("request_id"));
    let last = run.results.last().expect("results should not be empty");
    assert_eq!(last["category"], json!("account"));
    assert_eq!(last["solution"]["type"], json!("account_update"));
    assert_eq!(last["recipients"], json!(["customer", "support_team"]));
    assert_eq!(
        strand.shared_memory().search_history("intake_data").len(),
        1,
    );
}

#[tokio::test]
async fn parallel_workflow_gives_every_agent_the_same_input() {
    let system = Orchestrator::new("scenario");
    system.add_strand(build_workflow_strand("ecommerce", SimulatedWork::DISABLED));

    let run = system
        .execute_strand(
            "ecommerce_strand",
            payload(json!({"order": 42})),
            "parallel",
        )
        .await
        .expect("parallel run should succeed");

    assert_eq!(run.results.len(), 5);
    assert_eq!(run.results[0]["original_data"], json!({"order": 42}));
    for output in &run.results[1..] {
        assert_eq!(output["order"], json!(42));
        assert!(!output.contains_key("request_id"));
    }
}

#[tokio::test]
async fn execute_with_telemetry_records_outcomes() {
    let dir = tempdir().expect("temp directory should create");
    let mut cfg = base_cfg();
    cfg.telemetry_enabled = true;
    let path = dir.path().join("events.jsonl");
    cfg.telemetry_path = path.to_string_lossy().to_string();
    let telemetry = TelemetrySink::new(&cfg, "test".to_string());

    let system = Orchestrator::new("telemetry");
    register_strand(
        &system,
        build_workflow_strand("generic", cfg.simulated_work()),
        &telemetry,
    );

    execute_with_telemetry(
        &system,
        "generic_strand",
        payload(json!({"a": 1})),
        "sequential",
        &telemetry,
    )
    .await
    .expect("run should succeed");
    let err = execute_with_telemetry(
        &system,
        "generic_strand",
        Payload::new(),
        "sequential",
        &telemetry,
    )
    .await
    .expect_err("empty input should fail");
    assert!(!err.is_reported());
    let err = execute_with_telemetry(
        &system,
        "generic_strand",
        Payload::new(),
        "fanout",
        &telemetry,
    )
    .await
    .expect_err("unknown mode should be reported");
    assert!(matches!(err, DispatchError::UnknownMode { .. }));

    let lines = read_lines(std::path::Path::new(&cfg.telemetry_path));
    let summary = summarize_telemetry_lines(lines, 100);
    assert_eq!(summary.strand_registered, 1);
    assert_eq!(summary.strand_completed, 1);
    assert_eq!(summary.strand_failed, 2);
    assert_eq!(summary.strand_counts.get("generic_strand"), Some(&4));
}

#[tokio::test]
async fn dispatch_errors_render_through_cli_formatter() {
    let system = Orchestrator::new("cli");
    let err = system
        .execute_strand("ghost", Payload::new(), "sequential")
        .await
        .expect_err("missing strand should be reported");
    let err = anyhow::Error::from(err);
    let rendered = format_cli_error(&err);
    assert!(rendered.starts_with("[INPUT] Strand ghost not found"));
}

#[test]
fn messages_flow_between_strand_agents() {
    let strand = build_workflow_strand("generic", SimulatedWork::DISABLED);
    let sender = strand.agent("input").expect("input agent should exist");
    let receiver = strand.agent("output").expect("output agent should exist");

    let message = sender.send_message(receiver.id(), payload(json!({"hello": "world"})));
    receiver.receive_message(message);

    let delivered = receiver.next_message().expect("message should be queued");
    assert_eq!(delivered.sender, "input");
    assert_eq!(delivered.content["hello"], json!("world"));
    assert_eq!(receiver.pending_messages(), 0);
}

#[test]
fn command_labels_are_stable() {
    let run = Commands::Run {
        workflow: "hr".to_string(),
        mode: "graph".to_string(),
        input: None,
        logs: false,
    };
    assert_eq!(command_label(&run), "run.graph");
    assert_eq!(
        command_label(&Commands::Telemetry {
            command: TelemetryCommands::Report {
                path: None,
                limit: 10
            }
        }),
        "telemetry.report"
    );
}
