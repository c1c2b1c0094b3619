use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::level_filters::LevelFilter;

use agent_strands::cli::{Cli, Commands, ProfileCommands, TelemetryCommands, command_label};
use agent_strands::config::{load_profiles, resolve_runtime_config};
use agent_strands::error::{categorize_error, format_cli_error};
use agent_strands::profiles::{run_profiles_list, run_profiles_show};
use agent_strands::server::run_server;
use agent_strands::telemetry::{TelemetrySink, run_telemetry_report};
use agent_strands::workflow::{run_workflow_command, run_workflows_list};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(category = %categorize_error(&err).code(), error = %err, "command failed");
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;
    let command = command_label(&cli.command);
    let telemetry = TelemetrySink::new(&cfg, command.clone());
    tracing::info!(profile = %cfg.profile, command = %command, "starting command");

    let outcome = match cli.command {
        Commands::Run {
            workflow,
            mode,
            input,
            logs,
        } => run_workflow_command(&cfg, &telemetry, &workflow, &mode, input.as_deref(), logs).await,
        Commands::Workflows => run_workflows_list(),
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| cfg.host.clone());
            let port = port.unwrap_or(cfg.port);
            run_server(cfg.clone(), host, port, &telemetry).await
        }
        Commands::Profiles { command } => match command {
            ProfileCommands::List => run_profiles_list(&profiles, &cfg),
            ProfileCommands::Show => run_profiles_show(&cfg),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { path, limit } => run_telemetry_report(&cfg, path, limit),
        },
    };

    match &outcome {
        Ok(()) => telemetry.emit("command.completed", json!({})),
        Err(err) => telemetry.emit(
            "command.failed",
            json!({
                "category": categorize_error(err).code(),
                "error": format!("{err:#}"),
            }),
        ),
    }
    outcome
}

fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
