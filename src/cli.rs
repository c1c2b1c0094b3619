use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

#[derive(Debug, Subcommand)]
pub enum TelemetryCommands {
    #[command(about = "Summarize telemetry events from a JSONL stream")]
    Report {
        #[arg(long)]
        path: Option<String>,
        #[arg(long, default_value_t = 5000)]
        limit: usize,
    },
}

const CLI_EXAMPLES: &str = "Examples:\n\
  agent-strands workflows\n\
  agent-strands run --workflow customer-support --input '{\"issue\": \"urgent billing error\"}'\n\
  agent-strands run --workflow ecommerce --mode parallel --logs\n\
  agent-strands run --workflow hr --mode graph\n\
  agent-strands --profile dev serve --port 8000\n\
  agent-strands --simulate-work false run --workflow content\n\
  agent-strands profiles show\n\
  agent-strands telemetry report --limit 2000\n\
\n\
Execution modes:\n\
  - sequential: each agent receives the previous agent's output.\n\
  - parallel: every agent receives the same input; the first failure fails the run.\n\
  - graph: depth-first walk of the communication graph from the first agent.";

#[derive(Debug, Parser)]
#[command(name = "agent-strands")]
#[command(about = "Multi-agent strand orchestrator with sequential, parallel and graph execution")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "STRANDS_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "STRANDS_CONFIG", default_value = ".strands/config.toml")]
    pub config_path: String,

    #[arg(long, env = "STRANDS_SYSTEM_NAME")]
    pub system_name: Option<String>,

    #[arg(long, env = "STRANDS_SIMULATE_WORK", action = clap::ArgAction::Set)]
    pub simulate_work: Option<bool>,

    #[arg(long, env = "STRANDS_WORK_SCALE")]
    pub work_scale: Option<f64>,

    #[arg(long, env = "STRANDS_LOG_LIMIT")]
    pub log_limit: Option<usize>,

    #[arg(long, env = "STRANDS_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "STRANDS_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Build a workflow strand, execute it once and print the result")]
    Run {
        #[arg(long, default_value = "customer-support")]
        workflow: String,
        #[arg(long, default_value = "sequential")]
        mode: String,
        #[arg(long, help = "JSON object passed to the first agent")]
        input: Option<String>,
        #[arg(long, default_value_t = false, help = "Print the merged agent logs")]
        logs: bool,
    },
    #[command(about = "List workflow types and the agents each one creates")]
    Workflows,
    #[command(about = "Run the HTTP API over a single orchestrator")]
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    #[command(about = "Telemetry utilities and reporting")]
    Telemetry {
        #[command(subcommand)]
        command: TelemetryCommands,
    },
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Run { mode, .. } => format!("run.{mode}"),
        Commands::Workflows => "workflows".to_string(),
        Commands::Serve { .. } => "serve".to_string(),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { .. } => "telemetry.report".to_string(),
        },
    }
}
