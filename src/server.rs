use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router as AxumRouter};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use crate::agents::agent::{AgentMetrics, LogEntry, Payload};
use crate::agents::orchestrator::{Orchestrator, SystemMetrics};
use crate::agents::strand::RunState;
use crate::config::RuntimeConfig;
use crate::telemetry::TelemetrySink;
use crate::workflow::{
    SystemDescription, build_workflow_strand, describe_strand, execute_with_telemetry,
    register_strand, tail,
};

#[derive(Clone)]
pub struct ServerState {
    pub cfg: RuntimeConfig,
    pub system: Arc<Orchestrator>,
    pub telemetry: TelemetrySink,
}

impl ServerState {
    pub fn new(cfg: RuntimeConfig, telemetry: TelemetrySink) -> Self {
        let system = Arc::new(Orchestrator::new(cfg.system_name.clone()));
        Self {
            cfg,
            system,
            telemetry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServerHealthResponse {
    pub status: &'static str,
    pub system_name: String,
    pub profile: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub workflow_description: String,
    #[serde(default = "default_workflow_type")]
    pub workflow_type: String,
}

fn default_workflow_type() -> String {
    "customer-support".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub strand_name: String,
    #[serde(default)]
    pub input_data: Payload,
    #[serde(default = "default_execution_mode")]
    pub execution_mode: String,
}

fn default_execution_mode() -> String {
    "sequential".to_string()
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub total_logs: usize,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Serialize)]
pub struct StrandAgentSummary {
    pub id: String,
    pub name: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StrandSummary {
    pub name: String,
    pub agent_count: usize,
    pub last_run: RunState,
    pub agents: Vec<StrandAgentSummary>,
}

#[derive(Debug, Serialize)]
pub struct StrandsResponse {
    pub total_strands: usize,
    pub strands: Vec<StrandSummary>,
}

#[derive(Debug, Serialize)]
pub struct StrandMetricsResponse {
    pub strand_name: String,
    pub metrics: Vec<AgentMetrics>,
}

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

pub async fn handle_root() -> Json<Value> {
    Json(json!({
        "message": "Multi-Agent System API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "generate": "/api/generate",
            "execute": "/api/execute",
            "metrics": "/api/metrics",
            "logs": "/api/logs",
            "strands": "/api/strands"
        }
    }))
}

pub async fn handle_server_health(
    State(state): State<Arc<ServerState>>,
) -> Json<ServerHealthResponse> {
    Json(ServerHealthResponse {
        status: "ok",
        system_name: state.system.name().to_string(),
        profile: state.cfg.profile.clone(),
    })
}

pub async fn handle_generate(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<SystemDescription> {
    let workflow_type = request.workflow_type.trim();
    if workflow_type.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "workflow_type cannot be empty",
        ));
    }

    tracing::info!(
        workflow_type = %workflow_type,
        description_chars = request.workflow_description.chars().count(),
        "generating workflow strand"
    );
    let strand = register_strand(
        &state.system,
        build_workflow_strand(workflow_type, state.cfg.simulated_work()),
        &state.telemetry,
    );
    Ok(Json(describe_strand(&strand)))
}

/// Reported dispatch errors answer 200 with `success: false`; agent
/// failures answer 500.
pub async fn handle_execute(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult<Value> {
    let outcome = execute_with_telemetry(
        &state.system,
        &request.strand_name,
        request.input_data,
        &request.execution_mode,
        &state.telemetry,
    )
    .await;

    match outcome {
        Ok(run) => Ok(Json(json!({
            "success": true,
            "result": run,
            "execution_mode": request.execution_mode,
        }))),
        Err(err) if err.is_reported() => Ok(Json(json!({
            "success": false,
            "error": err.to_string(),
            "execution_mode": request.execution_mode,
        }))),
        Err(err) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())),
    }
}

pub async fn handle_metrics(State(state): State<Arc<ServerState>>) -> Json<SystemMetrics> {
    Json(state.system.system_metrics())
}

/// `limit=0` returns every entry.
pub async fn handle_logs(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<LogsQuery>,
) -> Json<LogsResponse> {
    let limit = query.limit.unwrap_or(state.cfg.log_limit);
    let mut logs = state.system.system_logs();
    if limit > 0 {
        logs = tail(logs, limit);
    }
    Json(LogsResponse {
        total_logs: logs.len(),
        logs,
    })
}

pub async fn handle_strands(State(state): State<Arc<ServerState>>) -> Json<StrandsResponse> {
    let strands = state
        .system
        .strands()
        .iter()
        .map(|strand| StrandSummary {
            name: strand.name().to_string(),
            agent_count: strand.agents().len(),
            last_run: strand.last_run_state(),
            agents: strand
                .agents()
                .iter()
                .map(|agent| StrandAgentSummary {
                    id: agent.id().to_string(),
                    name: agent.name().to_string(),
                    status: agent.status().label(),
                })
                .collect(),
        })
        .collect::<Vec<_>>();

    Json(StrandsResponse {
        total_strands: strands.len(),
        strands,
    })
}

pub async fn handle_strand_metrics(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> ApiResult<StrandMetricsResponse> {
    let strand = state
        .system
        .strand(&name)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Strand not found"))?;
    Ok(Json(StrandMetricsResponse {
        strand_name: name,
        metrics: strand.all_metrics(),
    }))
}

pub async fn handle_delete_strand(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> ApiResult<Value> {
    state
        .system
        .delete_strand(&name)
        .map_err(|_| api_error(StatusCode::NOT_FOUND, "Strand not found"))?;
    state
        .telemetry
        .emit("strand.deleted", json!({ "strand": name.clone() }));
    Ok(Json(json!({
        "success": true,
        "message": format!("Strand {name} deleted"),
    })))
}

pub fn build_server_router(state: Arc<ServerState>) -> AxumRouter {
    AxumRouter::new()
        .route("/", get(handle_root))
        .route("/healthz", get(handle_server_health))
        .route("/api/generate", post(handle_generate))
        .route("/api/execute", post(handle_execute))
        .route("/api/metrics", get(handle_metrics))
        .route("/api/logs", get(handle_logs))
        .route("/api/strands", get(handle_strands))
        .route("/api/strand/{name}/metrics", get(handle_strand_metrics))
        .route("/api/strand/{name}", delete(handle_delete_strand))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(
    cfg: RuntimeConfig,
    host: String,
    port: u16,
    telemetry: &TelemetrySink,
) -> Result<()> {
    let addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid server bind address '{}:{}'", host, port))?;
    let state = Arc::new(ServerState::new(cfg.clone(), telemetry.clone()));

    telemetry.emit(
        "server.started",
        json!({
            "host": host,
            "port": port,
            "profile": cfg.profile,
            "system_name": cfg.system_name,
            "simulate_work": cfg.simulate_work,
        }),
    );
    tracing::info!(%addr, profile = %cfg.profile, "server starting");

    println!(
        "Server mode listening on http://{} (health: /healthz, api: /api/generate, /api/execute)",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind server listener")?;
    axum::serve(listener, build_server_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server runtime failed")
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { println!("\nReceived Ctrl+C, shutting down gracefully..."); }
        _ = terminate => { println!("\nReceived SIGTERM, shutting down gracefully..."); }
    }
}
