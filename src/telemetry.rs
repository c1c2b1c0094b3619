use std::collections::{BTreeSet, HashMap};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::RuntimeConfig;

/// One line of the telemetry file. Event-specific keys sit next to the
/// envelope keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub ts: DateTime<Utc>,
    pub event: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub command: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TelemetryEvent {
    pub fn strand(&self) -> Option<&str> {
        self.fields
            .get("strand")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }
}

/// JSONL sink shared by every task of one command. Write failures are
/// logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    enabled: bool,
    path: PathBuf,
    run_id: String,
    command: String,
    writer: Arc<Mutex<()>>,
}

impl TelemetrySink {
    pub fn new(cfg: &RuntimeConfig, command: String) -> Self {
        Self {
            enabled: cfg.telemetry_enabled,
            path: PathBuf::from(&cfg.telemetry_path),
            run_id: Uuid::new_v4().to_string(),
            command,
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&self, event: &str, payload: Value) {
        if !self.enabled {
            return;
        }

        let fields = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let record = TelemetryEvent {
            ts: Utc::now(),
            event: event.to_string(),
            run_id: self.run_id.clone(),
            command: self.command.clone(),
            fields,
        };

        if let Err(err) = self.append(&record) {
            tracing::warn!(
                event,
                path = %self.path.display(),
                error = %err,
                "telemetry write failed"
            );
        }
    }

    fn append(&self, record: &TelemetryEvent) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create telemetry directory '{}'", parent.display())
            })?;
        }

        let mut line = serde_json::to_string(record)
            .with_context(|| format!("failed to serialize telemetry event '{}'", record.event))?;
        line.push('\n');

        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .with_context(|| format!("failed to append to '{}'", self.path.display()))
    }
}

#[derive(Debug, Default)]
pub struct TelemetrySummary {
    pub total_lines: usize,
    pub parsed_events: usize,
    pub parse_errors: usize,
    pub unique_runs: BTreeSet<String>,
    pub command_counts: HashMap<String, usize>,
    pub command_completed: usize,
    pub command_failed: usize,
    /// Events per strand name, any event type.
    pub strand_counts: HashMap<String, usize>,
    pub strand_registered: usize,
    pub strand_completed: usize,
    pub strand_failed: usize,
    pub strand_deleted: usize,
    pub last_event: Option<DateTime<Utc>>,
}

impl TelemetrySummary {
    fn record(&mut self, event: TelemetryEvent) {
        self.parsed_events += 1;

        if !event.run_id.is_empty() {
            self.unique_runs.insert(event.run_id.clone());
        }
        if !event.command.is_empty() {
            bump(&mut self.command_counts, &event.command);
        }
        if let Some(strand) = event.strand() {
            bump(&mut self.strand_counts, strand);
        }
        self.last_event = Some(self.last_event.map_or(event.ts, |last| last.max(event.ts)));

        match event.event.as_str() {
            "command.completed" => self.command_completed += 1,
            "command.failed" => self.command_failed += 1,
            "strand.registered" => self.strand_registered += 1,
            "strand.completed" => self.strand_completed += 1,
            "strand.failed" => self.strand_failed += 1,
            "strand.deleted" => self.strand_deleted += 1,
            _ => {}
        }
    }
}

fn bump(counts: &mut HashMap<String, usize>, key: &str) {
    *counts.entry(key.to_string()).or_default() += 1;
}

/// Summarize the most recent `limit` lines.
pub fn summarize_telemetry_lines(lines: Vec<String>, limit: usize) -> TelemetrySummary {
    let mut summary = TelemetrySummary {
        total_lines: lines.len(),
        ..TelemetrySummary::default()
    };

    for line in lines.iter().rev().take(limit.max(1)) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TelemetryEvent>(line) {
            Ok(event) => summary.record(event),
            Err(_) => summary.parse_errors += 1,
        }
    }

    summary
}

fn read_telemetry_lines(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open telemetry file '{}'", path.display()))?;
    BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read telemetry file '{}'", path.display()))
}

pub fn run_telemetry_report(
    cfg: &RuntimeConfig,
    path_override: Option<String>,
    limit: usize,
) -> Result<()> {
    let path = PathBuf::from(path_override.unwrap_or_else(|| cfg.telemetry_path.clone()));
    if !path.exists() {
        println!("No telemetry file found at '{}'.", path.display());
        return Ok(());
    }

    let summary = summarize_telemetry_lines(read_telemetry_lines(&path)?, limit);

    println!("Telemetry report");
    println!("Path: {}", path.display());
    println!("Lines in file: {}", summary.total_lines);
    println!(
        "Events analyzed: {} (parse_errors={})",
        summary.parsed_events, summary.parse_errors
    );
    println!("Unique runs: {}", summary.unique_runs.len());
    println!(
        "Command outcomes: completed={} failed={}",
        summary.command_completed, summary.command_failed
    );
    println!(
        "Strand lifecycle: registered={} completed={} failed={} deleted={}",
        summary.strand_registered,
        summary.strand_completed,
        summary.strand_failed,
        summary.strand_deleted
    );

    print_top("Top commands:", &summary.command_counts);
    print_top("Top strands:", &summary.strand_counts);

    if let Some(last) = summary.last_event {
        println!("Last event: {}", last.to_rfc3339());
    }

    Ok(())
}

fn print_top(title: &str, counts: &HashMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    let mut ranked = counts.iter().collect::<Vec<_>>();
    ranked.sort_by_key(|(name, count)| (std::cmp::Reverse(**count), (*name).clone()));
    println!("{title}");
    for (name, count) in ranked.into_iter().take(5) {
        println!("- {name}: {count}");
    }
}
