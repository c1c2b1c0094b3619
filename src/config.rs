use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::agents::specialized::SimulatedWork;
use crate::cli::Cli;

pub const DEFAULT_SYSTEM_NAME: &str = "Global System";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_LOG_LIMIT: usize = 100;
pub const DEFAULT_TELEMETRY_PATH: &str = ".strands/telemetry/events.jsonl";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub system_name: String,
    pub host: String,
    pub port: u16,
    pub simulate_work: bool,
    pub work_scale: f64,
    pub log_limit: usize,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
}

impl RuntimeConfig {
    pub fn simulated_work(&self) -> SimulatedWork {
        SimulatedWork::new(self.simulate_work, self.work_scale)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub system_name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub simulate_work: Option<bool>,
    pub work_scale: Option<f64>,
    pub log_limit: Option<usize>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check field names and value types.",
            path.display()
        )
    })
}

/// CLI flag, then profile value, then built-in default.
pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!("profile name cannot be empty. Set --profile <name>."));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    let work_scale = cli.work_scale.or(profile.work_scale).unwrap_or(1.0);
    if !work_scale.is_finite() || work_scale < 0.0 {
        return Err(anyhow::anyhow!(
            "invalid value for work_scale: {work_scale}. Use a non-negative number."
        ));
    }

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        system_name: cli
            .system_name
            .clone()
            .or(profile.system_name)
            .unwrap_or_else(|| DEFAULT_SYSTEM_NAME.to_string()),
        host: profile.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: profile.port.unwrap_or(DEFAULT_PORT),
        simulate_work: cli.simulate_work.or(profile.simulate_work).unwrap_or(true),
        work_scale,
        log_limit: cli
            .log_limit
            .or(profile.log_limit)
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .max(1),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(true),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| DEFAULT_TELEMETRY_PATH.to_string()),
    })
}
