use std::path::PathBuf;

use clap::Parser;

use crate::config::tracker::{load_tracker_config, TrackerConfig};
use crate::error::Result;

// Define command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the tracker configuration YAML file. Defaults apply when omitted.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Processing update WebSocket endpoint (overrides the config file)
    #[arg(long)]
    pub ws_url: Option<String>,

    /// REST API base URL used for uploads (overrides the config file)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Bearer token for the backend
    #[arg(long, env = "DOCPULSE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Files to upload and track
    #[arg(short = 'u', long = "upload", num_args = 1..)]
    pub upload: Vec<PathBuf>,

    /// Exit once every tracked document is indexed or failed
    #[arg(long)]
    pub exit_when_idle: bool,

    /// Optional: Port for the Prometheus metrics HTTP endpoint
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub validate_config: bool,
}

impl Args {
    /// Loads the config file (if any), applies command-line overrides, and validates.
    pub fn resolve_config(&self) -> Result<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => load_tracker_config(path)?,
            None => TrackerConfig::default(),
        };
        if let Some(ws_url) = &self.ws_url {
            config.backend.ws_url = ws_url.clone();
        }
        if let Some(api_url) = &self.api_url {
            config.backend.api_url = api_url.clone();
        }
        if let Some(token) = &self.token {
            config.backend.token = Some(token.clone());
        }
        config.validate()?;
        Ok(config)
    }
}
