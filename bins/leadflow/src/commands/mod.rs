//! CLI command implementations

pub mod auth;
pub mod request;

use anyhow::{Context as _, Result};
use leadflow_api_client::{ApiClient, ClientConfig};
use leadflow_core::config::Config;
use leadflow_telemetry::TelemetryConfig;

/// Everything a command needs: the loaded configuration and a client
pub struct Context {
    pub client: ApiClient,
    pub json: bool,
    pub verbose: bool,
}

impl Context {
    /// Load configuration, start logging, and build the client
    pub fn load(config_path: Option<&str>, verbose: bool, format: &str) -> Result<Self> {
        let config = Config::load(config_path).context("Failed to load configuration")?;

        let mut telemetry = TelemetryConfig::from(&config.schema.telemetry);
        if verbose {
            telemetry.log_level = "debug".to_string();
        }
        leadflow_telemetry::init_with_config(telemetry)?;

        if let Some(ref path) = config.path {
            tracing::debug!(path = %path, "Loaded configuration file");
        }

        let client = ApiClient::builder(ClientConfig::from_settings(&config.schema.api))
            .file_token_store()
            .build()
            .context("Failed to build API client")?;

        Ok(Self {
            client,
            json: format == "json",
            verbose,
        })
    }
}
