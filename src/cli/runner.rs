//! CLI runner - executes commands

use std::sync::Arc;

use tracing::info;

use crate::catalog::Catalog;
use crate::cli::commands::{Cli, Commands};
use crate::client::HttpMarketoClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputChannel;
use crate::state::State;
use crate::sync::Syncer;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check { config_json } => self.check(config_json.as_deref()).await,
            Commands::Sync { config_json } => self.sync(config_json.as_deref()).await,
        }
    }

    /// Load configuration, preferring inline JSON over the config file
    fn load_config(&self, inline: Option<&str>) -> Result<Config> {
        if let Some(json) = inline {
            return Config::from_json(json);
        }
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Config file not specified (use --config)"))?;
        Config::from_file(path)
    }

    fn load_catalog(&self) -> Result<Catalog> {
        let path = self
            .cli
            .catalog
            .as_ref()
            .ok_or_else(|| Error::catalog("Catalog file not specified (use --catalog)"))?;
        Catalog::from_file(path)
    }

    /// Load state, preferring inline JSON; with neither flag the sync
    /// starts from scratch
    fn load_state(&self) -> Result<State> {
        if let Some(json) = &self.cli.state_json {
            return State::from_json(json);
        }
        match &self.cli.state {
            Some(path) => State::from_file(path),
            None => Ok(State::new()),
        }
    }

    async fn check(&self, config_json: Option<&str>) -> Result<()> {
        let config = self.load_config(config_json)?;
        let client = HttpMarketoClient::new(config)?;
        client.check_credentials().await?;
        info!("Connection check passed");
        Ok(())
    }

    async fn sync(&self, config_json: Option<&str>) -> Result<()> {
        let config = self.load_config(config_json)?;
        let catalog = self.load_catalog()?;
        let state = self.load_state()?;

        // Fail fast on bad credentials before any stream starts.
        let client = Arc::new(HttpMarketoClient::new(config.clone())?);
        client.check_credentials().await?;

        let mut syncer = Syncer::new(client, catalog, &config, state, OutputChannel::stdout());
        syncer.run().await
    }
}
