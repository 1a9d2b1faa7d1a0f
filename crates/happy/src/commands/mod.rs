//! CLI command handlers.

pub mod langs;
pub mod translate;
pub mod user;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use happy_bot::BotContext;
use happy_config::{HappyConfig, load_config};
use tracing::{debug, warn};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Config file given on the command line.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Discover and load the configuration.
    pub fn config(&self) -> Result<HappyConfig> {
        let loaded = load_config(self.config_path.as_deref()).context("failed to load config")?;
        for warning in &loaded.warnings {
            warn!("{warning}");
        }
        match &loaded.source {
            Some(path) => debug!("using config {}", path.display()),
            None => debug!("no config file, using defaults"),
        }
        Ok(loaded.config)
    }

    /// Open the bot's store and pools.
    pub fn bot(&self) -> Result<BotContext> {
        let config = self.config()?;
        BotContext::open(config).context("failed to open the bot context")
    }
}
