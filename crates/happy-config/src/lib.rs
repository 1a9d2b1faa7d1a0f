//! Configuration system for the Happy bot.
//!
//! Provides TOML-based configuration with:
//! - Bot identity (`bot_token`, `admin_ids`)
//! - Storage, locale and pool lifetime sections
//! - Config file discovery (explicit path, `HAPPY_CONFIG`, user config dir,
//!   project-local `happy.toml`)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    CONFIG_ENV, LoadedConfig, TOKEN_ENV, load_config, load_config_file, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
