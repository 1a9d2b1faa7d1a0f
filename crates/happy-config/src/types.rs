//! Configuration types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Upper bound for the configured lifespans: 30 days.
pub const MAX_LIFESPAN_SECS: u64 = 30 * 86_400;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HappyConfig {
    /// Users allowed into the admin panel.
    pub admin_ids: Vec<i64>,

    /// Bot API token. Prefer the `HAPPY_BOT_TOKEN` environment variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<BotToken>,

    pub storage: StorageConfig,
    pub i18n: I18nConfig,
    pub pool: PoolSettings,
}

impl HappyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Check value ranges that the type system does not express.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pool.percent_life) {
            return Err(invalid(
                "pool.percent_life",
                format!("{} is not within 0.0..=1.0", self.pool.percent_life),
            ));
        }
        for (field, secs) in [
            ("pool.min_user_lifespan_secs", self.pool.min_user_lifespan_secs),
            ("pool.catalog_ttl_secs", self.pool.catalog_ttl_secs),
        ] {
            if !(1..=MAX_LIFESPAN_SECS).contains(&secs) {
                return Err(invalid(
                    field,
                    format!("{secs} is not within 1..={MAX_LIFESPAN_SECS}"),
                ));
            }
        }
        if self.i18n.default_lang.trim().is_empty() {
            return Err(invalid("i18n.default_lang", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Secret token whose `Debug` and `Display` never reveal the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotToken(String);

impl BotToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the transport layer only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BotToken(***)")
    }
}

impl fmt::Display for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("happy.db3"),
        }
    }
}

/// `[i18n]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
    /// Root of the gettext locale tree.
    pub locales_dir: PathBuf,

    /// Language used when a catalog is missing in the user's language.
    pub default_lang: String,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            locales_dir: PathBuf::from("locales"),
            default_lang: "en".to_string(),
        }
    }
}

/// `[pool]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Shortest time a user session stays in memory after an access.
    pub min_user_lifespan_secs: u64,

    /// Hourly access share above which an hour extends a session's life.
    pub percent_life: f64,

    /// Idle time after which a loaded catalog is dropped.
    pub catalog_ttl_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_user_lifespan_secs: 3_600,
            percent_life: 0.05,
            catalog_ttl_secs: 3_600,
        }
    }
}

impl PoolSettings {
    pub fn min_user_lifespan(&self) -> Duration {
        Duration::from_secs(self.min_user_lifespan_secs)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }
}
