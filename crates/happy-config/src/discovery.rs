//! Config file discovery.
//!
//! The first existing file wins, in order:
//! 1. An explicit path (usually `--config`)
//! 2. The `HAPPY_CONFIG` environment variable
//! 3. `<config_dir>/happy/config.toml` (platform user config dir)
//! 4. `./happy.toml` (project-local)
//!
//! Explicitly named files must exist. When no discovered file exists the
//! defaults are used.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{BotToken, ConfigError, HappyConfig, Result};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "HAPPY_CONFIG";

/// Environment variable holding the bot token. Overrides the config file.
pub const TOKEN_ENV: &str = "HAPPY_BOT_TOKEN";

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "happy.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "happy";

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: HappyConfig,
    /// File the config was read from; `None` when the defaults are used.
    pub source: Option<PathBuf>,
    /// Warnings generated during loading (e.g., a plaintext token).
    pub warnings: Vec<String>,
}

/// Discover and load the configuration.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let env_path = std::env::var_os(CONFIG_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    let env_token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());

    let mut loaded = discover(Discovery {
        explicit,
        env_path: env_path.as_deref(),
        user_path: user_config_path().as_deref(),
        project_path: Path::new(PROJECT_CONFIG_FILE),
    })?;

    if let Some(token) = env_token {
        loaded.config.bot_token = Some(BotToken::new(token));
    }
    Ok(loaded)
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<HappyConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    HappyConfig::from_toml(&contents)
}

/// Path of the per-user config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME).join(USER_CONFIG_FILE))
}

/// Candidate locations, highest precedence first.
struct Discovery<'a> {
    explicit: Option<&'a Path>,
    env_path: Option<&'a Path>,
    user_path: Option<&'a Path>,
    project_path: &'a Path,
}

fn discover(candidates: Discovery<'_>) -> Result<LoadedConfig> {
    let required = candidates.explicit.or(candidates.env_path);
    let path = match required {
        Some(path) => Some(path),
        None => [candidates.user_path, Some(candidates.project_path)]
            .into_iter()
            .flatten()
            .find(|path| path.is_file()),
    };

    let Some(path) = path else {
        debug!("no config file found, using defaults");
        return Ok(LoadedConfig {
            config: HappyConfig::default(),
            source: None,
            warnings: Vec::new(),
        });
    };

    let config = load_config_file(path)?;
    debug!("config loaded from {}", path.display());

    let mut warnings = Vec::new();
    if config.bot_token.is_some() {
        warnings.push(format!(
            "{} contains a plaintext bot token. Consider setting {TOKEN_ENV} instead.",
            path.display()
        ));
    }

    Ok(LoadedConfig {
        config,
        source: Some(path.to_path_buf()),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_user_config_path_shape() {
        if let Some(path) = user_config_path() {
            assert!(path.ends_with("happy/config.toml"));
        }
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let explicit = write(&dir, "explicit.toml", "admin_ids = [1]");
        let env = write(&dir, "env.toml", "admin_ids = [2]");
        let project = write(&dir, "happy.toml", "admin_ids = [3]");

        let loaded = discover(Discovery {
            explicit: Some(&explicit),
            env_path: Some(&env),
            user_path: None,
            project_path: &project,
        })
        .unwrap();
        assert_eq!(loaded.config.admin_ids, vec![1]);
        assert_eq!(loaded.source.as_deref(), Some(explicit.as_path()));
    }

    #[test]
    fn test_env_path_before_discovered_files() {
        let dir = TempDir::new().unwrap();
        let env = write(&dir, "env.toml", "admin_ids = [2]");
        let user = write(&dir, "user.toml", "admin_ids = [4]");
        let project = write(&dir, "happy.toml", "admin_ids = [3]");

        let loaded = discover(Discovery {
            explicit: None,
            env_path: Some(&env),
            user_path: Some(&user),
            project_path: &project,
        })
        .unwrap();
        assert_eq!(loaded.config.admin_ids, vec![2]);
    }

    #[test]
    fn test_user_config_before_project_file() {
        let dir = TempDir::new().unwrap();
        let user = write(&dir, "user.toml", "admin_ids = [4]");
        let project = write(&dir, "happy.toml", "admin_ids = [3]");

        let loaded = discover(Discovery {
            explicit: None,
            env_path: None,
            user_path: Some(&user),
            project_path: &project,
        })
        .unwrap();
        assert_eq!(loaded.config.admin_ids, vec![4]);

        let absent = dir.path().join("absent.toml");
        let loaded = discover(Discovery {
            explicit: None,
            env_path: None,
            user_path: Some(&absent),
            project_path: &project,
        })
        .unwrap();
        assert_eq!(loaded.config.admin_ids, vec![3]);
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = discover(Discovery {
            explicit: None,
            env_path: None,
            user_path: None,
            project_path: &dir.path().join("happy.toml"),
        })
        .unwrap();
        assert_eq!(loaded.config, HappyConfig::default());
        assert!(loaded.source.is_none());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = discover(Discovery {
            explicit: Some(&missing),
            env_path: None,
            user_path: None,
            project_path: &dir.path().join("happy.toml"),
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_unparsable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let project = write(&dir, "happy.toml", "admin_ids = \"not a list\"");
        let err = discover(Discovery {
            explicit: None,
            env_path: None,
            user_path: None,
            project_path: &project,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_plaintext_token_warns() {
        let dir = TempDir::new().unwrap();
        let project = write(&dir, "happy.toml", "bot_token = \"123:abc\"");
        let loaded = discover(Discovery {
            explicit: None,
            env_path: None,
            user_path: None,
            project_path: &project,
        })
        .unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains(TOKEN_ENV));
    }
}
