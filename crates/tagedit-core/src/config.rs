use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runner::{ProcessRunner, RunnerError};

pub const CONFIG_FILENAME: &str = ".tagedit.toml";
pub const TMSU_BINARY: &str = "tmsu";
pub const ENV_HOME: &str = "TAGEDIT_HOME";
pub const ENV_TMSU_CMD: &str = "TAGEDIT_TMSU_CMD";
pub const ENV_DATABASE: &str = "TAGEDIT_DATABASE";
/// Variable tmsu reads to pick its database.
pub const TMSU_DB_ENV: &str = "TMSU_DB";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("tmsu executable not found!")]
    ExecutableNotFound,
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TageditConfig {
    /// Command line used to run tmsu, e.g. `"tmsu"` or `"sudo -u media tmsu"`.
    pub tmsu_command: Option<String>,
    /// Database file handed to tmsu through `TMSU_DB`.
    pub database: Option<String>,
}

impl TageditConfig {
    /// Fills unset fields from `fallback`.
    pub fn or(self, fallback: TageditConfig) -> TageditConfig {
        TageditConfig {
            tmsu_command: self.tmsu_command.or(fallback.tmsu_command),
            database: self.database.or(fallback.database),
        }
    }

    pub fn from_env_map(env_map: &HashMap<String, String>) -> TageditConfig {
        let read = |key: &str| {
            env_map
                .get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        TageditConfig {
            tmsu_command: read(ENV_TMSU_CMD),
            database: read(ENV_DATABASE),
        }
    }
}

pub fn resolve_user_home_dir(env_map: &HashMap<String, String>) -> Option<PathBuf> {
    for key in ["HOME", "USERPROFILE"] {
        if let Some(value) = env_map.get(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
    }
    None
}

pub fn resolve_tagedit_home_dir(env_map: &HashMap<String, String>) -> Option<PathBuf> {
    if let Some(value) = env_map.get(ENV_HOME) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir(env_map).map(|home| home.join(".tagedit"))
}

pub fn global_config_path(env_map: &HashMap<String, String>) -> Option<PathBuf> {
    resolve_tagedit_home_dir(env_map).map(|home| home.join("config.toml"))
}

/// Nearest ancestor of `start` holding a `.tagedit.toml`.
pub fn find_config_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .find(|candidate| candidate.join(CONFIG_FILENAME).is_file())
        .map(Path::to_path_buf)
}

pub fn load_config_file(path: &Path) -> Result<Option<TageditConfig>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let config = toml::from_str::<TageditConfig>(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(config))
}

pub fn load_project_config(start: &Path) -> Result<Option<TageditConfig>, ConfigError> {
    match find_config_root(start) {
        Some(root) => load_config_file(&root.join(CONFIG_FILENAME)),
        None => Ok(None),
    }
}

pub fn load_global_config(
    env_map: &HashMap<String, String>,
) -> Result<Option<TageditConfig>, ConfigError> {
    match global_config_path(env_map) {
        Some(path) => load_config_file(&path),
        None => Ok(None),
    }
}

/// Layers `explicit` (command-line flags) over the environment, the project
/// file found from `start`, and the global file.
pub fn resolve_config(
    start: &Path,
    explicit: TageditConfig,
    env_map: Option<HashMap<String, String>>,
) -> Result<TageditConfig, ConfigError> {
    let env_map = env_map.unwrap_or_else(|| env::vars().collect());
    let project = load_project_config(start)?.unwrap_or_default();
    let global = load_global_config(&env_map)?.unwrap_or_default();
    Ok(explicit
        .or(TageditConfig::from_env_map(&env_map))
        .or(project)
        .or(global))
}

/// Runner for the configured tmsu command, or the `tmsu` found on `PATH`.
pub fn build_runner(config: &TageditConfig) -> Result<ProcessRunner, ConfigError> {
    let runner = match config.tmsu_command.as_deref() {
        Some(command) => ProcessRunner::from_command_line(command)?,
        None => ProcessRunner::discover(TMSU_BINARY).ok_or(ConfigError::ExecutableNotFound)?,
    };
    Ok(match config.database.as_deref() {
        Some(database) => runner.with_env(TMSU_DB_ENV, database),
        None => runner,
    })
}
