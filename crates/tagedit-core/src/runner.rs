use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No command configured")]
    EmptyCommand,
    #[error("Invalid command line {0:?}: unbalanced quotes")]
    InvalidCommandLine(String),
}

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs one backend command to completion.
///
/// Arguments are handed over as a list and never pass through a shell, so
/// file names and tag values reach the backend exactly as given.
pub trait CommandRunner {
    fn run(&self, args: &[String]) -> Result<CommandOutput, RunnerError>;
}

/// Runs the backend as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    leading_args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Builds a runner from a user supplied command line such as
    /// `"sudo -u media tmsu"`.
    pub fn from_command_line(raw: &str) -> Result<Self, RunnerError> {
        let parts = shell_words::split(raw)
            .map_err(|_| RunnerError::InvalidCommandLine(raw.to_string()))?;
        let mut parts = parts.into_iter();
        let program = parts.next().ok_or(RunnerError::EmptyCommand)?;
        Ok(Self {
            program: PathBuf::from(program),
            leading_args: parts.collect(),
            env: BTreeMap::new(),
        })
    }

    /// Locates `name` on `PATH`.
    pub fn discover(name: &str) -> Option<Self> {
        which::which(name).ok().map(Self::new)
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    pub fn leading_args(&self) -> &[String] {
        &self.leading_args
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, args: &[String]) -> Result<CommandOutput, RunnerError> {
        tracing::debug!(program = %self.program.display(), ?args, "run backend command");
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .envs(&self.env)
            .output()
            .map_err(|source| RunnerError::Spawn {
                program: self.program.to_string_lossy().to_string(),
                source,
            })?;
        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        if !result.success() {
            tracing::debug!(code = ?result.code, stderr = %result.stderr, "backend command failed");
        }
        Ok(result)
    }
}
