use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::runner::{CommandOutput, CommandRunner, RunnerError};

/// Exit code tmsu uses when no database can be found.
pub const NO_DATABASE_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    Info,
    ListAllTags,
    ListFileTags,
    Tag,
    Untag,
    Rename,
    ListValues,
    Delete,
}

impl BackendOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendOp::Info => "info",
            BackendOp::ListAllTags => "tags",
            BackendOp::ListFileTags => "tags -n",
            BackendOp::Tag => "tag",
            BackendOp::Untag => "untag",
            BackendOp::Rename => "rename",
            BackendOp::ListValues => "values",
            BackendOp::Delete => "delete",
        }
    }
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("tmsu {op} could not be run: {source}")]
    Runner {
        op: BackendOp,
        #[source]
        source: RunnerError,
    },
    #[error("tmsu {op} failed (exit {}): {}", exit_label(.code), stderr_label(.stderr))]
    Failed {
        op: BackendOp,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Unexpected tmsu {op} output: {message}")]
    Parse { op: BackendOp, message: String },
}

impl BackendError {
    pub fn op(&self) -> BackendOp {
        match self {
            BackendError::Runner { op, .. }
            | BackendError::Failed { op, .. }
            | BackendError::Parse { op, .. } => *op,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    code.map(|code| code.to_string())
        .unwrap_or_else(|| "signal".to_string())
}

fn stderr_label(stderr: &str) -> &str {
    if stderr.is_empty() {
        "no error output"
    } else {
        stderr
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub root: String,
    pub size: String,
    pub database: String,
}

/// One tag attached to a file. An empty `value` means the tag carries no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTag {
    pub name: String,
    pub value: String,
}

impl FileTag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Typed operations of the tagging database.
///
/// Every call is blocking and maps to exactly one backend command. Nothing is
/// cached here; callers own whatever snapshot they build from the results.
pub trait TagBackend {
    /// `Ok(None)` when the backend reports that no database exists.
    fn info(&self) -> Result<Option<BackendInfo>, BackendError>;
    fn list_all_tags(&self) -> Result<Vec<String>, BackendError>;
    fn list_file_tags(&self, path: &Path) -> Result<Vec<FileTag>, BackendError>;
    fn tag(&self, path: &Path, name: &str, value: Option<&str>) -> Result<(), BackendError>;
    /// Removing a valued tag needs the same value that was attached.
    fn untag(&self, path: &Path, name: &str, value: Option<&str>) -> Result<(), BackendError>;
    /// Renames a tag for every file in the database.
    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), BackendError>;
    fn list_values(&self, name: Option<&str>) -> Result<Vec<String>, BackendError>;
    /// Deletes a tag from every file in the database.
    fn delete(&self, name: &str) -> Result<(), BackendError>;
}

impl<T: TagBackend + ?Sized> TagBackend for &T {
    fn info(&self) -> Result<Option<BackendInfo>, BackendError> {
        (**self).info()
    }
    fn list_all_tags(&self) -> Result<Vec<String>, BackendError> {
        (**self).list_all_tags()
    }
    fn list_file_tags(&self, path: &Path) -> Result<Vec<FileTag>, BackendError> {
        (**self).list_file_tags(path)
    }
    fn tag(&self, path: &Path, name: &str, value: Option<&str>) -> Result<(), BackendError> {
        (**self).tag(path, name, value)
    }
    fn untag(&self, path: &Path, name: &str, value: Option<&str>) -> Result<(), BackendError> {
        (**self).untag(path, name, value)
    }
    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), BackendError> {
        (**self).rename(old_name, new_name)
    }
    fn list_values(&self, name: Option<&str>) -> Result<Vec<String>, BackendError> {
        (**self).list_values(name)
    }
    fn delete(&self, name: &str) -> Result<(), BackendError> {
        (**self).delete(name)
    }
}

/// tmsu command-line client.
#[derive(Debug, Clone)]
pub struct Tmsu<R> {
    runner: R,
}

impl<R: CommandRunner> Tmsu<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn output(&self, op: BackendOp, args: Vec<String>) -> Result<CommandOutput, BackendError> {
        self.runner
            .run(&args)
            .map_err(|source| BackendError::Runner { op, source })
    }

    fn invoke(&self, op: BackendOp, args: Vec<String>) -> Result<String, BackendError> {
        let output = self.output(op, args)?;
        if !output.success() {
            return Err(BackendError::Failed {
                op,
                code: output.code,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }
}

impl<R: CommandRunner> TagBackend for Tmsu<R> {
    fn info(&self) -> Result<Option<BackendInfo>, BackendError> {
        let output = self.output(BackendOp::Info, vec!["info".to_string()])?;
        if output.code == Some(NO_DATABASE_EXIT_CODE) {
            return Ok(None);
        }
        if !output.success() {
            return Err(BackendError::Failed {
                op: BackendOp::Info,
                code: output.code,
                stderr: output.stderr,
            });
        }
        parse_info(&output.stdout).map(Some)
    }

    fn list_all_tags(&self) -> Result<Vec<String>, BackendError> {
        let raw = self.invoke(BackendOp::ListAllTags, vec!["tags".to_string()])?;
        Ok(non_blank_lines(&raw))
    }

    fn list_file_tags(&self, path: &Path) -> Result<Vec<FileTag>, BackendError> {
        // Without -n, tmsu drops the "<path>:" prefix when stdout is not a
        // terminal, so the output shape would depend on who calls it.
        let path = path_arg(path);
        let raw = self.invoke(
            BackendOp::ListFileTags,
            vec!["tags".to_string(), "-n".to_string(), path.clone()],
        )?;
        parse_file_tags(&raw, &path)
    }

    fn tag(&self, path: &Path, name: &str, value: Option<&str>) -> Result<(), BackendError> {
        self.invoke(
            BackendOp::Tag,
            vec!["tag".to_string(), path_arg(path), tag_arg(name, value)],
        )
        .map(|_| ())
    }

    fn untag(&self, path: &Path, name: &str, value: Option<&str>) -> Result<(), BackendError> {
        self.invoke(
            BackendOp::Untag,
            vec!["untag".to_string(), path_arg(path), tag_arg(name, value)],
        )
        .map(|_| ())
    }

    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), BackendError> {
        self.invoke(
            BackendOp::Rename,
            vec![
                "rename".to_string(),
                old_name.to_string(),
                new_name.to_string(),
            ],
        )
        .map(|_| ())
    }

    fn list_values(&self, name: Option<&str>) -> Result<Vec<String>, BackendError> {
        let mut args = vec!["values".to_string()];
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            args.push(name.to_string());
        }
        let raw = self.invoke(BackendOp::ListValues, args)?;
        Ok(non_blank_lines(&raw))
    }

    fn delete(&self, name: &str) -> Result<(), BackendError> {
        self.invoke(
            BackendOp::Delete,
            vec!["delete".to_string(), name.to_string()],
        )
        .map(|_| ())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// `name` or `name=value`; an empty value is never sent.
pub fn tag_arg(name: &str, value: Option<&str>) -> String {
    match value.filter(|value| !value.is_empty()) {
        Some(value) => format!("{}={}", name, value),
        None => name.to_string(),
    }
}

fn non_blank_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_info(raw: &str) -> Result<BackendInfo, BackendError> {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for line in raw.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim(), value.trim());
        }
    }
    let field = |key: &str| {
        fields
            .get(key)
            .map(|value| value.to_string())
            .ok_or_else(|| BackendError::Parse {
                op: BackendOp::Info,
                message: format!("missing {:?}", key),
            })
    };
    Ok(BackendInfo {
        root: field("Root path")?,
        size: field("Size")?,
        database: field("Database")?,
    })
}

/// Parses `"<path>: tok tok=value ..."`.
///
/// The exact `<path>:` prefix is stripped when present so paths containing a
/// colon still parse; otherwise everything after the first `:` is taken.
pub fn parse_file_tags(raw: &str, path: &str) -> Result<Vec<FileTag>, BackendError> {
    let line = raw
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| BackendError::Parse {
            op: BackendOp::ListFileTags,
            message: "empty output".to_string(),
        })?;
    let tokens = match line.strip_prefix(path).and_then(|rest| rest.strip_prefix(':')) {
        Some(rest) => rest,
        None => match line.split_once(':') {
            Some((_, rest)) => rest,
            None => {
                return Err(BackendError::Parse {
                    op: BackendOp::ListFileTags,
                    message: format!("expected \"<path>: <tags>\", got {:?}", line),
                })
            }
        },
    };
    tokens
        .split_whitespace()
        .map(|token| {
            let (name, value) = token.split_once('=').unwrap_or((token, ""));
            if name.is_empty() {
                return Err(BackendError::Parse {
                    op: BackendOp::ListFileTags,
                    message: format!("tag without a name in {:?}", token),
                });
            }
            Ok(FileTag::new(name, value))
        })
        .collect()
}
