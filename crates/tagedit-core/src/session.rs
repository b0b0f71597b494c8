use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::backend::{BackendError, BackendOp, TagBackend};
use crate::rows::{TagRow, TagRows};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No tmsu database is found.")]
    NoDatabase,
    #[error("Tag name cannot be empty")]
    EmptyName,
    #[error("Tag {0:?} already has a value; enter a value to retag it")]
    ValueRequired(String),
    #[error("No tag named {0:?}")]
    UnknownTag(String),
    #[error("A tag named {0:?} already exists")]
    NameTaken(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(
        "Removed {name}={old_value:?} but could not set {name}={new_value:?}: {source}. \
         The file may be missing this tag until the list is reloaded."
    )]
    PartialFailure {
        name: String,
        old_value: String,
        new_value: String,
        #[source]
        source: BackendError,
    },
}

impl SessionError {
    /// Rejected locally before any backend call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::EmptyName
                | SessionError::ValueRequired(_)
                | SessionError::UnknownTag(_)
                | SessionError::NameTaken(_)
        )
    }

    /// The backend acknowledged part of the change and the rows no longer
    /// match it.
    pub fn is_partial(&self) -> bool {
        matches!(self, SessionError::PartialFailure { .. })
    }
}

/// Tag editing session for one file.
///
/// Rows change only after the backend confirms the matching command, and in
/// the order the confirmations arrive. The loaded snapshot is authoritative
/// until [`TagSession::reload`]; changes made by other tmsu clients in the
/// meantime are not noticed.
pub struct TagSession<B> {
    backend: B,
    path: PathBuf,
    rows: TagRows,
}

impl<B: TagBackend> TagSession<B> {
    /// Checks that the backend has a database, then loads the rows.
    pub fn open(backend: B, path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let info = backend.info()?;
        let Some(info) = info else {
            return Err(SessionError::NoDatabase);
        };
        tracing::debug!(database = %info.database, root = %info.root, "tmsu database found");
        let mut session = Self::new(backend, path);
        session.load()?;
        Ok(session)
    }

    /// Creates a session with no rows; call [`TagSession::load`] before use.
    pub fn new(backend: B, path: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            path: path.into(),
            rows: TagRows::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &TagRows {
        &self.rows
    }

    /// Builds the rows from the file's tags (in backend order) followed by
    /// every other known tag. The previous rows survive a failed load.
    pub fn load(&mut self) -> Result<(), SessionError> {
        let all_tags = self.backend.list_all_tags()?;
        let file_tags = self.backend.list_file_tags(&self.path)?;

        let mut rows = TagRows::new();
        for tag in file_tags {
            if tag.name.is_empty() {
                return Err(BackendError::Parse {
                    op: BackendOp::ListFileTags,
                    message: format!("tag without a name (value {:?})", tag.value),
                }
                .into());
            }
            if rows.position(&tag.name).is_some() {
                tracing::debug!(tag = %tag.name, "skipping repeated file tag");
                continue;
            }
            rows.append(TagRow::tagged(tag.name, tag.value));
        }
        for name in all_tags {
            if rows.position(&name).is_none() {
                rows.append(TagRow::untagged(name));
            }
        }
        tracing::debug!(
            path = %self.path.display(),
            rows = rows.len(),
            tagged = rows.tagged().len(),
            "loaded tags"
        );
        self.rows = rows;
        Ok(())
    }

    pub fn reload(&mut self) -> Result<(), SessionError> {
        self.load()
    }

    /// Attaches an untagged row or detaches a tagged one.
    pub fn toggle(&mut self, name: &str) -> Result<&TagRow, SessionError> {
        let index = self.index_of(name)?;
        let row = self.row(index).clone();
        if row.tagged {
            self.backend
                .untag(&self.path, &row.name, row.value_arg())
                .map_err(|err| self.failed(err))?;
            tracing::info!(tag = %row.name, value = %row.value, "untagged file");
            self.row_mut(index).detach();
        } else {
            self.backend
                .tag(&self.path, &row.name, None)
                .map_err(|err| self.failed(err))?;
            tracing::info!(tag = %row.name, "tagged file");
            self.row_mut(index).attach("");
        }
        Ok(self.row(index))
    }

    /// Tags the file with `name` (and `value` when non-empty), creating the
    /// row if the tag was unknown.
    pub fn add(&mut self, name: &str, value: &str) -> Result<&TagRow, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }
        let existing = self.rows.position(name);
        if let Some(index) = existing {
            if !self.row(index).value.is_empty() && value.is_empty() {
                return Err(SessionError::ValueRequired(name.to_string()));
            }
        }

        self.backend
            .tag(&self.path, name, non_empty(value))
            .map_err(|err| self.failed(err))?;
        tracing::info!(tag = %name, value = %value, "tagged file");

        let index = match existing {
            Some(index) => {
                self.row_mut(index).attach(value);
                index
            }
            None => {
                self.rows.append(TagRow::tagged(name, value));
                self.rows.len() - 1
            }
        };
        Ok(self.row(index))
    }

    /// Renames the tag for the whole database, then the row.
    pub fn edit_name(&mut self, name: &str, new_name: &str) -> Result<&TagRow, SessionError> {
        let index = self.index_of(name)?;
        let new_name = new_name.trim();
        if new_name == name {
            return Ok(self.row(index));
        }
        if new_name.is_empty() {
            return Err(SessionError::EmptyName);
        }
        if self.rows.position(new_name).is_some() {
            return Err(SessionError::NameTaken(new_name.to_string()));
        }

        self.backend
            .rename(name, new_name)
            .map_err(|err| self.failed(err))?;
        tracing::info!(from = %name, to = %new_name, "renamed tag");
        self.row_mut(index).name = new_name.to_string();
        Ok(self.row(index))
    }

    /// Replaces the row's value. A tagged row is untagged first, so a failed
    /// retag leaves the file without the tag; that case is reported as
    /// [`SessionError::PartialFailure`] and the row keeps its old state.
    pub fn edit_value(&mut self, name: &str, value: &str) -> Result<&TagRow, SessionError> {
        let index = self.index_of(name)?;
        let row = self.row(index).clone();
        if row.value == value {
            return Ok(self.row(index));
        }

        if row.tagged {
            self.backend
                .untag(&self.path, &row.name, row.value_arg())
                .map_err(|err| self.failed(err))?;
        }
        if let Err(source) = self.backend.tag(&self.path, &row.name, non_empty(value)) {
            if row.tagged {
                tracing::warn!(
                    tag = %row.name,
                    old = %row.value,
                    new = %value,
                    error = %source,
                    "retag failed after untag; rows out of sync until reload"
                );
                return Err(SessionError::PartialFailure {
                    name: row.name,
                    old_value: row.value,
                    new_value: value.to_string(),
                    source,
                });
            }
            return Err(self.failed(source));
        }
        tracing::info!(tag = %row.name, old = %row.value, new = %value, "changed tag value");
        self.row_mut(index).attach(value);
        Ok(self.row(index))
    }

    /// Deletes the tag from the whole database and drops its row. Callers are
    /// expected to have confirmed this with the user.
    pub fn delete(&mut self, name: &str) -> Result<TagRow, SessionError> {
        let index = self.index_of(name)?;
        self.backend.delete(name).map_err(|err| self.failed(err))?;
        tracing::info!(tag = %name, "deleted tag");
        self.rows
            .remove_at(index)
            .ok_or_else(|| SessionError::UnknownTag(name.to_string()))
    }

    /// Known values for `name`. Lookup failures only cost the suggestions.
    pub fn suggest_values(&self, name: &str) -> Vec<String> {
        match self.backend.list_values(non_empty(name)) {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(tag = %name, error = %err, "value lookup failed");
                Vec::new()
            }
        }
    }

    pub fn suggest_tags(&self, prefix: &str) -> Vec<&str> {
        self.rows.names_with_prefix(prefix)
    }

    fn index_of(&self, name: &str) -> Result<usize, SessionError> {
        self.rows
            .position(name)
            .ok_or_else(|| SessionError::UnknownTag(name.to_string()))
    }

    fn row(&self, index: usize) -> &TagRow {
        self.rows
            .get(index)
            .unwrap_or_else(|| unreachable!("row index {index} out of bounds"))
    }

    fn row_mut(&mut self, index: usize) -> &mut TagRow {
        self.rows
            .get_mut(index)
            .unwrap_or_else(|| unreachable!("row index {index} out of bounds"))
    }

    fn failed(&self, err: BackendError) -> SessionError {
        tracing::warn!(path = %self.path.display(), error = %err, "tmsu command failed");
        SessionError::Backend(err)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
