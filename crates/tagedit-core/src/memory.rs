use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::backend::{tag_arg, BackendError, BackendInfo, BackendOp, FileTag, TagBackend};

#[derive(Debug, Default)]
struct State {
    tags: Vec<String>,
    files: BTreeMap<PathBuf, Vec<FileTag>>,
}

/// In-process tag database with tmsu semantics.
///
/// Every call is recorded as the argument list tmsu would receive, and any
/// operation can be made to fail with [`MemoryBackend::fail_on`].
#[derive(Debug)]
pub struct MemoryBackend {
    state: RefCell<State>,
    has_database: bool,
    failing: RefCell<HashSet<BackendOp>>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
            has_database: true,
            failing: RefCell::new(HashSet::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn without_database(mut self) -> Self {
        self.has_database = false;
        self
    }

    pub fn with_tags(self, names: &[&str]) -> Self {
        {
            let mut state = self.state.borrow_mut();
            for name in names {
                remember_tag(&mut state.tags, name);
            }
        }
        self
    }

    pub fn with_file_tags(self, path: impl Into<PathBuf>, tags: &[(&str, &str)]) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let path = path.into();
            for (name, value) in tags {
                remember_tag(&mut state.tags, name);
                state
                    .files
                    .entry(path.clone())
                    .or_default()
                    .push(FileTag::new(*name, *value));
            }
        }
        self
    }

    pub fn fail_on(&self, op: BackendOp) {
        self.failing.borrow_mut().insert(op);
    }

    pub fn clear_failures(&self) {
        self.failing.borrow_mut().clear();
    }

    /// Argument lists of every call so far, failed ones included.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn file_tags(&self, path: &Path) -> Vec<FileTag> {
        self.state
            .borrow()
            .files
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn all_tags(&self) -> Vec<String> {
        self.state.borrow().tags.clone()
    }

    fn record(&self, op: BackendOp, args: Vec<String>) -> Result<(), BackendError> {
        self.calls.borrow_mut().push(args);
        if self.failing.borrow().contains(&op) {
            return Err(failure(op, "injected failure"));
        }
        Ok(())
    }
}

fn remember_tag(tags: &mut Vec<String>, name: &str) {
    if !tags.iter().any(|tag| tag == name) {
        tags.push(name.to_string());
    }
}

fn failure(op: BackendOp, message: &str) -> BackendError {
    BackendError::Failed {
        op,
        code: Some(1),
        stderr: message.to_string(),
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

impl TagBackend for MemoryBackend {
    fn info(&self) -> Result<Option<BackendInfo>, BackendError> {
        self.record(BackendOp::Info, vec!["info".to_string()])?;
        if !self.has_database {
            return Ok(None);
        }
        Ok(Some(BackendInfo {
            root: "/".to_string(),
            size: "0B".to_string(),
            database: ":memory:".to_string(),
        }))
    }

    fn list_all_tags(&self) -> Result<Vec<String>, BackendError> {
        self.record(BackendOp::ListAllTags, vec!["tags".to_string()])?;
        Ok(self.all_tags())
    }

    fn list_file_tags(&self, path: &Path) -> Result<Vec<FileTag>, BackendError> {
        self.record(
            BackendOp::ListFileTags,
            vec!["tags".to_string(), "-n".to_string(), path_string(path)],
        )?;
        Ok(self.file_tags(path))
    }

    fn tag(&self, path: &Path, name: &str, value: Option<&str>) -> Result<(), BackendError> {
        self.record(
            BackendOp::Tag,
            vec!["tag".to_string(), path_string(path), tag_arg(name, value)],
        )?;
        let binding = FileTag::new(name, value.unwrap_or_default());
        let mut state = self.state.borrow_mut();
        remember_tag(&mut state.tags, name);
        let tags = state.files.entry(path.to_path_buf()).or_default();
        if !tags.contains(&binding) {
            tags.push(binding);
        }
        Ok(())
    }

    fn untag(&self, path: &Path, name: &str, value: Option<&str>) -> Result<(), BackendError> {
        self.record(
            BackendOp::Untag,
            vec!["untag".to_string(), path_string(path), tag_arg(name, value)],
        )?;
        let binding = FileTag::new(name, value.unwrap_or_default());
        let mut state = self.state.borrow_mut();
        let tags = state.files.entry(path.to_path_buf()).or_default();
        let before = tags.len();
        tags.retain(|tag| tag != &binding);
        if tags.len() == before {
            return Err(failure(BackendOp::Untag, "file is not tagged"));
        }
        Ok(())
    }

    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), BackendError> {
        self.record(
            BackendOp::Rename,
            vec![
                "rename".to_string(),
                old_name.to_string(),
                new_name.to_string(),
            ],
        )?;
        let mut state = self.state.borrow_mut();
        if state.tags.iter().any(|tag| tag == new_name) {
            return Err(failure(BackendOp::Rename, "tag already exists"));
        }
        let Some(slot) = state.tags.iter_mut().find(|tag| tag.as_str() == old_name) else {
            return Err(failure(BackendOp::Rename, "no such tag"));
        };
        *slot = new_name.to_string();
        for tags in state.files.values_mut() {
            for tag in tags.iter_mut().filter(|tag| tag.name == old_name) {
                tag.name = new_name.to_string();
            }
        }
        Ok(())
    }

    fn list_values(&self, name: Option<&str>) -> Result<Vec<String>, BackendError> {
        let mut args = vec!["values".to_string()];
        args.extend(name.map(str::to_string));
        self.record(BackendOp::ListValues, args)?;
        let state = self.state.borrow();
        let values: BTreeSet<String> = state
            .files
            .values()
            .flatten()
            .filter(|tag| !tag.value.is_empty())
            .filter(|tag| name.map_or(true, |name| tag.name == name))
            .map(|tag| tag.value.clone())
            .collect();
        Ok(values.into_iter().collect())
    }

    fn delete(&self, name: &str) -> Result<(), BackendError> {
        self.record(
            BackendOp::Delete,
            vec!["delete".to_string(), name.to_string()],
        )?;
        let mut state = self.state.borrow_mut();
        let before = state.tags.len();
        state.tags.retain(|tag| tag != name);
        if state.tags.len() == before {
            return Err(failure(BackendOp::Delete, "no such tag"));
        }
        for tags in state.files.values_mut() {
            tags.retain(|tag| tag.name != name);
        }
        Ok(())
    }
}
