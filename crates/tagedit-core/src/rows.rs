use serde::Serialize;

/// One tag as shown to the user: its name, whether it is attached to the
/// current file, and the attached value (empty when untagged or valueless).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRow {
    pub tagged: bool,
    pub name: String,
    pub value: String,
}

impl TagRow {
    pub fn tagged(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tagged: true,
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn untagged(name: impl Into<String>) -> Self {
        Self {
            tagged: false,
            name: name.into(),
            value: String::new(),
        }
    }

    /// The value as a backend argument; `None` when there is none.
    pub fn value_arg(&self) -> Option<&str> {
        if self.value.is_empty() {
            None
        } else {
            Some(self.value.as_str())
        }
    }

    pub(crate) fn attach(&mut self, value: &str) {
        self.tagged = true;
        self.value = value.to_string();
    }

    pub(crate) fn detach(&mut self) {
        self.tagged = false;
        self.value.clear();
    }
}

/// Ordered rows with unique, non-empty names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagRows {
    rows: Vec<TagRow>,
}

impl TagRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TagRow> {
        self.rows.iter()
    }

    pub fn get(&self, index: usize) -> Option<&TagRow> {
        self.rows.get(index)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&TagRow> {
        self.rows.iter().find(|row| row.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.name == name)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut TagRow> {
        self.rows.get_mut(index)
    }

    /// Appends `row` unless its name is empty or already present.
    pub fn append(&mut self, mut row: TagRow) -> bool {
        if row.name.is_empty() || self.position(&row.name).is_some() {
            return false;
        }
        if !row.tagged {
            row.value.clear();
        }
        self.rows.push(row);
        true
    }

    pub fn remove_at(&mut self, index: usize) -> Option<TagRow> {
        if index < self.rows.len() {
            Some(self.rows.remove(index))
        } else {
            None
        }
    }

    /// `(name, value)` pairs attached to the file, in row order.
    pub fn tagged(&self) -> Vec<(&str, &str)> {
        self.rows
            .iter()
            .filter(|row| row.tagged)
            .map(|row| (row.name.as_str(), row.value.as_str()))
            .collect()
    }

    pub fn names_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|row| row.name.starts_with(prefix))
            .map(|row| row.name.as_str())
            .collect()
    }
}

impl<'a> IntoIterator for &'a TagRows {
    type Item = &'a TagRow;
    type IntoIter = std::slice::Iter<'a, TagRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
