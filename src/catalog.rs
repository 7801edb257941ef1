//! Prompt catalog, bundled as JSON and loaded at startup.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

/// One named prompt. The id doubles as the output filename stem.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct PromptEntry {
    /// Short identifier, unique within the catalog.
    pub id: String,
    /// Free-form prompt text, sent as-is (trimmed).
    pub text: String,
}

impl PromptEntry {
    /// Builds an entry from anything string-ish.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Errors returned when loading a prompt catalog.
#[derive(Debug)]
pub enum CatalogError {
    /// The JSON payload could not be parsed.
    Parse(serde_json::Error),
    /// The catalog file could not be read.
    Io(std::io::Error),
    /// Two entries share an id.
    DuplicateId(String),
    /// An entry has an empty id.
    EmptyId,
    /// A selected id isn't in the catalog.
    UnknownId(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "Failed to parse prompt catalog JSON: {err}"),
            Self::Io(err) => write!(f, "Failed to read prompt catalog: {err}"),
            Self::DuplicateId(id) => write!(f, "Duplicate prompt id in catalog: {id}"),
            Self::EmptyId => write!(f, "Prompt catalog contains an entry with an empty id"),
            Self::UnknownId(id) => write!(f, "Unknown prompt id: {id}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Ordered, read-only set of prompts. Order only drives progress reporting.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PromptCatalog {
    entries: Vec<PromptEntry>,
}

impl PromptCatalog {
    /// Builds a catalog, rejecting empty or duplicate ids.
    pub fn new(entries: Vec<PromptEntry>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.id.is_empty() {
                return Err(CatalogError::EmptyId);
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// The campaign prompts shipped with the binary.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json_str(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/prompts.json"
        )))
    }

    /// Parses a JSON array of `{"id": ..., "text": ...}` objects.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let entries: Vec<PromptEntry> = serde_json::from_str(raw).map_err(CatalogError::Parse)?;
        Self::new(entries)
    }

    /// Reads a catalog file in the same format as the bundled one.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(CatalogError::Io)?;
        Self::from_json_str(&raw)
    }

    /// Returns the subset matching `ids`, still in catalog order.
    pub fn select(&self, ids: &[String]) -> Result<Self, CatalogError> {
        if let Some(missing) = ids.iter().find(|id| self.get(id).is_none()) {
            return Err(CatalogError::UnknownId(missing.clone()));
        }
        let entries = self
            .entries
            .iter()
            .filter(|entry| ids.contains(&entry.id))
            .cloned()
            .collect();
        Ok(Self { entries })
    }

    /// Looks up a prompt by id.
    pub fn get(&self, id: &str) -> Option<&PromptEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Number of prompts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there's nothing to generate.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in catalog order.
    pub fn iter(&self) -> std::slice::Iter<'_, PromptEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a PromptCatalog {
    type Item = &'a PromptEntry;
    type IntoIter = std::slice::Iter<'a, PromptEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
