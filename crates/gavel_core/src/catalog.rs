//! Catalog snapshot types.
//!
//! The catalog is a read-only snapshot of the live warehouse, loaded once per
//! run and shared across all contract evaluations. It is the ground truth for
//! every "matching" check and for the properties generator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single column of a physical object in the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogColumn {
    /// Column name as reported by the warehouse
    pub name: String,

    /// Column data type as reported by the warehouse
    pub data_type: String,

    /// Column comment, if any
    #[serde(default)]
    pub comment: Option<String>,

    /// Zero-based position of the column within the object
    pub index: usize,
}

/// Snapshot of one physical object in the warehouse.
///
/// Keyed by the same identity scheme as [`crate::Resource`]: the resource's
/// unique id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Unique id of the project resource this object corresponds to
    pub unique_id: String,

    /// Object comment, if any
    #[serde(default)]
    pub comment: Option<String>,

    /// Columns in warehouse order
    #[serde(default)]
    pub columns: Vec<CatalogColumn>,
}

impl CatalogEntry {
    /// Finds a column by name.
    ///
    /// Alignment is case-insensitive by default; pass `exact = true` for a
    /// case-sensitive lookup. Whitespace is never significant in names.
    pub fn column(&self, name: &str, exact: bool) -> Option<&CatalogColumn> {
        if exact {
            self.columns.iter().find(|column| column.name == name)
        } else {
            self.columns
                .iter()
                .find(|column| column.name.eq_ignore_ascii_case(name))
        }
    }
}

/// The full catalog snapshot for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    entries: HashMap<String, CatalogEntry>,
}

impl Catalog {
    /// Builds a catalog from entries, indexing them by unique id.
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.unique_id.clone(), entry))
                .collect(),
        }
    }

    /// Looks up the entry for a resource by its unique id.
    pub fn entry(&self, unique_id: &str) -> Option<&CatalogEntry> {
        self.entries.get(unique_id)
    }

    /// Number of entries in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
