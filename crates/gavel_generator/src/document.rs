//! Properties document model.
//!
//! A typed view of a properties file that round-trips unknown keys: anything
//! the generator does not manage is captured in a flattened map and written
//! back untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;

/// One column entry within a properties entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnProperties {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One table or source entry within a properties file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryProperties {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnProperties>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A whole properties file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertiesDoc {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<EntryProperties>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<EntryProperties>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PropertiesDoc {
    /// Parses a properties file, tolerating an empty document.
    pub fn parse(content: &str) -> Result<Self, serde_yaml_ng::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(content)
    }

    /// Renders the document back to YAML.
    pub fn render(&self) -> Result<String, serde_yaml_ng::Error> {
        serde_yaml_ng::to_string(self)
    }

    /// The entry for a named table, created on first access.
    pub fn table_entry(&mut self, name: &str) -> &mut EntryProperties {
        entry_for(&mut self.tables, name)
    }

    /// The entry for a named source, created on first access.
    pub fn source_entry(&mut self, name: &str) -> &mut EntryProperties {
        entry_for(&mut self.sources, name)
    }
}

fn entry_for<'a>(entries: &'a mut Vec<EntryProperties>, name: &str) -> &'a mut EntryProperties {
    if let Some(position) = entries.iter().position(|entry| entry.name == name) {
        return &mut entries[position];
    }
    entries.push(EntryProperties {
        name: name.to_string(),
        ..EntryProperties::default()
    });
    entries.last_mut().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_keys_round_trip() {
        let source = concat!(
            "version: 2\n",
            "tables:\n",
            "- name: orders\n",
            "  description: One row per order\n",
            "  config:\n",
            "    contract: true\n",
            "  columns:\n",
            "  - name: id\n",
            "    tests: 3\n",
        );
        let doc = PropertiesDoc::parse(source).unwrap();
        assert_eq!(doc.extra["version"], Value::from(2));
        assert_eq!(doc.tables[0].extra["config"]["contract"], Value::from(true));
        assert_eq!(doc.tables[0].columns[0].extra["tests"], Value::from(3));

        let rendered = doc.render().unwrap();
        let reparsed = PropertiesDoc::parse(&rendered).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn empty_content_parses_to_empty_document() {
        let doc = PropertiesDoc::parse("   \n").unwrap();
        assert!(doc.tables.is_empty());
        assert!(doc.extra.is_empty());
    }

    #[test]
    fn entry_lookup_creates_on_first_access() {
        let mut doc = PropertiesDoc::default();
        doc.table_entry("orders").description = Some("x".to_string());
        assert_eq!(doc.tables.len(), 1);

        doc.table_entry("orders").description = Some("y".to_string());
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].description.as_deref(), Some("y"));
    }
}
