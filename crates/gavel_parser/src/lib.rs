//! Input loading for gavel.
//!
//! Three inputs are read once at startup and treated as static for the
//! duration of a run:
//!
//! - the rule file (YAML or TOML), parsed into [`ContractsConfig`];
//! - the project artifact (JSON), parsed into [`Project`];
//! - the optional catalog snapshot (JSON), parsed into [`Catalog`].
//!
//! # Example
//!
//! ```rust
//! use gavel_parser::parse_rules_yaml;
//!
//! let yaml = r#"
//! contracts:
//!   tables:
//!     validations:
//!       - has_description
//! "#;
//!
//! let config = parse_rules_yaml(yaml).expect("failed to parse rule file");
//! assert!(config.contracts.tables.is_some());
//! ```

use std::fs;
use std::path::Path;

use gavel_core::{Catalog, CatalogEntry, ContractsConfig, Project, Resource};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading inputs.
#[derive(Debug, Error)]
pub enum ParserError {
    /// YAML parsing or deserialization failed
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// TOML parsing or deserialization failed
    #[error("Failed to parse TOML: {0}")]
    Toml(String),

    /// JSON parsing or deserialization failed
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid file extension
    #[error("Invalid or missing file extension")]
    InvalidExtension,
}

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

/// Supported rule file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    /// YAML format (.yml, .yaml)
    Yaml,
    /// TOML format (.toml)
    Toml,
}

/// Parses a rule file from a YAML string.
pub fn parse_rules_yaml(content: &str) -> Result<ContractsConfig> {
    let config: ContractsConfig = serde_yaml_ng::from_str(content)?;
    Ok(config)
}

/// Parses a rule file from a TOML string.
pub fn parse_rules_toml(content: &str) -> Result<ContractsConfig> {
    let config: ContractsConfig =
        toml::from_str(content).map_err(|e| ParserError::Toml(e.to_string()))?;
    Ok(config)
}

/// Detects the rule file format from a path based on its extension.
///
/// `.yaml`/`.yml` map to [`RuleFormat::Yaml`], `.toml` to [`RuleFormat::Toml`].
pub fn detect_format(path: &Path) -> Result<RuleFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or(ParserError::InvalidExtension)?;

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(RuleFormat::Yaml),
        "toml" => Ok(RuleFormat::Toml),
        other => Err(ParserError::UnsupportedFormat(other.to_string())),
    }
}

/// Reads and parses a rule file, detecting the format from its extension.
pub fn parse_rules_file(path: &Path) -> Result<ContractsConfig> {
    let format = detect_format(path)?;
    let content = fs::read_to_string(path)?;
    match format {
        RuleFormat::Yaml => parse_rules_yaml(&content),
        RuleFormat::Toml => parse_rules_toml(&content),
    }
}

#[derive(Debug, Deserialize)]
struct ProjectArtifact {
    resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct CatalogArtifact {
    entries: Vec<CatalogEntry>,
}

/// Parses a project artifact from a JSON string.
pub fn parse_project_json(content: &str) -> Result<Project> {
    let artifact: ProjectArtifact = serde_json::from_str(content)?;
    Ok(Project::new(artifact.resources))
}

/// Reads and parses a project artifact file.
pub fn parse_project_file(path: &Path) -> Result<Project> {
    let content = fs::read_to_string(path)?;
    parse_project_json(&content)
}

/// Parses a catalog snapshot from a JSON string.
pub fn parse_catalog_json(content: &str) -> Result<Catalog> {
    let artifact: CatalogArtifact = serde_json::from_str(content)?;
    Ok(Catalog::new(artifact.entries))
}

/// Reads and parses a catalog snapshot file.
pub fn parse_catalog_file(path: &Path) -> Result<Catalog> {
    let content = fs::read_to_string(path)?;
    parse_catalog_json(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_core::ResourceKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_yaml_rule_file() {
        let yaml = r#"
contracts:
  tables:
    filters:
      - name:
          include: ["mart_.*"]
      - is_enabled
    validations:
      - has_description
      - has_tests:
          min_count: 2
          max_count: 4
    columns:
      validations:
        - has_data_type
  functions:
    validations:
      - has_description
"#;
        let config = parse_rules_yaml(yaml).unwrap();
        let tables = config.contracts.tables.unwrap();
        assert_eq!(tables.filters.len(), 2);
        assert_eq!(tables.filters[0].name(), "name");
        assert_eq!(tables.filters[1].name(), "is_enabled");
        assert_eq!(tables.validations[1].name(), "has_tests");
        assert_eq!(tables.validations[1].args().unwrap()["max_count"], 4);
        assert!(tables.columns.is_some());
        assert!(config.contracts.functions.is_some());
    }

    #[test]
    fn accepts_terms_alias_for_validations() {
        let yaml = r#"
contracts:
  sources:
    terms:
      - has_loader
"#;
        let config = parse_rules_yaml(yaml).unwrap();
        let sources = config.contracts.sources.unwrap();
        assert_eq!(sources.validations.len(), 1);
        assert_eq!(sources.validations[0].name(), "has_loader");
    }

    #[test]
    fn parses_toml_rule_file() {
        let toml = r#"
[contracts.tables]
validations = ["has_description"]

[[contracts.tables.filters]]
name = { include = ["mart_.*"] }
"#;
        let config = parse_rules_toml(toml).unwrap();
        let tables = config.contracts.tables.unwrap();
        assert_eq!(tables.filters.len(), 1);
        assert_eq!(tables.validations[0].name(), "has_description");
    }

    #[test]
    fn rejects_unknown_top_level_keys() {
        let yaml = r#"
contracts:
  tables:
    validations: []
    generators: []
"#;
        assert!(parse_rules_yaml(yaml).is_err());
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(detect_format(Path::new("rules.yml")).unwrap(), RuleFormat::Yaml);
        assert_eq!(detect_format(Path::new("rules.toml")).unwrap(), RuleFormat::Toml);
        assert!(detect_format(Path::new("rules.json")).is_err());
        assert!(detect_format(Path::new("rules")).is_err());
    }

    #[test]
    fn parses_project_artifact() {
        let json = r#"
{
  "resources": [
    {
      "kind": "table",
      "unique_id": "table.demo.orders",
      "name": "orders",
      "path": "tables/orders.sql",
      "materialization": "table",
      "columns": [{"name": "id", "data_type": "bigint"}]
    },
    {
      "kind": "function",
      "unique_id": "function.demo.clean",
      "name": "clean",
      "parameters": [{"name": "value"}]
    }
  ]
}
"#;
        let project = parse_project_json(json).unwrap();
        assert_eq!(project.resources().len(), 2);
        assert_eq!(project.of_kind(ResourceKind::Table).count(), 1);
        let orders = project.get("table.demo.orders").unwrap();
        assert_eq!(orders.columns().len(), 1);
        assert!(orders.as_node().unwrap().enabled);
    }

    #[test]
    fn parses_catalog_snapshot() {
        let json = r#"
{
  "entries": [
    {
      "unique_id": "table.demo.orders",
      "comment": "One row per order",
      "columns": [
        {"name": "id", "data_type": "bigint", "index": 0}
      ]
    }
  ]
}
"#;
        let catalog = parse_catalog_json(json).unwrap();
        let entry = catalog.entry("table.demo.orders").unwrap();
        assert_eq!(entry.columns.len(), 1);
        assert!(entry.column("ID", false).is_some());
    }
}
