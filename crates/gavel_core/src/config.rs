//! Rule file schema.
//!
//! The rule file maps contract names to filters, validation terms, an
//! optional generator and an optional nested child contract. Rule arguments
//! stay untyped ([`serde_json::Value`]) at this level; the rule registry
//! resolves names and validates arguments before any resource is evaluated.
//!
//! ```yaml
//! contracts:
//!   tables:
//!     filters:
//!       - name: {include: ["mart_.*"]}
//!     validations:
//!       - has_description
//!       - has_tests: {min_count: 1}
//!     columns:
//!       validations: [has_data_type]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root of the rule file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractsConfig {
    /// Contracts keyed by the resource kind they apply to
    #[serde(default)]
    pub contracts: ContractsSection,
}

/// The declared contracts, one per parent resource kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractsSection {
    #[serde(default)]
    pub tables: Option<ContractSpec>,

    #[serde(default)]
    pub sources: Option<ContractSpec>,

    #[serde(default)]
    pub functions: Option<ContractSpec>,
}

/// One contract: ordered filters, ordered terms, optional generator and an
/// optional nested child contract (columns under tables/sources, parameters
/// under functions).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractSpec {
    /// Filters narrowing which resources the contract evaluates
    #[serde(default, alias = "filter")]
    pub filters: Vec<RuleEntry>,

    /// Validation terms run against every in-scope resource
    #[serde(default, alias = "terms")]
    pub validations: Vec<RuleEntry>,

    /// Properties generator configuration
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,

    /// Child contract over the columns of in-scope tables/sources
    #[serde(default)]
    pub columns: Option<Box<ContractSpec>>,

    /// Child contract over the parameters of in-scope functions
    #[serde(default)]
    pub parameters: Option<Box<ContractSpec>>,
}

/// A filter or term reference: a bare rule name, or a single-key mapping of
/// rule name to its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    Name(String),
    WithArgs(BTreeMap<String, Value>),
}

impl RuleEntry {
    /// The referenced rule name.
    ///
    /// For the mapping form, the first key; the registry rejects entries with
    /// more than one key.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::WithArgs(map) => map.keys().next().map(String::as_str).unwrap_or(""),
        }
    }

    /// The supplied arguments, if any.
    pub fn args(&self) -> Option<&Value> {
        match self {
            Self::Name(_) => None,
            Self::WithArgs(map) => map.values().next(),
        }
    }

    /// Number of keys in the mapping form (1 for well-formed entries).
    pub fn key_count(&self) -> usize {
        match self {
            Self::Name(_) => 1,
            Self::WithArgs(map) => map.len(),
        }
    }
}

/// Fields the generator can be told never to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorField {
    Description,
    Columns,
    DataType,
}

/// Policy for synthesizing one scalar field from catalog data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldPolicy {
    /// Replace an existing non-empty value with the catalog value
    #[serde(default)]
    pub overwrite: bool,

    /// Truncate the catalog text at the first occurrence of this string
    /// before writing
    #[serde(default)]
    pub terminator: Option<String>,
}

/// Policy for reconciling a declared column list with the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnPolicy {
    /// Insert catalog columns absent from the declaration
    #[serde(default = "default_true")]
    pub add: bool,

    /// Drop declared columns absent from the catalog
    #[serde(default)]
    pub remove: bool,

    /// Reorder declared columns to match catalog order
    #[serde(default)]
    pub order: bool,
}

impl Default for ColumnPolicy {
    fn default() -> Self {
        Self {
            add: true,
            remove: false,
            order: false,
        }
    }
}

/// Configuration for the properties generator of one contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Policy for the description field
    #[serde(default)]
    pub description: FieldPolicy,

    /// Policy for column data types (column contracts)
    #[serde(default)]
    pub data_type: FieldPolicy,

    /// Policy for the declared column list
    #[serde(default)]
    pub columns: ColumnPolicy,

    /// Fields the generator must never touch
    #[serde(default)]
    pub exclude: Vec<GeneratorField>,

    /// How many directory levels above the resource's own file newly created
    /// properties files are placed
    #[serde(default)]
    pub depth: usize,

    /// Base name (without extension) for newly created properties files
    #[serde(default = "default_filename")]
    pub filename: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            description: FieldPolicy::default(),
            data_type: FieldPolicy::default(),
            columns: ColumnPolicy::default(),
            exclude: Vec::new(),
            depth: 0,
            filename: default_filename(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_filename() -> String {
    "_properties".to_string()
}
