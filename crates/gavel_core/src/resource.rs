//! Resource model: typed representations of project entities.
//!
//! Resources are loaded once per run from the project artifact and are
//! immutable for the duration of the run. The properties generator writes
//! changes back to the file store, never to these in-memory values.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The kind of a resource or child item a contract can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A managed table produced by the project
    Table,
    /// An external source consumed by the project
    Source,
    /// A reusable function defined by the project
    Function,
    /// A column of a table or source
    Column,
    /// A parameter of a function
    Parameter,
}

impl ResourceKind {
    /// Lowercase label used in result output and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Source => "source",
            Self::Function => "function",
            Self::Column => "column",
            Self::Parameter => "parameter",
        }
    }
}

/// How a table or source is materialized in the warehouse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    #[default]
    View,
    Table,
    Incremental,
    Ephemeral,
    External,
}

impl Materialization {
    /// Ephemeral resources have no physical counterpart in the warehouse.
    pub fn is_materialized(&self) -> bool {
        !matches!(self, Self::Ephemeral)
    }
}

/// A scalar or list value attached to a resource's `meta` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<MetaValue>),
}

impl MetaValue {
    /// Whether `self` equals `other`, or contains it when `self` is a list.
    pub fn matches(&self, other: &MetaValue) -> bool {
        match self {
            Self::List(values) => values.iter().any(|v| v == other),
            _ => self == other,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value}"),
            Self::List(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A column of a table or external source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Declared data type, if any
    #[serde(default)]
    pub data_type: Option<String>,

    /// Declared description, if any
    #[serde(default)]
    pub description: Option<String>,

    /// Tags attached to the column
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Arbitrary metadata attached to the column
    #[serde(default)]
    pub meta: BTreeMap<String, MetaValue>,

    /// Number of checks attached to the column
    #[serde(default)]
    pub tests: usize,
}

/// A parameter of a reusable function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,

    /// Declared data type, if any
    #[serde(default)]
    pub data_type: Option<String>,

    /// Declared description, if any
    #[serde(default)]
    pub description: Option<String>,
}

/// A table or external source with its declared columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier, unique across the project (e.g. `table.demo.orders`)
    pub unique_id: String,

    /// Resource name
    pub name: String,

    /// Path of the resource's own definition file, relative to the project root
    #[serde(default)]
    pub path: PathBuf,

    /// Path of the properties file describing the resource, if one exists
    #[serde(default)]
    pub properties_path: Option<PathBuf>,

    /// Tags attached to the resource
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Arbitrary metadata attached to the resource
    #[serde(default)]
    pub meta: BTreeMap<String, MetaValue>,

    /// Declared description, if any
    #[serde(default)]
    pub description: Option<String>,

    /// Whether the resource is enabled in the project configuration
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Materialization kind
    #[serde(default)]
    pub materialization: Materialization,

    /// Compiled definition text (templating already rendered)
    #[serde(default)]
    pub definition: String,

    /// Number of resource-level checks attached (not column-level)
    #[serde(default)]
    pub tests: usize,

    /// Number of declared constraints
    #[serde(default)]
    pub constraints: usize,

    /// The tool responsible for loading the source (sources only)
    #[serde(default)]
    pub loader: Option<String>,

    /// Whether a freshness policy is configured (sources only)
    #[serde(default)]
    pub has_freshness: bool,

    /// Declared columns, in declaration order
    #[serde(default)]
    pub columns: Vec<Column>,
}

fn default_true() -> bool {
    true
}

/// A reusable function with its parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Function {
    /// Stable identifier, unique across the project (e.g. `function.demo.clean`)
    pub unique_id: String,

    /// Function name
    pub name: String,

    /// Path of the function's definition file, relative to the project root
    #[serde(default)]
    pub path: PathBuf,

    /// Path of the properties file describing the function, if one exists
    #[serde(default)]
    pub properties_path: Option<PathBuf>,

    /// Declared description, if any
    #[serde(default)]
    pub description: Option<String>,

    /// Compiled definition text
    #[serde(default)]
    pub definition: String,

    /// Declared parameters, in declaration order
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// A project entity subject to contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
    Table(Node),
    Source(Node),
    Function(Function),
}

impl Resource {
    /// The kind of this resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Table(_) => ResourceKind::Table,
            Self::Source(_) => ResourceKind::Source,
            Self::Function(_) => ResourceKind::Function,
        }
    }

    /// Stable identifier, unique across the project.
    pub fn unique_id(&self) -> &str {
        match self {
            Self::Table(node) | Self::Source(node) => &node.unique_id,
            Self::Function(function) => &function.unique_id,
        }
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        match self {
            Self::Table(node) | Self::Source(node) => &node.name,
            Self::Function(function) => &function.name,
        }
    }

    /// Path of the resource's own definition file.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Table(node) | Self::Source(node) => &node.path,
            Self::Function(function) => &function.path,
        }
    }

    /// Path of the properties file describing the resource, if one exists.
    pub fn properties_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Table(node) | Self::Source(node) => node.properties_path.as_deref(),
            Self::Function(function) => function.properties_path.as_deref(),
        }
    }

    /// Declared description, if any.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Table(node) | Self::Source(node) => node.description.as_deref(),
            Self::Function(function) => function.description.as_deref(),
        }
    }

    /// Compiled definition text.
    pub fn definition(&self) -> &str {
        match self {
            Self::Table(node) | Self::Source(node) => &node.definition,
            Self::Function(function) => &function.definition,
        }
    }

    /// The table/source payload, when this resource is one.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Table(node) | Self::Source(node) => Some(node),
            Self::Function(_) => None,
        }
    }

    /// The function payload, when this resource is one.
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Declared columns, empty for functions.
    pub fn columns(&self) -> &[Column] {
        self.as_node().map(|node| node.columns.as_slice()).unwrap_or(&[])
    }
}

/// The full set of resources loaded from a project artifact.
///
/// Built once per run; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Project {
    resources: Vec<Resource>,
    by_id: HashMap<String, usize>,
}

impl Project {
    /// Builds a project from resources, indexing them by unique id.
    pub fn new(resources: Vec<Resource>) -> Self {
        let by_id = resources
            .iter()
            .enumerate()
            .map(|(index, resource)| (resource.unique_id().to_string(), index))
            .collect();
        Self { resources, by_id }
    }

    /// All resources, in artifact order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Looks up a resource by its unique id.
    pub fn get(&self, unique_id: &str) -> Option<&Resource> {
        self.by_id.get(unique_id).map(|&index| &self.resources[index])
    }

    /// Whether a resource with the given unique id exists.
    pub fn contains(&self, unique_id: &str) -> bool {
        self.by_id.contains_key(unique_id)
    }

    /// All resources of a given kind, in artifact order.
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind() == kind)
    }

    /// Looks up a function resource by name.
    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.resources
            .iter()
            .filter_map(Resource::as_function)
            .find(|function| function.name == name)
    }

    /// Looks up a table resource by name.
    pub fn table_by_name(&self, name: &str) -> Option<&Resource> {
        self.of_kind(ResourceKind::Table).find(|r| r.name() == name)
    }

    /// Looks up a source resource by name (`source_name.table_name` convention).
    pub fn source_by_name(&self, name: &str) -> Option<&Resource> {
        self.of_kind(ResourceKind::Source).find(|r| r.name() == name)
    }
}
