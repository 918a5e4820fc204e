//! Rule registry.
//!
//! Resolves the raw rule file into compiled contracts before any resource is
//! evaluated. Every failure here is a [`ContractError::Configuration`] naming
//! the contract path, so a misconfigured run aborts up front instead of
//! producing a half-evaluated report.

use gavel_core::{
    ContractError, ContractSpec, ContractsConfig, GeneratorConfig, MetaValue, ResourceKind, Result,
};
use serde_json::Value;

use crate::filters::Filter;
use crate::matchers::{OneOrMany, PatternMatcher, RangeMatcher, StringMatcher};
use crate::terms::{ExpectedColumns, ExpectedName, Term};

const ALL: &[ResourceKind] = &[
    ResourceKind::Table,
    ResourceKind::Source,
    ResourceKind::Function,
    ResourceKind::Column,
    ResourceKind::Parameter,
];
const RESOURCES: &[ResourceKind] = &[
    ResourceKind::Table,
    ResourceKind::Source,
    ResourceKind::Function,
];
const NODES: &[ResourceKind] = &[ResourceKind::Table, ResourceKind::Source];
const TAGGED: &[ResourceKind] = &[
    ResourceKind::Table,
    ResourceKind::Source,
    ResourceKind::Column,
];
const TABLE: &[ResourceKind] = &[ResourceKind::Table];
const SOURCE: &[ResourceKind] = &[ResourceKind::Source];
const COLUMN: &[ResourceKind] = &[ResourceKind::Column];
const PARAMETER: &[ResourceKind] = &[ResourceKind::Parameter];
const TABLE_OR_COLUMN: &[ResourceKind] = &[ResourceKind::Table, ResourceKind::Column];

struct FilterRule {
    name: &'static str,
    kinds: &'static [ResourceKind],
    build: fn(Option<&Value>) -> std::result::Result<Filter, String>,
}

struct TermRule {
    name: &'static str,
    kinds: &'static [ResourceKind],
    build: fn(Option<&Value>) -> std::result::Result<Term, String>,
}

static FILTER_RULES: &[FilterRule] = &[
    FilterRule {
        name: "name",
        kinds: ALL,
        build: |args| Ok(Filter::Name(PatternMatcher::from_args(args)?)),
    },
    FilterRule {
        name: "path",
        kinds: RESOURCES,
        build: |args| Ok(Filter::Path(PatternMatcher::from_args(args)?)),
    },
    FilterRule {
        name: "tags",
        kinds: TAGGED,
        build: Filter::tags_from_args,
    },
    FilterRule {
        name: "meta",
        kinds: TAGGED,
        build: Filter::meta_from_args,
    },
    FilterRule {
        name: "is_enabled",
        kinds: NODES,
        build: Filter::is_enabled_from_args,
    },
    FilterRule {
        name: "is_materialized",
        kinds: NODES,
        build: Filter::is_materialized_from_args,
    },
];

fn no_args(args: Option<&Value>, term: Term) -> std::result::Result<Term, String> {
    match args {
        None | Some(Value::Null) => Ok(term),
        Some(_) => Err("takes no arguments".to_string()),
    }
}

fn string_list(args: Option<&Value>) -> std::result::Result<Vec<String>, String> {
    match args {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value::<OneOrMany>(value.clone())
            .map(OneOrMany::into_vec)
            .map_err(|e| e.to_string()),
    }
}

fn meta_map(
    args: Option<&Value>,
) -> std::result::Result<std::collections::BTreeMap<String, MetaValue>, String> {
    match args {
        None => Ok(Default::default()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| e.to_string()),
    }
}

#[derive(serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ExactArgs {
    #[serde(default)]
    exact: bool,
}

static TERM_RULES: &[TermRule] = &[
    TermRule {
        name: "has_description",
        kinds: ALL,
        build: |args| no_args(args, Term::HasDescription),
    },
    TermRule {
        name: "has_properties",
        kinds: RESOURCES,
        build: |args| no_args(args, Term::HasProperties),
    },
    TermRule {
        name: "has_data_type",
        kinds: COLUMN,
        build: |args| no_args(args, Term::HasDataType),
    },
    TermRule {
        name: "has_type",
        kinds: PARAMETER,
        build: |args| no_args(args, Term::HasType),
    },
    TermRule {
        name: "has_tests",
        kinds: TABLE_OR_COLUMN,
        build: |args| Ok(Term::HasTests(RangeMatcher::from_args(args, 1)?)),
    },
    TermRule {
        name: "has_constraints",
        kinds: TABLE,
        build: |args| Ok(Term::HasConstraints(RangeMatcher::from_args(args, 1)?)),
    },
    TermRule {
        name: "has_downstream_dependencies",
        kinds: SOURCE,
        build: |args| {
            Ok(Term::HasDownstreamDependencies(RangeMatcher::from_args(
                args, 1,
            )?))
        },
    },
    TermRule {
        name: "meta_has_required_keys",
        kinds: TAGGED,
        build: |args| Ok(Term::MetaHasRequiredKeys(string_list(args)?)),
    },
    TermRule {
        name: "meta_has_allowed_keys",
        kinds: TAGGED,
        build: |args| Ok(Term::MetaHasAllowedKeys(string_list(args)?)),
    },
    TermRule {
        name: "meta_has_accepted_values",
        kinds: TAGGED,
        build: |args| Ok(Term::MetaHasAcceptedValues(meta_map(args)?)),
    },
    TermRule {
        name: "tags_have_required_values",
        kinds: TAGGED,
        build: |args| Ok(Term::TagsHaveRequiredValues(string_list(args)?)),
    },
    TermRule {
        name: "tags_have_allowed_values",
        kinds: TAGGED,
        build: |args| Ok(Term::TagsHaveAllowedValues(string_list(args)?)),
    },
    TermRule {
        name: "has_all_columns",
        kinds: NODES,
        build: |args| no_args(args, Term::HasAllColumns),
    },
    TermRule {
        name: "has_expected_columns",
        kinds: NODES,
        build: |args| Ok(Term::HasExpectedColumns(ExpectedColumns::from_args(args)?)),
    },
    TermRule {
        name: "has_no_final_semicolon",
        kinds: TABLE,
        build: |args| no_args(args, Term::HasNoFinalSemicolon),
    },
    TermRule {
        name: "has_no_hardcoded_refs",
        kinds: TABLE,
        build: |args| no_args(args, Term::HasNoHardcodedRefs),
    },
    TermRule {
        name: "exists",
        kinds: TAGGED,
        build: |args| no_args(args, Term::Exists),
    },
    TermRule {
        name: "has_matching_description",
        kinds: TAGGED,
        build: |args| Ok(Term::HasMatchingDescription(StringMatcher::from_args(args)?)),
    },
    TermRule {
        name: "has_matching_data_type",
        kinds: COLUMN,
        build: |args| {
            let exact = match args {
                None => false,
                Some(value) => {
                    serde_json::from_value::<ExactArgs>(value.clone())
                        .map_err(|e| e.to_string())?
                        .exact
                }
            };
            Ok(Term::HasMatchingDataType { exact })
        },
    },
    TermRule {
        name: "has_matching_index",
        kinds: COLUMN,
        build: |args| no_args(args, Term::HasMatchingIndex),
    },
    TermRule {
        name: "has_expected_name",
        kinds: COLUMN,
        build: |args| Ok(Term::HasExpectedName(ExpectedName::from_args(args)?)),
    },
    TermRule {
        name: "has_valid_ref_dependencies",
        kinds: TABLE,
        build: |args| Ok(Term::HasValidRefDependencies(RangeMatcher::from_args(args, 0)?)),
    },
    TermRule {
        name: "has_valid_source_dependencies",
        kinds: TABLE,
        build: |args| {
            Ok(Term::HasValidSourceDependencies(RangeMatcher::from_args(
                args, 0,
            )?))
        },
    },
    TermRule {
        name: "has_valid_macro_dependencies",
        kinds: TABLE,
        build: |args| {
            Ok(Term::HasValidMacroDependencies(RangeMatcher::from_args(
                args, 0,
            )?))
        },
    },
    TermRule {
        name: "has_loader",
        kinds: SOURCE,
        build: |args| no_args(args, Term::HasLoader),
    },
    TermRule {
        name: "has_freshness",
        kinds: SOURCE,
        build: |args| no_args(args, Term::HasFreshness),
    },
];

/// One contract, ready to evaluate: resolved filters and terms plus an
/// optional nested child contract over column/parameter items.
#[derive(Debug)]
pub struct CompiledContract {
    /// Contract path within the rule file (e.g. `tables.columns`)
    pub path: String,
    /// Kind of item this contract scopes over
    pub kind: ResourceKind,
    pub filters: Vec<Filter>,
    pub terms: Vec<Term>,
    pub generator: Option<GeneratorConfig>,
    pub child: Option<Box<CompiledContract>>,
}

/// Compiles the full rule file, failing fast on the first invalid rule.
pub fn compile(config: &ContractsConfig) -> Result<Vec<CompiledContract>> {
    let mut contracts = Vec::new();
    let sections = [
        ("tables", ResourceKind::Table, &config.contracts.tables),
        ("sources", ResourceKind::Source, &config.contracts.sources),
        (
            "functions",
            ResourceKind::Function,
            &config.contracts.functions,
        ),
    ];

    for (path, kind, spec) in sections {
        if let Some(spec) = spec {
            contracts.push(compile_spec(path.to_string(), kind, spec)?);
        }
    }
    Ok(contracts)
}

fn compile_spec(path: String, kind: ResourceKind, spec: &ContractSpec) -> Result<CompiledContract> {
    let child = match kind {
        ResourceKind::Table | ResourceKind::Source => {
            if spec.parameters.is_some() {
                return Err(ContractError::config(
                    path,
                    "parameter contracts only apply under functions",
                ));
            }
            spec.columns
                .as_deref()
                .map(|child| compile_child(&path, "columns", ResourceKind::Column, child))
                .transpose()?
        }
        ResourceKind::Function => {
            if spec.columns.is_some() {
                return Err(ContractError::config(
                    path,
                    "column contracts only apply under tables or sources",
                ));
            }
            if spec.generator.is_some() {
                return Err(ContractError::config(
                    path,
                    "the generator does not apply to function contracts",
                ));
            }
            spec.parameters
                .as_deref()
                .map(|child| compile_child(&path, "parameters", ResourceKind::Parameter, child))
                .transpose()?
        }
        // children never carry their own children; compile_child rejects that
        ResourceKind::Column | ResourceKind::Parameter => None,
    };

    Ok(CompiledContract {
        filters: compile_filters(&path, kind, spec)?,
        terms: compile_terms(&path, kind, spec)?,
        generator: spec.generator.clone(),
        child: child.map(Box::new),
        path,
        kind,
    })
}

fn compile_child(
    parent_path: &str,
    segment: &str,
    kind: ResourceKind,
    spec: &ContractSpec,
) -> Result<CompiledContract> {
    let path = format!("{parent_path}.{segment}");
    if spec.columns.is_some() || spec.parameters.is_some() {
        return Err(ContractError::config(
            path,
            "contracts nest at most one level",
        ));
    }
    compile_spec(path, kind, spec)
}

fn compile_filters(path: &str, kind: ResourceKind, spec: &ContractSpec) -> Result<Vec<Filter>> {
    spec.filters
        .iter()
        .map(|entry| {
            if entry.key_count() != 1 {
                return Err(ContractError::config(
                    path,
                    "each rule entry must name exactly one rule",
                ));
            }
            let name = entry.name();
            let rule = FILTER_RULES
                .iter()
                .find(|rule| rule.name == name)
                .ok_or_else(|| {
                    ContractError::config(path, format!("unknown filter rule '{name}'"))
                })?;
            if !rule.kinds.contains(&kind) {
                return Err(ContractError::config(
                    path,
                    format!("filter '{name}' does not apply to {} items", kind.label()),
                ));
            }
            (rule.build)(entry.args()).map_err(|message| {
                ContractError::config(path, format!("invalid arguments for '{name}': {message}"))
            })
        })
        .collect()
}

fn compile_terms(path: &str, kind: ResourceKind, spec: &ContractSpec) -> Result<Vec<Term>> {
    spec.validations
        .iter()
        .map(|entry| {
            if entry.key_count() != 1 {
                return Err(ContractError::config(
                    path,
                    "each rule entry must name exactly one rule",
                ));
            }
            let name = entry.name();
            let rule = TERM_RULES
                .iter()
                .find(|rule| rule.name == name)
                .ok_or_else(|| {
                    ContractError::config(path, format!("unknown validation rule '{name}'"))
                })?;
            if !rule.kinds.contains(&kind) {
                return Err(ContractError::config(
                    path,
                    format!(
                        "validation '{name}' does not apply to {} items",
                        kind.label()
                    ),
                ));
            }
            (rule.build)(entry.args()).map_err(|message| {
                ContractError::config(path, format!("invalid arguments for '{name}': {message}"))
            })
        })
        .collect()
}
