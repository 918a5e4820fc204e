//! Terms over tables and sources: cardinalities, catalog column alignment,
//! definition hygiene and dependency validity.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use gavel_core::ResourceKind;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::TermOutcome;
use crate::context::EvalContext;
use crate::deps::EdgeKind;
use crate::item::ItemRef;
use crate::matchers::RangeMatcher;

fn title(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Table => "Table",
        ResourceKind::Source => "Source",
        ResourceKind::Function => "Function",
        ResourceKind::Column => "Column",
        ResourceKind::Parameter => "Parameter",
    }
}

pub(super) fn has_tests(item: ItemRef<'_>, range: &RangeMatcher) -> TermOutcome {
    let count = match item {
        ItemRef::Resource(resource) => resource.as_node().map(|node| node.tests).unwrap_or(0),
        ItemRef::Column { column, .. } => column.tests,
        ItemRef::Parameter { .. } => 0,
    };
    match range.mismatch("tests", count) {
        Some(message) => TermOutcome::fail(message),
        None => TermOutcome::pass(),
    }
}

pub(super) fn has_constraints(item: ItemRef<'_>, range: &RangeMatcher) -> TermOutcome {
    let count = item
        .as_resource()
        .and_then(|resource| resource.as_node())
        .map(|node| node.constraints)
        .unwrap_or(0);
    match range.mismatch("constraints", count) {
        Some(message) => TermOutcome::fail(message),
        None => TermOutcome::pass(),
    }
}

pub(super) fn has_downstream_dependencies(
    item: ItemRef<'_>,
    ctx: &EvalContext<'_>,
    range: &RangeMatcher,
) -> TermOutcome {
    let Some(resource) = item.as_resource() else {
        return TermOutcome::pass();
    };
    let count = ctx.deps.downstream_count(resource.unique_id());
    match range.mismatch("downstream dependencies", count) {
        Some(message) => TermOutcome::fail(message),
        None => TermOutcome::pass(),
    }
}

pub(super) fn has_loader(item: ItemRef<'_>) -> TermOutcome {
    let configured = item
        .as_resource()
        .and_then(|resource| resource.as_node())
        .and_then(|node| node.loader.as_deref())
        .is_some_and(|loader| !loader.trim().is_empty());
    TermOutcome::check(configured, || {
        "Loader is not correctly configured".to_string()
    })
}

pub(super) fn has_freshness(item: ItemRef<'_>) -> TermOutcome {
    let configured = item
        .as_resource()
        .and_then(|resource| resource.as_node())
        .is_some_and(|node| node.has_freshness);
    TermOutcome::check(configured, || {
        "Freshness is not correctly configured".to_string()
    })
}

pub(super) fn has_all_columns(item: ItemRef<'_>, ctx: &EvalContext<'_>) -> TermOutcome {
    let Some(resource) = item.as_resource() else {
        return TermOutcome::pass();
    };
    let entry = match super::catalog_entry_for(resource, ctx) {
        Ok(entry) => entry,
        Err(outcome) => return outcome,
    };

    let declared: BTreeSet<&str> = resource
        .columns()
        .iter()
        .map(|column| column.name.as_str())
        .collect();
    let expected: BTreeSet<&str> = entry
        .columns
        .iter()
        .map(|column| column.name.as_str())
        .collect();

    let missing: Vec<&str> = expected.difference(&declared).copied().collect();
    if !missing.is_empty() {
        return TermOutcome::fail(format!(
            "{} config does not contain all columns. Missing: {}",
            title(resource.kind()),
            missing.join(", ")
        ));
    }

    let extra: Vec<&str> = declared.difference(&expected).copied().collect();
    TermOutcome::check(extra.is_empty(), || {
        format!(
            "{} config contains too many columns. Extra: {}",
            title(resource.kind()),
            extra.join(", ")
        )
    })
}

/// Expected column names, optionally with their expected data types.
#[derive(Debug, Clone, Default)]
pub struct ExpectedColumns {
    names: Vec<String>,
    types: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColumnsSpec {
    One(String),
    Names(Vec<String>),
    Types(BTreeMap<String, String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpectedColumnsArgs {
    columns: ColumnsSpec,
}

impl ExpectedColumns {
    /// Builds the expectation from raw rule arguments: a column name, a list
    /// of names, a name-to-type mapping, or any of those under a `columns`
    /// key.
    pub fn from_args(args: Option<&Value>) -> Result<Self, String> {
        let Some(value) = args else {
            return Err("expected a column name, a list of names, or a name-to-type mapping"
                .to_string());
        };
        let spec = serde_json::from_value::<ExpectedColumnsArgs>(value.clone())
            .map(|args| args.columns)
            .or_else(|_| serde_json::from_value::<ColumnsSpec>(value.clone()))
            .map_err(|e| e.to_string())?;
        Ok(match spec {
            ColumnsSpec::One(name) => Self {
                names: vec![name],
                types: BTreeMap::new(),
            },
            ColumnsSpec::Names(names) => Self {
                names,
                types: BTreeMap::new(),
            },
            ColumnsSpec::Types(types) => Self {
                names: types.keys().cloned().collect(),
                types,
            },
        })
    }
}

pub(super) fn has_expected_columns(item: ItemRef<'_>, expected: &ExpectedColumns) -> TermOutcome {
    let Some(resource) = item.as_resource() else {
        return TermOutcome::pass();
    };
    let declared: BTreeMap<&str, Option<&str>> = resource
        .columns()
        .iter()
        .map(|column| (column.name.as_str(), column.data_type.as_deref()))
        .collect();

    let missing: Vec<&str> = expected
        .names
        .iter()
        .map(String::as_str)
        .filter(|name| !declared.contains_key(name))
        .collect();
    if !missing.is_empty() {
        return TermOutcome::fail(format!(
            "{} does not have all expected columns. Missing: {}",
            title(resource.kind()),
            missing.join(", ")
        ));
    }

    let mut mismatches = Vec::new();
    for (name, expected_type) in &expected.types {
        let Some(actual) = declared.get(name.as_str()) else {
            continue;
        };
        if actual.map(str::to_string).unwrap_or_default() != *expected_type {
            mismatches.push(format!(
                "\n- '{}' should be '{expected_type}'",
                actual.unwrap_or("")
            ));
        }
    }
    TermOutcome::check(mismatches.is_empty(), || {
        format!(
            "{} has unexpected column types.{}",
            title(resource.kind()),
            mismatches.concat()
        )
    })
}

pub(super) fn has_no_final_semicolon(item: ItemRef<'_>) -> TermOutcome {
    let Some(resource) = item.as_resource() else {
        return TermOutcome::pass();
    };
    let clean = !resource.definition().trim_end().ends_with(';');
    TermOutcome::check(clean, || "Script has a final semicolon".to_string())
}

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/|\{#.*?#\}|--[^\n]*").unwrap());

static BRACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\s*\{|\}\s*\}").unwrap());

static PAREN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([()])").unwrap());

static CTE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w-]+$").unwrap());

/// Relations named directly after `from`/`join` rather than through a
/// templated reference, minus names introduced as CTEs.
fn hardcoded_refs(definition: &str) -> Vec<String> {
    let sql = definition.split(';').next().unwrap_or("");
    let sql = COMMENT_RE.replace_all(sql, "");
    let sql = BRACE_RE.replace_all(&sql, |caps: &regex::Captures<'_>| {
        if caps[0].starts_with('{') { "{{ " } else { " }}" }.to_string()
    });
    let sql = PAREN_RE.replace_all(&sql, " $1 ");

    let tokens: Vec<String> = sql.split_whitespace().map(str::to_lowercase).collect();
    let mut refs = BTreeSet::new();
    let mut ctes = BTreeSet::new();

    for window in tokens.windows(3) {
        let [prev, curr, next] = window else {
            continue;
        };
        if matches!(curr.as_str(), "from" | "join")
            && next != "values"
            && !next.starts_with('{')
            && !next.starts_with('(')
        {
            refs.insert(next.trim_matches(',').to_string());
        } else if prev == "with" && CTE_NAME_RE.is_match(curr) {
            ctes.insert(curr.clone());
        } else if curr == "as" && next.starts_with('(') && CTE_NAME_RE.is_match(prev) {
            ctes.insert(prev.clone());
        }
    }

    refs.difference(&ctes).cloned().collect()
}

pub(super) fn has_no_hardcoded_refs(item: ItemRef<'_>) -> TermOutcome {
    let Some(resource) = item.as_resource() else {
        return TermOutcome::pass();
    };
    let refs = hardcoded_refs(resource.definition());
    TermOutcome::check(refs.is_empty(), || {
        format!("Script has hardcoded refs: {}", refs.join(", "))
    })
}

pub(super) fn has_valid_dependencies(
    item: ItemRef<'_>,
    ctx: &EvalContext<'_>,
    kind: EdgeKind,
    range: &RangeMatcher,
) -> TermOutcome {
    let Some(resource) = item.as_resource() else {
        return TermOutcome::pass();
    };
    let deps = ctx.deps.outgoing(resource.unique_id(), Some(kind));

    let label = match kind {
        EdgeKind::Ref => "ref",
        EdgeKind::Source => "source",
        EdgeKind::Call => "macro",
    };
    let unresolved: Vec<&str> = deps
        .iter()
        .filter(|dep| !dep.resolved)
        .map(|dep| dep.target.as_str())
        .collect();
    if !unresolved.is_empty() {
        return TermOutcome::unavailable(format!(
            "{} has missing upstream {label} dependencies declared: {}",
            title(resource.kind()),
            unresolved.join(", ")
        ));
    }

    match range.mismatch(&format!("{label} dependencies"), deps.len()) {
        Some(message) => TermOutcome::fail(message),
        None => TermOutcome::pass(),
    }
}

pub(super) fn has_valid_macro_dependencies(
    item: ItemRef<'_>,
    ctx: &EvalContext<'_>,
    range: &RangeMatcher,
) -> TermOutcome {
    let Some(resource) = item.as_resource() else {
        return TermOutcome::pass();
    };
    let deps = ctx.deps.outgoing(resource.unique_id(), Some(EdgeKind::Call));

    let unresolved: Vec<&str> = deps
        .iter()
        .filter(|dep| !dep.resolved)
        .map(|dep| dep.target.as_str())
        .collect();
    if !unresolved.is_empty() {
        return TermOutcome::unavailable(format!(
            "{} has missing upstream macro dependencies declared: {}",
            title(resource.kind()),
            unresolved.join(", ")
        ));
    }

    // A call is compatible when it supplies no more arguments than the
    // function declares.
    for dep in &deps {
        let declared = ctx
            .project
            .get(&dep.target)
            .and_then(|target| target.as_function())
            .map(|function| function.parameters.len())
            .unwrap_or(0);
        if dep.call_args > declared {
            return TermOutcome::fail(format!(
                "Call of {} supplies {} arguments but it declares {declared}",
                dep.target, dep.call_args
            ));
        }
    }

    match range.mismatch("macro dependencies", deps.len()) {
        Some(message) => TermOutcome::fail(message),
        None => TermOutcome::pass(),
    }
}
