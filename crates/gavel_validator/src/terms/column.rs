//! Terms reconciling declared items against the catalog snapshot: existence,
//! descriptions, data types, positions and naming conventions.

use std::collections::BTreeMap;

use gavel_core::CatalogColumn;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::TermOutcome;
use crate::context::EvalContext;
use crate::item::ItemRef;
use crate::matchers::{StringMatcher, compile_anchored};

/// The catalog column aligned with a declared column, or the unavailable
/// outcome to report when the parent entry or the column itself is absent.
fn aligned_column<'a>(
    item: ItemRef<'_>,
    ctx: &EvalContext<'a>,
    exact: bool,
) -> Result<&'a CatalogColumn, TermOutcome> {
    let ItemRef::Column { parent, column, .. } = item else {
        return Err(TermOutcome::pass());
    };
    let entry = super::catalog_entry_for(parent, ctx)?;
    entry.column(&column.name, exact).ok_or_else(|| {
        TermOutcome::unavailable(format!(
            "The column cannot be found in the {} '{}'",
            parent.kind().label(),
            parent.unique_id()
        ))
    })
}

pub(super) fn exists(item: ItemRef<'_>, ctx: &EvalContext<'_>) -> TermOutcome {
    match item {
        ItemRef::Resource(resource) => {
            let Some(catalog) = ctx.catalog else {
                return TermOutcome::unavailable(format!(
                    "The {} cannot be found in the database",
                    resource.kind().label()
                ));
            };
            TermOutcome::check(catalog.entry(resource.unique_id()).is_some(), || {
                format!(
                    "The {} cannot be found in the database",
                    resource.kind().label()
                )
            })
        }
        ItemRef::Column { parent, column, .. } => {
            let entry = match super::catalog_entry_for(parent, ctx) {
                Ok(entry) => entry,
                Err(outcome) => return outcome,
            };
            TermOutcome::check(entry.column(&column.name, false).is_some(), || {
                format!(
                    "The column cannot be found in the {} '{}'",
                    parent.kind().label(),
                    parent.unique_id()
                )
            })
        }
        ItemRef::Parameter { .. } => TermOutcome::pass(),
    }
}

pub(super) fn has_matching_description(
    item: ItemRef<'_>,
    ctx: &EvalContext<'_>,
    matcher: &StringMatcher,
) -> TermOutcome {
    let (declared, remote) = match item {
        ItemRef::Resource(resource) => {
            let entry = match super::catalog_entry_for(resource, ctx) {
                Ok(entry) => entry,
                Err(outcome) => return outcome,
            };
            (
                resource.description().map(str::to_string),
                entry.comment.clone(),
            )
        }
        ItemRef::Column { column, .. } => {
            let aligned = match aligned_column(item, ctx, false) {
                Ok(aligned) => aligned,
                Err(outcome) => return outcome,
            };
            (column.description.clone(), aligned.comment.clone())
        }
        ItemRef::Parameter { .. } => return TermOutcome::pass(),
    };

    TermOutcome::check(
        matcher.matches(declared.as_deref(), remote.as_deref()),
        || {
            format!(
                "Description does not match remote entity: '{}' != '{}'",
                declared.unwrap_or_default(),
                remote.unwrap_or_default()
            )
        },
    )
}

pub(super) fn has_matching_data_type(
    item: ItemRef<'_>,
    ctx: &EvalContext<'_>,
    exact: bool,
) -> TermOutcome {
    let ItemRef::Column { column, .. } = item else {
        return TermOutcome::pass();
    };
    let aligned = match aligned_column(item, ctx, exact) {
        Ok(aligned) => aligned,
        Err(outcome) => return outcome,
    };

    let declared = column.data_type.clone().unwrap_or_default();
    let matches = if exact {
        declared == aligned.data_type
    } else {
        normalize(&declared) == normalize(&aligned.data_type)
    };
    TermOutcome::check(matches, || {
        format!(
            "Data type does not match remote entity: {declared} != {}",
            aligned.data_type
        )
    })
}

fn normalize(data_type: &str) -> String {
    data_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

pub(super) fn has_matching_index(item: ItemRef<'_>, ctx: &EvalContext<'_>) -> TermOutcome {
    let ItemRef::Column { position, .. } = item else {
        return TermOutcome::pass();
    };
    let aligned = match aligned_column(item, ctx, false) {
        Ok(aligned) => aligned,
        Err(outcome) => return outcome,
    };
    TermOutcome::check(position == aligned.index, || {
        format!(
            "Column index does not match remote entity: {position} != {}",
            aligned.index
        )
    })
}

/// Naming conventions per data type.
///
/// Pattern sets are keyed by data type, matched case-insensitively; the
/// empty-string key is the generic fallback for types without their own set.
#[derive(Debug, Clone, Default)]
pub struct ExpectedName {
    patterns: BTreeMap<String, PatternSet>,
}

#[derive(Debug, Clone)]
struct PatternSet {
    raw: Vec<String>,
    compiled: Vec<Regex>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPatterns {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpectedNameArgs {
    Wrapped {
        patterns: BTreeMap<String, RawPatterns>,
    },
    Bare(BTreeMap<String, RawPatterns>),
}

impl ExpectedName {
    /// Builds the convention map from raw rule arguments: a mapping of data
    /// type to pattern(s), optionally under a `patterns` key. An empty-string
    /// data type key applies to all types without their own entry.
    pub fn from_args(args: Option<&Value>) -> Result<Self, String> {
        let Some(value) = args else {
            return Err("expected a mapping of data type to name patterns".to_string());
        };
        let raw = match serde_json::from_value::<ExpectedNameArgs>(value.clone())
            .map_err(|e| e.to_string())?
        {
            ExpectedNameArgs::Wrapped { patterns } | ExpectedNameArgs::Bare(patterns) => patterns,
        };

        let mut patterns = BTreeMap::new();
        for (data_type, raw) in raw {
            let raw = match raw {
                RawPatterns::One(pattern) => vec![pattern],
                RawPatterns::Many(list) => list,
            };
            let compiled = raw
                .iter()
                .map(|p| compile_anchored(p))
                .collect::<Result<_, _>>()?;
            patterns.insert(data_type.to_lowercase(), PatternSet { raw, compiled });
        }
        Ok(Self { patterns })
    }

    fn set_for<'a>(&'a self, data_type: &'a str) -> Option<(&'a str, &'a PatternSet)> {
        let key = data_type.to_lowercase();
        if !key.is_empty() {
            if let Some(set) = self.patterns.get(&key) {
                return Some((data_type, set));
            }
        }
        self.patterns.get("").map(|set| ("", set))
    }
}

pub(super) fn has_expected_name(
    item: ItemRef<'_>,
    ctx: &EvalContext<'_>,
    expected: &ExpectedName,
) -> TermOutcome {
    let ItemRef::Column { column, .. } = item else {
        return TermOutcome::pass();
    };

    // Fall back to the catalog type when no data type is declared.
    let data_type = match column.data_type.clone().filter(|t| !t.is_empty()) {
        Some(data_type) => data_type,
        None if ctx.catalog.is_some() => match aligned_column(item, ctx, false) {
            Ok(aligned) => aligned.data_type.clone(),
            Err(outcome) => return outcome,
        },
        None => String::new(),
    };

    let Some((matched_type, set)) = expected.set_for(&data_type) else {
        return TermOutcome::pass();
    };
    let ok = set.compiled.iter().all(|pattern| pattern.is_match(&column.name));
    TermOutcome::check(ok, || {
        if matched_type.is_empty() {
            format!(
                "Column name does not match expected patterns: {}",
                set.raw.join(", ")
            )
        } else {
            format!(
                "Column name does not match expected pattern for type {data_type}: {}",
                set.raw.join(", ")
            )
        }
    })
}
