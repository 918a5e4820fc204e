//! Validation terms.
//!
//! A term is one check producing a pass/fail per in-scope item. Terms never
//! abort their siblings: any condition not met is recorded as a failed
//! outcome, and a check that could not be carried out (no catalog entry,
//! unresolved dependency target) is recorded as unavailable, distinct from a
//! genuine mismatch.

mod column;
mod node;
mod properties;

use std::collections::BTreeMap;

use gavel_core::{CatalogEntry, MetaValue, Resource, TermStatus};

use crate::context::EvalContext;
use crate::item::ItemRef;
use crate::matchers::{RangeMatcher, StringMatcher};

pub use column::ExpectedName;
pub use node::ExpectedColumns;

/// Outcome of one term applied to one item.
#[derive(Debug, Clone)]
pub struct TermOutcome {
    pub status: TermStatus,
    pub message: Option<String>,
}

impl TermOutcome {
    pub fn pass() -> Self {
        Self {
            status: TermStatus::Passed,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: TermStatus::Failed,
            message: Some(message.into()),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: TermStatus::Unavailable,
            message: Some(message.into()),
        }
    }

    /// Pass when `ok`, otherwise fail with `message`.
    pub fn check(ok: bool, message: impl FnOnce() -> String) -> Self {
        if ok { Self::pass() } else { Self::fail(message()) }
    }
}

/// The catalog entry backing a resource, or the unavailable outcome catalog
/// checks report when there is none.
pub(crate) fn catalog_entry_for<'a>(
    resource: &Resource,
    ctx: &EvalContext<'a>,
) -> Result<&'a CatalogEntry, TermOutcome> {
    ctx.catalog_entry(resource).ok_or_else(|| {
        TermOutcome::unavailable(format!(
            "The {} cannot be found in the database",
            resource.kind().label()
        ))
    })
}

/// A compiled validation term.
#[derive(Debug, Clone)]
pub enum Term {
    HasDescription,
    HasProperties,
    HasDataType,
    HasType,
    HasTests(RangeMatcher),
    HasConstraints(RangeMatcher),
    HasDownstreamDependencies(RangeMatcher),
    MetaHasRequiredKeys(Vec<String>),
    MetaHasAllowedKeys(Vec<String>),
    MetaHasAcceptedValues(BTreeMap<String, MetaValue>),
    TagsHaveRequiredValues(Vec<String>),
    TagsHaveAllowedValues(Vec<String>),
    HasAllColumns,
    HasExpectedColumns(ExpectedColumns),
    HasNoFinalSemicolon,
    HasNoHardcodedRefs,
    Exists,
    HasMatchingDescription(StringMatcher),
    HasMatchingDataType { exact: bool },
    HasMatchingIndex,
    HasExpectedName(ExpectedName),
    HasValidRefDependencies(RangeMatcher),
    HasValidSourceDependencies(RangeMatcher),
    HasValidMacroDependencies(RangeMatcher),
    HasLoader,
    HasFreshness,
}

impl Term {
    /// The configured rule name of this term.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HasDescription => "has_description",
            Self::HasProperties => "has_properties",
            Self::HasDataType => "has_data_type",
            Self::HasType => "has_type",
            Self::HasTests(_) => "has_tests",
            Self::HasConstraints(_) => "has_constraints",
            Self::HasDownstreamDependencies(_) => "has_downstream_dependencies",
            Self::MetaHasRequiredKeys(_) => "meta_has_required_keys",
            Self::MetaHasAllowedKeys(_) => "meta_has_allowed_keys",
            Self::MetaHasAcceptedValues(_) => "meta_has_accepted_values",
            Self::TagsHaveRequiredValues(_) => "tags_have_required_values",
            Self::TagsHaveAllowedValues(_) => "tags_have_allowed_values",
            Self::HasAllColumns => "has_all_columns",
            Self::HasExpectedColumns(_) => "has_expected_columns",
            Self::HasNoFinalSemicolon => "has_no_final_semicolon",
            Self::HasNoHardcodedRefs => "has_no_hardcoded_refs",
            Self::Exists => "exists",
            Self::HasMatchingDescription(_) => "has_matching_description",
            Self::HasMatchingDataType { .. } => "has_matching_data_type",
            Self::HasMatchingIndex => "has_matching_index",
            Self::HasExpectedName(_) => "has_expected_name",
            Self::HasValidRefDependencies(_) => "has_valid_ref_dependencies",
            Self::HasValidSourceDependencies(_) => "has_valid_source_dependencies",
            Self::HasValidMacroDependencies(_) => "has_valid_macro_dependencies",
            Self::HasLoader => "has_loader",
            Self::HasFreshness => "has_freshness",
        }
    }

    /// Runs this term against one item.
    pub fn run(&self, item: ItemRef<'_>, ctx: &EvalContext<'_>) -> TermOutcome {
        match self {
            Self::HasDescription => properties::has_description(item),
            Self::HasProperties => properties::has_properties(item),
            Self::HasDataType => properties::has_data_type(item),
            Self::HasType => properties::has_type(item),
            Self::MetaHasRequiredKeys(keys) => properties::meta_has_required_keys(item, keys),
            Self::MetaHasAllowedKeys(keys) => properties::meta_has_allowed_keys(item, keys),
            Self::MetaHasAcceptedValues(map) => properties::meta_has_accepted_values(item, map),
            Self::TagsHaveRequiredValues(tags) => properties::tags_have_required_values(item, tags),
            Self::TagsHaveAllowedValues(tags) => properties::tags_have_allowed_values(item, tags),

            Self::HasTests(range) => node::has_tests(item, range),
            Self::HasConstraints(range) => node::has_constraints(item, range),
            Self::HasDownstreamDependencies(range) => {
                node::has_downstream_dependencies(item, ctx, range)
            }
            Self::HasAllColumns => node::has_all_columns(item, ctx),
            Self::HasExpectedColumns(expected) => node::has_expected_columns(item, expected),
            Self::HasNoFinalSemicolon => node::has_no_final_semicolon(item),
            Self::HasNoHardcodedRefs => node::has_no_hardcoded_refs(item),
            Self::HasValidRefDependencies(range) => {
                node::has_valid_dependencies(item, ctx, crate::deps::EdgeKind::Ref, range)
            }
            Self::HasValidSourceDependencies(range) => {
                node::has_valid_dependencies(item, ctx, crate::deps::EdgeKind::Source, range)
            }
            Self::HasValidMacroDependencies(range) => {
                node::has_valid_macro_dependencies(item, ctx, range)
            }
            Self::HasLoader => node::has_loader(item),
            Self::HasFreshness => node::has_freshness(item),

            Self::Exists => column::exists(item, ctx),
            Self::HasMatchingDescription(matcher) => {
                column::has_matching_description(item, ctx, matcher)
            }
            Self::HasMatchingDataType { exact } => {
                column::has_matching_data_type(item, ctx, *exact)
            }
            Self::HasMatchingIndex => column::has_matching_index(item, ctx),
            Self::HasExpectedName(expected) => column::has_expected_name(item, ctx, expected),
        }
    }
}
