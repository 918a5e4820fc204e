//! Terms over declared properties: descriptions, types, tags and meta.

use std::collections::{BTreeMap, BTreeSet};

use gavel_core::{MetaValue, ResourceKind};

use super::TermOutcome;
use crate::item::ItemRef;

pub(super) fn has_description(item: ItemRef<'_>) -> TermOutcome {
    let present = item.description().is_some_and(|d| !d.trim().is_empty());
    TermOutcome::check(present, || "Missing description".to_string())
}

pub(super) fn has_properties(item: ItemRef<'_>) -> TermOutcome {
    // Sources are declared in properties files by definition.
    if item.kind() == ResourceKind::Source {
        return TermOutcome::pass();
    }
    let present = item.properties_path().is_some();
    TermOutcome::check(present, || "No properties file found".to_string())
}

pub(super) fn has_data_type(item: ItemRef<'_>) -> TermOutcome {
    let present = item.data_type().is_some_and(|t| !t.trim().is_empty());
    TermOutcome::check(present, || {
        "Data type not configured for this column".to_string()
    })
}

pub(super) fn has_type(item: ItemRef<'_>) -> TermOutcome {
    let present = item.data_type().is_some_and(|t| !t.trim().is_empty());
    TermOutcome::check(present, || {
        "Parameter does not have a type configured".to_string()
    })
}

pub(super) fn tags_have_required_values(item: ItemRef<'_>, required: &[String]) -> TermOutcome {
    let missing: Vec<&str> = match item.tags() {
        Some(tags) => required
            .iter()
            .filter(|tag| !tags.contains(*tag))
            .map(String::as_str)
            .collect(),
        None => required.iter().map(String::as_str).collect(),
    };
    TermOutcome::check(missing.is_empty(), || {
        format!("Missing required tags: {}", missing.join(", "))
    })
}

pub(super) fn tags_have_allowed_values(item: ItemRef<'_>, allowed: &[String]) -> TermOutcome {
    let allowed: BTreeSet<&str> = allowed.iter().map(String::as_str).collect();
    let invalid: Vec<&str> = item
        .tags()
        .into_iter()
        .flatten()
        .filter(|tag| !allowed.contains(tag.as_str()))
        .map(String::as_str)
        .collect();
    TermOutcome::check(invalid.is_empty(), || {
        format!("Contains invalid tags: {}", invalid.join(", "))
    })
}

pub(super) fn meta_has_required_keys(item: ItemRef<'_>, required: &[String]) -> TermOutcome {
    let missing: Vec<&str> = match item.meta() {
        Some(meta) => required
            .iter()
            .filter(|key| !meta.contains_key(*key))
            .map(String::as_str)
            .collect(),
        None => required.iter().map(String::as_str).collect(),
    };
    TermOutcome::check(missing.is_empty(), || {
        format!("Missing required keys: {}", missing.join(", "))
    })
}

pub(super) fn meta_has_allowed_keys(item: ItemRef<'_>, allowed: &[String]) -> TermOutcome {
    let allowed: BTreeSet<&str> = allowed.iter().map(String::as_str).collect();
    let invalid: Vec<&str> = item
        .meta()
        .into_iter()
        .flat_map(BTreeMap::keys)
        .filter(|key| !allowed.contains(key.as_str()))
        .map(String::as_str)
        .collect();
    TermOutcome::check(invalid.is_empty(), || {
        format!("Contains invalid keys: {}", invalid.join(", "))
    })
}

pub(super) fn meta_has_accepted_values(
    item: ItemRef<'_>,
    accepted: &BTreeMap<String, MetaValue>,
) -> TermOutcome {
    let Some(meta) = item.meta() else {
        return TermOutcome::pass();
    };
    let invalid: Vec<String> = accepted
        .iter()
        .filter_map(|(key, expected)| {
            let actual = meta.get(key)?;
            (!expected.matches(actual)).then(|| format!("{key}={actual}"))
        })
        .collect();
    TermOutcome::check(invalid.is_empty(), || {
        format!("Contains invalid meta values: {}", invalid.join(", "))
    })
}
