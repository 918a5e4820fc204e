//! Shared evaluation context.
//!
//! Built once per run, before any contract is evaluated: the resource model,
//! the optional catalog snapshot and the dependency graph. Everything here is
//! read-only, so per-resource term evaluation can share it freely.

use gavel_core::{Catalog, CatalogEntry, Project, Resource};

use crate::deps::DependencyGraph;

/// Read-only context passed into filter and term evaluation.
#[derive(Debug)]
pub struct EvalContext<'a> {
    /// The loaded resource model
    pub project: &'a Project,

    /// The catalog snapshot; absent when no catalog provider was given, in
    /// which case catalog-dependent terms report "unavailable"
    pub catalog: Option<&'a Catalog>,

    /// The dependency graph built from compiled definition text
    pub deps: &'a DependencyGraph,
}

impl<'a> EvalContext<'a> {
    /// The catalog entry matching a resource's identity, if the catalog is
    /// present and holds one.
    pub fn catalog_entry(&self, resource: &Resource) -> Option<&'a CatalogEntry> {
        self.catalog.and_then(|catalog| catalog.entry(resource.unique_id()))
    }
}
