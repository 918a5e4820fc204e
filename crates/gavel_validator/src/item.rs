//! Borrowed item views.
//!
//! Filters and terms are written once against this capability view instead of
//! being specialized per resource kind. A child item carries a reference to
//! its parent resource, which catalog checks need for identity lookups.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use gavel_core::{Column, MetaValue, Parameter, Resource, ResourceKind};

/// A resource, or a child item paired with its parent resource.
#[derive(Debug, Clone, Copy)]
pub enum ItemRef<'a> {
    Resource(&'a Resource),
    Column {
        parent: &'a Resource,
        column: &'a Column,
        /// Index of the column within the parent's declared ordering
        position: usize,
    },
    Parameter {
        parent: &'a Resource,
        parameter: &'a Parameter,
    },
}

impl<'a> ItemRef<'a> {
    /// The kind of this item.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Resource(resource) => resource.kind(),
            Self::Column { .. } => ResourceKind::Column,
            Self::Parameter { .. } => ResourceKind::Parameter,
        }
    }

    /// The item name.
    pub fn name(&self) -> &'a str {
        match self {
            Self::Resource(resource) => resource.name(),
            Self::Column { column, .. } => &column.name,
            Self::Parameter { parameter, .. } => &parameter.name,
        }
    }

    /// A stable identifier for results: the resource's unique id, or the
    /// parent's unique id suffixed with the child name.
    pub fn result_id(&self) -> String {
        match self {
            Self::Resource(resource) => resource.unique_id().to_string(),
            Self::Column { parent, column, .. } => {
                format!("{}.{}", parent.unique_id(), column.name)
            }
            Self::Parameter { parent, parameter } => {
                format!("{}.{}", parent.unique_id(), parameter.name)
            }
        }
    }

    /// The parent resource, for child items.
    pub fn parent(&self) -> Option<&'a Resource> {
        match self {
            Self::Resource(_) => None,
            Self::Column { parent, .. } | Self::Parameter { parent, .. } => Some(parent),
        }
    }

    /// The declared description, if any.
    pub fn description(&self) -> Option<&'a str> {
        match self {
            Self::Resource(resource) => resource.description(),
            Self::Column { column, .. } => column.description.as_deref(),
            Self::Parameter { parameter, .. } => parameter.description.as_deref(),
        }
    }

    /// The declared data type, for columns and parameters.
    pub fn data_type(&self) -> Option<&'a str> {
        match self {
            Self::Resource(_) => None,
            Self::Column { column, .. } => column.data_type.as_deref(),
            Self::Parameter { parameter, .. } => parameter.data_type.as_deref(),
        }
    }

    /// The item's tags, where the kind carries them.
    pub fn tags(&self) -> Option<&'a BTreeSet<String>> {
        match self {
            Self::Resource(resource) => resource.as_node().map(|node| &node.tags),
            Self::Column { column, .. } => Some(&column.tags),
            Self::Parameter { .. } => None,
        }
    }

    /// The item's meta mapping, where the kind carries one.
    pub fn meta(&self) -> Option<&'a BTreeMap<String, MetaValue>> {
        match self {
            Self::Resource(resource) => resource.as_node().map(|node| &node.meta),
            Self::Column { column, .. } => Some(&column.meta),
            Self::Parameter { .. } => None,
        }
    }

    /// The item's definition file path, for resources.
    pub fn path(&self) -> Option<&'a Path> {
        match self {
            Self::Resource(resource) => Some(resource.path()),
            _ => None,
        }
    }

    /// The item's properties file path, for resources that have one.
    pub fn properties_path(&self) -> Option<&'a Path> {
        match self {
            Self::Resource(resource) => resource.properties_path(),
            _ => None,
        }
    }

    /// The resource payload, when this item is a resource.
    pub fn as_resource(&self) -> Option<&'a Resource> {
        match self {
            Self::Resource(resource) => Some(resource),
            _ => None,
        }
    }
}
