//! Filter rules.
//!
//! A contract's filters are combined with logical AND: an item is in scope
//! only if it satisfies every filter. Nested contracts apply their own
//! filters to each in-scope parent's children independently.

use std::collections::BTreeMap;

use gavel_core::MetaValue;
use serde::Deserialize;
use serde_json::Value;

use crate::item::ItemRef;
use crate::matchers::{OneOrMany, PatternMatcher};

/// A compiled filter rule.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Match the item name against include/exclude patterns
    Name(PatternMatcher),
    /// Match the resource's file paths against include/exclude patterns
    Path(PatternMatcher),
    /// Keep items whose tag set intersects (or, in strict mode, contains)
    /// the configured tags
    Tags { tags: Vec<String>, strict: bool },
    /// Keep items whose meta mapping holds every configured key/value pair
    Meta(BTreeMap<String, MetaValue>),
    /// Keep items whose enabled flag equals the expected value
    IsEnabled { enabled: bool },
    /// Keep items whose materialization state equals the expected value
    IsMaterialized { materialized: bool },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TagArgs {
    #[serde(default)]
    tags: OneOrMany,
    #[serde(default)]
    strict: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetaArgs {
    #[serde(default)]
    meta: BTreeMap<String, MetaValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlagArgs {
    #[serde(default = "default_flag")]
    expected: bool,
}

fn default_flag() -> bool {
    true
}

fn flag_from_args(args: Option<&Value>) -> Result<bool, String> {
    match args {
        None => Ok(true),
        Some(value) => {
            let args: FlagArgs =
                serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
            Ok(args.expected)
        }
    }
}

impl Filter {
    /// Builds the `tags` filter from raw arguments.
    ///
    /// Accepts either `{tags: [...], strict: bool}` or a bare list of tags.
    pub fn tags_from_args(args: Option<&Value>) -> Result<Self, String> {
        let args: TagArgs = match args {
            None => TagArgs::default(),
            Some(value) if value.is_array() || value.is_string() => TagArgs {
                tags: serde_json::from_value(value.clone()).map_err(|e| e.to_string())?,
                strict: false,
            },
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| e.to_string())?,
        };
        Ok(Self::Tags {
            tags: args.tags.into_vec(),
            strict: args.strict,
        })
    }

    /// Builds the `meta` filter from raw arguments.
    pub fn meta_from_args(args: Option<&Value>) -> Result<Self, String> {
        let args: MetaArgs = match args {
            None => MetaArgs::default(),
            // allow the key/value map to be given directly
            Some(value) if value.get("meta").is_none() => MetaArgs {
                meta: serde_json::from_value(value.clone()).map_err(|e| e.to_string())?,
            },
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| e.to_string())?,
        };
        Ok(Self::Meta(args.meta))
    }

    /// Builds the `is_enabled` filter from raw arguments.
    pub fn is_enabled_from_args(args: Option<&Value>) -> Result<Self, String> {
        Ok(Self::IsEnabled {
            enabled: flag_from_args(args)?,
        })
    }

    /// Builds the `is_materialized` filter from raw arguments.
    pub fn is_materialized_from_args(args: Option<&Value>) -> Result<Self, String> {
        Ok(Self::IsMaterialized {
            materialized: flag_from_args(args)?,
        })
    }

    /// Whether `item` satisfies this filter.
    pub fn applies(&self, item: ItemRef<'_>) -> bool {
        match self {
            Self::Name(matcher) => matcher.matches(item.name()),

            Self::Path(matcher) => {
                let own = item
                    .path()
                    .map(|path| matcher.matches(&path.to_string_lossy()))
                    .unwrap_or(false);
                let properties = item
                    .properties_path()
                    .map(|path| matcher.matches(&path.to_string_lossy()))
                    .unwrap_or(false);
                own || properties
            }

            Self::Tags { tags, strict } => {
                if tags.is_empty() {
                    return true;
                }
                let Some(item_tags) = item.tags() else {
                    return false;
                };
                if *strict {
                    tags.iter().all(|tag| item_tags.contains(tag))
                } else {
                    tags.iter().any(|tag| item_tags.contains(tag))
                }
            }

            Self::Meta(expected) => {
                if expected.is_empty() {
                    return true;
                }
                let Some(meta) = item.meta() else {
                    return false;
                };
                expected.iter().all(|(key, accepted)| {
                    meta.get(key)
                        .map(|observed| accepted.matches(observed))
                        .unwrap_or(false)
                })
            }

            Self::IsEnabled { enabled } => {
                let observed = item
                    .as_resource()
                    .and_then(|r| r.as_node())
                    .map(|node| node.enabled)
                    .unwrap_or(true);
                observed == *enabled
            }

            Self::IsMaterialized { materialized } => {
                let observed = item
                    .as_resource()
                    .and_then(|r| r.as_node())
                    .map(|node| node.materialization.is_materialized())
                    .unwrap_or(false);
                observed == *materialized
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_core::{Materialization, Node, Resource};

    fn table(name: &str, tags: &[&str], meta: &[(&str, &str)]) -> Resource {
        Resource::Table(Node {
            unique_id: format!("table.demo.{name}"),
            name: name.to_string(),
            path: format!("tables/{name}.sql").into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            meta: meta
                .iter()
                .map(|(k, v)| (k.to_string(), MetaValue::from(*v)))
                .collect(),
            ..Node::default()
        })
    }

    #[test]
    fn name_filter_without_includes_matches_all() {
        let filter = Filter::Name(PatternMatcher::from_patterns(vec![], vec![], false).unwrap());
        let resource = table("orders", &[], &[]);
        assert!(filter.applies(ItemRef::Resource(&resource)));
    }

    #[test]
    fn tag_filter_intersects_by_default() {
        let resource = table("orders", &["gold", "daily"], &[]);
        let item = ItemRef::Resource(&resource);

        let filter = Filter::Tags {
            tags: vec!["gold".to_string(), "hourly".to_string()],
            strict: false,
        };
        assert!(filter.applies(item));

        let strict = Filter::Tags {
            tags: vec!["gold".to_string(), "hourly".to_string()],
            strict: true,
        };
        assert!(!strict.applies(item));

        let strict_subset = Filter::Tags {
            tags: vec!["gold".to_string(), "daily".to_string()],
            strict: true,
        };
        assert!(strict_subset.applies(item));
    }

    #[test]
    fn meta_filter_requires_every_pair() {
        let resource = table("orders", &[], &[("owner", "core"), ("layer", "mart")]);
        let item = ItemRef::Resource(&resource);

        let mut expected = BTreeMap::new();
        expected.insert("owner".to_string(), MetaValue::from("core"));
        assert!(Filter::Meta(expected.clone()).applies(item));

        expected.insert("layer".to_string(), MetaValue::from("staging"));
        assert!(!Filter::Meta(expected).applies(item));
    }

    #[test]
    fn meta_filter_accepts_list_membership() {
        let resource = table("orders", &[], &[("layer", "mart")]);
        let mut expected = BTreeMap::new();
        expected.insert(
            "layer".to_string(),
            MetaValue::List(vec![MetaValue::from("mart"), MetaValue::from("staging")]),
        );
        assert!(Filter::Meta(expected).applies(ItemRef::Resource(&resource)));
    }

    #[test]
    fn materialization_filter_excludes_ephemeral() {
        let mut node = Node {
            unique_id: "table.demo.tmp".to_string(),
            name: "tmp".to_string(),
            materialization: Materialization::Ephemeral,
            ..Node::default()
        };
        let filter = Filter::IsMaterialized { materialized: true };

        let resource = Resource::Table(node.clone());
        assert!(!filter.applies(ItemRef::Resource(&resource)));

        node.materialization = Materialization::Table;
        let resource = Resource::Table(node);
        assert!(filter.applies(ItemRef::Resource(&resource)));
    }

    #[test]
    fn and_composition_only_shrinks_scope() {
        let resources = vec![
            table("mart_orders", &["gold"], &[]),
            table("mart_tmp", &[], &[]),
            table("stg_orders", &["gold"], &[]),
        ];
        let name = Filter::Name(
            PatternMatcher::from_patterns(vec!["mart_.*".to_string()], vec![], false).unwrap(),
        );
        let tags = Filter::Tags {
            tags: vec!["gold".to_string()],
            strict: false,
        };

        let both: Vec<&str> = resources
            .iter()
            .filter(|r| {
                let item = ItemRef::Resource(r);
                name.applies(item) && tags.applies(item)
            })
            .map(|r| r.name())
            .collect();
        assert_eq!(both, vec!["mart_orders"]);

        // dropping either filter can only grow the scoped set
        let only_name = resources
            .iter()
            .filter(|r| name.applies(ItemRef::Resource(r)))
            .count();
        let only_tags = resources
            .iter()
            .filter(|r| tags.applies(ItemRef::Resource(r)))
            .count();
        assert!(only_name >= both.len());
        assert!(only_tags >= both.len());
    }
}
