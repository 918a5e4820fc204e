//! Dependency analysis.
//!
//! Builds a directed reference graph from each resource's compiled definition
//! text, once per run. Edges are classified as table references
//! (`ref('name')`), source references (`source('src', 'table')`) or function
//! calls (`{{ name(...) }}`). Targets that do not resolve to a known resource
//! are kept on the edge and surface as validation failures, never a crash.

use std::collections::HashMap;
use std::sync::LazyLock;

use gavel_core::{Project, Resource, ResourceKind};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use regex::Regex;
use tracing::debug;

static REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bref\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

static SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bsource\s*\(\s*['"]([^'"]+)['"]\s*,\s*['"]([^'"]+)['"]\s*\)"#).unwrap()
});

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(([^()]*)\)").unwrap()
});

/// Call keywords that never name a project function.
const CALL_IGNORE: &[&str] = &["ref", "source", "config", "var", "env_var"];

/// Classification of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Reference to another table
    Ref,
    /// Reference to an external source
    Source,
    /// Call of a project function
    Call,
}

/// One edge in the graph, as stored against its origin.
#[derive(Debug, Clone)]
struct DepEdge {
    kind: EdgeKind,
    /// Number of arguments supplied at the call site (function calls only)
    call_args: usize,
}

/// A node is either a known project resource or an unresolved reference
/// target kept by the raw name it was referenced with.
#[derive(Debug, Clone)]
struct DepNode {
    id: String,
    resolved: bool,
}

/// An outgoing dependency of one resource, as seen by validation terms.
#[derive(Debug, Clone)]
pub struct Dependency {
    /// Unique id of the target when resolved, otherwise the raw reference
    pub target: String,
    /// Whether the target resolved to a resource in the project
    pub resolved: bool,
    /// Edge classification
    pub kind: EdgeKind,
    /// Number of arguments supplied at the call site (function calls only)
    pub call_args: usize,
}

/// Directed reference graph over the project, read-only after construction.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<DepNode, DepEdge>,
    by_id: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph by scanning every resource's definition text.
    pub fn build(project: &Project) -> Self {
        let mut this = Self::default();

        for resource in project.resources() {
            this.insert_node(resource.unique_id().to_string(), true);
        }

        for resource in project.resources() {
            this.scan_resource(resource, project);
        }

        debug!(
            nodes = this.graph.node_count(),
            edges = this.graph.edge_count(),
            "dependency graph built"
        );
        this
    }

    fn insert_node(&mut self, id: String, resolved: bool) -> NodeIndex {
        if let Some(&index) = self.by_id.get(&id) {
            return index;
        }
        let index = self.graph.add_node(DepNode {
            id: id.clone(),
            resolved,
        });
        self.by_id.insert(id, index);
        index
    }

    fn scan_resource(&mut self, resource: &Resource, project: &Project) {
        let from = self.by_id[resource.unique_id()];
        let definition = resource.definition().to_string();

        for capture in REF_RE.captures_iter(&definition) {
            let name = &capture[1];
            let (target, resolved) = match project.table_by_name(name) {
                Some(table) => (table.unique_id().to_string(), true),
                None => (name.to_string(), false),
            };
            let to = self.insert_node(target, resolved);
            self.graph.add_edge(
                from,
                to,
                DepEdge {
                    kind: EdgeKind::Ref,
                    call_args: 0,
                },
            );
        }

        for capture in SOURCE_RE.captures_iter(&definition) {
            let name = format!("{}.{}", &capture[1], &capture[2]);
            let (target, resolved) = match project.source_by_name(&name) {
                Some(source) => (source.unique_id().to_string(), true),
                None => (name, false),
            };
            let to = self.insert_node(target, resolved);
            self.graph.add_edge(
                from,
                to,
                DepEdge {
                    kind: EdgeKind::Source,
                    call_args: 0,
                },
            );
        }

        for capture in CALL_RE.captures_iter(&definition) {
            let name = &capture[1];
            if CALL_IGNORE.contains(&name) {
                continue;
            }
            let args = capture[2].trim();
            let call_args = if args.is_empty() {
                0
            } else {
                args.split(',').count()
            };
            let (target, resolved) = match project.function_by_name(name) {
                Some(function) => (function.unique_id.clone(), true),
                None => (name.to_string(), false),
            };
            let to = self.insert_node(target, resolved);
            self.graph.add_edge(
                from,
                to,
                DepEdge {
                    kind: EdgeKind::Call,
                    call_args,
                },
            );
        }
    }

    /// Outgoing dependencies of a resource, optionally restricted to a kind.
    pub fn outgoing(&self, unique_id: &str, kind: Option<EdgeKind>) -> Vec<Dependency> {
        let Some(&index) = self.by_id.get(unique_id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(index, Direction::Outgoing)
            .filter(|edge| kind.map(|k| edge.weight().kind == k).unwrap_or(true))
            .map(|edge| {
                let target = &self.graph[edge.target()];
                Dependency {
                    target: target.id.clone(),
                    resolved: target.resolved,
                    kind: edge.weight().kind,
                    call_args: edge.weight().call_args,
                }
            })
            .collect()
    }

    /// Number of resources that reference the given resource.
    pub fn downstream_count(&self, unique_id: &str) -> usize {
        self.by_id
            .get(unique_id)
            .map(|&index| {
                self.graph
                    .edges_directed(index, Direction::Incoming)
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_core::{Function, Node, Parameter};

    fn project() -> Project {
        Project::new(vec![
            Resource::Table(Node {
                unique_id: "table.demo.orders".to_string(),
                name: "orders".to_string(),
                definition: concat!(
                    "select * from {{ ref('stg_orders') }} ",
                    "join {{ source('crm', 'accounts') }} using (account_id) ",
                    "where id = {{ clean(id, 'strip') }}"
                )
                .to_string(),
                ..Node::default()
            }),
            Resource::Table(Node {
                unique_id: "table.demo.stg_orders".to_string(),
                name: "stg_orders".to_string(),
                definition: "select * from {{ source('crm', 'orders_raw') }}".to_string(),
                ..Node::default()
            }),
            Resource::Source(Node {
                unique_id: "source.demo.crm.accounts".to_string(),
                name: "crm.accounts".to_string(),
                ..Node::default()
            }),
            Resource::Function(Function {
                unique_id: "function.demo.clean".to_string(),
                name: "clean".to_string(),
                parameters: vec![
                    Parameter {
                        name: "value".to_string(),
                        ..Parameter::default()
                    },
                    Parameter {
                        name: "mode".to_string(),
                        ..Parameter::default()
                    },
                ],
                ..Function::default()
            }),
        ])
    }

    #[test]
    fn extracts_and_resolves_edges() {
        let project = project();
        let graph = DependencyGraph::build(&project);

        let refs = graph.outgoing("table.demo.orders", Some(EdgeKind::Ref));
        assert_eq!(refs.len(), 1);
        assert!(refs[0].resolved);
        assert_eq!(refs[0].target, "table.demo.stg_orders");

        let sources = graph.outgoing("table.demo.orders", Some(EdgeKind::Source));
        assert_eq!(sources.len(), 1);
        assert!(sources[0].resolved);

        let calls = graph.outgoing("table.demo.orders", Some(EdgeKind::Call));
        assert_eq!(calls.len(), 1);
        assert!(calls[0].resolved);
        assert_eq!(calls[0].call_args, 2);
    }

    #[test]
    fn unresolved_targets_are_flagged_not_fatal() {
        let project = project();
        let graph = DependencyGraph::build(&project);

        // stg_orders references a source that is not in the project
        let sources = graph.outgoing("table.demo.stg_orders", Some(EdgeKind::Source));
        assert_eq!(sources.len(), 1);
        assert!(!sources[0].resolved);
        assert_eq!(sources[0].target, "crm.orders_raw");
    }

    #[test]
    fn counts_downstream_dependencies() {
        let project = project();
        let graph = DependencyGraph::build(&project);
        assert_eq!(graph.downstream_count("source.demo.crm.accounts"), 1);
        assert_eq!(graph.downstream_count("table.demo.stg_orders"), 1);
        assert_eq!(graph.downstream_count("table.demo.orders"), 0);
    }
}
