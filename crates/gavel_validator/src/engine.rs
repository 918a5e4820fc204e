//! Contract evaluation engine.
//!
//! Compiles the rule file once, then evaluates every contract against the
//! project: scope resources through the contract's filters, run each term in
//! declared order, and record one result per term per item. The dependency
//! graph and catalog are built before any contract runs and shared read-only
//! across all of them.

use gavel_core::{
    Catalog, ContractSummary, ContractsConfig, Project, Report, Resource, ResourceKind, Result,
    TermStatus, ValidationResult,
};
use tracing::{debug, info};

use crate::context::EvalContext;
use crate::deps::DependencyGraph;
use crate::item::ItemRef;
use crate::registry::{self, CompiledContract};

/// The resources a contract scopes over, in project iteration order.
pub fn in_scope_resources<'a>(
    contract: &CompiledContract,
    project: &'a Project,
) -> Vec<&'a Resource> {
    project
        .of_kind(contract.kind)
        .filter(|resource| {
            contract
                .filters
                .iter()
                .all(|filter| filter.applies(ItemRef::Resource(resource)))
        })
        .collect()
}

/// The child items of one in-scope parent that a nested contract scopes over.
pub fn in_scope_children<'a>(child: &CompiledContract, parent: &'a Resource) -> Vec<ItemRef<'a>> {
    let items: Vec<ItemRef<'a>> = match child.kind {
        ResourceKind::Column => parent
            .columns()
            .iter()
            .enumerate()
            .map(|(position, column)| ItemRef::Column {
                parent,
                column,
                position,
            })
            .collect(),
        ResourceKind::Parameter => parent
            .as_function()
            .map(|function| {
                function
                    .parameters
                    .iter()
                    .map(|parameter| ItemRef::Parameter { parent, parameter })
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter(|item| child.filters.iter().all(|filter| filter.applies(*item)))
        .collect()
}

/// A compiled rule file, ready to run against any number of projects.
#[derive(Debug)]
pub struct Engine {
    contracts: Vec<CompiledContract>,
}

impl Engine {
    /// Compiles the rule file, failing fast on any configuration problem.
    pub fn from_config(config: &ContractsConfig) -> Result<Self> {
        Ok(Self {
            contracts: registry::compile(config)?,
        })
    }

    /// The compiled contracts, in declaration order.
    pub fn contracts(&self) -> &[CompiledContract] {
        &self.contracts
    }

    /// Evaluates every contract and returns the report.
    ///
    /// Results appear in resource iteration order and, within one item, in
    /// the contract's declared term order; a run over identical inputs
    /// produces an identical report.
    pub fn run(&self, project: &Project, catalog: Option<&Catalog>) -> Report {
        let deps = DependencyGraph::build(project);
        let ctx = EvalContext {
            project,
            catalog,
            deps: &deps,
        };

        let mut results = Vec::new();
        let mut summaries = Vec::new();
        for contract in &self.contracts {
            self.run_contract(contract, &ctx, &mut results, &mut summaries);
        }

        info!(
            contracts = summaries.len(),
            results = results.len(),
            "contract run finished"
        );
        Report::new(results, summaries)
    }

    fn run_contract(
        &self,
        contract: &CompiledContract,
        ctx: &EvalContext<'_>,
        results: &mut Vec<ValidationResult>,
        summaries: &mut Vec<ContractSummary>,
    ) {
        let parents = in_scope_resources(contract, ctx.project);
        debug!(
            contract = contract.path,
            in_scope = parents.len(),
            "evaluating contract"
        );

        let mut summary = ContractSummary {
            contract: contract.path.clone(),
            ..ContractSummary::default()
        };
        for parent in &parents {
            evaluate_item(contract, ItemRef::Resource(parent), ctx, results, &mut summary);
        }
        summaries.push(summary);

        if let Some(child) = contract.child.as_deref() {
            let mut summary = ContractSummary {
                contract: child.path.clone(),
                ..ContractSummary::default()
            };
            for parent in &parents {
                for item in in_scope_children(child, parent) {
                    evaluate_item(child, item, ctx, results, &mut summary);
                }
            }
            summaries.push(summary);
        }
    }
}

fn evaluate_item(
    contract: &CompiledContract,
    item: ItemRef<'_>,
    ctx: &EvalContext<'_>,
    results: &mut Vec<ValidationResult>,
    summary: &mut ContractSummary,
) {
    for term in &contract.terms {
        let outcome = term.run(item, ctx);
        summary.total += 1;
        match outcome.status {
            TermStatus::Passed => {}
            TermStatus::Failed => summary.failed += 1,
            TermStatus::Unavailable => summary.unavailable += 1,
        }
        results.push(ValidationResult {
            resource_id: item.result_id(),
            resource_name: item.name().to_string(),
            parent_id: item.parent().map(|parent| parent.unique_id().to_string()),
            term_name: term.name().to_string(),
            status: outcome.status,
            message: outcome.message,
        });
    }
}

#[cfg(test)]
mod tests {
    use gavel_core::{Column, Node, Resource};
    use pretty_assertions::assert_eq;

    use super::*;

    fn engine(value: serde_json::Value) -> Engine {
        let config: ContractsConfig = serde_json::from_value(value).unwrap();
        Engine::from_config(&config).unwrap()
    }

    fn project() -> Project {
        Project::new(vec![
            Resource::Table(Node {
                unique_id: "table.demo.mart_orders".into(),
                name: "mart_orders".into(),
                description: Some("One row per order".into()),
                tests: 2,
                columns: vec![
                    Column {
                        name: "id".into(),
                        data_type: Some("BIGINT".into()),
                        ..Column::default()
                    },
                    Column {
                        name: "status".into(),
                        ..Column::default()
                    },
                ],
                ..Node::default()
            }),
            Resource::Table(Node {
                unique_id: "table.demo.stg_orders".into(),
                name: "stg_orders".into(),
                columns: vec![Column {
                    name: "untyped".into(),
                    ..Column::default()
                }],
                ..Node::default()
            }),
        ])
    }

    #[test]
    fn child_contract_only_visits_columns_of_in_scope_parents() {
        let engine = engine(serde_json::json!({
            "contracts": {
                "tables": {
                    "filters": [{"name": {"include": ["mart_.*"]}}],
                    "validations": ["has_description"],
                    "columns": {"validations": ["has_data_type"]},
                },
            },
        }));
        let project = project();
        let report = engine.run(&project, None);

        // stg_orders and its untyped column are out of scope entirely
        assert!(
            report
                .results
                .iter()
                .all(|result| !result.resource_id.contains("stg_orders"))
        );

        let column_results: Vec<_> = report
            .results
            .iter()
            .filter(|result| result.term_name == "has_data_type")
            .collect();
        assert_eq!(column_results.len(), 2);
        assert_eq!(column_results[0].resource_id, "table.demo.mart_orders.id");
        assert!(column_results[0].status.passed());
        assert_eq!(column_results[1].status, TermStatus::Failed);
        assert_eq!(
            column_results[1].parent_id.as_deref(),
            Some("table.demo.mart_orders")
        );
    }

    #[test]
    fn summaries_follow_declaration_order() {
        let engine = engine(serde_json::json!({
            "contracts": {
                "tables": {
                    "validations": ["has_description"],
                    "columns": {"validations": ["has_data_type"]},
                },
                "sources": {"validations": ["has_loader"]},
            },
        }));
        let project = project();
        let report = engine.run(&project, None);

        let contracts: Vec<&str> = report
            .summaries
            .iter()
            .map(|summary| summary.contract.as_str())
            .collect();
        assert_eq!(contracts, vec!["tables", "tables.columns", "sources"]);

        // stg_orders has no description, two of three columns have no type
        assert_eq!(report.summaries[0].failed, 1);
        assert_eq!(report.summaries[1].failed, 2);
        assert_eq!(report.summaries[2].total, 0);
    }

    #[test]
    fn identical_inputs_produce_identical_reports() {
        let engine = engine(serde_json::json!({
            "contracts": {
                "tables": {
                    "validations": ["has_description", {"has_tests": {"min_count": 1}}],
                },
            },
        }));
        let project = project();

        let first = engine.run(&project, None);
        let second = engine.run(&project, None);
        let order = |report: &Report| {
            report
                .results
                .iter()
                .map(|result| (result.resource_id.clone(), result.term_name.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn unavailable_is_counted_separately_from_failed() {
        let engine = engine(serde_json::json!({
            "contracts": {
                "tables": {
                    "validations": ["exists", "has_description"],
                },
            },
        }));
        let project = project();
        let report = engine.run(&project, None);

        // no catalog at all: every exists check is unavailable, not failed
        let summary = &report.summaries[0];
        assert_eq!(summary.unavailable, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(report.failure_count(), 3);
    }
}
