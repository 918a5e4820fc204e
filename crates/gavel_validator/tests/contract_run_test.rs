//! Integration tests for the contract evaluation engine.
//!
//! These run complete rule files against a realistic project and catalog
//! snapshot, covering parent and nested contracts, catalog reconciliation and
//! dependency checks in one pass.

use gavel_core::{
    Catalog, CatalogColumn, CatalogEntry, Column, ContractsConfig, Function, Node, Parameter,
    Project, Resource, TermStatus,
};
use gavel_validator::Engine;
use pretty_assertions::assert_eq;

fn full_config() -> ContractsConfig {
    serde_json::from_value(serde_json::json!({
        "contracts": {
            "tables": {
                "validations": [
                    "has_description",
                    "has_valid_ref_dependencies",
                    "has_valid_source_dependencies",
                ],
                "columns": {
                    "validations": ["has_data_type", "exists"],
                },
            },
            "sources": {
                "validations": ["has_loader", "has_freshness", "has_downstream_dependencies"],
            },
            "functions": {
                "validations": ["has_description"],
                "parameters": {
                    "validations": ["has_type"],
                },
            },
        },
    }))
    .unwrap()
}

fn column(name: &str, data_type: Option<&str>) -> Column {
    Column {
        name: name.to_string(),
        data_type: data_type.map(str::to_string),
        ..Column::default()
    }
}

fn project() -> Project {
    Project::new(vec![
        Resource::Table(Node {
            unique_id: "table.demo.stg_accounts".to_string(),
            name: "stg_accounts".to_string(),
            description: Some("Cleaned accounts".to_string()),
            definition: "select * from {{ source('crm', 'accounts') }}".to_string(),
            columns: vec![column("id", Some("BIGINT")), column("email", Some("VARCHAR"))],
            ..Node::default()
        }),
        Resource::Table(Node {
            unique_id: "table.demo.mart_accounts".to_string(),
            name: "mart_accounts".to_string(),
            definition: "select * from {{ ref('stg_accounts') }}".to_string(),
            columns: vec![column("account_id", Some("BIGINT"))],
            ..Node::default()
        }),
        Resource::Source(Node {
            unique_id: "source.demo.crm.accounts".to_string(),
            name: "crm.accounts".to_string(),
            loader: Some("fivetran".to_string()),
            has_freshness: true,
            ..Node::default()
        }),
        Resource::Function(Function {
            unique_id: "function.demo.clean".to_string(),
            name: "clean".to_string(),
            description: Some("Trims and lowercases a value".to_string()),
            parameters: vec![Parameter {
                name: "value".to_string(),
                data_type: Some("text".to_string()),
                ..Parameter::default()
            }],
            ..Function::default()
        }),
    ])
}

fn catalog() -> Catalog {
    Catalog::new(vec![CatalogEntry {
        unique_id: "table.demo.stg_accounts".to_string(),
        comment: Some("Cleaned accounts".to_string()),
        columns: vec![
            CatalogColumn {
                name: "id".to_string(),
                data_type: "BIGINT".to_string(),
                comment: None,
                index: 0,
            },
            CatalogColumn {
                name: "email".to_string(),
                data_type: "VARCHAR".to_string(),
                comment: None,
                index: 1,
            },
        ],
    }])
}

#[test]
fn full_run_reports_per_contract_summaries() {
    let engine = Engine::from_config(&full_config()).unwrap();
    let project = project();
    let catalog = catalog();

    let report = engine.run(&project, Some(&catalog));

    let contracts: Vec<&str> = report
        .summaries
        .iter()
        .map(|summary| summary.contract.as_str())
        .collect();
    assert_eq!(
        contracts,
        vec![
            "tables",
            "tables.columns",
            "sources",
            "functions",
            "functions.parameters",
        ]
    );

    // mart_accounts has no description
    assert_eq!(report.summaries[0].total, 6);
    assert_eq!(report.summaries[0].failed, 1);
    assert_eq!(report.summaries[0].unavailable, 0);

    // mart_accounts has no catalog entry, so its column's existence cannot
    // be checked
    assert_eq!(report.summaries[1].total, 6);
    assert_eq!(report.summaries[1].failed, 0);
    assert_eq!(report.summaries[1].unavailable, 1);

    // the source is loaded, fresh, and referenced by stg_accounts
    assert_eq!(report.summaries[2].failed, 0);
    assert_eq!(report.summaries[2].unavailable, 0);

    assert_eq!(report.failure_count(), 2);
    assert!(!report.passed());
}

#[test]
fn failures_carry_item_identity_and_messages() {
    let engine = Engine::from_config(&full_config()).unwrap();
    let project = project();
    let catalog = catalog();

    let report = engine.run(&project, Some(&catalog));
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 2);

    assert_eq!(failures[0].resource_id, "table.demo.mart_accounts");
    assert_eq!(failures[0].term_name, "has_description");
    assert_eq!(failures[0].status, TermStatus::Failed);
    assert_eq!(failures[0].message.as_deref(), Some("Missing description"));

    assert_eq!(failures[1].resource_id, "table.demo.mart_accounts.account_id");
    assert_eq!(failures[1].term_name, "exists");
    assert_eq!(failures[1].status, TermStatus::Unavailable);
    assert_eq!(
        failures[1].parent_id.as_deref(),
        Some("table.demo.mart_accounts")
    );
    assert_eq!(
        failures[1].message.as_deref(),
        Some("The table cannot be found in the database")
    );
}

#[test]
fn run_without_catalog_downgrades_catalog_checks() {
    let engine = Engine::from_config(&full_config()).unwrap();
    let project = project();

    let report = engine.run(&project, None);

    // every column existence check is unavailable, nothing else changes
    let columns = &report.summaries[1];
    assert_eq!(columns.failed, 0);
    assert_eq!(columns.unavailable, 3);
    assert_eq!(report.summaries[0].failed, 1);
}

#[test]
fn misconfigured_rule_file_aborts_before_evaluation() {
    let config: ContractsConfig = serde_json::from_value(serde_json::json!({
        "contracts": {
            "sources": {
                "validations": ["has_no_final_semicolon"],
            },
        },
    }))
    .unwrap();

    let err = Engine::from_config(&config).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Configuration error at 'sources': validation 'has_no_final_semicolon' does not apply to source items"
    );
}
