use std::collections::BTreeSet;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use gavel_core::LocalFileStore;
use gavel_generator::Generator;
use gavel_validator::{Engine, in_scope_children, in_scope_resources};
use tracing::info;

use crate::output;

pub fn execute(config_path: &str, project_path: &str, catalog_path: &str) -> Result<ExitCode> {
    info!("Generating properties for project: {}", project_path);

    let config = gavel_parser::parse_rules_file(Path::new(config_path))
        .with_context(|| format!("Failed to parse rule file: {config_path}"))?;
    let engine = Engine::from_config(&config).context("Invalid rule configuration")?;

    let project = gavel_parser::parse_project_file(Path::new(project_path))
        .with_context(|| format!("Failed to parse project artifact: {project_path}"))?;
    let catalog = gavel_parser::parse_catalog_file(Path::new(catalog_path))
        .with_context(|| format!("Failed to parse catalog snapshot: {catalog_path}"))?;
    output::print_info(&format!(
        "Project loaded: {} resources, catalog: {} entries",
        project.resources().len(),
        catalog.len()
    ));

    let store = LocalFileStore;
    let mut generator = Generator::new(&catalog, &store);
    for contract in engine.contracts() {
        let Some(generator_config) = &contract.generator else {
            continue;
        };
        let child = contract.child.as_deref();
        let column_config = child.and_then(|child| child.generator.as_ref());
        for resource in in_scope_resources(contract, &project) {
            // Column-level policies only apply to the columns the nested
            // contract's filters put in scope.
            let column_scope: Option<BTreeSet<String>> = child.map(|child| {
                in_scope_children(child, resource)
                    .iter()
                    .map(|item| item.name().to_string())
                    .collect()
            });
            generator.stage(resource, generator_config, column_config, column_scope.as_ref());
        }
    }

    let outcome = generator.flush();
    output::print_generate_outcome(&outcome);

    Ok(if outcome.errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
