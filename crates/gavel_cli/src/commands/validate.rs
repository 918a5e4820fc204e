use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use gavel_validator::Engine;
use tracing::info;

use crate::output;

pub fn execute(
    config_path: &str,
    project_path: &str,
    catalog_path: Option<&str>,
    format: &str,
) -> Result<ExitCode> {
    info!("Validating project: {}", project_path);
    info!("Rule file: {}", config_path);

    let config = gavel_parser::parse_rules_file(Path::new(config_path))
        .with_context(|| format!("Failed to parse rule file: {config_path}"))?;
    let engine = Engine::from_config(&config).context("Invalid rule configuration")?;

    let project = gavel_parser::parse_project_file(Path::new(project_path))
        .with_context(|| format!("Failed to parse project artifact: {project_path}"))?;
    output::print_info(&format!(
        "Project loaded: {} resources",
        project.resources().len()
    ));

    let catalog = catalog_path
        .map(|path| {
            gavel_parser::parse_catalog_file(Path::new(path))
                .with_context(|| format!("Failed to parse catalog snapshot: {path}"))
        })
        .transpose()?;
    match &catalog {
        Some(catalog) => output::print_info(&format!("Catalog loaded: {} entries", catalog.len())),
        None => output::print_info("No catalog given: catalog checks will report as unavailable"),
    }

    let report = engine.run(&project, catalog.as_ref());
    output::print_report(&report, format);

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
