mod commands;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gavel")]
#[command(version, about = "Contract enforcement for data-transformation projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate contracts against a project and report every term result
    Validate {
        /// Path to the rule file (YAML or TOML)
        #[arg(short, long)]
        config: String,

        /// Path to the project artifact (JSON)
        #[arg(short, long)]
        project: String,

        /// Path to the catalog snapshot (JSON); catalog-dependent checks
        /// report as unavailable without one
        #[arg(long)]
        catalog: Option<String>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Synthesize properties files for in-scope tables and sources from
    /// catalog data
    Generate {
        /// Path to the rule file (YAML or TOML)
        #[arg(short, long)]
        config: String,

        /// Path to the project artifact (JSON)
        #[arg(short, long)]
        project: String,

        /// Path to the catalog snapshot (JSON)
        #[arg(long)]
        catalog: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Commands::Validate {
            config,
            project,
            catalog,
            format,
        } => commands::validate::execute(&config, &project, catalog.as_deref(), &format),

        Commands::Generate {
            config,
            project,
            catalog,
        } => commands::generate::execute(&config, &project, &catalog),
    };

    // Exit codes: 0 all checks passed, 1 contract failures, 2 configuration
    // or usage errors.
    match result {
        Ok(code) => code,
        Err(err) => {
            output::print_error(&format!("{err:#}"));
            ExitCode::from(2)
        }
    }
}
