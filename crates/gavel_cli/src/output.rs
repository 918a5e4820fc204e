use colored::*;
use gavel_core::{Report, TermStatus, ValidationResult};
use gavel_generator::GenerateOutcome;

pub fn print_report(report: &Report, format: &str) {
    match format {
        "json" => print_json_report(report),
        _ => print_text_report(report),
    }
}

fn print_text_report(report: &Report) {
    println!("\n{}", "═".repeat(60));
    println!("{}", "  CONTRACT REPORT".bold());
    println!("{}", "═".repeat(60));

    // Results are appended contract by contract, so each summary's total
    // delimits its slice of the result list.
    let mut offset = 0;
    for summary in &report.summaries {
        let results = &report.results[offset..offset + summary.total];
        offset += summary.total;

        let not_passed = summary.failed + summary.unavailable;
        let headline = format!(
            "{}: {} checks, {} failed, {} unavailable",
            summary.contract, summary.total, summary.failed, summary.unavailable
        );
        if not_passed == 0 {
            println!("\n{} {}", "✓".green().bold(), headline.green());
        } else {
            println!("\n{} {}", "✗".red().bold(), headline.red());
        }

        for result in results.iter().filter(|result| !result.status.passed()) {
            print_failure(result);
        }
    }

    println!("\n{}", "Summary:".bold());
    println!(
        "  Total checks:      {}",
        report
            .summaries
            .iter()
            .map(|summary| summary.total)
            .sum::<usize>()
    );
    println!("  Total not passed:  {}", report.failure_count());
    println!("{}", "═".repeat(60));
}

fn print_failure(result: &ValidationResult) {
    let marker = match result.status {
        TermStatus::Unavailable => "?".yellow().bold(),
        _ => "✗".red().bold(),
    };
    let message = result.message.as_deref().unwrap_or("");
    println!(
        "  {} {} · {}: {}",
        marker,
        result.resource_id.bold(),
        result.term_name,
        message
    );
}

fn print_json_report(report: &Report) {
    println!("{}", serde_json::to_string_pretty(report).unwrap());
}

pub fn print_generate_outcome(outcome: &GenerateOutcome) {
    for file in &outcome.files {
        if file.changed {
            print_success(&format!("wrote {}", file.path.display()));
        } else {
            print_info(&format!("unchanged {}", file.path.display()));
        }
    }
    for error in &outcome.errors {
        print_error(&format!("{}: {}", error.path.display(), error.message));
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}
