//! Report types: the terminal artifact of a contract run.
//!
//! The report is deterministic given identical inputs: results appear in
//! resource iteration order, and within one resource in the contract's
//! declared term order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one term applied to one resource.
///
/// `Unavailable` is distinct from `Failed`: it means the check could not be
/// carried out (no catalog entry, unresolved dependency target), not that the
/// resource was checked and found wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermStatus {
    Passed,
    Failed,
    Unavailable,
}

impl TermStatus {
    /// Whether this status counts as a pass.
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// The result of running one validation term against one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Unique id of the resource the term ran against. For child items this
    /// is the parent's id suffixed with the child name.
    pub resource_id: String,

    /// Name of the resource (or child item)
    pub resource_name: String,

    /// Unique id of the parent resource, for child items
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Name of the term that produced this result
    pub term_name: String,

    /// Outcome of the term
    pub status: TermStatus,

    /// Failure message, populated when the term did not pass
    #[serde(default)]
    pub message: Option<String>,
}

/// Per-contract pass/fail counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractSummary {
    /// Contract path within the rule file (e.g. `tables.columns`)
    pub contract: String,

    /// Number of term evaluations carried out
    pub total: usize,

    /// Number of evaluations that failed
    pub failed: usize,

    /// Number of evaluations that could not be carried out
    pub unavailable: usize,
}

/// Ordered results of one full run plus per-contract summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// All results, in evaluation order
    pub results: Vec<ValidationResult>,

    /// One summary per evaluated contract, in declaration order
    pub summaries: Vec<ContractSummary>,

    /// When the run finished
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// Builds a report from results and summaries, stamped now.
    pub fn new(results: Vec<ValidationResult>, summaries: Vec<ContractSummary>) -> Self {
        Self {
            results,
            summaries,
            generated_at: Utc::now(),
        }
    }

    /// Whether every term evaluation passed.
    pub fn passed(&self) -> bool {
        self.failure_count() == 0
    }

    /// Total number of evaluations that did not pass, across contracts.
    pub fn failure_count(&self) -> usize {
        self.summaries
            .iter()
            .map(|summary| summary.failed + summary.unavailable)
            .sum()
    }

    /// All results that did not pass, in evaluation order.
    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|result| !result.status.passed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_count_includes_unavailable() {
        let report = Report::new(
            Vec::new(),
            vec![
                ContractSummary {
                    contract: "tables".to_string(),
                    total: 10,
                    failed: 2,
                    unavailable: 1,
                },
                ContractSummary {
                    contract: "sources".to_string(),
                    total: 4,
                    failed: 0,
                    unavailable: 0,
                },
            ],
        );
        assert_eq!(report.failure_count(), 3);
        assert!(!report.passed());
    }
}
