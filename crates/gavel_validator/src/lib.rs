//! # Gavel Validator
//!
//! The contract evaluation engine: compiles the rule file into typed filters
//! and validation terms, scopes resources through the filters, and runs every
//! term against every in-scope item.
//!
//! The entry point is [`Engine`]: build it once from a parsed rule file, then
//! run it against a project (and optionally a catalog snapshot) to get a
//! [`gavel_core::Report`].
//!
//! ```rust
//! use gavel_core::{ContractsConfig, Node, Project, Resource};
//! use gavel_validator::Engine;
//!
//! let config: ContractsConfig = serde_json::from_value(serde_json::json!({
//!     "contracts": {"tables": {"validations": ["has_description"]}},
//! }))?;
//! let engine = Engine::from_config(&config)?;
//!
//! let project = Project::new(vec![Resource::Table(Node {
//!     unique_id: "table.demo.orders".to_string(),
//!     name: "orders".to_string(),
//!     ..Node::default()
//! })]);
//! let report = engine.run(&project, None);
//! assert_eq!(report.failure_count(), 1); // missing description
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod context;
pub mod deps;
pub mod engine;
pub mod filters;
pub mod item;
pub mod matchers;
pub mod registry;
pub mod terms;

pub use context::EvalContext;
pub use deps::{Dependency, DependencyGraph, EdgeKind};
pub use engine::{Engine, in_scope_children, in_scope_resources};
pub use filters::Filter;
pub use item::ItemRef;
pub use matchers::{PatternMatcher, RangeMatcher, StringMatcher};
pub use registry::{CompiledContract, compile};
pub use terms::{Term, TermOutcome};
