//! # Gavel Core
//!
//! Core data structures and types for gavel, a contract enforcement engine for
//! data-transformation projects.
//!
//! A *contract* declares rules over the resources of a project (tables,
//! external sources, reusable functions and their columns/parameters), and
//! gavel checks those rules against the project's static artifacts and a live
//! catalog snapshot.
//!
//! ## Key Concepts
//!
//! - **Resource**: a project entity subject to contracts ([`Resource`])
//! - **Catalog**: a live-system metadata snapshot used as ground truth for
//!   "matching" checks ([`Catalog`])
//! - **Report**: the ordered, deterministic outcome of one run ([`Report`])
//!
//! ## Example
//!
//! ```rust
//! use gavel_core::{Node, Resource, Materialization};
//!
//! let table = Resource::Table(Node {
//!     unique_id: "table.demo.orders".to_string(),
//!     name: "orders".to_string(),
//!     description: Some("One row per order".to_string()),
//!     materialization: Materialization::Table,
//!     ..Node::default()
//! });
//! assert_eq!(table.name(), "orders");
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod report;
pub mod resource;
pub mod store;

pub use catalog::*;
pub use config::*;
pub use error::*;
pub use report::*;
pub use resource::*;
pub use store::*;
