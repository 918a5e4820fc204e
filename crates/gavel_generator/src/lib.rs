//! # Gavel Generator
//!
//! Synthesizes and reconciles properties files from catalog data: fills in
//! missing descriptions, column lists and data types for tables and sources
//! under the policies declared in the rule file's `generator` sections.
//!
//! All file access goes through [`gavel_core::FileStore`], and a run writes a
//! file only when its rendered content actually changed, so running the
//! generator twice over the same inputs leaves the second run with nothing
//! to do.

pub mod document;
pub mod generate;

pub use document::{ColumnProperties, EntryProperties, PropertiesDoc};
pub use generate::{FileError, GeneratedFile, GenerateOutcome, Generator};
