//! Catalog graph compiler
//!
//! Ingests semi-structured academic-catalog records (scraped course
//! pages, program requirement pages, list pages) and compiles them into a
//! canonical graph: course nodes, typed relation edges (prerequisite /
//! corequisite / antirequisite), enrollment constraints, named course
//! sets, and hierarchical program-requirement trees.
//!
//! The compiled graph is internally consistent (no dangling references,
//! no self-loops), deterministic across re-runs (all identifiers are
//! content-addressed), and independent of the order in which per-record
//! results are merged.

pub mod cli;
pub mod code;
pub mod config;
pub mod constraints;
pub mod domain;
pub mod errors;
pub mod hash;
pub mod merge;
pub mod pipeline;
pub mod program;
pub mod record;
pub mod relations;
