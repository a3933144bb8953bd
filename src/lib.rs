//
// lib.rs
// Dicom-Albums-rs
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - October 2026

// Leaf to root: element access and extraction, persistence, the hierarchy, queries, albums, CLI.
pub mod album;
pub mod cli;
pub mod dicom_access;
pub mod error;
pub mod hierarchy;
pub mod metadata;
pub mod models;
pub mod query;
pub mod storage;

pub use album::{AlbumBook, AlbumManager};
pub use cli::{run as run_cli, Cli, Commands};
pub use error::{EntityKind, Error, Result};
pub use hierarchy::{Hierarchy, HierarchyStore, ScanReport};
pub use query::Query;
pub use storage::{DataDir, JsonFileRepository, Repository};
