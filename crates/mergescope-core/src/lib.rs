//! Core types, configuration, and error handling for mergescope.
//!
//! This crate provides the shared foundation used by all other mergescope crates:
//! - [`MergeScopeError`]: unified error type using `thiserror`
//! - [`MergeScopeConfig`]: configuration loaded from `.mergescope.toml`
//! - Shared types: [`MethodSignature`], [`ModifiedLine`], [`ModifiedMethod`],
//!   [`MergeCommit`], [`Project`], [`CollectedMergeMethodData`]

mod config;
mod error;
mod types;

pub use config::{AnalysisConfig, MergeScopeConfig, ReportConfig, DEFAULT_MAX_DEPTH};
pub use error::MergeScopeError;
pub use types::{
    AttributedLines, CollectedMergeMethodData, LineKind, MergeCommit, MethodSignature,
    ModifiedLine, ModifiedMethod, OutputFormat, Project,
};

/// A convenience `Result` type for mergescope operations.
pub type Result<T> = std::result::Result<T, MergeScopeError>;
