//! Git-backed diff collection via git2.
//!
//! Resolves the four revisions of a merge commit, lists files changed by
//! each parent, and turns revision diffs into per-method changed lines with
//! the help of a [`MethodLocator`]. [`SpanFileLocator`] reads the spans
//! from a JSON file written by an external analyzer.

pub mod locator;
pub mod mining;
pub mod spans;

pub use locator::{type_name_from_path, MethodLocator};
pub use mining::{
    file_diffs, files_modified_by_both_parents, modified_files, open_repository,
    resolve_merge_commit, GitDiffCollector,
};
pub use spans::{RecordedSpan, SpanFileLocator};
