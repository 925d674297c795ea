//! Changed-line extraction and three-way line attribution.
//!
//! Parses unified diffs into [`ModifiedLine`](mergescope_core::ModifiedLine)
//! sets, maps them onto method spans, and attributes each changed line of a
//! merged method to the parent(s) that introduced it.

pub mod attribution;
pub mod collector;
pub mod methods;
pub mod parser;

pub use attribution::attribute;
pub use collector::{changed_method_sets, collect_merge_method_data, DiffCollector};
pub use methods::{methods_touched, MethodSpan};
pub use parser::{parse_unified_diff, DiffHunk, FileDiff};
