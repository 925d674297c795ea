//! Per-merge analysis pipeline.
//!
//! A [`Scenario`] bundles everything known about one merge commit: the
//! program's call edges, the methods each parent changed and the methods
//! both parents changed. [`analyze_scenario`] turns it into a
//! [`MergeAnalysis`]; [`analyze_all`] runs many scenarios in parallel.

pub mod pipeline;
pub mod scenario;

pub use pipeline::{analyze_all, analyze_merge, analyze_scenario, MergeAnalysis};
pub use scenario::{load_scenarios, EntryPoint, MutualMethod, Scenario};
