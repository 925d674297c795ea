//! Bounded-depth call graphs and common-ancestor search.
//!
//! A [`CallGraph`] is grown from a program entry point by walking the call
//! edges supplied by an [`EdgeSource`] up to a fixed depth. The
//! [`AncestorFinder`] then looks for methods that reach both a left-changed
//! and a right-changed method: callers where independent edits converge.

pub mod ancestor;
pub mod builder;
pub mod graph;
pub mod program;

pub use ancestor::AncestorFinder;
pub use builder::{AnalysisContext, CallEdge, CallGraphBuilder, EdgeSource};
pub use graph::CallGraph;
pub use program::ProgramModel;
