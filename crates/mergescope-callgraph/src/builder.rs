use mergescope_core::{MergeScopeError, MethodSignature, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::graph::CallGraph;

/// A caller → callee relation reported by the program analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallEdge {
    /// Invoking method.
    pub caller: MethodSignature,
    /// Invoked method.
    pub callee: MethodSignature,
}

/// Supplier of program structure: declared methods and outgoing call edges.
pub trait EdgeSource {
    /// Methods declared on `owner`, in declaration order.
    fn methods_of(&self, owner: &str) -> Vec<MethodSignature>;

    /// Call edges leaving `method`.
    fn edges_out_of(&self, method: &MethodSignature) -> Vec<CallEdge>;
}

/// One analysis session: the loaded program, its resolved entry point and
/// the depth budget.
///
/// Holding these explicitly keeps concurrent per-commit analyses apart.
#[derive(Debug)]
pub struct AnalysisContext<'a, S: EdgeSource + ?Sized> {
    source: &'a S,
    entry: MethodSignature,
    max_depth: usize,
}

impl<'a, S: EdgeSource + ?Sized> AnalysisContext<'a, S> {
    /// Resolve the entry point on `entry_class`.
    ///
    /// Looks for a method named `entry_method`, then for one named `main`.
    /// When overloads share the name, the first declared wins.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::EntryPointNotFound`] if neither exists.
    pub fn resolve(
        source: &'a S,
        entry_class: &str,
        entry_method: &str,
        max_depth: usize,
    ) -> Result<Self, MergeScopeError> {
        let methods = source.methods_of(entry_class);
        let find = |name: &str| methods.iter().find(|m| m.name() == name).cloned();
        let entry = find(entry_method)
            .or_else(|| find("main"))
            .ok_or_else(|| MergeScopeError::EntryPointNotFound {
                class: entry_class.to_string(),
                method: entry_method.to_string(),
            })?;
        debug!(entry = %entry, max_depth, "resolved entry point");
        Ok(Self {
            source,
            entry,
            max_depth,
        })
    }

    /// The resolved entry method.
    pub fn entry(&self) -> &MethodSignature {
        &self.entry
    }

    /// Depth budget used by [`build_graph`](Self::build_graph).
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Walk call edges from the entry point, at most `max_depth` edges deep.
    ///
    /// Budgets are tracked per path, not per node: a method reached again
    /// through another path is expanded again with that path's remaining
    /// budget. The entry method only appears in the graph if it calls
    /// something.
    pub fn build_graph(&self) -> CallGraph {
        let mut graph = CallGraph::new();
        let mut stack = vec![(self.entry.clone(), self.max_depth)];

        while let Some((method, budget)) = stack.pop() {
            if budget == 0 {
                continue;
            }
            let edges = self.source.edges_out_of(&method);
            for edge in &edges {
                trace!(caller = %edge.caller, callee = %edge.callee, budget, "call edge");
                graph.add_edge(&edge.caller, &edge.callee);
            }
            // reversed so the first callee is expanded first
            stack.extend(edges.into_iter().rev().map(|e| (e.callee, budget - 1)));
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "call graph built"
        );
        debug!(dot = %graph.to_dot(), "call graph rendering");
        graph
    }
}

/// Builds bounded-depth call graphs from an entry point.
///
/// # Examples
///
/// ```
/// use mergescope_callgraph::{CallGraphBuilder, ProgramModel};
///
/// let mut program = ProgramModel::new();
/// program.add_edge("app.Main.main()".parse().unwrap(), "app.A.a()".parse().unwrap());
/// program.add_edge("app.A.a()".parse().unwrap(), "app.B.b()".parse().unwrap());
///
/// let graph = CallGraphBuilder::new(1).build("app.Main", "main", &program).unwrap();
/// assert_eq!(graph.node_count(), 2);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CallGraphBuilder {
    max_depth: usize,
}

impl CallGraphBuilder {
    /// A builder with the given depth budget.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Resolve the entry point and build the graph.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::EntryPointNotFound`] if the entry point
    /// cannot be resolved. No partial graph is returned.
    pub fn build<S: EdgeSource + ?Sized>(
        &self,
        entry_class: &str,
        entry_method: &str,
        source: &S,
    ) -> Result<CallGraph, MergeScopeError> {
        let ctx = AnalysisContext::resolve(source, entry_class, entry_method, self.max_depth)?;
        Ok(ctx.build_graph())
    }
}

impl Default for CallGraphBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramModel;

    fn sig(s: &str) -> MethodSignature {
        s.parse().unwrap()
    }

    fn chain(len: usize) -> ProgramModel {
        let mut program = ProgramModel::new();
        for i in 0..len {
            program.add_edge(sig(&format!("p.C.m{i}()")), sig(&format!("p.C.m{}()", i + 1)));
        }
        program
    }

    #[test]
    fn depth_bound_limits_chain() {
        let program = chain(12);
        let graph = CallGraphBuilder::default().build("p.C", "m0", &program).unwrap();
        assert_eq!(graph.node_count(), DEFAULT_MAX_DEPTH + 1);
        assert!(graph.contains(&sig("p.C.m5()")));
        assert!(!graph.contains(&sig("p.C.m6()")));
    }

    #[test]
    fn zero_depth_gives_empty_graph() {
        let graph = CallGraphBuilder::new(0).build("p.C", "m0", &chain(3)).unwrap();
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn cycles_terminate() {
        let mut program = ProgramModel::new();
        program.add_edge(sig("p.A.main()"), sig("p.B.ping()"));
        program.add_edge(sig("p.B.ping()"), sig("p.B.pong()"));
        program.add_edge(sig("p.B.pong()"), sig("p.B.ping()"));
        let graph = CallGraphBuilder::new(50).build("p.A", "main", &program).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn falls_back_to_main() {
        let mut program = ProgramModel::new();
        program.add_edge(sig("p.A.main(java.lang.String[])"), sig("p.B.run()"));
        let ctx = AnalysisContext::resolve(&program, "p.A", "start", 5).unwrap();
        assert_eq!(ctx.entry(), &sig("p.A.main(java.lang.String[])"));
        assert_eq!(ctx.max_depth(), 5);
    }

    #[test]
    fn requested_method_wins_over_main() {
        let mut program = ProgramModel::new();
        program.add_edge(sig("p.A.main()"), sig("p.B.one()"));
        program.add_edge(sig("p.A.start()"), sig("p.B.two()"));
        let graph = CallGraphBuilder::default().build("p.A", "start", &program).unwrap();
        assert!(graph.contains(&sig("p.B.two()")));
        assert!(!graph.contains(&sig("p.B.one()")));
    }

    #[test]
    fn missing_entry_point_is_an_error() {
        let program = chain(2);
        let err = CallGraphBuilder::default()
            .build("p.Missing", "run", &program)
            .unwrap_err();
        assert!(matches!(err, MergeScopeError::EntryPointNotFound { .. }));
    }

    #[test]
    fn budget_is_per_path() {
        // main -> a -> b -> c -> d, and main -> c directly.
        // With depth 2, d is only reachable through the short path.
        let mut program = ProgramModel::new();
        program.add_edge(sig("p.M.main()"), sig("p.M.a()"));
        program.add_edge(sig("p.M.main()"), sig("p.M.c()"));
        program.add_edge(sig("p.M.a()"), sig("p.M.b()"));
        program.add_edge(sig("p.M.b()"), sig("p.M.c()"));
        program.add_edge(sig("p.M.c()"), sig("p.M.d()"));
        let graph = CallGraphBuilder::new(2).build("p.M", "main", &program).unwrap();
        assert!(graph.contains(&sig("p.M.d()")));
        assert!(graph.contains(&sig("p.M.b()")));
        assert!(graph.callees_of(&sig("p.M.b()")).is_empty());
    }
}
