use std::collections::HashMap;
use std::fmt::Write;

use mergescope_core::MethodSignature;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// Directed caller → callee graph over method signatures.
///
/// Each signature maps to exactly one node; adding a node or edge that is
/// already present has no effect. Cycles are allowed.
///
/// # Examples
///
/// ```
/// use mergescope_callgraph::CallGraph;
/// use mergescope_core::MethodSignature;
///
/// let a: MethodSignature = "app.Main.main()".parse().unwrap();
/// let b: MethodSignature = "app.Service.run()".parse().unwrap();
///
/// let mut graph = CallGraph::new();
/// assert!(graph.add_edge(&a, &b));
/// assert!(!graph.add_edge(&a, &b));
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    graph: DiGraph<MethodSignature, ()>,
    index: HashMap<MethodSignature, NodeIndex>,
}

impl CallGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `signature` unless it is already a node; returns its index.
    pub fn add_node(&mut self, signature: &MethodSignature) -> NodeIndex {
        if let Some(&idx) = self.index.get(signature) {
            return idx;
        }
        let idx = self.graph.add_node(signature.clone());
        self.index.insert(signature.clone(), idx);
        idx
    }

    /// Add a caller → callee edge, inserting missing endpoints.
    ///
    /// Returns `false` if the edge already existed.
    pub fn add_edge(&mut self, caller: &MethodSignature, callee: &MethodSignature) -> bool {
        let from = self.add_node(caller);
        let to = self.add_node(callee);
        if self.graph.contains_edge(from, to) {
            return false;
        }
        self.graph.add_edge(from, to, ());
        true
    }

    /// Returns `true` if `signature` is a node of the graph.
    pub fn contains(&self, signature: &MethodSignature) -> bool {
        self.index.contains_key(signature)
    }

    /// Number of distinct methods.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct caller → callee pairs.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &MethodSignature> {
        self.graph.node_weights()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&MethodSignature, &MethodSignature)> {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()]))
    }

    /// Methods called directly by `signature`, in insertion order.
    pub fn callees_of(&self, signature: &MethodSignature) -> Vec<&MethodSignature> {
        self.neighbors(signature, Direction::Outgoing)
    }

    /// Methods calling `signature` directly, in insertion order.
    pub fn callers_of(&self, signature: &MethodSignature) -> Vec<&MethodSignature> {
        self.neighbors(signature, Direction::Incoming)
    }

    fn neighbors(&self, signature: &MethodSignature, dir: Direction) -> Vec<&MethodSignature> {
        let Some(&idx) = self.index.get(signature) else {
            return Vec::new();
        };
        // petgraph yields the most recently added edge first
        let mut out: Vec<&MethodSignature> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| &self.graph[n])
            .collect();
        out.reverse();
        out
    }

    pub(crate) fn index_of(&self, signature: &MethodSignature) -> Option<NodeIndex> {
        self.index.get(signature).copied()
    }

    pub(crate) fn inner(&self) -> &DiGraph<MethodSignature, ()> {
        &self.graph
    }

    /// Render the graph in Graphviz DOT syntax.
    ///
    /// Nodes are keyed by their canonical signature and labelled with the
    /// simplified form. The output is diagnostic only.
    ///
    /// # Examples
    ///
    /// ```
    /// use mergescope_callgraph::CallGraph;
    ///
    /// let mut graph = CallGraph::new();
    /// graph.add_edge(&"a.A.f(java.lang.String)".parse().unwrap(), &"a.B.g()".parse().unwrap());
    /// let dot = graph.to_dot();
    /// assert!(dot.starts_with("digraph {"));
    /// assert!(dot.contains("\"a.A.f(java.lang.String)\" -> \"a.B.g()\";"));
    /// assert!(dot.contains("label=\"a.A.f(String)\""));
    /// ```
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph {\n");
        for node in self.nodes() {
            let _ = writeln!(
                dot,
                "\t\"{}\" [label=\"{}\"];",
                escape(&node.to_string()),
                escape(&node.simplified())
            );
        }
        for (from, to) in self.edges() {
            let _ = writeln!(
                dot,
                "\t\"{}\" -> \"{}\";",
                escape(&from.to_string()),
                escape(&to.to_string())
            );
        }
        dot.push('}');
        dot
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
