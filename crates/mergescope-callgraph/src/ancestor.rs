use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};

use mergescope_core::{MergeScopeError, MethodSignature, ModifiedMethod};
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use tracing::debug;

use crate::graph::CallGraph;

/// Proper ancestors of a node with their shortest distance to it.
type Ancestry = HashMap<NodeIndex, usize>;

/// Lowest-common-ancestor search over a finished call graph.
///
/// A node's ancestors are the nodes with a path of at least one edge to it.
/// A common ancestor of `a` and `b` is *lowest* when no other common ancestor
/// is reachable from it. Ties, and the cyclic case where every common
/// ancestor reaches another, are broken by the smallest summed distance to
/// `a` and `b`, then by node insertion order, so results are stable for a
/// given graph.
///
/// # Examples
///
/// ```
/// use std::collections::HashSet;
/// use mergescope_callgraph::{AncestorFinder, CallGraph};
/// use mergescope_core::{MethodSignature, ModifiedMethod};
///
/// let sig = |s: &str| s.parse::<MethodSignature>().unwrap();
/// let mut graph = CallGraph::new();
/// graph.add_edge(&sig("app.A.a()"), &sig("app.B.b()"));
/// graph.add_edge(&sig("app.B.b()"), &sig("app.C.c()"));
///
/// let left = HashSet::from([ModifiedMethod::new(sig("app.B.b()"))]);
/// let right = HashSet::from([ModifiedMethod::new(sig("app.C.c()"))]);
/// let found = AncestorFinder::new(&graph).find_common_ancestors(&left, &right).unwrap();
/// assert_eq!(found, vec![ModifiedMethod::new(sig("app.A.a()"))]);
/// ```
pub struct AncestorFinder<'g> {
    graph: &'g CallGraph,
}

impl<'g> AncestorFinder<'g> {
    /// Search over `graph`, which must no longer change.
    pub fn new(graph: &'g CallGraph) -> Self {
        Self { graph }
    }

    /// Lowest common ancestor for every (left, right) pair.
    ///
    /// Pairs with an endpoint missing from the graph contribute nothing.
    /// The same ancestor found by different pairs appears once per pair.
    /// Pairs are visited in signature order.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::EmptyInput`] if either set is empty and
    /// [`MergeScopeError::NoCommonAncestor`] if no pair yields an ancestor.
    pub fn find_common_ancestors(
        &self,
        left_changed: &HashSet<ModifiedMethod>,
        right_changed: &HashSet<ModifiedMethod>,
    ) -> Result<Vec<ModifiedMethod>, MergeScopeError> {
        if left_changed.is_empty() || right_changed.is_empty() {
            return Err(MergeScopeError::EmptyInput);
        }

        let lefts = self.ancestries(left_changed);
        let rights = self.ancestries(right_changed);

        let mut found = Vec::new();
        for (l, l_anc) in &lefts {
            for (r, r_anc) in &rights {
                let (Some(l_anc), Some(r_anc)) = (l_anc, r_anc) else {
                    continue;
                };
                if let Some(lca) = self.lowest(l_anc, r_anc) {
                    debug!(left = %l, right = %r, ancestor = %lca, "common ancestor");
                    found.push(ModifiedMethod::new(lca.clone()));
                }
            }
        }

        if found.is_empty() {
            return Err(MergeScopeError::NoCommonAncestor);
        }
        Ok(found)
    }

    /// Lowest common ancestor of two methods, if both are nodes and one exists.
    pub fn lowest_common_ancestor(
        &self,
        a: &MethodSignature,
        b: &MethodSignature,
    ) -> Option<&'g MethodSignature> {
        let a = self.graph.index_of(a)?;
        let b = self.graph.index_of(b)?;
        self.lowest(&self.ancestry(a), &self.ancestry(b))
    }

    fn ancestries<'m>(
        &self,
        methods: &'m HashSet<ModifiedMethod>,
    ) -> Vec<(&'m MethodSignature, Option<Ancestry>)> {
        let mut sorted: Vec<&MethodSignature> = methods.iter().map(|m| &m.signature).collect();
        sorted.sort();
        sorted
            .into_iter()
            .map(|sig| (sig, self.graph.index_of(sig).map(|idx| self.ancestry(idx))))
            .collect()
    }

    /// Reverse breadth-first search from `node`.
    fn ancestry(&self, node: NodeIndex) -> Ancestry {
        let g = self.graph.inner();
        let mut dist = Ancestry::new();
        let mut queue = VecDeque::from([(node, 0usize)]);
        while let Some((current, d)) = queue.pop_front() {
            for pred in g.neighbors_directed(current, Direction::Incoming) {
                if let Entry::Vacant(slot) = dist.entry(pred) {
                    slot.insert(d + 1);
                    queue.push_back((pred, d + 1));
                }
            }
        }
        dist
    }

    fn lowest(&self, a: &Ancestry, b: &Ancestry) -> Option<&'g MethodSignature> {
        let common: Vec<(NodeIndex, usize)> = a
            .iter()
            .filter_map(|(n, da)| b.get(n).map(|db| (*n, da + db)))
            .collect();
        if common.is_empty() {
            return None;
        }

        let members: HashSet<NodeIndex> = common.iter().map(|(n, _)| *n).collect();
        let lowest: Vec<(NodeIndex, usize)> = common
            .iter()
            .filter(|(n, _)| !self.reaches_other(*n, &members))
            .copied()
            .collect();
        let pool = if lowest.is_empty() { common } else { lowest };

        let graph = self.graph.inner();
        pool.into_iter()
            .min_by_key(|(n, d)| (*d, n.index()))
            .map(|(n, _)| &graph[n])
    }

    fn reaches_other(&self, from: NodeIndex, members: &HashSet<NodeIndex>) -> bool {
        let g = self.graph.inner();
        let mut seen = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            for next in g.neighbors_directed(current, Direction::Outgoing) {
                if next != from && members.contains(&next) {
                    return true;
                }
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }
}
