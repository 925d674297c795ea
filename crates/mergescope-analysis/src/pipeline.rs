use std::collections::HashSet;

use mergescope_callgraph::{AnalysisContext, AncestorFinder, CallGraph, EdgeSource};
use mergescope_core::{
    AnalysisConfig, CollectedMergeMethodData, MergeCommit, MergeScopeConfig, MergeScopeError,
    MethodSignature, ModifiedMethod, Project,
};
use mergescope_lines::{attribute, changed_method_sets, collect_merge_method_data, DiffCollector};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::scenario::Scenario;

/// Outcome of analysing one merge commit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeAnalysis {
    /// Owning project.
    pub project: Project,
    /// The analysed merge.
    pub commit: MergeCommit,
    /// Resolved entry method.
    pub entry: MethodSignature,
    /// Nodes in the bounded call graph.
    pub graph_nodes: usize,
    /// Edges in the bounded call graph.
    pub graph_edges: usize,
    /// Lowest common ancestors, one per qualifying (left, right) pair.
    pub ancestors: Vec<ModifiedMethod>,
    /// Line attribution for every mutually modified method.
    pub records: Vec<CollectedMergeMethodData>,
}

fn entry_of(
    scenario: Option<&Scenario>,
    config: &AnalysisConfig,
) -> Result<(String, String), MergeScopeError> {
    if let Some(entry) = scenario.and_then(|s| s.entry_point.as_ref()) {
        let method = entry
            .method
            .clone()
            .unwrap_or_else(|| config.entry_method.clone());
        return Ok((entry.class.clone(), method));
    }
    let class = config.entry_class.clone().ok_or_else(|| {
        MergeScopeError::Config("no entry class given and [analysis] entry_class is unset".into())
    })?;
    Ok((class, config.entry_method.clone()))
}

fn ancestors_in(
    graph: &CallGraph,
    left: &HashSet<ModifiedMethod>,
    right: &HashSet<ModifiedMethod>,
) -> Result<Vec<ModifiedMethod>, MergeScopeError> {
    let ancestors = AncestorFinder::new(graph).find_common_ancestors(left, right)?;
    debug!(count = ancestors.len(), "common ancestors");
    Ok(ancestors)
}

/// Analyse one scenario.
///
/// Builds the bounded call graph from the scenario's entry point (or the
/// configured one), finds the lowest common ancestors of the left- and
/// right-changed methods, and attributes the lines of every mutually
/// modified method.
///
/// # Errors
///
/// Fails with [`MergeScopeError::Config`] when no entry class is known, and
/// otherwise with whatever the graph or ancestor phase reports:
/// [`MergeScopeError::EntryPointNotFound`], [`MergeScopeError::EmptyInput`]
/// or [`MergeScopeError::NoCommonAncestor`].
pub fn analyze_scenario(
    scenario: &Scenario,
    config: &MergeScopeConfig,
) -> Result<MergeAnalysis, MergeScopeError> {
    let span = info_span!("analyze", merge = %scenario.merge_commit.sha());
    let _enter = span.enter();

    let (class, method) = entry_of(Some(scenario), &config.analysis)?;
    let ctx = AnalysisContext::resolve(
        &scenario.program,
        &class,
        &method,
        config.analysis.max_depth,
    )?;
    let graph = ctx.build_graph();

    let left: HashSet<ModifiedMethod> = scenario.left_changed.iter().cloned().collect();
    let right: HashSet<ModifiedMethod> = scenario.right_changed.iter().cloned().collect();
    let ancestors = ancestors_in(&graph, &left, &right)?;

    let records = scenario
        .mutually_modified
        .iter()
        .map(|m| {
            CollectedMergeMethodData::new(
                scenario.project.clone(),
                scenario.merge_commit.clone(),
                m.class_name.clone(),
                m.merged.signature.clone(),
                attribute(&m.merged, &m.left, &m.right),
            )
        })
        .collect::<Vec<_>>();

    info!(
        ancestors = ancestors.len(),
        records = records.len(),
        "merge analysed"
    );
    Ok(MergeAnalysis {
        project: scenario.project.clone(),
        commit: scenario.merge_commit.clone(),
        entry: ctx.entry().clone(),
        graph_nodes: graph.node_count(),
        graph_edges: graph.edge_count(),
        ancestors,
        records,
    })
}

/// Analyse a merge whose changes come from a [`DiffCollector`].
///
/// The left- and right-changed sets cover every file either parent touched;
/// attribution covers the files both parents touched.
///
/// # Errors
///
/// Same as [`analyze_scenario`], plus collector failures.
pub fn analyze_merge<C, S>(
    collector: &C,
    program: &S,
    project: &Project,
    commit: &MergeCommit,
    config: &MergeScopeConfig,
) -> Result<MergeAnalysis, MergeScopeError>
where
    C: DiffCollector + ?Sized,
    S: EdgeSource + ?Sized,
{
    let span = info_span!("analyze", merge = %commit.sha());
    let _enter = span.enter();

    let (class, method) = entry_of(None, &config.analysis)?;
    let ctx = AnalysisContext::resolve(program, &class, &method, config.analysis.max_depth)?;
    let graph = ctx.build_graph();

    let (left, right) = changed_method_sets(collector, commit)?;
    let ancestors = ancestors_in(&graph, &left, &right)?;
    let records = collect_merge_method_data(collector, project, commit)?;

    Ok(MergeAnalysis {
        project: project.clone(),
        commit: commit.clone(),
        entry: ctx.entry().clone(),
        graph_nodes: graph.node_count(),
        graph_edges: graph.edge_count(),
        ancestors,
        records,
    })
}

/// Analyse every scenario in parallel, one worker per merge commit.
///
/// Results keep the input order. A failing commit is logged and reported in
/// place; it does not affect the others.
pub fn analyze_all(
    scenarios: &[Scenario],
    config: &MergeScopeConfig,
) -> Vec<(MergeCommit, Result<MergeAnalysis, MergeScopeError>)> {
    let results: Vec<_> = scenarios
        .par_iter()
        .map(|scenario| {
            let result = analyze_scenario(scenario, config);
            match &result {
                Err(e) if e.is_per_commit() => {
                    info!(merge = %scenario.merge_commit.sha(), reason = %e, "merge skipped");
                }
                Err(e) => {
                    warn!(
                        merge = %scenario.merge_commit.sha(),
                        error = %e,
                        "merge analysis failed"
                    );
                }
                Ok(_) => {}
            }
            (scenario.merge_commit.clone(), result)
        })
        .collect();

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    info!(total = results.len(), failed, "analysis finished");
    results
}

#[cfg(test)]
mod tests {
    use mergescope_callgraph::ProgramModel;
    use mergescope_core::ModifiedLine;

    use super::*;
    use crate::scenario::{EntryPoint, MutualMethod};

    fn sig(s: &str) -> MethodSignature {
        s.parse().unwrap()
    }

    fn chain() -> ProgramModel {
        let mut program = ProgramModel::new();
        program.add_edge(sig("p.Main.main()"), sig("p.A.a()"));
        program.add_edge(sig("p.A.a()"), sig("p.B.b()"));
        program.add_edge(sig("p.B.b()"), sig("p.C.c()"));
        program
    }

    fn scenario(sha: &str) -> Scenario {
        let b = sig("p.B.b()");
        Scenario {
            project: Project::named("p"),
            merge_commit: MergeCommit::new("a", "l", "r", sha),
            entry_point: Some(EntryPoint {
                class: "p.Main".into(),
                method: None,
            }),
            program: chain(),
            left_changed: vec![ModifiedMethod::new(b.clone())],
            right_changed: vec![ModifiedMethod::new(sig("p.C.c()"))],
            mutually_modified: vec![MutualMethod {
                class_name: "p.B".into(),
                merged: ModifiedMethod::with_lines(
                    b.clone(),
                    [ModifiedLine::added(4), ModifiedLine::removed(6)],
                ),
                left: ModifiedMethod::with_lines(b.clone(), [ModifiedLine::added(4)]),
                right: ModifiedMethod::with_lines(b, [ModifiedLine::removed(6)]),
            }],
        }
    }

    #[test]
    fn chain_yields_caller_of_left_change() {
        let analysis = analyze_scenario(&scenario("m"), &MergeScopeConfig::default()).unwrap();
        assert_eq!(analysis.entry, sig("p.Main.main()"));
        assert_eq!(analysis.ancestors.len(), 1);
        assert_eq!(analysis.ancestors[0].signature, sig("p.A.a()"));
        assert_eq!(analysis.graph_nodes, 4);
    }

    #[test]
    fn records_carry_attribution() {
        let analysis = analyze_scenario(&scenario("m"), &MergeScopeConfig::default()).unwrap();
        let record = &analysis.records[0];
        assert_eq!(record.left_added_lines.iter().copied().collect::<Vec<_>>(), vec![4]);
        assert_eq!(record.right_deleted_lines.iter().copied().collect::<Vec<_>>(), vec![6]);
        assert!(record.left_deleted_lines.is_empty());
    }

    #[test]
    fn entry_class_falls_back_to_config() {
        let mut s = scenario("m");
        s.entry_point = None;
        let err = analyze_scenario(&s, &MergeScopeConfig::default()).unwrap_err();
        assert!(matches!(err, MergeScopeError::Config(_)));

        let mut config = MergeScopeConfig::default();
        config.analysis.entry_class = Some("p.Main".into());
        assert!(analyze_scenario(&s, &config).is_ok());
    }

    #[test]
    fn shallow_graph_has_no_ancestor() {
        let mut config = MergeScopeConfig::default();
        config.analysis.max_depth = 2;
        let err = analyze_scenario(&scenario("m"), &config).unwrap_err();
        assert!(matches!(err, MergeScopeError::NoCommonAncestor));
    }

    #[test]
    fn failing_commit_does_not_affect_siblings() {
        let mut broken = scenario("bad");
        broken.entry_point = Some(EntryPoint {
            class: "p.Missing".into(),
            method: None,
        });
        let scenarios = vec![scenario("m1"), broken, scenario("m2")];

        let results = analyze_all(&scenarios, &MergeScopeConfig::default());
        let shas: Vec<&str> = results.iter().map(|(c, _)| c.sha()).collect();
        assert_eq!(shas, vec!["m1", "bad", "m2"]);
        assert!(results[0].1.is_ok());
        assert!(matches!(
            results[1].1,
            Err(MergeScopeError::EntryPointNotFound { .. })
        ));
        assert!(results[2].1.is_ok());
    }
}
