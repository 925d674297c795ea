use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use mergescope_analysis::{analyze_all, analyze_merge, load_scenarios, MergeAnalysis};
use mergescope_callgraph::{AnalysisContext, AncestorFinder, CallGraph, ProgramModel};
use mergescope_core::{
    AnalysisConfig, CollectedMergeMethodData, LineKind, MergeCommit, MergeScopeConfig,
    MergeScopeError, MethodSignature, ModifiedMethod, OutputFormat, Project,
};
use mergescope_git::{resolve_merge_commit, GitDiffCollector, SpanFileLocator};
use mergescope_lines::{attribute, FileDiff};
use mergescope_report::{format_ancestors, format_attribution, write_report};

const CONFIG_FILE: &str = ".mergescope.toml";

#[derive(Parser)]
#[command(
    name = "mergescope",
    version,
    about = "Semantic merge-risk detection",
    long_about = "Flags methods edited independently by both parents of a merge that converge\n\
                   on a shared caller in the program's call graph, and attributes every changed\n\
                   line of the merged method to the parent that introduced it.\n\n\
                   Examples:\n  \
                     mergescope graph --program calls.json --entry-class app.Main\n  \
                     mergescope files --repo . --merge HEAD\n  \
                     mergescope analyze --scenarios merges.json\n  \
                     mergescope init"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .mergescope.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format: text or json
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Entry point and depth overrides shared by the graph commands.
#[derive(Args)]
struct GraphArgs {
    /// Program model JSON exported by the analyzer
    #[arg(long)]
    program: PathBuf,

    /// Type holding the entry method (default: [analysis] entry_class)
    #[arg(long)]
    entry_class: Option<String>,

    /// Entry method name (default: [analysis] entry_method)
    #[arg(long)]
    entry_method: Option<String>,

    /// Depth budget for the traversal (default: [analysis] max_depth)
    #[arg(long)]
    max_depth: Option<usize>,
}

impl GraphArgs {
    fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(class) = &self.entry_class {
            config.entry_class = Some(class.clone());
        }
        if let Some(method) = &self.entry_method {
            config.entry_method = method.clone();
        }
        if let Some(depth) = self.max_depth {
            config.max_depth = depth;
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Build the bounded call graph from an entry point
    #[command(long_about = "Build the bounded call graph from an entry point.\n\n\
        Text output is a DOT digraph; JSON output lists nodes and edges. With --around,\n\
        only the direct callers and callees of that method are shown.\n\n\
        Examples:\n  mergescope graph --program calls.json --entry-class app.Main\n  \
        mergescope graph --program calls.json --entry-class app.Main --max-depth 2 \\\n    \
        --format json\n  \
        mergescope graph --program calls.json --entry-class app.Main \\\n    \
        --around 'app.Cart.add(int)'")]
    Graph {
        #[command(flatten)]
        graph: GraphArgs,

        /// Show only the direct callers and callees of this method
        #[arg(long)]
        around: Option<MethodSignature>,
    },
    /// Find the lowest common ancestors of left- and right-changed methods
    #[command(
        long_about = "Find the lowest common ancestors of left- and right-changed methods.\n\n\
        Methods are given as `owner.name(p1,p2)` or `<owner: ret name(p1,p2)>`.\n\n\
        Examples:\n  mergescope ancestors --program calls.json --entry-class app.Main \\\n    \
        --left 'app.Cart.add(int)' --right 'app.Payment.charge(long)'"
    )]
    Ancestors {
        #[command(flatten)]
        graph: GraphArgs,

        /// Method changed by the left parent (repeatable)
        #[arg(long = "left", required = true)]
        left: Vec<MethodSignature>,

        /// Method changed by the right parent (repeatable)
        #[arg(long = "right", required = true)]
        right: Vec<MethodSignature>,
    },
    /// Attribute the changed lines of mutually modified methods
    #[command(long_about = "Attribute the changed lines of mutually modified methods.\n\n\
        Reads the `mutuallyModified` section of each scenario; no call graph is built.\n\n\
        Examples:\n  mergescope attribute --scenarios merges.json")]
    Attribute {
        /// Scenario JSON (one scenario or an array)
        #[arg(long)]
        scenarios: PathBuf,
    },
    /// Show changed lines between two revisions
    Lines {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Base revision
        #[arg(long)]
        from: String,

        /// Target revision
        #[arg(long)]
        to: String,

        /// Limit to one file
        #[arg(long)]
        file: Option<String>,
    },
    /// List files modified by both parents of a merge
    Files {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Merge revision (default: HEAD)
        #[arg(long, default_value = "HEAD")]
        merge: String,
    },
    /// Analyse merge scenarios and write the attribution report
    #[command(long_about = "Analyse merge scenarios and write the attribution report.\n\n\
        Each merge commit is analysed independently; a failing commit is reported and\n\
        the rest proceed. Successful commits are written to the CSV report configured\n\
        under [report].\n\n\
        Merges come either from a scenario file or from a repository. With --repo, the\n\
        changed methods are mined from git; --spans maps each file path to its method\n\
        line ranges and --program supplies the call graph. The entry point comes from\n\
        [analysis] entry_class and entry_method.\n\n\
        Examples:\n  mergescope analyze --scenarios merges.json\n  \
        mergescope analyze --scenarios merges.json --output out/results.csv --compact\n  \
        mergescope analyze --repo . --merge HEAD --spans spans.json --program calls.json")]
    Analyze {
        /// Scenario JSON (one scenario or an array)
        #[arg(long, required_unless_present = "repo", conflicts_with = "repo")]
        scenarios: Option<PathBuf>,

        /// Repository to mine merges from instead of a scenario file
        #[arg(long, requires_all = ["spans", "program"])]
        repo: Option<PathBuf>,

        /// Merge revision to analyse with --repo (repeatable, default: HEAD)
        #[arg(long = "merge", requires = "repo")]
        merges: Vec<String>,

        /// Method span JSON keyed by repository path, for --repo
        #[arg(long, requires = "repo")]
        spans: Option<PathBuf>,

        /// Program model JSON for the call graph, for --repo
        #[arg(long, requires = "repo")]
        program: Option<PathBuf>,

        /// Project name for --repo (default: repository directory name)
        #[arg(long, requires = "repo")]
        project: Option<String>,

        /// Report path (default: [report] output)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Strip spaces and special characters from report columns
        #[arg(long)]
        compact: bool,
    },
    /// Create a default .mergescope.toml in the current directory
    Init,
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# mergescope configuration

[analysis]
# Type holding the entry method; scenarios may override it
# entry_class = "com.example.Main"
# entry_method = "main"
# max_depth = 5

[report]
# output = "data/results.csv"
# separator = ";"
# compact = false
"#;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<MergeScopeConfig> {
    match path {
        Some(path) => MergeScopeConfig::from_file(path)
            .into_diagnostic()
            .wrap_err(format!("loading {}", path.display())),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                MergeScopeConfig::from_file(default_path)
                    .into_diagnostic()
                    .wrap_err(format!("loading {CONFIG_FILE}"))
            } else {
                Ok(MergeScopeConfig::default())
            }
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn build_graph(
    args: &GraphArgs,
    config: &mut MergeScopeConfig,
) -> Result<(MethodSignature, CallGraph)> {
    args.apply(&mut config.analysis);
    let Some(class) = config.analysis.entry_class.clone() else {
        miette::bail!("no entry class: pass --entry-class or set [analysis] entry_class");
    };
    let program = ProgramModel::from_file(&args.program)
        .into_diagnostic()
        .wrap_err(format!("reading {}", args.program.display()))?;
    let ctx = AnalysisContext::resolve(
        &program,
        &class,
        &config.analysis.entry_method,
        config.analysis.max_depth,
    )
    .into_diagnostic()?;
    Ok((ctx.entry().clone(), ctx.build_graph()))
}

fn graph_json(entry: &MethodSignature, graph: &CallGraph) -> serde_json::Value {
    let edges: Vec<_> = graph
        .edges()
        .map(|(caller, callee)| serde_json::json!({ "caller": caller, "callee": callee }))
        .collect();
    serde_json::json!({
        "entry": entry,
        "nodes": graph.nodes().collect::<Vec<_>>(),
        "edges": edges,
    })
}

fn line_numbers(diff: &FileDiff, kind: LineKind) -> String {
    diff.modified_lines()
        .iter()
        .filter(|l| l.kind == kind)
        .map(|l| l.number.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Inputs of `analyze --repo`.
struct RepositorySource {
    repo: PathBuf,
    spans: PathBuf,
    program: PathBuf,
    project: Option<String>,
}

type CommitResults = Vec<(MergeCommit, Result<MergeAnalysis, MergeScopeError>)>;

/// Mine each merge of `source.repo` and analyse it against the program model.
///
/// Unresolvable revisions abort the run; analysis failures are kept per merge.
fn analyze_repository(
    source: &RepositorySource,
    merges: &[String],
    config: &MergeScopeConfig,
) -> Result<CommitResults> {
    let locator = SpanFileLocator::from_file(&source.spans)
        .into_diagnostic()
        .wrap_err(format!("reading {}", source.spans.display()))?;
    tracing::debug!(files = locator.file_count(), "spans loaded");
    let program = ProgramModel::from_file(&source.program)
        .into_diagnostic()
        .wrap_err(format!("reading {}", source.program.display()))?;
    let collector = GitDiffCollector::open(&source.repo, locator).into_diagnostic()?;

    let project = match &source.project {
        Some(name) => Project::named(name),
        None => {
            let root = source.repo.canonicalize().into_diagnostic()?;
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "repository".to_string());
            Project::named(&name)
        }
    };

    let default_merge = ["HEAD".to_string()];
    let merges = if merges.is_empty() {
        &default_merge[..]
    } else {
        merges
    };

    let mut results = Vec::with_capacity(merges.len());
    for rev in merges {
        let commit = resolve_merge_commit(collector.repository(), rev)
            .into_diagnostic()
            .wrap_err(format!("resolving {rev}"))?;
        let result = analyze_merge(&collector, &program, &project, &commit, config);
        if let Err(e) = &result {
            tracing::warn!(merge = %commit.sha(), error = %e, "merge analysis failed");
        }
        results.push((commit, result));
    }
    Ok(results)
}

fn print_analysis(analysis: &MergeAnalysis) {
    println!("merge {}", analysis.commit);
    println!("  entry  {}", analysis.entry.simplified());
    println!(
        "  graph  {} nodes, {} edges",
        analysis.graph_nodes, analysis.graph_edges
    );
    for line in format_ancestors(&analysis.ancestors).lines() {
        println!("  {line}");
    }
    for line in format_attribution(&analysis.records).lines() {
        println!("  {line}");
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    tracing::debug!(format = %cli.format, "configuration loaded");

    match cli.command {
        Command::Graph { graph, around } => {
            let (entry, graph) = build_graph(&graph, &mut config)?;
            match (around, cli.format) {
                (Some(method), format) => {
                    if !graph.contains(&method) {
                        miette::bail!("{method} is not in the call graph");
                    }
                    let callers = graph.callers_of(&method);
                    let callees = graph.callees_of(&method);
                    match format {
                        OutputFormat::Json => print_json(&serde_json::json!({
                            "method": method,
                            "callers": callers,
                            "callees": callees,
                        }))?,
                        OutputFormat::Text => {
                            println!("{method}");
                            println!("  callers");
                            for caller in callers {
                                println!("    {caller}");
                            }
                            println!("  callees");
                            for callee in callees {
                                println!("    {callee}");
                            }
                        }
                    }
                }
                (None, OutputFormat::Json) => print_json(&graph_json(&entry, &graph))?,
                (None, OutputFormat::Text) => print!("{}", graph.to_dot()),
            }
        }
        Command::Ancestors { graph, left, right } => {
            let (_, graph) = build_graph(&graph, &mut config)?;
            let left: HashSet<ModifiedMethod> = left.into_iter().map(ModifiedMethod::new).collect();
            let right: HashSet<ModifiedMethod> =
                right.into_iter().map(ModifiedMethod::new).collect();
            let ancestors = AncestorFinder::new(&graph)
                .find_common_ancestors(&left, &right)
                .into_diagnostic()?;
            match cli.format {
                OutputFormat::Json => print_json(&ancestors)?,
                OutputFormat::Text => print!("{}", format_ancestors(&ancestors)),
            }
        }
        Command::Attribute { scenarios } => {
            let scenarios = load_scenarios(&scenarios).into_diagnostic()?;
            let records: Vec<CollectedMergeMethodData> = scenarios
                .iter()
                .flat_map(|s| {
                    s.mutually_modified.iter().map(move |m| {
                        CollectedMergeMethodData::new(
                            s.project.clone(),
                            s.merge_commit.clone(),
                            m.class_name.clone(),
                            m.merged.signature.clone(),
                            attribute(&m.merged, &m.left, &m.right),
                        )
                    })
                })
                .collect();
            match cli.format {
                OutputFormat::Json => print_json(&records)?,
                OutputFormat::Text => print!("{}", format_attribution(&records)),
            }
        }
        Command::Lines {
            repo,
            from,
            to,
            file,
        } => {
            let repo = mergescope_git::open_repository(&repo).into_diagnostic()?;
            let diffs = mergescope_git::file_diffs(&repo, &from, &to, file.as_deref())
                .into_diagnostic()?;
            match cli.format {
                OutputFormat::Json => {
                    let files: Vec<_> = diffs
                        .iter()
                        .map(|d| {
                            serde_json::json!({
                                "path": d.path(),
                                "lines": d.modified_lines(),
                            })
                        })
                        .collect();
                    print_json(&files)?;
                }
                OutputFormat::Text => {
                    for diff in &diffs {
                        println!("{}", diff.path().display());
                        println!("  + {}", line_numbers(diff, LineKind::Added));
                        println!("  - {}", line_numbers(diff, LineKind::Removed));
                    }
                }
            }
        }
        Command::Files { repo, merge } => {
            let repo = mergescope_git::open_repository(&repo).into_diagnostic()?;
            let commit = mergescope_git::resolve_merge_commit(&repo, &merge).into_diagnostic()?;
            let files: BTreeSet<String> =
                mergescope_git::files_modified_by_both_parents(&repo, &commit)
                    .into_diagnostic()?;
            match cli.format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "mergeCommit": commit,
                    "files": files,
                }))?,
                OutputFormat::Text => {
                    println!("merge {commit}");
                    for file in &files {
                        println!("  {file}");
                    }
                }
            }
        }
        Command::Analyze {
            scenarios,
            repo,
            merges,
            spans,
            program,
            project,
            output,
            compact,
        } => {
            if let Some(output) = output {
                config.report.output = output;
            }
            config.report.compact |= compact;

            let results = match (scenarios, repo, spans, program) {
                (_, Some(repo), Some(spans), Some(program)) => {
                    let source = RepositorySource {
                        repo,
                        spans,
                        program,
                        project,
                    };
                    analyze_repository(&source, &merges, &config)?
                }
                (Some(scenarios), ..) => {
                    let scenarios = load_scenarios(&scenarios).into_diagnostic()?;
                    analyze_all(&scenarios, &config)
                }
                _ => miette::bail!("pass --scenarios, or --repo with --spans and --program"),
            };

            let succeeded: Vec<&MergeAnalysis> =
                results.iter().filter_map(|(_, r)| r.as_ref().ok()).collect();
            let rows = succeeded.iter().flat_map(|a| {
                a.records
                    .iter()
                    .map(move |record| (record, a.ancestors.as_slice()))
            });
            write_report(rows, &config.report)
                .into_diagnostic()
                .wrap_err(format!("writing {}", config.report.output.display()))?;

            match cli.format {
                OutputFormat::Json => {
                    let summary: Vec<_> = results
                        .iter()
                        .map(|(commit, result)| match result {
                            Ok(analysis) => serde_json::json!({
                                "mergeCommit": commit,
                                "analysis": analysis,
                            }),
                            Err(e) => serde_json::json!({
                                "mergeCommit": commit,
                                "error": e.to_string(),
                            }),
                        })
                        .collect();
                    print_json(&summary)?;
                }
                OutputFormat::Text => {
                    for (commit, result) in &results {
                        match result {
                            Ok(analysis) => print_analysis(analysis),
                            Err(e) => println!("merge {commit}\n  skipped: {e}"),
                        }
                    }
                    println!(
                        "\n{} of {} merges analysed; report written to {}",
                        succeeded.len(),
                        results.len(),
                        config.report.output.display()
                    );
                }
            }
        }
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "mergescope", &mut std::io::stdout());
        }
    }

    Ok(())
}
