use std::collections::{HashMap, HashSet};
use std::path::Path;

use mergescope_core::{MergeScopeError, MethodSignature};
use serde::{Deserialize, Serialize};

use crate::builder::{CallEdge, EdgeSource};

/// Program structure exported by an external analyzer.
///
/// JSON shape: `{"methods": [sig, ...], "edges": [{"caller": sig, "callee": sig}]}`.
/// Edge endpoints are registered as methods automatically, so `methods` only
/// needs to list methods without call edges. Duplicate edges are kept as
/// reported; the call graph collapses them.
///
/// # Examples
///
/// ```
/// use mergescope_callgraph::{EdgeSource, ProgramModel};
///
/// let json = r#"{
///     "methods": ["app.Main.main(java.lang.String[])"],
///     "edges": [{"caller": "app.Main.main(java.lang.String[])", "callee": "app.Db.open()"}]
/// }"#;
/// let program = ProgramModel::from_json(json).unwrap();
/// assert_eq!(program.method_count(), 2);
/// assert_eq!(program.methods_of("app.Main").len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawProgramModel", into = "RawProgramModel")]
pub struct ProgramModel {
    methods: Vec<MethodSignature>,
    known: HashSet<MethodSignature>,
    edges: Vec<CallEdge>,
    outgoing: HashMap<MethodSignature, Vec<usize>>,
}

#[derive(Serialize, Deserialize)]
struct RawProgramModel {
    #[serde(default)]
    methods: Vec<MethodSignature>,
    #[serde(default)]
    edges: Vec<CallEdge>,
}

impl From<RawProgramModel> for ProgramModel {
    fn from(raw: RawProgramModel) -> Self {
        let mut program = ProgramModel::new();
        for method in raw.methods {
            program.add_method(method);
        }
        for edge in raw.edges {
            program.add_edge(edge.caller, edge.callee);
        }
        program
    }
}

impl From<ProgramModel> for RawProgramModel {
    fn from(program: ProgramModel) -> Self {
        Self {
            methods: program.methods,
            edges: program.edges,
        }
    }
}

impl ProgramModel {
    /// An empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a program model from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::Serialization`] on malformed JSON or
    /// unparseable signatures.
    pub fn from_json(json: &str) -> Result<Self, MergeScopeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a program model from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::FileNotFound`] if `path` does not exist,
    /// otherwise the errors of [`from_json`](Self::from_json).
    pub fn from_file(path: &Path) -> Result<Self, MergeScopeError> {
        if !path.exists() {
            return Err(MergeScopeError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Declare a method; no-op if it is already known.
    pub fn add_method(&mut self, method: MethodSignature) {
        if self.known.insert(method.clone()) {
            self.methods.push(method);
        }
    }

    /// Record a call edge, declaring both endpoints.
    pub fn add_edge(&mut self, caller: MethodSignature, callee: MethodSignature) {
        self.add_method(caller.clone());
        self.add_method(callee.clone());
        self.outgoing
            .entry(caller.clone())
            .or_default()
            .push(self.edges.len());
        self.edges.push(CallEdge { caller, callee });
    }

    /// Number of declared methods.
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Number of reported edges, duplicates included.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl EdgeSource for ProgramModel {
    fn methods_of(&self, owner: &str) -> Vec<MethodSignature> {
        self.methods
            .iter()
            .filter(|m| m.owner() == owner)
            .cloned()
            .collect()
    }

    fn edges_out_of(&self, method: &MethodSignature) -> Vec<CallEdge> {
        self.outgoing
            .get(method)
            .map(|ids| ids.iter().map(|&i| self.edges[i].clone()).collect())
            .unwrap_or_default()
    }
}
