use std::path::Path;

use mergescope_callgraph::ProgramModel;
use mergescope_core::{MergeCommit, MergeScopeError, ModifiedMethod, Project};
use serde::{Deserialize, Serialize};

/// Entry point override for one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    /// Fully-qualified type holding the entry method.
    pub class: String,
    /// Entry method name; the configured name is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// A method changed by both parents, as seen in each revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutualMethod {
    /// Type declared by the file holding the method.
    pub class_name: String,
    /// Changes between the ancestor and the merge.
    pub merged: ModifiedMethod,
    /// Changes between the ancestor and the left parent.
    pub left: ModifiedMethod,
    /// Changes between the ancestor and the right parent.
    pub right: ModifiedMethod,
}

/// Everything collected for one merge commit.
///
/// # Examples
///
/// ```
/// use mergescope_analysis::Scenario;
///
/// let json = r#"{
///     "project": {"name": "shop"},
///     "mergeCommit": {"ancestorSha": "a", "leftSha": "l", "rightSha": "r", "mergeSha": "m"},
///     "entryPoint": {"class": "shop.Main"},
///     "program": {"edges": [{"caller": "shop.Main.main()", "callee": "shop.Cart.add(int)"}]},
///     "leftChanged": [{"signature": "shop.Cart.add(int)"}],
///     "rightChanged": []
/// }"#;
/// let scenario = Scenario::from_json(json).unwrap();
/// assert_eq!(scenario.merge_commit.sha(), "m");
/// assert!(scenario.mutually_modified.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Owning project.
    pub project: Project,
    /// The merge under analysis.
    pub merge_commit: MergeCommit,
    /// Entry point; falls back to the configured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<EntryPoint>,
    /// Call edges of the program at the merge revision.
    #[serde(default)]
    pub program: ProgramModel,
    /// Methods changed by the left parent.
    #[serde(default)]
    pub left_changed: Vec<ModifiedMethod>,
    /// Methods changed by the right parent.
    #[serde(default)]
    pub right_changed: Vec<ModifiedMethod>,
    /// Methods changed by both parents.
    #[serde(default)]
    pub mutually_modified: Vec<MutualMethod>,
}

impl Scenario {
    /// Parse a single scenario from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::Serialization`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, MergeScopeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a single scenario from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::FileNotFound`] if the file is missing and
    /// [`MergeScopeError::Serialization`] on malformed input.
    pub fn from_file(path: &Path) -> Result<Self, MergeScopeError> {
        Self::from_json(&read(path)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Scenario>),
    One(Box<Scenario>),
}

fn read(path: &Path) -> Result<String, MergeScopeError> {
    if !path.exists() {
        return Err(MergeScopeError::FileNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Read scenarios from a JSON file holding one scenario or an array of them.
///
/// # Errors
///
/// Returns [`MergeScopeError::FileNotFound`] if the file is missing and
/// [`MergeScopeError::Parse`] if it is neither shape.
pub fn load_scenarios(path: &Path) -> Result<Vec<Scenario>, MergeScopeError> {
    let content = read(path)?;
    let parsed: OneOrMany = serde_json::from_str(&content).map_err(|e| {
        MergeScopeError::Parse(format!(
            "{}: expected a scenario or an array of scenarios: {e}",
            path.display()
        ))
    })?;
    Ok(match parsed {
        OneOrMany::Many(all) => all,
        OneOrMany::One(one) => vec![*one],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "project": {"name": "p"},
        "mergeCommit": {"ancestorSha": "a", "leftSha": "l", "rightSha": "r", "mergeSha": "m"}
    }"#;

    #[test]
    fn optional_sections_default_to_empty() {
        let scenario = Scenario::from_json(MINIMAL).unwrap();
        assert!(scenario.entry_point.is_none());
        assert_eq!(scenario.program.method_count(), 0);
        assert!(scenario.left_changed.is_empty());
    }

    #[test]
    fn loads_single_or_array() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one.json");
        let many = dir.path().join("many.json");
        std::fs::write(&one, MINIMAL).unwrap();
        std::fs::write(&many, format!("[{MINIMAL}, {MINIMAL}]")).unwrap();

        assert_eq!(load_scenarios(&one).unwrap().len(), 1);
        assert_eq!(load_scenarios(&many).unwrap().len(), 2);
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"project": 3}"#).unwrap();
        let err = load_scenarios(&path).unwrap_err();
        assert!(matches!(err, MergeScopeError::Parse(_)));
    }

    #[test]
    fn missing_file() {
        let err = Scenario::from_file(Path::new("/nonexistent/scenario.json")).unwrap_err();
        assert!(matches!(err, MergeScopeError::FileNotFound(_)));
    }

    #[test]
    fn line_number_zero_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.json");
        let json = r#"{
            "project": {"name": "p"},
            "mergeCommit": {"ancestorSha": "a", "leftSha": "l", "rightSha": "r", "mergeSha": "m"},
            "leftChanged": [{"signature": "a.A.f()", "lines": [{"number": 0, "kind": "added"}]}]
        }"#;
        std::fs::write(&path, json).unwrap();
        let err = load_scenarios(&path).unwrap_err();
        assert!(matches!(err, MergeScopeError::Parse(_)));
    }

    #[test]
    fn mutual_method_uses_camel_case() {
        let json = r#"{
            "className": "a.A",
            "merged": {"signature": "a.A.f()", "lines": [{"number": 3, "kind": "added"}]},
            "left": {"signature": "a.A.f()"},
            "right": {"signature": "a.A.f()"}
        }"#;
        let mutual: MutualMethod = serde_json::from_str(json).unwrap();
        assert_eq!(mutual.class_name, "a.A");
        assert_eq!(mutual.merged.lines.len(), 1);
    }
}
