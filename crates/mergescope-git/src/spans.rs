//! Method spans recorded ahead of time by an external analyzer.

use std::collections::HashMap;
use std::path::Path;

use git2::{ObjectType, Oid};
use mergescope_core::MergeScopeError;
use mergescope_lines::MethodSpan;
use serde::Deserialize;
use tracing::debug;

use crate::locator::MethodLocator;

/// A recorded span, optionally pinned to one file revision.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedSpan {
    /// The method and its line range.
    #[serde(flatten)]
    pub span: MethodSpan,
    /// Blob id (full or abbreviated) of the file content the span was
    /// measured on. Unpinned spans apply to every revision.
    #[serde(default)]
    pub blob: Option<String>,
}

impl RecordedSpan {
    fn applies_to(&self, blob: Option<&str>) -> bool {
        match (self.blob.as_deref(), blob) {
            (None, _) => true,
            (Some(want), Some(have)) => !want.is_empty() && have.starts_with(want),
            (Some(_), None) => false,
        }
    }
}

/// [`MethodLocator`] backed by a JSON file mapping repository paths to spans.
///
/// ```json
/// {
///   "src/main/java/app/Cart.java": [
///     {"signature": "app.Cart.add(int)", "start": 12, "end": 30},
///     {"signature": "app.Cart.total()", "start": 32, "end": 40, "blob": "3f2a9c1"}
///   ]
/// }
/// ```
///
/// Spans carrying a `blob` only apply when the located content hashes to
/// that blob id, so a file can list separate spans for each revision.
///
/// # Examples
///
/// ```
/// use mergescope_git::{MethodLocator, SpanFileLocator};
///
/// let locator = SpanFileLocator::from_json(
///     r#"{"A.java": [{"signature": "a.A.f()", "start": 2, "end": 4}]}"#,
/// )
/// .unwrap();
/// assert_eq!(locator.locate("A.java", "class A {}").unwrap().len(), 1);
/// assert!(locator.locate("B.java", "class B {}").unwrap().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SpanFileLocator {
    files: HashMap<String, Vec<RecordedSpan>>,
}

impl SpanFileLocator {
    /// Parse a span file from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::Parse`] if the JSON does not have the
    /// expected shape or a signature is malformed.
    pub fn from_json(json: &str) -> Result<Self, MergeScopeError> {
        let files = serde_json::from_str(json)
            .map_err(|e| MergeScopeError::Parse(format!("invalid span file: {e}")))?;
        Ok(Self { files })
    }

    /// Load a span file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::FileNotFound`] if `path` does not exist,
    /// otherwise the errors of [`SpanFileLocator::from_json`].
    pub fn from_file(path: &Path) -> Result<Self, MergeScopeError> {
        if !path.exists() {
            return Err(MergeScopeError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Number of files with recorded spans.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl MethodLocator for SpanFileLocator {
    fn locate(&self, path: &str, source: &str) -> Result<Vec<MethodSpan>, MergeScopeError> {
        let Some(recorded) = self.files.get(path) else {
            debug!(path, "no spans recorded");
            return Ok(Vec::new());
        };

        let blob = if recorded.iter().any(|r| r.blob.is_some()) {
            let oid = Oid::hash_object(ObjectType::Blob, source.as_bytes())
                .map_err(|e| MergeScopeError::Git(format!("failed to hash {path}: {e}")))?;
            Some(oid.to_string())
        } else {
            None
        };

        Ok(recorded
            .iter()
            .filter(|r| r.applies_to(blob.as_deref()))
            .map(|r| r.span.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_spans_follow_the_content() {
        let old = "class A {\n}\n";
        let new = "class A {\n  void f() {}\n}\n";
        let old_blob = Oid::hash_object(ObjectType::Blob, old.as_bytes()).unwrap();
        let new_blob = Oid::hash_object(ObjectType::Blob, new.as_bytes()).unwrap();
        let json = format!(
            r#"{{"A.java": [
                {{"signature": "a.A.f()", "start": 2, "end": 2, "blob": "{}"}},
                {{"signature": "a.A.g()", "start": 1, "end": 1, "blob": "{}"}},
                {{"signature": "a.A.h()", "start": 1, "end": 3}}
            ]}}"#,
            &new_blob.to_string()[..10],
            old_blob
        );
        let locator = SpanFileLocator::from_json(&json).unwrap();

        let names = |source: &str| -> Vec<String> {
            locator
                .locate("A.java", source)
                .unwrap()
                .into_iter()
                .map(|s| s.signature.to_string())
                .collect()
        };
        assert_eq!(names(new), vec!["a.A.f()", "a.A.h()"]);
        assert_eq!(names(old), vec!["a.A.g()", "a.A.h()"]);
    }

    #[test]
    fn bad_signature_is_a_parse_error() {
        let json = r#"{"A.java": [{"signature": "f", "start": 1, "end": 2}]}"#;
        let err = SpanFileLocator::from_json(json).unwrap_err();
        assert!(matches!(err, MergeScopeError::Parse(_)));
    }

    #[test]
    fn missing_span_file() {
        let err = SpanFileLocator::from_file(Path::new("/nonexistent/spans.json")).unwrap_err();
        assert!(matches!(err, MergeScopeError::FileNotFound(_)));
    }
}
