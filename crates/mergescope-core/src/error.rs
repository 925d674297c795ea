use std::path::PathBuf;

/// Errors that can occur across mergescope.
///
/// Infrastructure failures (I/O, git, parsing) sit next to the three analysis
/// failures that abort a single merge-commit analysis: [`EntryPointNotFound`],
/// [`EmptyInput`] and [`NoCommonAncestor`]. Callers processing many commits
/// catch these per commit and move on.
///
/// [`EntryPointNotFound`]: MergeScopeError::EntryPointNotFound
/// [`EmptyInput`]: MergeScopeError::EmptyInput
/// [`NoCommonAncestor`]: MergeScopeError::NoCommonAncestor
///
/// # Examples
///
/// ```
/// use mergescope_core::MergeScopeError;
///
/// let err = MergeScopeError::Config("missing entry class".into());
/// assert!(err.to_string().contains("missing entry class"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum MergeScopeError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// Diff or input parsing failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// A method signature string could not be parsed.
    #[error("invalid method signature: {0}")]
    InvalidSignature(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Neither the requested entry method nor a `main` fallback exists on the entry type.
    #[error("entry point not found: no method '{method}' or 'main' on {class}")]
    EntryPointNotFound {
        /// Fully-qualified entry type.
        class: String,
        /// Requested entry method name.
        method: String,
    },

    /// The ancestor search was given an empty left- or right-changed set.
    #[error("left and right changed method sets must both be non-empty")]
    EmptyInput,

    /// Every (left, right) pair was tried and none produced a common ancestor.
    #[error("no common ancestor found")]
    NoCommonAncestor,
}

impl MergeScopeError {
    /// Returns `true` for failures that only invalidate the current merge commit.
    ///
    /// # Examples
    ///
    /// ```
    /// use mergescope_core::MergeScopeError;
    ///
    /// assert!(MergeScopeError::NoCommonAncestor.is_per_commit());
    /// assert!(!MergeScopeError::Config("x".into()).is_per_commit());
    /// ```
    pub fn is_per_commit(&self) -> bool {
        matches!(
            self,
            MergeScopeError::EntryPointNotFound { .. }
                | MergeScopeError::EmptyInput
                | MergeScopeError::NoCommonAncestor
        )
    }
}
