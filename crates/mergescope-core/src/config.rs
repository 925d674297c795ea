use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MergeScopeError;

/// Default call-graph depth budget.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Top-level configuration loaded from `.mergescope.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use mergescope_core::MergeScopeConfig;
///
/// let config = MergeScopeConfig::default();
/// assert_eq!(config.analysis.max_depth, 5);
/// assert_eq!(config.report.separator, ";");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeScopeConfig {
    /// Call-graph and ancestor search settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// CSV report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

impl MergeScopeConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::FileNotFound`] if the file does not exist,
    /// [`MergeScopeError::Io`] if it cannot be read, or
    /// [`MergeScopeError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mergescope_core::MergeScopeConfig;
    /// use std::path::Path;
    ///
    /// let config = MergeScopeConfig::from_file(Path::new(".mergescope.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, MergeScopeError> {
        if !path.exists() {
            return Err(MergeScopeError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::Toml`] if parsing fails, or
    /// [`MergeScopeError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use mergescope_core::MergeScopeConfig;
    ///
    /// let toml = r#"
    /// [analysis]
    /// entry_class = "com.acme.App"
    /// max_depth = 8
    /// "#;
    /// let config = MergeScopeConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.analysis.max_depth, 8);
    /// assert_eq!(config.analysis.entry_method, "main");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, MergeScopeError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), MergeScopeError> {
        if self.report.separator.is_empty() {
            return Err(MergeScopeError::Config(
                "report.separator must not be empty".into(),
            ));
        }
        if self.analysis.entry_method.trim().is_empty() {
            return Err(MergeScopeError::Config(
                "analysis.entry_method must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Call-graph construction settings.
///
/// # Examples
///
/// ```
/// use mergescope_core::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert!(config.entry_class.is_none());
/// assert_eq!(config.entry_method, "main");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Fully-qualified type holding the entry method.
    pub entry_class: Option<String>,
    /// Entry method name; `main` is tried when it is missing (default: `"main"`).
    #[serde(default = "default_entry_method")]
    pub entry_method: String,
    /// Depth budget for call-graph traversal (default: 5).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_entry_method() -> String {
    "main".into()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            entry_class: None,
            entry_method: default_entry_method(),
            max_depth: default_max_depth(),
        }
    }
}

/// CSV report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report path (default: `data/results.csv`).
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Column separator (default: `";"`).
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Strip spaces and `+^?<>|` from every column but the last (default: false).
    #[serde(default)]
    pub compact: bool,
}

fn default_output() -> PathBuf {
    PathBuf::from("data/results.csv")
}

fn default_separator() -> String {
    ";".into()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            separator: default_separator(),
            compact: false,
        }
    }
}
