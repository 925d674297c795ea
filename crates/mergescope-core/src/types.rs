use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MergeScopeError;

/// Canonical identifier for a callable unit.
///
/// Identity is structural over the fully-qualified owner, the method name and
/// the ordered, fully-qualified parameter types. The canonical text form is
/// `owner.name(p1,p2)`; [`simplified`](Self::simplified) produces a shorter
/// form for display only and is never used as a key.
///
/// # Examples
///
/// ```
/// use mergescope_core::MethodSignature;
///
/// let sig: MethodSignature = "com.acme.Cart.add(java.lang.String,int)".parse().unwrap();
/// assert_eq!(sig.owner(), "com.acme.Cart");
/// assert_eq!(sig.name(), "add");
/// assert_eq!(sig.simplified(), "com.acme.Cart.add(String, int)");
///
/// let analyzer: MethodSignature = "<com.acme.Cart: void add(java.lang.String,int)>"
///     .parse()
///     .unwrap();
/// assert_eq!(sig, analyzer);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodSignature {
    owner: String,
    name: String,
    params: Vec<String>,
}

impl MethodSignature {
    /// Build a signature from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::InvalidSignature`] if the owner or name is
    /// empty or contains characters reserved by the text form.
    pub fn new<I, S>(owner: &str, name: &str, params: I) -> Result<Self, MergeScopeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let owner = owner.trim();
        let name = name.trim();
        let reserved = |s: &str| s.contains(['(', ')', ',', ' ']);
        if owner.is_empty() || name.is_empty() || reserved(owner) || reserved(name) {
            return Err(MergeScopeError::InvalidSignature(format!(
                "{owner}.{name}: owner and name must be non-empty identifiers"
            )));
        }
        let params = params
            .into_iter()
            .map(|p| p.into().trim().to_string())
            .collect::<Vec<_>>();
        if params.iter().any(|p| p.is_empty()) {
            return Err(MergeScopeError::InvalidSignature(format!(
                "{owner}.{name}: empty parameter type"
            )));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            params,
        })
    }

    /// Fully-qualified owning type.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified parameter types, in declaration order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Display form with unqualified parameter types, e.g. `a.B.m(String, int)`.
    pub fn simplified(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| p.rsplit('.').next().unwrap_or(p))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}.{}({params})", self.owner, self.name)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.owner, self.name, self.params.join(","))
    }
}

impl FromStr for MethodSignature {
    type Err = MergeScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')) {
            Some(inner) => parse_analyzer_form(inner, s),
            None => parse_canonical_form(s),
        }
    }
}

impl TryFrom<String> for MethodSignature {
    type Error = MergeScopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MethodSignature> for String {
    fn from(value: MethodSignature) -> Self {
        value.to_string()
    }
}

fn invalid(s: &str) -> MergeScopeError {
    MergeScopeError::InvalidSignature(s.to_string())
}

/// Splits `head(params)` into `head` and the parameter list.
fn split_call<'a>(
    text: &'a str,
    original: &str,
) -> Result<(&'a str, Vec<String>), MergeScopeError> {
    let open = text.find('(').ok_or_else(|| invalid(original))?;
    let inner = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| invalid(original))?;
    let params = inner
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();
    Ok((&text[..open], params))
}

fn parse_canonical_form(s: &str) -> Result<MethodSignature, MergeScopeError> {
    let (head, params) = split_call(s, s)?;
    let (owner, name) = head.rsplit_once('.').ok_or_else(|| invalid(s))?;
    MethodSignature::new(owner, name, params)
}

// `<owner: ret name(params)>`
fn parse_analyzer_form(inner: &str, original: &str) -> Result<MethodSignature, MergeScopeError> {
    let (owner, rest) = inner.split_once(':').ok_or_else(|| invalid(original))?;
    let (head, params) = split_call(rest.trim(), original)?;
    let name = head.split_whitespace().last().ok_or_else(|| invalid(original))?;
    MethodSignature::new(owner, name, params)
}

/// Kind of change recorded for a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Line present in the newer revision only.
    Added,
    /// Line present in the older revision only.
    Removed,
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineKind::Added => write!(f, "added"),
            LineKind::Removed => write!(f, "removed"),
        }
    }
}

/// A changed line: number plus kind. Equality is structural over both.
///
/// # Examples
///
/// ```
/// use mergescope_core::{LineKind, ModifiedLine};
///
/// let line = ModifiedLine::added(10);
/// assert_eq!(line.kind, LineKind::Added);
/// assert_ne!(line, ModifiedLine::removed(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawModifiedLine")]
pub struct ModifiedLine {
    /// 1-based line number.
    pub number: u32,
    /// Whether the line was added or removed.
    pub kind: LineKind,
}

#[derive(Deserialize)]
struct RawModifiedLine {
    number: u32,
    kind: LineKind,
}

impl TryFrom<RawModifiedLine> for ModifiedLine {
    type Error = MergeScopeError;

    fn try_from(raw: RawModifiedLine) -> Result<Self, Self::Error> {
        Self::new(raw.number, raw.kind)
    }
}

impl ModifiedLine {
    /// A changed line, rejecting line number 0.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::Parse`] if `number` is 0.
    pub fn new(number: u32, kind: LineKind) -> Result<Self, MergeScopeError> {
        if number == 0 {
            return Err(MergeScopeError::Parse(format!(
                "{kind} line number must be at least 1"
            )));
        }
        Ok(Self { number, kind })
    }

    /// An added line. `number` is 1-based.
    pub fn added(number: u32) -> Self {
        debug_assert!(number > 0, "line numbers start at 1");
        Self {
            number,
            kind: LineKind::Added,
        }
    }

    /// A removed line. `number` is 1-based.
    pub fn removed(number: u32) -> Self {
        debug_assert!(number > 0, "line numbers start at 1");
        Self {
            number,
            kind: LineKind::Removed,
        }
    }
}

/// A method together with the lines changed relative to some baseline.
///
/// Two values are equal iff their signatures are equal; the line set is
/// payload. This lets the same method be looked up across revisions while
/// carrying different line sets.
///
/// # Examples
///
/// ```
/// use mergescope_core::{MethodSignature, ModifiedLine, ModifiedMethod};
///
/// let sig: MethodSignature = "a.B.run()".parse().unwrap();
/// let left = ModifiedMethod::with_lines(sig.clone(), [ModifiedLine::added(3)]);
/// let right = ModifiedMethod::with_lines(sig, [ModifiedLine::removed(9)]);
/// assert_eq!(left, right);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifiedMethod {
    /// Method identity.
    pub signature: MethodSignature,
    /// Lines changed in this method.
    #[serde(default)]
    pub lines: BTreeSet<ModifiedLine>,
}

impl ModifiedMethod {
    /// A method with no recorded lines.
    pub fn new(signature: MethodSignature) -> Self {
        Self {
            signature,
            lines: BTreeSet::new(),
        }
    }

    /// A method with the given changed lines; duplicates collapse.
    pub fn with_lines(
        signature: MethodSignature,
        lines: impl IntoIterator<Item = ModifiedLine>,
    ) -> Self {
        Self {
            signature,
            lines: lines.into_iter().collect(),
        }
    }
}

impl PartialEq for ModifiedMethod {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
    }
}

impl Eq for ModifiedMethod {}

impl Hash for ModifiedMethod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
    }
}

impl fmt::Display for ModifiedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature)
    }
}

/// The four revisions of a three-way merge. Identifiers are opaque.
///
/// # Examples
///
/// ```
/// use mergescope_core::MergeCommit;
///
/// let commit = MergeCommit::new("base", "left", "right", "merge");
/// assert_eq!(commit.sha(), "merge");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCommit {
    /// Common ancestor revision.
    pub ancestor_sha: String,
    /// First parent.
    pub left_sha: String,
    /// Second parent.
    pub right_sha: String,
    /// The merge result.
    pub merge_sha: String,
}

impl MergeCommit {
    /// Build a merge commit from its four revisions.
    pub fn new(ancestor: &str, left: &str, right: &str, merge: &str) -> Self {
        Self {
            ancestor_sha: ancestor.into(),
            left_sha: left.into(),
            right_sha: right.into(),
            merge_sha: merge.into(),
        }
    }

    /// The merge revision itself.
    pub fn sha(&self) -> &str {
        &self.merge_sha
    }
}

impl fmt::Display for MergeCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = |s: &str| s.chars().take(8).collect::<String>();
        write!(
            f,
            "{} (base {}, left {}, right {})",
            short(&self.merge_sha),
            short(&self.ancestor_sha),
            short(&self.left_sha),
            short(&self.right_sha)
        )
    }
}

/// The project a merge commit belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project name as shown in reports.
    pub name: String,
    /// Local checkout, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Project {
    /// A project known only by name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }
}

/// Attribution of a merged method's changed lines to the merge parents.
///
/// Added numbers refer to the merged revision and deleted numbers to the
/// ancestor, so a modified line shows up in both sets of a side. A line may
/// be attributed to both parents at once.
///
/// # Examples
///
/// ```
/// use mergescope_core::AttributedLines;
///
/// let mut lines = AttributedLines::default();
/// lines.left_added.insert(5);
/// lines.right_added.insert(5);
/// assert_eq!(lines.overlapping().into_iter().collect::<Vec<_>>(), vec![5]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributedLines {
    /// Added lines traced to the left parent.
    pub left_added: BTreeSet<u32>,
    /// Removed lines traced to the left parent.
    pub left_deleted: BTreeSet<u32>,
    /// Added lines traced to the right parent.
    pub right_added: BTreeSet<u32>,
    /// Removed lines traced to the right parent.
    pub right_deleted: BTreeSet<u32>,
}

impl AttributedLines {
    /// Returns `true` if no line was attributed to either parent.
    pub fn is_empty(&self) -> bool {
        self.left_added.is_empty()
            && self.left_deleted.is_empty()
            && self.right_added.is_empty()
            && self.right_deleted.is_empty()
    }

    /// Line numbers attributed to both parents with the same kind.
    pub fn overlapping(&self) -> BTreeSet<u32> {
        self.left_added
            .intersection(&self.right_added)
            .chain(self.left_deleted.intersection(&self.right_deleted))
            .copied()
            .collect()
    }
}

/// Attribution record for one mutually modified method of a merge commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedMergeMethodData {
    /// Owning project.
    pub project: Project,
    /// The analysed merge.
    pub merge_commit: MergeCommit,
    /// Fully-qualified name of the type declared by the file.
    pub class_name: String,
    /// The merged method.
    pub method_signature: MethodSignature,
    /// Added lines traced to the left parent.
    pub left_added_lines: BTreeSet<u32>,
    /// Removed lines traced to the left parent.
    pub left_deleted_lines: BTreeSet<u32>,
    /// Added lines traced to the right parent.
    pub right_added_lines: BTreeSet<u32>,
    /// Removed lines traced to the right parent.
    pub right_deleted_lines: BTreeSet<u32>,
}

impl CollectedMergeMethodData {
    /// Assemble a record from an attribution result.
    pub fn new(
        project: Project,
        merge_commit: MergeCommit,
        class_name: String,
        method_signature: MethodSignature,
        lines: AttributedLines,
    ) -> Self {
        Self {
            project,
            merge_commit,
            class_name,
            method_signature,
            left_added_lines: lines.left_added,
            left_deleted_lines: lines.left_deleted,
            right_added_lines: lines.right_added,
            right_deleted_lines: lines.right_deleted,
        }
    }
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use mergescope_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn sig(s: &str) -> MethodSignature {
        s.parse().unwrap()
    }

    #[test]
    fn canonical_signature_round_trips_through_display() {
        let text = "com.acme.Cart.add(java.lang.String,int)";
        assert_eq!(sig(text).to_string(), text);
    }

    #[test]
    fn analyzer_form_drops_return_type() {
        let s = sig("<com.acme.Main: void main(java.lang.String[])>");
        assert_eq!(s.owner(), "com.acme.Main");
        assert_eq!(s.name(), "main");
        assert_eq!(s.params(), ["java.lang.String[]".to_string()]);
    }

    #[test]
    fn no_arg_signature_parses() {
        let s = sig("a.B.run()");
        assert!(s.params().is_empty());
        assert_eq!(s.simplified(), "a.B.run()");
    }

    #[test]
    fn simplification_does_not_collapse_identity() {
        let a = sig("a.B.m(x.Date)");
        let b = sig("a.B.m(y.Date)");
        assert_eq!(a.simplified(), b.simplified());
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!("noparens".parse::<MethodSignature>().is_err());
        assert!("run()".parse::<MethodSignature>().is_err());
        assert!("a.B.run(".parse::<MethodSignature>().is_err());
        assert!("<a.B void run()>".parse::<MethodSignature>().is_err());
        assert!(MethodSignature::new("", "run", Vec::<String>::new()).is_err());
    }

    #[test]
    fn signature_serializes_as_string() {
        let json = serde_json::to_string(&sig("a.B.m(int)")).unwrap();
        assert_eq!(json, "\"a.B.m(int)\"");
        let back: MethodSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig("a.B.m(int)"));
        assert!(serde_json::from_str::<MethodSignature>("\"bogus\"").is_err());
    }

    #[test]
    fn modified_method_identity_ignores_lines() {
        let mut set = HashSet::new();
        set.insert(ModifiedMethod::with_lines(sig("a.B.m()"), [ModifiedLine::added(1)]));
        set.insert(ModifiedMethod::with_lines(sig("a.B.m()"), [ModifiedLine::added(2)]));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn modified_lines_deduplicate_structurally() {
        let m = ModifiedMethod::with_lines(
            sig("a.B.m()"),
            [
                ModifiedLine::added(4),
                ModifiedLine::added(4),
                ModifiedLine::removed(4),
            ],
        );
        assert_eq!(m.lines.len(), 2);
    }

    #[test]
    fn zero_line_number_is_rejected() {
        assert!(ModifiedLine::new(0, LineKind::Added).is_err());
        assert_eq!(
            ModifiedLine::new(4, LineKind::Removed).unwrap(),
            ModifiedLine::removed(4)
        );
    }

    #[test]
    fn zero_line_number_fails_deserialization() {
        let json = r#"{"signature":"a.B.m()","lines":[{"number":0,"kind":"added"}]}"#;
        let err = serde_json::from_str::<ModifiedMethod>(json).unwrap_err();
        assert!(err.to_string().contains("at least 1"), "{err}");
    }

    #[test]
    fn modified_method_json_shape() {
        let json = r#"{"signature":"a.B.m()","lines":[
            {"number":10,"kind":"added"},{"number":12,"kind":"removed"}
        ]}"#;
        let m: ModifiedMethod = serde_json::from_str(json).unwrap();
        assert!(m.lines.contains(&ModifiedLine::added(10)));
        assert!(m.lines.contains(&ModifiedLine::removed(12)));
    }

    #[test]
    fn merge_commit_uses_camel_case() {
        let commit = MergeCommit::new("a", "l", "r", "m");
        let value = serde_json::to_value(&commit).unwrap();
        assert_eq!(value["ancestorSha"], "a");
        assert_eq!(value["mergeSha"], "m");
    }

    #[test]
    fn overlapping_only_counts_same_kind() {
        let lines = AttributedLines {
            left_added: [1, 2].into(),
            left_deleted: [3].into(),
            right_added: [2].into(),
            right_deleted: [1].into(),
        };
        assert_eq!(lines.overlapping(), BTreeSet::from([2]));
        assert!(!lines.is_empty());
        assert!(AttributedLines::default().is_empty());
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
