use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use mergescope_core::{MergeScopeError, ModifiedLine};

/// A single hunk from a unified diff.
///
/// # Examples
///
/// ```
/// use mergescope_core::ModifiedLine;
/// use mergescope_lines::parser::DiffHunk;
///
/// let hunk = DiffHunk {
///     old_start: 10,
///     old_lines: 2,
///     new_start: 10,
///     new_lines: 2,
///     content: " keep\n-old\n+new\n".into(),
/// };
/// let lines: Vec<_> = hunk.modified_lines().collect();
/// assert_eq!(lines, vec![ModifiedLine::removed(11), ModifiedLine::added(11)]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    /// Starting line in the old version.
    pub old_start: u32,
    /// Number of lines in the old version.
    pub old_lines: u32,
    /// Starting line in the new version.
    pub new_start: u32,
    /// Number of lines in the new version.
    pub new_lines: u32,
    /// Hunk body, one prefixed line per row.
    pub content: String,
}

impl DiffHunk {
    /// Changed lines of this hunk.
    ///
    /// Added lines carry their new-side number, removed lines their old-side
    /// number; context lines advance both counters.
    pub fn modified_lines(&self) -> impl Iterator<Item = ModifiedLine> + '_ {
        let mut old = self.old_start;
        let mut new = self.new_start;
        self.content.lines().filter_map(move |line| {
            if line.starts_with('+') {
                new += 1;
                Some(ModifiedLine::added(new - 1))
            } else if line.starts_with('-') {
                old += 1;
                Some(ModifiedLine::removed(old - 1))
            } else {
                old += 1;
                new += 1;
                None
            }
        })
    }
}

/// A complete diff for a single file, containing one or more hunks.
///
/// # Examples
///
/// ```
/// use mergescope_lines::parser::parse_unified_diff;
///
/// let diff = "diff --git a/Hello.java b/Hello.java\n\
///             --- a/Hello.java\n\
///             +++ b/Hello.java\n\
///             @@ -1,3 +1,4 @@\n\
///              class Hello {\n\
///             +    int x;\n\
///              }\n";
/// let files = parse_unified_diff(diff).unwrap();
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].hunks.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FileDiff {
    /// Path in the old version.
    pub old_path: PathBuf,
    /// Path in the new version.
    pub new_path: PathBuf,
    /// Parsed hunks for this file.
    pub hunks: Vec<DiffHunk>,
    /// Whether this is a newly created file.
    pub is_new_file: bool,
    /// Whether this file was deleted.
    pub is_deleted_file: bool,
    /// Whether this file was renamed.
    pub is_rename: bool,
}

impl FileDiff {
    fn empty() -> Self {
        Self {
            old_path: PathBuf::new(),
            new_path: PathBuf::new(),
            hunks: Vec::new(),
            is_new_file: false,
            is_deleted_file: false,
            is_rename: false,
        }
    }

    /// The path that still exists after the change (old path for deletions).
    pub fn path(&self) -> &Path {
        if self.is_deleted_file {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    /// All changed lines of the file.
    pub fn modified_lines(&self) -> BTreeSet<ModifiedLine> {
        self.hunks.iter().flat_map(DiffHunk::modified_lines).collect()
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} hunks)",
            self.path().display(),
            self.hunks.len()
        )
    }
}

/// Parse a unified diff string (as produced by `git diff`) into structured [`FileDiff`] entries.
///
/// Handles standard unified diff format including new files, deleted files,
/// renamed files, and binary files (which are skipped).
///
/// # Errors
///
/// Returns [`MergeScopeError::Parse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use mergescope_lines::parser::parse_unified_diff;
///
/// let files = parse_unified_diff("").unwrap();
/// assert!(files.is_empty());
/// ```
pub fn parse_unified_diff(input: &str) -> Result<Vec<FileDiff>, MergeScopeError> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut current_hunk: Option<OpenHunk> = None;
    let mut is_binary = false;

    for line in input.lines() {
        if line.starts_with("diff --git ") {
            flush_hunk(&mut current, &mut current_hunk);
            if let Some(file) = current.take() {
                if !is_binary {
                    files.push(file);
                }
            }
            is_binary = false;
            current = Some(FileDiff::empty());
            continue;
        }

        // A bare patch has no "diff --git" line; start the file at its header.
        if line.starts_with("--- ") && current_hunk.is_none() {
            match current.as_ref() {
                None => current = Some(FileDiff::empty()),
                Some(file) if !file.hunks.is_empty() => {
                    if let Some(done) = current.take() {
                        files.push(done);
                    }
                    current = Some(FileDiff::empty());
                }
                Some(_) => {}
            }
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            is_binary = true;
            continue;
        }

        if current_hunk.is_none() {
            if line.starts_with("new file mode") {
                file.is_new_file = true;
                continue;
            }

            if line.starts_with("deleted file mode") {
                file.is_deleted_file = true;
                continue;
            }

            if line.starts_with("rename from ") || line.starts_with("rename to ") {
                file.is_rename = true;
                continue;
            }

            if line.starts_with("index ") || line.starts_with("similarity index") {
                continue;
            }

            if let Some(path) = line.strip_prefix("--- ") {
                file.old_path = parse_path(path);
                if path == "/dev/null" {
                    file.is_new_file = true;
                }
                continue;
            }

            if let Some(path) = line.strip_prefix("+++ ") {
                file.new_path = parse_path(path);
                if path == "/dev/null" {
                    file.is_deleted_file = true;
                }
                continue;
            }
        }

        if line.starts_with("@@ ") {
            flush_hunk(&mut current, &mut current_hunk);
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            current_hunk = Some(OpenHunk::new(DiffHunk {
                old_start,
                old_lines,
                new_start,
                new_lines,
                content: String::new(),
            }));
            continue;
        }

        if line == "\\ No newline at end of file" {
            continue;
        }

        if let Some(hunk) = current_hunk.as_mut() {
            if line.starts_with('+') || line.starts_with('-') || line.starts_with(' ') {
                hunk.push(line);
            } else if line.is_empty() {
                // some tools strip the space of blank context lines
                hunk.push(" ");
            }
            if hunk.is_complete() {
                flush_hunk(&mut current, &mut current_hunk);
            }
        }
    }

    flush_hunk(&mut current, &mut current_hunk);
    if let Some(file) = current.take() {
        if !is_binary {
            files.push(file);
        }
    }

    Ok(files)
}

/// Hunk being filled, with per-side line counts kept as rows arrive.
struct OpenHunk {
    hunk: DiffHunk,
    old_seen: u32,
    new_seen: u32,
}

impl OpenHunk {
    fn new(hunk: DiffHunk) -> Self {
        Self {
            hunk,
            old_seen: 0,
            new_seen: 0,
        }
    }

    fn push(&mut self, line: &str) {
        match line.as_bytes().first() {
            Some(b'+') => self.new_seen += 1,
            Some(b'-') => self.old_seen += 1,
            _ => {
                self.old_seen += 1;
                self.new_seen += 1;
            }
        }
        self.hunk.content.push_str(line);
        self.hunk.content.push('\n');
    }

    fn is_complete(&self) -> bool {
        self.old_seen >= self.hunk.old_lines && self.new_seen >= self.hunk.new_lines
    }
}

fn flush_hunk(current: &mut Option<FileDiff>, hunk: &mut Option<OpenHunk>) {
    if let Some(open) = hunk.take() {
        if let Some(file) = current.as_mut() {
            file.hunks.push(open.hunk);
        }
    }
}

fn parse_path(raw: &str) -> PathBuf {
    // git appends a tab and timestamp in some modes
    let raw = raw.split('\t').next().unwrap_or(raw);
    let normalized = raw.trim_matches('"');

    if normalized == "/dev/null" {
        return PathBuf::from("/dev/null");
    }

    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);

    PathBuf::from(stripped)
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), MergeScopeError> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(|| MergeScopeError::Parse(format!("invalid hunk header: {line}")))?;

    let parts: Vec<&str> = inner.split(' ').collect();
    if parts.len() != 2 {
        return Err(MergeScopeError::Parse(format!("invalid hunk header: {line}")));
    }

    let old = parts[0]
        .strip_prefix('-')
        .ok_or_else(|| MergeScopeError::Parse(format!("invalid old range in hunk: {line}")))?;
    let new = parts[1]
        .strip_prefix('+')
        .ok_or_else(|| MergeScopeError::Parse(format!("invalid new range in hunk: {line}")))?;

    let (old_start, old_lines) = parse_range(old, line)?;
    let (new_start, new_lines) = parse_range(new, line)?;
    if (old_start == 0 && old_lines > 0) || (new_start == 0 && new_lines > 0) {
        return Err(MergeScopeError::Parse(format!("hunk lines start at 1: {line}")));
    }

    Ok((old_start, old_lines, new_start, new_lines))
}

fn parse_range(range: &str, context: &str) -> Result<(u32, u32), MergeScopeError> {
    let number = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| MergeScopeError::Parse(format!("invalid range in: {context}")))
    };
    match range.split_once(',') {
        Some((start, count)) => Ok((number(start)?, number(count)?)),
        None => Ok((number(range)?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_diff_returns_empty_vec() {
        let files = parse_unified_diff("").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn single_file_single_hunk() {
        let diff = "\
diff --git a/src/Main.java b/src/Main.java
index abc1234..def5678 100644
--- a/src/Main.java
+++ b/src/Main.java
@@ -1,3 +1,4 @@
 class Main {
+    int x = 1;
     void run() {}
 }
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].new_path, PathBuf::from("src/Main.java"));
        assert_eq!(files[0].hunks.len(), 1);
        assert_eq!(files[0].hunks[0].old_start, 1);
        assert_eq!(files[0].hunks[0].old_lines, 3);
        assert_eq!(files[0].hunks[0].new_start, 1);
        assert_eq!(files[0].hunks[0].new_lines, 4);
        assert_eq!(
            files[0].modified_lines(),
            BTreeSet::from([ModifiedLine::added(2)])
        );
    }

    #[test]
    fn line_numbers_follow_each_side() {
        let diff = "\
--- a/A.java
+++ b/A.java
@@ -10,4 +10,4 @@
 a
-b
-c
+B
+C
 d
@@ -30,2 +30,3 @@
 x
+y
 z
";
        let files = parse_unified_diff(diff).unwrap();
        let lines = files[0].modified_lines();
        assert_eq!(
            lines,
            BTreeSet::from([
                ModifiedLine::removed(11),
                ModifiedLine::removed(12),
                ModifiedLine::added(11),
                ModifiedLine::added(12),
                ModifiedLine::added(31),
            ])
        );
    }

    #[test]
    fn multiple_files() {
        let diff = "\
diff --git a/a.java b/a.java
--- a/a.java
+++ b/a.java
@@ -1 +1,2 @@
 line1
+line2
diff --git a/b.java b/b.java
--- a/b.java
+++ b/b.java
@@ -1 +1,2 @@
 line1
+line2
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].new_path, PathBuf::from("a.java"));
        assert_eq!(files[1].new_path, PathBuf::from("b.java"));
    }

    #[test]
    fn new_file() {
        let diff = "\
diff --git a/New.java b/New.java
new file mode 100644
--- /dev/null
+++ b/New.java
@@ -0,0 +1,3 @@
+class New {
+    void hello() {}
+}
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].is_new_file);
        assert_eq!(files[0].old_path, PathBuf::from("/dev/null"));
        assert_eq!(files[0].path(), Path::new("New.java"));
        assert_eq!(files[0].modified_lines().len(), 3);
    }

    #[test]
    fn deleted_file() {
        let diff = "\
diff --git a/Old.java b/Old.java
deleted file mode 100644
--- a/Old.java
+++ /dev/null
@@ -1,3 +0,0 @@
-class Old {
-    void bye() {}
-}
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].is_deleted_file);
        assert_eq!(files[0].path(), Path::new("Old.java"));
        assert!(files[0]
            .modified_lines()
            .iter()
            .all(|l| l.kind == mergescope_core::LineKind::Removed));
    }

    #[test]
    fn renamed_file() {
        let diff = "\
diff --git a/Old.java b/New.java
similarity index 100%
rename from Old.java
rename to New.java
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].is_rename);
    }

    #[test]
    fn removed_line_starting_with_dashes_is_content() {
        let diff = "\
--- a/notes.txt
+++ b/notes.txt
@@ -1,2 +1,1 @@
--- heading
 body
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(
            files[0].modified_lines(),
            BTreeSet::from([ModifiedLine::removed(1)])
        );
    }

    #[test]
    fn binary_files_skipped() {
        let diff = "\
diff --git a/image.png b/image.png
Binary files a/image.png and b/image.png differ
diff --git a/Code.java b/Code.java
--- a/Code.java
+++ b/Code.java
@@ -1 +1,2 @@
 line1
+line2
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].new_path, PathBuf::from("Code.java"));
    }

    #[test]
    fn no_newline_at_eof_handled() {
        let diff = "\
diff --git a/F.java b/F.java
--- a/F.java
+++ b/F.java
@@ -1 +1 @@
-old
\\ No newline at end of file
+new
\\ No newline at end of file
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        let content = &files[0].hunks[0].content;
        assert!(!content.contains("No newline"));
        assert_eq!(
            files[0].modified_lines(),
            BTreeSet::from([ModifiedLine::removed(1), ModifiedLine::added(1)])
        );
    }

    #[test]
    fn malformed_hunk_header_is_an_error() {
        let diff = "--- a/x\n+++ b/x\n@@ -a +1 @@\n";
        assert!(matches!(
            parse_unified_diff(diff),
            Err(MergeScopeError::Parse(_))
        ));
    }

    #[test]
    fn zero_start_with_lines_is_an_error() {
        let diff = "--- a/x\n+++ b/x\n@@ -0,1 +0,1 @@\n-a\n+b\n";
        assert!(matches!(
            parse_unified_diff(diff),
            Err(MergeScopeError::Parse(_))
        ));
    }

    #[test]
    fn open_hunk_counts_each_side() {
        let mut open = OpenHunk::new(DiffHunk {
            old_start: 1,
            old_lines: 2,
            new_start: 1,
            new_lines: 3,
            content: String::new(),
        });
        open.push(" a");
        open.push("+b");
        assert!(!open.is_complete());
        assert_eq!((open.old_seen, open.new_seen), (1, 2));
        open.push("-c");
        assert!(!open.is_complete());
        open.push("+d");
        assert!(open.is_complete());
        assert_eq!(open.hunk.content, " a\n+b\n-c\n+d\n");
    }

    #[test]
    fn large_hunk_ends_at_its_declared_length() {
        let count = 20_000;
        let mut diff = format!("--- a/Big.java\n+++ b/Big.java\n@@ -0,0 +1,{count} @@\n");
        for i in 0..count {
            diff.push_str(&format!("+line {i}\n"));
        }
        // trailing text after a full hunk is not hunk content
        diff.push_str("+stray\n");
        let files = parse_unified_diff(&diff).unwrap();
        assert_eq!(files[0].hunks.len(), 1);
        let lines = files[0].modified_lines();
        assert_eq!(lines.len(), count);
        assert!(lines.contains(&ModifiedLine::added(count as u32)));
        assert!(!files[0].hunks[0].content.contains("stray"));
    }

    #[test]
    fn parse_path_handles_quoted_paths() {
        assert_eq!(parse_path("\"a/src/my file.java\""), PathBuf::from("src/my file.java"));
        assert_eq!(parse_path("b/src/A.java\t2024-01-01"), PathBuf::from("src/A.java"));
    }
}
