//! Revision diffs and merge resolution via git2.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use git2::{DiffFormat, DiffOptions, Repository, Tree};
use mergescope_core::{MergeCommit, MergeScopeError, ModifiedMethod};
use mergescope_lines::{methods_touched, parse_unified_diff, DiffCollector, FileDiff, MethodSpan};
use tracing::debug;

use crate::locator::MethodLocator;

fn git_err(context: &str) -> impl Fn(git2::Error) -> MergeScopeError + '_ {
    move |e| MergeScopeError::Git(format!("{context}: {e}"))
}

/// Open the repository at `path`.
///
/// # Errors
///
/// Returns [`MergeScopeError::Git`] if `path` is not a git repository.
pub fn open_repository(path: &Path) -> Result<Repository, MergeScopeError> {
    Repository::open(path).map_err(git_err("failed to open repository"))
}

/// Resolve the four revisions of the merge at `merge_rev`.
///
/// The left and right parents are the merge's first and second parents; the
/// ancestor is their merge base.
///
/// # Errors
///
/// Returns [`MergeScopeError::Git`] if the revision is not found, is not a
/// two-parent merge, or its parents share no history.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use mergescope_git::{open_repository, resolve_merge_commit};
///
/// let repo = open_repository(Path::new(".")).unwrap();
/// let commit = resolve_merge_commit(&repo, "HEAD").unwrap();
/// println!("{commit}");
/// ```
pub fn resolve_merge_commit(
    repo: &Repository,
    merge_rev: &str,
) -> Result<MergeCommit, MergeScopeError> {
    let merge = repo
        .revparse_single(merge_rev)
        .and_then(|obj| obj.peel_to_commit())
        .map_err(git_err("failed to resolve merge revision"))?;

    if merge.parent_count() != 2 {
        return Err(MergeScopeError::Git(format!(
            "{merge_rev} has {} parents, expected a two-parent merge",
            merge.parent_count()
        )));
    }

    let left = merge.parent_id(0).map_err(git_err("failed to get left parent"))?;
    let right = merge.parent_id(1).map_err(git_err("failed to get right parent"))?;
    let base = repo
        .merge_base(left, right)
        .map_err(git_err("failed to find merge base"))?;

    Ok(MergeCommit {
        ancestor_sha: base.to_string(),
        left_sha: left.to_string(),
        right_sha: right.to_string(),
        merge_sha: merge.id().to_string(),
    })
}

fn tree_of<'r>(repo: &'r Repository, rev: &str) -> Result<Tree<'r>, MergeScopeError> {
    repo.revparse_single(rev)
        .and_then(|obj| obj.peel_to_tree())
        .map_err(|e| MergeScopeError::Git(format!("failed to resolve tree of {rev}: {e}")))
}

fn diff_trees<'r>(
    repo: &'r Repository,
    from: &str,
    to: &str,
    path: Option<&str>,
) -> Result<git2::Diff<'r>, MergeScopeError> {
    let old = tree_of(repo, from)?;
    let new = tree_of(repo, to)?;
    let mut opts = DiffOptions::new();
    if let Some(path) = path {
        opts.pathspec(path).disable_pathspec_match(true);
    }
    repo.diff_tree_to_tree(Some(&old), Some(&new), Some(&mut opts))
        .map_err(git_err("failed to compute diff"))
}

/// Paths of files changed between two revisions.
///
/// Deleted files are reported under their old path.
///
/// # Errors
///
/// Returns [`MergeScopeError::Git`] if either revision cannot be resolved.
pub fn modified_files(
    repo: &Repository,
    from: &str,
    to: &str,
) -> Result<BTreeSet<String>, MergeScopeError> {
    let diff = diff_trees(repo, from, to, None)?;
    let files = diff
        .deltas()
        .filter_map(|delta| {
            delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().to_string())
        })
        .filter(|p| !p.is_empty())
        .collect();
    Ok(files)
}

/// Files changed by both parents of `commit` relative to its ancestor.
///
/// # Errors
///
/// Returns [`MergeScopeError::Git`] if a revision cannot be resolved.
pub fn files_modified_by_both_parents(
    repo: &Repository,
    commit: &MergeCommit,
) -> Result<BTreeSet<String>, MergeScopeError> {
    let left = modified_files(repo, &commit.ancestor_sha, &commit.left_sha)?;
    let right = modified_files(repo, &commit.ancestor_sha, &commit.right_sha)?;
    Ok(left.intersection(&right).cloned().collect())
}

fn render_patch(diff: &git2::Diff<'_>) -> Result<String, MergeScopeError> {
    let mut patch = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        match line.origin() {
            origin @ ('+' | '-' | ' ') => patch.push(origin as u8),
            'F' | 'H' => {}
            // end-of-file newline markers
            _ => return true,
        }
        patch.extend_from_slice(line.content());
        if !patch.ends_with(b"\n") {
            patch.push(b'\n');
        }
        true
    })
    .map_err(git_err("failed to render patch"))?;
    Ok(String::from_utf8_lossy(&patch).into_owned())
}

/// Parsed per-file diffs between two revisions, optionally limited to `path`.
///
/// Binary files are left out.
///
/// # Errors
///
/// Returns [`MergeScopeError::Git`] on git failures and
/// [`MergeScopeError::Parse`] if the rendered patch cannot be parsed.
pub fn file_diffs(
    repo: &Repository,
    from: &str,
    to: &str,
    path: Option<&str>,
) -> Result<Vec<FileDiff>, MergeScopeError> {
    let diff = diff_trees(repo, from, to, path)?;
    let files = parse_unified_diff(&render_patch(&diff)?)?;
    debug!(from, to, files = files.len(), "parsed revision diff");
    Ok(files)
}

/// [`DiffCollector`] over a local git repository.
///
/// Patches are rendered as unified diff text and parsed with
/// [`parse_unified_diff`]; changed lines are assigned to methods found by
/// the `locator` in the old and new file contents.
pub struct GitDiffCollector<L> {
    repo: Repository,
    locator: L,
}

impl<L: MethodLocator> GitDiffCollector<L> {
    /// Open the repository at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::Git`] if `path` is not a git repository.
    pub fn open(path: &Path, locator: L) -> Result<Self, MergeScopeError> {
        Ok(Self::new(open_repository(path)?, locator))
    }

    /// Wrap an already opened repository.
    pub fn new(repo: Repository, locator: L) -> Self {
        Self { repo, locator }
    }

    /// The underlying repository.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Content of `path` at `rev`, or `None` if the file does not exist there.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::Git`] if the revision cannot be resolved or
    /// the path is not a file.
    pub fn file_at(&self, path: &str, rev: &str) -> Result<Option<String>, MergeScopeError> {
        let tree = tree_of(&self.repo, rev)?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(git_err("failed to look up path")(e)),
        };
        let blob = entry
            .to_object(&self.repo)
            .and_then(|obj| obj.peel_to_blob())
            .map_err(git_err("failed to read blob"))?;
        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }

    /// Parsed diff of a single file, or `None` if it did not change.
    ///
    /// # Errors
    ///
    /// Returns [`MergeScopeError::Git`] on git failures and
    /// [`MergeScopeError::Parse`] if the rendered patch cannot be parsed.
    pub fn file_diff(
        &self,
        path: &str,
        from: &str,
        to: &str,
    ) -> Result<Option<FileDiff>, MergeScopeError> {
        let file = file_diffs(&self.repo, from, to, Some(path))?
            .into_iter()
            .find(|f| f.path() == Path::new(path));
        Ok(file)
    }

    fn spans_at(&self, path: &str, rev: &str) -> Result<Vec<MethodSpan>, MergeScopeError> {
        match self.file_at(path, rev)? {
            Some(source) => self.locator.locate(path, &source),
            None => Ok(Vec::new()),
        }
    }
}

impl<L: MethodLocator> DiffCollector for GitDiffCollector<L> {
    fn modified_files(&self, from: &str, to: &str) -> Result<BTreeSet<String>, MergeScopeError> {
        modified_files(&self.repo, from, to)
    }

    fn modified_methods(
        &self,
        path: &str,
        from: &str,
        to: &str,
    ) -> Result<HashSet<ModifiedMethod>, MergeScopeError> {
        let Some(file) = self.file_diff(path, from, to)? else {
            return Ok(HashSet::new());
        };
        let old_spans = self.spans_at(path, from)?;
        let new_spans = self.spans_at(path, to)?;
        let methods = methods_touched(&old_spans, &new_spans, &file.modified_lines());
        debug!(path, from, to, methods = methods.len(), "modified methods");
        Ok(methods)
    }

    fn type_name(&self, path: &str, revision: &str) -> Result<String, MergeScopeError> {
        let source = self.file_at(path, revision)?;
        self.locator.type_name(path, source.as_deref())
    }
}
