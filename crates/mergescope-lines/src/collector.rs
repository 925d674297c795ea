use std::collections::{BTreeSet, HashMap, HashSet};

use mergescope_core::{
    CollectedMergeMethodData, MergeCommit, MergeScopeError, MethodSignature, ModifiedMethod,
    Project,
};
use tracing::{debug, info};

use crate::attribution::attribute;

/// Mutually modified methods of one file: signature → (left version, right version).
pub type MutuallyModified = HashMap<MethodSignature, (ModifiedMethod, ModifiedMethod)>;

/// Source of textual changes between revisions.
///
/// Implementors supply the three required lookups; the merge-level queries
/// are derived from them.
pub trait DiffCollector {
    /// Paths of files changed between two revisions.
    fn modified_files(&self, from: &str, to: &str) -> Result<BTreeSet<String>, MergeScopeError>;

    /// Methods of `path` changed between two revisions, with their lines.
    fn modified_methods(
        &self,
        path: &str,
        from: &str,
        to: &str,
    ) -> Result<HashSet<ModifiedMethod>, MergeScopeError>;

    /// Fully-qualified name of the type declared by `path` at `revision`.
    fn type_name(&self, path: &str, revision: &str) -> Result<String, MergeScopeError>;

    /// Files changed by either parent relative to the ancestor.
    fn all_modified_files(
        &self,
        commit: &MergeCommit,
    ) -> Result<BTreeSet<String>, MergeScopeError> {
        let mut files = self.modified_files(&commit.ancestor_sha, &commit.left_sha)?;
        files.extend(self.modified_files(&commit.ancestor_sha, &commit.right_sha)?);
        Ok(files)
    }

    /// Files changed by both parents relative to the ancestor.
    fn files_modified_by_both_parents(
        &self,
        commit: &MergeCommit,
    ) -> Result<BTreeSet<String>, MergeScopeError> {
        let left = self.modified_files(&commit.ancestor_sha, &commit.left_sha)?;
        let right = self.modified_files(&commit.ancestor_sha, &commit.right_sha)?;
        Ok(left.intersection(&right).cloned().collect())
    }

    /// Methods of `path` changed by both parents, keyed by signature.
    fn mutually_modified_methods(
        &self,
        commit: &MergeCommit,
        path: &str,
    ) -> Result<MutuallyModified, MergeScopeError> {
        let left = self.modified_methods(path, &commit.ancestor_sha, &commit.left_sha)?;
        let right = self.modified_methods(path, &commit.ancestor_sha, &commit.right_sha)?;
        Ok(left
            .into_iter()
            .filter_map(|l| {
                let r = right.get(&l)?.clone();
                Some((l.signature.clone(), (l, r)))
            })
            .collect())
    }
}

/// Methods changed by the left and by the right parent, over every modified file.
///
/// # Errors
///
/// Propagates collector failures.
pub fn changed_method_sets<C: DiffCollector + ?Sized>(
    collector: &C,
    commit: &MergeCommit,
) -> Result<(HashSet<ModifiedMethod>, HashSet<ModifiedMethod>), MergeScopeError> {
    let mut left = HashSet::new();
    let mut right = HashSet::new();
    for path in collector.all_modified_files(commit)? {
        left.extend(collector.modified_methods(&path, &commit.ancestor_sha, &commit.left_sha)?);
        right.extend(collector.modified_methods(&path, &commit.ancestor_sha, &commit.right_sha)?);
    }
    debug!(left = left.len(), right = right.len(), "changed method sets");
    Ok((left, right))
}

/// Attribution records for every method both parents modified.
///
/// For each file changed by both parents, the methods changed between the
/// ancestor and the merge are matched against the mutually modified
/// methods of that file; each match is attributed line by line.
///
/// # Errors
///
/// Propagates collector failures.
pub fn collect_merge_method_data<C: DiffCollector + ?Sized>(
    collector: &C,
    project: &Project,
    commit: &MergeCommit,
) -> Result<Vec<CollectedMergeMethodData>, MergeScopeError> {
    let mut records = Vec::new();

    for path in collector.files_modified_by_both_parents(commit)? {
        let mutual = collector.mutually_modified_methods(commit, &path)?;
        if mutual.is_empty() {
            continue;
        }

        let class_name = collector.type_name(&path, &commit.ancestor_sha)?;
        let mut merged: Vec<ModifiedMethod> = collector
            .modified_methods(&path, &commit.ancestor_sha, &commit.merge_sha)?
            .into_iter()
            .collect();
        merged.sort_by(|a, b| a.signature.cmp(&b.signature));

        for method in merged {
            let Some((left, right)) = mutual.get(&method.signature) else {
                continue;
            };
            let lines = attribute(&method, left, right);
            debug!(method = %method.signature, ?lines, "attributed");
            records.push(CollectedMergeMethodData::new(
                project.clone(),
                commit.clone(),
                class_name.clone(),
                method.signature,
                lines,
            ));
        }
    }

    info!(project = %project.name, records = records.len(), "line collection finished");
    Ok(records)
}
