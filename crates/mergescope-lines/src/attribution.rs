use mergescope_core::{AttributedLines, LineKind, ModifiedMethod};
use tracing::warn;

/// Attribute the changed lines of a merged method to the merge parents.
///
/// `left` and `right` are the same method as changed by each parent
/// relative to the common ancestor. A merged line goes to a side when that
/// side's line set holds the same number *and* kind; it may go to both
/// sides, or to neither (changes introduced by the merge itself are
/// dropped).
///
/// # Examples
///
/// ```
/// use mergescope_core::{ModifiedLine, ModifiedMethod};
/// use mergescope_lines::attribute;
///
/// let sig = "a.A.f()".parse().unwrap();
/// let merged =
///     ModifiedMethod::with_lines(sig, [ModifiedLine::added(10), ModifiedLine::removed(12)]);
/// let left = ModifiedMethod::with_lines(merged.signature.clone(), [ModifiedLine::added(10)]);
/// let right = ModifiedMethod::with_lines(merged.signature.clone(), [ModifiedLine::removed(12)]);
///
/// let result = attribute(&merged, &left, &right);
/// assert_eq!(result.left_added.into_iter().collect::<Vec<_>>(), vec![10]);
/// assert_eq!(result.right_deleted.into_iter().collect::<Vec<_>>(), vec![12]);
/// ```
pub fn attribute(
    merged: &ModifiedMethod,
    left: &ModifiedMethod,
    right: &ModifiedMethod,
) -> AttributedLines {
    if merged != left || merged != right {
        warn!(
            merged = %merged.signature,
            left = %left.signature,
            right = %right.signature,
            "attributing lines across different methods"
        );
    }

    let mut result = AttributedLines::default();
    for line in &merged.lines {
        if left.lines.contains(line) {
            match line.kind {
                LineKind::Removed => result.left_deleted.insert(line.number),
                LineKind::Added => result.left_added.insert(line.number),
            };
        }
        if right.lines.contains(line) {
            match line.kind {
                LineKind::Removed => result.right_deleted.insert(line.number),
                LineKind::Added => result.right_added.insert(line.number),
            };
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use mergescope_core::{MethodSignature, ModifiedLine};

    use super::*;

    fn method(lines: &[ModifiedLine]) -> ModifiedMethod {
        let sig: MethodSignature = "app.Service.handle(int)".parse().unwrap();
        ModifiedMethod::with_lines(sig, lines.iter().copied())
    }

    #[test]
    fn lines_split_between_parents() {
        let result = attribute(
            &method(&[ModifiedLine::added(10), ModifiedLine::removed(12)]),
            &method(&[ModifiedLine::added(10)]),
            &method(&[ModifiedLine::removed(12)]),
        );
        assert_eq!(result.left_added, BTreeSet::from([10]));
        assert!(result.left_deleted.is_empty());
        assert!(result.right_added.is_empty());
        assert_eq!(result.right_deleted, BTreeSet::from([12]));
    }

    #[test]
    fn same_change_on_both_sides_overlaps() {
        let result = attribute(
            &method(&[ModifiedLine::added(5)]),
            &method(&[ModifiedLine::added(5)]),
            &method(&[ModifiedLine::added(5)]),
        );
        assert_eq!(result.left_added, BTreeSet::from([5]));
        assert_eq!(result.right_added, BTreeSet::from([5]));
        assert_eq!(result.overlapping(), BTreeSet::from([5]));
    }

    #[test]
    fn untraceable_line_is_dropped() {
        let result = attribute(
            &method(&[ModifiedLine::added(7)]),
            &method(&[]),
            &method(&[]),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn kind_must_match() {
        let result = attribute(
            &method(&[ModifiedLine::added(3)]),
            &method(&[ModifiedLine::removed(3)]),
            &method(&[ModifiedLine::removed(3)]),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn parent_only_lines_are_not_reported() {
        let result = attribute(
            &method(&[]),
            &method(&[ModifiedLine::added(1)]),
            &method(&[ModifiedLine::removed(2)]),
        );
        assert!(result.is_empty());
    }
}
