use std::collections::{BTreeMap, BTreeSet, HashSet};

use mergescope_core::{LineKind, MethodSignature, ModifiedLine, ModifiedMethod};
use serde::{Deserialize, Serialize};

/// Source range of a method body, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpan {
    /// The method occupying the range.
    pub signature: MethodSignature,
    /// First line (1-based).
    pub start: u32,
    /// Last line.
    pub end: u32,
}

impl MethodSpan {
    /// Returns `true` if `line` falls inside the span.
    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }

    fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// Group changed lines by the method they fall in.
///
/// Added lines are located in `new_spans` (the newer revision), removed
/// lines in `old_spans`. A line inside nested spans goes to the innermost
/// one; lines outside every span are ignored.
///
/// # Examples
///
/// ```
/// use mergescope_core::ModifiedLine;
/// use mergescope_lines::{methods_touched, MethodSpan};
///
/// let span = MethodSpan { signature: "a.A.f()".parse().unwrap(), start: 3, end: 9 };
/// let lines = [ModifiedLine::added(4), ModifiedLine::added(20)].into();
/// let touched = methods_touched(&[span.clone()], &[span], &lines);
/// assert_eq!(touched.len(), 1);
/// assert_eq!(touched.iter().next().unwrap().lines.len(), 1);
/// ```
pub fn methods_touched(
    old_spans: &[MethodSpan],
    new_spans: &[MethodSpan],
    lines: &BTreeSet<ModifiedLine>,
) -> HashSet<ModifiedMethod> {
    let mut grouped: BTreeMap<&MethodSignature, BTreeSet<ModifiedLine>> = BTreeMap::new();
    for line in lines {
        let spans = match line.kind {
            LineKind::Added => new_spans,
            LineKind::Removed => old_spans,
        };
        let innermost = spans
            .iter()
            .filter(|s| s.contains(line.number))
            .min_by_key(|s| s.len());
        if let Some(span) = innermost {
            grouped.entry(&span.signature).or_default().insert(*line);
        }
    }
    grouped
        .into_iter()
        .map(|(sig, lines)| ModifiedMethod::with_lines(sig.clone(), lines))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(sig: &str, start: u32, end: u32) -> MethodSpan {
        MethodSpan {
            signature: sig.parse().unwrap(),
            start,
            end,
        }
    }

    #[test]
    fn removed_lines_use_old_spans() {
        let old = [span("a.A.f()", 1, 5)];
        let new = [span("a.A.g()", 1, 5)];
        let lines = BTreeSet::from([ModifiedLine::removed(2), ModifiedLine::added(3)]);
        let touched = methods_touched(&old, &new, &lines);
        let f = touched.get(&ModifiedMethod::new("a.A.f()".parse().unwrap())).unwrap();
        let g = touched.get(&ModifiedMethod::new("a.A.g()".parse().unwrap())).unwrap();
        assert_eq!(f.lines, BTreeSet::from([ModifiedLine::removed(2)]));
        assert_eq!(g.lines, BTreeSet::from([ModifiedLine::added(3)]));
    }

    #[test]
    fn innermost_span_wins() {
        let spans = [span("a.A.outer()", 1, 20), span("a.A$1.run()", 5, 8)];
        let lines = BTreeSet::from([ModifiedLine::added(6), ModifiedLine::added(12)]);
        let touched = methods_touched(&spans, &spans, &lines);
        assert_eq!(touched.len(), 2);
        let inner = touched
            .get(&ModifiedMethod::new("a.A$1.run()".parse().unwrap()))
            .unwrap();
        assert_eq!(inner.lines, BTreeSet::from([ModifiedLine::added(6)]));
    }

    #[test]
    fn lines_outside_methods_are_ignored() {
        let spans = [span("a.A.f()", 10, 12)];
        let lines = BTreeSet::from([ModifiedLine::added(1)]);
        assert!(methods_touched(&spans, &spans, &lines).is_empty());
    }
}
