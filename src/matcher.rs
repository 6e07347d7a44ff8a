/*!
Greedy overlap matching of two span sets. Each span of the first set is paired with the unused
span of the second set it overlaps the most, as long as that overlap reaches the threshold.
*/
use crate::entity::{AnnotatedDocument, Properties, SpanLike};
use crate::metrics::MatchCounts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

/// Which properties two spans must agree on to be matched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PropertyFilter {
    /// Properties play no role.
    #[default]
    Ignore,
    /// Every listed key must hold the same value on both spans.
    Only(BTreeSet<String>),
    /// Every key present on either span must hold the same value on both spans.
    All,
}

impl PropertyFilter {
    /// Builds an `Only` filter from any list of keys.
    pub fn only<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PropertyFilter::Only(keys.into_iter().map(Into::into).collect())
    }

    /// Do both property maps agree under this filter? A span without properties is read as an
    /// empty map and a missing key as the empty string.
    pub fn agrees(&self, left: Option<&Properties>, right: Option<&Properties>) -> bool {
        let empty = Properties::default();
        let left = left.unwrap_or(&empty);
        let right = right.unwrap_or(&empty);
        match self {
            PropertyFilter::Ignore => true,
            PropertyFilter::Only(keys) => keys.iter().all(|k| left.agrees_on(right, k)),
            PropertyFilter::All => left.equivalent(right),
        }
    }
}

impl Display for PropertyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyFilter::Ignore => write!(f, "ignored"),
            PropertyFilter::All => write!(f, "all"),
            PropertyFilter::Only(keys) => {
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                write!(f, "only [{}]", keys.join(", "))
            }
        }
    }
}

/// Outcome of matching a span set A against a span set B. A is read as the prediction and B as
/// the reference: unmatched A-spans are false positives, unmatched B-spans false negatives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub true_positives: usize,
    pub total_a: usize,
    pub total_b: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl MatchResult {
    /// Computes the ratios from the raw totals. `true_positives` must not exceed either total.
    pub fn new(true_positives: usize, total_a: usize, total_b: usize) -> Self {
        let counts = MatchCounts::new(
            true_positives,
            total_a.saturating_sub(true_positives),
            total_b.saturating_sub(true_positives),
        );
        MatchResult {
            true_positives,
            total_a,
            total_b,
            precision: counts.precision(),
            recall: counts.recall(),
            f1: counts.f1(),
        }
    }

    pub fn false_positives(&self) -> usize {
        self.total_a - self.true_positives
    }

    pub fn false_negatives(&self) -> usize {
        self.total_b - self.true_positives
    }

    pub fn counts(&self) -> MatchCounts {
        MatchCounts::new(
            self.true_positives,
            self.false_positives(),
            self.false_negatives(),
        )
    }

    /// The same comparison with A and B exchanged.
    pub fn swapped(&self) -> Self {
        MatchResult::new(self.true_positives, self.total_b, self.total_a)
    }
}

impl From<MatchCounts> for MatchResult {
    fn from(value: MatchCounts) -> Self {
        MatchResult::new(
            value.true_positives,
            value.true_positives + value.false_positives,
            value.true_positives + value.false_negatives,
        )
    }
}

impl Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {}",
            self.precision,
            self.recall,
            self.f1,
            self.true_positives,
            self.false_positives(),
            self.false_negatives()
        )
    }
}

/// Intersection over union of two `[start, end)` intervals. Returns 0 when the union is empty.
///
/// #Example
/// ```rust
/// use deidrev::{calculate_overlap, Span};
///
/// let a = Span::new("DATE", "", 0, 10, 1.0);
/// let b = Span::new("DATE", "", 5, 15, 1.0);
/// assert!((calculate_overlap(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn calculate_overlap<A: SpanLike, B: SpanLike>(a: &A, b: &B) -> f64 {
    let intersection = a
        .end()
        .min(b.end())
        .saturating_sub(a.start().max(b.start()));
    let len_a = a.end().saturating_sub(a.start());
    let len_b = b.end().saturating_sub(b.start());
    let union = len_a + len_b - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[inline]
fn eligible<A: SpanLike, B: SpanLike>(a: &A, b: &B, filter: &PropertyFilter) -> bool {
    a.label() == b.label() && filter.agrees(a.properties(), b.properties())
}

/// Greedily matches `a` against `b`.
///
/// Spans of `a` are visited in order. Each one scans the unused spans of `b`, in order, and keeps
/// the eligible candidate with the strictly greatest overlap, so the first one found wins ties.
/// The candidate is matched when its overlap is at least `threshold`. A candidate with no overlap
/// is never matched.
///
/// * `threshold`: Minimum IoU, expected in `[0, 1]`.
/// * `filter`: Which properties must agree on top of the label.
pub fn score_spans<A: SpanLike, B: SpanLike>(
    a: &[A],
    b: &[B],
    threshold: f64,
    filter: &PropertyFilter,
) -> MatchResult {
    let mut used = vec![false; b.len()];
    let mut true_positives = 0;
    for span_a in a {
        let mut best: Option<(usize, f64)> = None;
        for (j, span_b) in b.iter().enumerate() {
            if used[j] || !eligible(span_a, span_b, filter) {
                continue;
            }
            let overlap = calculate_overlap(span_a, span_b);
            if overlap > best.map_or(0.0, |(_, o)| o) {
                best = Some((j, overlap));
            }
        }
        if let Some((j, overlap)) = best {
            if overlap >= threshold {
                used[j] = true;
                true_positives += 1;
            }
        }
    }
    MatchResult::new(true_positives, a.len(), b.len())
}

/// Scores the spans of two annotators on the same file.
///
/// #Example
/// ```rust
/// use deidrev::{score_pair, AnnotatedDocument, AnnotatedSpan, PropertyFilter};
///
/// let a = AnnotatedDocument::new("a", "", vec![AnnotatedSpan::new("DATE", "", 0, 10)]);
/// let b = AnnotatedDocument::new("b", "", vec![AnnotatedSpan::new("DATE", "", 2, 10)]);
/// let result = score_pair(&a, &b, 0.5, &PropertyFilter::Ignore);
/// assert_eq!(result.true_positives, 1);
/// assert_eq!(result.f1, 1.0);
/// ```
pub fn score_pair(
    a: &AnnotatedDocument,
    b: &AnnotatedDocument,
    threshold: f64,
    filter: &PropertyFilter,
) -> MatchResult {
    score_spans(&a.spans, &b.spans, threshold, filter)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::{AnnotatedSpan, Span};
    use quickcheck_macros::quickcheck as quickcheck_test;
    use rstest::rstest;

    fn span(label: &str, start: usize, end: usize) -> AnnotatedSpan {
        AnnotatedSpan::new(label, "", start, end)
    }

    #[rstest]
    #[case((0, 10), (5, 15), 5.0 / 15.0)]
    #[case((0, 10), (0, 10), 1.0)]
    #[case((0, 5), (5, 10), 0.0)]
    #[case((0, 10), (2, 4), 0.2)]
    #[case((3, 3), (3, 3), 0.0)]
    fn test_calculate_overlap(
        #[case] a: (usize, usize),
        #[case] b: (usize, usize),
        #[case] expected: f64,
    ) {
        let overlap = calculate_overlap(&span("X", a.0, a.1), &span("X", b.0, b.1));
        assert!((overlap - expected).abs() < 1e-12);
    }

    #[test]
    fn test_overlap_between_grouper_and_annotation_spans() {
        let predicted = Span::new("DATE", "", 0, 4, 0.9);
        let annotated = span("DATE", 0, 8);
        assert_eq!(calculate_overlap(&predicted, &annotated), 0.5);
    }

    #[test]
    fn test_partial_match_counts() {
        // A = {[0,10), [20,30)}, B = {[5,15)}: IoU 1/3 is below 0.5.
        let a = [span("DATE", 0, 10), span("DATE", 20, 30)];
        let b = [span("DATE", 5, 15)];
        let result = score_spans(&a, &b, 0.5, &PropertyFilter::Ignore);
        assert_eq!(result.true_positives, 0);
        assert_eq!(result.false_positives(), 2);
        assert_eq!(result.false_negatives(), 1);
        assert_eq!(result.f1, 0.0);

        let result = score_spans(&a, &b, 0.3, &PropertyFilter::Ignore);
        assert_eq!(result.counts(), MatchCounts::new(1, 1, 0));
        assert!((result.precision - 0.5).abs() < 1e-12);
        assert_eq!(result.recall, 1.0);
    }

    #[test]
    fn test_labels_must_match() {
        let a = [span("DATE", 0, 10)];
        let b = [span("AGE", 0, 10)];
        let result = score_spans(&a, &b, 0.1, &PropertyFilter::Ignore);
        assert_eq!(result.counts(), MatchCounts::new(0, 1, 1));
    }

    #[test]
    fn test_first_candidate_wins_ties() {
        let a = [span("X", 0, 10), span("X", 0, 10)];
        let b = [span("X", 5, 15), span("X", 5, 15)];
        let result = score_spans(&a, &b, 0.3, &PropertyFilter::Ignore);
        assert_eq!(result.true_positives, 2);
    }

    #[test]
    fn test_greedy_is_order_dependent() {
        // The first A-span takes the B-span the second one needed.
        let a = [span("X", 0, 10), span("X", 0, 4)];
        let b = [span("X", 0, 5), span("X", 6, 10)];
        let result = score_spans(&a, &b, 0.5, &PropertyFilter::Ignore);
        assert_eq!(result.true_positives, 1);
    }

    #[test]
    fn test_zero_overlap_never_matches() {
        let a = [span("X", 0, 5)];
        let b = [span("X", 5, 10)];
        let result = score_spans(&a, &b, 0.0, &PropertyFilter::Ignore);
        assert_eq!(result.true_positives, 0);
    }

    #[test]
    fn test_empty_sets_agree() {
        let empty: [AnnotatedSpan; 0] = [];
        let result = score_spans(&empty, &empty, 0.5, &PropertyFilter::Ignore);
        assert_eq!((result.precision, result.recall, result.f1), (1.0, 1.0, 1.0));
        let one = [span("X", 0, 5)];
        let result = score_spans(&one, &empty, 0.5, &PropertyFilter::Ignore);
        assert_eq!((result.precision, result.recall, result.f1), (0.0, 1.0, 0.0));
    }

    #[test]
    fn test_property_filter() {
        let a = [span("DOCTOR", 0, 5).with_property("TYPE", "DOCTOR")];
        let b = [span("DOCTOR", 0, 5).with_property("TYPE", "NURSE")];
        let ignore = score_spans(&a, &b, 0.5, &PropertyFilter::Ignore);
        assert_eq!(ignore.true_positives, 1);
        let only = score_spans(&a, &b, 0.5, &PropertyFilter::only(["TYPE"]));
        assert_eq!(only.true_positives, 0);
        let other_key = score_spans(&a, &b, 0.5, &PropertyFilter::only(["COMMENT"]));
        assert_eq!(other_key.true_positives, 1);
        let all = score_spans(&a, &b, 0.5, &PropertyFilter::All);
        assert_eq!(all.true_positives, 0);
    }

    #[test]
    fn test_missing_property_equals_empty_string() {
        let a = [span("AGE", 0, 2).with_property("COMMENT", "")];
        let b = [span("AGE", 0, 2)];
        let result = score_spans(&a, &b, 0.5, &PropertyFilter::All);
        assert_eq!(result.true_positives, 1);
    }

    #[test]
    fn test_swapped_result() {
        let result = MatchResult::new(1, 3, 2);
        let swapped = result.swapped();
        assert_eq!((swapped.total_a, swapped.total_b), (2, 3));
        assert_eq!(swapped.precision, result.recall);
        assert_eq!(swapped.recall, result.precision);
        assert_eq!(swapped.f1, result.f1);
        assert_eq!(MatchResult::from(result.counts()), result);
    }

    #[test]
    fn test_property_filter_display() {
        assert_eq!(PropertyFilter::only(["TYPE", "AGE"]).to_string(), "only [AGE, TYPE]");
        assert_eq!(PropertyFilter::Ignore.to_string(), "ignored");
    }

    #[quickcheck_test]
    fn propertie_test_overlap_symmetric_and_bounded(a: (u8, u8), b: (u8, u8)) -> bool {
        let a = span("X", a.0.min(a.1).into(), a.0.max(a.1).into());
        let b = span("X", b.0.min(b.1).into(), b.0.max(b.1).into());
        let ab = calculate_overlap(&a, &b);
        (0.0..=1.0).contains(&ab) && ab == calculate_overlap(&b, &a)
    }

    #[quickcheck_test]
    fn propertie_test_self_match_is_perfect(bounds: Vec<(u8, u8)>) -> bool {
        let spans: Vec<AnnotatedSpan> = bounds
            .iter()
            .map(|&(s, l)| span("X", s.into(), usize::from(s) + usize::from(l) + 1))
            .collect();
        score_spans(&spans, &spans, 1.0, &PropertyFilter::Ignore).f1 == 1.0
    }
}
