/*!
This modules gives a few tools to prettyprint the agreement metrics of every tag and the overall
agreement.
*/
use crate::metrics::MatchCounts;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;

/// Label of the line holding the metrics over every tag.
pub(crate) const OVERALL: &str = "Overall";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Micro-averaged agreement on a single tag, summed over every annotator pair.
pub struct PerTagMetric {
    /// The tag, such as "PATIENT", "DATE", etc.
    pub label: String,
    pub counts: MatchCounts,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl PerTagMetric {
    pub fn new<S: Into<String>>(label: S, counts: MatchCounts) -> Self {
        PerTagMetric {
            label: label.into(),
            counts,
            precision: counts.precision(),
            recall: counts.recall(),
            f1: counts.f1(),
        }
    }
}

/// The metric acts as a line in a dataframe when displayed.
impl Display for PerTagMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {}, {}",
            self.label,
            self.precision,
            self.recall,
            self.f1,
            self.counts.true_positives,
            self.counts.false_positives,
            self.counts.false_negatives
        )
    }
}

/// Highest F1 first, ties broken by label in alphabetical order.
fn rank_order(left: &PerTagMetric, right: &PerTagMetric) -> Ordering {
    right
        .f1
        .partial_cmp(&left.f1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| left.label.cmp(&right.label))
}

pub(crate) fn rank<I: IntoIterator<Item = PerTagMetric>>(metrics: I) -> Vec<PerTagMetric> {
    metrics.into_iter().sorted_by(rank_order).collect()
}

/// The report holds the overall agreement and the agreement of every tag. It can be used to
/// display the results as if they were collected into a dataframe, or serialized as is. The
/// report can be built with the `agreement_report` function.
///
/// # Example
///
/// ```rust
/// use deidrev::{agreement_report, AnnotatedDocument, AnnotatedSpan, PropertyFilter};
///
/// let a = AnnotatedDocument::new("a", "", vec![
///     AnnotatedSpan::new("DATE", "", 0, 4),
///     AnnotatedSpan::new("AGE", "", 10, 12),
/// ]);
/// let b = AnnotatedDocument::new("b", "", vec![AnnotatedSpan::new("DATE", "", 0, 4)]);
///
/// let report = agreement_report(&[a, b], 0.5, &PropertyFilter::Ignore);
///
/// let expected_report = "Tag, Precision, Recall, F1, TP, FP, FN
/// Overall, 0.5, 1, 0.6666666666666666, 1, 1, 0
/// DATE, 1, 1, 1, 1, 0, 0
/// AGE, 0, 1, 0, 0, 1, 0\n";
///
/// assert_eq!(expected_report, report.to_string());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementReport {
    pub overall: PerTagMetric,
    /// Ranked by F1, best first.
    pub tags: Vec<PerTagMetric>,
}

impl AgreementReport {
    pub(crate) fn new(overall: MatchCounts, tags: Vec<PerTagMetric>) -> Self {
        AgreementReport {
            overall: PerTagMetric::new(OVERALL, overall),
            tags,
        }
    }

    /// Metrics of one tag, if it appeared in any document.
    pub fn tag(&self, label: &str) -> Option<&PerTagMetric> {
        self.tags.iter().find(|m| m.label == label)
    }
}

/// The report acts as a dataframe when displayed.
impl Display for AgreementReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tag, Precision, Recall, F1, TP, FP, FN")?;
        writeln!(f, "{}", self.overall)?;
        for metric in self.tags.iter() {
            writeln!(f, "{}", metric)?
        }
        Ok(())
    }
}

impl From<AgreementReport> for Vec<PerTagMetric> {
    fn from(value: AgreementReport) -> Self {
        std::iter::once(value.overall).chain(value.tags).collect()
    }
}
