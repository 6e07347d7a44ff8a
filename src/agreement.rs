/*!
This module aggregates pairwise match results into inter-annotator agreement: a pairwise matrix,
per-tag metrics and whole-dataset statistics. Every aggregate is micro-averaged, i.e. the counts
of every unordered annotator pair are summed before computing the ratios.
*/
use crate::entity::{AnnotatedDocument, AnnotatedSpan, FileAnnotations};
use crate::matcher::{score_pair, score_spans, MatchResult, PropertyFilter};
use crate::metrics::MatchCounts;
use crate::reporter::{rank, AgreementReport, PerTagMetric};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

/// Square matrix of pairwise results. The cell `(i, j)` holds annotator `i` scored against
/// annotator `j`; the cell `(j, i)` holds the same comparison seen from the other side. The
/// diagonal, and pairs that were never compared, are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementMatrix {
    annotators: Vec<String>,
    cells: Array2<Option<MatchResult>>,
}

impl AgreementMatrix {
    fn empty(annotators: Vec<String>) -> Self {
        let n = annotators.len();
        AgreementMatrix {
            annotators,
            cells: Array2::from_elem((n, n), None),
        }
    }

    fn set_pair(&mut self, i: usize, j: usize, result: MatchResult) {
        self.cells[[j, i]] = Some(result.swapped());
        self.cells[[i, j]] = Some(result);
    }

    /// Annotator identifiers, in row order.
    pub fn annotators(&self) -> &[String] {
        &self.annotators
    }

    pub fn len(&self) -> usize {
        self.annotators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotators.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&MatchResult> {
        self.cells.get((row, col)).and_then(Option::as_ref)
    }

    /// Row index of an annotator.
    pub fn position(&self, annotator: &str) -> Option<usize> {
        self.annotators.iter().position(|a| a == annotator)
    }

    /// Every filled cell above the diagonal, i.e. every compared unordered pair.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, &MatchResult)> + '_ {
        (0..self.len())
            .tuple_combinations()
            .filter_map(|(i, j)| self.get(i, j).map(|r| (i, j, r)))
    }

    /// Counts summed over every compared unordered pair.
    pub fn counts(&self) -> MatchCounts {
        self.pairs().map(|(_, _, r)| r.counts()).sum()
    }

    /// Micro-averaged F1 over every compared unordered pair, `1` when there is no pair.
    pub fn aggregate_f1(&self) -> f64 {
        self.counts().f1()
    }

    pub fn cells(&self) -> &Array2<Option<MatchResult>> {
        &self.cells
    }
}

/// One line per row, F1 of every cell, `-` where there is none.
impl Display for AgreementMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Annotator, {}", self.annotators.join(", "))?;
        for (annotator, row) in self.annotators.iter().zip(self.cells.rows()) {
            let cells = row
                .iter()
                .map(|cell| cell.map_or_else(|| String::from("-"), |r| r.f1.to_string()))
                .join(", ");
            writeln!(f, "{}, {}", annotator, cells)?;
        }
        Ok(())
    }
}

/// Scores every unordered pair of documents once and fills the matrix symmetrically. Documents
/// are expected to be the annotations of the same file by different annotators.
///
/// * `documents`: One document per annotator. Row `i` is `documents[i]`.
/// * `threshold`: Minimum IoU for two spans to match.
/// * `filter`: Which properties must agree on top of the label.
pub fn compute_agreement_matrix(
    documents: &[AnnotatedDocument],
    threshold: f64,
    filter: &PropertyFilter,
) -> AgreementMatrix {
    let annotators = documents.iter().map(|d| d.source_id.clone()).collect();
    let mut matrix = AgreementMatrix::empty(annotators);
    for (i, j) in (0..documents.len()).tuple_combinations() {
        let result = score_pair(&documents[i], &documents[j], threshold, filter);
        matrix.set_pair(i, j, result);
    }
    matrix
}

/// Every label used in any of the documents.
fn labels_of(documents: &[&AnnotatedDocument]) -> BTreeSet<String> {
    documents
        .iter()
        .flat_map(|d| d.labels())
        .map(String::from)
        .collect()
}

/// Counts of every tag of one file, summed over its unordered pairs.
fn tag_counts(
    documents: &[&AnnotatedDocument],
    threshold: f64,
    filter: &PropertyFilter,
) -> AHashMap<String, MatchCounts> {
    let by_label: Vec<AHashMap<&str, Vec<&AnnotatedSpan>>> = documents
        .iter()
        .map(|d| {
            d.spans
                .iter()
                .into_group_map_by(|s| s.label.as_str())
                .into_iter()
                .collect()
        })
        .collect();
    let mut counts = AHashMap::new();
    for label in labels_of(documents) {
        let total: MatchCounts = (0..documents.len())
            .tuple_combinations()
            .map(|(i, j)| {
                let a = by_label[i].get(label.as_str()).map_or(&[][..], Vec::as_slice);
                let b = by_label[j].get(label.as_str()).map_or(&[][..], Vec::as_slice);
                score_spans(a, b, threshold, filter).counts()
            })
            .sum();
        counts.insert(label, total);
    }
    counts
}

/// Agreement on each tag, micro-averaged over every annotator pair. Ranked by descending F1,
/// ties broken alphabetically.
pub fn compute_tag_wise_metrics(
    documents: &[AnnotatedDocument],
    threshold: f64,
    filter: &PropertyFilter,
) -> Vec<PerTagMetric> {
    let documents: Vec<&AnnotatedDocument> = documents.iter().collect();
    rank(
        tag_counts(&documents, threshold, filter)
            .into_iter()
            .map(|(label, counts)| PerTagMetric::new(label, counts)),
    )
}

/// Matrix, overall report and per-tag metrics of one file.
pub fn agreement_report(
    documents: &[AnnotatedDocument],
    threshold: f64,
    filter: &PropertyFilter,
) -> AgreementReport {
    let matrix = compute_agreement_matrix(documents, threshold, filter);
    let tags = compute_tag_wise_metrics(documents, threshold, filter);
    AgreementReport::new(matrix.counts(), tags)
}

/// Agreement over a whole dataset of files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetAgreement {
    /// Counts of every annotator pair summed over the files both annotated.
    pub matrix: AgreementMatrix,
    pub report: AgreementReport,
    /// Files that took part in the computation.
    pub files_compared: usize,
    /// Files skipped because fewer than two annotators worked on them.
    pub files_skipped: usize,
}

/// The documents of a file, one per annotator, with their global annotator index. Later
/// documents of an annotator already seen in this file are dropped.
fn file_annotators<'f>(
    file: &'f FileAnnotations,
    positions: &AHashMap<&str, usize>,
) -> Vec<(usize, &'f AnnotatedDocument)> {
    let mut seen = AHashSet::new();
    file.documents
        .iter()
        .filter_map(|document| {
            let position = *positions.get(document.source_id.as_str())?;
            if !seen.insert(position) {
                log::warn!(
                    "file {}: annotator {} appears more than once, keeping its first document",
                    file.file_id,
                    document.source_id
                );
                return None;
            }
            Some((position, document))
        })
        .collect()
}

/// Aggregates agreement over every file of a dataset.
///
/// Annotators are all the distinct `source_id`s, in order of first appearance. Files with fewer
/// than two annotators are skipped. Counts are summed per annotator pair and per tag across
/// files, so a pair that never shared a file stays `None` in the matrix.
pub fn compute_dataset_agreement(
    files: &[FileAnnotations],
    threshold: f64,
    filter: &PropertyFilter,
) -> DatasetAgreement {
    let annotators: Vec<String> = files
        .iter()
        .flat_map(|f| f.documents.iter().map(|d| d.source_id.as_str()))
        .unique()
        .map(String::from)
        .collect();
    let positions: AHashMap<&str, usize> = annotators
        .iter()
        .enumerate()
        .map(|(i, a)| (a.as_str(), i))
        .collect();

    let n = annotators.len();
    let mut pair_counts: Array2<Option<MatchCounts>> = Array2::from_elem((n, n), None);
    let mut label_counts: AHashMap<String, MatchCounts> = AHashMap::new();
    let (mut files_compared, mut files_skipped) = (0, 0);

    for file in files {
        let documents = file_annotators(file, &positions);
        if documents.len() < 2 {
            log::debug!(
                "file {} has {} annotator(s), skipping",
                file.file_id,
                documents.len()
            );
            files_skipped += 1;
            continue;
        }
        files_compared += 1;
        for ((pos_a, doc_a), (pos_b, doc_b)) in documents.iter().tuple_combinations() {
            let counts = score_pair(doc_a, doc_b, threshold, filter).counts();
            // Cells are kept in upper-triangular orientation.
            let (row, col, counts) = if pos_a < pos_b {
                (*pos_a, *pos_b, counts)
            } else {
                (*pos_b, *pos_a, counts.swapped())
            };
            let cell = &mut pair_counts[[row, col]];
            *cell = Some(cell.unwrap_or_default() + counts);
        }
        // Tag counts follow the same orientation as the matrix cells.
        let docs: Vec<&AnnotatedDocument> = documents
            .iter()
            .sorted_by_key(|(position, _)| *position)
            .map(|(_, d)| *d)
            .collect();
        for (label, counts) in tag_counts(&docs, threshold, filter) {
            *label_counts.entry(label).or_default() += counts;
        }
    }

    let mut matrix = AgreementMatrix::empty(annotators);
    for (i, j) in (0..n).tuple_combinations() {
        if let Some(counts) = pair_counts[[i, j]] {
            matrix.set_pair(i, j, MatchResult::from(counts));
        }
    }
    let tags = rank(
        label_counts
            .into_iter()
            .map(|(label, counts)| PerTagMetric::new(label, counts)),
    );
    let report = AgreementReport::new(matrix.counts(), tags);
    DatasetAgreement {
        matrix,
        report,
        files_compared,
        files_skipped,
    }
}
