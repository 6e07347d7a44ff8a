/*!
This library groups the token output of a clinical de-identification model into entity spans and
measures how much human annotators agree on the same notes. It is built with a focus on exactness
of the offsets and on reproducible agreement numbers.

# SPAN GROUPING
A token classifier emits one tag per subword. The tags follow the BIOUL scheme:
* `B`: first token of a multi-token entity.
* `I`: token inside an entity.
* `L`: last token of a multi-token entity.
* `U`: entity made of a single token.
* `O`: token outside any entity.

The BIOES letters `E` and `S` are read as `L` and `U`. Tokens without offsets are located in the
text by their decoded subword (`Ġ`, `▁`, `Ċ` and `##` markers are understood). Same-label spans
that touch, or are separated by a single char, are merged. Classifiers that already aggregate
their output are supported as well.

# AGREEMENT
Two span sets are compared with a greedy matching on the intersection over union of the spans.
Counts of every unordered pair of annotators are summed before computing precision, recall and F1
(micro-averaging). Agreement can be computed for one file (`compute_agreement_matrix`,
`compute_tag_wise_metrics`, `agreement_report`) or for a whole dataset
(`compute_dataset_agreement`). `review_disagreements` lists the places where annotators differ.

# PHRASE MODEL
`PhraseModel` learns, per label, the phrases annotators tagged and the phrases they marked as
excluded, then finds whole-phrase occurrences of the former in new text.

# Terminology
* A label is the kind of protected information, such as `PATIENT`, `DATE` or `HOSP`.
* A tag is a prefix and a label, such as `B-PATIENT`.
* A span is a `[start, end)` range of chars with a label. Every offset in this crate counts chars,
    not bytes.
* An annotator is identified by the `source_id` of its documents.
*/

mod agreement;
mod chunking;
mod config;
mod datastructure;
mod entity;
mod grouper;
mod matcher;
mod metrics;
mod offsets;
mod phrase_model;
mod redact;
mod reporter;
mod review;

// The public api starts here
pub use entity::{
    AnnotatedDocument, AnnotatedSpan, FileAnnotations, InvalidTagFormatError, Prefix, PrefixError,
    Properties, Span, SpanLike, Token,
};

pub use offsets::{resolve_offsets, TokenAlignmentError};

pub use grouper::{group_spans, merge_adjacent_spans, GroupingError, OffsetResolutionError};

pub use chunking::{
    classify_document, classify_document_with_progress, split_into_chunks, ChunkingError,
    PipelineError, TextChunk, TokenClassifier, DEFAULT_MAX_CHARS,
};

pub use redact::redact;

pub use phrase_model::{
    clean_text, PhraseDictionary, PhraseMatch, PhraseModel, PhraseModelOptions, SpanSelector,
};

pub use matcher::{calculate_overlap, score_pair, score_spans, MatchResult, PropertyFilter};

pub use metrics::MatchCounts;

pub use agreement::{
    agreement_report, compute_agreement_matrix, compute_dataset_agreement,
    compute_tag_wise_metrics, AgreementMatrix, DatasetAgreement,
};

pub use reporter::{AgreementReport, PerTagMetric};

pub use review::{
    differing_properties, review_disagreements, GroupKind, ReviewEntry, ReviewGroup,
    CONTEXT_RADIUS,
};

pub use config::{AgreementConfig, AgreementConfigBuilder, ConfigError, DEFAULT_THRESHOLD};

/// Same as `score_pair`, with the threshold and the property filter taken from an
/// `AgreementConfig`.
pub fn score_pair_conf(
    a: &AnnotatedDocument,
    b: &AnnotatedDocument,
    config: &AgreementConfig,
) -> MatchResult {
    score_pair(a, b, config.threshold(), config.property_filter())
}

/// Same as `compute_agreement_matrix`, with the threshold and the property filter taken from an
/// `AgreementConfig`.
///
/// #Example
/// ```rust
/// use deidrev::{compute_agreement_matrix_conf, AgreementConfigBuilder, AnnotatedDocument, AnnotatedSpan};
///
/// let a = AnnotatedDocument::new("a", "", vec![AnnotatedSpan::new("DATE", "", 0, 10)]);
/// let b = AnnotatedDocument::new("b", "", vec![AnnotatedSpan::new("DATE", "", 5, 15)]);
///
/// let strict = AgreementConfigBuilder::new().build().unwrap();
/// let loose = AgreementConfigBuilder::new().threshold(0.3).build().unwrap();
///
/// let docs = [a, b];
/// assert_eq!(compute_agreement_matrix_conf(&docs, &strict).aggregate_f1(), 0.0);
/// assert_eq!(compute_agreement_matrix_conf(&docs, &loose).aggregate_f1(), 1.0);
/// ```
pub fn compute_agreement_matrix_conf(
    documents: &[AnnotatedDocument],
    config: &AgreementConfig,
) -> AgreementMatrix {
    compute_agreement_matrix(documents, config.threshold(), config.property_filter())
}

/// Same as `compute_tag_wise_metrics`, with the threshold and the property filter taken from an
/// `AgreementConfig`.
pub fn compute_tag_wise_metrics_conf(
    documents: &[AnnotatedDocument],
    config: &AgreementConfig,
) -> Vec<PerTagMetric> {
    compute_tag_wise_metrics(documents, config.threshold(), config.property_filter())
}

/// Same as `agreement_report`, with the threshold and the property filter taken from an
/// `AgreementConfig`.
pub fn agreement_report_conf(
    documents: &[AnnotatedDocument],
    config: &AgreementConfig,
) -> AgreementReport {
    agreement_report(documents, config.threshold(), config.property_filter())
}

/// Same as `compute_dataset_agreement`, with the threshold and the property filter taken from an
/// `AgreementConfig`.
pub fn compute_dataset_agreement_conf(
    files: &[FileAnnotations],
    config: &AgreementConfig,
) -> DatasetAgreement {
    compute_dataset_agreement(files, config.threshold(), config.property_filter())
}
