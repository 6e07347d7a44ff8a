/*!
Review of the places where annotators disagree. The spans of every annotator are pooled, clustered
into groups of overlapping spans, and each group is classified by the kind of disagreement it
shows.
*/
use crate::datastructure::TextIndex;
use crate::entity::{AnnotatedDocument, AnnotatedSpan};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

/// Chars of context kept on each side of a group.
pub const CONTEXT_RADIUS: usize = 100;

/// One distinct annotation of a group and every annotator who made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub span: AnnotatedSpan,
    pub annotators: Vec<String>,
}

/// What the annotators disagree on inside a group. When several apply, the first listed wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    /// Some annotators have no span here.
    Missing {
        found_in: Vec<String>,
        missing_from: Vec<String>,
    },
    /// Everyone made the very same annotation.
    Unanimous,
    /// The annotators used different labels.
    ConflictingTags { labels: Vec<String> },
    /// Same label, same properties, different offsets or text.
    SelectionDiffers,
    /// Same label and selection, different properties.
    PropertiesDiffer,
    /// Same label, different properties and selection.
    PropertiesAndSelectionDiffer,
}

impl GroupKind {
    /// Does this group need a second look?
    pub fn is_disagreement(&self) -> bool {
        !matches!(self, GroupKind::Unanimous)
    }
}

impl Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing {
                found_in,
                missing_from,
            } => write!(
                f,
                "Not every annotator tagged this span. Found in: {}. Missing from: {}",
                found_in.join(", "),
                missing_from.join(", ")
            ),
            Self::Unanimous => write!(f, "Every annotator made the same annotation"),
            Self::ConflictingTags { labels } => {
                write!(f, "Conflicting tag names: {}", labels.join(", "))
            }
            Self::SelectionDiffers => write!(f, "Same tag, different selections of text"),
            Self::PropertiesDiffer => write!(f, "Same tag, different properties"),
            Self::PropertiesAndSelectionDiffer => {
                write!(f, "Same tag, different properties and selections of text")
            }
        }
    }
}

/// A cluster of overlapping spans from one or more annotators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewGroup {
    /// Distinct annotations, in (start, end) order.
    pub entries: Vec<ReviewEntry>,
    pub kind: GroupKind,
    /// Property keys whose value differs from the one of the group's first span.
    pub differing_properties: BTreeSet<String>,
    /// Char offsets covered by the group.
    pub start: usize,
    pub end: usize,
    /// Number of spans pooled into the group, before identical ones were collapsed.
    pub span_count: usize,
    /// The text around the group, `CONTEXT_RADIUS` chars on each side.
    pub context: String,
}

/// A span with the annotator who made it.
#[derive(Clone, Copy)]
struct Pooled<'d> {
    annotator: &'d str,
    span: &'d AnnotatedSpan,
}

/// Pools the spans of every document and splits them into groups. A span joins the current group
/// when it starts at or before the end of one of its members.
fn overlapping_groups(documents: &[AnnotatedDocument]) -> Vec<Vec<Pooled<'_>>> {
    let pooled = documents
        .iter()
        .flat_map(|d| {
            d.spans.iter().map(move |span| Pooled {
                annotator: d.source_id.as_str(),
                span,
            })
        })
        .sorted_by_key(|p| (p.span.start, p.span.end));

    let mut groups: Vec<Vec<Pooled>> = vec![];
    let mut group_end = 0;
    for pooled in pooled {
        match groups.last_mut() {
            Some(group) if pooled.span.start <= group_end => {
                group_end = group_end.max(pooled.span.end);
                group.push(pooled);
            }
            _ => {
                group_end = pooled.span.end;
                groups.push(vec![pooled]);
            }
        }
    }
    groups
}

/// Collapses identical annotations, keeping first-seen order.
fn collapse(group: &[Pooled]) -> Vec<ReviewEntry> {
    let mut entries: Vec<ReviewEntry> = vec![];
    for pooled in group {
        match entries
            .iter_mut()
            .find(|e| e.span.same_annotation(pooled.span))
        {
            Some(entry) => entry.annotators.push(pooled.annotator.to_string()),
            None => entries.push(ReviewEntry {
                span: pooled.span.clone(),
                annotators: vec![pooled.annotator.to_string()],
            }),
        }
    }
    entries
}

/// Property keys on which an entry disagrees with `reference`. A missing key reads as the empty
/// string.
pub fn differing_properties(
    reference: &AnnotatedSpan,
    entries: &[ReviewEntry],
) -> BTreeSet<String> {
    entries
        .iter()
        .flat_map(|e| reference.properties.differing_keys(&e.span.properties))
        .map(String::from)
        .collect()
}

fn classify(
    group: &[Pooled],
    entries: &[ReviewEntry],
    annotators: &[&str],
    differing: &BTreeSet<String>,
) -> GroupKind {
    let found_in: Vec<&str> = group.iter().map(|p| p.annotator).unique().collect();
    if found_in.len() != annotators.len() {
        let missing_from = annotators
            .iter()
            .copied()
            .filter(|a| !found_in.contains(a))
            .map(|a| a.to_string())
            .collect();
        return GroupKind::Missing {
            found_in: found_in.into_iter().map(String::from).collect(),
            missing_from,
        };
    }
    if entries.len() == 1 {
        return GroupKind::Unanimous;
    }
    let labels: Vec<String> = entries
        .iter()
        .map(|e| e.span.label.clone())
        .unique()
        .collect();
    if labels.len() > 1 {
        return GroupKind::ConflictingTags { labels };
    }
    let first = group[0].span;
    let selection_differs = entries.iter().any(|e| {
        e.span.start != first.start || e.span.end != first.end || e.span.text != first.text
    });
    match (differing.is_empty(), selection_differs) {
        (true, _) => GroupKind::SelectionDiffers,
        (false, true) => GroupKind::PropertiesAndSelectionDiffer,
        (false, false) => GroupKind::PropertiesDiffer,
    }
}

/// Clusters the spans of several annotators of the same file into review groups and classifies
/// each group.
///
/// * `documents`: One document per annotator. The text of the first document is used for the
///   context of each group.
///
/// #Example
/// ```rust
/// use deidrev::{review_disagreements, AnnotatedDocument, AnnotatedSpan, GroupKind};
///
/// let text = "Seen by Dr. Smith";
/// let a = AnnotatedDocument::new("a", text, vec![AnnotatedSpan::new("DOCTOR", "Smith", 12, 17)]);
/// let b = AnnotatedDocument::new("b", text, vec![AnnotatedSpan::new("DOCTOR", "Dr. Smith", 8, 17)]);
///
/// let groups = review_disagreements(&[a, b]);
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].kind, GroupKind::SelectionDiffers);
/// ```
pub fn review_disagreements(documents: &[AnnotatedDocument]) -> Vec<ReviewGroup> {
    let annotators: Vec<&str> = documents
        .iter()
        .map(|d| d.source_id.as_str())
        .unique()
        .collect();
    let text = documents.first().map_or("", |d| d.text.as_str());
    let index = TextIndex::new(text);

    overlapping_groups(documents)
        .into_iter()
        .map(|group| {
            let entries = collapse(&group);
            let differing = differing_properties(group[0].span, &entries);
            let kind = classify(&group, &entries, &annotators, &differing);
            let start = group.iter().map(|p| p.span.start).min().unwrap_or_default();
            let end = group.iter().map(|p| p.span.end).max().unwrap_or_default();
            let context = index
                .slice_clamped(start.saturating_sub(CONTEXT_RADIUS), end + CONTEXT_RADIUS)
                .to_string();
            ReviewGroup {
                span_count: group.len(),
                entries,
                kind,
                differing_properties: differing,
                start,
                end,
                context,
            }
        })
        .collect()
}
