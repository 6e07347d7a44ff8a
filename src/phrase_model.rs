/*!
A dictionary model learned from annotated spans. For every label it keeps the phrases annotators
tagged as positive examples and, separately, the phrases tagged as excluded. Applying the model
to a text finds whole-phrase occurrences of the positive phrases that do not overlap a negative
one.
*/
use crate::entity::{AnnotatedDocument, AnnotatedSpan, SpanLike};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Is `c` kept by the cleaning? Ascii letters and the ascii range from `!` to `:`, which holds
/// the digits and the usual punctuation.
#[inline]
fn is_phrase_char(c: char) -> bool {
    c.is_ascii_alphabetic() || ('!'..=':').contains(&c)
}

/// A run of kept chars, as found in the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Word {
    /// Char offset in the cleaned text.
    cleaned_start: usize,
    /// Char offset in the original text.
    original_start: usize,
    len: usize,
}

/// A text reduced to lowercase words separated by single spaces. Every word remembers where it
/// comes from, so matches can be reported in offsets of the original text.
#[derive(Debug, Clone)]
struct CleanedText {
    text: String,
    words: Vec<Word>,
}

impl CleanedText {
    fn new(original: &str) -> Self {
        let mut text = String::with_capacity(original.len());
        let mut words = vec![];
        let runs = original.chars().enumerate().chunk_by(|(_, c)| is_phrase_char(*c));
        for (kept, mut run) in &runs {
            if !kept {
                continue;
            }
            let Some((original_start, first)) = run.next() else {
                continue;
            };
            if !text.is_empty() {
                text.push(' ');
            }
            let cleaned_start = text.len();
            text.push(first.to_ascii_lowercase());
            text.extend(run.map(|(_, c)| c.to_ascii_lowercase()));
            words.push(Word {
                cleaned_start,
                original_start,
                len: text.len() - cleaned_start,
            });
        }
        CleanedText { text, words }
    }

    /// Maps a `[start, end)` range of the cleaned text, aligned on words, back to the original
    /// text.
    fn original_range(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let first = self.words.partition_point(|w| w.cleaned_start < start);
        let last = self.words.partition_point(|w| w.cleaned_start + w.len < end);
        let first = self.words.get(first).filter(|w| w.cleaned_start == start)?;
        let last = self.words.get(last).filter(|w| w.cleaned_start + w.len == end)?;
        Some((first.original_start, last.original_start + last.len))
    }
}

/// Normalizes a text for phrase matching: every char other than an ascii letter or one of
/// ``!"#$%&'()*+,-./0123456789:`` becomes a space, letters are lowercased and runs of spaces are
/// squeezed into one. Leading and trailing spaces are removed.
///
/// #Example
/// ```rust
/// use deidrev::clean_text;
///
/// assert_eq!(clean_text("  Mercy\tGeneral (ER)!  "), "mercy general (er)!");
/// assert_eq!(clean_text("Zoë_Lee"), "zo lee");
/// ```
pub fn clean_text(text: &str) -> String {
    CleanedText::new(text).text
}

/// Which annotated spans feed one side of the model.
///
/// A span is selected when its label is in `tags` (an empty set selects every label) and when
/// every property it carries, for which `required_values` has an entry, takes one of the listed
/// values. Properties the span does not carry are not constrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanSelector {
    pub tags: BTreeSet<String>,
    pub required_values: BTreeMap<String, BTreeSet<String>>,
}

impl SpanSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the selection to `tags`.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Accepts only spans whose `key` property, when present, is one of `values`.
    pub fn require<K, I, S>(mut self, key: K, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_values
            .entry(key.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn accepts(&self, span: &AnnotatedSpan) -> bool {
        if !self.tags.is_empty() && !self.tags.contains(&span.label) {
            return false;
        }
        span.properties.iter().all(|(key, value)| {
            self.required_values
                .get(key)
                .map_or(true, |allowed| allowed.contains(value))
        })
    }
}

/// How `PhraseModel::from_annotations` splits the annotated spans into positive and negative
/// examples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseModelOptions {
    /// Labels that never contribute phrases.
    pub ignored_tags: BTreeSet<String>,
    /// Property telling whether a span is an excluded mention.
    pub exclusion_key: String,
    /// Values of `exclusion_key` making a span a positive example.
    pub included_values: BTreeSet<String>,
    /// Values of `exclusion_key` making a span a negative example.
    pub excluded_values: BTreeSet<String>,
}

impl Default for PhraseModelOptions {
    fn default() -> Self {
        PhraseModelOptions {
            ignored_tags: ["Link", "Link2Tags", "Other"].map(String::from).into(),
            exclusion_key: String::from("exclusion"),
            included_values: ["no", ""].map(String::from).into(),
            excluded_values: ["yes"].map(String::from).into(),
        }
    }
}

impl PhraseModelOptions {
    /// Selectors of the positive and of the negative examples.
    pub fn selectors(&self) -> (SpanSelector, SpanSelector) {
        let positive = SpanSelector::new().require(
            self.exclusion_key.as_str(),
            self.included_values.iter().cloned(),
        );
        let negative = SpanSelector::new().require(
            self.exclusion_key.as_str(),
            self.excluded_values.iter().cloned(),
        );
        (positive, negative)
    }
}

/// Occurrences of one or more overlapping positive phrases of the same label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseMatch {
    pub label: String,
    /// The phrases found in this range, by order of start.
    pub phrases: Vec<String>,
    /// Char offsets in the original text.
    pub start: usize,
    pub end: usize,
}

impl SpanLike for PhraseMatch {
    fn label(&self) -> &str {
        &self.label
    }
    fn start(&self) -> usize {
        self.start
    }
    fn end(&self) -> usize {
        self.end
    }
}

/// Cleaned phrases per label.
pub type PhraseDictionary = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseModel {
    pub positive: PhraseDictionary,
    /// Never holds a phrase that is also positive for the same label.
    pub negative: PhraseDictionary,
    /// Every label seen while building the model, phrases or not.
    pub tags: BTreeSet<String>,
}

/// Cleaned text of every selected span, grouped by label. Spans cleaning to nothing are left
/// out.
fn dictionary<'a, I>(spans: I, selector: &SpanSelector) -> PhraseDictionary
where
    I: IntoIterator<Item = &'a AnnotatedSpan>,
{
    let mut phrases = PhraseDictionary::new();
    for span in spans.into_iter().filter(|s| selector.accepts(s)) {
        let phrase = clean_text(&span.text);
        if !phrase.is_empty() {
            phrases.entry(span.label.clone()).or_default().insert(phrase);
        }
    }
    phrases
}

/// A whole-phrase occurrence, in offsets of the cleaned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Occurrence<'p> {
    phrase: &'p str,
    start: usize,
    end: usize,
}

impl Occurrence<'_> {
    fn overlaps(&self, other: &Occurrence) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Every occurrence of the phrases in `cleaned` bounded by a space or an end of the text. Two
/// occurrences separated by a single space are both found.
fn occurrences<'p>(cleaned: &str, phrases: &'p BTreeSet<String>) -> Vec<Occurrence<'p>> {
    // The cleaned text and the phrases are ascii, so byte offsets are char offsets.
    let padded = format!(" {} ", cleaned);
    let mut found = vec![];
    for phrase in phrases {
        let needle = format!(" {} ", phrase);
        let mut from = 0;
        while let Some(position) = padded.get(from..).and_then(|rest| rest.find(&needle)) {
            let start = from + position;
            found.push(Occurrence {
                phrase,
                start,
                end: start + phrase.len(),
            });
            from = start + needle.len() - 1;
        }
    }
    found
}

impl PhraseModel {
    /// Builds the model from explicit selectors. A phrase selected on both sides for a label
    /// stays positive only.
    pub fn from_selection<'a, I>(spans: I, positive: &SpanSelector, negative: &SpanSelector) -> Self
    where
        I: IntoIterator<Item = &'a AnnotatedSpan>,
        I::IntoIter: Clone,
    {
        let spans = spans.into_iter();
        let tags: BTreeSet<String> = spans.clone().map(|s| s.label.clone()).collect();
        let positive = dictionary(spans.clone(), positive);
        let mut negative = dictionary(spans, negative);
        for (label, phrases) in negative.iter_mut() {
            if let Some(kept) = positive.get(label) {
                phrases.retain(|p| !kept.contains(p));
            }
        }
        negative.retain(|_, phrases| !phrases.is_empty());
        log::debug!(
            "phrase model over {} tags: {} positive and {} negative phrases",
            tags.len(),
            positive.values().map(BTreeSet::len).sum::<usize>(),
            negative.values().map(BTreeSet::len).sum::<usize>()
        );
        PhraseModel {
            positive,
            negative,
            tags,
        }
    }

    /// Builds the model from every span of `documents`. Spans with an ignored label are only
    /// recorded in `tags`.
    ///
    /// #Example
    /// ```rust
    /// use deidrev::{AnnotatedDocument, AnnotatedSpan, PhraseModel, PhraseModelOptions};
    ///
    /// let document = AnnotatedDocument::new(
    ///     "grader_a.xml",
    ///     "",
    ///     vec![
    ///         AnnotatedSpan::new("RISK", "Fall risk", 0, 9).with_property("exclusion", "no"),
    ///         AnnotatedSpan::new("RISK", "no fall risk", 20, 32).with_property("exclusion", "yes"),
    ///     ],
    /// );
    /// let model = PhraseModel::from_annotations(&[document], &PhraseModelOptions::default());
    ///
    /// let matches = model.apply("High fall risk; patient has no fall risk");
    /// let risk = &matches["RISK"];
    /// assert_eq!(risk.len(), 1);
    /// assert_eq!((risk[0].start, risk[0].end), (5, 14));
    /// ```
    pub fn from_annotations(documents: &[AnnotatedDocument], options: &PhraseModelOptions) -> Self {
        let spans: Vec<&AnnotatedSpan> = documents.iter().flat_map(|d| d.spans.iter()).collect();
        let (positive, negative) = options.selectors();
        let mut model = Self::from_selection(
            spans
                .iter()
                .copied()
                .filter(|s| !options.ignored_tags.contains(&s.label)),
            &positive,
            &negative,
        );
        model
            .tags
            .extend(spans.iter().map(|s| s.label.clone()));
        model
    }

    /// Finds the positive phrases of every label in `text`.
    ///
    /// A positive occurrence overlapping a negative occurrence of the same label is dropped.
    /// Overlapping occurrences that remain are combined into one `PhraseMatch`. Labels without
    /// any match are absent from the result.
    pub fn apply(&self, text: &str) -> BTreeMap<String, Vec<PhraseMatch>> {
        let cleaned = CleanedText::new(text);
        let mut results = BTreeMap::new();
        for (label, phrases) in &self.positive {
            let negatives = self
                .negative
                .get(label)
                .map(|n| occurrences(&cleaned.text, n))
                .unwrap_or_default();
            let kept = occurrences(&cleaned.text, phrases)
                .into_iter()
                .filter(|o| !negatives.iter().any(|n| o.overlaps(n)))
                .sorted_by_key(|o| (o.start, o.end));

            let mut combined: Vec<(Vec<String>, usize, usize)> = vec![];
            for occurrence in kept {
                match combined.last_mut() {
                    Some((found, _, end)) if occurrence.start <= *end => {
                        found.push(occurrence.phrase.to_string());
                        *end = (*end).max(occurrence.end);
                    }
                    _ => combined.push((
                        vec![occurrence.phrase.to_string()],
                        occurrence.start,
                        occurrence.end,
                    )),
                }
            }
            let matches: Vec<PhraseMatch> = combined
                .into_iter()
                .filter_map(|(phrases, start, end)| {
                    let (start, end) = cleaned.original_range(start, end)?;
                    Some(PhraseMatch {
                        label: label.clone(),
                        phrases,
                        start,
                        end,
                    })
                })
                .collect();
            if !matches.is_empty() {
                results.insert(label.clone(), matches);
            }
        }
        results
    }

    /// Number of matches of every label of the model in `text`, zero included.
    pub fn count_matches(&self, text: &str) -> BTreeMap<String, usize> {
        let matches = self.apply(text);
        self.tags
            .iter()
            .map(|tag| (tag.clone(), matches.get(tag).map_or(0, Vec::len)))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::redact::redact;
    use rstest::rstest;

    fn span(label: &str, text: &str, exclusion: Option<&str>) -> AnnotatedSpan {
        let span = AnnotatedSpan::new(label, text, 0, text.chars().count());
        match exclusion {
            Some(value) => span.with_property("exclusion", value),
            None => span,
        }
    }

    fn model(spans: Vec<AnnotatedSpan>) -> PhraseModel {
        let document = AnnotatedDocument::new("a", "", spans);
        PhraseModel::from_annotations(&[document], &PhraseModelOptions::default())
    }

    fn found(model: &PhraseModel, text: &str, label: &str) -> Vec<(usize, usize)> {
        model
            .apply(text)
            .get(label)
            .map(|m| m.iter().map(|m| (m.start, m.end)).collect())
            .unwrap_or_default()
    }

    #[rstest]
    #[case("Fall Risk", "fall risk")]
    #[case("  fall \n\n risk  ", "fall risk")]
    #[case("B.P.: 120/80", "b.p.: 120/80")]
    #[case("risk;fall", "risk fall")]
    #[case("naïve", "na ve")]
    #[case("", "")]
    #[case("@@@", "")]
    fn test_clean_text(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(clean_text(text), expected);
    }

    #[rstest]
    #[case(None, true, true)]
    #[case(Some("no"), true, false)]
    #[case(Some(""), true, false)]
    #[case(Some("yes"), false, true)]
    #[case(Some("maybe"), false, false)]
    fn test_default_selectors(
        #[case] exclusion: Option<&str>,
        #[case] positive: bool,
        #[case] negative: bool,
    ) {
        let (pos, neg) = PhraseModelOptions::default().selectors();
        let span = span("RISK", "fall", exclusion);
        assert_eq!(pos.accepts(&span), positive);
        assert_eq!(neg.accepts(&span), negative);
    }

    #[test]
    fn test_selector_tags() {
        let selector = SpanSelector::new().with_tags(["RISK"]);
        assert!(selector.accepts(&span("RISK", "fall", None)));
        assert!(!selector.accepts(&span("DATE", "today", None)));
    }

    #[test]
    fn test_negative_phrases_never_positive() {
        let model = model(vec![
            span("RISK", "Fall risk", Some("no")),
            span("RISK", "fall  risk", Some("yes")),
            span("RISK", "No fall risk", Some("yes")),
            span("MED", "aspirin", None),
            span("Other", "whatever", Some("no")),
        ]);
        assert_eq!(
            model.positive["RISK"],
            BTreeSet::from([String::from("fall risk")])
        );
        assert_eq!(
            model.negative["RISK"],
            BTreeSet::from([String::from("no fall risk")])
        );
        // Unconstrained spans land on both sides, then only stay positive.
        assert!(model.positive.contains_key("MED"));
        assert!(!model.negative.contains_key("MED"));
        assert!(!model.positive.contains_key("Other"));
        assert!(model.tags.contains("Other"));
    }

    #[test]
    fn test_whole_phrases_only() {
        let model = model(vec![span("NAME", "Ann", None)]);
        assert_eq!(found(&model, "Anne met ann then ANN", "NAME"), vec![(9, 12), (18, 21)]);
        // Kept punctuation is part of the word.
        assert!(found(&model, "met ann, then", "NAME").is_empty());
        assert!(found(&model, "Joanna", "NAME").is_empty());
    }

    #[test]
    fn test_adjacent_repetitions_are_all_found() {
        let model = model(vec![span("NAME", "ann", None)]);
        assert_eq!(found(&model, "ann ann", "NAME"), vec![(0, 3), (4, 7)]);
    }

    #[test]
    fn test_offsets_point_into_the_original_text() {
        let model = model(vec![span("RISK", "fall risk", None)]);
        let text = "Zoë:  High FALL\n  risk; stable";
        assert_eq!(found(&model, text, "RISK"), vec![(11, 22)]);
        assert_eq!(redact(text, &model.apply(text)["RISK"]), "Zoë:  High [RISK]; stable");
    }

    #[test]
    fn test_negative_occurrence_masks_positive() {
        let model = model(vec![
            span("RISK", "fall risk", Some("no")),
            span("RISK", "no fall risk", Some("yes")),
        ]);
        let text = "no fall risk today, fall risk tomorrow";
        assert_eq!(found(&model, text, "RISK"), vec![(20, 29)]);
    }

    #[test]
    fn test_overlapping_positives_are_combined() {
        let model = model(vec![
            span("RISK", "high fall", None),
            span("RISK", "fall risk", None),
            span("RISK", "sepsis", None),
        ]);
        let matches = model.apply("high fall risk and sepsis");
        let risk = &matches["RISK"];
        assert_eq!(risk.len(), 2);
        assert_eq!((risk[0].start, risk[0].end), (0, 14));
        assert_eq!(risk[0].phrases, vec!["high fall", "fall risk"]);
        assert_eq!((risk[1].start, risk[1].end), (19, 25));
    }

    #[test]
    fn test_count_matches_lists_every_tag() {
        let model = model(vec![
            span("RISK", "fall risk", None),
            span("MED", "aspirin", None),
            span("Link", "", None),
        ]);
        let counts = model.count_matches("fall risk; fall risk");
        assert_eq!(
            counts,
            BTreeMap::from([
                (String::from("Link"), 0),
                (String::from("MED"), 0),
                (String::from("RISK"), 2),
            ])
        );
    }

    #[test]
    fn test_empty_model_finds_nothing() {
        let model = PhraseModel::default();
        assert!(model.apply("anything").is_empty());
        assert!(model.count_matches("").is_empty());
    }
}
