use serde::{Deserialize, Serialize};
use std::fmt::Display;

mod annotation;
pub(crate) mod schemes;

// Re-exporting
pub use annotation::{AnnotatedDocument, AnnotatedSpan, FileAnnotations, Properties};
pub use schemes::{InvalidTagFormatError, Prefix, PrefixError};

/// A token produced by an external token classifier. A non-aggregating classifier fills `tag`
/// with a scheme tag such as `"B-PATIENT"`; an aggregating one leaves it empty and fills
/// `label`, `start` and `end` instead. The field aliases accept the output of the Hugging Face
/// `token-classification` pipeline as is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Token {
    /// Full scheme tag, e.g. `"B-PATIENT"` or `"O"`.
    #[serde(default, alias = "entity")]
    pub tag: Option<String>,
    /// Label of an already aggregated token, e.g. `"PATIENT"`.
    #[serde(default, alias = "entity_group")]
    pub label: Option<String>,
    /// Char offset of the first char of the token.
    #[serde(default)]
    pub start: Option<usize>,
    /// Char offset one past the last char of the token.
    #[serde(default)]
    pub end: Option<usize>,
    #[serde(default)]
    pub score: f64,
    /// Raw subword text, still carrying the tokenizer markers.
    #[serde(default, alias = "wordText")]
    pub word: Option<String>,
}

impl Token {
    /// Token with a scheme tag and known offsets.
    pub fn tagged<S: Into<String>>(tag: S, start: usize, end: usize, score: f64) -> Self {
        Token {
            tag: Some(tag.into()),
            start: Some(start),
            end: Some(end),
            score,
            ..Default::default()
        }
    }

    /// Token with a scheme tag whose offsets must be recovered from its subword text.
    pub fn unaligned<S: Into<String>, W: Into<String>>(tag: S, word: W, score: f64) -> Self {
        Token {
            tag: Some(tag.into()),
            word: Some(word.into()),
            score,
            ..Default::default()
        }
    }

    /// Token coming out of an aggregating classifier.
    pub fn aggregated<S: Into<String>>(label: S, start: usize, end: usize, score: f64) -> Self {
        Token {
            label: Some(label.into()),
            start: Some(start),
            end: Some(end),
            score,
            ..Default::default()
        }
    }

    pub fn with_word<W: Into<String>>(mut self, word: W) -> Self {
        self.word = Some(word.into());
        self
    }

    pub(crate) fn with_offsets(mut self, start: usize, end: usize) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Both offsets, when both are known.
    #[inline]
    pub fn offsets(&self) -> Option<(usize, usize)> {
        self.start.zip(self.end)
    }

    /// The tag used by the grouper: the scheme tag, else the label, else `"O"`. Empty strings
    /// count as missing.
    pub(crate) fn raw_tag(&self) -> &str {
        self.tag
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.label.as_deref().filter(|l| !l.is_empty()))
            .unwrap_or(schemes::OUTSIDE)
    }
}

/// A span represents a detected entity in a text. It contains a start and an end (char offsets,
/// end excluded), a label such as `PATIENT`, `DATE` or `HOSP`, the text it covers and the
/// confidence of the classifier. Spans are never mutated once handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub(crate) label: String,
    pub(crate) text: String,
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) score: f64,
}

impl Span {
    pub fn new<L: Into<String>, T: Into<String>>(
        label: L,
        text: T,
        start: usize,
        end: usize,
        score: f64,
    ) -> Self {
        Span {
            label: label.into(),
            text: text.into(),
            start,
            end,
            score,
        }
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn start(&self) -> usize {
        self.start
    }
    pub fn end(&self) -> usize {
        self.end
    }
    pub fn score(&self) -> f64 {
        self.score
    }
    /// Length in chars.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves a chunk-relative span to document-absolute offsets.
    pub(crate) fn rebased(mut self, offset: usize) -> Self {
        self.start += offset;
        self.end += offset;
        self
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.label, self.start, self.end)
    }
}

/// Anything that can be matched against another span: a label, char offsets and, for human
/// annotations, a property map.
pub trait SpanLike {
    fn label(&self) -> &str;
    fn start(&self) -> usize;
    fn end(&self) -> usize;
    fn properties(&self) -> Option<&Properties> {
        None
    }
}

impl SpanLike for Span {
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

impl SpanLike for AnnotatedSpan {
    fn label(&self) -> &str {
        &self.label
    }
    fn start(&self) -> usize {
        self.start
    }
    fn end(&self) -> usize {
        self.end
    }
    fn properties(&self) -> Option<&Properties> {
        Some(&self.properties)
    }
}

impl<T: SpanLike + ?Sized> SpanLike for &T {
    fn label(&self) -> &str {
        (**self).label()
    }
    fn start(&self) -> usize {
        (**self).start()
    }
    fn end(&self) -> usize {
        (**self).end()
    }
    fn properties(&self) -> Option<&Properties> {
        (**self).properties()
    }
}
