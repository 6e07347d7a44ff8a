/*!
Turns the per-token output of a classifier into entity spans. Two input shapes are supported:

* Aggregated tokens, which already carry a label and offsets. They are filtered and merged.
* Scheme tagged tokens (`B-`, `I-`, `L-`, `U-`, `O`, plus the BIOES aliases `E-` and `S-`). Their
  offsets are resolved first, then they are chunked into spans.

Both paths end with the same merge pass, joining same-label spans separated by at most one char.
*/
use crate::datastructure::TextIndex;
use crate::entity::schemes::{has_delimiter, SchemeTag, OUTSIDE};
use crate::entity::{InvalidTagFormatError, Prefix, Span, Token};
use crate::offsets::{resolve_offsets_indexed, TokenAlignmentError};
use std::error::Error;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// The token stream could not be turned into valid char offsets.
pub enum OffsetResolutionError {
    /// Fewer tokens carry offsets after resolution than were given.
    CountMismatch { expected: usize, resolved: usize },
    /// A token or span does not fit inside the text.
    OutOfBounds {
        start: usize,
        end: usize,
        text_len: usize,
    },
}

impl Display for OffsetResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CountMismatch { expected, resolved } => write!(
                f,
                "Token offsets missing; cannot group entities. Expected {} tokens, {} have offsets",
                expected, resolved
            ),
            Self::OutOfBounds {
                start,
                end,
                text_len,
            } => write!(
                f,
                "Offsets [{}, {}) do not fit in a text of {} chars",
                start, end, text_len
            ),
        }
    }
}

impl Error for OffsetResolutionError {}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Enum error encompassing the failures that abort the grouping of a chunk.
pub enum GroupingError {
    TokenAlignment(TokenAlignmentError),
    OffsetResolution(OffsetResolutionError),
    InvalidTagFormat(InvalidTagFormatError),
}

impl Display for GroupingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenAlignment(e) => Display::fmt(e, f),
            Self::OffsetResolution(e) => Display::fmt(e, f),
            Self::InvalidTagFormat(e) => Display::fmt(e, f),
        }
    }
}

impl Error for GroupingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TokenAlignment(e) => Some(e),
            Self::OffsetResolution(e) => Some(e),
            Self::InvalidTagFormat(e) => Some(e),
        }
    }
}

impl From<TokenAlignmentError> for GroupingError {
    fn from(value: TokenAlignmentError) -> Self {
        Self::TokenAlignment(value)
    }
}
impl From<OffsetResolutionError> for GroupingError {
    fn from(value: OffsetResolutionError) -> Self {
        Self::OffsetResolution(value)
    }
}
impl From<InvalidTagFormatError> for GroupingError {
    fn from(value: InvalidTagFormatError) -> Self {
        Self::InvalidTagFormat(value)
    }
}

/// Main entrypoint of the grouper. Converts the tokens of one text (or one chunk of a text) into
/// spans sorted by start, without overlaps between same-label neighbours.
///
/// * `tokens`: Output of the token classifier, in classifier order.
/// * `text`: The text the tokens were computed on. Offsets are char offsets into it.
///
/// #Example
/// ```rust
/// use deidrev::{group_spans, Token};
///
/// let tokens = vec![
///     Token::tagged("B-PATIENT", 0, 4, 0.9),
///     Token::tagged("L-PATIENT", 5, 10, 0.7),
/// ];
/// let spans = group_spans(&tokens, "John Smith").unwrap();
/// assert_eq!(spans.len(), 1);
/// assert_eq!(spans[0].label(), "PATIENT");
/// assert_eq!(spans[0].text(), "John Smith");
/// assert_eq!((spans[0].start(), spans[0].end()), (0, 10));
/// ```
pub fn group_spans(tokens: &[Token], text: &str) -> Result<Vec<Span>, GroupingError> {
    if tokens.is_empty() {
        return Ok(vec![]);
    }
    let index = TextIndex::new(text);
    let spans = if looks_aggregated(tokens) {
        aggregated_spans(tokens, &index)?
    } else {
        scheme_spans(tokens, &index)?
    };
    Ok(merge_adjacent_spans_indexed(spans, &index))
}

/// Every token has offsets and a label, and nothing carries a scheme prefix.
fn looks_aggregated(tokens: &[Token]) -> bool {
    tokens.iter().all(|token| {
        token.offsets().is_some()
            && token
                .label
                .as_deref()
                .is_some_and(|l| !l.is_empty() && !has_delimiter(l))
            && !token.tag.as_deref().is_some_and(has_delimiter)
    })
}

fn aggregated_spans(tokens: &[Token], index: &TextIndex) -> Result<Vec<Span>, GroupingError> {
    let mut spans = Vec::with_capacity(tokens.len());
    for token in tokens {
        let (Some(label), Some((start, end))) = (token.label.as_deref(), token.offsets()) else {
            continue;
        };
        if label == OUTSIDE {
            continue;
        }
        let slice = checked_slice(index, start, end)?;
        let text = match token.word.as_deref() {
            Some(word) if !word.trim().is_empty() => word,
            _ => slice,
        };
        spans.push(Span::new(label, text, start, end, token.score));
    }
    spans.sort_by_key(|s| s.start);
    Ok(spans)
}

fn scheme_spans(tokens: &[Token], index: &TextIndex) -> Result<Vec<Span>, GroupingError> {
    let resolved = resolve_offsets_indexed(tokens, index)?;
    let positioned = positioned_tokens(&resolved, tokens.len())?;

    let mut accumulator = SpanAccumulator::new(index);
    for (start, end, token) in positioned {
        let raw = token.raw_tag();
        if raw == OUTSIDE {
            continue;
        }
        let tag = SchemeTag::parse(raw)?;
        match tag.prefix {
            Prefix::O => continue,
            Prefix::U => {
                accumulator.flush()?;
                accumulator.emit(tag.label, start, end, token.score)?;
            }
            Prefix::B => {
                accumulator.flush()?;
                accumulator.open(tag.label, start, end, token.score);
            }
            Prefix::I | Prefix::L => {
                if accumulator.is_open_with(tag.label) {
                    accumulator.extend(end, token.score);
                } else {
                    log::debug!(
                        "continuation tag {} at [{}, {}) without an open {} span, starting a new one",
                        raw,
                        start,
                        end,
                        tag.label
                    );
                    accumulator.flush()?;
                    accumulator.open(tag.label, start, end, token.score);
                }
                if tag.prefix.is_last() {
                    accumulator.flush()?;
                }
            }
        }
    }
    accumulator.finish()
}

/// Resolved tokens with their offsets, sorted by start. Every one of the `expected` tokens must
/// carry offsets.
fn positioned_tokens(
    resolved: &[Token],
    expected: usize,
) -> Result<Vec<(usize, usize, &Token)>, OffsetResolutionError> {
    let mut positioned: Vec<(usize, usize, &Token)> = resolved
        .iter()
        .filter_map(|t| t.offsets().map(|(start, end)| (start, end, t)))
        .collect();
    if positioned.len() != expected {
        return Err(OffsetResolutionError::CountMismatch {
            expected,
            resolved: positioned.len(),
        });
    }
    positioned.sort_by_key(|(start, _, _)| *start);
    Ok(positioned)
}

fn checked_slice<'a>(
    index: &TextIndex<'a>,
    start: usize,
    end: usize,
) -> Result<&'a str, OffsetResolutionError> {
    index
        .slice(start, end)
        .ok_or(OffsetResolutionError::OutOfBounds {
            start,
            end,
            text_len: index.char_len(),
        })
}

/// The span currently being built.
struct OpenSpan<'t> {
    label: &'t str,
    start: usize,
    end: usize,
    scores: Vec<f64>,
}

/// Working state of one grouping call. It is created and dropped inside `scheme_spans`.
struct SpanAccumulator<'i, 'a, 't> {
    index: &'i TextIndex<'a>,
    current: Option<OpenSpan<'t>>,
    spans: Vec<Span>,
}

impl<'i, 'a, 't> SpanAccumulator<'i, 'a, 't> {
    fn new(index: &'i TextIndex<'a>) -> Self {
        SpanAccumulator {
            index,
            current: None,
            spans: vec![],
        }
    }

    fn is_open_with(&self, label: &str) -> bool {
        self.current.as_ref().is_some_and(|c| c.label == label)
    }

    fn open(&mut self, label: &'t str, start: usize, end: usize, score: f64) {
        self.current = Some(OpenSpan {
            label,
            start,
            end,
            scores: vec![score],
        });
    }

    fn extend(&mut self, end: usize, score: f64) {
        if let Some(current) = self.current.as_mut() {
            current.end = end;
            current.scores.push(score);
        }
    }

    fn emit(
        &mut self,
        label: &str,
        start: usize,
        end: usize,
        score: f64,
    ) -> Result<(), OffsetResolutionError> {
        let text = checked_slice(self.index, start, end)?;
        self.spans.push(Span::new(label, text, start, end, score));
        Ok(())
    }

    /// Emits the open span, if any. Its score is the mean of its token scores.
    fn flush(&mut self) -> Result<(), OffsetResolutionError> {
        let Some(current) = self.current.take() else {
            return Ok(());
        };
        let score = current.scores.iter().sum::<f64>() / current.scores.len() as f64;
        self.emit(current.label, current.start, current.end, score)
    }

    fn finish(mut self) -> Result<Vec<Span>, GroupingError> {
        self.flush()?;
        Ok(self.spans)
    }
}

/// Merges a span into the previous one when both share a label and the span starts at most one
/// char after the previous end (e.g. a title and a name separated by a space). The merged score
/// is the average of both scores weighted by span length. Spans must be sorted by start; the
/// pass is idempotent.
///
/// * `spans`: Spans sorted by start.
/// * `text`: The text the offsets point into, used to recompute the merged text.
pub fn merge_adjacent_spans(spans: Vec<Span>, text: &str) -> Vec<Span> {
    let index = TextIndex::new(text);
    merge_adjacent_spans_indexed(spans, &index)
}

pub(crate) fn merge_adjacent_spans_indexed(spans: Vec<Span>, index: &TextIndex) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for current in spans {
        match merged.last_mut() {
            Some(prev) if prev.label == current.label && current.start <= prev.end + 1 => {
                let new_end = prev.end.max(current.end);
                let prev_len = prev.len().max(1) as f64;
                let current_len = current.len().max(1) as f64;
                let combined = (score_or_zero(prev.score) * prev_len
                    + score_or_zero(current.score) * current_len)
                    / (prev_len + current_len);
                prev.end = new_end;
                prev.text = index.slice_clamped(prev.start, new_end).to_string();
                if combined.is_finite() {
                    prev.score = combined;
                }
            }
            _ => merged.push(current),
        }
    }
    merged
}

#[inline]
fn score_or_zero(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score
    }
}
