/*!
Classification of long notes. A note is cut into chunks a token classifier can handle, each chunk
is classified and grouped on its own, and the spans are moved back to document offsets.
*/
use crate::datastructure::TextIndex;
use crate::entity::{Span, Token};
use crate::grouper::{group_spans, merge_adjacent_spans_indexed, GroupingError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Debug, Display};

/// Chunk size used by `classify_document` callers that have no better figure.
pub const DEFAULT_MAX_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The chunk size must allow at least one char per chunk.
pub struct ChunkingError(usize);

impl Display for ChunkingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid chunk size: {}. A chunk must hold at least one char",
            self.0
        )
    }
}

impl Error for ChunkingError {}

/// A piece of a document, with its char offsets in the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextChunk<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

/// Cuts `text` into consecutive chunks of at most `max_chars` chars. Every chunk but the last
/// ends right after the last newline of its window, or else after the last space, or else at the
/// window end. The chunks tile the text exactly.
///
/// #Example
/// ```rust
/// use deidrev::split_into_chunks;
///
/// let chunks = split_into_chunks("line one\nline two", 12).unwrap();
/// let texts: Vec<&str> = chunks.iter().map(|c| c.text).collect();
/// assert_eq!(texts, vec!["line one\n", "line two"]);
/// ```
pub fn split_into_chunks(text: &str, max_chars: usize) -> Result<Vec<TextChunk<'_>>, ChunkingError> {
    if max_chars < 1 {
        return Err(ChunkingError(max_chars));
    }
    let index = TextIndex::new(text);
    let total = index.char_len();
    let mut chunks = vec![];
    let mut cursor = 0;
    while cursor < total {
        let window_end = (cursor + max_chars).min(total);
        let end = if window_end == total {
            total
        } else {
            index
                .rfind_within('\n', cursor, window_end)
                .or_else(|| index.rfind_within(' ', cursor, window_end))
                .map_or(window_end, |pos| pos + 1)
        };
        chunks.push(TextChunk {
            start: cursor,
            end,
            text: index.slice_clamped(cursor, end),
        });
        cursor = end;
    }
    Ok(chunks)
}

/// The model side of the pipeline: anything that turns a piece of text into classifier tokens.
/// Offsets in the returned tokens, when present, are char offsets into `chunk`.
pub trait TokenClassifier {
    type Error: Error;
    fn classify(&mut self, chunk: &str) -> Result<Vec<Token>, Self::Error>;
}

#[derive(Debug)]
/// Enum error encompassing the failures of `classify_document`.
pub enum PipelineError<E> {
    Chunking(ChunkingError),
    Classifier(E),
    Grouping(GroupingError),
}

impl<E: Display> Display for PipelineError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chunking(e) => Display::fmt(e, f),
            Self::Classifier(e) => write!(f, "Classifier failed: {}", e),
            Self::Grouping(e) => Display::fmt(e, f),
        }
    }
}

impl<E: Error + 'static> Error for PipelineError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Chunking(e) => Some(e),
            Self::Classifier(e) => Some(e),
            Self::Grouping(e) => Some(e),
        }
    }
}

impl<E> From<ChunkingError> for PipelineError<E> {
    fn from(value: ChunkingError) -> Self {
        Self::Chunking(value)
    }
}
impl<E> From<GroupingError> for PipelineError<E> {
    fn from(value: GroupingError) -> Self {
        Self::Grouping(value)
    }
}

/// Classifies a whole document. See `classify_document_with_progress`.
pub fn classify_document<C: TokenClassifier>(
    classifier: &mut C,
    text: &str,
    max_chars: usize,
) -> Result<Vec<Span>, PipelineError<C::Error>> {
    classify_document_with_progress(classifier, text, max_chars, |_, _| {})
}

/// Classifies a whole document chunk by chunk and returns its spans in document offsets.
///
/// Each chunk is grouped on its own, then the spans of every chunk go through one more merge pass
/// so an entity cut by a chunk border comes out whole. `on_progress` is called after each chunk
/// with the number of chunks done and the total.
pub fn classify_document_with_progress<C, P>(
    classifier: &mut C,
    text: &str,
    max_chars: usize,
    mut on_progress: P,
) -> Result<Vec<Span>, PipelineError<C::Error>>
where
    C: TokenClassifier,
    P: FnMut(usize, usize),
{
    let chunks = split_into_chunks(text, max_chars)?;
    if chunks.is_empty() {
        return Ok(vec![]);
    }
    let index = TextIndex::new(text);
    let total = chunks.len();
    let mut spans = vec![];
    for (done, chunk) in chunks.iter().enumerate() {
        let tokens = classifier
            .classify(chunk.text)
            .map_err(PipelineError::Classifier)?;
        let grouped = group_spans(&tokens, chunk.text)?;
        log::debug!(
            "chunk {}/{} [{}, {}): {} tokens, {} spans",
            done + 1,
            total,
            chunk.start,
            chunk.end,
            tokens.len(),
            grouped.len()
        );
        spans.extend(grouped.into_iter().map(|s| s.rebased(chunk.start)));
        on_progress(done + 1, total);
    }
    Ok(merge_adjacent_spans_indexed(spans, &index))
}
