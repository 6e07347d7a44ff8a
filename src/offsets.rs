/*!
Recovers the char offsets of classifier tokens that come without them. The subword text of each
token is decoded and searched in the source text, moving a cursor forward so repeated words are
attributed in order.
*/
use crate::datastructure::TextIndex;
use crate::entity::Token;
use std::error::Error;
use std::fmt::Display;

/// Byte-level BPE (`Ġ`) and SentencePiece (`▁`) word-start markers.
const WORD_START_MARKERS: [char; 2] = ['Ġ', '▁'];
/// Byte-level BPE newline marker.
const NEWLINE_MARKER: char = 'Ċ';
/// WordPiece continuation marker.
const CONTINUATION_MARKER: &str = "##";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// The decoded text of a token could not be found anywhere in the source text.
pub struct TokenAlignmentError(String);

impl TokenAlignmentError {
    /// The decoded token that could not be located.
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl Display for TokenAlignmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to locate token \"{}\" in source text", self.0)
    }
}

impl Error for TokenAlignmentError {}

/// Replaces the tokenizer markers of a subword by the whitespace they stand for, strips the
/// continuation marker and trims the result.
pub(crate) fn decode_token_word(word: &str) -> String {
    let replaced: String = word
        .chars()
        .map(|c| match c {
            c if WORD_START_MARKERS.contains(&c) => ' ',
            NEWLINE_MARKER => '\n',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim();
    trimmed
        .strip_prefix(CONTINUATION_MARKER)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Returns the tokens with `start`/`end` filled in, such that each token's decoded text occurs at
/// that offset in `text`.
///
/// * Tokens which already carry both offsets are passed through unchanged and only move the
///   cursor forward.
/// * Tokens whose decoded text is empty become a zero-width span at the cursor.
/// * Other tokens are searched from the cursor, then from the start of the text. Failing both,
///   a `TokenAlignmentError` is returned.
///
/// #Example
/// ```rust
/// use deidrev::{resolve_offsets, Token};
///
/// let tokens = vec![
///     Token::unaligned("B-PATIENT", "ĠJohn", 0.9),
///     Token::unaligned("L-PATIENT", "ĠSmith", 0.8),
/// ];
/// let resolved = resolve_offsets(&tokens, "John Smith").unwrap();
/// assert_eq!(resolved[0].offsets(), Some((0, 4)));
/// assert_eq!(resolved[1].offsets(), Some((5, 10)));
/// ```
pub fn resolve_offsets(tokens: &[Token], text: &str) -> Result<Vec<Token>, TokenAlignmentError> {
    let index = TextIndex::new(text);
    resolve_offsets_indexed(tokens, &index)
}

pub(crate) fn resolve_offsets_indexed(
    tokens: &[Token],
    index: &TextIndex,
) -> Result<Vec<Token>, TokenAlignmentError> {
    let mut cursor = 0;
    tokens
        .iter()
        .map(|token| {
            if let Some((_, end)) = token.offsets() {
                cursor = cursor.max(end);
                return Ok(token.clone());
            }
            let decoded = decode_token_word(token.word.as_deref().unwrap_or_default());
            if decoded.is_empty() {
                return Ok(token.clone().with_offsets(cursor, cursor));
            }
            let start = match index.find_from(&decoded, cursor) {
                Some(start) => start,
                None => {
                    log::debug!(
                        "token \"{}\" not found after offset {}, searching from the start",
                        decoded,
                        cursor
                    );
                    index
                        .find_from(&decoded, 0)
                        .ok_or_else(|| TokenAlignmentError(decoded.clone()))?
                }
            };
            let end = start + decoded.chars().count();
            cursor = end;
            Ok(token.clone().with_offsets(start, end))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ĠJohn", "John")]
    #[case("▁Smith", "Smith")]
    #[case("##son", "son")]
    #[case("ĊĊ", "")]
    #[case("Ġ", "")]
    #[case("St.", "St.")]
    #[case("ĠNew▁York", "New York")]
    fn test_decode_token_word(#[case] word: &str, #[case] expected: &str) {
        assert_eq!(decode_token_word(word), expected);
    }

    #[test]
    fn test_resolve_offsets_repeated_words_in_order() {
        let text = "Ann met Ann";
        let tokens = vec![
            Token::unaligned("U-PATIENT", "ĠAnn", 0.9),
            Token::unaligned("O", "Ġmet", 0.9),
            Token::unaligned("U-PATIENT", "ĠAnn", 0.9),
        ];
        let resolved = resolve_offsets(&tokens, text).unwrap();
        let offsets: Vec<_> = resolved.iter().map(|t| t.offsets().unwrap()).collect();
        assert_eq!(offsets, vec![(0, 3), (4, 7), (8, 11)]);
    }

    #[test]
    fn test_resolve_offsets_pass_through_moves_cursor() {
        let text = "Ann met Ann";
        let tokens = vec![
            Token::tagged("U-PATIENT", 8, 11, 0.9),
            Token::unaligned("O", "Ġmet", 0.9),
        ];
        let resolved = resolve_offsets(&tokens, text).unwrap();
        assert_eq!(resolved[0], tokens[0]);
        // Not found after the cursor (11), found again from the start.
        assert_eq!(resolved[1].offsets(), Some((4, 7)));
    }

    #[test]
    fn test_resolve_offsets_empty_token_is_zero_width_at_cursor() {
        let tokens = vec![
            Token::unaligned("B-HOSP", "ĠMercy", 0.9),
            Token::unaligned("I-HOSP", "Ġ", 0.9),
        ];
        let resolved = resolve_offsets(&tokens, "Mercy General").unwrap();
        assert_eq!(resolved[1].offsets(), Some((5, 5)));
    }

    #[test]
    fn test_resolve_offsets_multibyte_text_uses_char_offsets() {
        let tokens = vec![Token::unaligned("U-DOCTOR", "ĠMüller", 0.9)];
        let resolved = resolve_offsets(&tokens, "Dr. Müller").unwrap();
        assert_eq!(resolved[0].offsets(), Some((4, 10)));
    }

    #[test]
    fn test_resolve_offsets_missing_token_is_an_error() {
        let tokens = vec![Token::unaligned("U-PATIENT", "ĠZed", 0.9)];
        let err = resolve_offsets(&tokens, "John Smith").unwrap_err();
        assert_eq!(err.token(), "Zed");
        assert_eq!(
            err.to_string(),
            "Failed to locate token \"Zed\" in source text"
        );
    }

    #[test]
    fn test_resolve_offsets_empty_input() {
        assert!(resolve_offsets(&[], "anything").unwrap().is_empty());
    }
}
