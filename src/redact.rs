use crate::datastructure::TextIndex;
use crate::entity::SpanLike;

/// Builds the de-identified version of `text`: every span is replaced by its label between
/// brackets and the text between spans is kept as is.
///
/// Spans are visited by start. A span starting inside an already replaced one still yields its
/// label. Offsets past the end of the text are clamped.
///
/// #Example
/// ```rust
/// use deidrev::{redact, Span};
///
/// let spans = vec![Span::new("PATIENT", "John Smith", 0, 10, 0.9)];
/// assert_eq!(redact("John Smith, 45", &spans), "[PATIENT], 45");
/// ```
pub fn redact<S: SpanLike>(text: &str, spans: &[S]) -> String {
    if spans.is_empty() {
        return text.to_string();
    }
    let index = TextIndex::new(text);
    let mut sorted: Vec<&S> = spans.iter().collect();
    sorted.sort_by_key(|s| s.start());

    let mut redacted = String::with_capacity(text.len());
    let mut pointer = 0;
    for span in sorted {
        if span.start() > pointer {
            redacted.push_str(index.slice_clamped(pointer, span.start()));
        }
        redacted.push('[');
        redacted.push_str(span.label());
        redacted.push(']');
        pointer = pointer.max(span.end());
    }
    redacted.push_str(index.slice_clamped(pointer, index.char_len()));
    redacted
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::{AnnotatedSpan, Span};
    use rstest::rstest;

    fn spans(bounds: &[(&str, usize, usize)]) -> Vec<Span> {
        bounds
            .iter()
            .map(|&(l, s, e)| Span::new(l, "", s, e, 1.0))
            .collect()
    }

    #[rstest]
    #[case("Seen by Dr. Smith on 3/4", vec![("DOCTOR", 12, 17), ("DATE", 21, 24)], "Seen by Dr. [DOCTOR] on [DATE]")]
    #[case("Ann Lee", vec![("PATIENT", 4, 7), ("PATIENT", 0, 3)], "[PATIENT] [PATIENT]")]
    #[case("abcdef", vec![("X", 0, 4), ("Y", 2, 3)], "[X][Y]ef")]
    #[case("abcdef", vec![("X", 0, 2), ("Y", 1, 4)], "[X][Y]ef")]
    #[case("Zoë, 45", vec![("AGE", 5, 7)], "Zoë, [AGE]")]
    #[case("abc", vec![("X", 1, 10)], "a[X]")]
    fn test_redact(
        #[case] text: &str,
        #[case] bounds: Vec<(&str, usize, usize)>,
        #[case] expected: &str,
    ) {
        assert_eq!(redact(text, &spans(&bounds)), expected);
    }

    #[test]
    fn test_redact_without_spans_is_identity() {
        let none: [AnnotatedSpan; 0] = [];
        assert_eq!(redact("nothing to hide", &none), "nothing to hide");
        assert_eq!(redact("", &none), "");
    }

    #[test]
    fn test_redact_annotations() {
        let annotations = [AnnotatedSpan::new("HOSP", "Mercy", 8, 13)];
        assert_eq!(redact("Back to Mercy.", &annotations), "Back to [HOSP].");
    }
}
