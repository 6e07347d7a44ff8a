/*!
Char/byte offset bookkeeping for a source text. Every offset exposed by this crate counts chars
(Unicode scalar values), while slicing and searching a `str` works on bytes. The `TextIndex` is
built once per text and shared by the resolver, the grouper and the redaction code.
*/

/// Custom datastructure mapping char offsets to byte offsets.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub(crate) struct TextIndex<'a> {
    text: &'a str,
    /// Byte offset of every char, followed by `text.len()`. Always non-empty.
    byte_offsets: Box<[usize]>,
}

impl<'a> TextIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let mut byte_offsets = Vec::with_capacity(text.len() + 1);
        byte_offsets.extend(text.char_indices().map(|(i, _)| i));
        byte_offsets.push(text.len());
        Self {
            text,
            byte_offsets: byte_offsets.into_boxed_slice(),
        }
    }

    /// Number of chars in the text.
    #[inline]
    pub(crate) fn char_len(&self) -> usize {
        self.byte_offsets.len() - 1
    }

    #[inline]
    pub(crate) fn char_to_byte(&self, char_index: usize) -> Option<usize> {
        self.byte_offsets.get(char_index).copied()
    }

    /// Returns `None` when `byte_index` is not on a char boundary.
    #[inline]
    pub(crate) fn byte_to_char(&self, byte_index: usize) -> Option<usize> {
        self.byte_offsets.binary_search(&byte_index).ok()
    }

    /// Slice of the text between the chars `start` and `end`. `None` when the range is reversed
    /// or out of bounds.
    pub(crate) fn slice(&self, start: usize, end: usize) -> Option<&'a str> {
        if start > end {
            return None;
        }
        let byte_start = self.char_to_byte(start)?;
        let byte_end = self.char_to_byte(end)?;
        self.text.get(byte_start..byte_end)
    }

    /// Same as `slice`, but clamps both ends to the text length instead of failing.
    pub(crate) fn slice_clamped(&self, start: usize, end: usize) -> &'a str {
        let len = self.char_len();
        let end = end.min(len);
        let start = start.min(end);
        self.slice(start, end).unwrap_or_default()
    }

    /// Char offset of the first occurrence of `needle` at or after the char `cursor`.
    pub(crate) fn find_from(&self, needle: &str, cursor: usize) -> Option<usize> {
        let byte_cursor = self.char_to_byte(cursor)?;
        let found = self.text[byte_cursor..].find(needle)?;
        self.byte_to_char(byte_cursor + found)
    }

    /// Char offset of the last occurrence of `needle` inside the char window `[start, end)`.
    pub(crate) fn rfind_within(&self, needle: char, start: usize, end: usize) -> Option<usize> {
        let window = self.slice(start, end)?;
        let byte_start = self.char_to_byte(start)?;
        let found = window.rfind(needle)?;
        self.byte_to_char(byte_start + found)
    }
}
