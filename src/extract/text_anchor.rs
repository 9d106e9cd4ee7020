//! Resolution of text anchors back into literal text.
//!
//! Document AI identifies form fields by code point offsets into the
//! document's flat text. Rust strings index by byte, so the source text keeps
//! a table of code point boundaries and every offset goes through it.

use crate::models::TextAnchor;

use super::ExtractError;

/// Immutable document text with a code point to byte offset table.
pub struct SourceText<'a> {
    text: &'a str,
    /// Byte offset of every code point, followed by `text.len()`.
    boundaries: Vec<usize>,
}

impl<'a> SourceText<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { text, boundaries }
    }

    /// Length in code points.
    fn len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// The substring between two code point offsets.
    pub fn slice(&self, start: u64, end: u64) -> Result<&'a str, ExtractError> {
        let len = self.len();
        let in_range = |offset: u64| usize::try_from(offset).ok().filter(|&o| o <= len);
        match (in_range(start), in_range(end)) {
            (Some(s), Some(e)) if s <= e => Ok(&self.text[self.boundaries[s]..self.boundaries[e]]),
            _ => Err(ExtractError::UnresolvableReference { start, end, len }),
        }
    }

    /// Concatenate the text of every segment of an anchor, in order.
    ///
    /// A value spanning several lines is stored as several segments; no
    /// separator is inserted between them.
    pub fn resolve(&self, anchor: &TextAnchor) -> Result<String, ExtractError> {
        let mut resolved = String::new();
        for segment in &anchor.text_segments {
            resolved.push_str(self.slice(segment.start_index, segment.end_index)?);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Invoice\nDate: 2024-01-05\nTotal\n42.00\n";

    #[test]
    fn test_single_segment_is_plain_slice() {
        let source = SourceText::new(TEXT);
        for (start, end) in [(0, 7), (8, 13), (14, 24), (0, 0), (36, 37)] {
            let anchor = TextAnchor::from_ranges(&[(start, end)]);
            assert_eq!(
                source.resolve(&anchor).unwrap(),
                &TEXT[start as usize..end as usize]
            );
        }
    }

    #[test]
    fn test_multiple_segments_concatenate_without_separator() {
        let source = SourceText::new(TEXT);
        let anchor = TextAnchor::from_ranges(&[(25, 30), (31, 36)]);
        assert_eq!(source.resolve(&anchor).unwrap(), "Total42.00");
    }

    #[test]
    fn test_empty_anchor_is_empty_string() {
        let source = SourceText::new(TEXT);
        assert_eq!(source.resolve(&TextAnchor::default()).unwrap(), "");
    }

    #[test]
    fn test_offsets_are_code_points() {
        let source = SourceText::new("Straße 5, Zürich");
        assert_eq!(source.len(), 16);
        let anchor = TextAnchor::from_ranges(&[(0, 6), (10, 16)]);
        assert_eq!(source.resolve(&anchor).unwrap(), "StraßeZürich");
    }

    #[test]
    fn test_end_past_text_is_rejected() {
        let source = SourceText::new("abc");
        let err = source
            .resolve(&TextAnchor::from_ranges(&[(1, 4)]))
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::UnresolvableReference {
                start: 1,
                end: 4,
                len: 3
            }
        ));
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let source = SourceText::new("abcdef");
        assert!(source.slice(4, 2).is_err());
    }

    #[test]
    fn test_failure_in_later_segment_fails_whole_anchor() {
        let source = SourceText::new("abcdef");
        let anchor = TextAnchor::from_ranges(&[(0, 2), (5, 99)]);
        assert!(source.resolve(&anchor).is_err());
    }
}
