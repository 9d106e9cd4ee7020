//! Serde model of the Document AI `Document` JSON written by batch processing.
//!
//! Only the parts the extractor reads are modelled: the flat `text` blob and
//! the form fields of each page. Everything else in the output is ignored.
//!
//! Document AI serializes with proto3 JSON rules: `int64` values are quoted
//! strings and fields holding their zero value are omitted entirely. An
//! absent `startIndex` therefore means offset 0, not "unknown".

use serde::{Deserialize, Deserializer};

/// A parsed document as emitted by the processor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Flat text of the whole document; every text anchor points into it.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Document {
    /// Decode a document from the JSON bytes of an output artifact.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// All (name, value) form field pairs, page by page, in document order.
    pub fn field_pairs(&self) -> impl Iterator<Item = (&TextAnchor, &TextAnchor)> {
        self.pages.iter().flat_map(|page| {
            page.form_fields
                .iter()
                .map(|field| (&field.field_name.text_anchor, &field.field_value.text_anchor))
        })
    }
}

/// One page of a parsed document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub form_fields: Vec<FormField>,
}

/// A detected (label, value) association on a page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    #[serde(default)]
    pub field_name: Layout,
    #[serde(default)]
    pub field_value: Layout,
}

/// Layout block of a form field; only the text anchor is used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default)]
    pub text_anchor: TextAnchor,
}

/// Offset-based reference into `Document::text`, possibly multi-segment.
///
/// A value spanning several lines is stored as several segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnchor {
    #[serde(default)]
    pub text_segments: Vec<TextSegment>,
}

impl TextAnchor {
    /// Build an anchor from `(start, end)` code point ranges.
    pub fn from_ranges(ranges: &[(u64, u64)]) -> Self {
        Self {
            text_segments: ranges
                .iter()
                .map(|&(start, end)| TextSegment::new(start, end))
                .collect(),
        }
    }
}

/// Half-open `[start_index, end_index)` range of code points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    #[serde(default, deserialize_with = "deserialize_int64")]
    pub start_index: u64,
    #[serde(default, deserialize_with = "deserialize_int64")]
    pub end_index: u64,
}

impl TextSegment {
    pub fn new(start_index: u64, end_index: u64) -> Self {
        Self {
            start_index,
            end_index,
        }
    }
}

/// Accept proto3 `int64` values written either as strings or as numbers.
fn deserialize_int64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(u64),
        Text(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Number(n) => Ok(n),
        Int64::Text(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "mimeType": "application/pdf",
        "text": "Date: 2024-01-05\n",
        "pages": [{
            "pageNumber": 1,
            "formFields": [{
                "fieldName": {
                    "textAnchor": {"textSegments": [{"endIndex": "5"}]},
                    "confidence": 0.98
                },
                "fieldValue": {
                    "textAnchor": {"textSegments": [{"startIndex": "6", "endIndex": 16}]}
                }
            }]
        }]
    }"#;

    #[test]
    fn test_decodes_string_and_number_offsets() {
        let doc = Document::from_json(SAMPLE.as_bytes()).unwrap();
        let (name, value) = doc.field_pairs().next().unwrap();
        assert_eq!(name.text_segments, vec![TextSegment::new(0, 5)]);
        assert_eq!(value.text_segments, vec![TextSegment::new(6, 16)]);
    }

    #[test]
    fn test_missing_start_index_is_zero() {
        let segment: TextSegment = serde_json::from_str(r#"{"endIndex": "3"}"#).unwrap();
        assert_eq!(segment.start_index, 0);
        assert_eq!(segment.end_index, 3);
    }

    #[test]
    fn test_rejects_non_numeric_offset() {
        let result: Result<TextSegment, _> = serde_json::from_str(r#"{"startIndex": "abc"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_field_pairs_span_pages_in_order() {
        let json = r#"{
            "text": "abcdef",
            "pages": [
                {"formFields": [{"fieldName": {"textAnchor": {"textSegments": [{"endIndex": "1"}]}}}]},
                {},
                {"formFields": [{"fieldName": {"textAnchor": {"textSegments": [{"startIndex": "4", "endIndex": "5"}]}}}]}
            ]
        }"#;
        let doc = Document::from_json(json.as_bytes()).unwrap();
        let names: Vec<_> = doc.field_pairs().map(|(name, _)| name.clone()).collect();
        assert_eq!(
            names,
            vec![
                TextAnchor::from_ranges(&[(0, 1)]),
                TextAnchor::from_ranges(&[(4, 5)])
            ]
        );
    }

    #[test]
    fn test_empty_object_is_empty_document() {
        let doc = Document::from_json(b"{}").unwrap();
        assert!(doc.text.is_empty());
        assert_eq!(doc.field_pairs().count(), 0);
    }
}
