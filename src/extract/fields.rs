//! Form field classification.
//!
//! Field labels are matched after trimming and lower-casing, so `"Date:"`,
//! `"DATE:"` and `" date: "` all land in the `date` column. Labels that match
//! nothing are ignored. When a column matches more than once the last
//! occurrence in document order wins.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{Document, TextAnchor};

use super::record::{CanonicalRecord, GeocodeRequest};
use super::schema::CanonicalKey;
use super::text_anchor::SourceText;
use super::ExtractError;

/// Label that additionally produces a geocode request.
const ADDRESS_LABEL: &str = "address:";

/// Built-in label table.
const BUILTIN_LABELS: &[(&str, CanonicalKey)] = &[
    ("date:", CanonicalKey::Date),
    ("invoice number:", CanonicalKey::InvoiceNumber),
    ("purchase order:", CanonicalKey::PurchaseOrder),
    ("payment due by:", CanonicalKey::DueDate),
    ("subtotal", CanonicalKey::Subtotal),
    ("tax", CanonicalKey::Tax),
    ("total", CanonicalKey::Total),
    (ADDRESS_LABEL, CanonicalKey::Address),
];

/// Normalize a raw field label for lookup.
pub fn normalize_label(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Lookup from normalized label to destination column name.
#[derive(Debug, Clone)]
pub struct LabelTable {
    columns: HashMap<String, String>,
}

impl LabelTable {
    pub fn builtin() -> Self {
        Self {
            columns: BUILTIN_LABELS
                .iter()
                .map(|(label, key)| (label.to_string(), key.as_str().to_string()))
                .collect(),
        }
    }

    /// Add configured aliases. Built-in labels keep their mapping.
    ///
    /// The column name is not checked against the schema here; a column the
    /// table does not declare is removed by the sanitizer before the insert.
    pub fn with_aliases<I, L, C>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (L, C)>,
        L: AsRef<str>,
        C: Into<String>,
    {
        for (label, column) in aliases {
            let label = normalize_label(label.as_ref());
            if BUILTIN_LABELS.iter().any(|(builtin, _)| *builtin == label) {
                tracing::warn!("Ignoring alias for built-in label {:?}", label);
                continue;
            }
            self.columns.insert(label, column.into());
        }
        self
    }

    /// Column for a raw label, if any.
    pub fn column_for(&self, raw_label: &str) -> Option<&str> {
        self.columns
            .get(&normalize_label(raw_label))
            .map(String::as_str)
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Result of extracting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub record: CanonicalRecord,
    /// Present when an address field was found; built from the last one.
    pub geocode_request: Option<GeocodeRequest>,
}

/// Turns a parsed document's form fields into a table row.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    labels: LabelTable,
}

impl FieldExtractor {
    pub fn new(labels: LabelTable) -> Self {
        Self { labels }
    }

    /// Extract every form field of a parsed document.
    pub fn extract(
        &self,
        document: &Document,
        input_file_name: &str,
    ) -> Result<Extraction, ExtractError> {
        self.extract_pairs(&document.text, document.field_pairs(), input_file_name)
    }

    /// Extract from explicit (name, value) anchor pairs into `text`.
    ///
    /// Stops at the first anchor that cannot be resolved.
    pub fn extract_pairs<'d, I>(
        &self,
        text: &str,
        pairs: I,
        input_file_name: &str,
    ) -> Result<Extraction, ExtractError>
    where
        I: IntoIterator<Item = (&'d TextAnchor, &'d TextAnchor)>,
    {
        let source = SourceText::new(text);
        let mut record = CanonicalRecord::new(input_file_name);
        let mut geocode_request = None;

        for (name_anchor, value_anchor) in pairs {
            let field_name = source.resolve(name_anchor)?;
            let field_value = source.resolve(value_anchor)?;

            let Some(column) = self.labels.column_for(&field_name) else {
                debug!("Ignoring field {:?}", field_name.trim());
                continue;
            };
            debug!("Matched field {:?} -> {}", field_name.trim(), column);

            // Aliased address columns are stored but never geocoded.
            if normalize_label(&field_name) == ADDRESS_LABEL {
                geocode_request = Some(GeocodeRequest {
                    entity_type: field_name.clone(),
                    entity_text: field_value.clone(),
                    input_file_name: input_file_name.to_string(),
                });
            }
            record.insert_column(column, field_value);
        }

        Ok(Extraction {
            record,
            geocode_request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out labelled values as a document text, returning anchor pairs.
    fn layout(fields: &[(&str, &str)]) -> (String, Vec<(TextAnchor, TextAnchor)>) {
        let mut text = String::new();
        let mut pairs = Vec::new();
        for (name, value) in fields {
            let name_start = text.chars().count() as u64;
            text.push_str(name);
            let name_end = text.chars().count() as u64;
            text.push('\n');
            let value_start = text.chars().count() as u64;
            text.push_str(value);
            let value_end = text.chars().count() as u64;
            text.push('\n');
            pairs.push((
                TextAnchor::from_ranges(&[(name_start, name_end)]),
                TextAnchor::from_ranges(&[(value_start, value_end)]),
            ));
        }
        (text, pairs)
    }

    fn run(fields: &[(&str, &str)]) -> Extraction {
        let (text, pairs) = layout(fields);
        FieldExtractor::default()
            .extract_pairs(&text, pairs.iter().map(|(n, v)| (n, v)), "invoice2.gif")
            .unwrap()
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [" Date: ", "INVOICE NUMBER:", "total", "\tTax\n", ""] {
            let once = normalize_label(raw);
            assert_eq!(normalize_label(&once), once);
        }
    }

    #[test]
    fn test_label_case_and_whitespace_insensitive() {
        let table = LabelTable::builtin();
        for raw in ["Date:", "DATE:", " date: "] {
            assert_eq!(table.column_for(raw), Some("date"));
        }
        assert_eq!(table.column_for("Payment Due By:"), Some("due_date"));
        assert_eq!(table.column_for("Date"), None);
    }

    #[test]
    fn test_unknown_labels_are_ignored() {
        let extraction = run(&[("Vendor ID:", "V-17"), ("Total", "9.99")]);
        assert_eq!(extraction.record.get("vendor id:"), None);
        assert_eq!(extraction.record.get("vendor_id"), None);
        assert_eq!(extraction.record.len(), 2);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let extraction = run(&[("Total", "100.00"), ("Total", "150.00")]);
        assert_eq!(extraction.record.get_key(CanonicalKey::Total), Some("150.00"));
    }

    #[test]
    fn test_invoice_scenario_without_address() {
        let text = "Invoice\nDate: 2024-01-05\nTotal\n42.00\n";
        let pairs = [
            (
                TextAnchor::from_ranges(&[(8, 13)]),
                TextAnchor::from_ranges(&[(14, 24)]),
            ),
            (
                TextAnchor::from_ranges(&[(25, 30)]),
                TextAnchor::from_ranges(&[(31, 36)]),
            ),
        ];

        let extraction = FieldExtractor::default()
            .extract_pairs(text, pairs.iter().map(|(n, v)| (n, v)), "invoice2.gif")
            .unwrap();

        let mut expected = CanonicalRecord::new("invoice2.gif");
        expected.set(CanonicalKey::Date, "2024-01-05");
        expected.set(CanonicalKey::Total, "42.00");
        assert_eq!(extraction.record, expected);
        assert_eq!(extraction.geocode_request, None);
    }

    #[test]
    fn test_address_emits_one_geocode_request() {
        let extraction = run(&[("Address:", "123 Main St"), ("Tax", "3.00")]);
        assert_eq!(
            extraction.record.get_key(CanonicalKey::Address),
            Some("123 Main St")
        );
        assert_eq!(
            extraction.geocode_request,
            Some(GeocodeRequest {
                entity_type: "Address:".to_string(),
                entity_text: "123 Main St".to_string(),
                input_file_name: "invoice2.gif".to_string(),
            })
        );
    }

    #[test]
    fn test_repeated_address_keeps_last_request() {
        let extraction = run(&[("Address:", "1 First Ave"), ("ADDRESS:", "2 Second Ave")]);
        let request = extraction.geocode_request.unwrap();
        assert_eq!(request.entity_type, "ADDRESS:");
        assert_eq!(request.entity_text, "2 Second Ave");
        assert_eq!(extraction.record.get("address"), Some("2 Second Ave"));
    }

    #[test]
    fn test_aliases_extend_but_do_not_override() {
        let table = LabelTable::builtin().with_aliases([("Vendor:", "supplier"), ("total", "x")]);
        assert_eq!(table.column_for("vendor:"), Some("supplier"));
        assert_eq!(table.column_for("Total"), Some("total"));
    }

    #[test]
    fn test_aliased_address_column_is_not_geocoded() {
        let labels = LabelTable::builtin().with_aliases([("Location:", "address")]);
        let (text, pairs) = layout(&[("Location:", "9 Harbour Rd")]);
        let extraction = FieldExtractor::new(labels)
            .extract_pairs(&text, pairs.iter().map(|(n, v)| (n, v)), "invoice2.gif")
            .unwrap();
        assert_eq!(extraction.record.get("address"), Some("9 Harbour Rd"));
        assert_eq!(extraction.geocode_request, None);
    }

    #[test]
    fn test_unresolvable_anchor_aborts() {
        let name = TextAnchor::from_ranges(&[(0, 4)]);
        let value = TextAnchor::from_ranges(&[(5, 500)]);
        let result =
            FieldExtractor::default().extract_pairs("Total 42", [(&name, &value)], "a.gif");
        assert!(matches!(
            result,
            Err(ExtractError::UnresolvableReference { end: 500, .. })
        ));
    }

    #[test]
    fn test_extract_document() {
        let json = r#"{
            "text": "Invoice Number:\nINV-9\n",
            "pages": [{"formFields": [{
                "fieldName": {"textAnchor": {"textSegments": [{"endIndex": "15"}]}},
                "fieldValue": {"textAnchor": {"textSegments": [{"startIndex": "16", "endIndex": "21"}]}}
            }]}]
        }"#;
        let document = Document::from_json(json.as_bytes()).unwrap();
        let extraction = FieldExtractor::default()
            .extract(&document, "inv.gif")
            .unwrap();
        assert_eq!(extraction.record.get("invoice_number"), Some("INV-9"));
    }
}
