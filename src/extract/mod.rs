//! Field extraction from parsed invoices.
//!
//! Pure transformation with no I/O:
//! - `text_anchor`: resolve offset anchors into literal text
//! - `fields`: classify form fields into table columns
//! - `schema`: the declared table schema and the record sanitizer
//! - `record`: the table row and the geocode side message

mod fields;
mod record;
mod schema;
mod text_anchor;

pub use fields::{normalize_label, Extraction, FieldExtractor, LabelTable};
pub use record::{CanonicalRecord, GeocodeRequest};
pub use schema::{CanonicalKey, ColumnType, TableSchema};
pub use text_anchor::SourceText;

use thiserror::Error;

/// Errors from field extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Text reference [{start}, {end}) cannot be resolved against text of length {len}")]
    UnresolvableReference { start: u64, end: u64, len: usize },
}
