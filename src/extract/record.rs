//! Output shapes of extraction: the table row and the geocode request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::schema::CanonicalKey;

/// One row for the extracted-entities table, keyed by column name.
///
/// Keys not observed in the document are absent rather than null. Columns
/// outside the schema can only enter through `insert_column` and are removed
/// by `TableSchema::sanitize` before persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalRecord {
    fields: BTreeMap<String, String>,
}

impl CanonicalRecord {
    /// Start a record for one processed document.
    pub fn new(input_file_name: impl Into<String>) -> Self {
        let mut record = Self::default();
        record.set(CanonicalKey::InputFileName, input_file_name);
        record
    }

    /// Set a canonical column; a later value replaces an earlier one.
    pub fn set(&mut self, key: CanonicalKey, value: impl Into<String>) {
        self.fields.insert(key.as_str().to_string(), value.into());
    }

    /// Set an arbitrary column name.
    pub fn insert_column(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn get_key(&self, key: CanonicalKey) -> Option<&str> {
        self.get(key.as_str())
    }

    pub fn remove(&mut self, column: &str) -> Option<String> {
        self.fields.remove(column)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn input_file_name(&self) -> Option<&str> {
        self.get_key(CanonicalKey::InputFileName)
    }

    /// JSON object for a warehouse insert.
    pub fn to_json_row(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect()
    }
}

/// Side-channel message sent when an address is found, consumed by the
/// downstream geocoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeRequest {
    /// The field label exactly as it appears in the document (e.g. `Address:`).
    pub entity_type: String,
    pub entity_text: String,
    pub input_file_name: String,
}

impl GeocodeRequest {
    /// JSON bytes as published on the geocode topic.
    pub fn to_message_data(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
