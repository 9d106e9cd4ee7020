//! The invoice table schema.
//!
//! `CanonicalKey::ALL` is the one place the column list is declared. The
//! sanitizer, the `schema` command and table provisioning all read it.

use std::fmt;

use serde_json::json;

use super::record::CanonicalRecord;

/// The ten columns of the extracted-entities table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalKey {
    InputFileName,
    Address,
    Supplier,
    InvoiceNumber,
    PurchaseOrder,
    Date,
    DueDate,
    Subtotal,
    Tax,
    Total,
}

impl CanonicalKey {
    /// Columns in table order.
    pub const ALL: [CanonicalKey; 10] = [
        CanonicalKey::InputFileName,
        CanonicalKey::Address,
        CanonicalKey::Supplier,
        CanonicalKey::InvoiceNumber,
        CanonicalKey::PurchaseOrder,
        CanonicalKey::Date,
        CanonicalKey::DueDate,
        CanonicalKey::Subtotal,
        CanonicalKey::Tax,
        CanonicalKey::Total,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputFileName => "input_file_name",
            Self::Address => "address",
            Self::Supplier => "supplier",
            Self::InvoiceNumber => "invoice_number",
            Self::PurchaseOrder => "purchase_order",
            Self::Date => "date",
            Self::DueDate => "due_date",
            Self::Subtotal => "subtotal",
            Self::Tax => "tax",
            Self::Total => "total",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column types used by the table. Every extracted value is kept as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "STRING",
        }
    }
}

/// A declared table schema: ordered (column, type) pairs.
#[derive(Debug, Clone)]
pub struct TableSchema {
    columns: Vec<(CanonicalKey, ColumnType)>,
}

impl TableSchema {
    /// The extracted-entities schema.
    pub fn invoice() -> Self {
        Self {
            columns: CanonicalKey::ALL
                .into_iter()
                .map(|key| (key, ColumnType::String))
                .collect(),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (CanonicalKey, ColumnType)> + '_ {
        self.columns.iter().copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|(key, _)| key.as_str() == column)
    }

    /// Drop every key the table does not declare.
    ///
    /// Returns the dropped keys. Unknown fields would fail the whole insert,
    /// so this runs right before a record is handed to the warehouse.
    pub fn sanitize(&self, record: &mut CanonicalRecord) -> Vec<String> {
        let dropped: Vec<String> = record
            .keys()
            .filter(|key| !self.contains(key))
            .map(str::to_string)
            .collect();
        for key in &dropped {
            tracing::warn!("Deleting key not in table schema: {}", key);
            record.remove(key);
        }
        dropped
    }

    /// BigQuery `TableSchema` JSON (`{"fields": [...]}`).
    pub fn to_bigquery_json(&self) -> serde_json::Value {
        let fields: Vec<_> = self
            .columns
            .iter()
            .map(|(key, ty)| json!({"name": key.as_str(), "type": ty.as_str(), "mode": "NULLABLE"}))
            .collect();
        json!({ "fields": fields })
    }
}

impl Default for TableSchema {
    fn default() -> Self {
        Self::invoice()
    }
}
