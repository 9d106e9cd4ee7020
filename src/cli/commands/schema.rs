//! Table schema command.

use crate::extract::TableSchema;

/// Print the table schema in the form `bq mk --schema` accepts.
pub fn cmd_schema() -> anyhow::Result<()> {
    let schema = TableSchema::invoice().to_bigquery_json();
    println!("{}", serde_json::to_string_pretty(&schema["fields"])?);
    Ok(())
}
