//! Offline extraction from a saved Document JSON file.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::config::FileConfig;
use crate::extract::{Extraction, FieldExtractor, LabelTable, TableSchema};
use crate::models::Document;
use crate::services::input_file_name_for;

/// Extract `path` into a sanitized record.
fn extract_file(
    file_config: &FileConfig,
    path: &Path,
    input_file_name: Option<String>,
) -> anyhow::Result<(Extraction, Vec<String>)> {
    let bytes = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let document = Document::from_json(&bytes)
        .with_context(|| format!("{} is not a Document AI document", path.display()))?;

    let input_file_name =
        input_file_name.unwrap_or_else(|| input_file_name_for(&path.to_string_lossy()));
    let labels = LabelTable::builtin().with_aliases(file_config.extraction.aliases.iter());

    let mut extraction = FieldExtractor::new(labels).extract(&document, &input_file_name)?;
    let dropped = TableSchema::invoice().sanitize(&mut extraction.record);
    Ok((extraction, dropped))
}

/// Print the row and geocode request a document would produce.
pub fn cmd_extract(
    file_config: &FileConfig,
    path: &Path,
    input_file_name: Option<String>,
) -> anyhow::Result<()> {
    let (extraction, dropped) = extract_file(file_config, path, input_file_name)?;

    let output = serde_json::json!({
        "record": extraction.record,
        "geocode_request": extraction.geocode_request,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if !dropped.is_empty() {
        eprintln!(
            "{} Dropped columns not in the table: {}",
            style("!").yellow(),
            dropped.join(", ")
        );
    }
    Ok(())
}
