//! One-shot processing of an uploaded object.

use console::style;

use crate::config::Settings;
use crate::models::StorageEvent;
use crate::services::{parse_gs_uri, InvoicePipeline, ProcessOutcome};
use crate::utils::mime_from_path;

/// Build the storage event for `name`, which may be a bare object name or a
/// `gs://` URI.
fn event_for(
    settings: &Settings,
    name: &str,
    bucket: Option<String>,
    content_type: Option<String>,
) -> anyhow::Result<StorageEvent> {
    let (bucket, name) = if name.starts_with("gs://") {
        let (uri_bucket, object) =
            parse_gs_uri(name).ok_or_else(|| anyhow::anyhow!("Invalid Cloud Storage URI: {}", name))?;
        if object.is_empty() {
            anyhow::bail!("{} does not name an object", name);
        }
        (uri_bucket, object)
    } else {
        (
            bucket.unwrap_or_else(|| settings.default_input_bucket()),
            name.to_string(),
        )
    };
    let content_type = content_type.unwrap_or_else(|| mime_from_path(&name));
    Ok(StorageEvent::new(bucket, name, content_type))
}

/// Run the pipeline for one object and print the report.
pub async fn cmd_process(
    settings: &Settings,
    name: &str,
    bucket: Option<String>,
    content_type: Option<String>,
) -> anyhow::Result<()> {
    let event = event_for(settings, name, bucket, content_type)?;
    eprintln!(
        "{} Processing {} ({})",
        style("→").cyan(),
        event.gcs_uri(),
        event.content_type
    );

    let pipeline = InvoicePipeline::from_settings(settings)?;
    let outcome = pipeline.process_event(&event).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    match &outcome {
        ProcessOutcome::Skipped { content_type } => {
            eprintln!(
                "{} Skipped: content type {:?} is not processed",
                style("!").yellow(),
                content_type
            );
            Ok(())
        }
        ProcessOutcome::Processed(report) if report.is_partial() => {
            eprintln!(
                "{} Wrote {} rows, but {} geocode requests were not published",
                style("✗").red(),
                report.rows.len(),
                report.publishes.failures.len()
            );
            anyhow::bail!("geocode requests were not published")
        }
        ProcessOutcome::Processed(report) => {
            eprintln!(
                "{} Wrote {} rows, archived to {}",
                style("✓").green(),
                report.rows.len(),
                report.archived_to
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use std::collections::HashMap;

    fn settings() -> Settings {
        let env: HashMap<&str, &str> = [
            ("GCP_PROJECT", "acme"),
            ("PARSER_LOCATION", "us"),
            ("PROCESSOR_ID", "abc123"),
            ("GCS_OUTPUT_URI_PREFIX", "processed"),
            ("GEOCODE_REQUEST_TOPICNAME", "geocode"),
            ("TIMEOUT", "300"),
        ]
        .into_iter()
        .collect();
        Settings::resolve(FileConfig::default(), |name| {
            env.get(name).map(|v| v.to_string())
        })
        .unwrap()
    }

    #[test]
    fn test_event_for_bare_name_uses_input_bucket() {
        let event = event_for(&settings(), "invoice2.pdf", None, None).unwrap();
        assert_eq!(
            event,
            StorageEvent::new("acme-input-invoices", "invoice2.pdf", "application/pdf")
        );
    }

    #[test]
    fn test_event_for_uri() {
        let event = event_for(&settings(), "gs://uploads/2024/scan.gif", None, None).unwrap();
        assert_eq!(event.bucket, "uploads");
        assert_eq!(event.name, "2024/scan.gif");
        assert_eq!(event.content_type, "image/gif");
    }

    #[test]
    fn test_event_for_explicit_content_type() {
        let event = event_for(
            &settings(),
            "scan",
            Some("other".to_string()),
            Some("image/tiff".to_string()),
        )
        .unwrap();
        assert_eq!(event, StorageEvent::new("other", "scan", "image/tiff"));
    }

    #[test]
    fn test_event_for_bucket_only_uri() {
        assert!(event_for(&settings(), "gs://uploads/", None, None).is_err());
    }
}
