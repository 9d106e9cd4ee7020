//! Object naming conventions.

use std::sync::LazyLock;

use regex::Regex;

/// Extension recorded for every processed invoice, whatever the processor
/// wrote. Uploads are GIF scans by convention of the upstream capture step.
const RECORDED_EXTENSION: &str = "gif";

static GS_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^gs://([^/]+)/?(.*)$").unwrap());

/// `input_file_name` for an output artifact `<prefix>/<base>.<ext>`.
pub fn input_file_name_for(artifact: &str) -> String {
    let file = artifact.rsplit('/').next().unwrap_or(artifact);
    let base = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    format!("{}.{}", base, RECORDED_EXTENSION)
}

/// Whether a listed output object is a Document JSON artifact.
pub fn is_json_artifact(name: &str) -> bool {
    name.ends_with(".json")
}

/// Prefix one batch operation writes its output under.
///
/// The processor nests results in a directory named after the operation id,
/// the last segment of the operation name.
pub fn operation_output_prefix(prefix: &str, operation: &str) -> String {
    let id = operation.rsplit('/').next().unwrap_or(operation);
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{}{}/", prefix, id)
    } else {
        format!("{}/{}/", prefix, id)
    }
}

/// Split `gs://bucket/path` into bucket and object path.
pub fn parse_gs_uri(uri: &str) -> Option<(String, String)> {
    let caps = GS_URI.captures(uri)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_file_name_swaps_extension() {
        assert_eq!(
            input_file_name_for("processed/12345/0/invoice2-0.json"),
            "invoice2-0.gif"
        );
        assert_eq!(input_file_name_for("invoice2.json"), "invoice2.gif");
    }

    #[test]
    fn test_input_file_name_without_extension() {
        assert_eq!(input_file_name_for("processed/invoice2"), "invoice2.gif");
    }

    #[test]
    fn test_input_file_name_keeps_inner_dots() {
        assert_eq!(input_file_name_for("out/acme.2024.01.json"), "acme.2024.01.gif");
    }

    #[test]
    fn test_json_artifact_detection() {
        assert!(is_json_artifact("processed/1/invoice-0.json"));
        assert!(!is_json_artifact("processed/1/"));
        assert!(!is_json_artifact("processed/1/invoice.gif"));
    }

    #[test]
    fn test_operation_output_prefix() {
        let operation = "projects/acme/locations/us/operations/8213659";
        assert_eq!(
            operation_output_prefix("processed/", operation),
            "processed/8213659/"
        );
        assert_eq!(
            operation_output_prefix("processed", operation),
            "processed/8213659/"
        );
        assert_eq!(operation_output_prefix("", operation), "8213659/");
    }

    #[test]
    fn test_parse_gs_uri() {
        assert_eq!(
            parse_gs_uri("gs://acme-output-invoices/processed/"),
            Some(("acme-output-invoices".to_string(), "processed/".to_string()))
        );
        assert_eq!(
            parse_gs_uri("gs://bucket"),
            Some(("bucket".to_string(), String::new()))
        );
        assert_eq!(parse_gs_uri("s3://bucket/key"), None);
        assert_eq!(parse_gs_uri("gs:///key"), None);
    }
}
