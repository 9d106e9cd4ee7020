//! MIME type helpers for uploaded invoices.

/// Content types the invoice processor accepts.
pub const SUPPORTED_CONTENT_TYPES: &[&str] = &["image/gif", "application/pdf", "image/tiff"];

/// Strip parameters (`; charset=...`) and lower-case a MIME type.
fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_lowercase()
}

/// Whether an upload of this content type should be processed.
pub fn is_supported_content_type(mime: &str) -> bool {
    let mime = essence(mime);
    SUPPORTED_CONTENT_TYPES.contains(&mime.as_str())
}

/// Guess a MIME type from an object name's extension.
pub fn mime_from_path(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
