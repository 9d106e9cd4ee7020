//! Shared utility functions.
//!
//! - `mime`: content types accepted by the document processor

mod mime;

pub use mime::{is_supported_content_type, mime_from_path, SUPPORTED_CONTENT_TYPES};
