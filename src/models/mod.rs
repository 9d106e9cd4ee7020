//! Data models for parsed documents and trigger events.

mod document;
mod event;

pub use document::{Document, FormField, Layout, Page, TextAnchor, TextSegment};
pub use event::{EventError, StorageEvent};
