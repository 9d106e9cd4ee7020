//! Service layer for the invoice pipeline.
//!
//! Used by both the HTTP trigger and the CLI.

pub mod naming;
pub mod pipeline;
pub mod publish;

pub use naming::{input_file_name_for, is_json_artifact, operation_output_prefix, parse_gs_uri};
pub use pipeline::{
    Collaborators, InvoicePipeline, PipelineConfig, PipelineError, ProcessOutcome, ProcessReport,
    WrittenRow,
};
pub use publish::{PendingPublishes, PublishFailure, PublishSummary};
