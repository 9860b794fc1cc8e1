pub mod error;
pub mod ingest;

pub use ingest::{IngestPipeline, IngestSummary, PageOutcome};
