pub mod outcome;
pub mod pipeline;

pub use outcome::{IngestSummary, PageOutcome};
pub use pipeline::IngestPipeline;
