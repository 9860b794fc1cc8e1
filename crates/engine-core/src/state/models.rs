use model::events::scan::ScanEvent;
use serde::Serialize;

/// Result of inserting a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventWrite {
    Inserted,
    /// The unique event id was already stored; nothing was written.
    AlreadyPresent,
}

/// Result of recording the raw copy of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawBatchWrite {
    Recorded,
    Duplicate,
}

/// Snapshot of the newest ingested scans, printed when a worker starts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSummary {
    pub latest: Option<ScanEvent>,
    pub latest_pickup: Option<ScanEvent>,
    pub latest_delivery: Option<ScanEvent>,
}

impl StoreSummary {
    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }
}
