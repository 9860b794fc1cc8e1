use crate::error::FetchError;
use async_trait::async_trait;
use model::{events::scan::EventId, records::batch::ScanPage};
use tracing::warn;

/// Hard ceiling on the number of events requested in one page.
pub const MAX_PAGE_LIMIT: u32 = 500;

/// Upstream feed of scan events.
///
/// One call returns one ordered page starting at `from_event_id`, holding at most
/// `limit` events. Failures never touch persisted state.
#[async_trait]
pub trait ScanSource: Send + Sync {
    async fn fetch(&self, from_event_id: EventId, limit: u32) -> Result<ScanPage, FetchError>;

    /// Human readable location of the feed, used in log lines.
    fn describe(&self) -> String;
}

/// Clamps a configured page size to [`MAX_PAGE_LIMIT`], warning when it had to.
pub fn effective_limit(configured: u32) -> u32 {
    if configured > MAX_PAGE_LIMIT {
        warn!(
            requested = configured,
            max = MAX_PAGE_LIMIT,
            "Requested page limit is {configured}. Changing to the maximum allowed ({MAX_PAGE_LIMIT})."
        );
        return MAX_PAGE_LIMIT;
    }
    configured.max(1)
}
