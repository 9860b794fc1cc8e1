use engine_core::state::models::RawBatchWrite;
use model::events::scan::EventId;

/// Counters for a page that made it past validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    /// Cursor after the last event of the page.
    pub cursor: EventId,
    pub persisted: usize,
    /// Events whose id was already stored.
    pub already_present: usize,
    /// Events below the incoming cursor.
    pub skipped: usize,
    pub raw_batch: RawBatchWrite,
}

/// What processing one page did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Upstream had nothing new.
    Empty,
    /// The page starts at or below the cursor and was discarded.
    Stale {
        first_event_id: EventId,
        cursor: EventId,
    },
    /// Ids were not strictly ascending; the page was discarded.
    OutOfOrder { previous: EventId, next: EventId },
    Ingested(IngestSummary),
}

impl PageOutcome {
    /// Cursor after this outcome, given the cursor the page was processed against.
    pub fn cursor_after(&self, cursor: EventId) -> EventId {
        match self {
            PageOutcome::Ingested(summary) => summary.cursor,
            _ => cursor,
        }
    }

    /// Whether the page was thrown away without touching the store.
    pub fn is_discarded(&self) -> bool {
        matches!(
            self,
            PageOutcome::Stale { .. } | PageOutcome::OutOfOrder { .. }
        )
    }

    pub fn persisted(&self) -> usize {
        match self {
            PageOutcome::Ingested(summary) => summary.persisted,
            _ => 0,
        }
    }
}
