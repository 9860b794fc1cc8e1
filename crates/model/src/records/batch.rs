use crate::events::scan::{EventId, ScanEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page returned by a single upstream call.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// Events as received; ascending by event id when upstream behaves.
    pub events: Vec<ScanEvent>,
    /// Exact response body.
    pub raw: String,
}

impl ScanPage {
    pub fn new(events: Vec<ScanEvent>, raw: impl Into<String>) -> Self {
        Self {
            events,
            raw: raw.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn first_event_id(&self) -> Option<EventId> {
        self.events.first().map(|e| e.event_id)
    }

    pub fn last_event_id(&self) -> Option<EventId> {
        self.events.last().map(|e| e.event_id)
    }

    /// Returns the first pair of neighbouring ids that breaks strict ascending order.
    pub fn ordering_violation(&self) -> Option<(EventId, EventId)> {
        self.events
            .windows(2)
            .find(|pair| pair[1].event_id <= pair[0].event_id)
            .map(|pair| (pair[0].event_id, pair[1].event_id))
    }
}

/// Write-once audit copy of a page, keyed by `(worker_id, first_event_id)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RawBatch {
    pub worker_id: String,
    pub first_event_id: EventId,
    pub raw_payload: String,
    pub ingested_at: DateTime<Utc>,
}

impl RawBatch {
    pub fn for_page(worker_id: &str, page: &ScanPage) -> Option<Self> {
        let first_event_id = page.first_event_id()?;
        Some(Self {
            worker_id: worker_id.to_string(),
            first_event_id,
            raw_payload: page.raw.clone(),
            ingested_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::scan::ScanEventType;

    fn event(id: EventId) -> ScanEvent {
        ScanEvent {
            event_id: id,
            parcel_id: 1000 + id,
            event_type: ScanEventType::Status,
            created_at: Utc::now(),
            status_code: String::new(),
            run_id: String::new(),
            worker_id: String::new(),
        }
    }

    #[test]
    fn detects_ordering_violations() {
        let page = ScanPage::new(vec![event(1), event(2), event(5)], "{}");
        assert_eq!(page.ordering_violation(), None);

        let page = ScanPage::new(vec![event(1), event(3), event(3)], "{}");
        assert_eq!(page.ordering_violation(), Some((3, 3)));

        let page = ScanPage::new(vec![event(4), event(2)], "{}");
        assert_eq!(page.ordering_violation(), Some((4, 2)));
    }

    #[test]
    fn raw_batch_is_keyed_by_first_event() {
        let page = ScanPage::new(vec![event(7), event(8)], r#"{"ScanEvents":[]}"#);
        let raw = RawBatch::for_page("W_AKL", &page).unwrap();
        assert_eq!(raw.first_event_id, 7);
        assert_eq!(raw.worker_id, "W_AKL");
        assert_eq!(raw.raw_payload, page.raw);

        assert!(RawBatch::for_page("W_AKL", &ScanPage::default()).is_none());
    }
}
