use crate::events::scan::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable progress marker for one worker identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkerCursor {
    pub worker_id: String,
    /// Last successfully ingested event id; 0 when nothing was ingested yet.
    pub last_event_id: EventId,
    pub updated_at: DateTime<Utc>,
}

impl WorkerCursor {
    pub fn new(worker_id: impl Into<String>, last_event_id: EventId) -> Self {
        Self {
            worker_id: worker_id.into(),
            last_event_id,
            updated_at: Utc::now(),
        }
    }

    /// First event id the next fetch should ask for.
    pub fn next_event_id(&self) -> EventId {
        self.last_event_id.saturating_add(1)
    }
}
