use crate::{
    error::IngestError,
    ingest::outcome::{IngestSummary, PageOutcome},
};
use engine_config::settings::CommitMode;
use engine_core::state::{
    ScanStore,
    models::{EventWrite, RawBatchWrite},
};
use model::{
    events::scan::{EventId, ScanEvent},
    records::batch::{RawBatch, ScanPage},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Validates a fetched page and writes it through to the store.
///
/// The raw payload is recorded once per `(worker, first event id)`, then every event is
/// persisted in ascending id order with the cursor following it.
pub struct IngestPipeline {
    store: Arc<dyn ScanStore>,
    commit_mode: CommitMode,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn ScanStore>, commit_mode: CommitMode) -> Self {
        Self { store, commit_mode }
    }

    pub fn commit_mode(&self) -> CommitMode {
        self.commit_mode
    }

    pub async fn process(
        &self,
        page: ScanPage,
        worker_id: &str,
        cursor: EventId,
    ) -> Result<PageOutcome, IngestError> {
        let Some(raw_batch) = RawBatch::for_page(worker_id, &page) else {
            info!(worker_id, cursor, "No new scan events.");
            return Ok(PageOutcome::Empty);
        };
        let first_event_id = raw_batch.first_event_id;

        if let Some((previous, next)) = page.ordering_violation() {
            warn!(
                worker_id,
                cursor, previous, next, "Scan event page is not in ascending order; discarding it."
            );
            return Ok(PageOutcome::OutOfOrder { previous, next });
        }

        if first_event_id <= cursor {
            warn!(
                worker_id,
                cursor, first_event_id, "Stale scan event page; nothing will be persisted."
            );
            return Ok(PageOutcome::Stale {
                first_event_id,
                cursor,
            });
        }

        let raw_write = self
            .store
            .record_raw_batch(&raw_batch)
            .await
            .map_err(|source| IngestError::RawBatch {
                first_event_id,
                source,
            })?;
        if raw_write == RawBatchWrite::Duplicate {
            warn!(
                worker_id,
                first_event_id, "Raw batch already recorded; keeping the stored copy."
            );
        }

        let mut summary = IngestSummary {
            cursor,
            persisted: 0,
            already_present: 0,
            skipped: 0,
            raw_batch: raw_write,
        };

        for mut event in page.events {
            if event.event_id < summary.cursor {
                warn!(
                    worker_id,
                    event_id = event.event_id,
                    cursor = summary.cursor,
                    "Scan event already ingested; skipping."
                );
                summary.skipped += 1;
                continue;
            }

            event.claim(worker_id);
            match self.persist(worker_id, &event).await? {
                EventWrite::Inserted => summary.persisted += 1,
                EventWrite::AlreadyPresent => {
                    debug!(event_id = event.event_id, "Scan event already stored.");
                    summary.already_present += 1;
                }
            }
            summary.cursor = event.event_id;
        }

        info!(
            worker_id,
            cursor = summary.cursor,
            persisted = summary.persisted,
            already_present = summary.already_present,
            skipped = summary.skipped,
            "Scan event page ingested."
        );
        Ok(PageOutcome::Ingested(summary))
    }

    async fn persist(&self, worker_id: &str, event: &ScanEvent) -> Result<EventWrite, IngestError> {
        let event_id = event.event_id;
        match self.commit_mode {
            CommitMode::Atomic => self
                .store
                .insert_event_and_advance(worker_id, event)
                .await
                .map_err(|source| IngestError::Event { event_id, source }),
            CommitMode::TwoStep => {
                let written = self
                    .store
                    .insert_event(event)
                    .await
                    .map_err(|source| IngestError::Event { event_id, source })?;
                self.store
                    .advance_cursor(worker_id, event_id)
                    .await
                    .map_err(|source| IngestError::Cursor {
                        worker_id: worker_id.to_string(),
                        event_id,
                        source,
                    })?;
                Ok(written)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use engine_core::{
        error::StoreError,
        state::{CursorStore, faulty::FaultyStore, memory::MemoryScanStore},
    };
    use model::events::scan::ScanEventType;
    use tracing_test::traced_test;

    const WORKER: &str = "W_AKL";

    fn event(id: EventId, event_type: ScanEventType) -> ScanEvent {
        ScanEvent {
            event_id: id,
            parcel_id: 5000 + id.rem_euclid(1000),
            event_type,
            created_at: Utc::now(),
            status_code: String::new(),
            run_id: "run-1".into(),
            worker_id: String::new(),
        }
    }

    fn page(ids: &[EventId]) -> ScanPage {
        let events = ids
            .iter()
            .map(|id| event(*id, ScanEventType::Status))
            .collect();
        ScanPage::new(events, format!("{{\"ScanEvents\":{ids:?}}}"))
    }

    fn pipeline(store: &Arc<MemoryScanStore>, mode: CommitMode) -> IngestPipeline {
        IngestPipeline::new(store.clone(), mode)
    }

    #[tokio::test]
    #[traced_test]
    async fn empty_page_is_a_no_op() {
        let store = Arc::new(MemoryScanStore::new());
        let outcome = pipeline(&store, CommitMode::Atomic)
            .process(ScanPage::default(), WORKER, 7)
            .await
            .unwrap();

        assert_eq!(outcome, PageOutcome::Empty);
        assert_eq!(outcome.cursor_after(7), 7);
        assert!(store.events().await.is_empty());
        assert!(store.raw_batches(WORKER).await.is_empty());
        assert!(logs_contain("No new scan events."));
    }

    #[tokio::test]
    async fn ingests_pickup_and_delivery_from_scratch() {
        let store = Arc::new(MemoryScanStore::new());
        let page = ScanPage::new(
            vec![
                event(1, ScanEventType::Pickup),
                event(2, ScanEventType::Delivery),
            ],
            "{}",
        );

        let outcome = pipeline(&store, CommitMode::Atomic)
            .process(page, WORKER, 0)
            .await
            .unwrap();

        let PageOutcome::Ingested(summary) = outcome else {
            panic!("expected ingested page, got {outcome:?}");
        };
        assert_eq!(summary.cursor, 2);
        assert_eq!(summary.persisted, 2);
        assert_eq!(summary.raw_batch, RawBatchWrite::Recorded);
        assert_eq!(store.get_cursor(WORKER).await.unwrap(), 2);
        assert_eq!(store.raw_batches(WORKER).await.len(), 1);

        let events = store.events().await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.worker_id == WORKER));
    }

    #[tokio::test]
    async fn persists_in_ascending_order() {
        let store = Arc::new(MemoryScanStore::new());
        pipeline(&store, CommitMode::Atomic)
            .process(page(&[11, 12, 15, 20]), WORKER, 10)
            .await
            .unwrap();

        assert_eq!(store.insert_order().await, vec![11, 12, 15, 20]);
        assert_eq!(store.get_cursor(WORKER).await.unwrap(), 20);
    }

    #[tokio::test]
    #[traced_test]
    async fn stale_page_leaves_everything_untouched() {
        let store = Arc::new(MemoryScanStore::new());
        store.advance_cursor(WORKER, 50).await.unwrap();

        let outcome = pipeline(&store, CommitMode::Atomic)
            .process(page(&[10, 11, 12]), WORKER, 50)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PageOutcome::Stale {
                first_event_id: 10,
                cursor: 50
            }
        );
        assert!(outcome.is_discarded());
        assert_eq!(store.get_cursor(WORKER).await.unwrap(), 50);
        assert!(store.events().await.is_empty());
        assert!(store.raw_batches(WORKER).await.is_empty());
        assert!(logs_contain("Stale scan event page"));
    }

    #[tokio::test]
    async fn page_starting_at_cursor_is_stale() {
        let store = Arc::new(MemoryScanStore::new());
        let outcome = pipeline(&store, CommitMode::Atomic)
            .process(page(&[5, 6]), WORKER, 5)
            .await
            .unwrap();
        assert!(matches!(outcome, PageOutcome::Stale { .. }));
    }

    #[tokio::test]
    async fn page_at_the_largest_event_id_is_stale_once_ingested() {
        let store = Arc::new(MemoryScanStore::new());
        let pipeline = pipeline(&store, CommitMode::Atomic);
        let first = pipeline
            .process(page(&[EventId::MAX]), WORKER, EventId::MAX - 1)
            .await
            .unwrap();
        assert_eq!(first.cursor_after(EventId::MAX - 1), EventId::MAX);

        let again = pipeline
            .process(page(&[EventId::MAX]), WORKER, EventId::MAX)
            .await
            .unwrap();
        assert_eq!(
            again,
            PageOutcome::Stale {
                first_event_id: EventId::MAX,
                cursor: EventId::MAX
            }
        );
        assert_eq!(store.events().await.len(), 1);
    }

    #[tokio::test]
    async fn replaying_an_ingested_page_changes_nothing() {
        let store = Arc::new(MemoryScanStore::new());
        let pipeline = pipeline(&store, CommitMode::Atomic);
        pipeline.process(page(&[1, 2, 3]), WORKER, 0).await.unwrap();

        let outcome = pipeline.process(page(&[1, 2, 3]), WORKER, 3).await.unwrap();

        assert!(outcome.is_discarded());
        assert_eq!(store.get_cursor(WORKER).await.unwrap(), 3);
        assert_eq!(store.events().await.len(), 3);
        assert_eq!(store.raw_batches(WORKER).await.len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn duplicate_raw_batch_is_recorded_once() {
        let store = Arc::new(MemoryScanStore::new());
        let pipeline = pipeline(&store, CommitMode::Atomic);
        pipeline.process(page(&[1, 2]), WORKER, 0).await.unwrap();

        // Operator rewound the cursor; the same page arrives again.
        store.advance_cursor(WORKER, 0).await.unwrap();
        let outcome = pipeline.process(page(&[1, 2]), WORKER, 0).await.unwrap();

        let PageOutcome::Ingested(summary) = outcome else {
            panic!("expected ingested page, got {outcome:?}");
        };
        assert_eq!(summary.raw_batch, RawBatchWrite::Duplicate);
        assert_eq!(summary.persisted, 0);
        assert_eq!(summary.already_present, 2);
        assert_eq!(summary.cursor, 2);
        assert_eq!(store.raw_batches(WORKER).await.len(), 1);
        assert_eq!(store.events().await.len(), 2);
        assert!(logs_contain("Raw batch already recorded"));
    }

    #[tokio::test]
    #[traced_test]
    async fn out_of_order_page_is_rejected() {
        let store = Arc::new(MemoryScanStore::new());
        let outcome = pipeline(&store, CommitMode::Atomic)
            .process(page(&[3, 5, 4]), WORKER, 0)
            .await
            .unwrap();

        assert_eq!(outcome, PageOutcome::OutOfOrder { previous: 5, next: 4 });
        assert_eq!(outcome.cursor_after(0), 0);
        assert!(store.events().await.is_empty());
        assert!(store.raw_batches(WORKER).await.is_empty());
        assert!(logs_contain("not in ascending order"));
    }

    #[tokio::test]
    async fn keeps_upstream_worker_id() {
        let store = Arc::new(MemoryScanStore::new());
        let mut foreign = event(1, ScanEventType::Status);
        foreign.worker_id = "W_CHC".into();

        pipeline(&store, CommitMode::Atomic)
            .process(ScanPage::new(vec![foreign], "{}"), WORKER, 0)
            .await
            .unwrap();

        assert_eq!(store.events().await[0].worker_id, "W_CHC");
    }

    #[tokio::test]
    async fn two_step_mode_ends_in_the_same_state() {
        let store = Arc::new(MemoryScanStore::new());
        let outcome = pipeline(&store, CommitMode::TwoStep)
            .process(page(&[4, 8, 9]), WORKER, 3)
            .await
            .unwrap();

        assert_eq!(outcome.persisted(), 3);
        assert_eq!(store.get_cursor(WORKER).await.unwrap(), 9);
        assert_eq!(store.insert_order().await, vec![4, 8, 9]);
    }

    #[tokio::test]
    async fn storage_failure_surfaces_with_progress_kept() {
        let store = Arc::new(FaultyStore::new(2));
        let pipeline = IngestPipeline::new(store.clone(), CommitMode::Atomic);

        let err = pipeline
            .process(page(&[1, 2, 3, 4]), WORKER, 0)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Event { event_id: 3, .. }));
        assert!(matches!(err.store_error(), StoreError::Connection(_)));
        assert_eq!(store.get_cursor(WORKER).await.unwrap(), 2);
        assert_eq!(store.inner.insert_order().await, vec![1, 2]);
    }
}
