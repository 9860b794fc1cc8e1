use crate::error::PollError;
use engine_config::settings::{IngestSettings, StaleRetry};
use engine_core::{
    connectors::source::{ScanSource, effective_limit},
    state::{ScanStore, models::StoreSummary},
};
use engine_processing::{IngestPipeline, PageOutcome};
use model::events::scan::ScanEvent;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub mod report;

pub use report::{PollPhase, PollReport};

/// Outcome of one fetch-and-process iteration.
enum Cycle {
    Processed(PageOutcome),
    FetchFailed,
    Cancelled,
}

/// Drives one worker: fetch from `cursor + 1`, ingest, wait, repeat until cancelled.
pub struct PollLoop {
    source: Arc<dyn ScanSource>,
    store: Arc<dyn ScanStore>,
    pipeline: IngestPipeline,
    settings: IngestSettings,
    cancel: CancellationToken,
}

impl PollLoop {
    pub fn new(
        source: Arc<dyn ScanSource>,
        store: Arc<dyn ScanStore>,
        settings: IngestSettings,
        cancel: CancellationToken,
    ) -> Self {
        let pipeline = IngestPipeline::new(store.clone(), settings.commit_mode);
        Self {
            source,
            store,
            pipeline,
            settings,
            cancel,
        }
    }

    pub async fn run(self) -> Result<PollReport, PollError> {
        let worker_id = self.settings.worker_id.clone();
        let cursor = self
            .store
            .get_cursor(&worker_id)
            .await
            .map_err(|source| PollError::Init {
                worker_id: worker_id.clone(),
                source,
            })?;
        let summary = self
            .store
            .summary()
            .await
            .map_err(|source| PollError::Init {
                worker_id: worker_id.clone(),
                source,
            })?;
        log_summary(&summary);

        let limit = effective_limit(self.settings.limit);
        let mut report = PollReport::new(&worker_id, cursor);
        info!(
            worker_id = %worker_id,
            cursor,
            limit,
            source = %self.source.describe(),
            commit_mode = ?self.pipeline.commit_mode(),
            "Starting scan event poll loop."
        );

        report.phase = PollPhase::Warmup;
        while !self.cancel.is_cancelled() {
            report.cycles += 1;
            let delay = match self.cycle(&worker_id, limit, &mut report).await? {
                Cycle::Cancelled => break,
                Cycle::FetchFailed => self.settings.polling_delay,
                Cycle::Processed(outcome) => {
                    if outcome.is_discarded() {
                        report.discarded_pages += 1;
                    }
                    self.delay_after(&outcome, report.phase)
                }
            };

            let delay = if report.phase == PollPhase::Warmup {
                report.phase = PollPhase::Steady;
                self.settings.warmup_delay
            } else {
                delay
            };

            if !self.sleep(delay).await {
                break;
            }
        }

        report.phase = PollPhase::Cancelled;
        info!(
            worker_id = %worker_id,
            cycles = report.cycles,
            persisted = report.persisted,
            transient_failures = report.transient_failures,
            cursor = report.cursor,
            "Scan event poll loop stopped."
        );
        Ok(report)
    }

    async fn cycle(
        &self,
        worker_id: &str,
        limit: u32,
        report: &mut PollReport,
    ) -> Result<Cycle, PollError> {
        let cursor = report.cursor;
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Cycle::Cancelled),
            result = self.source.fetch(cursor.saturating_add(1), limit) => result,
        };

        let page = match fetched {
            Ok(page) => page,
            Err(err) => {
                error!(
                    worker_id,
                    cursor,
                    kind = err.kind(),
                    error = %err,
                    "Failed to fetch scan events."
                );
                report.transient_failures += 1;
                return Ok(Cycle::FetchFailed);
            }
        };

        let outcome = self
            .pipeline
            .process(page, worker_id, cursor)
            .await
            .map_err(|source| {
                error!(worker_id, cursor, error = %source, "Failed to persist scan events.");
                PollError::Persistence {
                    worker_id: worker_id.to_string(),
                    cursor,
                    source,
                }
            })?;

        report.cursor = outcome.cursor_after(cursor);
        report.persisted += outcome.persisted() as u64;
        Ok(Cycle::Processed(outcome))
    }

    fn delay_after(&self, outcome: &PageOutcome, phase: PollPhase) -> Duration {
        let retry_now = outcome.is_discarded()
            && self.settings.stale_retry == StaleRetry::Immediate
            && phase == PollPhase::Steady;
        if retry_now {
            Duration::ZERO
        } else {
            self.settings.polling_delay
        }
    }

    /// Returns `false` when cancelled before the delay elapsed.
    async fn sleep(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

fn log_summary(summary: &StoreSummary) {
    if summary.is_empty() {
        info!("No scan events ingested yet.");
        return;
    }

    let entries: [(&str, &Option<ScanEvent>); 3] = [
        ("Latest scan event", &summary.latest),
        ("Latest pickup", &summary.latest_pickup),
        ("Latest delivery", &summary.latest_delivery),
    ];
    for (label, event) in entries {
        match event {
            Some(event) => info!(
                event_id = event.event_id,
                parcel_id = event.parcel_id,
                event_type = %event.event_type,
                created_at = %event.created_at,
                "{label}"
            ),
            None => info!("{label}: none"),
        }
    }
}

