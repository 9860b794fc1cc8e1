use crate::sql::postgres::utils::{connect_client, parse_config};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{
    error::StoreError,
    state::{
        CursorStore, EventStore, ScanQueries,
        models::{EventWrite, RawBatchWrite},
    },
};
use model::{
    events::scan::{EventId, ScanEvent, ScanEventType},
    pagination::cursor::WorkerCursor,
    records::batch::RawBatch,
};
use tokio_postgres::{Client, Config, GenericClient, Row};
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!("sql/schema.sql");
const CURSOR_LOAD_SQL: &str = include_str!("sql/cursor_load.sql");
const CURSOR_UPSERT_SQL: &str = include_str!("sql/cursor_upsert.sql");
const RAW_BATCH_INSERT_SQL: &str = include_str!("sql/raw_batch_insert.sql");
const EVENT_INSERT_SQL: &str = include_str!("sql/event_insert.sql");
const EVENT_LATEST_SQL: &str = include_str!("sql/event_latest.sql");
const EVENT_LATEST_OF_TYPE_SQL: &str = include_str!("sql/event_latest_of_type.sql");
const EVENT_LATEST_FOR_PARCEL_SQL: &str = include_str!("sql/event_latest_for_parcel.sql");
const EVENT_FIRST_TIME_SQL: &str = include_str!("sql/event_first_time.sql");

/// Postgres-backed store.
///
/// Every operation opens its own short-lived session and drops it when done, so
/// no connection or transaction stays open while the worker waits on upstream.
#[derive(Clone)]
pub struct PgScanStore {
    config: Config,
}

impl PgScanStore {
    /// Parses the URL, checks connectivity and creates the tables if missing.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let store = Self {
            config: parse_config(url)?,
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn session(&self) -> Result<Client, StoreError> {
        connect_client(&self.config).await
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        let client = self.session().await?;
        client.batch_execute(SCHEMA_SQL).await?;
        info!("Postgres schema is up to date.");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let client = self.session().await?;
        let row = client.query_one("SELECT 1", &[]).await?;
        let val: i32 = row.get(0);
        if val != 1 {
            return Err(StoreError::Corrupt(format!(
                "Ping returned unexpected result: {val}"
            )));
        }
        Ok(())
    }

    async fn insert_with<C: GenericClient + Sync>(
        client: &C,
        event: &ScanEvent,
    ) -> Result<EventWrite, StoreError> {
        let inserted = client
            .execute(
                EVENT_INSERT_SQL,
                &[
                    &event.event_id,
                    &event.parcel_id,
                    &event.event_type.as_str(),
                    &event.created_at,
                    &event.status_code,
                    &event.run_id,
                    &event.worker_id,
                ],
            )
            .await?;

        Ok(if inserted == 0 {
            EventWrite::AlreadyPresent
        } else {
            EventWrite::Inserted
        })
    }

    async fn upsert_cursor_with<C: GenericClient + Sync>(
        client: &C,
        worker_id: &str,
        event_id: EventId,
    ) -> Result<(), StoreError> {
        client
            .execute(CURSOR_UPSERT_SQL, &[&worker_id, &event_id])
            .await?;
        Ok(())
    }
}

fn event_from_row(row: &Row) -> Result<ScanEvent, StoreError> {
    let event_type: String = row.try_get("type")?;
    Ok(ScanEvent {
        event_id: row.try_get("event_id")?,
        parcel_id: row.try_get("parcel_id")?,
        event_type: ScanEventType::from_wire(&event_type),
        created_at: row.try_get("created_at")?,
        status_code: row.try_get("status_code")?,
        run_id: row.try_get("run_id")?,
        worker_id: row.try_get("worker_id")?,
    })
}

fn cursor_from_row(row: &Row) -> Result<WorkerCursor, StoreError> {
    Ok(WorkerCursor {
        worker_id: row.try_get("worker_id")?,
        last_event_id: row.try_get("last_event_id")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CursorStore for PgScanStore {
    async fn load_cursor(&self, worker_id: &str) -> Result<Option<WorkerCursor>, StoreError> {
        let client = self.session().await?;
        let row = client.query_opt(CURSOR_LOAD_SQL, &[&worker_id]).await?;
        row.as_ref().map(cursor_from_row).transpose()
    }

    async fn advance_cursor(&self, worker_id: &str, event_id: EventId) -> Result<(), StoreError> {
        let client = self.session().await?;
        Self::upsert_cursor_with(&client, worker_id, event_id).await?;
        debug!(worker_id, event_id, "Cursor written.");
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgScanStore {
    async fn record_raw_batch(&self, batch: &RawBatch) -> Result<RawBatchWrite, StoreError> {
        let client = self.session().await?;
        let inserted = client
            .execute(
                RAW_BATCH_INSERT_SQL,
                &[
                    &batch.worker_id,
                    &batch.first_event_id,
                    &batch.raw_payload,
                    &batch.ingested_at,
                ],
            )
            .await?;

        Ok(if inserted == 0 {
            RawBatchWrite::Duplicate
        } else {
            RawBatchWrite::Recorded
        })
    }

    async fn insert_event(&self, event: &ScanEvent) -> Result<EventWrite, StoreError> {
        let client = self.session().await?;
        Self::insert_with(&client, event).await
    }

    async fn insert_event_and_advance(
        &self,
        worker_id: &str,
        event: &ScanEvent,
    ) -> Result<EventWrite, StoreError> {
        let mut client = self.session().await?;
        let tx = client.transaction().await?;
        let written = Self::insert_with(&tx, event).await?;
        Self::upsert_cursor_with(&tx, worker_id, event.event_id).await?;
        tx.commit().await?;
        Ok(written)
    }
}

#[async_trait]
impl ScanQueries for PgScanStore {
    async fn latest_event(&self) -> Result<Option<ScanEvent>, StoreError> {
        let client = self.session().await?;
        let row = client.query_opt(EVENT_LATEST_SQL, &[]).await?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn latest_event_of_type(
        &self,
        event_type: ScanEventType,
    ) -> Result<Option<ScanEvent>, StoreError> {
        let client = self.session().await?;
        let row = client
            .query_opt(EVENT_LATEST_OF_TYPE_SQL, &[&event_type.as_str()])
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn latest_event_for_parcel(
        &self,
        parcel_id: i64,
    ) -> Result<Option<ScanEvent>, StoreError> {
        let client = self.session().await?;
        let row = client
            .query_opt(EVENT_LATEST_FOR_PARCEL_SQL, &[&parcel_id])
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn first_event_time(
        &self,
        parcel_id: i64,
        event_type: ScanEventType,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let client = self.session().await?;
        let row = client
            .query_one(EVENT_FIRST_TIME_SQL, &[&parcel_id, &event_type.as_str()])
            .await?;
        let first: Option<DateTime<Utc>> = row.try_get(0)?;
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::SCHEMA_SQL;

    #[test]
    fn text_columns_have_no_length_cap() {
        assert!(!SCHEMA_SQL.to_uppercase().contains("VARCHAR"));
        for column in ["worker_id", "type", "status_code", "run_id"] {
            assert!(
                SCHEMA_SQL.contains(&format!("ALTER COLUMN {column} TYPE TEXT")),
                "{column} is not widened on existing tables"
            );
        }
    }
}
