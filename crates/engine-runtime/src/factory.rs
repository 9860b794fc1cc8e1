use crate::error::SetupError;
use connectors::{http::scan_source::HttpScanSource, sql::postgres::store::PgScanStore};
use engine_config::settings::{IngestSettings, StoreSettings, credentials::redact_url};
use engine_core::{
    connectors::source::ScanSource,
    error::StoreError,
    retry::{RetryDisposition, RetryPolicy},
    state::{ScanStore, memory::MemoryScanStore, sled_store::SledScanStore},
};
use std::sync::Arc;
use tracing::info;

/// Opens the configured store. Postgres connects are retried while the server may
/// still be coming up; everything else fails on the first error.
pub async fn open_store(settings: &StoreSettings) -> Result<Arc<dyn ScanStore>, SetupError> {
    match settings {
        StoreSettings::Postgres { url } => {
            info!(url = %redact_url(url), "Opening PostgreSQL scan store");
            let store = RetryPolicy::for_database()
                .run(
                    "Connecting to PostgreSQL",
                    || PgScanStore::connect(url),
                    classify_connect,
                )
                .await
                .map_err(|err| err.into_inner())?;
            Ok(Arc::new(store))
        }
        StoreSettings::Sled { path } => {
            info!(path = %path.display(), "Opening sled scan store");
            Ok(Arc::new(SledScanStore::open(path)?))
        }
        StoreSettings::Memory => Ok(Arc::new(MemoryScanStore::new())),
    }
}

pub fn build_source(settings: &IngestSettings) -> Result<Arc<dyn ScanSource>, SetupError> {
    let source = HttpScanSource::new(&settings.base_url, settings.request_timeout)?;
    Ok(Arc::new(source))
}

fn classify_connect(err: &StoreError) -> RetryDisposition {
    if err.is_connect_retryable() {
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}
