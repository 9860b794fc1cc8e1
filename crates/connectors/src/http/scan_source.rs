use crate::{error::ConnectorError, http::wire::decode_page};
use async_trait::async_trait;
use chrono::Utc;
use engine_core::{
    connectors::source::{MAX_PAGE_LIMIT, ScanSource},
    error::FetchError,
};
use model::{events::scan::EventId, records::batch::ScanPage};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, info};

/// Polls `GET {base_url}?FromEventId={n}&Limit={m}`.
#[derive(Clone)]
pub struct HttpScanSource {
    client: Client,
    base_url: Url,
}

impl HttpScanSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConnectorError> {
        let base_url = Url::parse(base_url).map_err(|e| ConnectorError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Request URL for one page. The limit is clamped to [`MAX_PAGE_LIMIT`].
    pub fn page_url(&self, from_event_id: EventId, limit: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("FromEventId", &from_event_id.to_string())
            .append_pair("Limit", &limit.min(MAX_PAGE_LIMIT).to_string());
        url
    }
}

#[async_trait]
impl ScanSource for HttpScanSource {
    async fn fetch(&self, from_event_id: EventId, limit: u32) -> Result<ScanPage, FetchError> {
        let url = self.page_url(from_event_id, limit);
        info!(url = %url, "Calling scan event API.");

        let transport = |err: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            source: Box::new(err),
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Protocol {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.text().await.map_err(transport)?;
        debug!(body = %body, "Raw API response.");

        let events = decode_page(&body, Utc::now()).map_err(|source| FetchError::Decode { source })?;
        Ok(ScanPage::new(events, body))
    }

    fn describe(&self) -> String {
        self.base_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_page_url_with_clamped_limit() {
        let source = HttpScanSource::new(
            "http://localhost:5000/v1/scans/scanevents",
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(
            source.page_url(11, 100).as_str(),
            "http://localhost:5000/v1/scans/scanevents?FromEventId=11&Limit=100"
        );
        assert_eq!(
            source.page_url(1, 10_000).as_str(),
            "http://localhost:5000/v1/scans/scanevents?FromEventId=1&Limit=500"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = HttpScanSource::new("not a url", Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, ConnectorError::InvalidUrl { .. }));
    }
}
