use chrono::{DateTime, Utc};
use model::events::scan::EventId;
use reqwest::Url;
use serde_json::{Value, json};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

pub const WORKER: &str = "W_AKL";

/// One canned answer of the mock upstream.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(String),
    Status(u16),
}

type Responder = Arc<dyn Fn(EventId, u32) -> Reply + Send + Sync>;

/// Minimal HTTP/1.1 server standing in for the scan event API.
///
/// Every request is answered by the responder with the parsed `FromEventId` and
/// `Limit` query parameters, and the connection is closed afterwards.
pub struct MockUpstream {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<(EventId, u32)>>>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(EventId, u32) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Responder = Arc::new(responder);

        let seen = requests.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let responder = responder.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, responder, seen).await;
                });
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    /// Serves `events` as a feed: each request gets the events with
    /// `EventId >= FromEventId`, at most `Limit` of them.
    pub async fn with_feed(events: Vec<Value>) -> Self {
        Self::start(move |from, limit| Reply::Json(feed_page(&events, from, limit))).await
    }

    pub fn url(&self) -> String {
        format!("http://{}/v1/scans/scanevents", self.addr)
    }

    pub fn requests(&self) -> Vec<(EventId, u32)> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    responder: Responder,
    seen: Arc<Mutex<Vec<(EventId, u32)>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");
    let (from, limit) = parse_query(target);
    seen.lock().expect("requests lock").push((from, limit));

    let (status, body) = match responder(from, limit) {
        Reply::Json(body) => (200, body),
        Reply::Status(code) => (code, String::new()),
    };
    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        reason(status),
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn parse_query(target: &str) -> (EventId, u32) {
    let Ok(url) = Url::parse(&format!("http://mock{target}")) else {
        return (0, 0);
    };
    let mut from = 0;
    let mut limit = 0;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "FromEventId" => from = value.parse().unwrap_or(0),
            "Limit" => limit = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    (from, limit)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// A wire-format scan event with a creation time derived from its id.
pub fn scan_event_json(event_id: EventId, parcel_id: i64, event_type: &str) -> Value {
    json!({
        "EventId": event_id,
        "ParcelId": parcel_id,
        "Type": event_type,
        "CreatedDateTimeUtc": created_at(event_id).to_rfc3339(),
        "StatusCode": "",
        "RunId": "100",
    })
}

pub fn created_at(event_id: EventId) -> DateTime<Utc> {
    DateTime::from_timestamp(1_620_000_000 + event_id * 60, 0).unwrap_or_default()
}

pub fn feed_page(events: &[Value], from: EventId, limit: u32) -> String {
    let page: Vec<&Value> = events
        .iter()
        .filter(|event| event["EventId"].as_i64().unwrap_or(0) >= from)
        .take(limit as usize)
        .collect();
    json!({ "ScanEvents": page }).to_string()
}

/// `count` events over two parcels, cycling through pickup, status and delivery.
pub fn sample_feed(count: EventId) -> Vec<Value> {
    (1..=count)
        .map(|id| {
            let kind = match id % 3 {
                1 => "PICKUP",
                2 => "STATUS",
                _ => "DELIVERY",
            };
            scan_event_json(id, 5000 + id % 2, kind)
        })
        .collect()
}

pub fn fast_settings(base_url: &str) -> engine_config::settings::IngestSettings {
    let mut settings = engine_config::settings::IngestSettings::new(WORKER, base_url);
    settings.polling_delay = Duration::from_millis(5);
    settings.warmup_delay = Duration::from_millis(1);
    settings.request_timeout = Duration::from_secs(5);
    settings
}
