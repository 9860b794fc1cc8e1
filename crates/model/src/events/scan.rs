use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Upstream-assigned scan event identifier. Strictly ascending within a page.
pub type EventId = i64;

/// Kind of scan recorded by the carrier.
///
/// Upstream sends these as upper-case strings. Anything unrecognised is kept
/// as [`ScanEventType::Unknown`] rather than failing the whole page.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanEventType {
    #[default]
    Unknown,
    Pickup,
    Status,
    Delivery,
}

#[derive(Debug, Error)]
#[error("Unrecognised scan event type: {0}")]
pub struct UnknownScanEventType(pub String);

impl ScanEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanEventType::Unknown => "UNKNOWN",
            ScanEventType::Pickup => "PICKUP",
            ScanEventType::Status => "STATUS",
            ScanEventType::Delivery => "DELIVERY",
        }
    }

    /// Lenient decoding used on the wire: unrecognised values become `Unknown`.
    pub fn from_wire(value: &str) -> Self {
        value.parse().unwrap_or(ScanEventType::Unknown)
    }
}

impl FromStr for ScanEventType {
    type Err = UnknownScanEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(ScanEventType::Unknown),
            "PICKUP" => Ok(ScanEventType::Pickup),
            "STATUS" => Ok(ScanEventType::Status),
            "DELIVERY" => Ok(ScanEventType::Delivery),
            other => Err(UnknownScanEventType(other.to_string())),
        }
    }
}

impl fmt::Display for ScanEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parcel scan. Immutable once persisted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanEvent {
    pub event_id: EventId,
    pub parcel_id: i64,
    pub event_type: ScanEventType,
    pub created_at: DateTime<Utc>,
    pub status_code: String,
    pub run_id: String,
    /// Empty until the ingesting worker claims the event.
    pub worker_id: String,
}

impl ScanEvent {
    /// Fills in the worker identity when upstream did not supply one.
    pub fn claim(&mut self, worker_id: &str) {
        if self.worker_id.is_empty() {
            self.worker_id = worker_id.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types_case_insensitively() {
        assert_eq!("PICKUP".parse::<ScanEventType>().unwrap(), ScanEventType::Pickup);
        assert_eq!("delivery".parse::<ScanEventType>().unwrap(), ScanEventType::Delivery);
        assert_eq!(" Status ".parse::<ScanEventType>().unwrap(), ScanEventType::Status);
    }

    #[test]
    fn unrecognised_type_falls_back_to_unknown() {
        assert!("RETURNED".parse::<ScanEventType>().is_err());
        assert_eq!(ScanEventType::from_wire("RETURNED"), ScanEventType::Unknown);
        assert_eq!(ScanEventType::from_wire(""), ScanEventType::Unknown);
    }

    #[test]
    fn claim_keeps_upstream_worker() {
        let mut event = ScanEvent {
            event_id: 1,
            parcel_id: 10,
            event_type: ScanEventType::Pickup,
            created_at: Utc::now(),
            status_code: String::new(),
            run_id: String::new(),
            worker_id: "W_UP".into(),
        };
        event.claim("W_AKL");
        assert_eq!(event.worker_id, "W_UP");

        event.worker_id.clear();
        event.claim("W_AKL");
        assert_eq!(event.worker_id, "W_AKL");
    }
}
