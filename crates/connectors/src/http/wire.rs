//! JSON envelope served by the scan event API.
//!
//! ```json
//! { "ScanEvents": [ { "EventId": 1, "ParcelId": 5002, "Type": "PICKUP",
//!                     "CreatedDateTimeUtc": "2021-05-11T14:11:34.1234567Z",
//!                     "StatusCode": "", "RunId": "100", "WorkerId": "W_AKL" } ] }
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use model::events::scan::{ScanEvent, ScanEventType};
use serde::{Deserialize, Deserializer, de::Error as _};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct ScanEventsEnvelope {
    #[serde(default)]
    scan_events: Option<Vec<WireScanEvent>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct WireScanEvent {
    event_id: i64,
    parcel_id: i64,
    #[serde(rename = "Type", default, deserialize_with = "lenient_event_type")]
    event_type: ScanEventType,
    #[serde(default, deserialize_with = "optional_timestamp")]
    created_date_time_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    status_code: Option<String>,
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    worker_id: Option<String>,
}

impl WireScanEvent {
    fn into_event(self, fetched_at: DateTime<Utc>) -> ScanEvent {
        ScanEvent {
            event_id: self.event_id,
            parcel_id: self.parcel_id,
            event_type: self.event_type,
            created_at: self.created_date_time_utc.unwrap_or(fetched_at),
            status_code: self.status_code.unwrap_or_default(),
            run_id: self.run_id.unwrap_or_default(),
            worker_id: self.worker_id.unwrap_or_default(),
        }
    }
}

/// Decodes a response body. Events keep the order they had on the wire.
pub fn decode_page(body: &str, fetched_at: DateTime<Utc>) -> Result<Vec<ScanEvent>, serde_json::Error> {
    let envelope: ScanEventsEnvelope = serde_json::from_str(body)?;
    Ok(envelope
        .scan_events
        .unwrap_or_default()
        .into_iter()
        .map(|event| event.into_event(fetched_at))
        .collect())
}

/// Accepts RFC 3339, or a zone-less timestamp which is taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid CreatedDateTimeUtc '{value}'"))
}

fn lenient_event_type<'de, D>(deserializer: D) -> Result<ScanEventType, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => ScanEventType::from_wire(&s),
        _ => ScanEventType::Unknown,
    })
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.trim().is_empty() => parse_timestamp(&s).map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_full_event() {
        let body = r#"{"ScanEvents":[{
            "EventId": 83269, "ParcelId": 5002, "Type": "PICKUP",
            "CreatedDateTimeUtc": "2021-05-11T14:11:34.1234567Z",
            "StatusCode": "", "RunId": "100", "WorkerId": "W_UP"
        }]}"#;

        let events = decode_page(body, Utc::now()).unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_id, 83269);
        assert_eq!(event.parcel_id, 5002);
        assert_eq!(event.event_type, ScanEventType::Pickup);
        assert_eq!(event.run_id, "100");
        assert_eq!(event.worker_id, "W_UP");
        assert_eq!(
            event.created_at.timestamp(),
            Utc.with_ymd_and_hms(2021, 5, 11, 14, 11, 34).unwrap().timestamp()
        );
    }

    #[test]
    fn fills_defaults_for_missing_fields() {
        let fetched_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let body = r#"{"ScanEvents":[{"EventId":1,"ParcelId":1001,"Type":"PICKUP"},
                                     {"EventId":2,"ParcelId":1002,"Type":"DELIVERY"}]}"#;

        let events = decode_page(body, fetched_at).unwrap();
        assert_eq!(events[0].created_at, fetched_at);
        assert_eq!(events[1].event_type, ScanEventType::Delivery);
        assert!(events[0].worker_id.is_empty());
        assert!(events[0].status_code.is_empty());
    }

    #[test]
    fn unknown_or_missing_type_is_not_an_error() {
        let body = r#"{"ScanEvents":[
            {"EventId":1,"ParcelId":1,"Type":"RETURNED"},
            {"EventId":2,"ParcelId":1,"Type":null},
            {"EventId":3,"ParcelId":1,"Type":7},
            {"EventId":4,"ParcelId":1}
        ]}"#;

        let events = decode_page(body, Utc::now()).unwrap();
        assert!(events.iter().all(|e| e.event_type == ScanEventType::Unknown));
    }

    #[test]
    fn empty_envelopes_decode_to_no_events() {
        assert!(decode_page(r#"{"ScanEvents":[]}"#, Utc::now()).unwrap().is_empty());
        assert!(decode_page(r#"{"ScanEvents":null}"#, Utc::now()).unwrap().is_empty());
        assert!(decode_page(r#"{}"#, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn malformed_payloads_fail() {
        assert!(decode_page("<html>oops</html>", Utc::now()).is_err());
        assert!(decode_page(r#"{"ScanEvents":[{"ParcelId":1}]}"#, Utc::now()).is_err());
        assert!(
            decode_page(
                r#"{"ScanEvents":[{"EventId":1,"ParcelId":1,"CreatedDateTimeUtc":"yesterday"}]}"#,
                Utc::now()
            )
            .is_err()
        );
    }

    #[test]
    fn parses_zone_less_timestamps_as_utc() {
        let expected = Utc.with_ymd_and_hms(2021, 5, 11, 14, 11, 34).unwrap();
        assert_eq!(parse_timestamp("2021-05-11T14:11:34").unwrap(), expected);
        assert_eq!(parse_timestamp("2021-05-11 14:11:34").unwrap(), expected);
        assert_eq!(parse_timestamp("2021-05-11T16:11:34+02:00").unwrap(), expected);
    }
}
