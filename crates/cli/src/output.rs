use crate::error::CliError;
use chrono::{DateTime, Utc};
use engine_core::state::models::StoreSummary;
use model::{
    events::scan::{EventId, ScanEvent},
    pagination::cursor::WorkerCursor,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct StatusView {
    pub worker_id: String,
    pub cursor: Option<WorkerCursor>,
    pub summary: StoreSummary,
}

#[derive(Serialize)]
pub struct ParcelView {
    pub parcel_id: i64,
    pub latest: Option<ScanEvent>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

pub fn print_status(view: &StatusView) {
    println!("Status for worker '{}':", view.worker_id);
    println!("-----------------------------");
    match &view.cursor {
        Some(cursor) => {
            println!("{:<16} {}", "Cursor", cursor.last_event_id);
            println!("{:<16} {}", "Next event", cursor.next_event_id());
            println!("{:<16} {}", "Updated", cursor.updated_at.to_rfc3339());
        }
        None => println!("{:<16} {}", "Cursor", "none (starts at event 1)"),
    }
    println!("{:<16} {}", "Latest", describe(&view.summary.latest));
    println!("{:<16} {}", "Latest pickup", describe(&view.summary.latest_pickup));
    println!(
        "{:<16} {}",
        "Latest delivery",
        describe(&view.summary.latest_delivery)
    );
}

pub fn print_parcel(view: &ParcelView) {
    println!("Parcel {}:", view.parcel_id);
    println!("-----------------------------");
    println!("{:<16} {}", "Latest scan", describe(&view.latest));
    println!("{:<16} {}", "Picked up", timestamp(view.picked_up_at));
    println!("{:<16} {}", "Delivered", timestamp(view.delivered_at));
}

pub fn print_cursor_change(worker_id: &str, previous: Option<EventId>, current: EventId) {
    let previous = previous
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    println!("Cursor for worker '{worker_id}': {previous} -> {current}");
}

fn describe(event: &Option<ScanEvent>) -> String {
    match event {
        Some(e) => format!(
            "#{} parcel {} {} at {}",
            e.event_id,
            e.parcel_id,
            e.event_type,
            e.created_at.to_rfc3339()
        ),
        None => "n/a".to_string(),
    }
}

fn timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "n/a".to_string())
}
