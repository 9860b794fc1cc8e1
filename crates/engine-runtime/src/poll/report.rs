use model::events::scan::EventId;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPhase {
    Init,
    /// First iteration, followed by the short warmup delay.
    Warmup,
    Steady,
    Cancelled,
}

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollPhase::Init => "init",
            PollPhase::Warmup => "warmup",
            PollPhase::Steady => "steady",
            PollPhase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// What a finished poll loop did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub worker_id: String,
    pub cycles: u64,
    pub persisted: u64,
    pub transient_failures: u64,
    pub discarded_pages: u64,
    pub cursor: EventId,
    pub phase: PollPhase,
}

impl PollReport {
    pub(crate) fn new(worker_id: &str, cursor: EventId) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            cycles: 0,
            persisted: 0,
            transient_failures: 0,
            discarded_pages: 0,
            cursor,
            phase: PollPhase::Init,
        }
    }
}
