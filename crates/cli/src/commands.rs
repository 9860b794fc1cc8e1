use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Poll the upstream feed and ingest scan events until interrupted
    Run {
        #[arg(long, help = "Overrides SCANEVENT_WORKER_ID")]
        worker_id: Option<String>,
    },
    /// Show the worker's cursor and the newest ingested scans
    Status {
        #[arg(long, help = "Overrides SCANEVENT_WORKER_ID")]
        worker_id: Option<String>,

        #[arg(long, help = "Print as JSON instead of a table")]
        json: bool,
    },
    /// Show the latest scan, pickup time and delivery time of a parcel
    Parcel {
        #[arg(long, help = "Parcel ID")]
        id: i64,

        #[arg(long, help = "Print as JSON instead of a table")]
        json: bool,
    },
    /// Overwrite the worker's cursor; the next poll starts after this event id
    SetCursor {
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        event_id: i64,

        #[arg(long, help = "Overrides SCANEVENT_WORKER_ID")]
        worker_id: Option<String>,
    },
    /// Open the configured store and report whether it is reachable
    TestConn {
        #[arg(long, help = "Also request a single event from the upstream feed")]
        upstream: bool,
    },
}
