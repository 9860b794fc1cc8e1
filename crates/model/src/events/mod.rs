pub mod scan;

pub use scan::{ScanEvent, ScanEventType};
