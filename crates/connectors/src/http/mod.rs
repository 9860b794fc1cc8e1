pub mod scan_source;
pub mod wire;
