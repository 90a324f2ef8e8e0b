pub mod scanner;

pub use scanner::{sample_readings, scan_for_gadgets};
