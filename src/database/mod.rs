pub mod connection;
pub mod operations;

pub use connection::RetryPolicy;
pub use operations::store_history_summary;
