//! # Built-in subscribers
//!
//! - [`LogWriter`]: maps runtime events onto leveled `tracing` records.

mod log;

pub use log::LogWriter;
