//! Utility functions for formatting ride data.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_date, format_distance, format_duration, format_speed, sparkline, truncate_string};
