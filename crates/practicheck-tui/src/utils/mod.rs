//! Utility functions for string formatting.

pub mod format;

pub use format::{format_countdown, format_currency, format_expiry, truncate_string};
