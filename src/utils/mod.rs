//! Shared utility functions.
//!
//! - `format`: Human-readable formatting (sizes, timestamps)

mod format;

pub use format::{format_size, format_timestamp};
