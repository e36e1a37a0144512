//! Utils Module
pub mod telemetry;
pub mod truncate;

pub use telemetry::init_logging;
pub use truncate::{approx_token_count, truncate_text, TruncationPolicy};
