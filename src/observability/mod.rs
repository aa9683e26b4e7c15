//! Observability infrastructure
//!
//! Structured logging for the publisher process. Connection lifecycle events,
//! published readings, and delivery failures all surface here as log lines;
//! there is no parseable status interface beyond the logs.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
