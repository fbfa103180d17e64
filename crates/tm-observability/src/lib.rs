//! # tm-observability
//!
//! Logging and metrics infrastructure for Temuan.
//!
//! Logging is built on `tracing`; metrics are emitted through the `metrics`
//! facade so any installed recorder (the API installs a Prometheus one)
//! picks them up.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::{MetricsCollector, MetricsSnapshot, ReviewDecision};
