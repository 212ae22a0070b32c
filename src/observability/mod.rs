//! Observability for the broker connector
//!
//! Structured logging with configurable output formats. Connector internals
//! log through `tracing`; this module wires up the subscriber.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
