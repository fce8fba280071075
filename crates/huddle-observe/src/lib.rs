//! Observability setup for Huddle: structured logging with optional
//! OpenTelemetry span export.

pub mod tracing_setup;
