//! Observability setup for lamabridge: the global tracing subscriber and
//! optional OpenTelemetry span export.

pub mod tracing_setup;
