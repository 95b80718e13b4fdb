//! Business logic and port traits for lamabridge.
//!
//! This crate defines the "ports" (repository, backend, sink and history
//! traits) that the infrastructure layer implements, plus the two engines
//! the bridge is built around: context assembly and stream rendering.
//! It depends only on `lamabridge-types` -- never on `lamabridge-infra` or
//! any database/IO crate.

pub mod chat;
pub mod context;
pub mod llm;
pub mod model;
pub mod render;
pub mod tokens;
