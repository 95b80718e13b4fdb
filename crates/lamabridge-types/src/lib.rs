//! Shared domain types for lamabridge.
//!
//! This crate contains the core domain types used across the bridge:
//! sessions, messages, model configuration, generation requests, platform
//! handles, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod platform;
