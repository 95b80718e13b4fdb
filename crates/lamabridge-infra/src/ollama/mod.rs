//! Ollama generation backend.
//!
//! This module provides the [`OllamaBackend`] which implements the
//! [`GenerationBackend`](lamabridge_core::llm::backend::GenerationBackend)
//! trait over Ollama's HTTP API, including NDJSON streaming.

pub mod client;
pub mod streaming;
pub mod types;

pub use client::OllamaBackend;
