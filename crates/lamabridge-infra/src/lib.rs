//! Infrastructure layer for lamabridge.
//!
//! Contains implementations of the ports defined in `lamabridge-core`:
//! SQLite session storage, the Ollama generation backend, HuggingFace
//! tokenizers, the Discord REST sink and channel history, and config loading.

pub mod config;
pub mod discord;
pub mod ollama;
pub mod sqlite;
pub mod tokenizer;

#[cfg(test)]
mod test_support;
