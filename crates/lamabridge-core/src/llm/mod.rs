//! Model server abstractions for lamabridge.
//!
//! - `GenerationBackend`: RPITIT trait for concrete model servers
//! - `BoxGenerationBackend`: Object-safe wrapper for dynamic dispatch
//! - `TokenBudget`: Context window minus the reserved reply margin

pub mod backend;
pub mod box_backend;
pub mod token_budget;
