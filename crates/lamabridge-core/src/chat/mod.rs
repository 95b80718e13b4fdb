//! Chat sessions: persistence port, channel history port, and the service
//! that ties a request to context assembly and rendering.

pub mod history;
pub mod repository;
pub mod service;
