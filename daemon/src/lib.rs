// Multi-level distribution reward engine
// Exposes the engine and its storage for the binary and the integration tests

pub mod config;
pub mod core;
