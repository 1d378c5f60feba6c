//! Redis-backed shared state for gateway processes.

pub mod config;
pub mod health;
pub mod store;

pub use config::*;
pub use store::*;
