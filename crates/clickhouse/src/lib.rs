//! ClickHouse audit log storage for the transcript gateway.

pub mod audit;
pub mod client;
pub mod config;
pub mod health;
pub mod schema;

pub use audit::*;
pub use client::*;
pub use config::*;

