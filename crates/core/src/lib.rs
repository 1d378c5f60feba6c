//! Core types, configuration, and storage seams for the transcript gateway.

pub mod audit;
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod limits;
pub mod store;
pub mod tenant;
pub mod text;

pub use audit::*;
pub use clock::*;
pub use config::*;
pub use credential::*;
pub use error::{Error, Result, SecurityErrorCode};
pub use store::*;
pub use tenant::*;
pub use text::*;
