//! HTTP transport and provider payloads for the transcript gateway.

pub mod chat;
pub mod transcription;
pub mod transport;
pub mod youtube;

pub use chat::*;
pub use transcription::*;
pub use transport::*;
pub use youtube::*;
