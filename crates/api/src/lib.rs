//! HTTP surface of the transcript gateway.
//!
//! Licenses are resolved through an external license service; everything
//! past that is delegated to [`gateway::Gateway`].

pub mod extractors;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::{AppState, LicenseClient, LicenseInfo};
