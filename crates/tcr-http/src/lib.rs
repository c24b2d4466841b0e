//! HTTP surface (axum).
//!
//! Serves the camera Web App's API on top of the `tcr-core` ports.

pub mod errors;
pub mod extract;
pub mod handlers;
pub mod router;

#[cfg(test)]
mod test_support;

pub use router::{build_router, serve, AppState};
