//! HTTP API: submission, status polling, cancellation, and health.

pub mod error;
pub mod routes;
pub mod server;

pub use server::{ApiServer, AppState};
