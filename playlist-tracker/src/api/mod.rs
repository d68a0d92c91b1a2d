//! HTTP surface.
//!
//! A thin dashboard over the snapshot store: the first page view kicks off
//! a snapshot, `/graph` charts the series and `/logs` shows recent log lines.

pub mod chart;
pub mod error;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
