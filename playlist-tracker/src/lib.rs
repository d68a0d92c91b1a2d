//! playlist-tracker library crate.
//!
//! Records one snapshot per day of a YouTube playlist's video count and total
//! runtime, and serves the accumulated series over HTTP.

pub mod api;
pub mod config;
pub mod context;
pub mod credentials;
pub mod database;
pub mod error;
pub mod logging;
pub mod playlist;
pub mod scheduler;
pub mod utils;

pub use error::{Error, Result};
