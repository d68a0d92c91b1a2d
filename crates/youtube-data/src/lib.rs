//! Minimal YouTube Data API v3 bindings.
//!
//! Only the two read-only calls needed to measure a playlist are covered:
//! `playlistItems.list` (cursor paginated) and `videos.list` (id batches).
//! Authentication is delegated to a [`TokenProvider`].

pub mod client;
pub mod duration;
pub mod error;
pub mod models;

pub use client::{StaticToken, TokenProvider, YoutubeClient};
pub use duration::parse_iso8601_duration;
pub use error::YoutubeError;
pub use models::{PlaylistItemsPage, VideoDuration};
