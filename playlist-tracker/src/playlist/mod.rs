//! Playlist size and runtime aggregation.

mod aggregator;
mod api;

pub use aggregator::{AggregateError, AggregationPass, PlaylistTotals, aggregate};
pub use api::PlaylistApi;
