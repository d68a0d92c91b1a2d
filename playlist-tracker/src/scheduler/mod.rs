//! Daily scheduling of playlist snapshots.

mod clock;
mod service;

pub use clock::{local_date, next_midnight, seconds_until_next_midnight, snapshot_key};
pub use service::{
    DailyScheduler, PlaylistFetcher, SchedulerHandle, SnapshotFetcher, TickError, TickOrigin,
    TickOutcome,
};
