//! Time-series store contract consumed by the control loop.

use std::future::Future;

use crate::error::StoreError;

/// In-process ledger with an indexed latest-value view.
pub mod memory;
pub mod record;

pub use memory::MemoryStore;
pub use record::{Measurement, RoomReadings, ValueRecord};

/// Append-only ledger of readings plus the per-room latest-value query.
///
/// Implementations are shared between the loop task and read-only
/// observers, hence `Send + Sync`.
pub trait TimeSeriesStore: Send + Sync {
    /// Appends a batch. Either every record lands or none does.
    fn insert_many(
        &self,
        records: Vec<ValueRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// For every room with at least one record, the most recent record of
    /// each `(measurement, point)` pair observed in it.
    ///
    /// Among records with identical `time` for the same pair, the one
    /// inserted last wins.
    fn latest_per_room(&self) -> impl Future<Output = Result<Vec<RoomReadings>, StoreError>> + Send;
}
