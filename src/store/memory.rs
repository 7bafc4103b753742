use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::future::Future;

use tokio::sync::RwLock;

use super::TimeSeriesStore;
use super::record::{Measurement, RoomReadings, ValueRecord};
use crate::error::StoreError;
use crate::topology::{PointId, RoomId};

type LatestKey = (Measurement, PointId);

#[derive(Debug, Default)]
struct Ledger {
    /// Append-only; a record's index is its insertion sequence number.
    records: Vec<ValueRecord>,
    /// room → (measurement, point) → index of the current reading.
    latest: BTreeMap<RoomId, BTreeMap<LatestKey, usize>>,
}

impl Ledger {
    fn append(&mut self, record: ValueRecord) {
        let seq = self.records.len();
        let room = record.room;
        let key = (record.measurement.clone(), record.point);
        let time = record.time;
        self.records.push(record);

        match self.latest.entry(room).or_default().entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(seq);
            }
            // `>=` so that on equal timestamps the later insertion wins.
            Entry::Occupied(mut slot) => {
                if time >= self.records[*slot.get()].time {
                    slot.insert(seq);
                }
            }
        }
    }
}

/// Thread-safe in-memory [`TimeSeriesStore`].
///
/// A batch is validated up front and applied under one write lock, so
/// readers observe either none or all of it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: RwLock<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.ledger.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of the full ledger in insertion order.
    pub async fn records(&self) -> Vec<ValueRecord> {
        self.ledger.read().await.records.clone()
    }

    /// Current reading for one point and measurement.
    pub async fn latest(&self, point: PointId, measurement: &Measurement) -> Option<ValueRecord> {
        let ledger = self.ledger.read().await;
        ledger
            .latest
            .values()
            .find_map(|by_key| by_key.get(&(measurement.clone(), point)))
            .map(|&seq| ledger.records[seq].clone())
    }
}

fn check_batch(records: &[ValueRecord]) -> Result<(), StoreError> {
    match records.iter().position(|r| !r.value.is_finite()) {
        Some(index) => Err(StoreError::InvalidRecord {
            index,
            reason: format!("non-finite value {}", records[index].value),
        }),
        None => Ok(()),
    }
}

impl TimeSeriesStore for MemoryStore {
    fn insert_many(
        &self,
        records: Vec<ValueRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move {
            check_batch(&records)?;
            let mut ledger = self.ledger.write().await;
            ledger.records.reserve(records.len());
            for record in records {
                ledger.append(record);
            }
            Ok(())
        }
    }

    fn latest_per_room(&self) -> impl Future<Output = Result<Vec<RoomReadings>, StoreError>> + Send {
        async move {
            let ledger = self.ledger.read().await;
            let rooms = ledger
                .latest
                .iter()
                .map(|(&room, by_key)| RoomReadings {
                    room,
                    readings: by_key
                        .values()
                        .map(|&seq| ledger.records[seq].clone())
                        .collect(),
                })
                .collect();
            Ok(rooms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::EntityId;

    fn reading(point: u64, room: u64, m: Measurement, time: u64, value: f64) -> ValueRecord {
        ValueRecord::new(
            EntityId::new(point),
            EntityId::new(1),
            EntityId::new(room),
            m,
            time,
            value,
        )
        .expect("finite")
    }

    #[tokio::test]
    async fn latest_per_room_groups_by_room_and_key() {
        let store = MemoryStore::new();
        store
            .insert_many(vec![
                reading(10, 3, Measurement::Temperature, 1, 68.0),
                reading(11, 3, Measurement::SetPoint, 1, 72.0),
                reading(20, 4, Measurement::Temperature, 1, 69.0),
                reading(10, 3, Measurement::Temperature, 2, 68.5),
            ])
            .await
            .expect("insert");

        let rooms = store.latest_per_room().await.expect("query");
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].room, EntityId::new(3));
        assert_eq!(rooms[0].readings.len(), 2);
        let temp = rooms[0].temperatures().next().expect("temperature");
        assert_eq!((temp.time, temp.value), (2, 68.5));
        assert_eq!(rooms[0].set_point().map(|r| r.value), Some(72.0));
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn equal_timestamps_last_inserted_wins() {
        let store = MemoryStore::new();
        store
            .insert_many(vec![reading(10, 3, Measurement::Temperature, 5, 1.0)])
            .await
            .expect("insert");
        store
            .insert_many(vec![reading(10, 3, Measurement::Temperature, 5, 2.0)])
            .await
            .expect("insert");
        let latest = store
            .latest(EntityId::new(10), &Measurement::Temperature)
            .await;
        assert_eq!(latest.map(|r| r.value), Some(2.0));
    }

    #[tokio::test]
    async fn older_record_does_not_replace_latest() {
        let store = MemoryStore::new();
        store
            .insert_many(vec![
                reading(10, 3, Measurement::Temperature, 9, 1.0),
                reading(10, 3, Measurement::Temperature, 4, 2.0),
            ])
            .await
            .expect("insert");
        let rooms = store.latest_per_room().await.expect("query");
        assert_eq!(rooms[0].readings[0].value, 1.0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn invalid_batch_is_rejected_whole() {
        let store = MemoryStore::new();
        let mut bad = reading(11, 3, Measurement::Temperature, 1, 0.0);
        bad.value = f64::INFINITY;
        let err = store
            .insert_many(vec![reading(10, 3, Measurement::Temperature, 1, 70.0), bad])
            .await;
        assert!(matches!(err, Err(StoreError::InvalidRecord { index: 1, .. })));
        assert!(store.is_empty().await);
        assert!(store.latest_per_room().await.expect("query").is_empty());
    }
}
