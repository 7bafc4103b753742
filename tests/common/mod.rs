//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

use bms_sim::config::SimulationSettings;
use bms_sim::error::StoreError;
use bms_sim::store::{Measurement, MemoryStore, RoomReadings, TimeSeriesStore, ValueRecord};
use bms_sim::topology::{Building, EntityId, Floor, Point, Room, Topology};

pub const BUILDING: EntityId = EntityId::new(1);
pub const FLOOR: EntityId = EntityId::new(2);
pub const ROOM: EntityId = EntityId::new(3);
pub const SET_POINT: EntityId = EntityId::new(10);
pub const TEMPERATURE: EntityId = EntityId::new(11);

/// Loop settings that seed every temperature point at exactly `init_temp`
/// (zero spread, precision 2, 1 s interval, fixed RNG seed).
pub fn exact_settings(init_temp: f64) -> SimulationSettings {
    SimulationSettings {
        recalc_interval_ms: 1_000,
        init_temp,
        init_temp_spread: 0.0,
        precision: 2.0,
        seed: Some(7),
        store_timeout_ms: None,
    }
}

/// One building, one floor, one room with a temperature sensor and,
/// optionally, a thermostat set point.
pub fn single_room(set_point: Option<f64>) -> Topology {
    let mut points = vec![Point {
        id: TEMPERATURE,
        building: BUILDING,
        room: ROOM,
        kind: "sensor".into(),
        measurement: Measurement::Temperature,
        initial_value: None,
        location: None,
    }];
    if let Some(value) = set_point {
        points.insert(
            0,
            Point {
                id: SET_POINT,
                building: BUILDING,
                room: ROOM,
                kind: "thermostat".into(),
                measurement: Measurement::SetPoint,
                initial_value: Some(value),
                location: None,
            },
        );
    }
    Topology {
        buildings: vec![Building {
            id: BUILDING,
            name: "B1".into(),
            geometry: Vec::new(),
        }],
        floors: vec![Floor {
            id: FLOOR,
            building: BUILDING,
            level: 0,
            name: "F0".into(),
            geometry: Vec::new(),
        }],
        rooms: vec![Room {
            id: ROOM,
            building: BUILDING,
            floor: FLOOR,
            name: "R1".into(),
            geometry: Vec::new(),
        }],
        points,
    }
}

/// Rendezvous for holding a store call in flight.
#[derive(Debug, Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// [`MemoryStore`] wrapper that counts calls and can fail, hang, or pause.
#[derive(Debug, Default)]
pub struct TestStore {
    pub inner: MemoryStore,
    inserts: AtomicUsize,
    queries: AtomicUsize,
    fail_inserts_from: Option<usize>,
    gate: Option<Gate>,
    hang_queries: bool,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every `insert_many` call from the `n`-th one (zero-based) on.
    pub fn failing_inserts_from(mut self, n: usize) -> Self {
        self.fail_inserts_from = Some(n);
        self
    }

    /// Holds every `latest_per_room` call until `gate().release` fires.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Gate::default());
        self
    }

    /// `latest_per_room` never completes.
    pub fn hanging(mut self) -> Self {
        self.hang_queries = true;
        self
    }

    pub fn gate(&self) -> &Gate {
        self.gate.as_ref().expect("store built with gated()")
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl TimeSeriesStore for TestStore {
    fn insert_many(
        &self,
        records: Vec<ValueRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move {
            let call = self.inserts.fetch_add(1, Ordering::SeqCst);
            if self.fail_inserts_from.is_some_and(|n| call >= n) {
                return Err(StoreError::Backend {
                    message: "insert rejected".into(),
                });
            }
            self.inner.insert_many(records).await
        }
    }

    fn latest_per_room(&self) -> impl Future<Output = Result<Vec<RoomReadings>, StoreError>> + Send {
        async move {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
            if self.hang_queries {
                std::future::pending::<()>().await;
            }
            self.inner.latest_per_room().await
        }
    }
}
