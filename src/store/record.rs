//! Value records: the append-only readings kept in the ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::topology::{BuildingId, PointId, RoomId};

/// Named quantity carried by a reading.
///
/// Serialized as its wire name: `temperature`, `set_point`, or any other
/// string verbatim.
///
/// `Other` is meant for names without a dedicated variant. Build values
/// with `From<String>`/`From<&str>`, or call [`Measurement::canonical`],
/// so that `Other("set_point")` never stands in for `SetPoint`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Measurement {
    Temperature,
    SetPoint,
    Other(String),
}

impl Measurement {
    /// Folds an `Other` carrying a known wire name into its variant.
    pub fn canonical(self) -> Self {
        match self {
            Self::Other(name) => Self::from(name),
            known => known,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Temperature => "temperature",
            Self::SetPoint => "set_point",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Measurement {
    fn from(name: String) -> Self {
        match name.as_str() {
            "temperature" => Self::Temperature,
            "set_point" => Self::SetPoint,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for Measurement {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<Measurement> for String {
    fn from(m: Measurement) -> Self {
        match m {
            Measurement::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reading in the ledger. Never mutated once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub point: PointId,
    pub building: BuildingId,
    pub room: RoomId,
    pub measurement: Measurement,
    /// Milliseconds since the Unix epoch.
    pub time: u64,
    pub value: f64,
}

impl ValueRecord {
    /// Builds a record, rejecting non-finite values.
    ///
    /// The measurement is stored in [canonical](Measurement::canonical) form.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NonFinite` for NaN or infinite values.
    pub fn new(
        point: PointId,
        building: BuildingId,
        room: RoomId,
        measurement: Measurement,
        time: u64,
        value: f64,
    ) -> Result<Self, StoreError> {
        if !value.is_finite() {
            return Err(StoreError::NonFinite { point, value });
        }
        Ok(Self {
            point,
            building,
            room,
            measurement: measurement.canonical(),
            time,
            value,
        })
    }

    /// A follow-up reading for the same point and measurement.
    pub fn with_reading(&self, time: u64, value: f64) -> Result<Self, StoreError> {
        Self::new(
            self.point,
            self.building,
            self.room,
            self.measurement.clone(),
            time,
            value,
        )
    }
}

/// Latest reading for every `(measurement, point)` pair seen in one room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomReadings {
    pub room: RoomId,
    /// Ordered by measurement, then point.
    pub readings: Vec<ValueRecord>,
}

impl RoomReadings {
    /// The room's set point; the lowest point id wins if a room has several.
    pub fn set_point(&self) -> Option<&ValueRecord> {
        self.readings
            .iter()
            .find(|r| r.measurement == Measurement::SetPoint)
    }

    pub fn temperatures(&self) -> impl Iterator<Item = &ValueRecord> {
        self.readings
            .iter()
            .filter(|r| r.measurement == Measurement::Temperature)
    }
}
