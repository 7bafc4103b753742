//! Buildings, floors, rooms, and points forming the simulated estate.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TopologyError;
use crate::store::Measurement;

/// Stable identifier shared by every topology entity.
///
/// Ids are unique across entity kinds, so a single allocator can hand out
/// fresh ids for any replica.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-kind aliases; all kinds share one id space.
pub type BuildingId = EntityId;
pub type FloorId = EntityId;
pub type RoomId = EntityId;
pub type PointId = EntityId;

/// A `[longitude, latitude]` pair.
pub type Coordinate = [f64; 2];

#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub id: BuildingId,
    pub name: String,
    pub geometry: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Floor {
    pub id: FloorId,
    pub building: BuildingId,
    /// Storey number within the building.
    pub level: i32,
    pub name: String,
    pub geometry: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub building: BuildingId,
    pub floor: FloorId,
    pub name: String,
    pub geometry: Vec<Coordinate>,
}

/// A sensor or actuator location inside a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub building: BuildingId,
    pub room: RoomId,
    /// Device category, e.g. `"thermostat"` or `"sensor"`.
    pub kind: String,
    /// Quantity this point reports.
    pub measurement: Measurement,
    /// Reading used at seeding instead of the configured default.
    pub initial_value: Option<f64>,
    pub location: Option<Coordinate>,
}

/// The full building → floor → room → point graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    pub buildings: Vec<Building>,
    pub floors: Vec<Floor>,
    pub rooms: Vec<Room>,
    pub points: Vec<Point>,
}

impl Topology {
    /// A topology without rooms carries nothing the control loop can act on.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Largest id in use across all entity kinds.
    pub fn max_id(&self) -> Option<EntityId> {
        let buildings = self.buildings.iter().map(|b| b.id);
        let floors = self.floors.iter().map(|f| f.id);
        let rooms = self.rooms.iter().map(|r| r.id);
        let points = self.points.iter().map(|p| p.id);
        buildings.chain(floors).chain(rooms).chain(points).max()
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub fn points_in_room(&self, room: RoomId) -> impl Iterator<Item = &Point> {
        self.points.iter().filter(move |p| p.room == room)
    }

    /// Checks id uniqueness and that every cross-reference resolves.
    ///
    /// # Errors
    ///
    /// Returns the first `DuplicateId` or `DanglingReference` found.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut seen = HashSet::new();
        let mut claim = |kind: &'static str, id: EntityId| {
            if seen.insert(id) {
                Ok(())
            } else {
                Err(TopologyError::DuplicateId { kind, id })
            }
        };
        for b in &self.buildings {
            claim("building", b.id)?;
        }
        for f in &self.floors {
            claim("floor", f.id)?;
        }
        for r in &self.rooms {
            claim("room", r.id)?;
        }
        for p in &self.points {
            claim("point", p.id)?;
        }

        let buildings: HashSet<BuildingId> = self.buildings.iter().map(|b| b.id).collect();
        let floors: HashSet<(FloorId, BuildingId)> =
            self.floors.iter().map(|f| (f.id, f.building)).collect();
        let rooms: HashSet<(RoomId, BuildingId)> =
            self.rooms.iter().map(|r| (r.id, r.building)).collect();

        for f in &self.floors {
            if !buildings.contains(&f.building) {
                return Err(dangling("floor", f.id, "building", f.building));
            }
        }
        for r in &self.rooms {
            if !buildings.contains(&r.building) {
                return Err(dangling("room", r.id, "building", r.building));
            }
            if !floors.contains(&(r.floor, r.building)) {
                return Err(dangling("room", r.id, "floor", r.floor));
            }
        }
        for p in &self.points {
            if !rooms.contains(&(p.room, p.building)) {
                return Err(dangling("point", p.id, "room", p.room));
            }
        }
        Ok(())
    }
}

fn dangling(
    kind: &'static str,
    id: EntityId,
    target: &'static str,
    target_id: EntityId,
) -> TopologyError {
    TopologyError::DanglingReference {
        kind,
        id,
        target,
        target_id,
    }
}
