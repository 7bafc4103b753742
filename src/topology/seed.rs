//! Geo seed: the `{areas, points}` shape produced by the geo importer.
//!
//! Areas form a building ← floor ← room hierarchy through their `parent`
//! back-reference; points hang off rooms. [`GeoSeed::into_topology`] resolves
//! that hierarchy into a typed [`Topology`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::types::{Building, Coordinate, EntityId, Floor, Point, Room, Topology};
use crate::error::SeedError;
use crate::store::Measurement;

/// File name of the seed inside `<data_dir>/geo/`.
pub const SEED_FILE: &str = "seed.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    Building,
    Floor,
    Room,
}

impl AreaKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Floor => "floor",
            Self::Room => "room",
        }
    }
}

/// A geographic feature outlining a building, floor or room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: EntityId,
    pub kind: AreaKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<EntityId>,
    /// Storey number, floors only. Defaults to the floor's position in its building.
    #[serde(default)]
    pub level: Option<i32>,
    #[serde(default)]
    pub geometry: Vec<Coordinate>,
}

/// A sensor or actuator feature whose `parent` is a room area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPoint {
    pub id: EntityId,
    pub parent: EntityId,
    #[serde(rename = "type")]
    pub kind: String,
    pub measurement: Measurement,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub location: Option<Coordinate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoSeed {
    pub areas: Vec<Area>,
    pub points: Vec<SeedPoint>,
}

impl GeoSeed {
    /// Loads `<data_dir>/geo/seed.json`.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::InvalidDataDir` when `data_dir` is not a
    /// directory, and an I/O or JSON error when the seed file is unreadable.
    pub fn from_dir(data_dir: &Path) -> Result<Self, SeedError> {
        if !data_dir.is_dir() {
            return Err(SeedError::InvalidDataDir(data_dir.to_path_buf()));
        }
        let path = data_dir.join("geo").join(SEED_FILE);
        let raw = fs::read_to_string(&path).map_err(|source| SeedError::Io {
            path: path.clone(),
            source,
        })?;
        let seed = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            areas = seed.areas.len(),
            points = seed.points.len(),
            "loaded geo seed"
        );
        Ok(seed)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Built-in seed: one building, one floor, three rooms, each with a
    /// thermostat set point and two temperature sensors.
    pub fn demo() -> Self {
        let square = |x: f64, y: f64, size: f64| {
            vec![[x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]]
        };
        let mut areas = vec![
            Area {
                id: EntityId::new(1),
                kind: AreaKind::Building,
                name: "Main".into(),
                parent: None,
                level: None,
                geometry: square(0.0, 0.0, 0.003),
            },
            Area {
                id: EntityId::new(2),
                kind: AreaKind::Floor,
                name: "Ground".into(),
                parent: Some(EntityId::new(1)),
                level: Some(0),
                geometry: square(0.0, 0.0, 0.003),
            },
        ];
        let mut points = Vec::new();
        let mut next = 3;
        for (i, name) in ["Lobby", "Office", "Lab"].into_iter().enumerate() {
            let room = EntityId::new(next);
            let x = i as f64 * 0.001;
            areas.push(Area {
                id: room,
                kind: AreaKind::Room,
                name: name.into(),
                parent: Some(EntityId::new(2)),
                level: None,
                geometry: square(x, 0.0, 0.001),
            });
            next += 1;

            let mut point = |kind: &str, measurement: Measurement, dx: f64| {
                points.push(SeedPoint {
                    id: EntityId::new(next),
                    parent: room,
                    kind: kind.into(),
                    measurement,
                    value: None,
                    location: Some([x + dx, 0.0005]),
                });
                next += 1;
            };
            point("thermostat", Measurement::SetPoint, 0.0005);
            point("sensor", Measurement::Temperature, 0.0002);
            point("sensor", Measurement::Temperature, 0.0008);
        }
        Self { areas, points }
    }

    /// Resolves the parent hierarchy into a typed topology.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedParent` or `WrongParentKind` when a feature's
    /// parent is missing or of the wrong kind, and a topology validation
    /// error for duplicate ids.
    pub fn into_topology(self) -> Result<Topology, SeedError> {
        let kinds: HashMap<EntityId, AreaKind> =
            self.areas.iter().map(|a| (a.id, a.kind)).collect();
        let parent_of = |area: &Area, expected: AreaKind| -> Result<EntityId, SeedError> {
            let kind = area.kind.as_str();
            let parent = area.parent.ok_or(SeedError::WrongParentKind {
                kind,
                id: area.id,
                expected: expected.as_str(),
            })?;
            match kinds.get(&parent) {
                None => Err(SeedError::UnresolvedParent {
                    kind,
                    id: area.id,
                    parent,
                }),
                Some(k) if *k != expected => Err(SeedError::WrongParentKind {
                    kind,
                    id: area.id,
                    expected: expected.as_str(),
                }),
                Some(_) => Ok(parent),
            }
        };

        let mut topology = Topology::default();
        let mut floor_building = HashMap::new();
        let mut room_building = HashMap::new();
        let mut floors_seen: HashMap<EntityId, i32> = HashMap::new();

        for area in self.areas.iter().filter(|a| a.kind == AreaKind::Building) {
            topology.buildings.push(Building {
                id: area.id,
                name: area.name.clone(),
                geometry: area.geometry.clone(),
            });
        }
        for area in self.areas.iter().filter(|a| a.kind == AreaKind::Floor) {
            let building = parent_of(area, AreaKind::Building)?;
            let ordinal = floors_seen.entry(building).or_insert(0);
            let level = area.level.unwrap_or(*ordinal);
            *ordinal += 1;
            floor_building.insert(area.id, building);
            topology.floors.push(Floor {
                id: area.id,
                building,
                level,
                name: area.name.clone(),
                geometry: area.geometry.clone(),
            });
        }
        for area in self.areas.iter().filter(|a| a.kind == AreaKind::Room) {
            let floor = parent_of(area, AreaKind::Floor)?;
            let building = floor_building.get(&floor).copied().ok_or(
                SeedError::UnresolvedParent {
                    kind: "room",
                    id: area.id,
                    parent: floor,
                },
            )?;
            room_building.insert(area.id, building);
            topology.rooms.push(Room {
                id: area.id,
                building,
                floor,
                name: area.name.clone(),
                geometry: area.geometry.clone(),
            });
        }
        for point in self.points {
            let Some(building) = room_building.get(&point.parent).copied() else {
                return Err(match kinds.get(&point.parent) {
                    Some(_) => SeedError::WrongParentKind {
                        kind: "point",
                        id: point.id,
                        expected: "room",
                    },
                    None => SeedError::UnresolvedParent {
                        kind: "point",
                        id: point.id,
                        parent: point.parent,
                    },
                });
            };
            topology.points.push(Point {
                id: point.id,
                building,
                room: point.parent,
                kind: point.kind,
                measurement: point.measurement,
                initial_value: point.value,
                location: point.location,
            });
        }

        topology.validate()?;
        Ok(topology)
    }
}
