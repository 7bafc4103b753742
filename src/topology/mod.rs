//! Estate topology: typed entities, geo seed, and floor/building replication.

pub mod generator;
/// Geo importer output shape and its resolution into a topology.
pub mod seed;
pub mod types;

pub use generator::{duplicate_buildings, duplicate_floors};
pub use seed::{Area, AreaKind, GeoSeed, SeedPoint};
pub use types::{
    Building, BuildingId, Coordinate, EntityId, Floor, FloorId, Point, PointId, Room, RoomId,
    Topology,
};
