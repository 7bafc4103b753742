//! Replicates a base topology into a multi-floor, multi-building estate.
//!
//! Each replica draws fresh ids from one allocator and rewrites its internal
//! references through its own remapping table, so the relative structure of
//! the base is preserved exactly and no two replicas share an id.

use std::collections::HashMap;

use tracing::debug;

use super::types::{Building, EntityId, Floor, Point, Room, Topology};
use crate::error::TopologyError;

/// Hands out ids strictly above everything already in use.
#[derive(Debug)]
struct IdAllocator {
    /// `None` once `u64::MAX` has been handed out.
    next: Option<u64>,
}

impl IdAllocator {
    fn after(base: &Topology) -> Self {
        Self {
            next: base.max_id().map_or(Some(1), |id| id.get().checked_add(1)),
        }
    }

    fn fresh(&mut self) -> Result<EntityId, TopologyError> {
        let raw = self.next.ok_or(TopologyError::IdSpaceExhausted)?;
        self.next = raw.checked_add(1);
        Ok(EntityId::new(raw))
    }
}

/// Old → new id table for a single replica.
#[derive(Debug, Default)]
struct Remap {
    table: HashMap<EntityId, EntityId>,
}

impl Remap {
    fn assign(
        &mut self,
        old: EntityId,
        ids: &mut IdAllocator,
    ) -> Result<EntityId, TopologyError> {
        let new = ids.fresh()?;
        self.table.insert(old, new);
        Ok(new)
    }

    fn resolve(
        &self,
        kind: &'static str,
        id: EntityId,
        target: &'static str,
        old: EntityId,
    ) -> Result<EntityId, TopologyError> {
        self.table
            .get(&old)
            .copied()
            .ok_or(TopologyError::DanglingReference {
                kind,
                id,
                target,
                target_id: old,
            })
    }
}

fn check_base(base: &Topology, what: &'static str, count: usize) -> Result<(), TopologyError> {
    if base.is_empty() {
        return Err(TopologyError::Empty);
    }
    if count == 0 {
        return Err(TopologyError::InvalidCount { what, count });
    }
    base.validate()
}

/// Number of storeys each building spans in the base, used to stack floor replicas.
fn level_spans(base: &Topology) -> HashMap<EntityId, i32> {
    let mut bounds: HashMap<EntityId, (i32, i32)> = HashMap::new();
    for floor in &base.floors {
        let entry = bounds
            .entry(floor.building)
            .or_insert((floor.level, floor.level));
        entry.0 = entry.0.min(floor.level);
        entry.1 = entry.1.max(floor.level);
    }
    bounds
        .into_iter()
        .map(|(building, (lo, hi))| (building, hi - lo + 1))
        .collect()
}

/// Stacks `floor_count` copies of every floor (with its rooms and points)
/// inside the building it belongs to.
///
/// Building ids are kept; every floor, room and point gets a fresh id.
///
/// # Errors
///
/// Returns `TopologyError::Empty` for a base without rooms,
/// `TopologyError::InvalidCount` for a zero count,
/// `TopologyError::IdSpaceExhausted` when fresh ids would pass `u64::MAX`,
/// or a validation error if the base does not resolve.
pub fn duplicate_floors(base: &Topology, floor_count: usize) -> Result<Topology, TopologyError> {
    check_base(base, "floor", floor_count)?;
    let mut ids = IdAllocator::after(base);
    let spans = level_spans(base);

    let mut out = Topology {
        buildings: base.buildings.clone(),
        floors: Vec::with_capacity(base.floors.len() * floor_count),
        rooms: Vec::with_capacity(base.rooms.len() * floor_count),
        points: Vec::with_capacity(base.points.len() * floor_count),
    };

    for replica in 0..floor_count {
        let mut remap = Remap::default();
        let offset = i32::try_from(replica).unwrap_or(i32::MAX);

        for floor in &base.floors {
            let span = spans.get(&floor.building).copied().unwrap_or(1);
            out.floors.push(Floor {
                id: remap.assign(floor.id, &mut ids)?,
                level: floor.level.saturating_add(offset.saturating_mul(span)),
                ..floor.clone()
            });
        }
        for room in &base.rooms {
            let id = remap.assign(room.id, &mut ids)?;
            out.rooms.push(Room {
                id,
                floor: remap.resolve("room", room.id, "floor", room.floor)?,
                ..room.clone()
            });
        }
        for point in &base.points {
            let id = remap.assign(point.id, &mut ids)?;
            out.points.push(Point {
                id,
                room: remap.resolve("point", point.id, "room", point.room)?,
                ..point.clone()
            });
        }
    }

    debug!(
        floor_count,
        floors = out.floors.len(),
        rooms = out.rooms.len(),
        points = out.points.len(),
        "duplicated floors"
    );
    out.validate()?;
    Ok(out)
}

/// Replicates every building with all of its floors, rooms and points
/// `building_count` times.
///
/// # Errors
///
/// Same conditions as [`duplicate_floors`].
pub fn duplicate_buildings(
    base: &Topology,
    building_count: usize,
) -> Result<Topology, TopologyError> {
    check_base(base, "building", building_count)?;
    let mut ids = IdAllocator::after(base);

    let mut out = Topology {
        buildings: Vec::with_capacity(base.buildings.len() * building_count),
        floors: Vec::with_capacity(base.floors.len() * building_count),
        rooms: Vec::with_capacity(base.rooms.len() * building_count),
        points: Vec::with_capacity(base.points.len() * building_count),
    };

    for _ in 0..building_count {
        let mut remap = Remap::default();

        for building in &base.buildings {
            out.buildings.push(Building {
                id: remap.assign(building.id, &mut ids)?,
                ..building.clone()
            });
        }
        for floor in &base.floors {
            let id = remap.assign(floor.id, &mut ids)?;
            out.floors.push(Floor {
                id,
                building: remap.resolve("floor", floor.id, "building", floor.building)?,
                ..floor.clone()
            });
        }
        for room in &base.rooms {
            let id = remap.assign(room.id, &mut ids)?;
            out.rooms.push(Room {
                id,
                building: remap.resolve("room", room.id, "building", room.building)?,
                floor: remap.resolve("room", room.id, "floor", room.floor)?,
                ..room.clone()
            });
        }
        for point in &base.points {
            let id = remap.assign(point.id, &mut ids)?;
            out.points.push(Point {
                id,
                building: remap.resolve("point", point.id, "building", point.building)?,
                room: remap.resolve("point", point.id, "room", point.room)?,
                ..point.clone()
            });
        }
    }

    debug!(
        building_count,
        buildings = out.buildings.len(),
        rooms = out.rooms.len(),
        points = out.points.len(),
        "duplicated buildings"
    );
    out.validate()?;
    Ok(out)
}
