//! Set-point convergence rules: seed readings and per-tick updates.

use rand::Rng;

use super::types::TickPlan;
use crate::config::SimulationSettings;
use crate::error::StoreError;
use crate::store::{Measurement, RoomReadings, ValueRecord};
use crate::topology::Point;

/// Fraction of the remaining gap closed per tick is `1 / CONVERGENCE_DIVISOR`.
pub const CONVERGENCE_DIVISOR: f64 = 10.0;

/// Moves temperature readings toward their room's set point.
///
/// Every value it produces is quantized down to a multiple of
/// `1 / precision`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPointController {
    init_temp: f64,
    init_temp_spread: f64,
    precision: f64,
}

impl SetPointController {
    pub fn new(init_temp: f64, init_temp_spread: f64, precision: f64) -> Self {
        Self {
            init_temp,
            init_temp_spread,
            precision,
        }
    }

    pub fn from_settings(settings: &SimulationSettings) -> Self {
        Self::new(
            settings.init_temp,
            settings.init_temp_spread,
            settings.precision,
        )
    }

    /// Rounds down to the quantization grid.
    pub fn quantize(&self, value: f64) -> f64 {
        (value * self.precision).floor() / self.precision
    }

    /// Initial temperature: `init_temp` jittered uniformly across
    /// `init_temp_spread`, then quantized.
    pub fn seed_temperature<R: Rng>(&self, rng: &mut R) -> f64 {
        let jitter = (rng.random::<f64>() - 0.5) * self.init_temp_spread;
        self.quantize(self.init_temp + jitter)
    }

    /// Next reading for a temperature point given its room's set point.
    pub fn next_temperature(&self, current: f64, set_point: f64) -> f64 {
        self.quantize(current + (set_point - current) / CONVERGENCE_DIVISOR)
    }

    /// One seed record per point, all stamped with `time`.
    ///
    /// Temperature points get a jittered reading; every other point starts
    /// at its own initial value, or `init_temp` when it has none.
    pub fn seed_readings<R: Rng>(
        &self,
        points: &[Point],
        time: u64,
        rng: &mut R,
    ) -> Result<Vec<ValueRecord>, StoreError> {
        points
            .iter()
            .map(|point| {
                let value = match point.measurement {
                    Measurement::Temperature => self.seed_temperature(rng),
                    _ => point.initial_value.unwrap_or(self.init_temp),
                };
                ValueRecord::new(
                    point.id,
                    point.building,
                    point.room,
                    point.measurement.clone(),
                    time,
                    value,
                )
            })
            .collect()
    }

    /// Stages the updates for one tick.
    ///
    /// Rooms without a set point are skipped. A temperature reading yields
    /// a record only when its next value differs from the current one.
    pub fn plan(&self, rooms: &[RoomReadings], time: u64) -> Result<TickPlan, StoreError> {
        let mut plan = TickPlan {
            rooms: rooms.len(),
            ..TickPlan::default()
        };
        for room in rooms {
            let Some(set_point) = room.set_point() else {
                plan.rooms_skipped += 1;
                continue;
            };
            for reading in room.temperatures() {
                let value = self.next_temperature(reading.value, set_point.value);
                if (value - reading.value).abs() > 0.0 {
                    plan.updates.push(reading.with_reading(time, value)?);
                }
            }
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::topology::EntityId;

    fn controller() -> SetPointController {
        SetPointController::new(70.0, 4.0, 2.0)
    }

    fn room(readings: &[(u64, Measurement, f64)]) -> RoomReadings {
        RoomReadings {
            room: EntityId::new(3),
            readings: readings
                .iter()
                .map(|(point, m, value)| {
                    ValueRecord::new(
                        EntityId::new(*point),
                        EntityId::new(1),
                        EntityId::new(3),
                        m.clone(),
                        1,
                        *value,
                    )
                    .expect("finite")
                })
                .collect(),
        }
    }

    #[test]
    fn seeded_temperatures_stay_in_band_and_on_grid() {
        let c = controller();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let t = c.seed_temperature(&mut rng);
            assert!((68.0..=72.0).contains(&t), "out of band: {t}");
            assert_eq!((t * 2.0).fract(), 0.0, "off grid: {t}");
        }
    }

    #[test]
    fn zero_spread_seeds_exactly_init_temp() {
        let c = SetPointController::new(70.0, 0.0, 2.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(c.seed_temperature(&mut rng), 70.0);
    }

    #[test]
    fn next_temperature_closes_a_tenth_of_the_gap() {
        let c = controller();
        assert_eq!(c.next_temperature(60.0, 72.0), 61.0);
        assert_eq!(c.next_temperature(72.0, 70.0), 71.5);
        assert_eq!(c.next_temperature(70.0, 72.0), 70.0);
    }

    #[test]
    fn repeated_ticks_converge_monotonically_to_a_fixed_point() {
        let c = controller();
        for (start, target) in [(50.0, 72.0), (90.0, 72.0), (71.5, 72.0), (72.0, 72.0)] {
            let mut t = start;
            let mut steps = 0;
            loop {
                let next = c.next_temperature(t, target);
                if next == t {
                    break;
                }
                if start < target {
                    assert!(next > t && next <= target);
                } else {
                    assert!(next < t && next >= target);
                }
                t = next;
                steps += 1;
                assert!(steps < 1_000, "no fixed point from {start}");
            }
            assert_eq!(c.next_temperature(t, target), t);
        }
    }

    #[test]
    fn room_without_set_point_is_skipped() {
        let c = controller();
        let rooms = [room(&[(10, Measurement::Temperature, 60.0)])];
        let plan = c.plan(&rooms, 5).expect("plan");
        assert!(plan.updates.is_empty());
        assert_eq!(plan.rooms_skipped, 1);
    }

    #[test]
    fn plan_updates_only_moving_temperatures() {
        let c = controller();
        let rooms = [room(&[
            (10, Measurement::Temperature, 60.0),
            (11, Measurement::Temperature, 72.0),
            (12, Measurement::SetPoint, 72.0),
            (13, Measurement::Other("humidity".into()), 40.0),
        ])];
        let plan = c.plan(&rooms, 99).expect("plan");
        assert_eq!(plan.updates.len(), 1);
        let update = &plan.updates[0];
        assert_eq!(update.point, EntityId::new(10));
        assert_eq!((update.time, update.value), (99, 61.0));
        assert_eq!(update.measurement, Measurement::Temperature);
    }

    #[test]
    fn seed_readings_respect_initial_values() {
        let c = controller();
        let point = |id: u64, measurement: Measurement, initial_value: Option<f64>| Point {
            id: EntityId::new(id),
            building: EntityId::new(1),
            room: EntityId::new(3),
            kind: "sensor".into(),
            measurement,
            initial_value,
            location: None,
        };
        let points = [
            point(10, Measurement::SetPoint, None),
            point(11, Measurement::SetPoint, Some(75.0)),
            point(12, Measurement::Temperature, None),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let seeded = c.seed_readings(&points, 7, &mut rng).expect("seed");
        assert_eq!(seeded.len(), 3);
        assert_eq!(seeded[0].value, 70.0);
        assert_eq!(seeded[1].value, 75.0);
        assert!((68.0..=72.0).contains(&seeded[2].value));
        assert!(seeded.iter().all(|r| r.time == 7));
    }
}
