//! Effective per-tile IO: input/output quantities, worker requirement, and
//! storage capacity for one tick, folded with the multipliers published in
//! the current snapshot.

use polis_content::{ContentDb, ResourceId};
use polis_grid::GridPos;
use std::collections::BTreeMap;

use crate::building::Building;
use crate::fixed::Fixed64;
use crate::snapshot::TickSnapshot;

/// Effective quantities for one tile this tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TileIo {
    pub input: BTreeMap<ResourceId, Fixed64>,
    pub output: BTreeMap<ResourceId, Fixed64>,
    pub workers: Fixed64,
    pub storage: Fixed64,
}

/// Compute a tile's effective IO from its building and the current
/// snapshot's multipliers.
///
/// Input and output scale with level, capacity throttle, and the output
/// multiplier. The worker requirement scales with level and capacity and is
/// divided by the worker multiplier (better workers need fewer of them).
/// Storage scales with level and the storage multiplier but ignores the
/// capacity throttle.
pub fn tile_io(
    content: &ContentDb,
    pos: GridPos,
    building: &Building,
    snapshot: &TickSnapshot,
) -> TileIo {
    let def = content.building(building.kind);
    let m = snapshot.multiplier_for(building.kind, pos);
    let level = Fixed64::from_num(building.level);
    let throttle = building.capacity.clamp(Fixed64::ZERO, Fixed64::ONE);
    let scale = level * throttle * (Fixed64::ONE + m.output);

    let worker_divisor = (Fixed64::ONE + m.worker).max(Fixed64::ONE);
    TileIo {
        input: def
            .input
            .iter()
            .map(|(r, base)| (*r, *base * scale))
            .collect(),
        output: def
            .output
            .iter()
            .map(|(r, base)| (*r, *base * scale))
            .collect(),
        workers: def.workers * level * throttle / worker_divisor,
        storage: def.base_storage * level * (Fixed64::ONE + m.storage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;
    use crate::state::SimOptions;
    use crate::test_utils::TestWorld;
    use polis_content::Multiplier;

    #[test]
    fn io_scales_with_level_and_throttle() {
        let world = TestWorld::new();
        let pos = GridPos::new(0, 0);
        let mut b = Building::completed(world.quarry, 2, &SimOptions::default());
        b.capacity = f64_to_fixed64(0.5);

        let snap = TickSnapshot::default();
        let io = tile_io(&world.content, pos, &b, &snap);
        // quarry: input wood 1, output stone 2, workers 2, storage 100.
        assert_eq!(io.input[&world.wood], f64_to_fixed64(1.0));
        assert_eq!(io.output[&world.stone], f64_to_fixed64(2.0));
        assert_eq!(io.workers, f64_to_fixed64(2.0));
        assert_eq!(io.storage, f64_to_fixed64(200.0));
    }

    #[test]
    fn output_multiplier_scales_input_and_output() {
        let world = TestWorld::new();
        let pos = GridPos::new(0, 0);
        let b = Building::completed(world.quarry, 1, &SimOptions::default());

        let mut snap = TickSnapshot::default();
        snap.add_building_multiplier(
            world.quarry,
            "tech",
            Multiplier {
                output: Fixed64::ONE,
                ..Multiplier::ZERO
            },
        );
        let io = tile_io(&world.content, pos, &b, &snap);
        assert_eq!(io.output[&world.stone], f64_to_fixed64(4.0));
        assert_eq!(io.input[&world.wood], f64_to_fixed64(2.0));
        // Workers are not affected by the output multiplier.
        assert_eq!(io.workers, f64_to_fixed64(2.0));
    }

    #[test]
    fn worker_multiplier_reduces_requirement() {
        let world = TestWorld::new();
        let pos = GridPos::new(0, 0);
        let b = Building::completed(world.quarry, 1, &SimOptions::default());

        let mut snap = TickSnapshot::default();
        snap.add_building_multiplier(
            world.quarry,
            "tech",
            Multiplier {
                worker: Fixed64::ONE,
                ..Multiplier::ZERO
            },
        );
        let io = tile_io(&world.content, pos, &b, &snap);
        assert_eq!(io.workers, f64_to_fixed64(1.0));
    }

    #[test]
    fn storage_ignores_throttle() {
        let world = TestWorld::new();
        let pos = GridPos::new(0, 0);
        let mut b = Building::completed(world.quarry, 1, &SimOptions::default());
        b.capacity = Fixed64::ZERO;

        let io = tile_io(&world.content, pos, &b, &TickSnapshot::default());
        assert_eq!(io.storage, f64_to_fixed64(100.0));
        assert_eq!(io.workers, Fixed64::ZERO);
        assert_eq!(io.output[&world.stone], Fixed64::ZERO);
    }
}
