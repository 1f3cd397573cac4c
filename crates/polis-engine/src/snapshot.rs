//! Double-buffered tick aggregate snapshot and the per-tick context.
//!
//! The engine writes one [`TickSnapshot`] per tick. While a tick runs, the
//! previous tick's snapshot is *current* (read-only) and this tick's is
//! *next* (write-only). External consumers only ever see *current*; *next*
//! becomes current at the following tick boundary. [`TickContext`] carries
//! the buffer pair plus the tick-scoped labor and power pools so no
//! component reaches for ambient globals.

use polis_content::{BuildingId, GlobalBonus, Multiplier, ResourceId};
use polis_grid::GridPos;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::fixed::Fixed64;
use crate::io::TileIo;
use crate::pool::Pool;
use crate::state::SimOptions;

// ---------------------------------------------------------------------------
// Tile status
// ---------------------------------------------------------------------------

/// Why a tile did or did not produce this tick. Overwritten every tick;
/// there is no history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileStatus {
    Working,
    UnderConstruction,
    Upgrading,
    /// A required terrain deposit is missing under the tile.
    NotOnDeposit,
    /// Effective capacity is zero or the building is paused.
    TurnedOff,
    /// An importer pulled nothing this tick.
    NoActiveTransports,
    NotEnoughWorkers,
    NotEnoughResources,
    StorageFull,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A multiplier contribution with its human-readable source. The source is
/// for UI attribution only; logic never branches on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierEntry {
    pub source: String,
    pub value: Multiplier,
}

/// The aggregate result of one tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickSnapshot {
    /// Per-building-kind multiplier contributions.
    pub building_multipliers: BTreeMap<BuildingId, Vec<MultiplierEntry>>,
    /// Per-tile multiplier contributions (electrification, vault bonuses).
    pub tile_multipliers: BTreeMap<GridPos, Vec<MultiplierEntry>>,
    /// World-wide bonuses by kind.
    pub global_bonuses: BTreeMap<GlobalBonus, Vec<(String, Fixed64)>>,
    /// Which tiles held each resource at processing time, with amounts.
    /// The transportation router's candidate index.
    pub resource_index: BTreeMap<ResourceId, BTreeMap<GridPos, Fixed64>>,
    /// Positions of unique buildings present on the map.
    pub unique_buildings: BTreeMap<BuildingId, GridPos>,
    /// Market tiles available for player trading.
    pub tradeable_markets: std::collections::BTreeSet<GridPos>,
    /// Per-tile outcome of this tick.
    pub statuses: BTreeMap<GridPos, TileStatus>,
    /// Electrification levels applied this tick.
    pub electrified: BTreeMap<GridPos, u32>,
    /// Labor produced this tick, seeding next tick's worker pool.
    pub workers_produced: Fixed64,
    /// Power produced this tick, seeding next tick's power pool.
    pub power_produced: Fixed64,
    /// Labor left unspent at the end of the tick.
    pub idle_workers: Fixed64,
    pub happiness: Fixed64,
    pub science_produced: Fixed64,
    /// Accumulated world value (building value plus priced stockpiles).
    pub total_value: Fixed64,
    /// Everything created this tick, by resource.
    pub produced: BTreeMap<ResourceId, Fixed64>,
    /// Everything destroyed this tick, by resource.
    pub consumed: BTreeMap<ResourceId, Fixed64>,
}

impl TickSnapshot {
    /// Sum of all multiplier contributions that apply to a building of
    /// `kind` at `pos`. The implicit base of 1 is not included.
    pub fn multiplier_for(&self, kind: BuildingId, pos: GridPos) -> Multiplier {
        let mut total = Multiplier::ZERO;
        if let Some(entries) = self.building_multipliers.get(&kind) {
            for e in entries {
                total += e.value;
            }
        }
        if let Some(entries) = self.tile_multipliers.get(&pos) {
            for e in entries {
                total += e.value;
            }
        }
        total
    }

    /// Sum of all contributions to a global bonus kind.
    pub fn global_bonus(&self, kind: GlobalBonus) -> Fixed64 {
        self.global_bonuses
            .get(&kind)
            .map(|entries| entries.iter().fold(Fixed64::ZERO, |acc, (_, v)| acc + *v))
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn add_building_multiplier(
        &mut self,
        kind: BuildingId,
        source: impl Into<String>,
        value: Multiplier,
    ) {
        self.building_multipliers
            .entry(kind)
            .or_default()
            .push(MultiplierEntry {
                source: source.into(),
                value,
            });
    }

    pub fn add_tile_multiplier(
        &mut self,
        pos: GridPos,
        source: impl Into<String>,
        value: Multiplier,
    ) {
        self.tile_multipliers
            .entry(pos)
            .or_default()
            .push(MultiplierEntry {
                source: source.into(),
                value,
            });
    }

    pub fn add_global_bonus(
        &mut self,
        kind: GlobalBonus,
        source: impl Into<String>,
        value: Fixed64,
    ) {
        self.global_bonuses
            .entry(kind)
            .or_default()
            .push((source.into(), value));
    }

    pub fn index_resource(&mut self, resource: ResourceId, pos: GridPos, amount: Fixed64) {
        if amount <= Fixed64::ZERO {
            return;
        }
        self.resource_index
            .entry(resource)
            .or_default()
            .insert(pos, amount);
    }

    pub fn record_produced(&mut self, resource: ResourceId, amount: Fixed64) {
        if amount <= Fixed64::ZERO {
            return;
        }
        *self.produced.entry(resource).or_insert(Fixed64::ZERO) += amount;
    }

    pub fn record_consumed(&mut self, resource: ResourceId, amount: Fixed64) {
        if amount <= Fixed64::ZERO {
            return;
        }
        *self.consumed.entry(resource).or_insert(Fixed64::ZERO) += amount;
    }
}

// ---------------------------------------------------------------------------
// TickContext
// ---------------------------------------------------------------------------

/// Tick-scoped shared state, passed by reference into every engine
/// component: the snapshot buffer pair, the depletable pools, and the
/// intra-tick IO memo cache.
#[derive(Debug, Default)]
pub struct TickContext {
    current: TickSnapshot,
    next: TickSnapshot,
    /// Shared labor pool for this tick.
    pub workers: Pool,
    /// Shared power pool for this tick.
    pub power: Pool,
    /// Per-tile effective IO, memoized within one tick.
    io_cache: BTreeMap<GridPos, TileIo>,
}

impl TickContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new tick: publish *next* as *current*, reset *next* to empty,
    /// clear the memo cache, and reseed the pools from base values plus what
    /// the just-published tick produced.
    pub fn begin_tick(&mut self, options: &SimOptions) {
        self.current = std::mem::take(&mut self.next);
        self.io_cache.clear();
        self.workers = Pool::new(options.base_workers + self.current.workers_produced);
        self.power = Pool::new(options.base_power + self.current.power_produced);
    }

    /// The published snapshot of the previous tick. Read-only.
    pub fn current(&self) -> &TickSnapshot {
        &self.current
    }

    /// The snapshot being accumulated this tick. Write-only by convention.
    pub fn next_mut(&mut self) -> &mut TickSnapshot {
        &mut self.next
    }

    /// Memoized IO lookup. The compute closure runs at most once per tile
    /// per tick.
    pub fn io_cached(&mut self, pos: GridPos, compute: impl FnOnce(&TickSnapshot) -> TileIo) -> TileIo {
        if let Some(io) = self.io_cache.get(&pos) {
            return io.clone();
        }
        let io = compute(&self.current);
        self.io_cache.insert(pos, io.clone());
        io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;

    #[test]
    fn swap_publishes_next() {
        let mut ctx = TickContext::new();
        ctx.next_mut().workers_produced = f64_to_fixed64(3.0);
        ctx.begin_tick(&SimOptions::default());
        assert_eq!(ctx.current().workers_produced, f64_to_fixed64(3.0));
        // Next is reset to empty.
        assert_eq!(ctx.next_mut().workers_produced, Fixed64::ZERO);
    }

    #[test]
    fn pools_seeded_from_published_production() {
        let mut ctx = TickContext::new();
        ctx.next_mut().workers_produced = f64_to_fixed64(4.0);
        ctx.next_mut().power_produced = f64_to_fixed64(2.0);
        let options = SimOptions::default();
        ctx.begin_tick(&options);
        assert_eq!(
            ctx.workers.total(),
            options.base_workers + f64_to_fixed64(4.0)
        );
        assert_eq!(ctx.power.total(), f64_to_fixed64(2.0));
    }

    #[test]
    fn multiplier_for_sums_kind_and_tile() {
        let mut snap = TickSnapshot::default();
        let kind = BuildingId(1);
        let pos = GridPos::new(2, 2);
        snap.add_building_multiplier(
            kind,
            "tech",
            Multiplier {
                output: Fixed64::ONE,
                ..Multiplier::ZERO
            },
        );
        snap.add_tile_multiplier(
            pos,
            "electrification",
            Multiplier {
                output: f64_to_fixed64(0.5),
                ..Multiplier::ZERO
            },
        );
        let m = snap.multiplier_for(kind, pos);
        assert_eq!(m.output, f64_to_fixed64(1.5));
        // Another tile only sees the kind-level entry.
        let m = snap.multiplier_for(kind, GridPos::new(0, 0));
        assert_eq!(m.output, Fixed64::ONE);
    }

    #[test]
    fn global_bonus_sums_entries() {
        let mut snap = TickSnapshot::default();
        snap.add_global_bonus(GlobalBonus::TransportCapacity, "a", Fixed64::ONE);
        snap.add_global_bonus(GlobalBonus::TransportCapacity, "b", f64_to_fixed64(0.5));
        assert_eq!(
            snap.global_bonus(GlobalBonus::TransportCapacity),
            f64_to_fixed64(1.5)
        );
        assert_eq!(snap.global_bonus(GlobalBonus::Happiness), Fixed64::ZERO);
    }

    #[test]
    fn resource_index_skips_zero_amounts() {
        let mut snap = TickSnapshot::default();
        snap.index_resource(ResourceId(3), GridPos::new(1, 1), Fixed64::ZERO);
        assert!(snap.resource_index.is_empty());
        snap.index_resource(ResourceId(3), GridPos::new(1, 1), Fixed64::ONE);
        assert_eq!(snap.resource_index[&ResourceId(3)].len(), 1);
    }

    #[test]
    fn io_cache_computes_once() {
        let mut ctx = TickContext::new();
        let pos = GridPos::new(1, 1);
        let mut calls = 0;
        for _ in 0..3 {
            ctx.io_cached(pos, |_| {
                calls += 1;
                TileIo::default()
            });
        }
        assert_eq!(calls, 1);
    }
}
