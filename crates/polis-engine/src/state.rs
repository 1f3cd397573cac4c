//! The root simulation aggregate: tiles, in-flight shipments, unlocked
//! technology, specialists, and tuning options.
//!
//! `GameState` is mutated in place by the engine and is never partially
//! visible outside a tick. Everything in it serializes deterministically:
//! all maps are ordered, and slotmap keys are stable across a
//! serialize/deserialize round trip.

use polis_content::{ResourceId, SpecialistId, TechId};
use polis_grid::{Grid, GridPos};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet};

use crate::building::{Building, Tile};
use crate::fixed::{Fixed64, Ticks, f64_to_fixed64};

// ---------------------------------------------------------------------------
// Shipments
// ---------------------------------------------------------------------------

slotmap::new_key_type! {
    /// Stable handle for an in-flight shipment.
    pub struct ShipmentId;
}

/// An in-flight transfer of one resource between two tiles. Owned by the
/// destination tile's queue; removed (and its amount credited) when
/// `ticks_spent` reaches `ticks_required`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub resource: ResourceId,
    pub amount: Fixed64,
    /// The resource consumed per travel tick to keep the shipment moving.
    pub fuel_resource: ResourceId,
    /// Nominal per-tick fuel cost (labor units carrying the load).
    pub fuel_amount: Fixed64,
    /// Fuel charged this tick after zone discounts. Display-only.
    pub current_fuel: Fixed64,
    pub from: GridPos,
    pub to: GridPos,
    pub ticks_spent: Ticks,
    pub ticks_required: Ticks,
    /// Whether the shipment found fuel last tick (stalled otherwise).
    pub fueled: bool,
}

impl Shipment {
    /// Travel progress in `[0, 1]`.
    pub fn progress(&self) -> Fixed64 {
        if self.ticks_required == 0 {
            return Fixed64::ONE;
        }
        Fixed64::from_num(self.ticks_spent) / Fixed64::from_num(self.ticks_required)
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// World tuning constants. Fixed at state creation; not touched by the
/// engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimOptions {
    /// Labor available every tick before residential production.
    pub base_workers: Fixed64,
    /// Power available every tick before generator production.
    pub base_power: Fixed64,
    /// Resource units one labor unit can haul, before global bonuses.
    pub transport_capacity: Fixed64,
    /// Resource units one claimed builder moves toward a site per tick.
    pub builder_capacity: Fixed64,
    /// Default input stockpile multiple applied on construction completion.
    pub default_stockpile: Fixed64,
    /// Travel ticks per unit of grid distance.
    pub ticks_per_tile: Ticks,
    /// Idle redistribution budget per warehouse level.
    pub warehouse_idle_capacity: Fixed64,
    /// Science produced per unit of labor left unspent at tick end.
    pub science_per_idle_worker: Fixed64,
    /// Happiness before global bonuses.
    pub base_happiness: Fixed64,
    /// Priority applied on construction completion.
    pub default_priority: u8,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            base_workers: f64_to_fixed64(10.0),
            base_power: Fixed64::ZERO,
            transport_capacity: Fixed64::ONE,
            builder_capacity: Fixed64::ONE,
            default_stockpile: f64_to_fixed64(5.0),
            ticks_per_tile: 1,
            warehouse_idle_capacity: f64_to_fixed64(10.0),
            science_per_idle_worker: Fixed64::ZERO,
            base_happiness: Fixed64::ZERO,
            default_priority: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The root aggregate the engine advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub grid: Grid,
    pub tiles: BTreeMap<GridPos, Tile>,
    /// All in-flight shipments.
    pub shipments: SlotMap<ShipmentId, Shipment>,
    /// Per-destination shipment queues. Keys with empty queues are removed
    /// so the encoding stays canonical.
    pub shipment_queues: BTreeMap<GridPos, Vec<ShipmentId>>,
    pub unlocked_tech: BTreeSet<TechId>,
    /// Owned specialist levels.
    pub specialists: BTreeMap<SpecialistId, u32>,
    /// Previewed specialist levels; contribute to the snapshot only and are
    /// never persisted as owned.
    pub specialist_previews: BTreeMap<SpecialistId, u32>,
    /// Monotonically increasing tick counter.
    pub tick: Ticks,
    /// Wall-clock hour bucket of the last market pairing rotation.
    pub last_price_bucket: Option<u64>,
    pub options: SimOptions,
}

impl GameState {
    pub fn new(grid: Grid, options: SimOptions) -> Self {
        Self {
            grid,
            tiles: BTreeMap::new(),
            shipments: SlotMap::with_key(),
            shipment_queues: BTreeMap::new(),
            unlocked_tech: BTreeSet::new(),
            specialists: BTreeMap::new(),
            specialist_previews: BTreeMap::new(),
            tick: 0,
            last_price_bucket: None,
            options,
        }
    }

    pub fn building(&self, pos: GridPos) -> Option<&Building> {
        self.tiles.get(&pos).and_then(|t| t.building.as_ref())
    }

    pub fn building_mut(&mut self, pos: GridPos) -> Option<&mut Building> {
        self.tiles.get_mut(&pos).and_then(|t| t.building.as_mut())
    }

    /// Place a tile, replacing whatever was there.
    pub fn set_tile(&mut self, pos: GridPos, tile: Tile) {
        self.tiles.insert(pos, tile);
    }

    /// Total amount of `resource` already en route to `dest`.
    pub fn in_transit_amount(&self, dest: GridPos, resource: ResourceId) -> Fixed64 {
        let Some(queue) = self.shipment_queues.get(&dest) else {
            return Fixed64::ZERO;
        };
        queue
            .iter()
            .filter_map(|id| self.shipments.get(*id))
            .filter(|s| s.resource == resource)
            .fold(Fixed64::ZERO, |acc, s| acc + s.amount)
    }

    /// Total amount of anything en route to `dest`, counted against its
    /// storage headroom.
    pub fn in_transit_total(&self, dest: GridPos) -> Fixed64 {
        let Some(queue) = self.shipment_queues.get(&dest) else {
            return Fixed64::ZERO;
        };
        queue
            .iter()
            .filter_map(|id| self.shipments.get(*id))
            .fold(Fixed64::ZERO, |acc, s| acc + s.amount)
    }

    /// Register a new shipment into its destination queue.
    pub fn enqueue_shipment(&mut self, shipment: Shipment) -> ShipmentId {
        let dest = shipment.to;
        let id = self.shipments.insert(shipment);
        self.shipment_queues.entry(dest).or_default().push(id);
        id
    }

    /// Remove a shipment from the map and its destination queue.
    pub fn remove_shipment(&mut self, id: ShipmentId) -> Option<Shipment> {
        let shipment = self.shipments.remove(id)?;
        if let Some(queue) = self.shipment_queues.get_mut(&shipment.to) {
            queue.retain(|q| *q != id);
            if queue.is_empty() {
                self.shipment_queues.remove(&shipment.to);
            }
        }
        Some(shipment)
    }

    /// Sum of all tile ledgers plus all in-flight amounts, per resource.
    /// The conservation quantity: it only changes through production and
    /// consumption recorded in the snapshot.
    pub fn resource_totals(&self) -> BTreeMap<ResourceId, Fixed64> {
        let mut totals: BTreeMap<ResourceId, Fixed64> = BTreeMap::new();
        for tile in self.tiles.values() {
            if let Some(b) = &tile.building {
                for (r, amount) in &b.resources {
                    *totals.entry(*r).or_insert(Fixed64::ZERO) += *amount;
                }
            }
        }
        for shipment in self.shipments.values() {
            *totals.entry(shipment.resource).or_insert(Fixed64::ZERO) += shipment.amount;
        }
        totals
    }
}
