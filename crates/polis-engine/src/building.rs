//! Per-tile building state: the lifecycle status machine's data side, the
//! resource ledger, and the kind-specific extras.

use polis_content::{ContentDb, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::fixed::Fixed64;
use crate::state::SimOptions;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status. Legal transitions: `Building -> Completed`,
/// `Completed -> Upgrading -> Completed`, `Completed <-> Paused`. A level
/// never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingStatus {
    Building,
    Upgrading,
    Completed,
    Paused,
}

// ---------------------------------------------------------------------------
// Kind-specific extras
// ---------------------------------------------------------------------------

/// Fields that only exist for certain building classes. Dispatch is on this
/// tag; the engine never probes for optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum BuildingExtra {
    #[default]
    None,
    Market {
        /// Resources the player has chosen to sell.
        sell: BTreeSet<ResourceId>,
        /// Current sell -> buy assignment, refreshed hourly.
        pairings: BTreeMap<ResourceId, ResourceId>,
        /// Clear the sell selection whenever pairings rotate.
        clear_sell_on_update: bool,
    },
    Warehouse {
        /// Autonomous redistribution of overflowing tiles into idle capacity.
        autopilot: bool,
    },
    Importer {
        /// Per-resource import caps; the importer pulls each resource up to
        /// its cap and does nothing else.
        caps: BTreeMap<ResourceId, Fixed64>,
    },
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// A building occupying a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub kind: polis_content::BuildingId,
    pub status: BuildingStatus,
    pub level: u32,
    /// Target level; `Upgrading` runs until `level >= desired_level`.
    pub desired_level: u32,
    /// Production throttle in `[0, 1]`. Zero reads as turned off.
    pub capacity: Fixed64,
    /// Higher priority claims shared pools first.
    pub priority: u8,
    /// How many ticks worth of each input the tile may hold and pull.
    pub stockpile_capacity: Fixed64,
    /// Electrification level; power consumption is clamped to `level`.
    pub electrification: u32,
    /// The stockpile. Every entry stays >= 0.
    pub resources: BTreeMap<ResourceId, Fixed64>,
    pub extra: BuildingExtra,
}

impl Building {
    /// A fresh construction site for the given kind. Construction sites do
    /// not produce; their defaults are applied on completion.
    pub fn construction_site(kind: polis_content::BuildingId) -> Self {
        Self {
            kind,
            status: BuildingStatus::Building,
            level: 0,
            desired_level: 1,
            capacity: Fixed64::ZERO,
            priority: 0,
            stockpile_capacity: Fixed64::ZERO,
            electrification: 0,
            resources: BTreeMap::new(),
            extra: BuildingExtra::None,
        }
    }

    /// A completed building at the given level, with default runtime fields.
    pub fn completed(
        kind: polis_content::BuildingId,
        level: u32,
        options: &SimOptions,
    ) -> Self {
        Self {
            kind,
            status: BuildingStatus::Completed,
            level,
            desired_level: level,
            capacity: Fixed64::ONE,
            priority: options.default_priority,
            stockpile_capacity: options.default_stockpile,
            electrification: 0,
            resources: BTreeMap::new(),
            extra: BuildingExtra::None,
        }
    }

    pub fn is_under_construction(&self) -> bool {
        matches!(self.status, BuildingStatus::Building | BuildingStatus::Upgrading)
    }

    /// Amount of `resource` currently in the ledger.
    pub fn amount(&self, resource: ResourceId) -> Fixed64 {
        self.resources.get(&resource).copied().unwrap_or(Fixed64::ZERO)
    }

    /// Add to the ledger. Zero-amount entries are dropped so the ledger
    /// encoding stays canonical.
    pub fn credit(&mut self, resource: ResourceId, amount: Fixed64) {
        if amount <= Fixed64::ZERO {
            return;
        }
        *self.resources.entry(resource).or_insert(Fixed64::ZERO) += amount;
    }

    /// Remove from the ledger, clamping at zero. Returns the amount
    /// actually removed.
    pub fn debit(&mut self, resource: ResourceId, amount: Fixed64) -> Fixed64 {
        if amount <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        let Some(held) = self.resources.get_mut(&resource) else {
            return Fixed64::ZERO;
        };
        let taken = amount.min(*held);
        *held -= taken;
        if *held <= Fixed64::ZERO {
            self.resources.remove(&resource);
        }
        taken
    }

    /// Total stockpiled amount counted against storage.
    pub fn storage_used(&self) -> Fixed64 {
        self.resources
            .values()
            .fold(Fixed64::ZERO, |acc, v| acc + *v)
    }

    /// Apply post-construction defaults and mark completed.
    pub fn complete(&mut self, options: &SimOptions) {
        self.status = BuildingStatus::Completed;
        self.capacity = Fixed64::ONE;
        self.priority = options.default_priority;
        self.stockpile_capacity = options.default_stockpile;
    }

    /// Whether this building counts as warehouse-kind for the adjacency
    /// capacity rule.
    pub fn is_warehouse(&self, content: &ContentDb) -> bool {
        content.building(self.kind).class == polis_content::BuildingClass::Warehouse
    }
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// One cell of the world grid. Deposits are immutable terrain facts; the
/// engine only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Tile {
    pub deposits: BTreeSet<ResourceId>,
    pub explored: bool,
    pub building: Option<Building>,
}

impl Tile {
    pub fn explored_with(building: Building) -> Self {
        Self {
            deposits: BTreeSet::new(),
            explored: true,
            building: Some(building),
        }
    }
}
