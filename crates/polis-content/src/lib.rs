//! Static game content for the Polis simulation engine.
//!
//! Resources, buildings, technologies, and specialists are registered at
//! startup through [`ContentBuilder`] and frozen into an immutable
//! [`ContentDb`]. The simulation core only ever reads this data; a missing
//! or malformed definition is a content defect, so cross-references are
//! validated once at build time and lookups panic on unknown ids rather
//! than limping along.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub mod fixed;
#[cfg(feature = "data-loader")]
pub mod loader;

use fixed::Fixed64;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifies a resource kind. Cheap to copy and compare.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ResourceId(pub u16);

/// Identifies a building kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BuildingId(pub u16);

/// Identifies a technology.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TechId(pub u16);

/// Identifies a specialist (a named unit whose levels grant per-tick bonuses).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SpecialistId(pub u16);

// ---------------------------------------------------------------------------
// Multipliers
// ---------------------------------------------------------------------------

/// A per-building numeric bonus. Each field is an additive bonus on top of
/// the implicit base of 1 (so `output: 0.5` means +50% output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Multiplier {
    /// Bonus to produced (and consumed) resource quantities.
    pub output: Fixed64,
    /// Bonus to how much work each assigned worker performs.
    pub worker: Fixed64,
    /// Bonus to storage capacity.
    pub storage: Fixed64,
}

impl Multiplier {
    pub const ZERO: Multiplier = Multiplier {
        output: Fixed64::ZERO,
        worker: Fixed64::ZERO,
        storage: Fixed64::ZERO,
    };

    /// Scale every field by a factor (used for specialist levels).
    pub fn scaled(&self, factor: Fixed64) -> Multiplier {
        Multiplier {
            output: self.output * factor,
            worker: self.worker * factor,
            storage: self.storage * factor,
        }
    }
}

impl core::ops::AddAssign for Multiplier {
    fn add_assign(&mut self, rhs: Multiplier) {
        self.output += rhs.output;
        self.worker += rhs.worker;
        self.storage += rhs.storage;
    }
}

impl core::ops::Add for Multiplier {
    type Output = Multiplier;

    fn add(self, rhs: Multiplier) -> Multiplier {
        Multiplier {
            output: self.output + rhs.output,
            worker: self.worker + rhs.worker,
            storage: self.storage + rhs.storage,
        }
    }
}

/// A world-wide bonus kind, not tied to any one building.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum GlobalBonus {
    /// Extra transport capacity per unit of labor spent on hauling.
    TransportCapacity,
    /// Extra material moved per builder claimed by a construction site.
    BuilderCapacity,
    /// Flat happiness contribution.
    Happiness,
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// A resource kind definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub name: String,
    /// Whether markets may price and trade this resource.
    pub priceable: bool,
    /// Whether the resource can sit in a tile ledger. Non-storable outputs
    /// (labor, abstract byproducts) route to the shared pools instead.
    pub storable: bool,
    /// Whether the resource can be hauled between tiles.
    pub transportable: bool,
    /// Base unit price, used for world value accounting and market ratios.
    pub price: Fixed64,
}

impl Default for ResourceDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            priceable: true,
            storable: true,
            transportable: true,
            price: Fixed64::ONE,
        }
    }
}

/// Broad behavioral class of a building kind. Dispatch in the engine is on
/// this tag, never on field probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingClass {
    /// Ordinary producer: consumes inputs, produces outputs.
    Standard,
    /// The seat of the settlement. Unique; receives routed science.
    Headquarters,
    /// Trades a sell resource for a buy resource at current price ratios.
    Market,
    /// Pure storage with optional autonomous redistribution.
    Warehouse,
    /// Pulls configured resources from elsewhere up to fixed per-resource caps.
    Importer,
    /// Terrain feature; inert until its tile has been explored.
    NaturalWonder,
}

/// A building kind definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingDef {
    pub name: String,
    pub class: BuildingClass,
    /// Static rank used as the final tile-ordering tie-breaker.
    pub tier: u8,
    /// Construction cost for the first level. Later levels scale by
    /// `cost_growth` per level.
    pub construction_cost: BTreeMap<ResourceId, Fixed64>,
    /// Per-level cost growth factor.
    pub cost_growth: Fixed64,
    /// Consumed per tick at level 1 and full capacity.
    pub input: BTreeMap<ResourceId, Fixed64>,
    /// Produced per tick at level 1 and full capacity.
    pub output: BTreeMap<ResourceId, Fixed64>,
    /// Workers required per tick at level 1 and full capacity.
    pub workers: Fixed64,
    /// Whether the building accepts electrification.
    pub power: bool,
    /// Terrain deposits the tile must expose for the building to operate.
    pub deposits: BTreeSet<ResourceId>,
    /// Base world value per level.
    pub base_value: Fixed64,
    /// Storage capacity per level before multipliers.
    pub base_storage: Fixed64,
    /// Market trade volume per level (markets only).
    pub trade_volume: Fixed64,
    pub max_level: u32,
    /// Technology that grants a storage bonus once the building reaches
    /// level 5 (vault-style buildings only).
    pub vault_tech: Option<TechId>,
    /// Squared radius of a fuel-free zone around this building, if it
    /// grants one. Only meaningful for unique buildings.
    pub fuel_free_radius_sq: Option<Fixed64>,
    /// At most one instance may exist; registered in the snapshot's
    /// unique-building index.
    pub unique: bool,
}

impl Default for BuildingDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            class: BuildingClass::Standard,
            tier: 0,
            construction_cost: BTreeMap::new(),
            cost_growth: Fixed64::from_num(1.5),
            input: BTreeMap::new(),
            output: BTreeMap::new(),
            workers: Fixed64::ZERO,
            power: false,
            deposits: BTreeSet::new(),
            base_value: Fixed64::ZERO,
            base_storage: Fixed64::from_num(100),
            trade_volume: Fixed64::ZERO,
            max_level: 100,
            vault_tech: None,
            fuel_free_radius_sq: None,
            unique: false,
        }
    }
}

/// A technology definition: once unlocked, its multiplier contributions are
/// re-applied every tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TechDef {
    pub name: String,
    /// Per-building-kind multiplier contributions.
    pub building_multipliers: Vec<(BuildingId, Multiplier)>,
    /// World-wide bonus contributions.
    pub global_bonuses: Vec<(GlobalBonus, Fixed64)>,
}

/// A specialist definition. Contributions scale linearly with the owned
/// (or previewed) level.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecialistDef {
    pub name: String,
    /// Per-building-kind contribution per level.
    pub building_multipliers: Vec<(BuildingId, Multiplier)>,
    /// World-wide bonus contribution per level.
    pub global_bonuses: Vec<(GlobalBonus, Fixed64)>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("invalid resource reference {resource:?} in {context}")]
    InvalidResourceRef {
        resource: ResourceId,
        context: String,
    },
    #[error("invalid building reference {building:?} in {context}")]
    InvalidBuildingRef {
        building: BuildingId,
        context: String,
    },
    #[error("invalid technology reference {tech:?} in {context}")]
    InvalidTechRef { tech: TechId, context: String },
    #[error("designated {0} is not set")]
    MissingDesignated(&'static str),
    #[error("designated headquarters {0:?} must be a unique Headquarters building")]
    BadHeadquarters(BuildingId),
    #[error("designated {kind} resource {resource:?} must have storable = {storable}")]
    BadDesignatedResource {
        kind: &'static str,
        resource: ResourceId,
        storable: bool,
    },
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for an immutable [`ContentDb`]. Register everything, designate
/// the special ids, then call [`ContentBuilder::build`] to validate and freeze.
#[derive(Debug, Default)]
pub struct ContentBuilder {
    resources: Vec<ResourceDef>,
    buildings: Vec<BuildingDef>,
    techs: Vec<TechDef>,
    specialists: Vec<SpecialistDef>,
    resource_names: HashMap<String, ResourceId>,
    building_names: HashMap<String, BuildingId>,
    worker: Option<ResourceId>,
    power: Option<ResourceId>,
    science: Option<ResourceId>,
    headquarters: Option<BuildingId>,
}

impl ContentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource kind. Returns its id.
    pub fn register_resource(&mut self, def: ResourceDef) -> Result<ResourceId, ContentError> {
        if self.resource_names.contains_key(&def.name) {
            return Err(ContentError::DuplicateName(def.name));
        }
        let id = ResourceId(self.resources.len() as u16);
        self.resource_names.insert(def.name.clone(), id);
        self.resources.push(def);
        Ok(id)
    }

    /// Register a building kind. Returns its id.
    pub fn register_building(&mut self, def: BuildingDef) -> Result<BuildingId, ContentError> {
        if self.building_names.contains_key(&def.name) {
            return Err(ContentError::DuplicateName(def.name));
        }
        let id = BuildingId(self.buildings.len() as u16);
        self.building_names.insert(def.name.clone(), id);
        self.buildings.push(def);
        Ok(id)
    }

    /// Register a technology. Returns its id.
    pub fn register_tech(&mut self, def: TechDef) -> TechId {
        let id = TechId(self.techs.len() as u16);
        self.techs.push(def);
        id
    }

    /// Register a specialist. Returns its id.
    pub fn register_specialist(&mut self, def: SpecialistDef) -> SpecialistId {
        let id = SpecialistId(self.specialists.len() as u16);
        self.specialists.push(def);
        id
    }

    /// Designate the labor resource consumed as transport fuel and produced
    /// by residential buildings.
    pub fn set_worker_resource(&mut self, id: ResourceId) {
        self.worker = Some(id);
    }

    /// Designate the power resource consumed by electrification.
    pub fn set_power_resource(&mut self, id: ResourceId) {
        self.power = Some(id);
    }

    /// Designate the science resource routed to the headquarters.
    pub fn set_science_resource(&mut self, id: ResourceId) {
        self.science = Some(id);
    }

    /// Designate the headquarters building kind.
    pub fn set_headquarters(&mut self, id: BuildingId) {
        self.headquarters = Some(id);
    }

    fn check_resource(&self, id: ResourceId, context: &str) -> Result<(), ContentError> {
        if (id.0 as usize) < self.resources.len() {
            Ok(())
        } else {
            Err(ContentError::InvalidResourceRef {
                resource: id,
                context: context.to_string(),
            })
        }
    }

    /// Validate every cross-reference and freeze the database.
    pub fn build(self) -> Result<ContentDb, ContentError> {
        for def in &self.buildings {
            let ctx = format!("building '{}'", def.name);
            for id in def
                .construction_cost
                .keys()
                .chain(def.input.keys())
                .chain(def.output.keys())
                .chain(def.deposits.iter())
            {
                self.check_resource(*id, &ctx)?;
            }
            if let Some(tech) = def.vault_tech
                && (tech.0 as usize) >= self.techs.len()
            {
                return Err(ContentError::InvalidTechRef { tech, context: ctx });
            }
        }
        for def in self.techs.iter().map(|t| (&t.name, &t.building_multipliers)).chain(
            self.specialists
                .iter()
                .map(|s| (&s.name, &s.building_multipliers)),
        ) {
            for (building, _) in def.1 {
                if (building.0 as usize) >= self.buildings.len() {
                    return Err(ContentError::InvalidBuildingRef {
                        building: *building,
                        context: format!("'{}'", def.0),
                    });
                }
            }
        }

        let worker = self
            .worker
            .ok_or(ContentError::MissingDesignated("worker resource"))?;
        let power = self
            .power
            .ok_or(ContentError::MissingDesignated("power resource"))?;
        let science = self
            .science
            .ok_or(ContentError::MissingDesignated("science resource"))?;
        let headquarters = self
            .headquarters
            .ok_or(ContentError::MissingDesignated("headquarters"))?;

        self.check_resource(worker, "designated worker")?;
        self.check_resource(power, "designated power")?;
        self.check_resource(science, "designated science")?;
        // Worker and power live in the shared pools, never in a ledger.
        for (kind, id) in [("worker", worker), ("power", power)] {
            if self.resources[id.0 as usize].storable {
                return Err(ContentError::BadDesignatedResource {
                    kind,
                    resource: id,
                    storable: false,
                });
            }
        }
        let hq = self
            .buildings
            .get(headquarters.0 as usize)
            .ok_or(ContentError::InvalidBuildingRef {
                building: headquarters,
                context: "designated headquarters".to_string(),
            })?;
        if hq.class != BuildingClass::Headquarters || !hq.unique {
            return Err(ContentError::BadHeadquarters(headquarters));
        }

        Ok(ContentDb {
            resources: self.resources,
            buildings: self.buildings,
            techs: self.techs,
            specialists: self.specialists,
            resource_names: self.resource_names,
            building_names: self.building_names,
            worker,
            power,
            science,
            headquarters,
        })
    }
}

// ---------------------------------------------------------------------------
// ContentDb
// ---------------------------------------------------------------------------

/// Immutable content database. Frozen after build; thread-safe to share.
///
/// Id-based lookups index directly and panic on an unknown id: ids are only
/// minted by the builder, so an out-of-range id is a programming error, not
/// a recoverable condition.
#[derive(Debug, Clone)]
pub struct ContentDb {
    resources: Vec<ResourceDef>,
    buildings: Vec<BuildingDef>,
    techs: Vec<TechDef>,
    specialists: Vec<SpecialistDef>,
    resource_names: HashMap<String, ResourceId>,
    building_names: HashMap<String, BuildingId>,
    worker: ResourceId,
    power: ResourceId,
    science: ResourceId,
    headquarters: BuildingId,
}

impl ContentDb {
    pub fn resource(&self, id: ResourceId) -> &ResourceDef {
        &self.resources[id.0 as usize]
    }

    pub fn building(&self, id: BuildingId) -> &BuildingDef {
        &self.buildings[id.0 as usize]
    }

    pub fn tech(&self, id: TechId) -> &TechDef {
        &self.techs[id.0 as usize]
    }

    pub fn specialist(&self, id: SpecialistId) -> &SpecialistDef {
        &self.specialists[id.0 as usize]
    }

    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_names.get(name).copied()
    }

    pub fn building_id(&self, name: &str) -> Option<BuildingId> {
        self.building_names.get(name).copied()
    }

    /// All resource ids in registration order. Registration order is the
    /// canonical order for seeded permutations.
    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        (0..self.resources.len()).map(|i| ResourceId(i as u16))
    }

    /// Resources eligible for market trading, in registration order.
    pub fn tradeable_resources(&self) -> Vec<ResourceId> {
        self.resource_ids()
            .filter(|id| {
                let def = self.resource(*id);
                def.priceable && def.storable
            })
            .collect()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    pub fn worker_resource(&self) -> ResourceId {
        self.worker
    }

    pub fn power_resource(&self) -> ResourceId {
        self.power
    }

    pub fn science_resource(&self) -> ResourceId {
        self.science
    }

    pub fn headquarters(&self) -> BuildingId {
        self.headquarters
    }

    /// Construction cost table for building from `level` to `level + 1`.
    /// Costs grow exponentially by the definition's growth factor.
    pub fn construction_cost(&self, id: BuildingId, level: u32) -> BTreeMap<ResourceId, Fixed64> {
        let def = self.building(id);
        let mut factor = Fixed64::ONE;
        for _ in 0..level {
            factor = factor.saturating_mul(def.cost_growth);
        }
        def.construction_cost
            .iter()
            .map(|(r, amount)| (*r, amount.saturating_mul(factor)))
            .collect()
    }
}
