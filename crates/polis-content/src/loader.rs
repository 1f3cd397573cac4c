//! JSON content loading: reads data files, resolves name references, and
//! builds a [`ContentDb`](crate::ContentDb).
//!
//! Content ships as four JSON files (`resources.json`, `buildings.json`,
//! `techs.json`, `specialists.json`) in which every cross-reference is by
//! name. The loader resolves names to ids in registration order, so a given
//! set of files always produces the same id assignment.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::{
    BuildingClass, BuildingDef, ContentBuilder, ContentDb, ContentError, GlobalBonus, Multiplier,
    ResourceDef, ResourceId, SpecialistDef, TechDef,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while loading content files.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: &'static str, dir: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A designated role names a resource or building that does not exist.
    #[error("unknown {role} '{name}' in {file}")]
    UnknownDesignated {
        file: PathBuf,
        role: &'static str,
        name: String,
    },

    /// Registration or validation failed.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ResourceData {
    name: String,
    #[serde(default = "default_true")]
    priceable: bool,
    #[serde(default = "default_true")]
    storable: bool,
    #[serde(default = "default_true")]
    transportable: bool,
    #[serde(default = "default_one")]
    price: f64,
}

#[derive(Debug, Deserialize)]
struct BuildingData {
    name: String,
    #[serde(default)]
    class: ClassData,
    #[serde(default)]
    tier: u8,
    #[serde(default)]
    construction_cost: BTreeMap<String, f64>,
    #[serde(default = "default_cost_growth")]
    cost_growth: f64,
    #[serde(default)]
    input: BTreeMap<String, f64>,
    #[serde(default)]
    output: BTreeMap<String, f64>,
    #[serde(default)]
    workers: f64,
    #[serde(default)]
    power: bool,
    #[serde(default)]
    deposits: Vec<String>,
    #[serde(default)]
    base_value: f64,
    #[serde(default = "default_storage")]
    base_storage: f64,
    #[serde(default)]
    trade_volume: f64,
    #[serde(default = "default_max_level")]
    max_level: u32,
    #[serde(default)]
    vault_tech: Option<String>,
    #[serde(default)]
    fuel_free_radius: Option<f64>,
    #[serde(default)]
    unique: bool,
}

#[derive(Debug, Default, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum ClassData {
    #[default]
    Standard,
    Headquarters,
    Market,
    Warehouse,
    Importer,
    NaturalWonder,
}

#[derive(Debug, Default, Deserialize)]
struct MultiplierData {
    #[serde(default)]
    output: f64,
    #[serde(default)]
    worker: f64,
    #[serde(default)]
    storage: f64,
}

#[derive(Debug, Deserialize)]
struct BonusData {
    name: String,
    #[serde(default)]
    building_multipliers: BTreeMap<String, MultiplierData>,
    #[serde(default)]
    global_bonuses: BTreeMap<String, f64>,
}

/// Top-level `resources.json` document: the resource list plus the three
/// designated roles.
#[derive(Debug, Deserialize)]
struct ResourcesFile {
    resources: Vec<ResourceData>,
    worker: String,
    power: String,
    science: String,
}

/// Top-level `buildings.json` document: the building list plus the
/// designated headquarters.
#[derive(Debug, Deserialize)]
struct BuildingsFile {
    buildings: Vec<BuildingData>,
    headquarters: String,
}

fn default_true() -> bool {
    true
}
fn default_one() -> f64 {
    1.0
}
fn default_cost_growth() -> f64 {
    1.5
}
fn default_storage() -> f64 {
    100.0
}
fn default_max_level() -> u32 {
    100
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn require_file(dir: &Path, file: &'static str) -> Result<PathBuf, DataLoadError> {
    let path = dir.join(file);
    if path.exists() {
        Ok(path)
    } else {
        Err(DataLoadError::MissingRequired {
            file,
            dir: dir.to_path_buf(),
        })
    }
}

fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    })
}

fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

// ---------------------------------------------------------------------------
// Loading pipeline
// ---------------------------------------------------------------------------

/// Load a content directory and build the frozen database.
///
/// Expects `resources.json` and `buildings.json`; `techs.json` and
/// `specialists.json` are optional.
pub fn load_content(dir: &Path) -> Result<ContentDb, DataLoadError> {
    let mut builder = ContentBuilder::new();

    // Resources first so buildings can reference them by name.
    let resources_path = require_file(dir, "resources.json")?;
    let resources: ResourcesFile = deserialize_file(&resources_path)?;
    let mut resource_ids: HashMap<String, ResourceId> = HashMap::new();
    for data in resources.resources {
        let id = builder.register_resource(ResourceDef {
            name: data.name.clone(),
            priceable: data.priceable,
            storable: data.storable,
            transportable: data.transportable,
            price: f64_to_fixed64(data.price),
        })?;
        resource_ids.insert(data.name, id);
    }
    for (role, name, set) in [
        (
            "worker resource",
            &resources.worker,
            ContentBuilder::set_worker_resource as fn(&mut ContentBuilder, ResourceId),
        ),
        ("power resource", &resources.power, ContentBuilder::set_power_resource),
        (
            "science resource",
            &resources.science,
            ContentBuilder::set_science_resource,
        ),
    ] {
        let id = *resource_ids
            .get(name)
            .ok_or_else(|| DataLoadError::UnknownDesignated {
                file: resources_path.clone(),
                role,
                name: name.clone(),
            })?;
        set(&mut builder, id);
    }

    // Techs next: buildings may reference a vault tech by name.
    let techs_path = dir.join("techs.json");
    let mut tech_ids = HashMap::new();
    let tech_data: Vec<BonusData> = if techs_path.exists() {
        deserialize_file(&techs_path)?
    } else {
        Vec::new()
    };

    // Buildings resolve resource names directly; tech and specialist
    // multiplier targets resolve after all buildings exist.
    let buildings_path = require_file(dir, "buildings.json")?;
    let buildings: BuildingsFile = deserialize_file(&buildings_path)?;
    let mut building_ids = HashMap::new();
    // Vault techs are resolved against the name list before registration.
    let tech_names: HashMap<String, usize> = tech_data
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.clone(), i))
        .collect();
    for data in buildings.buildings {
        let resolve_amounts = |map: &BTreeMap<String, f64>| -> Result<
            BTreeMap<ResourceId, Fixed64>,
            DataLoadError,
        > {
            map.iter()
                .map(|(name, amount)| {
                    let id = resolve_name(&resource_ids, name, &buildings_path, "resource")?;
                    Ok((*id, f64_to_fixed64(*amount)))
                })
                .collect()
        };
        let deposits: BTreeSet<ResourceId> = data
            .deposits
            .iter()
            .map(|name| resolve_name(&resource_ids, name, &buildings_path, "resource").copied())
            .collect::<Result<_, _>>()?;
        let vault_tech = data
            .vault_tech
            .as_deref()
            .map(|name| {
                resolve_name(&tech_names, name, &buildings_path, "technology")
                    .map(|i| crate::TechId(*i as u16))
            })
            .transpose()?;
        let id = builder.register_building(BuildingDef {
            name: data.name.clone(),
            class: match data.class {
                ClassData::Standard => BuildingClass::Standard,
                ClassData::Headquarters => BuildingClass::Headquarters,
                ClassData::Market => BuildingClass::Market,
                ClassData::Warehouse => BuildingClass::Warehouse,
                ClassData::Importer => BuildingClass::Importer,
                ClassData::NaturalWonder => BuildingClass::NaturalWonder,
            },
            tier: data.tier,
            construction_cost: resolve_amounts(&data.construction_cost)?,
            cost_growth: f64_to_fixed64(data.cost_growth),
            input: resolve_amounts(&data.input)?,
            output: resolve_amounts(&data.output)?,
            workers: f64_to_fixed64(data.workers),
            power: data.power,
            deposits,
            base_value: f64_to_fixed64(data.base_value),
            base_storage: f64_to_fixed64(data.base_storage),
            trade_volume: f64_to_fixed64(data.trade_volume),
            max_level: data.max_level,
            vault_tech,
            fuel_free_radius_sq: data
                .fuel_free_radius
                .map(|r| f64_to_fixed64(r * r)),
            unique: data.unique,
        })?;
        building_ids.insert(data.name, id);
    }
    let hq = *building_ids.get(&buildings.headquarters).ok_or_else(|| {
        DataLoadError::UnknownDesignated {
            file: buildings_path.clone(),
            role: "headquarters",
            name: buildings.headquarters.clone(),
        }
    })?;
    builder.set_headquarters(hq);

    let resolve_bonuses = |data: &BonusData,
                           file: &Path|
     -> Result<(Vec<(crate::BuildingId, Multiplier)>, Vec<(GlobalBonus, Fixed64)>), DataLoadError> {
        let mut building_multipliers = Vec::new();
        for (name, m) in &data.building_multipliers {
            let id = resolve_name(&building_ids, name, file, "building")?;
            building_multipliers.push((
                *id,
                Multiplier {
                    output: f64_to_fixed64(m.output),
                    worker: f64_to_fixed64(m.worker),
                    storage: f64_to_fixed64(m.storage),
                },
            ));
        }
        let mut global_bonuses = Vec::new();
        for (name, amount) in &data.global_bonuses {
            let bonus = match name.as_str() {
                "transport_capacity" => GlobalBonus::TransportCapacity,
                "builder_capacity" => GlobalBonus::BuilderCapacity,
                "happiness" => GlobalBonus::Happiness,
                other => {
                    return Err(DataLoadError::UnresolvedRef {
                        file: file.to_path_buf(),
                        name: other.to_string(),
                        expected_kind: "global bonus",
                    });
                }
            };
            global_bonuses.push((bonus, f64_to_fixed64(*amount)));
        }
        Ok((building_multipliers, global_bonuses))
    };

    for data in &tech_data {
        let (building_multipliers, global_bonuses) = resolve_bonuses(data, &techs_path)?;
        builder.register_tech(TechDef {
            name: data.name.clone(),
            building_multipliers,
            global_bonuses,
        });
    }

    let specialists_path = dir.join("specialists.json");
    if specialists_path.exists() {
        let specialists: Vec<BonusData> = deserialize_file(&specialists_path)?;
        for data in &specialists {
            let (building_multipliers, global_bonuses) = resolve_bonuses(data, &specialists_path)?;
            builder.register_specialist(SpecialistDef {
                name: data.name.clone(),
                building_multipliers,
                global_bonuses,
            });
        }
    }

    Ok(builder.build()?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
