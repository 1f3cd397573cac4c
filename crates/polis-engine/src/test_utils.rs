//! Scenario-building helpers shared by unit and integration tests.

use polis_content::{
    BuildingClass, BuildingDef, BuildingId, ContentBuilder, ContentDb, GlobalBonus, Multiplier,
    ResourceDef, ResourceId, SpecialistDef, SpecialistId, TechDef, TechId,
};
use polis_grid::{Grid, GridPos};
use std::collections::BTreeMap;

use crate::building::{Building, Tile};
use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::state::{GameState, SimOptions};

/// A small but complete content database plus the ids tests care about.
pub struct TestWorld {
    pub content: ContentDb,
    // Resources.
    pub worker: ResourceId,
    pub power: ResourceId,
    pub science: ResourceId,
    pub wood: ResourceId,
    pub stone: ResourceId,
    // Buildings.
    pub hall: BuildingId,
    pub hut: BuildingId,
    pub camp: BuildingId,
    pub quarry: BuildingId,
    pub mine: BuildingId,
    pub lab: BuildingId,
    pub generator: BuildingId,
    pub mill: BuildingId,
    pub warehouse: BuildingId,
    pub market: BuildingId,
    pub importer: BuildingId,
    pub lighthouse: BuildingId,
    pub geyser: BuildingId,
    // Bonuses.
    pub masonry: TechId,
    pub foreman: SpecialistId,
}

impl TestWorld {
    pub fn new() -> Self {
        let mut b = ContentBuilder::new();

        let worker = b
            .register_resource(ResourceDef {
                name: "worker".into(),
                priceable: false,
                storable: false,
                ..Default::default()
            })
            .unwrap();
        let power = b
            .register_resource(ResourceDef {
                name: "power".into(),
                priceable: false,
                storable: false,
                ..Default::default()
            })
            .unwrap();
        let science = b
            .register_resource(ResourceDef {
                name: "science".into(),
                priceable: false,
                ..Default::default()
            })
            .unwrap();
        let wood = b
            .register_resource(ResourceDef {
                name: "wood".into(),
                price: Fixed64::ONE,
                ..Default::default()
            })
            .unwrap();
        let stone = b
            .register_resource(ResourceDef {
                name: "stone".into(),
                price: f64_to_fixed64(2.0),
                ..Default::default()
            })
            .unwrap();
        b.set_worker_resource(worker);
        b.set_power_resource(power);
        b.set_science_resource(science);

        let masonry_placeholder = TechId(0);

        let hall = b
            .register_building(BuildingDef {
                name: "hall".into(),
                class: BuildingClass::Headquarters,
                unique: true,
                base_storage: f64_to_fixed64(10_000.0),
                ..Default::default()
            })
            .unwrap();
        b.set_headquarters(hall);
        let hut = b
            .register_building(BuildingDef {
                name: "hut".into(),
                tier: 1,
                construction_cost: amounts(&[(wood, 10.0)]),
                output: amounts(&[(worker, 4.0)]),
                max_level: 2,
                ..Default::default()
            })
            .unwrap();
        let camp = b
            .register_building(BuildingDef {
                name: "camp".into(),
                tier: 1,
                input: amounts(&[(wood, 1.0)]),
                output: amounts(&[(worker, 2.0), (stone, 1.0)]),
                ..Default::default()
            })
            .unwrap();
        let quarry = b
            .register_building(BuildingDef {
                name: "quarry".into(),
                tier: 2,
                construction_cost: amounts(&[(wood, 5.0)]),
                input: amounts(&[(wood, 1.0)]),
                output: amounts(&[(stone, 2.0)]),
                workers: f64_to_fixed64(2.0),
                ..Default::default()
            })
            .unwrap();
        let mine = b
            .register_building(BuildingDef {
                name: "mine".into(),
                tier: 2,
                output: amounts(&[(stone, 1.0)]),
                workers: Fixed64::ONE,
                deposits: [stone].into(),
                ..Default::default()
            })
            .unwrap();
        let lab = b
            .register_building(BuildingDef {
                name: "lab".into(),
                tier: 3,
                output: amounts(&[(science, 1.0)]),
                workers: Fixed64::ONE,
                ..Default::default()
            })
            .unwrap();
        let generator = b
            .register_building(BuildingDef {
                name: "generator".into(),
                tier: 3,
                output: amounts(&[(power, 2.0)]),
                ..Default::default()
            })
            .unwrap();
        let mill = b
            .register_building(BuildingDef {
                name: "mill".into(),
                tier: 2,
                input: amounts(&[(wood, 1.0)]),
                output: amounts(&[(stone, 1.0)]),
                workers: Fixed64::ONE,
                power: true,
                ..Default::default()
            })
            .unwrap();
        let warehouse = b
            .register_building(BuildingDef {
                name: "warehouse".into(),
                class: BuildingClass::Warehouse,
                tier: 1,
                base_storage: f64_to_fixed64(100.0),
                ..Default::default()
            })
            .unwrap();
        let market = b
            .register_building(BuildingDef {
                name: "market".into(),
                class: BuildingClass::Market,
                tier: 1,
                trade_volume: f64_to_fixed64(10.0),
                base_storage: f64_to_fixed64(100.0),
                ..Default::default()
            })
            .unwrap();
        let importer = b
            .register_building(BuildingDef {
                name: "importer".into(),
                class: BuildingClass::Importer,
                tier: 1,
                base_storage: f64_to_fixed64(100.0),
                ..Default::default()
            })
            .unwrap();
        let lighthouse = b
            .register_building(BuildingDef {
                name: "lighthouse".into(),
                tier: 4,
                unique: true,
                fuel_free_radius_sq: Some(f64_to_fixed64(4.0)),
                vault_tech: Some(masonry_placeholder),
                ..Default::default()
            })
            .unwrap();
        let geyser = b
            .register_building(BuildingDef {
                name: "geyser".into(),
                class: BuildingClass::NaturalWonder,
                tier: 4,
                unique: true,
                ..Default::default()
            })
            .unwrap();

        let masonry = b.register_tech(TechDef {
            name: "masonry".into(),
            building_multipliers: vec![(
                quarry,
                Multiplier {
                    output: f64_to_fixed64(0.5),
                    ..Multiplier::ZERO
                },
            )],
            global_bonuses: vec![(GlobalBonus::TransportCapacity, Fixed64::ONE)],
        });
        assert_eq!(masonry, masonry_placeholder);
        let foreman = b.register_specialist(SpecialistDef {
            name: "foreman".into(),
            building_multipliers: vec![(
                quarry,
                Multiplier {
                    output: f64_to_fixed64(0.1),
                    ..Multiplier::ZERO
                },
            )],
            global_bonuses: vec![(GlobalBonus::Happiness, Fixed64::ONE)],
        });

        Self {
            content: b.build().unwrap(),
            worker,
            power,
            science,
            wood,
            stone,
            hall,
            hut,
            camp,
            quarry,
            mine,
            lab,
            generator,
            mill,
            warehouse,
            market,
            importer,
            lighthouse,
            geyser,
            masonry,
            foreman,
        }
    }

    pub fn empty_state(&self) -> GameState {
        GameState::new(Grid::new(16, 16), SimOptions::default())
    }

    /// Place a completed building and return its position for chaining.
    pub fn place(
        &self,
        state: &mut GameState,
        pos: GridPos,
        kind: BuildingId,
        level: u32,
    ) -> GridPos {
        let options = state.options.clone();
        state.set_tile(
            pos,
            Tile::explored_with(Building::completed(kind, level, &options)),
        );
        pos
    }

    /// Place a fresh construction site.
    pub fn place_site(&self, state: &mut GameState, pos: GridPos, kind: BuildingId) -> GridPos {
        state.set_tile(pos, Tile::explored_with(Building::construction_site(kind)));
        pos
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn amounts(entries: &[(ResourceId, f64)]) -> BTreeMap<ResourceId, Fixed64> {
    entries
        .iter()
        .map(|(r, v)| (*r, f64_to_fixed64(*v)))
        .collect()
}
