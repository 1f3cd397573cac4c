//! Storable resources are conserved: ledger plus in-flight totals only move
//! by what the tick aggregates record as produced and consumed.

use polis_engine::test_utils::TestWorld;
use polis_engine::{
    Building, BuildingExtra, Engine, Fixed64, NoopHooks, Tile, TickSnapshot,
};
use polis_content::ResourceId;
use polis_grid::GridPos;
use std::collections::{BTreeMap, BTreeSet};

fn fx(v: f64) -> Fixed64 {
    polis_engine::fixed::f64_to_fixed64(v)
}

fn accumulate(ledger: &mut BTreeMap<ResourceId, Fixed64>, entries: &BTreeMap<ResourceId, Fixed64>) {
    for (r, v) in entries {
        *ledger.entry(*r).or_insert(Fixed64::ZERO) += *v;
    }
}

#[test]
fn ledger_deltas_match_recorded_flows() {
    let world = TestWorld::new();
    let mut state = world.empty_state();
    state.options.science_per_idle_worker = fx(0.5);

    // Producers, consumers, transport, trading, and a construction site all
    // moving resources at once.
    world.place(&mut state, GridPos::new(8, 8), world.hall, 1);
    let mine = world.place(&mut state, GridPos::new(0, 0), world.mine, 1);
    state.tiles.get_mut(&mine).unwrap().deposits.insert(world.stone);
    let quarry = world.place(&mut state, GridPos::new(1, 0), world.quarry, 1);
    state.building_mut(quarry).unwrap().credit(world.wood, fx(30.0));
    world.place(&mut state, GridPos::new(2, 0), world.hut, 1);
    world.place(&mut state, GridPos::new(3, 0), world.lab, 1);
    let depot = world.place(&mut state, GridPos::new(0, 1), world.warehouse, 1);
    state.building_mut(depot).unwrap().credit(world.wood, fx(50.0));
    world.place_site(&mut state, GridPos::new(5, 5), world.hut);

    let market = GridPos::new(4, 0);
    let mut b = Building::completed(world.market, 1, &state.options);
    b.extra = BuildingExtra::Market {
        sell: BTreeSet::from([world.stone]),
        pairings: BTreeMap::new(),
        clear_sell_on_update: false,
    };
    b.credit(world.stone, fx(20.0));
    state.set_tile(market, Tile::explored_with(b));

    let totals_start = state.resource_totals();
    let mut produced: BTreeMap<ResourceId, Fixed64> = BTreeMap::new();
    let mut consumed: BTreeMap<ResourceId, Fixed64> = BTreeMap::new();
    let record = |snap: &TickSnapshot,
                  produced: &mut BTreeMap<ResourceId, Fixed64>,
                  consumed: &mut BTreeMap<ResourceId, Fixed64>| {
        accumulate(produced, &snap.produced);
        accumulate(consumed, &snap.consumed);
    };

    let ticks = 30;
    let mut engine = Engine::new(world.content.clone(), NoopHooks);
    // The aggregate of tick k publishes at the start of tick k + 1, so the
    // window is read one call behind and closed with one extra tick.
    for i in 0..ticks {
        engine.advance(&mut state, i, false);
        if i > 0 {
            record(engine.snapshot(), &mut produced, &mut consumed);
        }
    }
    let totals_end = state.resource_totals();
    engine.advance(&mut state, ticks, false);
    record(engine.snapshot(), &mut produced, &mut consumed);

    for r in world.content.resource_ids() {
        if !world.content.resource(r).storable {
            continue;
        }
        let start = totals_start.get(&r).copied().unwrap_or(Fixed64::ZERO);
        let end = totals_end.get(&r).copied().unwrap_or(Fixed64::ZERO);
        let made = produced.get(&r).copied().unwrap_or(Fixed64::ZERO);
        let spent = consumed.get(&r).copied().unwrap_or(Fixed64::ZERO);
        assert_eq!(
            end - start,
            made - spent,
            "conservation violated for {}",
            world.content.resource(r).name
        );
    }
}

#[test]
fn dropped_deliveries_are_accounted_as_consumed() {
    let world = TestWorld::new();
    let mut state = world.empty_state();
    let site = world.place_site(&mut state, GridPos::new(0, 0), world.hut);
    let depot = world.place(&mut state, GridPos::new(3, 0), world.warehouse, 1);
    state.building_mut(depot).unwrap().credit(world.wood, fx(80.0));

    let mut engine = Engine::new(world.content.clone(), NoopHooks);
    // Let a shipment get committed, then demolish its destination.
    engine.advance(&mut state, 0, false);
    engine.advance(&mut state, 1, false);
    let in_flight = state.in_transit_amount(site, world.wood);
    assert!(in_flight > Fixed64::ZERO);
    state.tiles.remove(&site);

    // Drain the remaining travel ticks, then one more to publish.
    for i in 2..7 {
        engine.advance(&mut state, i, false);
    }
    assert!(state.shipments.is_empty());
    // The depot lost exactly what was in flight; nothing reappeared.
    assert_eq!(
        state.building(depot).unwrap().amount(world.wood),
        fx(80.0) - in_flight
    );
}
