//! Building lifecycle processing: construction and upgrade progress,
//! production feasibility, and execution, per tile in priority order.
//!
//! Every infeasibility is an ordinary outcome recorded as a [`TileStatus`],
//! never an error. Labor reserved by an earlier step stays spent when a
//! later step fails; processing order is the only fairness mechanism.

use polis_content::{BuildingClass, ContentDb, GlobalBonus, Multiplier, ResourceId};
use polis_grid::GridPos;
use std::cmp::Reverse;

use crate::building::{Building, BuildingExtra, BuildingStatus};
use crate::engine::EngineHooks;
use crate::fixed::Fixed64;
use crate::io::{TileIo, tile_io};
use crate::market;
use crate::snapshot::{TickContext, TileStatus};
use crate::state::GameState;
use crate::transport::{FuelSource, TransportCapacity, route};
use crate::warehouse;

/// Storage bonus granted by a vault technology at level 5 and above.
const VAULT_STORAGE: Multiplier = Multiplier {
    output: Fixed64::ZERO,
    worker: Fixed64::ZERO,
    storage: Fixed64::ONE,
};

// ---------------------------------------------------------------------------
// Tile ordering
// ---------------------------------------------------------------------------

/// The total processing order: construction sites and upgrades first, then
/// higher priority, then higher tier, then position. Earlier tiles get
/// first claim on the shared pools.
fn processing_order(content: &ContentDb, state: &GameState) -> Vec<GridPos> {
    let mut order: Vec<(bool, Reverse<u8>, Reverse<u8>, GridPos)> = state
        .tiles
        .iter()
        .filter_map(|(pos, tile)| {
            let b = tile.building.as_ref()?;
            let def = content.building(b.kind);
            // Natural wonders are inert until their tile is explored.
            if def.class == BuildingClass::NaturalWonder && !tile.explored {
                return None;
            }
            Some((
                !b.is_under_construction(),
                Reverse(b.priority),
                Reverse(def.tier),
                *pos,
            ))
        })
        .collect();
    order.sort();
    order.into_iter().map(|(_, _, _, pos)| pos).collect()
}

/// Process every tile with a building for this tick.
pub fn process_tiles(
    content: &ContentDb,
    state: &mut GameState,
    ctx: &mut TickContext,
    hooks: &mut dyn EngineHooks,
    offline: bool,
) {
    for pos in processing_order(content, state) {
        let Some(b) = state.building(pos) else {
            continue;
        };
        match b.status {
            BuildingStatus::Building | BuildingStatus::Upgrading => {
                process_construction(content, state, ctx, hooks, pos);
            }
            BuildingStatus::Paused => {
                ctx.next_mut().statuses.insert(pos, TileStatus::TurnedOff);
            }
            BuildingStatus::Completed => {
                process_completed(content, state, ctx, hooks, pos, offline);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// One construction/upgrade tick.
///
/// Cost resources are scanned in order with early exit: the first resource
/// that needs hauling but finds no free builder records `NotEnoughWorkers`
/// and ends the scan. Each hauled resource claims exactly one unit of
/// labor, which caps the committed amount at the builder's capacity.
///
/// Upgrades never pass the definition's `max_level`; the cap wins over any
/// higher `desired_level`.
fn process_construction(
    content: &ContentDb,
    state: &mut GameState,
    ctx: &mut TickContext,
    hooks: &mut dyn EngineHooks,
    pos: GridPos,
) {
    let Some(b) = state.building(pos) else {
        return;
    };
    let (kind, status, desired) = (b.kind, b.status, b.desired_level);
    let max_level = content.building(kind).max_level;
    if status == BuildingStatus::Upgrading && b.level >= max_level {
        if let Some(b) = state.building_mut(pos) {
            b.status = BuildingStatus::Completed;
        }
        return;
    }
    let cost = content.construction_cost(kind, b.level);

    let fully_delivered = cost.iter().all(|(r, needed)| b.amount(*r) >= *needed);
    if fully_delivered {
        let options = state.options.clone();
        if let Some(b) = state.building_mut(pos) {
            for (r, needed) in &cost {
                b.debit(*r, *needed);
            }
            b.level += 1;
            if status == BuildingStatus::Building {
                b.complete(&options);
            } else if b.level >= desired.min(max_level) {
                b.status = BuildingStatus::Completed;
            }
        }
        for (r, needed) in &cost {
            ctx.next_mut().record_consumed(*r, *needed);
        }
        ctx.next_mut().statuses.insert(pos, TileStatus::Working);
        if status == BuildingStatus::Building {
            hooks.on_construction_complete(pos, state);
        }
        return;
    }

    ctx.next_mut().statuses.insert(
        pos,
        if status == BuildingStatus::Building {
            TileStatus::UnderConstruction
        } else {
            TileStatus::Upgrading
        },
    );
    let builder_capacity = state.options.builder_capacity
        * (Fixed64::ONE + ctx.current().global_bonus(GlobalBonus::BuilderCapacity));
    for (r, needed) in &cost {
        let held = state
            .building(pos)
            .map(|b| b.amount(*r))
            .unwrap_or(Fixed64::ZERO);
        if held >= *needed {
            continue;
        }
        let in_transit = state.in_transit_amount(pos, *r);
        if held + in_transit >= *needed {
            // Enough is on the way; not blocked.
            continue;
        }
        if !ctx.workers.try_reserve(Fixed64::ONE) {
            ctx.next_mut()
                .statuses
                .insert(pos, TileStatus::NotEnoughWorkers);
            return;
        }
        route(
            content,
            state,
            ctx,
            *r,
            *needed - held - in_transit,
            TransportCapacity::Bounded(builder_capacity),
            pos,
            FuelSource::Prepaid(Fixed64::ONE),
        );
    }
}

// ---------------------------------------------------------------------------
// Completed buildings
// ---------------------------------------------------------------------------

fn process_completed(
    content: &ContentDb,
    state: &mut GameState,
    ctx: &mut TickContext,
    hooks: &mut dyn EngineHooks,
    pos: GridPos,
    offline: bool,
) {
    // A stable snapshot of the building for this tile's read paths; all
    // mutations go through `building_mut`.
    let Some(b) = state.building(pos).cloned() else {
        return;
    };
    let def = content.building(b.kind);

    // 1. Registrations into the next snapshot.
    if def.unique {
        ctx.next_mut().unique_buildings.insert(b.kind, pos);
    }
    if def.class == BuildingClass::Market {
        ctx.next_mut().tradeable_markets.insert(pos);
    }
    if let Some(tech) = def.vault_tech
        && b.level >= 5
        && state.unlocked_tech.contains(&tech)
    {
        ctx.next_mut()
            .add_tile_multiplier(pos, def.name.clone(), VAULT_STORAGE);
    }

    // 2. World value: the building itself plus its priced stockpile.
    let mut value = def.base_value * Fixed64::from_num(b.level);
    for (r, amount) in &b.resources {
        value += content.resource(*r).price * *amount;
    }
    ctx.next_mut().total_value += value;

    // 3. Resource location index for next tick's routing.
    for (r, amount) in &b.resources {
        ctx.next_mut().index_resource(*r, pos, *amount);
    }

    // 4. Terrain requirement.
    let on_deposit = def.deposits.iter().all(|d| {
        state
            .tiles
            .get(&pos)
            .is_some_and(|t| t.deposits.contains(d))
    });
    if !on_deposit {
        ctx.next_mut().statuses.insert(pos, TileStatus::NotOnDeposit);
        return;
    }

    // 5. Throttle.
    if b.capacity <= Fixed64::ZERO {
        ctx.next_mut().statuses.insert(pos, TileStatus::TurnedOff);
        return;
    }

    let io = ctx.io_cached(pos, |snap| tile_io(content, pos, &b, snap));
    ctx.next_mut().statuses.insert(pos, TileStatus::Working);

    // 6. Input transport, independent of production gating below.
    let transported = pull_inputs(content, state, ctx, pos, &b, &io);
    if let BuildingExtra::Warehouse { autopilot: true } = b.extra {
        warehouse::autopilot(content, state, ctx, pos);
    }

    // Importers only transport.
    if def.class == BuildingClass::Importer {
        if !transported {
            ctx.next_mut()
                .statuses
                .insert(pos, TileStatus::NoActiveTransports);
        }
        return;
    }

    // 7. Markets trade instead of producing.
    if def.class == BuildingClass::Market {
        if market::process(content, state, ctx, pos) {
            hooks.on_production(pos, offline);
        }
        return;
    }

    // 9. Standard production feasibility.
    if io.output.is_empty() {
        // Pure storage or ceremonial buildings idle as working.
        return;
    }
    if ctx.workers.available() < io.workers {
        ctx.next_mut()
            .statuses
            .insert(pos, TileStatus::NotEnoughWorkers);
        return;
    }
    for (r, amount) in &io.input {
        if b.amount(*r) < *amount {
            ctx.next_mut()
                .statuses
                .insert(pos, TileStatus::NotEnoughResources);
            return;
        }
    }

    // Partition outputs: ledger-bound, pool-bound, and science (routed to
    // the headquarters rather than stored locally).
    let science = content.science_resource();
    let mut ledger_outputs: Vec<(ResourceId, Fixed64)> = Vec::new();
    let mut pool_outputs: Vec<(ResourceId, Fixed64)> = Vec::new();
    let mut science_out = Fixed64::ZERO;
    let mut ledger_delta = Fixed64::ZERO;
    for (r, amount) in &io.output {
        if !content.resource(*r).storable {
            pool_outputs.push((*r, *amount));
        } else if *r == science {
            science_out += *amount;
        } else {
            ledger_outputs.push((*r, *amount));
            ledger_delta += *amount;
        }
    }
    let input_total = io.input.values().fold(Fixed64::ZERO, |acc, v| acc + *v);
    let fits = b.storage_used() - input_total + ledger_delta <= io.storage;

    if !fits {
        if pool_outputs.is_empty() {
            ctx.next_mut().statuses.insert(pos, TileStatus::StorageFull);
            return;
        }
        // Partial fallback: spend labor and inputs for the pool-bound
        // byproducts alone; the blocked ledger outputs still read as full.
        ctx.workers.try_reserve(io.workers);
        consume_inputs(state, ctx, pos, &io);
        credit_pools(content, ctx, &pool_outputs);
        ctx.next_mut().statuses.insert(pos, TileStatus::StorageFull);
        return;
    }

    // 10. Full production.
    if def.power && b.electrification > 0 {
        let levels = b.electrification.min(b.level);
        if ctx.power.try_reserve(Fixed64::from_num(levels)) {
            ctx.next_mut().add_tile_multiplier(
                pos,
                "electrification",
                Multiplier {
                    output: Fixed64::from_num(levels),
                    worker: Fixed64::ZERO,
                    storage: Fixed64::ZERO,
                },
            );
            ctx.next_mut().electrified.insert(pos, levels);
        }
    }
    ctx.workers.try_reserve(io.workers);
    consume_inputs(state, ctx, pos, &io);
    for (r, amount) in &ledger_outputs {
        if let Some(building) = state.building_mut(pos) {
            building.credit(*r, *amount);
        }
        ctx.next_mut().record_produced(*r, *amount);
        if !offline {
            hooks.on_amount_delta(pos, *r, *amount);
        }
    }
    if science_out > Fixed64::ZERO {
        let hq = ctx
            .current()
            .unique_buildings
            .get(&content.headquarters())
            .copied()
            .filter(|p| state.building(*p).is_some())
            .unwrap_or(pos);
        if let Some(building) = state.building_mut(hq) {
            building.credit(science, science_out);
        }
        ctx.next_mut().record_produced(science, science_out);
    }
    credit_pools(content, ctx, &pool_outputs);
    hooks.on_production(pos, offline);
}

/// Step 6: pull each transportable input (or importer cap entry) up to its
/// stockpile bound, respecting storage headroom and what is already on the
/// way. Returns whether any transport was committed.
fn pull_inputs(
    content: &ContentDb,
    state: &mut GameState,
    ctx: &mut TickContext,
    pos: GridPos,
    b: &Building,
    io: &TileIo,
) -> bool {
    let pulls: Vec<(ResourceId, Fixed64)> = match &b.extra {
        BuildingExtra::Importer { caps } => caps.iter().map(|(r, cap)| (*r, *cap)).collect(),
        _ => io
            .input
            .iter()
            .map(|(r, per_tick)| (*r, *per_tick * b.stockpile_capacity))
            .collect(),
    };
    let capacity = TransportCapacity::Bounded(
        state.options.transport_capacity
            * (Fixed64::ONE + ctx.current().global_bonus(GlobalBonus::TransportCapacity)),
    );
    let mut transported = false;
    for (r, cap) in pulls {
        if cap <= Fixed64::ZERO || !content.resource(r).transportable {
            continue;
        }
        let held = b.amount(r);
        let in_transit = state.in_transit_amount(pos, r);
        if held + in_transit >= cap {
            continue;
        }
        let headroom = io.storage - b.storage_used() - state.in_transit_total(pos);
        let want = (cap - held - in_transit).min(headroom);
        if want <= Fixed64::ZERO {
            continue;
        }
        let moved = route(content, state, ctx, r, want, capacity, pos, FuelSource::Pool);
        if moved > Fixed64::ZERO {
            transported = true;
        }
    }
    transported
}

fn consume_inputs(state: &mut GameState, ctx: &mut TickContext, pos: GridPos, io: &TileIo) {
    if let Some(building) = state.building_mut(pos) {
        for (r, amount) in &io.input {
            building.debit(*r, *amount);
        }
    }
    for (r, amount) in &io.input {
        ctx.next_mut().record_consumed(*r, *amount);
    }
}

/// Non-storable outputs feed the shared pools: the designated power
/// resource grows next tick's power budget, everything else grows labor.
fn credit_pools(content: &ContentDb, ctx: &mut TickContext, outputs: &[(ResourceId, Fixed64)]) {
    let power = content.power_resource();
    for (r, amount) in outputs {
        let next = ctx.next_mut();
        if *r == power {
            next.power_produced += *amount;
        } else {
            next.workers_produced += *amount;
        }
        next.record_produced(*r, *amount);
    }
}
