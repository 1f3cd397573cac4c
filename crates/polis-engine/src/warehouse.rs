//! Warehouse autopilot: autonomous redistribution of overflowing tiles into
//! idle warehouse capacity.
//!
//! The idle budget is clamped by three bounds: the warehouse's configured
//! idle capacity, how much the remaining labor could haul, and the physical
//! storage headroom left at the warehouse. The labor bound deliberately uses
//! the plain bounded capacity even though a later per-pair adjacency check
//! may grant unbounded capacity — the original behavior is kept as-is.

use polis_content::{BuildingClass, ContentDb, GlobalBonus, ResourceId};
use polis_grid::GridPos;

use crate::building::BuildingStatus;
use crate::fixed::Fixed64;
use crate::io::tile_io;
use crate::snapshot::TickContext;
use crate::state::GameState;
use crate::transport::{TransportCapacity, commit_shipment, effective_capacity};

/// Run one tick of autopilot redistribution for the warehouse at `pos`.
/// Returns the total amount committed to new shipments.
pub fn autopilot(
    content: &ContentDb,
    state: &mut GameState,
    ctx: &mut TickContext,
    pos: GridPos,
) -> Fixed64 {
    let Some(warehouse) = state.building(pos) else {
        return Fixed64::ZERO;
    };
    let level = warehouse.level;
    let io = ctx.io_cached(pos, |snap| tile_io(content, pos, warehouse, snap));

    let base_capacity = state.options.transport_capacity
        * (Fixed64::ONE + ctx.current().global_bonus(GlobalBonus::TransportCapacity));
    if base_capacity <= Fixed64::ZERO {
        return Fixed64::ZERO;
    }

    let mut budget = state.options.warehouse_idle_capacity * Fixed64::from_num(level);
    budget = budget.min(ctx.workers.available() * base_capacity);
    let headroom = io.storage - warehouse.storage_used() - state.in_transit_total(pos);
    budget = budget.min(headroom);
    if budget <= Fixed64::ZERO {
        return Fixed64::ZERO;
    }

    // Snapshot the overflowing candidates before any ledger changes.
    let positions: Vec<GridPos> = state.tiles.keys().copied().collect();
    let mut candidates: Vec<GridPos> = Vec::new();
    for p in positions {
        if p == pos {
            continue;
        }
        let Some(src) = state.building(p) else {
            continue;
        };
        if src.status != BuildingStatus::Completed {
            continue;
        }
        let src_io = ctx.io_cached(p, |snap| tile_io(content, p, src, snap));
        if src_io.storage > Fixed64::ZERO && src.storage_used() >= src_io.storage {
            candidates.push(p);
        }
    }
    candidates.sort_by_key(|p| (p.distance(&pos), *p));

    let fuel_resource = content.worker_resource();
    let mut total = Fixed64::ZERO;
    'sources: for src_pos in candidates {
        let Some(src) = state.building(src_pos) else {
            continue;
        };
        let src_def = content.building(src.kind);
        // A warehouse source may donate anything it holds; other buildings
        // only donate what they are configured to output.
        let donate_all = src_def.class == BuildingClass::Warehouse;
        let mut held: Vec<(ResourceId, Fixed64)> = src
            .resources
            .iter()
            .filter(|(r, amount)| {
                **amount > Fixed64::ZERO && (donate_all || src_def.output.contains_key(*r))
            })
            .map(|(r, amount)| (*r, *amount))
            .collect();
        // Largest holding first.
        held.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        for (resource, available) in held {
            if budget <= Fixed64::ZERO {
                break 'sources;
            }
            let take = available.min(budget);
            let capacity = effective_capacity(
                content,
                state,
                TransportCapacity::Bounded(base_capacity),
                src_pos,
                pos,
            );
            let needed = capacity.labor_for(take);
            let granted = ctx.workers.reserve_up_to(needed);
            let moved = if granted >= needed {
                take
            } else if granted > Fixed64::ZERO {
                take * granted / needed
            } else {
                break 'sources;
            };
            if let Some(b) = state.building_mut(src_pos) {
                b.debit(resource, moved);
            }
            commit_shipment(state, resource, moved, fuel_resource, granted, src_pos, pos);
            budget -= moved;
            total += moved;
            if granted < needed {
                break 'sources;
            }
        }
    }
    total
}
