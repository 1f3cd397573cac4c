//! Greedy nearest-source transportation: routing new shipments under a
//! labor budget, and advancing the in-flight queue.
//!
//! Routing is labor-gated: every unit of transport capacity costs labor,
//! and a shipment keeps paying its crew every travel tick. When labor runs
//! short mid-commit the moved amount scales down proportionally — transport
//! is fuel-limited, not source-limited.

use polis_content::{ContentDb, ResourceId};
use polis_grid::{GridPos, interpolate};

use crate::fixed::Fixed64;
use crate::snapshot::TickContext;
use crate::state::{GameState, Shipment, ShipmentId};

// ---------------------------------------------------------------------------
// Capacity
// ---------------------------------------------------------------------------

/// Transport capacity per unit of labor. Adjacency to a warehouse promotes
/// a pair to `Unbounded`; an explicit sentinel, never a float infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCapacity {
    Bounded(Fixed64),
    Unbounded,
}

impl TransportCapacity {
    /// Labor units needed to move `amount` at this capacity, rounded up to
    /// whole crews. `Bounded` capacity must be positive; callers guard the
    /// zero case before dividing.
    pub fn labor_for(&self, amount: Fixed64) -> Fixed64 {
        match self {
            TransportCapacity::Unbounded => Fixed64::ZERO,
            TransportCapacity::Bounded(c) => (amount / *c).ceil(),
        }
    }
}

/// The adjacency rule: within grid distance 1 of a warehouse-kind endpoint,
/// local transfers cost no hauling labor.
pub fn effective_capacity(
    content: &ContentDb,
    state: &GameState,
    base: TransportCapacity,
    from: GridPos,
    to: GridPos,
) -> TransportCapacity {
    if from.distance(&to) <= 1 {
        let is_warehouse =
            |pos: GridPos| state.building(pos).is_some_and(|b| b.is_warehouse(content));
        if is_warehouse(from) || is_warehouse(to) {
            return TransportCapacity::Unbounded;
        }
    }
    base
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Where routing draws its labor from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuelSource {
    /// The shared worker pool.
    Pool,
    /// A budget already claimed by the caller (construction sites claim one
    /// unit up front).
    Prepaid(Fixed64),
}

/// Pull up to `amount` of `resource` toward `dest` from the nearest tiles
/// holding it, per the current snapshot's resource index. Returns the total
/// amount committed to new shipments.
///
/// Candidates are snapshotted and ordered before any ledger changes; later
/// candidates still see earlier debits within the same tick. Source ledgers
/// are debited at commit time — the destination is only credited when the
/// shipment arrives.
pub fn route(
    content: &ContentDb,
    state: &mut GameState,
    ctx: &mut TickContext,
    resource: ResourceId,
    amount: Fixed64,
    capacity: TransportCapacity,
    dest: GridPos,
    fuel: FuelSource,
) -> Fixed64 {
    if amount <= Fixed64::ZERO {
        return Fixed64::ZERO;
    }
    if let TransportCapacity::Bounded(c) = capacity
        && c <= Fixed64::ZERO
    {
        return Fixed64::ZERO;
    }
    let mut prepaid = match fuel {
        FuelSource::Pool => {
            if ctx.workers.available() <= Fixed64::ZERO {
                return Fixed64::ZERO;
            }
            None
        }
        FuelSource::Prepaid(budget) => {
            if budget <= Fixed64::ZERO {
                return Fixed64::ZERO;
            }
            Some(budget)
        }
    };

    let Some(index) = ctx.current().resource_index.get(&resource) else {
        return Fixed64::ZERO;
    };
    let mut candidates: Vec<GridPos> = index.keys().copied().filter(|p| *p != dest).collect();
    candidates.sort_by_key(|p| (p.distance(&dest), *p));

    let fuel_resource = content.worker_resource();
    let mut remaining = amount;
    let mut committed = Fixed64::ZERO;
    for src in candidates {
        if remaining <= Fixed64::ZERO {
            break;
        }
        let available = state
            .building(src)
            .map(|b| b.amount(resource))
            .unwrap_or(Fixed64::ZERO);
        if available <= Fixed64::ZERO {
            continue;
        }
        let take = available.min(remaining);
        let pair_capacity = effective_capacity(content, state, capacity, src, dest);
        let needed = pair_capacity.labor_for(take);
        let granted = match &mut prepaid {
            None => ctx.workers.reserve_up_to(needed),
            Some(left) => {
                let granted = needed.min(*left);
                *left -= granted;
                granted
            }
        };
        let (moved, exhausted) = if granted >= needed {
            (take, false)
        } else if granted > Fixed64::ZERO {
            // Partial fuel: scale the load to the crews we could pay.
            (take * granted / needed, true)
        } else {
            (Fixed64::ZERO, true)
        };
        if moved > Fixed64::ZERO {
            if let Some(b) = state.building_mut(src) {
                b.debit(resource, moved);
            }
            commit_shipment(state, resource, moved, fuel_resource, granted, src, dest);
            committed += moved;
            remaining -= moved;
        }
        if exhausted {
            break;
        }
    }
    committed
}

/// Create a shipment record and enqueue it at its destination. `fuel_amount`
/// is the per-travel-tick labor upkeep.
pub fn commit_shipment(
    state: &mut GameState,
    resource: ResourceId,
    amount: Fixed64,
    fuel_resource: ResourceId,
    fuel_amount: Fixed64,
    from: GridPos,
    to: GridPos,
) -> ShipmentId {
    let distance = from.distance(&to).max(1) as u64;
    let ticks_required = (distance * state.options.ticks_per_tile).max(1);
    state.enqueue_shipment(Shipment {
        resource,
        amount,
        fuel_resource,
        fuel_amount,
        current_fuel: fuel_amount,
        from,
        to,
        ticks_spent: 0,
        ticks_required,
        fueled: true,
    })
}

// ---------------------------------------------------------------------------
// Advancement
// ---------------------------------------------------------------------------

/// Advance every in-flight shipment by one tick, consuming fuel from the
/// worker pool. Runs before tile processing so deliveries are visible to
/// this tick's producers.
///
/// A shipment whose fuel resource is non-transportable travels for free.
/// Otherwise the nominal fuel is charged each tick, zeroed while the
/// shipment's interpolated position lies inside a unique building's
/// fuel-free zone. Unpaid shipments stall in place; they are never dropped.
pub fn advance_shipments(content: &ContentDb, state: &mut GameState, ctx: &mut TickContext) {
    let zones: Vec<(GridPos, Fixed64)> = ctx
        .current()
        .unique_buildings
        .iter()
        .filter_map(|(kind, pos)| {
            content
                .building(*kind)
                .fuel_free_radius_sq
                .map(|r2| (*pos, r2))
        })
        .collect();

    let dests: Vec<GridPos> = state.shipment_queues.keys().copied().collect();
    for dest in dests {
        let ids: Vec<ShipmentId> = state
            .shipment_queues
            .get(&dest)
            .cloned()
            .unwrap_or_default();
        for id in ids {
            let mut arrived = false;
            if let Some(s) = state.shipments.get_mut(id) {
                if !content.resource(s.fuel_resource).transportable {
                    s.current_fuel = Fixed64::ZERO;
                    s.fueled = true;
                    s.ticks_spent += 1;
                } else {
                    let mut fuel = s.fuel_amount;
                    if fuel > Fixed64::ZERO && !zones.is_empty() {
                        let at = interpolate(s.from, s.to, s.progress());
                        if zones.iter().any(|(zp, r2)| at.squared_distance(zp) <= *r2) {
                            fuel = Fixed64::ZERO;
                        }
                    }
                    s.current_fuel = fuel;
                    if ctx.workers.try_reserve(fuel) {
                        s.fueled = true;
                        s.ticks_spent += 1;
                    } else {
                        s.fueled = false;
                    }
                }
                arrived = s.ticks_spent >= s.ticks_required;
            }
            if arrived && let Some(s) = state.remove_shipment(id) {
                match state.building_mut(s.to) {
                    Some(b) => b.credit(s.resource, s.amount),
                    // Destination demolished mid-flight: the load is lost
                    // and accounted as consumed.
                    None => ctx.next_mut().record_consumed(s.resource, s.amount),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;
    use crate::test_utils::TestWorld;

    fn fx(v: f64) -> Fixed64 {
        f64_to_fixed64(v)
    }

    /// Stage the resource index and worker pool as if the previous tick had
    /// published them, then start the tick.
    fn prime(ctx: &mut TickContext, state: &GameState, workers: f64) {
        for (pos, tile) in &state.tiles {
            if let Some(b) = &tile.building {
                for (r, amount) in &b.resources {
                    ctx.next_mut().index_resource(*r, *pos, *amount);
                }
            }
        }
        ctx.next_mut().workers_produced = fx(workers) - state.options.base_workers;
        ctx.begin_tick(&state.options);
    }

    #[test]
    fn labor_for_rounds_up() {
        let cap = TransportCapacity::Bounded(fx(4.0));
        assert_eq!(cap.labor_for(fx(9.0)), fx(3.0));
        assert_eq!(cap.labor_for(fx(8.0)), fx(2.0));
        assert_eq!(TransportCapacity::Unbounded.labor_for(fx(100.0)), Fixed64::ZERO);
    }

    #[test]
    fn route_prefers_nearest_source() {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = world.place(&mut state, GridPos::new(0, 0), world.quarry, 1);
        let near = world.place(&mut state, GridPos::new(2, 0), world.quarry, 1);
        let far = world.place(&mut state, GridPos::new(8, 0), world.quarry, 1);
        state.building_mut(near).unwrap().credit(world.wood, fx(10.0));
        state.building_mut(far).unwrap().credit(world.wood, fx(10.0));

        let mut ctx = TickContext::new();
        prime(&mut ctx, &state, 100.0);

        let moved = route(
            &world.content,
            &mut state,
            &mut ctx,
            world.wood,
            fx(5.0),
            TransportCapacity::Bounded(Fixed64::ONE),
            dest,
            FuelSource::Pool,
        );
        assert_eq!(moved, fx(5.0));
        assert_eq!(state.building(near).unwrap().amount(world.wood), fx(5.0));
        assert_eq!(state.building(far).unwrap().amount(world.wood), fx(10.0));
        assert_eq!(state.shipments.len(), 1);
    }

    #[test]
    fn route_spans_multiple_sources() {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = world.place(&mut state, GridPos::new(0, 0), world.quarry, 1);
        let a = world.place(&mut state, GridPos::new(1, 0), world.quarry, 1);
        let b = world.place(&mut state, GridPos::new(2, 0), world.quarry, 1);
        state.building_mut(a).unwrap().credit(world.wood, fx(3.0));
        state.building_mut(b).unwrap().credit(world.wood, fx(10.0));

        let mut ctx = TickContext::new();
        prime(&mut ctx, &state, 100.0);

        let moved = route(
            &world.content,
            &mut state,
            &mut ctx,
            world.wood,
            fx(8.0),
            TransportCapacity::Bounded(Fixed64::ONE),
            dest,
            FuelSource::Pool,
        );
        assert_eq!(moved, fx(8.0));
        assert_eq!(state.building(a).unwrap().amount(world.wood), Fixed64::ZERO);
        assert_eq!(state.building(b).unwrap().amount(world.wood), fx(5.0));
        assert_eq!(state.shipments.len(), 2);
    }

    #[test]
    fn partial_fuel_scales_amount_proportionally() {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = world.place(&mut state, GridPos::new(0, 0), world.quarry, 1);
        let src = world.place(&mut state, GridPos::new(3, 0), world.quarry, 1);
        state.building_mut(src).unwrap().credit(world.wood, fx(10.0));

        let mut ctx = TickContext::new();
        // 10 units at capacity 1 need 10 labor; only 4 available.
        prime(&mut ctx, &state, 4.0);

        let moved = route(
            &world.content,
            &mut state,
            &mut ctx,
            world.wood,
            fx(10.0),
            TransportCapacity::Bounded(Fixed64::ONE),
            dest,
            FuelSource::Pool,
        );
        // amount * granted / needed = 10 * 4 / 10.
        assert_eq!(moved, fx(4.0));
        assert_eq!(ctx.workers.available(), Fixed64::ZERO);
        assert_eq!(state.building(src).unwrap().amount(world.wood), fx(6.0));
    }

    #[test]
    fn route_without_labor_does_nothing() {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = world.place(&mut state, GridPos::new(0, 0), world.quarry, 1);
        let src = world.place(&mut state, GridPos::new(3, 0), world.quarry, 1);
        state.building_mut(src).unwrap().credit(world.wood, fx(10.0));

        let mut ctx = TickContext::new();
        prime(&mut ctx, &state, 0.0);

        let moved = route(
            &world.content,
            &mut state,
            &mut ctx,
            world.wood,
            fx(10.0),
            TransportCapacity::Bounded(Fixed64::ONE),
            dest,
            FuelSource::Pool,
        );
        assert_eq!(moved, Fixed64::ZERO);
        assert!(state.shipments.is_empty());
        assert_eq!(state.building(src).unwrap().amount(world.wood), fx(10.0));
    }

    #[test]
    fn zero_capacity_never_divides() {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = world.place(&mut state, GridPos::new(0, 0), world.quarry, 1);
        let src = world.place(&mut state, GridPos::new(3, 0), world.quarry, 1);
        state.building_mut(src).unwrap().credit(world.wood, fx(10.0));

        let mut ctx = TickContext::new();
        prime(&mut ctx, &state, 100.0);

        let moved = route(
            &world.content,
            &mut state,
            &mut ctx,
            world.wood,
            fx(10.0),
            TransportCapacity::Bounded(Fixed64::ZERO),
            dest,
            FuelSource::Pool,
        );
        assert_eq!(moved, Fixed64::ZERO);
    }

    #[test]
    fn warehouse_adjacency_promotes_to_unbounded() {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = world.place(&mut state, GridPos::new(0, 0), world.warehouse, 1);
        let src = world.place(&mut state, GridPos::new(1, 0), world.quarry, 1);
        state.building_mut(src).unwrap().credit(world.wood, fx(50.0));

        let mut ctx = TickContext::new();
        // One worker could never haul 50 at bounded capacity 1.
        prime(&mut ctx, &state, 1.0);

        let moved = route(
            &world.content,
            &mut state,
            &mut ctx,
            world.wood,
            fx(50.0),
            TransportCapacity::Bounded(Fixed64::ONE),
            dest,
            FuelSource::Pool,
        );
        assert_eq!(moved, fx(50.0));
        // Unbounded transfers cost no labor at all.
        assert_eq!(ctx.workers.available(), fx(1.0));
    }

    #[test]
    fn advancement_delivers_on_schedule() {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = world.place(&mut state, GridPos::new(0, 0), world.quarry, 1);
        let src = GridPos::new(3, 0);
        commit_shipment(
            &mut state,
            world.wood,
            fx(6.0),
            world.worker,
            fx(2.0),
            src,
            dest,
        );

        let mut ctx = TickContext::new();
        for _ in 0..3 {
            ctx.begin_tick(&state.options);
            advance_shipments(&world.content, &mut state, &mut ctx);
        }
        assert!(state.shipments.is_empty());
        assert!(!state.shipment_queues.contains_key(&dest));
        assert_eq!(state.building(dest).unwrap().amount(world.wood), fx(6.0));
        // 3 travel ticks at 2 fuel each.
        assert_eq!(ctx.workers.used(), fx(2.0));
    }

    #[test]
    fn unfueled_shipment_stalls() {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = world.place(&mut state, GridPos::new(0, 0), world.quarry, 1);
        let id = commit_shipment(
            &mut state,
            world.wood,
            fx(6.0),
            world.worker,
            fx(100.0),
            GridPos::new(3, 0),
            dest,
        );

        let mut ctx = TickContext::new();
        ctx.begin_tick(&state.options);
        advance_shipments(&world.content, &mut state, &mut ctx);

        let s = &state.shipments[id];
        assert_eq!(s.ticks_spent, 0);
        assert!(!s.fueled);
    }

    #[test]
    fn fuel_free_zone_zeroes_upkeep() {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = world.place(&mut state, GridPos::new(0, 0), world.quarry, 1);
        world.place(&mut state, GridPos::new(1, 1), world.lighthouse, 1);
        let id = commit_shipment(
            &mut state,
            world.wood,
            fx(6.0),
            world.worker,
            // Far beyond the pool; only the zone can pay for this.
            fx(1000.0),
            GridPos::new(2, 0),
            dest,
        );

        let mut ctx = TickContext::new();
        ctx.next_mut()
            .unique_buildings
            .insert(world.lighthouse, GridPos::new(1, 1));
        ctx.begin_tick(&state.options);
        advance_shipments(&world.content, &mut state, &mut ctx);

        let s = &state.shipments[id];
        assert!(s.fueled);
        assert_eq!(s.ticks_spent, 1);
        assert_eq!(s.current_fuel, Fixed64::ZERO);
    }

    #[test]
    fn delivery_to_demolished_tile_drops_load() {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = GridPos::new(1, 0);
        commit_shipment(
            &mut state,
            world.wood,
            fx(6.0),
            world.worker,
            Fixed64::ZERO,
            GridPos::new(0, 0),
            dest,
        );

        let mut ctx = TickContext::new();
        ctx.begin_tick(&state.options);
        advance_shipments(&world.content, &mut state, &mut ctx);

        assert!(state.shipments.is_empty());
        assert_eq!(ctx.next_mut().consumed[&world.wood], fx(6.0));
    }
}
