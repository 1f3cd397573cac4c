//! Property tests for the invariants the engine leans on everywhere.

use polis_engine::test_utils::TestWorld;
use polis_engine::{Fixed64, FuelSource, Pool, TickContext, TransportCapacity};
use polis_engine::{market, transport};
use polis_grid::GridPos;
use proptest::prelude::*;

fn fx(v: f64) -> Fixed64 {
    polis_engine::fixed::f64_to_fixed64(v)
}

proptest! {
    #[test]
    fn pairings_are_total_and_never_self(bucket in 0u64..10_000, x in -50i32..50, y in -50i32..50) {
        let world = TestWorld::new();
        let pos = GridPos::new(x, y);
        let pairings = market::generate_pairings(&world.content, bucket, pos);
        let tradeable = world.content.tradeable_resources();
        prop_assert_eq!(pairings.len(), tradeable.len());
        for (sell, buy) in &pairings {
            prop_assert_ne!(sell, buy);
            prop_assert!(tradeable.contains(buy));
        }
    }

    #[test]
    fn pool_never_goes_negative(seed in -5.0f64..50.0, requests in proptest::collection::vec((any::<bool>(), -5.0f64..30.0), 0..32)) {
        let mut pool = Pool::new(fx(seed));
        for (all_or_nothing, amount) in requests {
            let amount = fx(amount);
            if all_or_nothing {
                let before = pool.available();
                let ok = pool.try_reserve(amount);
                if ok && amount > Fixed64::ZERO {
                    prop_assert_eq!(pool.available(), before - amount);
                }
            } else {
                let granted = pool.reserve_up_to(amount);
                prop_assert!(granted >= Fixed64::ZERO);
                prop_assert!(granted <= amount.max(Fixed64::ZERO));
            }
            prop_assert!(pool.available() >= Fixed64::ZERO);
            prop_assert!(pool.used() <= pool.total());
        }
    }

    #[test]
    fn routing_never_overdraws(
        stock in 0.0f64..100.0,
        request in 0.0f64..100.0,
        workers in 0.0f64..20.0,
        capacity in 0.25f64..5.0,
    ) {
        let world = TestWorld::new();
        let mut state = world.empty_state();
        let dest = world.place(&mut state, GridPos::new(0, 0), world.quarry, 1);
        let src = world.place(&mut state, GridPos::new(4, 0), world.quarry, 1);
        state.building_mut(src).unwrap().credit(world.wood, fx(stock));

        let mut ctx = TickContext::new();
        ctx.next_mut().index_resource(world.wood, src, fx(stock));
        ctx.next_mut().workers_produced = fx(workers) - state.options.base_workers;
        ctx.begin_tick(&state.options);

        let moved = transport::route(
            &world.content,
            &mut state,
            &mut ctx,
            world.wood,
            fx(request),
            TransportCapacity::Bounded(fx(capacity)),
            dest,
            FuelSource::Pool,
        );

        prop_assert!(moved >= Fixed64::ZERO);
        prop_assert!(moved <= fx(request));
        prop_assert!(moved <= fx(stock));
        let left = state.building(src).unwrap().amount(world.wood);
        prop_assert_eq!(left, fx(stock) - moved);
        prop_assert!(ctx.workers.available() >= Fixed64::ZERO);
        // Everything that left the source is sitting in shipments.
        prop_assert_eq!(state.in_transit_amount(dest, world.wood), moved);
    }

    #[test]
    fn labor_for_is_monotonic_and_exact_on_multiples(units in 1u32..50, capacity in 1u32..10) {
        let cap = TransportCapacity::Bounded(fx(capacity as f64));
        let amount = fx((units * capacity) as f64);
        // Whole multiples need exactly amount / capacity crews.
        prop_assert_eq!(cap.labor_for(amount), fx(units as f64));
        // A hair more rounds up to one extra crew.
        prop_assert_eq!(
            cap.labor_for(amount + fx(0.5)),
            fx(units as f64 + 1.0)
        );
    }
}
