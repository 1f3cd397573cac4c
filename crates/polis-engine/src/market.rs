//! Market pricing: deterministic hourly rotation of buy/sell pairings and
//! per-tick trade execution.
//!
//! Pairings are derived from two seeded permutations of the tradeable
//! resource set. The seed combines the wall-clock hour bucket with the tile
//! coordinate, so two markets never desynchronize within an hour and a
//! replayed tick reproduces identical pairings.

use polis_content::{ContentDb, ResourceId};
use polis_grid::GridPos;
use std::collections::BTreeMap;

use crate::building::BuildingExtra;
use crate::fixed::Fixed64;
use crate::io::tile_io;
use crate::rng::SimRng;
use crate::snapshot::{TickContext, TileStatus};
use crate::state::GameState;

/// Seconds per price bucket.
pub const BUCKET_SECONDS: u64 = 3600;

const BUY_SEED_SALT: u64 = 0x517C_C1B7_2722_0A95;

fn pos_seed(pos: GridPos) -> u64 {
    ((pos.x as u32 as u64) << 32) | (pos.y as u32 as u64)
}

/// Derive this market's sell -> buy assignment for the given hour bucket.
///
/// Two independent permutations of the eligible resources are drawn; each
/// sell resource takes the next buy candidate that is not itself, skipping
/// forward circularly. Fewer than two eligible resources yields no pairings.
pub fn generate_pairings(
    content: &ContentDb,
    bucket: u64,
    pos: GridPos,
) -> BTreeMap<ResourceId, ResourceId> {
    let eligible = content.tradeable_resources();
    if eligible.len() < 2 {
        return BTreeMap::new();
    }
    let seed = bucket
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(pos_seed(pos));
    let mut sell_order = eligible.clone();
    SimRng::new(seed).shuffle(&mut sell_order);
    let mut buy_order = eligible;
    SimRng::new(seed ^ BUY_SEED_SALT).shuffle(&mut buy_order);

    let n = buy_order.len();
    let mut pairings = BTreeMap::new();
    for (i, sell) in sell_order.iter().enumerate() {
        for k in 0..n {
            let buy = buy_order[(i + k) % n];
            if buy != *sell {
                pairings.insert(*sell, buy);
                break;
            }
        }
    }
    pairings
}

/// Rotate pairings for every market when the hour bucket has changed, and
/// initialize any market that has none yet.
pub fn rotate_pairings(content: &ContentDb, state: &mut GameState, now_unix: u64) {
    let bucket = now_unix / BUCKET_SECONDS;
    let refresh = state.last_price_bucket != Some(bucket);

    let positions: Vec<GridPos> = state
        .tiles
        .iter()
        .filter(|(_, t)| {
            t.building
                .as_ref()
                .is_some_and(|b| matches!(b.extra, BuildingExtra::Market { .. }))
        })
        .map(|(p, _)| *p)
        .collect();
    for pos in positions {
        let Some(b) = state.building_mut(pos) else {
            continue;
        };
        let BuildingExtra::Market {
            sell,
            pairings,
            clear_sell_on_update,
        } = &mut b.extra
        else {
            continue;
        };
        if refresh || pairings.is_empty() {
            *pairings = generate_pairings(content, bucket, pos);
            if refresh && *clear_sell_on_update {
                sell.clear();
            }
        }
    }
    state.last_price_bucket = Some(bucket);
}

/// Execute this tick's trades for the market at `pos`. Returns whether any
/// positive volume traded. Consumes no labor.
///
/// Per sell resource, the sellable amount is bounded by trade volume
/// (scaled by level, throttle, and output multiplier) and current holdings.
/// The buy amount preserves value at current prices. A trade whose net
/// ledger growth would overflow storage is capped to fit and the tile is
/// marked `StorageFull`.
pub fn process(
    content: &ContentDb,
    state: &mut GameState,
    ctx: &mut TickContext,
    pos: GridPos,
) -> bool {
    let Some(b) = state.building(pos) else {
        return false;
    };
    let def = content.building(b.kind);
    let m = ctx.current().multiplier_for(b.kind, pos);
    let volume = def.trade_volume
        * Fixed64::from_num(b.level)
        * b.capacity.clamp(Fixed64::ZERO, Fixed64::ONE)
        * (Fixed64::ONE + m.output);
    let io = ctx.io_cached(pos, |snap| tile_io(content, pos, b, snap));
    let in_transit = state.in_transit_total(pos);

    let BuildingExtra::Market { sell, pairings, .. } = &b.extra else {
        return false;
    };
    let sells: Vec<ResourceId> = sell.iter().copied().collect();
    let pairings = pairings.clone();

    let mut traded = false;
    let mut storage_full = false;
    for s in sells {
        let Some(buy) = pairings.get(&s).copied() else {
            continue;
        };
        let price_sell = content.resource(s).price;
        let price_buy = content.resource(buy).price;
        if price_sell <= Fixed64::ZERO || price_buy <= Fixed64::ZERO {
            continue;
        }
        let Some(building) = state.building_mut(pos) else {
            break;
        };
        let mut sell_amount = volume.min(building.amount(s));
        if sell_amount <= Fixed64::ZERO {
            continue;
        }
        let ratio = price_sell / price_buy;
        let mut buy_amount = sell_amount * ratio;
        let headroom = io.storage - building.storage_used() - in_transit;
        if buy_amount - sell_amount > headroom {
            storage_full = true;
            // Only a value-gaining pairing can overflow; cap the sale so
            // the net growth exactly fits.
            if ratio <= Fixed64::ONE {
                continue;
            }
            sell_amount = (headroom / (ratio - Fixed64::ONE)).max(Fixed64::ZERO);
            if sell_amount <= Fixed64::ZERO {
                continue;
            }
            buy_amount = sell_amount * ratio;
        }
        building.debit(s, sell_amount);
        building.credit(buy, buy_amount);
        ctx.next_mut().record_consumed(s, sell_amount);
        ctx.next_mut().record_produced(buy, buy_amount);
        traded = true;
    }
    if storage_full {
        ctx.next_mut().statuses.insert(pos, TileStatus::StorageFull);
    }
    traded
}
