//! The tick driver: one fixed-order pass per simulated second, plus
//! offline fast-forward and the host callback surface.

use polis_content::{ContentDb, GlobalBonus};

use crate::fixed::Fixed64;
use crate::lifecycle;
use crate::market;
use crate::multiplier;
use crate::serialize;
use crate::snapshot::{TickContext, TickSnapshot};
use crate::state::GameState;
use crate::transport;

/// Ticks between persistence callbacks during online play.
const PERSIST_INTERVAL: u64 = 5;

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Host callbacks fired by the engine. All methods default to no-ops so a
/// host only implements what it cares about. `offline` is true during
/// fast-forward, when hosts typically skip UI work.
pub trait EngineHooks {
    /// A construction site finished its first level.
    fn on_construction_complete(&mut self, _pos: polis_grid::GridPos, _state: &GameState) {}

    /// A tile produced (or a market traded) this tick.
    fn on_production(&mut self, _pos: polis_grid::GridPos, _offline: bool) {}

    /// A tile's ledger gained `amount` of `resource` through production.
    fn on_amount_delta(
        &mut self,
        _pos: polis_grid::GridPos,
        _resource: polis_content::ResourceId,
        _amount: Fixed64,
    ) {
    }

    /// The tick finished and the state is consistent.
    fn on_state_changed(&mut self, _state: &GameState) {}

    /// Periodic save payload, already encoded.
    fn persist(&mut self, _bytes: &[u8]) {}

    /// Liveness signal with the current tick counter.
    fn heartbeat(&mut self, _tick: u64) {}
}

/// The default host: ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl EngineHooks for NoopHooks {}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the immutable content database, the host hooks, and the
/// double-buffered tick context. The mutable [`GameState`] is passed in per
/// call so hosts control where it lives.
pub struct Engine<H: EngineHooks> {
    content: ContentDb,
    hooks: H,
    ctx: TickContext,
}

impl<H: EngineHooks> Engine<H> {
    pub fn new(content: ContentDb, hooks: H) -> Self {
        Self {
            content,
            hooks,
            ctx: TickContext::new(),
        }
    }

    pub fn content(&self) -> &ContentDb {
        &self.content
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// The published snapshot: the aggregate of the previous completed tick.
    /// The tick currently being computed is never visible here.
    pub fn snapshot(&self) -> &TickSnapshot {
        self.ctx.current()
    }

    /// Advance the simulation by exactly one tick.
    ///
    /// The phase order is fixed: publish the previous snapshot and reseed
    /// the pools, aggregate multipliers, rotate market pairings, advance
    /// in-flight shipments, process every tile, then finalize idle labor
    /// and happiness.
    pub fn advance(&mut self, state: &mut GameState, now_unix: u64, offline: bool) {
        self.ctx.begin_tick(&state.options);
        multiplier::aggregate(&self.content, state, self.ctx.next_mut());
        market::rotate_pairings(&self.content, state, now_unix);
        transport::advance_shipments(&self.content, state, &mut self.ctx);
        lifecycle::process_tiles(&self.content, state, &mut self.ctx, &mut self.hooks, offline);
        self.finalize(state);
        state.tick += 1;

        if !offline {
            self.hooks.on_state_changed(state);
            if state.tick % PERSIST_INTERVAL == 0
                && let Ok(bytes) = serialize::encode(state)
            {
                self.hooks.persist(&bytes);
            }
            self.hooks.heartbeat(state.tick);
        }
    }

    /// Catch up `ticks` simulated seconds of offline time, one real tick of
    /// work per simulated second. Hosts cap `ticks` themselves.
    pub fn fast_forward(&mut self, state: &mut GameState, start_unix: u64, ticks: u64) {
        for i in 0..ticks {
            self.advance(state, start_unix + i, true);
        }
    }

    /// Tail of the tick: idle labor, idle science, and happiness.
    fn finalize(&mut self, state: &mut GameState) {
        let idle = self.ctx.workers.available();
        let science = idle * state.options.science_per_idle_worker;
        if science > Fixed64::ZERO {
            let science_resource = self.content.science_resource();
            let hq = self
                .ctx
                .current()
                .unique_buildings
                .get(&self.content.headquarters())
                .copied();
            if let Some(hq) = hq
                && let Some(b) = state.building_mut(hq)
            {
                b.credit(science_resource, science);
                let next = self.ctx.next_mut();
                next.record_produced(science_resource, science);
                next.science_produced += science;
            }
        }
        let next = self.ctx.next_mut();
        next.idle_workers = idle;
        let bonus = next.global_bonus(GlobalBonus::Happiness);
        next.happiness = state.options.base_happiness + bonus;
    }
}
