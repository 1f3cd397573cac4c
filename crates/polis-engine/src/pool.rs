//! Tick-scoped depletable pools for shared labor and power.
//!
//! A pool is reseeded at the start of every tick and only ever decreases
//! within it. Reservations are synchronous and final: there is no rollback,
//! so labor claimed by an earlier step stays spent even if a later step of
//! the same tile fails. Tile processing order is the only arbiter of
//! contention.

use crate::fixed::Fixed64;

/// A shared, monotonically decreasing resource budget for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pool {
    total: Fixed64,
    used: Fixed64,
}

impl Pool {
    pub fn new(total: Fixed64) -> Self {
        Self {
            total: total.max(Fixed64::ZERO),
            used: Fixed64::ZERO,
        }
    }

    pub fn total(&self) -> Fixed64 {
        self.total
    }

    pub fn used(&self) -> Fixed64 {
        self.used
    }

    pub fn available(&self) -> Fixed64 {
        self.total - self.used
    }

    /// All-or-nothing reservation. Returns whether the full amount was
    /// granted. Non-positive requests always succeed and consume nothing.
    pub fn try_reserve(&mut self, amount: Fixed64) -> bool {
        if amount <= Fixed64::ZERO {
            return true;
        }
        if self.available() < amount {
            return false;
        }
        self.used += amount;
        true
    }

    /// Partial reservation: grants `min(amount, available)` and returns the
    /// granted quantity.
    pub fn reserve_up_to(&mut self, amount: Fixed64) -> Fixed64 {
        let granted = amount.min(self.available()).max(Fixed64::ZERO);
        self.used += granted;
        granted
    }
}
