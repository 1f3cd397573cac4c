//! Deterministic tick engine for a grid-based city-building economy.
//!
//! One call to [`Engine::advance`] simulates one second: multipliers are
//! aggregated, market pairings rotate on the wall-clock hour, in-flight
//! shipments advance, and every tile runs its lifecycle step in priority
//! order. All arithmetic is `Q32.32` fixed-point and every collection is
//! ordered, so identical inputs produce byte-identical saves on every
//! platform.
//!
//! The engine reads the previous tick's aggregate ([`TickSnapshot`]) and
//! writes the next one; consumers only ever see completed ticks.

pub mod building;
pub mod engine;
pub mod fixed;
pub mod io;
pub mod lifecycle;
pub mod market;
pub mod multiplier;
pub mod pool;
pub mod rng;
pub mod serialize;
pub mod snapshot;
pub mod state;
pub mod transport;
pub mod warehouse;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use building::{Building, BuildingExtra, BuildingStatus, Tile};
pub use engine::{Engine, EngineHooks, NoopHooks};
pub use fixed::{Fixed64, Ticks};
pub use pool::Pool;
pub use serialize::SaveError;
pub use snapshot::{MultiplierEntry, TickContext, TickSnapshot, TileStatus};
pub use state::{GameState, Shipment, ShipmentId, SimOptions};
pub use transport::{FuelSource, TransportCapacity};
