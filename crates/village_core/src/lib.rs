//! # Village Core
//!
//! Deterministic village and battle simulation for Village Siege.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No wall clock (callers pass timestamps in)
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless battle verification
//! - Replay systems
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`grid`] - isometric grid coordinates and footprints
//! - [`occupancy`] - which building covers which cell
//! - [`pathfinding`] - A* over the occupancy grid
//! - [`store`] - home village and battle map data
//! - [`battle`] - battle loop, targeting, defenses, traps and replays
//! - [`map_generation`] - seeded enemy villages
//! - [`data`] - static building and troop tables
//! - [`events`] - notifications for presentation layers
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod battle;
pub mod data;
pub mod error;
pub mod events;
pub mod grid;
pub mod map_generation;
pub mod math;
pub mod occupancy;
pub mod pathfinding;
pub mod store;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::battle::{BattleConfig, BattleController, BattlePhase, BattleResult, ReplayPlayer};
    pub use crate::data::{BuildingKind, GameData, ResourceKind, TroopKind};
    pub use crate::error::{GameError, Result};
    pub use crate::events::GameEvent;
    pub use crate::grid::{Footprint, GridPos, IsoGrid};
    pub use crate::map_generation::{BattleMapGenerator, Difficulty};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::occupancy::BuildingId;
    pub use crate::store::{BuildingState, Resources, VillageStore};
}
