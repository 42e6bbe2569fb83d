//! Battle process controller.
//!
//! - [`units`] - deployed troops and their state machine
//! - [`targeting`] - target selection, wall decisions and route planning
//! - [`defense`] - defensive buildings firing at units
//! - [`traps`] - trap trigger and explosion
//! - [`destruction`] - destruction percentage and stars
//! - [`controller`] - the battle loop
//! - [`replay`] - recording and deterministic playback

pub mod controller;
pub mod defense;
pub mod destruction;
pub mod replay;
pub mod targeting;
pub mod traps;
pub mod units;

pub use controller::{BattleConfig, BattleController, BattlePhase, BattleResult, TICK_RATE};
pub use destruction::{DestructionTracker, StarAward, StarReason};
pub use replay::{BattleRecorder, BattleReplayData, DeploymentEvent, ReplayPlayer, REPLAY_VERSION};
pub use targeting::{Route, PIXEL_DETOUR_THRESHOLD};
pub use traps::TrapState;
pub use units::{Unit, UnitId, UnitState};
