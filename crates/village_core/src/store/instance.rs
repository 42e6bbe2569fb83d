//! Per-building runtime state.

use serde::{Deserialize, Serialize};

use super::Resources;
use crate::data::{BuildingData, BuildingKind};
use crate::grid::{Footprint, GridPos};
use crate::occupancy::BuildingId;

/// Lifecycle of a building instance.
///
/// ```text
/// Placing --confirm--> Constructing --timer--> Built --upgrade--> Constructing --timer--> Built (level + 1)
/// Placing --cancel--> removed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingState {
    /// Dropped on the map but not yet confirmed; does not occupy cells.
    Placing,
    /// Construction or upgrade timer running.
    Constructing,
    /// Finished at its current level.
    Built,
}

/// One building on the home village or the battle map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildingInstance {
    /// Unique id, assigned monotonically by the store.
    pub id: BuildingId,
    /// Building type.
    pub kind: BuildingKind,
    /// Current level (1-based). An upgrade in progress has not bumped it yet.
    pub level: u32,
    /// Footprint anchor column.
    pub grid_x: i32,
    /// Footprint anchor row.
    pub grid_y: i32,
    /// Lifecycle state.
    pub state: BuildingState,
    /// Epoch second the pending timer elapses; 0 if none.
    pub finish_time: u64,
    /// Whether the pending timer is the first construction rather than an upgrade.
    pub is_initial_construction: bool,
    /// Remaining hit points.
    pub current_hp: i32,
    /// Destroyed in battle; destroyed buildings no longer occupy cells.
    pub is_destroyed: bool,
    /// Epoch second resources were last collected (mines and collectors).
    #[serde(default)]
    pub last_collected: u64,
    /// Resources an attacker gains by destroying this building.
    #[serde(default)]
    pub lootable: Resources,
}

impl BuildingInstance {
    /// Anchor cell.
    #[must_use]
    pub const fn position(&self) -> GridPos {
        GridPos::new(self.grid_x, self.grid_y)
    }

    /// Cells covered, given the type's configuration.
    #[must_use]
    pub const fn footprint(&self, data: &BuildingData) -> Footprint {
        Footprint::new(self.grid_x, self.grid_y, data.width, data.height)
    }

    /// Whether the building stands and has finished its first construction.
    ///
    /// Buildings being upgraded stay operational.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        !self.is_destroyed
            && match self.state {
                BuildingState::Built => true,
                BuildingState::Constructing => !self.is_initial_construction,
                BuildingState::Placing => false,
            }
    }
}
