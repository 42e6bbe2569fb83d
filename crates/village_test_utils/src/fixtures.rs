//! Test fixtures and helpers.
//!
//! Pre-built stores and battle scenarios for consistent testing.

use std::sync::Arc;

use fixed::types::I32F32;
use village_core::battle::{BattleConfig, BattleController, BattlePhase};
use village_core::data::{BuildingKind, GameData, TroopKind};
use village_core::occupancy::BuildingId;
use village_core::store::{BuildingState, VillageStore};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// The built-in game data.
#[must_use]
pub fn test_data() -> Arc<GameData> {
    Arc::new(GameData::default())
}

/// An empty store switched to the battle map.
#[must_use]
pub fn battle_store() -> VillageStore {
    let mut store = VillageStore::new(test_data());
    store.set_in_battle_mode(true);
    store
}

/// A battle-mode store holding level-1 buildings at the given anchors.
///
/// # Panics
///
/// Panics if a building cannot be added.
#[must_use]
pub fn battle_store_with(buildings: &[(BuildingKind, i32, i32)]) -> VillageStore {
    let mut store = battle_store();
    for &(kind, x, y) in buildings {
        add_built(&mut store, kind, x, y);
    }
    store
}

/// Add a finished level-1 building to the active data set.
///
/// # Panics
///
/// Panics if the building cannot be added.
pub fn add_built(store: &mut VillageStore, kind: BuildingKind, x: i32, y: i32) -> BuildingId {
    store
        .add_building(kind, 1, x, y, BuildingState::Built, 0, false)
        .unwrap_or_else(|e| panic!("fixture could not add {kind:?} at ({x}, {y}): {e}"))
}

/// Add a closed square wall ring of `radius` cells around `(cx, cy)`.
pub fn add_wall_ring(store: &mut VillageStore, cx: i32, cy: i32, radius: i32) -> Vec<BuildingId> {
    let mut walls = Vec::new();
    for x in cx - radius..=cx + radius {
        for y in cy - radius..=cy + radius {
            if (x - cx).abs().max((y - cy).abs()) == radius {
                walls.push(add_built(store, BuildingKind::Wall, x, y));
            }
        }
    }
    walls
}

/// Town hall behind a full wall ring with a cannon and a gold storage
/// inside.
///
/// The town hall sits at (20, 20); the ring has radius 5 around (22, 22).
#[must_use]
pub fn walled_village() -> VillageStore {
    let mut store = battle_store_with(&[
        (BuildingKind::TownHall, 20, 20),
        (BuildingKind::Cannon, 24, 18),
        (BuildingKind::GoldStorage, 18, 24),
    ]);
    add_wall_ring(&mut store, 22, 22, 5);
    store
}

/// A small open village: town hall, cannon, gold mine and a bomb.
#[must_use]
pub fn open_village() -> VillageStore {
    battle_store_with(&[
        (BuildingKind::TownHall, 20, 20),
        (BuildingKind::Cannon, 14, 20),
        (BuildingKind::GoldMine, 26, 20),
        (BuildingKind::Bomb, 18, 18),
    ])
}

/// A store and a battle running on it.
#[derive(Debug)]
pub struct BattleScenario {
    /// Store holding the battle map and army.
    pub store: VillageStore,
    /// The battle.
    pub battle: BattleController,
}

impl BattleScenario {
    /// Give the attacker an army and start a battle with default settings.
    ///
    /// # Panics
    ///
    /// Panics if the store is not in battle mode.
    #[must_use]
    pub fn start(mut store: VillageStore, army: &[(TroopKind, u32)]) -> Self {
        for &(kind, count) in army {
            store.add_troop(kind, count);
        }
        let battle = BattleController::start(&mut store, BattleConfig::default())
            .unwrap_or_else(|e| panic!("fixture could not start battle: {e}"));
        Self { store, battle }
    }

    /// Deploy a troop.
    ///
    /// # Panics
    ///
    /// Panics if the deployment is rejected.
    pub fn deploy(&mut self, kind: TroopKind, x: i32, y: i32) {
        self.battle
            .deploy_troop(&mut self.store, kind, x, y)
            .unwrap_or_else(|e| panic!("fixture could not deploy {kind:?} at ({x}, {y}): {e}"));
    }

    /// Advance one fixed tick.
    pub fn step(&mut self) -> BattlePhase {
        self.battle.step(&mut self.store)
    }

    /// Step until the battle ends or `max_ticks` pass. Returns ticks run.
    pub fn run(&mut self, max_ticks: u64) -> u64 {
        for tick in 0..max_ticks {
            if self.step() == BattlePhase::Ended {
                return tick + 1;
            }
        }
        max_ticks
    }

    /// Hash of the battle state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        self.battle.state_hash(&self.store)
    }
}

/// Open village attacked by four barbarians and two archers from the west.
#[must_use]
pub fn barbarian_raid() -> BattleScenario {
    let mut scenario = BattleScenario::start(
        open_village(),
        &[(TroopKind::Barbarian, 4), (TroopKind::Archer, 2)],
    );
    for y in [18, 20, 22, 24] {
        scenario.deploy(TroopKind::Barbarian, 4, y);
    }
    scenario.deploy(TroopKind::Archer, 3, 20);
    scenario.deploy(TroopKind::Archer, 3, 22);
    scenario
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walled_village_layout() {
        let store = walled_village();
        assert!(store.is_in_battle_mode());
        assert_eq!(store.count_of(BuildingKind::Wall), 40);
        assert_eq!(store.count_of(BuildingKind::TownHall), 1);
    }

    #[test]
    fn test_barbarian_raid_starts_fighting() {
        let mut raid = barbarian_raid();
        assert_eq!(raid.battle.units().count(), 6);
        assert_eq!(raid.step(), BattlePhase::Fighting);
    }
}
