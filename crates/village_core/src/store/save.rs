//! Village save file.
//!
//! The save captures the ledger, the army and the home village's building
//! list. It is plain JSON so it can be inspected and edited by hand.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{BuildingInstance, Resources, VillageStore};
use crate::data::TroopKind;
use crate::error::{GameError, Result};
use crate::occupancy::BuildingId;

/// Save format version.
pub const SAVE_VERSION: u32 = 1;

/// Everything persisted about the player's village.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveData {
    /// Format version.
    pub version: u32,
    /// Ledger balances.
    pub resources: Resources,
    /// Next id the store will hand out.
    pub next_building_id: BuildingId,
    /// Home village buildings in ascending id order.
    pub buildings: Vec<BuildingInstance>,
    /// Army inventory.
    #[serde(default)]
    pub troops: BTreeMap<TroopKind, u32>,
    /// Troop research levels.
    #[serde(default)]
    pub troop_levels: BTreeMap<TroopKind, u32>,
}

impl SaveData {
    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Parse from JSON, rejecting unknown versions.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if the text is not a save file
    /// or was written by a different format version.
    pub fn from_json(text: &str) -> Result<Self> {
        let save: Self =
            serde_json::from_str(text).map_err(|e| GameError::Serialization(e.to_string()))?;
        if save.version != SAVE_VERSION {
            return Err(GameError::Serialization(format!(
                "Save version mismatch: expected {SAVE_VERSION}, got {}",
                save.version
            )));
        }
        Ok(save)
    }
}

impl VillageStore {
    /// Snapshot the player's state. Always reads the home village, whatever
    /// data set is active.
    #[must_use]
    pub fn to_save_data(&self) -> SaveData {
        SaveData {
            version: SAVE_VERSION,
            resources: self.resources,
            next_building_id: self.next_building_id,
            buildings: self.home.buildings.values().cloned().collect(),
            troops: self.troops.clone(),
            troop_levels: self.troop_levels.clone(),
        }
    }

    /// Replace the player's state with a save.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the save names a building
    /// type missing from the configuration tables. Nothing changes on error.
    pub fn load_save_data(&mut self, save: SaveData) -> Result<()> {
        if let Some(unknown) = save
            .buildings
            .iter()
            .find(|b| self.data.building(b.kind).is_none())
        {
            return Err(GameError::DataParseError {
                source_name: "save".into(),
                message: format!("Unknown building type {:?}", unknown.kind),
            });
        }

        let max_id = save.buildings.iter().map(|b| b.id).max().unwrap_or(0);
        self.next_building_id = save.next_building_id.max(max_id + 1);
        self.resources = save.resources;
        self.troops = save.troops;
        self.troop_levels = save.troop_levels;
        self.home.buildings = save.buildings.into_iter().map(|b| (b.id, b)).collect();
        self.moving = None;

        let data = &self.data;
        let home = &mut self.home;
        home.occupancy.rebuild(super::occupants(data, &home.buildings));
        if !self.in_battle {
            self.pathfinder.update_pathfinding_map(&self.home.occupancy);
        }
        tracing::info!(buildings = self.home.buildings.len(), "Loaded save");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::{BuildingKind, GameData};
    use crate::store::BuildingState;

    #[test]
    fn test_save_round_trip_preserves_every_field() {
        let data = Arc::new(GameData::default());
        let mut store = VillageStore::new(Arc::clone(&data));
        store.add_gold(1234);
        store.add_gem(5);
        store.add_troop(TroopKind::Goblin, 7);
        store.set_troop_level(TroopKind::Goblin, 2);
        let th = store
            .add_building(BuildingKind::TownHall, 2, 20, 20, BuildingState::Built, 0, false)
            .unwrap();
        let cannon = store
            .add_building(BuildingKind::Cannon, 1, 3, 3, BuildingState::Constructing, 777, true)
            .unwrap();
        if let Some(b) = store.get_building_mut(th) {
            b.current_hp = 900;
            b.last_collected = 42;
        }

        let text = store.to_save_data().to_json().unwrap();
        let mut restored = VillageStore::new(data);
        restored.load_save_data(SaveData::from_json(&text).unwrap()).unwrap();

        assert_eq!(restored.to_save_data(), store.to_save_data());
        assert_eq!(restored.get_building(th), store.get_building(th));
        assert_eq!(restored.get_building(cannon).unwrap().finish_time, 777);
        assert!(restored.is_area_occupied(3, 3, 1, 1, None));
        assert_eq!(restored.troop_level(TroopKind::Goblin), 2);
    }

    #[test]
    fn test_rejects_other_versions() {
        let mut save = VillageStore::new(Arc::new(GameData::default())).to_save_data();
        save.version = 99;
        let text = serde_json::to_string(&save).unwrap();
        assert!(matches!(
            SaveData::from_json(&text),
            Err(GameError::Serialization(_))
        ));
        assert!(SaveData::from_json("{").is_err());
    }
}
