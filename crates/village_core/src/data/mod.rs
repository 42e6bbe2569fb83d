//! Static configuration tables for buildings, troops and town-hall limits.
//!
//! This module contains pure data structures. [`GameData`] can be built from
//! the compiled-in defaults or deserialized from RON text; either way it is
//! validated once and then shared read-only (behind an `Arc`) by the store,
//! the battle controller and the map generator.
//!
//! **Note:** This module does no file IO. Callers read the RON text and hand
//! it to [`GameData::from_ron`].

mod building_data;
mod troop_data;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use building_data::{BuildingCategory, BuildingData, BuildingKind, BuildingLevel, ResourceKind};
pub use troop_data::{TargetPreference, TroopData, TroopKind, TroopLevel};

use crate::error::{GameError, Result};

/// Building limits unlocked by one town-hall level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownHallLimits {
    /// Town-hall level these limits apply to.
    pub level: u32,
    /// Maximum count per building kind; kinds absent here are locked.
    pub max_counts: BTreeMap<BuildingKind, u32>,
    /// Number of wall segments unlocked.
    pub max_walls: u32,
    /// Highest level any non-town-hall building may reach.
    pub max_building_level: u32,
}

impl TownHallLimits {
    /// Maximum number of buildings of `kind` at this town-hall level.
    #[must_use]
    pub fn max_count(&self, kind: BuildingKind) -> u32 {
        match kind {
            BuildingKind::TownHall => 1,
            BuildingKind::Wall => self.max_walls,
            other => self.max_counts.get(&other).copied().unwrap_or(0),
        }
    }

    /// Whether `kind` is available at this town-hall level.
    #[must_use]
    pub fn is_unlocked(&self, kind: BuildingKind) -> bool {
        self.max_count(kind) > 0
    }
}

/// Complete set of static game data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameData {
    /// Building definitions.
    pub buildings: Vec<BuildingData>,
    /// Troop definitions.
    pub troops: Vec<TroopData>,
    /// Town-hall unlock limits, one entry per level.
    pub town_hall_limits: Vec<TownHallLimits>,
}

impl Default for GameData {
    fn default() -> Self {
        Self {
            buildings: building_data::default_buildings(),
            troops: troop_data::default_troops(),
            town_hall_limits: default_town_hall_limits(),
        }
    }
}

impl GameData {
    /// Parse and validate game data from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the text is not valid RON for
    /// [`GameData`] or fails validation.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        let data: Self = ron::from_str(text).map_err(|e| GameError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;

        let errors = data.validate();
        if !errors.is_empty() {
            return Err(GameError::DataParseError {
                source_name: source_name.to_string(),
                message: errors.join("; "),
            });
        }

        tracing::info!(
            source = source_name,
            buildings = data.buildings.len(),
            troops = data.troops.len(),
            "Loaded game data"
        );
        Ok(data)
    }

    /// Check data integrity. Returns one message per problem found.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (index, building) in self.buildings.iter().enumerate() {
            if self.buildings[..index].iter().any(|b| b.kind == building.kind) {
                errors.push(format!("Duplicate building entry {:?}", building.kind));
            }
            building.validate(&mut errors);
        }

        for (index, troop) in self.troops.iter().enumerate() {
            if self.troops[..index].iter().any(|t| t.kind == troop.kind) {
                errors.push(format!("Duplicate troop entry {:?}", troop.kind));
            }
            troop.validate(&mut errors);
        }

        for limits in &self.town_hall_limits {
            for kind in limits.max_counts.keys() {
                if self.building(*kind).is_none() {
                    errors.push(format!(
                        "Town hall {} unlocks {:?} which has no building data",
                        limits.level, kind
                    ));
                }
            }
        }

        errors
    }

    /// Look up a building definition.
    #[must_use]
    pub fn building(&self, kind: BuildingKind) -> Option<&BuildingData> {
        self.buildings.iter().find(|b| b.kind == kind)
    }

    /// Look up the stats of a building at a level.
    #[must_use]
    pub fn building_level(&self, kind: BuildingKind, level: u32) -> Option<&BuildingLevel> {
        self.building(kind).and_then(|b| b.level(level))
    }

    /// Look up a troop definition.
    #[must_use]
    pub fn troop(&self, kind: TroopKind) -> Option<&TroopData> {
        self.troops.iter().find(|t| t.kind == kind)
    }

    /// Limits for a town-hall level, clamped to the highest defined level.
    #[must_use]
    pub fn town_hall_limits(&self, level: u32) -> Option<&TownHallLimits> {
        self.town_hall_limits
            .iter()
            .filter(|limits| limits.level <= level.max(1))
            .max_by_key(|limits| limits.level)
    }
}

fn default_town_hall_limits() -> Vec<TownHallLimits> {
    use BuildingKind as K;

    let limits = |level, max_walls, max_building_level, counts: &[(BuildingKind, u32)]| {
        TownHallLimits {
            level,
            max_counts: counts.iter().copied().collect(),
            max_walls,
            max_building_level,
        }
    };

    vec![
        limits(
            1,
            0,
            1,
            &[
                (K::GoldMine, 1),
                (K::ElixirCollector, 1),
                (K::GoldStorage, 1),
                (K::ElixirStorage, 1),
                (K::ArmyCamp, 1),
                (K::Barracks, 1),
                (K::BuilderHut, 2),
                (K::Cannon, 2),
            ],
        ),
        limits(
            2,
            50,
            2,
            &[
                (K::GoldMine, 2),
                (K::ElixirCollector, 2),
                (K::GoldStorage, 1),
                (K::ElixirStorage, 1),
                (K::ArmyCamp, 1),
                (K::Barracks, 1),
                (K::BuilderHut, 2),
                (K::Cannon, 2),
                (K::ArcherTower, 1),
                (K::Bomb, 1),
            ],
        ),
        limits(
            3,
            75,
            3,
            &[
                (K::GoldMine, 3),
                (K::ElixirCollector, 3),
                (K::GoldStorage, 2),
                (K::ElixirStorage, 2),
                (K::ArmyCamp, 2),
                (K::Barracks, 2),
                (K::BuilderHut, 3),
                (K::Cannon, 2),
                (K::ArcherTower, 1),
                (K::Mortar, 1),
                (K::Bomb, 2),
                (K::GiantBomb, 1),
            ],
        ),
    ]
}
