//! Destruction percentage and star rating.
//!
//! Walls and traps never count. Stars are awarded once each and never
//! revoked:
//!
//! | Condition | Reason |
//! |---|---|
//! | destruction ≥ 50 % | `"50%"` |
//! | town hall destroyed | `"townhall"` |
//! | destruction = 100 % | `"100%"` |

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};
use crate::store::{BuildingInstance, VillageStore};

/// Why a star was awarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StarReason {
    /// Half of the village destroyed.
    HalfDestroyed,
    /// Town hall destroyed.
    TownHall,
    /// Everything destroyed.
    TotalDestruction,
}

impl StarReason {
    /// Display string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HalfDestroyed => "50%",
            Self::TownHall => "townhall",
            Self::TotalDestruction => "100%",
        }
    }
}

/// A newly awarded star.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarAward {
    /// Star count after this award.
    pub star: u8,
    /// Why.
    pub reason: StarReason,
}

/// Full hit points of a building that counts toward destruction.
pub(crate) fn counted_hit_points(store: &VillageStore, building: &BuildingInstance) -> Option<i64> {
    let config = store.data().building(building.kind)?;
    if !config.category.counts_for_destruction() {
        return None;
    }
    config
        .level(building.level)
        .map(|level| i64::from(level.hit_points))
}

/// Destruction bookkeeping for one battle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DestructionTracker {
    /// Summed hit points of every counted building at battle start.
    pub total_building_hp: i64,
    /// Summed hit points of counted buildings destroyed so far.
    pub destroyed_hp: i64,
    /// Stars earned.
    pub stars: u8,
    /// Whether the town hall has fallen.
    pub town_hall_destroyed: bool,
    /// Last computed destruction percentage (0 to 100).
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
    half_awarded: bool,
    town_hall_awarded: bool,
    total_awarded: bool,
}

impl DestructionTracker {
    /// Tracker for a village with the given counted hit points.
    #[must_use]
    pub fn with_total(total_building_hp: i64) -> Self {
        Self {
            total_building_hp,
            ..Self::default()
        }
    }

    /// Sum the hit points of every standing, counted building on the
    /// active map.
    #[must_use]
    pub fn init_destruction_tracking(store: &VillageStore) -> Self {
        let total: i64 = store
            .buildings()
            .filter(|b| !b.is_destroyed)
            .filter_map(|b| counted_hit_points(store, b))
            .sum();
        tracing::debug!(total_building_hp = total, "Destruction tracking initialised");
        Self::with_total(total)
    }

    /// Record a destroyed counted building and recompute progress.
    pub fn record_destroyed(&mut self, hit_points: i64, is_town_hall: bool) -> Fixed {
        self.destroyed_hp = (self.destroyed_hp + hit_points).min(self.total_building_hp);
        self.town_hall_destroyed |= is_town_hall;
        self.update_destruction_progress()
    }

    /// Destroyed share of counted hit points, 0 to 100.
    pub fn update_destruction_progress(&mut self) -> Fixed {
        self.progress = if self.total_building_hp <= 0 {
            Fixed::ZERO
        } else {
            Fixed::from_num(self.destroyed_hp) * Fixed::from_num(100)
                / Fixed::from_num(self.total_building_hp)
        };
        self.progress
    }

    /// Award every star whose condition now holds for the first time.
    ///
    /// Calling this repeatedly with the same inputs awards nothing new.
    pub fn check_star_conditions(&mut self, progress: Fixed, town_hall_destroyed: bool) -> Vec<StarAward> {
        let mut awards = Vec::new();
        if !self.half_awarded && progress >= Fixed::from_num(50) {
            self.half_awarded = true;
            awards.push(self.award(StarReason::HalfDestroyed));
        }
        if !self.town_hall_awarded && town_hall_destroyed {
            self.town_hall_awarded = true;
            awards.push(self.award(StarReason::TownHall));
        }
        if !self.total_awarded && progress >= Fixed::from_num(100) {
            self.total_awarded = true;
            awards.push(self.award(StarReason::TotalDestruction));
        }
        awards
    }

    fn award(&mut self, reason: StarReason) -> StarAward {
        self.stars += 1;
        tracing::info!(star = self.stars, reason = reason.as_str(), "Star awarded");
        StarAward {
            star: self.stars,
            reason,
        }
    }

    /// Whether every counted building is destroyed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_building_hp > 0 && self.destroyed_hp >= self.total_building_hp
    }
}
