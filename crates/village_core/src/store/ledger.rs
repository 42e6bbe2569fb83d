//! Resource ledger, production and troop inventory.

use serde::{Deserialize, Serialize};

use super::{BuildingState, VillageStore};
use crate::data::{BuildingCategory, BuildingKind, ResourceKind, TroopKind};
use crate::error::{GameError, Result};
use crate::events::GameEvent;
use crate::occupancy::BuildingId;

/// An amount of each currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Resources {
    /// Gold.
    pub gold: u64,
    /// Elixir.
    pub elixir: u64,
    /// Gems.
    #[serde(default)]
    pub gem: u64,
}

impl Resources {
    /// Gold and elixir only.
    #[must_use]
    pub const fn new(gold: u64, elixir: u64) -> Self {
        Self {
            gold,
            elixir,
            gem: 0,
        }
    }

    /// Amount of one currency.
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Gold => self.gold,
            ResourceKind::Elixir => self.elixir,
            ResourceKind::Gem => self.gem,
        }
    }

    fn slot(&mut self, kind: ResourceKind) -> &mut u64 {
        match kind {
            ResourceKind::Gold => &mut self.gold,
            ResourceKind::Elixir => &mut self.elixir,
            ResourceKind::Gem => &mut self.gem,
        }
    }

    /// Component-wise saturating sum.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self {
            gold: self.gold.saturating_add(other.gold),
            elixir: self.elixir.saturating_add(other.elixir),
            gem: self.gem.saturating_add(other.gem),
        }
    }

    /// Whether every component is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.gold == 0 && self.elixir == 0 && self.gem == 0
    }
}

impl VillageStore {
    // ------------------------------------------------------------------
    // Ledger
    // ------------------------------------------------------------------

    /// Current balance of one currency.
    #[must_use]
    pub const fn resource(&self, kind: ResourceKind) -> u64 {
        self.resources.get(kind)
    }

    /// All balances.
    #[must_use]
    pub const fn resources(&self) -> Resources {
        self.resources
    }

    /// Current gold.
    #[must_use]
    pub const fn gold(&self) -> u64 {
        self.resources.gold
    }

    /// Current elixir.
    #[must_use]
    pub const fn elixir(&self) -> u64 {
        self.resources.elixir
    }

    /// Current gems.
    #[must_use]
    pub const fn gem(&self) -> u64 {
        self.resources.gem
    }

    /// Credit a currency and notify subscribers.
    pub fn add_resource(&mut self, kind: ResourceKind, amount: u64) {
        let slot = self.resources.slot(kind);
        *slot = slot.saturating_add(amount);
        let balance = *slot;
        self.emit(GameEvent::ResourceChanged {
            resource: kind,
            balance,
        });
    }

    /// Debit a currency. All or nothing: on insufficient balance nothing
    /// changes, no event fires and `false` is returned.
    pub fn spend_resource(&mut self, kind: ResourceKind, amount: u64) -> bool {
        self.try_spend(kind, amount).is_ok()
    }

    pub(crate) fn try_spend(&mut self, kind: ResourceKind, amount: u64) -> Result<()> {
        let available = self.resources.get(kind);
        if available < amount {
            tracing::warn!(?kind, amount, available, "Insufficient resources");
            return Err(GameError::InsufficientResources {
                resource: format!("{kind:?}"),
                required: amount,
                available,
            });
        }
        let slot = self.resources.slot(kind);
        *slot -= amount;
        let balance = *slot;
        self.emit(GameEvent::ResourceChanged {
            resource: kind,
            balance,
        });
        Ok(())
    }

    /// Credit gold.
    pub fn add_gold(&mut self, amount: u64) {
        self.add_resource(ResourceKind::Gold, amount);
    }

    /// Debit gold; see [`spend_resource`](Self::spend_resource).
    pub fn spend_gold(&mut self, amount: u64) -> bool {
        self.spend_resource(ResourceKind::Gold, amount)
    }

    /// Credit elixir.
    pub fn add_elixir(&mut self, amount: u64) {
        self.add_resource(ResourceKind::Elixir, amount);
    }

    /// Debit elixir; see [`spend_resource`](Self::spend_resource).
    pub fn spend_elixir(&mut self, amount: u64) -> bool {
        self.spend_resource(ResourceKind::Elixir, amount)
    }

    /// Credit gems.
    pub fn add_gem(&mut self, amount: u64) {
        self.add_resource(ResourceKind::Gem, amount);
    }

    /// Debit gems; see [`spend_resource`](Self::spend_resource).
    pub fn spend_gem(&mut self, amount: u64) -> bool {
        self.spend_resource(ResourceKind::Gem, amount)
    }

    // ------------------------------------------------------------------
    // Production
    // ------------------------------------------------------------------

    /// Storage capacity of the home village for one currency.
    ///
    /// Sums the capacity of operational storages and the town hall. Gems
    /// are unbounded.
    #[must_use]
    pub fn storage_capacity(&self, kind: ResourceKind) -> u64 {
        if kind == ResourceKind::Gem {
            return u64::MAX;
        }
        self.home
            .buildings
            .values()
            .filter(|b| b.is_operational())
            .filter_map(|b| {
                let config = self.data.building(b.kind)?;
                let holds = config.stores == Some(kind) || config.category == BuildingCategory::TownHall;
                holds.then(|| config.level(b.level).map_or(0, |l| l.capacity))
            })
            .sum()
    }

    /// Collect what a mine or collector produced since the last collection.
    ///
    /// Production accrues at the level's hourly rate up to the building's own
    /// capacity. Only what fits in storage is credited; the rest stays in the
    /// building. Returns the amount credited.
    pub fn collect_resources(&mut self, id: BuildingId, now: u64) -> u64 {
        let Some(building) = self.get_building(id) else {
            tracing::warn!(id, "Cannot collect: building not found");
            return 0;
        };
        if building.state != BuildingState::Built || building.is_destroyed {
            return 0;
        }
        let Some(config) = self.data.building(building.kind) else {
            return 0;
        };
        let (Some(kind), Some(stats)) = (config.produces, config.level(building.level)) else {
            return 0;
        };
        if stats.production_rate == 0 {
            return 0;
        }

        let rate = stats.production_rate;
        let elapsed = now.saturating_sub(building.last_collected);
        let produced = (elapsed.saturating_mul(rate) / 3600).min(stats.capacity);
        let room = self.storage_capacity(kind).saturating_sub(self.resource(kind));
        let credited = produced.min(room);
        if credited == 0 {
            return 0;
        }

        // Advance the clock only by the time that paid for what was credited.
        let last = building.last_collected;
        let advanced = if credited == produced {
            now
        } else {
            last + credited * 3600 / rate
        };
        if let Some(building) = self.get_building_mut(id) {
            building.last_collected = advanced;
        }
        self.add_resource(kind, credited);
        tracing::debug!(id, ?kind, credited, "Collected resources");
        credited
    }

    // ------------------------------------------------------------------
    // Troops
    // ------------------------------------------------------------------

    /// Troops of one kind in the army.
    #[must_use]
    pub fn troop_count(&self, kind: TroopKind) -> u32 {
        self.troops.get(&kind).copied().unwrap_or(0)
    }

    /// Total troops in the army.
    #[must_use]
    pub fn total_troops(&self) -> u32 {
        self.troops.values().fold(0, |total, &n| total.saturating_add(n))
    }

    /// Add troops to the army without checking capacity.
    pub fn add_troop(&mut self, kind: TroopKind, count: u32) {
        let held = self.troops.entry(kind).or_insert(0);
        *held = held.saturating_add(count);
    }

    /// Remove troops from the army. Fails without change if fewer than
    /// `count` are available.
    pub fn remove_troop(&mut self, kind: TroopKind, count: u32) -> bool {
        let available = self.troop_count(kind);
        if available < count {
            return false;
        }
        if available == count {
            self.troops.remove(&kind);
        } else {
            self.troops.insert(kind, available - count);
        }
        true
    }

    /// Housing space offered by operational army camps in the home village.
    #[must_use]
    pub fn troop_capacity(&self) -> u32 {
        self.home
            .buildings
            .values()
            .filter(|b| b.kind == BuildingKind::ArmyCamp && b.is_operational())
            .filter_map(|b| self.data.building_level(b.kind, b.level))
            .map(|level| level.capacity as u32)
            .sum()
    }

    /// Housing space taken by the current army.
    #[must_use]
    pub fn housing_used(&self) -> u32 {
        self.troops
            .iter()
            .map(|(kind, count)| {
                self.data
                    .troop(*kind)
                    .map_or(0, |troop| troop.housing_space * count)
            })
            .sum()
    }

    /// Train one troop: checks housing space, spends elixir and adds it to
    /// the army.
    ///
    /// # Errors
    ///
    /// [`GameError::UnknownTroopType`], [`GameError::InvalidState`] when the
    /// camps are full, or [`GameError::InsufficientResources`].
    pub fn train_troop(&mut self, kind: TroopKind) -> Result<()> {
        let troop = self.data.troop(kind).ok_or(GameError::UnknownTroopType(kind))?;
        let (space, cost) = (troop.housing_space, troop.training_cost);
        if self.housing_used() + space > self.troop_capacity() {
            return Err(GameError::InvalidState("Army camps are full".into()));
        }
        self.try_spend(ResourceKind::Elixir, cost)?;
        self.add_troop(kind, 1);
        Ok(())
    }

    /// The whole army.
    pub fn army(&self) -> impl Iterator<Item = (TroopKind, u32)> + '_ {
        self.troops.iter().map(|(kind, count)| (*kind, *count))
    }

    /// Research level of a troop kind (1 if never set).
    #[must_use]
    pub fn troop_level(&self, kind: TroopKind) -> u32 {
        self.troop_levels.get(&kind).copied().unwrap_or(1)
    }

    /// Set the research level of a troop kind.
    pub fn set_troop_level(&mut self, kind: TroopKind, level: u32) {
        self.troop_levels.insert(kind, level.max(1));
    }
}
