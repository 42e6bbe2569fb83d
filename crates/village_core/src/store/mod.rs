//! Village and battle data store.
//!
//! [`VillageStore`] is the single owner of mutable game state: the building
//! tables, the resource ledger, the troop inventory, the event bus and the
//! pathfinder. It keeps two building tables, the player's home village and
//! the battle map being attacked, and every building query or mutation
//! operates on whichever one [`set_in_battle_mode`](VillageStore::set_in_battle_mode)
//! selected. The ledger and the army belong to the player and are shared
//! by both.
//!
//! Building ids come from one monotonic counter across both tables, so an
//! id never refers to two buildings.
//!
//! Time is passed in explicitly as epoch seconds (`now`); the store never
//! reads a clock.

mod instance;
mod ledger;
mod placement;
mod save;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use instance::{BuildingInstance, BuildingState};
pub use ledger::Resources;
pub use placement::MoveSession;
pub use save::{SaveData, SAVE_VERSION};

use crate::data::{BuildingCategory, BuildingData, BuildingKind, GameData, TroopKind};
use crate::error::{GameError, Result};
use crate::events::{EventBus, GameEvent};
use crate::grid::{Footprint, IsoGrid};
use crate::math::Fixed;
use crate::occupancy::{BuildingId, Occupant, OccupancyTable};
use crate::pathfinding::Pathfinder;

/// Buildings of one village plus their occupancy.
#[derive(Debug, Clone)]
struct DataSet {
    buildings: BTreeMap<BuildingId, BuildingInstance>,
    occupancy: OccupancyTable,
}

impl DataSet {
    fn new(grid: &IsoGrid) -> Self {
        Self {
            buildings: BTreeMap::new(),
            occupancy: OccupancyTable::new(grid.width(), grid.height()),
        }
    }
}

/// Authoritative game state.
#[derive(Debug)]
pub struct VillageStore {
    data: Arc<GameData>,
    grid: IsoGrid,
    home: DataSet,
    battle: DataSet,
    in_battle: bool,
    next_building_id: BuildingId,
    resources: Resources,
    troops: BTreeMap<TroopKind, u32>,
    troop_levels: BTreeMap<TroopKind, u32>,
    pathfinder: Pathfinder,
    events: EventBus,
    moving: Option<MoveSession>,
}

impl VillageStore {
    /// Create an empty store on the default 44×44 map.
    #[must_use]
    pub fn new(data: Arc<GameData>) -> Self {
        Self::with_grid(data, IsoGrid::default())
    }

    /// Create an empty store on a custom map.
    #[must_use]
    pub fn with_grid(data: Arc<GameData>, grid: IsoGrid) -> Self {
        Self {
            data,
            grid,
            home: DataSet::new(&grid),
            battle: DataSet::new(&grid),
            in_battle: false,
            next_building_id: 1,
            resources: Resources::default(),
            troops: BTreeMap::new(),
            troop_levels: BTreeMap::new(),
            pathfinder: Pathfinder::new(grid),
            events: EventBus::new(),
            moving: None,
        }
    }

    /// Static configuration tables.
    #[must_use]
    pub fn data(&self) -> &GameData {
        &self.data
    }

    /// Shared handle to the configuration tables.
    #[must_use]
    pub fn data_handle(&self) -> Arc<GameData> {
        Arc::clone(&self.data)
    }

    /// Map projection and bounds.
    #[must_use]
    pub const fn grid(&self) -> &IsoGrid {
        &self.grid
    }

    /// Event bus, read-only.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Event bus carrying notifications to presentation code.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Take every queued event. Events queue until drained unless queueing
    /// is turned off on [`events_mut`](Self::events_mut).
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain()
    }

    pub(crate) fn emit(&mut self, event: GameEvent) {
        self.events.emit(event);
    }

    /// Pathfinder mirroring the active data set.
    #[must_use]
    pub const fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    pub(crate) fn pathfinder_mut(&mut self) -> &mut Pathfinder {
        &mut self.pathfinder
    }

    // ------------------------------------------------------------------
    // Data set selection
    // ------------------------------------------------------------------

    /// Whether the battle map is the active data set.
    #[must_use]
    pub const fn is_in_battle_mode(&self) -> bool {
        self.in_battle
    }

    /// Select the active data set. Any move in progress is cancelled.
    pub fn set_in_battle_mode(&mut self, in_battle: bool) {
        if self.in_battle == in_battle {
            return;
        }
        self.cancel_move();
        self.in_battle = in_battle;
        let set = if self.in_battle { &self.battle } else { &self.home };
        self.pathfinder.update_pathfinding_map(&set.occupancy);
        tracing::info!(in_battle, "Switched data set");
    }

    const fn active(&self) -> &DataSet {
        if self.in_battle {
            &self.battle
        } else {
            &self.home
        }
    }

    fn active_mut(&mut self) -> &mut DataSet {
        if self.in_battle {
            &mut self.battle
        } else {
            &mut self.home
        }
    }

    /// Replace the battle map with the given buildings, keeping their ids.
    ///
    /// The id counter moves past the highest id loaded.
    pub fn load_battle_map<I>(&mut self, buildings: I)
    where
        I: IntoIterator<Item = BuildingInstance>,
    {
        self.battle.buildings = buildings.into_iter().map(|b| (b.id, b)).collect();
        if let Some(&max_id) = self.battle.buildings.keys().next_back() {
            self.next_building_id = self.next_building_id.max(max_id + 1);
        }
        self.rebuild_battle_occupancy();
        tracing::info!(buildings = self.battle.buildings.len(), "Loaded battle map");
    }

    /// Remove every building from the battle map.
    pub fn clear_battle_map(&mut self) {
        self.battle.buildings.clear();
        self.rebuild_battle_occupancy();
    }

    fn rebuild_battle_occupancy(&mut self) {
        let data = &self.data;
        let set = &mut self.battle;
        set.occupancy.rebuild(occupants(data, &set.buildings));
        if self.in_battle {
            self.pathfinder.update_pathfinding_map(&self.battle.occupancy);
        }
    }

    // ------------------------------------------------------------------
    // Building queries
    // ------------------------------------------------------------------

    /// Configuration for a building type.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnknownBuildingType`] if the tables have no entry.
    pub fn building_config(&self, kind: BuildingKind) -> Result<&BuildingData> {
        self.data
            .building(kind)
            .ok_or(GameError::UnknownBuildingType(kind))
    }

    /// Look up a building in the active data set.
    #[must_use]
    pub fn get_building(&self, id: BuildingId) -> Option<&BuildingInstance> {
        self.active().buildings.get(&id)
    }

    pub(crate) fn get_building_mut(&mut self, id: BuildingId) -> Option<&mut BuildingInstance> {
        self.active_mut().buildings.get_mut(&id)
    }

    /// Every building of the active data set, in ascending id order.
    pub fn buildings(&self) -> impl Iterator<Item = &BuildingInstance> {
        self.active().buildings.values()
    }

    /// Number of buildings in the active data set.
    #[must_use]
    pub fn building_count(&self) -> usize {
        self.active().buildings.len()
    }

    /// Cells covered by a building of the active data set.
    #[must_use]
    pub fn footprint_of(&self, id: BuildingId) -> Option<Footprint> {
        let building = self.get_building(id)?;
        let config = self.data.building(building.kind)?;
        Some(building.footprint(config))
    }

    /// Occupancy of the active data set.
    #[must_use]
    pub fn occupancy(&self) -> &OccupancyTable {
        &self.active().occupancy
    }

    /// True iff the rectangle leaves the map or overlaps a building other
    /// than `ignore` in the active data set.
    #[must_use]
    pub fn is_area_occupied(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        ignore: Option<BuildingId>,
    ) -> bool {
        self.active()
            .occupancy
            .is_area_occupied(x, y, width, height, ignore)
    }

    /// Whether a building of `kind` may be anchored at `(x, y)`.
    #[must_use]
    pub fn can_place(&self, kind: BuildingKind, x: i32, y: i32, ignore: Option<BuildingId>) -> bool {
        self.data
            .building(kind)
            .is_some_and(|config| !self.is_area_occupied(x, y, config.width, config.height, ignore))
    }

    /// Level of the home village's town hall, 0 if there is none.
    #[must_use]
    pub fn town_hall_level(&self) -> u32 {
        self.home
            .buildings
            .values()
            .filter(|b| b.kind == BuildingKind::TownHall && b.state != BuildingState::Placing)
            .map(|b| b.level)
            .max()
            .unwrap_or(0)
    }

    /// Number of non-destroyed buildings of `kind` in the active data set.
    #[must_use]
    pub fn count_of(&self, kind: BuildingKind) -> u32 {
        self.buildings()
            .filter(|b| b.kind == kind && !b.is_destroyed)
            .count() as u32
    }

    /// Rebuild the active data set's occupancy and refresh the pathfinder.
    ///
    /// `Placing` buildings are skipped. Destroyed buildings no longer occupy
    /// their cells, so rubble is walkable and can be built over.
    pub fn update_occupancy(&mut self) {
        let data = &self.data;
        let set = if self.in_battle {
            &mut self.battle
        } else {
            &mut self.home
        };
        set.occupancy.rebuild(occupants(data, &set.buildings));
        self.pathfinder.update_pathfinding_map(&set.occupancy);
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Add a building to the active data set and return its fresh id.
    ///
    /// Placement legality is not checked here; callers check with
    /// [`is_area_occupied`](Self::is_area_occupied) first.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnknownBuildingType`] if the type has no
    /// configuration and [`GameError::InvalidState`] if it has no such level.
    /// Nothing is added on error.
    #[allow(clippy::too_many_arguments)]
    pub fn add_building(
        &mut self,
        kind: BuildingKind,
        level: u32,
        grid_x: i32,
        grid_y: i32,
        state: BuildingState,
        finish_time: u64,
        is_initial_construction: bool,
    ) -> Result<BuildingId> {
        let config = self.building_config(kind)?;
        let stats = config.level(level).ok_or_else(|| {
            GameError::InvalidState(format!("{kind:?} has no level {level}"))
        })?;
        let current_hp = stats.hit_points;

        let id = self.next_building_id;
        self.next_building_id += 1;

        let building = BuildingInstance {
            id,
            kind,
            level,
            grid_x,
            grid_y,
            state,
            finish_time,
            is_initial_construction,
            current_hp,
            is_destroyed: false,
            last_collected: 0,
            lootable: Resources::default(),
        };
        self.active_mut().buildings.insert(id, building);

        tracing::debug!(id, ?kind, level, grid_x, grid_y, ?state, "Added building");
        if state == BuildingState::Placing {
            self.emit(GameEvent::BuildingPlaced { id, kind });
        } else {
            self.update_occupancy();
        }
        Ok(id)
    }

    /// Buy a new building: checks town-hall limits and placement, spends the
    /// level-1 cost and starts construction.
    ///
    /// # Errors
    ///
    /// Fails with [`GameError::InvalidState`] when the town hall does not
    /// allow another one, [`GameError::InvalidPlacement`] when the footprint
    /// is blocked and [`GameError::InsufficientResources`] when the player
    /// cannot pay. Nothing changes on error.
    pub fn purchase_building(
        &mut self,
        kind: BuildingKind,
        grid_x: i32,
        grid_y: i32,
        now: u64,
    ) -> Result<BuildingId> {
        let config = self.building_config(kind)?;
        let cost = config.level(1).map_or(0, |level| level.build_cost);
        let currency = config.build_resource;

        let limits = self.data.town_hall_limits(self.town_hall_level());
        let max_count = limits.map_or(0, |l| l.max_count(kind));
        if self.count_of(kind) >= max_count {
            tracing::warn!(?kind, max_count, "Building limit reached");
            return Err(GameError::InvalidState(format!(
                "Town hall allows at most {max_count} {kind:?}"
            )));
        }
        if !self.can_place(kind, grid_x, grid_y, None) {
            tracing::warn!(?kind, grid_x, grid_y, "Invalid placement");
            return Err(GameError::InvalidPlacement {
                x: grid_x,
                y: grid_y,
            });
        }
        self.try_spend(currency, cost)?;

        let id = self.add_building(kind, 1, grid_x, grid_y, BuildingState::Placing, 0, true)?;
        self.start_construction_after_placement(id, now);
        Ok(id)
    }

    /// Confirm a placed building: `Placing → Constructing`, or straight to
    /// `Built` when the level has no build time.
    ///
    /// Returns `false` if the building is missing or not being placed.
    pub fn start_construction_after_placement(&mut self, id: BuildingId, now: u64) -> bool {
        let data = Arc::clone(&self.data);
        let Some(building) = self.get_building_mut(id) else {
            tracing::warn!(id, "Cannot start construction: building not found");
            return false;
        };
        if building.state != BuildingState::Placing {
            tracing::warn!(id, state = ?building.state, "Cannot start construction: not placing");
            return false;
        }
        let build_time = data
            .building_level(building.kind, building.level)
            .map_or(0, |level| level.build_time);

        let event = if build_time == 0 {
            building.state = BuildingState::Built;
            building.finish_time = 0;
            building.is_initial_construction = false;
            building.last_collected = now;
            GameEvent::ConstructionFinished {
                id,
                level: building.level,
            }
        } else {
            building.state = BuildingState::Constructing;
            building.finish_time = now + build_time;
            building.is_initial_construction = true;
            GameEvent::ConstructionStarted {
                id,
                finish_time: building.finish_time,
            }
        };

        self.update_occupancy();
        self.emit(event);
        true
    }

    /// Complete a first construction: `Constructing → Built`.
    ///
    /// No-op returning `false` unless the building is under initial
    /// construction.
    pub fn finish_new_building_construction(&mut self, id: BuildingId) -> bool {
        let Some(building) = self.get_building_mut(id) else {
            return false;
        };
        if building.state != BuildingState::Constructing || !building.is_initial_construction {
            return false;
        }
        let collected_from = building.finish_time;
        building.state = BuildingState::Built;
        building.finish_time = 0;
        building.is_initial_construction = false;
        building.last_collected = collected_from;
        let level = building.level;

        tracing::info!(id, level, "Construction finished");
        self.emit(GameEvent::ConstructionFinished { id, level });
        true
    }

    /// Complete an upgrade: `Constructing → Built` at level + 1, healed to
    /// the new level's hit points.
    ///
    /// No-op returning `false` unless an upgrade is in progress.
    pub fn finish_upgrade_building(&mut self, id: BuildingId) -> bool {
        let data = Arc::clone(&self.data);
        let Some(building) = self.get_building_mut(id) else {
            return false;
        };
        if building.state != BuildingState::Constructing || building.is_initial_construction {
            return false;
        }
        let next = building.level + 1;
        let Some(stats) = data.building_level(building.kind, next) else {
            tracing::warn!(id, level = next, "Upgrade target level missing");
            return false;
        };
        building.level = next;
        building.current_hp = stats.hit_points;
        building.state = BuildingState::Built;
        building.finish_time = 0;

        tracing::info!(id, level = next, "Upgrade finished");
        self.emit(GameEvent::ConstructionFinished { id, level: next });
        true
    }

    /// Begin upgrading a built building to the next level.
    ///
    /// The next level's cost is spent up front. Levels without build time
    /// (walls) complete immediately.
    ///
    /// # Errors
    ///
    /// [`GameError::BuildingNotFound`] for a bad id, [`GameError::InvalidState`]
    /// when the building is not `Built`, is at max level or the town hall is
    /// too low, [`GameError::InsufficientResources`] when the player cannot pay.
    pub fn start_upgrade(&mut self, id: BuildingId, now: u64) -> Result<()> {
        let building = self
            .get_building(id)
            .ok_or(GameError::BuildingNotFound(id))?;
        let (kind, level, state) = (building.kind, building.level, building.state);
        if state != BuildingState::Built {
            return Err(GameError::InvalidState(format!(
                "Building {id} cannot upgrade while {state:?}"
            )));
        }

        let config = self.building_config(kind)?;
        let next = level + 1;
        let stats = config.level(next).ok_or_else(|| {
            GameError::InvalidState(format!("Building {id} is at max level"))
        })?;
        let (cost, build_time, currency) = (stats.build_cost, stats.build_time, config.build_resource);

        if kind != BuildingKind::TownHall {
            let allowed = self
                .data
                .town_hall_limits(self.town_hall_level())
                .map_or(1, |l| l.max_building_level);
            if next > allowed {
                return Err(GameError::InvalidState(format!(
                    "Town hall allows level {allowed} at most"
                )));
            }
        }

        self.try_spend(currency, cost)?;

        if let Some(building) = self.get_building_mut(id) {
            building.state = BuildingState::Constructing;
            building.is_initial_construction = false;
            building.finish_time = now + build_time;
        }
        if build_time == 0 {
            self.finish_upgrade_building(id);
        } else {
            self.emit(GameEvent::ConstructionStarted {
                id,
                finish_time: now + build_time,
            });
        }
        Ok(())
    }

    /// Complete every timer in the active data set that elapsed by `now`.
    ///
    /// Returns the ids of the buildings that finished, in ascending order.
    pub fn update_construction(&mut self, now: u64) -> Vec<BuildingId> {
        let due: Vec<(BuildingId, bool)> = self
            .buildings()
            .filter(|b| b.state == BuildingState::Constructing && b.finish_time <= now)
            .map(|b| (b.id, b.is_initial_construction))
            .collect();

        due.into_iter()
            .filter(|&(id, initial)| {
                if initial {
                    self.finish_new_building_construction(id)
                } else {
                    self.finish_upgrade_building(id)
                }
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Construction progress from 0 to 1. `Built` buildings report 1 and
    /// `Placing` buildings 0.
    #[must_use]
    pub fn construction_progress(&self, id: BuildingId, now: u64) -> Option<Fixed> {
        let building = self.get_building(id)?;
        match building.state {
            BuildingState::Placing => Some(Fixed::ZERO),
            BuildingState::Built => Some(Fixed::ONE),
            BuildingState::Constructing => {
                let target_level = if building.is_initial_construction {
                    building.level
                } else {
                    building.level + 1
                };
                let total = self
                    .data
                    .building_level(building.kind, target_level)
                    .map_or(0, |level| level.build_time);
                if total == 0 {
                    return Some(Fixed::ONE);
                }
                let remaining = building.finish_time.saturating_sub(now).min(total);
                let done = Fixed::from_num(total - remaining) / Fixed::from_num(total);
                Some(done)
            }
        }
    }

    /// Seconds until the pending timer elapses; 0 when none is running.
    #[must_use]
    pub fn remaining_seconds(&self, id: BuildingId, now: u64) -> Option<u64> {
        let building = self.get_building(id)?;
        Some(match building.state {
            BuildingState::Constructing => building.finish_time.saturating_sub(now),
            _ => 0,
        })
    }

    /// Discard a building that was never confirmed.
    ///
    /// Returns `false` if the building is missing or already confirmed.
    pub fn cancel_placement(&mut self, id: BuildingId) -> bool {
        if self.get_building(id).map(|b| b.state) != Some(BuildingState::Placing) {
            return false;
        }
        if self.moving.is_some_and(|session| session.id == id) {
            self.moving = None;
        }
        self.active_mut().buildings.remove(&id);
        self.emit(GameEvent::BuildingRemoved { id });
        true
    }

    /// Remove a building from the active data set.
    pub fn remove_building(&mut self, id: BuildingId) -> Option<BuildingInstance> {
        let removed = self.active_mut().buildings.remove(&id)?;
        if self.moving.is_some_and(|session| session.id == id) {
            self.moving = None;
        }
        self.update_occupancy();
        self.emit(GameEvent::BuildingRemoved { id });
        Some(removed)
    }

    /// Whether a building counts as a wall for combat decisions.
    #[must_use]
    pub fn is_wall(&self, id: BuildingId) -> bool {
        self.get_building(id)
            .and_then(|b| self.data.building(b.kind))
            .is_some_and(|config| config.category == BuildingCategory::Wall)
    }
}

fn occupants<'a>(
    data: &'a GameData,
    buildings: &'a BTreeMap<BuildingId, BuildingInstance>,
) -> impl Iterator<Item = Occupant> + 'a {
    buildings
        .values()
        .filter(|b| b.state != BuildingState::Placing && !b.is_destroyed)
        .filter_map(move |b| {
            let config = data.building(b.kind)?;
            Some(Occupant {
                id: b.id,
                footprint: b.footprint(config),
                passable: config.is_passable(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VillageStore {
        VillageStore::new(Arc::new(GameData::default()))
    }

    fn built(store: &mut VillageStore, kind: BuildingKind, level: u32, x: i32, y: i32) -> BuildingId {
        store
            .add_building(kind, level, x, y, BuildingState::Built, 0, false)
            .unwrap()
    }

    #[test]
    fn test_ids_are_monotonic_across_data_sets() {
        let mut store = store();
        let a = built(&mut store, BuildingKind::Cannon, 1, 0, 0);
        store.set_in_battle_mode(true);
        let b = built(&mut store, BuildingKind::Cannon, 1, 0, 0);
        store.set_in_battle_mode(false);
        let c = built(&mut store, BuildingKind::Cannon, 1, 5, 5);

        assert!(a < b && b < c);
        assert!(store.get_building(b).is_none());
        assert!(store.get_building(a).is_some());
    }

    #[test]
    fn test_add_building_unknown_level() {
        let mut store = store();
        let err = store
            .add_building(BuildingKind::Cannon, 9, 0, 0, BuildingState::Built, 0, false)
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
        assert_eq!(store.building_count(), 0);
    }

    #[test]
    fn test_placing_buildings_do_not_occupy() {
        let mut store = store();
        let id = store
            .add_building(BuildingKind::Cannon, 1, 4, 4, BuildingState::Placing, 0, true)
            .unwrap();
        assert!(!store.is_area_occupied(4, 4, 3, 3, None));

        assert!(store.start_construction_after_placement(id, 1000));
        assert!(store.is_area_occupied(4, 4, 3, 3, None));
        assert!(!store.is_area_occupied(4, 4, 3, 3, Some(id)));
        assert!(!store.pathfinder().is_walkable(5, 5));
    }

    #[test]
    fn test_construction_lifecycle() {
        let mut store = store();
        let id = store
            .add_building(BuildingKind::Cannon, 1, 4, 4, BuildingState::Placing, 0, true)
            .unwrap();
        assert!(store.start_construction_after_placement(id, 1000));

        let building = store.get_building(id).unwrap();
        assert_eq!(building.state, BuildingState::Constructing);
        assert_eq!(building.finish_time, 1060);
        assert_eq!(store.remaining_seconds(id, 1030), Some(30));
        assert_eq!(store.construction_progress(id, 1030), Some(Fixed::from_num(0.5)));

        assert!(store.update_construction(1059).is_empty());
        assert_eq!(store.update_construction(1060), vec![id]);
        assert_eq!(store.get_building(id).unwrap().state, BuildingState::Built);
        assert_eq!(store.construction_progress(id, 2000), Some(Fixed::ONE));
    }

    #[test]
    fn test_instant_building_skips_construction() {
        let mut store = store();
        let id = store
            .add_building(BuildingKind::Wall, 1, 4, 4, BuildingState::Placing, 0, true)
            .unwrap();
        assert!(store.start_construction_after_placement(id, 50));
        assert_eq!(store.get_building(id).unwrap().state, BuildingState::Built);
    }

    #[test]
    fn test_start_construction_missing_or_wrong_state() {
        let mut store = store();
        assert!(!store.start_construction_after_placement(99, 0));
        let id = built(&mut store, BuildingKind::Cannon, 1, 0, 0);
        assert!(!store.start_construction_after_placement(id, 0));
    }

    #[test]
    fn test_finish_upgrade_is_idempotent() {
        let mut store = store();
        built(&mut store, BuildingKind::TownHall, 3, 20, 20);
        store.add_resource(crate::data::ResourceKind::Gold, 10_000);
        let id = built(&mut store, BuildingKind::Cannon, 1, 0, 0);

        store.start_upgrade(id, 100).unwrap();
        store.drain_events();
        assert!(store.finish_upgrade_building(id));
        assert_eq!(store.get_building(id).unwrap().level, 2);

        assert!(!store.finish_upgrade_building(id));
        assert_eq!(store.get_building(id).unwrap().level, 2);
        let finished = store
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::ConstructionFinished { .. }))
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_start_upgrade_failures_do_not_mutate() {
        let mut store = store();
        built(&mut store, BuildingKind::TownHall, 1, 20, 20);
        let cannon = built(&mut store, BuildingKind::Cannon, 1, 0, 0);

        // Town hall 1 caps buildings at level 1.
        store.add_resource(crate::data::ResourceKind::Gold, 5000);
        assert!(matches!(
            store.start_upgrade(cannon, 0),
            Err(GameError::InvalidState(_))
        ));
        assert_eq!(store.resource(crate::data::ResourceKind::Gold), 5000);

        assert!(matches!(
            store.start_upgrade(999, 0),
            Err(GameError::BuildingNotFound(999))
        ));
    }

    #[test]
    fn test_upgrade_needs_funds() {
        let mut store = store();
        let th = built(&mut store, BuildingKind::TownHall, 1, 20, 20);
        store.add_resource(crate::data::ResourceKind::Gold, 999);

        let err = store.start_upgrade(th, 0).unwrap_err();
        assert!(matches!(err, GameError::InsufficientResources { required: 1000, .. }));
        assert_eq!(store.get_building(th).unwrap().state, BuildingState::Built);
        assert_eq!(store.resource(crate::data::ResourceKind::Gold), 999);
    }

    #[test]
    fn test_purchase_building() {
        let mut store = store();
        built(&mut store, BuildingKind::TownHall, 1, 20, 20);
        store.add_resource(crate::data::ResourceKind::Gold, 600);

        let first = store.purchase_building(BuildingKind::Cannon, 2, 2, 0).unwrap();
        assert_eq!(store.get_building(first).unwrap().state, BuildingState::Constructing);
        assert_eq!(store.resource(crate::data::ResourceKind::Gold), 350);

        assert!(matches!(
            store.purchase_building(BuildingKind::Cannon, 3, 3, 0),
            Err(GameError::InvalidPlacement { x: 3, y: 3 })
        ));
        store.purchase_building(BuildingKind::Cannon, 8, 2, 0).unwrap();
        assert!(matches!(
            store.purchase_building(BuildingKind::Cannon, 14, 2, 0),
            Err(GameError::InvalidState(_))
        ));
        assert!(matches!(
            store.purchase_building(BuildingKind::Mortar, 14, 2, 0),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_cancel_placement_and_remove() {
        let mut store = store();
        let placing = store
            .add_building(BuildingKind::Cannon, 1, 4, 4, BuildingState::Placing, 0, true)
            .unwrap();
        let standing = built(&mut store, BuildingKind::Cannon, 1, 10, 10);

        assert!(!store.cancel_placement(standing));
        assert!(store.cancel_placement(placing));
        assert!(store.get_building(placing).is_none());

        assert!(store.remove_building(standing).is_some());
        assert!(!store.is_area_occupied(10, 10, 3, 3, None));
        assert!(store.remove_building(standing).is_none());
    }

    #[test]
    fn test_destroyed_buildings_free_their_cells() {
        let mut store = store();
        store.set_in_battle_mode(true);
        let wall = built(&mut store, BuildingKind::Wall, 1, 7, 7);
        assert!(!store.pathfinder().is_walkable(7, 7));

        store.get_building_mut(wall).unwrap().is_destroyed = true;
        store.update_occupancy();
        assert!(store.pathfinder().is_walkable(7, 7));
        assert!(!store.is_area_occupied(7, 7, 1, 1, None));
    }

    #[test]
    fn test_switching_data_set_refreshes_pathfinder() {
        let mut store = store();
        built(&mut store, BuildingKind::Wall, 1, 4, 4);
        assert!(!store.pathfinder().is_walkable(4, 4));

        store.set_in_battle_mode(true);
        assert!(store.pathfinder().is_walkable(4, 4));
        built(&mut store, BuildingKind::Wall, 1, 9, 9);

        store.set_in_battle_mode(false);
        assert!(!store.pathfinder().is_walkable(4, 4));
        assert!(store.pathfinder().is_walkable(9, 9));
    }

    #[test]
    fn test_load_battle_map_keeps_ids() {
        let mut store = store();
        let mut source = VillageStore::new(store.data_handle());
        let id = built(&mut source, BuildingKind::GoldStorage, 1, 3, 3);
        let snapshot: Vec<_> = source.buildings().cloned().collect();

        store.load_battle_map(snapshot);
        store.set_in_battle_mode(true);
        assert_eq!(store.get_building(id).unwrap().kind, BuildingKind::GoldStorage);
        assert!(store.is_area_occupied(3, 3, 1, 1, None));

        let next = built(&mut store, BuildingKind::Wall, 1, 0, 0);
        assert!(next > id);
    }
}
