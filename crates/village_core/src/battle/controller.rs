//! The battle loop.
//!
//! A [`BattleController`] runs one attack against the store's battle data
//! set. It owns the deployed units and every piece of per-battle
//! bookkeeping; buildings stay in the store so that occupancy and
//! pathfinding always see the current map.
//!
//! # Tick order
//!
//! Each call to [`BattleController::tick`] runs, in this order:
//!
//! 1. **Building defense**: every standing defense fires at its nearest unit.
//! 2. **Traps**: countdowns advance, elapsed traps explode, new traps arm.
//! 3. **Units**: each unit's state machine steps once, in ascending id order.
//! 4. **Cleanup**: dead units are removed (`UnitKilled`, ascending id).
//! 5. **End checks**: total destruction, time limit, or no attackers left.
//!
//! Combat outcomes depend on this order, so it never changes between
//! recording and replay.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::data::{BuildingKind, ResourceKind, TargetPreference, TroopData, TroopKind};
use crate::error::{GameError, Result};
use crate::events::GameEvent;
use crate::math::{fixed_serde, Fixed};
use crate::occupancy::BuildingId;
use crate::store::{Resources, VillageStore};

use super::defense::update_building_defense;
use super::destruction::{counted_hit_points, DestructionTracker};
use super::replay::{BattleRecorder, BattleReplayData};
use super::targeting::{plan_route, select_target, Route, PIXEL_DETOUR_THRESHOLD};
use super::traps::TrapState;
use super::units::{accumulate_damage, Unit, UnitId, UnitState};

/// Default ticks per second.
pub const TICK_RATE: u32 = 20;

/// Default battle length in seconds.
pub const BATTLE_TIME_LIMIT_SECS: u32 = 180;

/// Tunables for one battle. Recorded in replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Extra walking distance, in pixels, a unit accepts before breaking
    /// through a wall instead.
    #[serde(with = "fixed_serde")]
    pub detour_threshold: Fixed,
    /// Simulated seconds before the battle ends on its own.
    pub time_limit_secs: u32,
    /// Ticks per simulated second for [`BattleController::step`].
    pub tick_rate: u32,
    /// Seconds an idle unit waits before searching for a target again.
    #[serde(with = "fixed_serde")]
    pub idle_retry_secs: Fixed,
    /// Paid on top of the loot when at least one star is earned.
    #[serde(default)]
    pub win_bonus: Resources,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            detour_threshold: Fixed::from_num(PIXEL_DETOUR_THRESHOLD),
            time_limit_secs: BATTLE_TIME_LIMIT_SECS,
            tick_rate: TICK_RATE,
            idle_retry_secs: Fixed::ONE,
            win_bonus: Resources::default(),
        }
    }
}

impl BattleConfig {
    /// Length of one fixed step in seconds.
    #[must_use]
    pub fn tick_duration(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }
}

/// Lifecycle of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattlePhase {
    /// Map loaded, nothing deployed yet. Ticks do nothing.
    Ready,
    /// At least one troop deployed.
    Fighting,
    /// Over; no more deployments or ticks.
    Ended,
}

/// Outcome handed back by [`BattleController::finish_battle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleResult {
    /// Stars earned (0 to 3).
    pub stars: u8,
    /// Destroyed share of counted building HP, 0 to 100.
    pub destruction_percent: Fixed,
    /// Whether the town hall fell.
    pub town_hall_destroyed: bool,
    /// Everything looted from destroyed buildings.
    pub loot: Resources,
    /// Win bonus earned; zero without a star.
    pub bonus: Resources,
    /// The part of loot plus bonus that fit into the attacker's storages.
    pub credited: Resources,
    /// Ticks simulated while fighting.
    pub duration_ticks: u64,
}

/// Per-unit stats looked up once per step.
struct TroopStats {
    speed: Fixed,
    range: Fixed,
    dps: Fixed,
    wall_multiplier: Fixed,
    suicide: bool,
    preference: TargetPreference,
}

impl TroopStats {
    fn of(troop: &TroopData, level: u32) -> Option<Self> {
        let stats = troop.level(level)?;
        Some(Self {
            speed: troop.speed,
            range: troop.attack_range,
            dps: stats.damage_per_second,
            wall_multiplier: troop.wall_damage_multiplier,
            suicide: troop.suicide,
            preference: troop.preference,
        })
    }
}

/// Runs one battle against the store's battle data set.
#[derive(Debug, Clone)]
pub struct BattleController {
    config: BattleConfig,
    phase: BattlePhase,
    units: BTreeMap<UnitId, Unit>,
    next_unit_id: UnitId,
    tick_count: u64,
    elapsed: Fixed,
    tracker: DestructionTracker,
    traps: TrapState,
    defense_carries: BTreeMap<BuildingId, Fixed>,
    loot: Resources,
    loot_credited: Option<Resources>,
    recorder: BattleRecorder,
}

impl BattleController {
    /// Begin a battle on the current battle map.
    ///
    /// Snapshots the map and the attacker's army for replay and initialises
    /// destruction tracking.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] unless the store is in battle mode.
    pub fn start(store: &mut VillageStore, config: BattleConfig) -> Result<Self> {
        if !store.is_in_battle_mode() {
            return Err(GameError::InvalidState(
                "Battle requires the battle data set".into(),
            ));
        }
        store.update_occupancy();
        let tracker = DestructionTracker::init_destruction_tracking(store);
        let recorder = BattleRecorder::new(store, config);
        tracing::info!(
            buildings = store.building_count(),
            troops = store.total_troops(),
            "Battle started"
        );
        Ok(Self {
            config,
            phase: BattlePhase::Ready,
            units: BTreeMap::new(),
            next_unit_id: 1,
            tick_count: 0,
            elapsed: Fixed::ZERO,
            tracker,
            traps: TrapState::default(),
            defense_carries: BTreeMap::new(),
            loot: Resources::default(),
            loot_credited: None,
            recorder,
        })
    }

    /// Battle tunables.
    #[must_use]
    pub const fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> BattlePhase {
        self.phase
    }

    /// Ticks simulated while fighting.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Simulated seconds while fighting.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    /// Units on the battlefield, ascending id.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// One unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Destruction and star bookkeeping.
    #[must_use]
    pub const fn tracker(&self) -> &DestructionTracker {
        &self.tracker
    }

    /// Trap bookkeeping.
    #[must_use]
    pub const fn traps(&self) -> &TrapState {
        &self.traps
    }

    /// Stars earned so far.
    #[must_use]
    pub const fn stars(&self) -> u8 {
        self.tracker.stars
    }

    /// Destruction percentage so far.
    #[must_use]
    pub const fn destruction_percent(&self) -> Fixed {
        self.tracker.progress
    }

    /// Loot collected so far.
    #[must_use]
    pub const fn loot(&self) -> Resources {
        self.loot
    }

    /// Note the seed the battle map was generated from, kept in the replay.
    pub fn set_map_seed(&mut self, seed: u64) {
        self.recorder.set_map_seed(seed);
    }

    // ------------------------------------------------------------------
    // Deployment
    // ------------------------------------------------------------------

    /// Place one troop from the attacker's army on a cell.
    ///
    /// The first deployment starts the fight.
    ///
    /// # Errors
    ///
    /// * [`GameError::InvalidState`] after the battle ended or outside battle mode
    /// * [`GameError::UnknownTroopType`] when the tables have no such troop
    /// * [`GameError::InvalidPlacement`] for blocked or out-of-bounds cells
    /// * [`GameError::InsufficientTroops`] when none of that kind is left
    pub fn deploy_troop(&mut self, store: &mut VillageStore, kind: TroopKind, x: i32, y: i32) -> Result<UnitId> {
        if self.phase == BattlePhase::Ended {
            return Err(GameError::InvalidState("Battle has ended".into()));
        }
        if !store.is_in_battle_mode() {
            return Err(GameError::InvalidState("Not in battle mode".into()));
        }
        let level = store.troop_level(kind);
        let hit_points = store
            .data()
            .troop(kind)
            .and_then(|troop| troop.level(level))
            .map(|stats| stats.hit_points)
            .ok_or(GameError::UnknownTroopType(kind))?;
        if !store.pathfinder().is_walkable(x, y) {
            return Err(GameError::InvalidPlacement { x, y });
        }
        if !store.remove_troop(kind, 1) {
            return Err(GameError::InsufficientTroops(kind));
        }

        let id = self.next_unit_id;
        self.next_unit_id += 1;
        let position = store.grid().cell_center(x, y);
        self.units.insert(id, Unit::new(id, kind, level, position, hit_points));
        self.recorder.record_deployment(self.tick_count, kind, x, y);
        store.emit(GameEvent::UnitDeployed { unit: id, kind });

        if self.phase == BattlePhase::Ready {
            self.phase = BattlePhase::Fighting;
            tracing::info!("Fight started");
        }
        tracing::debug!(unit = id, ?kind, x, y, tick = self.tick_count, "Troop deployed");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------

    /// Advance one fixed step of [`BattleConfig::tick_duration`] seconds.
    ///
    /// Replays always step this way.
    pub fn step(&mut self, store: &mut VillageStore) -> BattlePhase {
        let dt = self.config.tick_duration();
        self.tick(store, dt)
    }

    /// Advance the battle by `dt` seconds. Does nothing unless fighting.
    pub fn tick(&mut self, store: &mut VillageStore, dt: Fixed) -> BattlePhase {
        if self.phase != BattlePhase::Fighting {
            return self.phase;
        }

        update_building_defense(store, &mut self.units, &mut self.defense_carries, dt);
        self.traps.update_trap_detection(store, &mut self.units, dt);

        let ids: Vec<UnitId> = self.units.keys().copied().collect();
        for id in ids {
            let Some(mut unit) = self.units.remove(&id) else {
                continue;
            };
            if unit.is_alive() {
                self.update_unit(store, &mut unit, dt);
            }
            self.units.insert(id, unit);
        }

        let dead: Vec<UnitId> = self
            .units
            .iter()
            .filter(|(_, unit)| !unit.is_alive())
            .map(|(&id, _)| id)
            .collect();
        for id in dead {
            if let Some(unit) = self.units.remove(&id) {
                store.emit(GameEvent::UnitKilled { unit: id, kind: unit.kind });
            }
        }

        self.tick_count += 1;
        self.elapsed += dt;

        if self.tracker.is_complete() {
            self.end_battle(store, "total destruction");
        } else if self.elapsed >= Fixed::from_num(self.config.time_limit_secs) {
            self.end_battle(store, "time limit");
        } else if self.units.is_empty() && store.total_troops() == 0 {
            self.end_battle(store, "no attackers left");
        }

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash(store);
            tracing::trace!(tick = self.tick_count, state_hash = hash, "Battle state hash");
        }

        #[cfg(feature = "debug-validation")]
        self.validate_invariants(store);

        self.phase
    }

    /// Panics when the tracker or the occupancy table disagrees with the
    /// buildings.
    #[cfg(feature = "debug-validation")]
    fn validate_invariants(&self, store: &VillageStore) {
        let tracker = &self.tracker;
        assert!(tracker.destroyed_hp <= tracker.total_building_hp, "destroyed more hp than exists");
        assert!(tracker.stars <= 3, "more than three stars");
        assert!(tracker.progress <= Fixed::from_num(100), "destruction above 100%");
        for building in store.buildings().filter(|b| b.is_destroyed) {
            assert!(
                store.occupancy().cells_of(building.id).next().is_none(),
                "destroyed building {} still occupies cells",
                building.id
            );
        }
    }

    /// Advance one unit's state machine by `dt`.
    ///
    /// A unit attacking a wall keeps at it until the wall falls, even if
    /// its original target becomes reachable some other way.
    fn update_unit(&mut self, store: &mut VillageStore, unit: &mut Unit, dt: Fixed) {
        let data = store.data_handle();
        let Some(stats) = data.troop(unit.kind).and_then(|t| TroopStats::of(t, unit.level)) else {
            tracing::warn!(unit = unit.id, kind = ?unit.kind, "Unit has no troop data");
            unit.take_damage(unit.hp);
            return;
        };

        match unit.state {
            UnitState::Idle { retry_in } => {
                let retry_in = retry_in - dt;
                unit.state = if retry_in <= Fixed::ZERO {
                    UnitState::SeekingTarget
                } else {
                    UnitState::Idle { retry_in }
                };
            }
            UnitState::SeekingTarget => self.seek_target(store, unit, &stats),
            UnitState::Moving => {
                if !target_standing(store, unit.target) {
                    unit.retarget();
                    return;
                }
                if unit.advance_along_path(stats.speed * dt) {
                    unit.state = UnitState::Attacking;
                }
            }
            UnitState::Attacking => {
                if !target_standing(store, unit.target) {
                    unit.retarget();
                    return;
                }
                if stats.suicide {
                    self.perform_wall_breaker_suicide_attack(store, unit, stats.dps, stats.wall_multiplier);
                } else {
                    self.execute_attack(store, unit, stats.dps, stats.wall_multiplier, dt);
                }
            }
            UnitState::Dying => {}
        }
    }

    fn seek_target(&mut self, store: &mut VillageStore, unit: &mut Unit, stats: &TroopStats) {
        let idle = UnitState::Idle {
            retry_in: self.config.idle_retry_secs,
        };
        let Some(target) = select_target(store, unit.position, stats.preference) else {
            unit.state = idle;
            return;
        };

        let (building, path) = match plan_route(
            store,
            unit.position,
            target,
            stats.range,
            self.config.detour_threshold,
        ) {
            Route::InRange => (target, Vec::new()),
            Route::Path(path) => (target, path),
            Route::BreakWall { wall, path } => (wall, path),
            Route::Unreachable => {
                tracing::debug!(unit = unit.id, target, "Target unreachable");
                unit.state = idle;
                return;
            }
        };

        unit.target = Some(building);
        unit.accumulated_damage = Fixed::ZERO;
        unit.state = if path.is_empty() {
            UnitState::Attacking
        } else {
            UnitState::Moving
        };
        unit.path = path.into();
        store.emit(GameEvent::UnitTargetLocked {
            unit: unit.id,
            building,
        });
    }

    /// Hit the unit's target for one tick.
    ///
    /// Damage accrues fractionally at `dps` (times `wall_multiplier` against
    /// walls); whole points are applied as they accumulate. A destroyed
    /// target sends the unit back to target selection.
    pub fn execute_attack(
        &mut self,
        store: &mut VillageStore,
        unit: &mut Unit,
        dps: Fixed,
        wall_multiplier: Fixed,
        dt: Fixed,
    ) {
        let Some(target) = unit.target else {
            unit.retarget();
            return;
        };
        let rate = if store.is_wall(target) {
            dps * wall_multiplier
        } else {
            dps
        };
        let damage = accumulate_damage(&mut unit.accumulated_damage, rate, dt);
        if damage > 0 && damage_building(store, target, damage) {
            self.destroy_building(store, target);
            unit.retarget();
        }
    }

    /// Deliver a wall breaker's single hit, then kill the unit.
    ///
    /// The hit is `dps × wall_multiplier` against walls and `dps` otherwise.
    pub fn perform_wall_breaker_suicide_attack(
        &mut self,
        store: &mut VillageStore,
        unit: &mut Unit,
        dps: Fixed,
        wall_multiplier: Fixed,
    ) {
        if let Some(target) = unit.target {
            let hit = if store.is_wall(target) {
                dps * wall_multiplier
            } else {
                dps
            };
            let damage = hit.floor().to_num::<i32>();
            tracing::debug!(unit = unit.id, target, damage, "Wall breaker detonated");
            if damage_building(store, target, damage) {
                self.destroy_building(store, target);
            }
        }
        unit.take_damage(unit.hp);
    }

    /// Mark a building destroyed and apply everything that follows: loot,
    /// the destroyed event, occupancy, destruction progress and stars.
    pub fn destroy_building(&mut self, store: &mut VillageStore, id: BuildingId) {
        let Some(building) = store.get_building_mut(id) else {
            return;
        };
        if building.is_destroyed {
            return;
        }
        building.is_destroyed = true;
        building.current_hp = 0;
        let snapshot = building.clone();

        self.loot = self.loot.saturating_add(snapshot.lootable);
        tracing::debug!(id, kind = ?snapshot.kind, "Building destroyed");
        store.emit(GameEvent::BuildingDestroyed {
            building: snapshot.clone(),
        });
        store.update_occupancy();

        let Some(hit_points) = counted_hit_points(store, &snapshot) else {
            return;
        };
        let is_town_hall = snapshot.kind == BuildingKind::TownHall;
        let percent = self.tracker.record_destroyed(hit_points, is_town_hall);
        store.emit(GameEvent::DestructionProgress { percent });
        for award in self
            .tracker
            .check_star_conditions(percent, self.tracker.town_hall_destroyed)
        {
            store.emit(GameEvent::StarAwarded {
                star: award.star,
                reason: award.reason,
            });
        }
    }

    // ------------------------------------------------------------------
    // Ending
    // ------------------------------------------------------------------

    /// End the battle now. Later calls do nothing.
    pub fn end_battle(&mut self, store: &mut VillageStore, reason: &str) {
        if self.phase == BattlePhase::Ended {
            return;
        }
        self.phase = BattlePhase::Ended;
        store.emit(GameEvent::BattleEnded {
            stars: self.tracker.stars,
            percent: self.tracker.progress,
            loot: self.loot,
        });
        tracing::info!(
            reason,
            stars = self.tracker.stars,
            percent = %self.tracker.progress,
            ticks = self.tick_count,
            "Battle ended"
        );
    }

    /// End the battle if it is still running and credit the loot, plus the
    /// win bonus when a star was earned, to the attacker's ledger, capped by
    /// storage capacity. Credit happens only once however often this is
    /// called.
    pub fn finish_battle(&mut self, store: &mut VillageStore) -> BattleResult {
        self.end_battle(store, "finished");

        let bonus = if self.tracker.stars > 0 {
            self.config.win_bonus
        } else {
            Resources::default()
        };
        let credited = match self.loot_credited {
            Some(credited) => credited,
            None => {
                let payout = self.loot.saturating_add(bonus);
                let credited = Resources::new(
                    credit_capped(store, ResourceKind::Gold, payout.gold),
                    credit_capped(store, ResourceKind::Elixir, payout.elixir),
                );
                self.loot_credited = Some(credited);
                credited
            }
        };

        BattleResult {
            stars: self.tracker.stars,
            destruction_percent: self.tracker.progress,
            town_hall_destroyed: self.tracker.town_hall_destroyed,
            loot: self.loot,
            bonus,
            credited,
            duration_ticks: self.tick_count,
        }
    }

    /// Everything needed to replay this battle, finalised with the current
    /// outcome and state hash.
    #[must_use]
    pub fn replay_data(&self, store: &VillageStore) -> BattleReplayData {
        self.recorder.finish(
            self.tracker.stars,
            self.tracker.progress,
            self.loot,
            self.tick_count,
            self.state_hash(store),
        )
    }

    /// Hash of the battle state for determinism checks.
    ///
    /// Covers the phase, tick count, every unit and every building's hit
    /// points, plus destruction and loot totals.
    #[must_use]
    pub fn state_hash(&self, store: &VillageStore) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.phase.hash(&mut hasher);
        self.tick_count.hash(&mut hasher);

        self.units.len().hash(&mut hasher);
        for (id, unit) in &self.units {
            id.hash(&mut hasher);
            unit.kind.hash(&mut hasher);
            unit.position.x.to_bits().hash(&mut hasher);
            unit.position.y.to_bits().hash(&mut hasher);
            unit.hp.hash(&mut hasher);
            unit.state.hash(&mut hasher);
            unit.target.hash(&mut hasher);
        }

        for building in store.buildings() {
            building.id.hash(&mut hasher);
            building.current_hp.hash(&mut hasher);
            building.is_destroyed.hash(&mut hasher);
        }

        self.tracker.destroyed_hp.hash(&mut hasher);
        self.tracker.stars.hash(&mut hasher);
        self.loot.hash(&mut hasher);

        hasher.finish()
    }
}

fn target_standing(store: &VillageStore, target: Option<BuildingId>) -> bool {
    target
        .and_then(|id| store.get_building(id))
        .is_some_and(|b| !b.is_destroyed)
}

/// Apply whole damage to a building. Returns `true` if this destroyed it.
fn damage_building(store: &mut VillageStore, id: BuildingId, damage: i32) -> bool {
    let Some(building) = store.get_building_mut(id) else {
        return false;
    };
    if building.is_destroyed {
        return false;
    }
    building.current_hp = (building.current_hp - damage).max(0);
    building.current_hp == 0
}

fn credit_capped(store: &mut VillageStore, kind: ResourceKind, amount: u64) -> u64 {
    let room = store
        .storage_capacity(kind)
        .saturating_sub(store.resource(kind));
    let credited = amount.min(room);
    if credited > 0 {
        store.add_resource(kind, credited);
    }
    credited
}
