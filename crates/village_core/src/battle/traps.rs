//! Hidden traps: trigger, countdown, explosion.
//!
//! A trap triggers the first time a live unit comes within its trigger
//! radius of the trap's centre, counts down its configured delay, then
//! explodes once, damaging every live unit within its splash radius.
//! Exploded traps are marked destroyed and never re-arm.

use std::collections::{BTreeMap, BTreeSet};

use crate::data::BuildingCategory;
use crate::events::GameEvent;
use crate::grid::{GridPoint, IsoGrid};
use crate::math::Fixed;
use crate::occupancy::BuildingId;
use crate::store::VillageStore;

use super::defense::units_in_radius;
use super::units::{Unit, UnitId};

/// Trap bookkeeping for one battle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrapState {
    /// Every trap that has triggered, including ones that already exploded.
    pub triggered_traps: BTreeSet<BuildingId>,
    /// Seconds left before each pending trap explodes.
    pub trap_timers: BTreeMap<BuildingId, Fixed>,
}

/// Whether a unit stands within `radius` cells of the trap's centre.
#[must_use]
pub fn is_unit_in_trap_range(grid: &IsoGrid, unit: &Unit, center: GridPoint, radius: Fixed) -> bool {
    if !unit.is_alive() {
        return false;
    }
    let point = grid.pixel_to_grid_exact(unit.position);
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    dx * dx + dy * dy <= radius * radius
}

impl TrapState {
    /// Advance pending countdowns, explode the elapsed ones, then arm any
    /// trap a unit has just walked into.
    pub fn update_trap_detection(
        &mut self,
        store: &mut VillageStore,
        units: &mut BTreeMap<UnitId, Unit>,
        dt: Fixed,
    ) {
        let mut elapsed = Vec::new();
        for (&id, remaining) in &mut self.trap_timers {
            *remaining -= dt;
            if *remaining <= Fixed::ZERO {
                elapsed.push(id);
            }
        }
        for id in elapsed {
            self.explode_trap(store, units, id);
        }

        let grid = *store.grid();
        let mut armed = Vec::new();
        for building in store.buildings() {
            if !building.is_operational() || self.triggered_traps.contains(&building.id) {
                continue;
            }
            let Some(config) = store.data().building(building.kind) else {
                continue;
            };
            if config.category != BuildingCategory::Trap {
                continue;
            }
            let Some(stats) = config.level(building.level) else {
                continue;
            };
            let center = building.footprint(config).center();
            if units
                .values()
                .any(|unit| is_unit_in_trap_range(&grid, unit, center, stats.trigger_radius))
            {
                armed.push((building.id, stats.trigger_delay));
            }
        }

        for (id, delay) in armed {
            self.triggered_traps.insert(id);
            store.emit(GameEvent::TrapTriggered { trap: id });
            tracing::debug!(trap = id, "Trap triggered");
            if delay <= Fixed::ZERO {
                self.explode_trap(store, units, id);
            } else {
                self.trap_timers.insert(id, delay);
            }
        }
    }

    /// Detonate a trap now. Returns the number of units hit.
    pub fn explode_trap(
        &mut self,
        store: &mut VillageStore,
        units: &mut BTreeMap<UnitId, Unit>,
        id: BuildingId,
    ) -> u32 {
        self.trap_timers.remove(&id);
        self.triggered_traps.insert(id);

        let Some(building) = store.get_building(id) else {
            return 0;
        };
        if building.is_destroyed {
            return 0;
        }
        let Some(config) = store.data().building(building.kind) else {
            return 0;
        };
        let Some(stats) = config.level(building.level) else {
            return 0;
        };
        let center = building.footprint(config).center();
        let damage = stats.trap_damage;
        let radius = stats.splash_radius;

        let grid = *store.grid();
        let victims = units_in_radius(&grid, units, center, radius);
        for unit_id in &victims {
            if let Some(unit) = units.get_mut(unit_id) {
                unit.take_damage(damage);
            }
        }

        if let Some(building) = store.get_building_mut(id) {
            building.is_destroyed = true;
            building.current_hp = 0;
        }
        store.update_occupancy();

        let units_hit = u32::try_from(victims.len()).unwrap_or(u32::MAX);
        store.emit(GameEvent::TrapExploded { trap: id, units_hit });
        tracing::debug!(trap = id, units_hit, "Trap exploded");
        units_hit
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::{BuildingKind, GameData, TroopKind};
    use crate::store::BuildingState;

    fn setup() -> (VillageStore, BuildingId) {
        let mut store = VillageStore::new(Arc::new(GameData::default()));
        store.set_in_battle_mode(true);
        let bomb = store
            .add_building(BuildingKind::Bomb, 1, 10, 10, BuildingState::Built, 0, false)
            .unwrap();
        (store, bomb)
    }

    fn unit_at(store: &VillageStore, id: UnitId, x: i32, y: i32) -> Unit {
        Unit::new(id, TroopKind::Barbarian, 1, store.grid().cell_center(x, y), 45)
    }

    #[test]
    fn test_trigger_then_explode_after_delay() {
        let (mut store, bomb) = setup();
        let mut units = BTreeMap::new();
        units.insert(1, unit_at(&store, 1, 11, 10));
        units.insert(2, unit_at(&store, 2, 12, 12));
        units.insert(3, unit_at(&store, 3, 30, 30));
        let mut traps = TrapState::default();
        let dt = Fixed::from_num(0.25);

        traps.update_trap_detection(&mut store, &mut units, dt);
        assert!(traps.triggered_traps.contains(&bomb));
        assert_eq!(traps.trap_timers[&bomb], Fixed::from_num(0.5));
        assert_eq!(units[&1].hp, 45);

        traps.update_trap_detection(&mut store, &mut units, dt);
        assert_eq!(units[&1].hp, 45);
        traps.update_trap_detection(&mut store, &mut units, dt);

        assert_eq!(units[&1].hp, 25);
        assert_eq!(units[&2].hp, 25);
        assert_eq!(units[&3].hp, 45);
        assert!(store.get_building(bomb).unwrap().is_destroyed);
        assert!(traps.trap_timers.is_empty());

        let events = store.drain_events();
        assert!(events.contains(&GameEvent::TrapTriggered { trap: bomb }));
        assert!(events.contains(&GameEvent::TrapExploded {
            trap: bomb,
            units_hit: 2
        }));
    }

    #[test]
    fn test_trap_is_single_use() {
        let (mut store, bomb) = setup();
        let mut units = BTreeMap::new();
        units.insert(1, unit_at(&store, 1, 10, 10));
        let mut traps = TrapState::default();

        for _ in 0..10 {
            traps.update_trap_detection(&mut store, &mut units, Fixed::from_num(0.25));
        }
        assert_eq!(units[&1].hp, 25);
        let explosions = store
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::TrapExploded { trap, .. } if *trap == bomb))
            .count();
        assert_eq!(explosions, 1);
    }

    #[test]
    fn test_out_of_range_unit_does_not_trigger() {
        let (mut store, bomb) = setup();
        let mut units = BTreeMap::new();
        units.insert(1, unit_at(&store, 1, 14, 10));
        let mut traps = TrapState::default();

        traps.update_trap_detection(&mut store, &mut units, Fixed::ONE);
        assert!(!traps.triggered_traps.contains(&bomb));
        assert!(!store.get_building(bomb).unwrap().is_destroyed);
    }
}
