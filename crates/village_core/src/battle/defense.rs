//! Defensive buildings firing at deployed units.

use std::collections::BTreeMap;

use crate::grid::{Footprint, GridPoint, IsoGrid};
use crate::math::Fixed;
use crate::occupancy::BuildingId;
use crate::store::VillageStore;

use super::units::{accumulate_damage, Unit, UnitId};

/// The live unit nearest to `footprint` within `range` cells.
///
/// Distance is measured from the unit's exact grid point to the nearest
/// point of the footprint. Equal distances go to the lowest unit id.
#[must_use]
pub fn find_nearest_unit_in_range(
    grid: &IsoGrid,
    units: &BTreeMap<UnitId, Unit>,
    footprint: &Footprint,
    range: Fixed,
) -> Option<UnitId> {
    let range_sq = range * range;
    let mut best_target: Option<(UnitId, Fixed)> = None;

    for (&id, unit) in units {
        if !unit.is_alive() {
            continue;
        }
        let dist_sq = footprint.distance_squared_to(grid.pixel_to_grid_exact(unit.position));
        if dist_sq <= range_sq {
            match best_target {
                None => best_target = Some((id, dist_sq)),
                Some((_, best_dist)) if dist_sq < best_dist => {
                    best_target = Some((id, dist_sq));
                }
                _ => {}
            }
        }
    }

    best_target.map(|(id, _)| id)
}

/// Live units whose grid point lies within `radius` cells of `center`.
pub(crate) fn units_in_radius(
    grid: &IsoGrid,
    units: &BTreeMap<UnitId, Unit>,
    center: GridPoint,
    radius: Fixed,
) -> Vec<UnitId> {
    let radius_sq = radius * radius;
    units
        .iter()
        .filter(|(_, unit)| unit.is_alive())
        .filter(|(_, unit)| {
            let point = grid.pixel_to_grid_exact(unit.position);
            let dx = point.x - center.x;
            let dy = point.y - center.y;
            dx * dx + dy * dy <= radius_sq
        })
        .map(|(&id, _)| id)
        .collect()
}

/// Let every standing defense fire for one tick.
///
/// Each defense keeps its own fractional damage carry in `carries`; the
/// carry is dropped while the defense has nothing in range. Splash
/// defenses hit every unit within their splash radius of the target.
/// Killed units are left in the map in the `Dying` state.
pub fn update_building_defense(
    store: &VillageStore,
    units: &mut BTreeMap<UnitId, Unit>,
    carries: &mut BTreeMap<BuildingId, Fixed>,
    dt: Fixed,
) {
    let grid = *store.grid();
    for building in store.buildings() {
        if !building.is_operational() {
            continue;
        }
        let Some(config) = store.data().building(building.kind) else {
            continue;
        };
        if !config.is_defense() {
            continue;
        }
        let Some(stats) = config.level(building.level) else {
            continue;
        };
        let footprint = building.footprint(config);

        let Some(target) = find_nearest_unit_in_range(&grid, units, &footprint, stats.attack_range) else {
            carries.remove(&building.id);
            continue;
        };

        let carry = carries.entry(building.id).or_insert(Fixed::ZERO);
        let damage = accumulate_damage(carry, stats.damage_per_second, dt);
        if damage <= 0 {
            continue;
        }

        let victims = if stats.splash_radius > Fixed::ZERO {
            let Some(center) = units.get(&target).map(|u| grid.pixel_to_grid_exact(u.position)) else {
                continue;
            };
            units_in_radius(&grid, units, center, stats.splash_radius)
        } else {
            vec![target]
        };

        for id in victims {
            if let Some(unit) = units.get_mut(&id) {
                if unit.take_damage(damage) {
                    tracing::debug!(building = building.id, unit = id, "Defense killed unit");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::{BuildingKind, GameData, TroopKind};
    use crate::store::BuildingState;

    fn battle_store() -> VillageStore {
        let mut store = VillageStore::new(Arc::new(GameData::default()));
        store.set_in_battle_mode(true);
        store
    }

    fn unit_at(store: &VillageStore, id: UnitId, x: i32, y: i32, hp: i32) -> Unit {
        Unit::new(id, TroopKind::Barbarian, 1, store.grid().cell_center(x, y), hp)
    }

    #[test]
    fn test_nearest_in_range_prefers_lowest_id_on_tie() {
        let store = battle_store();
        let footprint = Footprint::new(10, 10, 3, 3);
        let mut units = BTreeMap::new();
        units.insert(5, unit_at(&store, 5, 8, 11, 10));
        units.insert(2, unit_at(&store, 2, 14, 11, 10));
        units.insert(9, unit_at(&store, 9, 30, 30, 10));

        let found = find_nearest_unit_in_range(store.grid(), &units, &footprint, Fixed::from_num(9));
        assert_eq!(found, Some(2));

        let none = find_nearest_unit_in_range(store.grid(), &units, &footprint, Fixed::from_num(1));
        assert_eq!(none, None);
    }

    #[test]
    fn test_cannon_damage_accumulates_per_building() {
        let mut store = battle_store();
        store
            .add_building(BuildingKind::Cannon, 1, 10, 10, BuildingState::Built, 0, false)
            .unwrap();
        let mut units = BTreeMap::new();
        units.insert(1, unit_at(&store, 1, 8, 11, 100));
        let mut carries = BTreeMap::new();
        let dt = Fixed::from_num(0.25);

        // 2.25 per tick; whole points split off as they accumulate.
        for _ in 0..4 {
            update_building_defense(&store, &mut units, &mut carries, dt);
        }
        assert_eq!(units[&1].hp, 91);
    }

    #[test]
    fn test_destroyed_defense_is_silent() {
        let mut store = battle_store();
        let cannon = store
            .add_building(BuildingKind::Cannon, 1, 10, 10, BuildingState::Built, 0, false)
            .unwrap();
        store.get_building_mut(cannon).unwrap().is_destroyed = true;
        let mut units = BTreeMap::new();
        units.insert(1, unit_at(&store, 1, 8, 11, 100));
        let mut carries = BTreeMap::new();

        update_building_defense(&store, &mut units, &mut carries, Fixed::ONE);
        assert_eq!(units[&1].hp, 100);
    }

    #[test]
    fn test_mortar_splashes() {
        let mut store = battle_store();
        store
            .add_building(BuildingKind::Mortar, 1, 20, 20, BuildingState::Built, 0, false)
            .unwrap();
        let mut units = BTreeMap::new();
        units.insert(1, unit_at(&store, 1, 14, 21, 50));
        units.insert(2, unit_at(&store, 2, 14, 22, 50));
        units.insert(3, unit_at(&store, 3, 20, 35, 50));
        let mut carries = BTreeMap::new();

        update_building_defense(&store, &mut units, &mut carries, Fixed::ONE);
        assert_eq!(units[&1].hp, 46);
        assert_eq!(units[&2].hp, 46);
        assert_eq!(units[&3].hp, 50);
    }
}
