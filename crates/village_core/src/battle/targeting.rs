//! Target selection and route planning for attacking units.
//!
//! Targets are chosen by world (pixel) distance from the unit to the
//! centre of each building's footprint. Equal distances go to the lowest
//! building id. Walls and traps are never chosen except by wall-seeking
//! units or when breaking through.

use crate::data::{BuildingCategory, TargetPreference};
use crate::grid::{Footprint, GridPos};
use crate::math::{Fixed, Vec2Fixed};
use crate::occupancy::BuildingId;
use crate::pathfinding::{grid_line, path_pixel_length};
use crate::store::{BuildingInstance, BuildingState, VillageStore};

/// Extra walking distance, in pixels, accepted before breaking a wall.
///
/// Measured as the walked path length minus the straight-line distance from
/// the unit to the path's end point.
pub const PIXEL_DETOUR_THRESHOLD: i32 = 800;

/// How a unit will reach its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Already within attack range.
    InRange,
    /// Walk these waypoints.
    Path(Vec<Vec2Fixed>),
    /// The way around is blocked or too long; attack this wall first.
    BreakWall {
        /// Wall to attack.
        wall: BuildingId,
        /// Waypoints to the wall (empty when already in range).
        path: Vec<Vec2Fixed>,
    },
    /// No way to reach the target or a wall in front of it.
    Unreachable,
}

fn is_standing(building: &BuildingInstance) -> bool {
    !building.is_destroyed && building.state != BuildingState::Placing
}

fn category_of(store: &VillageStore, building: &BuildingInstance) -> Option<BuildingCategory> {
    store.data().building(building.kind).map(|config| config.category)
}

/// Nearest standing building accepted by `filter`; ties go to the lowest id.
pub fn nearest_building<F>(store: &VillageStore, from: Vec2Fixed, filter: F) -> Option<BuildingId>
where
    F: Fn(BuildingCategory) -> bool,
{
    let mut best: Option<(Fixed, BuildingId)> = None;
    for building in store.buildings().filter(|b| is_standing(b)) {
        let Some(category) = category_of(store, building) else {
            continue;
        };
        if !filter(category) {
            continue;
        }
        let Some(footprint) = store.footprint_of(building.id) else {
            continue;
        };
        let distance = from.distance_squared(store.grid().footprint_center(&footprint));
        // Buildings iterate in ascending id order, so strict less keeps the lowest id.
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, building.id));
        }
    }
    best.map(|(_, id)| id)
}

/// Choose a target for a unit at `from` according to its preference.
///
/// Preferred categories fall back to any counted building once none remain.
/// Wall seekers pick the first wall between them and the nearest building,
/// then the nearest wall, then the nearest building.
#[must_use]
pub fn select_target(store: &VillageStore, from: Vec2Fixed, preference: TargetPreference) -> Option<BuildingId> {
    let any = |c: BuildingCategory| c.counts_for_destruction();
    match preference {
        TargetPreference::Any => nearest_building(store, from, any),
        TargetPreference::Resources => {
            nearest_building(store, from, |c| c == BuildingCategory::Resource)
                .or_else(|| nearest_building(store, from, any))
        }
        TargetPreference::Defenses => {
            nearest_building(store, from, |c| c == BuildingCategory::Defense)
                .or_else(|| nearest_building(store, from, any))
        }
        TargetPreference::Walls => {
            let eventual = nearest_building(store, from, any);
            eventual
                .and_then(|target| {
                    let footprint = store.footprint_of(target)?;
                    get_first_wall_in_line(store, store.grid().pixel_to_cell(from), center_cell(&footprint))
                })
                .or_else(|| nearest_building(store, from, |c| c == BuildingCategory::Wall))
                .or(eventual)
        }
    }
}

fn center_cell(footprint: &Footprint) -> GridPos {
    GridPos::new(
        footprint.x + footprint.width / 2,
        footprint.y + footprint.height / 2,
    )
}

/// First standing wall crossed by the straight grid line from `from` to `to`.
#[must_use]
pub fn get_first_wall_in_line(store: &VillageStore, from: GridPos, to: GridPos) -> Option<BuildingId> {
    grid_line(from, to).into_iter().find_map(|cell| {
        let id = store.occupancy().building_at(cell.x, cell.y)?;
        store.is_wall(id).then_some(id)
    })
}

/// Plan how a unit at `from` with attack range `range` reaches `target`.
///
/// When the walking path is missing, or longer than the straight line to its
/// end point by more than `detour_threshold` pixels, the first wall in line
/// toward the target is attacked instead.
pub fn plan_route(
    store: &mut VillageStore,
    from: Vec2Fixed,
    target: BuildingId,
    range: Fixed,
    detour_threshold: Fixed,
) -> Route {
    let Some(footprint) = store.footprint_of(target) else {
        return Route::Unreachable;
    };
    let path = store
        .pathfinder_mut()
        .find_world_path_to_area(from, footprint, range);

    let detour_too_long = match &path {
        Some(waypoints) if waypoints.is_empty() => return Route::InRange,
        Some(waypoints) => {
            let end = waypoints.last().copied().unwrap_or(from);
            let walked = path_pixel_length(from, waypoints);
            walked.saturating_sub(from.distance(end)) > detour_threshold
        }
        None => true,
    };

    if detour_too_long && !store.is_wall(target) {
        let from_cell = store.grid().pixel_to_cell(from);
        if let Some(wall) = get_first_wall_in_line(store, from_cell, center_cell(&footprint)) {
            if let Some(wall_footprint) = store.footprint_of(wall) {
                if let Some(wall_path) = store
                    .pathfinder_mut()
                    .find_world_path_to_area(from, wall_footprint, range)
                {
                    tracing::debug!(building = target, wall, "Breaking through wall");
                    return Route::BreakWall {
                        wall,
                        path: wall_path,
                    };
                }
            }
        }
    }

    match path {
        Some(waypoints) => Route::Path(waypoints),
        None => Route::Unreachable,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::{BuildingKind, GameData};

    fn battle_store() -> VillageStore {
        let mut store = VillageStore::new(Arc::new(GameData::default()));
        store.set_in_battle_mode(true);
        store
    }

    fn place(store: &mut VillageStore, kind: BuildingKind, x: i32, y: i32) -> BuildingId {
        store
            .add_building(kind, 1, x, y, BuildingState::Built, 0, false)
            .unwrap()
    }

    #[test]
    fn test_nearest_any_ignores_walls_and_traps() {
        let mut store = battle_store();
        let far = place(&mut store, BuildingKind::Cannon, 30, 30);
        place(&mut store, BuildingKind::Wall, 3, 3);
        place(&mut store, BuildingKind::Bomb, 4, 4);
        let from = store.grid().cell_center(2, 2);

        assert_eq!(select_target(&store, from, TargetPreference::Any), Some(far));
    }

    #[test]
    fn test_preference_with_fallback() {
        let mut store = battle_store();
        let mine = place(&mut store, BuildingKind::GoldMine, 30, 30);
        let cannon = place(&mut store, BuildingKind::Cannon, 5, 5);
        let from = store.grid().cell_center(1, 1);

        assert_eq!(select_target(&store, from, TargetPreference::Resources), Some(mine));
        assert_eq!(select_target(&store, from, TargetPreference::Defenses), Some(cannon));

        store.get_building_mut(mine).unwrap().is_destroyed = true;
        assert_eq!(select_target(&store, from, TargetPreference::Resources), Some(cannon));
    }

    #[test]
    fn test_equal_distance_picks_lowest_id() {
        let mut store = battle_store();
        // Mirror images across the unit's column and row.
        let first = place(&mut store, BuildingKind::Cannon, 10, 20);
        let second = place(&mut store, BuildingKind::Cannon, 20, 10);
        let from = store.grid().cell_center(16, 16);

        let a = store.grid().footprint_center(&store.footprint_of(first).unwrap());
        let b = store.grid().footprint_center(&store.footprint_of(second).unwrap());
        assert_eq!(from.distance_squared(a), from.distance_squared(b));
        assert_eq!(select_target(&store, from, TargetPreference::Any), Some(first));
    }

    #[test]
    fn test_first_wall_in_line() {
        let mut store = battle_store();
        place(&mut store, BuildingKind::Wall, 8, 5);
        let near = place(&mut store, BuildingKind::Wall, 6, 5);
        store.update_occupancy();

        assert_eq!(
            get_first_wall_in_line(&store, GridPos::new(2, 5), GridPos::new(12, 5)),
            Some(near)
        );
        assert_eq!(
            get_first_wall_in_line(&store, GridPos::new(2, 6), GridPos::new(12, 6)),
            None
        );
    }

    #[test]
    fn test_wall_seeker_targets_wall_in_the_way() {
        let mut store = battle_store();
        let cannon = place(&mut store, BuildingKind::Cannon, 20, 4);
        let wall = place(&mut store, BuildingKind::Wall, 10, 5);
        let from = store.grid().cell_center(2, 5);

        assert_eq!(select_target(&store, from, TargetPreference::Walls), Some(wall));
        store.get_building_mut(wall).unwrap().is_destroyed = true;
        store.update_occupancy();
        assert_eq!(select_target(&store, from, TargetPreference::Walls), Some(cannon));
    }

    #[test]
    fn test_route_in_range_and_path() {
        let mut store = battle_store();
        let cannon = place(&mut store, BuildingKind::Cannon, 10, 10);
        let threshold = Fixed::from_num(800);

        let adjacent = store.grid().cell_center(9, 11);
        assert_eq!(
            plan_route(&mut store, adjacent, cannon, Fixed::from_num(0.5), threshold),
            Route::InRange
        );

        let away = store.grid().cell_center(2, 11);
        match plan_route(&mut store, away, cannon, Fixed::from_num(0.5), threshold) {
            Route::Path(path) => assert_eq!(path.len(), 7),
            other => panic!("expected a path, got {other:?}"),
        }
    }

    #[test]
    fn test_enclosed_target_breaks_wall() {
        let mut store = battle_store();
        let cannon = place(&mut store, BuildingKind::Cannon, 20, 20);
        // Closed ring of walls one cell outside the cannon.
        let mut facing = None;
        for i in 19..=23 {
            for (x, y) in [(i, 19), (i, 23), (19, i), (23, i)] {
                if store.occupancy().building_at(x, y).is_none() {
                    let id = place(&mut store, BuildingKind::Wall, x, y);
                    if (x, y) == (19, 21) {
                        facing = Some(id);
                    }
                }
            }
        }
        let from = store.grid().cell_center(10, 21);

        match plan_route(&mut store, from, cannon, Fixed::from_num(0.5), Fixed::from_num(800)) {
            Route::BreakWall { wall, path } => {
                assert_eq!(Some(wall), facing);
                assert_eq!(path.len(), 8);
            }
            other => panic!("expected to break a wall, got {other:?}"),
        }
    }

    #[test]
    fn test_long_way_through_gap_breaks_wall() {
        let mut store = battle_store();
        let cannon = place(&mut store, BuildingKind::Cannon, 21, 21);
        // Radius 12 ring around (22, 22), open only on the far side.
        let mut facing = None;
        for x in 10..=34 {
            for y in 10..=34 {
                let on_ring = (x - 22_i32).abs().max((y - 22_i32).abs()) == 12;
                if on_ring && (x, y) != (34, 22) {
                    let id = place(&mut store, BuildingKind::Wall, x, y);
                    if (x, y) == (10, 22) {
                        facing = Some(id);
                    }
                }
            }
        }
        let from = store.grid().cell_center(2, 22);

        match plan_route(&mut store, from, cannon, Fixed::from_num(0.5), Fixed::from_num(800)) {
            Route::BreakWall { wall, .. } => assert_eq!(Some(wall), facing),
            other => panic!("expected to break a wall, got {other:?}"),
        }
    }

    #[test]
    fn test_short_way_around_is_walked() {
        let mut store = battle_store();
        let cannon = place(&mut store, BuildingKind::Cannon, 20, 20);
        for y in 20..=22 {
            place(&mut store, BuildingKind::Wall, 8, y);
        }
        let from = store.grid().cell_center(2, 21);

        match plan_route(&mut store, from, cannon, Fixed::from_num(0.5), Fixed::from_num(800)) {
            Route::Path(path) => assert!(!path.is_empty()),
            other => panic!("expected to walk around, got {other:?}"),
        }
    }
}
