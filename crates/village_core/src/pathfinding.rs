//! Grid-based pathfinding using the A* algorithm.
//!
//! The [`Pathfinder`] keeps a walkability mask mirrored from the
//! [`OccupancyTable`] and a set of scratch arrays (`g_score`, `came_from`,
//! `closed`) reused across searches. Only the cells a search touched are
//! reset before the next one, so repeated searches during a battle do not
//! allocate.
//!
//! Movement is 8-connected with uniform step cost and a Chebyshev heuristic,
//! which keeps A* optimal. Diagonal steps may not cut past a blocked corner.
//! Ties on f-score go to the node pushed first, so identical inputs always
//! produce identical paths.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::grid::{Footprint, GridPoint, GridPos, IsoGrid};
use crate::math::{Fixed, Vec2Fixed};
use crate::occupancy::OccupancyTable;

const NO_PARENT: u32 = u32::MAX;
const UNVISITED: u32 = u32::MAX;

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    /// Cell index.
    index: u32,
    /// f_score = g_score + heuristic
    f_score: u32,
    /// Push order; lower wins among equal f-scores.
    sequence: u32,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so both comparisons are reversed.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Chebyshev distance, exact step count on an empty 8-connected grid.
#[inline]
fn chebyshev_heuristic(from: GridPos, to: GridPos) -> u32 {
    from.chebyshev_distance(to).unsigned_abs()
}

/// Chebyshev distance from a cell to the nearest cell of a rectangle.
#[inline]
fn chebyshev_to_footprint(from: GridPos, footprint: &Footprint) -> u32 {
    let gap = |value: i32, start: i32, len: i32| {
        if value < start {
            start - value
        } else if value >= start + len {
            value - (start + len - 1)
        } else {
            0
        }
    };
    let dx = gap(from.x, footprint.x, footprint.width);
    let dy = gap(from.y, footprint.y, footprint.height);
    dx.max(dy).unsigned_abs()
}

/// A* search engine over the building occupancy grid.
#[derive(Debug, Clone)]
pub struct Pathfinder {
    grid: IsoGrid,
    walkable: Vec<bool>,
    g_score: Vec<u32>,
    came_from: Vec<u32>,
    closed: Vec<bool>,
    touched: Vec<u32>,
    open: BinaryHeap<AStarNode>,
}

impl Pathfinder {
    /// Create a pathfinder for the given projection with every cell walkable.
    #[must_use]
    pub fn new(grid: IsoGrid) -> Self {
        let count = (grid.width() as usize) * (grid.height() as usize);
        Self {
            grid,
            walkable: vec![true; count],
            g_score: vec![UNVISITED; count],
            came_from: vec![NO_PARENT; count],
            closed: vec![false; count],
            touched: Vec::with_capacity(count),
            open: BinaryHeap::with_capacity(count),
        }
    }

    /// The projection used for world conversions.
    #[must_use]
    pub const fn grid(&self) -> &IsoGrid {
        &self.grid
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.grid
            .in_bounds(x, y)
            .then(|| (y as usize) * (self.grid.width() as usize) + (x as usize))
    }

    #[inline]
    fn cell(&self, index: u32) -> GridPos {
        let width = self.grid.width() as u32;
        GridPos::new((index % width) as i32, (index / width) as i32)
    }

    /// Mirror walkability from the occupancy table.
    ///
    /// Must be called whenever building placement changes; the pathfinder
    /// never polls the store.
    pub fn update_pathfinding_map(&mut self, occupancy: &OccupancyTable) {
        let width = self.grid.width();
        for (i, walkable) in self.walkable.iter_mut().enumerate() {
            let x = (i as i32) % width;
            let y = (i as i32) / width;
            *walkable = occupancy.is_passable(x, y);
        }
    }

    /// True iff the cell is in bounds and units can stand on it.
    #[must_use]
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|i| self.walkable[i])
    }

    /// Check if a diagonal move is valid (no corner cutting through blocked cells).
    #[inline]
    fn is_diagonal_valid(&self, x: i32, y: i32, dx: i32, dy: i32) -> bool {
        if dx != 0 && dy != 0 {
            self.is_walkable(x + dx, y) && self.is_walkable(x, y + dy)
        } else {
            true
        }
    }

    fn reset_scratch(&mut self) {
        for &index in &self.touched {
            let i = index as usize;
            self.g_score[i] = UNVISITED;
            self.came_from[i] = NO_PARENT;
            self.closed[i] = false;
        }
        self.touched.clear();
        self.open.clear();
    }

    /// Core search. The start cell need not be walkable; every other cell on
    /// the path must be. Returns the cell path including `start`, or empty.
    fn search<G, H>(&mut self, start: GridPos, is_goal: G, heuristic: H) -> Vec<GridPos>
    where
        G: Fn(GridPos) -> bool,
        H: Fn(GridPos) -> u32,
    {
        self.reset_scratch();

        let Some(start_index) = self.index(start.x, start.y) else {
            return Vec::new();
        };

        let mut sequence = 0u32;
        self.g_score[start_index] = 0;
        self.touched.push(start_index as u32);
        self.open.push(AStarNode {
            index: start_index as u32,
            f_score: heuristic(start),
            sequence,
        });

        while let Some(current) = self.open.pop() {
            let current_index = current.index as usize;
            if self.closed[current_index] {
                continue;
            }
            self.closed[current_index] = true;

            let current_cell = self.cell(current.index);
            if is_goal(current_cell) {
                return self.reconstruct_path(current.index);
            }

            let current_g = self.g_score[current_index];

            for &(dx, dy) in &DIRECTIONS {
                let nx = current_cell.x + dx;
                let ny = current_cell.y + dy;

                let Some(neighbor_index) = self.index(nx, ny) else {
                    continue;
                };
                if !self.walkable[neighbor_index] || self.closed[neighbor_index] {
                    continue;
                }
                if !self.is_diagonal_valid(current_cell.x, current_cell.y, dx, dy) {
                    continue;
                }

                let tentative_g = current_g + 1;
                if tentative_g < self.g_score[neighbor_index] {
                    if self.g_score[neighbor_index] == UNVISITED {
                        self.touched.push(neighbor_index as u32);
                    }
                    self.g_score[neighbor_index] = tentative_g;
                    self.came_from[neighbor_index] = current.index;

                    sequence += 1;
                    self.open.push(AStarNode {
                        index: neighbor_index as u32,
                        f_score: tentative_g + heuristic(GridPos::new(nx, ny)),
                        sequence,
                    });
                }
            }
        }

        Vec::new()
    }

    fn reconstruct_path(&self, goal_index: u32) -> Vec<GridPos> {
        let mut path = vec![self.cell(goal_index)];
        let mut current = goal_index;
        while self.came_from[current as usize] != NO_PARENT {
            current = self.came_from[current as usize];
            path.push(self.cell(current));
        }
        path.reverse();
        path
    }

    /// Find a cell path from `start` to `goal`.
    ///
    /// The result starts at `start` and ends at `goal`; its step count is the
    /// shortest 8-connected distance. Returns empty when either cell is out
    /// of bounds, the goal is blocked, or no path exists.
    pub fn find_path_grid(&mut self, start: GridPos, goal: GridPos) -> Vec<GridPos> {
        if !self.is_walkable(goal.x, goal.y) {
            tracing::debug!(?start, ?goal, "Goal cell blocked");
            return Vec::new();
        }
        let path = self.search(start, |cell| cell == goal, |cell| chebyshev_heuristic(cell, goal));
        if path.is_empty() {
            tracing::debug!(?start, ?goal, "No path");
        }
        path
    }

    /// Find a cell path from `start` to any walkable cell whose centre lies
    /// within `range` cells of the footprint edge.
    ///
    /// Buildings block their own cells, so this is how units approach them.
    /// Returns `[start]` when `start` is already in range, empty when no such
    /// cell is reachable.
    pub fn find_path_to_area(&mut self, start: GridPos, footprint: Footprint, range: Fixed) -> Vec<GridPos> {
        // A goal cell is at most this many whole cells from the footprint.
        let reach = (range + Fixed::from_num(0.5)).floor().to_num::<i32>().max(0).unsigned_abs();
        let in_range = |cell: GridPos| {
            let center = GridPoint::new(
                Fixed::from_num(cell.x) + Fixed::from_num(0.5),
                Fixed::from_num(cell.y) + Fixed::from_num(0.5),
            );
            footprint.is_within_range(center, range)
        };

        if self.grid.in_bounds(start.x, start.y) && in_range(start) {
            return vec![start];
        }

        // Only walkable cells are ever pushed, so any popped cell in range is
        // a valid place to stand.
        let path = self.search(start, in_range, |cell| {
            chebyshev_to_footprint(cell, &footprint).saturating_sub(reach)
        });
        if path.is_empty() {
            tracing::debug!(?start, ?footprint, "No path into range");
        }
        path
    }

    /// Find a world-space waypoint path between two world positions.
    ///
    /// Waypoints are cell centres, excluding the start cell. Returns empty if
    /// no path exists or both positions lie in the same cell.
    pub fn find_path_in_world(&mut self, start: Vec2Fixed, end: Vec2Fixed) -> Vec<Vec2Fixed> {
        let start_cell = self.grid.pixel_to_cell(start);
        let end_cell = self.grid.pixel_to_cell(end);
        if start_cell == end_cell {
            return Vec::new();
        }
        let path = self.find_path_grid(start_cell, end_cell);
        self.to_waypoints(&path)
    }

    /// World-space variant of [`find_path_to_area`](Self::find_path_to_area).
    ///
    /// `Some(empty)` means the start is already in range; `None` means the
    /// footprint cannot be approached.
    pub fn find_world_path_to_area(
        &mut self,
        start: Vec2Fixed,
        footprint: Footprint,
        range: Fixed,
    ) -> Option<Vec<Vec2Fixed>> {
        let start_cell = self.grid.pixel_to_cell(start);
        let path = self.find_path_to_area(start_cell, footprint, range);
        if path.is_empty() {
            None
        } else {
            Some(self.to_waypoints(&path))
        }
    }

    fn to_waypoints(&self, path: &[GridPos]) -> Vec<Vec2Fixed> {
        path.iter()
            .skip(1)
            .map(|cell| self.grid.cell_center(cell.x, cell.y))
            .collect()
    }
}

/// Total pixel length of walking from `from` through every waypoint.
#[must_use]
pub fn path_pixel_length(from: Vec2Fixed, waypoints: &[Vec2Fixed]) -> Fixed {
    let mut previous = from;
    let mut total = Fixed::ZERO;
    for &point in waypoints {
        total = total.saturating_add(previous.distance(point));
        previous = point;
    }
    total
}

/// Cells crossed by the straight line from `start` to `end`, inclusive.
///
/// Uses Bresenham stepping. Diagonal steps also yield the cell passed at the
/// corner, so a diagonal wall seam cannot be slipped through.
#[must_use]
pub fn grid_line(start: GridPos, end: GridPos) -> Vec<GridPos> {
    let dx = (end.x - start.x).abs();
    let dy = (end.y - start.y).abs();
    let sx = if start.x < end.x { 1 } else { -1 };
    let sy = if start.y < end.y { 1 } else { -1 };
    let mut err = dx - dy;

    let mut x = start.x;
    let mut y = start.y;
    let mut cells = vec![start];

    while x != end.x || y != end.y {
        let e2 = 2 * err;
        let step_x = e2 > -dy;
        let step_y = e2 < dx;

        if step_x && step_y {
            cells.push(GridPos::new(x + sx, y));
        }
        if step_x {
            err -= dy;
            x += sx;
        }
        if step_y {
            err += dx;
            y += sy;
        }
        cells.push(GridPos::new(x, y));
    }

    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occupancy::Occupant;
    use proptest::prelude::*;

    fn small_grid(size: i32) -> IsoGrid {
        IsoGrid::new(
            size,
            size,
            Vec2Fixed::from_ints(size * 32, 0),
            Fixed::from_num(32),
            Fixed::from_num(16),
        )
    }

    fn blocked(cells: &[(i32, i32)], size: i32) -> Pathfinder {
        let mut table = OccupancyTable::new(size, size);
        table.rebuild(cells.iter().enumerate().map(|(i, &(x, y))| Occupant {
            id: i as u32 + 1,
            footprint: Footprint::new(x, y, 1, 1),
            passable: false,
        }));
        let mut pathfinder = Pathfinder::new(small_grid(size));
        pathfinder.update_pathfinding_map(&table);
        pathfinder
    }

    fn assert_connected(path: &[GridPos]) {
        for pair in path.windows(2) {
            assert_eq!(pair[0].chebyshev_distance(pair[1]), 1, "gap in {path:?}");
        }
    }

    #[test]
    fn test_simple_path() {
        let mut pathfinder = blocked(&[], 10);
        let path = pathfinder.find_path_grid(GridPos::new(0, 0), GridPos::new(5, 3));

        assert_eq!(path.first(), Some(&GridPos::new(0, 0)));
        assert_eq!(path.last(), Some(&GridPos::new(5, 3)));
        assert_eq!(path.len(), 6);
        assert_connected(&path);
    }

    #[test]
    fn test_path_to_same_cell() {
        let mut pathfinder = blocked(&[], 10);
        let path = pathfinder.find_path_grid(GridPos::new(4, 4), GridPos::new(4, 4));
        assert_eq!(path, vec![GridPos::new(4, 4)]);
    }

    #[test]
    fn test_blocked_goal() {
        let mut pathfinder = blocked(&[(5, 5)], 10);
        assert!(pathfinder
            .find_path_grid(GridPos::new(0, 0), GridPos::new(5, 5))
            .is_empty());
    }

    #[test]
    fn test_out_of_bounds() {
        let mut pathfinder = blocked(&[], 10);
        assert!(pathfinder
            .find_path_grid(GridPos::new(-1, 0), GridPos::new(5, 5))
            .is_empty());
        assert!(pathfinder
            .find_path_grid(GridPos::new(0, 0), GridPos::new(10, 5))
            .is_empty());
        assert!(!pathfinder.is_walkable(10, 0));
    }

    #[test]
    fn test_no_path_exists() {
        let wall: Vec<_> = (0..10).map(|y| (5, y)).collect();
        let mut pathfinder = blocked(&wall, 10);
        assert!(pathfinder
            .find_path_grid(GridPos::new(2, 5), GridPos::new(8, 5))
            .is_empty());
    }

    #[test]
    fn test_path_through_gap_in_ring() {
        // Square ring around (10, 10) with a single gap on the east side.
        let mut ring = Vec::new();
        for i in 6..=14 {
            ring.push((i, 6));
            ring.push((i, 14));
            ring.push((6, i));
            if i != 10 {
                ring.push((14, i));
            }
        }
        let mut pathfinder = blocked(&ring, 20);

        let path = pathfinder.find_path_grid(GridPos::new(1, 10), GridPos::new(10, 10));
        assert!(!path.is_empty());
        assert!(path.contains(&GridPos::new(14, 10)), "{path:?}");
        assert_connected(&path);
        for cell in &path {
            assert!(pathfinder.is_walkable(cell.x, cell.y));
        }
    }

    #[test]
    fn test_no_corner_cutting() {
        // Two blocked cells meeting at a corner between (0,0) and (1,1).
        let mut pathfinder = blocked(&[(1, 0), (0, 1)], 5);
        let path = pathfinder.find_path_grid(GridPos::new(0, 0), GridPos::new(1, 1));
        assert!(path.is_empty());
    }

    #[test]
    fn test_determinism_and_scratch_reuse() {
        let wall: Vec<_> = (5..15).map(|y| (10, y)).collect();
        let mut pathfinder = blocked(&wall, 20);

        let first = pathfinder.find_path_grid(GridPos::new(5, 10), GridPos::new(15, 10));
        let _ = pathfinder.find_path_grid(GridPos::new(0, 0), GridPos::new(19, 19));
        let _ = pathfinder.find_path_grid(GridPos::new(2, 2), GridPos::new(10, 10));
        let again = pathfinder.find_path_grid(GridPos::new(5, 10), GridPos::new(15, 10));

        assert!(!first.is_empty());
        assert_eq!(first, again);
    }

    #[test]
    fn test_path_to_area_stops_in_range() {
        let building = Footprint::new(8, 8, 3, 3);
        let cells: Vec<_> = building.cells().map(|c| (c.x, c.y)).collect();
        let mut pathfinder = blocked(&cells, 20);

        let path = pathfinder.find_path_to_area(GridPos::new(0, 9), building, Fixed::from_num(0.5));
        let last = *path.last().unwrap();
        assert_eq!(last.x, 7);
        assert!((8..=10).contains(&last.y), "{last:?}");
        assert_eq!(path.len(), 8);
        assert_connected(&path);

        let ranged = pathfinder.find_path_to_area(GridPos::new(0, 9), building, Fixed::from_num(3.5));
        let last = *ranged.last().unwrap();
        assert_eq!(last.x, 4);
        assert!((8..=10).contains(&last.y), "{last:?}");
        assert_eq!(ranged.len(), 5);
    }

    #[test]
    fn test_path_to_area_already_in_range() {
        let mut pathfinder = blocked(&[], 20);
        let building = Footprint::new(8, 8, 3, 3);
        let path = pathfinder.find_path_to_area(GridPos::new(7, 9), building, Fixed::from_num(0.5));
        assert_eq!(path, vec![GridPos::new(7, 9)]);
    }

    #[test]
    fn test_world_path() {
        let mut pathfinder = blocked(&[], 10);
        let grid = *pathfinder.grid();
        let start = grid.cell_center(1, 1);
        let end = grid.cell_center(4, 1);

        let path = pathfinder.find_path_in_world(start, end);
        assert_eq!(
            path,
            vec![
                grid.cell_center(2, 1),
                grid.cell_center(3, 1),
                grid.cell_center(4, 1)
            ]
        );
        assert!(pathfinder.find_path_in_world(start, start).is_empty());

        // Each orthogonal step is half the diagonal of a 64x32 tile.
        let length = path_pixel_length(start, &path);
        let step = grid.cell_center(0, 0).distance(grid.cell_center(1, 0));
        assert_eq!(length, step * Fixed::from_num(3));
    }

    #[test]
    fn test_grid_line() {
        let line = grid_line(GridPos::new(0, 0), GridPos::new(4, 0));
        assert_eq!(line.len(), 5);

        let diagonal = grid_line(GridPos::new(0, 0), GridPos::new(2, 2));
        assert_eq!(
            diagonal,
            vec![
                GridPos::new(0, 0),
                GridPos::new(1, 0),
                GridPos::new(1, 1),
                GridPos::new(2, 1),
                GridPos::new(2, 2)
            ]
        );
    }

    #[test]
    fn test_chebyshev_heuristic() {
        assert_eq!(chebyshev_heuristic(GridPos::new(0, 0), GridPos::new(5, 5)), 5);
        assert_eq!(chebyshev_heuristic(GridPos::new(0, 0), GridPos::new(3, 7)), 7);
        assert_eq!(chebyshev_heuristic(GridPos::new(5, 5), GridPos::new(5, 5)), 0);
    }

    proptest! {
        #[test]
        fn prop_empty_grid_path_is_chebyshev(
            sx in 0..20i32, sy in 0..20i32, gx in 0..20i32, gy in 0..20i32,
        ) {
            let mut pathfinder = blocked(&[], 20);
            let start = GridPos::new(sx, sy);
            let goal = GridPos::new(gx, gy);
            let path = pathfinder.find_path_grid(start, goal);
            prop_assert_eq!(path.len() as i32 - 1, start.chebyshev_distance(goal));
        }
    }
}
