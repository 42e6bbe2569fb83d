//! Grid occupancy table.
//!
//! One slot per cell holding the id of the building whose footprint covers
//! it. The table is rebuilt wholesale from the data store whenever a
//! footprint changes; it never tracks individual moves.

use crate::grid::{Footprint, GridPos};

/// Unique building id, assigned monotonically by the data store.
pub type BuildingId = u32;

/// A footprint to stamp into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    /// Owning building.
    pub id: BuildingId,
    /// Cells covered.
    pub footprint: Footprint,
    /// Whether units may walk over these cells (traps).
    pub passable: bool,
}

/// Which building, if any, covers each cell of the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyTable {
    width: i32,
    height: i32,
    cells: Vec<Option<BuildingId>>,
    passable: Vec<bool>,
}

impl OccupancyTable {
    /// Create an empty table.
    ///
    /// # Panics
    ///
    /// Panics if a dimension is not positive.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "OccupancyTable dimensions must be positive");
        let count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![None; count],
            passable: vec![true; count],
        }
    }

    /// Width in cells.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    const fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y)
            .then(|| (y as usize) * (self.width as usize) + (x as usize))
    }

    /// Empty every cell.
    pub fn clear(&mut self) {
        self.cells.fill(None);
        self.passable.fill(true);
    }

    /// Clear the table and stamp every occupant into it.
    ///
    /// A cell maps to at most one building; when footprints overlap the
    /// first occupant keeps the cell.
    pub fn rebuild<I>(&mut self, occupants: I)
    where
        I: IntoIterator<Item = Occupant>,
    {
        self.clear();
        let mut count = 0usize;
        for occupant in occupants {
            self.stamp(&occupant);
            count += 1;
        }
        tracing::debug!(occupants = count, "Rebuilt occupancy table");
    }

    fn stamp(&mut self, occupant: &Occupant) {
        for cell in occupant.footprint.cells() {
            let Some(index) = self.index(cell.x, cell.y) else {
                tracing::warn!(
                    building = occupant.id,
                    x = cell.x,
                    y = cell.y,
                    "Footprint cell outside the map"
                );
                continue;
            };
            match self.cells[index] {
                None => {
                    self.cells[index] = Some(occupant.id);
                    self.passable[index] = occupant.passable;
                }
                Some(existing) if existing != occupant.id => {
                    tracing::warn!(
                        building = occupant.id,
                        existing,
                        x = cell.x,
                        y = cell.y,
                        "Overlapping footprints"
                    );
                }
                Some(_) => {}
            }
        }
    }

    /// Building covering the cell, if any. Out-of-bounds cells are empty.
    #[must_use]
    pub fn building_at(&self, x: i32, y: i32) -> Option<BuildingId> {
        self.index(x, y).and_then(|i| self.cells[i])
    }

    /// Whether a building covers the cell.
    #[must_use]
    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        self.building_at(x, y).is_some()
    }

    /// Whether units can stand on the cell: in bounds and either empty or
    /// covered by a passable building.
    #[must_use]
    pub fn is_passable(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|i| self.passable[i])
    }

    /// True iff any cell of the rectangle is out of bounds or covered by a
    /// building other than `ignore`.
    #[must_use]
    pub fn is_area_occupied(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        ignore: Option<BuildingId>,
    ) -> bool {
        if width <= 0 || height <= 0 {
            return true;
        }
        let area = Footprint::new(x, y, width, height);
        let occupied = area.cells().any(|cell| match self.index(cell.x, cell.y) {
            None => true,
            Some(i) => self.cells[i].is_some_and(|id| Some(id) != ignore),
        });
        occupied
    }

    /// Every cell covered by `id`, in row-major order.
    pub fn cells_of(&self, id: BuildingId) -> impl Iterator<Item = GridPos> + '_ {
        let width = self.width as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, slot)| **slot == Some(id))
            .map(move |(i, _)| GridPos::new((i % width) as i32, (i / width) as i32))
    }

    /// Number of covered cells.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn occupant(id: BuildingId, x: i32, y: i32, size: i32) -> Occupant {
        Occupant {
            id,
            footprint: Footprint::new(x, y, size, size),
            passable: false,
        }
    }

    #[test]
    fn test_empty_table() {
        let table = OccupancyTable::new(10, 10);
        assert!(!table.is_area_occupied(0, 0, 10, 10, None));
        assert_eq!(table.occupied_count(), 0);
        assert!(table.is_passable(3, 3));
    }

    #[test]
    fn test_out_of_bounds_is_occupied() {
        let table = OccupancyTable::new(10, 10);
        assert!(table.is_area_occupied(-1, 0, 2, 2, None));
        assert!(table.is_area_occupied(9, 9, 2, 1, None));
        assert!(table.is_area_occupied(0, 0, 0, 3, None));
        assert!(!table.is_passable(10, 0));
    }

    #[test]
    fn test_ignore_id() {
        let mut table = OccupancyTable::new(10, 10);
        table.rebuild([occupant(7, 2, 2, 3)]);

        assert!(table.is_area_occupied(3, 3, 1, 1, None));
        assert!(!table.is_area_occupied(2, 2, 3, 3, Some(7)));
        assert!(table.is_area_occupied(2, 2, 3, 3, Some(8)));
    }

    #[test]
    fn test_rebuild_replaces_previous_contents() {
        let mut table = OccupancyTable::new(10, 10);
        table.rebuild([occupant(1, 0, 0, 2)]);
        table.rebuild([occupant(2, 5, 5, 2)]);

        assert_eq!(table.building_at(0, 0), None);
        assert_eq!(table.building_at(6, 6), Some(2));
        assert_eq!(table.occupied_count(), 4);
    }

    #[test]
    fn test_first_occupant_keeps_overlapping_cells() {
        let mut table = OccupancyTable::new(10, 10);
        table.rebuild([occupant(1, 0, 0, 3), occupant(2, 2, 2, 3)]);

        assert_eq!(table.building_at(2, 2), Some(1));
        assert_eq!(table.building_at(3, 3), Some(2));
    }

    #[test]
    fn test_passable_occupants() {
        let mut table = OccupancyTable::new(10, 10);
        table.rebuild([Occupant {
            id: 4,
            footprint: Footprint::new(5, 5, 1, 1),
            passable: true,
        }]);

        assert!(table.is_occupied(5, 5));
        assert!(table.is_passable(5, 5));
        assert!(table.is_area_occupied(5, 5, 1, 1, None));
    }

    #[test]
    fn test_cells_of() {
        let mut table = OccupancyTable::new(10, 10);
        table.rebuild([occupant(3, 1, 1, 2)]);
        let cells: Vec<_> = table.cells_of(3).collect();
        assert_eq!(
            cells,
            vec![
                GridPos::new(1, 1),
                GridPos::new(2, 1),
                GridPos::new(1, 2),
                GridPos::new(2, 2)
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_footprint_occupies_exactly_its_cells(
            x in 0..40i32,
            y in 0..40i32,
            w in 1..5i32,
            h in 1..5i32,
        ) {
            let mut table = OccupancyTable::new(44, 44);
            let footprint = Footprint::new(x, y, w, h);
            table.rebuild([Occupant { id: 1, footprint, passable: false }]);

            for cy in 0..44 {
                for cx in 0..44 {
                    let expected = footprint.contains(GridPos::new(cx, cy));
                    prop_assert_eq!(table.is_area_occupied(cx, cy, 1, 1, None), expected);
                }
            }
        }
    }
}
