//! Isometric grid coordinate system.
//!
//! Maps integer grid cells to world (pixel) positions and back. The
//! projection is a standard 2:1 diamond:
//!
//! ```text
//! world_x = origin_x + (grid_x - grid_y) * half_tile_width
//! world_y = origin_y + (grid_x + grid_y) * half_tile_height
//! ```
//!
//! Grid point (0, 0) sits at `origin`, the top corner of the diamond map.
//! A cell `(x, y)` covers the continuous grid square `[x, x + 1) × [y, y + 1)`;
//! its centre is the grid point `(x + ½, y + ½)`.
//!
//! With the default tile size both half extents are powers of two, so the
//! forward and inverse transforms are exact in fixed point.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Default map width in cells.
pub const GRID_WIDTH: i32 = 44;

/// Default map height in cells.
pub const GRID_HEIGHT: i32 = 44;

/// Integer cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridPos {
    /// Create a new cell position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (king-move) distance, the step count on an 8-connected grid.
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Manhattan distance, the step count on a 4-connected grid.
    #[must_use]
    pub fn manhattan_distance(self, other: Self) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Continuous (sub-cell) grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridPoint {
    /// Fractional column.
    pub x: Fixed,
    /// Fractional row.
    pub y: Fixed,
}

impl GridPoint {
    /// Create a new continuous grid point.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }
}

/// A rectangular block of cells anchored at its bottom-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    /// Anchor column.
    pub x: i32,
    /// Anchor row.
    pub y: i32,
    /// Width in cells.
    pub width: i32,
    /// Height in cells.
    pub height: i32,
}

impl Footprint {
    /// Create a footprint.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the cell lies inside the footprint.
    #[must_use]
    pub const fn contains(&self, cell: GridPos) -> bool {
        cell.x >= self.x
            && cell.x < self.x + self.width
            && cell.y >= self.y
            && cell.y < self.y + self.height
    }

    /// Whether two footprints share at least one cell.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Iterate every cell of the footprint in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        (self.y..self.y + self.height)
            .flat_map(move |y| (self.x..self.x + self.width).map(move |x| GridPos::new(x, y)))
    }

    /// Continuous grid point at the centre of the footprint.
    #[must_use]
    pub fn center(&self) -> GridPoint {
        GridPoint::new(
            Fixed::from_num(self.x) + Fixed::from_num(self.width) / Fixed::from_num(2),
            Fixed::from_num(self.y) + Fixed::from_num(self.height) / Fixed::from_num(2),
        )
    }

    /// Squared distance in cell units from a grid point to the nearest
    /// point of the footprint; zero when the point is inside.
    #[must_use]
    pub fn distance_squared_to(&self, point: GridPoint) -> Fixed {
        let axis_gap = |value: Fixed, start: i32, len: i32| {
            let lo = Fixed::from_num(start);
            let hi = Fixed::from_num(start + len);
            if value < lo {
                lo - value
            } else if value > hi {
                value - hi
            } else {
                Fixed::ZERO
            }
        };
        let dx = axis_gap(point.x, self.x, self.width);
        let dy = axis_gap(point.y, self.y, self.height);
        dx * dx + dy * dy
    }

    /// Whether a grid point is within `range` cells of the footprint edge.
    #[must_use]
    pub fn is_within_range(&self, point: GridPoint, range: Fixed) -> bool {
        self.distance_squared_to(point) <= range * range
    }
}

/// The isometric projection and the map bounds it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoGrid {
    /// Map width in cells.
    width: i32,
    /// Map height in cells.
    height: i32,
    /// World position of grid point (0, 0).
    origin: Vec2Fixed,
    /// Half the tile's pixel width.
    #[serde(with = "fixed_serde")]
    half_tile_width: Fixed,
    /// Half the tile's pixel height.
    #[serde(with = "fixed_serde")]
    half_tile_height: Fixed,
}

impl Default for IsoGrid {
    /// 44×44 map of 64×32 pixel tiles, anchored so every cell has positive
    /// world coordinates.
    fn default() -> Self {
        Self::new(
            GRID_WIDTH,
            GRID_HEIGHT,
            Vec2Fixed::from_ints(GRID_HEIGHT * 32, 64),
            Fixed::from_num(32),
            Fixed::from_num(16),
        )
    }
}

impl IsoGrid {
    /// Create a projection.
    ///
    /// # Panics
    ///
    /// Panics if a dimension or tile extent is not positive.
    #[must_use]
    pub fn new(
        width: i32,
        height: i32,
        origin: Vec2Fixed,
        half_tile_width: Fixed,
        half_tile_height: Fixed,
    ) -> Self {
        assert!(width > 0 && height > 0, "IsoGrid dimensions must be positive");
        assert!(
            half_tile_width > Fixed::ZERO && half_tile_height > Fixed::ZERO,
            "IsoGrid tile size must be positive"
        );
        Self {
            width,
            height,
            origin,
            half_tile_width,
            half_tile_height,
        }
    }

    /// Map width in cells.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Map height in cells.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Half tile width in pixels.
    #[must_use]
    pub const fn half_tile_width(&self) -> Fixed {
        self.half_tile_width
    }

    /// A cell is valid iff `0 <= x < width` and `0 <= y < height`.
    #[must_use]
    pub const fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    /// Whether the whole footprint lies on the map.
    #[must_use]
    pub const fn footprint_in_bounds(&self, footprint: &Footprint) -> bool {
        footprint.width > 0
            && footprint.height > 0
            && self.in_bounds(footprint.x, footprint.y)
            && self.in_bounds(
                footprint.x + footprint.width - 1,
                footprint.y + footprint.height - 1,
            )
    }

    /// World position of the integer grid point `(x, y)`.
    #[must_use]
    pub fn grid_to_pixel(&self, x: i32, y: i32) -> Vec2Fixed {
        self.grid_point_to_pixel(GridPoint::new(Fixed::from_num(x), Fixed::from_num(y)))
    }

    /// World position of a continuous grid point.
    #[must_use]
    pub fn grid_point_to_pixel(&self, point: GridPoint) -> Vec2Fixed {
        Vec2Fixed::new(
            self.origin.x + (point.x - point.y) * self.half_tile_width,
            self.origin.y + (point.x + point.y) * self.half_tile_height,
        )
    }

    /// World position of the centre of cell `(x, y)`.
    #[must_use]
    pub fn cell_center(&self, x: i32, y: i32) -> Vec2Fixed {
        let half = Fixed::from_num(0.5);
        self.grid_point_to_pixel(GridPoint::new(
            Fixed::from_num(x) + half,
            Fixed::from_num(y) + half,
        ))
    }

    /// World position of the centre of a footprint.
    #[must_use]
    pub fn footprint_center(&self, footprint: &Footprint) -> Vec2Fixed {
        self.grid_point_to_pixel(footprint.center())
    }

    /// Unrounded inverse projection, for sub-cell interpolation.
    #[must_use]
    pub fn pixel_to_grid_exact(&self, pos: Vec2Fixed) -> GridPoint {
        let u = (pos.x - self.origin.x) / self.half_tile_width;
        let v = (pos.y - self.origin.y) / self.half_tile_height;
        let two = Fixed::from_num(2);
        GridPoint::new((v + u) / two, (v - u) / two)
    }

    /// Nearest integer grid point to a world position.
    ///
    /// Exact inverse of [`grid_to_pixel`](Self::grid_to_pixel). The result
    /// may be out of bounds; check with [`in_bounds`](Self::in_bounds).
    #[must_use]
    pub fn pixel_to_grid(&self, pos: Vec2Fixed) -> GridPos {
        let point = self.pixel_to_grid_exact(pos);
        GridPos::new(point.x.round().to_num(), point.y.round().to_num())
    }

    /// The cell containing a world position.
    ///
    /// Inverse of [`cell_center`](Self::cell_center); this is what unit
    /// movement and pathfinding use to decide which cell a unit stands in.
    #[must_use]
    pub fn pixel_to_cell(&self, pos: Vec2Fixed) -> GridPos {
        let point = self.pixel_to_grid_exact(pos);
        GridPos::new(point.x.floor().to_num(), point.y.floor().to_num())
    }
}
