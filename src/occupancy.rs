use serde::{Deserialize, Serialize};

use crate::error::PackError;
use crate::free_rects::{FreeRect, FreeRectIndex};
use crate::placement::PlacementPolicy;
use crate::types::Rect;

/// Bins up to this many cells get a dense grid when the index is `Auto`.
pub const DENSE_GRID_AUTO_CELLS: u64 = 1 << 20;
/// Hard ceiling for an explicitly requested dense grid.
pub const DENSE_GRID_MAX_CELLS: u64 = 1 << 26;

/// Tracks which unit cells of a bin are taken.
///
/// Both backings answer `is_free` exactly, so the same placement policy makes
/// the same decisions whichever one a bin uses.
pub trait OccupancyIndex {
    fn size(&self) -> Rect;

    /// True iff `[x, x+w) x [y, y+h)` lies inside the bin and no cell in it is
    /// occupied.
    fn is_free(&self, x: u32, y: u32, w: u32, h: u32) -> bool;

    /// Marks a free region as occupied. Regions are never released.
    fn mark_occupied(&mut self, x: u32, y: u32, w: u32, h: u32);

    /// The lowest `(x, y)` in x-major order where `piece` fits unrotated.
    fn first_fit(&self, piece: Rect) -> Option<(u32, u32)>;
}

pub(crate) fn in_bounds(size: Rect, x: u32, y: u32, w: u32, h: u32) -> bool {
    x as u64 + w as u64 <= size.w as u64 && y as u64 + h as u64 <= size.h as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    #[default]
    Auto,
    DenseGrid,
    FreeRects,
}

impl IndexKind {
    /// Picks the concrete backing for a bin of `size` under `policy`.
    pub fn resolve(self, size: Rect, policy: PlacementPolicy) -> Result<IndexKind, PackError> {
        let cells = size.area();
        match self {
            IndexKind::Auto => {
                if policy.is_best_fit() || cells > DENSE_GRID_AUTO_CELLS {
                    Ok(IndexKind::FreeRects)
                } else {
                    Ok(IndexKind::DenseGrid)
                }
            }
            IndexKind::DenseGrid => {
                if policy.is_best_fit() {
                    return Err(PackError::InvalidConfig(format!(
                        "{policy:?} needs the free-rects index, not dense-grid"
                    )));
                }
                if cells > DENSE_GRID_MAX_CELLS {
                    return Err(PackError::InvalidConfig(format!(
                        "bin {size} has {cells} cells, too many for a dense grid"
                    )));
                }
                Ok(IndexKind::DenseGrid)
            }
            IndexKind::FreeRects => Ok(IndexKind::FreeRects),
        }
    }
}

/// Boolean cell grid, row-major. Every query walks the cells it covers.
#[derive(Clone)]
pub struct DenseGrid {
    size: Rect,
    cells: Vec<bool>,
}

impl DenseGrid {
    pub fn new(size: Rect) -> Self {
        Self {
            size,
            cells: vec![false; size.area() as usize],
        }
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    fn row(&self, y: u32, x: u32, w: u32) -> &[bool] {
        let start = y as usize * self.size.w as usize + x as usize;
        &self.cells[start..start + w as usize]
    }

    /// Highest row inside the region holding an occupied cell.
    fn blocking_row(&self, x: u32, y: u32, w: u32, h: u32) -> Option<u32> {
        (y..y + h).rev().find(|&row| self.row(row, x, w).iter().any(|&c| c))
    }
}

impl std::fmt::Debug for DenseGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseGrid")
            .field("size", &self.size)
            .field("occupied", &self.occupied_cells())
            .finish()
    }
}

impl OccupancyIndex for DenseGrid {
    fn size(&self) -> Rect {
        self.size
    }

    fn is_free(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        in_bounds(self.size, x, y, w, h) && self.blocking_row(x, y, w, h).is_none()
    }

    fn mark_occupied(&mut self, x: u32, y: u32, w: u32, h: u32) {
        debug_assert!(self.is_free(x, y, w, h), "region {w}x{h} @ ({x},{y}) not free");
        let width = self.size.w as usize;
        for row in y..y + h {
            let start = row as usize * width + x as usize;
            self.cells[start..start + w as usize].fill(true);
        }
    }

    fn first_fit(&self, piece: Rect) -> Option<(u32, u32)> {
        if !piece.fits_in(&self.size) {
            return None;
        }
        for x in 0..=self.size.w - piece.w {
            let mut y = 0;
            while y + piece.h <= self.size.h {
                match self.blocking_row(x, y, piece.w, piece.h) {
                    None => return Some((x, y)),
                    // every start row up to the blocker overlaps it
                    Some(row) => y = row + 1,
                }
            }
        }
        None
    }
}

/// The index a bin owns, dispatched over the two backings.
#[derive(Debug, Clone)]
pub enum Occupancy {
    Grid(DenseGrid),
    FreeRects(FreeRectIndex),
}

impl Occupancy {
    /// `kind` should already be resolved; `Auto` falls back to the size rule.
    pub fn new(kind: IndexKind, size: Rect) -> Self {
        match kind {
            IndexKind::DenseGrid => Occupancy::Grid(DenseGrid::new(size)),
            IndexKind::FreeRects => Occupancy::FreeRects(FreeRectIndex::new(size)),
            IndexKind::Auto if size.area() <= DENSE_GRID_AUTO_CELLS => {
                Occupancy::Grid(DenseGrid::new(size))
            }
            IndexKind::Auto => Occupancy::FreeRects(FreeRectIndex::new(size)),
        }
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            Occupancy::Grid(_) => IndexKind::DenseGrid,
            Occupancy::FreeRects(_) => IndexKind::FreeRects,
        }
    }

    /// The maximal free rectangles, if this backing keeps them.
    pub fn free_rects(&self) -> Option<&[FreeRect]> {
        match self {
            Occupancy::Grid(_) => None,
            Occupancy::FreeRects(index) => Some(index.free_rects()),
        }
    }
}

impl OccupancyIndex for Occupancy {
    fn size(&self) -> Rect {
        match self {
            Occupancy::Grid(g) => g.size(),
            Occupancy::FreeRects(f) => f.size(),
        }
    }

    fn is_free(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        match self {
            Occupancy::Grid(g) => g.is_free(x, y, w, h),
            Occupancy::FreeRects(f) => f.is_free(x, y, w, h),
        }
    }

    fn mark_occupied(&mut self, x: u32, y: u32, w: u32, h: u32) {
        match self {
            Occupancy::Grid(g) => g.mark_occupied(x, y, w, h),
            Occupancy::FreeRects(f) => f.mark_occupied(x, y, w, h),
        }
    }

    fn first_fit(&self, piece: Rect) -> Option<(u32, u32)> {
        match self {
            Occupancy::Grid(g) => g.first_fit(piece),
            Occupancy::FreeRects(f) => f.first_fit(piece),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_grid_is_free_and_mark() {
        let mut grid = DenseGrid::new(Rect::new(10, 10));
        assert!(grid.is_free(0, 0, 10, 10));
        assert!(!grid.is_free(5, 5, 6, 1));
        grid.mark_occupied(2, 3, 4, 4);
        assert!(!grid.is_free(0, 0, 3, 4));
        assert!(grid.is_free(0, 0, 2, 10));
        assert!(grid.is_free(6, 0, 4, 10));
        assert_eq!(grid.occupied_cells(), 16);
    }

    #[test]
    fn test_is_free_is_idempotent() {
        let mut grid = DenseGrid::new(Rect::new(8, 8));
        grid.mark_occupied(0, 0, 3, 3);
        let first = grid.is_free(2, 2, 2, 2);
        for _ in 0..5 {
            assert_eq!(grid.is_free(2, 2, 2, 2), first);
        }
    }

    #[test]
    fn test_grid_first_fit_scans_x_major() {
        let mut grid = DenseGrid::new(Rect::new(10, 10));
        grid.mark_occupied(0, 0, 4, 4);
        // column 0 still has room above the block
        assert_eq!(grid.first_fit(Rect::new(4, 4)), Some((0, 4)));
        grid.mark_occupied(0, 4, 4, 4);
        assert_eq!(grid.first_fit(Rect::new(4, 4)), Some((4, 0)));
        assert_eq!(grid.first_fit(Rect::new(11, 1)), None);
    }

    #[test]
    fn test_resolve_index_kind() {
        let small = Rect::new(100, 100);
        let large = Rect::new(4000, 12000);
        assert_eq!(
            IndexKind::Auto.resolve(small, PlacementPolicy::FirstFit),
            Ok(IndexKind::DenseGrid)
        );
        assert_eq!(
            IndexKind::Auto.resolve(large, PlacementPolicy::FirstFit),
            Ok(IndexKind::FreeRects)
        );
        assert_eq!(
            IndexKind::Auto.resolve(small, PlacementPolicy::BestAreaFit),
            Ok(IndexKind::FreeRects)
        );
        assert!(
            IndexKind::DenseGrid
                .resolve(small, PlacementPolicy::BestShortSideFit)
                .is_err()
        );
        assert!(
            IndexKind::DenseGrid
                .resolve(Rect::new(100_000, 100_000), PlacementPolicy::FirstFit)
                .is_err()
        );
    }

    /// Random sequences of first-fit placements must agree between backings.
    #[test]
    fn test_backings_agree() {
        let size = Rect::new(40, 30);
        let mut rng = SmallRng::seed_from_u64(7);
        let mut grid = Occupancy::new(IndexKind::DenseGrid, size);
        let mut free = Occupancy::new(IndexKind::FreeRects, size);

        for _ in 0..200 {
            let piece = Rect::new(rng.random_range(1..=9), rng.random_range(1..=9));
            let a = grid.first_fit(piece);
            let b = free.first_fit(piece);
            assert_eq!(a, b, "first fit differs for {piece}");

            let (qx, qy) = (rng.random_range(0..size.w), rng.random_range(0..size.h));
            assert_eq!(
                grid.is_free(qx, qy, piece.w, piece.h),
                free.is_free(qx, qy, piece.w, piece.h),
                "is_free differs for {piece} @ ({qx},{qy})"
            );

            if let Some((x, y)) = a {
                grid.mark_occupied(x, y, piece.w, piece.h);
                free.mark_occupied(x, y, piece.w, piece.h);
            }
        }
    }
}
