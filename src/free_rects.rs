use crate::occupancy::{OccupancyIndex, in_bounds};
use crate::types::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRect {
    pub x: u32,
    pub y: u32,
    pub rect: Rect,
}

impl FreeRect {
    fn right(&self) -> u32 {
        self.x + self.rect.w
    }

    fn top(&self) -> u32 {
        self.y + self.rect.h
    }

    pub fn contains_region(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        x >= self.x
            && y >= self.y
            && x as u64 + w as u64 <= self.right() as u64
            && y as u64 + h as u64 <= self.top() as u64
    }

    fn contains(&self, other: &FreeRect) -> bool {
        self.contains_region(other.x, other.y, other.rect.w, other.rect.h)
    }

    fn intersects(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        x < self.right() && self.x < x + w && y < self.top() && self.y < y + h
    }
}

/// Free space kept as the list of maximal free rectangles.
///
/// The list may contain overlapping entries, but every free axis-aligned
/// region lies inside at least one of them, which keeps `is_free` exact
/// without touching individual cells.
#[derive(Debug, Clone)]
pub struct FreeRectIndex {
    size: Rect,
    free_rects: Vec<FreeRect>,
}

impl FreeRectIndex {
    pub fn new(size: Rect) -> Self {
        Self {
            size,
            free_rects: vec![FreeRect {
                x: 0,
                y: 0,
                rect: size,
            }],
        }
    }

    pub fn free_rects(&self) -> &[FreeRect] {
        &self.free_rects
    }

    /// Cuts the occupied region out of `free`, leaving the maximal strips to
    /// its left, right, bottom and top.
    fn split(free: FreeRect, x: u32, y: u32, w: u32, h: u32, out: &mut Vec<FreeRect>) {
        if x > free.x {
            out.push(FreeRect {
                x: free.x,
                y: free.y,
                rect: Rect::new(x - free.x, free.rect.h),
            });
        }
        if x + w < free.right() {
            out.push(FreeRect {
                x: x + w,
                y: free.y,
                rect: Rect::new(free.right() - (x + w), free.rect.h),
            });
        }
        if y > free.y {
            out.push(FreeRect {
                x: free.x,
                y: free.y,
                rect: Rect::new(free.rect.w, y - free.y),
            });
        }
        if y + h < free.top() {
            out.push(FreeRect {
                x: free.x,
                y: y + h,
                rect: Rect::new(free.rect.w, free.top() - (y + h)),
            });
        }
    }

    /// Drops every rectangle contained in another one. Of two equal entries
    /// the later survives.
    fn prune(&mut self) {
        let n = self.free_rects.len();
        let mut keep = vec![true; n];
        for i in 0..n {
            for j in 0..n {
                if i != j && keep[j] && self.free_rects[j].contains(&self.free_rects[i]) {
                    keep[i] = false;
                    break;
                }
            }
        }
        let mut flags = keep.into_iter();
        self.free_rects.retain(|_| flags.next().unwrap_or(false));
    }
}

impl OccupancyIndex for FreeRectIndex {
    fn size(&self) -> Rect {
        self.size
    }

    fn is_free(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        in_bounds(self.size, x, y, w, h)
            && self
                .free_rects
                .iter()
                .any(|f| f.contains_region(x, y, w, h))
    }

    fn mark_occupied(&mut self, x: u32, y: u32, w: u32, h: u32) {
        debug_assert!(self.is_free(x, y, w, h), "region {w}x{h} @ ({x},{y}) not free");
        let mut residuals = Vec::new();
        self.free_rects.retain(|f| {
            if f.intersects(x, y, w, h) {
                Self::split(*f, x, y, w, h, &mut residuals);
                false
            } else {
                true
            }
        });
        self.free_rects.extend(residuals);
        self.prune();
    }

    fn first_fit(&self, piece: Rect) -> Option<(u32, u32)> {
        // a hosting free rectangle's corner is itself feasible and no feasible
        // position sits below-left of every host corner
        self.free_rects
            .iter()
            .filter(|f| piece.fits_in(&f.rect))
            .map(|f| (f.x, f.y))
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_single_piece() {
        let mut index = FreeRectIndex::new(Rect::new(100, 100));
        assert_eq!(index.first_fit(Rect::new(50, 30)), Some((0, 0)));
        index.mark_occupied(0, 0, 50, 30);
        // right strip spans the full height, top strip the full width
        assert_eq!(index.free_rects().len(), 2);
        assert!(index.is_free(50, 0, 50, 100));
        assert!(index.is_free(0, 30, 100, 70));
        assert!(!index.is_free(49, 29, 2, 2));
    }

    #[test]
    fn test_piece_too_large() {
        let index = FreeRectIndex::new(Rect::new(100, 100));
        assert!(index.first_fit(Rect::new(200, 50)).is_none());
        assert!(!index.is_free(0, 0, 101, 1));
    }

    #[test]
    fn test_fill_exact() {
        let mut index = FreeRectIndex::new(Rect::new(100, 100));
        index.mark_occupied(0, 0, 100, 100);
        assert!(index.free_rects().is_empty());
        assert!(index.first_fit(Rect::new(1, 1)).is_none());
    }

    #[test]
    fn test_interior_hole_keeps_four_strips() {
        let mut index = FreeRectIndex::new(Rect::new(10, 10));
        index.mark_occupied(4, 4, 2, 2);
        assert_eq!(index.free_rects().len(), 4);
        assert!(index.is_free(0, 0, 4, 10));
        assert!(index.is_free(0, 6, 10, 4));
        assert!(!index.is_free(3, 3, 2, 2));
        assert_eq!(index.first_fit(Rect::new(10, 4)), Some((0, 0)));
        assert_eq!(index.first_fit(Rect::new(4, 4)), Some((0, 0)));
        assert_eq!(index.first_fit(Rect::new(5, 5)), None);
    }

    #[test]
    fn test_is_free_is_idempotent() {
        let mut index = FreeRectIndex::new(Rect::new(20, 20));
        index.mark_occupied(0, 0, 6, 9);
        index.mark_occupied(6, 0, 5, 4);
        index.mark_occupied(12, 10, 3, 3);
        let queries = [(6, 4, 5, 5), (5, 8, 2, 2), (11, 0, 9, 10), (0, 9, 20, 11)];
        let first: Vec<bool> = queries
            .iter()
            .map(|&(x, y, w, h)| index.is_free(x, y, w, h))
            .collect();
        assert_eq!(first, vec![true, false, true, false]);
        for _ in 0..5 {
            for (&(x, y, w, h), &expected) in queries.iter().zip(&first) {
                assert_eq!(index.is_free(x, y, w, h), expected);
            }
        }
    }

    #[test]
    fn test_prune_removes_contained() {
        let mut index = FreeRectIndex::new(Rect::new(10, 10));
        index.mark_occupied(0, 0, 5, 5);
        index.mark_occupied(5, 0, 5, 5);
        // the two bottom blocks leave one full-width strip on top
        assert_eq!(
            index.free_rects(),
            &[FreeRect {
                x: 0,
                y: 5,
                rect: Rect::new(10, 5)
            }]
        );
    }
}
