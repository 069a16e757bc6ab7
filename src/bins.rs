use crate::occupancy::{IndexKind, Occupancy, OccupancyIndex};
use crate::placement::Position;
use crate::types::{Placement, Rect};

/// One opened bin. Placements are kept in the order they were made and the
/// occupancy index always reflects exactly those placements.
#[derive(Debug, Clone)]
pub struct Bin {
    index: usize,
    size: Rect,
    occupancy: Occupancy,
    placements: Vec<Placement>,
}

impl Bin {
    pub fn new(index: usize, size: Rect, kind: IndexKind) -> Self {
        Self {
            index,
            size,
            occupancy: Occupancy::new(kind, size),
            placements: Vec::new(),
        }
    }

    /// Rebuilds a bin from a placement list, checking each placement against
    /// the ones before it. `None` if any of them collides or leaves the bin.
    pub fn from_placements(
        index: usize,
        size: Rect,
        kind: IndexKind,
        placements: impl IntoIterator<Item = Placement>,
    ) -> Option<Self> {
        let mut bin = Self::new(index, size, kind);
        for p in placements {
            if !bin.occupancy.is_free(p.x, p.y, p.rect.w, p.rect.h) {
                return None;
            }
            bin.place(
                p.type_id,
                Position {
                    x: p.x,
                    y: p.y,
                    rect: p.rect,
                    rotated: p.rotated,
                },
            );
        }
        Some(bin)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn size(&self) -> Rect {
        self.size
    }

    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Records a placement found by the placement search and marks its cells.
    pub fn place(&mut self, type_id: u32, pos: Position) -> Placement {
        self.occupancy
            .mark_occupied(pos.x, pos.y, pos.rect.w, pos.rect.h);
        let placement = Placement {
            type_id,
            bin_index: self.index,
            x: pos.x,
            y: pos.y,
            rect: pos.rect,
            rotated: pos.rotated,
        };
        self.placements.push(placement);
        placement
    }

    /// The same bin with the placements at `skip` removed and the index
    /// rebuilt from the rest.
    pub fn without(&self, skip: &[usize]) -> Bin {
        let kept = self
            .placements
            .iter()
            .enumerate()
            .filter(|(i, _)| !skip.contains(i))
            .map(|(_, p)| *p);
        Self::from_placements(self.index, self.size, self.occupancy.kind(), kept)
            .expect("a subset of a valid layout stays valid")
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
        for p in &mut self.placements {
            p.bin_index = index;
        }
    }

    pub fn used_area(&self) -> u64 {
        self.placements.iter().map(|p| p.rect.area()).sum()
    }

    pub fn waste_area(&self) -> u64 {
        self.size.area() - self.used_area()
    }

    pub fn utilization(&self) -> f64 {
        self.used_area() as f64 / self.size.area() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(type_id: u32, x: u32, y: u32, w: u32, h: u32) -> Placement {
        Placement {
            type_id,
            bin_index: 0,
            x,
            y,
            rect: Rect::new(w, h),
            rotated: false,
        }
    }

    #[test]
    fn test_place_tracks_area() {
        let mut bin = Bin::new(3, Rect::new(10, 10), IndexKind::DenseGrid);
        let p = bin.place(
            9,
            Position {
                x: 0,
                y: 0,
                rect: Rect::new(4, 4),
                rotated: false,
            },
        );
        assert_eq!(p.bin_index, 3);
        assert_eq!(bin.used_area(), 16);
        assert_eq!(bin.waste_area(), 84);
        assert!((bin.utilization() - 0.16).abs() < 1e-9);
        assert!(!bin.occupancy().is_free(3, 3, 1, 1));
    }

    #[test]
    fn test_from_placements_rejects_overlap() {
        let size = Rect::new(10, 10);
        let ok = [at(1, 0, 0, 5, 5), at(2, 5, 0, 5, 5)];
        assert!(Bin::from_placements(0, size, IndexKind::FreeRects, ok).is_some());

        let clash = [at(1, 0, 0, 5, 5), at(2, 4, 4, 5, 5)];
        assert!(Bin::from_placements(0, size, IndexKind::FreeRects, clash).is_none());

        let outside = [at(1, 8, 0, 5, 5)];
        assert!(Bin::from_placements(0, size, IndexKind::DenseGrid, outside).is_none());
    }

    #[test]
    fn test_without_frees_cells_and_keeps_order() {
        let size = Rect::new(10, 10);
        let bin = Bin::from_placements(
            0,
            size,
            IndexKind::DenseGrid,
            [at(1, 0, 0, 5, 5), at(2, 5, 0, 5, 5), at(3, 0, 5, 5, 5)],
        )
        .unwrap();
        let smaller = bin.without(&[1]);
        let ids: Vec<u32> = smaller.placements().iter().map(|p| p.type_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(smaller.occupancy().is_free(5, 0, 5, 5));
        assert!(!smaller.occupancy().is_free(0, 5, 5, 5));
    }
}
