use serde::{Deserialize, Serialize};

use crate::free_rects::FreeRect;
use crate::occupancy::{Occupancy, OccupancyIndex};
use crate::types::Rect;

/// How a position is chosen for a piece inside one bin.
///
/// `FirstFit` takes the lowest position in x-major scan order, trying the
/// unrotated orientation over the whole bin before the rotated one. The
/// best-fit variants score every free rectangle able to host the piece in
/// either orientation and keep the lowest score, earliest free rectangle
/// first on ties; they need the free-rects index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(clippy::enum_variant_names)]
pub enum PlacementPolicy {
    #[default]
    FirstFit,
    /// Minimal leftover area of the hosting free rectangle.
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
}

impl PlacementPolicy {
    pub fn is_best_fit(self) -> bool {
        !matches!(self, PlacementPolicy::FirstFit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: u32,
    pub y: u32,
    pub rect: Rect,
    pub rotated: bool,
}

#[derive(Debug, Clone, Copy)]
struct ScoredPlacement {
    free_idx: usize,
    rotated: bool,
    score: (u64, u64),
}

/// Finds where `piece` goes in the bin tracked by `occupancy`. `None` means
/// the bin cannot take it, which callers treat as "try another bin".
pub fn find_position(
    occupancy: &Occupancy,
    piece: Rect,
    allow_rotate: bool,
    policy: PlacementPolicy,
) -> Option<Position> {
    match (policy, occupancy.free_rects()) {
        (PlacementPolicy::FirstFit, _) => first_fit(occupancy, piece, allow_rotate),
        (_, Some(free_rects)) => best_fit(free_rects, piece, allow_rotate, policy),
        (_, None) => {
            debug_assert!(false, "{policy:?} used without a free-rects index");
            first_fit(occupancy, piece, allow_rotate)
        }
    }
}

fn first_fit(occupancy: &Occupancy, piece: Rect, allow_rotate: bool) -> Option<Position> {
    if let Some((x, y)) = occupancy.first_fit(piece) {
        return Some(Position {
            x,
            y,
            rect: piece,
            rotated: false,
        });
    }
    if !allow_rotate || piece.is_square() {
        return None;
    }
    let turned = piece.rotated();
    occupancy.first_fit(turned).map(|(x, y)| Position {
        x,
        y,
        rect: turned,
        rotated: true,
    })
}

fn best_fit(
    free_rects: &[FreeRect],
    piece: Rect,
    allow_rotate: bool,
    policy: PlacementPolicy,
) -> Option<Position> {
    let mut best: Option<ScoredPlacement> = None;

    for (idx, free) in free_rects.iter().enumerate() {
        if piece.fits_in(&free.rect) {
            let score = score(piece, free.rect, policy);
            if best.is_none_or(|b| score < b.score) {
                best = Some(ScoredPlacement {
                    free_idx: idx,
                    rotated: false,
                    score,
                });
            }
        }
        if allow_rotate && !piece.is_square() {
            let turned = piece.rotated();
            if turned.fits_in(&free.rect) {
                let score = score(turned, free.rect, policy);
                if best.is_none_or(|b| score < b.score) {
                    best = Some(ScoredPlacement {
                        free_idx: idx,
                        rotated: true,
                        score,
                    });
                }
            }
        }
    }

    best.map(|scored| {
        let free = free_rects[scored.free_idx];
        Position {
            x: free.x,
            y: free.y,
            rect: if scored.rotated {
                piece.rotated()
            } else {
                piece
            },
            rotated: scored.rotated,
        }
    })
}

fn score(piece: Rect, free: Rect, policy: PlacementPolicy) -> (u64, u64) {
    let dw = (free.w - piece.w) as u64;
    let dh = (free.h - piece.h) as u64;
    match policy {
        PlacementPolicy::BestAreaFit => (free.area() - piece.area(), 0),
        PlacementPolicy::BestShortSideFit => (dw.min(dh), dw.max(dh)),
        PlacementPolicy::BestLongSideFit => (dw.max(dh), dw.min(dh)),
        PlacementPolicy::FirstFit => (0, 0),
    }
}
