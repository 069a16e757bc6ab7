use std::cmp::Reverse;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::bins::Bin;
use crate::config::ExactConfig;
use crate::occupancy::IndexKind;
use crate::placement::{PlacementPolicy, find_position};
use crate::types::{PackingResult, Problem, Rect};

#[derive(Debug, Clone, Copy)]
struct Piece {
    type_id: u32,
    rect: Rect,
}

/// Depth-first search over "which bin does the next piece go to", pieces in
/// largest-first order. The greedy packing seeds the upper bound, so the
/// result is never worse than greedy.
///
/// Search bins always track free space as free rectangles, which keeps the
/// per-node clones small; first-fit positions are the same on either
/// backing. The winning layout is rebuilt on the run's own index.
pub struct BranchAndBound {
    problem: Problem,
    policy: PlacementPolicy,
    index: IndexKind,
    config: ExactConfig,
}

struct Search {
    best: Option<Vec<Bin>>,
    best_count: usize,
    nodes: u64,
    deadline: Option<Instant>,
    exhausted: bool,
}

impl BranchAndBound {
    /// `index` must already be resolved against the bin size.
    pub fn new(problem: Problem, policy: PlacementPolicy, index: IndexKind, config: ExactConfig) -> Self {
        Self {
            problem,
            policy,
            index,
            config,
        }
    }

    pub fn improve(&self, greedy: PackingResult) -> PackingResult {
        let pieces = self.expand_demands(&greedy);
        if pieces.is_empty() {
            return greedy;
        }
        if pieces.len() > self.config.max_pieces {
            debug!(
                pieces = pieces.len(),
                max_pieces = self.config.max_pieces,
                "instance too large for branch and bound"
            );
            return greedy;
        }

        let mut search = Search {
            best: None,
            best_count: greedy.bin_count(),
            nodes: 0,
            deadline: self
                .config
                .time_limit_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms)),
            exhausted: false,
        };
        self.bb_recurse(&pieces, 0, Vec::new(), &mut search);

        info!(
            nodes = search.nodes,
            limit_hit = search.exhausted,
            greedy_bins = greedy.bin_count(),
            bins = search.best_count,
            "branch and bound finished"
        );

        match search.best.and_then(|bins| self.rebuild(bins)) {
            Some(bins) => PackingResult { bins, ..greedy },
            None => greedy,
        }
    }

    fn rebuild(&self, bins: Vec<Bin>) -> Option<Vec<Bin>> {
        bins.into_iter()
            .map(|b| {
                Bin::from_placements(b.index(), b.size(), self.index, b.placements().iter().copied())
            })
            .collect()
    }

    /// Every instance of the types greedy could place at all, largest area
    /// first, ties by id.
    fn expand_demands(&self, greedy: &PackingResult) -> Vec<Piece> {
        let mut pieces = Vec::new();
        for d in &self.problem.demands {
            if greedy.unsatisfied_count(d.id) > 0 {
                continue;
            }
            for _ in 0..d.qty {
                pieces.push(Piece {
                    type_id: d.id,
                    rect: d.rect,
                });
            }
        }
        pieces.sort_by_key(|p| (Reverse(p.rect.area()), p.type_id));
        pieces
    }

    fn bb_recurse(&self, pieces: &[Piece], idx: usize, bins: Vec<Bin>, search: &mut Search) {
        if search.exhausted {
            return;
        }
        search.nodes += 1;
        if search.nodes > self.config.max_nodes
            || search.deadline.is_some_and(|d| Instant::now() >= d)
        {
            search.exhausted = true;
            return;
        }

        if idx == pieces.len() {
            if bins.len() < search.best_count {
                debug!(bins = bins.len(), nodes = search.nodes, "improved packing");
                search.best_count = bins.len();
                search.best = Some(bins);
            }
            return;
        }

        if bins.len() >= search.best_count {
            return;
        }

        // lower bound: the remaining area spills past the free area of the
        // open bins into fresh ones
        let bin_area = self.problem.bin.area();
        let remaining_area: u64 = pieces[idx..].iter().map(|p| p.rect.area()).sum();
        let open_free_area: u64 = bins.iter().map(|b| b.waste_area()).sum();
        let lower_bound = if remaining_area > open_free_area {
            bins.len() + (remaining_area - open_free_area).div_ceil(bin_area) as usize
        } else {
            bins.len()
        };
        if lower_bound >= search.best_count {
            return;
        }

        let piece = pieces[idx];
        let orientations: &[bool] = if self.problem.allow_rotate && !piece.rect.is_square() {
            &[false, true]
        } else {
            &[false]
        };

        for bi in 0..bins.len() {
            for &rotated in orientations {
                let try_rect = if rotated { piece.rect.rotated() } else { piece.rect };
                if let Some(mut pos) = find_position(bins[bi].occupancy(), try_rect, false, self.policy) {
                    pos.rotated = rotated;
                    let mut new_bins = bins.clone();
                    new_bins[bi].place(piece.type_id, pos);
                    self.bb_recurse(pieces, idx + 1, new_bins, search);
                }
            }
        }

        if bins.len() + 1 < search.best_count {
            let mut new_bin = Bin::new(bins.len(), self.problem.bin, IndexKind::FreeRects);
            if let Some(pos) = find_position(
                new_bin.occupancy(),
                piece.rect,
                self.problem.allow_rotate,
                self.policy,
            ) {
                new_bin.place(piece.type_id, pos);
                let mut new_bins = bins;
                new_bins.push(new_bin);
                self.bb_recurse(pieces, idx + 1, new_bins, search);
            }
        }
    }
}
