use std::cmp::Reverse;

use tracing::{debug, trace, warn};

use crate::bins::Bin;
use crate::error::PackError;
use crate::occupancy::IndexKind;
use crate::placement::{PlacementPolicy, find_position};
use crate::types::{PackingResult, Problem, Rect, Unsatisfied};

/// Per-run demand state for one rectangle type.
#[derive(Debug, Clone)]
struct RectangleDemand {
    id: u32,
    rect: Rect,
    remaining: u32,
}

/// Largest-first greedy packer.
///
/// Each bin is filled by walking the remaining types in descending area
/// (ascending id on ties) and placing instances of a type until the placement
/// search fails, then moving to the next type. A new bin opens once every
/// type has failed in the current one.
pub struct BinPackingEngine {
    problem: Problem,
    policy: PlacementPolicy,
    index: IndexKind,
}

impl BinPackingEngine {
    pub fn new(
        problem: Problem,
        policy: PlacementPolicy,
        index: IndexKind,
    ) -> Result<Self, PackError> {
        problem.validate()?;
        let index = index.resolve(problem.bin, policy)?;
        Ok(Self {
            problem,
            policy,
            index,
        })
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn policy(&self) -> PlacementPolicy {
        self.policy
    }

    /// The resolved index backing, never `Auto`.
    pub fn index(&self) -> IndexKind {
        self.index
    }

    pub fn pack(&self) -> PackingResult {
        let mut demands: Vec<RectangleDemand> = self
            .problem
            .demands
            .iter()
            .map(|d| RectangleDemand {
                id: d.id,
                rect: d.rect,
                remaining: d.qty,
            })
            .collect();
        let mut unsatisfied = vec![0u32; demands.len()];

        // types larger than the bin in every permitted orientation never
        // enter the fill loop
        for (i, d) in demands.iter_mut().enumerate() {
            if !self.problem.fits(d.rect) {
                warn!(type_id = d.id, rect = %d.rect, bin = %self.problem.bin, "rectangle type cannot fit the bin");
                unsatisfied[i] = d.remaining;
                d.remaining = 0;
            }
        }

        let mut bins: Vec<Bin> = Vec::new();
        while demands.iter().any(|d| d.remaining > 0) {
            let mut bin = Bin::new(bins.len(), self.problem.bin, self.index);
            for i in Self::fill_order(&demands) {
                let d = &mut demands[i];
                while d.remaining > 0 {
                    let Some(pos) =
                        find_position(bin.occupancy(), d.rect, self.problem.allow_rotate, self.policy)
                    else {
                        break;
                    };
                    let p = bin.place(d.id, pos);
                    d.remaining -= 1;
                    trace!(type_id = p.type_id, bin = p.bin_index, x = p.x, y = p.y, rotated = p.rotated, "placed");
                }
            }

            if bin.is_empty() {
                // a fresh bin took nothing: report the rest instead of looping
                for (i, d) in demands.iter_mut().enumerate() {
                    if d.remaining > 0 {
                        warn!(type_id = d.id, remaining = d.remaining, "no progress in a fresh bin");
                        unsatisfied[i] += d.remaining;
                        d.remaining = 0;
                    }
                }
                break;
            }

            debug!(
                bin = bin.index(),
                pieces = bin.len(),
                utilization = bin.utilization(),
                "bin filled"
            );
            bins.push(bin);
        }

        let unsatisfied = demands
            .iter()
            .zip(unsatisfied)
            .filter(|(_, remaining)| *remaining > 0)
            .map(|(d, remaining)| Unsatisfied {
                type_id: d.id,
                remaining,
            })
            .collect();

        PackingResult {
            bin_size: self.problem.bin,
            demands: self.problem.demands.clone(),
            bins,
            unsatisfied,
        }
    }

    /// Indices of types with remaining demand, largest area first, ties by id.
    fn fill_order(demands: &[RectangleDemand]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..demands.len())
            .filter(|&i| demands[i].remaining > 0)
            .collect();
        order.sort_by_key(|&i| (Reverse(demands[i].rect.area()), demands[i].id));
        order
    }
}
