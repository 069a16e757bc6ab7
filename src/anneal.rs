//! Simulated annealing over complete packings.
//!
//! A state is a full [`PackingResult`]. Each iteration picks a bin uniformly
//! at random and applies one neighbourhood operator to it:
//!
//! - **Swap**: exchange the anchors of two placements in the bin
//! - **Relocate**: take one placement out and search the bin for it again
//! - **Rotate**: turn one placement by 90 degrees where it stands
//! - **Transfer**: move one placement into another bin
//!
//! An operator that cannot be applied legally leaves the state untouched.
//! Bins emptied by a transfer disappear, which is how the bin count drops.

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::bins::Bin;
use crate::config::AnnealConfig;
use crate::occupancy::OccupancyIndex;
use crate::placement::{PlacementPolicy, Position, find_position};
use crate::types::PackingResult;

/// Bins used first, utilization of the emptiest bin second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    pub bins: usize,
    pub least_utilization: f64,
}

impl Cost {
    pub fn of(result: &PackingResult) -> Self {
        Self {
            bins: result.bin_count(),
            least_utilization: result.least_utilization().unwrap_or(0.0),
        }
    }

    /// Scalar form used for acceptance. `least_utilization` lies in (0, 1] for
    /// any non-empty bin, so the bin count always dominates.
    pub fn value(&self) -> f64 {
        self.bins as f64 + self.least_utilization
    }

    fn with_changes(state: &PackingResult, changes: &[(usize, Bin)]) -> Self {
        let mut bins = 0;
        let mut least = f64::INFINITY;
        for (idx, bin) in state.bins.iter().enumerate() {
            let bin = changes
                .iter()
                .find(|(changed, _)| *changed == idx)
                .map_or(bin, |(_, b)| b);
            if bin.is_empty() {
                continue;
            }
            bins += 1;
            least = least.min(bin.utilization());
        }
        Self {
            bins,
            least_utilization: if bins == 0 { 0.0 } else { least },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Swap,
    Relocate,
    Rotate,
    Transfer,
}

#[derive(Debug, Clone)]
pub struct RefineOutcome {
    pub result: PackingResult,
    pub initial_cost: Cost,
    pub best_cost: Cost,
    pub seed: u64,
    pub iterations: usize,
    pub accepted: usize,
    /// `(iteration, cost value)` for every new best state, in order.
    pub improvements: Vec<(usize, f64)>,
}

pub struct LocalSearchRefiner {
    config: AnnealConfig,
    policy: PlacementPolicy,
    allow_rotate: bool,
}

impl LocalSearchRefiner {
    pub fn new(config: AnnealConfig, policy: PlacementPolicy, allow_rotate: bool) -> Self {
        Self {
            config,
            policy,
            allow_rotate,
        }
    }

    /// Runs `config.restarts` independent searches, seeded `seed, seed + 1,
    /// ...`, on the rayon pool and keeps the best. Ties go to the lower seed.
    pub fn refine(&self, initial: PackingResult) -> RefineOutcome {
        let restarts = self.config.restarts.max(1) as u64;
        let first = self.config.seed;
        if restarts == 1 {
            return self.refine_with_seed(&initial, first);
        }
        (0..restarts)
            .into_par_iter()
            .map(|i| self.refine_with_seed(&initial, first.wrapping_add(i)))
            .min_by(|a, b| {
                a.best_cost
                    .value()
                    .total_cmp(&b.best_cost.value())
                    .then(a.seed.cmp(&b.seed))
            })
            .unwrap_or_else(|| self.refine_with_seed(&initial, first))
    }

    pub fn refine_with_seed(&self, initial: &PackingResult, seed: u64) -> RefineOutcome {
        let mut rng = SmallRng::seed_from_u64(seed);
        let deadline = self
            .config
            .time_limit_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        let mut current = initial.clone();
        let mut current_cost = Cost::of(&current);
        let initial_cost = current_cost;
        let mut best = current.clone();
        let mut best_cost = current_cost;
        let mut temperature = self.config.initial_temperature;
        let mut improvements = Vec::new();
        let mut iterations = 0;
        let mut accepted = 0;

        for iteration in 0..self.config.iterations {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(seed, iteration, "refiner deadline reached");
                break;
            }

            if let Some(changes) = self.propose(&current, &mut rng) {
                let candidate_cost = Cost::with_changes(&current, &changes);
                let delta = candidate_cost.value() - current_cost.value();
                let accept =
                    delta <= 0.0 || rng.random::<f64>() < (-delta / temperature).exp();
                if accept {
                    apply(&mut current, changes);
                    current_cost = candidate_cost;
                    accepted += 1;
                    if current_cost.value() < best_cost.value() {
                        best = current.clone();
                        best_cost = current_cost;
                        improvements.push((iteration, best_cost.value()));
                        debug!(seed, iteration, bins = best_cost.bins, least = best_cost.least_utilization, "new best");
                    }
                }
            }

            temperature *= self.config.cooling_rate;
            iterations += 1;
        }

        RefineOutcome {
            result: best,
            initial_cost,
            best_cost,
            seed,
            iterations,
            accepted,
            improvements,
        }
    }

    fn pick_operator(&self, rng: &mut SmallRng) -> Operator {
        let w = self.config.weights;
        let mut r = rng.random::<f64>() * w.total();
        for (op, weight) in [
            (Operator::Swap, w.swap),
            (Operator::Relocate, w.relocate),
            (Operator::Rotate, w.rotate),
            (Operator::Transfer, w.transfer),
        ] {
            if r < weight {
                return op;
            }
            r -= weight;
        }
        Operator::Transfer
    }

    /// A neighbour as the list of bins it replaces, or `None` for a no-op.
    fn propose(&self, state: &PackingResult, rng: &mut SmallRng) -> Option<Vec<(usize, Bin)>> {
        if state.bins.is_empty() {
            return None;
        }
        let b = rng.random_range(0..state.bins.len());
        let bin = &state.bins[b];
        let op = self.pick_operator(rng);
        if bin.is_empty() {
            return None;
        }
        let i = rng.random_range(0..bin.len());

        let proposal = match op {
            Operator::Swap => self.swap(bin, i, rng).map(|nb| vec![(b, nb)]),
            Operator::Relocate => self.relocate(bin, i).map(|nb| vec![(b, nb)]),
            Operator::Rotate => self.rotate(bin, i).map(|nb| vec![(b, nb)]),
            Operator::Transfer => {
                if state.bins.len() < 2 {
                    None
                } else {
                    let mut d = rng.random_range(0..state.bins.len() - 1);
                    if d >= b {
                        d += 1;
                    }
                    self.transfer(bin, i, &state.bins[d])
                        .map(|(src, dst)| vec![(b, src), (d, dst)])
                }
            }
        };
        if proposal.is_none() {
            trace!(?op, bin = b, piece = i, "neighbour rejected");
        }
        proposal
    }

    fn swap(&self, bin: &Bin, i: usize, rng: &mut SmallRng) -> Option<Bin> {
        if bin.len() < 2 {
            return None;
        }
        let mut j = rng.random_range(0..bin.len() - 1);
        if j >= i {
            j += 1;
        }
        let mut placements = bin.placements().to_vec();
        let (a, c) = (placements[i], placements[j]);
        placements[i].x = c.x;
        placements[i].y = c.y;
        placements[j].x = a.x;
        placements[j].y = a.y;
        Bin::from_placements(bin.index(), bin.size(), bin.occupancy().kind(), placements)
    }

    fn relocate(&self, bin: &Bin, i: usize) -> Option<Bin> {
        let p = bin.placements()[i];
        let mut reduced = bin.without(&[i]);
        let pos = find_position(reduced.occupancy(), p.base_rect(), self.allow_rotate, self.policy)?;
        reduced.place(p.type_id, pos);
        Some(reduced)
    }

    fn rotate(&self, bin: &Bin, i: usize) -> Option<Bin> {
        let p = bin.placements()[i];
        if !self.allow_rotate || p.rect.is_square() {
            return None;
        }
        let mut reduced = bin.without(&[i]);
        let turned = p.rect.rotated();
        if !reduced.occupancy().is_free(p.x, p.y, turned.w, turned.h) {
            return None;
        }
        reduced.place(
            p.type_id,
            Position {
                x: p.x,
                y: p.y,
                rect: turned,
                rotated: !p.rotated,
            },
        );
        Some(reduced)
    }

    fn transfer(&self, src: &Bin, i: usize, dst: &Bin) -> Option<(Bin, Bin)> {
        let p = src.placements()[i];
        let pos = find_position(dst.occupancy(), p.base_rect(), self.allow_rotate, self.policy)?;
        let mut target = dst.clone();
        target.place(p.type_id, pos);
        Some((src.without(&[i]), target))
    }
}

fn apply(state: &mut PackingResult, changes: Vec<(usize, Bin)>) {
    for (idx, bin) in changes {
        state.bins[idx] = bin;
    }
    state.remove_empty_bins();
}
