use std::time::Instant;

use tracing::info;

use crate::anneal::LocalSearchRefiner;
use crate::config::{PackConfig, Strategy};
use crate::engine::BinPackingEngine;
use crate::error::PackError;
use crate::exact::BranchAndBound;
use crate::types::{PackingResult, Problem};

/// Runs the greedy engine and, depending on the configured strategy, one of
/// the improvement backends on top of its result.
pub struct Solver {
    engine: BinPackingEngine,
    config: PackConfig,
}

impl Solver {
    pub fn new(problem: Problem, config: PackConfig) -> Result<Self, PackError> {
        config.validate()?;
        let engine = BinPackingEngine::new(problem, config.policy, config.index)?;
        Ok(Self { engine, config })
    }

    pub fn engine(&self) -> &BinPackingEngine {
        &self.engine
    }

    pub fn solve(&self) -> PackingResult {
        let start = Instant::now();
        let greedy = self.engine.pack();
        let greedy_bins = greedy.bin_count();

        let result = match self.config.strategy {
            Strategy::Greedy => greedy,
            Strategy::Anneal => {
                let refiner = LocalSearchRefiner::new(
                    self.config.anneal,
                    self.engine.policy(),
                    self.engine.problem().allow_rotate,
                );
                let outcome = refiner.refine(greedy);
                info!(
                    seed = outcome.seed,
                    iterations = outcome.iterations,
                    accepted = outcome.accepted,
                    initial_cost = outcome.initial_cost.value(),
                    best_cost = outcome.best_cost.value(),
                    "annealing finished"
                );
                outcome.result
            }
            Strategy::Exact => BranchAndBound::new(
                self.engine.problem().clone(),
                self.engine.policy(),
                self.engine.index(),
                self.config.exact,
            )
            .improve(greedy),
        };

        info!(
            strategy = ?self.config.strategy,
            index = ?self.engine.index(),
            pieces = self.engine.problem().total_pieces(),
            greedy_bins,
            bins = result.bin_count(),
            utilization = result.utilization(),
            unsatisfied = result.unsatisfied.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "packing finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnealConfig;
    use crate::engine::tests::assert_result_valid;
    use crate::occupancy::IndexKind;
    use crate::placement::PlacementPolicy;
    use crate::types::{Demand, Rect};

    fn demo_problem() -> Problem {
        Problem::new(
            Rect::new(100, 100),
            vec![
                Demand::new(1, 30, 40, 20),
                Demand::new(2, 20, 70, 10),
                Demand::new(3, 20, 20, 15),
                Demand::new(4, 15, 50, 15),
                Demand::new(6, 25, 35, 15),
                Demand::new(7, 10, 40, 15),
            ],
            true,
        )
    }

    #[test]
    fn test_every_strategy_valid() {
        for strategy in [Strategy::Greedy, Strategy::Anneal, Strategy::Exact] {
            let config = PackConfig {
                anneal: AnnealConfig::default().with_iterations(300).with_seed(2),
                ..PackConfig::default()
            }
            .with_strategy(strategy);
            let solver = Solver::new(demo_problem(), config).unwrap();
            let result = solver.solve();
            assert_result_valid(&result);
            assert!(result.is_complete(), "{strategy:?} left pieces behind");
            let lower = result.used_area().div_ceil(Rect::new(100, 100).area()) as usize;
            assert!(result.bin_count() >= lower);
        }
    }

    #[test]
    fn test_improvements_never_worse_than_greedy() {
        let greedy = Solver::new(demo_problem(), PackConfig::default())
            .unwrap()
            .solve();
        let annealed = Solver::new(
            demo_problem(),
            PackConfig::default().with_strategy(Strategy::Anneal),
        )
        .unwrap()
        .solve();
        assert!(annealed.bin_count() <= greedy.bin_count());
    }

    #[test]
    fn test_config_errors_surface() {
        let bad = PackConfig::default()
            .with_policy(PlacementPolicy::BestShortSideFit)
            .with_index(IndexKind::DenseGrid);
        assert!(matches!(
            Solver::new(demo_problem(), bad),
            Err(PackError::InvalidConfig(_))
        ));

        let mut cold = PackConfig::default();
        cold.anneal.initial_temperature = 0.0;
        assert!(Solver::new(demo_problem(), cold).is_err());
    }

    #[test]
    fn test_best_fit_with_free_rects() {
        let config = PackConfig::default()
            .with_policy(PlacementPolicy::BestAreaFit)
            .with_strategy(Strategy::Anneal);
        let solver = Solver::new(demo_problem(), config).unwrap();
        assert_eq!(solver.engine().index(), IndexKind::FreeRects);
        assert_result_valid(&solver.solve());
    }
}
