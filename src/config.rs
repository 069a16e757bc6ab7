use serde::{Deserialize, Serialize};

use crate::error::PackError;
use crate::occupancy::IndexKind;
use crate::placement::PlacementPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Largest-first greedy fill only.
    #[default]
    Greedy,
    /// Greedy fill followed by simulated annealing.
    Anneal,
    /// Greedy fill followed by branch and bound on small instances.
    Exact,
}

/// Configuration of a packing run. Every field has a default, so a partial
/// JSON object is a valid config file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub strategy: Strategy,
    pub policy: PlacementPolicy,
    pub index: IndexKind,
    pub anneal: AnnealConfig,
    pub exact: ExactConfig,
}

impl PackConfig {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_policy(mut self, policy: PlacementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_index(mut self, index: IndexKind) -> Self {
        self.index = index;
        self
    }

    pub fn validate(&self) -> Result<(), PackError> {
        self.anneal.validate()
    }
}

/// Relative weights of the refiner's neighbourhood operators. A weight of
/// zero disables the operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorWeights {
    /// Exchange the anchors of two placements in one bin.
    pub swap: f64,
    /// Take a placement out and search its bin for a position again.
    #[serde(alias = "move")]
    pub relocate: f64,
    /// Turn a placement by 90 degrees where it stands.
    pub rotate: f64,
    /// Re-place a placement into a different bin.
    pub transfer: f64,
}

impl Default for OperatorWeights {
    fn default() -> Self {
        Self {
            swap: 1.0,
            relocate: 1.0,
            rotate: 0.5,
            transfer: 2.0,
        }
    }
}

impl OperatorWeights {
    pub fn total(&self) -> f64 {
        self.swap + self.relocate + self.rotate + self.transfer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealConfig {
    pub iterations: usize,
    pub initial_temperature: f64,
    /// Multiplier applied to the temperature after every iteration, in (0, 1).
    pub cooling_rate: f64,
    /// Wall-clock budget per restart; `None` runs the full iteration count.
    pub time_limit_ms: Option<u64>,
    pub seed: u64,
    /// Independent restarts with seeds `seed, seed + 1, ...`, run in parallel.
    pub restarts: usize,
    pub weights: OperatorWeights,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            iterations: 2000,
            initial_temperature: 0.5,
            cooling_rate: 0.97,
            time_limit_ms: None,
            seed: 0,
            restarts: 1,
            weights: OperatorWeights::default(),
        }
    }
}

impl AnnealConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    pub fn validate(&self) -> Result<(), PackError> {
        if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
            return Err(PackError::InvalidConfig(format!(
                "cooling_rate must lie in (0, 1), got {}",
                self.cooling_rate
            )));
        }
        if !(self.initial_temperature > 0.0) {
            return Err(PackError::InvalidConfig(format!(
                "initial_temperature must be positive, got {}",
                self.initial_temperature
            )));
        }
        let w = self.weights;
        if [w.swap, w.relocate, w.rotate, w.transfer]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
            || w.total() <= 0.0
        {
            return Err(PackError::InvalidConfig(format!(
                "operator weights must be non-negative with a positive sum, got {w:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactConfig {
    /// Instances with more pieces than this keep the greedy result.
    pub max_pieces: usize,
    /// Cap on explored search nodes; the best layout found so far is kept.
    pub max_nodes: u64,
    /// Wall-clock budget for the search; `None` stops on the node cap only.
    pub time_limit_ms: Option<u64>,
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            max_pieces: 20,
            max_nodes: 500_000,
            time_limit_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "strategy": "anneal",
            "policy": "best-short-side-fit",
            "anneal": {"seed": 42, "weights": {"move": 3.0}}
        }"#;
        let config: PackConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.strategy, Strategy::Anneal);
        assert_eq!(config.policy, PlacementPolicy::BestShortSideFit);
        assert_eq!(config.index, IndexKind::Auto);
        assert_eq!(config.anneal.seed, 42);
        assert_eq!(config.anneal.iterations, 2000);
        assert_eq!(config.anneal.weights.relocate, 3.0);
        assert_eq!(config.anneal.weights.transfer, 2.0);
        assert_eq!(config.exact, ExactConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_exact_time_limit_from_json() {
        let config: PackConfig =
            serde_json::from_str(r#"{"strategy": "exact", "exact": {"time_limit_ms": 250}}"#).unwrap();
        assert_eq!(config.exact.time_limit_ms, Some(250));
        assert_eq!(config.exact.max_nodes, 500_000);
    }

    #[test]
    fn test_rejects_bad_cooling_rate() {
        for rate in [0.0, 1.0, 1.5, f64::NAN] {
            let config = AnnealConfig {
                cooling_rate: rate,
                ..AnnealConfig::default()
            };
            assert!(config.validate().is_err(), "rate {rate} accepted");
        }
    }

    #[test]
    fn test_rejects_zero_weights() {
        let config = AnnealConfig {
            weights: OperatorWeights {
                swap: 0.0,
                relocate: 0.0,
                rotate: 0.0,
                transfer: 0.0,
            },
            ..AnnealConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
