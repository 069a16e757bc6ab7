use std::ops::RangeInclusive;

use rand::Rng;

use crate::types::{Demand, Rect};

/// Ranges a random demand row is drawn from.
#[derive(Debug, Clone)]
pub struct DemandRanges {
    pub width: RangeInclusive<u32>,
    pub height: RangeInclusive<u32>,
    pub count: RangeInclusive<u32>,
}

impl Default for DemandRanges {
    /// Long narrow strips cut from a 4000x12000 plate.
    fn default() -> Self {
        Self {
            width: 200..=500,
            height: 3000..=8000,
            count: 2..=20,
        }
    }
}

/// Bin that matches [`DemandRanges::default`].
pub const DEFAULT_RANDOM_BIN: Rect = Rect { w: 4000, h: 12000 };

/// `types` demand rows with ids `1..=types`, every field drawn uniformly from
/// `ranges`.
pub fn random_demands<R: Rng>(rng: &mut R, types: u32, ranges: &DemandRanges) -> Vec<Demand> {
    (1..=types)
        .map(|id| {
            Demand::new(
                id,
                rng.random_range(ranges.width.clone()),
                rng.random_range(ranges.height.clone()),
                rng.random_range(ranges.count.clone()),
            )
        })
        .collect()
}
