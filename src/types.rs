use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::bins::Bin;
use crate::error::PackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    #[serde(alias = "width", deserialize_with = "deserialize_u32_from_number")]
    pub w: u32,
    #[serde(alias = "height", deserialize_with = "deserialize_u32_from_number")]
    pub h: u32,
}

impl Rect {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn rotated(&self) -> Self {
        Self {
            w: self.h,
            h: self.w,
        }
    }

    pub fn is_square(&self) -> bool {
        self.w == self.h
    }

    pub fn fits_in(&self, other: &Rect) -> bool {
        self.w <= other.w && self.h <= other.h
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// Accepts integral JSON numbers written either as `3` or `3.0`.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value < 0.0 || value > u32::MAX as f64 || value.fract() != 0.0 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative integer, got {value}"
        )));
    }
    Ok(value as u32)
}

/// One rectangle type together with the number of instances requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    pub id: u32,
    pub rect: Rect,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub qty: u32,
}

impl Demand {
    pub fn new(id: u32, w: u32, h: u32, qty: u32) -> Self {
        Self {
            id,
            rect: Rect::new(w, h),
            qty,
        }
    }
}

/// A complete packing input: the bin every instance is cut from, the demand
/// rows in input order and whether 90 degree rotation is permitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub bin: Rect,
    pub demands: Vec<Demand>,
    #[serde(default = "default_true")]
    pub allow_rotate: bool,
}

fn default_true() -> bool {
    true
}

impl Problem {
    pub fn new(bin: Rect, demands: Vec<Demand>, allow_rotate: bool) -> Self {
        Self {
            bin,
            demands,
            allow_rotate,
        }
    }

    pub fn validate(&self) -> Result<(), PackError> {
        if self.bin.w == 0 || self.bin.h == 0 {
            return Err(PackError::InvalidBin(self.bin));
        }
        let mut seen = HashSet::with_capacity(self.demands.len());
        for d in &self.demands {
            if d.rect.w == 0 || d.rect.h == 0 {
                return Err(PackError::InvalidDimensions {
                    id: d.id,
                    rect: d.rect,
                });
            }
            if d.qty == 0 {
                return Err(PackError::InvalidCount { id: d.id });
            }
            if !seen.insert(d.id) {
                return Err(PackError::DuplicateId(d.id));
            }
        }
        Ok(())
    }

    /// Whether `rect` fits an empty bin in at least one permitted orientation.
    pub fn fits(&self, rect: Rect) -> bool {
        rect.fits_in(&self.bin) || (self.allow_rotate && rect.rotated().fits_in(&self.bin))
    }

    pub fn total_pieces(&self) -> u64 {
        self.demands.iter().map(|d| d.qty as u64).sum()
    }
}

/// A placed rectangle instance. `rect` holds the effective (possibly swapped)
/// dimensions as laid out in the bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub type_id: u32,
    pub bin_index: usize,
    pub x: u32,
    pub y: u32,
    pub rect: Rect,
    pub rotated: bool,
}

impl Placement {
    /// Dimensions of the rectangle type before any rotation was applied.
    pub fn base_rect(&self) -> Rect {
        if self.rotated {
            self.rect.rotated()
        } else {
            self.rect
        }
    }

    pub fn overlaps(&self, other: &Placement) -> bool {
        let (ax, ay) = (self.x as u64, self.y as u64);
        let (bx, by) = (other.x as u64, other.y as u64);
        ax < bx + other.rect.w as u64
            && bx < ax + self.rect.w as u64
            && ay < by + other.rect.h as u64
            && by < ay + self.rect.h as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Unsatisfied {
    pub type_id: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone)]
pub struct PackingResult {
    pub bin_size: Rect,
    pub demands: Vec<Demand>,
    pub bins: Vec<Bin>,
    pub unsatisfied: Vec<Unsatisfied>,
}

impl PackingResult {
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.bins.iter().flat_map(|b| b.placements())
    }

    pub fn placed_count(&self, type_id: u32) -> u32 {
        self.placements().filter(|p| p.type_id == type_id).count() as u32
    }

    pub fn unsatisfied_count(&self, type_id: u32) -> u32 {
        self.unsatisfied
            .iter()
            .filter(|u| u.type_id == type_id)
            .map(|u| u.remaining)
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unsatisfied.is_empty()
    }

    pub fn used_area(&self) -> u64 {
        self.bins.iter().map(|b| b.used_area()).sum()
    }

    /// Used area over the area of every opened bin, in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        let total = self.bin_size.area() * self.bins.len() as u64;
        if total == 0 {
            return 0.0;
        }
        self.used_area() as f64 / total as f64
    }

    pub fn total_waste_percent(&self) -> f64 {
        if self.bins.is_empty() {
            return 0.0;
        }
        (1.0 - self.utilization()) * 100.0
    }

    /// Utilization of the emptiest bin, `None` when no bin was opened.
    pub fn least_utilization(&self) -> Option<f64> {
        self.bins
            .iter()
            .map(|b| b.utilization())
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Per-bin placed counts, one row per bin, one column per demand row in
    /// input order.
    pub fn arrangement_matrix(&self) -> Vec<Vec<u32>> {
        self.bins
            .iter()
            .map(|bin| {
                self.demands
                    .iter()
                    .map(|d| {
                        bin.placements()
                            .iter()
                            .filter(|p| p.type_id == d.id)
                            .count() as u32
                    })
                    .collect()
            })
            .collect()
    }

    /// Drops bins left without placements and renumbers the rest.
    pub fn remove_empty_bins(&mut self) {
        if self.bins.iter().all(|b| !b.is_empty()) {
            return;
        }
        self.bins.retain(|b| !b.is_empty());
        for (idx, bin) in self.bins.iter_mut().enumerate() {
            bin.set_index(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero_bin() {
        let problem = Problem::new(Rect::new(0, 10), vec![Demand::new(1, 2, 2, 1)], true);
        assert_eq!(problem.validate(), Err(PackError::InvalidBin(Rect::new(0, 10))));
    }

    #[test]
    fn test_validate_rejects_bad_demands() {
        let bin = Rect::new(10, 10);
        let zero_dim = Problem::new(bin, vec![Demand::new(7, 0, 3, 1)], true);
        assert!(matches!(
            zero_dim.validate(),
            Err(PackError::InvalidDimensions { id: 7, .. })
        ));

        let zero_qty = Problem::new(bin, vec![Demand::new(3, 2, 3, 0)], true);
        assert_eq!(zero_qty.validate(), Err(PackError::InvalidCount { id: 3 }));

        let dup = Problem::new(
            bin,
            vec![Demand::new(1, 2, 3, 1), Demand::new(1, 4, 4, 2)],
            true,
        );
        assert_eq!(dup.validate(), Err(PackError::DuplicateId(1)));
    }

    #[test]
    fn test_fits_respects_rotation_flag() {
        let bin = Rect::new(10, 12);
        let piece = Rect::new(12, 3);
        assert!(Problem::new(bin, vec![], true).fits(piece));
        assert!(!Problem::new(bin, vec![], false).fits(piece));
    }

    #[test]
    fn test_placement_overlap() {
        let a = Placement {
            type_id: 1,
            bin_index: 0,
            x: 0,
            y: 0,
            rect: Rect::new(4, 4),
            rotated: false,
        };
        let touching = Placement { x: 4, ..a };
        let crossing = Placement { x: 3, y: 3, ..a };
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&crossing));
    }

    #[test]
    fn test_problem_from_json_accepts_float_numbers() {
        let json = r#"{
            "bin": {"width": 100, "height": 50.0},
            "demands": [{"id": 1, "rect": {"w": 10, "h": 20}, "qty": 3.0}]
        }"#;
        let problem: Problem = serde_json::from_str(json).unwrap();
        assert_eq!(problem.bin, Rect::new(100, 50));
        assert_eq!(problem.demands[0].qty, 3);
        assert!(problem.allow_rotate);

        let bad = r#"{"bin": {"w": 10.5, "h": 5}, "demands": []}"#;
        assert!(serde_json::from_str::<Problem>(bad).is_err());
    }
}
