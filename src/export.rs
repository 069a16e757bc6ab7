use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::bins::Bin;
use crate::render;
use crate::types::{PackingResult, Rect, Unsatisfied};

/// Consumes a finished packing and writes it somewhere.
pub trait ResultExporter {
    fn export(&self, result: &PackingResult, out: &mut dyn Write) -> io::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRow {
    pub id: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinReport {
    pub index: usize,
    pub placements: Vec<PlacementRow>,
    pub used_area: u64,
    pub utilization: f64,
    pub waste_percent: f64,
}

/// Per-bin placed counts; `counts[bin][col]` belongs to `type_ids[col]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrangement {
    pub type_ids: Vec<u32>,
    pub counts: Vec<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsatisfiedRow {
    pub id: u32,
    pub remaining: u32,
}

/// Serializable view of a [`PackingResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingReport {
    pub bin: Rect,
    pub bin_count: usize,
    pub utilization: f64,
    pub waste_percent: f64,
    pub bins: Vec<BinReport>,
    pub unsatisfied: Vec<UnsatisfiedRow>,
    pub arrangement: Arrangement,
}

impl From<&PackingResult> for PackingReport {
    fn from(result: &PackingResult) -> Self {
        Self {
            bin: result.bin_size,
            bin_count: result.bin_count(),
            utilization: result.utilization(),
            waste_percent: result.total_waste_percent(),
            bins: result.bins.iter().map(bin_report).collect(),
            unsatisfied: result.unsatisfied.iter().map(unsatisfied_row).collect(),
            arrangement: Arrangement {
                type_ids: result.demands.iter().map(|d| d.id).collect(),
                counts: result.arrangement_matrix(),
            },
        }
    }
}

fn bin_report(bin: &Bin) -> BinReport {
    let utilization = bin.utilization();
    BinReport {
        index: bin.index(),
        placements: bin
            .placements()
            .iter()
            .map(|p| PlacementRow {
                id: p.type_id,
                x: p.x,
                y: p.y,
                width: p.rect.w,
                height: p.rect.h,
                rotated: p.rotated,
            })
            .collect(),
        used_area: bin.used_area(),
        utilization,
        waste_percent: (1.0 - utilization) * 100.0,
    }
}

fn unsatisfied_row(u: &Unsatisfied) -> UnsatisfiedRow {
    UnsatisfiedRow {
        id: u.type_id,
        remaining: u.remaining,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter {
    pub pretty: bool,
}

impl ResultExporter for JsonExporter {
    fn export(&self, result: &PackingResult, out: &mut dyn Write) -> io::Result<()> {
        let report = PackingReport::from(result);
        if self.pretty {
            serde_json::to_writer_pretty(&mut *out, &report)?;
        } else {
            serde_json::to_writer(&mut *out, &report)?;
        }
        writeln!(out)
    }
}

/// Human-readable listing, one block per bin, optionally with an ASCII
/// drawing of each bin.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExporter {
    pub layout: bool,
}

impl ResultExporter for TextExporter {
    fn export(&self, result: &PackingResult, out: &mut dyn Write) -> io::Result<()> {
        for bin in &result.bins {
            writeln!(
                out,
                "Bin {} ({:.1}% used):",
                bin.index() + 1,
                bin.utilization() * 100.0
            )?;
            for p in bin.placements() {
                let rot = if p.rotated { " [rotated]" } else { "" };
                writeln!(out, "  #{} {} @ ({}, {}){}", p.type_id, p.rect, p.x, p.y, rot)?;
            }
            if self.layout {
                write!(out, "{}", render::render_bin(result.bin_size, bin.placements()))?;
            }
            writeln!(out)?;
        }

        if !result.bins.is_empty() {
            writeln!(out, "Arrangement (bins x types):")?;
            let ids: Vec<String> = result.demands.iter().map(|d| format!("#{}", d.id)).collect();
            writeln!(out, "  {:>6} {}", "", ids.join(" "))?;
            for (i, row) in result.arrangement_matrix().iter().enumerate() {
                let cells: Vec<String> = row
                    .iter()
                    .zip(&ids)
                    .map(|(count, id)| format!("{count:>width$}", width = id.len()))
                    .collect();
                writeln!(out, "  {:>6} {}", format!("bin {}", i + 1), cells.join(" "))?;
            }
            writeln!(out)?;
        }

        for u in &result.unsatisfied {
            writeln!(out, "Unsatisfied: #{} x{}", u.type_id, u.remaining)?;
        }

        writeln!(
            out,
            "Summary: {} bin{} used, {:.1}% utilization, {:.1}% waste",
            result.bin_count(),
            if result.bin_count() == 1 { "" } else { "s" },
            result.utilization() * 100.0,
            result.total_waste_percent(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BinPackingEngine;
    use crate::occupancy::IndexKind;
    use crate::placement::PlacementPolicy;
    use crate::types::{Demand, Problem};

    fn sample() -> PackingResult {
        BinPackingEngine::new(
            Problem::new(
                Rect::new(10, 10),
                vec![
                    Demand::new(1, 4, 4, 3),
                    Demand::new(2, 20, 1, 2),
                    Demand::new(3, 6, 10, 1),
                ],
                true,
            ),
            PlacementPolicy::FirstFit,
            IndexKind::Auto,
        )
        .unwrap()
        .pack()
    }

    fn export_to_string(exporter: &dyn ResultExporter, result: &PackingResult) -> String {
        let mut buf = Vec::new();
        exporter.export(result, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_report_fields() {
        let result = sample();
        let report = PackingReport::from(&result);
        assert_eq!(report.bin_count, result.bin_count());
        assert_eq!(report.arrangement.type_ids, vec![1, 2, 3]);
        assert_eq!(report.arrangement.counts.len(), report.bin_count);
        assert_eq!(
            report.unsatisfied,
            vec![UnsatisfiedRow {
                id: 2,
                remaining: 2
            }]
        );
        let placed: u32 = report.arrangement.counts.iter().flatten().sum();
        assert_eq!(placed, 4);
        for bin in &report.bins {
            assert!((bin.utilization * 100.0 + bin.waste_percent - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_json_parses_back() {
        let result = sample();
        let json = export_to_string(&JsonExporter { pretty: true }, &result);
        let report: PackingReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, PackingReport::from(&result));
    }

    #[test]
    fn test_text_listing() {
        let result = sample();
        let text = export_to_string(&TextExporter { layout: true }, &result);
        assert!(text.contains("Bin 1"));
        assert!(text.contains("#3 6x10 @ (0, 0)"));
        assert!(text.contains("Unsatisfied: #2 x2"));
        assert!(text.contains("Arrangement"));
        assert!(text.contains('+'));
        assert!(text.trim_end().ends_with("waste"));
    }
}
