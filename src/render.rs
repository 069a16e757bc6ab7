//! ASCII drawings of single bins for the text report.

use crate::types::{Placement, Rect};

const MAX_WIDTH: f64 = 80.0;
const MAX_HEIGHT: f64 = 40.0;

/// Draws one bin scaled into an 80x40 character box. Each placement is
/// outlined and labelled with its type id, a trailing `r` marking rotation.
pub fn render_bin(size: Rect, placements: &[Placement]) -> String {
    let scale = f64::min(MAX_WIDTH / size.w as f64, MAX_HEIGHT / size.h as f64);
    let grid_w = (size.w as f64 * scale).round() as usize;
    let grid_h = (size.h as f64 * scale).round() as usize;

    if grid_w == 0 || grid_h == 0 {
        return String::new();
    }

    let mut grid = vec![vec![' '; grid_w + 1]; grid_h + 1];
    draw_rect(&mut grid, 0, 0, grid_w, grid_h);

    for p in placements {
        let sx = (p.x as f64 * scale).round() as usize;
        let sy = (p.y as f64 * scale).round() as usize;
        let sw = (p.rect.w as f64 * scale).round() as usize;
        let sh = (p.rect.h as f64 * scale).round() as usize;

        if sw == 0 || sh == 0 {
            continue;
        }

        draw_rect(&mut grid, sx, sy, sw, sh);
        write_label(&mut grid, &label(p), sx, sy, sw, sh);
    }

    // row 0 is y = 0; print top row last so the drawing reads bottom-up
    let mut result = String::new();
    for row in grid.iter().rev() {
        let line: String = row.iter().collect();
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result
}

fn label(p: &Placement) -> String {
    if p.rotated {
        format!("{}r", p.type_id)
    } else {
        p.type_id.to_string()
    }
}

fn write_label(grid: &mut [Vec<char>], label: &str, sx: usize, sy: usize, sw: usize, sh: usize) {
    if sw <= 2 {
        return;
    }
    let chars: Vec<char> = label.chars().collect();
    let cx = sx + sw / 2;
    let cy = sy + sh / 2;
    let start_x = cx.saturating_sub(chars.len() / 2);
    for (i, &ch) in chars.iter().enumerate() {
        let x = start_x + i;
        if x > sx && x < sx + sw && cy > sy && cy < sy + sh {
            grid[cy][x] = ch;
        }
    }
}

#[allow(clippy::needless_range_loop)]
fn draw_rect(grid: &mut [Vec<char>], x: usize, y: usize, w: usize, h: usize) {
    let rows = grid.len();
    let cols = if rows > 0 { grid[0].len() } else { return };

    // Horizontal edges
    for i in x..=x + w {
        if i < cols {
            if y < rows {
                grid[y][i] = if grid[y][i] == '|' || grid[y][i] == '+' {
                    '+'
                } else {
                    '-'
                };
            }
            if y + h < rows {
                grid[y + h][i] = if grid[y + h][i] == '|' || grid[y + h][i] == '+' {
                    '+'
                } else {
                    '-'
                };
            }
        }
    }

    // Vertical edges
    for j in y..=y + h {
        if j < rows {
            if x < cols {
                grid[j][x] = if grid[j][x] == '-' || grid[j][x] == '+' {
                    '+'
                } else {
                    '|'
                };
            }
            if x + w < cols {
                grid[j][x + w] = if grid[j][x + w] == '-' || grid[j][x + w] == '+' {
                    '+'
                } else {
                    '|'
                };
            }
        }
    }

    // Corners
    for &cx in &[x, x + w] {
        for &cy in &[y, y + h] {
            if cy < rows && cx < cols {
                grid[cy][cx] = '+';
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(type_id: u32, x: u32, y: u32, w: u32, h: u32, rotated: bool) -> Placement {
        Placement {
            type_id,
            bin_index: 0,
            x,
            y,
            rect: Rect::new(w, h),
            rotated,
        }
    }

    #[test]
    fn test_render_single_piece() {
        let output = render_bin(Rect::new(100, 50), &[piece(7, 0, 0, 100, 50, false)]);
        assert!(output.contains('+'));
        assert!(output.contains('-'));
        assert!(output.contains('|'));
        assert!(output.contains('7'));
    }

    #[test]
    fn test_render_marks_rotation() {
        let output = render_bin(
            Rect::new(100, 100),
            &[piece(1, 0, 0, 50, 100, false), piece(2, 50, 0, 50, 100, true)],
        );
        assert!(output.contains("2r"));
        assert!(!output.contains("1r"));
    }

    #[test]
    fn test_bottom_row_printed_last() {
        let output = render_bin(Rect::new(40, 40), &[piece(5, 0, 0, 40, 20, false)]);
        let lines: Vec<&str> = output.lines().collect();
        let label_row = lines.iter().position(|l| l.contains('5')).unwrap();
        assert!(label_row > lines.len() / 2);
    }

    #[test]
    fn test_render_empty() {
        let output = render_bin(Rect::new(100, 100), &[]);
        assert!(output.contains('+'));
    }
}
