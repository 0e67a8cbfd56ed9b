//! Segment compressor: turns a per-cell color mask into rectangular fills.
//!
//! Renderers take region styles, not per-cell paints. The scan axis is fixed
//! to rows within a column: each column is split into maximal runs of one
//! color, and identical runs in neighbouring columns merge into a single
//! rectangle. Every colored cell ends up in exactly one directive and unset
//! cells in none.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::table::model::ColorMask;

/// A cell coordinate, `(col, row)` as renderers address grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub col: usize,
    pub row: usize,
}

impl CellRef {
    pub fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

/// What a directive does to its region. Only background fills are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectiveKind {
    Background,
}

/// A rectangular style instruction with inclusive bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleDirective {
    pub kind: DirectiveKind,
    pub from: CellRef,
    pub to: CellRef,
    pub color: String,
}

impl StyleDirective {
    pub fn background(from: CellRef, to: CellRef, color: impl Into<String>) -> Self {
        Self {
            kind: DirectiveKind::Background,
            from,
            to,
            color: color.into(),
        }
    }

    /// Whether `(col, row)` lies inside this directive.
    pub fn covers(&self, col: usize, row: usize) -> bool {
        (self.from.col..=self.to.col).contains(&col) && (self.from.row..=self.to.row).contains(&row)
    }

    pub fn cell_count(&self) -> usize {
        (self.to.col - self.from.col + 1) * (self.to.row - self.from.row + 1)
    }
}

/// A maximal same-color run of rows inside one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run<'a> {
    start: usize,
    end: usize,
    color: &'a str,
}

/// Maximal runs in column `col`, top to bottom. Unset cells break runs.
fn column_runs(mask: &ColorMask, col: usize) -> Vec<Run<'_>> {
    let mut runs: Vec<Run<'_>> = Vec::new();
    let mut current: Option<Run<'_>> = None;

    for row in 0..mask.n_rows() {
        let color = mask.get(row, col);
        if let (Some(color), Some(run)) = (color, current.as_mut())
            && run.color == color
        {
            run.end = row;
            continue;
        }
        runs.extend(current.take());
        current = color.map(|color| Run {
            start: row,
            end: row,
            color,
        });
    }
    runs.extend(current);
    runs
}

/// Compress `mask` into background directives.
///
/// Output order is discovery order: column-major, then top to bottom. The
/// same mask always yields the same list.
pub fn compress(mask: &ColorMask) -> Vec<StyleDirective> {
    let mut directives: Vec<StyleDirective> = Vec::new();
    // Runs of the previous column keyed by start row → (run, directive index).
    let mut open: HashMap<usize, (Run<'_>, usize)> = HashMap::new();

    for col in 0..mask.n_cols() {
        let mut next = HashMap::new();
        for run in column_runs(mask, col) {
            let index = match open.get(&run.start) {
                Some((prev, index)) if *prev == run => {
                    directives[*index].to.col = col;
                    *index
                }
                _ => {
                    directives.push(StyleDirective::background(
                        CellRef::new(col, run.start),
                        CellRef::new(col, run.end),
                        run.color,
                    ));
                    directives.len() - 1
                }
            };
            next.insert(run.start, (run, index));
        }
        open = next;
    }

    directives
}
