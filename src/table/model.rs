//! Table, mask and report data types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TableError;

// ── Cells ───────────────────────────────────────────────────────────

/// A scalar table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// ── Table ───────────────────────────────────────────────────────────

/// A rectangular grid of cells with named columns.
///
/// Rows are addressed by position. The table is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Build a table from headers and row-major cells.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self, TableError> {
        let width = columns.len();
        if let Some(first) = rows.first()
            && first.len() != width
        {
            return Err(TableError::HeaderCount {
                headers: width,
                width: first.len(),
            });
        }
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != width {
                return Err(TableError::Ragged {
                    row,
                    expected: width,
                    actual: cells.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from rows alone; headers are the column positions.
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Result<Self, TableError> {
        let width = rows.first().map_or(0, Vec::len);
        let columns = (0..width).map(|i| i.to_string()).collect();
        Self::new(columns, rows)
    }

    /// Build a table column by column, in the given order.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (S, Vec<CellValue>)>,
        S: Into<String>,
    {
        let (names, data): (Vec<String>, Vec<Vec<CellValue>>) = columns
            .into_iter()
            .map(|(name, values)| (name.into(), values))
            .unzip();

        let height = data.first().map_or(0, Vec::len);
        if let Some(short) = data.iter().map(Vec::len).find(|&len| len != height) {
            // First row where some column is missing or has an extra cell.
            let row = short.min(height);
            return Err(TableError::Ragged {
                row,
                expected: data.len(),
                actual: data.iter().filter(|v| v.len() > row).count(),
            });
        }

        let rows = (0..height)
            .map(|r| data.iter().map(|col| col[r].clone()).collect())
            .collect();
        Ok(Self {
            columns: names,
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_cols())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }
}

// ── Color mask ──────────────────────────────────────────────────────

/// Per-cell color identifiers for one table. `None` means no fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorMask {
    rows: usize,
    cols: usize,
    cells: Vec<Option<String>>,
}

impl ColorMask {
    /// A mask of the given shape with every cell unset.
    ///
    /// A mask without rows has no columns either, matching its row-major form.
    pub fn unset(rows: usize, cols: usize) -> Self {
        let cols = if rows == 0 { 0 } else { cols };
        Self {
            rows,
            cols,
            cells: vec![None; rows * cols],
        }
    }

    /// Build a mask from row-major cells.
    pub fn from_rows(rows: Vec<Vec<Option<String>>>) -> Result<Self, TableError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(n_rows * n_cols);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != n_cols {
                return Err(TableError::Ragged {
                    row,
                    expected: n_cols,
                    actual: values.len(),
                });
            }
            cells.extend(values);
        }
        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            cells,
        })
    }

    /// Row-major copy of the cells.
    pub fn to_rows(&self) -> Vec<Vec<Option<String>>> {
        if self.cols == 0 {
            return vec![Vec::new(); self.rows];
        }
        self.cells.chunks(self.cols).map(<[_]>::to_vec).collect()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Color at `(row, col)`, or `None` when unset or out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells[row * self.cols + col].as_deref()
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, color: &str) {
        let cell = &mut self.cells[row * self.cols + col];
        match cell {
            Some(existing) if existing == color => {}
            _ => *cell = Some(color.to_string()),
        }
    }

    /// Number of cells carrying a color.
    pub fn colored_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

// ── Reports ─────────────────────────────────────────────────────────

/// A table paired with its optional color mask.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDesc {
    pub data: Table,
    pub mask: Option<ColorMask>,
}

impl TableDesc {
    pub fn new(data: Table, mask: Option<ColorMask>) -> Self {
        Self { data, mask }
    }

    /// A table rendered without background fills.
    pub fn plain(data: Table) -> Self {
        Self { data, mask: None }
    }
}

/// One report: the tables rendered into a single document, in order.
pub type Report = Vec<TableDesc>;

/// An ordered batch of reports. Consumed once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportRequest {
    reports: Vec<Report>,
}

impl ReportRequest {
    pub fn new(reports: Vec<Report>) -> Self {
        Self { reports }
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn into_reports(self) -> Vec<Report> {
        self.reports
    }
}
