//! Color mask derivation from row or column labels.
//!
//! A label vector assigns one category to every row (or every column) of a
//! table. A [`ColorMapping`] turns categories into colors; labels it does not
//! cover fall back to a default color. The result is a [`ColorMask`] with the
//! table's exact shape.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::table::model::{ColorMask, Table};

/// Color used for labels with no explicit mapping.
pub const DEFAULT_COLOR: &str = "gray";

/// Table axis a label vector runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// One label per row; a label paints its whole row.
    Rows,
    /// One label per column; a label paints its whole column.
    Columns,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows => f.write_str("rows"),
            Self::Columns => f.write_str("columns"),
        }
    }
}

/// Ordered label → color mapping.
///
/// Iteration order is insertion order. Re-inserting a label replaces its
/// color in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorMapping<L> {
    entries: Vec<(L, String)>,
}

impl<L: Eq> Default for ColorMapping<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Eq> ColorMapping<L> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, label: L, color: impl Into<String>) {
        let color = color.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = color,
            None => self.entries.push((label, color)),
        }
    }

    pub fn with(mut self, label: L, color: impl Into<String>) -> Self {
        self.insert(label, color);
        self
    }

    pub fn get(&self, label: &L) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, c)| c.as_str())
    }

    pub fn contains(&self, label: &L) -> bool {
        self.get(label).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&L, &str)> {
        self.entries.iter().map(|(l, c)| (l, c.as_str()))
    }
}

impl ColorMapping<i64> {
    /// The two-class preset: `1 → green`, `2 → red`.
    pub fn binary() -> Self {
        Self::new().with(1, "green").with(2, "red")
    }
}

impl<L: Eq> FromIterator<(L, String)> for ColorMapping<L> {
    fn from_iter<I: IntoIterator<Item = (L, String)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (label, color) in iter {
            mapping.insert(label, color);
        }
        mapping
    }
}

/// Complete `mapping` so every label in `labels` resolves to a color.
///
/// Explicit entries keep their caller-given order; labels missing from the
/// mapping follow, in order of first appearance, mapped to `default_color`.
pub fn effective_mapping<L>(
    labels: &[L],
    mapping: Option<&ColorMapping<L>>,
    default_color: &str,
) -> ColorMapping<L>
where
    L: Eq + Clone,
{
    let mut effective = mapping.cloned().unwrap_or_default();
    for label in labels {
        if !effective.contains(label) {
            effective.entries.push((label.clone(), default_color.to_string()));
        }
    }
    effective
}

/// Derive a color mask for `table` from `labels` along `axis`.
///
/// Every position whose label maps to color `c` has its whole orthogonal
/// slice painted `c`. Entries are applied in [`effective_mapping`] order, so
/// a later entry wins wherever two entries touch the same cell.
pub fn derive_mask<L>(
    table: &Table,
    labels: &[L],
    axis: Axis,
    mapping: Option<&ColorMapping<L>>,
    default_color: &str,
) -> Result<ColorMask, TableError>
where
    L: Eq + Hash + Clone,
{
    let (rows, cols) = table.shape();
    let expected = match axis {
        Axis::Rows => rows,
        Axis::Columns => cols,
    };
    if labels.len() != expected {
        return Err(TableError::ShapeMismatch {
            axis,
            expected,
            actual: labels.len(),
        });
    }

    let effective = effective_mapping(labels, mapping, default_color);

    // Positions per label, so each entry paints only its own slices.
    let mut positions: HashMap<&L, Vec<usize>> = HashMap::new();
    for (pos, label) in labels.iter().enumerate() {
        positions.entry(label).or_default().push(pos);
    }

    let mut mask = ColorMask::unset(rows, cols);
    for (label, color) in effective.iter() {
        let Some(hits) = positions.get(label) else {
            continue;
        };
        for &pos in hits {
            match axis {
                Axis::Rows => (0..cols).for_each(|c| mask.set(pos, c, color)),
                Axis::Columns => (0..rows).for_each(|r| mask.set(r, pos, color)),
            }
        }
    }

    Ok(mask)
}
