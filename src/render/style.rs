//! Table style commands: the fixed base style plus background directives.

use crate::table::{CellRef, DirectiveKind, StyleDirective};

/// Line width of the grid and border, in points.
pub const GRID_WIDTH_PT: f32 = 0.25;

/// Color of the grid and border.
pub const GRID_COLOR: &str = "black";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
}

/// One styling instruction over an inclusive cell range.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleCommand {
    Background {
        from: CellRef,
        to: CellRef,
        color: String,
    },
    Align {
        from: CellRef,
        to: CellRef,
        align: HAlign,
    },
    VAlign {
        from: CellRef,
        to: CellRef,
        align: VAlign,
    },
    InnerGrid {
        width_pt: f32,
        color: String,
    },
    Box {
        width_pt: f32,
        color: String,
    },
}

impl From<&StyleDirective> for StyleCommand {
    fn from(d: &StyleDirective) -> Self {
        match d.kind {
            DirectiveKind::Background => Self::Background {
                from: d.from,
                to: d.to,
                color: d.color.clone(),
            },
        }
    }
}

fn contains(from: CellRef, to: CellRef, col: usize, row: usize) -> bool {
    (from.col..=to.col).contains(&col) && (from.row..=to.row).contains(&row)
}

/// Ordered style commands for one table. Later commands win.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableStyle {
    commands: Vec<StyleCommand>,
}

impl TableStyle {
    /// Base style for a `rows` x `cols` table: right-aligned interior, first
    /// column top-aligned, centered last row, thin black grid and border.
    pub fn base(rows: usize, cols: usize) -> Self {
        let mut commands = Vec::new();
        if rows == 0 || cols == 0 {
            return Self { commands };
        }
        let (last_row, last_col) = (rows - 1, cols - 1);

        if rows >= 3 && cols >= 3 {
            commands.push(StyleCommand::Align {
                from: CellRef::new(1, 1),
                to: CellRef::new(last_col - 1, last_row - 1),
                align: HAlign::Right,
            });
        }
        commands.push(StyleCommand::VAlign {
            from: CellRef::new(0, 0),
            to: CellRef::new(0, last_row),
            align: VAlign::Top,
        });
        commands.push(StyleCommand::Align {
            from: CellRef::new(0, last_row),
            to: CellRef::new(last_col, last_row),
            align: HAlign::Center,
        });
        commands.push(StyleCommand::VAlign {
            from: CellRef::new(0, last_row),
            to: CellRef::new(last_col, last_row),
            align: VAlign::Middle,
        });
        commands.push(StyleCommand::InnerGrid {
            width_pt: GRID_WIDTH_PT,
            color: GRID_COLOR.to_string(),
        });
        commands.push(StyleCommand::Box {
            width_pt: GRID_WIDTH_PT,
            color: GRID_COLOR.to_string(),
        });

        Self { commands }
    }

    /// Base style followed by `directives`.
    pub fn merged(rows: usize, cols: usize, directives: &[StyleDirective]) -> Self {
        let mut style = Self::base(rows, cols);
        style.commands.extend(directives.iter().map(StyleCommand::from));
        style
    }

    pub fn commands(&self) -> &[StyleCommand] {
        &self.commands
    }

    pub fn backgrounds(&self) -> impl Iterator<Item = (CellRef, CellRef, &str)> {
        self.commands.iter().filter_map(|c| match c {
            StyleCommand::Background { from, to, color } => Some((*from, *to, color.as_str())),
            _ => None,
        })
    }

    /// Horizontal alignment at a cell; left when nothing applies.
    pub fn halign(&self, col: usize, row: usize) -> HAlign {
        self.commands
            .iter()
            .rev()
            .find_map(|c| match c {
                StyleCommand::Align { from, to, align } if contains(*from, *to, col, row) => {
                    Some(*align)
                }
                _ => None,
            })
            .unwrap_or(HAlign::Left)
    }

    /// Vertical alignment at a cell; bottom when nothing applies.
    pub fn valign(&self, col: usize, row: usize) -> VAlign {
        self.commands
            .iter()
            .rev()
            .find_map(|c| match c {
                StyleCommand::VAlign { from, to, align } if contains(*from, *to, col, row) => {
                    Some(*align)
                }
                _ => None,
            })
            .unwrap_or(VAlign::Bottom)
    }

    /// Inner grid line `(width, color)`, if any.
    pub fn inner_grid(&self) -> Option<(f32, &str)> {
        self.commands.iter().rev().find_map(|c| match c {
            StyleCommand::InnerGrid { width_pt, color } => Some((*width_pt, color.as_str())),
            _ => None,
        })
    }

    /// Outer border `(width, color)`, if any.
    pub fn border(&self) -> Option<(f32, &str)> {
        self.commands.iter().rev().find_map(|c| match c {
            StyleCommand::Box { width_pt, color } => Some((*width_pt, color.as_str())),
            _ => None,
        })
    }
}
