//! PDF renderer built on `printpdf`.
//!
//! Tables are laid out as fixed-height rows with equal-width columns. Each
//! region starts on a new page and repeats its header row when it spills over.

use printpdf::path::PaintMode;
use printpdf::{Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect, Rgb};

use crate::error::RenderError;
use crate::render::fonts::FontSet;
use crate::render::style::{HAlign, VAlign};
use crate::render::{PageSize, RenderRegion, Renderer};

const MARGIN_LEFT_MM: f32 = 10.6;
const MARGIN_RIGHT_MM: f32 = 10.6;
const MARGIN_TOP_MM: f32 = 10.6;
const MARGIN_BOTTOM_MM: f32 = 6.4;
const CELL_PADDING_MM: f32 = 1.0;
const MIN_COLUMN_WIDTH_MM: f32 = 4.0;
const PT_TO_MM: f32 = 0.352_778;
/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_EM: f32 = 0.5;

/// Parse a color identifier: a common name or `#rrggbb`.
pub fn parse_color(name: &str) -> Result<Rgb, RenderError> {
    let unknown = || RenderError::UnknownColor(name.to_string());
    let rgb = |r: u8, g: u8, b: u8| {
        Rgb::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            None,
        )
    };

    if let Some(hex) = name.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(unknown());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| unknown());
        return Ok(rgb(channel(0)?, channel(2)?, channel(4)?));
    }

    let (r, g, b) = match name.trim().to_ascii_lowercase().as_str() {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "cyan" => (0, 255, 255),
        "magenta" => (255, 0, 255),
        "gray" | "grey" => (128, 128, 128),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "pink" => (255, 192, 203),
        "brown" => (165, 42, 42),
        _ => return Err(unknown()),
    };
    Ok(rgb(r, g, b))
}

/// Renders regions into a PDF document.
pub struct PdfRenderer {
    fonts: FontSet,
    font_size_pt: f32,
    row_height_mm: f32,
}

impl PdfRenderer {
    pub fn new(fonts: FontSet) -> Self {
        Self {
            fonts,
            font_size_pt: 8.0,
            row_height_mm: 6.0,
        }
    }

    /// Rows that fit under the header on one page, and the column width.
    fn layout(&self, page: PageSize, cols: usize) -> Result<(usize, f32), RenderError> {
        let too_small = || RenderError::PageTooSmall {
            width_mm: page.width_mm,
            height_mm: page.height_mm,
        };
        let usable_w = page.width_mm - MARGIN_LEFT_MM - MARGIN_RIGHT_MM;
        let usable_h = page.height_mm - MARGIN_TOP_MM - MARGIN_BOTTOM_MM;
        if usable_w <= 0.0 || usable_h <= 0.0 {
            return Err(too_small());
        }

        let col_width = usable_w / cols.max(1) as f32;
        let rows_per_page = (usable_h / self.row_height_mm).floor() as usize;
        if col_width < MIN_COLUMN_WIDTH_MM || rows_per_page < 2 {
            return Err(too_small());
        }
        Ok((rows_per_page - 1, col_width))
    }

    fn text_width_mm(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.font_size_pt * GLYPH_WIDTH_EM * PT_TO_MM
    }

    /// Draw rows `[start, end)` of `region` on one page.
    fn draw_page(
        &self,
        layer: &PdfLayerReference,
        font: &IndirectFontRef,
        region: &RenderRegion,
        (start, end): (usize, usize),
        page: PageSize,
        col_width: f32,
    ) -> Result<(), RenderError> {
        let cols = region.headers.len();
        let top = page.height_mm - MARGIN_TOP_MM;
        let row_h = self.row_height_mm;
        let x_of = |col: usize| MARGIN_LEFT_MM + col as f32 * col_width;
        // Line 0 is the header; data row `r` sits on line `r - start + 1`.
        let y_of = |line: usize| top - (line as f32 + 1.0) * row_h;

        for (from, to, color) in region.style.backgrounds() {
            let first = from.row.max(start);
            let last = to.row.min(end.saturating_sub(1));
            if first > last || first >= end {
                continue;
            }
            layer.set_fill_color(Color::Rgb(parse_color(color)?));
            let rect = Rect::new(
                Mm(x_of(from.col)),
                Mm(y_of(last - start + 1)),
                Mm(x_of(to.col + 1)),
                Mm(y_of(first - start + 1) + row_h),
            )
            .with_mode(PaintMode::Fill);
            layer.add_rect(rect);
        }

        layer.set_fill_color(Color::Rgb(parse_color("black")?));
        let baseline = |line: usize, valign: VAlign| {
            let glyph = self.font_size_pt * PT_TO_MM;
            match valign {
                VAlign::Top => y_of(line) + row_h - CELL_PADDING_MM - glyph,
                VAlign::Middle => y_of(line) + (row_h - glyph) / 2.0,
                VAlign::Bottom => y_of(line) + CELL_PADDING_MM,
            }
        };
        let x_text = |col: usize, text: &str, halign: HAlign| match halign {
            HAlign::Left => x_of(col) + CELL_PADDING_MM,
            HAlign::Center => x_of(col) + (col_width - self.text_width_mm(text)) / 2.0,
            HAlign::Right => x_of(col + 1) - CELL_PADDING_MM - self.text_width_mm(text),
        };

        for (col, header) in region.headers.iter().enumerate() {
            layer.use_text(
                header.as_str(),
                self.font_size_pt,
                Mm(x_text(col, header, HAlign::Left)),
                Mm(baseline(0, VAlign::Middle)),
                font,
            );
        }
        for row in start..end {
            let line = row - start + 1;
            for (col, text) in region.cells[row].iter().enumerate() {
                layer.use_text(
                    text.as_str(),
                    self.font_size_pt,
                    Mm(x_text(col, text, region.style.halign(col, row))),
                    Mm(baseline(line, region.style.valign(col, row))),
                    font,
                );
            }
        }

        let lines = end - start + 1;
        if let Some((width, color)) = region.style.inner_grid() {
            layer.set_outline_color(Color::Rgb(parse_color(color)?));
            layer.set_outline_thickness(width);
            for line in 0..lines {
                for col in 0..cols {
                    let cell = Rect::new(
                        Mm(x_of(col)),
                        Mm(y_of(line)),
                        Mm(x_of(col + 1)),
                        Mm(y_of(line) + row_h),
                    )
                    .with_mode(PaintMode::Stroke);
                    layer.add_rect(cell);
                }
            }
        }
        if let Some((width, color)) = region.style.border() {
            layer.set_outline_color(Color::Rgb(parse_color(color)?));
            layer.set_outline_thickness(width);
            let outer = Rect::new(
                Mm(x_of(0)),
                Mm(y_of(lines - 1)),
                Mm(x_of(cols)),
                Mm(top),
            )
            .with_mode(PaintMode::Stroke);
            layer.add_rect(outer);
        }

        Ok(())
    }
}

impl Renderer for PdfRenderer {
    fn extension(&self) -> &str {
        "pdf"
    }

    fn content_type(&self) -> &str {
        "application/pdf"
    }

    fn render(&self, regions: &[RenderRegion], page: PageSize) -> Result<Vec<u8>, RenderError> {
        let (doc, first_page, first_layer) = PdfDocument::new(
            "Report",
            Mm(page.width_mm),
            Mm(page.height_mm),
            "Table",
        );
        let font = self.fonts.register(&doc)?;
        let mut first = Some((first_page, first_layer));

        for (table, region) in regions.iter().enumerate() {
            let cols = region.headers.len();
            for (row, cells) in region.cells.iter().enumerate() {
                if cells.len() != cols {
                    return Err(RenderError::NotRectangular {
                        table,
                        row,
                        expected: cols,
                        actual: cells.len(),
                    });
                }
            }

            let (rows_per_page, col_width) = self.layout(page, cols)?;
            let total = region.cells.len();
            let mut start = 0;
            loop {
                let end = (start + rows_per_page).min(total);
                let (page_idx, layer_idx) = first.take().unwrap_or_else(|| {
                    doc.add_page(Mm(page.width_mm), Mm(page.height_mm), "Table")
                });
                let layer = doc.get_page(page_idx).get_layer(layer_idx);
                self.draw_page(&layer, &font, region, (start, end), page, col_width)?;

                start = end;
                if start >= total {
                    break;
                }
            }
        }

        doc.save_to_bytes()
            .map_err(|e| RenderError::Backend(format!("{e:?}")))
    }
}
