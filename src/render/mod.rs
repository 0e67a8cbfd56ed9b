//! Document rendering.
//!
//! The [`Renderer`] trait is the narrow contract to whatever turns styled
//! tables into bytes. [`DocumentBuilder`] prepares one report's regions
//! (compressed mask + base style) and hands them to the renderer.

pub mod builder;
pub mod fonts;
pub mod pdf;
pub mod style;

pub use builder::{DocumentBuilder, ReportBuilder};
pub use fonts::FontSet;
pub use pdf::PdfRenderer;
pub use style::{HAlign, StyleCommand, TableStyle, VAlign};

use crate::error::RenderError;

/// Page dimensions in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PageSize {
    /// ISO A4 portrait.
    pub const A4: Self = Self {
        width_mm: 210.0,
        height_mm: 297.0,
    };

    pub fn new(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// One table as the renderer sees it: cell text, headers, merged style.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRegion {
    pub headers: Vec<String>,
    pub cells: Vec<Vec<String>>,
    pub style: TableStyle,
}

/// Bytes produced for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. `pdf`.
    pub extension: String,
    /// MIME type of `bytes`.
    pub content_type: String,
}

impl RenderedDocument {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Rendering collaborator.
///
/// Implementations must be usable from several worker threads at once and
/// must not keep per-call state between renders.
pub trait Renderer: Send + Sync {
    /// File extension of produced documents.
    fn extension(&self) -> &str;

    /// MIME type of produced documents.
    fn content_type(&self) -> &str;

    /// Render all regions into one document, each region starting a new page.
    fn render(&self, regions: &[RenderRegion], page: PageSize) -> Result<Vec<u8>, RenderError>;
}
