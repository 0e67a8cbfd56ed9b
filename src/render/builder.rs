//! Document builder: one report in, one rendered document out.

use std::sync::Arc;

use tracing::debug;

use crate::error::RenderError;
use crate::render::{PageSize, RenderRegion, RenderedDocument, Renderer, TableStyle};
use crate::table::{Report, TableDesc, compress};

/// Builds the document for one report. Called once per report, possibly on
/// many worker threads at the same time.
pub trait ReportBuilder: Send + Sync + 'static {
    /// Build report number `index` (0-based position in the request).
    fn build(&self, index: usize, report: &Report) -> Result<RenderedDocument, RenderError>;
}

/// Default builder: compress masks, merge the base style, render.
pub struct DocumentBuilder {
    renderer: Arc<dyn Renderer>,
    page: PageSize,
}

impl DocumentBuilder {
    pub fn new(renderer: Arc<dyn Renderer>, page: PageSize) -> Self {
        Self { renderer, page }
    }

    pub fn page(&self) -> PageSize {
        self.page
    }

    /// Prepare one table for the renderer.
    pub fn region(table_index: usize, desc: &TableDesc) -> Result<RenderRegion, RenderError> {
        let (rows, cols) = desc.data.shape();

        let directives = match &desc.mask {
            None => Vec::new(),
            Some(mask) if mask.is_empty() && rows == 0 => Vec::new(),
            Some(mask) if mask.shape() != (rows, cols) => {
                return Err(RenderError::MaskShape {
                    table: table_index,
                    rows,
                    cols,
                    mask_rows: mask.n_rows(),
                    mask_cols: mask.n_cols(),
                });
            }
            Some(mask) => compress(mask),
        };

        debug!(
            table = table_index,
            rows,
            cols,
            directives = directives.len(),
            "Prepared table region"
        );

        Ok(RenderRegion {
            headers: desc.data.columns().to_vec(),
            cells: desc
                .data
                .rows()
                .iter()
                .map(|row| row.iter().map(ToString::to_string).collect())
                .collect(),
            style: TableStyle::merged(rows, cols, &directives),
        })
    }
}

impl ReportBuilder for DocumentBuilder {
    fn build(&self, index: usize, report: &Report) -> Result<RenderedDocument, RenderError> {
        let regions = report
            .iter()
            .enumerate()
            .map(|(t, desc)| Self::region(t, desc))
            .collect::<Result<Vec<_>, _>>()?;

        let bytes = self.renderer.render(&regions, self.page)?;
        debug!(report = index, bytes = bytes.len(), "Rendered report");

        Ok(RenderedDocument {
            bytes,
            extension: self.renderer.extension().to_string(),
            content_type: self.renderer.content_type().to_string(),
        })
    }
}
