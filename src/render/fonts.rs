//! Font set for PDF output, loaded once at startup.

use std::path::Path;
use std::sync::Arc;

use printpdf::{BuiltinFont, IndirectFontRef, PdfDocumentReference};
use tracing::info;

use crate::error::{ConfigError, RenderError};

/// Fonts available to the PDF renderer.
///
/// Built-in fonts cover Latin text only; embed a TTF for anything else.
#[derive(Debug, Clone)]
pub enum FontSet {
    Builtin(BuiltinFont),
    Embedded(Arc<[u8]>),
}

impl Default for FontSet {
    fn default() -> Self {
        Self::Builtin(BuiltinFont::Helvetica)
    }
}

impl FontSet {
    /// Load the font at `path`, or fall back to built-in Helvetica.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Font {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "Loaded report font");
        Ok(Self::Embedded(bytes.into()))
    }

    /// Register this font with one document.
    pub(crate) fn register(&self, doc: &PdfDocumentReference) -> Result<IndirectFontRef, RenderError> {
        let registered = match self {
            Self::Builtin(font) => doc.add_builtin_font(*font),
            Self::Embedded(bytes) => doc.add_external_font(&bytes[..]),
        };
        registered.map_err(|e| RenderError::Backend(format!("font registration failed: {e:?}")))
    }
}
