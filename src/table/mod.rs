//! Tables, color masks and the style directives derived from them.
//!
//! - `model`: Table, ColorMask, TableDesc, ReportRequest
//! - `mask`: label vector → color mask
//! - `segments`: color mask → rectangular background directives
//! - `codec`: versioned JSON contract for requests
//! - `demo`: built-in sample request

pub mod codec;
pub mod demo;
pub mod mask;
pub mod model;
pub mod segments;

pub use codec::{decode_request, encode_request};
pub use mask::{Axis, ColorMapping, DEFAULT_COLOR, derive_mask};
pub use model::{CellValue, ColorMask, Report, ReportRequest, Table, TableDesc};
pub use segments::{CellRef, DirectiveKind, StyleDirective, compress};
