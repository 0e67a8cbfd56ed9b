//! Error types for the report pipeline.

use std::time::Duration;

use crate::table::Axis;

/// Failures that stop a batch before anything is mailed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load font from {path}: {source}")]
    Font {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Upstream payload errors. The core never produces these itself; they guard
/// the boundary where a JSON document becomes a report request.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema violation at {path}: {reason}")]
    Violation { path: String, reason: String },

    #[error("Unsupported payload version {found} (expected {expected})")]
    UnsupportedVersion { found: u64, expected: u64 },

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn violation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Violation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Table construction and color mask derivation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("Label vector has {actual} entries but the table has {expected} along {axis}")]
    ShapeMismatch {
        axis: Axis,
        expected: usize,
        actual: usize,
    },

    #[error("Row {row} has {actual} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Table has {headers} column headers but rows are {width} cells wide")]
    HeaderCount { headers: usize, width: usize },
}

/// Rendering collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Table {table}: row {row} has {actual} cells, expected {expected}")]
    NotRectangular {
        table: usize,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Table {table}: mask is {mask_rows}x{mask_cols} but data is {rows}x{cols}")]
    MaskShape {
        table: usize,
        rows: usize,
        cols: usize,
        mask_rows: usize,
        mask_cols: usize,
    },

    #[error("Unknown color identifier: {0}")]
    UnknownColor(String),

    #[error("Page {width_mm}x{height_mm}mm is too small for the table layout")]
    PageTooSmall { width_mm: f32, height_mm: f32 },

    #[error("Document backend failed: {0}")]
    Backend(String),
}

/// Batch-level failures. Any of these means no mail was sent.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Report request is empty")]
    EmptyBatch,

    #[error("Report {report} failed to render: {source}")]
    RenderFailure {
        report: usize,
        #[source]
        source: RenderError,
    },

    #[error("Worker for report {report} panicked: {reason}")]
    WorkerPanicked { report: usize, reason: String },

    #[error("Worker task failed: {0}")]
    Join(String),

    #[error("Worker pool closed")]
    PoolClosed,

    #[error("Batch exceeded its deadline of {deadline:?}")]
    DeadlineExceeded { deadline: Duration },

    #[error("Batch cancelled before all reports were built")]
    Cancelled,
}

/// Delivery-stage failures. The dispatcher logs and returns these as an
/// outcome; they never propagate as errors past it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("SMTP username or password is empty")]
    MissingCredentials,

    #[error("Failed to compose message: {0}")]
    Compose(String),

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Sender address rejected: {0}")]
    SenderRejected(String),

    #[error("Unexpected delivery error: {0}")]
    Unexpected(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
