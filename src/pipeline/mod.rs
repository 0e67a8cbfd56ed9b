//! Report batch pipeline.
//!
//! A request fans out into one build per report on a bounded
//! [`WorkerPool`], fans back in at a barrier, and reaches the
//! [`ReportSink`] once:
//! 1. `Orchestrator::run()` validates the batch and opens a batch span
//! 2. every report is built on a blocking worker thread
//! 3. documents are restored to input order
//! 4. the sink delivers them in a single call
//!
//! **No partial batch is ever delivered.**

pub mod orchestrator;
pub mod pool;

pub use orchestrator::{Orchestrator, ReportSink};
pub use pool::WorkerPool;
