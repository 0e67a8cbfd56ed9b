//! One batch, from payload text to delivery outcome.

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use crate::config::ReportConfig;
use crate::error::Result;
use crate::mail::{DeliveryOutcome, MailDispatcher};
use crate::pipeline::{Orchestrator, WorkerPool};
use crate::render::{DocumentBuilder, FontSet, PdfRenderer};
use crate::table::decode_request;

/// Decode `payload`, build every report and mail them over SMTP.
///
/// Returns `Ok(None)` when the payload is blank. A failed delivery is an
/// `Ok` outcome; only configuration, payload and batch failures are errors.
pub async fn run_payload<F>(
    config: &ReportConfig,
    payload: &str,
    shutdown: F,
) -> Result<Option<DeliveryOutcome>>
where
    F: Future<Output = ()>,
{
    let dispatcher = MailDispatcher::smtp(config.mail.clone());
    run_payload_with(config, payload, &dispatcher, shutdown).await
}

/// [`run_payload`] with a caller-supplied dispatcher.
pub async fn run_payload_with<F>(
    config: &ReportConfig,
    payload: &str,
    dispatcher: &MailDispatcher,
    shutdown: F,
) -> Result<Option<DeliveryOutcome>>
where
    F: Future<Output = ()>,
{
    if payload.trim().is_empty() {
        info!("Empty payload, nothing to do");
        return Ok(None);
    }
    let request = decode_request(payload)?;
    info!(reports = request.len(), "Payload decoded");

    let fonts = FontSet::load(config.font_path.as_deref())?;
    let renderer = Arc::new(PdfRenderer::new(fonts));
    let builder = Arc::new(DocumentBuilder::new(renderer, config.page));
    let orchestrator =
        Orchestrator::new(builder, WorkerPool::new(config.workers)).with_deadline(config.deadline);

    let outcome = orchestrator.run_until(request, dispatcher, shutdown).await?;
    Ok(Some(outcome))
}
