//! Fan-out/fan-in orchestrator.
//!
//! Every report is built on a blocking worker thread, gated by the
//! [`WorkerPool`]. The coordinator waits for all builds (or the first
//! failure), restores input order, and only then calls the sink, exactly once.
//!
//! **A batch either delivers every document or delivers nothing.** Any build
//! failure, worker panic, deadline expiry or shutdown aborts the batch before
//! the sink is touched.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::BatchError;
use crate::mail::DeliveryOutcome;
use crate::pipeline::pool::WorkerPool;
use crate::render::{RenderedDocument, ReportBuilder};
use crate::table::{Report, ReportRequest};

/// Receives the documents of a fully built batch.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver `documents`, in request order. Never fails; problems are
    /// reported through the outcome.
    async fn deliver(&self, documents: Vec<RenderedDocument>) -> DeliveryOutcome;
}

type BuildResult = (usize, Result<RenderedDocument, BatchError>);

/// Schedules report builds and hands the results to a sink.
pub struct Orchestrator {
    builder: Arc<dyn ReportBuilder>,
    pool: WorkerPool,
    deadline: Option<Duration>,
}

impl Orchestrator {
    pub fn new(builder: Arc<dyn ReportBuilder>, pool: WorkerPool) -> Self {
        Self {
            builder,
            pool,
            deadline: None,
        }
    }

    /// Fail the batch if building takes longer than `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Build every report and deliver the documents once.
    pub async fn run<S>(&self, request: ReportRequest, sink: &S) -> Result<DeliveryOutcome, BatchError>
    where
        S: ReportSink + ?Sized,
    {
        self.run_until(request, sink, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but gives up with [`BatchError::Cancelled`]
    /// if `shutdown` resolves before every build has finished.
    pub async fn run_until<S, F>(
        &self,
        request: ReportRequest,
        sink: &S,
        shutdown: F,
    ) -> Result<DeliveryOutcome, BatchError>
    where
        S: ReportSink + ?Sized,
        F: Future<Output = ()>,
    {
        if request.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let batch = Uuid::new_v4();
        let span = info_span!("batch", %batch, reports = request.len());

        async move {
            let documents = self.build_all(request, shutdown).await?;
            info!(attachments = documents.len(), "All reports built, delivering");
            Ok(sink.deliver(documents).await)
        }
        .instrument(span)
        .await
    }

    /// Fan out every build, then gather the documents in request order.
    pub async fn build_all<F>(
        &self,
        request: ReportRequest,
        shutdown: F,
    ) -> Result<Vec<RenderedDocument>, BatchError>
    where
        F: Future<Output = ()>,
    {
        let total = request.len();
        let mut tasks = self.fan_out(request.into_reports());

        let gathered = tokio::select! {
            result = with_deadline(self.deadline, gather(&mut tasks, total)) => result,
            () = shutdown => {
                warn!("Shutdown requested before all reports were built");
                Err(BatchError::Cancelled)
            }
        };

        if gathered.is_err() {
            // Queued builds never start; running blocking builds finish detached.
            tasks.abort_all();
        }
        gathered
    }

    fn fan_out(&self, reports: Vec<Report>) -> JoinSet<BuildResult> {
        let mut tasks = JoinSet::new();
        for (index, report) in reports.into_iter().enumerate() {
            let builder = Arc::clone(&self.builder);
            let pool = self.pool.clone();
            tasks.spawn(async move {
                let result = async {
                    let permit = pool.acquire().await?;
                    debug!(report = index, "Building report");
                    // The permit travels with the build so a detached build still holds its slot.
                    let build = move || {
                        let _permit = permit;
                        builder.build(index, &report)
                    };
                    match tokio::task::spawn_blocking(build).await {
                        Ok(Ok(document)) => Ok(document),
                        Ok(Err(source)) => Err(BatchError::RenderFailure {
                            report: index,
                            source,
                        }),
                        Err(e) => Err(BatchError::WorkerPanicked {
                            report: index,
                            reason: e.to_string(),
                        }),
                    }
                }
                .await;
                (index, result)
            });
        }
        tasks
    }
}

/// Fan-in barrier: wait for every task, stop at the first failure.
async fn gather(
    tasks: &mut JoinSet<BuildResult>,
    total: usize,
) -> Result<Vec<RenderedDocument>, BatchError> {
    let mut slots: Vec<Option<RenderedDocument>> = (0..total).map(|_| None).collect();

    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.map_err(|e| BatchError::Join(e.to_string()))?;
        match result {
            Ok(document) => {
                debug!(report = index, bytes = document.len(), "Report built");
                slots[index] = Some(document);
            }
            Err(e) => {
                error!(report = index, error = %e, "Report build failed, aborting batch");
                return Err(e);
            }
        }
    }

    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| BatchError::Join("a worker finished without a result".to_string()))
}

async fn with_deadline<T, F>(deadline: Option<Duration>, work: F) -> Result<T, BatchError>
where
    F: Future<Output = Result<T, BatchError>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| BatchError::DeadlineExceeded { deadline: limit })?,
        None => work.await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::RenderError;

    /// Builder whose per-report behaviour is scripted by index.
    #[derive(Default)]
    struct ScriptedBuilder {
        delays_ms: HashMap<usize, u64>,
        fail: Option<usize>,
        panic: Option<usize>,
        finished: Mutex<Vec<usize>>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ReportBuilder for ScriptedBuilder {
        fn build(&self, index: usize, _report: &Report) -> Result<RenderedDocument, RenderError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays_ms.get(&index).copied().unwrap_or(5);
            std::thread::sleep(Duration::from_millis(delay));
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.finished.lock().unwrap().push(index);

            if self.panic == Some(index) {
                panic!("scripted panic in report {index}");
            }
            if self.fail == Some(index) {
                return Err(RenderError::Backend("scripted failure".into()));
            }
            Ok(RenderedDocument {
                bytes: format!("doc{index}").into_bytes(),
                extension: "txt".into(),
                content_type: "text/plain".into(),
            })
        }
    }

    /// Sink that records every delivery.
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<Vec<RenderedDocument>>>,
    }

    impl RecordingSink {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        async fn deliver(&self, documents: Vec<RenderedDocument>) -> DeliveryOutcome {
            let attachments = documents.len();
            self.calls.lock().unwrap().push(documents);
            DeliveryOutcome::Delivered {
                attachments,
                recipients: 1,
            }
        }
    }

    fn request(n: usize) -> ReportRequest {
        ReportRequest::new(vec![Vec::new(); n])
    }

    fn orchestrator(builder: Arc<ScriptedBuilder>, workers: usize) -> Orchestrator {
        Orchestrator::new(builder, WorkerPool::new(workers))
    }

    #[tokio::test]
    async fn delivers_in_request_order_regardless_of_completion() {
        let builder = Arc::new(ScriptedBuilder {
            delays_ms: HashMap::from([(0, 150), (1, 10), (2, 80)]),
            ..Default::default()
        });
        let sink = RecordingSink::default();

        let outcome = orchestrator(builder.clone(), 3)
            .run(request(3), &sink)
            .await
            .unwrap();

        assert_eq!(builder.finished.lock().unwrap()[0], 1);
        assert!(matches!(outcome, DeliveryOutcome::Delivered { attachments: 3, .. }));

        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let bodies: Vec<_> = calls[0].iter().map(|d| d.bytes.clone()).collect();
        assert_eq!(bodies, vec![b"doc0".to_vec(), b"doc1".to_vec(), b"doc2".to_vec()]);
    }

    #[tokio::test]
    async fn one_failed_build_means_no_delivery() {
        let builder = Arc::new(ScriptedBuilder {
            fail: Some(1),
            ..Default::default()
        });
        let sink = RecordingSink::default();

        let err = orchestrator(builder, 2).run(request(3), &sink).await.unwrap_err();

        assert!(matches!(err, BatchError::RenderFailure { report: 1, .. }));
        assert_eq!(sink.call_count(), 0);
    }

    #[tokio::test]
    async fn worker_panic_aborts_batch() {
        let builder = Arc::new(ScriptedBuilder {
            panic: Some(0),
            ..Default::default()
        });
        let sink = RecordingSink::default();

        let err = orchestrator(builder, 2).run(request(2), &sink).await.unwrap_err();

        assert!(matches!(err, BatchError::WorkerPanicked { report: 0, .. }));
        assert_eq!(sink.call_count(), 0);
    }

    #[tokio::test]
    async fn deadline_expiry_is_fatal() {
        let builder = Arc::new(ScriptedBuilder {
            delays_ms: HashMap::from([(0, 400)]),
            ..Default::default()
        });
        let sink = RecordingSink::default();

        let err = orchestrator(builder, 1)
            .with_deadline(Some(Duration::from_millis(50)))
            .run(request(2), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::DeadlineExceeded { .. }));
        assert_eq!(sink.call_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_cancels_without_delivery() {
        let builder = Arc::new(ScriptedBuilder {
            delays_ms: HashMap::from([(0, 300), (1, 300)]),
            ..Default::default()
        });
        let sink = RecordingSink::default();

        let err = orchestrator(builder, 2)
            .run_until(
                request(2),
                &sink,
                tokio::time::sleep(Duration::from_millis(30)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Cancelled));
        assert_eq!(sink.call_count(), 0);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_pool_size() {
        let builder = Arc::new(ScriptedBuilder {
            delays_ms: (0..6).map(|i| (i, 30)).collect(),
            ..Default::default()
        });
        let sink = RecordingSink::default();

        orchestrator(builder.clone(), 2)
            .run(request(6), &sink)
            .await
            .unwrap();

        assert!(builder.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(builder.finished.lock().unwrap().len(), 6);
        assert_eq!(sink.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let sink = RecordingSink::default();
        let err = orchestrator(Arc::new(ScriptedBuilder::default()), 1)
            .run(ReportRequest::default(), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::EmptyBatch));
        assert_eq!(sink.call_count(), 0);
    }

    #[tokio::test]
    async fn detached_build_keeps_its_slot_until_it_finishes() {
        let builder = Arc::new(ScriptedBuilder {
            delays_ms: HashMap::from([(0, 300)]),
            ..Default::default()
        });
        let pool = WorkerPool::new(1);
        let orchestrator = Orchestrator::new(builder.clone(), pool.clone())
            .with_deadline(Some(Duration::from_millis(50)));
        let sink = RecordingSink::default();

        let err = orchestrator.run(request(2), &sink).await.unwrap_err();
        assert!(matches!(err, BatchError::DeadlineExceeded { .. }));

        // Report 0 is still building on its blocking thread.
        assert_eq!(pool.available(), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(builder.finished.lock().unwrap().as_slice(), &[0]);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn permits_are_released_after_a_batch() {
        let orchestrator = orchestrator(Arc::new(ScriptedBuilder::default()), 3);
        let sink = RecordingSink::default();
        orchestrator.run(request(5), &sink).await.unwrap();
        assert_eq!(orchestrator.pool().available(), 3);
    }
}
