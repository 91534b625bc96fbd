//! Concurrent endpoint validation
//!
//! One tokio task is spawned per declared endpoint. Each task receives an owned
//! copy of its endpoint and returns an [`EndpointOutcome`]; the coordinating
//! task joins every worker and only then writes the outcomes back into the
//! shared [`EndpointList`]. No worker ever touches the list itself.
//!
//! Per-endpoint failures are recorded on the endpoints. The validator never
//! turns them into an aggregate error.

use std::collections::BTreeSet;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::context::ProbeContext;
use crate::error::ProviderError;
use crate::models::{Endpoint, EndpointList, EndpointOutcome, EndpointStatus};
use crate::redaction::redact;

/// Per-endpoint probe policy supplied by an adapter
///
/// Whether a given response counts as "working" (for example accepting a 400 as
/// proof that the endpoint exists) is decided here, not by the validator.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// Issue one probe against `endpoint`
    async fn probe(&self, ctx: &ProbeContext, endpoint: &Endpoint) -> Result<(), ProviderError>;
}

/// An [`EndpointProbe`] backed by an async closure
pub struct ProbeFn<F> {
    f: F,
}

/// Wrap an async closure as a probe
pub fn probe_fn<F, Fut>(f: F) -> Arc<ProbeFn<F>>
where
    F: Fn(ProbeContext, Endpoint) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProviderError>> + Send + 'static,
{
    Arc::new(ProbeFn { f })
}

#[async_trait]
impl<F, Fut> EndpointProbe for ProbeFn<F>
where
    F: Fn(ProbeContext, Endpoint) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProviderError>> + Send + 'static,
{
    async fn probe(&self, ctx: &ProbeContext, endpoint: &Endpoint) -> Result<(), ProviderError> {
        (self.f)(ctx.clone(), endpoint.clone()).await
    }
}

/// Counts from one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    /// Endpoints in the list
    pub total: usize,
    /// Endpoints whose probe succeeded
    pub working: usize,
    /// Endpoints whose probe failed, including cancelled ones
    pub failed: usize,
    /// Deprecated endpoints that were not probed
    pub skipped: usize,
    /// Wall-clock time of the whole pass
    pub elapsed: Duration,
}

impl ValidationSummary {
    /// Number of endpoints actually probed
    pub fn probed(&self) -> usize {
        self.working + self.failed
    }

    /// Every probed endpoint failed (false when nothing was probed)
    pub fn all_failed(&self) -> bool {
        self.probed() > 0 && self.working == 0
    }

    /// Every probed endpoint is working
    pub fn all_working(&self) -> bool {
        self.failed == 0
    }
}

type DiagnosticSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Runs probes in parallel and records their outcomes
///
/// The only lock held by workers guards the verbose diagnostic stream, so
/// concurrent report lines never interleave.
#[derive(Clone)]
pub struct EndpointValidator {
    sink: DiagnosticSink,
}

impl EndpointValidator {
    /// Validator writing verbose diagnostics to stderr
    pub fn new() -> Self {
        Self::with_sink(std::io::stderr())
    }

    /// Validator writing verbose diagnostics to `writer`
    pub fn with_sink<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Probe every non-deprecated endpoint in `endpoints` concurrently
    ///
    /// Returns only after every worker has finished, cancellation included.
    /// Previous outcomes are overwritten, never merged.
    #[instrument(level = "debug", skip_all, fields(endpoints = endpoints.len()))]
    pub async fn validate(
        &self,
        ctx: &ProbeContext,
        endpoints: &EndpointList,
        probe: Arc<dyn EndpointProbe>,
        verbose: bool,
    ) -> ValidationSummary {
        let started = Instant::now();
        let snapshot = endpoints.snapshot();
        let total = snapshot.len();

        let mut workers = JoinSet::new();
        let mut pending = BTreeSet::new();
        let mut skipped = 0;

        for (index, endpoint) in snapshot.into_iter().enumerate() {
            if endpoint.is_deprecated() {
                skipped += 1;
                continue;
            }

            pending.insert(index);
            let ctx = ctx.clone();
            let probe = Arc::clone(&probe);
            let sink = verbose.then(|| Arc::clone(&self.sink));

            workers.spawn(async move {
                let outcome = probe_endpoint(&ctx, probe.as_ref(), &endpoint).await;
                if let Some(sink) = sink {
                    report(&sink, &endpoint, &outcome);
                }
                (index, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    pending.remove(&index);
                    outcomes.push((index, outcome));
                }
                Err(err) => warn!("Endpoint probe task did not complete: {}", err),
            }
        }

        // Workers that panicked never reported back; their index is still pending.
        let aborted = started.elapsed();
        for index in pending {
            outcomes.push((
                index,
                EndpointOutcome::failed(aborted, "probe task panicked before completing"),
            ));
        }

        let working = outcomes
            .iter()
            .filter(|(_, outcome)| outcome.status == EndpointStatus::Working)
            .count();
        let failed = outcomes.len() - working;

        endpoints.apply(outcomes);

        let summary = ValidationSummary {
            total,
            working,
            failed,
            skipped,
            elapsed: started.elapsed(),
        };
        info!(
            total = summary.total,
            working = summary.working,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Endpoint validation finished"
        );
        summary
    }
}

impl Default for EndpointValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate `endpoints` with a stderr diagnostic sink
///
/// ```
/// use apiprism_providers::{
///     probe_fn, validate_endpoints, Endpoint, EndpointList, EndpointStatus, ProbeContext,
///     ProviderError,
/// };
///
/// # tokio_test::block_on(async {
/// let endpoints = EndpointList::new(vec![
///     Endpoint::get("/models"),
///     Endpoint::get("/gone").deprecated(),
/// ]);
/// let probe = probe_fn(|_ctx, _endpoint| async { Ok::<(), ProviderError>(()) });
///
/// let ctx = ProbeContext::background();
/// let summary = validate_endpoints(&ctx, &endpoints, probe, false).await;
/// assert_eq!(summary.working, 1);
/// assert_eq!(summary.skipped, 1);
/// assert_eq!(
///     endpoints.statuses(),
///     vec![EndpointStatus::Working, EndpointStatus::Deprecated]
/// );
/// # });
/// ```
pub async fn validate_endpoints(
    ctx: &ProbeContext,
    endpoints: &EndpointList,
    probe: Arc<dyn EndpointProbe>,
    verbose: bool,
) -> ValidationSummary {
    EndpointValidator::new()
        .validate(ctx, endpoints, probe, verbose)
        .await
}

async fn probe_endpoint(
    ctx: &ProbeContext,
    probe: &dyn EndpointProbe,
    endpoint: &Endpoint,
) -> EndpointOutcome {
    let started = Instant::now();
    let result = ctx.run(probe.probe(ctx, endpoint)).await;
    let latency = started.elapsed();

    match result {
        Ok(()) => {
            debug!(
                method = %endpoint.method(),
                path = endpoint.path(),
                latency_ms = latency.as_millis() as u64,
                "Endpoint working"
            );
            EndpointOutcome::working(latency)
        }
        Err(err) => {
            let message = redact(&err.to_string());
            warn!(
                method = %endpoint.method(),
                path = endpoint.path(),
                latency_ms = latency.as_millis() as u64,
                error = %message,
                "Endpoint failed"
            );
            EndpointOutcome::failed(latency, message)
        }
    }
}

fn report(sink: &DiagnosticSink, endpoint: &Endpoint, outcome: &EndpointOutcome) {
    let line = match outcome.status {
        EndpointStatus::Working => format!(
            "  [ok]   {} {} ({} ms)",
            endpoint.method(),
            endpoint.path(),
            outcome.latency.as_millis()
        ),
        _ => format!(
            "  [fail] {} {} ({} ms): {}",
            endpoint.method(),
            endpoint.path(),
            outcome.latency.as_millis(),
            outcome.error
        ),
    };

    let mut sink = sink.lock();
    if let Err(err) = writeln!(sink, "{}", line) {
        debug!("Failed to write endpoint diagnostics: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancelReason;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn always_ok() -> Arc<dyn EndpointProbe> {
        probe_fn(|_ctx, _endpoint| async { Ok::<(), ProviderError>(()) })
    }

    #[tokio::test]
    async fn test_empty_list_completes_immediately() {
        let ctx = ProbeContext::background();
        let list = EndpointList::default();
        let summary = validate_endpoints(&ctx, &list, always_ok(), false).await;
        assert_eq!(summary.total, 0);
        assert_eq!(summary.probed(), 0);
        assert!(!summary.all_failed());
    }

    #[tokio::test]
    async fn test_deprecated_endpoints_are_skipped() {
        let list = EndpointList::new(vec![
            Endpoint::get("/live"),
            Endpoint::get("/retired").deprecated(),
        ]);
        let ctx = ProbeContext::background();
        let summary = validate_endpoints(&ctx, &list, always_ok(), false).await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.working, 1);
        assert_eq!(
            list.statuses(),
            vec![EndpointStatus::Working, EndpointStatus::Deprecated]
        );
    }

    #[tokio::test]
    async fn test_failures_are_redacted() {
        let list = EndpointList::new(vec![Endpoint::get("/models")]);
        let probe = probe_fn(|_ctx, _endpoint| async {
            Err::<(), _>(ProviderError::remote_status(
                401,
                "bad key sk-abcdefghijklmnopqrstuvwx",
            ))
        });

        let ctx = ProbeContext::background();
        validate_endpoints(&ctx, &list, probe, false).await;

        let endpoint = list.get(0).unwrap();
        assert_eq!(endpoint.status(), EndpointStatus::Failed);
        assert!(endpoint.error().contains("401"));
        assert!(!endpoint.error().contains("abcdefghijklmnop"));
    }

    #[tokio::test]
    async fn test_panicking_probe_marks_endpoint_failed() {
        let list = EndpointList::new(vec![Endpoint::get("/ok"), Endpoint::get("/boom")]);
        let probe = probe_fn(|_ctx, endpoint: Endpoint| async move {
            if endpoint.path() == "/boom" {
                panic!("probe exploded");
            }
            Ok::<(), ProviderError>(())
        });

        let ctx = ProbeContext::background();
        let summary = validate_endpoints(&ctx, &list, probe, false).await;

        assert_eq!(summary.working, 1);
        assert_eq!(summary.failed, 1);
        let boom = list.get(1).unwrap();
        assert_eq!(boom.status(), EndpointStatus::Failed);
        assert!(boom.error().contains("panicked"));
    }

    #[tokio::test]
    async fn test_already_cancelled_context_fails_every_endpoint() {
        let ctx = ProbeContext::background();
        ctx.cancel();
        let list = EndpointList::new(vec![Endpoint::get("/a"), Endpoint::get("/b")]);

        let summary = validate_endpoints(&ctx, &list, always_ok(), false).await;

        assert!(summary.all_failed());
        for endpoint in list.snapshot() {
            assert_eq!(endpoint.status(), EndpointStatus::Failed);
            let reason = CancelReason::Cancelled.to_string();
            assert!(endpoint.error().contains(&reason));
        }
    }

    #[tokio::test]
    async fn test_verbose_output_is_one_line_per_endpoint() {
        let buffer = SharedBuffer::default();
        let validator = EndpointValidator::with_sink(buffer.clone());
        let list = EndpointList::new((0..8).map(|i| Endpoint::get(format!("/e{}", i))).collect());
        let probe = probe_fn(|_ctx, endpoint: Endpoint| async move {
            if endpoint.path().ends_with('3') {
                Err(ProviderError::remote_status(503, "unavailable"))
            } else {
                Ok::<(), ProviderError>(())
            }
        });

        validator
            .validate(&ProbeContext::background(), &list, probe, true)
            .await;

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines.iter().filter(|l| l.contains("[fail]")).count(), 1);
        assert!(lines
            .iter()
            .all(|l| l.starts_with("  [ok]") || l.starts_with("  [fail]")));
    }

    #[tokio::test]
    async fn test_quiet_mode_writes_nothing() {
        let buffer = SharedBuffer::default();
        let validator = EndpointValidator::with_sink(buffer.clone());
        let list = EndpointList::new(vec![Endpoint::get("/a")]);

        validator
            .validate(&ProbeContext::background(), &list, always_ok(), false)
            .await;

        assert!(buffer.0.lock().is_empty());
    }
}
