//! Sequential, cancellable benchmark runner.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::aggregator::{ResultAggregator, RunSummary, TestResult, TestStatus};
use super::catalog::{Catalog, TestCase};
use super::config::RunConfig;
use super::events::{CancelToken, ProgressEvent};
use super::scorecard::truncate_chars;
use crate::error::{BenchError, Result};
use crate::http_client::{EndpointClient, Outcome};

/// Longest response excerpt kept per result
pub const RESPONSE_EXCERPT_CHARS: usize = 200;

/// Lifecycle of the runner's current run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Drives the catalog through an endpoint, one request at a time
pub struct BenchmarkRunner {
    catalog: &'static Catalog,
    state: Arc<Mutex<RunState>>,
}

/// Driving-side view of a run executing on a worker task
pub struct RunHandle {
    run_id: Uuid,
    cancel: CancelToken,
    events: mpsc::UnboundedReceiver<ProgressEvent>,
    snapshots: watch::Receiver<Arc<RunSummary>>,
    task: JoinHandle<RunSummary>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Request cancellation: no new test starts and the in-flight request is aborted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this run, for use from another task or a signal handler
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Next progress event; `None` once the run has finished and all events were drained.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Latest published summary. Never a live view of the worker's state.
    pub fn snapshot(&self) -> Arc<RunSummary> {
        self.snapshots.borrow().clone()
    }

    /// Wait for the worker to finish and return the final summary
    pub async fn wait(self) -> Result<RunSummary> {
        self.task
            .await
            .map_err(|e| BenchError::Internal(anyhow::anyhow!("benchmark worker failed: {}", e)))
    }
}

/// Resets the runner state when a run ends, including by panic or abort
struct ActiveRun {
    state: Arc<Mutex<RunState>>,
    outcome: RunState,
}

impl ActiveRun {
    fn finish(&mut self, cancelled: bool) {
        self.outcome = if cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = self.outcome;
    }
}

impl BenchmarkRunner {
    /// Create a runner over the built-in catalog
    pub fn new() -> Result<Self> {
        Ok(Self::with_catalog(Catalog::builtin()?))
    }

    pub fn with_catalog(catalog: &'static Catalog) -> Self {
        Self {
            catalog,
            state: Arc::new(Mutex::new(RunState::Idle)),
        }
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the runner for a new run
    fn begin(&self) -> Result<ActiveRun> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == RunState::Running {
            return Err(BenchError::AlreadyRunning);
        }
        *state = RunState::Running;
        Ok(ActiveRun {
            state: self.state.clone(),
            outcome: RunState::Idle,
        })
    }

    /// Start a run on a worker task and return its handle.
    ///
    /// Configuration problems are reported here, before any test is dispatched.
    pub fn start(&self, config: RunConfig) -> Result<RunHandle> {
        let client = EndpointClient::new(&config)?;
        let mut active = self.begin()?;

        let run_id = Uuid::new_v4();
        let cancel = CancelToken::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let aggregator = ResultAggregator::new(
            run_id,
            &config.endpoint_url,
            &config.model,
            self.catalog.len(),
        );
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(aggregator.summary()));

        let worker = Worker {
            catalog: self.catalog,
            client,
            config,
            cancel: cancel.clone(),
            events: Some(event_tx),
            snapshots: snapshot_tx,
        };

        let task = tokio::spawn(async move {
            let summary = worker.run(aggregator).await;
            active.finish(summary.cancelled);
            summary
        });

        Ok(RunHandle {
            run_id,
            cancel,
            events: event_rx,
            snapshots: snapshot_rx,
            task,
        })
    }

    /// Execute a run on the current task, publishing events to `events` if given.
    pub async fn run(
        &self,
        config: RunConfig,
        cancel: CancelToken,
        events: Option<mpsc::UnboundedSender<ProgressEvent>>,
    ) -> Result<RunSummary> {
        let client = EndpointClient::new(&config)?;
        let mut active = self.begin()?;

        let aggregator = ResultAggregator::new(
            Uuid::new_v4(),
            &config.endpoint_url,
            &config.model,
            self.catalog.len(),
        );
        let (snapshot_tx, _snapshot_rx) = watch::channel(Arc::new(aggregator.summary()));

        let worker = Worker {
            catalog: self.catalog,
            client,
            config,
            cancel,
            events,
            snapshots: snapshot_tx,
        };

        let summary = worker.run(aggregator).await;
        active.finish(summary.cancelled);
        Ok(summary)
    }
}

/// Everything the worker owns for the duration of one run
struct Worker {
    catalog: &'static Catalog,
    client: EndpointClient,
    config: RunConfig,
    cancel: CancelToken,
    events: Option<mpsc::UnboundedSender<ProgressEvent>>,
    snapshots: watch::Sender<Arc<RunSummary>>,
}

impl Worker {
    fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }

    async fn run(self, mut aggregator: ResultAggregator) -> RunSummary {
        let total = self.catalog.len();
        let run_id = aggregator.summary().run_id;

        tracing::info!(
            run_id = %run_id,
            url = %self.client.url(),
            model = %self.config.model,
            tests = total,
            "Benchmark run started"
        );
        self.emit(ProgressEvent::RunStarted { run_id, total });

        let mut cancelled = false;
        for test in self.catalog {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.emit(ProgressEvent::TestStarted {
                test_id: test.id,
                category: test.category,
                name: test.name.clone(),
            });

            let start = Instant::now();
            let outcome = self.client.send(&test.prompt, &self.cancel).await;
            let elapsed = start.elapsed().as_secs_f64();

            if outcome == Outcome::Aborted {
                tracing::info!(test_id = test.id, "In-flight test aborted by cancellation");
                self.emit(ProgressEvent::TestAborted { test_id: test.id });
                cancelled = true;
                break;
            }

            let result = build_result(test, outcome, elapsed, &self.config);
            log_result(&result, total);

            let event = ProgressEvent::TestFinished {
                test_id: result.test_id,
                category: result.category,
                status: result.status,
                latency_seconds: result.latency_seconds,
                excerpt: result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| result.response_excerpt.clone()),
            };

            aggregator.record(result);
            self.snapshots.send_replace(Arc::new(aggregator.summary()));
            self.emit(event);
        }

        let summary = aggregator.finalize(cancelled);
        self.snapshots.send_replace(Arc::new(summary.clone()));

        tracing::info!(
            run_id = %summary.run_id,
            completed = summary.completed(),
            total,
            successes = summary.success_count,
            failures = summary.failure_count,
            mean_latency_s = ?summary.mean_latency_seconds,
            cancelled,
            "Benchmark run finished"
        );
        self.emit(ProgressEvent::RunFinished {
            completed: summary.completed(),
            total,
            cancelled,
        });

        summary
    }
}

/// Collapse whitespace and cap the length of a response for display
pub fn excerpt(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, RESPONSE_EXCERPT_CHARS)
}

/// Turn a resolved outcome into the test's one and only result
fn build_result(test: &TestCase, outcome: Outcome, elapsed: f64, config: &RunConfig) -> TestResult {
    let (status, response_excerpt, error_message) = match outcome {
        Outcome::Response { text } => (TestStatus::Success, excerpt(&text), None),
        Outcome::TimedOut => (
            TestStatus::Timeout,
            String::new(),
            Some(format!("timed out after {}s", config.timeout_secs)),
        ),
        Outcome::TransportError { message } => (TestStatus::Error, String::new(), Some(message)),
        Outcome::ProtocolError(e) => (TestStatus::Error, String::new(), Some(e.to_string())),
        Outcome::Aborted => (
            TestStatus::Error,
            String::new(),
            Some("request aborted".to_string()),
        ),
    };

    TestResult {
        test_id: test.id,
        category: test.category,
        name: test.name.clone(),
        status,
        latency_seconds: elapsed,
        response_excerpt,
        error_message,
    }
}

fn log_result(result: &TestResult, total: usize) {
    let latency_ms = (result.latency_seconds * 1000.0).round() as u64;
    match result.status {
        TestStatus::Success => tracing::info!(
            test_id = result.test_id,
            total,
            category = %result.category,
            name = %result.name,
            latency_ms,
            "Test succeeded"
        ),
        _ => tracing::warn!(
            test_id = result.test_id,
            total,
            category = %result.category,
            name = %result.name,
            status = %result.status,
            latency_ms,
            error = result.error_message.as_deref().unwrap_or(""),
            "Test failed"
        ),
    }
}
