//! Background write-back of corrections.
//!
//! The notification loop hands [`CorrectionRequest`]s to a [`Dispatcher`]
//! through a bounded channel and returns immediately. One worker thread
//! drains the channel in FIFO order: inference (on one long-lived helper thread, bounded by
//! a timeout), the error → correction policy, then the three writes. Because
//! a single worker handles requests in submission order, writes for cycle N
//! always reach the writer before writes for cycle N+1.
//!
//! Shutdown: `finish()` processes what is queued and joins; `abandon()` (and
//! `Drop`) discards queued requests, lets the in-flight one run to its
//! inference timeout, and joins.
use crossbeam_channel as xch;
use corrector_traits::PointWriter;
use corrector_traits::clock::{Clock, MonotonicClock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{BuildError, InferenceError};
use crate::feature::FeatureSnapshot;
use crate::model::{ErrorEstimate, ErrorModel};
use crate::policy::{Correction, CorrectionPolicy};
use crate::trigger::CorrectionRequest;

pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

#[derive(Debug, Default)]
struct DispatchStats {
    submitted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    abandoned: AtomicU64,
    inference_failures: AtomicU64,
    write_failures: AtomicU64,
}

/// Point-in-time view of the dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
    /// Requests accepted into the queue.
    pub submitted: u64,
    /// Requests rejected because the queue was full or closed.
    pub dropped: u64,
    /// Batches whose three writes all succeeded.
    pub completed: u64,
    /// Queued requests discarded during shutdown.
    pub abandoned: u64,
    pub inference_failures: u64,
    pub write_failures: u64,
}

impl DispatchStats {
    fn counts(&self) -> DispatchCounts {
        DispatchCounts {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

type InferenceReply = Result<ErrorEstimate, InferenceError>;

struct HelperLink {
    tx: xch::Sender<FeatureSnapshot>,
    rx: xch::Receiver<InferenceReply>,
    handle: JoinHandle<()>,
}

/// Runs an [`ErrorModel`] on one long-lived helper thread, waiting at most a
/// given timeout per call.
///
/// A call that overruns leaves the helper busy. Until it answers, further
/// calls fail fast with [`InferenceError::Busy`] and no new thread is started.
/// A helper that died (the model panicked) is replaced on the next call.
pub struct InferenceHelper {
    model: Arc<dyn ErrorModel>,
    link: Option<HelperLink>,
    busy: bool,
    spawned: u64,
}

impl core::fmt::Debug for InferenceHelper {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InferenceHelper")
            .field("model", &self.model.name())
            .field("running", &self.link.is_some())
            .field("busy", &self.busy)
            .field("spawned", &self.spawned)
            .finish()
    }
}

impl InferenceHelper {
    /// The helper thread is started lazily by the first call.
    pub fn new(model: Arc<dyn ErrorModel>) -> Self {
        Self {
            model,
            link: None,
            busy: false,
            spawned: 0,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Helper threads started so far.
    pub fn spawned(&self) -> u64 {
        self.spawned
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn infer(&mut self, snapshot: FeatureSnapshot, timeout: Duration) -> InferenceReply {
        if self.busy {
            let late = match self.link.as_ref() {
                Some(link) => link.rx.try_recv(),
                None => Err(xch::TryRecvError::Disconnected),
            };
            match late {
                Ok(_) => {
                    tracing::debug!("late inference result discarded");
                    self.busy = false;
                }
                Err(xch::TryRecvError::Empty) => return Err(InferenceError::Busy),
                Err(xch::TryRecvError::Disconnected) => {
                    self.busy = false;
                    self.reap();
                }
            }
        }

        if self.link.is_none() {
            self.link = Some(self.spawn_link()?);
        }
        let Some(link) = self.link.as_ref() else {
            return Err(InferenceError::WorkerGone);
        };

        let reply = match link.tx.send(snapshot) {
            Ok(()) => link.rx.recv_timeout(timeout),
            Err(_) => Err(xch::RecvTimeoutError::Disconnected),
        };
        match reply {
            Ok(result) => result,
            Err(xch::RecvTimeoutError::Timeout) => {
                self.busy = true;
                Err(InferenceError::Timeout(timeout))
            }
            Err(xch::RecvTimeoutError::Disconnected) => {
                self.reap();
                Err(InferenceError::WorkerGone)
            }
        }
    }

    fn spawn_link(&mut self) -> Result<HelperLink, InferenceError> {
        let (tx, req_rx) = xch::bounded::<FeatureSnapshot>(1);
        let (res_tx, rx) = xch::bounded::<InferenceReply>(1);
        let model = self.model.clone();
        let handle = std::thread::Builder::new()
            .name("corrector-inference".into())
            .spawn(move || {
                for snapshot in req_rx.iter() {
                    if res_tx.send(model.predict(&snapshot)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| InferenceError::Model(format!("spawn inference thread: {e}")))?;
        self.spawned += 1;
        Ok(HelperLink { tx, rx, handle })
    }

    /// Join a helper whose channels are closed.
    fn reap(&mut self) {
        if let Some(link) = self.link.take() {
            drop(link.tx);
            if link.handle.join().is_err() {
                tracing::warn!(model = self.model.name(), "inference helper panicked");
            }
        }
    }
}

impl Drop for InferenceHelper {
    fn drop(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        drop(link.tx);
        if self.busy {
            // Joining would wait on the overrunning model call.
            tracing::warn!(model = self.model.name(), "inference helper still busy, detached");
            return;
        }
        if link.handle.join().is_err() {
            tracing::warn!(model = self.model.name(), "inference helper panicked");
        }
    }
}

/// Write x, y, then the cycle tag. Stops at the first failure so the cycle
/// tag only advances when both corrections landed.
fn write_batch(writer: &mut dyn PointWriter, correction: &Correction) -> Result<(), (String, String)> {
    for (point, value) in correction.writes() {
        writer
            .write(point, value)
            .map_err(|e| (point.to_string(), e.to_string()))?;
    }
    Ok(())
}

struct Worker {
    inference: InferenceHelper,
    writer: Box<dyn PointWriter + Send>,
    policy: CorrectionPolicy,
    timeout: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
    stats: Arc<DispatchStats>,
    abort: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self, rx: xch::Receiver<CorrectionRequest>) {
        for req in rx.iter() {
            if self.abort.load(Ordering::Relaxed) {
                self.stats.abandoned.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cycle = req.cycle.0, "abandoning queued correction");
                continue;
            }
            self.process(req);
        }
        tracing::trace!("dispatch worker exiting cleanly");
    }

    fn process(&mut self, req: CorrectionRequest) {
        tracing::debug!(cycle = req.cycle.0, snapshot = %req.snapshot, "processing step data");
        let started = self.clock.now();
        let estimate = match self.inference.infer(req.snapshot, self.timeout) {
            Ok(est) => est,
            Err(e) => {
                self.stats.inference_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    cycle = req.cycle.0,
                    model = self.inference.model_name(),
                    error = %e,
                    "inference failed, no correction written"
                );
                return;
            }
        };
        let latency_us = self.clock.us_since(started);

        let correction = self.policy.apply(req.cycle, estimate);
        tracing::info!(
            cycle = req.cycle.0,
            error_x = estimate.error_x,
            error_y = estimate.error_y,
            corr_x = correction.corr_x,
            corr_y = correction.corr_y,
            latency_us,
            "writing correction values"
        );

        match write_batch(self.writer.as_mut(), &correction) {
            Ok(()) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err((point, reason)) => {
                self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    cycle = req.cycle.0,
                    point,
                    reason,
                    "correction write failed, rest of batch skipped"
                );
            }
        }
    }
}

pub struct Dispatcher {
    tx: Option<xch::Sender<CorrectionRequest>>,
    stats: Arc<DispatchStats>,
    abort: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("counts", &self.counts())
            .field("running", &self.join_handle.is_some())
            .finish()
    }
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Queue a request without blocking. Returns false if it was dropped.
    pub fn submit(&self, req: CorrectionRequest) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        match tx.try_send(req) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(xch::TrySendError::Full(req)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(cycle = req.cycle.0, "correction queue full, request dropped");
                false
            }
            Err(xch::TrySendError::Disconnected(req)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(cycle = req.cycle.0, "dispatch worker gone, request dropped");
                false
            }
        }
    }

    pub fn counts(&self) -> DispatchCounts {
        self.stats.counts()
    }

    /// Process everything already queued, then stop the worker.
    pub fn finish(mut self) -> DispatchCounts {
        self.stop(false);
        self.stats.counts()
    }

    /// Discard queued requests and stop the worker.
    pub fn abandon(mut self) -> DispatchCounts {
        self.stop(true);
        self.stats.counts()
    }

    fn stop(&mut self, abort: bool) {
        if abort {
            self.abort.store(true, Ordering::Relaxed);
        }
        // Closing the sender ends the worker's receive loop once drained.
        self.tx.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("dispatch worker joined"),
                Err(e) => tracing::warn!(?e, "dispatch worker panicked during shutdown"),
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop(true);
    }
}

#[derive(Default)]
pub struct DispatcherBuilder {
    model: Option<Arc<dyn ErrorModel>>,
    writer: Option<Box<dyn PointWriter + Send>>,
    policy: Option<CorrectionPolicy>,
    inference_timeout: Option<Duration>,
    capacity: Option<usize>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl DispatcherBuilder {
    pub fn with_model(mut self, model: impl ErrorModel + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    pub fn with_shared_model(mut self, model: Arc<dyn ErrorModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_writer(mut self, writer: impl PointWriter + Send + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn with_policy(mut self, policy: CorrectionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = Some(timeout);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let model = self.model.ok_or(BuildError::MissingModel)?;
        let writer = self.writer.ok_or(BuildError::MissingWriter)?;
        let timeout = self.inference_timeout.unwrap_or(DEFAULT_INFERENCE_TIMEOUT);
        if timeout.is_zero() {
            return Err(BuildError::InvalidConfig(
                "inference timeout must be > 0".into(),
            ));
        }
        let capacity = self.capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
        if capacity == 0 {
            return Err(BuildError::InvalidConfig(
                "queue capacity must be >= 1".into(),
            ));
        }

        let (tx, rx) = xch::bounded(capacity);
        let stats = Arc::new(DispatchStats::default());
        let abort = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            inference: InferenceHelper::new(model),
            writer,
            policy: self.policy.unwrap_or_default(),
            timeout,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new()) as Arc<dyn Clock + Send + Sync>),
            stats: stats.clone(),
            abort: abort.clone(),
        };
        let join_handle = std::thread::Builder::new()
            .name("corrector-dispatch".into())
            .spawn(move || worker.run(rx))
            .map_err(|e| BuildError::InvalidConfig(format!("spawn dispatch worker: {e}")))?;

        Ok(Dispatcher {
            tx: Some(tx),
            stats,
            abort,
            join_handle: Some(join_handle),
        })
    }
}
