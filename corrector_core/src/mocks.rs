//! Test and helper doubles for corrector_core.
//!
//! Used by the crate's own tests, the benches, and downstream integration
//! tests; nothing here touches a real transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use corrector_traits::{OutputPoint, PointWriter, Variant};

use crate::error::InferenceError;
use crate::feature::FeatureSnapshot;
use crate::model::{ErrorEstimate, ErrorModel};

/// Returns the same estimate every time and records every snapshot it saw.
#[derive(Debug, Clone)]
pub struct FixedModel {
    error_x: f64,
    error_y: f64,
    seen: Arc<Mutex<Vec<FeatureSnapshot>>>,
}

impl FixedModel {
    pub fn new(error_x: f64, error_y: f64) -> Self {
        Self {
            error_x,
            error_y,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the snapshots passed to `predict`.
    pub fn calls(&self) -> Arc<Mutex<Vec<FeatureSnapshot>>> {
        self.seen.clone()
    }
}

impl ErrorModel for FixedModel {
    fn predict(&self, snapshot: &FeatureSnapshot) -> Result<ErrorEstimate, InferenceError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(*snapshot);
        }
        ErrorEstimate::new(self.error_x, self.error_y)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Always fails with a model error.
#[derive(Debug, Default, Clone)]
pub struct FailingModel {
    calls: Arc<AtomicUsize>,
}

impl FailingModel {
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl ErrorModel for FailingModel {
    fn predict(&self, _snapshot: &FeatureSnapshot) -> Result<ErrorEstimate, InferenceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(InferenceError::Model("model unavailable".into()))
    }
}

/// Sleeps before answering `(0.0, 0.0)`; used to exercise timeouts and ordering.
#[derive(Debug, Clone)]
pub struct SlowModel {
    delay: Duration,
}

impl SlowModel {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ErrorModel for SlowModel {
    fn predict(&self, _snapshot: &FeatureSnapshot) -> Result<ErrorEstimate, InferenceError> {
        std::thread::sleep(self.delay);
        ErrorEstimate::new(0.0, 0.0)
    }
}

/// Shared, ordered log of writes seen by a [`RecordingWriter`].
#[derive(Debug, Clone, Default)]
pub struct WriteLog(Arc<Mutex<Vec<(OutputPoint, Variant)>>>);

impl WriteLog {
    pub fn entries(&self) -> Vec<(OutputPoint, Variant)> {
        self.0.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values written to `correction_cycle`, in write order.
    pub fn cycle_tags(&self) -> Vec<i64> {
        self.entries()
            .into_iter()
            .filter_map(|(p, v)| match (p, v) {
                (OutputPoint::CorrectionCycle, Variant::Int(c)) => Some(c),
                _ => None,
            })
            .collect()
    }

    fn push(&self, point: OutputPoint, value: Variant) {
        if let Ok(mut g) = self.0.lock() {
            g.push((point, value));
        }
    }
}

/// Records writes; optionally rejects every write to one point.
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    log: WriteLog,
    fail_on: Option<OutputPoint>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(point: OutputPoint) -> Self {
        Self {
            log: WriteLog::default(),
            fail_on: Some(point),
        }
    }

    pub fn log(&self) -> WriteLog {
        self.log.clone()
    }
}

impl PointWriter for RecordingWriter {
    fn write(
        &mut self,
        point: OutputPoint,
        value: Variant,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.fail_on == Some(point) {
            return Err(Box::new(std::io::Error::other(format!(
                "write to {point} rejected"
            ))));
        }
        self.log.push(point, value);
        Ok(())
    }
}
