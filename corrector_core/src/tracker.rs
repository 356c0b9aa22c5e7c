//! Per-cycle state: the active cycle id and the latest value of each feature.

use crate::feature::{CycleId, Feature, FeatureSnapshot};

/// Owns the live snapshot for the cycle in progress.
///
/// Mutated only from the notification loop, so every update lands in exactly
/// the cycle that is active when it is handled.
#[derive(Debug, Clone, Default)]
pub struct CycleStateTracker {
    cycle: CycleId,
    snapshot: FeatureSnapshot,
    updates: u64,
}

impl CycleStateTracker {
    /// Start tracking with `initial` as the active cycle until the server
    /// reports one.
    pub fn new(initial: CycleId) -> Self {
        Self {
            cycle: initial,
            snapshot: FeatureSnapshot::new(),
            updates: 0,
        }
    }

    /// Record a feature value; last write wins. Returns the replaced value.
    pub fn on_feature_update(&mut self, feature: Feature, value: f64) -> Option<f64> {
        self.updates = self.updates.saturating_add(1);
        let previous = self.snapshot.set(feature, value);
        tracing::trace!(cycle = self.cycle.0, %feature, value, ?previous, "feature updated");
        previous
    }

    /// Start a new cycle: all features unset, `cycle` active. Returns the
    /// cycle that was active before.
    pub fn on_cycle_boundary(&mut self, cycle: CycleId) -> CycleId {
        let previous = std::mem::replace(&mut self.cycle, cycle);
        let discarded = self.snapshot.set_count();
        self.snapshot = FeatureSnapshot::new();
        self.updates = 0;
        tracing::debug!(
            previous = previous.0,
            cycle = cycle.0,
            discarded,
            "cycle boundary, snapshot reset"
        );
        previous
    }

    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    pub fn snapshot(&self) -> &FeatureSnapshot {
        &self.snapshot
    }

    /// Feature updates handled since the last boundary, duplicates included.
    pub fn updates_in_cycle(&self) -> u64 {
        self.updates
    }
}
