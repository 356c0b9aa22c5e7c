//! Decides whether a step transition produces a correction request.

use crate::feature::{CycleId, Feature, FeatureSnapshot, ProcessStep};
use crate::step::StepChanged;

/// Detached copy of a complete snapshot, tagged with the cycle it was taken in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionRequest {
    pub cycle: CycleId,
    pub snapshot: FeatureSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// The transition is not into the trigger step.
    NotTriggering,
    /// This cycle already produced a request.
    AlreadyFired(CycleId),
    /// This cycle was already skipped; it stays without a correction.
    AlreadySkipped(CycleId),
    /// Trigger step reached with features missing; the cycle gets no correction.
    Skipped {
        cycle: CycleId,
        missing: Vec<Feature>,
    },
    Fire(CorrectionRequest),
}

/// How the trigger step was resolved for the latched cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Fired,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct CorrectionTrigger {
    trigger_step: ProcessStep,
    required: Vec<Feature>,
    decided: Option<(CycleId, Decision)>,
}

impl CorrectionTrigger {
    pub fn new(trigger_step: ProcessStep, required: Vec<Feature>) -> Self {
        Self {
            trigger_step,
            required,
            decided: None,
        }
    }

    pub fn trigger_step(&self) -> ProcessStep {
        self.trigger_step
    }

    pub fn required(&self) -> &[Feature] {
        &self.required
    }

    /// Clear the per-cycle latch unless the boundary re-reports the latched cycle.
    pub fn on_cycle_boundary(&mut self, cycle: CycleId) {
        if self.decided.is_some_and(|(c, _)| c != cycle) {
            self.decided = None;
        }
    }

    pub fn evaluate(
        &mut self,
        change: &StepChanged,
        cycle: CycleId,
        snapshot: &FeatureSnapshot,
    ) -> TriggerOutcome {
        if change.current != self.trigger_step {
            return TriggerOutcome::NotTriggering;
        }
        match self.decided {
            Some((c, Decision::Fired)) if c == cycle => {
                tracing::debug!(cycle = cycle.0, "correction already requested for this cycle");
                return TriggerOutcome::AlreadyFired(cycle);
            }
            Some((c, Decision::Skipped)) if c == cycle => {
                tracing::debug!(cycle = cycle.0, "cycle already skipped, no correction");
                return TriggerOutcome::AlreadySkipped(cycle);
            }
            _ => {}
        }

        let missing = snapshot.missing(&self.required);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
            tracing::warn!(
                cycle = cycle.0,
                missing = ?names,
                "not all input variables were collected before step change, skipping correction"
            );
            self.decided = Some((cycle, Decision::Skipped));
            return TriggerOutcome::Skipped { cycle, missing };
        }

        self.decided = Some((cycle, Decision::Fired));
        tracing::info!(cycle = cycle.0, "computing correction values");
        TriggerOutcome::Fire(CorrectionRequest {
            cycle,
            snapshot: *snapshot,
        })
    }
}
