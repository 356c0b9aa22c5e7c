//! Subscription handler: routes each decoded notification to the cycle
//! tracker or the step detector and asks the trigger whether a step change
//! warrants a correction.
//!
//! The handler does no I/O. A triggered correction comes back as
//! [`Reaction::Triggered`] and the caller hands it to the dispatcher.

use corrector_traits::{Notification, Variant};

use crate::binding::{Channel, NodeFeatureBinding};
use crate::feature::{CycleId, Feature, ProcessStep};
use crate::step::{StepChanged, StepDetector};
use crate::tracker::CycleStateTracker;
use crate::trigger::{CorrectionRequest, CorrectionTrigger, TriggerOutcome};

/// Handler configuration.
#[derive(Debug, Clone)]
pub struct HandlerCfg {
    /// Step whose arrival triggers the correction.
    pub trigger_step: ProcessStep,
    /// Features that must be present at the trigger step.
    pub required: Vec<Feature>,
    /// Emit one info event per notification.
    pub trace_notifications: bool,
    /// Cycle assumed active until the server reports one.
    pub initial_cycle: CycleId,
}

impl Default for HandlerCfg {
    fn default() -> Self {
        Self {
            trigger_step: ProcessStep(2),
            required: Feature::ALL.to_vec(),
            trace_notifications: false,
            initial_cycle: CycleId(0),
        }
    }
}

/// What handling one notification did.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    /// Unknown node or a value of the wrong type; state untouched.
    Ignored,
    FeatureRecorded(Feature),
    CycleStarted {
        previous: CycleId,
        current: CycleId,
    },
    /// Same step reported again.
    StepUnchanged(ProcessStep),
    /// A step change that does not trigger a correction.
    StepChanged(StepChanged),
    /// Trigger step reached but the snapshot was incomplete.
    Skipped {
        cycle: CycleId,
        missing: Vec<Feature>,
    },
    /// Trigger step re-entered in a cycle that already has a correction.
    AlreadyCorrected(CycleId),
    /// Trigger step re-entered in a cycle that was skipped.
    AlreadySkipped(CycleId),
    Triggered(CorrectionRequest),
}

/// Running totals kept by the handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerCounts {
    pub notifications: u64,
    pub ignored: u64,
    pub cycles: u64,
    pub step_changes: u64,
    pub skipped: u64,
    pub triggered: u64,
}

pub struct SubscriptionHandler {
    binding: NodeFeatureBinding,
    tracker: CycleStateTracker,
    steps: StepDetector,
    trigger: CorrectionTrigger,
    trace_notifications: bool,
    counts: HandlerCounts,
}

impl SubscriptionHandler {
    pub fn new(binding: NodeFeatureBinding, cfg: HandlerCfg) -> Self {
        Self {
            binding,
            tracker: CycleStateTracker::new(cfg.initial_cycle),
            steps: StepDetector::new(),
            trigger: CorrectionTrigger::new(cfg.trigger_step, cfg.required),
            trace_notifications: cfg.trace_notifications,
            counts: HandlerCounts::default(),
        }
    }

    pub fn on_notification(&mut self, n: &Notification) -> Reaction {
        self.counts.notifications = self.counts.notifications.saturating_add(1);
        let channel = self.binding.decode(&n.node);

        if self.trace_notifications {
            tracing::info!(
                node = %n.node,
                channel = ?channel,
                value = %n.value,
                server_timestamp = ?n.server_timestamp,
                "data change"
            );
        }

        let reaction = match channel {
            None => {
                tracing::debug!(node = %n.node, "notification for unbound node ignored");
                Reaction::Ignored
            }
            Some(Channel::Input(feature)) => self.feature_update(feature, n.value),
            Some(Channel::Cycle) => self.cycle_update(n.value),
            Some(Channel::Step) => self.step_update(n.value),
        };
        if reaction == Reaction::Ignored {
            self.counts.ignored = self.counts.ignored.saturating_add(1);
        }
        reaction
    }

    fn feature_update(&mut self, feature: Feature, value: Variant) -> Reaction {
        match value.as_f64().filter(|v| v.is_finite()) {
            Some(v) => {
                self.tracker.on_feature_update(feature, v);
                Reaction::FeatureRecorded(feature)
            }
            None => {
                tracing::warn!(%feature, %value, "non-numeric feature value ignored");
                Reaction::Ignored
            }
        }
    }

    fn cycle_update(&mut self, value: Variant) -> Reaction {
        let Some(id) = value.as_i64() else {
            tracing::warn!(%value, "cycle value is not an integer, ignored");
            return Reaction::Ignored;
        };
        let current = CycleId(id);
        tracing::info!(cycle = id, "starting new cycle, resetting state");
        let previous = self.tracker.on_cycle_boundary(current);
        self.steps.reset();
        self.trigger.on_cycle_boundary(current);
        self.counts.cycles = self.counts.cycles.saturating_add(1);
        Reaction::CycleStarted { previous, current }
    }

    fn step_update(&mut self, value: Variant) -> Reaction {
        let Some(raw) = value.as_i64() else {
            tracing::warn!(%value, "process step is not an integer, ignored");
            return Reaction::Ignored;
        };
        let step = ProcessStep(raw);
        let Some(change) = self.steps.on_step_update(step) else {
            tracing::trace!(step = raw, "process step unchanged");
            return Reaction::StepUnchanged(step);
        };
        self.counts.step_changes = self.counts.step_changes.saturating_add(1);
        if let Some(prev) = change.previous {
            tracing::info!(cycle = self.tracker.cycle().0, step = prev.0, "process step completed");
        }

        let cycle = self.tracker.cycle();
        match self.trigger.evaluate(&change, cycle, self.tracker.snapshot()) {
            TriggerOutcome::NotTriggering => Reaction::StepChanged(change),
            TriggerOutcome::AlreadyFired(cycle) => Reaction::AlreadyCorrected(cycle),
            TriggerOutcome::AlreadySkipped(cycle) => Reaction::AlreadySkipped(cycle),
            TriggerOutcome::Skipped { cycle, missing } => {
                self.counts.skipped = self.counts.skipped.saturating_add(1);
                Reaction::Skipped { cycle, missing }
            }
            TriggerOutcome::Fire(req) => {
                self.counts.triggered = self.counts.triggered.saturating_add(1);
                Reaction::Triggered(req)
            }
        }
    }

    pub fn tracker(&self) -> &CycleStateTracker {
        &self.tracker
    }

    pub fn step_detector(&self) -> &StepDetector {
        &self.steps
    }

    pub fn binding(&self) -> &NodeFeatureBinding {
        &self.binding
    }

    pub fn counts(&self) -> HandlerCounts {
        self.counts
    }
}
