//! Process-step transition detection.

use crate::feature::ProcessStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    #[default]
    Unset,
    AtStep(ProcessStep),
}

/// Emitted when the reported step differs from the recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepChanged {
    pub previous: Option<ProcessStep>,
    pub current: ProcessStep,
}

/// Unset → AtStep(n) on first report; AtStep(m) → AtStep(n) when n ≠ m.
/// A repeated report of the same step is a no-op.
#[derive(Debug, Clone, Default)]
pub struct StepDetector {
    state: StepState,
}

impl StepDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_step_update(&mut self, step: ProcessStep) -> Option<StepChanged> {
        let previous = match self.state {
            StepState::AtStep(current) if current == step => return None,
            StepState::AtStep(current) => Some(current),
            StepState::Unset => None,
        };
        self.state = StepState::AtStep(step);
        Some(StepChanged {
            previous,
            current: step,
        })
    }

    /// Forget the recorded step so the next report always counts as a change.
    pub fn reset(&mut self) {
        self.state = StepState::Unset;
    }

    pub fn state(&self) -> StepState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_report_is_a_change_from_unset() {
        let mut d = StepDetector::new();
        assert_eq!(
            d.on_step_update(ProcessStep(0)),
            Some(StepChanged {
                previous: None,
                current: ProcessStep(0)
            })
        );
    }

    #[test]
    fn repeated_step_is_suppressed() {
        let mut d = StepDetector::new();
        d.on_step_update(ProcessStep(2));
        assert_eq!(d.on_step_update(ProcessStep(2)), None);
        assert_eq!(d.state(), StepState::AtStep(ProcessStep(2)));
    }

    #[test]
    fn reset_makes_same_step_fire_again() {
        let mut d = StepDetector::new();
        d.on_step_update(ProcessStep(2));
        d.reset();
        assert_eq!(d.state(), StepState::Unset);
        let change = d.on_step_update(ProcessStep(2)).expect("change after reset");
        assert_eq!(change.previous, None);
    }

    #[test]
    fn backwards_steps_are_still_changes() {
        let mut d = StepDetector::new();
        d.on_step_update(ProcessStep(3));
        let change = d.on_step_update(ProcessStep(1)).expect("3 -> 1");
        assert_eq!(change.previous, Some(ProcessStep(3)));
    }
}
