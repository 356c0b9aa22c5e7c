//! Error → correction policy.
//!
//! The model predicts how far the process will land from its target; the
//! correction written back is the opposite displacement scaled by `gain`:
//!
//!   corr_x = -gain * error_x
//!   corr_y = -gain * error_y
//!
//! With the default gain of 1.0 the correction cancels the predicted error.

use corrector_traits::{OutputPoint, Variant};

use crate::error::BuildError;
use crate::feature::CycleId;
use crate::model::ErrorEstimate;

/// Values for one write batch. Immutable once built; consumed by one writer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub cycle: CycleId,
    pub corr_x: f64,
    pub corr_y: f64,
}

impl Correction {
    /// Point/value pairs in batch order: x, y, then the cycle tag.
    pub fn writes(&self) -> [(OutputPoint, Variant); 3] {
        [
            (OutputPoint::CorrectionX, Variant::Double(self.corr_x)),
            (OutputPoint::CorrectionY, Variant::Double(self.corr_y)),
            (OutputPoint::CorrectionCycle, Variant::Int(self.cycle.0)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionPolicy {
    gain: f64,
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

impl CorrectionPolicy {
    pub fn with_gain(gain: f64) -> Result<Self, BuildError> {
        if !gain.is_finite() || gain <= 0.0 {
            return Err(BuildError::InvalidConfig(
                "correction gain must be finite and > 0".into(),
            ));
        }
        Ok(Self { gain })
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn apply(&self, cycle: CycleId, estimate: ErrorEstimate) -> Correction {
        Correction {
            cycle,
            corr_x: -self.gain * estimate.error_x,
            corr_y: -self.gain * estimate.error_y,
        }
    }
}
