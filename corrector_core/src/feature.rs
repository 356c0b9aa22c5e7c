//! Feature names, the per-cycle snapshot, and the cycle/step identifiers.

use std::fmt;
use std::str::FromStr;

use crate::error::{CorrectorError, InferenceError};

/// Sensor inputs sampled from the process. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    AirTemperature,
    AttachedWeight,
    PositionX,
    PositionY,
    ProcessTemperature,
    Speed,
    SpeedNext,
}

impl Feature {
    pub const COUNT: usize = 7;

    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::AirTemperature,
        Feature::AttachedWeight,
        Feature::PositionX,
        Feature::PositionY,
        Feature::ProcessTemperature,
        Feature::Speed,
        Feature::SpeedNext,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::AirTemperature => "air_temperature",
            Feature::AttachedWeight => "attached_weight",
            Feature::PositionX => "position_x",
            Feature::PositionY => "position_y",
            Feature::ProcessTemperature => "process_temperature",
            Feature::Speed => "speed",
            Feature::SpeedNext => "speed_next",
        }
    }

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = CorrectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| CorrectorError::Config(format!("unknown feature '{s}'")))
    }
}

/// Parse a list of feature names, preserving order.
pub fn parse_features<S: AsRef<str>>(names: &[S]) -> Result<Vec<Feature>, CorrectorError> {
    names.iter().map(|n| n.as_ref().parse()).collect()
}

/// Server-assigned cycle number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CycleId(pub i64);

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessStep(pub i64);

impl fmt::Display for ProcessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Latest known value per feature for the cycle in progress.
///
/// Every feature has a slot; a slot stays `None` until a value arrives after
/// the last reset. The type is `Copy` so a trigger can hand off a detached
/// snapshot while the live one keeps changing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureSnapshot {
    values: [Option<f64>; Feature::COUNT],
}

impl FeatureSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from `(feature, value)` pairs; later pairs win.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Feature, f64)>) -> Self {
        let mut s = Self::new();
        for (f, v) in pairs {
            s.set(f, v);
        }
        s
    }

    #[inline]
    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values[feature.slot()]
    }

    /// Record a value, returning the one it replaced.
    #[inline]
    pub fn set(&mut self, feature: Feature, value: f64) -> Option<f64> {
        self.values[feature.slot()].replace(value)
    }

    pub fn is_set(&self, feature: Feature) -> bool {
        self.get(feature).is_some()
    }

    pub fn set_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.set_count() == 0
    }

    /// Features of `required` that have no value, in `required` order.
    pub fn missing(&self, required: &[Feature]) -> Vec<Feature> {
        required.iter().copied().filter(|f| !self.is_set(*f)).collect()
    }

    pub fn is_complete(&self, required: &[Feature]) -> bool {
        required.iter().all(|f| self.is_set(*f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, Option<f64>)> + '_ {
        Feature::ALL.into_iter().map(|f| (f, self.get(f)))
    }

    /// Ordered feature vector for a model.
    pub fn project(&self, order: &[Feature]) -> Result<Vec<f64>, InferenceError> {
        order
            .iter()
            .map(|f| self.get(*f).ok_or(InferenceError::MissingFeature(*f)))
            .collect()
    }
}

impl fmt::Display for FeatureSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        f.write_str("{")?;
        for (feature, value) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match value {
                Some(v) => write!(f, "{feature}: {v}")?,
                None => write!(f, "{feature}: -")?,
            }
        }
        f.write_str("}")
    }
}
