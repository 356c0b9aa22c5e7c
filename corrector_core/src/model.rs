//! Inference adapter contract and a linear model implementation.
//!
//! An [`ErrorModel`] receives a complete snapshot in order-agnostic form and is
//! responsible for projecting it onto the feature order it was fitted on,
//! scaling it if needed, and evaluating. Faults are returned as
//! [`InferenceError`]; a `(0, 0)` estimate always means "no error predicted".

use std::sync::Arc;

use crate::error::{BuildError, InferenceError};
use crate::feature::{Feature, FeatureSnapshot};

/// Predicted positioning error for one cycle. Both components are finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorEstimate {
    pub error_x: f64,
    pub error_y: f64,
}

impl ErrorEstimate {
    pub fn new(error_x: f64, error_y: f64) -> Result<Self, InferenceError> {
        if !(error_x.is_finite() && error_y.is_finite()) {
            return Err(InferenceError::NonFinite { error_x, error_y });
        }
        Ok(Self { error_x, error_y })
    }
}

pub trait ErrorModel: Send + Sync {
    fn predict(&self, snapshot: &FeatureSnapshot) -> Result<ErrorEstimate, InferenceError>;

    /// Short label for logs.
    fn name(&self) -> &str {
        "model"
    }
}

impl<M: ErrorModel + ?Sized> ErrorModel for Arc<M> {
    fn predict(&self, snapshot: &FeatureSnapshot) -> Result<ErrorEstimate, InferenceError> {
        (**self).predict(snapshot)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// x' = (x - mean) / scale, element-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, BuildError> {
        if mean.len() != scale.len() {
            return Err(BuildError::InvalidConfig(format!(
                "scaler mean has {} entries but scale has {}",
                mean.len(),
                scale.len()
            )));
        }
        if scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(BuildError::InvalidConfig(
                "scaler scale entries must be finite and non-zero".into(),
            ));
        }
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: &mut [f64]) -> Result<(), InferenceError> {
        if x.len() != self.mean.len() {
            return Err(InferenceError::ShapeMismatch {
                expected: self.mean.len(),
                actual: x.len(),
            });
        }
        for ((v, m), s) in x.iter_mut().zip(&self.mean).zip(&self.scale) {
            *v = (*v - m) / s;
        }
        Ok(())
    }
}

/// Two independent linear regressions sharing one input vector.
#[derive(Debug, Clone)]
pub struct LinearModel {
    order: Vec<Feature>,
    coef_x: Vec<f64>,
    coef_y: Vec<f64>,
    intercept_x: f64,
    intercept_y: f64,
    scaler: Option<StandardScaler>,
}

impl LinearModel {
    pub fn new(order: Vec<Feature>, coef_x: Vec<f64>, coef_y: Vec<f64>) -> Result<Self, BuildError> {
        if order.is_empty() {
            return Err(BuildError::InvalidConfig("model feature order is empty".into()));
        }
        if coef_x.len() != order.len() || coef_y.len() != order.len() {
            return Err(BuildError::InvalidConfig(format!(
                "model expects {} coefficients per axis",
                order.len()
            )));
        }
        Ok(Self {
            order,
            coef_x,
            coef_y,
            intercept_x: 0.0,
            intercept_y: 0.0,
            scaler: None,
        })
    }

    pub fn with_intercepts(mut self, x: f64, y: f64) -> Self {
        self.intercept_x = x;
        self.intercept_y = y;
        self
    }

    pub fn with_scaler(mut self, scaler: StandardScaler) -> Result<Self, BuildError> {
        if scaler.mean.len() != self.order.len() {
            return Err(BuildError::InvalidConfig(format!(
                "scaler has {} entries, model has {} features",
                scaler.mean.len(),
                self.order.len()
            )));
        }
        self.scaler = Some(scaler);
        Ok(self)
    }

    pub fn feature_order(&self) -> &[Feature] {
        &self.order
    }
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl ErrorModel for LinearModel {
    fn predict(&self, snapshot: &FeatureSnapshot) -> Result<ErrorEstimate, InferenceError> {
        let mut x = snapshot.project(&self.order)?;
        if let Some(scaler) = &self.scaler {
            scaler.transform(&mut x)?;
        }
        ErrorEstimate::new(
            dot(&self.coef_x, &x) + self.intercept_x,
            dot(&self.coef_y, &x) + self.intercept_y,
        )
    }

    fn name(&self) -> &str {
        "linear"
    }
}
