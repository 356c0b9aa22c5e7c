use std::time::Duration;

use thiserror::Error;

use crate::feature::Feature;

#[derive(Debug, Error, Clone)]
pub enum CorrectorError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("write to {point} failed: {reason}")]
    Write { point: String, reason: String },
    #[error("invalid state: {0}")]
    State(String),
}

/// Faults raised by an error model. A zero estimate is never used to signal one.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    #[error("feature {0} missing from snapshot")]
    MissingFeature(Feature),
    #[error("shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("model produced a non-finite estimate ({error_x}, {error_y})")]
    NonFinite { error_x: f64, error_y: f64 },
    #[error("model error: {0}")]
    Model(String),
    #[error("inference exceeded {0:?}")]
    Timeout(Duration),
    #[error("inference worker exited without a result")]
    WorkerGone,
    #[error("model still busy with an earlier request")]
    Busy,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("missing error model")]
    MissingModel,
    #[error("missing point writer")]
    MissingWriter,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
