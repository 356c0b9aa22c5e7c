#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Step-triggered correction engine (transport-agnostic).
//!
//! The server pushes data-change notifications for sensor features and two
//! orchestration variables (cycle, process step). This crate tracks the
//! feature values of the cycle in progress and, when the process step changes
//! to the trigger step, hands a detached snapshot to a background dispatcher
//! that runs the error model and writes `correction_x`, `correction_y` and the
//! cycle tag back through `corrector_traits::PointWriter`.
//!
//! ## Architecture
//!
//! - **Decoding**: node id → feature / cycle / step (`binding`)
//! - **State**: per-cycle feature snapshot (`tracker`), step changes (`step`)
//! - **Trigger**: once-per-cycle completeness gate (`trigger`)
//! - **Inference**: `ErrorModel` trait and a linear model (`model`)
//! - **Write-back**: error → correction (`policy`), FIFO worker (`dispatch`)
//! - **Loop**: `SubscriptionHandler` + `runner::run`, connection in `session`

pub mod binding;
pub mod conversions;
pub mod dispatch;
pub mod error;
pub mod feature;
pub mod handler;
pub mod mocks;
pub mod model;
pub mod policy;
pub mod runner;
pub mod session;
pub mod step;
pub mod tracker;
pub mod trigger;

pub use binding::{Channel, NodeFeatureBinding, OutputNodes};
pub use dispatch::{DispatchCounts, Dispatcher, DispatcherBuilder, InferenceHelper};
pub use error::{BuildError, CorrectorError, InferenceError, Result};
pub use feature::{CycleId, Feature, FeatureSnapshot, ProcessStep};
pub use handler::{HandlerCfg, HandlerCounts, Reaction, SubscriptionHandler};
pub use model::{ErrorEstimate, ErrorModel, LinearModel, StandardScaler};
pub use policy::{Correction, CorrectionPolicy};
pub use runner::{ExitReason, RunExit};
pub use session::{Connector, Session, Subscription, SubscriptionGuard, SubscriptionSpec};
pub use trigger::{CorrectionRequest, CorrectionTrigger, TriggerOutcome};
