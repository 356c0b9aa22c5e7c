//! Simulated transport for running the corrector without a live server.
//!
//! [`SimulatedServer`] implements `corrector_core::session::Connector`: it
//! publishes cycles of notifications from a producer thread and records the
//! corrections written back. [`FlakyConnector`] wraps any connector and
//! refuses the first few attempts.

pub mod error;
mod flaky;
mod server;
mod writer;

pub use error::SimError;
pub use flaky::FlakyConnector;
pub use server::{SimOptions, SimulatedServer, node_table};
pub use writer::{SimOutputs, SimWriter};
