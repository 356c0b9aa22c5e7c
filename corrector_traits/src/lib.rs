//! Seams between the correction core and the process-control transport.
//!
//! Everything here is protocol-agnostic: a transport adapter turns its own
//! data-change callbacks into [`Notification`]s and implements [`PointWriter`]
//! for the three correction outputs.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::fmt;
use std::time::SystemTime;

/// Opaque server node identifier (e.g. `ns=2;i=17`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Scalar value carried by a notification or a write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Variant {
    Double(f64),
    Int(i64),
    Bool(bool),
}

impl Variant {
    /// Numeric view used for sensor features. Booleans are not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Variant::Double(v) => Some(v),
            Variant::Int(v) => Some(v as f64),
            Variant::Bool(_) => None,
        }
    }

    /// Integer view used for cycle and step variables. Doubles must be integral.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Variant::Int(v) => Some(v),
            Variant::Double(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Double(v) => write!(f, "{v}"),
            Variant::Int(v) => write!(f, "{v}"),
            Variant::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// One data-change push from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub node: NodeId,
    pub value: Variant,
    pub server_timestamp: Option<SystemTime>,
}

impl Notification {
    pub fn new(node: impl Into<String>, value: Variant) -> Self {
        Self {
            node: NodeId(node.into()),
            value,
            server_timestamp: None,
        }
    }

    pub fn at(mut self, ts: SystemTime) -> Self {
        self.server_timestamp = Some(ts);
        self
    }
}

/// The three writable points a correction is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputPoint {
    CorrectionX,
    CorrectionY,
    CorrectionCycle,
}

impl OutputPoint {
    /// Write order within one batch; the cycle tag always lands last.
    pub const BATCH_ORDER: [OutputPoint; 3] = [
        OutputPoint::CorrectionX,
        OutputPoint::CorrectionY,
        OutputPoint::CorrectionCycle,
    ];

    pub fn default_name(&self) -> &'static str {
        match self {
            OutputPoint::CorrectionX => "correction_x",
            OutputPoint::CorrectionY => "correction_y",
            OutputPoint::CorrectionCycle => "correction_cycle",
        }
    }
}

impl fmt::Display for OutputPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

/// Write side of the transport. Called from the dispatcher worker only.
pub trait PointWriter {
    fn write(
        &mut self,
        point: OutputPoint,
        value: Variant,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<W: PointWriter + ?Sized> PointWriter for Box<W> {
    fn write(
        &mut self,
        point: OutputPoint,
        value: Variant,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write(point, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_doubles_decode_as_i64() {
        assert_eq!(Variant::Double(3.0).as_i64(), Some(3));
        assert_eq!(Variant::Double(3.5).as_i64(), None);
        assert_eq!(Variant::Double(f64::NAN).as_i64(), None);
        assert_eq!(Variant::Bool(true).as_i64(), None);
    }

    #[test]
    fn bool_is_not_numeric() {
        assert_eq!(Variant::Bool(false).as_f64(), None);
        assert_eq!(Variant::Int(-4).as_f64(), Some(-4.0));
    }

    #[test]
    fn cycle_tag_is_written_last() {
        assert_eq!(OutputPoint::BATCH_ORDER[2], OutputPoint::CorrectionCycle);
    }
}
