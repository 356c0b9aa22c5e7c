use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use corrector_core::OutputNodes;
use corrector_traits::{NodeId, OutputPoint, PointWriter, Variant};

use crate::error::SimError;

#[derive(Debug, Default)]
struct OutputState {
    history: Vec<(NodeId, Variant)>,
    latest: HashMap<NodeId, Variant>,
}

/// Server-side view of the output variables. Cloning shares the state.
#[derive(Debug, Clone, Default)]
pub struct SimOutputs {
    state: Arc<Mutex<OutputState>>,
    points: Arc<HashMap<NodeId, OutputPoint>>,
}

impl SimOutputs {
    /// Output variables of the address space, by node id.
    pub fn new(points: impl IntoIterator<Item = (NodeId, OutputPoint)>) -> Self {
        Self {
            state: Arc::default(),
            points: Arc::new(points.into_iter().collect()),
        }
    }

    /// Writes in arrival order, by node id.
    pub fn node_history(&self) -> Vec<(NodeId, Variant)> {
        self.state
            .lock()
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    pub fn history(&self) -> Vec<(OutputPoint, Variant)> {
        self.node_history()
            .into_iter()
            .filter_map(|(node, v)| self.points.get(&node).map(|p| (*p, v)))
            .collect()
    }

    pub fn latest(&self, point: OutputPoint) -> Option<Variant> {
        let node = self.node_of(point)?;
        self.state.lock().ok().and_then(|s| s.latest.get(node).copied())
    }

    /// Cycle tags in the order they were written.
    pub fn cycle_tags(&self) -> Vec<i64> {
        self.history()
            .into_iter()
            .filter_map(|(p, v)| match (p, v) {
                (OutputPoint::CorrectionCycle, Variant::Int(c)) => Some(c),
                _ => None,
            })
            .collect()
    }

    fn node_of(&self, point: OutputPoint) -> Option<&NodeId> {
        self.points
            .iter()
            .find(|(_, p)| **p == point)
            .map(|(n, _)| n)
    }

    fn record(&self, node: &NodeId, value: Variant) -> Result<(), SimError> {
        if !self.points.contains_key(node) {
            return Err(SimError::NotWritable(node.clone()));
        }
        if let Ok(mut s) = self.state.lock() {
            s.history.push((node.clone(), value));
            s.latest.insert(node.clone(), value);
        }
        Ok(())
    }
}

/// Writes into [`SimOutputs`] at the node ids the client resolved; can be
/// told to reject one point.
#[derive(Debug, Clone)]
pub struct SimWriter {
    outputs: SimOutputs,
    nodes: OutputNodes,
    fail_on: Option<OutputPoint>,
}

impl SimWriter {
    pub fn new(outputs: SimOutputs, nodes: OutputNodes) -> Self {
        Self {
            outputs,
            nodes,
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, point: Option<OutputPoint>) -> Self {
        self.fail_on = point;
        self
    }
}

impl PointWriter for SimWriter {
    fn write(
        &mut self,
        point: OutputPoint,
        value: Variant,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.fail_on == Some(point) {
            return Err(Box::new(SimError::WriteRejected(point)));
        }
        let node = self.nodes.node(point);
        tracing::debug!(%point, %node, %value, "sim write");
        self.outputs.record(node, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs() -> SimOutputs {
        SimOutputs::new([
            (NodeId::from("o1"), OutputPoint::CorrectionX),
            (NodeId::from("o2"), OutputPoint::CorrectionY),
            (NodeId::from("o3"), OutputPoint::CorrectionCycle),
        ])
    }

    #[test]
    fn latest_tracks_last_value_per_point() {
        let outputs = outputs();
        let mut w = SimWriter::new(outputs.clone(), OutputNodes::new("o1", "o2", "o3"));
        w.write(OutputPoint::CorrectionCycle, Variant::Int(1)).unwrap();
        w.write(OutputPoint::CorrectionCycle, Variant::Int(2)).unwrap();
        assert_eq!(outputs.latest(OutputPoint::CorrectionCycle), Some(Variant::Int(2)));
        assert_eq!(outputs.cycle_tags(), vec![1, 2]);
        assert_eq!(outputs.latest(OutputPoint::CorrectionX), None);
        assert_eq!(outputs.node_history()[0].0, NodeId::from("o3"));
    }

    #[test]
    fn rejected_point_is_not_recorded() {
        let outputs = outputs();
        let mut w = SimWriter::new(outputs.clone(), OutputNodes::new("o1", "o2", "o3"))
            .failing_on(Some(OutputPoint::CorrectionX));
        assert!(w.write(OutputPoint::CorrectionX, Variant::Double(1.0)).is_err());
        assert!(outputs.history().is_empty());
    }

    #[test]
    fn write_to_a_non_output_node_fails() {
        let outputs = outputs();
        let mut w = SimWriter::new(outputs.clone(), OutputNodes::new("o1", "sensor", "o3"));
        assert!(w.write(OutputPoint::CorrectionX, Variant::Double(1.0)).is_ok());
        let err = w.write(OutputPoint::CorrectionY, Variant::Double(1.0)).unwrap_err();
        assert!(err.to_string().contains("sensor"), "{err}");
        assert_eq!(outputs.history().len(), 1);
    }
}
