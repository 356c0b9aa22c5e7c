//! Node id → channel table used to decode notifications, and the node ids
//! the correction outputs are written to.

use std::collections::HashMap;

use corrector_traits::{NodeId, OutputPoint};

use crate::error::CorrectorError;
use crate::feature::Feature;

/// What a subscribed node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Input(Feature),
    Cycle,
    Step,
}

/// Read-only mapping from server node ids to channels, built once per session.
#[derive(Debug, Clone, Default)]
pub struct NodeFeatureBinding {
    map: HashMap<NodeId, Channel>,
}

impl NodeFeatureBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one node; the last binding for a node id wins.
    pub fn bind(mut self, node: impl Into<NodeId>, channel: Channel) -> Self {
        self.map.insert(node.into(), channel);
        self
    }

    /// Build from `(node id, display name)` pairs as returned by a browse.
    ///
    /// Names matching a feature or one of the orchestration variables are
    /// bound; everything else (output points, diagnostics) is left out.
    pub fn from_display_names<I, N, S>(entries: I, cycle_name: &str, step_name: &str) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<NodeId>,
        S: AsRef<str>,
    {
        let mut map = HashMap::new();
        for (node, name) in entries {
            let name = name.as_ref();
            let channel = if name == cycle_name {
                Channel::Cycle
            } else if name == step_name {
                Channel::Step
            } else if let Ok(f) = name.parse::<Feature>() {
                Channel::Input(f)
            } else {
                continue;
            };
            map.insert(node.into(), channel);
        }
        Self { map }
    }

    #[inline]
    pub fn decode(&self, node: &NodeId) -> Option<Channel> {
        self.map.get(node).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Node ids to subscribe to, sorted for stable subscription order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut v: Vec<NodeId> = self.map.keys().cloned().collect();
        v.sort();
        v
    }

    /// Features that have at least one bound node.
    pub fn bound_features(&self) -> Vec<Feature> {
        let mut v: Vec<Feature> = self
            .map
            .values()
            .filter_map(|c| match c {
                Channel::Input(f) => Some(*f),
                _ => None,
            })
            .collect();
        v.sort();
        v.dedup();
        v
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.map.values().any(|c| *c == channel)
    }
}

/// Node ids of the three output variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNodes {
    x: NodeId,
    y: NodeId,
    cycle: NodeId,
}

impl OutputNodes {
    pub fn new(x: impl Into<NodeId>, y: impl Into<NodeId>, cycle: impl Into<NodeId>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            cycle: cycle.into(),
        }
    }

    /// Find each output by display name in `(node id, display name)` pairs.
    /// `names` follows [`OutputPoint::BATCH_ORDER`].
    pub fn resolve<I, N, S>(entries: I, names: [&str; 3]) -> Result<Self, CorrectorError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<NodeId>,
        S: AsRef<str>,
    {
        let mut found: [Option<NodeId>; 3] = [None, None, None];
        for (node, name) in entries {
            if let Some(i) = names.iter().position(|n| *n == name.as_ref()) {
                found[i].get_or_insert(node.into());
            }
        }
        let [x, y, cycle] = found;
        let missing = |i: usize| {
            CorrectorError::Config(format!(
                "no node named '{}' for output point {}",
                names[i],
                OutputPoint::BATCH_ORDER[i]
            ))
        };
        Ok(Self {
            x: x.ok_or_else(|| missing(0))?,
            y: y.ok_or_else(|| missing(1))?,
            cycle: cycle.ok_or_else(|| missing(2))?,
        })
    }

    pub fn node(&self, point: OutputPoint) -> &NodeId {
        match point {
            OutputPoint::CorrectionX => &self.x,
            OutputPoint::CorrectionY => &self.y,
            OutputPoint::CorrectionCycle => &self.cycle,
        }
    }
}

impl Default for OutputNodes {
    /// Outputs addressed by their default display names.
    fn default() -> Self {
        Self::new(
            OutputPoint::CorrectionX.default_name(),
            OutputPoint::CorrectionY.default_name(),
            OutputPoint::CorrectionCycle.default_name(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_resolve_by_configured_name() {
        let outs = OutputNodes::resolve(
            [
                ("ns=2;i=10", "plc_corr_x"),
                ("ns=2;i=11", "plc_corr_y"),
                ("ns=2;i=12", "plc_corr_cycle"),
                ("ns=2;i=13", "correction_x"),
            ],
            ["plc_corr_x", "plc_corr_y", "plc_corr_cycle"],
        )
        .unwrap();
        assert_eq!(outs.node(OutputPoint::CorrectionX), &NodeId::from("ns=2;i=10"));
        assert_eq!(outs.node(OutputPoint::CorrectionCycle), &NodeId::from("ns=2;i=12"));
    }

    #[test]
    fn unresolved_output_names_the_point() {
        let err = OutputNodes::resolve(
            [("a", "correction_x"), ("b", "correction_y")],
            ["correction_x", "correction_y", "correction_cycle"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("'correction_cycle'"), "{err}");
    }

    #[test]
    fn display_names_skip_outputs_and_unknowns() {
        let b = NodeFeatureBinding::from_display_names(
            [
                ("ns=2;i=1", "speed"),
                ("ns=2;i=2", "cycle"),
                ("ns=2;i=3", "process_step"),
                ("ns=2;i=4", "correction_x"),
                ("ns=2;i=5", "plc_heartbeat"),
            ],
            "cycle",
            "process_step",
        );
        assert_eq!(b.len(), 3);
        assert_eq!(
            b.decode(&NodeId::from("ns=2;i=1")),
            Some(Channel::Input(Feature::Speed))
        );
        assert_eq!(b.decode(&NodeId::from("ns=2;i=2")), Some(Channel::Cycle));
        assert_eq!(b.decode(&NodeId::from("ns=2;i=3")), Some(Channel::Step));
        assert_eq!(b.decode(&NodeId::from("ns=2;i=4")), None);
    }

    #[test]
    fn renamed_orchestration_variables_are_honoured() {
        let b = NodeFeatureBinding::from_display_names(
            [("a", "batch"), ("b", "phase")],
            "batch",
            "phase",
        );
        assert!(b.has_channel(Channel::Cycle));
        assert!(b.has_channel(Channel::Step));
        assert!(b.bound_features().is_empty());
    }
}
