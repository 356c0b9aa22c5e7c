//! In-process stand-in for the machine's OPC-UA server.
//!
//! Every cycle the producer thread publishes, in order: the new cycle id,
//! step 0, the seven features in a shuffled order (minus any dropped ones),
//! step 1 twice (servers re-report unchanged values), step 2, and step 3.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use corrector_core::Feature;
use corrector_core::session::{
    BoxError, Connector, Session, Subscription, SubscriptionGuard, SubscriptionSpec,
};
use corrector_traits::clock::{Clock, MonotonicClock};
use corrector_traits::{Notification, NodeId, OutputPoint, Variant};
use crossbeam_channel as xch;

use crate::error::SimError;
use crate::writer::{SimOutputs, SimWriter};

#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Cycles to publish before closing the stream; 0 publishes until closed.
    pub cycles: u64,
    pub first_cycle: i64,
    /// Pause after each notification.
    pub tick: Duration,
    /// Features never published.
    pub drop_features: Vec<Feature>,
    /// Output point whose writes the server rejects.
    pub fail_write: Option<OutputPoint>,
    pub cycle_name: String,
    pub step_name: String,
    /// Display names of the output variables, in batch order.
    pub output_names: [String; 3],
    pub seed: u32,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            cycles: 5,
            first_cycle: 1,
            tick: Duration::from_millis(1),
            drop_features: Vec::new(),
            fail_write: None,
            cycle_name: "cycle".into(),
            step_name: "process_step".into(),
            output_names: OutputPoint::BATCH_ORDER.map(|p| p.default_name().to_string()),
            seed: 0x5EED,
        }
    }
}

/// Address space as `(node id, display name)`: orchestration variables,
/// the seven features, then the three output points.
pub fn node_table(opts: &SimOptions) -> Vec<(NodeId, String)> {
    let names = [opts.cycle_name.clone(), opts.step_name.clone()]
        .into_iter()
        .chain(Feature::ALL.iter().map(|f| f.as_str().to_string()))
        .chain(opts.output_names.iter().cloned());
    names
        .enumerate()
        .map(|(i, name)| (NodeId::new(format!("ns=2;i={}", i + 1)), name))
        .collect()
}

#[derive(Debug)]
pub struct SimulatedServer {
    opts: SimOptions,
    outputs: SimOutputs,
    publishing_interval: Option<Duration>,
}

impl SimulatedServer {
    pub fn new(opts: SimOptions) -> Self {
        let table = node_table(&opts);
        let points = table.into_iter().filter_map(|(node, name)| {
            opts.output_names
                .iter()
                .position(|n| *n == name)
                .map(|i| (node, OutputPoint::BATCH_ORDER[i]))
        });
        let outputs = SimOutputs::new(points);
        Self {
            opts,
            outputs,
            publishing_interval: None,
        }
    }

    /// Publishing interval requested by the last subscription.
    pub fn publishing_interval(&self) -> Option<Duration> {
        self.publishing_interval
    }

    /// Handle to what clients have written so far.
    pub fn outputs(&self) -> SimOutputs {
        self.outputs.clone()
    }

    pub fn node_table(&self) -> Vec<(NodeId, String)> {
        node_table(&self.opts)
    }

    fn plan(&self, subscribed: &[NodeId]) -> Plan {
        let wanted: HashSet<&NodeId> = subscribed.iter().collect();
        let mut plan = Plan {
            cycle: None,
            step: None,
            features: Vec::new(),
            cycles: self.opts.cycles,
            first_cycle: self.opts.first_cycle,
            tick: self.opts.tick,
            seed: self.opts.seed.max(1),
        };
        for (node, name) in self.node_table() {
            if !wanted.contains(&node) {
                continue;
            }
            if name == self.opts.cycle_name {
                plan.cycle = Some(node);
            } else if name == self.opts.step_name {
                plan.step = Some(node);
            } else if let Ok(f) = name.parse::<Feature>() {
                if !self.opts.drop_features.contains(&f) {
                    plan.features.push((f, node));
                }
            }
        }
        plan
    }
}

impl Connector for SimulatedServer {
    type Writer = SimWriter;

    fn connect(&mut self, url: &str, spec: &SubscriptionSpec) -> Result<Session<SimWriter>, BoxError> {
        let plan = self.plan(&spec.nodes);
        self.publishing_interval = Some(spec.publishing_interval);
        tracing::debug!(
            url,
            subscribed = spec.nodes.len(),
            features = plan.features.len(),
            publishing_interval_ms = spec.publishing_interval.as_millis() as u64,
            "sim session opened"
        );
        let (tx, rx) = xch::unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_producer = stop.clone();
        let handle = std::thread::Builder::new()
            .name("sim-producer".into())
            .spawn(move || plan.run(&tx, &stop_producer, &MonotonicClock::new()))
            .map_err(|e| SimError::Thread(e.to_string()))?;
        Ok(Session {
            notifications: rx,
            writer: SimWriter::new(self.outputs.clone(), spec.outputs.clone())
                .failing_on(self.opts.fail_write),
            subscription: SubscriptionGuard::new(SimSubscription {
                stop,
                handle: Some(handle),
            }),
        })
    }
}

struct SimSubscription {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription for SimSubscription {
    fn close(&mut self) -> Result<(), BoxError> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            h.join()
                .map_err(|_| SimError::Thread("producer panicked".into()))?;
        }
        Ok(())
    }
}

struct Plan {
    cycle: Option<NodeId>,
    step: Option<NodeId>,
    features: Vec<(Feature, NodeId)>,
    cycles: u64,
    first_cycle: i64,
    tick: Duration,
    seed: u32,
}

impl Plan {
    fn next_u32(&mut self) -> u32 {
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.seed = x;
        x
    }

    /// Plausible reading around a per-feature baseline.
    fn sample(&mut self, f: Feature) -> f64 {
        let base = match f {
            Feature::AirTemperature => 22.0,
            Feature::AttachedWeight => 4.5,
            Feature::PositionX => 120.0,
            Feature::PositionY => 80.0,
            Feature::ProcessTemperature => 210.0,
            Feature::Speed => 35.0,
            Feature::SpeedNext => 40.0,
        };
        let jitter = f64::from(self.next_u32() % 2001) / 1000.0 - 1.0;
        base + jitter
    }

    fn run(mut self, tx: &xch::Sender<Notification>, stop: &AtomicBool, clock: &dyn Clock) {
        let tick = self.tick;
        let emit = |node: Option<&NodeId>, value: Variant| -> bool {
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            if let Some(node) = node {
                let n = Notification {
                    node: node.clone(),
                    value,
                    server_timestamp: Some(SystemTime::now()),
                };
                if tx.send(n).is_err() {
                    return false;
                }
                clock.sleep(tick);
            }
            true
        };

        let mut cycle = self.first_cycle;
        let mut done = 0u64;
        while self.cycles == 0 || done < self.cycles {
            let mut order: Vec<(Feature, NodeId)> = self.features.clone();
            for i in (1..order.len()).rev() {
                let j = (self.next_u32() as usize) % (i + 1);
                order.swap(i, j);
            }
            let values: Vec<(NodeId, f64)> = order
                .into_iter()
                .map(|(f, node)| (node, self.sample(f)))
                .collect();

            let step = self.step.as_ref();
            let ok = emit(self.cycle.as_ref(), Variant::Int(cycle))
                && emit(step, Variant::Int(0))
                && values
                    .iter()
                    .all(|(node, v)| emit(Some(node), Variant::Double(*v)))
                && emit(step, Variant::Int(1))
                && emit(step, Variant::Int(1))
                && emit(step, Variant::Int(2))
                && emit(step, Variant::Int(3));
            if !ok {
                tracing::debug!(cycle, "sim producer stopped");
                return;
            }
            cycle = cycle.wrapping_add(1);
            done += 1;
        }
        tracing::debug!(cycles = done, "sim producer finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use corrector_core::OutputNodes;
    use corrector_traits::PointWriter;

    fn all_nodes(server: &SimulatedServer) -> Vec<NodeId> {
        server.node_table().into_iter().map(|(n, _)| n).collect()
    }

    fn spec(nodes: Vec<NodeId>) -> SubscriptionSpec {
        SubscriptionSpec {
            nodes,
            publishing_interval: Duration::from_millis(10),
            outputs: OutputNodes::new("ns=2;i=10", "ns=2;i=11", "ns=2;i=12"),
        }
    }

    #[test]
    fn table_lists_orchestration_features_and_outputs() {
        let table = node_table(&SimOptions::default());
        assert_eq!(table.len(), 12);
        assert_eq!(table[0], (NodeId::new("ns=2;i=1"), "cycle".to_string()));
        assert_eq!(table[11].1, "correction_cycle");
    }

    #[test]
    fn renamed_outputs_are_written_at_their_nodes() {
        let mut server = SimulatedServer::new(SimOptions {
            cycles: 1,
            tick: Duration::ZERO,
            output_names: ["plc_x".into(), "plc_y".into(), "plc_cycle".into()],
            ..SimOptions::default()
        });
        let table = server.node_table();
        assert_eq!(table[9], (NodeId::new("ns=2;i=10"), "plc_x".to_string()));
        let written = server.outputs();
        let mut session = server.connect("sim://", &spec(Vec::new())).unwrap();
        session.writer.write(OutputPoint::CorrectionX, Variant::Double(0.5)).unwrap();
        assert_eq!(written.node_history(), vec![(NodeId::new("ns=2;i=10"), Variant::Double(0.5))]);
        assert_eq!(written.latest(OutputPoint::CorrectionX), Some(Variant::Double(0.5)));
        assert_eq!(server.publishing_interval(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn stream_closes_after_requested_cycles() {
        let mut server = SimulatedServer::new(SimOptions {
            cycles: 2,
            tick: Duration::ZERO,
            ..SimOptions::default()
        });
        let nodes = all_nodes(&server);
        let session = server.connect("sim://", &spec(nodes)).unwrap();
        let received: Vec<Notification> = session.notifications.iter().collect();
        // per cycle: cycle + step0 + 7 features + 4 step reports
        assert_eq!(received.len(), 2 * 13);
        assert_eq!(received[0].value, Variant::Int(1));
        assert_eq!(received[13].value, Variant::Int(2));
    }

    #[test]
    fn unsubscribed_and_dropped_nodes_are_silent() {
        let mut server = SimulatedServer::new(SimOptions {
            cycles: 1,
            tick: Duration::ZERO,
            drop_features: vec![Feature::Speed],
            ..SimOptions::default()
        });
        let table = server.node_table();
        let speed_next = table
            .iter()
            .find(|(_, name)| name == "speed_next")
            .map(|(n, _)| n.clone())
            .unwrap();
        let mut nodes = all_nodes(&server);
        nodes.retain(|n| *n != speed_next);
        let session = server.connect("sim://", &spec(nodes)).unwrap();
        let received: Vec<Notification> = session.notifications.iter().collect();
        assert_eq!(received.len(), 13 - 2);
        assert!(received.iter().all(|n| n.node != speed_next));
    }

    #[test]
    fn closing_the_subscription_stops_an_endless_stream() {
        let mut server = SimulatedServer::new(SimOptions {
            cycles: 0,
            tick: Duration::from_millis(1),
            ..SimOptions::default()
        });
        let nodes = all_nodes(&server);
        let mut session = server.connect("sim://", &spec(nodes)).unwrap();
        assert!(session.notifications.recv().is_ok());
        session.subscription.close();
        assert!(session.subscription.is_closed());
    }
}
