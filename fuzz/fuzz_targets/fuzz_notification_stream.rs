#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;

use corrector_core::{
    Channel, CycleId, Feature, HandlerCfg, NodeFeatureBinding, Reaction, SubscriptionHandler,
};
use corrector_traits::{Notification, Variant};

#[derive(Debug, Arbitrary)]
enum Value {
    Double(f64),
    Int(i64),
    Bool(bool),
}

#[derive(Debug, Arbitrary)]
struct Event {
    node: u8,
    value: Value,
}

fuzz_target!(|events: Vec<Event>| {
    let mut binding = NodeFeatureBinding::new()
        .bind("cycle", Channel::Cycle)
        .bind("step", Channel::Step);
    for f in Feature::ALL {
        binding = binding.bind(f.as_str(), Channel::Input(f));
    }
    let mut h = SubscriptionHandler::new(binding, HandlerCfg::default());
    let names: Vec<&str> = ["cycle", "step", "unbound"]
        .into_iter()
        .chain(Feature::ALL.iter().map(|f| f.as_str()))
        .collect();

    let mut fired: Vec<CycleId> = Vec::new();
    let mut current = CycleId(0);
    for e in events {
        let node = names[e.node as usize % names.len()];
        let value = match e.value {
            Value::Double(v) => Variant::Double(v),
            Value::Int(v) => Variant::Int(v),
            Value::Bool(v) => Variant::Bool(v),
        };
        match h.on_notification(&Notification::new(node, value)) {
            Reaction::CycleStarted { current: c, .. } => {
                if c != current {
                    fired.clear();
                }
                current = c;
            }
            Reaction::Triggered(req) => {
                assert!(!fired.contains(&req.cycle), "two corrections for {:?}", req.cycle);
                assert!(req.snapshot.is_complete(&Feature::ALL));
                fired.push(req.cycle);
            }
            _ => {}
        }
    }
});
