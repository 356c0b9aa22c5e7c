use corrector_core::{Channel, Feature, HandlerCfg, NodeFeatureBinding, SubscriptionHandler};
use corrector_traits::{Notification, Variant};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

// Synthetic stream: boundary, step 0, seven features in shuffled order, steps 1..3.
fn synth_stream(cycles: i64, seed: u32) -> Vec<Notification> {
    let mut state = seed.max(1);
    let mut next_u32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        x
    };
    let mut out = Vec::with_capacity((cycles as usize) * 12);
    for c in 0..cycles {
        out.push(Notification::new("cycle", Variant::Int(c)));
        out.push(Notification::new("process_step", Variant::Int(0)));
        let mut order = Feature::ALL;
        for i in (1..order.len()).rev() {
            order.swap(i, (next_u32() as usize) % (i + 1));
        }
        for f in order {
            let v = f64::from(next_u32() % 1000) / 10.0;
            out.push(Notification::new(f.as_str(), Variant::Double(v)));
        }
        for s in 1..=3 {
            out.push(Notification::new("process_step", Variant::Int(s)));
        }
    }
    out
}

fn handler() -> SubscriptionHandler {
    let mut b = NodeFeatureBinding::new()
        .bind("cycle", Channel::Cycle)
        .bind("process_step", Channel::Step);
    for f in Feature::ALL {
        b = b.bind(f.as_str(), Channel::Input(f));
    }
    SubscriptionHandler::new(b, HandlerCfg::default())
}

pub fn bench_handler(c: &mut Criterion) {
    let mut g = c.benchmark_group("notification_pump");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p corrector_core --bench notification_pump
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    for &cycles in &[100i64, 1_000] {
        let stream = synth_stream(cycles, 0xC0FFEE);
        g.bench_function(format!("cycles_{cycles}"), |b| {
            b.iter_batched(
                handler,
                |mut h| {
                    for n in &stream {
                        black_box(h.on_notification(black_box(n)));
                    }
                    black_box(h.counts());
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(notification_pump, bench_handler);
criterion_main!(notification_pump);
