// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use xbar_engine::engine::Engine;
use xbar_switch::config::{Architecture, SwitchConfig};
use xbar_switch::frame::single_destination;
use xbar_switch::test_helpers::Testbench;
use xbar_track::tracker::dev_null_tracker;

const RADIX: usize = 8;
const FRAMES_PER_INPUT: usize = 100;

fn create_engine() -> Engine {
    // Create an engine without the tracker system opening files for logging
    let tracker = dev_null_tracker();
    Engine::new(&tracker)
}

fn setup_all_to_all(architecture: Architecture) -> Testbench {
    let config = SwitchConfig::with_radix(RADIX).set_architecture(architecture);
    let tb = Testbench::new(create_engine(), config).unwrap();
    for input in 0..RADIX {
        let frames: Vec<_> = (0..FRAMES_PER_INPUT)
            .map(|i| tb.frame(256, single_destination((input + i) % RADIX), i as u8))
            .collect();
        tb.send(input, &frames);
    }
    tb
}

fn run_testbench(tb: Testbench) {
    tb.engine.run().unwrap();
    let total: usize = tb.sinks.iter().map(|s| s.num_sunk()).sum();
    assert_eq!(total, RADIX * FRAMES_PER_INPUT * 256 / 8);
}

fn bench_switch(c: &mut Criterion) {
    let mut group = c.benchmark_group("switch");

    for architecture in [Architecture::Iq, Architecture::IqVoq, Architecture::Oq] {
        group.bench_function(architecture.to_string(), |b| {
            b.iter_batched(
                || setup_all_to_all(architecture),
                run_testbench,
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_switch
}
criterion_main!(benches);
