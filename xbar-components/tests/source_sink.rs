// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use xbar_components::pattern::PausePattern;
use xbar_components::sink::Sink;
use xbar_components::source::Source;
use xbar_components::{connect_port, option_box_repeat};
use xbar_engine::test_helpers::start_test;

#[test]
fn source_sink() {
    let engine = start_test(file!());
    let top = engine.top();

    let source = Source::new_and_register(&engine, top, "source", Some(Box::new(0..10_usize)));
    let sink = Sink::new_and_register(&engine, top, "sink");
    connect_port!(source, tx => sink, rx).unwrap();
    engine.run().unwrap();

    let values: Vec<usize> = sink.received().into_iter().map(|(_, v)| v).collect();
    assert_eq!(values, (0..10).collect::<Vec<_>>());
    let ticks: Vec<u64> = sink.received().into_iter().map(|(t, _)| t).collect();
    assert_eq!(ticks, source.accept_ticks());
    assert_eq!(ticks, (1..11).collect::<Vec<_>>());
}

#[test]
fn patterns_do_not_lose_data() {
    let engine = start_test(file!());
    let top = engine.top();

    const NUM_VALUES: usize = 50;
    let source = Source::new_and_register(&engine, top, "source", option_box_repeat!(7_i32 ; NUM_VALUES));
    source.set_idle_pattern(PausePattern::preset(0));
    let sink = Sink::new_and_register(&engine, top, "sink");
    sink.set_backpressure(PausePattern::preset(3));
    connect_port!(source, tx => sink, rx).unwrap();
    engine.run().unwrap();

    assert_eq!(sink.num_sunk(), NUM_VALUES);
    assert!(engine.tick_now() > NUM_VALUES as u64);
}

#[test]
fn hold_not_ready_delays_by_hold_length() {
    const HOLD: u64 = 7;

    let run = |hold: bool| {
        let engine = start_test(file!());
        let top = engine.top();
        let source = Source::new_and_register(&engine, top, "source", Some(Box::new(0..3_usize)));
        let sink = Sink::new_and_register(&engine, top, "sink");
        if hold {
            sink.hold_not_ready(1, HOLD);
        }
        connect_port!(source, tx => sink, rx).unwrap();
        engine.run().unwrap();
        sink.received()
    };

    let free = run(false);
    let held = run(true);
    assert_eq!(free.len(), held.len());
    for ((t_free, v_free), (t_held, v_held)) in free.iter().zip(held.iter()) {
        assert_eq!(v_free, v_held);
        assert_eq!(*t_held, t_free + HOLD);
    }
}
