// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use xbar_engine::test_helpers::start_test;
use xbar_switch::config::{Architecture, SwitchConfig};
use xbar_switch::frame::single_destination;
use xbar_switch::test_helpers::Testbench;

const ARCHITECTURES: [Architecture; 3] = [Architecture::Iq, Architecture::IqVoq, Architecture::Oq];

fn testbench(config: SwitchConfig) -> Testbench {
    Testbench::new(start_test(file!()), config).unwrap()
}

/// Send one 64 byte frame from input 0 to output 1, optionally holding the
/// consumer not ready for `hold_ticks` from `hold_from`.
fn run_one_frame(architecture: Architecture, hold: Option<(u64, u64)>) -> (Vec<u64>, u64) {
    let tb = testbench(SwitchConfig::with_radix(4).set_architecture(architecture));
    let frame = tb.frame(64, single_destination(1), 7);
    tb.send(0, &[frame.clone()]);
    if let Some((hold_from, hold_ticks)) = hold {
        tb.sinks[1].hold_not_ready(hold_from, hold_ticks);
    }

    tb.engine.run().unwrap();

    let delivered = tb.delivered(1).unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].frame, frame);

    let timings = tb.switch.frame_timings();
    assert_eq!(timings.len(), 1);
    assert_eq!(timings[0].num_bytes, 64);
    (tb.switch.egress_ticks(1), timings[0].latency_ticks())
}

#[test]
fn backpressure_delays_by_hold_time() {
    for architecture in ARCHITECTURES {
        let (free_ticks, free_latency) = run_one_frame(architecture, None);
        assert_eq!(free_ticks, (11..=18).collect::<Vec<u64>>());
        assert_eq!(free_latency, 17);

        for hold_ticks in [1, 5, 23] {
            let (held_ticks, held_latency) =
                run_one_frame(architecture, Some((free_ticks[0], hold_ticks)));
            let expected: Vec<u64> = free_ticks.iter().map(|t| t + hold_ticks).collect();
            assert_eq!(held_ticks, expected, "{architecture} held {hold_ticks}");
            assert_eq!(held_latency, free_latency + hold_ticks);
        }
    }
}

#[test]
fn long_backpressure_is_not_a_deadlock() {
    for architecture in ARCHITECTURES {
        let (held_ticks, held_latency) = run_one_frame(architecture, Some((0, 20_000)));
        assert_eq!(held_ticks.len(), 8);
        assert!(held_ticks[0] >= 20_000, "{architecture}");
        assert!(held_latency > 20_000);
    }
}

#[test]
fn backpressure_mid_frame() {
    let (free_ticks, _) = run_one_frame(Architecture::Iq, None);
    let (held_ticks, _) = run_one_frame(Architecture::Iq, Some((free_ticks[3], 4)));
    assert_eq!(held_ticks[..3], free_ticks[..3]);
    for (held, free) in held_ticks[3..].iter().zip(&free_ticks[3..]) {
        assert_eq!(*held, free + 4);
    }
}

/// Input 0 sends a long frame to output 1, which is stalled, followed by a
/// short frame to the idle output 2. Returns the tick at which the short
/// frame completed.
fn short_frame_behind_stalled_output(architecture: Architecture) -> u64 {
    let stall_ticks = 200;
    let tb = testbench(SwitchConfig::with_radix(4).set_architecture(architecture));
    let blocked = tb.frame(64, single_destination(1), 0x10);
    let behind = tb.frame(8, single_destination(2), 0x20);
    tb.send(0, &[blocked.clone(), behind.clone()]);
    tb.sinks[1].hold_not_ready(0, stall_ticks);

    tb.engine.run().unwrap();

    let to_1 = tb.delivered(1).unwrap();
    assert_eq!(to_1.len(), 1);
    assert_eq!(to_1[0].frame, blocked);
    assert!(to_1[0].last_tick > stall_ticks);

    let to_2 = tb.delivered(2).unwrap();
    assert_eq!(to_2.len(), 1);
    assert_eq!(to_2[0].frame, behind);
    to_2[0].last_tick
}

#[test]
fn head_of_line_blocking() {
    // The plain input queue cannot reach the idle output until the stalled
    // frame has gone
    assert!(short_frame_behind_stalled_output(Architecture::Iq) > 200);

    assert_eq!(short_frame_behind_stalled_output(Architecture::IqVoq), 12);
    assert_eq!(short_frame_behind_stalled_output(Architecture::Oq), 12);
}

#[test]
fn full_queue_stalls_input() {
    let tb = testbench(
        SwitchConfig::with_radix(2)
            .set_architecture(Architecture::IqVoq)
            .set_queue_depth(1),
    );
    let frames: Vec<_> = (0..6)
        .map(|i| tb.frame(8, single_destination(1), i))
        .collect();
    tb.send(0, &frames);
    tb.sinks[1].hold_not_ready(0, 50);

    tb.engine.run().unwrap();

    let delivered: Vec<_> = tb
        .delivered(1)
        .unwrap()
        .into_iter()
        .map(|d| d.frame)
        .collect();
    assert_eq!(delivered, frames);

    // Only the queue, the egress register and the waiting frames can be
    // filled while the output is stalled
    let ingress = tb.switch.ingress_ticks(0);
    assert!(ingress.iter().filter(|&&t| t < 50).count() < frames.len());
    assert!(tb.switch.take_rejections().is_empty());
}
