// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use xbar_components::pattern::PausePattern;
use xbar_engine::test_helpers::start_test;
use xbar_switch::config::{Architecture, SwitchConfig};
use xbar_switch::frame::{Frame, single_destination};
use xbar_switch::test_helpers::Testbench;

const RADIX: usize = 4;
const FRAMES_PER_INPUT: usize = 30;

/// Drive random traffic through a switch with idle and backpressure patterns
/// on every port and check that every frame arrives intact and in order.
///
/// With `multicast` each frame goes to a random non-empty set of outputs.
fn random_traffic(architecture: Architecture, interleaving: bool, multicast: bool, seed: u64) {
    let config = SwitchConfig::with_radix(RADIX)
        .set_architecture(architecture)
        .set_frame_interleaving(interleaving)
        .set_multicast(multicast)
        .set_bus_width_bits(32)
        .set_queue_depth(if multicast { 2 } else { 3 });
    let tb = Testbench::new(start_test(file!()), config).unwrap();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let mut sent: Vec<Vec<Frame>> = Vec::with_capacity(RADIX);
    for input in 0..RADIX {
        let frames: Vec<Frame> = (0..FRAMES_PER_INPUT)
            .map(|i| {
                let len = rng.gen_range(1..=40);
                let mask = if multicast {
                    rng.gen_range(1..(1u64 << RADIX))
                } else {
                    single_destination(rng.gen_range(0..RADIX))
                };
                tb.frame(len, mask, rng.gen_range(0..=255))
                    .set_flow_id((i | (input << 6)) as u64)
                    .set_priority_class((len % 256) as u64)
            })
            .collect();
        tb.send(input, &frames);
        tb.sources[input].set_idle_pattern(PausePattern::preset(input));
        tb.sinks[input].set_backpressure(PausePattern::preset(input + 1));
        sent.push(frames);
    }

    tb.engine.run().unwrap();

    let mut num_delivered = 0;
    for output in 0..RADIX {
        let delivered = tb.delivered(output).unwrap();
        num_delivered += delivered.len();
        for (input, frames) in sent.iter().enumerate() {
            let expected: Vec<&Frame> = frames
                .iter()
                .filter(|f| f.destination_mask() & single_destination(output) != 0)
                .collect();
            let received: Vec<&Frame> = delivered
                .iter()
                .filter(|d| d.input == input)
                .map(|d| &d.frame)
                .collect();
            assert_eq!(
                received, expected,
                "{architecture} interleaving {interleaving}: input {input} output {output}"
            );
        }
    }
    let num_copies: usize = sent
        .iter()
        .flatten()
        .map(|f| f.destination_mask().count_ones() as usize)
        .sum();
    assert_eq!(num_delivered, num_copies);
    assert_eq!(tb.switch.frame_timings().len(), num_delivered);
    assert!(tb.switch.take_rejections().is_empty());
    check_matchings(&tb, architecture);
}

/// No output may be granted twice in a tick, nor any input unless the
/// architecture has no input arbitration.
fn check_matchings(tb: &Testbench, architecture: Architecture) {
    let mut by_tick: BTreeMap<u64, Vec<(usize, usize)>> = BTreeMap::new();
    for grant in tb.switch.grant_history() {
        by_tick
            .entry(grant.tick)
            .or_default()
            .push((grant.input, grant.output));
    }
    assert!(!by_tick.is_empty());

    for (tick, grants) in by_tick {
        let mut outputs: Vec<usize> = grants.iter().map(|(_, o)| *o).collect();
        outputs.sort_unstable();
        outputs.dedup();
        assert_eq!(outputs.len(), grants.len(), "{architecture} tick {tick}");

        if architecture != Architecture::Oq {
            let mut inputs: Vec<usize> = grants.iter().map(|(i, _)| *i).collect();
            inputs.sort_unstable();
            inputs.dedup();
            assert_eq!(inputs.len(), grants.len(), "{architecture} tick {tick}");
        }
    }
}

#[test]
fn random_traffic_iq() {
    random_traffic(Architecture::Iq, false, false, 1);
    random_traffic(Architecture::Iq, true, false, 2);
}

#[test]
fn random_traffic_iq_voq() {
    random_traffic(Architecture::IqVoq, false, false, 3);
    random_traffic(Architecture::IqVoq, true, false, 4);
}

#[test]
fn random_traffic_oq() {
    random_traffic(Architecture::Oq, false, false, 5);
    random_traffic(Architecture::Oq, true, false, 6);
}

#[test]
fn random_multicast_traffic() {
    for (index, architecture) in [Architecture::Iq, Architecture::IqVoq, Architecture::Oq]
        .into_iter()
        .enumerate()
    {
        for interleaving in [false, true] {
            for run in 0..5 {
                let seed = 100 + (index as u64) * 10 + run * 2 + u64::from(interleaving);
                random_traffic(architecture, interleaving, true, seed);
            }
        }
    }
}
