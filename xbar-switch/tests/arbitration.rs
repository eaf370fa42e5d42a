// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use xbar_engine::test_helpers::start_test;
use xbar_switch::config::{Architecture, SwitchConfig};
use xbar_switch::frame::single_destination;
use xbar_switch::test_helpers::Testbench;

const ARCHITECTURES: [Architecture; 3] = [Architecture::Iq, Architecture::IqVoq, Architecture::Oq];

fn testbench(config: SwitchConfig) -> Testbench {
    Testbench::new(start_test(file!()), config).unwrap()
}

#[test]
fn two_inputs_contend_for_one_output() {
    for architecture in ARCHITECTURES {
        let tb = testbench(SwitchConfig::with_radix(4).set_architecture(architecture));
        let from_0 = tb.frame(64, single_destination(1), 0x00);
        let from_2 = tb.frame(64, single_destination(1), 0x80);
        tb.send(0, &[from_0.clone()]);
        tb.send(2, &[from_2.clone()]);

        tb.engine.run().unwrap();

        let delivered = tb.delivered(1).unwrap();
        assert_eq!(delivered.len(), 2, "{architecture}");
        assert_eq!(delivered[0].input, 0);
        assert_eq!(delivered[0].frame, from_0);
        assert_eq!(delivered[1].input, 2);
        assert_eq!(delivered[1].frame, from_2);

        // 8 beats each, the second frame follows the first without a gap
        assert_eq!(delivered[0].first_tick, 11);
        assert_eq!(delivered[0].last_tick, 18);
        assert_eq!(delivered[1].first_tick, 19);
        assert_eq!(delivered[1].last_tick, 26);

        assert_eq!(tb.switch.output_grant_counts(1), vec![1, 0, 1, 0]);
        assert_eq!(tb.switch.output_pointer(1), 3);

        let grants = tb.switch.grant_history();
        assert_eq!(grants.len(), 2);
        assert!(grants.iter().all(|g| g.output == 1));
        assert_eq!(grants[0].input, 0);
        assert_eq!(grants[1].input, 2);
        assert!(grants[0].tick < grants[1].tick);

        for output in [0, 2, 3] {
            assert_eq!(tb.sinks[output].num_sunk(), 0);
        }
    }
}

#[test]
fn pointer_only_moves_on_grant() {
    let tb = testbench(SwitchConfig::with_radix(4));
    tb.send(2, &[tb.frame(8, single_destination(0), 1)]);
    tb.engine.run_for(3).unwrap();
    assert_eq!(tb.switch.output_pointer(0), 0);

    tb.engine.run().unwrap();
    assert_eq!(tb.switch.output_pointer(0), 3);
    assert_eq!(tb.switch.output_grant_counts(0), vec![0, 0, 1, 0]);
    for output in 1..4 {
        assert_eq!(tb.switch.output_pointer(output), 0);
    }
}

#[test]
fn sustained_demand_is_served_round_robin() {
    let num_frames = 20;
    for architecture in ARCHITECTURES {
        let radix = 4;
        let tb = testbench(SwitchConfig::with_radix(radix).set_architecture(architecture));
        let mut sent = Vec::new();
        for input in 0..radix {
            let frames: Vec<_> = (0..num_frames)
                .map(|i| tb.frame(8, single_destination(0), (input * 64 + i) as u8))
                .collect();
            tb.send(input, &frames);
            sent.push(frames);
        }

        tb.engine.run().unwrap();

        let grants = tb.switch.grant_history();
        assert_eq!(grants.len(), radix * num_frames, "{architecture}");
        let granted: Vec<usize> = grants.iter().map(|g| g.input).collect();
        let expected: Vec<usize> = (0..radix * num_frames).map(|k| k % radix).collect();
        assert_eq!(granted, expected);

        // A grant is made in every tick while there is demand
        for pair in grants.windows(2) {
            assert_eq!(pair[1].tick, pair[0].tick + 1);
        }

        let delivered = tb.delivered(0).unwrap();
        for (input, frames) in sent.iter().enumerate() {
            let from_input: Vec<_> = delivered
                .iter()
                .filter(|d| d.input == input)
                .map(|d| d.frame.clone())
                .collect();
            assert_eq!(&from_input, frames);
        }
    }
}

#[test]
fn each_input_granted_within_radix_ticks() {
    let radix = 8;
    let tb = testbench(SwitchConfig::with_radix(radix).set_architecture(Architecture::IqVoq));
    for input in 0..radix {
        let frames: Vec<_> = (0..4)
            .map(|i| tb.frame(8, single_destination(5), i))
            .collect();
        tb.send(input, &frames);
    }
    tb.engine.run().unwrap();

    let grants = tb.switch.grant_history();
    let first_tick = grants[0].tick;
    for input in 0..radix {
        let first_grant = grants.iter().find(|g| g.input == input).unwrap();
        assert!(first_grant.tick < first_tick + radix as u64);
    }
}
