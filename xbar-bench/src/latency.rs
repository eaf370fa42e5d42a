// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Replay a traffic profile through the switch and measure frame latency.
//!
//! A [`Source`] drives every input with the frames the profile lists for it
//! and a [`Sink`] takes every output. Once the simulation has drained, each
//! frame seen at an output is checked against what its input sent to that
//! output: same order, bytes and tags.

use std::cell::Cell;
use std::rc::Rc;

use indicatif::ProgressBar;
use xbar_components::connect_port;
use xbar_components::pattern::PausePattern;
use xbar_components::sink::Sink;
use xbar_components::source::Source;
use xbar_engine::engine::Engine;
use xbar_engine::time::clock::Clock;
use xbar_engine::traits::Clocked;
use xbar_engine::types::{SimError, SimResult};
use xbar_switch::config::SwitchConfig;
use xbar_switch::frame::{Beat, Frame, reassemble, single_destination};
use xbar_switch::switch::Switch;
use xbar_track::entity::Entity;
use xbar_track::{debug, info};

use crate::profile::TrafficProfile;
use crate::report::{LatencyRecord, LatencyResults};
use crate::tags::TagGenerator;

/// Pattern name that gives every port its own built-in stress pattern.
pub const PRESET_PATTERNS: &str = "preset";

/// Payload byte `i` of every benchmark frame.
fn payload_byte(i: usize) -> u8 {
    (i % 256) as u8
}

/// What an output should see from one input.
#[derive(Clone, Debug, PartialEq)]
struct ExpectedFrame {
    length: usize,
    flow_id: u64,
    priority_class: u64,
}

/// Updates a progress bar with the number of frames delivered.
///
/// Always idle so that it never keeps the simulation running.
struct ProgressMonitor {
    switch: Rc<Switch>,
    progress_bar: ProgressBar,
    update_ticks: u64,
}

impl Clocked for ProgressMonitor {
    fn tick(&self, clock: &Clock) -> SimResult {
        if clock.tick_now() % self.update_ticks == 0 {
            self.progress_bar
                .set_position(self.switch.num_frames_delivered() as u64);
        }
        Ok(())
    }

    fn is_idle(&self) -> bool {
        true
    }
}

fn build_patterns(pattern: &str, radix: usize) -> Result<Vec<PausePattern>, SimError> {
    if pattern == PRESET_PATTERNS {
        return Ok((0..radix).map(PausePattern::preset).collect());
    }
    (0..radix).map(|_| pattern.parse()).collect()
}

pub struct LatencyBench {
    entity: Rc<Entity>,
    engine: Engine,
    switch: Rc<Switch>,
    sources: Vec<Rc<Source<Beat>>>,
    sinks: Vec<Rc<Sink<Beat>>>,

    /// Indexed by input then output.
    expected: Vec<Vec<Vec<ExpectedFrame>>>,
    num_frames: usize,
    ran: Cell<bool>,
}

impl LatencyBench {
    /// Build the switch and load every input with its frames from `profile`.
    pub fn new(
        engine: Engine,
        config: SwitchConfig,
        profile: &TrafficProfile,
    ) -> Result<Self, SimError> {
        let radix = config.radix;
        if profile.radix() != radix {
            return Err(SimError(format!(
                "Profile radix {} does not match switch radix {radix}",
                profile.radix()
            )));
        }

        let top = engine.top().clone();
        let entity = Rc::new(Entity::new(&top, "bench"));
        let bus_bytes = config.bus_bytes();
        let mut tags = TagGenerator::new(radix, config.id_tag_width, config.user_tag_width)?;
        let switch = Switch::new_and_register(&engine, &top, "switch", config)?;

        let mut sources = Vec::with_capacity(radix);
        let mut sinks = Vec::with_capacity(radix);
        for i in 0..radix {
            let source = Source::new_and_register(&engine, &top, &format!("source_{i}"), None);
            connect_port!(source, tx => switch, rx, i)?;
            sources.push(source);

            let sink = Sink::new_and_register(&engine, &top, &format!("sink_{i}"));
            connect_port!(switch, tx, i => sink, rx)?;
            sinks.push(sink);
        }

        let mut expected = vec![vec![Vec::new(); radix]; radix];
        let mut beats: Vec<Vec<Beat>> = vec![Vec::new(); radix];
        for entry in profile.entries() {
            let payload = (0..entry.length).map(payload_byte).collect();
            let flow_id = tags.next_flow_id(entry.input);
            let priority_class = tags.priority_class(entry.length);
            let frame = Frame::new(
                &sources[entry.input].entity,
                payload,
                single_destination(entry.output),
            )
            .set_flow_id(flow_id)
            .set_priority_class(priority_class);

            beats[entry.input].extend(frame.to_beats(bus_bytes));
            expected[entry.input][entry.output].push(ExpectedFrame {
                length: entry.length,
                flow_id,
                priority_class,
            });
        }
        for (source, beats) in sources.iter().zip(beats) {
            source.set_generator(Some(Box::new(beats.into_iter())));
        }

        let num_frames = profile.entries().len();
        debug!(entity ; "loaded {} frames of {} profile", num_frames, profile.test());

        Ok(Self {
            entity,
            engine,
            switch,
            sources,
            sinks,
            expected,
            num_frames,
            ran: Cell::new(false),
        })
    }

    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    #[must_use]
    pub fn switch(&self) -> &Rc<Switch> {
        &self.switch
    }

    /// Insert idle ticks at every input.
    ///
    /// `pattern` is a comma-separated list of `0`/`1` values, empty for no
    /// idle ticks, or `preset` to give each input a different built-in
    /// pattern.
    pub fn set_idle_pattern(&self, pattern: &str) -> SimResult {
        let patterns = build_patterns(pattern, self.sources.len())?;
        for (source, pattern) in self.sources.iter().zip(patterns) {
            source.set_idle_pattern(pattern);
        }
        Ok(())
    }

    /// Apply backpressure at every output, see [`Self::set_idle_pattern`]
    /// for the format of `pattern`.
    pub fn set_backpressure_pattern(&self, pattern: &str) -> SimResult {
        let patterns = build_patterns(pattern, self.sinks.len())?;
        for (sink, pattern) in self.sinks.iter().zip(patterns) {
            sink.set_backpressure(pattern);
        }
        Ok(())
    }

    /// Report the number of frames delivered every `update_ticks`.
    pub fn attach_progress(&self, progress_bar: ProgressBar, update_ticks: u64) {
        let monitor = ProgressMonitor {
            switch: self.switch.clone(),
            progress_bar,
            update_ticks: update_ticks.max(1),
        };
        self.engine.register(Rc::new(monitor));
    }

    /// Run the simulation to completion and check every frame delivered.
    pub fn run(&self) -> Result<LatencyResults, SimError> {
        if self.ran.replace(true) {
            return Err(SimError(format!("{}: already run", self.entity)));
        }

        self.engine.run()?;

        let rejections = self.switch.take_rejections();
        if let Some(rejection) = rejections.first() {
            return Err(SimError(format!(
                "{} frames rejected, first {rejection}",
                rejections.len()
            )));
        }
        self.check_delivered()?;

        let config = self.switch.config();
        let ns_per_tick = 1000.0 / config.clock_mhz;
        let timings = self.switch.frame_timings();
        let total_bytes = timings.iter().map(|t| t.num_bytes).sum();
        let mut records: Vec<LatencyRecord> = timings
            .iter()
            .map(|t| LatencyRecord {
                input: t.input,
                output: t.output,
                start_ns: t.ingress_tick as f64 * ns_per_tick,
                end_ns: t.egress_tick as f64 * ns_per_tick,
                tag: t.flow_id,
            })
            .collect();
        records.sort_by_key(|r| r.tag);

        let ticks = self.engine.tick_now();
        info!(self.entity ; "{} frames delivered in {} ticks", records.len(), ticks);

        Ok(LatencyResults::new(
            config.architecture,
            config.bus_width_bits,
            records,
            ticks,
            self.engine.time_now_ns(),
            total_bytes,
        ))
    }

    /// Check that every output saw exactly the frames sent to it, in the
    /// order each input sent them.
    fn check_delivered(&self) -> SimResult {
        let config = self.switch.config();
        let radix = config.radix;
        for (output, sink) in self.sinks.iter().enumerate() {
            let delivered = reassemble(&sink.received(), radix, config.bus_bytes())?;
            let mut next = vec![0; radix];
            for d in &delivered {
                let position = next[d.input];
                next[d.input] += 1;
                let Some(expected) = self.expected[d.input][output].get(position) else {
                    return Err(SimError(format!(
                        "output {output}: unexpected {} from input {}",
                        d.frame, d.input
                    )));
                };

                let frame = &d.frame;
                let payload_ok = frame.len() == expected.length
                    && frame
                        .payload()
                        .iter()
                        .enumerate()
                        .all(|(i, &b)| b == payload_byte(i));
                if !payload_ok
                    || frame.flow_id() != expected.flow_id
                    || frame.priority_class() != expected.priority_class
                    || frame.destination_mask() != single_destination(output)
                {
                    return Err(SimError(format!(
                        "output {output}: frame {position} from input {} is {frame}, expected flow 0x{:x} ({} bytes)",
                        d.input, expected.flow_id, expected.length
                    )));
                }
            }

            for (input, &count) in next.iter().enumerate() {
                let sent = self.expected[input][output].len();
                if count != sent {
                    return Err(SimError(format!(
                        "output {output}: received {count} of {sent} frames from input {input}"
                    )));
                }
            }
        }
        Ok(())
    }
}
