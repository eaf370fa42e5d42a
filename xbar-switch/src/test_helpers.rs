// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Helpers to build a switch with a source on every input and a sink on
//! every output.

use std::rc::Rc;

use xbar_components::connect_port;
use xbar_components::sink::Sink;
use xbar_components::source::Source;
use xbar_engine::engine::Engine;
use xbar_engine::types::SimError;

use crate::config::SwitchConfig;
pub use crate::frame::{DeliveredFrame, reassemble};
use crate::frame::{Beat, DestinationMask, Frame};
use crate::switch::Switch;

pub struct Testbench {
    pub engine: Engine,
    pub switch: Rc<Switch>,
    pub sources: Vec<Rc<Source<Beat>>>,
    pub sinks: Vec<Rc<Sink<Beat>>>,
}

impl Testbench {
    pub fn new(engine: Engine, config: SwitchConfig) -> Result<Self, SimError> {
        let top = engine.top().clone();
        let radix = config.radix;
        let switch = Switch::new_and_register(&engine, &top, "switch", config)?;
        switch.record_grants();

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

        Ok(Self {
            engine,
            switch,
            sources,
            sinks,
        })
    }

    /// Create a frame of `len` bytes whose payload identifies `seed`.
    #[must_use]
    pub fn frame(&self, len: usize, destination_mask: DestinationMask, seed: u8) -> Frame {
        let payload = (0..len).map(|i| seed.wrapping_add(i as u8)).collect();
        Frame::new(self.engine.top(), payload, destination_mask)
    }

    /// Make input `input` send `frames` in order.
    pub fn send(&self, input: usize, frames: &[Frame]) {
        let bus_bytes = self.switch.config().bus_bytes();
        let beats: Vec<Beat> = frames.iter().flat_map(|f| f.to_beats(bus_bytes)).collect();
        self.sources[input].set_generator(Some(Box::new(beats.into_iter())));
    }

    /// Frames seen by the sink on `output`, in the order their last beats
    /// arrived.
    pub fn delivered(&self, output: usize) -> Result<Vec<DeliveredFrame>, SimError> {
        reassemble(
            &self.sinks[output].received(),
            self.switch.radix(),
            self.switch.config().bus_bytes(),
        )
    }
}
