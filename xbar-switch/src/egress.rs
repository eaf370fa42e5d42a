// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The egress path of one output.
//!
//! A one-beat register between the crossbar and the output port. The held
//! beat is offered every tick until the consumer accepts it. The crossbar can
//! only load the register once it is empty, so beats leave in the order they
//! were switched.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use xbar_engine::port::{OutPort, PortState};
use xbar_engine::sim_error;
use xbar_engine::types::{SimError, SimResult};
use xbar_track::entity::Entity;
use xbar_track::{Id, debug, trace};

use crate::frame::Beat;
use crate::ingress::TransferredBeat;

/// When a frame passed through the switch.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameTiming {
    pub frame_id: Id,
    pub input: usize,
    pub output: usize,
    pub flow_id: u64,
    pub priority_class: u64,
    pub num_bytes: usize,

    /// Tick the first beat was accepted at the input port.
    pub ingress_tick: u64,

    /// Tick the last beat was accepted at the output port.
    pub egress_tick: u64,
}

impl FrameTiming {
    #[must_use]
    pub fn latency_ticks(&self) -> u64 {
        self.egress_tick - self.ingress_tick
    }
}

pub struct EgressPath {
    pub entity: Rc<Entity>,
    output: usize,
    tx: OutPort<Beat>,
    register: RefCell<Option<TransferredBeat>>,
    timings: RefCell<Vec<FrameTiming>>,
}

impl fmt::Display for EgressPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity.fmt(f)
    }
}

impl EgressPath {
    #[must_use]
    pub fn new(parent: &Rc<Entity>, output: usize) -> Self {
        let entity = Rc::new(Entity::new(parent, &format!("egress_{output}")));
        let tx = OutPort::new(&entity, "tx");
        Self {
            entity,
            output,
            tx,
            register: RefCell::new(None),
            timings: RefCell::new(Vec::new()),
        }
    }

    pub fn connect_port_tx(&self, port_state: Rc<PortState<Beat>>) -> SimResult {
        self.tx.connect(port_state)
    }

    /// Offer the held beat.
    ///
    /// Returns true when the register is empty afterwards and can be loaded
    /// by the crossbar in this tick.
    pub fn tick(&self, now: u64) -> Result<bool, SimError> {
        let mut register = self.register.borrow_mut();
        let Some(held) = register.as_ref() else {
            return Ok(true);
        };
        if !self.tx.offer(held.beat.clone())? {
            return Ok(false);
        }

        trace!(self.entity ; "sent {}", held.beat);
        if held.beat.is_last() {
            let timing = FrameTiming {
                frame_id: held.beat.frame_id(),
                input: held.input,
                output: self.output,
                flow_id: held.beat.flow_id(),
                priority_class: held.beat.priority_class(),
                num_bytes: held.frame_bytes,
                ingress_tick: held.ingress_tick,
                egress_tick: now,
            };
            debug!(self.entity ; "frame {} from input {} done after {} ticks",
                timing.frame_id, timing.input, timing.latency_ticks());
            self.timings.borrow_mut().push(timing);
        }
        *register = None;
        Ok(true)
    }

    /// Place a beat from the crossbar in the register.
    pub fn load(&self, transferred: TransferredBeat) -> SimResult {
        let mut register = self.register.borrow_mut();
        if let Some(held) = register.as_ref() {
            sim_error!(format!(
                "{}: {} switched while {} still held",
                self, transferred.beat, held.beat
            ));
        }
        *register = Some(transferred);
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.register.borrow().is_none()
    }

    /// Frames whose last beat has left this output.
    #[must_use]
    pub fn timings(&self) -> Vec<FrameTiming> {
        self.timings.borrow().clone()
    }

    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.timings.borrow().len()
    }

    /// Ticks at which beats were accepted by the consumer.
    #[must_use]
    pub fn transfer_ticks(&self) -> Vec<u64> {
        self.tx.transfer_ticks()
    }
}
