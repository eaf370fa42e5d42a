// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The switch component.
//!
//! Frames arrive as beats on `radix` input ports and leave, unmodified, on
//! the outputs selected by their destination mask.
//!
//! # Ports
//!
//! This component has:
//!  - N [input ports](xbar_engine::port::InPort): `rx[0, N-1]`
//!  - N [output ports](xbar_engine::port::OutPort): `tx[0, N-1]`
//!
//! where N is the `radix` of the [`SwitchConfig`].
//!
//! # Pipeline
//!
//! ```txt
//!  rx[i] -> ASSEMBLE -> DECODE -> QUEUES -> CROSSBAR -> EGRESS[o] -> tx[o]
//! ```
//!
//! Each tick the switch:
//!  1. offers the beat held by each egress path,
//!  2. computes the crossbar matching for the outputs that can take a beat
//!     and moves one beat across each connection,
//!  3. takes any beat delivered to each input, reassembles complete frames
//!     and queues them.
//!
//! An input is only `ready` while it has no frame waiting for queue space.
//! Frames with an invalid destination or tags are dropped at admission and
//! reported through [`Switch::take_rejections`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use xbar_engine::engine::Engine;
use xbar_engine::port::{InPort, PortState};
use xbar_engine::time::clock::Clock;
use xbar_engine::traits::Clocked;
use xbar_engine::types::{SimError, SimResult};
use xbar_track::entity::Entity;
use xbar_track::{debug, error, trace};

use crate::config::SwitchConfig;
use crate::crossbar::{Crossbar, GrantRecord};
use crate::decoder::DestinationDecoder;
use crate::egress::{EgressPath, FrameTiming};
use crate::error::{Rejection, SwitchError};
use crate::frame::{Beat, Frame, FrameAssembler};
use crate::ingress::IngressQueues;

/// A complete frame that has passed the decoder.
struct AdmittedFrame {
    frame: Rc<Frame>,
    outputs: Vec<usize>,
    ingress_tick: u64,
}

/// Admission state for one input.
struct IngressPort {
    assembler: FrameAssembler,

    /// Decoded outputs and first-beat tick of the frame being received.
    current: Option<(Vec<usize>, u64)>,

    /// True while the beats of a rejected frame are being dropped.
    discarding: bool,

    /// Complete frames waiting for space in the queues.
    waiting: VecDeque<AdmittedFrame>,
}

pub struct Switch {
    pub entity: Rc<Entity>,
    config: SwitchConfig,
    decoder: DestinationDecoder,
    rx: Vec<InPort<Beat>>,
    ingress: RefCell<Vec<IngressPort>>,
    queues: RefCell<IngressQueues>,
    crossbar: RefCell<Crossbar>,
    egress: Vec<EgressPath>,
    rejections: RefCell<Vec<Rejection>>,
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity.fmt(f)
    }
}

impl Switch {
    pub fn new_and_register(
        engine: &Engine,
        parent: &Rc<Entity>,
        name: &str,
        config: SwitchConfig,
    ) -> Result<Rc<Self>, SimError> {
        config.validate()?;

        let entity = Rc::new(Entity::new(parent, name));
        let clock = engine.clock();
        let radix = config.radix;
        let bus_bytes = config.bus_bytes();

        let rx = (0..radix)
            .map(|i| InPort::new(&entity, &format!("rx_{i}"), &clock))
            .collect();
        let ingress = (0..radix)
            .map(|_| IngressPort {
                assembler: FrameAssembler::new(bus_bytes),
                current: None,
                discarding: false,
                waiting: VecDeque::new(),
            })
            .collect();
        let egress = (0..radix).map(|o| EgressPath::new(&entity, o)).collect();

        debug!(entity ; "{} radix {} with {}B bus", config.architecture, radix, bus_bytes);

        let rc_self = Rc::new(Self {
            decoder: DestinationDecoder::new(&config),
            queues: RefCell::new(IngressQueues::new(&entity, &config)),
            crossbar: RefCell::new(Crossbar::new(&entity, &config)),
            rx,
            ingress: RefCell::new(ingress),
            egress,
            rejections: RefCell::new(Vec::new()),
            config,
            entity,
        });
        engine.register(rc_self.clone());
        Ok(rc_self)
    }

    #[must_use]
    pub fn config(&self) -> &SwitchConfig {
        &self.config
    }

    #[must_use]
    pub fn radix(&self) -> usize {
        self.config.radix
    }

    pub fn port_rx_i(&self, i: usize) -> Rc<PortState<Beat>> {
        self.rx[i].state()
    }

    pub fn connect_port_tx_i(&self, i: usize, port_state: Rc<PortState<Beat>>) -> SimResult {
        self.egress[i].connect_port_tx(port_state)
    }

    /// Remove and return the frames rejected at admission so far.
    pub fn take_rejections(&self) -> Vec<Rejection> {
        self.rejections.borrow_mut().drain(..).collect()
    }

    /// Timings of every frame that has left the switch, in completion order.
    #[must_use]
    pub fn frame_timings(&self) -> Vec<FrameTiming> {
        let mut timings: Vec<FrameTiming> =
            self.egress.iter().flat_map(EgressPath::timings).collect();
        timings.sort_by_key(|t| (t.egress_tick, t.output));
        timings
    }

    /// Number of frame copies that have left the switch.
    #[must_use]
    pub fn num_frames_delivered(&self) -> usize {
        self.egress.iter().map(EgressPath::num_frames).sum()
    }

    /// Ticks at which beats were accepted at input `i`.
    #[must_use]
    pub fn ingress_ticks(&self, i: usize) -> Vec<u64> {
        self.rx[i].transfer_ticks()
    }

    /// Ticks at which beats were accepted at output `o`.
    #[must_use]
    pub fn egress_ticks(&self, o: usize) -> Vec<u64> {
        self.egress[o].transfer_ticks()
    }

    /// The round-robin pointer of the arbiter for output `o`.
    #[must_use]
    pub fn output_pointer(&self, o: usize) -> usize {
        self.crossbar.borrow().output_arbiter(o).pointer()
    }

    /// Number of grants made by the arbiter for output `o` to each input.
    #[must_use]
    pub fn output_grant_counts(&self, o: usize) -> Vec<u64> {
        self.crossbar.borrow().output_arbiter(o).grant_counts()
    }

    /// Keep a record of every grant from now on. Recording is off by
    /// default.
    pub fn record_grants(&self) {
        self.crossbar.borrow_mut().record_grants();
    }

    /// Every grant made since [`Switch::record_grants`] was called.
    #[must_use]
    pub fn grant_history(&self) -> Vec<GrantRecord> {
        self.crossbar.borrow().grant_history().to_vec()
    }

    fn switch_beats(&self, now: u64) -> SimResult {
        let output_ready = self
            .egress
            .iter()
            .map(|egress| egress.tick(now))
            .collect::<Result<Vec<bool>, SimError>>()?;

        let mut queues = self.queues.borrow_mut();
        let mut crossbar = self.crossbar.borrow_mut();
        let requests = queues.requests();
        if requests.is_empty() {
            return Ok(());
        }

        for connection in crossbar.evaluate(&requests, &output_ready, now)? {
            let Some(transferred) = queues.transfer_beat(connection.input, connection.output)
            else {
                return Err(SimError(format!(
                    "{self}: no beat for connection {} -> {}",
                    connection.input, connection.output
                )));
            };
            let last = transferred.beat.is_last();
            self.egress[connection.output].load(transferred)?;
            crossbar.beat_moved(&connection, last);
        }
        Ok(())
    }

    fn reject(&self, input: usize, beat: &Beat, tick: u64, error: SwitchError) {
        let rejection = Rejection {
            input,
            frame_id: beat.frame_id(),
            flow_id: beat.flow_id(),
            tick,
            error,
        };
        error!(self.entity ; "rejected {}", rejection);
        self.rejections.borrow_mut().push(rejection);
    }

    /// Check the first beat of a frame, returning the outputs it selects.
    fn admit(&self, beat: &Beat) -> Result<Vec<usize>, SwitchError> {
        // Only an empty frame has no data in its first beat
        if beat.data().is_empty() {
            return Err(SwitchError::EmptyPayload);
        }
        self.decoder
            .check_tags(beat.flow_id(), beat.priority_class())?;
        self.decoder.decode(beat.destination_mask())
    }

    fn receive(&self, input: usize, port: &mut IngressPort, beat: Beat, tick: u64) -> SimResult {
        trace!(self.entity ; "rx_{} got {}", input, beat);
        let first = !port.discarding && !port.assembler.in_progress();
        if first {
            match self.admit(&beat) {
                Ok(outputs) => port.current = Some((outputs, tick)),
                Err(e) => {
                    self.reject(input, &beat, tick, e);
                    port.discarding = true;
                }
            }
        }

        if port.discarding {
            if beat.is_last() {
                port.discarding = false;
            }
            return Ok(());
        }

        if let Some(frame) = port.assembler.push(beat)? {
            let Some((outputs, ingress_tick)) = port.current.take() else {
                return Err(SimError(format!(
                    "{self}: rx_{input} frame {frame} was never admitted"
                )));
            };
            port.waiting.push_back(AdmittedFrame {
                frame: Rc::new(frame),
                outputs,
                ingress_tick,
            });
        }
        Ok(())
    }

    fn accept_frames(&self, now: u64) -> SimResult {
        let mut ingress = self.ingress.borrow_mut();
        let mut queues = self.queues.borrow_mut();
        for (input, port) in ingress.iter_mut().enumerate() {
            if let Some(beat) = self.rx[input].poll() {
                // Accepted in the previous tick, visible after the edge
                self.receive(input, port, beat, now.saturating_sub(1))?;
            }

            while let Some(admitted) = port.waiting.front() {
                match queues.enqueue(
                    input,
                    admitted.frame.clone(),
                    &admitted.outputs,
                    admitted.ingress_tick,
                    now,
                ) {
                    Ok(()) => {
                        trace!(self.entity ; "queued {}", admitted.frame);
                        port.waiting.pop_front();
                    }
                    Err(e @ SwitchError::QueueFull { .. }) => {
                        trace!(self.entity ; "{}, stalling rx_{}", e, input);
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            self.rx[input].set_ready(port.waiting.is_empty());
        }
        Ok(())
    }
}

impl Clocked for Switch {
    fn tick(&self, clock: &Clock) -> SimResult {
        let now = clock.tick_now();
        self.switch_beats(now)?;
        self.accept_frames(now)
    }

    fn is_idle(&self) -> bool {
        self.queues.borrow().is_empty()
            && !self.crossbar.borrow().is_holding()
            && self.egress.iter().all(EgressPath::is_empty)
            && self.rx.iter().all(|rx| !rx.has_value())
            && self.ingress.borrow().iter().all(|port| {
                port.waiting.is_empty() && !port.assembler.in_progress() && !port.discarding
            })
    }
}
