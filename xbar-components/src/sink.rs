// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Sink components.
//!
//! The [`Sink`] takes every value delivered to its port and records it along
//! with the tick at which it crossed the port. Backpressure can be applied
//! with a [`PausePattern`] and by holding `ready` low for a window of ticks.
//!
//! # Ports
//!
//! This component has one port:
//!  - One [input port](xbar_engine::port::InPort): `rx`

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use xbar_engine::engine::Engine;
use xbar_engine::port::{InPort, PortState};
use xbar_engine::time::clock::Clock;
use xbar_engine::traits::{Clocked, SimObject};
use xbar_engine::types::SimResult;
use xbar_track::entity::Entity;
use xbar_track::{enter, trace};

use crate::pattern::PausePattern;

pub struct Sink<T>
where
    T: SimObject,
{
    pub entity: Rc<Entity>,
    rx: InPort<T>,
    backpressure: RefCell<PausePattern>,
    hold_off: Cell<Option<(u64, u64)>>,
    received: RefCell<Vec<(u64, T)>>,
}

impl<T> fmt::Display for Sink<T>
where
    T: SimObject,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity.fmt(f)
    }
}

impl<T> Sink<T>
where
    T: SimObject,
{
    #[must_use]
    pub fn new_and_register(engine: &Engine, parent: &Rc<Entity>, name: &str) -> Rc<Self> {
        let entity = Rc::new(Entity::new(parent, name));
        let rx = InPort::new(&entity, "rx", &engine.clock());
        let rc_self = Rc::new(Self {
            entity,
            rx,
            backpressure: RefCell::new(PausePattern::never()),
            hold_off: Cell::new(None),
            received: RefCell::new(Vec::new()),
        });
        engine.register(rc_self.clone());
        rc_self
    }

    #[must_use]
    pub fn port_rx(&self) -> Rc<PortState<T>> {
        self.rx.state()
    }

    pub fn set_backpressure(&self, pattern: PausePattern) {
        *self.backpressure.borrow_mut() = pattern;
    }

    /// Refuse all values offered in the `ticks` ticks starting at
    /// `from_tick`.
    pub fn hold_not_ready(&self, from_tick: u64, ticks: u64) {
        self.hold_off.set(Some((from_tick, from_tick + ticks)));
    }

    #[must_use]
    pub fn num_sunk(&self) -> usize {
        self.received.borrow().len()
    }

    /// Values received together with the tick at which each was accepted.
    #[must_use]
    pub fn received(&self) -> Vec<(u64, T)> {
        self.received.borrow().clone()
    }

    /// Remove and return everything received so far.
    pub fn take_received(&self) -> Vec<(u64, T)> {
        self.received.borrow_mut().drain(..).collect()
    }
}

impl<T> Clocked for Sink<T>
where
    T: SimObject,
{
    fn tick(&self, clock: &Clock) -> SimResult {
        let now = clock.tick_now();
        if let Some(value) = self.rx.poll() {
            trace!(self.entity ; "received {}", value);
            enter!(self.entity ; value.id());
            // Accepted in the previous tick, visible after the edge
            self.received.borrow_mut().push((now - 1, value));
        }

        // The level set now is used for acceptance in the next tick
        let next = now + 1;
        let held = self
            .hold_off
            .get()
            .is_some_and(|(start, end)| next >= start && next < end);
        let paused = self.backpressure.borrow().next_pause();
        self.rx.set_ready(!held && !paused);
        Ok(())
    }

    fn is_idle(&self) -> bool {
        !self.rx.has_value()
    }
}
