// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Port
//!
//! A port models a `valid`/`ready` handshake between a producer
//! ([`OutPort`]) and a consumer ([`InPort`]).
//!
//! - The consumer's `ready` is registered: [`InPort::set_ready`] called during
//!   tick `t` governs acceptance during tick `t + 1`.
//! - The producer calls [`OutPort::offer`] at most once per tick. The value is
//!   accepted when the registered `ready` is high. A value accepted in tick
//!   `t` can be taken with [`InPort::poll`] from tick `t + 1`.
//! - A refused value is pending: it must be offered again, unchanged, every
//!   tick until it is accepted.
//! - A consumer that keeps `ready` high must take every delivered value before
//!   the next one arrives.
//!
//! Breaking any of these rules returns a [`SimError`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use xbar_track::entity::Entity;
use xbar_track::{enter, exit, trace};

use crate::sim_error;
use crate::time::clock::Clock;
use crate::traits::{Resolve, Resolver, SimObject};
use crate::types::{SimError, SimResult};

pub struct PortState<T>
where
    T: SimObject,
{
    entity: Rc<Entity>,
    clock: Clock,

    /// `ready` level used to accept offers during the current tick.
    ready: Cell<bool>,

    /// `ready` level requested by the consumer for the next tick.
    ready_next: Cell<bool>,

    /// Value accepted during the current tick.
    staged: RefCell<Option<T>>,

    /// Value that has crossed the port and not yet been taken.
    delivered: RefCell<Option<T>>,

    /// Value that has been offered and refused.
    pending: RefCell<Option<T>>,

    offered_this_tick: Cell<bool>,

    /// Tick at which each transfer happened.
    transfer_ticks: RefCell<Vec<u64>>,
}

impl<T> PortState<T>
where
    T: SimObject,
{
    fn new(entity: Rc<Entity>, clock: &Clock) -> Self {
        Self {
            entity,
            clock: clock.clone(),
            ready: Cell::new(false),
            ready_next: Cell::new(false),
            staged: RefCell::new(None),
            delivered: RefCell::new(None),
            pending: RefCell::new(None),
            offered_this_tick: Cell::new(false),
            transfer_ticks: RefCell::new(Vec::new()),
        }
    }

    fn offer(&self, value: T) -> Result<bool, SimError> {
        if self.offered_this_tick.replace(true) {
            sim_error!(format!(
                "{}: more than one offer in tick {}",
                self.entity,
                self.clock.tick_now()
            ));
        }

        if let Some(pending) = self.pending.borrow().as_ref() {
            if *pending != value {
                sim_error!(format!(
                    "{}: pending offer {} revoked by {}",
                    self.entity, pending, value
                ));
            }
        }

        if self.ready.get() {
            trace!(self.entity ; "accept {}", value);
            enter!(self.entity ; value.id());
            self.pending.borrow_mut().take();
            self.transfer_ticks
                .borrow_mut()
                .push(self.clock.tick_now());
            self.clock.note_transfer();
            *self.staged.borrow_mut() = Some(value);
            Ok(true)
        } else {
            *self.pending.borrow_mut() = Some(value);
            Ok(false)
        }
    }
}

impl<T> Resolve for PortState<T>
where
    T: SimObject,
{
    fn resolve(&self) -> SimResult {
        if !self.offered_this_tick.replace(false) {
            if let Some(pending) = self.pending.borrow().as_ref() {
                sim_error!(format!(
                    "{}: pending offer {} retracted in tick {}",
                    self.entity,
                    pending,
                    self.clock.tick_now()
                ));
            }
        }

        if let Some(value) = self.staged.borrow_mut().take() {
            let mut delivered = self.delivered.borrow_mut();
            if let Some(old) = delivered.as_ref() {
                sim_error!(format!(
                    "{}: overrun, {} not taken before {} arrived",
                    self.entity, old, value
                ));
            }
            *delivered = Some(value);
        }

        self.ready.set(self.ready_next.get());
        Ok(())
    }
}

/// The consumer side of a port.
pub struct InPort<T>
where
    T: SimObject,
{
    state: Rc<PortState<T>>,
}

impl<T> fmt::Display for InPort<T>
where
    T: SimObject,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.state.entity.fmt(f)
    }
}

impl<T> InPort<T>
where
    T: SimObject,
{
    /// Create a port and register it with the clock so that it is resolved at
    /// every clock edge.
    #[must_use]
    pub fn new(parent: &Rc<Entity>, name: &str, clock: &Clock) -> Self {
        let entity = Rc::new(Entity::new(parent, name));
        let state = Rc::new(PortState::new(entity, clock));
        clock.add_resolve(state.clone());
        Self { state }
    }

    /// The shared state used to connect an [`OutPort`] to this port.
    #[must_use]
    pub fn state(&self) -> Rc<PortState<T>> {
        self.state.clone()
    }

    /// Request the `ready` level to be used from the next tick.
    pub fn set_ready(&self, ready: bool) {
        self.state.ready_next.set(ready);
    }

    /// The `ready` level in effect during this tick.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.ready.get()
    }

    /// Take the value delivered at the last clock edge, if any.
    pub fn poll(&self) -> Option<T> {
        let value = self.state.delivered.borrow_mut().take();
        if let Some(value) = &value {
            exit!(self.state.entity ; value.id());
        }
        value
    }

    /// Whether a delivered value is waiting to be taken.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.state.delivered.borrow().is_some()
    }

    /// Ticks at which values crossed this port.
    #[must_use]
    pub fn transfer_ticks(&self) -> Vec<u64> {
        self.state.transfer_ticks.borrow().clone()
    }

    /// Number of values that have crossed this port.
    #[must_use]
    pub fn num_transfers(&self) -> usize {
        self.state.transfer_ticks.borrow().len()
    }
}

/// The producer side of a port.
pub struct OutPort<T>
where
    T: SimObject,
{
    entity: Rc<Entity>,
    state: RefCell<Option<Rc<PortState<T>>>>,
}

impl<T> fmt::Display for OutPort<T>
where
    T: SimObject,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity.fmt(f)
    }
}

impl<T> OutPort<T>
where
    T: SimObject,
{
    #[must_use]
    pub fn new(parent: &Rc<Entity>, name: &str) -> Self {
        Self {
            entity: Rc::new(Entity::new(parent, name)),
            state: RefCell::new(None),
        }
    }

    pub fn connect(&self, port_state: Rc<PortState<T>>) -> SimResult {
        let mut state = self.state.borrow_mut();
        if state.is_some() {
            sim_error!(format!("{} already connected", self.entity));
        }
        xbar_track::connect!(self.entity ; port_state.entity);
        *state = Some(port_state);
        Ok(())
    }

    /// Offer a value to the connected [`InPort`].
    ///
    /// Returns whether the value was accepted this tick.
    pub fn offer(&self, value: T) -> Result<bool, SimError> {
        match self.state.borrow().as_ref() {
            Some(state) => state.offer(value),
            None => sim_error!(format!("{} not connected", self.entity)),
        }
    }

    /// Whether an offer made this tick would be accepted.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state
            .borrow()
            .as_ref()
            .is_some_and(|state| state.ready.get())
    }

    /// Ticks at which values crossed this port.
    #[must_use]
    pub fn transfer_ticks(&self) -> Vec<u64> {
        self.state
            .borrow()
            .as_ref()
            .map(|state| state.transfer_ticks.borrow().clone())
            .unwrap_or_default()
    }
}
