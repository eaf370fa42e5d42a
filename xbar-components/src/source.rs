// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A data source.
//!
//! The data source produces data as defined by the [DataGenerator] that is
//! provided. A [`PausePattern`] can be set to insert idle ticks before new
//! values are offered. Once a value has been offered it is offered again
//! every tick until it is accepted.
//!
//! # Ports
//!
//! This component has one port:
//!  - One [output port](xbar_engine::port::OutPort): `tx`

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use xbar_engine::engine::Engine;
use xbar_engine::port::{OutPort, PortState};
use xbar_engine::time::clock::Clock;
use xbar_engine::traits::{Clocked, SimObject};
use xbar_engine::types::SimResult;
use xbar_track::entity::Entity;
use xbar_track::{exit, trace};

use crate::pattern::PausePattern;
use crate::types::DataGenerator;

#[macro_export]
macro_rules! option_box_repeat {
    ($value:expr ; $repeat:expr) => {
        Some(Box::new(std::iter::repeat($value).take($repeat)))
    };
}

pub struct Source<T>
where
    T: SimObject,
{
    pub entity: Rc<Entity>,
    tx: OutPort<T>,
    data_generator: RefCell<Option<DataGenerator<T>>>,
    current: RefCell<Option<T>>,
    idle_pattern: RefCell<PausePattern>,
    exhausted: Cell<bool>,
}

impl<T> fmt::Display for Source<T>
where
    T: SimObject,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity.fmt(f)
    }
}

impl<T> Source<T>
where
    T: SimObject,
{
    #[must_use]
    pub fn new_and_register(
        engine: &Engine,
        parent: &Rc<Entity>,
        name: &str,
        data_generator: Option<DataGenerator<T>>,
    ) -> Rc<Self> {
        let entity = Rc::new(Entity::new(parent, name));
        let tx = OutPort::new(&entity, "tx");
        let exhausted = data_generator.is_none();
        let rc_self = Rc::new(Self {
            entity,
            tx,
            data_generator: RefCell::new(data_generator),
            current: RefCell::new(None),
            idle_pattern: RefCell::new(PausePattern::never()),
            exhausted: Cell::new(exhausted),
        });
        engine.register(rc_self.clone());
        rc_self
    }

    pub fn set_generator(&self, data_generator: Option<DataGenerator<T>>) {
        self.exhausted.set(data_generator.is_none());
        *self.data_generator.borrow_mut() = data_generator;
    }

    pub fn set_idle_pattern(&self, pattern: PausePattern) {
        *self.idle_pattern.borrow_mut() = pattern;
    }

    pub fn connect_port_tx(&self, port_state: Rc<PortState<T>>) -> SimResult {
        self.tx.connect(port_state)
    }

    /// Ticks at which values were accepted.
    #[must_use]
    pub fn accept_ticks(&self) -> Vec<u64> {
        self.tx.transfer_ticks()
    }

    fn next_value(&self) -> Option<T> {
        let mut data_generator = self.data_generator.borrow_mut();
        let value = data_generator.as_mut().and_then(|g| g.next());
        if value.is_none() {
            self.exhausted.set(true);
            *data_generator = None;
        }
        value
    }
}

impl<T> Clocked for Source<T>
where
    T: SimObject,
{
    fn tick(&self, _clock: &Clock) -> SimResult {
        let mut current = self.current.borrow_mut();
        if current.is_none() {
            if self.exhausted.get() || self.idle_pattern.borrow().next_pause() {
                return Ok(());
            }
            *current = self.next_value();
        }

        if let Some(value) = current.as_ref() {
            if self.tx.offer(value.clone())? {
                trace!(self.entity ; "sent {}", value);
                exit!(self.entity ; value.id());
                *current = None;
            }
        }
        Ok(())
    }

    fn is_idle(&self) -> bool {
        self.exhausted.get() && self.current.borrow().is_none()
    }
}
