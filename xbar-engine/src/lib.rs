// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

#![doc(test(attr(warn(unused))))]

//! The XBAR engine executes synchronous, cycle-accurate simulation
//! [components](../xbar_components/index.html).
//!
//! Every registered component implements [`Clocked`](crate::traits::Clocked)
//! and is ticked once per clock cycle. All communication between components
//! goes through [ports](crate::port) whose state only changes at the clock
//! edge, so the order in which components are ticked does not matter.
//!
//! # Simple Application
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use xbar_engine::engine::Engine;
//! use xbar_engine::port::{InPort, OutPort};
//! use xbar_engine::time::clock::Clock;
//! use xbar_engine::traits::Clocked;
//! use xbar_engine::types::SimResult;
//! use xbar_track::tracker::dev_null_tracker;
//!
//! struct Counter {
//!     tx: OutPort<usize>,
//!     next: std::cell::Cell<usize>,
//! }
//!
//! impl Clocked for Counter {
//!     fn tick(&self, _clock: &Clock) -> SimResult {
//!         if self.tx.offer(self.next.get())? {
//!             self.next.set(self.next.get() + 1);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let engine = Engine::new(&dev_null_tracker());
//! let rx = InPort::new(engine.top(), "rx", &engine.clock());
//! let counter = Rc::new(Counter {
//!     tx: OutPort::new(engine.top(), "tx"),
//!     next: std::cell::Cell::new(0),
//! });
//! counter.tx.connect(rx.state()).unwrap();
//! engine.register(counter.clone());
//!
//! rx.set_ready(true);
//! let mut received = Vec::new();
//! for _ in 0..4 {
//!     engine.step().unwrap();
//!     if let Some(value) = rx.poll() {
//!         received.push(value);
//!     }
//! }
//! assert_eq!(received, vec![0, 1, 2]);
//! assert_eq!(rx.transfer_ticks(), vec![1, 2, 3]);
//! ```

pub mod engine;
pub mod port;
pub mod test_helpers;
pub mod time;
pub mod traits;
pub mod types;
