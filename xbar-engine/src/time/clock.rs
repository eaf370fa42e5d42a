// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! This module represents the time during a simulation.
//!
//! Time is a count of clock ticks. Every registered [`Resolve`] is called at
//! each clock edge, which is how ports make values offered during a tick
//! visible in the next one.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::traits::{Resolve, Resolver};
use crate::types::SimResult;

/// Shared state between users of a Clock and the Clock itself.
pub struct ClockState {
    now: Cell<u64>,

    /// Number of port transfers seen, used to detect lack of progress.
    transfers: Cell<u64>,

    /// Registered [`Resolve`] functions.
    to_resolve: RefCell<Vec<Rc<dyn Resolve + 'static>>>,
}

#[derive(Clone)]
/// State representing a clock.
pub struct Clock {
    /// Frequency of the clock in MHz.
    freq_mhz: f64,

    shared_state: Rc<ClockState>,
}

impl Clock {
    /// Create a new [Clock] at the specified frequency.
    #[must_use]
    pub fn new(freq_mhz: f64) -> Self {
        let shared_state = Rc::new(ClockState {
            now: Cell::new(0),
            transfers: Cell::new(0),
            to_resolve: RefCell::new(Vec::new()),
        });

        Self {
            freq_mhz,
            shared_state,
        }
    }

    /// Returns the clocks frequency in MHz.
    #[must_use]
    pub fn freq_mhz(&self) -> f64 {
        self.freq_mhz
    }

    /// Returns the current tick.
    #[must_use]
    pub fn tick_now(&self) -> u64 {
        self.shared_state.now.get()
    }

    /// Returns the current time in `ns`.
    #[must_use]
    pub fn time_now_ns(&self) -> f64 {
        self.to_ns(self.tick_now())
    }

    /// Convert a tick count of this clock to `ns`.
    #[must_use]
    pub fn to_ns(&self, tick: u64) -> f64 {
        tick as f64 * 1000.0 / self.freq_mhz
    }

    /// Record that a value crossed a port during the current tick.
    pub fn note_transfer(&self) {
        let state = &self.shared_state;
        state.transfers.set(state.transfers.get() + 1);
    }

    /// Total number of port transfers so far.
    #[must_use]
    pub fn num_transfers(&self) -> u64 {
        self.shared_state.transfers.get()
    }

    /// Perform the clock edge: resolve all registered state and move to the
    /// next tick.
    pub fn advance(&self) -> SimResult {
        // Clone the list so that resolve functions may register new ones.
        let to_resolve: Vec<_> = self.shared_state.to_resolve.borrow().clone();
        for r in &to_resolve {
            r.resolve()?;
        }
        let state = &self.shared_state;
        state.now.set(state.now.get() + 1);
        Ok(())
    }
}

impl Resolver for Clock {
    fn add_resolve(&self, resolve: Rc<dyn Resolve + 'static>) {
        self.shared_state.to_resolve.borrow_mut().push(resolve);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_to_ns() {
        let clock = Clock::new(500.0);
        assert_eq!(clock.to_ns(3), 6.0);
        clock.advance().unwrap();
        clock.advance().unwrap();
        assert_eq!(clock.tick_now(), 2);
        assert_eq!(clock.time_now_ns(), 4.0);
    }
}
