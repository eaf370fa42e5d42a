// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The engine owns the clock and the list of registered components.
//!
//! Each call to [`Engine::step`] evaluates one tick: every component's
//! [`tick`](crate::traits::Clocked::tick) is called, then every port is
//! resolved at the clock edge and time advances.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use xbar_track::entity::{Entity, toplevel};
use xbar_track::tracker::stdout_tracker;
use xbar_track::{Tracker, info, set_time};

use crate::sim_error;
use crate::time::clock::Clock;
use crate::types::{Component, SimResult};

/// Use a default clock frequency of 1GHz.
const DEFAULT_CLOCK_MHZ: f64 = 1000.0;

pub struct Engine {
    toplevel: Rc<Entity>,
    tracker: Tracker,
    clock: Clock,
    components: RefCell<Vec<Component>>,
    finish_tick: Cell<Option<u64>>,
    stall_limit_ticks: Cell<Option<u64>>,
}

impl Engine {
    /// Create a standalone engine with a default 1GHz clock.
    #[must_use]
    pub fn new(tracker: &Tracker) -> Self {
        Self::with_clock_mhz(tracker, DEFAULT_CLOCK_MHZ)
    }

    /// Create a standalone engine whose clock runs at `freq_mhz`.
    #[must_use]
    pub fn with_clock_mhz(tracker: &Tracker, freq_mhz: f64) -> Self {
        Self {
            toplevel: toplevel(tracker, "top"),
            tracker: tracker.clone(),
            clock: Clock::new(freq_mhz),
            components: RefCell::new(Vec::new()),
            finish_tick: Cell::new(None),
            stall_limit_ticks: Cell::new(None),
        }
    }

    /// Add a component to be ticked every clock cycle.
    pub fn register(&self, component: Component) {
        self.components.borrow_mut().push(component);
    }

    /// Stop [`run`](Self::run) when this tick is reached even if there is
    /// outstanding work.
    pub fn set_finish_tick(&self, finish_tick: Option<u64>) {
        self.finish_tick.set(finish_tick);
    }

    /// Report a deadlock from [`run`](Self::run) when nothing crosses a port
    /// for this many ticks. There is no limit by default.
    pub fn set_stall_limit_ticks(&self, ticks: Option<u64>) {
        self.stall_limit_ticks.set(ticks);
    }

    /// Evaluate a single tick.
    pub fn step(&self) -> SimResult {
        let components = self.components.borrow().clone();
        for component in &components {
            component.tick(&self.clock)?;
        }
        self.clock.advance()?;
        set_time!(self.toplevel ; self.clock.time_now_ns());
        Ok(())
    }

    /// Run until every component is idle.
    ///
    /// Returns an error if a component fails, or if a stall limit is set and
    /// there is outstanding work but nothing has crossed a port for that many
    /// ticks.
    pub fn run(&self) -> SimResult {
        let mut last_transfers = self.clock.num_transfers();
        let mut last_progress_tick = self.clock.tick_now();

        while !self.all_idle() {
            if let Some(finish_tick) = self.finish_tick.get() {
                if self.clock.tick_now() >= finish_tick {
                    info!(self.toplevel ; "Finish tick {} reached", finish_tick);
                    break;
                }
            }

            self.step()?;

            let transfers = self.clock.num_transfers();
            if transfers != last_transfers {
                last_transfers = transfers;
                last_progress_tick = self.clock.tick_now();
            } else if let Some(limit) = self.stall_limit_ticks.get() {
                if self.clock.tick_now() - last_progress_tick > limit {
                    sim_error!(format!(
                        "Deadlock: no progress since tick {last_progress_tick}"
                    ));
                }
            }
        }
        self.tracker.shutdown();
        Ok(())
    }

    /// Run for a fixed number of ticks regardless of component state.
    pub fn run_for(&self, ticks: u64) -> SimResult {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    fn all_idle(&self) -> bool {
        self.components.borrow().iter().all(|c| c.is_idle())
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }

    #[must_use]
    pub fn tick_now(&self) -> u64 {
        self.clock.tick_now()
    }

    #[must_use]
    pub fn time_now_ns(&self) -> f64 {
        self.clock.time_now_ns()
    }

    #[must_use]
    pub fn top(&self) -> &Rc<Entity> {
        &self.toplevel
    }

    #[must_use]
    pub fn tracker(&self) -> Tracker {
        self.tracker.clone()
    }
}

/// Create a default engine that sends [`Track`](xbar_track::Track) events to
/// stdout.
impl Default for Engine {
    fn default() -> Self {
        let tracker = stdout_tracker(xbar_track::log::Level::Warn);
        Self::new(&tracker)
    }
}
