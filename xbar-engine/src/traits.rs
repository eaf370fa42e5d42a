// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A set of common traits used across the XBAR engine.

use core::mem::size_of;
use std::fmt::{Debug, Display};
use std::rc::Rc;

use xbar_track::id::Unique;

use crate::time::clock::Clock;
use crate::types::SimResult;

/// The `TotalBytes` trait is used to determine how many bytes an object
/// represents
pub trait TotalBytes {
    fn total_bytes(&self) -> usize;
}

/// A super-trait that objects that are passed through ports have to
/// implement
///
///  - Clone:       Producers keep a copy of a refused value so that they can
///    offer it again.
///  - Debug/Display: Logging.
///  - PartialEq:   Ports check that a refused value is offered again unchanged.
///  - Unique:      Tracking of values entering/leaving ports.
///  - TotalBytes:  Reporting.
pub trait SimObject: Clone + Debug + Display + PartialEq + Unique + TotalBytes + 'static {}

// Implementations for basic types that can be sent around the simulation for
// testing

impl TotalBytes for i32 {
    fn total_bytes(&self) -> usize {
        size_of::<i32>()
    }
}

impl SimObject for i32 {}

impl TotalBytes for usize {
    fn total_bytes(&self) -> usize {
        size_of::<usize>()
    }
}

impl SimObject for usize {}

/// A component that is evaluated once per clock tick.
///
/// During `tick` a component may only observe state that was registered at
/// the previous clock edge (values delivered by ports, registered `ready`
/// levels, its own state). Everything it changes becomes visible to other
/// components after the edge.
pub trait Clocked {
    /// Evaluate one clock tick.
    fn tick(&self, clock: &Clock) -> SimResult;

    /// Returns true when the component has no outstanding work.
    ///
    /// The engine stops `run()` once every component is idle.
    fn is_idle(&self) -> bool {
        true
    }
}

/// Complete any pending transactions at the clock edge.
pub trait Resolve {
    /// Complete any pending update.
    fn resolve(&self) -> SimResult;
}

/// A [`Resolver`] is used to register any [`Resolve`] functions that need to be
/// called at every clock edge.
pub trait Resolver {
    fn add_resolve(&self, resolve: Rc<dyn Resolve + 'static>);
}
