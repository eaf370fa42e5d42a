// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A cycle-accurate model of a multi-port streaming switch fabric.
//!
//! The [`Switch`](crate::switch::Switch) accepts [frames](crate::frame::Frame)
//! as a stream of [beats](crate::frame::Beat) on each of its `radix` input
//! ports and forwards every frame to the outputs selected by its destination
//! mask. Contention for an output is resolved by a round-robin arbiter per
//! output and backpressure from the consumers is propagated back to the
//! producers, so no frame is ever dropped once it has been admitted.
//!
//! The queueing [architecture](crate::config::Architecture) is selected by
//! the [`SwitchConfig`](crate::config::SwitchConfig):
//!  - `iq`: plain input queues, subject to head-of-line blocking.
//!  - `iq_voq`: virtual output queues at each input.
//!  - `oq`: crosspoint queues at each output.

pub mod config;
pub mod crossbar;
pub mod decoder;
pub mod egress;
pub mod error;
pub mod frame;
pub mod ingress;
pub mod switch;
pub mod test_helpers;
