// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A collection of connectable components used to build the XBAR model.
//!
//! - [`arbiter`]: arbitration state and policies.
//! - [`fifo`]: a bounded first-in first-out queue.
//! - [`source`]: a producer driving an [`OutPort`](xbar_engine::port::OutPort)
//!   with an optional idle pattern.
//! - [`sink`]: a consumer of an [`InPort`](xbar_engine::port::InPort) with an
//!   optional backpressure pattern.

pub mod arbiter;
pub mod connect;
pub mod fifo;
pub mod pattern;
pub mod sink;
pub mod source;
pub mod types;
