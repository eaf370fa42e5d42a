// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Benchmarking of the XBAR switch model.
//!
//! The `xbar-bench` tool has two commands:
//!  - `traffic` generates a [traffic profile](profile::TrafficProfile) that
//!    lists the frames each input sends.
//!  - `latency` [replays](latency::LatencyBench) a profile through a switch,
//!    checks that every frame arrives intact and in order, and writes a
//!    [latency report](report::LatencyResults).
//!
//! Each frame of a profile is tagged with a flow ID that identifies the input
//! that sent it, see [`tags`].

pub mod config;
pub mod latency;
pub mod profile;
pub mod report;
pub mod tags;
