// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Simulation time.

pub mod clock;
