// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Shared types.

/// The `DataGenerator` is what a [source](crate::source) uses
/// to generate data values to send.
pub type DataGenerator<T> = Box<dyn Iterator<Item = T> + 'static>;
