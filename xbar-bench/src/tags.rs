// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Tags given to benchmark frames.
//!
//! The flow ID carries the index of the input that sent the frame in its top
//! bits and a wrapping counter in the remaining bits. The priority class
//! carries the frame length, truncated to the width of the tag.

use xbar_engine::types::SimError;

/// Number of bits needed to hold `value`.
fn bit_length(value: usize) -> u32 {
    usize::BITS - value.leading_zeros()
}

/// Mask of the low `width` bits.
fn low_bits(width: u32) -> u64 {
    if width >= u64::BITS {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

#[derive(Debug)]
pub struct TagGenerator {
    source_shift: u32,
    user_mask: u64,
    next_id: u64,
}

impl TagGenerator {
    pub fn new(radix: usize, id_tag_width: u32, user_tag_width: u32) -> Result<Self, SimError> {
        let source_bits = bit_length(radix.saturating_sub(1));
        if id_tag_width > u64::BITS || source_bits > id_tag_width {
            return Err(SimError(format!(
                "{id_tag_width}-bit ID tag cannot identify {radix} inputs"
            )));
        }
        Ok(Self {
            source_shift: id_tag_width - source_bits,
            user_mask: low_bits(user_tag_width),
            next_id: 1,
        })
    }

    /// Flow ID for the next frame sent by `input`.
    pub fn next_flow_id(&mut self, input: usize) -> u64 {
        let counter_mask = low_bits(self.source_shift);
        let source = if self.source_shift >= u64::BITS {
            0
        } else {
            (input as u64) << self.source_shift
        };
        let flow_id = (self.next_id & counter_mask) | source;
        self.next_id = (self.next_id + 1) & counter_mask;
        flow_id
    }

    #[must_use]
    pub fn priority_class(&self, length: usize) -> u64 {
        length as u64 & self.user_mask
    }
}
