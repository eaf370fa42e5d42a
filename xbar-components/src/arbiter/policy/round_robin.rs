// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Round Robin arbitration policy

use crate::arbiter::Arbitrate;

/// Grants the first requester at or after the pointer. The pointer moves one
/// past a requester only when its grant is committed.
pub struct RoundRobin {
    candidate: usize,
    num_inputs: usize,
}

impl RoundRobin {
    #[must_use]
    pub fn new(num_inputs: usize) -> Self {
        Self {
            candidate: 0,
            num_inputs,
        }
    }
}

impl Arbitrate for RoundRobin {
    fn select(&self, requests: &[bool]) -> Option<usize> {
        let num_inputs = requests.len();
        (0..num_inputs)
            .map(|i| (i + self.candidate) % num_inputs)
            .find(|&index| requests[index])
    }

    fn commit(&mut self, granted: usize) {
        self.candidate = (granted + 1) % self.num_inputs;
    }

    fn pointer(&self) -> usize {
        self.candidate
    }
}
