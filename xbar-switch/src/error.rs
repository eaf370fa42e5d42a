// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Errors detected by the switch.
//!
//! [`SwitchError::InvalidDestination`], [`SwitchError::InvalidTag`] and
//! [`SwitchError::EmptyPayload`] cause a frame to be rejected at admission, [`SwitchError::QueueFull`] stalls the
//! producer until there is space and [`SwitchError::MatchingConflict`] is an
//! internal fault that stops the simulation.

use std::error::Error;
use std::fmt;

use xbar_engine::types::SimError;
use xbar_track::Id;

use crate::frame::DestinationMask;

#[derive(Clone, Debug, PartialEq)]
pub enum SwitchError {
    InvalidDestination {
        mask: DestinationMask,
        reason: String,
    },
    InvalidTag {
        tag: &'static str,
        value: u64,
        width: u32,
    },
    EmptyPayload,
    QueueFull {
        input: usize,
        output: Option<usize>,
    },
    MatchingConflict(String),
}

impl fmt::Display for SwitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchError::InvalidDestination { mask, reason } => {
                write!(f, "invalid destination 0x{mask:x}: {reason}")
            }
            SwitchError::InvalidTag { tag, value, width } => {
                write!(f, "invalid {tag} 0x{value:x}: does not fit in {width} bits")
            }
            SwitchError::EmptyPayload => write!(f, "frame has no payload"),
            SwitchError::QueueFull { input, output } => match output {
                Some(output) => write!(f, "queue full for input {input} output {output}"),
                None => write!(f, "queue full for input {input}"),
            },
            SwitchError::MatchingConflict(details) => write!(f, "matching conflict: {details}"),
        }
    }
}

impl Error for SwitchError {}

impl From<SwitchError> for SimError {
    fn from(error: SwitchError) -> Self {
        SimError(error.to_string())
    }
}

/// A frame that was refused at admission.
#[derive(Clone, Debug, PartialEq)]
pub struct Rejection {
    pub input: usize,
    pub frame_id: Id,
    pub flow_id: u64,

    /// Tick at which the first beat of the frame was accepted.
    pub tick: u64,
    pub error: SwitchError,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {} (flow 0x{:x}) on input {} at tick {}: {}",
            self.frame_id, self.flow_id, self.input, self.tick, self.error
        )
    }
}
