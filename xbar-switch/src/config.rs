// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Switch configuration.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use xbar_engine::sim_error;
use xbar_engine::types::SimResult;

/// Largest number of ports supported, limited by the width of
/// [`DestinationMask`](crate::frame::DestinationMask).
pub const MAX_RADIX: usize = 64;

/// How frames are queued between input and output ports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// One queue per input. Only the head frame of each input can be
    /// switched.
    #[default]
    #[value(name = "iq")]
    Iq,

    /// One virtual output queue per (input, output) pair.
    #[value(name = "iq_voq")]
    IqVoq,

    /// Frames are moved on arrival into crosspoint queues at the outputs.
    #[value(name = "oq")]
    Oq,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Architecture::Iq => "iq",
            Architecture::IqVoq => "iq_voq",
            Architecture::Oq => "oq",
        };
        write!(f, "{name}")
    }
}

/// Configuration structure for a switch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    /// Number of input ports, which is also the number of output ports
    pub radix: usize,

    /// Queueing architecture
    pub architecture: Architecture,

    /// Width of the data bus of every port
    pub bus_width_bits: usize,

    /// Number of bits available for the flow ID of a frame
    pub id_tag_width: u32,

    /// Number of bits available for the priority class of a frame
    pub user_tag_width: u32,

    /// Number of bits in the destination mask
    pub destination_tag_width: u32,

    /// Allow frames with more than one destination
    pub multicast_enabled: bool,

    /// Allow beats of different frames to be interleaved on an output
    pub frame_interleaving_enabled: bool,

    /// Number of frames each queue can hold
    pub queue_depth: usize,

    /// Frequency of the switch clock
    pub clock_mhz: f64,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            radix: 4,
            architecture: Architecture::default(),
            bus_width_bits: 64,
            id_tag_width: 8,
            user_tag_width: 8,
            destination_tag_width: 4,
            multicast_enabled: false,
            frame_interleaving_enabled: false,
            queue_depth: 16,
            clock_mhz: 1000.0,
        }
    }
}

impl SwitchConfig {
    /// A default configuration for `radix` ports.
    #[must_use]
    pub fn with_radix(radix: usize) -> Self {
        Self {
            radix,
            destination_tag_width: radix as u32,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn set_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    #[must_use]
    pub fn set_bus_width_bits(mut self, bus_width_bits: usize) -> Self {
        self.bus_width_bits = bus_width_bits;
        self
    }

    #[must_use]
    pub fn set_multicast(mut self, enabled: bool) -> Self {
        self.multicast_enabled = enabled;
        self
    }

    #[must_use]
    pub fn set_frame_interleaving(mut self, enabled: bool) -> Self {
        self.frame_interleaving_enabled = enabled;
        self
    }

    #[must_use]
    pub fn set_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    /// Number of bytes carried by a full beat.
    #[must_use]
    pub fn bus_bytes(&self) -> usize {
        self.bus_width_bits / 8
    }

    /// Check that the parameters describe a switch that can be built.
    pub fn validate(&self) -> SimResult {
        if self.radix < 2 || self.radix > MAX_RADIX {
            sim_error!(format!(
                "radix {} must be in the range 2..={MAX_RADIX}",
                self.radix
            ));
        }
        if self.bus_width_bits == 0 || self.bus_width_bits % 8 != 0 {
            sim_error!(format!(
                "bus_width_bits {} must be a non-zero multiple of 8",
                self.bus_width_bits
            ));
        }
        if (self.destination_tag_width as usize) < self.radix
            || self.destination_tag_width as usize > MAX_RADIX
        {
            sim_error!(format!(
                "destination_tag_width {} must be in the range {}..={MAX_RADIX}",
                self.destination_tag_width, self.radix
            ));
        }
        if self.id_tag_width > 64 {
            sim_error!(format!(
                "id_tag_width {} must be at most 64",
                self.id_tag_width
            ));
        }
        if self.user_tag_width > 64 {
            sim_error!(format!(
                "user_tag_width {} must be at most 64",
                self.user_tag_width
            ));
        }
        if self.queue_depth == 0 {
            sim_error!("queue_depth must be at least 1");
        }
        if !(self.clock_mhz > 0.0) {
            sim_error!(format!("clock_mhz {} must be positive", self.clock_mhz));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SwitchConfig::default().validate().is_ok());
        assert!(SwitchConfig::with_radix(64).validate().is_ok());
    }

    #[test]
    fn invalid_parameters() {
        let bad = [
            SwitchConfig {
                radix: 1,
                ..SwitchConfig::default()
            },
            SwitchConfig::with_radix(65),
            SwitchConfig::default().set_bus_width_bits(12),
            SwitchConfig::default().set_bus_width_bits(0),
            SwitchConfig {
                destination_tag_width: 3,
                ..SwitchConfig::default()
            },
            SwitchConfig::default().set_queue_depth(0),
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn architecture_names() {
        assert_eq!(Architecture::IqVoq.to_string(), "iq_voq");
        assert_eq!(
            Architecture::from_str("oq", false),
            Ok(Architecture::Oq)
        );
    }
}
