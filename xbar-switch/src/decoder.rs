// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Destination decoding and tag checks performed when a frame is admitted.

use crate::config::SwitchConfig;
use crate::error::SwitchError;
use crate::frame::DestinationMask;

/// Returns true when `value` can be represented in `width` bits.
#[must_use]
pub fn fits_in(value: u64, width: u32) -> bool {
    width >= 64 || value >> width == 0
}

pub struct DestinationDecoder {
    radix: usize,
    destination_tag_width: u32,
    id_tag_width: u32,
    user_tag_width: u32,
    multicast_enabled: bool,
}

impl DestinationDecoder {
    #[must_use]
    pub fn new(config: &SwitchConfig) -> Self {
        Self {
            radix: config.radix,
            destination_tag_width: config.destination_tag_width,
            id_tag_width: config.id_tag_width,
            user_tag_width: config.user_tag_width,
            multicast_enabled: config.multicast_enabled,
        }
    }

    /// The outputs selected by `mask`, in ascending order.
    pub fn decode(&self, mask: DestinationMask) -> Result<Vec<usize>, SwitchError> {
        let invalid = |reason: String| SwitchError::InvalidDestination { mask, reason };

        if mask == 0 {
            return Err(invalid("no output selected".to_string()));
        }
        if !fits_in(mask, self.destination_tag_width) {
            return Err(invalid(format!(
                "does not fit in {} bits",
                self.destination_tag_width
            )));
        }

        let outputs: Vec<usize> = (0..64).filter(|bit| mask & (1 << bit) != 0).collect();
        if let Some(&output) = outputs.iter().find(|&&output| output >= self.radix) {
            return Err(invalid(format!(
                "output {output} does not exist in a radix {} switch",
                self.radix
            )));
        }
        if outputs.len() > 1 && !self.multicast_enabled {
            return Err(invalid(format!(
                "{} outputs selected with multicast disabled",
                outputs.len()
            )));
        }
        Ok(outputs)
    }

    /// Check that the tags of a frame fit in the configured widths.
    pub fn check_tags(&self, flow_id: u64, priority_class: u64) -> Result<(), SwitchError> {
        if !fits_in(flow_id, self.id_tag_width) {
            return Err(SwitchError::InvalidTag {
                tag: "flow_id",
                value: flow_id,
                width: self.id_tag_width,
            });
        }
        if !fits_in(priority_class, self.user_tag_width) {
            return Err(SwitchError::InvalidTag {
                tag: "priority_class",
                value: priority_class,
                width: self.user_tag_width,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_widths() {
        assert!(fits_in(0xff, 8));
        assert!(!fits_in(0x100, 8));
        assert!(fits_in(0, 0));
        assert!(!fits_in(1, 0));
        assert!(fits_in(u64::MAX, 64));
    }

    #[test]
    fn multicast_mask() {
        let decoder = DestinationDecoder::new(&SwitchConfig::default().set_multicast(true));
        assert_eq!(decoder.decode(0b1011), Ok(vec![0, 1, 3]));
    }
}
