// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Frames and the beats they are transferred as.
//!
//! A [`Frame`] is the atomic unit switched by the fabric. On a port it is
//! carried as a sequence of bus-width [`Beat`]s, only the last of which may
//! be short.

use std::fmt::Display;
use std::rc::Rc;

use xbar_engine::sim_error;
use xbar_engine::traits::{SimObject, TotalBytes};
use xbar_engine::types::SimError;
use xbar_track::entity::Entity;
use xbar_track::id::Unique;
use xbar_track::{Id, create, create_id};

/// Bitmap of output ports, bit `i` selects output `i`.
pub type DestinationMask = u64;

/// Mask with only the bit for `output` set.
#[must_use]
pub fn single_destination(output: usize) -> DestinationMask {
    1 << output
}

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    id: Id,
    payload: Vec<u8>,
    destination_mask: DestinationMask,
    flow_id: u64,
    priority_class: u64,
}

impl Frame {
    /// Create a frame and track its creation against `created_by`.
    #[must_use]
    pub fn new(
        created_by: &Rc<Entity>,
        payload: Vec<u8>,
        destination_mask: DestinationMask,
    ) -> Self {
        let frame = Self {
            id: create_id!(created_by),
            payload,
            destination_mask,
            flow_id: 0,
            priority_class: 0,
        };
        create!(created_by ; frame, frame.total_bytes());
        frame
    }

    #[must_use]
    pub fn set_flow_id(mut self, flow_id: u64) -> Self {
        self.flow_id = flow_id;
        self
    }

    #[must_use]
    pub fn set_priority_class(mut self, priority_class: u64) -> Self {
        self.priority_class = priority_class;
        self
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn destination_mask(&self) -> DestinationMask {
        self.destination_mask
    }

    #[must_use]
    pub fn flow_id(&self) -> u64 {
        self.flow_id
    }

    #[must_use]
    pub fn priority_class(&self) -> u64 {
        self.priority_class
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Number of beats needed on a bus `bus_bytes` wide.
    #[must_use]
    pub fn num_beats(&self, bus_bytes: usize) -> usize {
        self.payload.len().div_ceil(bus_bytes).max(1)
    }

    /// Build beat `index` of this frame for a bus `bus_bytes` wide.
    #[must_use]
    pub fn beat(&self, index: usize, bus_bytes: usize) -> Beat {
        let start = (index * bus_bytes).min(self.payload.len());
        let end = ((index + 1) * bus_bytes).min(self.payload.len());
        Beat {
            frame_id: self.id,
            index,
            data: self.payload[start..end].to_vec(),
            last: index + 1 == self.num_beats(bus_bytes),
            destination_mask: self.destination_mask,
            flow_id: self.flow_id,
            priority_class: self.priority_class,
            input: None,
        }
    }

    /// Split the frame into the beats that carry it.
    #[must_use]
    pub fn to_beats(&self, bus_bytes: usize) -> Vec<Beat> {
        (0..self.num_beats(bus_bytes))
            .map(|i| self.beat(i, bus_bytes))
            .collect()
    }
}

impl SimObject for Frame {}

impl Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "frame {} -> 0x{:x} flow 0x{:x} ({} bytes)",
            self.id,
            self.destination_mask,
            self.flow_id,
            self.payload.len()
        )
    }
}

impl TotalBytes for Frame {
    fn total_bytes(&self) -> usize {
        self.payload.len()
    }
}

impl Unique for Frame {
    fn id(&self) -> Id {
        self.id
    }
}

/// One bus-width chunk of a [`Frame`].
#[derive(Clone, Debug, PartialEq)]
pub struct Beat {
    frame_id: Id,
    index: usize,
    data: Vec<u8>,
    last: bool,
    destination_mask: DestinationMask,
    flow_id: u64,
    priority_class: u64,

    /// Index of the input port that accepted the beat, set by the switch.
    input: Option<usize>,
}

impl Beat {
    #[must_use]
    pub fn frame_id(&self) -> Id {
        self.frame_id
    }

    /// Position of the beat within its frame.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of valid bytes in the beat.
    #[must_use]
    pub fn keep(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.last
    }

    #[must_use]
    pub fn destination_mask(&self) -> DestinationMask {
        self.destination_mask
    }

    #[must_use]
    pub fn flow_id(&self) -> u64 {
        self.flow_id
    }

    #[must_use]
    pub fn priority_class(&self) -> u64 {
        self.priority_class
    }

    #[must_use]
    pub fn input(&self) -> Option<usize> {
        self.input
    }

    #[must_use]
    pub fn with_input(mut self, input: usize) -> Self {
        self.input = Some(input);
        self
    }
}

impl SimObject for Beat {}

impl Display for Beat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "beat {}.{} ({}B", self.frame_id, self.index, self.data.len())?;
        if self.last {
            write!(f, ", last")?;
        }
        write!(f, ")")
    }
}

impl TotalBytes for Beat {
    fn total_bytes(&self) -> usize {
        self.data.len()
    }
}

impl Unique for Beat {
    fn id(&self) -> Id {
        self.frame_id
    }
}

/// Rebuilds frames from the beats of one stream.
///
/// Beats must arrive in order with consistent metadata and only the last
/// beat of a frame may be shorter than the bus.
pub struct FrameAssembler {
    bus_bytes: usize,
    beats: Vec<Beat>,
}

impl FrameAssembler {
    #[must_use]
    pub fn new(bus_bytes: usize) -> Self {
        Self {
            bus_bytes,
            beats: Vec::new(),
        }
    }

    /// True when part of a frame has been received.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        !self.beats.is_empty()
    }

    /// Add a beat, returning the frame once its last beat has arrived.
    pub fn push(&mut self, beat: Beat) -> Result<Option<Frame>, SimError> {
        if let Some(first) = self.beats.first() {
            if beat.frame_id != first.frame_id
                || beat.destination_mask != first.destination_mask
                || beat.flow_id != first.flow_id
                || beat.priority_class != first.priority_class
            {
                sim_error!(format!(
                    "{beat} does not belong to frame {} (metadata changed mid-frame)",
                    first.frame_id
                ));
            }
        }
        if beat.index != self.beats.len() {
            sim_error!(format!(
                "{beat} out of order, expected beat {}",
                self.beats.len()
            ));
        }
        if !beat.last && beat.data.len() != self.bus_bytes {
            sim_error!(format!(
                "{beat} is short but is not the last beat of the frame"
            ));
        }
        if beat.data.len() > self.bus_bytes {
            sim_error!(format!("{beat} wider than the {}B bus", self.bus_bytes));
        }

        let last = beat.last;
        self.beats.push(beat);
        if !last {
            return Ok(None);
        }

        let beats = std::mem::take(&mut self.beats);
        let first = &beats[0];
        let frame = Frame {
            id: first.frame_id,
            payload: beats.iter().flat_map(|b| b.data.iter().copied()).collect(),
            destination_mask: first.destination_mask,
            flow_id: first.flow_id,
            priority_class: first.priority_class,
        };
        Ok(Some(frame))
    }
}

/// A frame rebuilt from the beats seen by a consumer.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveredFrame {
    pub input: usize,
    pub frame: Frame,

    /// Ticks at which the first and last beats were accepted.
    pub first_tick: u64,
    pub last_tick: u64,
}

/// Rebuild frames from beats that may be interleaved between inputs.
///
/// Each beat must carry the index of the input that accepted it.
pub fn reassemble(
    beats: &[(u64, Beat)],
    radix: usize,
    bus_bytes: usize,
) -> Result<Vec<DeliveredFrame>, SimError> {
    let mut assemblers: Vec<FrameAssembler> =
        (0..radix).map(|_| FrameAssembler::new(bus_bytes)).collect();
    let mut first_ticks = vec![0; radix];
    let mut frames = Vec::new();

    for (tick, beat) in beats {
        let Some(input) = beat.input().filter(|&input| input < radix) else {
            return Err(SimError(format!("{beat} has no valid input")));
        };
        if !assemblers[input].in_progress() {
            first_ticks[input] = *tick;
        }
        if let Some(frame) = assemblers[input].push(beat.clone())? {
            frames.push(DeliveredFrame {
                input,
                frame,
                first_tick: first_ticks[input],
                last_tick: *tick,
            });
        }
    }

    if let Some(input) = assemblers.iter().position(FrameAssembler::in_progress) {
        return Err(SimError(format!("partial frame from input {input}")));
    }
    Ok(frames)
}
