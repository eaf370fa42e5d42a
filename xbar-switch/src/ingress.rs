// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Queues holding admitted frames until they are switched.
//!
//! The layout of the queues depends on the [`Architecture`]:
//!  - `iq`: one queue per input. Only the head frame of each queue can be
//!    switched. A multicast frame stays at the head until a copy has been sent
//!    to every destination, lowest output first.
//!  - `iq_voq`: one virtual output queue per (input, output) pair. A multicast
//!    frame is enqueued to the queue of every destination.
//!  - `oq`: one crosspoint queue per (output, input) pair at the outputs. A
//!    multicast frame is enqueued to the queue of every destination.

use std::rc::Rc;

use xbar_components::fifo::Fifo;
use xbar_track::entity::Entity;
use xbar_track::id::Unique;
use xbar_track::{Id, trace};

use crate::config::{Architecture, SwitchConfig};
use crate::crossbar::RequestSnapshot;
use crate::error::SwitchError;
use crate::frame::{Beat, DestinationMask, Frame, single_destination};

/// A frame together with its progress through the switch.
#[derive(Debug)]
pub struct QueuedFrame {
    frame: Rc<Frame>,
    input: usize,

    /// Tick at which the first beat was accepted at the input port.
    ingress_tick: u64,

    /// Tick at which the frame entered the queue.
    arrival_tick: u64,

    /// Outputs still to receive a copy of this entry.
    pending: DestinationMask,

    /// Next beat to send to the current output.
    cursor: usize,
    num_beats: usize,
}

impl QueuedFrame {
    #[must_use]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    #[must_use]
    pub fn input(&self) -> usize {
        self.input
    }

    #[must_use]
    pub fn ingress_tick(&self) -> u64 {
        self.ingress_tick
    }

    #[must_use]
    pub fn arrival_tick(&self) -> u64 {
        self.arrival_tick
    }

    /// The output that the next beat is sent to.
    #[must_use]
    pub fn current_output(&self) -> usize {
        self.pending.trailing_zeros() as usize
    }

    /// True once some beats of the frame have been switched to the current
    /// output.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.cursor > 0
    }
}

impl Unique for QueuedFrame {
    fn id(&self) -> Id {
        self.frame.id()
    }
}

/// A beat that the crossbar has taken from a queue.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferredBeat {
    pub beat: Beat,
    pub input: usize,
    pub output: usize,
    pub ingress_tick: u64,

    /// Length of the whole frame.
    pub frame_bytes: usize,
}

pub struct IngressQueues {
    architecture: Architecture,
    radix: usize,
    bus_bytes: usize,
    fifos: Vec<Fifo<QueuedFrame>>,
}

impl IngressQueues {
    #[must_use]
    pub fn new(parent: &Rc<Entity>, config: &SwitchConfig) -> Self {
        let radix = config.radix;
        let depth = config.queue_depth;
        let fifos = match config.architecture {
            Architecture::Iq => (0..radix)
                .map(|i| Fifo::new(parent, &format!("iq_{i}"), depth))
                .collect(),
            Architecture::IqVoq => (0..radix * radix)
                .map(|k| Fifo::new(parent, &format!("voq_{}_{}", k / radix, k % radix), depth))
                .collect(),
            Architecture::Oq => (0..radix * radix)
                .map(|k| Fifo::new(parent, &format!("oq_{}_{}", k / radix, k % radix), depth))
                .collect(),
        };
        Self {
            architecture: config.architecture,
            radix,
            bus_bytes: config.bus_bytes(),
            fifos,
        }
    }

    fn key(&self, input: usize, output: usize) -> usize {
        match self.architecture {
            Architecture::Iq => input,
            Architecture::IqVoq => input * self.radix + output,
            Architecture::Oq => output * self.radix + input,
        }
    }

    /// Add a frame from `input` that has been decoded to `outputs`.
    ///
    /// Either every copy of the frame is queued or none is.
    pub fn enqueue(
        &mut self,
        input: usize,
        frame: Rc<Frame>,
        outputs: &[usize],
        ingress_tick: u64,
        now: u64,
    ) -> Result<(), SwitchError> {
        let num_beats = frame.num_beats(self.bus_bytes);
        let entry = |pending| QueuedFrame {
            frame: frame.clone(),
            input,
            ingress_tick,
            arrival_tick: now,
            pending,
            cursor: 0,
            num_beats,
        };

        if self.architecture == Architecture::Iq {
            let pending = outputs
                .iter()
                .fold(0, |mask, &output| mask | single_destination(output));
            return self.fifos[input]
                .try_push(entry(pending))
                .map_err(|_| SwitchError::QueueFull {
                    input,
                    output: None,
                });
        }

        if let Some(&output) = outputs
            .iter()
            .find(|&&output| self.fifos[self.key(input, output)].is_full())
        {
            return Err(SwitchError::QueueFull {
                input,
                output: Some(output),
            });
        }
        for &output in outputs {
            let key = self.key(input, output);
            if self.fifos[key].try_push(entry(single_destination(output))).is_err() {
                return Err(SwitchError::QueueFull {
                    input,
                    output: Some(output),
                });
            }
        }
        Ok(())
    }

    /// The frame that `input` can switch to `output` next, if any.
    #[must_use]
    pub fn peek_head(&self, input: usize, output: usize) -> Option<&QueuedFrame> {
        self.fifos[self.key(input, output)]
            .front()
            .filter(|head| head.current_output() == output)
    }

    /// Which inputs request which outputs this tick.
    #[must_use]
    pub fn requests(&self) -> RequestSnapshot {
        let mut snapshot = RequestSnapshot::new(self.radix);
        for input in 0..self.radix {
            for output in 0..self.radix {
                if self.peek_head(input, output).is_some() {
                    snapshot.set(output, input);
                }
            }
        }
        snapshot
    }

    /// Take the next beat of the head frame that `input` is sending to
    /// `output`.
    ///
    /// The entry is removed from its queue once its last beat has been taken.
    pub fn transfer_beat(&mut self, input: usize, output: usize) -> Option<TransferredBeat> {
        let bus_bytes = self.bus_bytes;
        let key = self.key(input, output);
        let head = self.fifos[key]
            .front_mut()
            .filter(|head| head.current_output() == output)?;

        let beat = head.frame.beat(head.cursor, bus_bytes).with_input(input);
        let transferred = TransferredBeat {
            beat,
            input,
            output,
            ingress_tick: head.ingress_tick,
            frame_bytes: head.frame.len(),
        };

        head.cursor += 1;
        if head.cursor == head.num_beats {
            head.cursor = 0;
            head.pending &= !single_destination(output);
            if head.pending == 0 {
                self.dequeue_on_grant(input, output);
            }
        }
        Some(transferred)
    }

    /// Remove the head entry that `input` has been sending to `output`.
    pub fn dequeue_on_grant(&mut self, input: usize, output: usize) -> Option<QueuedFrame> {
        let key = self.key(input, output);
        let fifo = &mut self.fifos[key];
        let entry = fifo.pop()?;
        trace!(fifo.entity ; "dequeued {} after {} beats", entry.frame, entry.num_beats);
        Some(entry)
    }

    /// Total number of entries queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fifos.iter().map(Fifo::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fifos.iter().all(Fifo::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use xbar_track::entity::toplevel;
    use xbar_track::tracker::dev_null_tracker;

    use super::*;

    fn queues(architecture: Architecture, depth: usize) -> (Rc<Entity>, IngressQueues) {
        let top = toplevel(&dev_null_tracker(), "top");
        let config = SwitchConfig::default()
            .set_architecture(architecture)
            .set_multicast(true)
            .set_queue_depth(depth);
        let queues = IngressQueues::new(&top, &config);
        (top, queues)
    }

    fn frame(top: &Rc<Entity>, len: usize, mask: DestinationMask) -> Rc<Frame> {
        Rc::new(Frame::new(top, vec![0xa5; len], mask))
    }

    #[test]
    fn iq_only_head_requests() {
        let (top, mut queues) = queues(Architecture::Iq, 4);
        queues.enqueue(0, frame(&top, 8, 0b10), &[1], 0, 1).unwrap();
        queues.enqueue(0, frame(&top, 8, 0b100), &[2], 0, 1).unwrap();

        let requests = queues.requests();
        assert!(requests.get(1, 0));
        assert!(!requests.get(2, 0));
        assert!(queues.peek_head(0, 2).is_none());
    }

    #[test]
    fn voq_requests_every_destination() {
        let (top, mut queues) = queues(Architecture::IqVoq, 4);
        queues.enqueue(0, frame(&top, 8, 0b10), &[1], 0, 1).unwrap();
        queues.enqueue(0, frame(&top, 8, 0b100), &[2], 0, 1).unwrap();

        let requests = queues.requests();
        assert!(requests.get(1, 0));
        assert!(requests.get(2, 0));
    }

    #[test]
    fn iq_multicast_serial() {
        let (top, mut queues) = queues(Architecture::Iq, 4);
        queues.enqueue(3, frame(&top, 12, 0b101), &[0, 2], 5, 6).unwrap();

        let first = queues.transfer_beat(3, 0).unwrap();
        assert!(!first.beat.is_last());
        assert_eq!(first.ingress_tick, 5);
        assert!(queues.transfer_beat(3, 2).is_none());
        assert!(queues.transfer_beat(3, 0).unwrap().beat.is_last());

        assert_eq!(queues.peek_head(3, 2).map(QueuedFrame::current_output), Some(2));
        assert_eq!(queues.transfer_beat(3, 2).unwrap().beat.index(), 0);
        assert!(queues.transfer_beat(3, 2).unwrap().beat.is_last());
        assert!(queues.is_empty());
    }

    #[test]
    fn multicast_all_or_nothing() {
        let (top, mut queues) = queues(Architecture::IqVoq, 1);
        queues.enqueue(0, frame(&top, 8, 0b100), &[2], 0, 1).unwrap();
        let err = queues
            .enqueue(0, frame(&top, 8, 0b110), &[1, 2], 0, 2)
            .unwrap_err();
        assert_eq!(
            err,
            SwitchError::QueueFull {
                input: 0,
                output: Some(2)
            }
        );
        assert_eq!(queues.len(), 1);
    }

    #[test]
    fn oq_keyed_by_output() {
        let (top, mut queues) = queues(Architecture::Oq, 1);
        queues.enqueue(0, frame(&top, 8, 0b10), &[1], 0, 1).unwrap();
        queues.enqueue(2, frame(&top, 8, 0b10), &[1], 0, 1).unwrap();
        let requests = queues.requests();
        assert_eq!(requests.for_output(1), &[true, false, true, false]);
    }
}
