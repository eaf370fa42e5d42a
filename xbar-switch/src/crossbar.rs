// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The crossbar computes which inputs are connected to which outputs in each
//! tick.
//!
//! Matching is performed on a [`RequestSnapshot`] taken before any queue is
//! changed:
//!  1. Each output that can take a beat and is not held by a frame in
//!     progress runs its round-robin arbiter and votes for one input.
//!  2. Each input that has been granted by more than one output chooses one
//!     with its own round-robin arbiter (not needed for `oq`, where inputs
//!     have already handed their frames to the outputs).
//!  3. All votes are collected into a single matching which is checked for
//!     conflicts before any arbiter state is committed.
//!
//! Unless frame interleaving is enabled an output that has granted an input is
//! held by it until the last beat of the frame has been switched. Held
//! outputs do not take part in arbitration and do not move any arbiter
//! pointer. An input continues a held connection whenever the output can take
//! a beat, and only then is it excluded from other arbitration in that tick.
//! If an input holds several outputs that are ready it continues the one with
//! the lowest index.

use std::fmt;
use std::rc::Rc;

use xbar_components::arbiter::Arbiter;
use xbar_components::arbiter::policy::RoundRobin;
use xbar_engine::types::SimError;
use xbar_track::entity::Entity;
use xbar_track::{debug, error, trace};

use crate::config::{Architecture, SwitchConfig};
use crate::error::SwitchError;

/// Requests seen by each output arbiter.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSnapshot {
    radix: usize,
    requests: Vec<bool>,
}

impl RequestSnapshot {
    #[must_use]
    pub fn new(radix: usize) -> Self {
        Self {
            radix,
            requests: vec![false; radix * radix],
        }
    }

    pub fn set(&mut self, output: usize, input: usize) {
        self.requests[output * self.radix + input] = true;
    }

    #[must_use]
    pub fn get(&self, output: usize, input: usize) -> bool {
        self.requests[output * self.radix + input]
    }

    /// Requests from every input to `output`.
    #[must_use]
    pub fn for_output(&self, output: usize) -> &[bool] {
        &self.requests[output * self.radix..(output + 1) * self.radix]
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.requests.contains(&true)
    }
}

impl fmt::Display for RequestSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for output in 0..self.radix {
            let inputs: Vec<usize> = (0..self.radix)
                .filter(|&input| self.get(output, input))
                .collect();
            write!(f, "[out {output} <- {inputs:?}]")?;
        }
        Ok(())
    }
}

/// A decision made by one arbiter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Vote {
    /// The output continues the frame in progress from `input`.
    Held { output: usize, input: usize },

    /// The output arbiter granted `input`.
    Grant { output: usize, input: usize },

    /// The input arbiter of `input` accepted the grant from `output`.
    Accept { input: usize, output: usize },
}

/// One connection made for a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Connection {
    pub input: usize,
    pub output: usize,

    /// True when the connection was made by arbitration rather than held
    /// from a previous tick.
    pub granted: bool,
}

/// A grant that has been committed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrantRecord {
    pub tick: u64,
    pub output: usize,
    pub input: usize,
}

/// Build the matching from the votes of all arbiters.
///
/// Every output may appear at most once. Inputs may also appear at most once
/// unless `unique_inputs` is false.
pub fn collect_matching(
    votes: &[Vote],
    radix: usize,
    unique_inputs: bool,
) -> Result<Vec<Connection>, SwitchError> {
    let mut connections = Vec::new();
    for vote in votes {
        match *vote {
            Vote::Held { output, input } => connections.push(Connection {
                input,
                output,
                granted: false,
            }),
            Vote::Grant { output, input } => {
                // Without input arbitration every grant is accepted
                if !unique_inputs {
                    connections.push(Connection {
                        input,
                        output,
                        granted: true,
                    });
                }
            }
            Vote::Accept { input, output } => {
                if !votes.contains(&Vote::Grant { output, input }) {
                    return Err(SwitchError::MatchingConflict(format!(
                        "input {input} accepted output {output} without a grant"
                    )));
                }
                connections.push(Connection {
                    input,
                    output,
                    granted: true,
                });
            }
        }
    }

    let mut output_used = vec![false; radix];
    let mut input_used = vec![false; radix];
    for connection in &connections {
        if connection.input >= radix || connection.output >= radix {
            return Err(SwitchError::MatchingConflict(format!(
                "connection {} -> {} outside radix {radix}",
                connection.input, connection.output
            )));
        }
        if std::mem::replace(&mut output_used[connection.output], true) {
            return Err(SwitchError::MatchingConflict(format!(
                "output {} matched more than once",
                connection.output
            )));
        }
        if unique_inputs && std::mem::replace(&mut input_used[connection.input], true) {
            return Err(SwitchError::MatchingConflict(format!(
                "input {} matched more than once",
                connection.input
            )));
        }
    }
    Ok(connections)
}

pub struct Crossbar {
    pub entity: Rc<Entity>,
    radix: usize,
    unique_inputs: bool,
    interleaving: bool,
    output_arbiters: Vec<Arbiter>,
    input_arbiters: Vec<Arbiter>,

    /// Input each output is held by.
    output_held_by: Vec<Option<usize>>,

    /// Only kept once [`Crossbar::record_grants`] has been called.
    grant_history: Option<Vec<GrantRecord>>,
}

impl fmt::Display for Crossbar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity.fmt(f)
    }
}

impl Crossbar {
    #[must_use]
    pub fn new(parent: &Rc<Entity>, config: &SwitchConfig) -> Self {
        let entity = Rc::new(Entity::new(parent, "crossbar"));
        let radix = config.radix;
        let unique_inputs = config.architecture != Architecture::Oq;

        let output_arbiters = (0..radix)
            .map(|o| {
                Arbiter::new(
                    &entity,
                    &format!("arb_{o}"),
                    radix,
                    Box::new(RoundRobin::new(radix)),
                )
            })
            .collect();
        let input_arbiters = if unique_inputs {
            (0..radix)
                .map(|i| {
                    Arbiter::new(
                        &entity,
                        &format!("accept_{i}"),
                        radix,
                        Box::new(RoundRobin::new(radix)),
                    )
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            entity,
            radix,
            unique_inputs,
            interleaving: config.frame_interleaving_enabled,
            output_arbiters,
            input_arbiters,
            output_held_by: vec![None; radix],
            grant_history: None,
        }
    }

    /// Compute the connections for this tick.
    ///
    /// `output_ready[o]` is true when output `o` can take a beat this tick.
    pub fn evaluate(
        &mut self,
        requests: &RequestSnapshot,
        output_ready: &[bool],
        now: u64,
    ) -> Result<Vec<Connection>, SimError> {
        let mut votes = Vec::new();
        let mut input_busy = vec![false; self.radix];

        for output in 0..self.radix {
            if let Some(input) = self.output_held_by[output] {
                if output_ready[output] && requests.get(output, input) && !input_busy[input] {
                    votes.push(Vote::Held { output, input });
                    input_busy[input] = self.unique_inputs;
                }
            }
        }

        for output in 0..self.radix {
            if self.output_held_by[output].is_some() || !output_ready[output] {
                continue;
            }
            let eligible: Vec<bool> = requests
                .for_output(output)
                .iter()
                .enumerate()
                .map(|(input, &request)| request && !input_busy[input])
                .collect();
            if let Some(input) = self.output_arbiters[output].select(&eligible)? {
                votes.push(Vote::Grant { output, input });
            }
        }

        if self.unique_inputs {
            for input in 0..self.radix {
                let granted: Vec<bool> = (0..self.radix)
                    .map(|output| votes.contains(&Vote::Grant { output, input }))
                    .collect();
                if let Some(output) = self.input_arbiters[input].select(&granted)? {
                    votes.push(Vote::Accept { input, output });
                }
            }
        }

        let connections = match collect_matching(&votes, self.radix, self.unique_inputs) {
            Ok(connections) => connections,
            Err(e) => {
                error!(self.entity ; "{e} at tick {now}");
                error!(self.entity ; "requests: {requests}");
                error!(self.entity ; "output ready: {output_ready:?}");
                error!(self.entity ; "held outputs: {:?}", self.output_held_by);
                error!(self.entity ; "votes: {votes:?}");
                return Err(e.into());
            }
        };

        for connection in connections.iter().filter(|c| c.granted) {
            self.output_arbiters[connection.output].commit(connection.input)?;
            if self.unique_inputs {
                self.input_arbiters[connection.input].commit(connection.output)?;
            }
            debug!(self.entity ; "grant {} -> {}", connection.input, connection.output);
            if let Some(history) = self.grant_history.as_mut() {
                history.push(GrantRecord {
                    tick: now,
                    output: connection.output,
                    input: connection.input,
                });
            }
        }
        if !connections.is_empty() {
            trace!(self.entity ; "matching {:?}", connections);
        }
        Ok(connections)
    }

    /// Update the held connections once a beat has moved across
    /// `connection`.
    pub fn beat_moved(&mut self, connection: &Connection, last: bool) {
        if self.interleaving {
            return;
        }
        self.output_held_by[connection.output] = if last {
            None
        } else {
            Some(connection.input)
        };
    }

    /// True while a frame is part way across the crossbar.
    #[must_use]
    pub fn is_holding(&self) -> bool {
        self.output_held_by.iter().any(Option::is_some)
    }

    #[must_use]
    pub fn output_arbiter(&self, output: usize) -> &Arbiter {
        &self.output_arbiters[output]
    }

    /// Start keeping a record of every grant.
    pub fn record_grants(&mut self) {
        self.grant_history.get_or_insert_with(Vec::new);
    }

    /// Grants made since [`Crossbar::record_grants`] was called.
    #[must_use]
    pub fn grant_history(&self) -> &[GrantRecord] {
        self.grant_history.as_deref().unwrap_or_default()
    }
}
