// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Arbitration between a number of requesters.
//!
//! Arbitration is split into two phases so that many arbiters can be
//! evaluated against the same snapshot of requests:
//!  - [`Arbiter::select`] returns the requester that would be granted without
//!    changing any state.
//!  - [`Arbiter::commit`] records a grant that has been accepted and moves the
//!    rotating pointer.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use xbar_engine::sim_error;
use xbar_engine::types::{SimError, SimResult};
use xbar_track::entity::Entity;
use xbar_track::trace;

pub mod policy;

/// The decision logic of an arbiter.
pub trait Arbitrate {
    /// Choose one of the active `requests` without changing state.
    fn select(&self, requests: &[bool]) -> Option<usize>;

    /// Update state once the grant to `granted` has been accepted.
    fn commit(&mut self, granted: usize);

    /// The current start position of the search.
    fn pointer(&self) -> usize;
}

pub struct Arbiter {
    pub entity: Rc<Entity>,
    num_inputs: usize,
    policy: RefCell<Box<dyn Arbitrate>>,
    grant_counts: RefCell<Vec<u64>>,
}

impl fmt::Display for Arbiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity.fmt(f)
    }
}

impl Arbiter {
    #[must_use]
    pub fn new(
        parent: &Rc<Entity>,
        name: &str,
        num_inputs: usize,
        policy: Box<dyn Arbitrate>,
    ) -> Self {
        Self {
            entity: Rc::new(Entity::new(parent, name)),
            num_inputs,
            policy: RefCell::new(policy),
            grant_counts: RefCell::new(vec![0; num_inputs]),
        }
    }

    /// Select a requester for this round.
    pub fn select(&self, requests: &[bool]) -> Result<Option<usize>, SimError> {
        if requests.len() != self.num_inputs {
            sim_error!(format!(
                "{}: {} requests for {} inputs",
                self,
                requests.len(),
                self.num_inputs
            ));
        }
        let selected = self.policy.borrow().select(requests);
        trace!(self.entity ; "select {:?} from {:?}", selected, requests);
        Ok(selected)
    }

    /// Commit the grant to `granted`.
    pub fn commit(&self, granted: usize) -> SimResult {
        if granted >= self.num_inputs {
            sim_error!(format!("{self}: grant to invalid input {granted}"));
        }
        self.policy.borrow_mut().commit(granted);
        self.grant_counts.borrow_mut()[granted] += 1;
        trace!(self.entity ; "commit {}, pointer now {}", granted, self.pointer());
        Ok(())
    }

    #[must_use]
    pub fn pointer(&self) -> usize {
        self.policy.borrow().pointer()
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Number of committed grants per input.
    #[must_use]
    pub fn grant_counts(&self) -> Vec<u64> {
        self.grant_counts.borrow().clone()
    }

    /// Total number of committed grants.
    #[must_use]
    pub fn total_grants(&self) -> u64 {
        self.grant_counts.borrow().iter().sum()
    }
}
