// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A bounded first-in first-out queue.
//!
//! The [`Fifo`] is not clocked itself; it is owned by a clocked component
//! which decides when values are pushed and popped. Values entering and
//! leaving the queue are tracked against the queue's entity.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use xbar_track::entity::Entity;
use xbar_track::id::Unique;
use xbar_track::{enter, exit};

pub struct Fifo<T>
where
    T: Unique,
{
    pub entity: Rc<Entity>,
    capacity: usize,
    values: VecDeque<T>,
}

impl<T> fmt::Display for Fifo<T>
where
    T: Unique,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity.fmt(f)
    }
}

impl<T> Fifo<T>
where
    T: Unique,
{
    #[must_use]
    pub fn new(parent: &Rc<Entity>, name: &str, capacity: usize) -> Self {
        Self {
            entity: Rc::new(Entity::new(parent, name)),
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    /// Add a value to the back of the queue.
    ///
    /// The value is handed back if the queue is full.
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        enter!(self.entity ; value.id());
        self.values.push_back(value);
        Ok(())
    }

    /// Remove the value at the head of the queue.
    pub fn pop(&mut self) -> Option<T> {
        let value = self.values.pop_front()?;
        exit!(self.entity ; value.id());
        Some(value)
    }

    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.values.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.values.front_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.values.len() >= self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of values that can be pushed before the queue is full.
    #[must_use]
    pub fn space(&self) -> usize {
        self.capacity.saturating_sub(self.values.len())
    }
}

#[cfg(test)]
mod tests {
    use xbar_track::entity::toplevel;
    use xbar_track::tracker::dev_null_tracker;

    use super::*;

    #[test]
    fn bounded() {
        let top = toplevel(&dev_null_tracker(), "top");
        let mut fifo: Fifo<usize> = Fifo::new(&top, "fifo", 2);
        assert!(fifo.try_push(1).is_ok());
        assert!(fifo.try_push(2).is_ok());
        assert_eq!(fifo.try_push(3), Err(3));
        assert_eq!(fifo.space(), 0);

        assert_eq!(fifo.pop(), Some(1));
        assert!(fifo.try_push(3).is_ok());
        assert_eq!(fifo.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }
}
