// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Cyclic pause patterns.
//!
//! A [`PausePattern`] is used by a [`Source`](crate::source::Source) to insert
//! idle ticks between values and by a [`Sink`](crate::sink::Sink) to apply
//! backpressure. Each entry covers one tick; `true` means pause.

use std::cell::Cell;
use std::str::FromStr;

use xbar_engine::types::SimError;

/// Patterns used when stressing ports, selected per port by index.
const PRESETS: [[bool; 5]; 4] = [
    [true, false, true, true, false],
    [true, true, true, true, false],
    [true, false, true, true, true],
    [false, false, false, true, true],
];

#[derive(Debug, Clone, Default)]
pub struct PausePattern {
    pattern: Vec<bool>,
    position: Cell<usize>,
}

impl PausePattern {
    /// A pattern that never pauses.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(pattern: Vec<bool>) -> Self {
        Self {
            pattern,
            position: Cell::new(0),
        }
    }

    /// One of the built-in stress patterns, chosen by `index` modulo the
    /// number of patterns.
    #[must_use]
    pub fn preset(index: usize) -> Self {
        Self::new(PRESETS[index % PRESETS.len()].to_vec())
    }

    /// Returns whether to pause in the current tick and moves to the next
    /// entry.
    pub fn next_pause(&self) -> bool {
        if self.pattern.is_empty() {
            return false;
        }
        let position = self.position.get();
        self.position.set((position + 1) % self.pattern.len());
        self.pattern[position]
    }
}

impl FromStr for PausePattern {
    type Err = SimError;

    /// Parse a comma-separated list of `0`/`1` values, e.g. `1,0,1,1,0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::never());
        }
        let pattern = trimmed
            .split(',')
            .map(|v| match v.trim() {
                "0" => Ok(false),
                "1" => Ok(true),
                other => Err(SimError(format!(
                    "Invalid pause pattern entry '{other}' in '{s}'"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles() {
        let pattern: PausePattern = "1,0,0".parse().unwrap();
        let seen: Vec<bool> = (0..7).map(|_| pattern.next_pause()).collect();
        assert_eq!(seen, [true, false, false, true, false, false, true]);
    }

    #[test]
    fn never_pauses() {
        let pattern = PausePattern::never();
        assert!((0..10).all(|_| !pattern.next_pause()));
    }

    #[test]
    fn rejects_bad_entries() {
        assert!("1,2".parse::<PausePattern>().is_err());
    }

    #[test]
    fn presets_wrap() {
        let a = PausePattern::preset(1);
        let b = PausePattern::preset(5);
        for _ in 0..5 {
            assert_eq!(a.next_pause(), b.next_pause());
        }
    }
}
