// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Traffic profiles.
//!
//! A profile lists the frames every input sends, in order, as text:
//!
//! ```txt
//! Test,uniform,Radix,4
//! Input,Output,Length
//! 0,3,812
//! 0,1,77
//! ...
//! ```

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use xbar_engine::types::SimError;
use xbar_switch::config::MAX_RADIX;

/// Directory that profiles are written to by default.
pub const PROFILES_DIR: &str = "traffic/profiles";

/// Length of the frames of a `min` profile.
pub const MIN_FRAME_BYTES: usize = 64;

/// Length of the frames of a `max` profile.
pub const MAX_FRAME_BYTES: usize = 1514;

/// Selects the newest profile in the profile directory.
pub const NEWEST: &str = "newest";

const COLUMNS: &str = "Input,Output,Length";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficType {
    /// Every frame is `lower` bytes.
    Custom,

    /// Every frame is 64 bytes.
    Min,

    /// Every frame is 1514 bytes.
    Max,

    /// Distinct lengths drawn uniformly from `[lower, upper]`.
    Uniform,
}

impl fmt::Display for TrafficType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrafficType::Custom => "custom",
            TrafficType::Min => "min",
            TrafficType::Max => "max",
            TrafficType::Uniform => "uniform",
        };
        write!(f, "{name}")
    }
}

/// One frame of a profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProfileEntry {
    pub input: usize,
    pub output: usize,
    pub length: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrafficProfile {
    test: String,
    radix: usize,
    entries: Vec<ProfileEntry>,

    /// Bounds that lengths were drawn from.
    length_limits: (usize, usize),
}

impl TrafficProfile {
    /// Create a profile where each input sends `frames_per_input` frames to
    /// random outputs.
    ///
    /// Every input sends the same sequence of lengths.
    pub fn generate<R: Rng>(
        rng: &mut R,
        traffic_type: TrafficType,
        radix: usize,
        frames_per_input: usize,
        lower: usize,
        upper: usize,
    ) -> Result<Self, SimError> {
        if !(2..=MAX_RADIX).contains(&radix) {
            return Err(SimError(format!(
                "Radix {radix} outside supported range 2..={MAX_RADIX}"
            )));
        }

        let length_limits = match traffic_type {
            TrafficType::Custom => (lower, lower),
            TrafficType::Min => (MIN_FRAME_BYTES, MIN_FRAME_BYTES),
            TrafficType::Max => (MAX_FRAME_BYTES, MAX_FRAME_BYTES),
            TrafficType::Uniform => (lower, upper),
        };
        let lengths = match traffic_type {
            TrafficType::Custom => vec![lower; frames_per_input],
            TrafficType::Min => vec![MIN_FRAME_BYTES; frames_per_input],
            TrafficType::Max => vec![MAX_FRAME_BYTES; frames_per_input],
            TrafficType::Uniform => {
                if lower > upper {
                    return Err(SimError(format!(
                        "Lower limit {lower} above upper limit {upper}"
                    )));
                }
                let choices = upper - lower + 1;
                if frames_per_input > choices {
                    return Err(SimError(format!(
                        "Cannot pick {frames_per_input} distinct lengths from [{lower}, {upper}]"
                    )));
                }
                index::sample(rng, choices, frames_per_input)
                    .into_iter()
                    .map(|i| lower + i)
                    .collect()
            }
        };
        if lengths.contains(&0) {
            return Err(SimError("Frame length must be at least 1 byte".to_string()));
        }

        let mut entries = Vec::with_capacity(radix * lengths.len());
        for input in 0..radix {
            for &length in &lengths {
                entries.push(ProfileEntry {
                    input,
                    output: rng.gen_range(0..radix),
                    length,
                });
            }
        }

        Ok(Self {
            test: traffic_type.to_string(),
            radix,
            entries,
            length_limits,
        })
    }

    /// Parse the text of a profile.
    pub fn parse(text: &str) -> Result<Self, SimError> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

        let header = lines
            .next()
            .ok_or_else(|| SimError("Empty traffic profile".to_string()))?;
        let fields: Vec<&str> = header.split(',').collect();
        let (test, radix) = match fields.as_slice() {
            ["Test", test, "Radix", radix] => (test.to_string(), parse_field(radix, header)?),
            _ => {
                return Err(SimError(format!(
                    "Invalid traffic profile header '{header}'"
                )));
            }
        };
        if !(2..=MAX_RADIX).contains(&radix) {
            return Err(SimError(format!("Invalid radix {radix} in '{header}'")));
        }

        match lines.next() {
            Some(COLUMNS) => {}
            other => {
                return Err(SimError(format!(
                    "Expected '{COLUMNS}', found '{}'",
                    other.unwrap_or("")
                )));
            }
        }

        let mut entries = Vec::new();
        for line in lines {
            let fields: Vec<&str> = line.split(',').collect();
            let [input, output, length] = fields.as_slice() else {
                return Err(SimError(format!("Invalid traffic profile record '{line}'")));
            };
            let entry = ProfileEntry {
                input: parse_field(input, line)?,
                output: parse_field(output, line)?,
                length: parse_field(length, line)?,
            };
            if entry.input >= radix || entry.output >= radix || entry.length == 0 {
                return Err(SimError(format!(
                    "Record '{line}' invalid for a radix {radix} profile"
                )));
            }
            entries.push(entry);
        }

        let length_limits = length_range(&entries);
        Ok(Self {
            test,
            radix,
            entries,
            length_limits,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, SimError> {
        let text = fs::read_to_string(path)
            .map_err(|e| SimError(format!("Unable to read {}: {e}", path.display())))?;
        Self::parse(&text).map_err(|e| SimError(format!("{}: {}", path.display(), e.0)))
    }

    #[must_use]
    pub fn test(&self) -> &str {
        &self.test
    }

    #[must_use]
    pub fn radix(&self) -> usize {
        self.radix
    }

    #[must_use]
    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    /// Bounds of the frame lengths.
    ///
    /// For a parsed profile these are the shortest and longest frames.
    #[must_use]
    pub fn length_limits(&self) -> (usize, usize) {
        self.length_limits
    }

    /// Number of frames sent by the busiest input.
    #[must_use]
    pub fn frames_per_input(&self) -> usize {
        (0..self.radix)
            .map(|input| self.entries.iter().filter(|e| e.input == input).count())
            .max()
            .unwrap_or(0)
    }

    /// Name of the file the profile is saved as, for example
    /// `uniform-4x4-100-(64-1514).txt`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let (min, max) = self.length_limits;
        format!(
            "{}-{r}x{r}-{}-({min}-{max}).txt",
            self.test,
            self.frames_per_input(),
            r = self.radix
        )
    }

    /// Check that the profile was generated for a switch of `radix`.
    pub fn check_radix(&self, radix: usize, path: &Path) -> Result<(), SimError> {
        if self.radix != radix {
            return Err(SimError(format!(
                "Radix {radix} does not match radix {} in {} traffic profile",
                self.radix,
                path.display()
            )));
        }
        Ok(())
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "Test,{},Radix,{}", self.test, self.radix)?;
        writeln!(writer, "{COLUMNS}")?;
        for entry in &self.entries {
            writeln!(writer, "{},{},{}", entry.input, entry.output, entry.length)?;
        }
        Ok(())
    }

    /// Save the profile in `dir`, returning the path written.
    ///
    /// An existing profile with the same name is never replaced.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, SimError> {
        fs::create_dir_all(dir)
            .map_err(|e| SimError(format!("Unable to create {}: {e}", dir.display())))?;
        let path = dir.join(self.file_name());
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    SimError(format!("Configuration already exists: {}", path.display()))
                }
                _ => SimError(format!("Unable to create {}: {e}", path.display())),
            })?;

        let mut writer = BufWriter::new(file);
        self.write(&mut writer)
            .and_then(|()| writer.flush())
            .map_err(|e| SimError(format!("Unable to write {}: {e}", path.display())))?;
        Ok(path)
    }
}

fn length_range(entries: &[ProfileEntry]) -> (usize, usize) {
    let min = entries.iter().map(|e| e.length).min().unwrap_or(0);
    let max = entries.iter().map(|e| e.length).max().unwrap_or(0);
    (min, max)
}

fn parse_field(field: &str, line: &str) -> Result<usize, SimError> {
    field
        .trim()
        .parse()
        .map_err(|e| SimError(format!("Invalid value '{field}' in '{line}': {e}")))
}

/// Find the profile to replay.
///
/// Returns `name` within `dir` if it exists, otherwise the most recently
/// modified file in `dir`.
pub fn select_profile(dir: &Path, name: &str) -> Result<PathBuf, SimError> {
    let read_dir = fs::read_dir(dir).map_err(|e| {
        SimError(format!(
            "There is no traffic profile available in {}: {e}",
            dir.display()
        ))
    })?;

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for dir_entry in read_dir {
        let dir_entry =
            dir_entry.map_err(|e| SimError(format!("Unable to list {}: {e}", dir.display())))?;
        let path = dir_entry.path();
        if !path.is_file() {
            continue;
        }
        if dir_entry.file_name() == name {
            return Ok(path);
        }
        let modified = dir_entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| SimError(format!("Unable to stat {}: {e}", path.display())))?;
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    newest.map(|(_, path)| path).ok_or_else(|| {
        SimError(format!(
            "There is no traffic profile available in {}",
            dir.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use super::*;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(7)
    }

    #[test]
    fn fixed_lengths() {
        let profile = TrafficProfile::generate(&mut rng(), TrafficType::Min, 4, 10, 1, 1).unwrap();
        assert_eq!(profile.entries().len(), 40);
        assert!(profile.entries().iter().all(|e| e.length == 64 && e.output < 4));
        assert_eq!(profile.file_name(), "min-4x4-10-(64-64).txt");

        let profile =
            TrafficProfile::generate(&mut rng(), TrafficType::Custom, 2, 3, 100, 200).unwrap();
        assert_eq!(profile.file_name(), "custom-2x2-3-(100-100).txt");
    }

    #[test]
    fn uniform_lengths_distinct() {
        let profile =
            TrafficProfile::generate(&mut rng(), TrafficType::Uniform, 4, 50, 64, 127).unwrap();
        let mut lengths: Vec<usize> = profile
            .entries()
            .iter()
            .filter(|e| e.input == 0)
            .map(|e| e.length)
            .collect();
        lengths.sort_unstable();
        lengths.dedup();
        assert_eq!(lengths.len(), 50);
        assert_eq!(profile.file_name(), "uniform-4x4-50-(64-127).txt");
        assert!(lengths.iter().all(|l| (64..=127).contains(l)));

        // Each input sends the same lengths
        let input_3: Vec<usize> = profile
            .entries()
            .iter()
            .filter(|e| e.input == 3)
            .map(|e| e.length)
            .collect();
        let input_0: Vec<usize> = profile
            .entries()
            .iter()
            .filter(|e| e.input == 0)
            .map(|e| e.length)
            .collect();
        assert_eq!(input_0, input_3);
    }

    #[test]
    fn uniform_needs_enough_lengths() {
        assert!(TrafficProfile::generate(&mut rng(), TrafficType::Uniform, 4, 11, 10, 19).is_err());
        assert!(TrafficProfile::generate(&mut rng(), TrafficType::Uniform, 4, 10, 10, 19).is_ok());
        assert!(TrafficProfile::generate(&mut rng(), TrafficType::Uniform, 4, 1, 20, 19).is_err());
    }

    #[test]
    fn text_round_trip() {
        let profile = TrafficProfile::generate(&mut rng(), TrafficType::Max, 3, 4, 0, 0).unwrap();
        let mut text = Vec::new();
        profile.write(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.starts_with("Test,max,Radix,3\nInput,Output,Length\n0,"));
        assert_eq!(TrafficProfile::parse(&text).unwrap(), profile);
    }

    #[test]
    fn parse_errors() {
        assert!(TrafficProfile::parse("").is_err());
        assert!(TrafficProfile::parse("Test,min,Radix,x\nInput,Output,Length\n").is_err());
        assert!(TrafficProfile::parse("Test,min,Radix,4\nInput,Length\n").is_err());
        assert!(TrafficProfile::parse("Test,min,Radix,4\nInput,Output,Length\n4,0,64\n").is_err());
        assert!(TrafficProfile::parse("Test,min,Radix,4\nInput,Output,Length\n0,1\n").is_err());
        assert!(TrafficProfile::parse("Test,min,Radix,4\nInput,Output,Length\n0,1,0\n").is_err());

        let profile = TrafficProfile::parse("Test,mine,Radix,4\nInput,Output,Length\n3,2,9\n").unwrap();
        assert_eq!(profile.test(), "mine");
        assert_eq!(
            profile.entries(),
            &[ProfileEntry {
                input: 3,
                output: 2,
                length: 9
            }]
        );
    }

    #[test]
    fn radix_mismatch() {
        let profile = TrafficProfile::parse("Test,min,Radix,4\nInput,Output,Length\n").unwrap();
        assert!(profile.check_radix(4, Path::new("p.txt")).is_ok());
        let err = profile.check_radix(8, Path::new("p.txt")).unwrap_err();
        assert_eq!(err.0, "Radix 8 does not match radix 4 in p.txt traffic profile");
    }
}
