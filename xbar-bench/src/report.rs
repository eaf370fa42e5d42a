// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Latency reports.
//!
//! The report lists one row per frame, sorted by tag:
//!
//! ```txt
//! Architecture,iq_voq,TrafficProfile,traffic/profiles/min-4x4-100-(64-64).txt
//! Input,Output,StartTime,EndTime,DiffTime,ID
//! 0,2,1,18,17,1
//! ...
//! ```
//!
//! Times are whole ns, truncated. The start time is when the first beat of the frame was
//! accepted by the switch and the end time when its last beat was accepted
//! at the output.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use byte_unit::{Byte, UnitType};
use xbar_engine::types::SimError;
use xbar_switch::config::Architecture;

/// Directory that reports are written to by default.
pub const RESULTS_DIR: &str = "latency/results";

/// Timing of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct LatencyRecord {
    pub input: usize,
    pub output: usize,
    pub start_ns: f64,
    pub end_ns: f64,

    /// Flow ID of the frame.
    pub tag: u64,
}

impl LatencyRecord {
    #[must_use]
    pub fn latency_ns(&self) -> f64 {
        self.end_ns - self.start_ns
    }
}

/// Totals over a benchmark run.
#[derive(Clone, Debug, PartialEq)]
pub struct LatencySummary {
    pub frames: usize,
    pub ticks: u64,
    pub duration_ns: f64,
    pub total_bytes: usize,
    pub mean_latency_ns: f64,
    pub max_latency_ns: f64,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = Byte::from_u64(self.total_bytes as u64).get_appropriate_unit(UnitType::Binary);
        writeln!(
            f,
            "{} frames ({bytes}) in {} ticks ({}ns)",
            self.frames, self.ticks, self.duration_ns
        )?;
        if self.duration_ns > 0.0 {
            let per_second = self.total_bytes as f64 * 1e9 / self.duration_ns;
            if let Some(rate) = Byte::from_f64(per_second) {
                writeln!(
                    f,
                    "Throughput {}/s",
                    rate.get_appropriate_unit(UnitType::Binary)
                )?;
            }
        }
        write!(
            f,
            "Latency mean {:.2}ns, max {}ns",
            self.mean_latency_ns, self.max_latency_ns
        )
    }
}

/// Results of a benchmark run.
#[derive(Clone, Debug)]
pub struct LatencyResults {
    architecture: Architecture,
    bus_width_bits: usize,
    records: Vec<LatencyRecord>,
    ticks: u64,
    duration_ns: f64,
    total_bytes: usize,
}

impl LatencyResults {
    #[must_use]
    pub fn new(
        architecture: Architecture,
        bus_width_bits: usize,
        records: Vec<LatencyRecord>,
        ticks: u64,
        duration_ns: f64,
        total_bytes: usize,
    ) -> Self {
        Self {
            architecture,
            bus_width_bits,
            records,
            ticks,
            duration_ns,
            total_bytes,
        }
    }

    #[must_use]
    pub fn records(&self) -> &[LatencyRecord] {
        &self.records
    }

    #[must_use]
    pub fn summary(&self) -> LatencySummary {
        let latencies = self.records.iter().map(LatencyRecord::latency_ns);
        let max_latency_ns = latencies.clone().fold(0.0, f64::max);
        let mean_latency_ns = if self.records.is_empty() {
            0.0
        } else {
            latencies.sum::<f64>() / self.records.len() as f64
        };
        LatencySummary {
            frames: self.records.len(),
            ticks: self.ticks,
            duration_ns: self.duration_ns,
            total_bytes: self.total_bytes,
            mean_latency_ns,
            max_latency_ns,
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W, profile_path: &Path) -> io::Result<()> {
        writeln!(
            writer,
            "Architecture,{},TrafficProfile,{}",
            self.architecture,
            profile_path.display()
        )?;
        writeln!(writer, "Input,Output,StartTime,EndTime,DiffTime,ID")?;
        for r in &self.records {
            writeln!(
                writer,
                "{},{},{},{},{},{}",
                r.input,
                r.output,
                r.start_ns.trunc() as u64,
                r.end_ns.trunc() as u64,
                r.latency_ns().trunc() as u64,
                r.tag
            )?;
        }
        Ok(())
    }

    /// Save the report in `results_dir`, returning the path written.
    pub fn save(&self, profile_path: &Path, results_dir: &Path) -> Result<PathBuf, SimError> {
        let path = report_path(
            results_dir,
            self.architecture,
            self.bus_width_bits,
            profile_path,
        )?;
        fs::create_dir_all(results_dir)
            .map_err(|e| SimError(format!("Unable to create {}: {e}", results_dir.display())))?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    SimError(format!("Results already exist: {}", path.display()))
                }
                _ => SimError(format!("Unable to create {}: {e}", path.display())),
            })?;

        let mut writer = BufWriter::new(file);
        self.write(&mut writer, profile_path)
            .and_then(|()| writer.flush())
            .map_err(|e| SimError(format!("Unable to write {}: {e}", path.display())))?;
        Ok(path)
    }
}

/// Path of the report for replaying `profile_path`, for example
/// `latency/results/iq-64-min-4x4-100-(64-64).txt`.
pub fn report_path(
    results_dir: &Path,
    architecture: Architecture,
    bus_width_bits: usize,
    profile_path: &Path,
) -> Result<PathBuf, SimError> {
    let Some(profile_name) = profile_path.file_name() else {
        return Err(SimError(format!(
            "No file name in profile path {}",
            profile_path.display()
        )));
    };
    Ok(results_dir.join(format!(
        "{architecture}-{bus_width_bits}-{}",
        profile_name.to_string_lossy()
    )))
}
