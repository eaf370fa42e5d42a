// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Configuration of a latency benchmark run.
//!
//! Every value can come from, in increasing priority:
//!  1. the built-in defaults,
//!  2. the `xbar.toml` file in the working directory,
//!  3. a TOML file named by `conf_file`,
//!  4. environment variables prefixed with `XBAR_`, for example
//!     `XBAR_RADIX=8`,
//!  5. the command line.
//!
//! For example, a configuration file could contain:
//! ```toml
//! architecture = "iq_voq"
//! radix = 8
//! bus_width_bits = 128
//! backpressure_pattern = "preset"
//! ```

use std::path::{Path, PathBuf};

use clap::Args;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use xbar_engine::types::SimError;
use xbar_switch::config::{Architecture, SwitchConfig};

use crate::profile::{NEWEST, PROFILES_DIR};
use crate::report::RESULTS_DIR;

/// Configuration file read from the working directory when present.
pub const DEFAULT_CONF_FILE: &str = "xbar.toml";

/// Prefix of the environment variables that set configuration values.
pub const ENV_PREFIX: &str = "XBAR_";

#[derive(Args, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Switch architecture to benchmark
    #[arg(value_enum)]
    pub architecture: Option<Architecture>,

    /// Radix of the switch
    #[arg(short = 'r', long)]
    pub radix: Option<usize>,

    /// Width of the data bus in bits
    #[arg(short = 'd', long)]
    pub bus_width_bits: Option<usize>,

    /// Traffic profile to replay, taken from the profile directory
    ///
    /// If there is no such file the newest profile is used.
    #[arg(short = 'f', long)]
    pub profile: Option<String>,

    /// Directory holding traffic profiles
    #[arg(long)]
    pub profiles_dir: Option<PathBuf>,

    /// Directory the latency report is written to
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Number of frames each switch queue can hold
    #[arg(long)]
    pub queue_depth: Option<usize>,

    /// Number of bits in the flow ID of a frame
    #[arg(long)]
    pub id_tag_width: Option<u32>,

    /// Number of bits in the priority class of a frame
    #[arg(long)]
    pub user_tag_width: Option<u32>,

    /// Number of bits in the destination mask of a frame, at least `radix`
    ///
    /// Defaults to the radix.
    #[arg(long)]
    pub destination_tag_width: Option<u32>,

    /// Allow frames to be sent to more than one output
    #[arg(long)]
    pub multicast_enabled: Option<bool>,

    /// Allow beats of different frames to be interleaved on an output
    #[arg(long)]
    pub frame_interleaving_enabled: Option<bool>,

    /// Frequency of the switch clock
    #[arg(long)]
    pub clock_mhz: Option<f64>,

    /// Idle ticks inserted by every input, for example `1,0,1,1,0`
    ///
    /// A `1` is an idle tick. Use `preset` to give each input a different
    /// built-in pattern.
    #[arg(long)]
    pub idle_pattern: Option<String>,

    /// Backpressure applied at every output, in the same format as
    /// `idle_pattern`
    #[arg(long)]
    pub backpressure_pattern: Option<String>,

    /// Number of ticks without progress that is reported as a deadlock, or 0
    /// for no limit
    #[arg(long)]
    pub stall_limit_ticks: Option<u64>,

    /// Path to additional configuration file
    ///
    /// This additional configuration file must contain TOML, and set values
    /// for fields of this struct.
    #[arg(long)]
    pub conf_file: Option<PathBuf>,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        let switch = SwitchConfig::default();
        Self {
            architecture: Some(switch.architecture),
            radix: Some(switch.radix),
            bus_width_bits: Some(switch.bus_width_bits),
            profile: Some(NEWEST.to_string()),
            profiles_dir: Some(PathBuf::from(PROFILES_DIR)),
            results_dir: Some(PathBuf::from(RESULTS_DIR)),
            queue_depth: Some(switch.queue_depth),
            id_tag_width: Some(switch.id_tag_width),
            user_tag_width: Some(switch.user_tag_width),
            destination_tag_width: None,
            multicast_enabled: Some(switch.multicast_enabled),
            frame_interleaving_enabled: Some(switch.frame_interleaving_enabled),
            clock_mhz: Some(switch.clock_mhz),
            idle_pattern: Some(String::new()),
            backpressure_pattern: Some(String::new()),
            stall_limit_ticks: Some(10_000),
            conf_file: Some(PathBuf::new()),
        }
    }
}

/// A [`LatencyConfig`] with every value resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct LatencySettings {
    pub switch: SwitchConfig,
    pub profile: String,
    pub profiles_dir: PathBuf,
    pub results_dir: PathBuf,
    pub idle_pattern: String,
    pub backpressure_pattern: String,
    pub stall_limit_ticks: Option<u64>,
}

impl LatencyConfig {
    /// Merge every configuration source, with `cli` taking priority.
    pub fn resolve(cli: Self, static_conf_file: &Path) -> Result<Self, SimError> {
        let config = Self::figment_to_config(static_conf_file, None)?.clap_merge(&cli);
        match config.conf_file.clone() {
            Some(extra) if !extra.as_os_str().is_empty() => {
                if !extra.is_file() {
                    return Err(SimError(format!(
                        "Configuration file {} not found",
                        extra.display()
                    )));
                }
                Ok(Self::figment_to_config(static_conf_file, Some(&extra))?.clap_merge(&cli))
            }
            _ => Ok(config),
        }
    }

    fn figment_to_config(
        static_conf_file: &Path,
        extra_conf_file: Option<&Path>,
    ) -> Result<Self, SimError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        figment = figment.merge(Toml::file(static_conf_file));
        if let Some(extra) = extra_conf_file {
            figment = figment.merge(Toml::file(extra));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));
        figment
            .extract()
            .map_err(|e| SimError(format!("Invalid configuration: {e}")))
    }

    /// Override values with those given on the command line.
    #[must_use]
    fn clap_merge(mut self, cli: &Self) -> Self {
        macro_rules! merge {
            ($($field:ident),+) => {
                $(
                    if cli.$field.is_some() {
                        self.$field = cli.$field.clone();
                    }
                )+
            };
        }
        merge!(
            architecture,
            radix,
            bus_width_bits,
            profile,
            profiles_dir,
            results_dir,
            queue_depth,
            id_tag_width,
            user_tag_width,
            destination_tag_width,
            multicast_enabled,
            frame_interleaving_enabled,
            clock_mhz,
            idle_pattern,
            backpressure_pattern,
            stall_limit_ticks,
            conf_file
        );
        self
    }

    /// Resolve every value and check that they describe a valid switch.
    pub fn settings(&self) -> Result<LatencySettings, SimError> {
        fn required<T: Clone>(value: &Option<T>, name: &str) -> Result<T, SimError> {
            value
                .clone()
                .ok_or_else(|| SimError(format!("No value for '{name}'")))
        }

        let radix = required(&self.radix, "radix")?;
        let mut switch = SwitchConfig::with_radix(radix);
        switch.architecture = required(&self.architecture, "architecture")?;
        switch.bus_width_bits = required(&self.bus_width_bits, "bus_width_bits")?;
        switch.queue_depth = required(&self.queue_depth, "queue_depth")?;
        switch.id_tag_width = required(&self.id_tag_width, "id_tag_width")?;
        switch.user_tag_width = required(&self.user_tag_width, "user_tag_width")?;
        if let Some(width) = self.destination_tag_width {
            switch.destination_tag_width = width;
        }
        switch.multicast_enabled = required(&self.multicast_enabled, "multicast_enabled")?;
        switch.frame_interleaving_enabled =
            required(&self.frame_interleaving_enabled, "frame_interleaving_enabled")?;
        switch.clock_mhz = required(&self.clock_mhz, "clock_mhz")?;
        switch.validate()?;

        Ok(LatencySettings {
            switch,
            profile: required(&self.profile, "profile")?,
            profiles_dir: required(&self.profiles_dir, "profiles_dir")?,
            results_dir: required(&self.results_dir, "results_dir")?,
            idle_pattern: required(&self.idle_pattern, "idle_pattern")?,
            backpressure_pattern: required(&self.backpressure_pattern, "backpressure_pattern")?,
            stall_limit_ticks: Some(required(&self.stall_limit_ticks, "stall_limit_ticks")?)
                .filter(|&ticks| ticks > 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> LatencyConfig {
        LatencyConfig {
            architecture: None,
            radix: None,
            bus_width_bits: None,
            profile: None,
            profiles_dir: None,
            results_dir: None,
            queue_depth: None,
            id_tag_width: None,
            user_tag_width: None,
            destination_tag_width: None,
            multicast_enabled: None,
            frame_interleaving_enabled: None,
            clock_mhz: None,
            idle_pattern: None,
            backpressure_pattern: None,
            stall_limit_ticks: None,
            conf_file: None,
        }
    }

    #[test]
    fn command_line_overrides() {
        let cli = LatencyConfig {
            radix: Some(8),
            architecture: Some(Architecture::Oq),
            ..empty()
        };
        let merged = LatencyConfig::default().clap_merge(&cli);
        assert_eq!(merged.radix, Some(8));
        assert_eq!(merged.architecture, Some(Architecture::Oq));
        assert_eq!(merged.bus_width_bits, Some(64));
    }

    #[test]
    fn defaults_resolve() {
        let settings = LatencyConfig::default().settings().unwrap();
        assert_eq!(settings.switch, SwitchConfig::default());
        assert_eq!(settings.profile, NEWEST);
        assert_eq!(settings.profiles_dir, Path::new(PROFILES_DIR));
        assert_eq!(settings.results_dir, Path::new(RESULTS_DIR));
    }

    #[test]
    fn missing_value_reported() {
        let config = LatencyConfig {
            radix: None,
            ..LatencyConfig::default()
        };
        assert_eq!(
            config.settings().unwrap_err().0,
            "No value for 'radix'".to_string()
        );
    }

    #[test]
    fn radix_sets_destination_width() {
        let config = LatencyConfig {
            radix: Some(16),
            ..LatencyConfig::default()
        };
        let settings = config.settings().unwrap();
        assert_eq!(settings.switch.destination_tag_width, 16);
    }

    #[test]
    fn destination_width_overrides_radix() {
        let config = LatencyConfig {
            destination_tag_width: Some(12),
            multicast_enabled: Some(true),
            ..LatencyConfig::default()
        };
        let settings = config.settings().unwrap();
        assert_eq!(settings.switch.destination_tag_width, 12);
        assert!(settings.switch.multicast_enabled);

        let narrow = LatencyConfig {
            radix: Some(8),
            destination_tag_width: Some(4),
            ..LatencyConfig::default()
        };
        assert!(narrow.settings().is_err());
    }

    #[test]
    fn zero_stall_limit_disables_detection() {
        let config = LatencyConfig {
            stall_limit_ticks: Some(0),
            ..LatencyConfig::default()
        };
        assert_eq!(config.settings().unwrap().stall_limit_ticks, None);
        assert_eq!(
            LatencyConfig::default().settings().unwrap().stall_limit_ticks,
            Some(10_000)
        );
    }

    #[test]
    fn invalid_switch_rejected() {
        let config = LatencyConfig {
            bus_width_bits: Some(12),
            ..LatencyConfig::default()
        };
        assert!(config.settings().is_err());
    }
}
