// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! These tests change environment variables so must not run in parallel.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use xbar_bench::config::LatencyConfig;
use xbar_switch::config::Architecture;

fn no_options() -> LatencyConfig {
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

fn set_env(key: &str, value: &str) {
    // SAFETY: tests touching the environment are serialised
    unsafe { std::env::set_var(key, value) };
}

fn remove_env(key: &str) {
    // SAFETY: tests touching the environment are serialised
    unsafe { std::env::remove_var(key) };
}

#[test]
#[serial]
fn defaults_without_sources() {
    let dir = tempfile::tempdir().unwrap();
    let config = LatencyConfig::resolve(no_options(), &dir.path().join("xbar.toml")).unwrap();
    assert_eq!(config, LatencyConfig::default());
}

#[test]
#[serial]
fn sources_layered_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let conf_file = dir.path().join("xbar.toml");
    fs::write(
        &conf_file,
        "radix = 8\narchitecture = \"iq_voq\"\nbus_width_bits = 32\nqueue_depth = 3\n",
    )
    .unwrap();
    set_env("XBAR_BUS_WIDTH_BITS", "128");
    set_env("XBAR_QUEUE_DEPTH", "5");

    let cli = LatencyConfig {
        queue_depth: Some(7),
        ..no_options()
    };
    let config = LatencyConfig::resolve(cli, &conf_file);
    remove_env("XBAR_BUS_WIDTH_BITS");
    remove_env("XBAR_QUEUE_DEPTH");

    let settings = config.unwrap().settings().unwrap();
    assert_eq!(settings.switch.radix, 8);
    assert_eq!(settings.switch.architecture, Architecture::IqVoq);
    assert_eq!(settings.switch.bus_width_bits, 128);
    assert_eq!(settings.switch.queue_depth, 7);
    assert_eq!(settings.switch.destination_tag_width, 8);
}

#[test]
#[serial]
fn switch_options_from_file_and_env() {
    let dir = tempfile::tempdir().unwrap();
    let conf_file = dir.path().join("xbar.toml");
    fs::write(
        &conf_file,
        "destination_tag_width = 8\nmulticast_enabled = true\n",
    )
    .unwrap();
    set_env("XBAR_FRAME_INTERLEAVING_ENABLED", "true");

    let config = LatencyConfig::resolve(no_options(), &conf_file);
    remove_env("XBAR_FRAME_INTERLEAVING_ENABLED");

    let settings = config.unwrap().settings().unwrap();
    assert_eq!(settings.switch.radix, 4);
    assert_eq!(settings.switch.destination_tag_width, 8);
    assert!(settings.switch.multicast_enabled);
    assert!(settings.switch.frame_interleaving_enabled);
}

#[test]
#[serial]
fn extra_conf_file() {
    let dir = tempfile::tempdir().unwrap();
    let static_file = dir.path().join("xbar.toml");
    fs::write(&static_file, "radix = 8\nidle_pattern = \"1,0\"\n").unwrap();
    let extra_file = dir.path().join("extra.toml");
    fs::write(
        &extra_file,
        "idle_pattern = \"preset\"\nresults_dir = \"out\"\n",
    )
    .unwrap();

    let cli = LatencyConfig {
        architecture: Some(Architecture::Oq),
        conf_file: Some(extra_file.clone()),
        ..no_options()
    };
    let settings = LatencyConfig::resolve(cli, &static_file)
        .unwrap()
        .settings()
        .unwrap();
    assert_eq!(settings.switch.radix, 8);
    assert_eq!(settings.switch.architecture, Architecture::Oq);
    assert_eq!(settings.idle_pattern, "preset");
    assert_eq!(settings.results_dir, PathBuf::from("out"));
}

#[test]
#[serial]
fn missing_extra_conf_file() {
    let cli = LatencyConfig {
        conf_file: Some(PathBuf::from("does/not/exist.toml")),
        ..no_options()
    };
    assert!(LatencyConfig::resolve(cli, Path::new("does/not/exist/xbar.toml")).is_err());
}

#[test]
#[serial]
fn invalid_value_reported() {
    let dir = tempfile::tempdir().unwrap();
    let conf_file = dir.path().join("xbar.toml");
    fs::write(&conf_file, "architecture = \"crossbar\"\n").unwrap();
    assert!(LatencyConfig::resolve(no_options(), &conf_file).is_err());
}
