//! Runs every scenario bundled under `scenarios/`.

use sr_lab_simulator::scenario_runner;
use std::path::PathBuf;

fn scenario_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scenarios")
}

fn run(name: &str) {
    let path = scenario_dir().join(name);
    if let Err(err) = scenario_runner::run_scenario(&path) {
        panic!("{name}: {err:#}");
    }
}

#[test]
fn clean_channel() {
    run("sr_clean.toml");
}

#[test]
fn lost_packet() {
    run("sr_lost_packet.toml");
}

#[test]
fn lost_ack() {
    run("sr_lost_ack.toml");
}

#[test]
fn corrupted_packet() {
    run("sr_corrupted_packet.toml");
}

#[test]
fn window_full() {
    run("sr_window_full.toml");
}

#[test]
fn lossy_stream() {
    run("sr_lossy_stream.toml");
}

#[test]
fn missing_scenario_file_is_an_error() {
    let err = scenario_runner::run_scenario(scenario_dir().join("does_not_exist.toml"))
        .unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read scenario file"));
}
