use anyhow::{Context, Result, anyhow};
use sr_lab_abstract::{ProtocolConfig, SimConfig, TestAction, TestAssertion, TestScenario};
use sr_lab_protocol::{sr_receiver, sr_sender};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

/// Time limit applied when a scenario has no `max_duration` assertion.
pub const DEFAULT_MAX_DURATION_MS: u64 = 100_000;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file {}", path.display()))
}

/// Build an SR sender/receiver pair and a simulator configured from the
/// scenario's overrides and actions. `init` has not been called yet.
pub fn build_simulator(scenario: &TestScenario) -> Result<Simulator> {
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);

    let mut protocol = ProtocolConfig::default();
    scenario.protocol.apply_to(&mut protocol);
    let sender = sr_sender(protocol).context("Invalid protocol configuration")?;
    let receiver = sr_receiver(protocol).context("Invalid protocol configuration")?;

    let mut sim =
        Simulator::new(config, sender, receiver).context("Invalid channel configuration")?;
    configure_actions(&mut sim, &scenario.actions);
    Ok(sim)
}

pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                sim.schedule_app_send(*time, data.as_bytes().to_vec());
            }
            TestAction::MessageStream {
                start,
                count,
                interval,
            } => {
                sim.schedule_message_stream(*start, *count, *interval);
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq);
            }
        }
    }
}

pub fn run_scenario(path: impl AsRef<Path>) -> Result<SimulationReport> {
    let scenario = load_scenario(path.as_ref())?;
    run(&scenario)
}

/// Run a parsed scenario to completion and evaluate its assertions.
pub fn run(scenario: &TestScenario) -> Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    if !scenario.description.is_empty() {
        info!("Description: {}", scenario.description);
    }

    let mut sim = build_simulator(scenario)?;
    sim.init();

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| match a {
            TestAssertion::MaxDuration { ms } => Some(*ms),
            _ => None,
        })
        .unwrap_or(DEFAULT_MAX_DURATION_MS);

    if !sim.run_until(max_duration) {
        return Err(anyhow!("Test timed out after {} ms", max_duration));
    }

    let report = sim.export_report();
    check_assertions(&scenario.assertions, &report)?;
    info!("Test Scenario Passed!");
    Ok(report)
}

fn check_range(what: &str, actual: u32, min: u32, max: Option<u32>) -> Result<()> {
    if actual < min {
        return Err(anyhow!(
            "Assertion Failed: {} was {}, expected min {}",
            what,
            actual,
            min
        ));
    }
    if let Some(max) = max
        && actual > max
    {
        return Err(anyhow!(
            "Assertion Failed: {} was {}, expected max {}",
            what,
            actual,
            max
        ));
    }
    Ok(())
}

pub fn check_assertions(assertions: &[TestAssertion], report: &SimulationReport) -> Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                let expected = sr_lab_abstract::packet::to_payload(data.as_bytes());
                if !report.delivered_data.iter().any(|d| d[..] == expected[..]) {
                    return Err(anyhow!(
                        "Assertion Failed: Data {:?} was not delivered",
                        data
                    ));
                }
            }
            TestAssertion::DeliveredCount { count } => {
                if report.delivered_data.len() != *count {
                    return Err(anyhow!(
                        "Assertion Failed: {} payloads delivered, expected {}",
                        report.delivered_data.len(),
                        count
                    ));
                }
            }
            TestAssertion::DeliveredInOrder => {
                if !report.delivered_in_order() {
                    return Err(anyhow!(
                        "Assertion Failed: delivered {} payloads, accepted {}; order or content differs",
                        report.delivered_data.len(),
                        report.accepted_sends.len()
                    ));
                }
            }
            TestAssertion::SenderPacketCount { min, max } => {
                check_range("sender packet count", report.sender_packet_count, *min, *max)?;
            }
            TestAssertion::Retransmissions { min, max } => {
                check_range("retransmissions", report.retransmissions(), *min, *max)?;
            }
            TestAssertion::RejectedSends { min, max } => {
                check_range("rejected sends", report.rejected_sends, *min, *max)?;
            }
            TestAssertion::MaxDuration { .. } => {} // Already checked
        }
    }
    Ok(())
}
