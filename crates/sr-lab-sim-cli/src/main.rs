use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use sr_lab_abstract::{ProtocolConfig, SimConfig};
use sr_lab_protocol::{sr_receiver, sr_sender};
use sr_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Selective-Repeat ARQ lab simulator")]
struct Args {
    /// Load a scenario from disk (ignores the channel/protocol flags below).
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Sender/receiver window size W; the sequence space is 2W.
    #[arg(long, default_value_t = 6)]
    window_size: u32,

    /// Retransmission timeout in ms.
    #[arg(long, default_value_t = 16)]
    timeout: u64,

    /// Probability that the channel loses a packet.
    #[arg(long, default_value_t = 0.1)]
    loss: f64,

    /// Probability that the channel corrupts a packet.
    #[arg(long, default_value_t = 0.1)]
    corrupt: f64,

    #[arg(long, default_value_t = 5)]
    min_latency: u64,
    #[arg(long, default_value_t = 5)]
    max_latency: u64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of application messages to generate.
    #[arg(long, default_value_t = 20)]
    messages: u32,

    /// Time between generated messages in ms.
    #[arg(long, default_value_t = 10)]
    interval: u64,

    /// Give up if the simulation clock passes this many ms.
    #[arg(long, default_value_t = scenario_runner::DEFAULT_MAX_DURATION_MS)]
    max_duration: u64,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("sr-lab-sim-cli starting…");

    let report = match &args.scenario {
        Some(path) => scenario_runner::run_scenario(path)?,
        None => run_default_sim(&args)?,
    };

    print_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn sim_config(&self) -> SimConfig {
        SimConfig {
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            min_latency: self.min_latency,
            max_latency: self.max_latency,
            seed: self.seed,
        }
    }

    fn protocol_config(&self) -> Result<ProtocolConfig> {
        ProtocolConfig::new(self.window_size, self.timeout).context("Invalid protocol options")
    }
}

fn run_default_sim(args: &Args) -> Result<SimulationReport> {
    let protocol = args.protocol_config()?;
    let mut sim = Simulator::new(
        args.sim_config(),
        sr_sender(protocol)?,
        sr_receiver(protocol)?,
    )
    .context("Invalid channel options")?;
    sim.schedule_message_stream(0, args.messages, args.interval);

    info!(
        "Starting headless simulation: {} messages, window {}, seq space {}",
        args.messages,
        protocol.window_size,
        protocol.seq_space()
    );
    sim.init();
    if !sim.run_until(args.max_duration) {
        anyhow::bail!("Simulation did not finish within {} ms", args.max_duration);
    }
    info!("Simulation complete.");
    Ok(sim.export_report())
}

fn print_summary(report: &SimulationReport) {
    println!("duration:          {} ms", report.duration_ms);
    println!(
        "messages:          {} accepted, {} rejected (window full)",
        report.accepted_sends.len(),
        report.rejected_sends
    );
    println!("delivered:         {}", report.delivered_data.len());
    println!(
        "in-order delivery: {}",
        if report.delivered_in_order() { "yes" } else { "NO" }
    );
    println!("sender packets:    {}", report.sender_packet_count);
    println!("retransmissions:   {}", report.retransmissions());
    println!("receiver ACKs:     {}", report.receiver_packet_count);
    println!(
        "duplicate ACKs:    {}",
        report.final_metric("sender.duplicate_acks")
    );
    println!(
        "corrupt dropped:   {} data, {} ACK",
        report.final_metric("receiver.corrupted"),
        report.final_metric("sender.corrupted_acks")
    );
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
