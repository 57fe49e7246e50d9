//! Point-to-point device demo
//!
//! Runs the rendezvous, cancellation and truncation scenarios between two
//! ranks on an in-process fabric and prints each outcome.
//!
//! Usage:
//!   device-demo --scenario all
//!   device-demo --scenario rendezvous --log-level debug
//!   device-demo --config device.toml --json-logs

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use codec::Datatype;
use device::{Device, DeviceBuilder};
use device_config::DeviceConfig;
use network::{Fabric, Transport};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::info;
use types::{Status, ANY_TAG};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Synchronous send completes only after the receiver matched
    Rendezvous,
    /// Send cancelled before the peer posts a receive
    CancelEarly,
    /// Cancel arrives after the peer matched
    CancelLate,
    /// Receive buffer smaller than the message
    Truncate,
    All,
}

#[derive(Parser, Debug)]
#[command(name = "device-demo")]
#[command(about = "Point-to-point device protocol scenarios")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,

    #[arg(short, long, value_enum, default_value = "all")]
    scenario: Scenario,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = DeviceConfig::load(args.config.as_deref())?;
    init_logging(&args, &config);

    let scenarios = match args.scenario {
        Scenario::All => vec![
            Scenario::Rendezvous,
            Scenario::CancelEarly,
            Scenario::CancelLate,
            Scenario::Truncate,
        ],
        one => vec![one],
    };

    for scenario in scenarios {
        let ranks = open_ranks(&config)?;
        let outcome = match scenario {
            Scenario::Rendezvous => rendezvous(ranks)?,
            Scenario::CancelEarly => cancel_early(&ranks)?,
            Scenario::CancelLate => cancel_late(&ranks)?,
            Scenario::Truncate => truncate(&ranks)?,
            Scenario::All => continue,
        };
        println!("{}", json!({ "scenario": format!("{:?}", scenario), "outcome": outcome }));
    }
    Ok(())
}

fn init_logging(args: &Args, config: &DeviceConfig) {
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if args.json_logs || config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn open_ranks(config: &DeviceConfig) -> Result<Vec<Device>> {
    let fabric = Fabric::new();
    let sockets = fabric.open_many(2);
    let endpoints: Vec<_> = sockets.iter().map(|s| s.local_endpoint()).collect();
    sockets
        .into_iter()
        .map(|socket| {
            DeviceBuilder::new(socket, endpoints.clone())
                .config(config.clone())
                .init()
                .context("Failed to initialize device")
        })
        .collect()
}

fn rendezvous(mut ranks: Vec<Device>) -> Result<serde_json::Value> {
    let receiver = Arc::new(ranks.pop().context("missing rank 1")?);
    let sender = ranks.pop().context("missing rank 0")?;
    let byte = Datatype::byte();

    let handle = sender.issend(b"rendezvous", 10, &byte, 1, 5, sender.world())?;
    let recv_rank = receiver.clone();
    let recv_thread = thread::spawn(move || {
        let byte = Datatype::byte();
        recv_rank.recv(vec![0; 16], 16, &byte, 0, ANY_TAG, recv_rank.world())
    });

    let sent = sender.wait(handle)?;
    let received = recv_thread
        .join()
        .map_err(|_| anyhow::anyhow!("receiver thread panicked"))??;
    ensure!(received.status.tag == 5, "wildcard receive resolved wrong tag");
    info!(tag = received.status.tag, "synchronous send acknowledged");
    Ok(json!({ "sender": sent.status, "receiver": received.status }))
}

fn cancel_early(ranks: &[Device]) -> Result<serde_json::Value> {
    let (sender, receiver) = (&ranks[0], &ranks[1]);
    let byte = Datatype::byte();

    let handle = sender.isend(b"retract me", 10, &byte, 1, 9, sender.world())?;
    sender.cancel(handle)?;
    receiver.progress();
    let sent = sender.wait(handle)?;
    let probed = receiver.iprobe(0, 9, receiver.world())?;
    Ok(json!({ "sender": sent.status, "receiver_probe_found": probed.is_some() }))
}

fn cancel_late(ranks: &[Device]) -> Result<serde_json::Value> {
    let (sender, receiver) = (&ranks[0], &ranks[1]);
    let byte = Datatype::byte();

    let handle = sender.isend(b"too late", 8, &byte, 1, 3, sender.world())?;
    let received = receiver.recv(vec![0; 8], 8, &byte, 0, 3, receiver.world())?;
    sender.cancel(handle)?;
    receiver.progress();
    let sent = sender.wait(handle)?;
    Ok(json!({ "sender": sent.status, "receiver": received.status }))
}

fn truncate(ranks: &[Device]) -> Result<serde_json::Value> {
    let (sender, receiver) = (&ranks[0], &ranks[1]);
    let byte = Datatype::byte();

    sender.send(b"0123456789", 10, &byte, 1, 1, sender.world())?;
    let received = receiver.recv(vec![0; 4], 4, &byte, 0, 1, receiver.world())?;
    let status: Status = received.status;
    ensure!(status.count == 4, "truncated count should equal the buffer capacity");
    Ok(json!({ "receiver": status }))
}
