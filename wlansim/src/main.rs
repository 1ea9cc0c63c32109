//! Single-cell wireless network simulation application.
#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::inline_always
)]

use std::convert::TryFrom;
use std::fs::File;
use std::io::BufReader;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;
use eyre::WrapErr;
use indicatif::{ProgressBar, ProgressStyle};

use wlansim::{ChannelConfig, ChannelKind, Scenario, SimulationConfig};

/// Simulates UDP traffic from an access point to a single associated station and reports the
/// application-level throughput.
#[derive(Parser)]
#[clap(version, author)]
struct Opt {
    /// UDP payload size in bytes.
    #[clap(long, default_value = "1472")]
    payload_size: u32,

    /// Length of the measurement window in seconds.
    #[clap(long, default_value = "10")]
    simulation_time: u64,

    /// Distance between the access point and the station in meters.
    #[clap(long, default_value = "5")]
    distance: f64,

    /// Time between two packets, e.g., `20us` or `1ms`.
    #[clap(long, default_value = "20us")]
    interval: humantime::Duration,

    /// Maximum number of packets sent by the client.
    #[clap(long, default_value = "4294967295")]
    max_packets: u32,

    /// When the client starts sending.
    #[clap(long, default_value = "1s")]
    client_start: humantime::Duration,

    /// When the client stops sending. Defaults to the end of the simulation.
    #[clap(long)]
    client_stop: Option<humantime::Duration>,

    /// Time between two beacons.
    #[clap(long, default_value = "102400us")]
    beacon_interval: humantime::Duration,

    /// Network identifier of the cell.
    #[clap(long, default_value = "Exercise6")]
    ssid: String,

    /// Channel model: `ideal`, `range`, or `lossy`.
    #[clap(long, default_value = "range")]
    channel: ChannelKind,

    /// Maximum distance in meters at which frames are delivered.
    #[clap(long, default_value = "250")]
    max_range: f64,

    /// Probability of losing a data frame or beacon, used by the `lossy` channel.
    #[clap(long, default_value = "0")]
    loss_probability: f64,

    /// Seed of the random generator used by the `lossy` channel.
    #[clap(long)]
    seed: Option<u64>,

    /// Data rate of the access point in Mbit/s.
    #[clap(long, default_value = "65")]
    data_rate: f64,

    /// Frames take no time on the air. Overrides `--data-rate`.
    #[clap(long)]
    zero_airtime: bool,

    /// Capacity of the access point's transmit queue.
    #[clap(long, default_value = "500")]
    mac_queue_capacity: usize,

    /// Network from which addresses are assigned.
    #[clap(long, default_value = "192.168.1.0")]
    network: Ipv4Addr,

    /// Prefix length of the network.
    #[clap(long, default_value = "24")]
    prefix_len: u8,

    /// JSON file with the simulation configuration. Replaces all scenario options above.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Write a JSON report of the run to this file.
    #[clap(long)]
    report: Option<PathBuf>,

    /// Verbosity.
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,

    /// Store the logs this file.
    #[clap(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[clap(long)]
    no_stderr: bool,
}

impl TryFrom<&Opt> for SimulationConfig {
    type Error = eyre::Report;

    fn try_from(opt: &Opt) -> Result<Self, Self::Error> {
        if let Some(path) = &opt.config {
            let file = File::open(path)
                .wrap_err_with(|| format!("unable to open config file: {}", path.display()))?;
            return serde_json::from_reader(BufReader::new(file))
                .wrap_err_with(|| format!("invalid config file: {}", path.display()));
        }
        let channel = match opt.channel {
            ChannelKind::Ideal => ChannelConfig::Ideal {
                latency: Default::default(),
            },
            ChannelKind::Range => ChannelConfig::Range {
                max_range: opt.max_range,
            },
            ChannelKind::Lossy => ChannelConfig::Lossy {
                max_range: opt.max_range,
                loss_probability: opt.loss_probability,
                seed: opt.seed,
            },
        };
        Ok(Self {
            payload_size: opt.payload_size,
            simulation_time: opt.simulation_time,
            distance: opt.distance,
            interval: opt.interval.into(),
            max_packets: opt.max_packets,
            client_start: opt.client_start.into(),
            client_stop: opt.client_stop.map(Into::into),
            beacon_interval: opt.beacon_interval.into(),
            ssid: opt.ssid.clone(),
            channel,
            data_rate_mbps: if opt.zero_airtime {
                None
            } else {
                Some(opt.data_rate)
            },
            mac_queue_capacity: opt.mac_queue_capacity,
            network: opt.network,
            prefix_len: opt.prefix_len,
        })
    }
}

/// Set up a logger based on the given user options.
fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let log_level = match opt.verbose {
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        3 => log::LevelFilter::Trace,
        _ => log::LevelFilter::Warn,
    };
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(log_level);
    let dispatch = if let Some(path) = &opt.log_output {
        let _ = std::fs::remove_file(path);
        dispatch.chain(
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .append(false)
                .open(path)?,
        )
    } else {
        dispatch
    };
    let dispatch = if opt.no_stderr {
        dispatch
    } else {
        dispatch.chain(std::io::stderr())
    };
    dispatch.apply()?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::parse();
    set_up_logger(&opt)?;
    let config = SimulationConfig::try_from(&opt)?;
    let scenario = Scenario::new(config).wrap_err("invalid simulation configuration")?;
    let stop_time = scenario.config().stop_time();

    let pb = ProgressBar::new(stop_time.as_secs())
        .with_style(ProgressStyle::default_bar().template("{msg} {wide_bar} {percent}%"));
    let report = scenario.run_with(|time| {
        let secs = time.as_secs();
        if pb.position() < secs {
            pb.set_position(secs);
            pb.set_message(&format!("[{}s]", secs));
        }
    });
    pb.finish_and_clear();

    if let Some(path) = &opt.report {
        let file = File::create(path)
            .wrap_err_with(|| format!("unable to create report file: {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report).wrap_err("unable to write report")?;
    }
    println!("Throughput: {} Mbps", report.throughput_mbps);
    Ok(())
}
