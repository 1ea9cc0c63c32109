use std::time::Duration;

use evsim::{Key, Simulation};
use serde::Serialize;

use crate::{
    AccessPointMac, AddressPool, ClientConfig, ClientEvent, ClientStats, ConfigError,
    DeliveryOracle, DeviceId, Mac, MacEvent, Network, Position, SimulationConfig, Ssid,
    StationMac, ThroughputSample, UdpClient, UdpServer, WifiMac,
};

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Packets generated by the client.
    pub packets_sent: u64,
    /// Packets counted by the server.
    pub packets_received: u64,
    /// Payload bytes counted by the server.
    pub bytes_received: u64,
    /// Gaps in the sequence numbers seen by the server, up to the highest one received.
    pub packets_lost: u64,
    /// Data frames that reached the station before it was associated.
    pub pre_association_losses: u64,
    /// Packets dropped because the access point's transmit queue was full.
    pub queue_drops: u64,
    /// Data frames not delivered by the channel.
    pub channel_losses: u64,
    /// Data frames addressed to an unknown address.
    pub unroutable_frames: u64,
    /// Beacons broadcast by the access point.
    pub beacons_sent: u64,
    /// When the station associated, if it did.
    pub associated_at: Option<Duration>,
    /// Window over which the throughput is computed.
    pub measurement_window: Duration,
    /// Application-level throughput in Mbit/s.
    pub throughput_mbps: f64,
}

/// A cell with one access point and one station, fully set up and ready to run.
///
/// The station is created first, at `(distance, 0, 0)`, and gets the first address of the
/// network; the access point sits at the origin and gets the second one. The client runs on the
/// access point and sends to the station from `client_start` until the end of the measurement
/// window.
pub struct Scenario {
    sim: Simulation,
    config: SimulationConfig,
    network: Key<Network>,
    server: Key<UdpServer>,
    client_stats: Key<ClientStats>,
    station: DeviceId,
}

impl Scenario {
    /// Validates `config` and sets up a scenario with the channel it describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let channel = config.channel.build()?;
        Self::with_oracle(config, channel)
    }

    /// Sets up a scenario using the given delivery oracle instead of the configured channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_oracle(
        config: SimulationConfig,
        oracle: Box<dyn DeliveryOracle>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let ssid = Ssid::new(config.ssid.as_str())?;
        let mut sim = Simulation::default();

        let mut network = Network::new(
            oracle,
            AddressPool::new(config.network, config.prefix_len)?,
        );
        let station = network.add_device(
            Position::new(config.distance, 0.0, 0.0),
            Mac::Station(StationMac::new(ssid.clone())),
        );
        let access_point = network.add_device(
            Position::default(),
            Mac::AccessPoint(AccessPointMac::new(ssid, config.beacon_interval)),
        );
        let station_address = network.assign_address(station)?;
        let access_point_address = network.assign_address(access_point)?;
        log::info!(
            "Station {} at {} m has address {}, access point {} has address {}",
            station,
            config.distance,
            station_address,
            access_point,
            access_point_address
        );

        let network = sim.insert(network);
        let server = sim.insert(UdpServer::default());
        let client_stats = sim.insert(ClientStats::default());
        let tx_queue = sim.add_bounded_queue(config.mac_queue_capacity);

        let station_mac = sim.add_component(WifiMac::new(station, network).with_sink(server));
        let access_point_mac = sim.add_component(
            WifiMac::new(access_point, network)
                .with_tx_queue(tx_queue)
                .with_data_rate(config.data_rate_mbps),
        );
        {
            let network = sim
                .state
                .get_mut(network)
                .expect("Network not found in state");
            network.attach(station, station_mac);
            network.attach(access_point, access_point_mac);
        }

        let destination = sim
            .state
            .get(network)
            .expect("Network not found in state")
            .address_of(station)?;
        let client = sim.add_component(UdpClient::new(
            ClientConfig {
                destination,
                max_packets: config.max_packets,
                interval: config.interval,
                payload_size: config.payload_size,
            },
            access_point,
            access_point_mac,
            tx_queue,
            client_stats,
        )?);

        sim.schedule(Duration::default(), access_point_mac, MacEvent::Start);
        sim.schedule(Duration::default(), station_mac, MacEvent::Start);
        sim.schedule(config.client_start, client, ClientEvent::Start);
        if let Some(stop) = config.client_stop {
            if stop < config.stop_time() {
                sim.schedule(stop, client, ClientEvent::Stop);
            }
        }
        log::info!(
            "Client starts at {:?}, simulation stops at {:?}",
            config.client_start,
            config.stop_time()
        );

        Ok(Self {
            sim,
            config,
            network,
            server,
            client_stats,
            station,
        })
    }

    /// The configuration of this scenario.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Runs the simulation to the stop time and reports the results.
    #[must_use]
    pub fn run(self) -> RunReport {
        self.run_with(|_| {})
    }

    /// Same as [`Scenario::run`] but calls `on_step` with the current time after each event.
    pub fn run_with<F: FnMut(Duration)>(mut self, on_step: F) -> RunReport {
        let steps = self.sim.run_until_with(self.config.stop_time(), on_step);
        log::debug!("Processed {} events", steps);
        self.report()
    }

    fn report(&self) -> RunReport {
        let network = self
            .sim
            .state
            .get(self.network)
            .expect("Network not found in state");
        let station = network
            .device(self.station)
            .and_then(|device| device.as_station())
            .expect("Station not found in network");
        let client = self
            .sim
            .state
            .get(self.client_stats)
            .expect("Client stats not found in state");
        let server = self
            .sim
            .state
            .get(self.server)
            .expect("UDP server not found in state");
        let sample = ThroughputSample {
            received_count: server.received_count(),
            payload_size: self.config.payload_size,
            measurement_window: self.config.measurement_window(),
        };
        let stats = network.stats();
        RunReport {
            packets_sent: client.sent,
            packets_received: server.received_count(),
            bytes_received: server.bytes(),
            packets_lost: server.lost(),
            pre_association_losses: station.pre_association_losses(),
            queue_drops: client.queue_drops,
            channel_losses: stats.channel_losses,
            unroutable_frames: stats.unroutable_frames,
            beacons_sent: stats.beacons_sent,
            associated_at: station.associated_at(),
            measurement_window: sample.measurement_window,
            throughput_mbps: sample.mbps(),
        }
    }
}
