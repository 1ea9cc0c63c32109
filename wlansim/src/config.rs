use std::net::Ipv4Addr;
use std::time::Duration;

use evsim::ScheduleError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    AddressError, ChannelKind, DeliveryOracle, DeviceId, IdealChannel, LossyChannel,
    RangeChannel, Ssid,
};

/// Largest UDP payload that fits in a single IPv4 datagram.
pub const MAX_PAYLOAD_SIZE: u32 = 65_507;

/// Errors detected while setting up a simulation. Once a simulation runs, it cannot fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Payload size out of range.
    #[error("payload size must be between 1 and {} bytes, got {0}", MAX_PAYLOAD_SIZE)]
    InvalidPayloadSize(u32),
    /// Zero-length measurement window, or one ending past the largest representable time.
    #[error("simulation time must be positive and end at a representable time")]
    InvalidSimulationTime,
    /// Negative or non-finite distance.
    #[error("distance must be a finite non-negative number of meters, got {0}")]
    InvalidDistance(f64),
    /// Zero packet interval.
    #[error("packet interval must be positive")]
    InvalidInterval,
    /// Zero beacon interval.
    #[error("beacon interval must be positive")]
    InvalidBeaconInterval,
    /// Empty or too long SSID.
    #[error("SSID must have between 1 and {} bytes, got {0:?}", Ssid::MAX_LEN)]
    InvalidSsid(String),
    /// Loss probability outside of `[0, 1]`.
    #[error("loss probability must be in [0, 1], got {0}")]
    InvalidLossProbability(f64),
    /// Non-positive or non-finite data rate.
    #[error("data rate must be a positive number of Mbit/s, got {0}")]
    InvalidDataRate(f64),
    /// Zero-capacity transmit queue.
    #[error("MAC queue capacity must be positive")]
    InvalidQueueCapacity,
    /// An address was requested for a device that has none.
    #[error("device {0} has no address assigned")]
    UnassignedDevice(DeviceId),
    /// Address assignment failed.
    #[error(transparent)]
    Address(#[from] AddressError),
    /// An event could not be scheduled.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Physical channel used by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// See [`IdealChannel`].
    Ideal {
        /// Constant delivery latency.
        latency: Duration,
    },
    /// See [`RangeChannel`].
    Range {
        /// Maximum distance in meters.
        max_range: f64,
    },
    /// See [`LossyChannel`].
    Lossy {
        /// Maximum distance in meters.
        max_range: f64,
        /// Probability of losing a frame.
        loss_probability: f64,
        /// Seed of the loss generator; drawn from entropy if missing.
        seed: Option<u64>,
    },
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::Range { max_range: 250.0 }
    }
}

impl ChannelConfig {
    /// Type of the configured channel.
    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Ideal { .. } => ChannelKind::Ideal,
            Self::Range { .. } => ChannelKind::Range,
            Self::Lossy { .. } => ChannelKind::Lossy,
        }
    }

    /// Constructs the delivery oracle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLossProbability`] for a lossy channel with an invalid
    /// probability.
    pub fn build(&self) -> Result<Box<dyn DeliveryOracle>, ConfigError> {
        Ok(match *self {
            Self::Ideal { latency } => Box::new(IdealChannel::new(latency)),
            Self::Range { max_range } => Box::new(RangeChannel::new(max_range)),
            Self::Lossy {
                max_range,
                loss_probability,
                seed,
            } => Box::new(LossyChannel::new(
                RangeChannel::new(max_range),
                loss_probability,
                seed,
            )?),
        })
    }
}

/// All parameters of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// UDP payload size in bytes.
    pub payload_size: u32,
    /// Length of the measurement window in seconds.
    pub simulation_time: u64,
    /// Distance between the access point and the station in meters.
    pub distance: f64,
    /// Time between two packets sent by the client.
    pub interval: Duration,
    /// Maximum number of packets the client sends.
    pub max_packets: u32,
    /// When the client starts sending.
    pub client_start: Duration,
    /// When the client stops sending. If missing, it runs until the end of the simulation.
    pub client_stop: Option<Duration>,
    /// Time between two beacons.
    pub beacon_interval: Duration,
    /// Network identifier shared by the access point and the station.
    pub ssid: String,
    /// Physical channel.
    pub channel: ChannelConfig,
    /// Data rate of the access point in Mbit/s. With `None`, frames take no airtime.
    pub data_rate_mbps: Option<f64>,
    /// Capacity of the access point's transmit queue in frames.
    pub mac_queue_capacity: usize,
    /// Network from which addresses are assigned.
    pub network: Ipv4Addr,
    /// Prefix length of the network.
    pub prefix_len: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            payload_size: 1472,
            simulation_time: 10,
            distance: 5.0,
            interval: Duration::from_micros(20),
            max_packets: u32::MAX,
            client_start: Duration::from_secs(1),
            client_stop: None,
            beacon_interval: Duration::from_micros(102_400),
            ssid: String::from("Exercise6"),
            channel: ChannelConfig::default(),
            data_rate_mbps: Some(65.0),
            mac_queue_capacity: 500,
            network: Ipv4Addr::new(192, 168, 1, 0),
            prefix_len: 24,
        }
    }
}

impl SimulationConfig {
    /// Checks all parameters, returning the first violation.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`] for the possible violations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payload_size == 0 || self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::InvalidPayloadSize(self.payload_size));
        }
        if self.simulation_time == 0
            || self
                .client_start
                .checked_add(self.measurement_window())
                .is_none()
        {
            return Err(ConfigError::InvalidSimulationTime);
        }
        if !self.distance.is_finite() || self.distance < 0.0 {
            return Err(ConfigError::InvalidDistance(self.distance));
        }
        if self.interval == Duration::default() {
            return Err(ConfigError::InvalidInterval);
        }
        if self.beacon_interval == Duration::default() {
            return Err(ConfigError::InvalidBeaconInterval);
        }
        Ssid::new(self.ssid.as_str())?;
        if let ChannelConfig::Lossy {
            loss_probability, ..
        } = self.channel
        {
            if !(0.0..=1.0).contains(&loss_probability) {
                return Err(ConfigError::InvalidLossProbability(loss_probability));
            }
        }
        if let Some(rate) = self.data_rate_mbps {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ConfigError::InvalidDataRate(rate));
            }
        }
        if self.mac_queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        Ok(())
    }

    /// Window over which throughput is measured. It does not include the client start offset.
    #[must_use]
    pub fn measurement_window(&self) -> Duration {
        Duration::from_secs(self.simulation_time)
    }

    /// Time at which the simulation stops.
    #[must_use]
    pub fn stop_time(&self) -> Duration {
        self.client_start + self.measurement_window()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    fn with<F: FnOnce(&mut SimulationConfig)>(f: F) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        f(&mut config);
        config
    }

    #[test]
    fn test_default_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.measurement_window(), Duration::from_secs(10));
        assert_eq!(config.stop_time(), Duration::from_secs(11));
        assert_eq!(config.channel.kind(), ChannelKind::Range);
    }

    #[rstest(
        config,
        expected,
        case(with(|c| c.payload_size = 0), ConfigError::InvalidPayloadSize(0)),
        case(with(|c| c.payload_size = 65_508), ConfigError::InvalidPayloadSize(65_508)),
        case(with(|c| c.simulation_time = 0), ConfigError::InvalidSimulationTime),
        case(with(|c| c.simulation_time = u64::MAX), ConfigError::InvalidSimulationTime),
        case(
            with(|c| c.client_start = Duration::MAX - Duration::from_secs(5)),
            ConfigError::InvalidSimulationTime
        ),
        case(with(|c| c.distance = -1.0), ConfigError::InvalidDistance(-1.0)),
        case(with(|c| c.interval = Duration::default()), ConfigError::InvalidInterval),
        case(with(|c| c.beacon_interval = Duration::default()), ConfigError::InvalidBeaconInterval),
        case(with(|c| c.ssid = String::new()), ConfigError::InvalidSsid(String::new())),
        case(with(|c| c.data_rate_mbps = Some(0.0)), ConfigError::InvalidDataRate(0.0)),
        case(with(|c| c.mac_queue_capacity = 0), ConfigError::InvalidQueueCapacity),
        case(
            with(|c| c.channel = ChannelConfig::Lossy { max_range: 10.0, loss_probability: 1.5, seed: None }),
            ConfigError::InvalidLossProbability(1.5)
        ),
    )]
    fn test_validation(config: SimulationConfig, expected: ConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }

    #[test]
    fn test_non_finite_distance() {
        let config = with(|c| c.distance = f64::INFINITY);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDistance(_))
        ));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SimulationConfig = serde_json::from_str(
            r#"{
                "payload_size": 1000,
                "interval": { "secs": 0, "nanos": 1000000 },
                "channel": { "kind": "lossy", "max_range": 100.0, "loss_probability": 0.1, "seed": 7 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.payload_size, 1000);
        assert_eq!(config.interval, Duration::from_millis(1));
        assert_eq!(config.simulation_time, 10);
        assert_eq!(config.ssid, "Exercise6");
        assert_eq!(
            config.channel,
            ChannelConfig::Lossy {
                max_range: 100.0,
                loss_probability: 0.1,
                seed: Some(7)
            }
        );
        assert!(config.channel.build().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let config = with(|c| c.channel = ChannelConfig::Ideal { latency: Duration::from_micros(5) });
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
