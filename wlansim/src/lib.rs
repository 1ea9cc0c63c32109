//! Single-cell wireless network simulation.
//!
//! One access point and one station share a cell. The access point beacons periodically, the
//! station associates with the first access point advertising its network identifier, and a UDP
//! client attached to the access point streams packets to a UDP server on the station.
//! At the end of the run, the number of received packets is turned into throughput.
//!
//! Physical-layer effects are delegated to a [`DeliveryOracle`], which only decides whether and
//! when a frame arrives.
//!
//! ```
//! # use std::time::Duration;
//! # use wlansim::{ChannelConfig, Scenario, SimulationConfig};
//! let config = SimulationConfig {
//!     simulation_time: 1,
//!     interval: Duration::from_millis(1),
//!     client_start: Duration::from_millis(500),
//!     channel: ChannelConfig::Ideal { latency: Duration::default() },
//!     data_rate_mbps: None,
//!     ..SimulationConfig::default()
//! };
//! let report = Scenario::new(config).unwrap().run();
//! assert_eq!(report.packets_received, 1000);
//! ```

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

use std::net::Ipv4Addr;
use std::time::Duration;

use delegate::delegate;
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

mod address;
pub use address::{AddressError, AddressPool};

mod channel;
pub use channel::{ChannelKind, DeliveryOracle, IdealChannel, LossyChannel, RangeChannel};

mod config;
pub use config::{ChannelConfig, ConfigError, SimulationConfig};

mod device;
pub use device::{AccessPointMac, AccessPointState, Device, Mac, Position, StationMac, StationState};

mod mac;
pub use mac::{Event as MacEvent, WifiMac};

mod network;
pub use network::{LinkStats, Network};

mod scenario;
pub use scenario::{RunReport, Scenario};

mod throughput;
pub use throughput::{throughput_mbps, ThroughputSample};

mod traffic;
pub use traffic::{ClientConfig, ClientStats, Event as ClientEvent, UdpClient, UdpServer};

/// Device ID.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
)]
pub struct DeviceId(usize);

/// Network identifier advertised by access points and looked for by stations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub struct Ssid(String);

impl Ssid {
    /// Maximum length of an SSID in bytes.
    pub const MAX_LEN: usize = 32;

    /// Validates and wraps a network identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSsid`] if the identifier is empty or longer than
    /// [`Ssid::MAX_LEN`] bytes.
    pub fn new<S: Into<String>>(ssid: S) -> Result<Self, ConfigError> {
        let ssid = ssid.into();
        if ssid.is_empty() || ssid.len() > Self::MAX_LEN {
            Err(ConfigError::InvalidSsid(ssid))
        } else {
            Ok(Self(ssid))
        }
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A UDP datagram generated by the client. Immutable once created.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Packet {
    sequence_number: u32,
    payload_size: u32,
    origin_time: Duration,
}

impl Packet {
    /// Creates a packet generated at `origin_time`.
    #[must_use]
    pub fn new(sequence_number: u32, payload_size: u32, origin_time: Duration) -> Self {
        Self {
            sequence_number,
            payload_size,
            origin_time,
        }
    }

    /// Sequence number assigned by the client, starting from 0.
    #[must_use]
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        self.payload_size
    }

    /// The time of the simulation when the packet was generated.
    #[must_use]
    pub fn origin_time(&self) -> Duration {
        self.origin_time
    }
}

/// A packet waiting in a MAC transmit queue, addressed to a network address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Frame {
    source: DeviceId,
    destination: Ipv4Addr,
    packet: Packet,
}

impl Frame {
    /// Wraps `packet` sent from `source` to `destination`.
    #[must_use]
    pub fn new(source: DeviceId, destination: Ipv4Addr, packet: Packet) -> Self {
        Self {
            source,
            destination,
            packet,
        }
    }

    /// The sending device.
    #[must_use]
    pub fn source(&self) -> DeviceId {
        self.source
    }

    /// The address of the receiver.
    #[must_use]
    pub fn destination(&self) -> Ipv4Addr {
        self.destination
    }

    /// The carried packet.
    #[must_use]
    pub fn packet(&self) -> Packet {
        self.packet
    }

    delegate! {
        to self.packet {
            /// Sequence number assigned by the client.
            #[must_use]
            pub fn sequence_number(&self) -> u32;
            /// Payload size in bytes.
            #[must_use]
            pub fn payload_size(&self) -> u32;
            /// The time of the simulation when the packet was generated.
            #[must_use]
            pub fn origin_time(&self) -> Duration;
        }
    }
}
