use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use evsim::ComponentId;
use serde::Serialize;

use crate::{
    AddressError, AddressPool, ConfigError, DeliveryOracle, Device, DeviceId, Mac, MacEvent,
    Position,
};

/// Counters of link-level events in the cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Beacons broadcast by access points.
    pub beacons_sent: u64,
    /// Data frames handed to the channel.
    pub frames_sent: u64,
    /// Data frames the channel did not deliver.
    pub channel_losses: u64,
    /// Data frames whose destination address does not belong to any device.
    pub unroutable_frames: u64,
}

/// All devices of the cell, the address table, and the shared channel.
///
/// The network lives in the simulation state and is shared by all MAC components.
pub struct Network {
    devices: Vec<Device>,
    macs: HashMap<DeviceId, ComponentId<MacEvent>>,
    addresses: AddressPool,
    channel: Box<dyn DeliveryOracle>,
    stats: LinkStats,
}

impl Network {
    /// Constructs an empty network communicating through `channel`.
    #[must_use]
    pub fn new(channel: Box<dyn DeliveryOracle>, addresses: AddressPool) -> Self {
        Self {
            devices: Vec::new(),
            macs: HashMap::new(),
            addresses,
            channel,
            stats: LinkStats::default(),
        }
    }

    /// Places a new device at `position` and returns its ID.
    pub fn add_device(&mut self, position: Position, mac: Mac) -> DeviceId {
        let id = DeviceId(self.devices.len());
        self.devices.push(Device::new(id, position, mac));
        id
    }

    /// Binds `device` to the MAC component processing its events.
    ///
    /// # Panics
    ///
    /// Panics if the device does not exist.
    pub fn attach(&mut self, device: DeviceId, mac: ComponentId<MacEvent>) {
        assert!(device.0 < self.devices.len(), "Invalid device ID");
        self.macs.insert(device, mac);
    }

    /// The MAC component of `device`, if one was attached.
    #[must_use]
    pub fn mac_of(&self, device: DeviceId) -> Option<ComponentId<MacEvent>> {
        self.macs.get(&device).copied()
    }

    /// Returns the device with the given ID.
    #[must_use]
    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.0)
    }

    /// Returns a mutable reference to the device with the given ID.
    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.devices.get_mut(id.0)
    }

    /// Iterates over all devices.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    /// Iterates over all station devices.
    pub fn stations(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.is_station())
    }

    /// Assigns the next free network address to `device`.
    ///
    /// # Errors
    ///
    /// See [`AddressPool::assign`].
    pub fn assign_address(&mut self, device: DeviceId) -> Result<Ipv4Addr, AddressError> {
        self.addresses.assign(device)
    }

    /// Returns the address of `device`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnassignedDevice`] if the device has no address yet.
    pub fn address_of(&self, device: DeviceId) -> Result<Ipv4Addr, ConfigError> {
        self.addresses
            .address_of(device)
            .ok_or(ConfigError::UnassignedDevice(device))
    }

    /// Finds the device holding `address`.
    #[must_use]
    pub fn resolve(&self, address: Ipv4Addr) -> Option<DeviceId> {
        self.addresses.device_for(address)
    }

    /// Asks the channel whether a frame sent now from `from` reaches `to`, and returns the delay
    /// after which it arrives. Arrival times before `send_time` are treated as instantaneous.
    ///
    /// # Panics
    ///
    /// Panics if any of the devices does not exist.
    #[must_use]
    pub fn transmit(&self, from: DeviceId, to: DeviceId, send_time: Duration) -> Option<Duration> {
        let sender = self.device(from).expect("Invalid sender ID");
        let receiver = self.device(to).expect("Invalid receiver ID");
        let distance = sender.distance(receiver);
        self.channel
            .deliver(sender, receiver, distance, send_time)
            .map(|arrival| arrival.checked_sub(send_time).unwrap_or_default())
    }

    /// Link-level counters.
    #[must_use]
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Mutable link-level counters.
    pub fn stats_mut(&mut self) -> &mut LinkStats {
        &mut self.stats
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{AccessPointMac, IdealChannel, RangeChannel, Ssid, StationMac};

    fn make_network(channel: Box<dyn DeliveryOracle>) -> (Network, DeviceId, DeviceId) {
        let ssid = Ssid::new("cell").unwrap();
        let mut network = Network::new(
            channel,
            AddressPool::new(Ipv4Addr::new(192, 168, 1, 0), 24).unwrap(),
        );
        let sta = network.add_device(
            Position::new(5.0, 0.0, 0.0),
            Mac::Station(StationMac::new(ssid.clone())),
        );
        let ap = network.add_device(
            Position::default(),
            Mac::AccessPoint(AccessPointMac::new(ssid, Duration::from_millis(100))),
        );
        (network, sta, ap)
    }

    #[test]
    fn test_devices() {
        let (network, sta, ap) = make_network(Box::new(IdealChannel::default()));
        assert_eq!(sta, DeviceId(0));
        assert_eq!(ap, DeviceId(1));
        assert_eq!(network.devices().count(), 2);
        let stations: Vec<_> = network.stations().map(Device::id).collect();
        assert_eq!(stations, vec![sta]);
        assert!(network.device(DeviceId(2)).is_none());
    }

    #[test]
    fn test_addresses() {
        let (mut network, sta, ap) = make_network(Box::new(IdealChannel::default()));
        assert_eq!(
            network.address_of(sta),
            Err(ConfigError::UnassignedDevice(sta))
        );
        assert_eq!(network.assign_address(sta), Ok(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(network.assign_address(ap), Ok(Ipv4Addr::new(192, 168, 1, 2)));
        assert_eq!(network.address_of(ap), Ok(Ipv4Addr::new(192, 168, 1, 2)));
        assert_eq!(network.resolve(Ipv4Addr::new(192, 168, 1, 1)), Some(sta));
        assert_eq!(network.resolve(Ipv4Addr::new(192, 168, 1, 9)), None);
    }

    #[test]
    fn test_transmit_returns_delay() {
        let (network, sta, ap) = make_network(Box::new(IdealChannel::new(Duration::from_micros(7))));
        assert_eq!(
            network.transmit(ap, sta, Duration::from_secs(3)),
            Some(Duration::from_micros(7))
        );
        let (network, sta, ap) = make_network(Box::new(RangeChannel::new(4.0)));
        assert_eq!(network.transmit(ap, sta, Duration::from_secs(3)), None);
    }
}
