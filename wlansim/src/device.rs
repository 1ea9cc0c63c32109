use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DeviceId, Ssid};

/// Coordinates in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// Constructs a position from its coordinates.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other` in meters.
    #[must_use]
    pub fn distance(&self, other: &Position) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Association state of a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StationState {
    /// Not started yet.
    Unassociated,
    /// Started and listening for beacons.
    Scanning,
    /// Bound to an access point. Final state.
    Associated,
}

/// State of an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessPointState {
    /// Not started yet.
    Idle,
    /// Broadcasting beacons periodically. Final state.
    Beaconing,
}

/// Station side of the association state machine.
///
/// A station associates with the first access point whose beacon advertises the station's
/// target SSID. There is no probe, authentication, or association request exchange.
#[derive(Debug, Clone)]
pub struct StationMac {
    ssid: Ssid,
    state: StationState,
    access_point: Option<DeviceId>,
    access_point_address: Option<Ipv4Addr>,
    associated_at: Option<Duration>,
    pre_association_losses: u64,
}

impl StationMac {
    /// Creates an unassociated station looking for `ssid`.
    #[must_use]
    pub fn new(ssid: Ssid) -> Self {
        Self {
            ssid,
            state: StationState::Unassociated,
            access_point: None,
            access_point_address: None,
            associated_at: None,
            pre_association_losses: 0,
        }
    }

    /// Moves an unassociated station to scanning. Has no effect in any other state.
    pub fn start_scanning(&mut self) {
        if self.state == StationState::Unassociated {
            self.state = StationState::Scanning;
        }
    }

    /// Handles a beacon sent by `access_point` advertising `ssid`.
    /// Returns `true` if the station has just become associated.
    pub fn on_beacon(
        &mut self,
        access_point: DeviceId,
        access_point_address: Option<Ipv4Addr>,
        ssid: &Ssid,
        time: Duration,
    ) -> bool {
        if self.state == StationState::Associated || *ssid != self.ssid {
            return false;
        }
        self.state = StationState::Associated;
        self.access_point = Some(access_point);
        self.access_point_address = access_point_address;
        self.associated_at = Some(time);
        true
    }

    /// Decides whether an incoming data frame is accepted. Frames arriving before association
    /// are rejected and counted as pre-association losses.
    pub fn accept_data(&mut self) -> bool {
        if self.is_associated() {
            true
        } else {
            self.pre_association_losses += 1;
            false
        }
    }

    /// Target SSID.
    #[must_use]
    pub fn ssid(&self) -> &Ssid {
        &self.ssid
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StationState {
        self.state
    }

    /// Checks if the station is associated.
    #[must_use]
    pub fn is_associated(&self) -> bool {
        self.state == StationState::Associated
    }

    /// The access point the station is associated with.
    #[must_use]
    pub fn access_point(&self) -> Option<DeviceId> {
        self.access_point
    }

    /// Address of the access point the station is associated with, if it had one.
    #[must_use]
    pub fn access_point_address(&self) -> Option<Ipv4Addr> {
        self.access_point_address
    }

    /// The time of the simulation when the station associated.
    #[must_use]
    pub fn associated_at(&self) -> Option<Duration> {
        self.associated_at
    }

    /// Number of data frames dropped because they arrived before association.
    #[must_use]
    pub fn pre_association_losses(&self) -> u64 {
        self.pre_association_losses
    }
}

/// Access point side of the association state machine.
#[derive(Debug, Clone)]
pub struct AccessPointMac {
    ssid: Ssid,
    state: AccessPointState,
    beacon_interval: Duration,
    beacons_sent: u64,
}

impl AccessPointMac {
    /// Creates an idle access point advertising `ssid` every `beacon_interval`.
    #[must_use]
    pub fn new(ssid: Ssid, beacon_interval: Duration) -> Self {
        Self {
            ssid,
            state: AccessPointState::Idle,
            beacon_interval,
            beacons_sent: 0,
        }
    }

    /// Starts beaconing. Returns `false` if the access point was already started.
    pub fn start(&mut self) -> bool {
        let idle = self.state == AccessPointState::Idle;
        self.state = AccessPointState::Beaconing;
        idle
    }

    /// Records a broadcast beacon and returns the advertised SSID.
    pub fn beacon(&mut self) -> &Ssid {
        self.beacons_sent += 1;
        &self.ssid
    }

    /// Advertised SSID.
    #[must_use]
    pub fn ssid(&self) -> &Ssid {
        &self.ssid
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AccessPointState {
        self.state
    }

    /// Time between consecutive beacons.
    #[must_use]
    pub fn beacon_interval(&self) -> Duration {
        self.beacon_interval
    }

    /// Number of beacons broadcast so far.
    #[must_use]
    pub fn beacons_sent(&self) -> u64 {
        self.beacons_sent
    }
}

/// Role-specific MAC state of a device.
#[derive(Debug, Clone)]
pub enum Mac {
    /// See [`StationMac`].
    Station(StationMac),
    /// See [`AccessPointMac`].
    AccessPoint(AccessPointMac),
}

/// A wireless device placed in the cell.
#[derive(Debug, Clone)]
pub struct Device {
    id: DeviceId,
    position: Position,
    mac: Mac,
}

impl Device {
    /// Constructs a device.
    #[must_use]
    pub fn new(id: DeviceId, position: Position, mac: Mac) -> Self {
        Self { id, position, mac }
    }

    /// Device ID.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Position in the cell.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Distance to `other` in meters.
    #[must_use]
    pub fn distance(&self, other: &Device) -> f64 {
        self.position.distance(&other.position)
    }

    /// Role-specific state.
    #[must_use]
    pub fn mac(&self) -> &Mac {
        &self.mac
    }

    /// Mutable role-specific state.
    pub fn mac_mut(&mut self) -> &mut Mac {
        &mut self.mac
    }

    /// Checks if the device is a station.
    #[must_use]
    pub fn is_station(&self) -> bool {
        matches!(self.mac, Mac::Station(_))
    }

    /// Returns the station state, or `None` for other roles.
    #[must_use]
    pub fn as_station(&self) -> Option<&StationMac> {
        match &self.mac {
            Mac::Station(station) => Some(station),
            Mac::AccessPoint(_) => None,
        }
    }

    /// Returns the access point state, or `None` for other roles.
    #[must_use]
    pub fn as_access_point(&self) -> Option<&AccessPointMac> {
        match &self.mac {
            Mac::AccessPoint(access_point) => Some(access_point),
            Mac::Station(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ssid(s: &str) -> Ssid {
        Ssid::new(s).unwrap()
    }

    #[test]
    fn test_distance() {
        let origin = Position::default();
        assert_eq!(origin.distance(&Position::new(5.0, 0.0, 0.0)), 5.0);
        assert_eq!(Position::new(1.0, 2.0, 3.0).distance(&Position::new(4.0, 6.0, 3.0)), 5.0);
    }

    #[test]
    fn test_station_associates_on_matching_beacon() {
        let mut station = StationMac::new(ssid("cell"));
        assert_eq!(station.state(), StationState::Unassociated);
        station.start_scanning();
        assert_eq!(station.state(), StationState::Scanning);

        let address = Some(Ipv4Addr::new(192, 168, 1, 2));
        assert!(!station.on_beacon(DeviceId(1), address, &ssid("other"), Duration::from_millis(1)));
        assert_eq!(station.state(), StationState::Scanning);

        assert!(station.on_beacon(DeviceId(1), address, &ssid("cell"), Duration::from_millis(2)));
        assert!(station.is_associated());
        assert_eq!(station.access_point(), Some(DeviceId(1)));
        assert_eq!(station.access_point_address(), address);
        assert_eq!(station.associated_at(), Some(Duration::from_millis(2)));

        // Already associated: later beacons change nothing.
        assert!(!station.on_beacon(DeviceId(2), None, &ssid("cell"), Duration::from_millis(3)));
        assert_eq!(station.access_point(), Some(DeviceId(1)));
        station.start_scanning();
        assert_eq!(station.state(), StationState::Associated);
    }

    #[test]
    fn test_data_before_association_is_lost() {
        let mut station = StationMac::new(ssid("cell"));
        assert!(!station.accept_data());
        station.start_scanning();
        assert!(!station.accept_data());
        assert_eq!(station.pre_association_losses(), 2);
        station.on_beacon(DeviceId(1), None, &ssid("cell"), Duration::default());
        assert!(station.accept_data());
        assert_eq!(station.pre_association_losses(), 2);
    }

    #[test]
    fn test_access_point_start() {
        let mut access_point = AccessPointMac::new(ssid("cell"), Duration::from_micros(102_400));
        assert_eq!(access_point.state(), AccessPointState::Idle);
        assert!(access_point.start());
        assert!(!access_point.start());
        assert_eq!(access_point.state(), AccessPointState::Beaconing);
        assert_eq!(access_point.beacon(), &ssid("cell"));
        assert_eq!(access_point.beacons_sent(), 1);
    }

    #[test]
    fn test_device_roles() {
        let station = Device::new(
            DeviceId(0),
            Position::new(5.0, 0.0, 0.0),
            Mac::Station(StationMac::new(ssid("cell"))),
        );
        let access_point = Device::new(
            DeviceId(1),
            Position::default(),
            Mac::AccessPoint(AccessPointMac::new(ssid("cell"), Duration::from_millis(100))),
        );
        assert!(station.is_station());
        assert!(station.as_access_point().is_none());
        assert!(!access_point.is_station());
        assert!(access_point.as_station().is_none());
        assert_eq!(station.distance(&access_point), 5.0);
    }
}
