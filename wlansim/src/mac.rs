use std::time::Duration;

use evsim::{Component, ComponentId, Key, QueueId, Scheduler, State};

use crate::{Device, DeviceId, Frame, Mac, Network, Packet, Ssid, UdpServer};

/// Bytes added to every UDP payload on the air: UDP and IPv4 headers, LLC/SNAP, QoS MAC header,
/// and frame check sequence.
pub const FRAME_OVERHEAD_BYTES: u32 = 8 + 20 + 8 + 26 + 4;

/// MAC events.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The device is switched on. Access points start beaconing, stations start scanning.
    Start,
    /// The access point is due to broadcast a beacon.
    Beacon,
    /// A beacon has reached a station.
    BeaconReceived {
        /// The access point that sent the beacon.
        from: DeviceId,
        /// The advertised network identifier.
        ssid: Ssid,
    },
    /// A new frame has been put in the transmit queue.
    Enqueued,
    /// The medium is free again after sending a frame.
    TransmissionFinished,
    /// A data frame has reached this device.
    FrameReceived {
        /// The sending device.
        from: DeviceId,
        /// The carried packet.
        packet: Packet,
    },
}

/// MAC layer of a single device.
///
/// The same component type serves both roles; the behavior is chosen by the [`Mac`] variant of
/// the device it is attached to. Access points send data frames one at a time from their
/// transmit queue, each one occupying the medium for its airtime at the configured data rate.
pub struct WifiMac {
    device: DeviceId,
    network: Key<Network>,
    tx_queue: Option<QueueId<Frame>>,
    data_rate: Option<f64>,
    sink: Option<Key<UdpServer>>,
    transmitting: bool,
}

impl WifiMac {
    /// Constructs the MAC of `device`, which must be stored in the network under `network`.
    #[must_use]
    pub fn new(device: DeviceId, network: Key<Network>) -> Self {
        Self {
            device,
            network,
            tx_queue: None,
            data_rate: None,
            sink: None,
            transmitting: false,
        }
    }

    /// Sets the queue from which outgoing data frames are taken.
    #[must_use]
    pub fn with_tx_queue(mut self, tx_queue: QueueId<Frame>) -> Self {
        self.tx_queue = Some(tx_queue);
        self
    }

    /// Sets the constant data rate in Mbit/s. With `None`, frames take no time on the air.
    #[must_use]
    pub fn with_data_rate(mut self, data_rate_mbps: Option<f64>) -> Self {
        self.data_rate = data_rate_mbps;
        self
    }

    /// Sets the UDP server to which accepted packets are passed up.
    #[must_use]
    pub fn with_sink(mut self, sink: Key<UdpServer>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Time needed to send a frame carrying `payload_size` bytes.
    #[must_use]
    pub fn airtime(&self, payload_size: u32) -> Duration {
        self.data_rate.map_or_else(Duration::default, |rate| {
            let bits = f64::from(payload_size + FRAME_OVERHEAD_BYTES) * 8.0;
            Duration::from_secs_f64(bits / (rate * 1_000_000.0))
        })
    }

    fn network_mut<'s>(&self, state: &'s mut State) -> &'s mut Network {
        state
            .get_mut(self.network)
            .expect("Network not found in state")
    }

    fn start(&self, self_id: ComponentId<Event>, scheduler: &mut Scheduler, state: &mut State) {
        let now = scheduler.time();
        match self.network_mut(state).device_mut(self.device).map(Device::mac_mut) {
            Some(Mac::AccessPoint(access_point)) => {
                if access_point.start() {
                    log::info!(
                        "[{:?}] Access point {} is beaconing as {}",
                        now,
                        self.device,
                        access_point.ssid()
                    );
                    scheduler.schedule_immediately(self_id, Event::Beacon);
                }
            }
            Some(Mac::Station(station)) => {
                station.start_scanning();
                log::debug!("[{:?}] Station {} is scanning", now, self.device);
            }
            None => log::warn!("MAC attached to unknown device {}", self.device),
        }
    }

    fn beacon(&self, self_id: ComponentId<Event>, scheduler: &mut Scheduler, state: &mut State) {
        let now = scheduler.time();
        let network = self.network_mut(state);
        let (ssid, interval) = match network.device_mut(self.device).map(Device::mac_mut) {
            Some(Mac::AccessPoint(access_point)) => {
                (access_point.beacon().clone(), access_point.beacon_interval())
            }
            _ => {
                log::warn!("Beacon scheduled for non-AP device {}", self.device);
                return;
            }
        };
        network.stats_mut().beacons_sent += 1;
        let network: &Network = network;
        let deliveries: Vec<_> = network
            .stations()
            .filter(|station| station.id() != self.device)
            .filter_map(|station| {
                let delay = network.transmit(self.device, station.id(), now)?;
                let mac = network.mac_of(station.id())?;
                Some((mac, delay))
            })
            .collect();
        for (mac, delay) in deliveries {
            scheduler.schedule(
                delay,
                mac,
                Event::BeaconReceived {
                    from: self.device,
                    ssid: ssid.clone(),
                },
            );
        }
        scheduler.schedule(interval, self_id, Event::Beacon);
    }

    fn receive_beacon(&self, from: DeviceId, ssid: &Ssid, now: Duration, state: &mut State) {
        let network = self.network_mut(state);
        let access_point_address = network.address_of(from).ok();
        match network.device_mut(self.device).map(Device::mac_mut) {
            Some(Mac::Station(station)) => {
                if station.on_beacon(from, access_point_address, ssid, now) {
                    log::info!(
                        "[{:?}] Station {} associated with access point {} ({})",
                        now,
                        self.device,
                        from,
                        ssid
                    );
                }
            }
            _ => log::trace!("[{:?}] Device {} ignores beacon", now, self.device),
        }
    }

    fn transmit_next(
        &mut self,
        self_id: ComponentId<Event>,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let tx_queue = if let Some(tx_queue) = self.tx_queue {
            tx_queue
        } else {
            log::warn!("Device {} has no transmit queue", self.device);
            return;
        };
        let now = scheduler.time();
        while let Some(frame) = state.recv(tx_queue) {
            let airtime = self.airtime(frame.payload_size());
            let network = self.network_mut(state);
            let destination = if let Some(destination) = network.resolve(frame.destination()) {
                destination
            } else {
                network.stats_mut().unroutable_frames += 1;
                log::debug!(
                    "[{:?}] No device with address {}, frame {} dropped",
                    now,
                    frame.destination(),
                    frame.sequence_number()
                );
                continue;
            };
            network.stats_mut().frames_sent += 1;
            match (
                network.transmit(self.device, destination, now),
                network.mac_of(destination),
            ) {
                (Some(delay), Some(mac)) => {
                    scheduler.schedule(
                        delay + airtime,
                        mac,
                        Event::FrameReceived {
                            from: self.device,
                            packet: frame.packet(),
                        },
                    );
                }
                _ => {
                    network.stats_mut().channel_losses += 1;
                    log::trace!("[{:?}] Frame {} lost", now, frame.sequence_number());
                }
            }
            self.transmitting = true;
            scheduler.schedule(airtime, self_id, Event::TransmissionFinished);
            return;
        }
        self.transmitting = false;
    }

    fn receive_frame(&self, packet: &Packet, now: Duration, state: &mut State) {
        let accepted = match self
            .network_mut(state)
            .device_mut(self.device)
            .map(Device::mac_mut)
        {
            Some(Mac::Station(station)) => station.accept_data(),
            _ => {
                log::trace!("[{:?}] Device {} ignores data frame", now, self.device);
                return;
            }
        };
        if !accepted {
            log::debug!(
                "[{:?}] Station {} is not associated, packet {} dropped",
                now,
                self.device,
                packet.sequence_number()
            );
        } else if let Some(sink) = self.sink {
            state
                .get_mut(sink)
                .expect("UDP server not found in state")
                .on_receive(packet);
        }
    }
}

impl Component for WifiMac {
    type Event = Event;

    fn process_event(
        &mut self,
        self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let now = scheduler.time();
        match event {
            Event::Start => self.start(self_id, scheduler, state),
            Event::Beacon => self.beacon(self_id, scheduler, state),
            Event::BeaconReceived { from, ssid } => self.receive_beacon(*from, ssid, now, state),
            Event::Enqueued => {
                if !self.transmitting {
                    self.transmit_next(self_id, scheduler, state);
                }
            }
            Event::TransmissionFinished => {
                self.transmitting = false;
                self.transmit_next(self_id, scheduler, state);
            }
            Event::FrameReceived { packet, .. } => self.receive_frame(packet, now, state),
        }
    }
}
