use std::net::Ipv4Addr;
use std::time::Duration;

use evsim::{Component, ComponentId, EventHandle, Key, QueueId, Scheduler, State};
use serde::Serialize;

use crate::config::MAX_PAYLOAD_SIZE;
use crate::{ConfigError, DeviceId, Frame, MacEvent, Packet};

/// UDP client events.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    /// The application starts and sends its first packet right away.
    Start,
    /// The next packet is due.
    Send,
    /// The application stops; a pending send is cancelled.
    Stop,
}

/// Parameters of a constant-rate UDP client.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Address of the receiving server.
    pub destination: Ipv4Addr,
    /// Maximum number of packets to send.
    pub max_packets: u32,
    /// Time between two consecutive packets.
    pub interval: Duration,
    /// Payload size of each packet in bytes.
    pub payload_size: u32,
}

/// Counters kept by the client in the simulation state.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    /// Packets handed to the MAC.
    pub sent: u64,
    /// Packets rejected because the transmit queue was full.
    pub queue_drops: u64,
}

/// Sends packets of a fixed size at a fixed interval to a single destination.
///
/// Packets are numbered from 0 and put in the transmit queue of the MAC of the sending device,
/// which is then notified with [`MacEvent::Enqueued`].
pub struct UdpClient {
    config: ClientConfig,
    source: DeviceId,
    mac: ComponentId<MacEvent>,
    tx_queue: QueueId<Frame>,
    stats: Key<ClientStats>,
    sent: u32,
    next_send: Option<EventHandle>,
    stopped: bool,
}

impl UdpClient {
    /// Creates a client running on `source`, sending through the MAC `mac` and its queue.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInterval`] for a zero interval and
    /// [`ConfigError::InvalidPayloadSize`] for a payload that does not fit in a datagram.
    pub fn new(
        config: ClientConfig,
        source: DeviceId,
        mac: ComponentId<MacEvent>,
        tx_queue: QueueId<Frame>,
        stats: Key<ClientStats>,
    ) -> Result<Self, ConfigError> {
        if config.interval == Duration::default() {
            return Err(ConfigError::InvalidInterval);
        }
        if config.payload_size == 0 || config.payload_size > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::InvalidPayloadSize(config.payload_size));
        }
        Ok(Self {
            config,
            source,
            mac,
            tx_queue,
            stats,
            sent: 0,
            next_send: None,
            stopped: false,
        })
    }

    fn send(&mut self, self_id: ComponentId<Event>, scheduler: &mut Scheduler, state: &mut State) {
        self.next_send = None;
        if self.stopped || self.sent >= self.config.max_packets {
            return;
        }
        let now = scheduler.time();
        let packet = Packet::new(self.sent, self.config.payload_size, now);
        let frame = Frame::new(self.source, self.config.destination, packet);
        let stats = state
            .get_mut(self.stats)
            .expect("Client stats not found in state");
        stats.sent += 1;
        if state.send(self.tx_queue, frame).is_err() {
            log::debug!(
                "[{:?}] Transmit queue full, packet {} dropped",
                now,
                packet.sequence_number()
            );
            state
                .get_mut(self.stats)
                .expect("Client stats not found in state")
                .queue_drops += 1;
        } else {
            scheduler.schedule_immediately(self.mac, MacEvent::Enqueued);
        }
        self.sent += 1;
        if self.sent < self.config.max_packets {
            self.next_send = Some(scheduler.schedule(self.config.interval, self_id, Event::Send));
        } else {
            log::debug!("[{:?}] Client sent all {} packets", now, self.sent);
        }
    }
}

impl Component for UdpClient {
    type Event = Event;

    fn process_event(
        &mut self,
        self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        match event {
            Event::Start => {
                log::info!(
                    "[{:?}] Client on {} sending to {}",
                    scheduler.time(),
                    self.source,
                    self.config.destination
                );
                self.send(self_id, scheduler, state);
            }
            Event::Send => self.send(self_id, scheduler, state),
            Event::Stop => {
                self.stopped = true;
                if let Some(handle) = self.next_send.take() {
                    scheduler.cancel(handle);
                }
                log::info!(
                    "[{:?}] Client stopped after {} packets",
                    scheduler.time(),
                    self.sent
                );
            }
        }
    }
}

/// Counts packets passed up by the MAC of the receiving station.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UdpServer {
    received: u64,
    bytes: u64,
    highest_sequence: Option<u32>,
}

impl UdpServer {
    /// Records a received packet.
    pub fn on_receive(&mut self, packet: &Packet) {
        self.received += 1;
        self.bytes += u64::from(packet.payload_size());
        self.highest_sequence = self
            .highest_sequence
            .max(Some(packet.sequence_number()));
    }

    /// Number of packets received so far.
    #[must_use]
    pub fn received_count(&self) -> u64 {
        self.received
    }

    /// Total payload bytes received.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Highest sequence number seen.
    #[must_use]
    pub fn highest_sequence(&self) -> Option<u32> {
        self.highest_sequence
    }

    /// Packets missing up to the highest sequence number seen.
    #[must_use]
    pub fn lost(&self) -> u64 {
        self.highest_sequence
            .map_or(0, |seq| (u64::from(seq) + 1).saturating_sub(self.received))
    }
}
