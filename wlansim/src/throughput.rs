use std::time::Duration;

use serde::Serialize;

/// Application-level throughput in Mbit/s: `received_count * payload_size * 8 / (window * 10^6)`.
///
/// The bit count is computed in integer arithmetic, so the result is exact up to the final
/// floating-point division. A zero-length window yields zero.
///
/// ```
/// # use std::time::Duration;
/// # use wlansim::throughput_mbps;
/// assert_eq!(throughput_mbps(1000, 1250, Duration::from_secs(1)), 10.0);
/// ```
#[must_use]
pub fn throughput_mbps(received_count: u64, payload_size: u32, window: Duration) -> f64 {
    let seconds = window.as_secs_f64();
    if seconds <= 0.0 {
        return 0.0;
    }
    let bits = u128::from(received_count) * u128::from(payload_size) * 8;
    #[allow(clippy::cast_precision_loss)]
    let bits = bits as f64;
    bits / (seconds * 1_000_000.0)
}

/// Inputs of a throughput computation, kept together for reporting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ThroughputSample {
    /// Packets received by the server.
    pub received_count: u64,
    /// Payload size of each packet in bytes.
    pub payload_size: u32,
    /// Length of the measurement window.
    pub measurement_window: Duration,
}

impl ThroughputSample {
    /// Throughput in Mbit/s. See [`throughput_mbps`].
    #[must_use]
    pub fn mbps(&self) -> f64 {
        throughput_mbps(self.received_count, self.payload_size, self.measurement_window)
    }
}
