use std::cell::RefCell;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Device};

/// Speed of light in vacuum, in meters per second.
const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Decides whether a frame transmitted by `sender` reaches `receiver`, and when.
///
/// This is the boundary to the physical layer: implementors are free to model propagation loss,
/// interference, or error rates, but the MAC only ever sees the outcome.
pub trait DeliveryOracle {
    /// Returns the time of arrival of a frame sent at `send_time` over `distance` meters,
    /// or `None` if the frame is lost.
    fn deliver(
        &self,
        sender: &Device,
        receiver: &Device,
        distance: f64,
        send_time: Duration,
    ) -> Option<Duration>;
}

impl<T: DeliveryOracle + ?Sized> DeliveryOracle for Box<T> {
    fn deliver(
        &self,
        sender: &Device,
        receiver: &Device,
        distance: f64,
        send_time: Duration,
    ) -> Option<Duration> {
        (**self).deliver(sender, receiver, distance, send_time)
    }
}

/// Type of delivery oracle selected in the command line.
#[derive(Debug, PartialEq, Eq, Clone, Copy, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChannelKind {
    /// See [`IdealChannel`].
    Ideal,
    /// See [`RangeChannel`].
    Range,
    /// See [`LossyChannel`] over a [`RangeChannel`].
    Lossy,
}

/// Delivers every frame after a constant latency, regardless of distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IdealChannel {
    latency: Duration,
}

impl IdealChannel {
    /// Constructs a channel with the given latency.
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl DeliveryOracle for IdealChannel {
    fn deliver(&self, _: &Device, _: &Device, _: f64, send_time: Duration) -> Option<Duration> {
        Some(send_time + self.latency)
    }
}

/// Delivers frames to receivers within `max_range` meters, delayed by the propagation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeChannel {
    max_range: f64,
}

impl RangeChannel {
    /// Constructs a channel reaching up to `max_range` meters.
    #[must_use]
    pub fn new(max_range: f64) -> Self {
        Self { max_range }
    }

    /// Maximum distance at which frames are still delivered.
    #[must_use]
    pub fn max_range(&self) -> f64 {
        self.max_range
    }
}

impl DeliveryOracle for RangeChannel {
    fn deliver(
        &self,
        _: &Device,
        _: &Device,
        distance: f64,
        send_time: Duration,
    ) -> Option<Duration> {
        if distance <= self.max_range {
            let propagation = Duration::try_from_secs_f64(distance / SPEED_OF_LIGHT).ok()?;
            Some(send_time + propagation)
        } else {
            None
        }
    }
}

/// Drops frames independently with a fixed probability, and passes the remaining ones to the
/// inner oracle.
///
/// The random generator is seeded, so that two channels constructed with the same seed drop
/// exactly the same frames.
pub struct LossyChannel<C> {
    inner: C,
    loss: Bernoulli,
    rng: RefCell<ChaChaRng>,
}

impl<C: DeliveryOracle> LossyChannel<C> {
    /// Wraps `inner`, losing frames with `loss_probability`. Without a seed, the generator is
    /// seeded from system entropy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLossProbability`] if the probability is outside `[0, 1]`.
    pub fn new(inner: C, loss_probability: f64, seed: Option<u64>) -> Result<Self, ConfigError> {
        let loss = Bernoulli::new(loss_probability)
            .map_err(|_| ConfigError::InvalidLossProbability(loss_probability))?;
        let rng = if let Some(seed) = seed {
            ChaChaRng::seed_from_u64(seed)
        } else {
            ChaChaRng::from_entropy()
        };
        Ok(Self {
            inner,
            loss,
            rng: RefCell::new(rng),
        })
    }
}

impl<C: DeliveryOracle> DeliveryOracle for LossyChannel<C> {
    fn deliver(
        &self,
        sender: &Device,
        receiver: &Device,
        distance: f64,
        send_time: Duration,
    ) -> Option<Duration> {
        if self.loss.sample(&mut *self.rng.borrow_mut()) {
            None
        } else {
            self.inner.deliver(sender, receiver, distance, send_time)
        }
    }
}
