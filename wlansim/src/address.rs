use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::DeviceId;

/// Errors raised while handing out addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The device already holds an address.
    #[error("device {0} already has an address assigned")]
    AlreadyAssigned(DeviceId),
    /// All host addresses of the network have been handed out.
    #[error("no free host addresses left in {network}/{prefix_len}")]
    PoolExhausted {
        /// Base network address.
        network: Ipv4Addr,
        /// Prefix length of the network.
        prefix_len: u8,
    },
    /// The prefix length does not leave room for any host.
    #[error("invalid prefix length: {0}")]
    InvalidPrefix(u8),
}

/// Hands out host addresses from a single network, in call order: the first assignment receives
/// the first host address (`base.1`), the second one `base.2`, and so on.
///
/// No address is ever returned twice by the same pool.
///
/// ```
/// # use std::net::Ipv4Addr;
/// # use wlansim::{AddressPool, DeviceId};
/// let mut pool = AddressPool::new(Ipv4Addr::new(192, 168, 1, 0), 24).unwrap();
/// assert_eq!(pool.assign(DeviceId::from(7)), Ok(Ipv4Addr::new(192, 168, 1, 1)));
/// assert_eq!(pool.assign(DeviceId::from(3)), Ok(Ipv4Addr::new(192, 168, 1, 2)));
/// ```
#[derive(Debug, Clone)]
pub struct AddressPool {
    network: Ipv4Addr,
    prefix_len: u8,
    next_host: u32,
    assigned: HashMap<DeviceId, Ipv4Addr>,
    owners: HashMap<Ipv4Addr, DeviceId>,
}

impl AddressPool {
    /// Creates a pool for the network `base/prefix_len`. Host bits of `base` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidPrefix`] for prefixes longer than 30 bits, which leave no
    /// room for host addresses other than network and broadcast.
    pub fn new(base: Ipv4Addr, prefix_len: u8) -> Result<Self, AddressError> {
        if prefix_len > 30 {
            return Err(AddressError::InvalidPrefix(prefix_len));
        }
        let mask = u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0);
        Ok(Self {
            network: Ipv4Addr::from(u32::from(base) & mask),
            prefix_len,
            next_host: 1,
            assigned: HashMap::new(),
            owners: HashMap::new(),
        })
    }

    /// Number of host addresses in the network, excluding network and broadcast addresses.
    fn capacity(&self) -> u64 {
        (1_u64 << (32 - u32::from(self.prefix_len))) - 2
    }

    /// Assigns the next free address to `device`.
    ///
    /// # Errors
    ///
    /// Fails if the device already has an address, or the pool is exhausted.
    pub fn assign(&mut self, device: DeviceId) -> Result<Ipv4Addr, AddressError> {
        if self.assigned.contains_key(&device) {
            return Err(AddressError::AlreadyAssigned(device));
        }
        if u64::from(self.next_host) > self.capacity() {
            return Err(AddressError::PoolExhausted {
                network: self.network,
                prefix_len: self.prefix_len,
            });
        }
        let address = Ipv4Addr::from(u32::from(self.network) + self.next_host);
        self.next_host += 1;
        self.assigned.insert(device, address);
        self.owners.insert(address, device);
        log::debug!("Assigned {} to device {}", address, device);
        Ok(address)
    }

    /// Returns the address of `device`, if it has been assigned one.
    #[must_use]
    pub fn address_of(&self, device: DeviceId) -> Option<Ipv4Addr> {
        self.assigned.get(&device).copied()
    }

    /// Finds the device holding `address`.
    #[must_use]
    pub fn device_for(&self, address: Ipv4Addr) -> Option<DeviceId> {
        self.owners.get(&address).copied()
    }

    /// Number of addresses handed out so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    /// Checks if no address has been handed out yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_assign_in_call_order() {
        let mut pool = AddressPool::new(Ipv4Addr::new(192, 168, 1, 0), 24).unwrap();
        assert!(pool.is_empty());
        assert_eq!(
            pool.assign(DeviceId(0)),
            Ok(Ipv4Addr::new(192, 168, 1, 1))
        );
        assert_eq!(
            pool.assign(DeviceId(1)),
            Ok(Ipv4Addr::new(192, 168, 1, 2))
        );
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.address_of(DeviceId(1)), Some(Ipv4Addr::new(192, 168, 1, 2)));
        assert_eq!(pool.address_of(DeviceId(2)), None);
        assert_eq!(pool.device_for(Ipv4Addr::new(192, 168, 1, 1)), Some(DeviceId(0)));
        assert_eq!(pool.device_for(Ipv4Addr::new(192, 168, 1, 3)), None);
    }

    #[test]
    fn test_host_bits_of_base_are_ignored() {
        let mut pool = AddressPool::new(Ipv4Addr::new(10, 0, 3, 77), 16).unwrap();
        assert_eq!(pool.assign(DeviceId(0)), Ok(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_assign_twice() {
        let mut pool = AddressPool::new(Ipv4Addr::new(192, 168, 1, 0), 24).unwrap();
        pool.assign(DeviceId(4)).unwrap();
        assert_eq!(
            pool.assign(DeviceId(4)),
            Err(AddressError::AlreadyAssigned(DeviceId(4)))
        );
        assert_eq!(pool.assign(DeviceId(5)), Ok(Ipv4Addr::new(192, 168, 1, 2)));
    }

    #[test]
    fn test_exhausted() {
        let mut pool = AddressPool::new(Ipv4Addr::new(192, 168, 1, 0), 30).unwrap();
        assert_eq!(pool.assign(DeviceId(0)), Ok(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(pool.assign(DeviceId(1)), Ok(Ipv4Addr::new(192, 168, 1, 2)));
        assert!(matches!(
            pool.assign(DeviceId(2)),
            Err(AddressError::PoolExhausted { prefix_len: 30, .. })
        ));
    }

    #[test]
    fn test_invalid_prefix() {
        assert_eq!(
            AddressPool::new(Ipv4Addr::new(192, 168, 1, 0), 31).unwrap_err(),
            AddressError::InvalidPrefix(31)
        );
        assert!(AddressPool::new(Ipv4Addr::new(0, 0, 0, 0), 0).is_ok());
    }
}
