use std::{collections::HashSet, net::IpAddr};

use fxhash::FxBuildHasher;
use log::{debug, trace};
use nix::ifaddrs::getifaddrs;

use crate::Error;

/// Snapshot of the addresses bound to the local interfaces.
///
/// Membership is an exact address match, netmasks are ignored. The snapshot is
/// never refreshed: flows classified after an interface change use stale data.
#[derive(Debug, Clone, Default)]
pub struct LocalAddrs {
    addrs: HashSet<IpAddr, FxBuildHasher>,
}

impl LocalAddrs {
    /// Builds a set from the given addresses.
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        addrs.into_iter().collect()
    }

    /// A set without any address: nothing is local.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads the IPv4 and IPv6 addresses of every host interface.
    pub fn from_host_interfaces() -> Result<Self, Error> {
        let mut addrs = HashSet::default();

        for ifaddr in getifaddrs().map_err(Error::Configuration)? {
            let Some(address) = ifaddr.address else {
                continue;
            };

            let ip: IpAddr = if let Some(sin) = address.as_sockaddr_in() {
                sin.ip().into()
            } else if let Some(sin6) = address.as_sockaddr_in6() {
                sin6.ip().into()
            } else {
                continue;
            };

            trace!("local address {} on {}", ip, ifaddr.interface_name);
            addrs.insert(ip);
        }

        debug!("{} local addresses", addrs.len());

        Ok(Self { addrs })
    }

    #[inline]
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.addrs.contains(ip)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IpAddr> + '_ {
        self.addrs.iter()
    }
}

impl FromIterator<IpAddr> for LocalAddrs {
    fn from_iter<T: IntoIterator<Item = IpAddr>>(iter: T) -> Self {
        Self {
            addrs: iter.into_iter().collect(),
        }
    }
}
