//! Host address derivation for the worker subnet.
//!
//! All DHCP addresses are computed from the worker CIDR on every pass; nothing
//! address-related is persisted in the state.

use ipnet::{IpNet, Ipv4Net};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Offset of the default gateway inside the worker subnet.
pub const GATEWAY_OFFSET: i64 = 1;
/// Offset of the DHCP server address.
pub const DHCP_SERVER_OFFSET: i64 = 2;
/// First address handed out by the DHCP pool.
pub const POOL_START_OFFSET: i64 = 10;
/// Last address handed out by the DHCP pool, counted back from the broadcast address.
pub const POOL_END_OFFSET: i64 = -1;

/// Address computation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("Not an IPv4 network: {0}")]
    NotIpv4(String),

    #[error("Host offset {offset} does not fit into {network}")]
    OutOfRange { network: Ipv4Net, offset: i64 },
}

pub type Result<T> = std::result::Result<T, AddressError>;

/// Parse a worker CIDR. Host bits are dropped, so `10.0.0.7/24` yields `10.0.0.0/24`.
pub fn parse_network(cidr: &str) -> Result<Ipv4Net> {
    let net: IpNet = cidr
        .trim()
        .parse()
        .map_err(|_| AddressError::InvalidCidr(cidr.to_string()))?;
    match net {
        IpNet::V4(v4) => Ok(v4.trunc()),
        IpNet::V6(_) => Err(AddressError::NotIpv4(cidr.to_string())),
    }
}

/// Compute the host at `offset` inside `network`.
///
/// Non-negative offsets count up from the network address, negative offsets count
/// back from the broadcast address. The result must be an assignable host, i.e.
/// strictly between the network and broadcast addresses.
pub fn host(network: &Ipv4Net, offset: i64) -> Result<Ipv4Addr> {
    let first = i64::from(u32::from(network.network()));
    let last = i64::from(u32::from(network.broadcast()));
    let out_of_range = || AddressError::OutOfRange {
        network: *network,
        offset,
    };

    let addr = if offset >= 0 {
        first.checked_add(offset)
    } else {
        last.checked_add(offset)
    }
    .ok_or_else(out_of_range)?;

    if addr <= first || addr >= last {
        return Err(out_of_range());
    }
    let addr = u32::try_from(addr).map_err(|_| out_of_range())?;
    Ok(Ipv4Addr::from(addr))
}

/// Host at `offset` inside the CIDR string.
pub fn cidr_host(cidr: &str, offset: i64) -> Result<Ipv4Addr> {
    host(&parse_network(cidr)?, offset)
}

/// Host at `offset` with the network's prefix length appended, e.g. `10.0.0.2/24`.
pub fn cidr_host_and_prefix(cidr: &str, offset: i64) -> Result<String> {
    let network = parse_network(cidr)?;
    let addr = host(&network, offset)?;
    Ok(format!("{}/{}", addr, network.prefix_len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_addresses_for_slash_24() {
        let cidr = "10.0.0.0/24";
        assert_eq!(cidr_host(cidr, GATEWAY_OFFSET).unwrap(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(
            cidr_host(cidr, DHCP_SERVER_OFFSET).unwrap(),
            Ipv4Addr::new(10, 0, 0, 2)
        );
        assert_eq!(
            cidr_host(cidr, POOL_START_OFFSET).unwrap(),
            Ipv4Addr::new(10, 0, 0, 10)
        );
        assert_eq!(
            cidr_host(cidr, POOL_END_OFFSET).unwrap(),
            Ipv4Addr::new(10, 0, 0, 254)
        );
    }

    #[test]
    fn test_host_and_prefix() {
        assert_eq!(
            cidr_host_and_prefix("192.168.16.0/20", DHCP_SERVER_OFFSET).unwrap(),
            "192.168.16.2/20"
        );
    }

    #[test]
    fn test_host_bits_are_ignored() {
        assert_eq!(
            cidr_host("10.0.0.77/24", GATEWAY_OFFSET).unwrap(),
            Ipv4Addr::new(10, 0, 0, 1)
        );
    }

    #[test]
    fn test_small_subnets() {
        // /28: 16 addresses, pool still fits
        assert_eq!(
            cidr_host("10.1.0.16/28", POOL_START_OFFSET).unwrap(),
            Ipv4Addr::new(10, 1, 0, 26)
        );
        assert_eq!(
            cidr_host("10.1.0.16/28", POOL_END_OFFSET).unwrap(),
            Ipv4Addr::new(10, 1, 0, 30)
        );

        // /29: gateway fits, pool start does not
        assert!(cidr_host("10.1.0.8/29", GATEWAY_OFFSET).is_ok());
        assert!(matches!(
            cidr_host("10.1.0.8/29", POOL_START_OFFSET),
            Err(AddressError::OutOfRange { offset: 10, .. })
        ));

        // /31 and /32 have no assignable hosts
        assert!(cidr_host("10.1.0.0/31", GATEWAY_OFFSET).is_err());
        assert!(cidr_host("10.1.0.0/32", POOL_END_OFFSET).is_err());
    }

    #[test]
    fn test_offset_must_not_hit_network_or_broadcast() {
        let network = parse_network("10.0.0.0/24").unwrap();
        assert!(host(&network, 0).is_err());
        assert!(host(&network, 255).is_err());
        assert!(host(&network, -255).is_err());
        assert!(host(&network, i64::MAX).is_err());
        assert!(host(&network, i64::MIN).is_err());
    }

    #[test]
    fn test_malformed_and_ipv6() {
        assert!(matches!(
            cidr_host("not-a-cidr", 1),
            Err(AddressError::InvalidCidr(_))
        ));
        assert!(matches!(
            cidr_host("10.0.0.0", 1),
            Err(AddressError::InvalidCidr(_))
        ));
        assert!(matches!(
            cidr_host("fd00::/64", 1),
            Err(AddressError::NotIpv4(_))
        ));
    }
}
