//! Address arithmetic shared by the key resolver, writer and projection code

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

use crate::error::{MmdbioError, Result};

/// Reserved IPv4 networks (excluded from a database unless explicitly allowed)
const RESERVED_IPV4: &[([u8; 4], u8)] = &[
    ([0, 0, 0, 0], 8),
    ([10, 0, 0, 0], 8),
    ([100, 64, 0, 0], 10),
    ([127, 0, 0, 0], 8),
    ([169, 254, 0, 0], 16),
    ([172, 16, 0, 0], 12),
    ([192, 0, 0, 0], 29),
    ([192, 0, 2, 0], 24),
    ([192, 88, 99, 0], 24),
    ([192, 168, 0, 0], 16),
    ([198, 18, 0, 0], 15),
    ([198, 51, 100, 0], 24),
    ([203, 0, 113, 0], 24),
    ([224, 0, 0, 0], 4),
    ([240, 0, 0, 0], 4),
    ([255, 255, 255, 255], 32),
];

/// Reserved IPv6 networks
const RESERVED_IPV6: &[([u16; 8], u8)] = &[
    ([0x100, 0, 0, 0, 0, 0, 0, 0], 64),
    ([0x2001, 0, 0, 0, 0, 0, 0, 0], 23),
    ([0x2001, 0xdb8, 0, 0, 0, 0, 0, 0], 32),
    ([0xfc00, 0, 0, 0, 0, 0, 0, 0], 7),
    ([0xfe80, 0, 0, 0, 0, 0, 0, 0], 10),
    ([0xff00, 0, 0, 0, 0, 0, 0, 0], 8),
];

/// Reserved IPv4 networks
pub fn reserved_ipv4() -> Vec<IpNetwork> {
    RESERVED_IPV4
        .iter()
        .filter_map(|(octets, prefix)| Ipv4Network::new(Ipv4Addr::from(*octets), *prefix).ok())
        .map(IpNetwork::V4)
        .collect()
}

/// Reserved IPv6 networks
pub fn reserved_ipv6() -> Vec<IpNetwork> {
    RESERVED_IPV6
        .iter()
        .filter_map(|(segs, prefix)| Ipv6Network::new(Ipv6Addr::from(*segs), *prefix).ok())
        .map(IpNetwork::V6)
        .collect()
}

/// Bit width of an address family
pub fn family_width(ip: IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Address as an integer
pub fn addr_to_u128(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Network from an integer address of the given width
pub fn network_from_bits(bits: u128, prefix: u8, width: u8) -> Result<IpNetwork> {
    let net = if width == 32 {
        Ipv4Network::new(Ipv4Addr::from(bits as u32), prefix).map(IpNetwork::V4)
    } else {
        Ipv6Network::new(Ipv6Addr::from(bits), prefix).map(IpNetwork::V6)
    };
    net.map_err(|e| MmdbioError::InvalidNetwork(e.to_string()))
}

/// Network with host bits cleared ("1.2.3.4/24" -> "1.2.3.0/24")
pub fn canonical(net: IpNetwork) -> IpNetwork {
    match net {
        IpNetwork::V4(v4) => Ipv4Network::new(v4.network(), v4.prefix())
            .map(IpNetwork::V4)
            .unwrap_or(net),
        IpNetwork::V6(v6) => Ipv6Network::new(v6.network(), v6.prefix())
            .map(IpNetwork::V6)
            .unwrap_or(net),
    }
}

/// Parse strict CIDR notation; a bare address is rejected
pub fn parse_cidr(text: &str) -> Result<IpNetwork> {
    let text = text.trim();
    if !text.contains('/') {
        return Err(MmdbioError::InvalidNetwork(format!(
            "{}: missing prefix length",
            text
        )));
    }
    text.parse::<IpNetwork>()
        .map(canonical)
        .map_err(|e| MmdbioError::InvalidNetwork(format!("{}: {}", text, e)))
}

/// Two networks overlap when either contains the other's network address
pub fn overlaps(a: &IpNetwork, b: &IpNetwork) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

/// Minimal list of CIDR blocks exactly covering `start..=end`
pub fn range_to_cidrs(start: IpAddr, end: IpAddr) -> Result<Vec<IpNetwork>> {
    if start.is_ipv4() != end.is_ipv4() {
        return Err(MmdbioError::InvalidNetwork(format!(
            "{} and {} are different address families",
            start, end
        )));
    }
    let width = family_width(start);
    let (mut cur, end_bits) = (addr_to_u128(start), addr_to_u128(end));
    if cur > end_bits {
        return Err(MmdbioError::InvalidNetwork(format!(
            "range start {} is after end {}",
            start, end
        )));
    }

    let mut out = Vec::new();
    loop {
        let mut size_bits = if cur == 0 {
            u32::from(width)
        } else {
            cur.trailing_zeros().min(u32::from(width))
        };
        while block_last(cur, size_bits) > end_bits {
            size_bits -= 1;
        }
        out.push(network_from_bits(cur, width - size_bits as u8, width)?);

        let last = block_last(cur, size_bits);
        if last >= end_bits {
            break;
        }
        cur = last + 1;
    }
    Ok(out)
}

fn block_last(start: u128, size_bits: u32) -> u128 {
    if size_bits >= 128 {
        u128::MAX
    } else {
        start | ((1u128 << size_bits) - 1)
    }
}

/// Number of addresses in a network, saturating at `u128::MAX`
pub fn address_count(net: &IpNetwork) -> u128 {
    let host_bits = u32::from(family_width(net.ip()) - net.prefix());
    if host_bits >= 128 {
        u128::MAX
    } else {
        1u128 << host_bits
    }
}

/// Every address of a network, refusing networks larger than `limit`
pub fn expand(net: &IpNetwork, limit: u128) -> Result<Vec<IpAddr>> {
    let count = address_count(net);
    if count > limit {
        return Err(MmdbioError::InvalidNetwork(format!(
            "{} holds {} addresses, more than the limit of {}",
            net, count, limit
        )));
    }

    let start = addr_to_u128(net.network());
    let addrs = (0..count)
        .map(|i| match net {
            IpNetwork::V4(_) => IpAddr::V4(Ipv4Addr::from((start + i) as u32)),
            IpNetwork::V6(_) => IpAddr::V6(Ipv6Addr::from(start + i)),
        })
        .collect();
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nets(list: &[&str]) -> Vec<IpNetwork> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_range_to_cidrs_unaligned() {
        let cidrs = range_to_cidrs("1.2.3.0".parse().unwrap(), "1.2.3.10".parse().unwrap()).unwrap();
        assert_eq!(cidrs, nets(&["1.2.3.0/29", "1.2.3.8/31", "1.2.3.10/32"]));
        let total: u128 = cidrs.iter().map(address_count).sum();
        assert_eq!(total, 11);
    }

    #[test]
    fn test_range_to_cidrs_full_spaces() {
        let all4 = range_to_cidrs("0.0.0.0".parse().unwrap(), "255.255.255.255".parse().unwrap()).unwrap();
        assert_eq!(all4, nets(&["0.0.0.0/0"]));

        let all6 = range_to_cidrs(
            "::".parse().unwrap(),
            "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff".parse().unwrap(),
        )
        .unwrap();
        assert_eq!(all6, nets(&["::/0"]));
    }

    #[test]
    fn test_range_single_address() {
        let one = range_to_cidrs("::1".parse().unwrap(), "::1".parse().unwrap()).unwrap();
        assert_eq!(one, nets(&["::1/128"]));
    }

    #[test]
    fn test_range_errors() {
        assert!(range_to_cidrs("1.2.3.10".parse().unwrap(), "1.2.3.0".parse().unwrap()).is_err());
        assert!(range_to_cidrs("1.2.3.0".parse().unwrap(), "::1".parse().unwrap()).is_err());
    }

    #[test]
    fn test_parse_cidr_is_strict_and_canonical() {
        assert_eq!(parse_cidr("1.2.3.4/24").unwrap().to_string(), "1.2.3.0/24");
        assert!(parse_cidr("1.2.3.4").is_err());
        assert!(parse_cidr("1.2.3.0/33").is_err());
        assert!(parse_cidr("2001:db8::1/200").is_err());
    }

    #[test]
    fn test_overlaps() {
        let a: IpNetwork = "10.0.0.0/8".parse().unwrap();
        let b: IpNetwork = "10.1.0.0/16".parse().unwrap();
        let c: IpNetwork = "11.0.0.0/8".parse().unwrap();
        assert!(overlaps(&a, &b));
        assert!(overlaps(&b, &a));
        assert!(!overlaps(&a, &c));
    }

    #[test]
    fn test_expand_with_limit() {
        let net: IpNetwork = "192.0.2.0/30".parse().unwrap();
        let addrs = expand(&net, 16).unwrap();
        assert_eq!(addrs.len(), 4);
        assert_eq!(addrs[3], "192.0.2.3".parse::<IpAddr>().unwrap());

        let big: IpNetwork = "10.0.0.0/8".parse().unwrap();
        assert!(expand(&big, 1 << 20).is_err());
    }

    #[test]
    fn test_reserved_lists_parse() {
        assert_eq!(reserved_ipv4().len(), RESERVED_IPV4.len());
        assert_eq!(reserved_ipv6().len(), RESERVED_IPV6.len());
    }
}
