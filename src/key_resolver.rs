//! Network key resolution
//!
//! Input documents name networks in three textual forms:
//!
//! - a start-end range: `1.2.3.0-1.2.3.10`
//! - a CIDR block: `1.2.3.0/24`
//! - a bare address: `8.8.8.8`, `::1`
//!
//! `resolve` tries each form in that order and stops at the first one that
//! applies. A form that applies but fails to parse produces a skip reason
//! instead of falling through, so `1.2.3.0-garbage` is reported as a bad
//! range rather than a bad address.

use std::fmt;
use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::mmdb::IpVersion;
use crate::network::parse_cidr;

/// Separator between the two ends of a range key
const RANGE_SEPARATOR: char = '-';

/// How a key is inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPlan {
    /// One CIDR block (host bits cleared)
    Single(IpNetwork),
    /// Every address from `start` to `end`, inclusive
    Range {
        /// First address
        start: IpAddr,
        /// Last address
        end: IpAddr,
    },
}

/// Why a key was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Range key that does not split into exactly two parts
    InvalidRange(String),
    /// Range endpoint that is not an address
    InvalidRangeAddress(String),
    /// Range endpoints of the wrong or mixed address families
    RangeFamilyMismatch(String),
    /// Range whose start is after its end
    RangeReversed(String),
    /// Key that is neither a CIDR block nor an address
    InvalidNetwork(String),
    /// IPv6 network for an IPv4 database
    WrongFamily(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidRange(key) => write!(f, "invalid range {}", key),
            SkipReason::InvalidRangeAddress(key) => write!(f, "invalid IPs in {}", key),
            SkipReason::RangeFamilyMismatch(key) => {
                write!(f, "range {} mixes address families or does not fit the database", key)
            }
            SkipReason::RangeReversed(key) => write!(f, "range {} starts after it ends", key),
            SkipReason::InvalidNetwork(key) => write!(f, "invalid network {}", key),
            SkipReason::WrongFamily(key) => {
                write!(f, "{} is IPv6 but the database is IPv4-only", key)
            }
        }
    }
}

/// Outcome of one parse attempt
enum Attempt {
    /// This form applies and parsed
    Matched(InsertionPlan),
    /// This form applies but the key is malformed
    Failed(SkipReason),
    /// Not this form; try the next one
    NotApplicable,
}

type Parser = fn(&str, IpVersion) -> Attempt;

/// Attempts in priority order
const PARSERS: &[Parser] = &[parse_range, parse_cidr_block, parse_bare_address];

/// Classify a key and turn it into an insertion plan
pub fn resolve(key: &str, ip_version: IpVersion) -> Result<InsertionPlan, SkipReason> {
    for parser in PARSERS {
        match parser(key, ip_version) {
            Attempt::Matched(plan) => return Ok(plan),
            Attempt::Failed(reason) => return Err(reason),
            Attempt::NotApplicable => continue,
        }
    }
    Err(SkipReason::InvalidNetwork(key.to_string()))
}

fn parse_range(key: &str, ip_version: IpVersion) -> Attempt {
    if !key.contains(RANGE_SEPARATOR) {
        return Attempt::NotApplicable;
    }

    let parts: Vec<&str> = key.split(RANGE_SEPARATOR).collect();
    let [start, end] = parts.as_slice() else {
        return Attempt::Failed(SkipReason::InvalidRange(key.to_string()));
    };

    let (Ok(start), Ok(end)) = (start.trim().parse::<IpAddr>(), end.trim().parse::<IpAddr>())
    else {
        return Attempt::Failed(SkipReason::InvalidRangeAddress(key.to_string()));
    };

    let family_ok = match ip_version {
        IpVersion::V4 => start.is_ipv4() && end.is_ipv4(),
        IpVersion::V6 => start.is_ipv4() == end.is_ipv4(),
    };
    if !family_ok {
        return Attempt::Failed(SkipReason::RangeFamilyMismatch(key.to_string()));
    }
    if start > end {
        return Attempt::Failed(SkipReason::RangeReversed(key.to_string()));
    }

    Attempt::Matched(InsertionPlan::Range { start, end })
}

fn parse_cidr_block(key: &str, ip_version: IpVersion) -> Attempt {
    match parse_cidr(key) {
        Ok(network) => single(network, key, ip_version),
        Err(_) => Attempt::NotApplicable,
    }
}

fn parse_bare_address(key: &str, ip_version: IpVersion) -> Attempt {
    let trimmed = key.trim();
    let prefix = if ip_version == IpVersion::V6 && trimmed.contains(':') {
        128
    } else {
        32
    };
    match parse_cidr(&format!("{}/{}", trimmed, prefix)) {
        Ok(network) => single(network, key, ip_version),
        Err(_) => Attempt::Failed(SkipReason::InvalidNetwork(key.to_string())),
    }
}

fn single(network: IpNetwork, key: &str, ip_version: IpVersion) -> Attempt {
    if ip_version == IpVersion::V4 && network.is_ipv6() {
        return Attempt::Failed(SkipReason::WrongFamily(key.to_string()));
    }
    Attempt::Matched(InsertionPlan::Single(network))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{address_count, range_to_cidrs};

    fn single_net(plan: InsertionPlan) -> String {
        match plan {
            InsertionPlan::Single(net) => net.to_string(),
            other => panic!("expected single insert, got {:?}", other),
        }
    }

    #[test]
    fn test_cidr_block() {
        let plan = resolve("1.2.3.0/24", IpVersion::V6).unwrap();
        assert_eq!(single_net(plan), "1.2.3.0/24");
    }

    #[test]
    fn test_plans_cover_exact_address_counts() {
        let block = match resolve("1.2.3.0/24", IpVersion::V4).unwrap() {
            InsertionPlan::Single(net) => net,
            other => panic!("expected a single network, got {:?}", other),
        };
        assert_eq!(address_count(&block), 256);
        assert_eq!(block.network().to_string(), "1.2.3.0");
        assert_eq!(block.broadcast().to_string(), "1.2.3.255");

        let (start, end) = match resolve("1.2.3.0-1.2.3.10", IpVersion::V4).unwrap() {
            InsertionPlan::Range { start, end } => (start, end),
            other => panic!("expected a range, got {:?}", other),
        };
        let covered: u128 = range_to_cidrs(start, end)
            .unwrap()
            .iter()
            .map(address_count)
            .sum();
        assert_eq!(covered, 11);
    }

    #[test]
    fn test_cidr_is_normalized() {
        let plan = resolve("1.2.3.77/24", IpVersion::V4).unwrap();
        assert_eq!(single_net(plan), "1.2.3.0/24");
    }

    #[test]
    fn test_bare_addresses_get_host_prefix() {
        assert_eq!(single_net(resolve("8.8.8.8", IpVersion::V4).unwrap()), "8.8.8.8/32");
        assert_eq!(single_net(resolve("::1", IpVersion::V6).unwrap()), "::1/128");
    }

    #[test]
    fn test_ipv6_bare_address_in_ipv4_database() {
        // "/32" is appended and the resulting IPv6 network is refused
        let err = resolve("2001:db8::1", IpVersion::V4).unwrap_err();
        assert_eq!(err, SkipReason::WrongFamily("2001:db8::1".to_string()));
    }

    #[test]
    fn test_range() {
        let plan = resolve("1.2.3.0-1.2.3.10", IpVersion::V4).unwrap();
        assert_eq!(
            plan,
            InsertionPlan::Range {
                start: "1.2.3.0".parse().unwrap(),
                end: "1.2.3.10".parse().unwrap(),
            }
        );
    }

    #[test]
    fn test_range_with_spaces() {
        assert!(matches!(
            resolve("10.0.0.1 - 10.0.0.9", IpVersion::V6),
            Ok(InsertionPlan::Range { .. })
        ));
    }

    #[test]
    fn test_range_failures_do_not_fall_through() {
        assert_eq!(
            resolve("1.2.3.0-1.2.3.5-1.2.3.9", IpVersion::V4),
            Err(SkipReason::InvalidRange("1.2.3.0-1.2.3.5-1.2.3.9".to_string()))
        );
        assert_eq!(
            resolve("1.2.3.0-banana", IpVersion::V4),
            Err(SkipReason::InvalidRangeAddress("1.2.3.0-banana".to_string()))
        );
        assert!(matches!(
            resolve("1.2.3.0-::1", IpVersion::V6),
            Err(SkipReason::RangeFamilyMismatch(_))
        ));
        assert!(matches!(
            resolve("::1-::2", IpVersion::V4),
            Err(SkipReason::RangeFamilyMismatch(_))
        ));
        assert!(matches!(
            resolve("1.2.3.9-1.2.3.0", IpVersion::V4),
            Err(SkipReason::RangeReversed(_))
        ));
    }

    #[test]
    fn test_garbage_key() {
        let err = resolve("not-an-ip", IpVersion::V6).unwrap_err();
        assert!(matches!(err, SkipReason::InvalidRangeAddress(_)));

        let err = resolve("hello", IpVersion::V6).unwrap_err();
        assert_eq!(err.to_string(), "invalid network hello");

        assert!(resolve("1.2.3.0/40", IpVersion::V4).is_err());
    }
}
