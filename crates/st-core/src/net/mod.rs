//! Client address handling: classification, anonymization, normalization.

pub mod anonymize;
pub mod classify;

pub use anonymize::{anonymize, split_processed_string, PROCESSED_SEPARATOR};
pub use classify::{classify, describe, AddressCategory, ClassificationRule, RULES};

use std::net::IpAddr;

/// Render a socket peer address the way it is classified and stored.
///
/// IPv4-mapped IPv6 peers (from dual-stack listeners) are reported as plain
/// IPv4.
pub fn normalize_peer(ip: IpAddr) -> String {
    ip.to_canonical().to_string()
}

/// Normalize an address taken from a proxy header.
///
/// Takes the first entry of a comma-separated list, trims it, and drops a
/// `::ffff:` mapping prefix. Returns `None` for blank input.
pub fn normalize_forwarded(value: &str) -> Option<String> {
    let first = value.split(',').next()?.trim();
    if first.is_empty() {
        return None;
    }
    let stripped = first.strip_prefix("::ffff:").unwrap_or(first);
    Some(stripped.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn mapped_peer_becomes_ipv4() {
        let mapped = IpAddr::V6(Ipv4Addr::new(203, 0, 113, 9).to_ipv6_mapped());
        assert_eq!(normalize_peer(mapped), "203.0.113.9");
        assert_eq!(normalize_peer(IpAddr::V6(Ipv6Addr::LOCALHOST)), "::1");
    }

    #[test]
    fn forwarded_takes_first_hop() {
        assert_eq!(
            normalize_forwarded(" 203.0.113.9 , 10.0.0.1").as_deref(),
            Some("203.0.113.9")
        );
        assert_eq!(
            normalize_forwarded("::ffff:198.51.100.4").as_deref(),
            Some("198.51.100.4")
        );
        assert_eq!(normalize_forwarded("  "), None);
    }
}
