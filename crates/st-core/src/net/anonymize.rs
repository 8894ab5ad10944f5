//! Address anonymization.
//!
//! Public addresses are truncated before they are shown to anyone:
//! IPv4 keeps the first three octets (`203.0.113.x`), IPv6 keeps the first
//! three groups (`2001:db8:85a3::`). Local and private addresses carry no
//! external privacy risk and are returned unchanged.

use super::classify::classify;
use std::net::IpAddr;
use tracing::warn;

/// Separator between the address and the description in a processed string.
pub const PROCESSED_SEPARATOR: &str = " - ";

/// Truncate a public address. Unparseable input is returned unchanged.
pub fn anonymize(address: &str) -> String {
    if !classify(address).is_public() {
        return address.to_string();
    }

    match address.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => truncate_v4(address),
        Ok(IpAddr::V6(v6)) if v6.to_ipv4_mapped().is_some() => truncate_v4(address),
        Ok(IpAddr::V6(_)) => truncate_v6(address),
        Err(_) => address.to_string(),
    }
}

fn truncate_v4(address: &str) -> String {
    let parts: Vec<&str> = address.split('.').collect();
    if parts.len() == 4 {
        format!("{}.{}.{}.x", parts[0], parts[1], parts[2])
    } else {
        address.to_string()
    }
}

fn truncate_v6(address: &str) -> String {
    let parts: Vec<&str> = address.split(':').collect();
    if parts.len() >= 3 {
        format!("{}:{}:{}::", parts[0], parts[1], parts[2])
    } else {
        address.to_string()
    }
}

/// Split `"<ip> - <description>"` into the address and the remainder.
///
/// The remainder keeps the separator. Returns `None` when there is no
/// separator or the left-hand side is not an IP address.
pub fn split_processed_string(processed: &str) -> Option<(&str, &str)> {
    let index = processed.find(PROCESSED_SEPARATOR)?;
    let (ip, remainder) = processed.split_at(index);
    if ip.parse::<IpAddr>().is_err() {
        warn!(candidate = %ip, "processed string does not start with an IP address");
        return None;
    }
    Some((ip, remainder))
}
