//! Address classification.
//!
//! Classification is an ordered rule table evaluated top to bottom; the first
//! matching rule wins. Order matters because rules overlap textually (an
//! address can satisfy a broad prefix and a narrower exact match), so the
//! table is the single source of truth for precedence.

use serde::Serialize;
use std::fmt;

/// Coarse category of a client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressCategory {
    LoopbackV6,
    LinkLocalV6,
    LoopbackV4,
    PrivateV4,
    LinkLocalV4,
    CgnatV4,
    Unspecified,
    Broadcast,
    Public,
}

impl AddressCategory {
    /// Human-readable description appended to non-public addresses.
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            AddressCategory::LoopbackV6 => Some("localhost IPv6 access"),
            AddressCategory::LinkLocalV6 => Some("link-local IPv6 access"),
            AddressCategory::LoopbackV4 => Some("localhost IPv4 access"),
            AddressCategory::PrivateV4 => Some("private IPv4 access"),
            AddressCategory::LinkLocalV4 => Some("link-local IPv4 access"),
            AddressCategory::CgnatV4 => Some("CGNAT IPv4 access"),
            AddressCategory::Unspecified => Some("unspecified address"),
            AddressCategory::Broadcast => Some("broadcast address"),
            AddressCategory::Public => None,
        }
    }

    pub fn is_public(self) -> bool {
        self == AddressCategory::Public
    }
}

impl fmt::Display for AddressCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressCategory::LoopbackV6 => write!(f, "loopback_v6"),
            AddressCategory::LinkLocalV6 => write!(f, "link_local_v6"),
            AddressCategory::LoopbackV4 => write!(f, "loopback_v4"),
            AddressCategory::PrivateV4 => write!(f, "private_v4"),
            AddressCategory::LinkLocalV4 => write!(f, "link_local_v4"),
            AddressCategory::CgnatV4 => write!(f, "cgnat_v4"),
            AddressCategory::Unspecified => write!(f, "unspecified"),
            AddressCategory::Broadcast => write!(f, "broadcast"),
            AddressCategory::Public => write!(f, "public"),
        }
    }
}

/// One entry of the precedence table.
pub struct ClassificationRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub category: AddressCategory,
}

/// Precedence-ordered classification rules. Anything unmatched is public.
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "loopback IPv6 ::1",
        matches: |a| a == "::1",
        category: AddressCategory::LoopbackV6,
    },
    ClassificationRule {
        name: "link-local IPv6 fe80::/10",
        matches: |a| a.starts_with("fe80:"),
        category: AddressCategory::LinkLocalV6,
    },
    ClassificationRule {
        name: "loopback IPv4 127.0.0.0/8",
        matches: |a| a.starts_with("127."),
        category: AddressCategory::LoopbackV4,
    },
    ClassificationRule {
        name: "private IPv4 10.0.0.0/8",
        matches: |a| a.starts_with("10."),
        category: AddressCategory::PrivateV4,
    },
    ClassificationRule {
        name: "private IPv4 172.16.0.0/12",
        matches: |a| second_octet_in(a, "172.", 16, 31),
        category: AddressCategory::PrivateV4,
    },
    ClassificationRule {
        name: "private IPv4 192.168.0.0/16",
        matches: |a| a.starts_with("192.168."),
        category: AddressCategory::PrivateV4,
    },
    ClassificationRule {
        name: "link-local IPv4 169.254.0.0/16",
        matches: |a| a.starts_with("169.254."),
        category: AddressCategory::LinkLocalV4,
    },
    ClassificationRule {
        name: "CGNAT IPv4 100.64.0.0/10",
        matches: |a| second_octet_in(a, "100.", 64, 127),
        category: AddressCategory::CgnatV4,
    },
    ClassificationRule {
        name: "unspecified 0.0.0.0",
        matches: |a| a == "0.0.0.0",
        category: AddressCategory::Unspecified,
    },
    ClassificationRule {
        name: "broadcast 255.255.255.255",
        matches: |a| a == "255.255.255.255",
        category: AddressCategory::Broadcast,
    },
];

/// Classify an address string. Never fails; unknown input is public.
pub fn classify(address: &str) -> AddressCategory {
    RULES
        .iter()
        .find(|rule| (rule.matches)(address))
        .map(|rule| rule.category)
        .unwrap_or(AddressCategory::Public)
}

/// `"<address> - <suffix>"` for non-public addresses, the bare address otherwise.
pub fn describe(address: &str) -> String {
    match classify(address).suffix() {
        Some(suffix) => format!("{address} - {suffix}"),
        None => address.to_string(),
    }
}

/// `address` starts with `first` and its next dotted component is a
/// canonical decimal octet within `lo..=hi`, followed by another dot.
fn second_octet_in(address: &str, first: &str, lo: u8, hi: u8) -> bool {
    let Some(rest) = address.strip_prefix(first) else {
        return false;
    };
    let Some((octet, _)) = rest.split_once('.') else {
        return false;
    };
    if octet.is_empty() || (octet.len() > 1 && octet.starts_with('0')) {
        return false;
    }
    if !octet.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    matches!(octet.parse::<u8>(), Ok(n) if (lo..=hi).contains(&n))
}
