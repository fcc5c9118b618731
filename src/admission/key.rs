// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Normalized client identity.

use std::net::IpAddr;

use serde::Serialize;

/// Admission-tracking key derived from the client's network address.
///
/// IPv4-mapped IPv6 addresses collapse to their IPv4 form. Clients behind a
/// shared NAT share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(ip.to_canonical().to_string())
    }

    /// Normalize a raw address string. Non-address identities pass through.
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<IpAddr>() {
            Ok(ip) => Self::from_ip(ip),
            Err(_) if raw.is_empty() => Self("unknown".to_string()),
            Err(_) => Self(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Address of the client `hops` proxies back from the socket peer.
///
/// The proxy chain is the `X-Forwarded-For` entries followed by `peer`. Zero
/// hops means the peer itself is the client. A chain shorter than `hops`
/// yields its leftmost address, and walking stops at the first entry that is
/// not an IP address.
pub fn forwarded_client(peer: IpAddr, forwarded_for: Option<&str>, hops: usize) -> IpAddr {
    let Some(chain) = forwarded_for else {
        return peer;
    };

    let mut client = peer;
    for entry in chain.rsplit(',').take(hops) {
        match entry.trim().parse::<IpAddr>() {
            Ok(ip) => client = ip,
            Err(_) => break,
        }
    }
    client
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self::from_ip(ip)
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn one_hop_takes_rightmost_forwarded_address() {
        let peer = ip("127.0.0.1");
        assert_eq!(
            forwarded_client(peer, Some("203.0.113.9, 198.51.100.0"), 1),
            ip("198.51.100.0")
        );
        assert_eq!(forwarded_client(peer, Some("198.51.100.1"), 1), ip("198.51.100.1"));
    }

    #[test]
    fn zero_hops_ignores_forwarded_header() {
        assert_eq!(
            forwarded_client(ip("127.0.0.1"), Some("198.51.100.0"), 0),
            ip("127.0.0.1")
        );
    }

    #[test]
    fn more_hops_walk_further_left() {
        let chain = Some("203.0.113.9, 198.51.100.4, 10.0.0.2");
        assert_eq!(forwarded_client(ip("10.0.0.1"), chain, 2), ip("198.51.100.4"));
        assert_eq!(forwarded_client(ip("10.0.0.1"), chain, 10), ip("203.0.113.9"));
    }

    #[test]
    fn missing_or_garbled_header_falls_back() {
        let peer = ip("198.51.100.7");
        assert_eq!(forwarded_client(peer, None, 1), peer);
        assert_eq!(forwarded_client(peer, Some(""), 1), peer);
        assert_eq!(forwarded_client(peer, Some("203.0.113.9, unknown"), 2), peer);
    }

    #[test]
    fn mapped_ipv6_collapses_to_ipv4() {
        assert_eq!(
            ClientKey::from_raw("::ffff:203.0.113.5"),
            ClientKey::from_raw("203.0.113.5")
        );
        assert_eq!(ClientKey::from_raw("::FFFF:203.0.113.5").as_str(), "203.0.113.5");
    }

    #[test]
    fn plain_ipv6_is_kept() {
        assert_eq!(ClientKey::from_raw("::1").as_str(), "::1");
        assert_eq!(
            ClientKey::from_raw("2001:db8::1").as_str(),
            "2001:db8::1"
        );
    }

    #[test]
    fn ip_and_raw_forms_agree() {
        let ip: IpAddr = "::ffff:198.51.100.7".parse().unwrap();
        assert_eq!(ClientKey::from(ip), ClientKey::from_raw("198.51.100.7"));
    }

    #[test]
    fn non_address_identities_pass_through() {
        assert_eq!(ClientKey::from_raw("localhost").as_str(), "localhost");
        assert_eq!(ClientKey::from_raw("  ").as_str(), "unknown");
    }
}
