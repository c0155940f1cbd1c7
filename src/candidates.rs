//! Candidate generation: ordered, deduplicated lists of base URLs to probe.
//!
//! Ordering only affects how fast a sweep finds the backend, never whether it does.
//! The one ordering guarantee is that priority octets come first.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::url::BaseUrl;

/// Last octets commonly handed out to routers, single-board computers and
/// static assignments.
pub const PRIORITY_OCTETS: [u8; 11] = [1, 2, 10, 20, 50, 100, 101, 108, 150, 200, 254];

/// Home-router defaults tried when the own subnet is unknown or empty.
pub const COMMON_PREFIXES: [&str; 10] = [
    "192.168.0",
    "192.168.1",
    "192.168.2",
    "192.168.8",
    "192.168.31",
    "192.168.50",
    "192.168.43",
    "10.0.0",
    "10.0.1",
    "10.1.1",
];

/// The first three octets of a /24 network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubnetPrefix([u8; 3]);

impl SubnetPrefix {
    pub fn new(a: u8, b: u8, c: u8) -> Self {
        SubnetPrefix([a, b, c])
    }

    pub fn of(ip: Ipv4Addr) -> Self {
        let [a, b, c, _] = ip.octets();
        SubnetPrefix([a, b, c])
    }

    pub fn host(&self, last: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, last)
    }
}

impl fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}.{b}.{c}")
    }
}

impl FromStr for SubnetPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(format!("expected three dotted octets, got {s:?}"));
        }
        let mut octets = [0u8; 3];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("invalid octet {part:?} in {s:?}"))?;
        }
        Ok(SubnetPrefix(octets))
    }
}

/// Derives the /24 prefix from a dotted `a.b.c.d` string; anything else is `None`.
pub fn extract_subnet_prefix(ip: &str) -> Option<SubnetPrefix> {
    ip.trim().parse::<Ipv4Addr>().ok().map(SubnetPrefix::of)
}

/// Drops duplicates, keeping the first occurrence.
pub fn dedup(candidates: impl IntoIterator<Item = BaseUrl>) -> Vec<BaseUrl> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    port: u16,
    priority_octets: Vec<u8>,
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        CandidateGenerator::new(crate::config::DEFAULT_PORT, PRIORITY_OCTETS.to_vec())
    }
}

impl CandidateGenerator {
    /// Octets outside 1..=254 and repeats are dropped from `priority_octets`.
    pub fn new(port: u16, priority_octets: Vec<u8>) -> Self {
        let mut seen = HashSet::new();
        let priority_octets = priority_octets
            .into_iter()
            .filter(|o| (1..=254).contains(o) && seen.insert(*o))
            .collect();
        CandidateGenerator {
            port,
            priority_octets,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn candidate(&self, prefix: SubnetPrefix, last: u8) -> BaseUrl {
        BaseUrl::from_host(&prefix.host(last).to_string(), self.port)
    }

    pub fn priority_hosts(&self, prefix: SubnetPrefix) -> Vec<BaseUrl> {
        self.priority_octets
            .iter()
            .map(|&o| self.candidate(prefix, o))
            .collect()
    }

    /// Every host of the /24 except `own_last`, priority octets first, the rest
    /// ascending.
    pub fn subnet_candidates(&self, prefix: SubnetPrefix, own_last: Option<u8>) -> Vec<BaseUrl> {
        let priority: Vec<u8> = self
            .priority_octets
            .iter()
            .copied()
            .filter(|&o| Some(o) != own_last)
            .collect();
        let rest = (1..=254u8).filter(|o| Some(*o) != own_last && !priority.contains(o));
        priority
            .iter()
            .copied()
            .chain(rest)
            .map(|o| self.candidate(prefix, o))
            .collect()
    }

    /// Plain 1..=254 sweep.
    pub fn full_prefix_candidates(&self, prefix: SubnetPrefix) -> Vec<BaseUrl> {
        (1..=254u8).map(|o| self.candidate(prefix, o)).collect()
    }

    /// Persisted URL, configured fallback, then well-known hostnames on the
    /// discovery port.
    pub fn direct_candidates(
        &self,
        persisted: Option<&BaseUrl>,
        fallback: Option<&BaseUrl>,
        hostnames: &[String],
    ) -> Vec<BaseUrl> {
        let hosts = hostnames
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(|h| BaseUrl::from_host(h, self.port));
        dedup(persisted.cloned().into_iter().chain(fallback.cloned()).chain(hosts))
    }
}
