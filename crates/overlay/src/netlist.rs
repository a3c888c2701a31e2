//! IP network allowlists.
//!
//! Operators can restrict outbound dials to a set of CIDR networks. When a
//! [`Netlist`] is configured on the scheduler, destinations outside every
//! mask are rejected and statically configured peers outside the list are
//! dropped.

use crate::{OverlayError, Result};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// A single CIDR mask, IPv4 or IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpMask {
    addr: IpAddr,
    prefix: u8,
}

impl IpMask {
    /// Creates a mask, validating the prefix length against the address
    /// family (0..=32 for IPv4, 0..=128 for IPv6).
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max {
            return Err(OverlayError::InvalidNetlist(format!(
                "prefix /{} out of range for {}",
                prefix, addr
            )));
        }
        Ok(Self { addr, prefix })
    }

    /// True when `ip` falls inside this mask.
    ///
    /// Addresses of the other family never match.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(base), IpAddr::V4(ip)) => {
                if self.prefix == 0 {
                    return true;
                }
                let shift = 32 - u32::from(self.prefix);
                u32::from(base) >> shift == u32::from(ip) >> shift
            }
            (IpAddr::V6(base), IpAddr::V6(ip)) => {
                if self.prefix == 0 {
                    return true;
                }
                let shift = 128 - u32::from(self.prefix);
                u128::from(base) >> shift == u128::from(ip) >> shift
            }
            _ => false,
        }
    }
}

impl FromStr for IpMask {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| OverlayError::InvalidNetlist(format!("missing prefix in {:?}", s)))?;
        let addr: IpAddr = addr
            .trim()
            .parse()
            .map_err(|_| OverlayError::InvalidNetlist(format!("bad address in {:?}", s)))?;
        let prefix: u8 = prefix
            .trim()
            .parse()
            .map_err(|_| OverlayError::InvalidNetlist(format!("bad prefix in {:?}", s)))?;
        Self::new(addr, prefix)
    }
}

impl fmt::Display for IpMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// An ordered list of CIDR masks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netlist {
    masks: Vec<IpMask>,
}

impl Netlist {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-separated list of CIDR masks, e.g.
    /// `"10.0.0.0/8, fe80::/64"`. Empty segments are ignored.
    pub fn parse(s: &str) -> Result<Self> {
        let mut list = Self::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            list.add(part.parse()?);
        }
        Ok(list)
    }

    /// Appends a mask to the list.
    pub fn add(&mut self, mask: IpMask) {
        self.masks.push(mask);
    }

    /// True when `ip` falls inside any mask.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.masks.iter().any(|mask| mask.contains(ip))
    }

    /// Number of masks in the list.
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// True when the list has no masks.
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_contains_v4() {
        let mask: IpMask = "10.0.0.0/8".parse().unwrap();
        assert!(mask.contains("10.1.2.3".parse().unwrap()));
        assert!(!mask.contains("192.0.2.1".parse().unwrap()));
    }

    #[test]
    fn test_mask_contains_v6() {
        let mask: IpMask = "fe80::/64".parse().unwrap();
        assert!(mask.contains("fe80::1".parse().unwrap()));
        assert!(!mask.contains("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_mask_zero_prefix_matches_family() {
        let mask: IpMask = "0.0.0.0/0".parse().unwrap();
        assert!(mask.contains("192.0.2.1".parse().unwrap()));
        assert!(!mask.contains("::1".parse().unwrap()));
    }

    #[test]
    fn test_mask_rejects_bad_input() {
        assert!("10.0.0.0".parse::<IpMask>().is_err());
        assert!("10.0.0.0/33".parse::<IpMask>().is_err());
        assert!("not-an-ip/8".parse::<IpMask>().is_err());
    }

    #[test]
    fn test_netlist_parse() {
        let list = Netlist::parse("10.0.0.0/8, 192.168.0.0/16").unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains("10.9.8.7".parse().unwrap()));
        assert!(list.contains("192.168.1.1".parse().unwrap()));
        assert!(!list.contains("172.16.0.1".parse().unwrap()));
    }

    #[test]
    fn test_netlist_empty_never_matches() {
        let list = Netlist::new();
        assert!(list.is_empty());
        assert!(!list.contains("10.0.0.1".parse().unwrap()));
    }
}
