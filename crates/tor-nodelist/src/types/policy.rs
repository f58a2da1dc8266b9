//! Short exit policies: lists of port ranges a relay will connect to.
//!
//! Microdescriptors summarize a relay's exit policy as a list of accepted
//! or rejected ports, with no address information.  We represent such a
//! policy in a normalized form: the set of ports that the relay permits.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A range of ports, with inclusive endpoints.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct PortRange {
    /// Lowest port in this range.
    lo: u16,
    /// Highest port in this range.
    hi: u16,
}

impl PortRange {
    /// Create a new port range, validating its order.
    fn new(lo: u16, hi: u16) -> Result<Self> {
        if lo == 0 || lo > hi {
            return Err(Error::BadSyntax("port range"));
        }
        Ok(PortRange { lo, hi })
    }
    /// Return true if this range contains `port`.
    fn contains(&self, port: u16) -> bool {
        self.lo <= port && port <= self.hi
    }
}

impl FromStr for PortRange {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let (lo, hi) = match s.split_once('-') {
            Some((a, b)) => (a, b),
            None => (s, s),
        };
        let lo = lo.parse().map_err(|_| Error::BadSyntax("port"))?;
        let hi = hi.parse().map_err(|_| Error::BadSyntax("port"))?;
        PortRange::new(lo, hi)
    }
}

/// A policy over ports: a compact description of which ports a relay is
/// willing to connect to.
///
/// The policy is stored as the set of allowed ports, with the ranges
/// sorted, deduplicated, and merged.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortPolicy {
    /// A list of the allowed ports, sorted and merged.
    allowed: Vec<PortRange>,
}

impl fmt::Display for PortPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.allowed.is_empty() {
            return write!(f, "reject 1-65535");
        }
        write!(f, "accept ")?;
        let mut comma = "";
        for range in &self.allowed {
            if range.lo == range.hi {
                write!(f, "{}{}", comma, range.lo)?;
            } else {
                write!(f, "{}{}-{}", comma, range.lo, range.hi)?;
            }
            comma = ",";
        }
        Ok(())
    }
}

impl PortPolicy {
    /// Return a new PortPolicy that rejects all ports.
    pub fn new_reject_all() -> Self {
        PortPolicy {
            allowed: Vec::new(),
        }
    }
    /// Return true iff `port` is allowed by this policy.
    pub fn allows_port(&self, port: u16) -> bool {
        self.allowed.iter().any(|range| range.contains(port))
    }
    /// Return true if this policy allows any port at all.
    pub fn allows_some_port(&self) -> bool {
        !self.allowed.is_empty()
    }
    /// Return true if this policy is "reject 1-65535": that is, if it
    /// permits nothing.
    pub fn is_reject_star(&self) -> bool {
        !self.allows_some_port()
    }

    /// Helper: replace this policy with its inverse.
    fn invert(&mut self) {
        let mut prev_hi = 0_u16;
        let mut new_allowed = Vec::new();
        for range in &self.allowed {
            // (We don't need to check for overflow here, since the ranges
            // are sorted and merged, and lo is never zero.)
            if range.lo > prev_hi + 1 {
                new_allowed.push(PortRange {
                    lo: prev_hi + 1,
                    hi: range.lo - 1,
                });
            }
            prev_hi = range.hi;
        }
        if prev_hi < 65535 {
            new_allowed.push(PortRange {
                lo: prev_hi + 1,
                hi: 65535,
            });
        }
        self.allowed = new_allowed;
    }

    /// Helper: sort the ranges and merge the ones that touch.
    fn normalize(&mut self) {
        self.allowed.sort_by_key(|r| (r.lo, r.hi));
        let mut merged: Vec<PortRange> = Vec::with_capacity(self.allowed.len());
        for range in &self.allowed {
            match merged.last_mut() {
                Some(prev) if u32::from(range.lo) <= u32::from(prev.hi) + 1 => {
                    prev.hi = prev.hi.max(range.hi);
                }
                _ => merged.push(*range),
            }
        }
        self.allowed = merged;
    }
}

impl FromStr for PortPolicy {
    type Err = Error;
    fn from_str(mut s: &str) -> Result<Self> {
        let invert = if let Some(rest) = s.strip_prefix("accept ") {
            s = rest;
            false
        } else if let Some(rest) = s.strip_prefix("reject ") {
            s = rest;
            true
        } else {
            return Err(Error::BadSyntax("port policy"));
        };
        let mut result = PortPolicy {
            allowed: Vec::new(),
        };
        for item in s.split(',') {
            result.allowed.push(item.trim().parse()?);
        }
        result.normalize();
        if invert {
            result.invert();
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn parse_accept() {
        let p: PortPolicy = "accept 80,443".parse().unwrap();
        assert!(p.allows_port(80));
        assert!(p.allows_port(443));
        assert!(!p.allows_port(81));
        assert!(p.allows_some_port());
        assert!(!p.is_reject_star());
        assert_eq!(p.to_string(), "accept 80,443");
    }

    #[test]
    fn parse_reject() {
        let p: PortPolicy = "reject 1-65535".parse().unwrap();
        assert!(!p.allows_port(80));
        assert!(p.is_reject_star());
        assert_eq!(p, PortPolicy::new_reject_all());

        let p: PortPolicy = "reject 1-79,8000".parse().unwrap();
        assert!(p.allows_port(80));
        assert!(p.allows_port(7999));
        assert!(!p.allows_port(8000));
        assert!(p.allows_port(8001));
        assert!(p.allows_port(65535));
        assert!(!p.allows_port(25));
    }

    #[test]
    fn merge_ranges() {
        let p: PortPolicy = "accept 1-100,50-200,201-300".parse().unwrap();
        assert_eq!(p.to_string(), "accept 1-300");
    }

    #[test]
    fn bad_input() {
        assert!("permit 80".parse::<PortPolicy>().is_err());
        assert!("accept 99999".parse::<PortPolicy>().is_err());
        assert!("accept 0-10".parse::<PortPolicy>().is_err());
        assert!("accept 30-10".parse::<PortPolicy>().is_err());
    }
}
