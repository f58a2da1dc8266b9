//! Subprotocol versioning, as advertised in descriptors.
//!
//! Relays announce which versions of each Tor subprotocol they implement
//! with a space-separated list of `Name=Versions` entries, where
//! `Versions` is a comma-separated list of version numbers and ranges.
//! The nodelist needs only to answer "does this relay support version V of
//! protocol P?".

use crate::{Error, Result};
use std::str::FromStr;

/// A recognized subprotocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ProtoKind {
    /// Initiating and receiving channels, and getting cells on them.
    Link,
    /// Different kinds of authenticate cells.
    LinkAuth,
    /// CREATE cells, CREATED cells, and the encryption that they protect.
    Relay,
    /// Serving and fetching network directory documents.
    DirCache,
}

impl ProtoKind {
    /// Return the name used for this subprotocol in directory documents.
    pub fn name(&self) -> &'static str {
        match self {
            ProtoKind::Link => "Link",
            ProtoKind::LinkAuth => "LinkAuth",
            ProtoKind::Relay => "Relay",
            ProtoKind::DirCache => "DirCache",
        }
    }
}

/// A set of subprotocol versions, indexed by protocol name.
///
/// Unrecognized protocol names are retained, since the point of this
/// format is to allow relays to advertise support we don't know about yet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Protocols {
    /// A list of (protocol name, supported version ranges).
    entries: Vec<(String, Vec<(u32, u32)>)>,
}

impl Protocols {
    /// Return a new empty set of protocol versions.
    pub fn new() -> Self {
        Protocols::default()
    }

    /// Return true if this set includes support for version `version` of
    /// the given named protocol.
    pub fn supports_named(&self, name: &str, version: u32) -> bool {
        self.entries
            .iter()
            .filter(|(n, _)| n.as_str() == name)
            .flat_map(|(_, ranges)| ranges.iter())
            .any(|&(lo, hi)| lo <= version && version <= hi)
    }

    /// Return true if this set includes support for version `version` of
    /// the given recognized subprotocol.
    pub fn supports(&self, kind: ProtoKind, version: u32) -> bool {
        self.supports_named(kind.name(), version)
    }
}

impl FromStr for Protocols {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for ent in s.split_whitespace() {
            let (name, vers) = ent
                .split_once('=')
                .ok_or(Error::BadSyntax("protocol entry"))?;
            if name.is_empty() {
                return Err(Error::BadSyntax("protocol name"));
            }
            let mut ranges = Vec::new();
            for v in vers.split(',') {
                if v.is_empty() {
                    continue;
                }
                let (lo, hi) = match v.split_once('-') {
                    Some((a, b)) => (a, b),
                    None => (v, v),
                };
                let lo: u32 = lo.parse().map_err(|_| Error::BadSyntax("protocol version"))?;
                let hi: u32 = hi.parse().map_err(|_| Error::BadSyntax("protocol version"))?;
                if lo > hi {
                    return Err(Error::BadSyntax("protocol version range"));
                }
                ranges.push((lo, hi));
            }
            entries.push((name.to_string(), ranges));
        }
        Ok(Protocols { entries })
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn parse_and_check() {
        let p: Protocols = "Link=1-5 LinkAuth=1,3 DirCache=2".parse().unwrap();
        assert!(p.supports(ProtoKind::Link, 3));
        assert!(!p.supports(ProtoKind::Link, 6));
        assert!(p.supports(ProtoKind::LinkAuth, 3));
        assert!(!p.supports(ProtoKind::LinkAuth, 2));
        assert!(p.supports(ProtoKind::DirCache, 2));
        assert!(!p.supports(ProtoKind::Relay, 1));
        assert!(p.supports_named("DirCache", 2));
        assert!(!p.supports_named("Wombat", 2));
    }

    #[test]
    fn empty() {
        let p: Protocols = "".parse().unwrap();
        assert!(!p.supports(ProtoKind::LinkAuth, 3));
    }

    #[test]
    fn unrecognized_is_kept() {
        let p: Protocols = "Wombat=7-9".parse().unwrap();
        assert!(p.supports_named("Wombat", 8));
    }

    #[test]
    fn bad_input() {
        assert!("Link".parse::<Protocols>().is_err());
        assert!("=4".parse::<Protocols>().is_err());
        assert!("Link=zebra".parse::<Protocols>().is_err());
        assert!("Link=9-2".parse::<Protocols>().is_err());
    }
}
