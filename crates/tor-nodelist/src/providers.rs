//! Capability traits for the subsystems the nodelist calls out to.
//!
//! The nodelist is deliberately leaf-like: GeoIP lookup, entry-guard
//! state, bootstrap reporting, authority policy, and exit-policy
//! evaluation all live elsewhere.  Each is modeled as a small trait, and a
//! [`NodelistProviders`] bag of optional handles is injected at
//! construction time.  A missing provider degrades to the "no
//! information" behavior documented on each trait.

use crate::doc::routerdesc::RouterInfo;
use crate::node::{Node, NodeFlags};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// A country code from a GeoIP database.
#[derive(Clone, Copy, Hash, Eq, PartialEq)]
pub struct CountryCode {
    /// The underlying two ASCII letters, uppercased.
    inner: [u8; 2],
}

impl CountryCode {
    /// Make a new `CountryCode` from a two-letter string.
    ///
    /// Returns None if the string is not two ASCII letters.
    pub fn new(code: &str) -> Option<Self> {
        let bytes: [u8; 2] = code.as_bytes().try_into().ok()?;
        if bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            Some(CountryCode {
                inner: bytes.map(|b| b.to_ascii_uppercase()),
            })
        } else {
            None
        }
    }
    /// Get the country code as a string.
    pub fn get(&self) -> &str {
        // This can't fail; the constructor checked for ASCII.
        std::str::from_utf8(&self.inner).unwrap_or("??")
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
impl fmt::Debug for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CountryCode({})", self.get())
    }
}

/// A source of GeoIP information.
pub trait CountryResolver: Send + Sync {
    /// Return the country where `addr` appears to be, if the database
    /// knows it.
    fn country_by_addr(&self, addr: IpAddr) -> Option<CountryCode>;
}

/// The entry-guard subsystem's view of directory readiness.
pub trait GuardUsability: Send + Sync {
    /// Return true if we have enough directory information about our
    /// primary entry guards to start building circuits through them.
    fn have_enough_dir_info_to_build_circuits(&self) -> bool;
}

/// A gate that can deliberately hold off directory activity.
pub trait DirFetchGate: Send + Sync {
    /// If directory fetches are being delayed on purpose (for example
    /// because the network is disabled), return a human-readable reason.
    fn should_delay_dir_fetches(&self) -> Option<String>;
}

/// A coarse phase of the bootstrap process, as reported to a controller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum BootstrapPhase {
    /// We are still fetching relay descriptors.
    RequestingDescriptors,
    /// We have enough directory information to connect to a relay.
    ConnOr,
}

/// A client-status transition, as reported to a controller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ClientStatusEvent {
    /// We now know enough of the network to build circuits.
    EnoughDirInfo,
    /// We no longer know enough of the network to build circuits.
    NotEnoughDirInfo,
}

/// A sink for bootstrap progress and client-status events.
pub trait StatusReporter: Send + Sync {
    /// Report that the bootstrap process has reached `phase`.
    fn bootstrap_phase(&self, phase: BootstrapPhase);
    /// Report a client-status transition.
    fn client_status(&self, status: ClientStatusEvent);
}

/// Policy decisions made when we are running as a v3 directory authority.
///
/// Installing an `AuthorityPolicy` provider is what makes the nodelist
/// behave as an authority: consensus flags are no longer mirrored into
/// nodes, and newly learned descriptors get authoritative flags instead.
pub trait AuthorityPolicy: Send + Sync {
    /// Derive the authoritative status flags for a relay we have just
    /// learned a descriptor for.
    fn authoritative_flags(&self, ri: &RouterInfo) -> NodeFlags;
}

/// The result of comparing an address and port against a relay's exit
/// policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum PolicyDecision {
    /// The policy accepts this address and port.
    Accepted,
    /// The policy rejects this address and port.
    Rejected,
    /// We don't have the full policy, but what we know suggests
    /// acceptance.
    ProbablyAccepted,
    /// We don't have the full policy, but what we know suggests
    /// rejection.
    ProbablyRejected,
}

/// An evaluator for full exit policies.
pub trait PolicyOracle: Send + Sync {
    /// Compare exiting to `addr`:`port` against `node`'s exit policy.
    fn compare_addr_to_node_policy(&self, addr: IpAddr, port: u16, node: &Node)
        -> PolicyDecision;
}

/// The collaborators a [`Nodelist`](crate::Nodelist) may call out to.
///
/// Every handle is optional; the default value has none.
#[derive(Clone, Default)]
#[non_exhaustive]
pub struct NodelistProviders {
    /// GeoIP lookup, for per-node country codes.
    pub geoip: Option<Arc<dyn CountryResolver>>,
    /// The entry-guard subsystem.
    pub guards: Option<Arc<dyn GuardUsability>>,
    /// The directory-fetch delay gate.
    pub fetch_gate: Option<Arc<dyn DirFetchGate>>,
    /// The controller event sink.
    pub status: Option<Arc<dyn StatusReporter>>,
    /// Authority policy.  Present if and only if we are running as a v3
    /// directory authority.
    pub authority: Option<Arc<dyn AuthorityPolicy>>,
    /// Full exit-policy evaluation.
    pub policy: Option<Arc<dyn PolicyOracle>>,
}

impl fmt::Debug for NodelistProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        /// Helper: render an optional provider as present or absent.
        fn p<T: ?Sized>(o: &Option<Arc<T>>) -> &'static str {
            if o.is_some() {
                "Some(..)"
            } else {
                "None"
            }
        }
        f.debug_struct("NodelistProviders")
            .field("geoip", &p(&self.geoip))
            .field("guards", &p(&self.guards))
            .field("fetch_gate", &p(&self.fetch_gate))
            .field("status", &p(&self.status))
            .field("authority", &p(&self.authority))
            .field("policy", &p(&self.policy))
            .finish()
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn country_code() {
        let cc = CountryCode::new("de").unwrap();
        assert_eq!(cc.get(), "DE");
        assert_eq!(cc, CountryCode::new("DE").unwrap());
        assert!(CountryCode::new("d3").is_none());
        assert!(CountryCode::new("deu").is_none());
        assert_eq!(format!("{}", cc), "DE");
    }
}
