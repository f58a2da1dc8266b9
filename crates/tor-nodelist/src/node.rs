//! The [`Node`] record: one relay, as the union of its documents.
//!
//! A node fuses up to three separately sourced records: the relay's own
//! descriptor (`ri`), its entry in the current consensus (`rs`), and its
//! microdescriptor (`md`).  Accessors here hide which of the three
//! supplies each attribute, falling through the sources in a fixed
//! precedence.  Callers should not reach inside a node; if no accessor
//! answers the question at hand, the right fix is a new accessor.

use crate::config::NodelistConfig;
use crate::doc::microdesc::Microdesc;
use crate::doc::netstatus::RouterStatus;
use crate::doc::routerdesc::{RouterInfo, RouterPurpose};
use crate::providers::CountryCode;
use crate::types::keys::{Ed25519Identity, RsaIdentity};
use crate::NodeIdx;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

/// An address family, for accessors that behave differently per family.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum AddrFamily {
    /// No particular address family.
    Unspec,
    /// IPv4.
    Ipv4,
    /// IPv6.
    Ipv6,
}

/// The status flags we cache on a node.
///
/// For a non-authority these mirror the relay's consensus flags; an
/// authority decides them for itself.  `rejects_all` is an authority-side
/// judgment and survives consensus changes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct NodeFlags {
    /// The relay is allowed on the network.
    pub is_valid: bool,
    /// The relay is currently running.
    pub is_running: bool,
    /// The relay has enough bandwidth for ordinary circuits.
    pub is_fast: bool,
    /// The relay is stable enough for long-lived circuits.
    pub is_stable: bool,
    /// The relay is suitable as an entry guard.
    pub is_possible_guard: bool,
    /// The relay permits exiting.
    pub is_exit: bool,
    /// The relay is a known-bad exit.
    pub is_bad_exit: bool,
    /// The relay participates in the onion-service directory ring.
    pub is_hs_dir: bool,
    /// We would rather reach this relay over IPv6.
    pub ipv6_preferred: bool,
    /// We have decided this relay's exit policy permits nothing.
    pub rejects_all: bool,
}

impl NodeFlags {
    /// Clear every flag that mirrors the consensus.
    ///
    /// (`rejects_all` is not consensus-derived, and stays.)
    pub(crate) fn clear_consensus_flags(&mut self) {
        let rejects_all = self.rejects_all;
        *self = NodeFlags {
            rejects_all,
            ..NodeFlags::default()
        };
    }
}

/// A single relay, as correlated from every document we hold about it.
///
/// Nodes are created and destroyed only by the
/// [`Nodelist`](crate::Nodelist); everything else refers to them through
/// shared references.  A node exists exactly as long as we hold a
/// descriptor or a consensus entry for its identity, and the same identity
/// always maps to the same node while it is alive.
#[derive(Debug)]
pub struct Node {
    /// The RSA identity digest of this relay.  Never changes.
    pub(crate) identity: RsaIdentity,
    /// This relay's own descriptor, if the router list holds one.
    pub(crate) ri: Option<Arc<RouterInfo>>,
    /// This relay's entry in the current consensus, if it has one.
    pub(crate) rs: Option<Arc<RouterStatus>>,
    /// This relay's microdescriptor, if the cache had it when we looked.
    pub(crate) md: Option<Arc<Microdesc>>,
    /// Our position in the nodelist's sequence, or None when detached.
    pub(crate) nodelist_idx: Option<NodeIdx>,
    /// The country this relay appears to be in; None until computed.
    pub(crate) country: Option<CountryCode>,
    /// When we last reached this relay over IPv4.
    pub(crate) last_reachable: Option<SystemTime>,
    /// When we last reached this relay over IPv6.
    pub(crate) last_reachable6: Option<SystemTime>,
    /// Cached status flags.
    pub(crate) flags: NodeFlags,
    /// Set once we have warned about an ambiguous nickname lookup that
    /// chose this node.
    pub(crate) name_lookup_warned: bool,
    /// Set once we have warned that this relay published an all-zero
    /// Ed25519 signing key.
    ed_zero_warned: AtomicBool,
}

impl Node {
    /// Construct a new, empty node for `identity`.
    pub(crate) fn new(identity: RsaIdentity) -> Self {
        Node {
            identity,
            ri: None,
            rs: None,
            md: None,
            nodelist_idx: None,
            country: None,
            last_reachable: None,
            last_reachable6: None,
            flags: NodeFlags::default(),
            name_lookup_warned: false,
            ed_zero_warned: AtomicBool::new(false),
        }
    }

    /// Return true if we hold enough information for this node to exist
    /// at all.
    pub(crate) fn is_usable(&self) -> bool {
        self.rs.is_some() || self.ri.is_some()
    }

    /// Forget address-derived state, because this relay's address has
    /// changed.
    pub(crate) fn addrs_changed(&mut self) {
        self.last_reachable = None;
        self.last_reachable6 = None;
        self.country = None;
    }

    /// Detach and return this node's microdescriptor, releasing our hold
    /// on it.
    pub(crate) fn take_md(&mut self) -> Option<Arc<Microdesc>> {
        let md = self.md.take()?;
        md.note_released();
        Some(md)
    }

    /// Attach `md` to this node, detaching any previous one, and record
    /// our hold on it.
    pub(crate) fn set_md(&mut self, md: Arc<Microdesc>) {
        self.take_md();
        md.note_held();
        self.md = Some(md);
    }

    /// Return the RSA identity digest of this relay.
    pub fn identity(&self) -> &RsaIdentity {
        &self.identity
    }
    /// Return the RSA identity digest of this relay.
    ///
    /// (Alias for [`Node::identity`], matching the rest of the `rsa_`
    /// accessor family.)
    pub fn rsa_id_digest(&self) -> &RsaIdentity {
        &self.identity
    }
    /// Return this relay's own descriptor, if the router list holds one.
    pub fn routerinfo(&self) -> Option<&Arc<RouterInfo>> {
        self.ri.as_ref()
    }
    /// Return this relay's entry in the current consensus, if it has one.
    pub fn routerstatus(&self) -> Option<&Arc<RouterStatus>> {
        self.rs.as_ref()
    }
    /// Return this relay's microdescriptor, if one is attached.
    pub fn microdesc(&self) -> Option<&Arc<Microdesc>> {
        self.md.as_ref()
    }
    /// Return the cached status flags of this node.
    pub fn flags(&self) -> &NodeFlags {
        &self.flags
    }
    /// Return the country this relay appears to be in, if we know it.
    pub fn country(&self) -> Option<CountryCode> {
        self.country
    }
    /// Return when we last reached this relay over the given address
    /// family, if we have.
    pub fn last_reachable(&self, family: AddrFamily) -> Option<SystemTime> {
        match family {
            AddrFamily::Ipv6 => self.last_reachable6,
            _ => self.last_reachable,
        }
    }
    /// Record that we reached this relay over the given address family at
    /// time `when`.
    pub fn note_reachable(&mut self, family: AddrFamily, when: SystemTime) {
        match family {
            AddrFamily::Ipv6 => self.last_reachable6 = Some(when),
            _ => self.last_reachable = Some(when),
        }
    }

    /// Return the nickname of this relay, if we know one.
    pub fn nickname(&self) -> Option<&str> {
        if let Some(rs) = &self.rs {
            Some(rs.nickname())
        } else {
            self.ri.as_ref().map(|ri| ri.nickname())
        }
    }

    /// Return the Ed25519 identity of this relay, if it has one.
    ///
    /// An all-zero key in a descriptor is a relay-side bug; we treat it as
    /// absent, and warn the first time we see it.
    pub fn ed25519_id(&self) -> Option<&Ed25519Identity> {
        if let Some(cert_key) = self.ri.as_ref().and_then(|ri| ri.signing_key_cert()) {
            if !cert_key.is_zero() {
                return Some(cert_key);
            }
            if !self.ed_zero_warned.swap(true, Ordering::Relaxed) {
                warn!(
                    "Relay {} published an all-zero Ed25519 signing key; ignoring it.",
                    self.identity
                );
            }
        }
        self.md.as_ref().and_then(|md| md.ed25519_id())
    }

    /// Return true if this relay's Ed25519 identity matches `id`.
    ///
    /// (An absent Ed25519 identity matches None, or an all-zero key.)
    pub fn ed25519_id_matches(&self, id: Option<&Ed25519Identity>) -> bool {
        match self.ed25519_id() {
            None => id.is_none_or(|k| k.is_zero()),
            Some(mine) if mine.is_zero() => id.is_none_or(|k| k.is_zero()),
            Some(mine) => id.is_some_and(|k| k == mine),
        }
    }

    /// Return true if this relay can authenticate itself by Ed25519
    /// identity during the link handshake, in a way we understand.
    pub fn supports_ed25519_link_authentication(&self) -> bool {
        use crate::types::protover::ProtoKind;
        if self.ed25519_id().is_none() {
            return false;
        }
        if let Some(ri) = &self.ri {
            return ri.protocols().supports(ProtoKind::LinkAuth, 3);
        }
        if let Some(rs) = &self.rs {
            return rs.supports_ed25519_link_handshake();
        }
        false
    }

    /// Return true if this relay seems to be a directory cache or
    /// authority.
    pub fn is_dir(&self) -> bool {
        if let Some(rs) = &self.rs {
            rs.is_flagged_v2dir()
        } else if let Some(ri) = &self.ri {
            ri.supports_tunnelled_dir_requests()
        } else {
            false
        }
    }

    /// Return true if this relay has either kind of usable descriptor: a
    /// router descriptor, or a consensus entry with its microdescriptor.
    pub fn has_descriptor(&self) -> bool {
        self.ri.is_some() || (self.rs.is_some() && self.md.is_some())
    }

    /// Return the purpose of this relay.
    pub fn purpose(&self) -> RouterPurpose {
        self.ri
            .as_ref()
            .map(|ri| ri.purpose())
            .unwrap_or(RouterPurpose::General)
    }

    /// Return this relay's declared uptime in seconds, if we know it.
    pub fn declared_uptime(&self) -> Option<u32> {
        self.ri.as_ref().and_then(|ri| ri.uptime())
    }

    /// Return this relay's platform string, if we know it.
    ///
    /// (The consensus lists a version too, but we don't record it; this
    /// accessor answers only from the descriptor.)
    pub fn platform(&self) -> Option<&str> {
        self.ri.as_ref().and_then(|ri| ri.platform())
    }

    /// Return the family tokens this relay declared, if any.
    pub fn declared_family(&self) -> Option<&[String]> {
        if let Some(ri) = &self.ri {
            if !ri.declared_family().is_empty() {
                return Some(ri.declared_family());
            }
        }
        if let Some(md) = &self.md {
            if !md.family().is_empty() {
                return Some(md.family());
            }
        }
        None
    }

    /// Return true if this relay says it is okay to exit directly from a
    /// one-hop circuit.
    pub fn allows_single_hop_exits(&self) -> bool {
        self.ri
            .as_ref()
            .map(|ri| ri.allow_single_hop_exits())
            .unwrap_or(false)
    }

    /// Return true if this relay's exit policy permits nothing, or if we
    /// don't know its policy at all.
    pub fn exit_policy_rejects_all(&self) -> bool {
        if self.flags.rejects_all {
            return true;
        }
        if let Some(ri) = &self.ri {
            ri.policy_is_reject_star()
        } else if let Some(md) = &self.md {
            md.exit_policy().is_none_or(|p| p.is_reject_star())
        } else {
            true
        }
    }

    /// Return true if we know this relay's exit policy exactly for the
    /// given address family, so that an unexpected rejection can be read
    /// as a failure of the relay.
    ///
    /// # Limitations
    ///
    /// For IPv6 this always answers false, even when we hold the relay's
    /// full descriptor.
    pub fn exit_policy_is_exact(&self, family: AddrFamily) -> bool {
        match family {
            // Rejecting an address without telling us which address is a
            // bad sign regardless of policy knowledge.
            AddrFamily::Unspec => true,
            AddrFamily::Ipv4 => self.ri.is_some(),
            AddrFamily::Ipv6 => false,
        }
    }

    /// Return true if this relay has a curve25519 onion key.
    pub fn has_curve25519_onion_key(&self) -> bool {
        if let Some(ri) = &self.ri {
            ri.ntor_onion_key().is_some_and(|k| !k.is_zero())
        } else if let Some(md) = &self.md {
            md.ntor_onion_key().is_some_and(|k| !k.is_zero())
        } else {
            false
        }
    }

    /// Return every OR port of this relay: the first usable IPv4 address
    /// we find, then the first usable IPv6 address.
    pub fn all_orports(&self) -> Vec<SocketAddr> {
        let mut out = Vec::with_capacity(2);
        if let Some(ap) = self.prim_orport() {
            out.push(ap);
        }
        if let Some(ap) = self.pref_ipv6_orport() {
            out.push(ap);
        }
        out
    }

    /// Return the primary (IPv4) OR address and port of this relay.
    ///
    /// Microdescriptors never carry IPv4 addresses, so only the
    /// descriptor and the consensus entry are consulted.
    pub fn prim_orport(&self) -> Option<SocketAddr> {
        if let Some(ap) = self.ri.as_ref().and_then(|ri| ri.orport_v4()) {
            return Some(ap);
        }
        self.rs.as_ref().and_then(|rs| rs.orport_v4())
    }

    /// Return the IPv6 OR address and port we would use for this relay,
    /// if it has one.
    ///
    /// The consensus entry wins over the microdescriptor, to stay
    /// consistent with the firewall-preference logic.
    pub fn pref_ipv6_orport(&self) -> Option<SocketAddr> {
        if let Some(ap) = self.ri.as_ref().and_then(|ri| ri.orport_v6()) {
            return Some(ap);
        }
        if let Some(ap) = self.rs.as_ref().and_then(|rs| rs.orport_v6()) {
            return Some(ap);
        }
        self.md.as_ref().and_then(|md| md.orport_v6())
    }

    /// Return true if we would rather reach this relay over IPv6.
    pub fn ipv6_or_preferred(&self, config: &NodelistConfig) -> bool {
        if !config.use_ipv6 {
            return false;
        }
        if self.flags.ipv6_preferred || self.prim_orport().is_none() {
            return self.pref_ipv6_orport().is_some();
        }
        false
    }

    /// Return the OR address and port we would actually use for this
    /// relay.
    pub fn pref_orport(&self, config: &NodelistConfig) -> Option<SocketAddr> {
        if self.ipv6_or_preferred(config) {
            self.pref_ipv6_orport()
        } else {
            self.prim_orport()
        }
    }

    /// Return the primary (IPv4) directory address and port of this
    /// relay.
    pub fn prim_dirport(&self) -> Option<SocketAddr> {
        if let Some(ri) = &self.ri {
            if let Some(ap) = dirport_v4(ri.addr().into(), ri.dir_port()) {
                return Some(ap);
            }
        }
        if let Some(rs) = &self.rs {
            if let Some(ap) = dirport_v4(rs.addr().into(), rs.dir_port()) {
                return Some(ap);
            }
        }
        None
    }

    /// Return the IPv6 directory address and port we would use for this
    /// relay, if it has one.
    ///
    /// (Relays are assumed to serve their directory port on the same port
    /// for IPv4 and IPv6.)
    pub fn pref_ipv6_dirport(&self) -> Option<SocketAddr> {
        if let Some(ri) = &self.ri {
            if let Some(ap) = dirport_v6(ri.ipv6_addr(), ri.dir_port()) {
                return Some(ap);
            }
        }
        if let Some(rs) = &self.rs {
            if let Some(ap) = dirport_v6(rs.ipv6_addr(), rs.dir_port()) {
                return Some(ap);
            }
        }
        None
    }

    /// Return true if we would rather reach this relay's directory port
    /// over IPv6.
    pub fn ipv6_dir_preferred(&self, config: &NodelistConfig) -> bool {
        if !config.use_ipv6 {
            return false;
        }
        if self.prim_dirport().is_none() || config.prefers_ipv6_dirport() {
            return self.pref_ipv6_dirport().is_some();
        }
        false
    }

    /// Return the directory address and port we would actually use for
    /// this relay.
    pub fn pref_dirport(&self, config: &NodelistConfig) -> Option<SocketAddr> {
        if self.ipv6_dir_preferred(config) {
            self.pref_ipv6_dirport()
        } else {
            self.prim_dirport()
        }
    }

    /// Return true if this relay advertises any usable IPv6 address.
    pub fn has_ipv6_addr(&self) -> bool {
        /// Helper: is this a usable IPv6 address?
        fn ok(addr: Option<std::net::Ipv6Addr>) -> bool {
            addr.is_some_and(|a| !a.is_unspecified())
        }
        ok(self.ri.as_ref().and_then(|ri| ri.ipv6_addr()))
            || ok(self.rs.as_ref().and_then(|rs| rs.ipv6_addr()))
            || ok(self.md.as_ref().and_then(|md| md.ipv6_addr()))
    }

    /// Return true if this relay has a usable IPv6 OR port.
    pub fn has_ipv6_orport(&self) -> bool {
        self.pref_ipv6_orport().is_some()
    }

    /// Return true if this relay has a usable IPv6 directory port.
    pub fn has_ipv6_dirport(&self) -> bool {
        self.pref_ipv6_dirport().is_some()
    }

    /// Return the primary address of this relay, if we know one.
    pub fn prim_addr(&self) -> Option<IpAddr> {
        self.prim_orport().map(|ap| ap.ip())
    }

    /// Return a string form of this relay's primary address, if we know
    /// one.
    pub fn address_string(&self) -> Option<String> {
        self.prim_addr().map(|a| a.to_string())
    }

    /// Return true if this relay is unsuitable for the stated needs.
    pub fn is_unreliable(&self, need_uptime: bool, need_capacity: bool, need_guard: bool) -> bool {
        if need_uptime && !self.flags.is_stable {
            return true;
        }
        if need_capacity && !self.flags.is_fast {
            return true;
        }
        if need_guard && !self.flags.is_possible_guard {
            return true;
        }
        false
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if let Some(md) = self.md.take() {
            md.note_released();
        }
    }
}

/// Helper: an IPv4 directory address/port pair, if it describes a real
/// listener.
fn dirport_v4(addr: IpAddr, port: u16) -> Option<SocketAddr> {
    match addr {
        IpAddr::V4(a) if !a.is_unspecified() && port != 0 => Some(SocketAddr::new(addr, port)),
        _ => None,
    }
}

/// Helper: an IPv6 directory address/port pair, if it describes a real
/// listener.
fn dirport_v6(addr: Option<std::net::Ipv6Addr>, port: u16) -> Option<SocketAddr> {
    let addr = addr?;
    if addr.is_unspecified() || port == 0 {
        None
    } else {
        Some(SocketAddr::new(IpAddr::V6(addr), port))
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::doc::netstatus::{RelayFlags, RelayWeight, RouterStatus};
    use std::net::SocketAddr;

    /// Build a descriptor for tests here.
    fn test_ri() -> Arc<RouterInfo> {
        Arc::new(
            RouterInfo::builder()
                .identity([1; 20].into())
                .nickname("Alpha")
                .add_or_port(SocketAddr::from(([10, 0, 0, 1], 9001)))
                .dir_port(9030)
                .build()
                .unwrap(),
        )
    }

    /// Build a consensus entry for tests here.
    fn test_rs() -> Arc<RouterStatus> {
        Arc::new(
            RouterStatus::builder()
                .identity([1; 20].into())
                .nickname("AlphaPrime")
                .add_or_port(SocketAddr::from(([10, 0, 0, 2], 9101)))
                .add_or_port("[2001:db8::2]:9101".parse().unwrap())
                .dir_port(9131)
                .doc_digest([3; 32])
                .set_flags(RelayFlags::RUNNING | RelayFlags::VALID)
                .weight(RelayWeight::Measured(100))
                .build()
                .unwrap(),
        )
    }

    /// Build a microdescriptor for tests here.
    fn test_md() -> Arc<Microdesc> {
        Arc::new(
            Microdesc::builder()
                .digest([3; 32])
                .ed25519_id([9; 32].into())
                .ipv6_orport("2001:db8::3".parse().unwrap(), 9201)
                .parse_exit_policy("accept 80")
                .unwrap()
                .testing_md()
                .unwrap(),
        )
    }

    #[test]
    fn empty_node() {
        let node = Node::new([1; 20].into());
        assert!(!node.is_usable());
        assert_eq!(node.nickname(), None);
        assert_eq!(node.ed25519_id(), None);
        assert!(node.ed25519_id_matches(None));
        assert!(!node.has_descriptor());
        assert!(!node.is_dir());
        assert!(node.exit_policy_rejects_all());
        assert_eq!(node.prim_orport(), None);
        assert_eq!(node.all_orports(), Vec::<SocketAddr>::new());
        assert_eq!(node.purpose(), RouterPurpose::General);
    }

    #[test]
    fn nickname_prefers_rs() {
        let mut node = Node::new([1; 20].into());
        node.ri = Some(test_ri());
        assert_eq!(node.nickname(), Some("Alpha"));
        node.rs = Some(test_rs());
        assert_eq!(node.nickname(), Some("AlphaPrime"));
    }

    #[test]
    fn orport_precedence() {
        let mut node = Node::new([1; 20].into());
        node.rs = Some(test_rs());
        assert_eq!(node.prim_orport(), Some(SocketAddr::from(([10, 0, 0, 2], 9101))));
        // The descriptor wins once it is present.
        node.ri = Some(test_ri());
        assert_eq!(node.prim_orport(), Some(SocketAddr::from(([10, 0, 0, 1], 9001))));

        // IPv6: the descriptor has none, so the consensus entry answers,
        // ahead of the microdescriptor.
        node.set_md(test_md());
        assert_eq!(
            node.pref_ipv6_orport(),
            Some("[2001:db8::2]:9101".parse().unwrap())
        );
        node.rs = None;
        assert_eq!(
            node.pref_ipv6_orport(),
            Some("[2001:db8::3]:9201".parse().unwrap())
        );
        node.take_md();
    }

    #[test]
    fn all_orports_order() {
        let mut node = Node::new([1; 20].into());
        node.rs = Some(test_rs());
        let got = node.all_orports();
        assert_eq!(
            got,
            vec![
                SocketAddr::from(([10, 0, 0, 2], 9101)),
                "[2001:db8::2]:9101".parse().unwrap()
            ]
        );
    }

    #[test]
    fn ipv6_preference() {
        let mut config = NodelistConfig::default();
        let mut node = Node::new([1; 20].into());
        node.rs = Some(test_rs());

        // IPv6 disabled: always IPv4.
        assert!(!node.ipv6_or_preferred(&config));
        assert_eq!(node.pref_orport(&config), node.prim_orport());

        // IPv6 enabled but not preferred, and we have IPv4.
        config.use_ipv6 = true;
        assert!(!node.ipv6_or_preferred(&config));

        // Preference flag set on the node.
        node.flags.ipv6_preferred = true;
        assert!(node.ipv6_or_preferred(&config));
        assert_eq!(node.pref_orport(&config), node.pref_ipv6_orport());
    }

    #[test]
    fn dirports() {
        let config = NodelistConfig {
            use_ipv6: true,
            prefer_ipv6_dirport: true,
            ..NodelistConfig::default()
        };
        let mut node = Node::new([1; 20].into());
        node.rs = Some(test_rs());
        assert_eq!(node.prim_dirport(), Some(SocketAddr::from(([10, 0, 0, 2], 9131))));
        assert_eq!(
            node.pref_ipv6_dirport(),
            Some("[2001:db8::2]:9131".parse().unwrap())
        );
        assert!(node.ipv6_dir_preferred(&config));
        assert_eq!(node.pref_dirport(&config), node.pref_ipv6_dirport());
    }

    #[test]
    fn ed25519_precedence_and_zeros() {
        let mut node = Node::new([1; 20].into());
        node.set_md(test_md());
        node.rs = Some(test_rs());
        assert_eq!(node.ed25519_id(), Some(&[9; 32].into()));

        // A descriptor with a real key takes precedence.
        let ri = RouterInfo::builder()
            .identity([1; 20].into())
            .add_or_port(SocketAddr::from(([10, 0, 0, 1], 9001)))
            .signing_key_cert([7; 32].into())
            .build()
            .unwrap();
        node.ri = Some(Arc::new(ri));
        assert_eq!(node.ed25519_id(), Some(&[7; 32].into()));
        assert!(node.ed25519_id_matches(Some(&[7; 32].into())));
        assert!(!node.ed25519_id_matches(Some(&[8; 32].into())));
        assert!(!node.ed25519_id_matches(None));

        // An all-zero key in the descriptor is treated as absent, and we
        // fall back to the microdescriptor.
        let ri = RouterInfo::builder()
            .identity([1; 20].into())
            .add_or_port(SocketAddr::from(([10, 0, 0, 1], 9001)))
            .signing_key_cert([0; 32].into())
            .build()
            .unwrap();
        node.ri = Some(Arc::new(ri));
        assert_eq!(node.ed25519_id(), Some(&[9; 32].into()));
        node.take_md();
    }

    #[test]
    fn link_auth_support() {
        let mut node = Node::new([1; 20].into());
        node.set_md(test_md());
        let mut rs = RouterStatus::builder();
        rs.identity([1; 20].into())
            .add_or_port(SocketAddr::from(([10, 0, 0, 2], 9101)))
            .doc_digest([3; 32])
            .ed25519_link_handshake(true);
        node.rs = Some(Arc::new(rs.build().unwrap()));
        // No ri: the consensus entry answers.
        assert!(node.supports_ed25519_link_authentication());

        // With an ri, its protocol list decides, even though the rs says
        // yes.
        let mut bld = RouterInfo::builder();
        bld.identity([1; 20].into())
            .add_or_port(SocketAddr::from(([10, 0, 0, 1], 9001)))
            .signing_key_cert([7; 32].into());
        node.ri = Some(Arc::new(bld.clone().build().unwrap()));
        assert!(!node.supports_ed25519_link_authentication());
        bld.protocols("LinkAuth=1,3".parse().unwrap());
        node.ri = Some(Arc::new(bld.build().unwrap()));
        assert!(node.supports_ed25519_link_authentication());
        node.take_md();
    }

    #[test]
    fn exit_policies() {
        let mut node = Node::new([1; 20].into());
        // Nothing known: treated as rejecting.
        assert!(node.exit_policy_rejects_all());

        node.set_md(test_md());
        assert!(!node.exit_policy_rejects_all());

        let mut bld = RouterInfo::builder();
        bld.identity([1; 20].into())
            .add_or_port(SocketAddr::from(([10, 0, 0, 1], 9001)))
            .policy_is_reject_star(true);
        node.ri = Some(Arc::new(bld.build().unwrap()));
        assert!(node.exit_policy_rejects_all());

        // The cached authority judgment wins over everything.
        node.ri = Some(test_ri());
        assert!(!node.exit_policy_rejects_all());
        node.flags.rejects_all = true;
        assert!(node.exit_policy_rejects_all());

        assert!(node.exit_policy_is_exact(AddrFamily::Unspec));
        assert!(node.exit_policy_is_exact(AddrFamily::Ipv4));
        assert!(!node.exit_policy_is_exact(AddrFamily::Ipv6));
        node.ri = None;
        assert!(!node.exit_policy_is_exact(AddrFamily::Ipv4));
        node.take_md();
    }

    #[test]
    fn md_hold_released_on_drop() {
        let md = test_md();
        {
            let mut node = Node::new([1; 20].into());
            node.set_md(Arc::clone(&md));
            assert_eq!(md.held_by_nodes(), 1);
        }
        assert_eq!(md.held_by_nodes(), 0);
    }
}
