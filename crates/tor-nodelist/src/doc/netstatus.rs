//! Consensus documents: the network's periodically voted view of itself.
//!
//! A [`Consensus`] lists one [`RouterStatus`] per known relay, along with
//! network parameters, bandwidth weights, and nickname bindings.  The
//! nodelist treats the consensus as immutable: it is replaced wholesale
//! when a new one becomes usable.

use crate::doc::DocDigest;
use crate::types::keys::RsaIdentity;
use crate::{Error, Result};
use bitflags::bitflags;
use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// How long after its declared expiry do we still consider a consensus
/// "reasonably live"?
///
/// (A not-quite-fresh consensus is still a workable picture of the
/// network; a day-old one is not.)
pub const REASONABLY_LIVE_TIME: Duration = Duration::from_secs(24 * 60 * 60);

/// What kind of consensus document is this?
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ConsensusFlavor {
    /// A "microdesc"-flavored consensus, where each relay is matched to a
    /// microdescriptor by digest.
    Microdesc,
    /// A plain ("ns"-flavored) consensus, where each relay is matched to a
    /// full descriptor by digest.
    Plain,
}

impl ConsensusFlavor {
    /// Return the name of this consensus flavor.
    pub fn name(&self) -> &'static str {
        match self {
            ConsensusFlavor::Microdesc => "microdesc",
            ConsensusFlavor::Plain => "ns",
        }
    }
}

/// The lifetime of a networkstatus document.
///
/// This type describes when the consensus may safely be used.
#[derive(Clone, Debug)]
pub struct Lifetime {
    /// Time at which the document becomes valid.
    valid_after: SystemTime,
    /// Time after which there is expected to be a better version of this
    /// consensus.
    fresh_until: SystemTime,
    /// Time after which this consensus is expired.
    valid_until: SystemTime,
}

impl Lifetime {
    /// Construct a new Lifetime.
    pub fn new(
        valid_after: SystemTime,
        fresh_until: SystemTime,
        valid_until: SystemTime,
    ) -> Result<Self> {
        if valid_after < fresh_until && fresh_until < valid_until {
            Ok(Lifetime {
                valid_after,
                fresh_until,
                valid_until,
            })
        } else {
            Err(Error::InvalidLifetime)
        }
    }
    /// Return the time at which this consensus becomes valid.
    pub fn valid_after(&self) -> SystemTime {
        self.valid_after
    }
    /// Return the time at which a fresher consensus is expected.
    pub fn fresh_until(&self) -> SystemTime {
        self.fresh_until
    }
    /// Return the time at which this consensus expires.
    pub fn valid_until(&self) -> SystemTime {
        self.valid_until
    }
    /// Return true if this consensus is officially valid at the provided
    /// time.
    pub fn valid_at(&self, when: SystemTime) -> bool {
        self.valid_after <= when && when <= self.valid_until
    }
}

/// A set of named network parameters, encoded as space-separated `K=V`
/// entries.
///
/// These describe current settings for the network, weighting parameters
/// for path selection, and so on.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NetParams<T> {
    /// Map from keys to values.
    params: HashMap<String, T>,
}

impl<T> NetParams<T> {
    /// Create a new empty list of NetParams.
    pub fn new() -> Self {
        NetParams {
            params: HashMap::new(),
        }
    }
    /// Retrieve a given network parameter, if it is present.
    pub fn get<A: AsRef<str>>(&self, v: A) -> Option<&T> {
        self.params.get(v.as_ref())
    }
    /// Return an iterator over all key value pairs in an arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.params.iter()
    }
    /// Set or replace the value of a network parameter.
    pub fn set(&mut self, k: String, v: T) {
        self.params.insert(k, v);
    }
}

impl NetParams<i32> {
    /// Look up the parameter `key`, falling back to `default` if it is
    /// absent, and clamping the result to `[low, high]`.
    pub fn get_clamped(&self, key: &str, default: i32, low: i32, high: i32) -> i32 {
        debug_assert!(low <= high);
        self.get(key).copied().unwrap_or(default).clamp(low, high)
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for NetParams<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(i: I) -> Self {
        NetParams {
            params: i.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl FromStr for NetParams<i32> {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let mut params = NetParams::new();
        for ent in s.split_whitespace() {
            let (k, v) = ent.split_once('=').ok_or(Error::BadSyntax("network parameter"))?;
            let v: i32 = v.parse().map_err(|_| Error::BadSyntax("network parameter"))?;
            params.set(k.to_string(), v);
        }
        Ok(params)
    }
}

bitflags! {
    /// A set of recognized directory flags on a single relay.
    ///
    /// These flags come from the consensus, and describe what the
    /// authorities believe about the relay.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct RelayFlags: u16 {
        /// Is this relay considered "valid" -- allowed to be on the
        /// network?
        const VALID = (1 << 0);
        /// Is this relay currently running?
        const RUNNING = (1 << 1);
        /// Is this relay considered "fast" above a certain threshold?
        const FAST = (1 << 2);
        /// Is this relay considered "stable" enough for long-lived
        /// circuits?
        const STABLE = (1 << 3);
        /// Is this relay suitable for use as a guard relay?
        const GUARD = (1 << 4);
        /// Is this relay marked as an exit for weighting purposes?
        const EXIT = (1 << 5);
        /// Is this relay marked as a bad exit?
        ///
        /// Bad exits can be used as intermediate relays, but not to
        /// deliver traffic.
        const BAD_EXIT = (1 << 6);
        /// Does this relay participate on the onion service directory
        /// ring?
        const HSDIR = (1 << 7);
        /// Does this relay support a currently recognized version of the
        /// directory protocol?
        const V2DIR = (1 << 8);
    }
}

/// The weight the consensus assigns to a single relay.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RelayWeight {
    /// A weight that the authorities measured.
    Measured(u32),
    /// A weight that the relay claimed for itself, unconfirmed.
    Unmeasured(u32),
}

impl RelayWeight {
    /// Return true if this weight is the result of a successful measurement.
    pub fn is_measured(&self) -> bool {
        matches!(self, RelayWeight::Measured(_))
    }
    /// Return true if this weight is nonzero.
    pub fn is_nonzero(&self) -> bool {
        !matches!(self, RelayWeight::Measured(0) | RelayWeight::Unmeasured(0))
    }
}

/// A single relay's entry in a consensus document.
#[derive(Clone, Debug)]
pub struct RouterStatus {
    /// The RSA identity of the relay.
    identity: RsaIdentity,
    /// The nickname the relay claims for itself.
    nickname: String,
    /// The relay's IPv4 address.
    addr: Ipv4Addr,
    /// The relay's IPv4 OR port.
    or_port: u16,
    /// The relay's IPv4 directory port.
    dir_port: u16,
    /// The relay's IPv6 address, if it advertised one.
    ipv6_addr: Option<Ipv6Addr>,
    /// The relay's IPv6 OR port.
    ipv6_orport: u16,
    /// Digest of the document this entry stands for.
    doc_digest: DocDigest,
    /// Flags voted on this relay.
    flags: RelayFlags,
    /// The consensus weight of this relay.
    weight: RelayWeight,
    /// True if the relay can authenticate its Ed25519 identity during the
    /// link handshake.
    ed25519_link_handshake: bool,
}

impl RouterStatus {
    /// Return a new builder for constructing a RouterStatus.
    pub fn builder() -> RouterStatusBuilder {
        RouterStatusBuilder::new()
    }
    /// Return the RSA identity of the relay described here.
    pub fn rsa_identity(&self) -> &RsaIdentity {
        &self.identity
    }
    /// Return the nickname of the relay described here.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }
    /// Return the digest of the descriptor (or microdescriptor, depending
    /// on the consensus flavor) matched to this entry.
    pub fn descriptor_digest(&self) -> &DocDigest {
        &self.doc_digest
    }
    /// Return the relay's IPv4 address.
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }
    /// Return the relay's IPv4 directory port.
    pub fn dir_port(&self) -> u16 {
        self.dir_port
    }
    /// Return the relay's IPv6 address, if it advertised one.
    pub fn ipv6_addr(&self) -> Option<Ipv6Addr> {
        self.ipv6_addr
    }
    /// Return the relay's IPv6 OR port.
    pub fn ipv6_orport(&self) -> u16 {
        self.ipv6_orport
    }
    /// Return the IPv4 OR address and port, if they are usable.
    pub fn orport_v4(&self) -> Option<SocketAddr> {
        valid_v4(self.addr, self.or_port)
    }
    /// Return the IPv6 OR address and port, if they are usable.
    pub fn orport_v6(&self) -> Option<SocketAddr> {
        valid_v6(self.ipv6_addr, self.ipv6_orport)
    }
    /// Return the flags voted on this relay.
    pub fn flags(&self) -> RelayFlags {
        self.flags
    }
    /// Return true if this relay has the Valid flag.
    pub fn is_flagged_valid(&self) -> bool {
        self.flags.contains(RelayFlags::VALID)
    }
    /// Return true if this relay has the Running flag.
    pub fn is_flagged_running(&self) -> bool {
        self.flags.contains(RelayFlags::RUNNING)
    }
    /// Return true if this relay has the Fast flag.
    pub fn is_flagged_fast(&self) -> bool {
        self.flags.contains(RelayFlags::FAST)
    }
    /// Return true if this relay has the Stable flag.
    pub fn is_flagged_stable(&self) -> bool {
        self.flags.contains(RelayFlags::STABLE)
    }
    /// Return true if this relay has the Guard flag.
    pub fn is_flagged_guard(&self) -> bool {
        self.flags.contains(RelayFlags::GUARD)
    }
    /// Return true if this relay has the Exit flag.
    pub fn is_flagged_exit(&self) -> bool {
        self.flags.contains(RelayFlags::EXIT)
    }
    /// Return true if this relay has the BadExit flag.
    pub fn is_flagged_bad_exit(&self) -> bool {
        self.flags.contains(RelayFlags::BAD_EXIT)
    }
    /// Return true if this relay has the HSDir flag.
    pub fn is_flagged_hsdir(&self) -> bool {
        self.flags.contains(RelayFlags::HSDIR)
    }
    /// Return true if this relay has the V2Dir flag.
    pub fn is_flagged_v2dir(&self) -> bool {
        self.flags.contains(RelayFlags::V2DIR)
    }
    /// Return the consensus weight of this relay.
    pub fn weight(&self) -> &RelayWeight {
        &self.weight
    }
    /// Return true if this relay can authenticate its Ed25519 identity
    /// during the link handshake.
    pub fn supports_ed25519_link_handshake(&self) -> bool {
        self.ed25519_link_handshake
    }
}

/// Return true if a client would consider using the relay `rs` at all.
///
/// (Descriptor-age checks are the router list's business; the consensus
/// only tells us whether the authorities consider the relay usable.)
pub fn client_would_use_router(rs: &RouterStatus) -> bool {
    rs.is_flagged_running() && rs.is_flagged_valid()
}

/// Helper: an IPv4 address/port pair, if it describes a real listener.
fn valid_v4(addr: Ipv4Addr, port: u16) -> Option<SocketAddr> {
    if addr.is_unspecified() || port == 0 {
        None
    } else {
        Some(SocketAddrV4::new(addr, port).into())
    }
}

/// Helper: an IPv6 address/port pair, if it describes a real listener.
fn valid_v6(addr: Option<Ipv6Addr>, port: u16) -> Option<SocketAddr> {
    let addr = addr?;
    if addr.is_unspecified() || port == 0 {
        None
    } else {
        Some(SocketAddrV6::new(addr, port, 0, 0).into())
    }
}

/// A single consensus networkstatus document.
#[derive(Clone, Debug)]
pub struct Consensus {
    /// What kind of consensus document is this?
    flavor: ConsensusFlavor,
    /// When may this consensus be used?
    lifetime: Lifetime,
    /// The network parameters this consensus advertises.
    params: NetParams<i32>,
    /// How to weight different kinds of relays in different path
    /// positions.
    weights: NetParams<i32>,
    /// One entry per relay on the network.
    relays: Vec<Arc<RouterStatus>>,
    /// Index from descriptor digest to position in `relays`.
    desc_by_digest: HashMap<DocDigest, usize>,
    /// Nicknames that the consensus binds to a specific identity, keyed in
    /// lowercase.
    named: HashMap<String, RsaIdentity>,
    /// Nicknames that are claimed by some relay not listed here, keyed in
    /// lowercase.
    unnamed: HashSet<String>,
}

impl Consensus {
    /// Return a new ConsensusBuilder for building consensus objects of a
    /// given flavor.
    pub fn builder(flavor: ConsensusFlavor) -> ConsensusBuilder {
        ConsensusBuilder::new(flavor)
    }
    /// Return the flavor of this consensus.
    pub fn flavor(&self) -> ConsensusFlavor {
        self.flavor
    }
    /// Return the declared lifetime of this consensus.
    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }
    /// Return the map of network parameters that this consensus
    /// advertises.
    pub fn params(&self) -> &NetParams<i32> {
        &self.params
    }
    /// Return a mapping from keywords to integers representing how to
    /// weight different kinds of relays in different path positions.
    pub fn bandwidth_weights(&self) -> &NetParams<i32> {
        &self.weights
    }
    /// Return a slice of all the routerstatus entries in this consensus.
    pub fn relays(&self) -> &[Arc<RouterStatus>] {
        &self.relays[..]
    }
    /// Return the routerstatus entry whose descriptor digest is `digest`,
    /// if any.
    pub fn relay_by_descriptor_digest(&self, digest: &DocDigest) -> Option<&Arc<RouterStatus>> {
        self.desc_by_digest.get(digest).map(|&i| &self.relays[i])
    }
    /// Return the identity that this consensus binds `nickname` to, if
    /// any.
    pub fn router_digest_by_nickname(&self, nickname: &str) -> Option<RsaIdentity> {
        self.named.get(&nickname.to_ascii_lowercase()).copied()
    }
    /// Return true if `nickname` is listed as claimed by some relay not in
    /// this consensus.
    pub fn nickname_is_unnamed(&self, nickname: &str) -> bool {
        self.unnamed.contains(&nickname.to_ascii_lowercase())
    }
    /// Return true if this consensus is still a workable picture of the
    /// network at time `now`.
    ///
    /// A consensus stays usable for [`REASONABLY_LIVE_TIME`] past its
    /// declared expiry.
    pub fn reasonably_live(&self, now: SystemTime) -> bool {
        self.lifetime.valid_after() <= now
            && now <= self.lifetime.valid_until() + REASONABLY_LIVE_TIME
    }
}

/// A builder to construct a [`Consensus`] directly, without parsing.
#[derive(Clone, Debug)]
pub struct ConsensusBuilder {
    /// See [`Consensus::flavor`].
    flavor: ConsensusFlavor,
    /// See [`Consensus::lifetime`].
    lifetime: Option<Lifetime>,
    /// See [`Consensus::params`].
    params: NetParams<i32>,
    /// See [`Consensus::weights`].
    weights: NetParams<i32>,
    /// See [`Consensus::relays`].
    relays: Vec<RouterStatus>,
    /// See [`Consensus::named`].
    named: HashMap<String, RsaIdentity>,
    /// See [`Consensus::unnamed`].
    unnamed: HashSet<String>,
}

impl ConsensusBuilder {
    /// Construct a new ConsensusBuilder object.
    fn new(flavor: ConsensusFlavor) -> Self {
        ConsensusBuilder {
            flavor,
            lifetime: None,
            params: NetParams::new(),
            weights: NetParams::new(),
            relays: Vec::new(),
            named: HashMap::new(),
            unnamed: HashSet::new(),
        }
    }
    /// Set the lifetime of this consensus.
    pub fn lifetime(&mut self, lifetime: Lifetime) -> &mut Self {
        self.lifetime = Some(lifetime);
        self
    }
    /// Set the value of a parameter in this consensus.
    pub fn param<S: Into<String>>(&mut self, param: S, val: i32) -> &mut Self {
        self.params.set(param.into(), val);
        self
    }
    /// Set the bandwidth weights of this consensus.
    pub fn weights(&mut self, weights: NetParams<i32>) -> &mut Self {
        self.weights = weights;
        self
    }
    /// Bind `nickname` to `identity` in this consensus, as a "Named"
    /// entry.
    pub fn named<S: Into<String>>(&mut self, nickname: S, identity: RsaIdentity) -> &mut Self {
        self.named
            .insert(nickname.into().to_ascii_lowercase(), identity);
        self
    }
    /// Mark `nickname` as "Unnamed": claimed by a relay not listed here.
    pub fn unnamed<S: Into<String>>(&mut self, nickname: S) -> &mut Self {
        self.unnamed.insert(nickname.into().to_ascii_lowercase());
        self
    }
    /// Return a routerstatus builder whose result will be added to this
    /// consensus by [`RouterStatusBuilder::build_into`].
    pub fn rs(&self) -> RouterStatusBuilder {
        RouterStatusBuilder::new()
    }
    /// Add a routerstatus entry to this consensus.
    pub(crate) fn add_rs(&mut self, rs: RouterStatus) {
        self.relays.push(rs);
    }
    /// Try to construct a consensus object from this builder.
    pub fn testing_consensus(&self) -> Result<Consensus> {
        let lifetime = self.lifetime.clone().ok_or(Error::MissingField("lifetime"))?;
        let relays: Vec<Arc<RouterStatus>> =
            self.relays.iter().cloned().map(Arc::new).collect();
        let desc_by_digest = relays
            .iter()
            .enumerate()
            .map(|(i, rs)| (*rs.descriptor_digest(), i))
            .collect();
        Ok(Consensus {
            flavor: self.flavor,
            lifetime,
            params: self.params.clone(),
            weights: self.weights.clone(),
            relays,
            desc_by_digest,
            named: self.named.clone(),
            unnamed: self.unnamed.clone(),
        })
    }
}

/// A builder for a single [`RouterStatus`] entry.
#[derive(Clone, Debug)]
pub struct RouterStatusBuilder {
    /// See [`RouterStatus::identity`].
    identity: Option<RsaIdentity>,
    /// See [`RouterStatus::nickname`].
    nickname: String,
    /// See [`RouterStatus::addr`] and the related port fields.
    addr: Ipv4Addr,
    /// See [`RouterStatus::or_port`].
    or_port: u16,
    /// See [`RouterStatus::dir_port`].
    dir_port: u16,
    /// See [`RouterStatus::ipv6_addr`].
    ipv6_addr: Option<Ipv6Addr>,
    /// See [`RouterStatus::ipv6_orport`].
    ipv6_orport: u16,
    /// See [`RouterStatus::doc_digest`].
    doc_digest: Option<DocDigest>,
    /// See [`RouterStatus::flags`].
    flags: RelayFlags,
    /// See [`RouterStatus::weight`].
    weight: RelayWeight,
    /// See [`RouterStatus::ed25519_link_handshake`].
    ed25519_link_handshake: bool,
}

impl RouterStatusBuilder {
    /// Construct a new RouterStatusBuilder.
    fn new() -> Self {
        RouterStatusBuilder {
            identity: None,
            nickname: "Unnamed".to_string(),
            addr: Ipv4Addr::UNSPECIFIED,
            or_port: 0,
            dir_port: 0,
            ipv6_addr: None,
            ipv6_orport: 0,
            doc_digest: None,
            flags: RelayFlags::empty(),
            weight: RelayWeight::Unmeasured(0),
            ed25519_link_handshake: false,
        }
    }
    /// Set the RSA identity for this routerstatus.  (Required.)
    pub fn identity(&mut self, identity: RsaIdentity) -> &mut Self {
        self.identity = Some(identity);
        self
    }
    /// Set the nickname for this routerstatus.
    pub fn nickname<S: Into<String>>(&mut self, nickname: S) -> &mut Self {
        self.nickname = nickname.into();
        self
    }
    /// Add an OR port at `addr` to this routerstatus.  (An IPv4 port is
    /// required.)
    pub fn add_or_port(&mut self, addr: SocketAddr) -> &mut Self {
        match addr {
            SocketAddr::V4(a) => {
                self.addr = *a.ip();
                self.or_port = a.port();
            }
            SocketAddr::V6(a) => {
                self.ipv6_addr = Some(*a.ip());
                self.ipv6_orport = a.port();
            }
        }
        self
    }
    /// Set the directory port for this routerstatus.
    pub fn dir_port(&mut self, port: u16) -> &mut Self {
        self.dir_port = port;
        self
    }
    /// Set the descriptor digest for this routerstatus.  (Required.)
    pub fn doc_digest(&mut self, digest: DocDigest) -> &mut Self {
        self.doc_digest = Some(digest);
        self
    }
    /// Replace the flags in this routerstatus with `flags`.
    pub fn set_flags(&mut self, flags: RelayFlags) -> &mut Self {
        self.flags = flags;
        self
    }
    /// Make all the flags in `flags` become set on this routerstatus, in
    /// addition to the flags already set.
    pub fn add_flags(&mut self, flags: RelayFlags) -> &mut Self {
        self.flags |= flags;
        self
    }
    /// Set the weight of this routerstatus.
    pub fn weight(&mut self, weight: RelayWeight) -> &mut Self {
        self.weight = weight;
        self
    }
    /// Declare whether this relay can authenticate its Ed25519 identity
    /// during the link handshake.
    pub fn ed25519_link_handshake(&mut self, support: bool) -> &mut Self {
        self.ed25519_link_handshake = support;
        self
    }
    /// Try to build a RouterStatus from this builder.
    pub fn build(&self) -> Result<RouterStatus> {
        let identity = self.identity.ok_or(Error::MissingField("identity"))?;
        let doc_digest = self.doc_digest.ok_or(Error::MissingField("doc_digest"))?;
        if self.or_port == 0 {
            return Err(Error::MissingField("or_port"));
        }
        Ok(RouterStatus {
            identity,
            nickname: self.nickname.clone(),
            addr: self.addr,
            or_port: self.or_port,
            dir_port: self.dir_port,
            ipv6_addr: self.ipv6_addr,
            ipv6_orport: self.ipv6_orport,
            doc_digest,
            flags: self.flags,
            weight: self.weight,
            ed25519_link_handshake: self.ed25519_link_handshake,
        })
    }
    /// Try to build a RouterStatus and add it to `builder`.
    pub fn build_into(&self, builder: &mut ConsensusBuilder) -> Result<()> {
        builder.add_rs(self.build()?);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::time::Duration;

    /// Return a lifetime starting at the epoch-ish `now` used by tests.
    fn lifetime(now: SystemTime) -> Lifetime {
        let hour = Duration::from_secs(3600);
        Lifetime::new(now, now + hour, now + 2 * hour).unwrap()
    }

    #[test]
    fn lifetime_ordering() {
        let now = SystemTime::now();
        let hour = Duration::from_secs(3600);
        assert!(Lifetime::new(now, now + hour, now + 2 * hour).is_ok());
        assert!(Lifetime::new(now + hour, now, now + 2 * hour).is_err());
        assert!(Lifetime::new(now, now, now + hour).is_err());

        let lt = lifetime(now);
        assert!(lt.valid_at(now + hour));
        assert!(!lt.valid_at(now - hour));
    }

    #[test]
    fn reasonably_live() {
        let now = SystemTime::now();
        let mut bld = Consensus::builder(ConsensusFlavor::Microdesc);
        bld.lifetime(lifetime(now));
        let c = bld.testing_consensus().unwrap();
        assert!(c.reasonably_live(now));
        assert!(c.reasonably_live(now + Duration::from_secs(3600 * 25)));
        assert!(!c.reasonably_live(now + Duration::from_secs(3600 * 27)));
        assert!(!c.reasonably_live(now - Duration::from_secs(10)));
    }

    #[test]
    fn params_parse_and_clamp() {
        let p: NetParams<i32> = "bwweightscale=1 circwindow=500".parse().unwrap();
        assert_eq!(p.get("bwweightscale"), Some(&1));
        assert_eq!(p.get_clamped("circwindow", 1000, 100, 1000), 500);
        assert_eq!(p.get_clamped("missing", 60, 25, 95), 60);
        assert_eq!(p.get_clamped("circwindow", 1000, 501, 1000), 501);
        assert!("bogus".parse::<NetParams<i32>>().is_err());
        assert!("x=y".parse::<NetParams<i32>>().is_err());
    }

    #[test]
    fn build_consensus() {
        let now = SystemTime::now();
        let mut bld = Consensus::builder(ConsensusFlavor::Microdesc);
        bld.lifetime(lifetime(now))
            .param("bwweightscale", 1)
            .named("alpha", [1; 20].into())
            .unnamed("beta");
        bld.rs()
            .identity([1; 20].into())
            .nickname("Alpha")
            .add_or_port(SocketAddr::from(([10, 0, 0, 1], 9001)))
            .doc_digest([9; 32])
            .set_flags(RelayFlags::RUNNING | RelayFlags::VALID)
            .weight(RelayWeight::Measured(1000))
            .build_into(&mut bld)
            .unwrap();
        let c = bld.testing_consensus().unwrap();
        assert_eq!(c.relays().len(), 1);
        let rs = c.relay_by_descriptor_digest(&[9; 32]).unwrap();
        assert_eq!(rs.nickname(), "Alpha");
        assert!(rs.is_flagged_running() && rs.is_flagged_valid());
        assert!(!rs.is_flagged_exit());
        assert!(client_would_use_router(rs));
        assert_eq!(c.router_digest_by_nickname("ALPHA"), Some([1; 20].into()));
        assert_eq!(c.router_digest_by_nickname("gamma"), None);
        assert!(c.nickname_is_unnamed("Beta"));
        assert!(!c.nickname_is_unnamed("alpha"));
        assert_eq!(rs.orport_v4(), Some(SocketAddr::from(([10, 0, 0, 1], 9001))));
        assert_eq!(rs.orport_v6(), None);
    }

    #[test]
    fn builder_requires_fields() {
        let mut rs = RouterStatus::builder();
        assert!(rs.build().is_err());
        rs.identity([1; 20].into());
        assert!(rs.build().is_err());
        rs.doc_digest([2; 32]);
        assert!(rs.build().is_err());
        rs.add_or_port(SocketAddr::from(([10, 0, 0, 1], 9001)));
        assert!(rs.build().is_ok());
    }
}
