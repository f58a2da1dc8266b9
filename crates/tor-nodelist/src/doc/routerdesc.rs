//! Router descriptors: a relay's own account of itself.
//!
//! A router descriptor is self-signed by the relay it describes.  The
//! router list owns these; the nodelist attaches one per node and is told
//! before the router list lets go of it.

use crate::doc::DocDigest;
use crate::types::keys::{Curve25519Public, Ed25519Identity, RsaIdentity};
use crate::types::protover::Protocols;
use crate::{Error, Result};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Why this relay is in our directory.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum RouterPurpose {
    /// An ordinary relay, learned from the directory.
    #[default]
    General,
    /// A bridge, configured or learned out of band.
    Bridge,
    /// A relay inserted by a controller.
    Controller,
}

/// A relay's self-published router descriptor.
#[derive(Clone, Debug)]
pub struct RouterInfo {
    /// The RSA identity of this relay.
    identity: RsaIdentity,
    /// The nickname this relay claims for itself.
    nickname: String,
    /// The IPv4 address of this relay.
    addr: Ipv4Addr,
    /// The IPv4 OR port of this relay.
    or_port: u16,
    /// The IPv4 directory port of this relay.
    dir_port: u16,
    /// The IPv6 address of this relay, if it advertised one.
    ipv6_addr: Option<Ipv6Addr>,
    /// The IPv6 OR port of this relay.
    ipv6_orport: u16,
    /// The digest of this descriptor's signed text.
    desc_digest: DocDigest,
    /// The family tokens this relay declared.
    declared_family: Vec<String>,
    /// True if this relay's exit policy permits nothing.
    policy_is_reject_star: bool,
    /// The platform string this relay published, if any.
    platform: Option<String>,
    /// The uptime this relay declared, in seconds.
    uptime: Option<u32>,
    /// The subprotocol versions this relay announced.
    protocols: Protocols,
    /// The signing key from this relay's Ed25519 identity certificate, if
    /// it published one.
    signing_key_cert: Option<Ed25519Identity>,
    /// The ntor onion key of this relay.
    ntor_onion_key: Option<Curve25519Public>,
    /// Why this relay is in our directory.
    purpose: RouterPurpose,
    /// True if this relay says it is okay to exit directly from a
    /// one-hop circuit.
    allow_single_hop_exits: bool,
    /// True if this relay serves directory requests over its OR port.
    supports_tunnelled_dir_requests: bool,
}

impl RouterInfo {
    /// Return a new builder for constructing a RouterInfo.
    pub fn builder() -> RouterInfoBuilder {
        RouterInfoBuilder::new()
    }
    /// Return the RSA identity of this relay.
    pub fn identity(&self) -> &RsaIdentity {
        &self.identity
    }
    /// Return the nickname this relay claims.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }
    /// Return the IPv4 address of this relay.
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }
    /// Return the IPv4 directory port of this relay.
    pub fn dir_port(&self) -> u16 {
        self.dir_port
    }
    /// Return the IPv6 address of this relay, if it advertised one.
    pub fn ipv6_addr(&self) -> Option<Ipv6Addr> {
        self.ipv6_addr
    }
    /// Return the IPv6 OR port of this relay.
    pub fn ipv6_orport(&self) -> u16 {
        self.ipv6_orport
    }
    /// Return the IPv4 OR address and port, if they are usable.
    pub fn orport_v4(&self) -> Option<SocketAddr> {
        if self.addr.is_unspecified() || self.or_port == 0 {
            None
        } else {
            Some(SocketAddrV4::new(self.addr, self.or_port).into())
        }
    }
    /// Return the IPv6 OR address and port, if they are usable.
    pub fn orport_v6(&self) -> Option<SocketAddr> {
        let addr = self.ipv6_addr?;
        if addr.is_unspecified() || self.ipv6_orport == 0 {
            None
        } else {
            Some(SocketAddrV6::new(addr, self.ipv6_orport, 0, 0).into())
        }
    }
    /// Return true if this descriptor advertises the same OR addresses and
    /// ports as `other`.
    pub fn same_or_addrs(&self, other: &RouterInfo) -> bool {
        self.addr == other.addr
            && self.or_port == other.or_port
            && self.ipv6_addr == other.ipv6_addr
            && self.ipv6_orport == other.ipv6_orport
    }
    /// Return the digest of this descriptor's signed text.
    pub fn desc_digest(&self) -> &DocDigest {
        &self.desc_digest
    }
    /// Return the family tokens this relay declared.
    pub fn declared_family(&self) -> &[String] {
        &self.declared_family[..]
    }
    /// Return true if this relay's exit policy permits nothing.
    pub fn policy_is_reject_star(&self) -> bool {
        self.policy_is_reject_star
    }
    /// Return the platform string this relay published, if any.
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }
    /// Return the uptime this relay declared, in seconds.
    pub fn uptime(&self) -> Option<u32> {
        self.uptime
    }
    /// Return the subprotocol versions this relay announced.
    pub fn protocols(&self) -> &Protocols {
        &self.protocols
    }
    /// Return the signing key from this relay's Ed25519 identity
    /// certificate, if it published one.
    pub fn signing_key_cert(&self) -> Option<&Ed25519Identity> {
        self.signing_key_cert.as_ref()
    }
    /// Return the ntor onion key of this relay, if it has one.
    pub fn ntor_onion_key(&self) -> Option<&Curve25519Public> {
        self.ntor_onion_key.as_ref()
    }
    /// Return the purpose of this relay.
    pub fn purpose(&self) -> RouterPurpose {
        self.purpose
    }
    /// Return true if this relay says it is okay to exit directly from a
    /// one-hop circuit.
    pub fn allow_single_hop_exits(&self) -> bool {
        self.allow_single_hop_exits
    }
    /// Return true if this relay serves directory requests over its OR
    /// port.
    pub fn supports_tunnelled_dir_requests(&self) -> bool {
        self.supports_tunnelled_dir_requests
    }
}

/// A builder to construct a [`RouterInfo`] directly, without parsing.
#[derive(Clone, Debug)]
pub struct RouterInfoBuilder {
    /// See [`RouterInfo::identity`].
    identity: Option<RsaIdentity>,
    /// See [`RouterInfo::nickname`].
    nickname: String,
    /// See [`RouterInfo::addr`] and the related port fields.
    addr: Ipv4Addr,
    /// See [`RouterInfo::or_port`].
    or_port: u16,
    /// See [`RouterInfo::dir_port`].
    dir_port: u16,
    /// See [`RouterInfo::ipv6_addr`].
    ipv6_addr: Option<Ipv6Addr>,
    /// See [`RouterInfo::ipv6_orport`].
    ipv6_orport: u16,
    /// See [`RouterInfo::desc_digest`].
    desc_digest: DocDigest,
    /// See [`RouterInfo::declared_family`].
    declared_family: Vec<String>,
    /// See [`RouterInfo::policy_is_reject_star`].
    policy_is_reject_star: bool,
    /// See [`RouterInfo::platform`].
    platform: Option<String>,
    /// See [`RouterInfo::uptime`].
    uptime: Option<u32>,
    /// See [`RouterInfo::protocols`].
    protocols: Protocols,
    /// See [`RouterInfo::signing_key_cert`].
    signing_key_cert: Option<Ed25519Identity>,
    /// See [`RouterInfo::ntor_onion_key`].
    ntor_onion_key: Option<Curve25519Public>,
    /// See [`RouterInfo::purpose`].
    purpose: RouterPurpose,
    /// See [`RouterInfo::allow_single_hop_exits`].
    allow_single_hop_exits: bool,
    /// See [`RouterInfo::supports_tunnelled_dir_requests`].
    supports_tunnelled_dir_requests: bool,
}

impl RouterInfoBuilder {
    /// Construct a new RouterInfoBuilder.
    fn new() -> Self {
        RouterInfoBuilder {
            identity: None,
            nickname: "Unnamed".to_string(),
            addr: Ipv4Addr::UNSPECIFIED,
            or_port: 0,
            dir_port: 0,
            ipv6_addr: None,
            ipv6_orport: 0,
            desc_digest: [0; 32],
            declared_family: Vec::new(),
            policy_is_reject_star: false,
            platform: None,
            uptime: None,
            protocols: Protocols::new(),
            signing_key_cert: None,
            ntor_onion_key: None,
            purpose: RouterPurpose::General,
            allow_single_hop_exits: false,
            supports_tunnelled_dir_requests: false,
        }
    }
    /// Set the RSA identity of this relay.  (Required.)
    pub fn identity(&mut self, identity: RsaIdentity) -> &mut Self {
        self.identity = Some(identity);
        self
    }
    /// Set the nickname of this relay.
    pub fn nickname<S: Into<String>>(&mut self, nickname: S) -> &mut Self {
        self.nickname = nickname.into();
        self
    }
    /// Add an OR port at `addr`.  (An IPv4 port is required.)
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
    /// Set the directory port of this relay.
    pub fn dir_port(&mut self, port: u16) -> &mut Self {
        self.dir_port = port;
        self
    }
    /// Set the digest of this descriptor's signed text.
    pub fn desc_digest(&mut self, digest: DocDigest) -> &mut Self {
        self.desc_digest = digest;
        self
    }
    /// Set the declared family tokens.
    pub fn declared_family<I, S>(&mut self, family: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_family = family.into_iter().map(Into::into).collect();
        self
    }
    /// Declare whether this relay's exit policy permits nothing.
    pub fn policy_is_reject_star(&mut self, reject_star: bool) -> &mut Self {
        self.policy_is_reject_star = reject_star;
        self
    }
    /// Set the platform string.
    pub fn platform<S: Into<String>>(&mut self, platform: S) -> &mut Self {
        self.platform = Some(platform.into());
        self
    }
    /// Set the declared uptime, in seconds.
    pub fn uptime(&mut self, uptime: u32) -> &mut Self {
        self.uptime = Some(uptime);
        self
    }
    /// Set the announced subprotocol versions.
    pub fn protocols(&mut self, protocols: Protocols) -> &mut Self {
        self.protocols = protocols;
        self
    }
    /// Set the signing key from this relay's Ed25519 identity certificate.
    pub fn signing_key_cert(&mut self, key: Ed25519Identity) -> &mut Self {
        self.signing_key_cert = Some(key);
        self
    }
    /// Set the ntor onion key.
    pub fn ntor_key(&mut self, key: Curve25519Public) -> &mut Self {
        self.ntor_onion_key = Some(key);
        self
    }
    /// Set the purpose of this relay.
    pub fn purpose(&mut self, purpose: RouterPurpose) -> &mut Self {
        self.purpose = purpose;
        self
    }
    /// Declare whether this relay allows single-hop exits.
    pub fn allow_single_hop_exits(&mut self, allow: bool) -> &mut Self {
        self.allow_single_hop_exits = allow;
        self
    }
    /// Declare whether this relay serves directory requests over its OR
    /// port.
    pub fn supports_tunnelled_dir_requests(&mut self, support: bool) -> &mut Self {
        self.supports_tunnelled_dir_requests = support;
        self
    }
    /// Try to build a RouterInfo from this builder.
    pub fn build(&self) -> Result<RouterInfo> {
        let identity = self.identity.ok_or(Error::MissingField("identity"))?;
        if self.or_port == 0 {
            return Err(Error::MissingField("or_port"));
        }
        Ok(RouterInfo {
            identity,
            nickname: self.nickname.clone(),
            addr: self.addr,
            or_port: self.or_port,
            dir_port: self.dir_port,
            ipv6_addr: self.ipv6_addr,
            ipv6_orport: self.ipv6_orport,
            desc_digest: self.desc_digest,
            declared_family: self.declared_family.clone(),
            policy_is_reject_star: self.policy_is_reject_star,
            platform: self.platform.clone(),
            uptime: self.uptime,
            protocols: self.protocols.clone(),
            signing_key_cert: self.signing_key_cert,
            ntor_onion_key: self.ntor_onion_key,
            purpose: self.purpose,
            allow_single_hop_exits: self.allow_single_hop_exits,
            supports_tunnelled_dir_requests: self.supports_tunnelled_dir_requests,
        })
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn build_ri() {
        let ri = RouterInfo::builder()
            .identity([5; 20].into())
            .nickname("Ernie")
            .add_or_port(SocketAddr::from(([10, 0, 0, 5], 9001)))
            .add_or_port("[2001:db8::5]:9001".parse().unwrap())
            .dir_port(9030)
            .platform("Tor 0.4.8.1 on Linux")
            .uptime(86400)
            .build()
            .unwrap();
        assert_eq!(ri.nickname(), "Ernie");
        assert_eq!(ri.orport_v4(), Some(SocketAddr::from(([10, 0, 0, 5], 9001))));
        assert!(ri.orport_v6().is_some());
        assert_eq!(ri.purpose(), RouterPurpose::General);
        assert!(!ri.policy_is_reject_star());
    }

    #[test]
    fn same_or_addrs() {
        let mut bld = RouterInfo::builder();
        bld.identity([5; 20].into())
            .add_or_port(SocketAddr::from(([10, 0, 0, 5], 9001)));
        let a = bld.build().unwrap();
        let b = bld.build().unwrap();
        assert!(a.same_or_addrs(&b));
        bld.add_or_port(SocketAddr::from(([10, 0, 0, 6], 9001)));
        let c = bld.build().unwrap();
        assert!(!a.same_or_addrs(&c));
    }

    #[test]
    fn required_fields() {
        assert!(RouterInfo::builder().build().is_err());
        assert!(RouterInfo::builder().identity([5; 20].into()).build().is_err());
    }
}
