//! Microdescriptors: compact, bandwidth-saving relay summaries.
//!
//! A microdescriptor carries no identity of its own; it is matched to a
//! relay through the descriptor digest in a microdesc-flavored consensus.
//! Microdescriptors are shared objects: the cache owns them, and the
//! nodelist records its interest through the [`held_by_nodes`]
//! (Microdesc::held_by_nodes) count, which it alone maintains.

use crate::doc::DocDigest;
use crate::types::keys::{Curve25519Public, Ed25519Identity};
use crate::types::policy::PortPolicy;
use crate::{Error, Result};
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::sync::atomic::{AtomicU32, Ordering};

/// The digest of a microdescriptor.
pub type MdDigest = DocDigest;

/// A single microdescriptor.
#[derive(Debug)]
pub struct Microdesc {
    /// The SHA256 digest of the text of this microdescriptor.
    digest: MdDigest,
    /// The ntor onion key for this relay.
    ntor_onion_key: Option<Curve25519Public>,
    /// The Ed25519 identity of this relay.
    ed25519_id: Option<Ed25519Identity>,
    /// The IPv6 address of this relay, if it advertised one.
    ipv6_addr: Option<Ipv6Addr>,
    /// The IPv6 OR port of this relay.
    ipv6_orport: u16,
    /// The short exit policy of this relay, if it declared one.
    exit_policy: Option<PortPolicy>,
    /// The family tokens this relay declared.
    family: Vec<String>,
    /// How many nodes currently have this microdescriptor attached.
    ///
    /// Updated only by the nodelist, on attach and detach; the cache may
    /// reclaim a microdescriptor once this count is zero.
    held_by_nodes: AtomicU32,
}

impl Microdesc {
    /// Return a new MicrodescBuilder for constructing microdescriptors.
    pub fn builder() -> MicrodescBuilder {
        MicrodescBuilder::new()
    }
    /// Return the digest of this microdescriptor.
    pub fn digest(&self) -> &MdDigest {
        &self.digest
    }
    /// Return the ntor onion key of this relay, if it has one.
    pub fn ntor_onion_key(&self) -> Option<&Curve25519Public> {
        self.ntor_onion_key.as_ref()
    }
    /// Return the Ed25519 identity of this relay, if it declared one.
    pub fn ed25519_id(&self) -> Option<&Ed25519Identity> {
        self.ed25519_id.as_ref()
    }
    /// Return the IPv6 address of this relay, if it advertised one.
    pub fn ipv6_addr(&self) -> Option<Ipv6Addr> {
        self.ipv6_addr
    }
    /// Return the IPv6 OR port of this relay.
    pub fn ipv6_orport(&self) -> u16 {
        self.ipv6_orport
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
    /// Return the short exit policy of this relay, if it declared one.
    pub fn exit_policy(&self) -> Option<&PortPolicy> {
        self.exit_policy.as_ref()
    }
    /// Return the family tokens this relay declared.
    pub fn family(&self) -> &[String] {
        &self.family[..]
    }
    /// Return the number of nodes that currently have this
    /// microdescriptor attached.
    pub fn held_by_nodes(&self) -> u32 {
        self.held_by_nodes.load(Ordering::Relaxed)
    }
    /// Note that a node has attached this microdescriptor.
    pub(crate) fn note_held(&self) {
        self.held_by_nodes.fetch_add(1, Ordering::Relaxed);
    }
    /// Note that a node has detached this microdescriptor.
    pub(crate) fn note_released(&self) {
        let prev = self.held_by_nodes.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0);
    }
}

/// A builder to construct a [`Microdesc`] directly, without parsing.
#[derive(Clone, Debug, Default)]
pub struct MicrodescBuilder {
    /// See [`Microdesc::digest`].
    digest: Option<MdDigest>,
    /// See [`Microdesc::ntor_onion_key`].
    ntor_onion_key: Option<Curve25519Public>,
    /// See [`Microdesc::ed25519_id`].
    ed25519_id: Option<Ed25519Identity>,
    /// See [`Microdesc::ipv6_addr`] and [`Microdesc::ipv6_orport`].
    ipv6_orport: Option<(Ipv6Addr, u16)>,
    /// See [`Microdesc::exit_policy`].
    exit_policy: Option<PortPolicy>,
    /// See [`Microdesc::family`].
    family: Vec<String>,
}

impl MicrodescBuilder {
    /// Construct a new MicrodescBuilder.
    fn new() -> Self {
        MicrodescBuilder::default()
    }
    /// Set the digest of this microdescriptor.  (Required.)
    pub fn digest(&mut self, digest: MdDigest) -> &mut Self {
        self.digest = Some(digest);
        self
    }
    /// Set the ntor onion key.
    pub fn ntor_key(&mut self, key: Curve25519Public) -> &mut Self {
        self.ntor_onion_key = Some(key);
        self
    }
    /// Set the Ed25519 identity key.
    pub fn ed25519_id(&mut self, key: Ed25519Identity) -> &mut Self {
        self.ed25519_id = Some(key);
        self
    }
    /// Set the IPv6 OR address and port.
    pub fn ipv6_orport(&mut self, addr: Ipv6Addr, port: u16) -> &mut Self {
        self.ipv6_orport = Some((addr, port));
        self
    }
    /// Set the short exit policy.
    pub fn exit_policy(&mut self, policy: PortPolicy) -> &mut Self {
        self.exit_policy = Some(policy);
        self
    }
    /// Set the short exit policy from its text representation.
    pub fn parse_exit_policy(&mut self, policy: &str) -> Result<&mut Self> {
        self.exit_policy = Some(policy.parse()?);
        Ok(self)
    }
    /// Set the declared family tokens.
    pub fn family<I, S>(&mut self, family: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.family = family.into_iter().map(Into::into).collect();
        self
    }
    /// Try to build a Microdesc from this builder.
    pub fn testing_md(&self) -> Result<Microdesc> {
        let digest = self.digest.ok_or(Error::MissingField("digest"))?;
        let (ipv6_addr, ipv6_orport) = match self.ipv6_orport {
            Some((a, p)) => (Some(a), p),
            None => (None, 0),
        };
        Ok(Microdesc {
            digest,
            ntor_onion_key: self.ntor_onion_key,
            ed25519_id: self.ed25519_id,
            ipv6_addr,
            ipv6_orport,
            exit_policy: self.exit_policy.clone(),
            family: self.family.clone(),
            held_by_nodes: AtomicU32::new(0),
        })
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn build_md() {
        let md = Microdesc::builder()
            .digest([7; 32])
            .ed25519_id([7; 32].into())
            .ipv6_orport("2001:db8::7".parse().unwrap(), 9001)
            .parse_exit_policy("accept 80,443")
            .unwrap()
            .family(["$1111111111111111111111111111111111111111"])
            .testing_md()
            .unwrap();
        assert_eq!(md.digest(), &[7; 32]);
        assert_eq!(md.ed25519_id(), Some(&[7; 32].into()));
        assert!(md.orport_v6().is_some());
        assert!(md.exit_policy().unwrap().allows_port(443));
        assert_eq!(md.family().len(), 1);
        assert_eq!(md.held_by_nodes(), 0);
    }

    #[test]
    fn digest_required() {
        assert!(Microdesc::builder().testing_md().is_err());
    }

    #[test]
    fn hold_counting() {
        let md = Microdesc::builder().digest([1; 32]).testing_md().unwrap();
        md.note_held();
        md.note_held();
        assert_eq!(md.held_by_nodes(), 2);
        md.note_released();
        assert_eq!(md.held_by_nodes(), 1);
    }
}
