#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::cast_lossless)]
#![deny(clippy::checked_conversions)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::implicit_clone)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![warn(clippy::rc_buffer)]
#![deny(clippy::ref_option_ref)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::trait_duplication_in_bounds)]
#![deny(clippy::unnecessary_wraps)]
#![warn(clippy::unseparated_literal_suffix)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::let_unit_value)] // This can reasonably be done for explicitness
#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod doc;
mod err;
pub mod node;
pub mod providers;
pub mod routerset;
pub mod types;

mod check;
mod dirinfo;
mod family;
mod weight;

#[cfg(any(test, feature = "testing"))]
pub mod testnet;

use crate::doc::microdesc::Microdesc;
use crate::doc::netstatus::{Consensus, ConsensusFlavor, RouterStatus};
use crate::doc::routerdesc::{RouterInfo, RouterPurpose};
use crate::doc::store::MdCache;
use crate::providers::PolicyDecision;
use crate::types::keys::RsaIdentity;

use derive_more::{From, Into};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tracing::{info, warn};
use typed_index_collections::TiVec;

pub use config::NodelistConfig;
pub use dirinfo::ConsensusPathType;
pub use err::Error;
pub use node::{AddrFamily, Node, NodeFlags};
pub use providers::NodelistProviders;
pub use routerset::{RelayToken, RouterSet, MAX_NICKNAME_LEN};
pub use weight::WeightRole;

/// A Result using the Error type from the tor-nodelist crate
pub type Result<T> = std::result::Result<T, Error>;

/// The nickname the consensus uses to mark names it will never bind.
pub const UNNAMED_ROUTER_NICKNAME: &str = "Unnamed";

/// The number of hex digits in a printed RSA identity digest.
pub const HEX_DIGEST_LEN: usize = 40;

/// The longest possible "verbose" nickname: `$`, the hex digest, a
/// separator, and a nickname.
pub const MAX_VERBOSE_NICKNAME_LEN: usize = 1 + HEX_DIGEST_LEN + 1 + MAX_NICKNAME_LEN;

/// Index into the nodelist's sequence of nodes.
///
/// This is just a `usize` inside, but using a newtype prevents getting a
/// node index confused with other kinds of slice indices or counts.
#[derive(Debug, From, Into, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub(crate) struct NodeIdx(usize);

/// The outcome of resolving a nickname, before any warnings.
enum NameLookup {
    /// The name resolved through a hex form or a consensus binding.
    Canonical(NodeIdx),
    /// The name is nobody's canonical name; these relays claim it for
    /// themselves.
    SelfChosen(Vec<NodeIdx>),
    /// The name cannot resolve at all.
    Nothing,
}

/// Configuration for determining when two relays have addresses "too
/// close" in the network.
///
/// Used when deciding whether two relays count as one family by address.
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct SubnetConfig {
    /// Consider IPv4 nodes in the same /x to be the same family.
    ///
    /// If this value is 0, all nodes with IPv4 addresses will be in the
    /// same family.  If this value is above 32, then no nodes will be
    /// placed in the same family based on their IPv4 addresses.
    subnets_family_v4: u8,
    /// Consider IPv6 nodes in the same /x to be the same family.
    ///
    /// If this value is 0, all nodes with IPv6 addresses will be in the
    /// same family.  If this value is above 128, then no nodes will be
    /// placed in the same family based on their IPv6 addresses.
    subnets_family_v6: u8,
}

impl Default for SubnetConfig {
    fn default() -> Self {
        Self::new(16, 32)
    }
}

impl SubnetConfig {
    /// Construct a new SubnetConfig from a pair of bit prefix lengths.
    pub fn new(subnets_family_v4: u8, subnets_family_v6: u8) -> Self {
        Self {
            subnets_family_v4,
            subnets_family_v6,
        }
    }

    /// Return true if the two addresses are in the same subnet, according
    /// to this configuration.
    pub fn addrs_in_same_subnet(&self, a: &IpAddr, b: &IpAddr) -> bool {
        match (a, b) {
            (IpAddr::V4(a), IpAddr::V4(b)) => {
                let bits = self.subnets_family_v4;
                if bits > 32 {
                    return false;
                }
                let a = u32::from_be_bytes(a.octets());
                let b = u32::from_be_bytes(b.octets());
                (a >> (32 - bits)) == (b >> (32 - bits))
            }
            (IpAddr::V6(a), IpAddr::V6(b)) => {
                let bits = self.subnets_family_v6;
                if bits > 128 {
                    return false;
                }
                let a = u128::from_be_bytes(a.octets());
                let b = u128::from_be_bytes(b.octets());
                (a >> (128 - bits)) == (b >> (128 - bits))
            }
            _ => false,
        }
    }
}

/// The directory of every relay we are willing to use for something.
///
/// A `Nodelist` holds one [`Node`] for every relay that is currently in
/// the router list or in the consensus we're using.  It is fed by the
/// directory layer ([`set_routerinfo`](Nodelist::set_routerinfo),
/// [`add_microdesc`](Nodelist::add_microdesc),
/// [`set_consensus`](Nodelist::set_consensus), and the corresponding
/// removals), and read by everything that needs to reason about relays.
///
/// All operations are synchronous and run on the caller's thread; the
/// nodelist never calls back into its providers while an update is in
/// progress.
#[derive(Debug)]
pub struct Nodelist {
    /// Every node, in an order that admits O(1) removal.
    nodes: TiVec<NodeIdx, Node>,
    /// Index from relay identity to position in `nodes`.
    by_id: HashMap<RsaIdentity, NodeIdx>,
    /// The consensus we're currently using, if we have one.
    consensus: Option<Arc<Consensus>>,
    /// Operator configuration.
    config: NodelistConfig,
    /// The collaborators we call out to.
    providers: NodelistProviders,
    /// State for the directory-readiness estimator.
    dir_info: dirinfo::DirInfoState,
}

impl Nodelist {
    /// Construct a new, empty Nodelist.
    pub fn new(config: NodelistConfig, providers: NodelistProviders) -> Self {
        Nodelist {
            nodes: TiVec::new(),
            by_id: HashMap::new(),
            consensus: None,
            config,
            providers,
            dir_info: dirinfo::DirInfoState::default(),
        }
    }

    /// Return this nodelist's configuration.
    pub fn config(&self) -> &NodelistConfig {
        &self.config
    }

    /// Return the consensus this nodelist is currently using, if any.
    pub fn consensus(&self) -> Option<&Arc<Consensus>> {
        self.consensus.as_ref()
    }

    /// Return the number of nodes we know about.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Return true if we know about no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Return an iterator over every node we know about.
    ///
    /// Callers may flip flags on the nodes they find, but must not insert
    /// or remove nodes while iterating.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Return the node whose identity is `id`, if we know about it.
    ///
    /// As long as the node stays alive, every call returns the same node.
    pub fn by_id(&self, id: &RsaIdentity) -> Option<&Node> {
        let idx = *self.by_id.get(id)?;
        Some(&self.nodes[idx])
    }

    /// As [`by_id`](Nodelist::by_id), but return a mutable reference.
    pub fn by_id_mut(&mut self, id: &RsaIdentity) -> Option<&mut Node> {
        let idx = *self.by_id.get(id)?;
        Some(&mut self.nodes[idx])
    }

    /// Return the node for `id`, creating an empty one if none exists.
    fn get_or_create(&mut self, id: RsaIdentity) -> NodeIdx {
        if let Some(&idx) = self.by_id.get(&id) {
            return idx;
        }
        let idx = NodeIdx::from(self.nodes.len());
        let mut node = Node::new(id);
        node.nodelist_idx = Some(idx);
        self.nodes.push(node);
        self.by_id.insert(id, idx);
        idx
    }

    /// Remove the node at `idx`, maintaining the index of whichever node
    /// takes its place in the sequence.
    fn drop_node(&mut self, idx: NodeIdx) {
        let mut node = self.nodes.swap_remove(idx);
        debug_assert_eq!(node.nodelist_idx, Some(idx));
        node.nodelist_idx = None;
        self.by_id.remove(&node.identity);
        if let Some(moved) = self.nodes.get_mut(idx) {
            moved.nodelist_idx = Some(idx);
            if let Some(slot) = self.by_id.get_mut(&moved.identity) {
                *slot = idx;
            }
        }
    }

    /// Attach `ri` to the node for its identity, creating the node if
    /// needed.
    ///
    /// Returns the node, along with the previously attached descriptor if
    /// there was one, so that the router list can dispose of it.
    pub fn set_routerinfo(&mut self, ri: Arc<RouterInfo>) -> (&Node, Option<Arc<RouterInfo>>) {
        let idx = self.get_or_create(*ri.identity());
        let (old, had_router) = {
            let node = &mut self.nodes[idx];
            let old = node.ri.take();
            if let Some(prev) = &old {
                if !prev.same_or_addrs(&ri) {
                    node.addrs_changed();
                }
            }
            let had_router = old.is_some();
            node.ri = Some(ri);
            (old, had_router)
        };

        if self.nodes[idx].country.is_none() {
            self.set_country(idx);
        }

        if let Some(authority) = self.providers.authority.clone() {
            if !had_router {
                if let Some(ri) = self.nodes[idx].ri.clone() {
                    self.nodes[idx].flags = authority.authoritative_flags(&ri);
                }
            }
        }

        self.router_dir_info_changed();
        (&self.nodes[idx], old)
    }

    /// Attach `md` to whichever node the current consensus matches it to.
    ///
    /// This is a no-op unless the consensus we are using is
    /// microdesc-flavored and lists a relay with `md`'s digest.
    pub fn add_microdesc(&mut self, md: &Arc<Microdesc>) -> Option<&Node> {
        let ns = match &self.consensus {
            Some(ns) if ns.flavor() == ConsensusFlavor::Microdesc => Arc::clone(ns),
            _ => return None,
        };
        // Microdescriptors don't carry an identity, so we find the relay
        // through the consensus entry that names this digest.
        let rs = ns.relay_by_descriptor_digest(md.digest())?;
        let idx = *self.by_id.get(rs.rsa_identity())?;
        self.nodes[idx].set_md(Arc::clone(md));
        self.router_dir_info_changed();
        Some(&self.nodes[idx])
    }

    /// Detach `ri` from its node: the router list no longer holds it.
    ///
    /// If nothing else is keeping the node alive, the node is removed.
    pub fn remove_routerinfo(&mut self, ri: &Arc<RouterInfo>) {
        let Some(&idx) = self.by_id.get(ri.identity()) else {
            return;
        };
        {
            let node = &mut self.nodes[idx];
            match &node.ri {
                Some(cur) if Arc::ptr_eq(cur, ri) => {}
                _ => return,
            }
            node.ri = None;
        }
        if !self.nodes[idx].is_usable() {
            self.drop_node(idx);
        }
        self.router_dir_info_changed();
    }

    /// Detach `md` from the node with identity `id`, if that node is
    /// holding exactly that microdescriptor.
    pub fn remove_microdesc(&mut self, id: &RsaIdentity, md: &Arc<Microdesc>) {
        let Some(&idx) = self.by_id.get(id) else {
            return;
        };
        let node = &mut self.nodes[idx];
        if node.md.as_ref().is_some_and(|cur| Arc::ptr_eq(cur, md)) {
            node.take_md();
            self.router_dir_info_changed();
        }
    }

    /// Replace the consensus this nodelist is using with `ns`.
    ///
    /// Every node's consensus entry is re-resolved against the new
    /// document: survivors get their new entries and (for a
    /// microdesc-flavored consensus) fresh microdescriptors from `mds`,
    /// newly listed relays get nodes, and nodes with no remaining backing
    /// are removed.
    pub fn set_consensus(&mut self, ns: Arc<Consensus>, mds: &MdCache) {
        let authdir = self.providers.authority.is_some();
        let prefer_ipv6 = self.config.prefers_ipv6_orport();
        let microdesc = ns.flavor() == ConsensusFlavor::Microdesc;

        // Null out every consensus entry, so we can tell the survivors
        // apart afterward.
        for node in self.nodes.iter_mut() {
            node.rs = None;
        }

        for rs in ns.relays() {
            let idx = self.get_or_create(*rs.rsa_identity());
            {
                let node = &mut self.nodes[idx];
                node.rs = Some(Arc::clone(rs));
                if microdesc {
                    let digest_matches = node
                        .md
                        .as_ref()
                        .is_some_and(|md| md.digest() == rs.descriptor_digest());
                    if !digest_matches {
                        node.take_md();
                        if let Some(md) = mds.lookup_by_digest256(rs.descriptor_digest()) {
                            node.set_md(Arc::clone(md));
                        }
                    }
                }
            }
            self.set_country(idx);

            // If we're not an authority, believe the consensus.
            if !authdir {
                let node = &mut self.nodes[idx];
                node.flags.is_valid = rs.is_flagged_valid();
                node.flags.is_running = rs.is_flagged_running();
                node.flags.is_fast = rs.is_flagged_fast();
                node.flags.is_stable = rs.is_flagged_stable();
                node.flags.is_possible_guard = rs.is_flagged_guard();
                node.flags.is_exit = rs.is_flagged_exit();
                node.flags.is_bad_exit = rs.is_flagged_bad_exit();
                node.flags.is_hs_dir = rs.is_flagged_hsdir();
                node.flags.ipv6_preferred = prefer_ipv6
                    && (rs.ipv6_addr().is_some()
                        || node.md.as_ref().is_some_and(|md| md.ipv6_addr().is_some()));
            }
        }

        self.consensus = Some(ns);
        self.purge();

        if !authdir {
            for node in self.nodes.iter_mut() {
                // No consensus entry for this relay: clear its flags so we
                // can skip it, maybe.
                if node.rs.is_none() {
                    debug_assert!(node.ri.is_some());
                    if node.purpose() == RouterPurpose::General {
                        node.flags.clear_consensus_flags();
                    }
                }
            }
        }

        self.router_dir_info_changed();
        #[cfg(debug_assertions)]
        self.check_coherence();
    }

    /// Remove every node that no longer has enough information to be
    /// used for anything.
    ///
    /// This operation is idempotent.
    pub fn purge(&mut self) {
        let mut i = 0;
        while i < self.nodes.len() {
            let idx = NodeIdx::from(i);
            let node = &mut self.nodes[idx];
            // A microdescriptor is only meaningful with a consensus entry
            // to anchor it.
            if node.md.is_some() && node.rs.is_none() {
                node.take_md();
            }
            if node.is_usable() {
                i += 1;
            } else {
                self.drop_node(idx);
            }
        }
        #[cfg(debug_assertions)]
        self.check_coherence();
    }

    /// Discard every node, and the consensus reference.
    ///
    /// Holds on microdescriptors are released as the nodes go away.
    pub fn clear(&mut self) {
        for node in self.nodes.iter_mut() {
            node.nodelist_idx = None;
        }
        self.nodes.clear();
        self.by_id.clear();
        self.consensus = None;
        self.router_dir_info_changed();
    }

    /// Return every node that is currently holding exactly `md`.
    pub fn find_nodes_with_microdesc(&self, md: &Arc<Microdesc>) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|node| node.md.as_ref().is_some_and(|cur| Arc::ptr_eq(cur, md)))
            .collect()
    }

    /// Recompute the country of the node at `idx` from GeoIP.
    fn set_country(&mut self, idx: NodeIdx) {
        let addr: Option<IpAddr> = {
            let node = &self.nodes[idx];
            node.rs
                .as_ref()
                .map(|rs| IpAddr::V4(rs.addr()))
                .or_else(|| node.ri.as_ref().map(|ri| IpAddr::V4(ri.addr())))
        };
        let country = match (&self.providers.geoip, addr) {
            (Some(geoip), Some(addr)) => geoip.country_by_addr(addr),
            _ => None,
        };
        self.nodes[idx].country = country;
    }

    /// Recompute every node's country.
    ///
    /// Call this whenever the GeoIP database is reloaded.
    pub fn refresh_countries(&mut self) {
        for i in 0..self.nodes.len() {
            self.set_country(NodeIdx::from(i));
        }
    }

    /// Mark the relay with identity `digest` as running or non-running.
    pub fn router_set_status(&mut self, digest: &RsaIdentity, up: bool) {
        let Some(&idx) = self.by_id.get(digest) else {
            return;
        };
        if self.nodes[idx].flags.is_running != up {
            self.router_dir_info_changed();
        }
        self.nodes[idx].flags.is_running = up;
    }

    /// Return true if the consensus binds this node's nickname to its
    /// identity.
    pub fn node_is_named(&self, node: &Node) -> bool {
        let Some(nickname) = node.nickname() else {
            return false;
        };
        let Some(ns) = &self.consensus else {
            return false;
        };
        ns.router_digest_by_nickname(nickname) == Some(node.identity)
    }

    /// Compute the verbose ("extended") nickname of `node`: `$`, the hex
    /// identity, and -- when a nickname is known -- `=` or `~` and the
    /// nickname, depending on whether the consensus binds it.
    pub fn verbose_nickname(&self, node: &Node) -> String {
        let mut out = String::with_capacity(MAX_VERBOSE_NICKNAME_LEN);
        out.push('$');
        out.push_str(&hex::encode_upper(node.identity.as_bytes()));
        if let Some(nickname) = node.nickname() {
            out.push(if self.node_is_named(node) { '=' } else { '~' });
            out.extend(nickname.chars().take(MAX_NICKNAME_LEN));
        }
        out
    }

    /// As [`verbose_nickname`](Nodelist::verbose_nickname), for the relay
    /// with identity `id`.
    ///
    /// If we know of no such node, the hex identity alone is returned.
    pub fn verbose_nickname_by_id(&self, id: &RsaIdentity) -> String {
        match self.by_id(id) {
            Some(node) => self.verbose_nickname(node),
            None => format!("${}", hex::encode_upper(id.as_bytes())),
        }
    }

    /// Helper: resolve a `$hex`-style token to a node index.
    fn hex_id_idx(&self, hex_id: &str) -> Option<NodeIdx> {
        let (id, attached) = match RelayToken::parse(hex_id)? {
            RelayToken::Id(id) => (id, None),
            RelayToken::IdWithNickname {
                id,
                nickname,
                must_be_named,
            } => (id, Some((nickname, must_be_named))),
            RelayToken::Nickname(_) => return None,
        };
        let idx = *self.by_id.get(&id)?;
        if let Some((nickname, must_be_named)) = attached {
            let real_name = self.nodes[idx].nickname()?;
            if !real_name.eq_ignore_ascii_case(&nickname) {
                return None;
            }
            if must_be_named {
                let named_id = self
                    .consensus
                    .as_ref()?
                    .router_digest_by_nickname(&nickname)?;
                if named_id != id {
                    return None;
                }
            }
        }
        Some(idx)
    }

    /// Given a token of the format `HEX`, `$HEX`, `$HEX=name`, or
    /// `$HEX~name`, return the node with the matching identity (and
    /// nickname, if one is attached).
    ///
    /// Returns None if no such node exists, or if the token is not
    /// well-formed.
    pub fn by_hex_id(&self, hex_id: &str) -> Option<&Node> {
        let idx = self.hex_id_idx(hex_id)?;
        Some(&self.nodes[idx])
    }

    /// Helper: every node whose nickname is `nickname`,
    /// case-insensitively.
    fn nickname_matches(&self, nickname: &str) -> Vec<NodeIdx> {
        self.nodes
            .iter_enumerated()
            .filter(|(_, node)| {
                node.nickname()
                    .is_some_and(|n| n.eq_ignore_ascii_case(nickname))
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Helper: resolve `nickname` as far as its canonical forms allow.
    ///
    /// Handles the hex forms, the "Unnamed" sentinel, and the consensus
    /// bindings; anything else falls through to the self-chosen-nickname
    /// scan, whose results the caller decides how to treat.
    fn resolve_nickname(&self, nickname: &str) -> NameLookup {
        // Handle these cases: HEX, $HEX, $HEX=name, $HEX~name.
        if let Some(idx) = self.hex_id_idx(nickname) {
            return NameLookup::Canonical(idx);
        }
        if nickname.eq_ignore_ascii_case(UNNAMED_ROUTER_NICKNAME) {
            return NameLookup::Nothing;
        }
        if let Some(ns) = &self.consensus {
            // Is there a binding for this name in the consensus?
            if let Some(named_id) = ns.router_digest_by_nickname(nickname) {
                return match self.by_id.get(&named_id) {
                    Some(&idx) => NameLookup::Canonical(idx),
                    None => NameLookup::Nothing,
                };
            }
            // Is it marked as owned-by-someone-else?
            if ns.nickname_is_unnamed(nickname) {
                info!(
                    "The name {} is listed as Unnamed: there is some router that holds it, \
                     but not one listed in the current consensus.",
                    nickname
                );
                return NameLookup::Nothing;
            }
        }
        // Okay, so the name is not canonical for anybody.
        NameLookup::SelfChosen(self.nickname_matches(nickname))
    }

    /// Helper: the lookup of [`by_nickname`](Nodelist::by_nickname),
    /// without the warnings.
    fn nickname_idx(&self, nickname: &str) -> Option<NodeIdx> {
        match self.resolve_nickname(nickname) {
            NameLookup::Canonical(idx) => Some(idx),
            NameLookup::SelfChosen(matches) => matches.first().copied(),
            NameLookup::Nothing => None,
        }
    }

    /// Given a nickname (possibly verbose, possibly a hexadecimal
    /// digest), return the corresponding node, if any.
    ///
    /// If `warn_if_unnamed` is set and the lookup falls back to matching
    /// relays' self-chosen nicknames, warn the user that the name is not
    /// canonical.  Each node warns at most once.
    pub fn by_nickname(&mut self, nickname: &str, warn_if_unnamed: bool) -> Option<&Node> {
        let matches = match self.resolve_nickname(nickname) {
            NameLookup::Canonical(idx) => return Some(&self.nodes[idx]),
            NameLookup::SelfChosen(matches) => matches,
            NameLookup::Nothing => return None,
        };

        if matches.len() > 1 && warn_if_unnamed {
            let mut any_unwarned = false;
            for &idx in &matches {
                let node = &mut self.nodes[idx];
                if !node.name_lookup_warned {
                    node.name_lookup_warned = true;
                    any_unwarned = true;
                }
            }
            if any_unwarned {
                warn!(
                    "There are multiple matches for the name {}, but none is listed as \
                     Named in the directory consensus. Choosing one arbitrarily.",
                    nickname
                );
            }
        } else if matches.len() == 1 && warn_if_unnamed {
            let idx = matches[0];
            if !self.nodes[idx].name_lookup_warned {
                self.nodes[idx].name_lookup_warned = true;
                warn!(
                    "You specified a server \"{}\" by name, but the directory authorities \
                     do not have any key registered for this nickname -- so it could be \
                     used by any server, not just the one you meant. To make sure you get \
                     the same server in the future, refer to it by key, as \"${}\".",
                    nickname,
                    hex::encode_upper(self.nodes[idx].identity.as_bytes())
                );
            }
        }

        matches.first().map(|&idx| &self.nodes[idx])
    }

    /// Return true if any token in `set` matches `node`.
    pub fn routerset_contains_node(&self, set: &RouterSet, node: &Node) -> bool {
        set.contains(&node.identity, node.nickname(), self.node_is_named(node))
    }

    /// Return true if any token in `set` matches the consensus entry
    /// `rs`.
    pub fn routerset_contains_routerstatus(&self, set: &RouterSet, rs: &RouterStatus) -> bool {
        let is_named = self.consensus.as_ref().is_some_and(|ns| {
            ns.router_digest_by_nickname(rs.nickname()) == Some(*rs.rsa_identity())
        });
        set.contains(rs.rsa_identity(), Some(rs.nickname()), is_named)
    }

    /// Return every node that `set` matches.
    pub fn nodes_in_set(&self, set: &RouterSet) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|node| self.routerset_contains_node(set, node))
            .collect()
    }

    /// Compare exiting to `addr`:`port` against `node`'s exit policy.
    ///
    /// Without a policy oracle, every comparison is "probably rejected":
    /// an unknown policy permits nothing.
    pub fn compare_addr_to_node_policy(
        &self,
        addr: IpAddr,
        port: u16,
        node: &Node,
    ) -> PolicyDecision {
        match &self.providers.policy {
            Some(oracle) => oracle.compare_addr_to_node_policy(addr, port, node),
            None => PolicyDecision::ProbablyRejected,
        }
    }

    /// Find a running relay with IP address `address` whose exit policy
    /// accepts `address`:`port`, skipping relays the operator has
    /// excluded from exiting.
    pub fn find_exact_exit_enclave(&self, address: &str, port: u16) -> Option<&Node> {
        // It has to be an IP already; we don't resolve names here.
        let addr: Ipv4Addr = address.parse().ok()?;
        let addr = IpAddr::V4(addr);
        self.nodes.iter().find(|node| {
            node.prim_addr() == Some(addr)
                && node.flags.is_running
                && self.compare_addr_to_node_policy(addr, port, node) == PolicyDecision::Accepted
                && !self
                    .config
                    .excluded_exit_nodes
                    .as_ref()
                    .is_some_and(|set| self.routerset_contains_node(set, node))
        })
    }

    /// Return true if every running, sufficiently reliable relay we could
    /// use will reject `addr`:`port`.
    pub fn exit_policy_all_nodes_reject(&self, addr: IpAddr, port: u16, need_uptime: bool) -> bool {
        !self.nodes.iter().any(|node| {
            node.flags.is_running
                && !node.is_unreliable(need_uptime, false, false)
                && !matches!(
                    self.compare_addr_to_node_policy(addr, port, node),
                    PolicyDecision::Rejected | PolicyDecision::ProbablyRejected
                )
        })
    }
}
