//! Cross-validation of the nodelist against the documents it reflects.
//!
//! [`Nodelist::check_coherence`] checks the invariants the nodelist can
//! verify on its own, and runs after every reconciliation in debug
//! builds.  [`Nodelist::assert_ok`] additionally cross-checks against the
//! router list and the microdescriptor cache, and is meant for tests.
//! Both panic on failure: a violation is a bug, not a runtime condition.

use crate::doc::netstatus::{ConsensusFlavor, RouterStatus};
use crate::doc::store::{MdCache, RouterList};
use crate::Nodelist;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

impl Nodelist {
    /// Assert the invariants that the nodelist can check without outside
    /// help: the identity index and the sequence agree, every node is
    /// backed by a descriptor or a consensus entry, every attached
    /// consensus entry belongs to the current consensus, and every
    /// attached microdescriptor's hold count matches its attachments.
    pub(crate) fn check_coherence(&self) {
        assert_eq!(self.nodes.len(), self.by_id.len());

        let consensus_entries: Option<HashSet<*const RouterStatus>> = self
            .consensus
            .as_ref()
            .map(|ns| ns.relays().iter().map(Arc::as_ptr).collect());

        let mut md_attachments: HashMap<*const crate::doc::microdesc::Microdesc, u32> =
            HashMap::new();

        for (idx, node) in self.nodes.iter_enumerated() {
            assert_eq!(node.nodelist_idx, Some(idx));
            assert_eq!(self.by_id.get(&node.identity), Some(&idx));
            assert!(node.is_usable());
            if let Some(rs) = &node.rs {
                assert_eq!(rs.rsa_identity(), &node.identity);
                match &consensus_entries {
                    Some(entries) => assert!(entries.contains(&Arc::as_ptr(rs))),
                    None => panic!("node has a consensus entry, but there is no consensus"),
                }
            }
            if let Some(md) = &node.md {
                // A microdescriptor is only meaningful with a consensus
                // entry to anchor it.
                assert!(node.rs.is_some());
                *md_attachments.entry(Arc::as_ptr(md)).or_insert(0) += 1;
            }
        }

        for node in self.nodes.iter() {
            if let Some(md) = &node.md {
                assert_eq!(md.held_by_nodes(), md_attachments[&Arc::as_ptr(md)]);
            }
        }
    }

    /// Check that the nodelist is internally consistent, and consistent
    /// with the directory info it's derived from.
    ///
    /// # Panics
    ///
    /// Panics if any invariant fails; use this only from tests and debug
    /// tooling.
    pub fn assert_ok(&self, routers: &RouterList, mds: &MdCache) {
        self.check_coherence();

        let mut backed: HashSet<crate::types::keys::RsaIdentity> = HashSet::new();

        // Every descriptor in the router list should be in the nodelist.
        for ri in routers.routers() {
            let node = self
                .by_id(ri.identity())
                .expect("descriptor with no node");
            let attached = node.ri.as_ref().expect("node without its descriptor");
            assert!(Arc::ptr_eq(attached, ri));
            assert_eq!(node.identity, *ri.identity());
            assert!(backed.insert(node.identity), "identity listed twice");
        }

        // Every entry in the current consensus should be in the nodelist.
        if let Some(ns) = &self.consensus {
            let microdesc = ns.flavor() == ConsensusFlavor::Microdesc;
            for rs in ns.relays() {
                let node = self
                    .by_id(rs.rsa_identity())
                    .expect("consensus entry with no node");
                let attached = node.rs.as_ref().expect("node without its consensus entry");
                assert!(Arc::ptr_eq(attached, rs));
                backed.insert(node.identity);

                if microdesc {
                    // If it's a microdesc consensus, every entry whose
                    // microdescriptor is in the cache should have it
                    // attached.
                    let cached = mds.lookup_by_digest256(rs.descriptor_digest());
                    match (cached, &node.md) {
                        (None, None) => {}
                        (Some(cached), Some(held)) => {
                            assert!(Arc::ptr_eq(cached, held));
                            assert!(held.held_by_nodes() >= 1);
                        }
                        (cached, held) => panic!(
                            "cache and node disagree about a microdescriptor: \
                             cached={}, held={}",
                            cached.is_some(),
                            held.is_some()
                        ),
                    }
                }
            }
        }

        // The nodelist should have no other entries.
        for node in self.nodes.iter() {
            assert!(backed.contains(&node.identity));
        }
    }
}
