//! Deciding which relays belong together.
//!
//! Relays are "in the same family" when it would be unsafe to use more
//! than one of them in a single circuit: because their addresses are too
//! close, because they mutually declare each other as family, or because
//! the operator has configured them into one.

use crate::node::Node;
use crate::routerset::RelayToken;
use crate::Nodelist;

impl Nodelist {
    /// Return true if `node`'s nickname matches `token`
    /// (case-insensitively), or if `token` is a hex form matching its
    /// identity.
    fn node_token_matches(&self, node: &Node, token: &str) -> bool {
        let Some(token) = RelayToken::parse(token) else {
            return false;
        };
        token.matches(&node.identity, node.nickname(), self.node_is_named(node))
    }

    /// Return true if `node` is named by some token in `tokens`.
    fn node_in_token_list(&self, node: &Node, tokens: &[String]) -> bool {
        tokens.iter().any(|t| self.node_token_matches(node, t))
    }

    /// Return true if `node1` and `node2` are in the same family.
    ///
    /// Two relays are in one family if their addresses are too close (when
    /// the operator enforces distinct subnets), if each declares the other
    /// as family, or if the operator has configured them into one set.
    pub fn nodes_in_same_family(&self, node1: &Node, node2: &Node) -> bool {
        // Are they in the same family because of their addresses?
        if self.config().enforce_distinct_subnets {
            if let (Some(a1), Some(a2)) = (node1.prim_addr(), node2.prim_addr()) {
                if self.config().subnets.addrs_in_same_subnet(&a1, &a2) {
                    return true;
                }
            }
        }

        // Are they in the same family because they agree they are?
        if let (Some(f1), Some(f2)) = (node1.declared_family(), node2.declared_family()) {
            if self.node_in_token_list(node2, f1) && self.node_in_token_list(node1, f2) {
                return true;
            }
        }

        // Are they in the same family because the user says they are?
        self.config().node_family_sets.iter().any(|set| {
            self.routerset_contains_node(set, node1) && self.routerset_contains_node(set, node2)
        })
    }

    /// Add every member of `node`'s family, including `node` itself, to
    /// `sl`.
    ///
    /// This is used to make sure we don't pick siblings in a single path,
    /// or pick more than one relay from a family for our entry guard
    /// list.  Note that a node may be added to `sl` more than once if it
    /// is part of `node`'s family for more than one reason.
    pub fn add_node_and_family<'a>(&'a self, sl: &mut Vec<&'a Node>, node: &Node) {
        // Let's make sure that we have the node itself, if it's a real
        // node.
        if let Some(real_node) = self.by_id(&node.identity) {
            sl.push(real_node);
        }

        // First, add any nodes with similar network addresses.
        if self.config().enforce_distinct_subnets {
            if let Some(node_addr) = node.prim_addr() {
                for node2 in self.nodes() {
                    if std::ptr::eq(node, node2) {
                        continue;
                    }
                    if let Some(a) = node2.prim_addr() {
                        if self.config().subnets.addrs_in_same_subnet(&a, &node_addr) {
                            sl.push(node2);
                        }
                    }
                }
            }
        }

        // Now, add all nodes in the declared family of this node, if
        // they also declare this node to be in their family.
        if let Some(declared_family) = node.declared_family() {
            for name in declared_family {
                let Some(idx) = self.nickname_idx(name) else {
                    continue;
                };
                let node2 = &self.nodes[idx];
                let Some(family2) = node2.declared_family() else {
                    continue;
                };
                if self.node_in_token_list(node, family2) {
                    sl.push(node2);
                }
            }
        }

        // If the user declared any families locally, honor those too.
        for set in &self.config().node_family_sets {
            if self.routerset_contains_node(set, node) {
                sl.extend(self.nodes_in_set(set));
            }
        }
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use crate::doc::store::MdCache;
    use crate::routerset::RouterSet;
    use crate::testnet::construct_custom_network;
    use crate::types::keys::RsaIdentity;
    use crate::{Nodelist, NodelistConfig, NodelistProviders};
    use std::collections::HashSet;
    use std::sync::Arc;

    /// Build a nodelist from the standard test network, with `config`.
    fn network_nodelist(config: NodelistConfig) -> Nodelist {
        let mut list = Nodelist::new(config, NodelistProviders::default());
        let cache = MdCache::new();
        // No microdescriptors are loaded, so consensus-only nodes have no
        // declared families; the tests attach descriptors where they need
        // them.
        let (consensus, _) = construct_custom_network(|_, _, _| {}).unwrap();
        list.set_consensus(Arc::new(consensus), &cache);
        list
    }

    /// The hex token (`$`-form) for the identity `[id; 20]`.
    fn hex_token(id: u8) -> String {
        format!("${}", hex::encode([id; 20]))
    }

    /// Collect the identities of `[id; 20]`'s family.
    fn family_ids(list: &Nodelist, id: u8) -> HashSet<RsaIdentity> {
        let node = list.by_id(&[id; 20].into()).unwrap();
        let mut sl = Vec::new();
        list.add_node_and_family(&mut sl, node);
        sl.iter().map(|n| *n.identity()).collect()
    }

    /// Attach a descriptor for `[id; 20]` at 10.`a`.0.`b`, declaring
    /// `family`.
    fn add_ri(list: &mut Nodelist, id: u8, a: u8, b: u8, family: &[String]) {
        let ri = crate::doc::routerdesc::RouterInfo::builder()
            .identity([id; 20].into())
            .nickname(format!("test{:03}", id))
            .add_or_port(std::net::SocketAddr::from(([10, a, 0, b], 9001)))
            .declared_family(family.iter().cloned())
            .build()
            .unwrap();
        list.set_routerinfo(Arc::new(ri));
    }

    #[test]
    fn mutual_declared_family() {
        let mut list = network_nodelist(NodelistConfig {
            enforce_distinct_subnets: false,
            ..NodelistConfig::default()
        });
        // 1 and 2 declare each other; 3 declares 1 but 1 does not
        // declare 3 back.
        add_ri(&mut list, 1, 1, 1, &[hex_token(2)]);
        add_ri(&mut list, 2, 2, 2, &["test001".to_string()]);
        add_ri(&mut list, 3, 3, 3, &[hex_token(1)]);

        let n1 = list.by_id(&[1; 20].into()).unwrap();
        let n2 = list.by_id(&[2; 20].into()).unwrap();
        let n3 = list.by_id(&[3; 20].into()).unwrap();
        assert!(list.nodes_in_same_family(n1, n2));
        assert!(list.nodes_in_same_family(n2, n1));
        assert!(!list.nodes_in_same_family(n1, n3));
        assert!(!list.nodes_in_same_family(n3, n1));

        let ids = family_ids(&list, 1);
        assert!(ids.contains(&[1; 20].into()));
        assert!(ids.contains(&[2; 20].into()));
        assert!(!ids.contains(&[3; 20].into()));
    }

    #[test]
    fn subnet_family() {
        let mut list = network_nodelist(NodelistConfig::default());
        // Same /16.
        add_ri(&mut list, 1, 7, 1, &[]);
        add_ri(&mut list, 2, 7, 2, &[]);
        // Different /16.
        add_ri(&mut list, 3, 8, 1, &[]);

        let n1 = list.by_id(&[1; 20].into()).unwrap();
        let n2 = list.by_id(&[2; 20].into()).unwrap();
        let n3 = list.by_id(&[3; 20].into()).unwrap();
        assert!(list.nodes_in_same_family(n1, n2));
        assert!(!list.nodes_in_same_family(n1, n3));

        let ids = family_ids(&list, 1);
        assert!(ids.contains(&[1; 20].into()));
        assert!(ids.contains(&[2; 20].into()));
        assert!(!ids.contains(&[3; 20].into()));

        // With enforcement off, address proximity stops mattering.
        let mut list = network_nodelist(NodelistConfig {
            enforce_distinct_subnets: false,
            ..NodelistConfig::default()
        });
        add_ri(&mut list, 1, 7, 1, &[]);
        add_ri(&mut list, 2, 7, 2, &[]);
        let n1 = list.by_id(&[1; 20].into()).unwrap();
        let n2 = list.by_id(&[2; 20].into()).unwrap();
        assert!(!list.nodes_in_same_family(n1, n2));
    }

    #[test]
    fn operator_family_sets() {
        let set: RouterSet = format!("{} {}", hex_token(1), hex_token(9)).parse().unwrap();
        let mut list = network_nodelist(NodelistConfig {
            enforce_distinct_subnets: false,
            node_family_sets: vec![set],
            ..NodelistConfig::default()
        });
        add_ri(&mut list, 1, 1, 1, &[]);
        add_ri(&mut list, 9, 9, 9, &[]);

        let n1 = list.by_id(&[1; 20].into()).unwrap();
        let n9 = list.by_id(&[9; 20].into()).unwrap();
        let n4 = list.by_id(&[4; 20].into()).unwrap();
        assert!(list.nodes_in_same_family(n1, n9));
        assert!(!list.nodes_in_same_family(n1, n4));

        let ids = family_ids(&list, 1);
        assert!(ids.contains(&[9; 20].into()));
    }

    // Growing the nodelist can only grow a node's family.
    #[test]
    fn family_is_monotone() {
        let mut list = network_nodelist(NodelistConfig::default());
        add_ri(&mut list, 1, 7, 1, &[hex_token(2)]);

        let before = family_ids(&list, 1);

        // Add the declared partner, plus a same-subnet stranger.
        add_ri(&mut list, 2, 9, 2, &[hex_token(1)]);
        add_ri(&mut list, 3, 7, 3, &[]);
        let after = family_ids(&list, 1);

        assert!(after.is_superset(&before));
        assert!(after.contains(&[2; 20].into()));
        assert!(after.contains(&[3; 20].into()));
    }
}
