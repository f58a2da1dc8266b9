//! Configuration for the nodelist.
//!
//! These are plain data: everything here can be deserialized from an
//! operator's configuration.  Live collaborators are injected separately,
//! through [`NodelistProviders`](crate::NodelistProviders).

use crate::routerset::RouterSet;
use crate::SubnetConfig;
use serde::Deserialize;

/// Configuration for a [`Nodelist`](crate::Nodelist).
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct NodelistConfig {
    /// If true, relays whose addresses are "too close" are treated as one
    /// family.
    pub enforce_distinct_subnets: bool,
    /// What counts as "too close", when `enforce_distinct_subnets` is
    /// set.
    pub subnets: SubnetConfig,
    /// Whether we can connect over IPv6 at all.
    pub use_ipv6: bool,
    /// Whether to prefer a relay's IPv6 OR port over its IPv4 one.
    pub prefer_ipv6_orport: bool,
    /// Whether to prefer a relay's IPv6 directory port over its IPv4
    /// one.
    pub prefer_ipv6_dirport: bool,
    /// Restrict entry guards to this set, if present.
    pub entry_nodes: Option<RouterSet>,
    /// Restrict exits to this set, if present.
    pub exit_nodes: Option<RouterSet>,
    /// Never exit through relays in this set.
    pub excluded_exit_nodes: Option<RouterSet>,
    /// Additional operator-declared relay families.
    pub node_family_sets: Vec<RouterSet>,
    /// The fraction of path bandwidth we need before building circuits.
    ///
    /// If unset, the consensus parameter `min_paths_for_circs_pct`
    /// decides.
    pub paths_needed_to_build_circuits: Option<f64>,
}

impl Default for NodelistConfig {
    fn default() -> Self {
        NodelistConfig {
            enforce_distinct_subnets: true,
            subnets: SubnetConfig::default(),
            use_ipv6: false,
            prefer_ipv6_orport: false,
            prefer_ipv6_dirport: false,
            entry_nodes: None,
            exit_nodes: None,
            excluded_exit_nodes: None,
            node_family_sets: Vec::new(),
            paths_needed_to_build_circuits: None,
        }
    }
}

impl NodelistConfig {
    /// Return true if, all else equal, we would rather use a relay's IPv6
    /// OR port.
    pub(crate) fn prefers_ipv6_orport(&self) -> bool {
        self.use_ipv6 && self.prefer_ipv6_orport
    }
    /// Return true if, all else equal, we would rather use a relay's IPv6
    /// directory port.
    pub(crate) fn prefers_ipv6_dirport(&self) -> bool {
        self.use_ipv6 && self.prefer_ipv6_dirport
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn defaults() {
        let cfg = NodelistConfig::default();
        assert!(cfg.enforce_distinct_subnets);
        assert!(!cfg.use_ipv6);
        assert!(!cfg.prefers_ipv6_orport());
        assert!(cfg.entry_nodes.is_none());
        assert!(cfg.paths_needed_to_build_circuits.is_none());
    }

    #[test]
    fn deserialize() {
        let cfg: NodelistConfig = serde_json::from_str(
            r#"{
                "use_ipv6": true,
                "prefer_ipv6_orport": true,
                "exit_nodes": ["fred"],
                "paths_needed_to_build_circuits": 0.75
            }"#,
        )
        .unwrap();
        assert!(cfg.prefers_ipv6_orport());
        assert!(!cfg.prefers_ipv6_dirport());
        assert!(cfg.exit_nodes.is_some());
        assert_eq!(cfg.paths_needed_to_build_circuits, Some(0.75));

        assert!(serde_json::from_str::<NodelistConfig>(r#"{"no_such_option": 1}"#).is_err());
    }
}
