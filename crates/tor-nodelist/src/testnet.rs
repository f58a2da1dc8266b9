//! Support for unit tests, in this crate and elsewhere.
//!
//! This module is only enabled when the `testing` feature is enabled.
//!
//! # Panics
//!
//! These functions can panic on numerous possible internal failures:
//! only use these functions for testing.

#![allow(clippy::unwrap_used)]

use crate::doc::microdesc::{Microdesc, MicrodescBuilder};
use crate::doc::netstatus::{
    Consensus, ConsensusBuilder, ConsensusFlavor, Lifetime, RelayFlags, RelayWeight,
    RouterStatusBuilder,
};
use crate::Result;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

/// A set of builder objects for a single node.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct NodeBuilders {
    /// Builds a routerstatus for a single node.
    ///
    /// Adjust fields in this builder to change the node's properties.
    pub rs: RouterStatusBuilder,

    /// Builds a microdescriptor for a single node.
    ///
    /// Adjust fields in this builder in order to change the node's
    /// properties.
    pub md: MicrodescBuilder,

    /// Set this value to `true` to omit the microdesc from the network.
    pub omit_md: bool,

    /// Set this value to `true` to omit the routerstatus from the
    /// network.
    pub omit_rs: bool,
}

/// Helper: a customization function that does nothing.
pub fn simple_net_func(_idx: usize, _nb: &mut NodeBuilders, _bld: &mut ConsensusBuilder) {}

/// As [`construct_custom_network`], but do not require a customization
/// function.
pub fn construct_network() -> Result<(Consensus, Vec<Microdesc>)> {
    construct_custom_network(simple_net_func)
}

/// As [`construct_custom_network_with_lifetime`], with a default
/// lifetime: valid for one day (in realtime) after the current
/// `SystemTime`.
pub fn construct_custom_network<F>(func: F) -> Result<(Consensus, Vec<Microdesc>)>
where
    F: FnMut(usize, &mut NodeBuilders, &mut ConsensusBuilder),
{
    let now = SystemTime::now();
    let one_day = Duration::new(86400, 0);
    let lifetime = Lifetime::new(now, now + one_day / 2, now + one_day)?;
    construct_custom_network_with_lifetime(func, lifetime)
}

/// Build a fake network with enough information to enable some basic
/// tests.
///
/// The constructed network contains 40 relays, numbered 0 through 39,
/// with RSA and Ed25519 identity fingerprints set to 0x0000...00 through
/// 0x2727...27, and nicknames `test000` through `test039`.  Each pair of
/// relays is in a family with one another: 0x00..00 with 0x01..01, and so
/// on.
///
/// All relays are marked as Running and Valid.  The first ten are marked
/// with the HSDir flag.  The next ten are marked with the Exit flag.  The
/// next ten are marked with the Guard flag.  The last ten are marked with
/// the Exit _and_ Guard flags.
///
/// Odd-numbered exit relays are set to allow ports 80 and 443.
/// Even-numbered exit relays are set to allow ports 1-65535.  Everyone
/// else rejects all ports.
///
/// Every relay is given a measured weight based on its position within
/// its group of ten.  The weights for the ten relays in each group are:
/// 1000, 2000, 3000, ... 10000.  There is no additional flag-based
/// bandwidth weighting.
///
/// # Customization
///
/// Before each relay is added to the consensus or the network, it is
/// passed through the provided customization function, which receives the
/// current index (in range 0..40) and a [`NodeBuilders`] for the relay,
/// along with the [`ConsensusBuilder`] itself.
///
/// # Notes for future expansion
///
/// _Resist the temptation to make unconditional changes to this
/// function._  If the network generated by this function gets more and
/// more complex, then it will become harder and harder over time to make
/// it support new test cases and new behavior, and eventually we'll have
/// to throw the whole thing away.
pub fn construct_custom_network_with_lifetime<F>(
    mut func: F,
    lifetime: Lifetime,
) -> Result<(Consensus, Vec<Microdesc>)>
where
    F: FnMut(usize, &mut NodeBuilders, &mut ConsensusBuilder),
{
    let f = RelayFlags::RUNNING
        | RelayFlags::VALID
        | RelayFlags::V2DIR
        | RelayFlags::FAST
        | RelayFlags::STABLE;
    // define 4 groups of flags
    let flags = [
        f | RelayFlags::HSDIR,
        f | RelayFlags::EXIT,
        f | RelayFlags::GUARD,
        f | RelayFlags::EXIT | RelayFlags::GUARD,
    ];

    let mut bld = Consensus::builder(ConsensusFlavor::Microdesc);
    bld.lifetime(lifetime)
        .param("bwweightscale", 1)
        .weights("".parse()?);

    let mut microdescs = Vec::new();
    for idx in 0..40_u8 {
        // Each relay gets an unusable onion key.  Its identity
        // fingerprints and document digest are set to `idx`, repeating.
        let flags = flags[(idx / 10) as usize];
        let policy = if flags.contains(RelayFlags::EXIT) {
            if idx % 2 == 1 {
                "accept 80,443"
            } else {
                "accept 1-65535"
            }
        } else {
            "reject 1-65535"
        };
        // everybody is family with the adjacent relay.
        let fam_id = [idx ^ 1; 20];
        let family = format!("${}", hex::encode(fam_id));

        let mut md_builder = Microdesc::builder();
        md_builder
            .digest([idx; 32])
            .ntor_key((*b"----nothing in dirmgr uses this-").into())
            .ed25519_id([idx; 32].into())
            .family([family])
            .parse_exit_policy(policy)?;

        let weight = RelayWeight::Measured(1000 * u32::from(idx % 10 + 1));
        let mut rs_builder = bld.rs();
        rs_builder
            .identity([idx; 20].into())
            .nickname(format!("test{:03}", idx))
            .add_or_port(SocketAddr::from(([idx % 5, 0, 0, 3], 9001)))
            .doc_digest([idx; 32])
            .set_flags(flags)
            .weight(weight);

        let mut node_builders = NodeBuilders {
            rs: rs_builder,
            md: md_builder,
            omit_rs: false,
            omit_md: false,
        };

        func(idx as usize, &mut node_builders, &mut bld);

        if !node_builders.omit_md {
            microdescs.push(node_builders.md.testing_md()?);
        }

        if !node_builders.omit_rs {
            node_builders.rs.build_into(&mut bld)?;
        }
    }

    let consensus = bld.testing_consensus()?;

    Ok((consensus, microdescs))
}
