//! The directory-readiness estimator.
//!
//! A client should not try to build circuits until it has learned enough
//! of the network for those circuits to be likely to succeed.  "Enough"
//! is measured in bandwidth: the fraction of consensus-weighted guard,
//! middle, and exit bandwidth whose descriptors we actually hold, with
//! the three fractions multiplied into an estimated fraction of buildable
//! paths.
//!
//! The estimate is cached: anything that changes our view of the
//! directory calls [`Nodelist::router_dir_info_changed`], and the next
//! call to [`Nodelist::router_have_minimum_dir_info`] recomputes.

use crate::doc::netstatus::{client_would_use_router, Consensus, ConsensusFlavor, RouterStatus};
use crate::doc::store::{MdCache, RouterList};
use crate::providers::{BootstrapPhase, ClientStatusEvent};
use crate::weight::{WeightRole, WeightSet};
use crate::Nodelist;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Does the consensus contain nodes that can exit?
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum ConsensusPathType {
    /// We have never checked, or we have reason to believe our last
    /// known value is no longer valid.
    #[default]
    Unknown,
    /// The consensus contains at least one relay with the Exit flag; we
    /// can try to build exit paths.
    Exit,
    /// The consensus contains no exits; only internal paths can work.
    ///
    /// (This situation typically occurs during bootstrap of a test
    /// network.)
    Internal,
}

/// Cached state for the readiness estimator.
#[derive(Debug)]
pub(crate) struct DirInfoState {
    /// The last answer we computed.
    have_min_dir_info: bool,
    /// Whether the consensus had exits, the last time we looked.
    have_consensus_path: ConsensusPathType,
    /// True if enough has changed that `have_min_dir_info` can no longer
    /// be trusted.
    need_update: bool,
    /// What we're missing before we have enough directory info.
    status: String,
    /// True once we have logged that fetches are being delayed.
    logged_delay: bool,
}

impl Default for DirInfoState {
    fn default() -> Self {
        DirInfoState {
            have_min_dir_info: false,
            have_consensus_path: ConsensusPathType::Unknown,
            need_update: true,
            status: String::new(),
            logged_delay: false,
        }
    }
}

/// The default percentage of path bandwidth needed before we build
/// circuits, when neither the configuration nor the consensus says
/// otherwise.
const DFLT_PCT_USABLE_NEEDED: i32 = 60;

/// Return the fraction of the consensus-weighted bandwidth of `relays`
/// whose documents are present in the relevant store.
///
/// If the relays have no weighted bandwidth at all, fall back to the
/// unweighted fraction; if there are no relays, return 0.0 to avoid
/// dividing by zero and giving NaN.
fn frac_nodes_with_descriptors(
    ws: &WeightSet,
    relays: &[&Arc<RouterStatus>],
    role: WeightRole,
    md_flavor: bool,
    routers: &RouterList,
    mds: &MdCache,
) -> f64 {
    let mut total_weight = 0_u64;
    let mut have_weight = 0_u64;
    let mut total_count = 0_usize;
    let mut have_count = 0_usize;

    for rs in relays {
        let w = ws.weight_rs_for_role(rs, role);
        let present = if md_flavor {
            mds.lookup_by_digest256(rs.descriptor_digest()).is_some()
        } else {
            routers.by_descriptor_digest(rs.descriptor_digest()).is_some()
        };
        total_weight += w;
        total_count += 1;
        if present {
            have_weight += w;
            have_count += 1;
        }
    }

    if total_weight > 0 {
        (have_weight as f64) / (total_weight as f64)
    } else if total_count > 0 {
        (have_count as f64) / (total_count as f64)
    } else {
        0.0
    }
}

impl Nodelist {
    /// Note that our internal view of the directory has changed: the next
    /// readiness query will recompute from scratch.
    ///
    /// Call this when the consensus changes, when descriptors arrive or
    /// expire, or when the number of running relays changes.
    pub fn router_dir_info_changed(&mut self) {
        self.dir_info.need_update = true;
    }

    /// Return whether the consensus we last examined had exits.
    pub fn router_have_consensus_path(&self) -> ConsensusPathType {
        self.dir_info.have_consensus_path
    }

    /// Return a string describing what we're missing before we have
    /// enough directory info.
    pub fn dir_info_status(&self) -> &str {
        &self.dir_info.status
    }

    /// Return true if we have enough directory information to start
    /// building circuits.
    ///
    /// The answer is cached between calls to
    /// [`router_dir_info_changed`](Nodelist::router_dir_info_changed).
    /// Presence of descriptors is judged against `routers` for a plain
    /// consensus, and against `mds` for a microdesc-flavored one.
    pub fn router_have_minimum_dir_info(
        &mut self,
        now: SystemTime,
        routers: &RouterList,
        mds: &MdCache,
    ) -> bool {
        if let Some(gate) = self.providers.fetch_gate.clone() {
            if let Some(reason) = gate.should_delay_dir_fetches() {
                if !self.dir_info.logged_delay {
                    info!("Delaying directory fetches: {}", reason);
                    self.dir_info.logged_delay = true;
                }
                self.dir_info.status = reason;
                return false;
            }
        }
        self.dir_info.logged_delay = false;

        if self.dir_info.need_update {
            self.update_router_have_minimum_dir_info(now, routers, mds);
        }
        self.dir_info.have_min_dir_info
    }

    /// Return how far we are through fetching the descriptors we need,
    /// as a fraction in [0.0, 1.0] of the needed path bandwidth.
    pub fn loading_descriptors_progress(
        &mut self,
        now: SystemTime,
        routers: &RouterList,
        mds: &MdCache,
    ) -> f64 {
        let ns = match &self.consensus {
            Some(ns) if ns.reasonably_live(now) => Arc::clone(ns),
            // Can't count descriptors if we have no list of them.
            _ => return 0.0,
        };
        let (paths, _, _, _) = self.compute_frac_paths_available(&ns, routers, mds, false);
        (paths / self.frac_paths_needed(&ns)).clamp(0.0, 1.0)
    }

    /// Recompute `have_min_dir_info`, and fire the transition events.
    fn update_router_have_minimum_dir_info(
        &mut self,
        now: SystemTime,
        routers: &RouterList,
        mds: &MdCache,
    ) {
        let res = self.compute_minimum_dir_info(now, routers, mds);

        // If paths have just become available in this update.
        if res && !self.dir_info.have_min_dir_info {
            if let Some(reporter) = &self.providers.status {
                reporter.client_status(ClientStatusEvent::EnoughDirInfo);
                reporter.bootstrap_phase(BootstrapPhase::ConnOr);
            }
            info!("We now have enough directory information to build circuits.");
        }

        // If paths have just become unavailable in this update.
        if !res && self.dir_info.have_min_dir_info {
            warn!(
                "Our directory information is no longer up-to-date enough to build \
                 circuits: {}",
                self.dir_info.status
            );
            self.dir_info.have_consensus_path = ConsensusPathType::Unknown;
            if let Some(reporter) = &self.providers.status {
                reporter.client_status(ClientStatusEvent::NotEnoughDirInfo);
            }
        }

        self.dir_info.have_min_dir_info = res;
        self.dir_info.need_update = false;
    }

    /// The estimate itself: do we have enough directory information right
    /// now?  Sets the status string as a side effect.
    fn compute_minimum_dir_info(
        &mut self,
        now: SystemTime,
        routers: &RouterList,
        mds: &MdCache,
    ) -> bool {
        let ns = match &self.consensus {
            Some(ns) if ns.reasonably_live(now) => Arc::clone(ns),
            Some(_) => {
                self.dir_info.status = "We have no recent usable consensus.".to_string();
                return false;
            }
            None => {
                self.dir_info.status = "We have no usable consensus.".to_string();
                return false;
            }
        };

        let using_md = ns.flavor() == ConsensusFlavor::Microdesc;

        if let Some(guards) = &self.providers.guards {
            if !guards.have_enough_dir_info_to_build_circuits() {
                self.dir_info.status =
                    "We're missing descriptors for some of our primary entry guards".to_string();
                return false;
            }
        }

        // Check fraction of available paths.
        let (paths, num_present, num_usable, status) =
            self.compute_frac_paths_available(&ns, routers, mds, true);

        if paths < self.frac_paths_needed(&ns) {
            self.dir_info.status = format!(
                "We need more {}descriptors: we have {}/{}, and can only build {}% of \
                 likely paths. (We have {}.)",
                if using_md { "micro" } else { "" },
                num_present,
                num_usable,
                (paths * 100.0) as i32,
                status.unwrap_or_default()
            );
            if let Some(reporter) = &self.providers.status {
                reporter.bootstrap_phase(BootstrapPhase::RequestingDescriptors);
            }
            return false;
        }

        true
    }

    /// Return the fraction of paths needed before we're willing to build
    /// circuits, as configured, or as set in the consensus `ns`.
    fn frac_paths_needed(&self, ns: &Consensus) -> f64 {
        if let Some(needed) = self.config.paths_needed_to_build_circuits {
            if needed >= 0.0 {
                return needed;
            }
        }
        f64::from(ns.params().get_clamped(
            "min_paths_for_circs_pct",
            DFLT_PCT_USABLE_NEEDED,
            25,
            95,
        )) / 100.0
    }

    /// Estimate which fraction of usable paths through the network we
    /// can build.
    ///
    /// Returns the path fraction, the number of usable relays we hold a
    /// descriptor for, the number of usable relays overall, and (when
    /// `want_status` is set) a human-readable breakdown by position.
    ///
    /// Updates [`ConsensusPathType`] as a side effect: with no exits in
    /// the consensus, the exit fraction is reported as 100% and only
    /// internal paths can be built.
    fn compute_frac_paths_available(
        &mut self,
        ns: &Arc<Consensus>,
        routers: &RouterList,
        mds: &MdCache,
        want_status: bool,
    ) -> (f64, usize, usize, Option<String>) {
        let ws = WeightSet::from_consensus(ns);
        let md_flavor = ns.flavor() == ConsensusFlavor::Microdesc;
        let authdir = self.providers.authority.is_some();

        let (num_present, num_usable, mid) =
            self.count_usable_descriptors(ns, routers, mds, None, false);

        let guards: Vec<&Arc<RouterStatus>> =
            if let Some(entry_set) = self.config.entry_nodes.clone() {
                let (np, nu, guards) =
                    self.count_usable_descriptors(ns, routers, mds, Some(&entry_set), false);
                debug!("entry guards: {} present, {} usable", np, nu);
                guards
            } else {
                mid.iter()
                    .copied()
                    .filter(|rs| {
                        if authdir {
                            rs.is_flagged_guard()
                        } else {
                            self.by_id(rs.rsa_identity())
                                .is_some_and(|node| node.flags().is_possible_guard)
                        }
                    })
                    .collect()
            };

        // All nodes with the exit flag.
        let (np, nu, exits) = self.count_usable_descriptors(ns, routers, mds, None, true);
        debug!("exits: {} present, {} usable", np, nu);

        // We need at least one exit present in the consensus to consider
        // building exit paths.
        let old_have_consensus_path = self.dir_info.have_consensus_path;
        self.dir_info.have_consensus_path = if nu > 0 {
            ConsensusPathType::Exit
        } else {
            ConsensusPathType::Internal
        };
        if self.dir_info.have_consensus_path == ConsensusPathType::Internal
            && old_have_consensus_path != ConsensusPathType::Internal
        {
            info!(
                "The current consensus has no exit nodes. Only internal paths, such as \
                 paths to onion services, can be built."
            );
            // However, exit relays can reachability self-test using this
            // consensus, join the network, and appear in a later one.
        }

        let f_guard =
            frac_nodes_with_descriptors(&ws, &guards, WeightRole::Guard, md_flavor, routers, mds);
        let f_mid =
            frac_nodes_with_descriptors(&ws, &mid, WeightRole::Middle, md_flavor, routers, mds);
        let mut f_exit =
            frac_nodes_with_descriptors(&ws, &exits, WeightRole::Exit, md_flavor, routers, mds);

        debug!(
            "f_guard: {:.2}, f_mid: {:.2}, f_exit: {:.2}",
            f_guard, f_mid, f_exit
        );

        if let Some(exit_set) = self.config.exit_nodes.clone() {
            // All nodes with the exit flag in the ExitNodes option.
            let (np, nu, myexits) =
                self.count_usable_descriptors(ns, routers, mds, Some(&exit_set), true);
            debug!("myexits: {} present, {} usable", np, nu);

            // Now compute the nodes in the ExitNodes option for which we
            // don't know the exit policy, or know it permits something.
            let (_, _, mut myexits_unflagged) =
                self.count_usable_descriptors(ns, routers, mds, Some(&exit_set), false);
            myexits_unflagged.retain(|rs| match self.by_id(rs.rsa_identity()) {
                // This node is not actually an exit.
                Some(node) => !(node.has_descriptor() && node.exit_policy_rejects_all()),
                None => true,
            });

            let f_myexit = frac_nodes_with_descriptors(
                &ws,
                &myexits,
                WeightRole::Exit,
                md_flavor,
                routers,
                mds,
            );
            let f_myexit_unflagged = frac_nodes_with_descriptors(
                &ws,
                &myexits_unflagged,
                WeightRole::Exit,
                md_flavor,
                routers,
                mds,
            );

            // If our ExitNodes list has eliminated every possible Exit
            // node, and there were some possible Exit nodes, then instead
            // consider nodes that permit exiting to some ports.
            let f_myexit = if myexits.is_empty() && !myexits_unflagged.is_empty() {
                f_myexit_unflagged
            } else {
                f_myexit
            };

            // We don't want to make it easy for a directory to trickle
            // exits to us until it learns which exits we have configured,
            // so require a threshold both of total exits and usable
            // exits.
            if f_myexit < f_exit {
                f_exit = f_myexit;
            }
        }

        // If the consensus has no exits, treat the exit fraction as 100%.
        if self.dir_info.have_consensus_path != ConsensusPathType::Exit {
            f_exit = 1.0;
        }

        let f_path = f_guard * f_mid * f_exit;

        let status = want_status.then(|| {
            format!(
                "{}% of guards bw, {}% of midpoint bw, and {}% of exit bw{} = {}% of path bw",
                (f_guard * 100.0) as i32,
                (f_mid * 100.0) as i32,
                (f_exit * 100.0) as i32,
                if self.dir_info.have_consensus_path == ConsensusPathType::Exit {
                    ""
                } else {
                    " (no exits in consensus)"
                },
                (f_path * 100.0) as i32
            )
        });

        (f_path, num_present, num_usable, status)
    }

    /// Iterate over the relays in `ns`, counting how many of them seem
    /// like ones we'd use, and how many of *those* we hold a document
    /// for.
    ///
    /// If `in_set` is present, only consider relays in that set.  If
    /// `exit_only` is set, only consider relays with the Exit flag.
    /// Returns `(num_present, num_usable, usable_relays)`.
    fn count_usable_descriptors<'c>(
        &self,
        ns: &'c Arc<Consensus>,
        routers: &RouterList,
        mds: &MdCache,
        in_set: Option<&crate::RouterSet>,
        exit_only: bool,
    ) -> (usize, usize, Vec<&'c Arc<RouterStatus>>) {
        let md_flavor = ns.flavor() == ConsensusFlavor::Microdesc;
        let mut num_present = 0;
        let mut num_usable = 0;
        let mut usable = Vec::new();

        for rs in ns.relays() {
            if self.by_id(rs.rsa_identity()).is_none() {
                // This would be a bug: every entry in the consensus is
                // supposed to have a node.
                continue;
            }
            if exit_only && !rs.is_flagged_exit() {
                continue;
            }
            if let Some(set) = in_set {
                if !self.routerset_contains_routerstatus(set, rs) {
                    continue;
                }
            }
            if client_would_use_router(rs) {
                // The consensus says we want it.
                num_usable += 1;
                let present = if md_flavor {
                    mds.lookup_by_digest256(rs.descriptor_digest()).is_some()
                } else {
                    routers.by_descriptor_digest(rs.descriptor_digest()).is_some()
                };
                if present {
                    // We have the document listed in the consensus.
                    num_present += 1;
                }
                usable.push(rs);
            }
        }

        debug!(
            "{} usable, {} present ({}{}).",
            num_usable,
            num_present,
            if md_flavor { "microdesc" } else { "desc" },
            if exit_only { " exits" } else { "s" }
        );
        (num_present, num_usable, usable)
    }
}
