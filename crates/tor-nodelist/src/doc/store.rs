//! In-memory faces of the document owners.
//!
//! The router list owns router descriptors; the microdescriptor cache owns
//! microdescriptors.  Their job here is only to answer the lookups the
//! nodelist and the readiness estimator make; fetching and persistence are
//! other crates' concern.
//!
//! Both stores hand out `Arc`s; an owner that is about to discard a
//! document must first call the corresponding `remove_*` operation on the
//! nodelist, so that no node is left pointing at it.

use crate::doc::microdesc::{MdDigest, Microdesc};
use crate::doc::routerdesc::RouterInfo;
use crate::doc::DocDigest;
use std::collections::HashMap;
use std::sync::Arc;

/// The set of router descriptors we currently hold.
#[derive(Debug, Default)]
pub struct RouterList {
    /// Every descriptor we hold, in insertion order.
    routers: Vec<Arc<RouterInfo>>,
    /// Index from descriptor digest to descriptor.
    by_digest: HashMap<DocDigest, Arc<RouterInfo>>,
}

impl RouterList {
    /// Return a new empty RouterList.
    pub fn new() -> Self {
        RouterList::default()
    }
    /// Add `ri` to this list, and return a shared handle to it.
    pub fn insert(&mut self, ri: RouterInfo) -> Arc<RouterInfo> {
        let ri = Arc::new(ri);
        self.routers.push(Arc::clone(&ri));
        self.by_digest.insert(*ri.desc_digest(), Arc::clone(&ri));
        ri
    }
    /// Remove this exact descriptor from the list.
    ///
    /// The caller must already have detached it from the nodelist.
    pub fn remove(&mut self, ri: &Arc<RouterInfo>) {
        self.routers.retain(|r| !Arc::ptr_eq(r, ri));
        if let Some(cur) = self.by_digest.get(ri.desc_digest()) {
            if Arc::ptr_eq(cur, ri) {
                self.by_digest.remove(ri.desc_digest());
            }
        }
    }
    /// Return the descriptor whose digest is `digest`, if we hold it.
    pub fn by_descriptor_digest(&self, digest: &DocDigest) -> Option<&Arc<RouterInfo>> {
        self.by_digest.get(digest)
    }
    /// Return all the descriptors we hold.
    pub fn routers(&self) -> &[Arc<RouterInfo>] {
        &self.routers[..]
    }
    /// Return the number of descriptors we hold.
    pub fn len(&self) -> usize {
        self.routers.len()
    }
    /// Return true if we hold no descriptors.
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}

/// The set of microdescriptors we currently hold.
#[derive(Debug, Default)]
pub struct MdCache {
    /// Every microdescriptor we hold, indexed by digest.
    mds: HashMap<MdDigest, Arc<Microdesc>>,
}

impl MdCache {
    /// Return a new empty cache.
    pub fn new() -> Self {
        MdCache::default()
    }
    /// Add `md` to the cache, and return a shared handle to it.
    pub fn insert(&mut self, md: Microdesc) -> Arc<Microdesc> {
        let md = Arc::new(md);
        self.mds.insert(*md.digest(), Arc::clone(&md));
        md
    }
    /// Return the microdescriptor whose digest is `digest`, if we hold it.
    pub fn lookup_by_digest256(&self, digest: &MdDigest) -> Option<&Arc<Microdesc>> {
        self.mds.get(digest)
    }
    /// Remove the microdescriptor with this digest from the cache.
    ///
    /// The caller must already have detached it from the nodelist.
    pub fn remove(&mut self, digest: &MdDigest) -> Option<Arc<Microdesc>> {
        self.mds.remove(digest)
    }
    /// Drop every microdescriptor that no node currently holds.
    ///
    /// Returns how many were reclaimed.
    pub fn reclaim_unheld(&mut self) -> usize {
        let before = self.mds.len();
        self.mds.retain(|_, md| md.held_by_nodes() > 0);
        before - self.mds.len()
    }
    /// Return an iterator over every microdescriptor we hold.
    pub fn mds(&self) -> impl Iterator<Item = &Arc<Microdesc>> {
        self.mds.values()
    }
    /// Return the number of microdescriptors we hold.
    pub fn len(&self) -> usize {
        self.mds.len()
    }
    /// Return true if we hold no microdescriptors.
    pub fn is_empty(&self) -> bool {
        self.mds.is_empty()
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn routerlist_basics() {
        let mut rl = RouterList::new();
        assert!(rl.is_empty());
        let ri = RouterInfo::builder()
            .identity([1; 20].into())
            .add_or_port(SocketAddr::from(([10, 0, 0, 1], 9001)))
            .desc_digest([11; 32])
            .build()
            .unwrap();
        let ri = rl.insert(ri);
        assert_eq!(rl.len(), 1);
        assert!(rl.by_descriptor_digest(&[11; 32]).is_some());
        rl.remove(&ri);
        assert!(rl.is_empty());
        assert!(rl.by_descriptor_digest(&[11; 32]).is_none());
    }

    #[test]
    fn mdcache_reclaim() {
        let mut cache = MdCache::new();
        let md1 = cache.insert(Microdesc::builder().digest([1; 32]).testing_md().unwrap());
        let _md2 = cache.insert(Microdesc::builder().digest([2; 32]).testing_md().unwrap());
        md1.note_held();
        assert_eq!(cache.reclaim_unheld(), 1);
        assert!(cache.lookup_by_digest256(&[1; 32]).is_some());
        assert!(cache.lookup_by_digest256(&[2; 32]).is_none());
    }
}
