//! Hashed name cache
//!
//! Parent-relative lookup of child dnodes. The bucket index mixes the
//! component's 32-bit hash with the parent's stable identity so that
//! same-named siblings of different parents land on different chains.
//! Lookups compare parent identity and the full 32-bit hash only; the
//! theoretical collision is accepted.

use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use crate::dnode::{Dnode, HashedName};
use crate::DCACHE_HASHTABLE_SIZE;

/// The global parent-keyed dnode cache.
pub struct Dcache {
    buckets: Vec<Mutex<Vec<Arc<Dnode>>>>,
}

impl Dcache {
    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(DCACHE_HASHTABLE_SIZE);
        for _ in 0..DCACHE_HASHTABLE_SIZE {
            buckets.push(Mutex::new(Vec::new()));
        }
        Self { buckets }
    }

    /// Mix the name hash with the parent identity and fold into the table.
    fn bucket_of(&self, parent: &Arc<Dnode>, hash: u32) -> usize {
        let mut mixed = hash.wrapping_add(parent.uid() as u32);
        mixed ^= mixed >> 16;
        (mixed as usize) & (DCACHE_HASHTABLE_SIZE - 1)
    }

    /// Find `name` under `parent`.
    ///
    /// `""` and `"."` resolve to the parent itself; `".."` resolves to the
    /// parent's parent, or the node itself at a root.
    pub fn lookup(&self, parent: &Arc<Dnode>, name: &HashedName) -> Option<Arc<Dnode>> {
        match name.as_str() {
            "" | "." => return Some(parent.clone()),
            ".." => return Some(parent.parent().unwrap_or_else(|| parent.clone())),
            _ => {}
        }

        let bucket = self.buckets[self.bucket_of(parent, name.hash())].lock();
        bucket
            .iter()
            .find(|d| {
                d.name_hash() == name.hash()
                    && d.parent()
                        .map(|p| Arc::ptr_eq(&p, parent))
                        .unwrap_or(false)
            })
            .cloned()
    }

    /// Bind `dnode` under `parent` and take the cache's reference.
    pub fn add(&self, parent: &Arc<Dnode>, dnode: &Arc<Dnode>) {
        dnode.set_parent(Some(parent.clone()));
        parent.add_child(dnode);

        let mut bucket = self.buckets[self.bucket_of(parent, dnode.name_hash())].lock();
        bucket.push(dnode.clone());
        drop(bucket);

        dnode.ref_inc();
    }

    /// Unlink `dnode` from its parent and drop the cache's reference.
    ///
    /// No-op for nodes that are not hashed (no parent).
    pub fn remove(&self, dnode: &Arc<Dnode>) {
        let parent = match dnode.parent() {
            Some(p) => p,
            None => return,
        };
        debug_assert!(dnode.ref_count() >= 1);

        let mut bucket = self.buckets[self.bucket_of(&parent, dnode.name_hash())].lock();
        bucket.retain(|d| !Arc::ptr_eq(d, dnode));
        drop(bucket);

        parent.remove_child(dnode);
        dnode.set_parent(None);
        dnode.ref_dec();
    }

    /// Re-key `dnode` under a fresh name and a (possibly different) parent.
    pub fn rehash(&self, new_parent: &Arc<Dnode>, dnode: &Arc<Dnode>, new_name: HashedName) {
        self.remove(dnode);
        dnode.set_name(new_name);
        self.add(new_parent, dnode);
    }
}

impl Default for Dcache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dnode(uid: u64, name: &str) -> Arc<Dnode> {
        Dnode::new(uid, HashedName::new(name))
    }

    #[test]
    fn dot_and_dotdot_resolve_without_probing() {
        let cache = Dcache::new();
        let root = dnode(1, "");
        let dir = dnode(2, "d");
        cache.add(&root, &dir);

        let hit = cache.lookup(&dir, &HashedName::new(".")).unwrap();
        assert!(Arc::ptr_eq(&hit, &dir));

        let up = cache.lookup(&dir, &HashedName::new("..")).unwrap();
        assert!(Arc::ptr_eq(&up, &root));

        // ".." at a root resolves to the root itself
        let up = cache.lookup(&root, &HashedName::new("..")).unwrap();
        assert!(Arc::ptr_eq(&up, &root));
    }

    #[test]
    fn add_lookup_remove() {
        let cache = Dcache::new();
        let root = dnode(1, "");
        let child = dnode(2, "etc");
        cache.add(&root, &child);
        assert_eq!(child.ref_count(), 1);

        let hit = cache.lookup(&root, &HashedName::new("etc")).unwrap();
        assert!(Arc::ptr_eq(&hit, &child));

        cache.remove(&child);
        assert!(cache.lookup(&root, &HashedName::new("etc")).is_none());
        assert!(child.parent().is_none());
        assert_eq!(child.ref_count(), 0);
    }

    #[test]
    fn same_name_under_different_parents() {
        let cache = Dcache::new();
        let root = dnode(1, "");
        let d1 = dnode(2, "a");
        let d2 = dnode(3, "b");
        cache.add(&root, &d1);
        cache.add(&root, &d2);

        let c1 = dnode(4, "conf");
        let c2 = dnode(5, "conf");
        cache.add(&d1, &c1);
        cache.add(&d2, &c2);

        let hit1 = cache.lookup(&d1, &HashedName::new("conf")).unwrap();
        let hit2 = cache.lookup(&d2, &HashedName::new("conf")).unwrap();
        assert!(Arc::ptr_eq(&hit1, &c1));
        assert!(Arc::ptr_eq(&hit2, &c2));
    }

    #[test]
    fn rehash_moves_between_parents() {
        let cache = Dcache::new();
        let root = dnode(1, "");
        let d1 = dnode(2, "a");
        let d2 = dnode(3, "b");
        cache.add(&root, &d1);
        cache.add(&root, &d2);

        let child = dnode(4, "x");
        cache.add(&d1, &child);

        cache.rehash(&d2, &child, HashedName::new("y"));
        assert!(cache.lookup(&d1, &HashedName::new("x")).is_none());
        let hit = cache.lookup(&d2, &HashedName::new("y")).unwrap();
        assert!(Arc::ptr_eq(&hit, &child));
        assert_eq!(child.ref_count(), 1);
    }
}
