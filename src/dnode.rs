//! Directory nodes
//!
//! A dnode represents one name bound at one point in the tree: a hashed
//! name, a parent back-link, the bound inode, and the bookkeeping that
//! ties it into the name cache and the LRU zone. Parent links are strong
//! (a held dnode keeps its ancestry alive); the child list is
//! observational.

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::{Mutex, RwLock};

use crate::inode::{Inode, InodeType};
use crate::mount::Superblock;

/// 32-bit FNV-1a over the name bytes.
pub fn hash_name(name: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in name.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// A path component with its precomputed hash.
#[derive(Debug, Clone)]
pub struct HashedName {
    name: String,
    hash: u32,
}

impl HashedName {
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            hash: hash_name(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }
}

/// One cached name binding in the tree.
pub struct Dnode {
    /// Stable identity, used to key children buckets.
    uid: u64,
    name: RwLock<HashedName>,
    parent: RwLock<Option<Arc<Dnode>>>,
    children: Mutex<Vec<Weak<Dnode>>>,
    inode: RwLock<Option<Arc<Inode>>>,
    superblock: RwLock<Weak<Superblock>>,
    /// Pins: cache membership plus every cwd/open-file/mount-root role.
    ref_count: AtomicUsize,
    /// Serializes child population and name mutation.
    pub(crate) lock: Mutex<()>,
}

impl Dnode {
    pub(crate) fn new(uid: u64, name: HashedName) -> Arc<Self> {
        Arc::new(Self {
            uid,
            name: RwLock::new(name),
            parent: RwLock::new(None),
            children: Mutex::new(Vec::new()),
            inode: RwLock::new(None),
            superblock: RwLock::new(Weak::new()),
            ref_count: AtomicUsize::new(0),
            lock: Mutex::new(()),
        })
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Current name (cloned; renames swap it under the node lock).
    pub fn name(&self) -> HashedName {
        self.name.read().clone()
    }

    pub fn name_hash(&self) -> u32 {
        self.name.read().hash()
    }

    pub(crate) fn set_name(&self, name: HashedName) {
        *self.name.write() = name;
    }

    pub fn parent(&self) -> Option<Arc<Dnode>> {
        self.parent.read().clone()
    }

    pub(crate) fn set_parent(&self, parent: Option<Arc<Dnode>>) {
        *self.parent.write() = parent;
    }

    pub fn inode(&self) -> Option<Arc<Inode>> {
        self.inode.read().clone()
    }

    pub(crate) fn set_inode(&self, inode: Option<Arc<Inode>>) {
        *self.inode.write() = inode;
    }

    pub(crate) fn take_inode(&self) -> Option<Arc<Inode>> {
        self.inode.write().take()
    }

    pub fn superblock(&self) -> Option<Arc<Superblock>> {
        self.superblock.read().upgrade()
    }

    pub(crate) fn set_superblock(&self, sb: &Arc<Superblock>) {
        *self.superblock.write() = Arc::downgrade(sb);
    }

    pub(crate) fn clear_superblock(&self) {
        *self.superblock.write() = Weak::new();
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::SeqCst)
    }

    pub(crate) fn ref_inc(&self) {
        self.ref_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn ref_dec(&self) {
        let prev = self.ref_count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0);
    }

    pub(crate) fn add_child(&self, child: &Arc<Dnode>) {
        let mut children = self.children.lock();
        children.retain(|w| w.strong_count() > 0);
        children.push(Arc::downgrade(child));
    }

    pub(crate) fn remove_child(&self, child: &Arc<Dnode>) {
        let mut children = self.children.lock();
        children.retain(|w| w.strong_count() > 0 && w.as_ptr() != Arc::as_ptr(child));
    }

    /// Live children snapshot.
    pub fn children_live(&self) -> Vec<Arc<Dnode>> {
        let mut children = self.children.lock();
        children.retain(|w| w.strong_count() > 0);
        children.iter().filter_map(|w| w.upgrade()).collect()
    }

    pub fn is_directory(&self) -> bool {
        self.inode()
            .map(|i| i.itype().contains(InodeType::DIRECTORY))
            .unwrap_or(false)
    }

    pub fn is_symlink(&self) -> bool {
        self.inode()
            .map(|i| i.itype().contains(InodeType::SYMLINK))
            .unwrap_or(false)
    }
}
