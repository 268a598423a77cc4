//! Superblocks and mounts
//!
//! A superblock represents one mounted filesystem instance and owns the
//! per-instance inode cache. Mounting binds the filesystem's root inode
//! onto the mount-point dnode itself, so the superblock's root *is* the
//! mount point and walks cross mounts with no special casing. The mount
//! object tracks the busy counter that open files and working directories
//! pin.

use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::{Mutex, RwLock};

use crate::dnode::Dnode;
use crate::driver::SuperblockOps;
use crate::inode::Inode;
use crate::vfs::Vfs;
use crate::ICACHE_HASHTABLE_SIZE;

/// One mounted filesystem instance.
pub struct Superblock {
    vfs: Weak<Vfs>,
    fs_name: &'static str,
    ops: Arc<dyn SuperblockOps>,
    read_only: bool,
    root: RwLock<Weak<Dnode>>,
    mount: RwLock<Weak<Mount>>,
    icache: Vec<Mutex<Vec<Arc<Inode>>>>,
}

impl Superblock {
    pub(crate) fn new(
        vfs: Weak<Vfs>,
        fs_name: &'static str,
        ops: Arc<dyn SuperblockOps>,
        read_only: bool,
    ) -> Arc<Self> {
        let mut icache = Vec::with_capacity(ICACHE_HASHTABLE_SIZE);
        for _ in 0..ICACHE_HASHTABLE_SIZE {
            icache.push(Mutex::new(Vec::new()));
        }
        Arc::new(Self {
            vfs,
            fs_name,
            ops,
            read_only,
            root: RwLock::new(Weak::new()),
            mount: RwLock::new(Weak::new()),
            icache,
        })
    }

    /// The owning VFS context.
    pub fn vfs(&self) -> Arc<Vfs> {
        self.vfs.upgrade().expect("VFS context dropped")
    }

    pub fn name(&self) -> &'static str {
        self.fs_name
    }

    pub fn ops(&self) -> Arc<dyn SuperblockOps> {
        self.ops.clone()
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// The dnode this filesystem is mounted on.
    pub fn root(&self) -> Option<Arc<Dnode>> {
        self.root.read().upgrade()
    }

    pub(crate) fn set_root(&self, root: &Arc<Dnode>) {
        *self.root.write() = Arc::downgrade(root);
    }

    pub fn mount(&self) -> Option<Arc<Mount>> {
        self.mount.read().upgrade()
    }

    pub(crate) fn set_mount(&self, mount: &Arc<Mount>) {
        *self.mount.write() = Arc::downgrade(mount);
    }

    fn icache_bucket(&self, id: u64) -> usize {
        (id as usize) & (ICACHE_HASHTABLE_SIZE - 1)
    }

    pub(crate) fn icache_find(&self, id: u64) -> Option<Arc<Inode>> {
        let bucket = self.icache[self.icache_bucket(id)].lock();
        bucket.iter().find(|i| i.id() == id).cloned()
    }

    /// Register an inode under its id. Remove-then-insert, so re-adding
    /// after an id change is safe.
    pub(crate) fn icache_add(&self, inode: &Arc<Inode>) {
        let mut bucket = self.icache[self.icache_bucket(inode.id())].lock();
        bucket.retain(|i| i.id() != inode.id());
        bucket.push(inode.clone());
    }

    pub(crate) fn icache_remove(&self, inode: &Arc<Inode>) {
        let mut bucket = self.icache[self.icache_bucket(inode.id())].lock();
        bucket.retain(|i| !Arc::ptr_eq(i, inode));
    }
}

/// Busy-counter bookkeeping for one mount.
pub struct Mount {
    superblock: Arc<Superblock>,
    mnt_point: Weak<Dnode>,
    busy: AtomicUsize,
}

impl Mount {
    pub(crate) fn new(superblock: Arc<Superblock>, mnt_point: &Arc<Dnode>) -> Arc<Self> {
        Arc::new(Self {
            superblock,
            mnt_point: Arc::downgrade(mnt_point),
            busy: AtomicUsize::new(0),
        })
    }

    pub fn superblock(&self) -> &Arc<Superblock> {
        &self.superblock
    }

    /// The mount's root dnode.
    pub fn root(&self) -> Option<Arc<Dnode>> {
        self.mnt_point.upgrade()
    }

    /// Pin the mount (an open file or cwd now depends on it).
    pub fn mark_busy(&self) {
        self.busy.fetch_add(1, Ordering::SeqCst);
    }

    /// Release one busy pin.
    pub fn relax(&self) {
        let prev = self.busy.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0);
    }

    pub fn busy_count(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }
}
