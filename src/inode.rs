//! Inodes
//!
//! An inode is the filesystem-visible object behind a name: regular file,
//! directory, symlink, or device. Inodes are cached per superblock by id
//! and may outlive any individual dnode; they are destroyed by the LRU
//! zone once both the link count and the open count reach zero.

use alloc::sync::{Arc, Weak};
use core::any::Any;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use spin::{Mutex, RwLock};

use bitflags::bitflags;

use crate::driver::{DefaultFileOps, FileOps, InodeOps, NullInodeOps};
use crate::mount::Superblock;
use crate::pcache::PageCache;

bitflags! {
    /// Inode type bits.
    pub struct InodeType: u32 {
        /// Directory
        const DIRECTORY  = 0x01;
        /// Regular file
        const FILE       = 0x02;
        /// Symbolic link
        const SYMLINK    = 0x04;
        /// Sequential (character) device
        const SEQ_DEVICE = 0x08;
        /// Volume (block) device
        const VOL_DEVICE = 0x10;
    }
}

/// One filesystem object.
pub struct Inode {
    /// Id unique within the owning superblock.
    id: u64,
    itype: RwLock<InodeType>,
    size: RwLock<u64>,
    link_count: AtomicU32,
    open_count: AtomicU32,
    atime: AtomicU64,
    mtime: AtomicU64,
    ctime: AtomicU64,
    superblock: Weak<Superblock>,
    ops: RwLock<Arc<dyn InodeOps>>,
    fops: RwLock<Arc<dyn FileOps>>,
    /// Driver-private state installed by `init_inode` / population.
    data: RwLock<Option<Arc<dyn Any + Send + Sync>>>,
    /// Created on first open of a regular file, released on destruction.
    pcache: RwLock<Option<Arc<PageCache>>>,
    /// Serializes driver calls that touch this inode or its data.
    pub(crate) lock: Mutex<()>,
}

impl Inode {
    pub(crate) fn new(sb: &Arc<Superblock>, id: u64, now: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            itype: RwLock::new(InodeType::FILE),
            size: RwLock::new(0),
            link_count: AtomicU32::new(0),
            open_count: AtomicU32::new(0),
            atime: AtomicU64::new(now),
            mtime: AtomicU64::new(now),
            ctime: AtomicU64::new(now),
            superblock: Arc::downgrade(sb),
            ops: RwLock::new(Arc::new(NullInodeOps)),
            fops: RwLock::new(Arc::new(DefaultFileOps)),
            data: RwLock::new(None),
            pcache: RwLock::new(None),
            lock: Mutex::new(()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn itype(&self) -> InodeType {
        *self.itype.read()
    }

    pub fn set_itype(&self, itype: InodeType) {
        *self.itype.write() = itype;
    }

    pub fn size(&self) -> u64 {
        *self.size.read()
    }

    pub fn set_size(&self, size: u64) {
        *self.size.write() = size;
    }

    pub fn link_count(&self) -> u32 {
        self.link_count.load(Ordering::SeqCst)
    }

    pub(crate) fn link_inc(&self) {
        self.link_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn link_dec(&self) {
        let prev = self.link_count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0);
    }

    pub fn open_count(&self) -> u32 {
        self.open_count.load(Ordering::SeqCst)
    }

    pub(crate) fn open_inc(&self) {
        self.open_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn open_dec(&self) {
        let prev = self.open_count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0);
    }

    pub fn atime(&self) -> u64 {
        self.atime.load(Ordering::Relaxed)
    }

    pub fn set_atime(&self, t: u64) {
        self.atime.store(t, Ordering::Relaxed);
    }

    pub fn mtime(&self) -> u64 {
        self.mtime.load(Ordering::Relaxed)
    }

    pub fn set_mtime(&self, t: u64) {
        self.mtime.store(t, Ordering::Relaxed);
    }

    pub fn ctime(&self) -> u64 {
        self.ctime.load(Ordering::Relaxed)
    }

    pub fn set_ctime(&self, t: u64) {
        self.ctime.store(t, Ordering::Relaxed);
    }

    pub fn superblock(&self) -> Option<Arc<Superblock>> {
        self.superblock.upgrade()
    }

    pub fn ops(&self) -> Arc<dyn InodeOps> {
        self.ops.read().clone()
    }

    pub fn set_ops(&self, ops: Arc<dyn InodeOps>) {
        *self.ops.write() = ops;
    }

    pub fn fops(&self) -> Arc<dyn FileOps> {
        self.fops.read().clone()
    }

    pub fn set_fops(&self, fops: Arc<dyn FileOps>) {
        *self.fops.write() = fops;
    }

    pub fn data(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.data.read().clone()
    }

    pub fn set_data(&self, data: Arc<dyn Any + Send + Sync>) {
        *self.data.write() = Some(data);
    }

    pub fn pcache(&self) -> Option<Arc<PageCache>> {
        self.pcache.read().clone()
    }

    pub(crate) fn set_pcache(&self, pcache: Arc<PageCache>) {
        *self.pcache.write() = Some(pcache);
    }

    pub(crate) fn take_pcache(&self) -> Option<Arc<PageCache>> {
        self.pcache.write().take()
    }

    /// Whether the page cache holds uncommitted pages.
    pub fn is_dirty(&self) -> bool {
        self.pcache().map(|p| p.has_dirty()).unwrap_or(false)
    }

    pub fn is_directory(&self) -> bool {
        self.itype().contains(InodeType::DIRECTORY)
    }

    pub fn is_regular(&self) -> bool {
        self.itype().contains(InodeType::FILE)
    }

    pub fn is_symlink(&self) -> bool {
        self.itype().contains(InodeType::SYMLINK)
    }

    pub fn is_device(&self) -> bool {
        self.itype()
            .intersects(InodeType::SEQ_DEVICE | InodeType::VOL_DEVICE)
    }
}
