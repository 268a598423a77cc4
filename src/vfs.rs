//! VFS context and operation surface
//!
//! One `Vfs` owns the system root, the name cache, the two LRU zones and
//! the mount list, and exposes the user-visible operations
//! (open/read/write/readdir/link/rename/...). Operations take the calling
//! task explicitly; a process-wide instance is available through
//! [`get_vfs`] for kernels that want a singleton.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::min;
use core::sync::atomic::{AtomicU64, Ordering};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use spin::{Mutex, MutexGuard};

use crate::dcache::Dcache;
use crate::dnode::{Dnode, HashedName};
use crate::driver::{DirContext, DirEntry, FileSystem};
use crate::error::{VfsError, VfsResult};
use crate::file::{File, OpenFlags, SeekFrom, Task};
use crate::inode::{Inode, InodeType};
use crate::lru::LruZone;
use crate::mount::{Mount, Superblock};
use crate::pcache::PageCache;
use crate::ramfs::RamFs;
use crate::walk::WalkFlags;
use crate::{PAGE_SIZE, PATH_DEPTH_MAX};

/// Wall-clock source, unix seconds.
pub type ClockFn = fn() -> u64;

fn zero_clock() -> u64 {
    // TODO: integrate with the kernel time system
    0
}

/// Tunables for one VFS context.
#[derive(Clone, Copy)]
pub struct VfsConfig {
    /// Bound on the dnode LRU zone.
    pub dnode_cache_capacity: usize,
    /// Bound on the inode LRU zone.
    pub inode_cache_capacity: usize,
    /// Wall clock used for inode timestamps.
    pub clock: ClockFn,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            dnode_cache_capacity: 4096,
            inode_cache_capacity: 2048,
            clock: zero_clock,
        }
    }
}

/// Metadata snapshot of an open file.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub id: u64,
    pub itype: InodeType,
    pub size: u64,
    pub link_count: u32,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}

/// One VFS instance: root, caches, zones, and mounts.
pub struct Vfs {
    root: Arc<Dnode>,
    pub(crate) dcache: Dcache,
    pub(crate) dnode_lru: LruZone<Dnode>,
    pub(crate) inode_lru: LruZone<Inode>,
    mounts: Mutex<Vec<Arc<Mount>>>,
    next_uid: AtomicU64,
    clock: ClockFn,
}

impl Vfs {
    pub fn new() -> Arc<Self> {
        Self::with_config(VfsConfig::default())
    }

    pub fn with_config(config: VfsConfig) -> Arc<Self> {
        let root = Dnode::new(1, HashedName::new(""));
        // The system root is permanently pinned.
        root.ref_inc();

        Arc::new(Self {
            root,
            dcache: Dcache::new(),
            dnode_lru: LruZone::new(config.dnode_cache_capacity),
            inode_lru: LruZone::new(config.inode_cache_capacity),
            mounts: Mutex::new(Vec::new()),
            next_uid: AtomicU64::new(2),
            clock: config.clock,
        })
    }

    /// The system root dnode.
    pub fn root(&self) -> Arc<Dnode> {
        self.root.clone()
    }

    pub fn now(&self) -> u64 {
        (self.clock)()
    }

    /// Live entries in the dnode LRU zone.
    pub fn dnode_cache_len(&self) -> usize {
        self.dnode_lru.len()
    }

    /// Live entries in the inode LRU zone.
    pub fn inode_cache_len(&self) -> usize {
        self.inode_lru.len()
    }

    // ------------------------------------------------------------------
    // Locking helpers: acquisition promotes the object in its LRU zone.
    // ------------------------------------------------------------------

    pub(crate) fn lock_dnode<'a>(&self, dnode: &'a Arc<Dnode>) -> MutexGuard<'a, ()> {
        self.dnode_lru.touch(dnode);
        dnode.lock.lock()
    }

    pub(crate) fn lock_inode<'a>(&self, inode: &'a Arc<Inode>) -> MutexGuard<'a, ()> {
        self.inode_lru.touch(inode);
        inode.lock.lock()
    }

    // ------------------------------------------------------------------
    // Object lifecycle
    // ------------------------------------------------------------------

    /// Allocate a dnode below `parent`, inheriting its superblock.
    ///
    /// Runs an eviction sweep first when the zone is over capacity; the
    /// parent is pinned across the sweep.
    pub(crate) fn d_alloc(&self, parent: &Arc<Dnode>, name: HashedName) -> VfsResult<Arc<Dnode>> {
        parent.ref_inc();
        if self.dnode_lru.over_capacity() {
            let freed = self.dnode_lru.evict_half(|d| self.try_evict_dnode(d));
            debug!("vfs: dnode zone sweep freed {} entries", freed);
        }

        let uid = self.next_uid.fetch_add(1, Ordering::SeqCst);
        let dnode = Dnode::new(uid, name);
        if let Some(sb) = parent.superblock() {
            dnode.set_superblock(&sb);
        }
        self.dnode_lru.insert(&dnode);
        parent.ref_dec();
        Ok(dnode)
    }

    /// Tear a dnode out of the cache, detaching its children and dropping
    /// its inode binding. Children cascade-evict once the LRU elects them.
    pub(crate) fn d_free(&self, dnode: &Arc<Dnode>) {
        debug_assert!(dnode.ref_count() <= 1);
        for child in dnode.children_live() {
            self.dcache.remove(&child);
        }
        if let Some(inode) = dnode.take_inode() {
            inode.link_dec();
        }
        self.dcache.remove(dnode);
        self.dnode_lru.remove(dnode);
    }

    fn try_evict_dnode(&self, dnode: &Arc<Dnode>) -> bool {
        let cache_pin = if dnode.parent().is_some() { 1 } else { 0 };
        if dnode.ref_count() > cache_pin {
            return false;
        }
        self.d_free(dnode);
        true
    }

    /// Find a cached inode by id, promoting it on a hit.
    pub fn i_find(&self, sb: &Arc<Superblock>, id: u64) -> Option<Arc<Inode>> {
        let hit = sb.icache_find(id)?;
        self.inode_lru.touch(&hit);
        Some(hit)
    }

    /// Allocate (or reuse) the inode for `id`, installing driver state
    /// through the superblock's `init_inode`.
    pub fn i_alloc(&self, sb: &Arc<Superblock>, id: u64) -> VfsResult<Arc<Inode>> {
        if let Some(existing) = self.i_find(sb, id) {
            return Ok(existing);
        }
        if self.inode_lru.over_capacity() {
            let freed = self.inode_lru.evict_half(|i| self.try_evict_inode(i));
            debug!("vfs: inode zone sweep freed {} entries", freed);
        }

        let inode = Inode::new(sb, id, self.now());
        sb.ops().init_inode(&inode)?;
        sb.icache_add(&inode);
        self.inode_lru.insert(&inode);
        Ok(inode)
    }

    /// Destroy an unreferenced inode: write back, release driver state,
    /// drop the page cache, unhash.
    pub(crate) fn i_free(&self, inode: &Arc<Inode>) {
        if let Err(e) = inode.ops().sync(inode) {
            // Possible data loss; destruction continues regardless.
            warn!("vfs: sync failed while freeing inode {}: {}", inode.id(), e);
        }
        if let Some(sb) = inode.superblock() {
            if let Err(e) = sb.ops().release_inode(inode) {
                warn!("vfs: release failed for inode {}: {}", inode.id(), e);
            }
            sb.icache_remove(inode);
        }
        if let Some(pcache) = inode.take_pcache() {
            pcache.release();
        }
        self.inode_lru.remove(inode);
    }

    fn try_evict_inode(&self, inode: &Arc<Inode>) -> bool {
        if inode.link_count() > 0 || inode.open_count() > 0 {
            return false;
        }
        self.i_free(inode);
        true
    }

    /// Rebind a dnode's inode, maintaining the link counts.
    pub fn assign_inode(&self, dnode: &Arc<Dnode>, inode: &Arc<Inode>) {
        if let Some(old) = dnode.take_inode() {
            old.link_dec();
        }
        dnode.set_inode(Some(inode.clone()));
        inode.link_inc();
    }

    fn mount_of(&self, dnode: &Arc<Dnode>) -> Option<Arc<Mount>> {
        dnode.superblock().and_then(|sb| sb.mount())
    }

    // ------------------------------------------------------------------
    // Mounting
    // ------------------------------------------------------------------

    /// Mount a filesystem instance at `path`.
    ///
    /// The filesystem's root inode is bound onto the mount-point dnode
    /// itself; whatever was bound there before is displaced.
    pub fn mount(self: &Arc<Self>, path: &str, fs: &Arc<dyn FileSystem>) -> VfsResult<()> {
        let mnt_point = if path == "/" {
            self.root.clone()
        } else {
            self.walk(None, path, WalkFlags::empty())?.dnode
        };

        if let Some(inode) = mnt_point.inode() {
            if !inode.is_directory() {
                return Err(VfsError::NotADirectory);
            }
        }
        {
            let mounts = self.mounts.lock();
            let already = mounts.iter().any(|m| {
                m.root()
                    .map(|r| Arc::ptr_eq(&r, &mnt_point))
                    .unwrap_or(false)
            });
            if already {
                return Err(VfsError::Busy);
            }
        }

        // Drop stale bindings from the filesystem underneath.
        for child in mnt_point.children_live() {
            self.dcache.remove(&child);
        }
        if let Some(old) = mnt_point.take_inode() {
            old.link_dec();
        }

        let sb = Superblock::new(
            Arc::downgrade(self),
            fs.name(),
            fs.superblock_ops(),
            fs.read_only(),
        );
        sb.set_root(&mnt_point);
        mnt_point.set_superblock(&sb);
        fs.mount(self, &sb, &mnt_point)?;

        let mount = Mount::new(sb.clone(), &mnt_point);
        sb.set_mount(&mount);
        mnt_point.ref_inc();
        self.mounts.lock().push(mount);

        info!("vfs: mounted {} at {}", fs.name(), path);
        Ok(())
    }

    /// Detach the filesystem mounted at `path`. Fails while any open file
    /// or working directory pins the mount.
    pub fn unmount(self: &Arc<Self>, path: &str) -> VfsResult<()> {
        let mnt_point = self.walk(None, path, WalkFlags::empty())?.dnode;

        let mount = {
            let mounts = self.mounts.lock();
            mounts
                .iter()
                .find(|m| {
                    m.root()
                        .map(|r| Arc::ptr_eq(&r, &mnt_point))
                        .unwrap_or(false)
                })
                .cloned()
                .ok_or(VfsError::InvalidArgument)?
        };
        if mount.busy_count() > 0 {
            return Err(VfsError::Busy);
        }

        for child in mnt_point.children_live() {
            self.dcache.remove(&child);
        }
        if let Some(inode) = mnt_point.take_inode() {
            inode.link_dec();
        }
        mnt_point.clear_superblock();
        mnt_point.ref_dec();

        // The bare system root stays in place; any other mount point is
        // dropped from the cache so the next walk repopulates it from the
        // underlying filesystem.
        if !Arc::ptr_eq(&mnt_point, &self.root) {
            if let Some(parent) = mnt_point.parent() {
                if let Some(psb) = parent.superblock() {
                    mnt_point.set_superblock(&psb);
                }
            }
            self.d_free(&mnt_point);
        }

        self.mounts.lock().retain(|m| !Arc::ptr_eq(m, &mount));
        info!("vfs: unmounted {}", path);
        Ok(())
    }

    // ------------------------------------------------------------------
    // open / close
    // ------------------------------------------------------------------

    /// Locate `path`, creating the final component through the driver
    /// when absent.
    fn locate_file(&self, start: Option<&Arc<Dnode>>, path: &str) -> VfsResult<Arc<Dnode>> {
        match self.walk(start, path, WalkFlags::empty()) {
            Ok(walked) => Ok(walked.dnode),
            Err(VfsError::NotFound) => {
                let walked = self.walk(start, path, WalkFlags::PARENT)?;
                let name = walked.last.ok_or(VfsError::InvalidArgument)?;
                let parent = walked.dnode;
                let dir_inode = parent.inode().ok_or(VfsError::NotFound)?;
                if !dir_inode.is_directory() {
                    return Err(VfsError::NotADirectory);
                }
                let sb = parent.superblock().ok_or(VfsError::NotFound)?;
                if sb.read_only() {
                    return Err(VfsError::ReadOnly);
                }

                let _dguard = self.lock_dnode(&parent);
                let child = self.d_alloc(&parent, HashedName::new(&name))?;
                {
                    let _iguard = self.lock_inode(&dir_inode);
                    if let Err(e) = dir_inode.ops().create(&dir_inode, &child, InodeType::FILE) {
                        self.dnode_lru.remove(&child);
                        return Err(e);
                    }
                }
                self.dcache.add(&parent, &child);
                Ok(child)
            }
            Err(e) => Err(e),
        }
    }

    /// Open `path` and install the file into a free descriptor slot.
    pub fn open(&self, task: &Task, path: &str, flags: OpenFlags) -> VfsResult<usize> {
        let cwd = task.cwd();
        let start = cwd.as_ref();

        let dnode = if flags.contains(OpenFlags::CREATE) {
            self.locate_file(start, path)?
        } else {
            self.walk(start, path, WalkFlags::empty())?.dnode
        };
        let inode = dnode.inode().ok_or(VfsError::NotFound)?;

        if inode.is_regular() && inode.pcache().is_none() {
            inode.set_pcache(PageCache::new());
        }

        let file = File::new(dnode.clone(), inode.clone(), flags, inode.fops());
        {
            let _iguard = self.lock_inode(&inode);
            inode.ops().open(&inode, &file)?;
        }
        if flags.contains(OpenFlags::APPEND) {
            file.set_pos(inode.size());
        }

        dnode.ref_inc();
        inode.open_inc();
        if let Some(mount) = self.mount_of(&dnode) {
            mount.mark_busy();
        }

        match task.install(file) {
            Ok(fd) => Ok(fd),
            Err(e) => {
                inode.open_dec();
                dnode.ref_dec();
                if let Some(mount) = self.mount_of(&dnode) {
                    mount.relax();
                }
                Err(e)
            }
        }
    }

    /// Close a descriptor; the file tears down when the last duplicate
    /// goes away.
    pub fn close(&self, task: &Task, fd: usize) -> VfsResult<()> {
        let file = task.remove_fd(fd)?;
        self.close_file(&file)
    }

    fn close_file(&self, file: &Arc<File>) -> VfsResult<()> {
        if file.ref_dec() > 1 {
            return Ok(());
        }

        let inode = file.inode();
        {
            let _iguard = self.lock_inode(inode);
            if let Some(pcache) = inode.pcache() {
                if let Err(e) = pcache.commit_all(inode) {
                    warn!("vfs: writeback failed on close of inode {}: {}", inode.id(), e);
                }
            }
            let _ = file.ops().close(file);
        }

        inode.open_dec();
        file.dnode().ref_dec();
        if let Some(mount) = self.mount_of(file.dnode()) {
            mount.relax();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // read / write / seek
    // ------------------------------------------------------------------

    fn cached_read(
        &self,
        task: &Task,
        inode: &Arc<Inode>,
        pcache: &Arc<PageCache>,
        buf: &mut [u8],
        pos: u64,
    ) -> VfsResult<usize> {
        let size = inode.size();
        if pos >= size {
            return Ok(0);
        }
        let want = min(buf.len() as u64, size - pos) as usize;
        let mut done = 0usize;

        while done < want {
            // Interruptible section: a pending signal aborts with the
            // partial count accumulated so far.
            if done > 0 && task.signal_pending() {
                break;
            }
            let at = pos + done as u64;
            let chunk = min(want - done, PAGE_SIZE - (at % PAGE_SIZE as u64) as usize);
            pcache.read(inode, &mut buf[done..done + chunk], at)?;
            done += chunk;
        }
        Ok(done)
    }

    fn cached_write(
        &self,
        task: &Task,
        inode: &Arc<Inode>,
        pcache: &Arc<PageCache>,
        buf: &[u8],
        pos: u64,
    ) -> VfsResult<usize> {
        let mut done = 0usize;

        while done < buf.len() {
            if done > 0 && task.signal_pending() {
                break;
            }
            let at = pos + done as u64;
            let chunk = min(buf.len() - done, PAGE_SIZE - (at % PAGE_SIZE as u64) as usize);
            pcache.write(inode, &buf[done..done + chunk], at)?;
            done += chunk;
            if at + chunk as u64 > inode.size() {
                inode.set_size(at + chunk as u64);
            }
        }
        Ok(done)
    }

    /// Read from a descriptor at its current position.
    pub fn read(&self, task: &Task, fd: usize, buf: &mut [u8]) -> VfsResult<usize> {
        let file = task.getfd(fd)?;
        let inode = file.inode().clone();
        if inode.is_directory() {
            return Err(VfsError::IsADirectory);
        }

        let _iguard = self.lock_inode(&inode);
        inode.set_atime(self.now());
        let pos = file.pos();

        let pcache = inode.pcache();
        let n = match pcache {
            Some(ref pcache)
                if !file.flags().contains(OpenFlags::DIRECT) && !inode.is_device() =>
            {
                self.cached_read(task, &inode, pcache, buf, pos)?
            }
            _ => file.ops().read(&file, buf, pos)?,
        };

        file.advance(n as u64);
        Ok(n)
    }

    /// Write to a descriptor at its current position.
    pub fn write(&self, task: &Task, fd: usize, buf: &[u8]) -> VfsResult<usize> {
        let file = task.getfd(fd)?;
        let inode = file.inode().clone();
        if inode.is_directory() {
            return Err(VfsError::IsADirectory);
        }

        let _iguard = self.lock_inode(&inode);
        inode.set_mtime(self.now());
        let pos = file.pos();

        let pcache = inode.pcache();
        let n = match pcache {
            Some(ref pcache)
                if !file.flags().contains(OpenFlags::DIRECT) && !inode.is_device() =>
            {
                self.cached_write(task, &inode, pcache, buf, pos)?
            }
            _ => {
                let n = file.ops().write(&file, buf, pos)?;
                if inode.is_regular() && pos + n as u64 > inode.size() {
                    inode.set_size(pos + n as u64);
                }
                n
            }
        };

        file.advance(n as u64);
        Ok(n)
    }

    /// Reposition a descriptor. The driver validates the target; the
    /// position only moves on success.
    pub fn lseek(&self, task: &Task, fd: usize, whence: SeekFrom) -> VfsResult<u64> {
        let file = task.getfd(fd)?;
        let inode = file.inode().clone();
        let _iguard = self.lock_inode(&inode);

        let target = match whence {
            SeekFrom::Start(off) => off as i64,
            SeekFrom::Current(off) => file.pos() as i64 + off,
            SeekFrom::End(off) => inode.size() as i64 + off,
        };
        if target < 0 {
            return Err(VfsError::InvalidArgument);
        }

        let validated = file.ops().seek(&file, target as u64)?;
        file.set_pos(validated);
        Ok(validated)
    }

    // ------------------------------------------------------------------
    // Directories
    // ------------------------------------------------------------------

    /// Produce the next directory entry, advancing the descriptor.
    ///
    /// Offsets 0 and 1 are the synthetic `"."` and `".."`; driver entries
    /// appear from offset 2. Returns `false` at the end of the directory.
    pub fn readdir(&self, task: &Task, fd: usize, dirent: &mut DirEntry) -> VfsResult<bool> {
        let file = task.getfd(fd)?;
        let inode = file.inode().clone();
        if !inode.is_directory() {
            return Err(VfsError::NotADirectory);
        }

        let _iguard = self.lock_inode(&inode);
        let pos = file.pos();

        let produced = match pos {
            0 => {
                dirent.name = String::from(".");
                dirent.itype = InodeType::DIRECTORY;
                true
            }
            1 => {
                dirent.name = String::from("..");
                dirent.itype = InodeType::DIRECTORY;
                true
            }
            _ => {
                let mut ctx = DirContext::new((pos - 2) as usize);
                match file.ops().readdir(&file, &mut ctx) {
                    Ok(()) => match ctx.take_entry() {
                        Some(entry) => {
                            *dirent = entry;
                            true
                        }
                        None => false,
                    },
                    Err(VfsError::NotFound) => false,
                    Err(e) => return Err(e),
                }
            }
        };

        if produced {
            file.advance(1);
        }
        Ok(produced)
    }

    /// Create a directory.
    pub fn mkdir(&self, task: &Task, path: &str) -> VfsResult<()> {
        let cwd = task.cwd();
        let start = cwd.as_ref();

        match self.walk(start, path, WalkFlags::empty()) {
            Ok(_) => return Err(VfsError::AlreadyExists),
            Err(VfsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let walked = self.walk(start, path, WalkFlags::PARENT)?;
        let name = walked.last.ok_or(VfsError::AlreadyExists)?;
        let parent = walked.dnode;
        let dir_inode = parent.inode().ok_or(VfsError::NotFound)?;
        if !dir_inode.is_directory() {
            return Err(VfsError::NotADirectory);
        }
        let sb = parent.superblock().ok_or(VfsError::NotFound)?;
        if sb.read_only() {
            return Err(VfsError::ReadOnly);
        }

        let _dguard = self.lock_dnode(&parent);
        let child = self.d_alloc(&parent, HashedName::new(&name))?;
        {
            let _iguard = self.lock_inode(&dir_inode);
            if let Err(e) = dir_inode.ops().mkdir(&dir_inode, &child) {
                self.dnode_lru.remove(&child);
                return Err(e);
            }
        }
        self.dcache.add(&parent, &child);
        Ok(())
    }

    /// Remove an empty, unreferenced directory.
    pub fn rmdir(&self, task: &Task, path: &str) -> VfsResult<()> {
        let cwd = task.cwd();
        let dnode = self.walk(cwd.as_ref(), path, WalkFlags::empty())?.dnode;
        let inode = dnode.inode().ok_or(VfsError::NotFound)?;

        if !inode.is_directory() {
            return Err(VfsError::NotADirectory);
        }
        let sb = dnode.superblock().ok_or(VfsError::NotFound)?;
        if sb.read_only() {
            return Err(VfsError::ReadOnly);
        }
        if dnode.ref_count() > 1 || inode.open_count() > 0 {
            return Err(VfsError::Busy);
        }
        if !dnode.children_live().is_empty() {
            return Err(VfsError::DirectoryNotEmpty);
        }
        let parent = dnode.parent().ok_or(VfsError::Busy)?;
        let parent_inode = parent.inode().ok_or(VfsError::NotFound)?;

        {
            let _pguard = self.lock_dnode(&parent);
            let _dguard = self.lock_dnode(&dnode);
            let _iguard = self.lock_inode(&parent_inode);
            parent_inode.ops().rmdir(&parent_inode, &dnode)?;
        }
        self.d_free(&dnode);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    fn unlink_from(&self, start: Option<&Arc<Dnode>>, path: &str) -> VfsResult<()> {
        let dnode = self.walk(start, path, WalkFlags::NOFOLLOW)?.dnode;
        let inode = dnode.inode().ok_or(VfsError::NotFound)?;

        if inode.is_directory() {
            return Err(VfsError::IsADirectory);
        }
        let sb = dnode.superblock().ok_or(VfsError::NotFound)?;
        if sb.read_only() {
            return Err(VfsError::ReadOnly);
        }
        if dnode.ref_count() > 1 || inode.open_count() > 0 {
            return Err(VfsError::Busy);
        }
        let parent = dnode.parent().ok_or(VfsError::Busy)?;
        let parent_inode = parent.inode().ok_or(VfsError::NotFound)?;

        {
            let _pguard = self.lock_dnode(&parent);
            let _dguard = self.lock_dnode(&dnode);
            let _iguard = self.lock_inode(&parent_inode);
            parent_inode.ops().unlink(&parent_inode, &dnode)?;
        }
        self.d_free(&dnode);
        Ok(())
    }

    /// Remove a name (refuses directories and open files).
    pub fn unlink(&self, task: &Task, path: &str) -> VfsResult<()> {
        let cwd = task.cwd();
        self.unlink_from(cwd.as_ref(), path)
    }

    /// `unlink` relative to an open directory descriptor.
    pub fn unlinkat(&self, task: &Task, dirfd: usize, path: &str) -> VfsResult<()> {
        let dir = task.getfd(dirfd)?.dnode().clone();
        if !dir.is_directory() {
            return Err(VfsError::NotADirectory);
        }
        self.unlink_from(Some(&dir), path)
    }

    /// Create a hard link `newpath` to the inode behind `oldpath`.
    pub fn link(&self, task: &Task, oldpath: &str, newpath: &str) -> VfsResult<()> {
        let cwd = task.cwd();
        let start = cwd.as_ref();

        let old = self.walk(start, oldpath, WalkFlags::empty())?.dnode;
        let old_inode = old.inode().ok_or(VfsError::NotFound)?;

        match self.walk(start, newpath, WalkFlags::NOFOLLOW) {
            Ok(_) => return Err(VfsError::AlreadyExists),
            Err(VfsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let walked = self.walk(start, newpath, WalkFlags::PARENT)?;
        let name = walked.last.ok_or(VfsError::InvalidArgument)?;
        let parent = walked.dnode;
        let parent_inode = parent.inode().ok_or(VfsError::NotFound)?;
        if !parent_inode.is_directory() {
            return Err(VfsError::NotADirectory);
        }

        let old_sb = old.superblock().ok_or(VfsError::NotFound)?;
        let new_sb = parent.superblock().ok_or(VfsError::NotFound)?;
        if !Arc::ptr_eq(&old_sb, &new_sb) {
            return Err(VfsError::CrossDevice);
        }
        if new_sb.read_only() {
            return Err(VfsError::ReadOnly);
        }

        let _dguard = self.lock_dnode(&parent);
        let child = self.d_alloc(&parent, HashedName::new(&name))?;
        {
            let _iguard = self.lock_inode(&old_inode);
            if let Err(e) = old_inode.ops().link(&old_inode, &parent_inode, &child) {
                self.dnode_lru.remove(&child);
                return Err(e);
            }
        }
        self.dcache.add(&parent, &child);
        self.assign_inode(&child, &old_inode);
        Ok(())
    }

    /// Create a symlink at `path` pointing to `target`.
    pub fn symlink(&self, task: &Task, path: &str, target: &str) -> VfsResult<()> {
        let cwd = task.cwd();
        let start = cwd.as_ref();

        match self.walk(start, path, WalkFlags::NOFOLLOW) {
            Ok(_) => return Err(VfsError::AlreadyExists),
            Err(VfsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let walked = self.walk(start, path, WalkFlags::PARENT)?;
        let name = walked.last.ok_or(VfsError::InvalidArgument)?;
        let parent = walked.dnode;
        let dir_inode = parent.inode().ok_or(VfsError::NotFound)?;
        if !dir_inode.is_directory() {
            return Err(VfsError::NotADirectory);
        }
        let sb = parent.superblock().ok_or(VfsError::NotFound)?;
        if sb.read_only() {
            return Err(VfsError::ReadOnly);
        }

        let _dguard = self.lock_dnode(&parent);
        let child = self.d_alloc(&parent, HashedName::new(&name))?;
        {
            let _iguard = self.lock_inode(&dir_inode);
            if let Err(e) = dir_inode.ops().create(&dir_inode, &child, InodeType::SYMLINK) {
                self.dnode_lru.remove(&child);
                return Err(e);
            }
            let link_inode = child.inode().ok_or(VfsError::NotSupported)?;
            let _lguard = self.lock_inode(&link_inode);
            link_inode.ops().set_symlink(&link_inode, target)?;
        }
        self.dcache.add(&parent, &child);
        Ok(())
    }

    fn readlink_from(
        &self,
        start: Option<&Arc<Dnode>>,
        path: &str,
        buf: &mut [u8],
    ) -> VfsResult<usize> {
        let dnode = self.walk(start, path, WalkFlags::NOFOLLOW)?.dnode;
        let inode = dnode.inode().ok_or(VfsError::NotFound)?;
        if !inode.is_symlink() {
            return Err(VfsError::InvalidArgument);
        }

        let target = {
            let _iguard = self.lock_inode(&inode);
            inode.ops().read_symlink(&inode)?
        };
        let n = min(buf.len(), target.len());
        buf[..n].copy_from_slice(&target.as_bytes()[..n]);
        Ok(n)
    }

    /// Read a symlink's target (the final component is not followed).
    pub fn readlink(&self, task: &Task, path: &str, buf: &mut [u8]) -> VfsResult<usize> {
        let cwd = task.cwd();
        self.readlink_from(cwd.as_ref(), path, buf)
    }

    /// `readlink` relative to an open directory descriptor.
    pub fn readlinkat(
        &self,
        task: &Task,
        dirfd: usize,
        path: &str,
        buf: &mut [u8],
    ) -> VfsResult<usize> {
        let dir = task.getfd(dirfd)?.dnode().clone();
        if !dir.is_directory() {
            return Err(VfsError::NotADirectory);
        }
        self.readlink_from(Some(&dir), path, buf)
    }

    // ------------------------------------------------------------------
    // rename
    // ------------------------------------------------------------------

    /// Move `oldpath` to `newpath` within one filesystem.
    pub fn rename(&self, task: &Task, oldpath: &str, newpath: &str) -> VfsResult<()> {
        let cwd = task.cwd();
        let start = cwd.as_ref();

        let src = self.walk(start, oldpath, WalkFlags::NOFOLLOW)?.dnode;
        if Arc::ptr_eq(&src, &self.root) {
            return Err(VfsError::Busy);
        }
        let src_inode = src.inode().ok_or(VfsError::NotFound)?;
        let src_sb = src.superblock().ok_or(VfsError::NotFound)?;
        if src_sb.read_only() {
            return Err(VfsError::ReadOnly);
        }

        let target = match self.walk(start, newpath, WalkFlags::NOFOLLOW) {
            Ok(walked) => Some(walked.dnode),
            Err(VfsError::NotFound) => None,
            Err(e) => return Err(e),
        };

        let (new_parent, new_name) = match &target {
            Some(t) => (t.parent().ok_or(VfsError::Busy)?, t.name().as_str().into()),
            None => {
                let walked = self.walk(start, newpath, WalkFlags::PARENT)?;
                let name: String = walked.last.ok_or(VfsError::InvalidArgument)?;
                (walked.dnode, name)
            }
        };
        let new_sb = new_parent.superblock().ok_or(VfsError::NotFound)?;
        if !Arc::ptr_eq(&src_sb, &new_sb) {
            return Err(VfsError::CrossDevice);
        }

        if let Some(t) = &target {
            let t_inode = t.inode().ok_or(VfsError::NotFound)?;
            // Hard link to self: nothing to do.
            if t_inode.id() == src_inode.id() {
                return Ok(());
            }
            if src.ref_count() > 1 || t.ref_count() > 1 {
                return Err(VfsError::Busy);
            }
            if t.is_directory() && !t.children_live().is_empty() {
                return Err(VfsError::DirectoryNotEmpty);
            }
        } else if src.ref_count() > 1 {
            return Err(VfsError::Busy);
        }

        let old_parent = src.parent().ok_or(VfsError::Busy)?;
        let old_dir = old_parent.inode().ok_or(VfsError::NotFound)?;
        let new_dir = new_parent.inode().ok_or(VfsError::NotFound)?;
        if !new_dir.is_directory() {
            return Err(VfsError::NotADirectory);
        }

        {
            // Lock order: current, target, old parent, new parent.
            let _g_src = self.lock_dnode(&src);
            let _g_tgt = target.as_ref().map(|t| self.lock_dnode(t));
            let _g_old = self.lock_dnode(&old_parent);
            let _g_new = if Arc::ptr_eq(&old_parent, &new_parent) {
                None
            } else {
                Some(self.lock_dnode(&new_parent))
            };
            let _gi_old = self.lock_inode(&old_dir);
            let _gi_new = if Arc::ptr_eq(&old_dir, &new_dir) {
                None
            } else {
                Some(self.lock_inode(&new_dir))
            };

            old_dir.ops().rename(&old_dir, &src, &new_dir, &new_name)?;
            self.dcache
                .rehash(&new_parent, &src, HashedName::new(&new_name));
        }

        if let Some(t) = &target {
            self.d_free(t);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Working directory and descriptors
    // ------------------------------------------------------------------

    fn change_cwd(&self, task: &Task, dnode: Arc<Dnode>) -> VfsResult<()> {
        if !dnode.is_directory() {
            return Err(VfsError::NotADirectory);
        }
        dnode.ref_inc();
        if let Some(mount) = self.mount_of(&dnode) {
            mount.mark_busy();
        }
        let old = task.swap_cwd(Some(dnode));
        if let Some(old) = old {
            old.ref_dec();
            if let Some(mount) = self.mount_of(&old) {
                mount.relax();
            }
        }
        Ok(())
    }

    /// Change the task's working directory.
    pub fn chdir(&self, task: &Task, path: &str) -> VfsResult<()> {
        let cwd = task.cwd();
        let dnode = self.walk(cwd.as_ref(), path, WalkFlags::empty())?.dnode;
        self.change_cwd(task, dnode)
    }

    /// Change the working directory to an open descriptor's dnode.
    pub fn fchdir(&self, task: &Task, fd: usize) -> VfsResult<()> {
        let dnode = task.getfd(fd)?.dnode().clone();
        self.change_cwd(task, dnode)
    }

    /// Reconstruct an absolute path by following parent links.
    fn dnode_path(&self, dnode: &Arc<Dnode>, buf: &mut [u8]) -> VfsResult<usize> {
        let mut names: Vec<String> = Vec::new();
        let mut current = dnode.clone();
        let mut depth = 0;

        while let Some(parent) = current.parent() {
            names.push(current.name().as_str().into());
            current = parent;
            depth += 1;
            if depth > PATH_DEPTH_MAX {
                return Err(VfsError::TooManySymlinks);
            }
        }
        if !Arc::ptr_eq(&current, &self.root) {
            // Detached from the tree (unlinked or evicted ancestry).
            return Err(VfsError::NotFound);
        }

        let mut path = String::from("/");
        for (i, name) in names.iter().rev().enumerate() {
            if i > 0 {
                path.push('/');
            }
            path.push_str(name);
        }

        let bytes = path.as_bytes();
        if bytes.len() + 1 > buf.len() {
            return Err(VfsError::OutOfRange);
        }
        buf[..bytes.len()].copy_from_slice(bytes);
        buf[bytes.len()] = 0;
        Ok(bytes.len())
    }

    /// Write the task's working directory into `buf` (NUL-terminated).
    pub fn getcwd(&self, task: &Task, buf: &mut [u8]) -> VfsResult<usize> {
        let cwd = task.cwd().unwrap_or_else(|| self.root());
        self.dnode_path(&cwd, buf)
    }

    /// Write the absolute path of an open descriptor into `buf`.
    pub fn realpathat(&self, task: &Task, fd: usize, buf: &mut [u8]) -> VfsResult<usize> {
        let dnode = task.getfd(fd)?.dnode().clone();
        self.dnode_path(&dnode, buf)
    }

    /// Duplicate a descriptor into the first free slot.
    pub fn dup(&self, task: &Task, fd: usize) -> VfsResult<usize> {
        let file = task.getfd(fd)?;
        file.ref_inc();
        match task.install(file.clone()) {
            Ok(new_fd) => Ok(new_fd),
            Err(e) => {
                file.ref_dec();
                Err(e)
            }
        }
    }

    /// Duplicate `old` onto `new`, closing whatever occupied `new`.
    /// `dup2(x, x)` validates `x` and returns it unchanged.
    pub fn dup2(&self, task: &Task, old: usize, new: usize) -> VfsResult<usize> {
        let file = task.getfd(old)?;
        if old == new {
            return Ok(new);
        }
        file.ref_inc();
        let displaced = match task.install_at(new, file.clone()) {
            Ok(displaced) => displaced,
            Err(e) => {
                file.ref_dec();
                return Err(e);
            }
        };
        if let Some(displaced) = displaced {
            let _ = self.close_file(&displaced);
        }
        Ok(new)
    }

    /// Commit cached pages and sync the file through the driver.
    pub fn fsync(&self, task: &Task, fd: usize) -> VfsResult<()> {
        let file = task.getfd(fd)?;
        let inode = file.inode().clone();
        let _iguard = self.lock_inode(&inode);
        if let Some(pcache) = inode.pcache() {
            pcache.commit_all(&inode)?;
        }
        file.ops().sync(&file)
    }

    /// Metadata snapshot of an open descriptor.
    pub fn fstat(&self, task: &Task, fd: usize) -> VfsResult<Stat> {
        let file = task.getfd(fd)?;
        let inode = file.inode();
        Ok(Stat {
            id: inode.id(),
            itype: inode.itype(),
            size: inode.size(),
            link_count: inode.link_count(),
            atime: inode.atime(),
            mtime: inode.mtime(),
            ctime: inode.ctime(),
        })
    }
}

lazy_static! {
    /// Process-wide VFS instance.
    static ref VFS: Arc<Vfs> = Vfs::new();
}

/// The global VFS instance.
pub fn get_vfs() -> Arc<Vfs> {
    VFS.clone()
}

/// Initialize the global instance with a ram filesystem at `/`.
/// Idempotent: a subsequent call leaves the mounted root alone.
pub fn init() -> VfsResult<()> {
    let vfs = get_vfs();
    if vfs.root().inode().is_some() {
        return Ok(());
    }
    let ramfs: Arc<dyn FileSystem> = Arc::new(RamFs::new());
    vfs.mount("/", &ramfs)
}
