//! Open files and file-descriptor tables
//!
//! A `File` is one `open()` result: it pins its dnode, counts against the
//! inode's open count, and marks its mount busy until the last duplicate
//! closes. A `Task` carries the fixed-size descriptor slot array, the
//! working directory, and the signal flag that aborts interruptible I/O.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use spin::{Mutex, RwLock};

use bitflags::bitflags;

use crate::dnode::Dnode;
use crate::driver::FileOps;
use crate::error::{VfsError, VfsResult};
use crate::inode::Inode;
use crate::MAX_FD;

bitflags! {
    /// Open options.
    pub struct OpenFlags: u32 {
        /// Create the file if it does not exist
        const CREATE = 0x01;
        /// Start with the position at the current file size
        const APPEND = 0x02;
        /// Bypass the page cache
        const DIRECT = 0x04;
    }
}

/// Seek position
#[derive(Debug, Clone, Copy)]
pub enum SeekFrom {
    /// Seek from start of file
    Start(u64),
    /// Seek from current position
    Current(i64),
    /// Seek from end of file
    End(i64),
}

/// One open-file object.
pub struct File {
    dnode: Arc<Dnode>,
    inode: Arc<Inode>,
    pos: Mutex<u64>,
    flags: OpenFlags,
    ref_count: AtomicUsize,
    ops: Arc<dyn FileOps>,
}

impl core::fmt::Debug for File {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("File")
            .field("dnode", &self.dnode.uid())
            .field("flags", &self.flags)
            .finish()
    }
}

impl File {
    pub(crate) fn new(
        dnode: Arc<Dnode>,
        inode: Arc<Inode>,
        flags: OpenFlags,
        ops: Arc<dyn FileOps>,
    ) -> Arc<Self> {
        Arc::new(Self {
            dnode,
            inode,
            pos: Mutex::new(0),
            flags,
            ref_count: AtomicUsize::new(1),
            ops,
        })
    }

    pub fn dnode(&self) -> &Arc<Dnode> {
        &self.dnode
    }

    pub fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn ops(&self) -> Arc<dyn FileOps> {
        self.ops.clone()
    }

    pub fn pos(&self) -> u64 {
        *self.pos.lock()
    }

    pub(crate) fn set_pos(&self, pos: u64) {
        *self.pos.lock() = pos;
    }

    pub(crate) fn advance(&self, n: u64) {
        *self.pos.lock() += n;
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::SeqCst)
    }

    pub(crate) fn ref_inc(&self) {
        self.ref_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Drop one reference; returns the count before the decrement.
    pub(crate) fn ref_dec(&self) -> usize {
        let prev = self.ref_count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0);
        prev
    }
}

/// One descriptor slot: the file pointer plus per-descriptor flags.
#[derive(Clone)]
pub(crate) struct FdSlot {
    pub(crate) file: Arc<File>,
    #[allow(dead_code)]
    pub(crate) flags: u32,
}

struct FdTable {
    slots: [Option<FdSlot>; MAX_FD],
}

impl FdTable {
    fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }
}

/// The per-task state the VFS consumes: descriptor slots, working
/// directory, and the pending-signal flag.
pub struct Task {
    fd_table: Mutex<FdTable>,
    cwd: RwLock<Option<Arc<Dnode>>>,
    signal_pending: AtomicBool,
}

impl Task {
    pub fn new() -> Self {
        Self {
            fd_table: Mutex::new(FdTable::new()),
            cwd: RwLock::new(None),
            signal_pending: AtomicBool::new(false),
        }
    }

    /// Resolve a descriptor to its file.
    pub fn getfd(&self, fd: usize) -> VfsResult<Arc<File>> {
        if fd >= MAX_FD {
            return Err(VfsError::BadFileDescriptor);
        }
        let table = self.fd_table.lock();
        table.slots[fd]
            .as_ref()
            .map(|slot| slot.file.clone())
            .ok_or(VfsError::BadFileDescriptor)
    }

    /// Install a file into the first free slot.
    pub(crate) fn install(&self, file: Arc<File>) -> VfsResult<usize> {
        let mut table = self.fd_table.lock();
        for (fd, slot) in table.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(FdSlot { file, flags: 0 });
                return Ok(fd);
            }
        }
        Err(VfsError::TooManyFiles)
    }

    /// Install a file at a specific slot, returning any displaced file.
    pub(crate) fn install_at(&self, fd: usize, file: Arc<File>) -> VfsResult<Option<Arc<File>>> {
        if fd >= MAX_FD {
            return Err(VfsError::BadFileDescriptor);
        }
        let mut table = self.fd_table.lock();
        let displaced = table.slots[fd].take().map(|slot| slot.file);
        table.slots[fd] = Some(FdSlot { file, flags: 0 });
        Ok(displaced)
    }

    /// Clear a slot, returning the file that occupied it.
    pub(crate) fn remove_fd(&self, fd: usize) -> VfsResult<Arc<File>> {
        if fd >= MAX_FD {
            return Err(VfsError::BadFileDescriptor);
        }
        let mut table = self.fd_table.lock();
        table.slots[fd]
            .take()
            .map(|slot| slot.file)
            .ok_or(VfsError::BadFileDescriptor)
    }

    pub fn cwd(&self) -> Option<Arc<Dnode>> {
        self.cwd.read().clone()
    }

    pub(crate) fn swap_cwd(&self, new: Option<Arc<Dnode>>) -> Option<Arc<Dnode>> {
        core::mem::replace(&mut *self.cwd.write(), new)
    }

    /// Whether a signal is pending; a pending signal aborts interruptible
    /// I/O with a partial count.
    pub fn signal_pending(&self) -> bool {
        self.signal_pending.load(Ordering::SeqCst)
    }

    pub fn set_signal_pending(&self, pending: bool) {
        self.signal_pending.store(pending, Ordering::SeqCst);
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnode::HashedName;
    use crate::driver::DefaultFileOps;

    // A detached dnode/inode pair is enough for slot bookkeeping tests.
    fn file() -> Arc<File> {
        let vfs = crate::vfs::Vfs::new();
        let dnode = Dnode::new(1, HashedName::new("f"));
        let inode = crate::inode::Inode::new(&test_sb(&vfs), 1, 0);
        File::new(dnode, inode, OpenFlags::empty(), Arc::new(DefaultFileOps))
    }

    fn test_sb(vfs: &Arc<crate::vfs::Vfs>) -> Arc<crate::mount::Superblock> {
        crate::mount::Superblock::new(
            Arc::downgrade(vfs),
            "testfs",
            Arc::new(NullSbOps),
            false,
        )
    }

    struct NullSbOps;
    impl crate::driver::SuperblockOps for NullSbOps {
        fn init_inode(&self, _inode: &Arc<Inode>) -> VfsResult<()> {
            Ok(())
        }
    }

    #[test]
    fn slots_allocate_first_free() {
        let task = Task::new();
        let fd0 = task.install(file()).unwrap();
        let fd1 = task.install(file()).unwrap();
        assert_eq!((fd0, fd1), (0, 1));

        task.remove_fd(fd0).unwrap();
        let fd2 = task.install(file()).unwrap();
        assert_eq!(fd2, 0);
    }

    #[test]
    fn bad_fd_is_rejected() {
        let task = Task::new();
        assert_eq!(task.getfd(5).unwrap_err(), VfsError::BadFileDescriptor);
        assert_eq!(
            task.getfd(MAX_FD).unwrap_err(),
            VfsError::BadFileDescriptor
        );
    }

    #[test]
    fn table_fills_up() {
        let task = Task::new();
        for _ in 0..MAX_FD {
            task.install(file()).unwrap();
        }
        assert_eq!(task.install(file()).unwrap_err(), VfsError::TooManyFiles);
    }
}
