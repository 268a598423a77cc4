//! Filesystem driver contract
//!
//! A driver supplies a filesystem type able to mount itself, a superblock
//! method table, per-inode operations, and per-file operations. Every
//! method carries a default body so missing operations are explicit:
//! mutating and I/O operations default to `NotSupported`, while `seek`,
//! `sync` and `close` default to harmless no-ops.

use alloc::string::String;
use alloc::sync::Arc;

use crate::dnode::Dnode;
use crate::error::{VfsError, VfsResult};
use crate::file::File;
use crate::inode::{Inode, InodeType};
use crate::mount::Superblock;
use crate::vfs::Vfs;

/// One directory entry as reported by `readdir`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub itype: InodeType,
}

impl Default for DirEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            itype: InodeType::FILE,
        }
    }
}

/// Cursor handed to a driver's `readdir`: the index of the wanted entry
/// plus the completion slot the driver fills through [`DirContext::emit`].
pub struct DirContext {
    pub index: usize,
    entry: Option<DirEntry>,
}

impl DirContext {
    pub fn new(index: usize) -> Self {
        Self { index, entry: None }
    }

    /// Report the entry at `index`.
    pub fn emit(&mut self, name: &str, itype: InodeType) {
        self.entry = Some(DirEntry {
            name: String::from(name),
            itype,
        });
    }

    pub fn take_entry(&mut self) -> Option<DirEntry> {
        self.entry.take()
    }
}

/// A mountable filesystem type.
pub trait FileSystem: Send + Sync {
    fn name(&self) -> &'static str;

    /// The superblock method table for instances of this filesystem.
    fn superblock_ops(&self) -> Arc<dyn SuperblockOps>;

    fn read_only(&self) -> bool {
        false
    }

    /// Bind the filesystem's root inode onto the mount-point dnode.
    fn mount(&self, vfs: &Arc<Vfs>, sb: &Arc<Superblock>, root: &Arc<Dnode>) -> VfsResult<()>;
}

/// Superblock method table.
pub trait SuperblockOps: Send + Sync {
    /// Install driver state into a freshly allocated inode.
    fn init_inode(&self, inode: &Arc<Inode>) -> VfsResult<()>;

    /// Release driver state when an inode is destroyed.
    fn release_inode(&self, _inode: &Arc<Inode>) -> VfsResult<()> {
        Ok(())
    }

    /// Write back inode metadata.
    fn write_inode(&self, _inode: &Arc<Inode>) -> VfsResult<()> {
        Ok(())
    }
}

/// Per-inode operations.
///
/// `dir_lookup`, `create`, `mkdir` and `link` populate the passed dnode
/// (bind an inode to it) on success; the caller inserts it into the name
/// cache afterwards.
pub trait InodeOps: Send + Sync {
    fn dir_lookup(&self, _dir: &Arc<Inode>, _dnode: &Arc<Dnode>) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn open(&self, _inode: &Arc<Inode>, _file: &File) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn create(&self, _dir: &Arc<Inode>, _dnode: &Arc<Dnode>, _itype: InodeType) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn mkdir(&self, _dir: &Arc<Inode>, _dnode: &Arc<Dnode>) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn rmdir(&self, _dir: &Arc<Inode>, _dnode: &Arc<Dnode>) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn unlink(&self, _dir: &Arc<Inode>, _dnode: &Arc<Dnode>) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn link(&self, _src: &Arc<Inode>, _dir: &Arc<Inode>, _dnode: &Arc<Dnode>) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn rename(
        &self,
        _old_dir: &Arc<Inode>,
        _src: &Arc<Dnode>,
        _new_dir: &Arc<Inode>,
        _new_name: &str,
    ) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn read(&self, _inode: &Arc<Inode>, _buf: &mut [u8], _pos: u64) -> VfsResult<usize> {
        Err(VfsError::NotSupported)
    }

    fn write(&self, _inode: &Arc<Inode>, _buf: &[u8], _pos: u64) -> VfsResult<usize> {
        Err(VfsError::NotSupported)
    }

    fn sync(&self, _inode: &Arc<Inode>) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    /// Validate a seek target; the file position only moves on success.
    fn seek(&self, _inode: &Arc<Inode>, pos: u64) -> VfsResult<u64> {
        Ok(pos)
    }

    fn read_symlink(&self, _inode: &Arc<Inode>) -> VfsResult<String> {
        Err(VfsError::NotSupported)
    }

    fn set_symlink(&self, _inode: &Arc<Inode>, _target: &str) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }
}

/// Per-file operations.
pub trait FileOps: Send + Sync {
    fn read(&self, _file: &File, _buf: &mut [u8], _pos: u64) -> VfsResult<usize> {
        Err(VfsError::NotSupported)
    }

    fn write(&self, _file: &File, _buf: &[u8], _pos: u64) -> VfsResult<usize> {
        Err(VfsError::NotSupported)
    }

    fn readdir(&self, _file: &File, _ctx: &mut DirContext) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn seek(&self, file: &File, pos: u64) -> VfsResult<u64> {
        file.inode().ops().seek(file.inode(), pos)
    }

    fn sync(&self, _file: &File) -> VfsResult<()> {
        Ok(())
    }

    fn close(&self, _file: &File) -> VfsResult<()> {
        Ok(())
    }
}

/// Placeholder op table for inodes the driver has not initialized yet.
pub struct NullInodeOps;

impl InodeOps for NullInodeOps {}

/// Default per-file table: delegates data I/O to the inode operations.
pub struct DefaultFileOps;

impl FileOps for DefaultFileOps {
    fn read(&self, file: &File, buf: &mut [u8], pos: u64) -> VfsResult<usize> {
        file.inode().ops().read(file.inode(), buf, pos)
    }

    fn write(&self, file: &File, buf: &[u8], pos: u64) -> VfsResult<usize> {
        file.inode().ops().write(file.inode(), buf, pos)
    }

    fn sync(&self, file: &File) -> VfsResult<()> {
        file.inode().ops().sync(file.inode())
    }
}
