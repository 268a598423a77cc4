//! Device filesystem
//!
//! Read-only filesystem exposing sequential devices as files. Device
//! reads and writes bypass the page cache and go straight to the driver.

use alloc::sync::{Arc, Weak};

use crate::dnode::Dnode;
use crate::driver::{DirContext, FileOps, FileSystem, InodeOps, SuperblockOps};
use crate::error::{VfsError, VfsResult};
use crate::file::File;
use crate::inode::{Inode, InodeType};
use crate::mount::Superblock;
use crate::vfs::Vfs;

/// Device kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceKind {
    /// Discards writes, reads nothing (/dev/null)
    Null,
    /// Discards writes, reads zeroes (/dev/zero)
    Zero,
}

const ROOT_ID: u64 = 1;

/// Static device table: name, kind, inode id.
const DEVICES: &[(&str, DeviceKind, u64)] = &[
    ("null", DeviceKind::Null, 2),
    ("zero", DeviceKind::Zero, 3),
];

struct DevOps {
    this: Weak<DevOps>,
}

impl DevOps {
    fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self { this: this.clone() })
    }

    fn kind_of(inode: &Arc<Inode>) -> VfsResult<DeviceKind> {
        let data = inode.data().ok_or(VfsError::InvalidArgument)?;
        data.downcast::<DeviceKind>()
            .map(|kind| *kind)
            .map_err(|_| VfsError::InvalidArgument)
    }
}

impl SuperblockOps for DevOps {
    fn init_inode(&self, inode: &Arc<Inode>) -> VfsResult<()> {
        let this = self.this.upgrade().ok_or(VfsError::NotFound)?;
        inode.set_ops(this.clone());
        inode.set_fops(this);
        Ok(())
    }
}

impl InodeOps for DevOps {
    fn dir_lookup(&self, dir: &Arc<Inode>, dnode: &Arc<Dnode>) -> VfsResult<()> {
        if dir.id() != ROOT_ID {
            return Err(VfsError::NotADirectory);
        }
        let name = dnode.name();
        let (_, kind, id) = DEVICES
            .iter()
            .find(|(dev_name, _, _)| *dev_name == name.as_str())
            .ok_or(VfsError::NotFound)?;

        let sb = dir.superblock().ok_or(VfsError::NotFound)?;
        let vfs: Arc<Vfs> = sb.vfs();
        let inode = match vfs.i_find(&sb, *id) {
            Some(inode) => inode,
            None => {
                let inode = vfs.i_alloc(&sb, *id)?;
                inode.set_itype(InodeType::SEQ_DEVICE);
                inode.set_data(Arc::new(*kind));
                inode
            }
        };
        vfs.assign_inode(dnode, &inode);
        Ok(())
    }

    fn open(&self, _inode: &Arc<Inode>, _file: &File) -> VfsResult<()> {
        Ok(())
    }

    fn read(&self, inode: &Arc<Inode>, buf: &mut [u8], _pos: u64) -> VfsResult<usize> {
        match Self::kind_of(inode)? {
            DeviceKind::Null => Ok(0),
            DeviceKind::Zero => {
                buf.fill(0);
                Ok(buf.len())
            }
        }
    }

    fn write(&self, inode: &Arc<Inode>, buf: &[u8], _pos: u64) -> VfsResult<usize> {
        // Both devices swallow writes.
        let _ = Self::kind_of(inode)?;
        Ok(buf.len())
    }

    fn sync(&self, _inode: &Arc<Inode>) -> VfsResult<()> {
        Ok(())
    }
}

impl FileOps for DevOps {
    fn read(&self, file: &File, buf: &mut [u8], pos: u64) -> VfsResult<usize> {
        InodeOps::read(self, file.inode(), buf, pos)
    }

    fn write(&self, file: &File, buf: &[u8], pos: u64) -> VfsResult<usize> {
        InodeOps::write(self, file.inode(), buf, pos)
    }

    fn readdir(&self, file: &File, ctx: &mut DirContext) -> VfsResult<()> {
        if file.inode().id() != ROOT_ID {
            return Err(VfsError::NotADirectory);
        }
        match DEVICES.get(ctx.index) {
            Some((name, _, _)) => {
                ctx.emit(name, InodeType::SEQ_DEVICE);
                Ok(())
            }
            None => Err(VfsError::NotFound),
        }
    }
}

/// The device filesystem type.
pub struct DevFs {
    ops: Arc<DevOps>,
}

impl DevFs {
    pub fn new() -> Self {
        Self { ops: DevOps::new() }
    }
}

impl Default for DevFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for DevFs {
    fn name(&self) -> &'static str {
        "devfs"
    }

    fn superblock_ops(&self) -> Arc<dyn SuperblockOps> {
        self.ops.clone()
    }

    fn read_only(&self) -> bool {
        true
    }

    fn mount(&self, vfs: &Arc<Vfs>, sb: &Arc<Superblock>, root: &Arc<Dnode>) -> VfsResult<()> {
        let inode = vfs.i_alloc(sb, ROOT_ID)?;
        inode.set_itype(InodeType::DIRECTORY);
        vfs.assign_inode(root, &inode);
        Ok(())
    }
}
