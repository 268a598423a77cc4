//! RAM filesystem
//!
//! A complete in-memory driver: files, directories, symlinks, hard links
//! and rename. All data lives in RAM and is lost on teardown. Driver
//! state hangs off the inode's private-data handle, so an evicted inode
//! reconstructs identically on the next lookup.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::RwLock;

use crate::dnode::Dnode;
use crate::driver::{DirContext, FileOps, FileSystem, InodeOps, SuperblockOps};
use crate::error::{VfsError, VfsResult};
use crate::file::File;
use crate::inode::{Inode, InodeType};
use crate::mount::Superblock;
use crate::vfs::Vfs;

/// Backing store of one filesystem object.
struct RamNode {
    content: RwLock<RamContent>,
}

enum RamContent {
    File(Vec<u8>),
    Directory(BTreeMap<String, RamDirent>),
    Symlink(String),
}

#[derive(Clone)]
struct RamDirent {
    id: u64,
    itype: InodeType,
    node: Arc<RamNode>,
}

impl RamNode {
    fn file() -> Arc<Self> {
        Arc::new(Self {
            content: RwLock::new(RamContent::File(Vec::new())),
        })
    }

    fn directory() -> Arc<Self> {
        Arc::new(Self {
            content: RwLock::new(RamContent::Directory(BTreeMap::new())),
        })
    }

    fn symlink() -> Arc<Self> {
        Arc::new(Self {
            content: RwLock::new(RamContent::Symlink(String::new())),
        })
    }

    fn size(&self) -> u64 {
        match &*self.content.read() {
            RamContent::File(data) => data.len() as u64,
            RamContent::Directory(entries) => entries.len() as u64,
            RamContent::Symlink(target) => target.len() as u64,
        }
    }
}

struct RamOps {
    this: Weak<RamOps>,
    next_id: AtomicU64,
}

impl RamOps {
    fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn node_of(inode: &Arc<Inode>) -> VfsResult<Arc<RamNode>> {
        let data = inode.data().ok_or(VfsError::InvalidArgument)?;
        data.downcast::<RamNode>()
            .map_err(|_| VfsError::InvalidArgument)
    }

    /// Bind the inode for `dirent` to `dnode`, reusing the cached inode
    /// when the id is still known to the superblock.
    fn attach(&self, dir: &Arc<Inode>, dnode: &Arc<Dnode>, dirent: &RamDirent) -> VfsResult<()> {
        let sb = dir.superblock().ok_or(VfsError::NotFound)?;
        let vfs: Arc<Vfs> = sb.vfs();

        let inode = match vfs.i_find(&sb, dirent.id) {
            Some(inode) => inode,
            None => {
                let inode = vfs.i_alloc(&sb, dirent.id)?;
                inode.set_itype(dirent.itype);
                inode.set_data(dirent.node.clone());
                inode.set_size(dirent.node.size());
                inode
            }
        };
        vfs.assign_inode(dnode, &inode);
        Ok(())
    }
}

impl SuperblockOps for RamOps {
    fn init_inode(&self, inode: &Arc<Inode>) -> VfsResult<()> {
        let this = self.this.upgrade().ok_or(VfsError::NotFound)?;
        inode.set_ops(this.clone());
        inode.set_fops(this);
        Ok(())
    }
}

impl InodeOps for RamOps {
    fn dir_lookup(&self, dir: &Arc<Inode>, dnode: &Arc<Dnode>) -> VfsResult<()> {
        let node = Self::node_of(dir)?;
        let dirent = {
            let content = node.content.read();
            let entries = match &*content {
                RamContent::Directory(entries) => entries,
                _ => return Err(VfsError::NotADirectory),
            };
            entries
                .get(dnode.name().as_str())
                .cloned()
                .ok_or(VfsError::NotFound)?
        };
        self.attach(dir, dnode, &dirent)
    }

    fn open(&self, _inode: &Arc<Inode>, _file: &File) -> VfsResult<()> {
        Ok(())
    }

    fn create(&self, dir: &Arc<Inode>, dnode: &Arc<Dnode>, itype: InodeType) -> VfsResult<()> {
        let node = Self::node_of(dir)?;
        let dirent = {
            let mut content = node.content.write();
            let entries = match &mut *content {
                RamContent::Directory(entries) => entries,
                _ => return Err(VfsError::NotADirectory),
            };
            let name = dnode.name();
            if entries.contains_key(name.as_str()) {
                return Err(VfsError::AlreadyExists);
            }

            let new_node = if itype.contains(InodeType::DIRECTORY) {
                RamNode::directory()
            } else if itype.contains(InodeType::SYMLINK) {
                RamNode::symlink()
            } else if itype.contains(InodeType::FILE) {
                RamNode::file()
            } else {
                return Err(VfsError::NotSupported);
            };

            let dirent = RamDirent {
                id: self.alloc_id(),
                itype,
                node: new_node,
            };
            entries.insert(String::from(name.as_str()), dirent.clone());
            dirent
        };
        self.attach(dir, dnode, &dirent)
    }

    fn mkdir(&self, dir: &Arc<Inode>, dnode: &Arc<Dnode>) -> VfsResult<()> {
        self.create(dir, dnode, InodeType::DIRECTORY)
    }

    fn rmdir(&self, dir: &Arc<Inode>, dnode: &Arc<Dnode>) -> VfsResult<()> {
        let node = Self::node_of(dir)?;
        let mut content = node.content.write();
        let entries = match &mut *content {
            RamContent::Directory(entries) => entries,
            _ => return Err(VfsError::NotADirectory),
        };
        let name = dnode.name();
        let entry = entries.get(name.as_str()).ok_or(VfsError::NotFound)?;

        match &*entry.node.content.read() {
            RamContent::Directory(children) if children.is_empty() => {}
            RamContent::Directory(_) => return Err(VfsError::DirectoryNotEmpty),
            _ => return Err(VfsError::NotADirectory),
        }
        entries.remove(name.as_str());
        Ok(())
    }

    fn unlink(&self, dir: &Arc<Inode>, dnode: &Arc<Dnode>) -> VfsResult<()> {
        let node = Self::node_of(dir)?;
        let mut content = node.content.write();
        let entries = match &mut *content {
            RamContent::Directory(entries) => entries,
            _ => return Err(VfsError::NotADirectory),
        };
        let name = dnode.name();
        let entry = entries.get(name.as_str()).ok_or(VfsError::NotFound)?;
        if entry.itype.contains(InodeType::DIRECTORY) {
            return Err(VfsError::IsADirectory);
        }
        entries.remove(name.as_str());
        Ok(())
    }

    fn link(&self, src: &Arc<Inode>, dir: &Arc<Inode>, dnode: &Arc<Dnode>) -> VfsResult<()> {
        let src_node = Self::node_of(src)?;
        let dir_node = Self::node_of(dir)?;
        let mut content = dir_node.content.write();
        let entries = match &mut *content {
            RamContent::Directory(entries) => entries,
            _ => return Err(VfsError::NotADirectory),
        };
        let name = dnode.name();
        if entries.contains_key(name.as_str()) {
            return Err(VfsError::AlreadyExists);
        }
        entries.insert(
            String::from(name.as_str()),
            RamDirent {
                id: src.id(),
                itype: src.itype(),
                node: src_node,
            },
        );
        Ok(())
    }

    fn rename(
        &self,
        old_dir: &Arc<Inode>,
        src: &Arc<Dnode>,
        new_dir: &Arc<Inode>,
        new_name: &str,
    ) -> VfsResult<()> {
        let old_node = Self::node_of(old_dir)?;
        let new_node = Self::node_of(new_dir)?;
        let src_name = src.name();

        if Arc::ptr_eq(&old_node, &new_node) {
            let mut content = old_node.content.write();
            let entries = match &mut *content {
                RamContent::Directory(entries) => entries,
                _ => return Err(VfsError::NotADirectory),
            };
            if let Some(existing) = entries.get(new_name) {
                if let RamContent::Directory(children) = &*existing.node.content.read() {
                    if !children.is_empty() {
                        return Err(VfsError::DirectoryNotEmpty);
                    }
                }
            }
            let entry = entries
                .remove(src_name.as_str())
                .ok_or(VfsError::NotFound)?;
            entries.insert(String::from(new_name), entry);
            return Ok(());
        }

        // Distinct directories; the VFS holds both inode locks, so the
        // two-step move cannot race.
        {
            let content = new_node.content.read();
            let entries = match &*content {
                RamContent::Directory(entries) => entries,
                _ => return Err(VfsError::NotADirectory),
            };
            if let Some(existing) = entries.get(new_name) {
                if let RamContent::Directory(children) = &*existing.node.content.read() {
                    if !children.is_empty() {
                        return Err(VfsError::DirectoryNotEmpty);
                    }
                }
            }
        }

        let entry = {
            let mut content = old_node.content.write();
            let entries = match &mut *content {
                RamContent::Directory(entries) => entries,
                _ => return Err(VfsError::NotADirectory),
            };
            entries
                .remove(src_name.as_str())
                .ok_or(VfsError::NotFound)?
        };

        let mut content = new_node.content.write();
        let entries = match &mut *content {
            RamContent::Directory(entries) => entries,
            _ => return Err(VfsError::NotADirectory),
        };
        entries.insert(String::from(new_name), entry);
        Ok(())
    }

    fn read(&self, inode: &Arc<Inode>, buf: &mut [u8], pos: u64) -> VfsResult<usize> {
        let node = Self::node_of(inode)?;
        let content = node.content.read();
        match &*content {
            RamContent::File(data) => {
                let start = pos as usize;
                if start >= data.len() {
                    return Ok(0);
                }
                let end = core::cmp::min(start + buf.len(), data.len());
                buf[..end - start].copy_from_slice(&data[start..end]);
                Ok(end - start)
            }
            RamContent::Directory(_) => Err(VfsError::IsADirectory),
            RamContent::Symlink(_) => Err(VfsError::InvalidArgument),
        }
    }

    fn write(&self, inode: &Arc<Inode>, buf: &[u8], pos: u64) -> VfsResult<usize> {
        let node = Self::node_of(inode)?;
        let mut content = node.content.write();
        match &mut *content {
            RamContent::File(data) => {
                let start = pos as usize;
                let end = start + buf.len();
                if end > data.len() {
                    data.resize(end, 0);
                }
                data[start..end].copy_from_slice(buf);
                Ok(buf.len())
            }
            RamContent::Directory(_) => Err(VfsError::IsADirectory),
            RamContent::Symlink(_) => Err(VfsError::InvalidArgument),
        }
    }

    fn sync(&self, _inode: &Arc<Inode>) -> VfsResult<()> {
        // No backing store to write to.
        Ok(())
    }

    fn read_symlink(&self, inode: &Arc<Inode>) -> VfsResult<String> {
        let node = Self::node_of(inode)?;
        let result = match &*node.content.read() {
            RamContent::Symlink(target) => Ok(target.clone()),
            _ => Err(VfsError::InvalidArgument),
        };
        result
    }

    fn set_symlink(&self, inode: &Arc<Inode>, target: &str) -> VfsResult<()> {
        let node = Self::node_of(inode)?;
        let mut content = node.content.write();
        match &mut *content {
            RamContent::Symlink(slot) => {
                *slot = String::from(target);
                inode.set_size(target.len() as u64);
                Ok(())
            }
            _ => Err(VfsError::InvalidArgument),
        }
    }
}

impl FileOps for RamOps {
    fn read(&self, file: &File, buf: &mut [u8], pos: u64) -> VfsResult<usize> {
        InodeOps::read(self, file.inode(), buf, pos)
    }

    fn write(&self, file: &File, buf: &[u8], pos: u64) -> VfsResult<usize> {
        InodeOps::write(self, file.inode(), buf, pos)
    }

    fn readdir(&self, file: &File, ctx: &mut DirContext) -> VfsResult<()> {
        let node = Self::node_of(file.inode())?;
        let content = node.content.read();
        let entries = match &*content {
            RamContent::Directory(entries) => entries,
            _ => return Err(VfsError::NotADirectory),
        };
        match entries.iter().nth(ctx.index) {
            Some((name, dirent)) => {
                ctx.emit(name, dirent.itype);
                Ok(())
            }
            None => Err(VfsError::NotFound),
        }
    }
}

/// The RAM filesystem type.
pub struct RamFs {
    ops: Arc<RamOps>,
}

impl RamFs {
    pub fn new() -> Self {
        Self { ops: RamOps::new() }
    }
}

impl Default for RamFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for RamFs {
    fn name(&self) -> &'static str {
        "ramfs"
    }

    fn superblock_ops(&self) -> Arc<dyn SuperblockOps> {
        self.ops.clone()
    }

    fn mount(&self, vfs: &Arc<Vfs>, sb: &Arc<Superblock>, root: &Arc<Dnode>) -> VfsResult<()> {
        let node = RamNode::directory();
        let inode = vfs.i_alloc(sb, self.ops.alloc_id())?;
        inode.set_itype(InodeType::DIRECTORY);
        inode.set_data(node);
        vfs.assign_inode(root, &inode);
        Ok(())
    }
}
