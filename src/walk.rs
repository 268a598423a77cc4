//! Path resolution
//!
//! The walker turns `(start dnode, path string, options)` into a dnode.
//! It iterates over slash-separated components, consulting the name
//! cache first and falling through to the driver's `dir_lookup` (or
//! `mkdir` under `MKPARENT`) on a miss. Symlinks resolve recursively,
//! relative to the link's parent, with a fixed depth bound.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::dnode::{Dnode, HashedName};
use crate::error::{VfsError, VfsResult};
use crate::vfs::Vfs;
use crate::{NAME_MAXLEN, SYMLINK_DEPTH_MAX};

bitflags! {
    /// Walk options.
    pub struct WalkFlags: u32 {
        /// Stop at the last component and hand it back unresolved
        const PARENT      = 0x01;
        /// Create missing directories along the way
        const MKPARENT    = 0x02;
        /// Do not dereference a symlink as the final component
        const NOFOLLOW    = 0x04;
        /// Resolve a leading '/' against the start's filesystem root
        const FS_RELATIVE = 0x08;
    }
}

/// A walk result: the resolved dnode, plus the unresolved last component
/// under [`WalkFlags::PARENT`].
pub struct Walked {
    pub dnode: Arc<Dnode>,
    pub last: Option<String>,
}

impl core::fmt::Debug for Walked {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Walked")
            .field("dnode", &self.dnode.uid())
            .field("last", &self.last)
            .finish()
    }
}

/// Component checks, in validation order: length, then byte legality.
fn validate_name(comp: &str) -> VfsResult<()> {
    if comp.len() >= NAME_MAXLEN {
        return Err(VfsError::NameTooLong);
    }
    if comp.bytes().any(|b| b == 0) {
        return Err(VfsError::InvalidArgument);
    }
    Ok(())
}

impl Vfs {
    /// Resolve `path` starting from `start` (the system root when absent).
    pub fn walk(
        &self,
        start: Option<&Arc<Dnode>>,
        path: &str,
        flags: WalkFlags,
    ) -> VfsResult<Walked> {
        self.walk_depth(start, path, flags, 0)
    }

    pub(crate) fn walk_depth(
        &self,
        start: Option<&Arc<Dnode>>,
        path: &str,
        flags: WalkFlags,
        depth: usize,
    ) -> VfsResult<Walked> {
        let mut current = if path.starts_with('/') {
            if flags.contains(WalkFlags::FS_RELATIVE) && start.is_some() {
                start
                    .and_then(|s| s.superblock())
                    .and_then(|sb| sb.root())
                    .ok_or(VfsError::NotFound)?
            } else {
                self.root()
            }
        } else {
            match start {
                Some(s) => s.clone(),
                None => self.root(),
            }
        };

        // Repeated slashes collapse; a trailing slash is tolerated.
        let comps: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();

        for (i, comp) in comps.iter().enumerate() {
            validate_name(comp)?;
            let is_last = i + 1 == comps.len();

            if flags.contains(WalkFlags::PARENT) && is_last {
                return Ok(Walked {
                    dnode: current,
                    last: Some(String::from(*comp)),
                });
            }

            if current.is_symlink() {
                current = self.follow_symlink(&current, depth)?;
            }

            current = self.lookup_or_populate(&current, comp, flags)?;
        }

        if current.is_symlink() && !flags.contains(WalkFlags::NOFOLLOW) {
            current = self.follow_symlink(&current, depth)?;
        }

        Ok(Walked {
            dnode: current,
            last: None,
        })
    }

    /// Dereference a symlink dnode, resolving the target relative to the
    /// link's parent. Depth-bounded; the 17th nested link fails.
    fn follow_symlink(&self, dnode: &Arc<Dnode>, depth: usize) -> VfsResult<Arc<Dnode>> {
        if depth >= SYMLINK_DEPTH_MAX {
            return Err(VfsError::NameTooLong);
        }

        let inode = dnode.inode().ok_or(VfsError::NotFound)?;
        let target = {
            let _iguard = self.lock_inode(&inode);
            inode.ops().read_symlink(&inode)?
        };

        let parent = dnode.parent();
        let start = parent.clone().unwrap_or_else(|| self.root());
        let resolved = self
            .walk_depth(Some(&start), &target, WalkFlags::empty(), depth + 1)?
            .dnode;

        // Short-circuit future walks by re-keying the resolved dnode under
        // the link's parent with the link's name.
        if let Some(parent) = parent {
            if resolved.parent().is_some()
                && !Arc::ptr_eq(&resolved, dnode)
                && !Arc::ptr_eq(&resolved, &parent)
            {
                let name = dnode.name();
                self.dcache.rehash(&parent, &resolved, name);
            }
        }

        Ok(resolved)
    }

    /// One component step: cache hit, or allocate + driver lookup.
    fn lookup_or_populate(
        &self,
        current: &Arc<Dnode>,
        comp: &str,
        flags: WalkFlags,
    ) -> VfsResult<Arc<Dnode>> {
        let name = HashedName::new(comp);

        if let Some(hit) = self.dcache.lookup(current, &name) {
            self.dnode_lru.touch(&hit);
            return Ok(hit);
        }

        let dir_inode = current.inode().ok_or(VfsError::NotFound)?;
        if !dir_inode.is_directory() {
            return Err(VfsError::NotADirectory);
        }

        let _dguard = self.lock_dnode(current);
        let child = self.d_alloc(current, name)?;

        let populated = (|| {
            let _iguard = self.lock_inode(&dir_inode);
            let ops = dir_inode.ops();
            match ops.dir_lookup(&dir_inode, &child) {
                Err(VfsError::NotFound) if flags.contains(WalkFlags::MKPARENT) => {
                    let sb = current.superblock().ok_or(VfsError::NotFound)?;
                    if sb.read_only() {
                        return Err(VfsError::ReadOnly);
                    }
                    ops.mkdir(&dir_inode, &child)
                }
                other => other,
            }
        })();

        if let Err(e) = populated {
            self.dnode_lru.remove(&child);
            return Err(e);
        }

        self.dcache.add(current, &child);
        Ok(child)
    }
}
