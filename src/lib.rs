//! Virtual File System core
//!
//! This crate implements the in-memory VFS layer that sits between
//! user-visible file operations and the concrete filesystem drivers:
//! - Object model and caches (dnodes, inodes, superblocks, open files)
//!   with LRU-bounded eviction
//! - Iterative path resolution with symlink following and mount handling
//! - The file operation surface (open/read/write/readdir/link/rename/...)
//!   and the locking discipline that makes it safe
//!
//! Concrete filesystem drivers plug in through the trait contracts in
//! [`driver`]; a RAM-backed filesystem and a device filesystem ship with
//! the crate.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod dcache;
pub mod devfs;
pub mod dnode;
pub mod driver;
pub mod error;
pub mod file;
pub mod inode;
pub mod lru;
pub mod mount;
pub mod pcache;
pub mod ramfs;
pub mod vfs;
pub mod walk;

pub use devfs::DevFs;
pub use dnode::{Dnode, HashedName};
pub use driver::{DirContext, DirEntry, FileOps, FileSystem, InodeOps, SuperblockOps};
pub use error::{VfsError, VfsResult};
pub use file::{File, OpenFlags, SeekFrom, Task};
pub use inode::{Inode, InodeType};
pub use mount::{Mount, Superblock};
pub use ramfs::RamFs;
pub use vfs::{get_vfs, init, Stat, Vfs, VfsConfig};
pub use walk::{WalkFlags, Walked};

/// Maximum length of a path component, including the terminator slot.
pub const NAME_MAXLEN: usize = 128;

/// Maximum number of symlink dereferences in a single walk.
pub const SYMLINK_DEPTH_MAX: usize = 16;

/// Number of buckets in the global dnode hash table (power of two).
pub const DCACHE_HASHTABLE_SIZE: usize = 1024;

/// Number of buckets in each superblock's inode hash table (power of two).
pub const ICACHE_HASHTABLE_SIZE: usize = 128;

/// Number of file descriptor slots per task.
pub const MAX_FD: usize = 64;

/// Maximum parent-link depth for path reconstruction (getcwd/realpath).
pub const PATH_DEPTH_MAX: usize = 64;

/// Size of one page-cache page.
pub const PAGE_SIZE: usize = 4096;
