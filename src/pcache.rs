//! Page cache
//!
//! Byte-range cache that regular-file reads and writes flow through.
//! Pages fill from the driver on first touch; writes dirty pages in
//! place and `commit_all` writes them back through the driver.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::min;
use spin::Mutex;

use crate::error::VfsResult;
use crate::inode::Inode;
use crate::PAGE_SIZE;

struct Page {
    data: Vec<u8>,
    dirty: bool,
}

impl Page {
    fn empty() -> Self {
        Self {
            data: vec![0u8; PAGE_SIZE],
            dirty: false,
        }
    }
}

/// Per-inode page cache, keyed by page index.
pub struct PageCache {
    pages: Mutex<BTreeMap<u64, Page>>,
}

impl PageCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(BTreeMap::new()),
        })
    }

    /// Read from the driver into a fresh page; short reads zero-fill.
    fn fill_page(inode: &Arc<Inode>, index: u64) -> VfsResult<Page> {
        let mut page = Page::empty();
        let base = index * PAGE_SIZE as u64;
        let _ = inode.ops().read(inode, &mut page.data, base)?;
        Ok(page)
    }

    /// Copy `buf.len()` bytes at `pos` out of the cache, faulting pages
    /// in from the driver as needed. The caller clamps to the file size.
    pub fn read(&self, inode: &Arc<Inode>, buf: &mut [u8], pos: u64) -> VfsResult<usize> {
        let mut pages = self.pages.lock();
        let mut done = 0usize;

        while done < buf.len() {
            let at = pos + done as u64;
            let index = at / PAGE_SIZE as u64;
            let offset = (at % PAGE_SIZE as u64) as usize;
            let chunk = min(buf.len() - done, PAGE_SIZE - offset);

            if !pages.contains_key(&index) {
                let page = Self::fill_page(inode, index)?;
                pages.insert(index, page);
            }
            let page = pages.get(&index).expect("page faulted in above");
            buf[done..done + chunk].copy_from_slice(&page.data[offset..offset + chunk]);
            done += chunk;
        }

        Ok(done)
    }

    /// Copy `buf` into the cache at `pos`, dirtying the touched pages.
    pub fn write(&self, inode: &Arc<Inode>, buf: &[u8], pos: u64) -> VfsResult<usize> {
        let mut pages = self.pages.lock();
        let mut done = 0usize;

        while done < buf.len() {
            let at = pos + done as u64;
            let index = at / PAGE_SIZE as u64;
            let offset = (at % PAGE_SIZE as u64) as usize;
            let chunk = min(buf.len() - done, PAGE_SIZE - offset);

            if !pages.contains_key(&index) {
                // Partial coverage needs the existing bytes underneath.
                let page = if offset != 0 || chunk < PAGE_SIZE {
                    Self::fill_page(inode, index)?
                } else {
                    Page::empty()
                };
                pages.insert(index, page);
            }
            let page = pages.get_mut(&index).expect("page faulted in above");
            page.data[offset..offset + chunk].copy_from_slice(&buf[done..done + chunk]);
            page.dirty = true;
            done += chunk;
        }

        Ok(done)
    }

    /// Write every dirty page back through the driver.
    pub fn commit_all(&self, inode: &Arc<Inode>) -> VfsResult<()> {
        let mut pages = self.pages.lock();
        let size = inode.size();

        for (index, page) in pages.iter_mut() {
            if !page.dirty {
                continue;
            }
            let base = index * PAGE_SIZE as u64;
            if base >= size {
                page.dirty = false;
                continue;
            }
            let len = min(PAGE_SIZE as u64, size - base) as usize;
            inode.ops().write(inode, &page.data[..len], base)?;
            page.dirty = false;
        }

        Ok(())
    }

    /// Whether any page holds uncommitted data.
    pub fn has_dirty(&self) -> bool {
        self.pages.lock().values().any(|p| p.dirty)
    }

    /// Drop every cached page.
    pub fn release(&self) {
        self.pages.lock().clear();
    }
}
