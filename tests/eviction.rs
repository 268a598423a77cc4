//! Cache bounds, eviction behavior, interruptible I/O, and walker options.

use std::sync::Arc;

use rvfs::{
    FileSystem, OpenFlags, RamFs, SeekFrom, Task, Vfs, VfsConfig, VfsError, WalkFlags, PAGE_SIZE,
};

fn setup_with(dnodes: usize, inodes: usize) -> (Arc<Vfs>, Task) {
    let vfs = Vfs::with_config(VfsConfig {
        dnode_cache_capacity: dnodes,
        inode_cache_capacity: inodes,
        ..VfsConfig::default()
    });
    let ramfs: Arc<dyn FileSystem> = Arc::new(RamFs::new());
    vfs.mount("/", &ramfs).unwrap();
    (vfs, Task::new())
}

#[test]
fn dnode_cache_stays_bounded_under_churn() {
    let (vfs, task) = setup_with(256, 128);
    vfs.mkdir(&task, "/t").unwrap();

    for i in 0..10_000 {
        let path = format!("/t/file-{}", i);
        let fd = vfs.open(&task, &path, OpenFlags::CREATE).unwrap();
        vfs.close(&task, fd).unwrap();
        assert!(
            vfs.dnode_cache_len() <= 512,
            "dnode zone exceeded its bound at entry {}",
            i
        );
    }
    // Inodes pinned by live dnode bindings keep the inode zone a little
    // above its nominal bound; it must still be nowhere near 10k.
    assert!(vfs.inode_cache_len() <= 600);

    // Evicted entries remain reachable by path: the driver repopulates.
    for path in ["/t/file-0", "/t/file-5000", "/t/file-9999"] {
        let fd = vfs.open(&task, path, OpenFlags::empty()).unwrap();
        vfs.close(&task, fd).unwrap();
    }
}

#[test]
fn pinned_dnodes_survive_eviction_sweeps() {
    let (vfs, task) = setup_with(32, 32);
    vfs.mkdir(&task, "/keep").unwrap();
    let fd = vfs.open(&task, "/keep", OpenFlags::empty()).unwrap();
    let keep = vfs.walk(None, "/keep", WalkFlags::empty()).unwrap().dnode;

    for i in 0..500 {
        let path = format!("/f{}", i);
        let tmp = vfs.open(&task, &path, OpenFlags::CREATE).unwrap();
        vfs.close(&task, tmp).unwrap();
    }

    // The open directory was never evicted: same dnode, still pinned.
    let again = vfs.walk(None, "/keep", WalkFlags::empty()).unwrap().dnode;
    assert!(Arc::ptr_eq(&keep, &again));
    assert_eq!(keep.ref_count(), 2);
    vfs.close(&task, fd).unwrap();
}

#[test]
fn evicted_subtree_detaches_children() {
    let (vfs, task) = setup_with(16, 16);
    vfs.mkdir(&task, "/d").unwrap();
    vfs.mkdir(&task, "/d/sub").unwrap();
    let child = vfs.walk(None, "/d/sub", WalkFlags::empty()).unwrap().dnode;
    assert!(child.parent().is_some());

    // Push both out of the zone.
    for i in 0..200 {
        let path = format!("/f{}", i);
        let fd = vfs.open(&task, &path, OpenFlags::CREATE).unwrap();
        vfs.close(&task, fd).unwrap();
    }

    // The held child was unhashed when its subtree went away.
    assert!(child.parent().is_none());

    // The directory still resolves through the driver.
    let fd = vfs.open(&task, "/d/sub", OpenFlags::empty()).unwrap();
    vfs.close(&task, fd).unwrap();
}

#[test]
fn signal_aborts_read_with_partial_count() {
    let (vfs, task) = setup_with(256, 128);

    let payload = vec![7u8; 3 * PAGE_SIZE];
    let fd = vfs.open(&task, "/big", OpenFlags::CREATE).unwrap();
    assert_eq!(vfs.write(&task, fd, &payload).unwrap(), payload.len());
    assert_eq!(vfs.lseek(&task, fd, SeekFrom::Start(0)).unwrap(), 0);

    let mut buf = vec![0u8; 3 * PAGE_SIZE];
    task.set_signal_pending(true);
    let n = vfs.read(&task, fd, &mut buf).unwrap();
    assert_eq!(n, PAGE_SIZE, "read should abort after the first chunk");

    task.set_signal_pending(false);
    let n = vfs.read(&task, fd, &mut buf[PAGE_SIZE..]).unwrap();
    assert_eq!(n, 2 * PAGE_SIZE);
    assert!(buf.iter().all(|b| *b == 7));
    vfs.close(&task, fd).unwrap();
}

#[test]
fn signal_aborts_write_with_partial_count() {
    let (vfs, task) = setup_with(256, 128);

    let payload = vec![9u8; 4 * PAGE_SIZE];
    let fd = vfs.open(&task, "/big", OpenFlags::CREATE).unwrap();

    task.set_signal_pending(true);
    let n = vfs.write(&task, fd, &payload).unwrap();
    assert_eq!(n, PAGE_SIZE, "write should abort after the first chunk");
    task.set_signal_pending(false);
    vfs.close(&task, fd).unwrap();

    let fd = vfs.open(&task, "/big", OpenFlags::empty()).unwrap();
    let mut buf = vec![0u8; 4 * PAGE_SIZE];
    assert_eq!(vfs.read(&task, fd, &mut buf).unwrap(), PAGE_SIZE);
    vfs.close(&task, fd).unwrap();
}

#[test]
fn walk_mkparent_creates_missing_directories() {
    let (vfs, task) = setup_with(256, 128);

    let walked = vfs
        .walk(None, "/p/q/r", WalkFlags::PARENT | WalkFlags::MKPARENT)
        .unwrap();
    assert_eq!(walked.last.as_deref(), Some("r"));

    // p and q were created along the way
    let fd = vfs.open(&task, "/p/q", OpenFlags::empty()).unwrap();
    vfs.close(&task, fd).unwrap();
}

#[test]
fn walk_fs_relative_resolves_against_mount_root() {
    let (vfs, task) = setup_with(256, 128);
    vfs.mkdir(&task, "/mnt").unwrap();
    let second: Arc<dyn FileSystem> = Arc::new(RamFs::new());
    vfs.mount("/mnt", &second).unwrap();

    let fd = vfs.open(&task, "/mnt/inner", OpenFlags::CREATE).unwrap();
    vfs.close(&task, fd).unwrap();
    let fd = vfs.open(&task, "/outer", OpenFlags::CREATE).unwrap();
    vfs.close(&task, fd).unwrap();

    let inner = vfs.walk(None, "/mnt/inner", WalkFlags::empty()).unwrap().dnode;

    // '/' with FS_RELATIVE re-roots at the start's filesystem
    let walked = vfs
        .walk(Some(&inner), "/inner", WalkFlags::FS_RELATIVE)
        .unwrap();
    assert!(Arc::ptr_eq(&walked.dnode, &inner));

    assert_eq!(
        vfs.walk(Some(&inner), "/outer", WalkFlags::FS_RELATIVE)
            .unwrap_err(),
        VfsError::NotFound
    );
}

#[test]
fn walk_nofollow_stops_at_symlink() {
    let (vfs, task) = setup_with(256, 128);
    let fd = vfs.open(&task, "/a", OpenFlags::CREATE).unwrap();
    vfs.close(&task, fd).unwrap();
    vfs.symlink(&task, "/l", "/a").unwrap();

    let followed = vfs.walk(None, "/l", WalkFlags::empty()).unwrap().dnode;
    let link = vfs.walk(None, "/l", WalkFlags::NOFOLLOW).unwrap().dnode;

    assert!(!Arc::ptr_eq(&followed, &link));
    assert!(link.is_symlink());
    assert!(!followed.is_symlink());
}

#[test]
fn deep_tree_getcwd_depth_bound() {
    let (vfs, task) = setup_with(4096, 2048);

    let mut path = String::new();
    for i in 0..70 {
        path.push_str(&format!("/n{}", i));
        vfs.mkdir(&task, &path).unwrap();
    }

    vfs.chdir(&task, &path).unwrap();
    let mut buf = [0u8; 4096];
    assert_eq!(
        vfs.getcwd(&task, &mut buf).unwrap_err(),
        VfsError::TooManySymlinks
    );
}
