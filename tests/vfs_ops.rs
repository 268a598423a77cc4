//! Integration tests for the file operation surface over ramfs.

use std::sync::Arc;

use rvfs::{
    DevFs, DirEntry, FileSystem, OpenFlags, RamFs, SeekFrom, Task, Vfs, VfsError, NAME_MAXLEN,
};

fn setup() -> (Arc<Vfs>, Task) {
    let vfs = Vfs::new();
    let ramfs: Arc<dyn FileSystem> = Arc::new(RamFs::new());
    vfs.mount("/", &ramfs).unwrap();
    (vfs, Task::new())
}

fn write_file(vfs: &Arc<Vfs>, task: &Task, path: &str, data: &[u8]) {
    let fd = vfs.open(task, path, OpenFlags::CREATE).unwrap();
    assert_eq!(vfs.write(task, fd, data).unwrap(), data.len());
    vfs.close(task, fd).unwrap();
}

fn read_file(vfs: &Arc<Vfs>, task: &Task, path: &str) -> Vec<u8> {
    let fd = vfs.open(task, path, OpenFlags::empty()).unwrap();
    let mut buf = vec![0u8; 65536];
    let n = vfs.read(task, fd, &mut buf).unwrap();
    vfs.close(task, fd).unwrap();
    buf.truncate(n);
    buf
}

#[test]
fn create_write_close_open_read() {
    let (vfs, task) = setup();

    let fd = vfs.open(&task, "/a", OpenFlags::CREATE).unwrap();
    assert_eq!(vfs.write(&task, fd, b"hi").unwrap(), 2);
    vfs.close(&task, fd).unwrap();

    let fd = vfs.open(&task, "/a", OpenFlags::empty()).unwrap();
    let mut buf = [0u8; 2];
    assert_eq!(vfs.read(&task, fd, &mut buf).unwrap(), 2);
    assert_eq!(&buf, b"hi");
    vfs.close(&task, fd).unwrap();
}

#[test]
fn open_missing_file_fails() {
    let (vfs, task) = setup();
    assert_eq!(
        vfs.open(&task, "/missing", OpenFlags::empty()).unwrap_err(),
        VfsError::NotFound
    );
}

#[test]
fn mkdir_rmdir_ordering() {
    let (vfs, task) = setup();

    vfs.mkdir(&task, "/d").unwrap();
    vfs.mkdir(&task, "/d/e").unwrap();

    assert_eq!(
        vfs.rmdir(&task, "/d").unwrap_err(),
        VfsError::DirectoryNotEmpty
    );
    vfs.rmdir(&task, "/d/e").unwrap();
    vfs.rmdir(&task, "/d").unwrap();

    // mkdir/rmdir returns to the prior state
    vfs.mkdir(&task, "/d").unwrap();
    vfs.rmdir(&task, "/d").unwrap();
    assert_eq!(
        vfs.open(&task, "/d", OpenFlags::empty()).unwrap_err(),
        VfsError::NotFound
    );
}

#[test]
fn mkdir_existing_fails() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();
    assert_eq!(vfs.mkdir(&task, "/d").unwrap_err(), VfsError::AlreadyExists);
    write_file(&vfs, &task, "/f", b"x");
    assert_eq!(vfs.mkdir(&task, "/f").unwrap_err(), VfsError::AlreadyExists);
}

#[test]
fn symlink_follow_and_readlink() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"hi");

    vfs.symlink(&task, "/l", "/a").unwrap();

    let fd = vfs.open(&task, "/l", OpenFlags::empty()).unwrap();
    let mut buf = [0u8; 2];
    assert_eq!(vfs.read(&task, fd, &mut buf).unwrap(), 2);
    assert_eq!(&buf, b"hi");
    vfs.close(&task, fd).unwrap();

    let mut buf = [0u8; 64];
    let n = vfs.readlink(&task, "/l", &mut buf).unwrap();
    assert_eq!(&buf[..n], b"/a");
}

#[test]
fn readlink_on_regular_file_fails() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"x");
    let mut buf = [0u8; 16];
    assert_eq!(
        vfs.readlink(&task, "/a", &mut buf).unwrap_err(),
        VfsError::InvalidArgument
    );
}

#[test]
fn seventeen_nested_symlinks_fail() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"deep");

    vfs.symlink(&task, "/l1", "/a").unwrap();
    for i in 2..=17 {
        let path = format!("/l{}", i);
        let target = format!("/l{}", i - 1);
        vfs.symlink(&task, &path, &target).unwrap();
    }

    // A short chain resolves fine
    assert_eq!(read_file(&vfs, &task, "/l8"), b"deep");

    assert_eq!(
        vfs.open(&task, "/l17", OpenFlags::empty()).unwrap_err(),
        VfsError::NameTooLong
    );
}

#[test]
fn dup_keeps_file_readable() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"hi");

    let fd1 = vfs.open(&task, "/a", OpenFlags::empty()).unwrap();
    let fd2 = vfs.dup(&task, fd1).unwrap();
    vfs.close(&task, fd1).unwrap();

    let mut buf = [0u8; 2];
    assert_eq!(vfs.read(&task, fd2, &mut buf).unwrap(), 2);
    assert_eq!(&buf, b"hi");
    vfs.close(&task, fd2).unwrap();
}

#[test]
fn dup2_self_is_noop() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"hi");

    let fd = vfs.open(&task, "/a", OpenFlags::empty()).unwrap();
    assert_eq!(vfs.dup2(&task, fd, fd).unwrap(), fd);

    // still readable, position untouched
    let mut buf = [0u8; 2];
    assert_eq!(vfs.read(&task, fd, &mut buf).unwrap(), 2);
    vfs.close(&task, fd).unwrap();
}

#[test]
fn dup2_closes_displaced_file() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"aa");
    write_file(&vfs, &task, "/b", b"bb");

    let fd_a = vfs.open(&task, "/a", OpenFlags::empty()).unwrap();
    let fd_b = vfs.open(&task, "/b", OpenFlags::empty()).unwrap();

    assert_eq!(vfs.dup2(&task, fd_a, fd_b).unwrap(), fd_b);
    let mut buf = [0u8; 2];
    assert_eq!(vfs.read(&task, fd_b, &mut buf).unwrap(), 2);
    assert_eq!(&buf, b"aa");

    vfs.close(&task, fd_a).unwrap();
    vfs.close(&task, fd_b).unwrap();
    // /b was released by the displacement; unlink proves it is not busy
    vfs.unlink(&task, "/b").unwrap();
}

#[test]
fn unlink_open_file_is_busy() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"hi");

    let fd = vfs.open(&task, "/a", OpenFlags::empty()).unwrap();
    assert_eq!(vfs.unlink(&task, "/a").unwrap_err(), VfsError::Busy);
    vfs.close(&task, fd).unwrap();
    vfs.unlink(&task, "/a").unwrap();
    assert_eq!(
        vfs.open(&task, "/a", OpenFlags::empty()).unwrap_err(),
        VfsError::NotFound
    );
}

#[test]
fn unlink_directory_fails() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();
    assert_eq!(vfs.unlink(&task, "/d").unwrap_err(), VfsError::IsADirectory);
}

#[test]
fn rmdir_open_directory_is_busy() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();

    let fd = vfs.open(&task, "/d", OpenFlags::empty()).unwrap();
    assert_eq!(vfs.rmdir(&task, "/d").unwrap_err(), VfsError::Busy);
    vfs.close(&task, fd).unwrap();
    vfs.rmdir(&task, "/d").unwrap();
}

#[test]
fn read_on_directory_fails() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();
    let fd = vfs.open(&task, "/d", OpenFlags::empty()).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(
        vfs.read(&task, fd, &mut buf).unwrap_err(),
        VfsError::IsADirectory
    );
    vfs.close(&task, fd).unwrap();
}

#[test]
fn hard_link_shares_inode() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"shared");

    vfs.link(&task, "/a", "/b").unwrap();

    let fd_a = vfs.open(&task, "/a", OpenFlags::empty()).unwrap();
    let fd_b = vfs.open(&task, "/b", OpenFlags::empty()).unwrap();
    let stat_a = vfs.fstat(&task, fd_a).unwrap();
    let stat_b = vfs.fstat(&task, fd_b).unwrap();
    assert_eq!(stat_a.id, stat_b.id);
    vfs.close(&task, fd_a).unwrap();
    vfs.close(&task, fd_b).unwrap();

    // the data survives dropping one name
    vfs.unlink(&task, "/a").unwrap();
    assert_eq!(read_file(&vfs, &task, "/b"), b"shared");
}

#[test]
fn link_across_superblocks_fails() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/mnt").unwrap();
    let second: Arc<dyn FileSystem> = Arc::new(RamFs::new());
    vfs.mount("/mnt", &second).unwrap();

    write_file(&vfs, &task, "/a", b"x");
    assert_eq!(
        vfs.link(&task, "/a", "/mnt/b").unwrap_err(),
        VfsError::CrossDevice
    );
}

#[test]
fn link_existing_target_fails() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"x");
    write_file(&vfs, &task, "/b", b"y");
    assert_eq!(
        vfs.link(&task, "/a", "/b").unwrap_err(),
        VfsError::AlreadyExists
    );
}

#[test]
fn rename_moves_and_replaces() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"data");

    vfs.rename(&task, "/a", "/b").unwrap();
    assert_eq!(
        vfs.open(&task, "/a", OpenFlags::empty()).unwrap_err(),
        VfsError::NotFound
    );
    assert_eq!(read_file(&vfs, &task, "/b"), b"data");

    // renaming over an existing file replaces it
    write_file(&vfs, &task, "/c", b"old");
    vfs.rename(&task, "/b", "/c").unwrap();
    assert_eq!(read_file(&vfs, &task, "/c"), b"data");
    assert_eq!(
        vfs.open(&task, "/b", OpenFlags::empty()).unwrap_err(),
        VfsError::NotFound
    );
}

#[test]
fn rename_into_other_directory() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();
    write_file(&vfs, &task, "/a", b"moved");

    vfs.rename(&task, "/a", "/d/a2").unwrap();
    assert_eq!(read_file(&vfs, &task, "/d/a2"), b"moved");
}

#[test]
fn rename_onto_nonempty_directory_fails() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();
    vfs.mkdir(&task, "/d/sub").unwrap();
    vfs.mkdir(&task, "/e").unwrap();

    assert_eq!(
        vfs.rename(&task, "/e", "/d").unwrap_err(),
        VfsError::DirectoryNotEmpty
    );
}

#[test]
fn rename_hard_link_to_self_is_noop() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"x");
    vfs.link(&task, "/a", "/b").unwrap();

    vfs.rename(&task, "/a", "/b").unwrap();
    // both names survive a self-rename
    assert_eq!(read_file(&vfs, &task, "/a"), b"x");
    assert_eq!(read_file(&vfs, &task, "/b"), b"x");
}

#[test]
fn rename_across_superblocks_fails() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/mnt").unwrap();
    let second: Arc<dyn FileSystem> = Arc::new(RamFs::new());
    vfs.mount("/mnt", &second).unwrap();

    write_file(&vfs, &task, "/a", b"x");
    assert_eq!(
        vfs.rename(&task, "/a", "/mnt/a").unwrap_err(),
        VfsError::CrossDevice
    );
}

#[test]
fn lseek_modes() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/s", b"0123456789ABCDEF");

    let fd = vfs.open(&task, "/s", OpenFlags::empty()).unwrap();
    let mut buf = [0u8; 5];

    assert_eq!(vfs.lseek(&task, fd, SeekFrom::Start(5)).unwrap(), 5);
    assert_eq!(vfs.read(&task, fd, &mut buf).unwrap(), 5);
    assert_eq!(&buf, b"56789");

    assert_eq!(vfs.lseek(&task, fd, SeekFrom::Current(-3)).unwrap(), 7);
    assert_eq!(vfs.read(&task, fd, &mut buf[..2]).unwrap(), 2);
    assert_eq!(&buf[..2], b"78");

    assert_eq!(vfs.lseek(&task, fd, SeekFrom::End(-4)).unwrap(), 12);
    assert_eq!(vfs.read(&task, fd, &mut buf[..4]).unwrap(), 4);
    assert_eq!(&buf[..4], b"CDEF");

    assert_eq!(
        vfs.lseek(&task, fd, SeekFrom::Current(-100)).unwrap_err(),
        VfsError::InvalidArgument
    );
    vfs.close(&task, fd).unwrap();
}

#[test]
fn append_starts_at_size() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"hi");

    let fd = vfs.open(&task, "/a", OpenFlags::APPEND).unwrap();
    assert_eq!(vfs.write(&task, fd, b"!!").unwrap(), 2);
    vfs.close(&task, fd).unwrap();

    assert_eq!(read_file(&vfs, &task, "/a"), b"hi!!");
}

#[test]
fn readdir_emits_dot_entries_first() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();
    write_file(&vfs, &task, "/d/x", b"1");
    write_file(&vfs, &task, "/d/y", b"2");

    let fd = vfs.open(&task, "/d", OpenFlags::empty()).unwrap();
    let mut names = Vec::new();
    let mut entry = DirEntry::default();
    while vfs.readdir(&task, fd, &mut entry).unwrap() {
        names.push(entry.name.clone());
    }
    vfs.close(&task, fd).unwrap();

    assert_eq!(names, vec![".", "..", "x", "y"]);
}

#[test]
fn chdir_getcwd_and_relative_paths() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();
    vfs.mkdir(&task, "/d/e").unwrap();

    vfs.chdir(&task, "/d/e").unwrap();
    let mut buf = [0u8; 64];
    let n = vfs.getcwd(&task, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"/d/e");

    // relative create resolves against the cwd
    write_file(&vfs, &task, "f", b"rel");
    assert_eq!(read_file(&vfs, &task, "/d/e/f"), b"rel");

    // dot-dot walks up
    vfs.chdir(&task, "..").unwrap();
    let n = vfs.getcwd(&task, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"/d");
}

#[test]
fn chdir_to_file_fails() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"x");
    assert_eq!(
        vfs.chdir(&task, "/a").unwrap_err(),
        VfsError::NotADirectory
    );
}

#[test]
fn getcwd_short_buffer_fails() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/somewhat-long-name").unwrap();
    vfs.chdir(&task, "/somewhat-long-name").unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(
        vfs.getcwd(&task, &mut buf).unwrap_err(),
        VfsError::OutOfRange
    );
}

#[test]
fn fchdir_and_realpathat() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();

    let fd = vfs.open(&task, "/d", OpenFlags::empty()).unwrap();
    let mut buf = [0u8; 64];
    let n = vfs.realpathat(&task, fd, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"/d");

    vfs.fchdir(&task, fd).unwrap();
    let n = vfs.getcwd(&task, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"/d");
    vfs.close(&task, fd).unwrap();
}

#[test]
fn unlinkat_and_readlinkat_resolve_from_dirfd() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();
    write_file(&vfs, &task, "/d/f", b"x");
    vfs.symlink(&task, "/d/l", "/d/f").unwrap();

    let dirfd = vfs.open(&task, "/d", OpenFlags::empty()).unwrap();

    let mut buf = [0u8; 64];
    let n = vfs.readlinkat(&task, dirfd, "l", &mut buf).unwrap();
    assert_eq!(&buf[..n], b"/d/f");

    vfs.unlinkat(&task, dirfd, "l").unwrap();
    vfs.unlinkat(&task, dirfd, "f").unwrap();
    assert_eq!(
        vfs.open(&task, "/d/f", OpenFlags::empty()).unwrap_err(),
        VfsError::NotFound
    );
    vfs.close(&task, dirfd).unwrap();
}

#[test]
fn name_length_boundary() {
    let (vfs, task) = setup();

    let ok_name: String = std::iter::repeat('x').take(NAME_MAXLEN - 1).collect();
    let long_name: String = std::iter::repeat('x').take(NAME_MAXLEN).collect();

    vfs.mkdir(&task, &format!("/{}", ok_name)).unwrap();
    assert_eq!(
        vfs.mkdir(&task, &format!("/{}", long_name)).unwrap_err(),
        VfsError::NameTooLong
    );
}

#[test]
fn slash_runs_collapse() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/d").unwrap();
    vfs.mkdir(&task, "/d/e").unwrap();

    let fd = vfs.open(&task, "//d///e/", OpenFlags::empty()).unwrap();
    let mut buf = [0u8; 64];
    let n = vfs.realpathat(&task, fd, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"/d/e");
    vfs.close(&task, fd).unwrap();
}

#[test]
fn bad_descriptors_are_rejected() {
    let (vfs, task) = setup();
    let mut buf = [0u8; 4];
    assert_eq!(
        vfs.read(&task, 13, &mut buf).unwrap_err(),
        VfsError::BadFileDescriptor
    );
    assert_eq!(vfs.close(&task, 13).unwrap_err(), VfsError::BadFileDescriptor);
    assert_eq!(vfs.dup(&task, 13).unwrap_err(), VfsError::BadFileDescriptor);
}

#[test]
fn fsync_commits_cached_writes() {
    let (vfs, task) = setup();

    let fd = vfs.open(&task, "/a", OpenFlags::CREATE).unwrap();
    vfs.write(&task, fd, b"durable").unwrap();
    vfs.fsync(&task, fd).unwrap();

    // a second descriptor sees the synced bytes without the first closing
    let fd2 = vfs.open(&task, "/a", OpenFlags::empty() | OpenFlags::DIRECT).unwrap();
    let mut buf = [0u8; 7];
    assert_eq!(vfs.read(&task, fd2, &mut buf).unwrap(), 7);
    assert_eq!(&buf, b"durable");
    vfs.close(&task, fd2).unwrap();
    vfs.close(&task, fd).unwrap();
}

#[test]
fn devfs_devices_and_read_only() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/dev").unwrap();
    let devfs: Arc<dyn FileSystem> = Arc::new(DevFs::new());
    vfs.mount("/dev", &devfs).unwrap();

    let fd = vfs.open(&task, "/dev/zero", OpenFlags::empty()).unwrap();
    let mut buf = [0xffu8; 16];
    assert_eq!(vfs.read(&task, fd, &mut buf).unwrap(), 16);
    assert!(buf.iter().all(|b| *b == 0));
    assert_eq!(vfs.write(&task, fd, b"ignored").unwrap(), 7);
    vfs.close(&task, fd).unwrap();

    let fd = vfs.open(&task, "/dev/null", OpenFlags::empty()).unwrap();
    assert_eq!(vfs.read(&task, fd, &mut buf).unwrap(), 0);
    vfs.close(&task, fd).unwrap();

    // destructive operations bounce off the read-only superblock
    assert_eq!(vfs.mkdir(&task, "/dev/x").unwrap_err(), VfsError::ReadOnly);
    assert_eq!(vfs.unlink(&task, "/dev/null").unwrap_err(), VfsError::ReadOnly);

    let fd = vfs.open(&task, "/dev", OpenFlags::empty()).unwrap();
    let mut names = Vec::new();
    let mut entry = DirEntry::default();
    while vfs.readdir(&task, fd, &mut entry).unwrap() {
        names.push(entry.name.clone());
    }
    vfs.close(&task, fd).unwrap();
    assert_eq!(names, vec![".", "..", "null", "zero"]);
}

#[test]
fn unmount_busy_then_ok() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/mnt").unwrap();
    let second: Arc<dyn FileSystem> = Arc::new(RamFs::new());
    vfs.mount("/mnt", &second).unwrap();

    let fd = vfs.open(&task, "/mnt/f", OpenFlags::CREATE).unwrap();
    assert_eq!(vfs.unmount("/mnt").unwrap_err(), VfsError::Busy);
    vfs.close(&task, fd).unwrap();

    vfs.unmount("/mnt").unwrap();
    // the underlying directory shows through again, without the file
    let fd = vfs.open(&task, "/mnt", OpenFlags::empty()).unwrap();
    vfs.close(&task, fd).unwrap();
    assert_eq!(
        vfs.open(&task, "/mnt/f", OpenFlags::empty()).unwrap_err(),
        VfsError::NotFound
    );
}

#[test]
fn cwd_pins_mount() {
    let (vfs, task) = setup();
    vfs.mkdir(&task, "/mnt").unwrap();
    let second: Arc<dyn FileSystem> = Arc::new(RamFs::new());
    vfs.mount("/mnt", &second).unwrap();

    vfs.chdir(&task, "/mnt").unwrap();
    assert_eq!(vfs.unmount("/mnt").unwrap_err(), VfsError::Busy);

    vfs.chdir(&task, "/").unwrap();
    vfs.unmount("/mnt").unwrap();
}

#[test]
fn global_instance_initializes_once() {
    rvfs::init().unwrap();
    rvfs::init().unwrap();

    let vfs = rvfs::get_vfs();
    let task = Task::new();
    write_file(&vfs, &task, "/global-smoke", b"ok");
    assert_eq!(read_file(&vfs, &task, "/global-smoke"), b"ok");
}

fn fixed_clock() -> u64 {
    1_700_000_000
}

#[test]
fn clock_stamps_inode_times() {
    let vfs = Vfs::with_config(rvfs::VfsConfig {
        clock: fixed_clock,
        ..rvfs::VfsConfig::default()
    });
    let ramfs: Arc<dyn FileSystem> = Arc::new(RamFs::new());
    vfs.mount("/", &ramfs).unwrap();
    let task = Task::new();

    let fd = vfs.open(&task, "/stamped", OpenFlags::CREATE).unwrap();
    vfs.write(&task, fd, b"x").unwrap();
    let stat = vfs.fstat(&task, fd).unwrap();
    assert_eq!(stat.ctime, 1_700_000_000);
    assert_eq!(stat.mtime, 1_700_000_000);
    vfs.close(&task, fd).unwrap();
}

#[test]
fn open_file_pins_dnode() {
    let (vfs, task) = setup();
    write_file(&vfs, &task, "/a", b"x");

    let dnode = vfs
        .walk(None, "/a", rvfs::WalkFlags::empty())
        .unwrap()
        .dnode;
    assert_eq!(dnode.ref_count(), 1);

    let fd = vfs.open(&task, "/a", OpenFlags::empty()).unwrap();
    assert_eq!(dnode.ref_count(), 2);
    vfs.close(&task, fd).unwrap();
    assert_eq!(dnode.ref_count(), 1);
}
