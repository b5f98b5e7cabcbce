use freshen_fs::{AccessMode, FileGroup, FileTransaction, LockFile, LockKind, modified_utc};
use std::fs;
use std::io::Write;
use tempfile::tempdir;

#[test]
fn test_read_write_starts_from_current_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("counter.txt");
    fs::write(&path, "1").unwrap();

    let tx = FileTransaction::begin(&path, AccessMode::ReadWrite).unwrap();
    assert_eq!(fs::read_to_string(tx.safe_path()).unwrap(), "1");
    fs::write(tx.safe_path(), "2").unwrap();
    tx.commit().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "2");
}

#[test]
fn test_read_write_on_directory_copies_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree");
    fs::create_dir_all(path.join("sub")).unwrap();
    fs::write(path.join("sub/leaf"), "leaf").unwrap();

    let tx = FileTransaction::begin(&path, AccessMode::ReadWrite).unwrap();
    fs::write(tx.safe_path().join("extra"), "extra").unwrap();
    tx.commit().unwrap();

    assert_eq!(fs::read_to_string(path.join("sub/leaf")).unwrap(), "leaf");
    assert_eq!(fs::read_to_string(path.join("extra")).unwrap(), "extra");
}

#[test]
fn test_reader_blocks_writer_until_released() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shared.txt");
    fs::write(&path, "v1").unwrap();

    let reader = FileTransaction::begin(&path, AccessMode::Read).unwrap();
    assert!(
        FileTransaction::begin(&path, AccessMode::Write)
            .unwrap_err()
            .is_lock_unavailable()
    );
    reader.commit().unwrap();

    let writer = FileTransaction::begin(&path, AccessMode::Write).unwrap();
    let mut file = writer.open().unwrap();
    file.write_all(b"v2").unwrap();
    drop(file);
    writer.commit().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "v2");
}

#[test]
fn test_group_read_then_write() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src.txt");
    let dst = dir.path().join("dst.txt");
    fs::write(&src, "payload").unwrap();

    let inputs = FileGroup::begin([&src], AccessMode::Read).unwrap();
    let outputs = FileGroup::begin([&dst], AccessMode::Write).unwrap();
    fs::copy(inputs.safe_paths()[0], outputs.safe_paths()[0]).unwrap();
    outputs.commit().unwrap();
    inputs.commit().unwrap();

    assert_eq!(fs::read_to_string(&dst).unwrap(), "payload");
    assert!(modified_utc(&dst).is_ok());
}

#[test]
fn test_recreated_lock_file_is_independent() {
    let dir = tempdir().unwrap();
    let lock_path = dir.path().join("x.lock");

    let held = LockFile::try_acquire(&lock_path, LockKind::Exclusive).unwrap();
    fs::remove_file(&lock_path).unwrap();

    // A fresh lock file is a different inode, so acquiring it succeeds.
    let fresh = LockFile::try_acquire(&lock_path, LockKind::Exclusive).unwrap();
    assert_eq!(fresh.kind(), LockKind::Exclusive);
    drop(held);
}
