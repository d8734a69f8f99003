//! Writer cap enforcement: entry count, output size, directory depth.

use packfs::{pack, MemFile, MemFs, PackFsError, PackOptions, SeekableBuffer};

fn two_file_tree() -> MemFs {
    let mut tree = MemFs::new();
    tree.insert("file1", MemFile::file(b"hi".to_vec()));
    tree.insert("file2", MemFile::file(b"hi 2".to_vec()));
    tree
}

#[test]
fn test_entry_count_limit() {
    let tree = two_file_tree();

    let mut out = SeekableBuffer::new();
    let err = pack(
        &tree,
        &mut out,
        PackOptions {
            max_total_entries: 1,
            ..PackOptions::default()
        },
    )
    .unwrap_err();
    assert!(
        matches!(err.root_cause(), PackFsError::EntryLimit(1)),
        "got {err}"
    );

    // Root plus two files is three entries; eight is plenty.
    let mut out = SeekableBuffer::new();
    pack(
        &tree,
        &mut out,
        PackOptions {
            max_total_entries: 8,
            ..PackOptions::default()
        },
    )
    .unwrap();
}

#[test]
fn test_output_size_limit() {
    let mut tree = two_file_tree();
    tree.insert("file3", MemFile::file(vec![b'A'; 10_000]));

    let mut out = SeekableBuffer::new();
    let err = pack(
        &tree,
        &mut out,
        PackOptions {
            max_output_size: 5_000,
            ..PackOptions::default()
        },
    )
    .unwrap_err();
    assert!(
        matches!(err.root_cause(), PackFsError::OutputLimit { limit: 5_000, .. }),
        "got {err}"
    );

    let mut out = SeekableBuffer::new();
    pack(
        &tree,
        &mut out,
        PackOptions {
            max_output_size: 20_000,
            ..PackOptions::default()
        },
    )
    .unwrap();
}

#[test]
fn test_depth_limit() {
    let mut tree = two_file_tree();
    tree.insert(
        "a/b/c/d/e/f/g/h/i/j/k/l/file4",
        MemFile::file(b"Wow!".to_vec()),
    );

    let mut out = SeekableBuffer::new();
    let err = pack(
        &tree,
        &mut out,
        PackOptions {
            max_depth: 6,
            ..PackOptions::default()
        },
    )
    .unwrap_err();
    assert!(
        matches!(err.root_cause(), PackFsError::DepthLimit(6)),
        "got {err}"
    );

    let mut out = SeekableBuffer::new();
    pack(
        &tree,
        &mut out,
        PackOptions {
            max_depth: 20,
            ..PackOptions::default()
        },
    )
    .unwrap();
}

#[test]
fn test_zero_caps_mean_unlimited() {
    let mut tree = two_file_tree();
    tree.insert("a/b/c/d/e/f/g/h/i/j/k/l/file4", MemFile::file(b"!".to_vec()));
    tree.insert("big", MemFile::file(vec![0u8; 50_000]));

    let mut out = SeekableBuffer::new();
    pack(&tree, &mut out, PackOptions::default()).unwrap();
}

#[test]
fn test_partial_output_left_behind_on_failure() {
    let tree = two_file_tree();
    let mut out = SeekableBuffer::new();
    let result = pack(
        &tree,
        &mut out,
        PackOptions {
            max_total_entries: 1,
            ..PackOptions::default()
        },
    );
    assert!(result.is_err());
    // Nothing is rolled back; the reserved root slot is still there.
    assert!(!out.is_empty());
}
