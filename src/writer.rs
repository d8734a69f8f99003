//! Single-pass packer: traverses a [`SourceFs`] depth-first and emits the
//! packed stream into any `Write + Seek` sink.
//!
//! Headers are written in two phases. Popping a directory reserves a
//! zero-filled header slot for every child before any child's content is
//! written, so sibling headers always occupy one contiguous, name-sorted
//! run; each entry's real header is back-patched into its slot once its
//! name, payload, and child placement are known. Payload bytes, long
//! names, and nested subtree records interleave freely after the slots.

use crate::error::{PackFsError, Result};
use crate::header::{EntryHeader, HEADER_SIZE, MAX_DIR_ENTRIES, SHORT_NAME_LEN};
use crate::source::{SourceEntry, SourceFs, SourceMetadata};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Caps applied while packing. Every numeric cap is unlimited when <= 0;
/// the default configuration has no limits and logs nothing.
pub struct PackOptions<'a> {
    /// Maximum directory depth to traverse; the root is depth 0.
    pub max_depth: i64,
    /// Maximum total length of the output stream, in bytes. The limit is
    /// on the farthest offset written; back-patching earlier offsets does
    /// not count against it.
    pub max_output_size: i64,
    /// Maximum total number of files and directories to pack.
    pub max_total_entries: i64,
    /// Optional sink for human-readable per-entry progress lines.
    pub status_log: Option<&'a mut dyn Write>,
}

impl Default for PackOptions<'_> {
    fn default() -> Self {
        PackOptions {
            max_depth: 0,
            max_output_size: 0,
            max_total_entries: 0,
            status_log: None,
        }
    }
}

// One entry whose header slot has been reserved but whose content still
// needs to be written.
struct PendingEntry<E> {
    handle: E,
    path: String,
    header_offset: u64,
    depth: i64,
}

struct PackQueue<'a, 's, F: SourceFs, W: Write + Seek> {
    source: &'s F,
    output: &'s mut W,
    options: PackOptions<'a>,
    pending: Vec<PendingEntry<F::Entry>>,
    entries_reserved: i64,
}

/// Pack the entire tree rooted at `source`'s `.` into `output`.
///
/// The sink receives the self-describing stream format read back by
/// [`PackFs::load`](crate::reader::PackFs::load). On error the sink is
/// left partially written; nothing is rolled back.
pub fn pack<F, W>(source: &F, output: &mut W, options: PackOptions<'_>) -> Result<()>
where
    F: SourceFs,
    W: Write + Seek,
{
    let root = source
        .open(".")
        .map_err(|e| PackFsError::path("open", ".", e.into()))?;
    let mut queue = PackQueue {
        source,
        output,
        options,
        pending: Vec::new(),
        entries_reserved: 0,
    };
    queue.reserve_and_enqueue(root, ".".to_string(), 0)?;
    while let Some(task) = queue.pending.pop() {
        queue.process(task)?;
    }
    tracing::debug!(entries = queue.entries_reserved, "pack complete");
    Ok(())
}

impl<F: SourceFs, W: Write + Seek> PackQueue<'_, '_, F, W> {
    fn log_status(&mut self, line: std::fmt::Arguments<'_>) {
        if let Some(log) = &mut self.options.status_log {
            let _ = writeln!(log, "{line}");
        }
    }

    // Fails if writing up to new_end would exceed the configured output
    // size limit.
    fn check_write_limit(&self, new_end: u64) -> Result<()> {
        let limit = self.options.max_output_size;
        if limit > 0 && new_end > limit as u64 {
            return Err(PackFsError::OutputLimit {
                limit,
                end: new_end,
            });
        }
        Ok(())
    }

    // Appends bytes at the end of the stream and returns the offset where
    // they landed.
    fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.output.seek(SeekFrom::End(0))?;
        self.check_write_limit(offset + bytes.len() as u64)?;
        self.output.write_all(bytes)?;
        Ok(offset)
    }

    // Back-patches a header into its reserved slot.
    fn patch_header(&mut self, header: &EntryHeader, offset: u64) -> Result<()> {
        self.output.seek(SeekFrom::Start(offset))?;
        self.check_write_limit(offset + HEADER_SIZE as u64)?;
        self.output.write_all(&header.to_bytes())?;
        Ok(())
    }

    // Reserves a zero-filled header slot for the entry and pushes it onto
    // the work stack. Enforces the entry-count and depth caps before
    // reserving anything.
    fn reserve_and_enqueue(&mut self, handle: F::Entry, path: String, depth: i64) -> Result<()> {
        let entry_limit = self.options.max_total_entries;
        if entry_limit > 0 && self.entries_reserved >= entry_limit {
            return Err(PackFsError::EntryLimit(entry_limit));
        }
        self.entries_reserved += 1;
        let depth_limit = self.options.max_depth;
        if depth_limit > 0 && depth > depth_limit {
            return Err(PackFsError::DepthLimit(depth_limit));
        }
        let header_offset = self
            .append(&[0u8; HEADER_SIZE])
            .map_err(|e| PackFsError::path("reserve", &path, e))?;
        self.pending.push(PendingEntry {
            handle,
            path,
            header_offset,
            depth,
        });
        Ok(())
    }

    // Pops one entry off the stack and writes its content. The source
    // handle is dropped on every exit path.
    fn process(&mut self, mut task: PendingEntry<F::Entry>) -> Result<()> {
        let meta = task
            .handle
            .metadata()
            .map_err(|e| PackFsError::path("stat", &task.path, e.into()))?;
        if meta.is_dir() {
            self.write_dir_entry(&mut task, &meta)
        } else {
            self.write_file_entry(&mut task, &meta)
        }
    }

    // Names longer than the inline field go out-of-line at the end of the
    // stream; returns the offset they were written at, or 0.
    fn write_long_name(&mut self, meta: &SourceMetadata, path: &str) -> Result<u64> {
        if meta.name.len() <= SHORT_NAME_LEN {
            return Ok(0);
        }
        self.append(meta.name.as_bytes())
            .map_err(|e| PackFsError::path("write name", path, e))
    }

    fn write_file_entry(
        &mut self,
        task: &mut PendingEntry<F::Entry>,
        meta: &SourceMetadata,
    ) -> Result<()> {
        let name_offset = self.write_long_name(meta, &task.path)?;

        let mut data_offset = 0;
        if meta.size > 0 {
            data_offset = self.output.seek(SeekFrom::End(0))?;
            self.check_write_limit(data_offset + meta.size)?;
            let copied = io::copy(&mut task.handle.by_ref().take(meta.size), &mut *self.output)
                .map_err(|e| PackFsError::path("write content", &task.path, e.into()))?;
            if copied != meta.size {
                return Err(PackFsError::path(
                    "write content",
                    &task.path,
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("source yielded {copied} of {} bytes", meta.size),
                    )
                    .into(),
                ));
            }
        }

        let mut header = EntryHeader::new(&meta.name, meta.mode, meta.mod_time);
        header.name_offset = name_offset;
        header.data_offset = data_offset;
        header.size = meta.size;
        self.patch_header(&header, task.header_offset)?;

        self.log_status(format_args!(
            "packed {} ({} bytes)",
            task.path, meta.size
        ));
        Ok(())
    }

    fn write_dir_entry(
        &mut self,
        task: &mut PendingEntry<F::Entry>,
        meta: &SourceMetadata,
    ) -> Result<()> {
        let name_offset = self.write_long_name(meta, &task.path)?;

        let mut children = task
            .handle
            .read_dir()
            .map_err(|e| PackFsError::path("read dir", &task.path, e.into()))?;
        if children.len() as u64 > MAX_DIR_ENTRIES {
            return Err(PackFsError::path(
                "read dir",
                &task.path,
                PackFsError::TooManyEntries(children.len() as u64),
            ));
        }

        let mut header = EntryHeader::new(&meta.name, meta.mode, meta.mod_time);
        header.name_offset = name_offset;

        if children.is_empty() {
            self.patch_header(&header, task.header_offset)?;
            self.log_status(format_args!("packed directory {} (empty)", task.path));
            return Ok(());
        }

        // The contiguous run of child header slots starts here; reserving
        // them in sorted order is what lets the reader binary-search.
        let data_offset = self.output.seek(SeekFrom::End(0))?;
        children.sort_unstable();
        for child in &children {
            let child_path = if task.path == "." {
                child.clone()
            } else {
                format!("{}/{}", task.path, child)
            };
            let handle = self
                .source
                .open(&child_path)
                .map_err(|e| PackFsError::path("open", &child_path, e.into()))?;
            self.reserve_and_enqueue(handle, child_path, task.depth + 1)?;
        }

        header.data_offset = data_offset;
        header.size = children.len() as u64;
        self.patch_header(&header, task.header_offset)?;

        self.log_status(format_args!(
            "packed directory {} ({} entries)",
            task.path,
            children.len()
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SeekableBuffer;
    use crate::header::{MAGIC, MODE_DIR};
    use crate::source::{MemFile, MemFs};

    #[test]
    fn test_pack_empty_root() {
        let source = MemFs::new();
        let mut out = SeekableBuffer::new();
        pack(&source, &mut out, PackOptions::default()).unwrap();

        // A bare root is one zero-patched header.
        assert_eq!(out.len(), HEADER_SIZE);
        let root = EntryHeader::from_bytes(out.as_slice()).unwrap();
        assert_eq!(root.magic, MAGIC);
        assert!(root.is_dir());
        assert_eq!(root.size, 0);
    }

    #[test]
    fn test_children_reserved_contiguously_and_sorted() {
        let mut source = MemFs::new();
        source.insert("zebra", MemFile::file(b"z".to_vec()));
        source.insert("apple", MemFile::file(b"a".to_vec()));
        source.insert("mango", MemFile::file(b"m".to_vec()));
        let mut out = SeekableBuffer::new();
        pack(&source, &mut out, PackOptions::default()).unwrap();

        let bytes = out.as_slice();
        let root = EntryHeader::from_bytes(bytes).unwrap();
        assert_eq!(root.size, 3);
        // Child slots immediately follow the root slot.
        assert_eq!(root.data_offset, HEADER_SIZE as u64);

        let mut names = Vec::new();
        for i in 0..root.size {
            let at = (root.data_offset + i * HEADER_SIZE as u64) as usize;
            let child = EntryHeader::from_bytes(&bytes[at..]).unwrap();
            assert_eq!(child.magic, MAGIC);
            names.push(child.short_label());
        }
        assert_eq!(names, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn test_long_name_written_out_of_line() {
        let mut source = MemFs::new();
        source.insert("averylongname.txt", MemFile::file(b"data".to_vec()));
        let mut out = SeekableBuffer::new();
        pack(&source, &mut out, PackOptions::default()).unwrap();

        let bytes = out.as_slice();
        let root = EntryHeader::from_bytes(bytes).unwrap();
        let child =
            EntryHeader::from_bytes(&bytes[root.data_offset as usize..]).unwrap();
        assert_eq!(child.name_size, 17);
        assert_eq!(&child.short_name, b"averylon");
        assert_ne!(child.name_offset, 0);
        let at = child.name_offset as usize;
        assert_eq!(&bytes[at..at + 17], b"averylongname.txt");
    }

    #[test]
    fn test_status_log_lines() {
        let mut source = MemFs::new();
        source.insert("file.txt", MemFile::file(b"hello".to_vec()));
        let mut out = SeekableBuffer::new();
        let mut log = Vec::new();
        let options = PackOptions {
            status_log: Some(&mut log),
            ..PackOptions::default()
        };
        pack(&source, &mut out, options).unwrap();

        let text = String::from_utf8(log).unwrap();
        assert!(text.contains("file.txt"));
        assert!(text.contains("5 bytes"));
    }

    #[test]
    fn test_mode_and_mtime_preserved() {
        let mut source = MemFs::new();
        source.insert(
            "f",
            MemFile {
                data: b"x".to_vec(),
                mode: 0o600,
                mod_time: 1_234_567,
            },
        );
        let mut out = SeekableBuffer::new();
        pack(&source, &mut out, PackOptions::default()).unwrap();

        let bytes = out.as_slice();
        let root = EntryHeader::from_bytes(bytes).unwrap();
        assert!(root.mode & MODE_DIR != 0);
        let child =
            EntryHeader::from_bytes(&bytes[root.data_offset as usize..]).unwrap();
        assert_eq!(child.mode, 0o600);
        assert_eq!(child.mod_time, 1_234_567);
    }
}
