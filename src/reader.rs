//! Random-access reader over a packed stream.
//!
//! [`PackFs::load`] consumes any `Read + Seek` source and resolves paths
//! without materializing the tree: each lookup is a binary search over the
//! contiguous, name-sorted child headers a directory points at. The source
//! has a single seek cursor, so every seek-plus-read pair happens under
//! one shared mutex; re-rooted views from [`PackFs::sub`] share that same
//! mutex object with their parent.

use crate::error::{PackFsError, Result};
use crate::header::{EntryHeader, HEADER_SIZE, SHORT_NAME_LEN};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// Handle to a loaded packed stream, rooted at one of its directories.
///
/// Cloning is cheap and yields a view over the same source and lock.
#[derive(Debug)]
pub struct PackFs<S> {
    stream: Arc<Mutex<S>>,
    root: EntryHeader,
}

impl<S> Clone for PackFs<S> {
    fn clone(&self) -> Self {
        PackFs {
            stream: Arc::clone(&self.stream),
            root: self.root,
        }
    }
}

/// Name and stat information for one entry, also the item type yielded by
/// [`Entry::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub size: u64,
    pub mode: u64,
    pub mod_time: u64,
}

impl EntryInfo {
    pub fn is_dir(&self) -> bool {
        self.mode & crate::header::MODE_DIR != 0
    }
}

// A path is a rootless slash-separated sequence of non-empty components,
// none of which may be "." or ".." -- except the whole string ".", which
// names the root.
fn is_valid_path(path: &str) -> bool {
    if path == "." {
        return true;
    }
    if path.is_empty() {
        return false;
    }
    path.split('/').all(|c| !c.is_empty() && c != "." && c != "..")
}

impl<S: Read + Seek> PackFs<S> {
    /// Load a packed stream. The record at offset 0 must decode to a valid
    /// directory header.
    pub fn load(mut source: S) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let mut raw = [0u8; HEADER_SIZE];
        source.read_exact(&mut raw)?;
        let root = EntryHeader::from_bytes(&raw)?;
        root.validate()?;
        if !root.is_dir() {
            return Err(PackFsError::RootNotDirectory);
        }
        Ok(PackFs {
            stream: Arc::new(Mutex::new(source)),
            root,
        })
    }

    /// Open the entry at `path` (`.` for the root directory).
    pub fn open(&self, path: &str) -> Result<Entry<S>> {
        let header = self
            .resolve(path)
            .map_err(|e| PackFsError::path("open", path, e))?;
        Ok(Entry {
            fs: self.clone(),
            header,
            cursor: 0,
        })
    }

    /// A view of this filesystem re-rooted at the directory `path`. The
    /// view shares the underlying source and its lock with `self`.
    pub fn sub(&self, path: &str) -> Result<PackFs<S>> {
        let header = self
            .resolve(path)
            .and_then(|header| {
                if header.is_dir() {
                    Ok(header)
                } else {
                    Err(PackFsError::NotADirectory(path.to_string()))
                }
            })
            .map_err(|e| PackFsError::path("sub", path, e))?;
        Ok(PackFs {
            stream: Arc::clone(&self.stream),
            root: header,
        })
    }

    // Reads exactly buf.len() bytes at an absolute offset. The lock spans
    // the seek-plus-read pair and nothing more.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let mut stream = self.stream.lock();
        stream.seek(SeekFrom::Start(offset))?;
        stream.read_exact(buf)?;
        Ok(())
    }

    fn header_at(&self, offset: u64) -> Result<EntryHeader> {
        let mut raw = [0u8; HEADER_SIZE];
        self.read_at(&mut raw, offset)?;
        EntryHeader::from_bytes(&raw)
    }

    // The full base name of an entry, fetched out-of-line when it doesn't
    // fit the header's inline field.
    fn entry_name(&self, header: &EntryHeader) -> Result<String> {
        let len = header.name_size as usize;
        if len <= SHORT_NAME_LEN {
            return Ok(String::from_utf8_lossy(&header.short_name[..len]).into_owned());
        }
        let mut raw = vec![0u8; len];
        self.read_at(&mut raw, header.name_offset)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    fn entry_info(&self, header: &EntryHeader) -> Result<EntryInfo> {
        Ok(EntryInfo {
            name: self.entry_name(header)?,
            size: header.size,
            mode: header.mode,
            mod_time: header.mod_time,
        })
    }

    // Orders an on-stream entry's name against a probe string, reading the
    // out-of-line name only when the inline prefix can't decide: the
    // header always holds the first min(8, name_size) name bytes, so a
    // prefix comparison is conclusive unless both sides exceed 8 bytes and
    // tie on their first 8.
    fn compare_entry_name(&self, header: &EntryHeader, probe: &str) -> Result<Ordering> {
        let name_len = header.name_size as usize;
        let probe = probe.as_bytes();
        if name_len <= SHORT_NAME_LEN {
            return Ok(header.short_name[..name_len].cmp(probe));
        }
        let prefix = &header.short_name[..];
        if probe.len() < SHORT_NAME_LEN {
            return Ok(prefix.cmp(probe));
        }
        match prefix.cmp(&probe[..SHORT_NAME_LEN]) {
            Ordering::Equal if probe.len() == SHORT_NAME_LEN => Ok(Ordering::Greater),
            Ordering::Equal => {
                let full = self.entry_name(header)?;
                Ok(full.as_bytes().cmp(probe))
            }
            decided => Ok(decided),
        }
    }

    // Binary search over a directory's contiguous child headers. Each
    // probe takes and releases the lock for one header fetch, so other
    // readers interleave between steps.
    fn lookup_child(&self, dir: &EntryHeader, name: &str) -> Result<EntryHeader> {
        if !dir.is_dir() {
            return Err(PackFsError::NotADirectory(dir.short_label()));
        }
        let mut lo = 0i64;
        let mut hi = dir.size as i64 - 1;
        while lo <= hi {
            let mid = (lo + hi) / 2;
            let offset = dir.data_offset + mid as u64 * HEADER_SIZE as u64;
            let entry = self.header_at(offset)?;
            match self.compare_entry_name(&entry, name)? {
                Ordering::Equal => return Ok(entry),
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid - 1,
            }
        }
        Err(PackFsError::NotFound(name.to_string()))
    }

    fn resolve(&self, path: &str) -> Result<EntryHeader> {
        if !is_valid_path(path) {
            return Err(PackFsError::InvalidPath(path.to_string()));
        }
        if path == "." {
            return Ok(self.root);
        }
        let mut current = self.root;
        for component in path.split('/') {
            current = self.lookup_child(&current, component)?;
        }
        Ok(current)
    }
}

/// An opened file or directory.
///
/// Files implement [`io::Read`] and [`io::Seek`] over the packed payload;
/// directories yield their children through [`Entry::read_dir`]. Dropping
/// the handle closes it; the underlying source stays alive as long as any
/// [`PackFs`] or entry references it.
#[derive(Debug)]
pub struct Entry<S> {
    fs: PackFs<S>,
    header: EntryHeader,
    cursor: u64,
}

impl<S: Read + Seek> Entry<S> {
    pub fn is_dir(&self) -> bool {
        self.header.is_dir()
    }

    pub fn stat(&self) -> Result<EntryInfo> {
        self.fs.entry_info(&self.header)
    }

    /// Read up to `n` child entries, advancing the directory cursor; all
    /// remaining children when `n <= 0`. Fails with
    /// [`PackFsError::EndOfDirectory`] once the cursor reaches the end,
    /// and cannot rewind.
    pub fn read_dir(&mut self, n: i64) -> Result<Vec<EntryInfo>> {
        if !self.header.is_dir() {
            return Err(PackFsError::NotADirectory(self.header.short_label()));
        }
        let count = self.header.size;
        if self.cursor >= count {
            return Err(PackFsError::EndOfDirectory);
        }
        let start = self.cursor;
        let end = if n <= 0 {
            count
        } else {
            count.min(start.saturating_add(n as u64))
        };

        // One lock acquisition for the whole contiguous header run; name
        // fetches below may briefly re-take the lock for long names.
        let batch = (end - start) as usize;
        let mut raw = vec![0u8; batch * HEADER_SIZE];
        self.fs
            .read_at(&mut raw, self.header.data_offset + start * HEADER_SIZE as u64)?;

        let mut entries = Vec::with_capacity(batch);
        for chunk in raw.chunks_exact(HEADER_SIZE) {
            let header = EntryHeader::from_bytes(chunk)?;
            entries.push(self.fs.entry_info(&header)?);
        }
        self.cursor = end;
        Ok(entries)
    }
}

impl<S: Read + Seek> Read for Entry<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.header.is_dir() {
            return Err(PackFsError::IsADirectory(self.header.short_label()).into());
        }
        let size = self.header.size;
        if self.cursor >= size {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(size - self.cursor) as usize;
        self.fs
            .read_at(&mut buf[..want], self.header.data_offset + self.cursor)?;
        self.cursor += want as u64;
        Ok(want)
    }
}

impl<S: Read + Seek> Seek for Entry<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.header.is_dir() {
            return Err(PackFsError::IsADirectory(self.header.short_label()).into());
        }
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => (0i128, offset as i128),
            SeekFrom::End(delta) => (self.header.size as i128, delta as i128),
            SeekFrom::Current(delta) => (self.cursor as i128, delta as i128),
        };
        let target = base + delta;
        if target < 0 {
            return Err(PackFsError::NegativeSeek(target as i64).into());
        }
        // Seeking past the end is allowed; reads there just hit EOF.
        self.cursor = target.min(u64::MAX as i128) as u64;
        Ok(self.cursor)
    }
}
