//! The source-filesystem seam consumed by the writer.
//!
//! [`pack`](crate::writer::pack) traverses anything implementing
//! [`SourceFs`]: open entries by slash-separated path (`.` is the root),
//! stat them, stream file payloads, and enumerate directory children. Two
//! implementations ship with the crate: [`OsDir`] over a real directory
//! tree and [`MemFs`] over an in-memory path map.

use crate::header::MODE_DIR;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

/// Metadata for one source entry, as captured into its packed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Base name of the entry (not a path).
    pub name: String,
    /// Payload length in bytes; 0 for directories.
    pub size: u64,
    /// Permission and type bits; see [`MODE_DIR`].
    pub mode: u64,
    /// Modification time, seconds since the Unix epoch.
    pub mod_time: u64,
}

impl SourceMetadata {
    pub fn is_dir(&self) -> bool {
        self.mode & MODE_DIR != 0
    }
}

/// A read-only filesystem tree the writer can pack.
///
/// `open(".")` must yield the root directory. Descendant paths are
/// slash-separated, rootless, and composed from the base names returned by
/// [`SourceEntry::read_dir`]. Base names must be unique per directory.
pub trait SourceFs {
    type Entry: SourceEntry;

    fn open(&self, path: &str) -> io::Result<Self::Entry>;
}

/// An opened source entry. `Read` streams the payload of regular files.
pub trait SourceEntry: Read {
    fn metadata(&self) -> io::Result<SourceMetadata>;

    /// Child base names of a directory, in no particular order. Errors on
    /// regular files.
    fn read_dir(&mut self) -> io::Result<Vec<String>>;
}

fn not_a_directory(name: &str) -> io::Error {
    io::Error::other(format!("{name} is not a directory"))
}

fn mtime_secs(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u64 {
    use std::os::unix::fs::PermissionsExt;
    let perm = (meta.permissions().mode() as u64) & 0o7777;
    if meta.is_dir() {
        perm | MODE_DIR
    } else {
        perm
    }
}

#[cfg(not(unix))]
fn mode_bits(meta: &fs::Metadata) -> u64 {
    if meta.is_dir() {
        0o755 | MODE_DIR
    } else {
        0o644
    }
}

/// Source over a directory on the real filesystem.
pub struct OsDir {
    root: PathBuf,
}

impl OsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OsDir { root: root.into() }
    }
}

impl SourceFs for OsDir {
    type Entry = OsEntry;

    fn open(&self, path: &str) -> io::Result<OsEntry> {
        let (full, name) = if path == "." {
            (self.root.clone(), ".".to_string())
        } else {
            let name = path.rsplit('/').next().unwrap_or(path).to_string();
            (self.root.join(path), name)
        };
        let meta = fs::metadata(&full)?;
        let file = if meta.is_file() {
            Some(fs::File::open(&full)?)
        } else {
            None
        };
        Ok(OsEntry {
            name,
            path: full,
            meta,
            file,
        })
    }
}

/// An entry opened through [`OsDir`].
pub struct OsEntry {
    name: String,
    path: PathBuf,
    meta: fs::Metadata,
    file: Option<fs::File>,
}

impl Read for OsEntry {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.file {
            Some(file) => file.read(buf),
            None => Err(io::Error::other(format!("{} is a directory", self.name))),
        }
    }
}

impl SourceEntry for OsEntry {
    fn metadata(&self) -> io::Result<SourceMetadata> {
        Ok(SourceMetadata {
            name: self.name.clone(),
            size: if self.meta.is_file() { self.meta.len() } else { 0 },
            mode: mode_bits(&self.meta),
            mod_time: mtime_secs(&self.meta),
        })
    }

    fn read_dir(&mut self) -> io::Result<Vec<String>> {
        if !self.meta.is_dir() {
            return Err(not_a_directory(&self.name));
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name().into_string().map_err(|raw| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("non-UTF-8 file name {raw:?}"),
                )
            })?;
            names.push(name);
        }
        Ok(names)
    }
}

/// One file or explicit directory in a [`MemFs`].
#[derive(Debug, Clone)]
pub struct MemFile {
    pub data: Vec<u8>,
    pub mode: u64,
    pub mod_time: u64,
}

impl MemFile {
    /// A regular file with default permissions.
    pub fn file(data: impl Into<Vec<u8>>) -> Self {
        MemFile {
            data: data.into(),
            mode: 0o644,
            mod_time: 0,
        }
    }

    /// An (empty) directory entry with default permissions.
    pub fn dir() -> Self {
        MemFile {
            data: Vec::new(),
            mode: MODE_DIR | 0o755,
            mod_time: 0,
        }
    }
}

/// In-memory source filesystem: a map from slash-separated paths to
/// entries. Intermediate directories are implied, so inserting
/// `"a/b/c.txt"` alone yields directories `a` and `a/b` during traversal.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    entries: BTreeMap<String, MemFile>,
}

impl MemFs {
    pub fn new() -> Self {
        MemFs::default()
    }

    pub fn insert(&mut self, path: &str, entry: MemFile) {
        self.entries.insert(path.to_string(), entry);
    }

    fn base_name(path: &str) -> String {
        path.rsplit('/').next().unwrap_or(path).to_string()
    }

    // Immediate child base names of `dir` ("." for the root), deduplicated
    // across explicit entries and implied intermediate directories.
    fn children_of(&self, dir: &str) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        for key in self.entries.keys() {
            let rest = if dir == "." {
                key.as_str()
            } else if let Some(rest) = key.strip_prefix(dir).and_then(|r| r.strip_prefix('/')) {
                rest
            } else {
                continue;
            };
            if let Some(first) = rest.split('/').next() {
                if !first.is_empty() {
                    seen.insert(first.to_string());
                }
            }
        }
        seen.into_iter().collect()
    }

    fn is_implied_dir(&self, path: &str) -> bool {
        let prefix = format!("{path}/");
        self.entries.keys().any(|k| k.starts_with(&prefix))
    }
}

impl SourceFs for MemFs {
    type Entry = MemEntry;

    fn open(&self, path: &str) -> io::Result<MemEntry> {
        if path == "." {
            return Ok(MemEntry {
                name: ".".to_string(),
                mode: MODE_DIR | 0o755,
                mod_time: 0,
                data: Vec::new(),
                pos: 0,
                children: Some(self.children_of(".")),
            });
        }
        if let Some(entry) = self.entries.get(path) {
            let is_dir = entry.mode & MODE_DIR != 0;
            return Ok(MemEntry {
                name: Self::base_name(path),
                mode: entry.mode,
                mod_time: entry.mod_time,
                data: if is_dir { Vec::new() } else { entry.data.clone() },
                pos: 0,
                children: is_dir.then(|| self.children_of(path)),
            });
        }
        if self.is_implied_dir(path) {
            return Ok(MemEntry {
                name: Self::base_name(path),
                mode: MODE_DIR | 0o755,
                mod_time: 0,
                data: Vec::new(),
                pos: 0,
                children: Some(self.children_of(path)),
            });
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no entry at {path:?}"),
        ))
    }
}

/// An entry opened through [`MemFs`].
#[derive(Debug)]
pub struct MemEntry {
    name: String,
    mode: u64,
    mod_time: u64,
    data: Vec<u8>,
    pos: usize,
    children: Option<Vec<String>>,
}

impl Read for MemEntry {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl SourceEntry for MemEntry {
    fn metadata(&self) -> io::Result<SourceMetadata> {
        Ok(SourceMetadata {
            name: self.name.clone(),
            size: self.data.len() as u64,
            mode: self.mode,
            mod_time: self.mod_time,
        })
    }

    fn read_dir(&mut self) -> io::Result<Vec<String>> {
        self.children
            .clone()
            .ok_or_else(|| not_a_directory(&self.name))
    }
}
