//! Packed Filesystem Stream
//!
//! Packs an arbitrary read-only directory tree into a single flat byte
//! stream and serves random-access reads from it without ever holding the
//! tree in memory. The stream is self-describing: enumeration, path
//! lookup, and file reads need nothing but the bytes and a `Read + Seek`
//! source.
//!
//! ## Features
//!
//! - **Fixed 64-byte headers** with an inline 8-byte name prefix
//! - **Single-pass writer**: depth-first traversal with reserved header
//!   slots back-patched once content placement is known
//! - **On-disk binary search**: sibling headers are contiguous and sorted
//!   by base name, so path lookup is O(log n) seeks per component
//! - **Shared-lock readers**: one mutex per stream; re-rooted sub-views
//!   and open entries all interleave safely across threads
//! - **Packing limits**: optional caps on depth, entry count, and output
//!   size, with a pluggable progress sink
//!
//! ## Example
//!
//! ```rust
//! use packfs::{pack, MemFile, MemFs, PackFs, PackOptions, SeekableBuffer};
//! use std::io::Read;
//!
//! let mut tree = MemFs::new();
//! tree.insert("docs/readme.txt", MemFile::file(b"hello".to_vec()));
//!
//! let mut stream = SeekableBuffer::new();
//! pack(&tree, &mut stream, PackOptions::default()).unwrap();
//!
//! let fs = PackFs::load(stream).unwrap();
//! let mut file = fs.open("docs/readme.txt").unwrap();
//! let mut contents = String::new();
//! file.read_to_string(&mut contents).unwrap();
//! assert_eq!(contents, "hello");
//! ```
//!
//! ## Stream layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Offset 0: root header (64 B)                │
//! │  - Magic: "1337FILE"                        │
//! │  - Always a directory                       │
//! ├─────────────────────────────────────────────┤
//! │ Child headers of the root                   │
//! │  - Contiguous, sorted by base name          │
//! ├─────────────────────────────────────────────┤
//! │ Interleaved content                         │
//! │  - File payloads                            │
//! │  - Out-of-line names (> 8 bytes)            │
//! │  - Child header runs of nested directories  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian; all offsets are absolute from byte 0.
//! Streams are immutable once written; there is no free list and no
//! in-place mutation.

pub mod buffer;
pub mod error;
pub mod header;
pub mod reader;
pub mod source;
pub mod writer;

// Re-export commonly used types
pub use buffer::SeekableBuffer;
pub use error::{PackFsError, Result};
pub use header::{EntryHeader, HEADER_SIZE, MAGIC, MAX_DIR_ENTRIES, MODE_DIR};
pub use reader::{Entry, EntryInfo, PackFs};
pub use source::{MemFile, MemFs, OsDir, SourceEntry, SourceFs, SourceMetadata};
pub use writer::{pack, PackOptions};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
