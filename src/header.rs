use crate::error::{PackFsError, Result};
use std::fmt;

/// Magic identifier beginning every entry header in the stream.
pub const MAGIC: [u8; 8] = *b"1337FILE";

/// Encoded size of an [`EntryHeader`] record, in bytes.
pub const HEADER_SIZE: usize = 64;

/// Number of name bytes stored inline in the header.
pub const SHORT_NAME_LEN: usize = 8;

/// Directory bit of the mode word. This bit is the sole source of truth
/// for whether an entry is a directory.
pub const MODE_DIR: u64 = 1 << 31;

/// Maximum number of entries a single directory may hold.
pub const MAX_DIR_ENTRIES: u64 = 0x7fff_ffff;

// Offset arithmetic all over the crate assumes the header is wider than
// its inline name field.
const _: () = assert!(HEADER_SIZE > SHORT_NAME_LEN);

/// Fixed-width metadata record describing one file or directory.
///
/// Every entry in a packed stream begins with one of these, encoded as
/// little-endian fields in declaration order. Offsets are absolute from
/// byte 0 of the stream. For a directory, `data_offset` points at a
/// contiguous run of `size` child headers sorted by base name, which is
/// what makes on-disk binary search possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    /// Must equal [`MAGIC`].
    pub magic: [u8; 8],

    /// Permission and type bits; see [`MODE_DIR`].
    pub mode: u64,

    /// First up-to-8 bytes of the base name, zero-padded when shorter.
    pub short_name: [u8; 8],

    /// Absolute offset of the full name bytes, or 0 when `name_size <= 8`.
    pub name_offset: u64,

    /// Length of the base name in bytes.
    pub name_size: u64,

    /// Files: absolute offset of the payload. Directories: absolute offset
    /// of the first child header.
    pub data_offset: u64,

    /// Files: payload length in bytes. Directories: child count, which
    /// must not exceed [`MAX_DIR_ENTRIES`].
    pub size: u64,

    /// Modification time, seconds since the Unix epoch.
    pub mod_time: u64,
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut field = [0u8; 8];
    field.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(field)
}

impl EntryHeader {
    /// Build a header for the named entry with its offsets still unset.
    /// The writer fills in `name_offset`, `data_offset`, and `size` once
    /// content placement is known.
    pub fn new(name: &str, mode: u64, mod_time: u64) -> Self {
        let bytes = name.as_bytes();
        let mut short_name = [0u8; SHORT_NAME_LEN];
        let prefix = bytes.len().min(SHORT_NAME_LEN);
        short_name[..prefix].copy_from_slice(&bytes[..prefix]);
        EntryHeader {
            magic: MAGIC,
            mode,
            short_name,
            name_offset: 0,
            name_size: bytes.len() as u64,
            data_offset: 0,
            size: 0,
            mod_time,
        }
    }

    /// True if and only if the entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.mode & MODE_DIR != 0
    }

    /// The inline name prefix, with an ellipsis suffix when the full name
    /// was truncated. Never fails, so useful for diagnostics.
    pub fn short_label(&self) -> String {
        let len = (self.name_size as usize).min(SHORT_NAME_LEN);
        let label = String::from_utf8_lossy(&self.short_name[..len]);
        if self.name_size as usize > SHORT_NAME_LEN {
            format!("{label}...")
        } else {
            label.into_owned()
        }
    }

    /// Check the structural rules every on-stream header must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(PackFsError::InvalidMagic);
        }
        if self.is_dir() && self.size > MAX_DIR_ENTRIES {
            return Err(PackFsError::TooManyEntries(self.size));
        }
        Ok(())
    }

    /// Serialize to the fixed little-endian record layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..8].copy_from_slice(&self.magic);
        out[8..16].copy_from_slice(&self.mode.to_le_bytes());
        out[16..24].copy_from_slice(&self.short_name);
        out[24..32].copy_from_slice(&self.name_offset.to_le_bytes());
        out[32..40].copy_from_slice(&self.name_size.to_le_bytes());
        out[40..48].copy_from_slice(&self.data_offset.to_le_bytes());
        out[48..56].copy_from_slice(&self.size.to_le_bytes());
        out[56..64].copy_from_slice(&self.mod_time.to_le_bytes());
        out
    }

    /// Deserialize from the fixed record layout. Fails only on short
    /// input; use [`EntryHeader::validate`] for structural checks.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(PackFsError::TruncatedHeader {
                expected: HEADER_SIZE,
                got: bytes.len(),
            });
        }
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);
        let mut short_name = [0u8; 8];
        short_name.copy_from_slice(&bytes[16..24]);
        Ok(EntryHeader {
            magic,
            mode: u64_at(bytes, 8),
            short_name,
            name_offset: u64_at(bytes, 24),
            name_size: u64_at(bytes, 32),
            data_offset: u64_at(bytes, 40),
            size: u64_at(bytes, 48),
            mod_time: u64_at(bytes, 56),
        })
    }
}

impl fmt::Display for EntryHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_label())
    }
}
