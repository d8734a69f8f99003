use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackFsError {
    #[error("incorrect magic identifier in header")]
    InvalidMagic,

    #[error("header record truncated: expected {expected} bytes, got {got}")]
    TruncatedHeader { expected: usize, got: usize },

    #[error("directory contains too many entries ({0})")]
    TooManyEntries(u64),

    #[error("root entry is not a directory")]
    RootNotDirectory,

    #[error("invalid path {0:?}")]
    InvalidPath(String),

    #[error("entry {0:?} does not exist")]
    NotFound(String),

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("{0} is a directory")]
    IsADirectory(String),

    #[error("cannot seek to negative offset {0}")]
    NegativeSeek(i64),

    #[error("end of directory")]
    EndOfDirectory,

    #[error("directory depth limit of {0} exceeded")]
    DepthLimit(i64),

    #[error("limit of {0} total entries exceeded")]
    EntryLimit(i64),

    #[error("output size limit of {limit} bytes exceeded (write would end at {end})")]
    OutputLimit { limit: i64, end: u64 },

    #[error("{op} {path:?}: {source}")]
    Path {
        op: &'static str,
        path: String,
        #[source]
        source: Box<PackFsError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackFsError {
    /// Wrap an error with the operation and full path it failed for.
    pub fn path(op: &'static str, path: &str, source: PackFsError) -> Self {
        PackFsError::Path {
            op,
            path: path.to_string(),
            source: Box::new(source),
        }
    }

    /// True if the error is a missing-entry lookup failure, looking through
    /// any path context wrapped around it.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), PackFsError::NotFound(_))
    }

    /// The innermost error, with all path context stripped.
    pub fn root_cause(&self) -> &PackFsError {
        match self {
            PackFsError::Path { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<PackFsError> for std::io::Error {
    fn from(err: PackFsError) -> Self {
        match err {
            PackFsError::Io(inner) => inner,
            PackFsError::NegativeSeek(_) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
            }
            other => std::io::Error::other(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PackFsError>;
