use thiserror::Error;

/// Result type alias for disk image operations
pub type Result<T> = std::result::Result<T, DiskError>;

/// Errors that abort a disk image operation
#[derive(Debug, Error)]
pub enum DiskError {
    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Container format not recognised or not valid for the requested operation
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Sector image length does not match the geometry
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Byte length required by the geometry
        expected: usize,
        /// Byte length actually supplied
        actual: usize,
    },

    /// Parse error at specific offset
    #[error("Parse error at offset {offset}: {message}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Error message
        message: String,
    },

    /// Encoding requires every sector of a track to be valid
    #[error("Track {track} contains invalid sectors")]
    CorruptTrack {
        /// Track index (cylinder * heads + head)
        track: usize,
    },

    /// Invalid track number specified
    #[error("Invalid track {track} (max: {max})")]
    InvalidTrack {
        /// Track index
        track: usize,
        /// Maximum allowed track index
        max: usize,
    },

    /// Invalid sector number specified
    #[error("Invalid sector {sector} on track {track}")]
    InvalidSector {
        /// Track index
        track: usize,
        /// Sector number
        sector: u8,
    },

    /// No candidate geometry and filesystem scored above the threshold
    #[error("Unrecognized disk format or disk is damaged")]
    NoMatch,

    /// Several candidates scored equally; an explicit choice is needed
    #[error("Ambiguous disk type, choose one of: {}", candidates.join(", "))]
    Ambiguous {
        /// Descriptions of the tied candidates
        candidates: Vec<String>,
    },

    /// Directory structure is unreadable or self-referencing
    #[error("Corrupt catalog: {0}")]
    CorruptCatalog(String),

    /// Driver used on an image bound to another filesystem
    #[error("Filesystem mismatch: expected {expected}, image is {actual}")]
    FilesystemMismatch {
        /// Filesystem the driver handles
        expected: String,
        /// Filesystem bound to the image
        actual: String,
    },

    /// No filesystem is bound to the image
    #[error("No recognised filesystem on this disk")]
    UnknownFilesystem,

    /// Directory entry was listed from a different image
    #[error("Directory entry '{0}' does not belong to this image")]
    ForeignEntry(String),

    /// File not found in filesystem
    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl DiskError {
    /// Create a parse error with context
    pub fn parse<S: Into<String>>(offset: usize, message: S) -> Self {
        DiskError::ParseError {
            offset,
            message: message.into(),
        }
    }

    /// Create an unsupported format error
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        DiskError::UnsupportedFormat(message.into())
    }

    /// Create a corrupt catalog error
    pub fn catalog<S: Into<String>>(message: S) -> Self {
        DiskError::CorruptCatalog(message.into())
    }

    /// Create a filesystem mismatch error
    pub fn mismatch(expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> Self {
        DiskError::FilesystemMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Non-fatal conditions reported alongside a successful result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Some sectors failed to decode; they are flagged invalid in the image
    IncompleteSectorData {
        /// Number of invalid sectors
        invalid: usize,
        /// Total number of sectors in the geometry
        total: usize,
    },
    /// A file chain broke before the end; the recovered prefix is returned
    Truncated {
        /// File name
        name: String,
        /// Bytes recovered
        recovered: usize,
        /// What broke the chain
        reason: String,
    },
    /// Data sectors listed by a file could not be read and were zero-filled
    UnreadableData {
        /// File name
        name: String,
        /// Number of zero-filled sectors
        sectors: usize,
    },
    /// The exported image contains sectors that were invalid in the source
    LossyExport {
        /// Number of invalid sectors written
        invalid_sectors: usize,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::IncompleteSectorData { invalid, total } => {
                write!(f, "{} of {} sectors could not be decoded", invalid, total)
            }
            Warning::Truncated {
                name,
                recovered,
                reason,
            } => write!(
                f,
                "{} truncated after {} bytes: {}",
                name, recovered, reason
            ),
            Warning::UnreadableData { name, sectors } => {
                write!(f, "{}: {} unreadable sectors zero-filled", name, sectors)
            }
            Warning::LossyExport { invalid_sectors } => write!(
                f,
                "export contains {} sectors that were invalid in the source",
                invalid_sectors
            ),
        }
    }
}
