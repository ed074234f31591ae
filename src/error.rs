//! Error types for stegofs.

use thiserror::Error;

/// Result type alias for stegofs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in carrier, codec and filesystem operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error on the underlying carrier file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The carrier is not a media file we can parse.
    #[error("invalid carrier format: {0}")]
    InvalidFormat(String),

    /// Bad path, negative offset, empty name, or an operation on root.
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// Path component missing or directory iterator exhausted.
    #[error("no such file or directory")]
    NotFound,

    /// A file was traversed as if it were a directory.
    #[error("not a directory")]
    NotADirectory,

    /// A file operation was attempted on a directory.
    #[error("is a directory")]
    IsADirectory,

    /// Filename longer than the 55-byte limit.
    #[error("filename too long")]
    NameTooLong,

    /// An entry with the same name already exists in the directory.
    #[error("file exists")]
    Exists,

    /// rmdir of a directory that still has entries.
    #[error("directory not empty")]
    NotEmpty,

    /// The allocator could not find enough free clusters.
    #[error("no space left on carrier")]
    NoSpace,

    /// Requested file size exceeds the 2^31 - 1 limit.
    #[error("file too large")]
    TooLarge,

    /// offset + length wrapped around.
    #[error("offset overflow")]
    Overflow,

    /// Cluster index or codec offset beyond the carrier's capacity.
    #[error("access out of range: {index} >= {count}")]
    OutOfRange { index: u64, count: u64 },

    /// Digest mismatch or a broken cluster chain.
    #[error("filesystem corrupted: {0}")]
    Corrupt(&'static str),
}

impl Error {
    /// Convert this error into a POSIX errno for the external mount driver.
    #[must_use]
    pub fn errno(&self) -> libc::c_int {
        match self {
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Self::InvalidFormat(_) | Self::Invalid(_) => libc::EINVAL,
            Self::NotFound => libc::ENOENT,
            Self::NotADirectory => libc::ENOTDIR,
            Self::IsADirectory => libc::EISDIR,
            Self::NameTooLong => libc::ENAMETOOLONG,
            Self::Exists => libc::EEXIST,
            Self::NotEmpty => libc::ENOTEMPTY,
            Self::NoSpace => libc::ENOSPC,
            Self::TooLarge => libc::EFBIG,
            Self::Overflow => libc::EOVERFLOW,
            Self::OutOfRange { .. } => libc::ERANGE,
            Self::Corrupt(_) => libc::EIO,
        }
    }
}
