//! Crate-specific error types for mmap-stream.

use std::io;
use thiserror::Error;

/// Result alias for mmap-stream operations.
pub type Result<T> = std::result::Result<T, MmapStreamError>;

/// Error type covering filesystem, mapping, cursor, and lifecycle failures.
///
/// Running out of data is not an error: reads report it as a zero byte count
/// and peek/push-back report it as `None`.
#[derive(Debug, Error)]
pub enum MmapStreamError {
    /// Wrapper for `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error returned when attempting an operation in an incompatible mode.
    #[error("invalid access mode: {0}")]
    InvalidMode(&'static str),

    /// Error when a requested offset/length pair is out of bounds.
    #[error("range out of bounds: offset={offset}, len={len}, total={total}")]
    OutOfBounds {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Total size of the mapped file.
        total: u64,
    },

    /// Error when a flush operation fails.
    #[error("flush failed: {0}")]
    FlushFailed(String),

    /// Error when resizing is not allowed or fails.
    #[error("resize failed: {0}")]
    ResizeFailed(String),

    /// Error when an access-pattern hint is rejected by the OS.
    #[error("advice failed: {0}")]
    AdviceFailed(String),

    /// A remap requested by the growth policy failed; the write was abandoned.
    #[error("growth failed: requested={requested}, capacity={capacity}: {reason}")]
    GrowthFailed {
        /// Capacity the growth policy asked for.
        requested: u64,
        /// Capacity at the time of the failed request.
        capacity: u64,
        /// Underlying failure.
        reason: String,
    },

    /// A computed seek target is negative or beyond the cursor's bound.
    #[error("seek out of range: offset={offset}, bound={bound}")]
    SeekOutOfRange {
        /// Computed absolute offset (may be negative).
        offset: i128,
        /// Largest offset the targeted cursor accepts.
        bound: u64,
    },

    /// Truncating the file to its high-water mark failed at close.
    #[error("truncate to {length} bytes failed: {reason}")]
    TruncateFailed {
        /// Length the file should have been truncated to.
        length: u64,
        /// Underlying failure.
        reason: String,
    },
}

impl From<MmapStreamError> for io::Error {
    fn from(err: MmapStreamError) -> Self {
        let kind = match &err {
            MmapStreamError::Io(e) => e.kind(),
            MmapStreamError::InvalidMode(_) => io::ErrorKind::PermissionDenied,
            MmapStreamError::OutOfBounds { .. } | MmapStreamError::SeekOutOfRange { .. } => {
                io::ErrorKind::InvalidInput
            }
            MmapStreamError::GrowthFailed { .. } => io::ErrorKind::WriteZero,
            MmapStreamError::FlushFailed(_)
            | MmapStreamError::ResizeFailed(_)
            | MmapStreamError::AdviceFailed(_)
            | MmapStreamError::TruncateFailed { .. } => io::ErrorKind::Other,
        };
        match err {
            MmapStreamError::Io(e) => e,
            other => io::Error::new(kind, other),
        }
    }
}
