//! The stream-buffer contract: split get/put cursors over a byte store.

use crate::errors::Result;

/// Reference point for [`StreamBuf::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Absolute offset `delta`.
    Start,
    /// The targeted cursor's position plus `delta`. When both cursors are
    /// targeted, the read cursor is the reference.
    Current,
    /// End of logical data minus `delta`, so a positive delta moves backwards.
    End,
}

/// Which cursor(s) a seek repositions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorTarget {
    /// The get cursor only.
    Read,
    /// The put cursor only.
    Write,
    /// Both cursors, to the same offset.
    Both,
}

impl CursorTarget {
    /// Whether the get cursor is repositioned.
    #[must_use]
    pub fn includes_read(self) -> bool {
        matches!(self, Self::Read | Self::Both)
    }

    /// Whether the put cursor is repositioned.
    #[must_use]
    pub fn includes_write(self) -> bool {
        matches!(self, Self::Write | Self::Both)
    }
}

/// A buffer with independent read and write cursors.
///
/// Reading past the end of data is not an error: `read_bytes` returns 0.
/// Implementations report every byte they commit; a write either stores all
/// of `data` or fails without moving the write cursor.
pub trait StreamBuf {
    /// Copy up to `buf.len()` bytes from the read cursor and advance it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Store `data` at the write cursor and advance it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is read-only or cannot make room.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize>;

    /// Reposition the targeted cursor(s) and return the new absolute offset.
    ///
    /// # Errors
    ///
    /// Returns `SeekOutOfRange` for negative or out-of-bounds targets.
    fn seek(&mut self, origin: SeekOrigin, delta: i64, target: CursorTarget) -> Result<u64>;

    /// Persist written bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be synchronized.
    fn flush(&mut self) -> Result<()>;

    /// Finish the stream, reporting any failure of the final bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be finalized.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
