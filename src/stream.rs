//! Growable, cursor-based stream over a [`MemoryMappedFile`].
//!
//! The stream keeps only offsets. Every byte access goes back through the
//! region, which resolves the mapping under its lock, so a remap caused by
//! growth (or by another handle sharing the region) never leaves a stale
//! address behind.
//!
//! In write mode the stream tracks a high-water mark, the furthest offset any
//! write has reached. Capacity grows in page-aligned, geometrically increasing
//! steps, and on close the file is truncated back to the high-water mark.

use std::io;

use log::{debug, error, trace, warn};

#[cfg(feature = "advise")]
use crate::advise::MmapAdvice;
use crate::errors::{MmapStreamError, Result};
use crate::flush::{FlushPolicy, FlushTracker};
use crate::mmap::{MemoryMappedFile, MmapMode, MAX_MMAP_SIZE};
use crate::options::StreamOptions;
use crate::streambuf::{CursorTarget, SeekOrigin, StreamBuf};
use crate::utils::{checked_align_up, page_size_u64};

/// Cursor state, selected by the region's access mode at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursors {
    Read {
        get: u64,
    },
    Write {
        get: u64,
        put: u64,
        high_water: u64,
    },
}

/// Capacity to remap to so that `required` bytes fit.
///
/// The result is `capacity * factor` or the page-aligned requirement, whichever
/// is larger, never above the largest mappable size. `None` when even the
/// exact requirement cannot be mapped.
pub(crate) fn grow_target(capacity: u64, required: u64, factor: u64, page: u64) -> Option<u64> {
    let floor = checked_align_up(required, page)?;
    if floor > MAX_MMAP_SIZE {
        return None;
    }
    let ceiling = MAX_MMAP_SIZE - MAX_MMAP_SIZE % page.max(1);
    let scaled = checked_align_up(capacity.saturating_mul(factor), page).unwrap_or(ceiling);
    Some(scaled.min(ceiling).max(floor))
}

/// A seekable read/write stream over a memory-mapped file whose capacity grows on demand.
///
/// Read mode streams expose the whole mapping as data. Write mode streams
/// expose only bytes up to the high-water mark for reading, grow the mapping
/// when a write would overrun it, and truncate the file to the high-water mark
/// when closed.
///
/// Prefer [`close`](Self::close): dropping a write-mode stream performs the
/// same truncation but can only log a failure.
///
/// # Examples
///
/// ```no_run
/// use mmap_stream::{CursorTarget, MmapStream, SeekOrigin};
///
/// let mut stream = MmapStream::builder().create("log.bin")?;
/// stream.write_bytes(b"hello world")?;
/// stream.seek(SeekOrigin::Start, 6, CursorTarget::Read)?;
///
/// let mut word = [0u8; 5];
/// assert_eq!(stream.read_bytes(&mut word)?, 5);
/// assert_eq!(&word, b"world");
///
/// // The file ends up exactly 11 bytes long.
/// stream.close()?;
/// # Ok::<(), mmap_stream::MmapStreamError>(())
/// ```
#[derive(Debug)]
pub struct MmapStream {
    region: MemoryMappedFile,
    cursors: Cursors,
    growth_factor: u64,
    flush: FlushTracker,
    // A failed policy flush, reported by the next explicit flush or close.
    deferred_flush_error: Option<MmapStreamError>,
    #[cfg(feature = "advise")]
    advice: Option<MmapAdvice>,
    finished: bool,
}

impl MmapStream {
    /// Wrap an established region with default options.
    ///
    /// The stream's mode follows the region's: read-write regions yield a write
    /// stream with both cursors and the high-water mark at 0.
    #[must_use]
    pub fn new(region: MemoryMappedFile) -> Self {
        Self::with_options(region, &StreamOptions::default())
    }

    /// Start configuring a stream.
    #[must_use]
    pub fn builder() -> StreamOptions {
        StreamOptions::new()
    }

    pub(crate) fn with_options(region: MemoryMappedFile, options: &StreamOptions) -> Self {
        let cursors = match region.mode() {
            MmapMode::ReadOnly => Cursors::Read { get: 0 },
            MmapMode::ReadWrite => Cursors::Write {
                get: 0,
                put: 0,
                high_water: 0,
            },
        };
        let stream = Self {
            region,
            cursors,
            growth_factor: options.growth_factor_value(),
            flush: FlushTracker::new(options.flush_policy_value()),
            deferred_flush_error: None,
            #[cfg(feature = "advise")]
            advice: options.advice_value(),
            finished: false,
        };
        #[cfg(feature = "advise")]
        stream.apply_advice();
        stream
    }

    /// Access mode of the underlying region.
    #[must_use]
    pub fn mode(&self) -> MmapMode {
        self.region.mode()
    }

    /// The region this stream reads and writes.
    #[must_use]
    pub fn region(&self) -> &MemoryMappedFile {
        &self.region
    }

    /// Current mapped capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.region.len()
    }

    /// Furthest offset any write has reached. Always 0 for read mode streams.
    #[must_use]
    pub fn high_water_mark(&self) -> u64 {
        match self.cursors {
            Cursors::Read { .. } => 0,
            Cursors::Write { high_water, .. } => high_water,
        }
    }

    /// Offset of the next byte to read.
    #[must_use]
    pub fn read_position(&self) -> u64 {
        match self.cursors {
            Cursors::Read { get } | Cursors::Write { get, .. } => get,
        }
    }

    /// Offset of the next byte to write, or `None` for read mode streams.
    #[must_use]
    pub fn write_position(&self) -> Option<u64> {
        match self.cursors {
            Cursors::Read { .. } => None,
            Cursors::Write { put, .. } => Some(put),
        }
    }

    /// Flush policy in effect for writes.
    #[must_use]
    pub fn flush_policy(&self) -> FlushPolicy {
        self.flush.policy()
    }

    /// End of readable data: the high-water mark when writing, the capacity when reading.
    fn logical_end(&self) -> u64 {
        match self.cursors {
            Cursors::Read { .. } => self.capacity(),
            Cursors::Write { high_water, .. } => high_water.min(self.capacity()),
        }
    }

    fn set_read_position(&mut self, pos: u64) {
        match &mut self.cursors {
            Cursors::Read { get } | Cursors::Write { get, .. } => *get = pos,
        }
    }

    /// Reposition the targeted cursor(s).
    ///
    /// `End` counts back from the end of logical data (see [`SeekOrigin`]).
    /// With [`CursorTarget::Both`] both cursors are validated before either
    /// moves; on a read mode stream only the read cursor moves.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::InvalidMode` when targeting only the write cursor of a read stream.
    /// Returns `MmapStreamError::SeekOutOfRange` when the target is negative or beyond the capacity.
    pub fn seek(&mut self, origin: SeekOrigin, delta: i64, target: CursorTarget) -> Result<u64> {
        let base = match origin {
            SeekOrigin::Start => 0,
            SeekOrigin::Current => match self.cursors {
                Cursors::Read { get } => get,
                Cursors::Write { get, put, .. } => {
                    if target.includes_read() {
                        get
                    } else {
                        put
                    }
                }
            },
            SeekOrigin::End => self.logical_end(),
        };
        let absolute = match origin {
            SeekOrigin::End => i128::from(base) - i128::from(delta),
            SeekOrigin::Start | SeekOrigin::Current => i128::from(base) + i128::from(delta),
        };
        self.reposition(absolute, target)
    }

    fn reposition(&mut self, absolute: i128, target: CursorTarget) -> Result<u64> {
        if matches!(self.cursors, Cursors::Read { .. }) && target == CursorTarget::Write {
            return Err(MmapStreamError::InvalidMode("read-only stream has no write cursor"));
        }
        let bound = self.capacity();
        let pos = u64::try_from(absolute)
            .ok()
            .filter(|pos| *pos <= bound)
            .ok_or(MmapStreamError::SeekOutOfRange { offset: absolute, bound })?;

        match &mut self.cursors {
            Cursors::Read { get } => *get = pos,
            Cursors::Write { get, put, .. } => {
                if target.includes_read() {
                    *get = pos;
                }
                if target.includes_write() {
                    *put = pos;
                }
            }
        }
        trace!("seek {target:?} to {pos} in {}", self.region.path().display());
        Ok(pos)
    }

    /// Make sure `additional` bytes fit at the write cursor, remapping if needed.
    /// On failure nothing changes.
    fn reserve(&mut self, additional: u64) -> Result<u64> {
        let Cursors::Write { put, .. } = self.cursors else {
            return Err(MmapStreamError::InvalidMode("cannot write to a read-only stream"));
        };
        let capacity = self.capacity();
        let growth_failed = |requested: u64, reason: String| MmapStreamError::GrowthFailed {
            requested,
            capacity,
            reason,
        };

        let required = put
            .checked_add(additional)
            .ok_or_else(|| growth_failed(u64::MAX, "write position overflows u64".into()))?;
        if required <= capacity {
            return Ok(put);
        }

        let target = grow_target(capacity, required, self.growth_factor, page_size_u64())
            .ok_or_else(|| growth_failed(required, "exceeds maximum mappable size".into()))?;
        self.region
            .resize(target)
            .map_err(|e| growth_failed(target, e.to_string()))?;
        debug!(
            "grew {} from {capacity} to {target} bytes for write of {additional} at {put}",
            self.region.path().display()
        );
        #[cfg(feature = "advise")]
        self.apply_advice();
        Ok(put)
    }

    /// Advance the write cursor past `len` committed bytes and run the flush policy.
    fn commit(&mut self, len: usize) {
        if let Cursors::Write { put, high_water, .. } = &mut self.cursors {
            *put += len as u64;
            *high_water = (*high_water).max(*put);
        }
        if self.flush.record(len) {
            self.flush.reset();
            if let Err(e) = self.sync_written() {
                warn!("policy flush of {} failed: {e}", self.region.path().display());
                self.deferred_flush_error.get_or_insert(e);
            }
        }
    }

    /// Persist the written prefix of the mapping. Nothing past the high-water mark is data.
    fn sync_written(&self) -> Result<()> {
        self.region.flush_range(0, self.logical_end())
    }

    /// Write all of `data` at the write cursor, growing the mapping if needed.
    ///
    /// Returns `data.len()`. An empty write succeeds without growing.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::InvalidMode` on a read mode stream.
    /// Returns `MmapStreamError::GrowthFailed` if the mapping could not grow;
    /// no bytes are written and the cursors are unchanged.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return match self.cursors {
                Cursors::Read { .. } => Err(MmapStreamError::InvalidMode("cannot write to a read-only stream")),
                Cursors::Write { .. } => Ok(0),
            };
        }
        let put = self.reserve(data.len() as u64)?;
        self.region.update_region(put, data)?;
        self.commit(data.len());
        Ok(data.len())
    }

    /// Write one byte at the write cursor, growing the mapping if it is full.
    ///
    /// # Errors
    ///
    /// Same as [`write_bytes`](Self::write_bytes).
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        let put = self.reserve(1)?;
        self.region.write_byte(put, byte)?;
        self.commit(1);
        Ok(())
    }

    /// Copy bytes from the read cursor into `buf`, stopping at the end of data.
    ///
    /// Returns the number of bytes copied; 0 means end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error only if the region rejects the access, which happens when
    /// another handle shrank it underneath this stream.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let get = self.read_position();
        let remaining = self.logical_end().saturating_sub(get);
        #[allow(clippy::cast_possible_truncation)]
        let count = buf.len().min(remaining.min(usize::MAX as u64) as usize);
        if count == 0 {
            return Ok(0);
        }
        self.region.read_into(get, &mut buf[..count])?;
        self.set_read_position(get + count as u64);
        Ok(count)
    }

    /// The byte at the read cursor without consuming it, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Same as [`read_bytes`](Self::read_bytes).
    pub fn peek_byte(&self) -> Result<Option<u8>> {
        let get = self.read_position();
        if get >= self.logical_end() {
            return Ok(None);
        }
        self.region.read_byte(get).map(Some)
    }

    /// Consume and return the byte at the read cursor, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Same as [`read_bytes`](Self::read_bytes).
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.peek_byte()?;
        if byte.is_some() {
            self.set_read_position(self.read_position() + 1);
        }
        Ok(byte)
    }

    /// Step the read cursor back one byte, making `byte` the next byte read.
    ///
    /// If `byte` differs from the byte already there, the mapped byte is
    /// overwritten. Returns `None` when the read cursor is at offset 0. When the
    /// cursor sits past the end of data the previous position holds no data, so
    /// the cursor steps back without writing and `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::InvalidMode` when a differing byte is pushed
    /// back onto a read mode stream.
    pub fn push_back(&mut self, byte: u8) -> Result<Option<u8>> {
        let get = self.read_position();
        if get == 0 {
            return Ok(None);
        }
        let prev = get - 1;
        if prev >= self.logical_end() {
            self.set_read_position(prev);
            return Ok(None);
        }
        if self.region.read_byte(prev)? != byte {
            if matches!(self.cursors, Cursors::Read { .. }) {
                return Err(MmapStreamError::InvalidMode("cannot overwrite a read-only stream"));
            }
            self.region.write_byte(prev, byte)?;
        }
        self.set_read_position(prev);
        Ok(Some(byte))
    }

    /// Bytes between the read cursor and the end of data.
    #[must_use]
    pub fn available(&self) -> u64 {
        self.logical_end().saturating_sub(self.read_position())
    }

    /// Ask the OS to persist the written bytes. A no-op for read mode streams.
    ///
    /// The sync always runs; an earlier policy-flush failure is reported after it.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::FlushFailed` if an earlier policy-triggered
    /// flush failed, or else if this flush failed.
    pub fn flush(&mut self) -> Result<()> {
        if matches!(self.cursors, Cursors::Read { .. }) {
            return Ok(());
        }
        self.flush.reset();
        let synced = self.sync_written();
        match self.deferred_flush_error.take() {
            Some(e) => Err(e),
            None => synced,
        }
    }

    /// Close the stream. A write mode stream truncates its file to the high-water mark.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::TruncateFailed` if truncation failed, or a
    /// deferred `FlushFailed` from a policy flush nobody observed yet.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.finished, true) {
            return Ok(());
        }
        let Cursors::Write { high_water, .. } = self.cursors else {
            return Ok(());
        };
        self.region
            .truncate(high_water)
            .map_err(|e| MmapStreamError::TruncateFailed {
                length: high_water,
                reason: e.to_string(),
            })?;
        debug!("closed {} at {high_water} bytes", self.region.path().display());
        self.deferred_flush_error.take().map_or(Ok(()), Err)
    }

    #[cfg(test)]
    pub(crate) fn defer_flush_error(&mut self, err: MmapStreamError) {
        self.deferred_flush_error = Some(err);
    }

    #[cfg(feature = "advise")]
    fn apply_advice(&self) {
        if let Some(advice) = self.advice {
            if let Err(e) = self.region.advise(0, self.region.len(), advice) {
                warn!("ignoring {advice:?} advice for {}: {e}", self.region.path().display());
            }
        }
    }
}

impl Drop for MmapStream {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            error!("closing {} on drop: {e}", self.region.path().display());
        }
    }
}

impl StreamBuf for MmapStream {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        MmapStream::read_bytes(self, buf)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        MmapStream::write_bytes(self, data)
    }

    fn seek(&mut self, origin: SeekOrigin, delta: i64, target: CursorTarget) -> Result<u64> {
        MmapStream::seek(self, origin, delta, target)
    }

    fn flush(&mut self) -> Result<()> {
        MmapStream::flush(self)
    }

    fn close(self) -> Result<()> {
        MmapStream::close(self)
    }
}

impl io::Read for MmapStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl io::Write for MmapStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bytes(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(MmapStream::flush(self)?)
    }
}

/// Standard seeking moves both cursors and counts `SeekFrom::End` forward from
/// the end of data, as `std` does.
impl io::Seek for MmapStream {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let absolute = match pos {
            io::SeekFrom::Start(n) => i128::from(n),
            io::SeekFrom::Current(d) => i128::from(self.read_position()) + i128::from(d),
            io::SeekFrom::End(d) => i128::from(self.logical_end()) + i128::from(d),
        };
        Ok(self.reposition(absolute, CursorTarget::Both)?)
    }
}
