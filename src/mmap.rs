//! Memory-mapped file region backing a stream.
//!
//! [`MemoryMappedFile`] owns the file handle and the `memmap2` mapping. It never
//! hands out the mapping's base address: every access takes the lock, resolves
//! the current mapping, and copies in or out. A remap therefore cannot leave a
//! caller, or another clone of the handle, holding a stale address.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    sync::Arc,
};

use memmap2::{Mmap, MmapMut};
use parking_lot::RwLock;

use crate::errors::{MmapStreamError, Result};
use crate::utils::slice_range;

// Error message constants
const ERR_ZERO_SIZE: &str = "Size must be greater than zero";
const ERR_ZERO_LENGTH_FILE: &str = "Cannot map zero-length file";
const ERR_TOO_LARGE: &str = "Requested size exceeds maximum safe limit";

/// Largest mapping we agree to create: a Rust slice cannot exceed `isize::MAX` bytes.
pub(crate) const MAX_MMAP_SIZE: u64 = isize::MAX as u64;

/// Access mode for a memory-mapped file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmapMode {
    /// Read-only mapping.
    ReadOnly,
    /// Read-write mapping.
    ReadWrite,
}

struct Inner {
    path: PathBuf,
    file: File,
    mode: MmapMode,
    // Cached length to avoid repeated metadata queries
    cached_len: RwLock<u64>,
    map: MapVariant,
}

enum MapVariant {
    Ro(Mmap),
    Rw(RwLock<MmapMut>),
}

/// Memory-mapped file with bounds-checked, lock-protected region access.
///
/// This is the region a [`MmapStream`](crate::MmapStream) grows and truncates.
/// Cloning is cheap and shares the same mapping; a resize through one clone is
/// observed by all of them.
///
/// # Examples
///
/// ```no_run
/// use mmap_stream::{MemoryMappedFile, MmapMode};
///
/// let mmap = MemoryMappedFile::create_rw("data.bin", 4096)?;
/// mmap.update_region(0, b"Hello, world!")?;
/// mmap.resize(8192)?;
/// mmap.truncate(13)?;
///
/// let ro = MemoryMappedFile::open_ro("data.bin")?;
/// assert_eq!(ro.as_slice(0, 13)?, b"Hello, world!");
/// assert_eq!(ro.mode(), MmapMode::ReadOnly);
/// # Ok::<(), mmap_stream::MmapStreamError>(())
/// ```
#[derive(Clone)]
pub struct MemoryMappedFile {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryMappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMappedFile")
            .field("path", &self.inner.path)
            .field("mode", &self.inner.mode)
            .field("len", &self.len())
            .finish()
    }
}

fn check_size(size: u64) -> Result<()> {
    if size == 0 {
        return Err(MmapStreamError::ResizeFailed(ERR_ZERO_SIZE.into()));
    }
    if size > MAX_MMAP_SIZE {
        return Err(MmapStreamError::ResizeFailed(format!("{ERR_TOO_LARGE}: {size}")));
    }
    Ok(())
}

impl MemoryMappedFile {
    /// Create a new file (truncating if exists) and memory-map it in read-write mode with the given size.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::ResizeFailed` if size is zero or too large.
    /// Returns `MmapStreamError::Io` if file creation or mapping fails.
    pub fn create_rw<P: AsRef<Path>>(path: P, size: u64) -> Result<Self> {
        check_size(size)?;
        let path_ref = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(path_ref)?;
        file.set_len(size)?;
        // SAFETY: The file has been created with the correct size and permissions.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self::from_parts(path_ref, file, MmapMode::ReadWrite, size, MapVariant::Rw(RwLock::new(mmap))))
    }

    /// Open an existing file and memory-map it read-only.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::Io` if file opening or mapping fails.
    pub fn open_ro<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = OpenOptions::new().read(true).open(path_ref)?;
        let len = file.metadata()?.len();
        // SAFETY: The file is opened read-only and memmap2 ensures safe mapping.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self::from_parts(path_ref, file, MmapMode::ReadOnly, len, MapVariant::Ro(mmap)))
    }

    /// Open an existing file and memory-map it read-write.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::ResizeFailed` if file is zero-length.
    /// Returns `MmapStreamError::Io` if file opening or mapping fails.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path_ref)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(MmapStreamError::ResizeFailed(ERR_ZERO_LENGTH_FILE.into()));
        }
        // SAFETY: The file is opened read-write and is not zero-length.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self::from_parts(path_ref, file, MmapMode::ReadWrite, len, MapVariant::Rw(RwLock::new(mmap))))
    }

    fn from_parts(path: &Path, file: File, mode: MmapMode, len: u64, map: MapVariant) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.to_path_buf(),
                file,
                mode,
                cached_len: RwLock::new(len),
                map,
            }),
        }
    }

    /// Return current mapping mode.
    #[must_use]
    pub fn mode(&self) -> MmapMode {
        self.inner.mode
    }

    /// Mapped capacity in bytes (cached).
    #[must_use]
    pub fn len(&self) -> u64 {
        *self.inner.cached_len.read()
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Number of handles currently sharing this mapping.
    #[must_use]
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Get a zero-copy read-only slice for the given [offset, offset+len).
    /// RW mappings can be remapped at any time, so they only support copying reads.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::OutOfBounds` if range exceeds file bounds.
    /// Returns `MmapStreamError::InvalidMode` for RW mappings (use `read_into` instead).
    pub fn as_slice(&self, offset: u64, len: u64) -> Result<&[u8]> {
        match &self.inner.map {
            MapVariant::Ro(m) => {
                let (start, end) = slice_range(offset, len, self.len())?;
                Ok(&m[start..end])
            }
            MapVariant::Rw(_) => Err(MmapStreamError::InvalidMode("use read_into for RW mappings")),
        }
    }

    /// Read bytes from the mapping into the provided buffer starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::OutOfBounds` if range exceeds file bounds.
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        match &self.inner.map {
            MapVariant::Ro(m) => {
                let (start, end) = slice_range(offset, buf.len() as u64, self.len())?;
                buf.copy_from_slice(&m[start..end]);
            }
            MapVariant::Rw(lock) => {
                let guard = lock.read();
                let (start, end) = slice_range(offset, buf.len() as u64, self.len())?;
                buf.copy_from_slice(&guard[start..end]);
            }
        }
        Ok(())
    }

    /// Read the single byte at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::OutOfBounds` if `offset` is not below the mapped length.
    pub fn read_byte(&self, offset: u64) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_into(offset, &mut byte)?;
        Ok(byte[0])
    }

    /// Copy the provided bytes into the mapped file at the given offset.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::InvalidMode` if not in `ReadWrite` mode.
    /// Returns `MmapStreamError::OutOfBounds` if range exceeds file bounds.
    pub fn update_region(&self, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        match &self.inner.map {
            MapVariant::Ro(_) => Err(MmapStreamError::InvalidMode("Cannot write to read-only mapping.")),
            MapVariant::Rw(lock) => {
                let mut guard = lock.write();
                let (start, end) = slice_range(offset, data.len() as u64, self.len())?;
                guard[start..end].copy_from_slice(data);
                Ok(())
            }
        }
    }

    /// Overwrite the single byte at `offset`.
    ///
    /// # Errors
    ///
    /// Same as [`update_region`](Self::update_region).
    pub fn write_byte(&self, offset: u64, byte: u8) -> Result<()> {
        self.update_region(offset, &[byte])
    }

    /// Flush changes to disk. For read-only mappings, this is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::FlushFailed` if flush operation fails.
    pub fn flush(&self) -> Result<()> {
        match &self.inner.map {
            MapVariant::Ro(_) => Ok(()),
            MapVariant::Rw(lock) => lock
                .read()
                .flush()
                .map_err(|e| MmapStreamError::FlushFailed(e.to_string())),
        }
    }

    /// Flush a specific byte range to disk.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::OutOfBounds` if range exceeds file bounds.
    /// Returns `MmapStreamError::FlushFailed` if flush operation fails.
    pub fn flush_range(&self, offset: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        match &self.inner.map {
            MapVariant::Ro(_) => Ok(()),
            MapVariant::Rw(lock) => {
                let guard = lock.read();
                let (start, end) = slice_range(offset, len, self.len())?;
                guard
                    .flush_range(start, end - start)
                    .map_err(|e| MmapStreamError::FlushFailed(e.to_string()))
            }
        }
    }

    /// Run `f` with the mapping's current base address and length while the
    /// mapping is locked against remaps. The address must not escape `f`.
    #[cfg_attr(not(feature = "advise"), allow(dead_code))]
    pub(crate) fn with_base_ptr<R>(&self, f: impl FnOnce(*const u8, u64) -> R) -> R {
        match &self.inner.map {
            MapVariant::Ro(m) => f(m.as_ptr(), self.len()),
            MapVariant::Rw(lock) => {
                let guard = lock.read();
                f(guard.as_ptr(), self.len())
            }
        }
    }

    /// Resize (grow or shrink) the mapped file (RW only). This remaps the file internally
    /// and may move the mapping to a new address.
    ///
    /// If establishing the new mapping fails, the file length is restored and the
    /// region is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::InvalidMode` if not in `ReadWrite` mode.
    /// Returns `MmapStreamError::ResizeFailed` if new size is zero or too large.
    /// Returns `MmapStreamError::Io` if resize operation fails.
    pub fn resize(&self, new_size: u64) -> Result<()> {
        let MapVariant::Rw(lock) = &self.inner.map else {
            return Err(MmapStreamError::InvalidMode("Resize requires ReadWrite mode."));
        };
        check_size(new_size)?;

        let mut guard = lock.write();
        let current = self.len();
        if new_size == current {
            return Ok(());
        }

        // Streams only grow through here; shrinking is for direct callers. Windows
        // refuses to shrink a file with a mapped view, so shrink virtually there.
        #[cfg(windows)]
        {
            if new_size < current {
                *self.inner.cached_len.write() = new_size;
                return Ok(());
            }
        }

        self.inner.file.set_len(new_size)?;
        // SAFETY: the file now has `new_size` bytes and we hold the write lock, so
        // no reader can observe the old mapping while it is replaced.
        match unsafe { MmapMut::map_mut(&self.inner.file) } {
            Ok(new_map) => {
                *guard = new_map;
                *self.inner.cached_len.write() = new_size;
                Ok(())
            }
            Err(e) => {
                // Keep file length and mapping in agreement.
                let _ = self.inner.file.set_len(current);
                Err(MmapStreamError::Io(e))
            }
        }
    }

    /// Set the backing file's length to exactly `length` bytes (RW only).
    ///
    /// Unlike [`resize`](Self::resize), zero is allowed and the change is never
    /// virtual: the mapping is detached before the file length changes and
    /// re-established afterwards when `length` is non-zero.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::InvalidMode` if not in `ReadWrite` mode.
    /// Returns `MmapStreamError::Io` if changing the length or remapping fails.
    pub fn truncate(&self, length: u64) -> Result<()> {
        let MapVariant::Rw(lock) = &self.inner.map else {
            return Err(MmapStreamError::InvalidMode("Truncate requires ReadWrite mode."));
        };
        if length > MAX_MMAP_SIZE {
            return Err(MmapStreamError::ResizeFailed(format!("{ERR_TOO_LARGE}: {length}")));
        }

        let mut guard = lock.write();
        let current = self.len();

        // Dirty pages of a shared mapping live in the page cache, so dropping the
        // view loses nothing. The placeholder is never read: cached_len is 0 while it is installed.
        let placeholder = MmapMut::map_anon(1)?;
        drop(std::mem::replace(&mut *guard, placeholder));
        *self.inner.cached_len.write() = 0;

        let resized = self.inner.file.set_len(length);
        let target = if resized.is_ok() { length } else { current };
        if target > 0 {
            // SAFETY: the file holds `target` bytes and the write lock is held.
            *guard = unsafe { MmapMut::map_mut(&self.inner.file)? };
            *self.inner.cached_len.write() = target;
        }
        resized.map_err(MmapStreamError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_preserves_prefix_and_updates_len() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("resize.bin");
        let mmap = MemoryMappedFile::create_rw(&path, 1024).expect("create");
        mmap.update_region(0, b"prefix").expect("write");

        mmap.resize(10_000).expect("grow");
        assert_eq!(mmap.len(), 10_000);
        let mut buf = [0u8; 6];
        mmap.read_into(0, &mut buf).expect("read");
        assert_eq!(&buf, b"prefix");
        assert_eq!(std::fs::metadata(&path).expect("meta").len(), 10_000);
    }

    #[test]
    fn truncate_sets_exact_file_length() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("truncate.bin");
        let mmap = MemoryMappedFile::create_rw(&path, 8192).expect("create");
        mmap.update_region(0, b"0123456789").expect("write");

        mmap.truncate(10).expect("truncate");
        assert_eq!(mmap.len(), 10);
        assert_eq!(std::fs::metadata(&path).expect("meta").len(), 10);
        assert_eq!(mmap.read_byte(9).expect("byte"), b'9');
        assert!(mmap.read_byte(10).is_err());
    }

    #[test]
    fn truncate_to_zero_leaves_empty_region() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.bin");
        let mmap = MemoryMappedFile::create_rw(&path, 4096).expect("create");

        mmap.truncate(0).expect("truncate");
        assert!(mmap.is_empty());
        assert_eq!(std::fs::metadata(&path).expect("meta").len(), 0);
        assert!(mmap.update_region(0, b"x").is_err());
    }

    #[test]
    fn flush_range_checks_bounds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("flush_range.bin");
        let mmap = MemoryMappedFile::create_rw(&path, 8192).expect("create");
        mmap.update_region(5000, b"unaligned").expect("write");

        mmap.flush_range(5000, 9).expect("flush unaligned range");
        mmap.flush_range(8192, 0).expect("empty range at end");
        assert!(matches!(
            mmap.flush_range(8000, 500),
            Err(MmapStreamError::OutOfBounds { offset: 8000, len: 500, total: 8192 })
        ));
    }

    #[test]
    fn resize_can_shrink_for_direct_callers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shrink.bin");
        let mmap = MemoryMappedFile::create_rw(&path, 8192).expect("create");
        mmap.update_region(0, b"kept").expect("write");

        mmap.resize(4096).expect("shrink");
        assert_eq!(mmap.len(), 4096);
        assert!(mmap.read_byte(4096).is_err());
        let mut buf = [0u8; 4];
        mmap.read_into(0, &mut buf).expect("read");
        assert_eq!(&buf, b"kept");
    }

    #[test]
    fn read_only_rejects_mutation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ro.bin");
        std::fs::write(&path, b"abc").expect("seed");
        let ro = MemoryMappedFile::open_ro(&path).expect("open");
        assert!(matches!(ro.resize(10), Err(MmapStreamError::InvalidMode(_))));
        assert!(matches!(ro.truncate(1), Err(MmapStreamError::InvalidMode(_))));
        assert!(matches!(ro.write_byte(0, b'z'), Err(MmapStreamError::InvalidMode(_))));
        assert_eq!(ro.as_slice(0, 3).expect("slice"), b"abc");
    }

    #[test]
    fn oversized_requests_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("huge.bin");
        let mmap = MemoryMappedFile::create_rw(&path, 1024).expect("create");
        match mmap.resize(u64::MAX) {
            Err(MmapStreamError::ResizeFailed(msg)) => assert!(msg.contains("exceeds maximum safe limit")),
            other => panic!("expected ResizeFailed, got {other:?}"),
        }
        assert_eq!(mmap.len(), 1024);
    }

    #[test]
    fn clones_share_one_mapping() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shared.bin");
        let a = MemoryMappedFile::create_rw(&path, 4096).expect("create");
        let b = a.clone();
        assert_eq!(a.share_count(), 2);

        a.resize(3 * 4096).expect("grow");
        assert_eq!(b.len(), 3 * 4096);
        b.update_region(10_000, b"tail").expect("write via clone");
        let mut buf = [0u8; 4];
        a.read_into(10_000, &mut buf).expect("read via original");
        assert_eq!(&buf, b"tail");
    }
}
