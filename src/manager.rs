//! High-level API for opening streams by path.
//!
//! Provides convenience functions that wrap [`StreamOptions`] with defaults.

use std::fs;
use std::path::Path;

use crate::errors::Result;
use crate::options::StreamOptions;
use crate::stream::MmapStream;

/// Create (or truncate) a file and open a write stream over it.
///
/// # Errors
///
/// Returns errors from `MemoryMappedFile::create_rw`.
pub fn create_stream<P: AsRef<Path>>(path: P) -> Result<MmapStream> {
    StreamOptions::new().create(path)
}

/// Open an existing file as a read stream.
///
/// # Errors
///
/// Returns errors from `MemoryMappedFile::open_ro`.
pub fn open_read_stream<P: AsRef<Path>>(path: P) -> Result<MmapStream> {
    StreamOptions::new().open_read(path)
}

/// Open an existing, non-empty file as a write stream.
///
/// # Errors
///
/// Returns errors from `MemoryMappedFile::open_rw`.
pub fn open_write_stream<P: AsRef<Path>>(path: P) -> Result<MmapStream> {
    StreamOptions::new().open_write(path)
}

/// Copy a stream's backing file to a new destination using the filesystem.
/// Close the stream first, or the copy includes unused capacity.
///
/// # Errors
///
/// Returns `MmapStreamError::Io` if the copy operation fails.
pub fn copy_stream_file<P: AsRef<Path>>(src: P, dst: P) -> Result<()> {
    fs::copy(src, dst)?;
    Ok(())
}

/// Delete the file backing a stream. Drop or close the stream before invoking this.
///
/// # Errors
///
/// Returns `MmapStreamError::Io` if the delete operation fails.
pub fn delete_stream_file<P: AsRef<Path>>(path: P) -> Result<()> {
    fs::remove_file(path)?;
    Ok(())
}

#[cfg(feature = "async")]
pub mod r#async {
    //! Async helpers (Tokio) that keep blocking file and mapping work off the runtime threads.
    use std::io;
    use std::path::Path;

    use tokio::fs as tfs;

    use crate::errors::{MmapStreamError, Result};
    use crate::options::StreamOptions;
    use crate::stream::MmapStream;

    /// Create the file asynchronously with `options`' initial capacity, then open a write stream.
    ///
    /// # Errors
    ///
    /// Returns errors from async file operations or mapping.
    pub async fn create_stream_async<P: AsRef<Path>>(path: P, options: StreamOptions) -> Result<MmapStream> {
        let path_ref = path.as_ref();
        let file = tfs::OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(path_ref)
            .await?;
        file.set_len(options.effective_initial_capacity()).await?;
        drop(file);
        options.open_write(path_ref)
    }

    /// Close a stream on the blocking pool, since truncation may wait on the disk.
    ///
    /// # Errors
    ///
    /// Returns errors from `MmapStream::close`, or `MmapStreamError::Io` if the
    /// blocking task could not complete.
    pub async fn close_async(stream: MmapStream) -> Result<()> {
        tokio::task::spawn_blocking(move || stream.close())
            .await
            .map_err(|e| MmapStreamError::Io(io::Error::new(io::ErrorKind::Other, e)))?
    }

    /// Flush a stream on the blocking pool and hand it back with the flush result.
    ///
    /// The stream comes back even when the flush fails, so the caller still
    /// decides when to close it.
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::Io` if the blocking task could not complete;
    /// the stream is lost in that case.
    pub async fn flush_async(mut stream: MmapStream) -> Result<(MmapStream, Result<()>)> {
        tokio::task::spawn_blocking(move || {
            let flushed = stream.flush();
            (stream, flushed)
        })
        .await
        .map_err(|e| MmapStreamError::Io(io::Error::new(io::ErrorKind::Other, e)))
    }

}
