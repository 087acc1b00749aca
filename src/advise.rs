//! Memory advise operations for optimizing OS behavior.

use crate::errors::Result;
#[cfg(unix)]
use crate::errors::MmapStreamError;
use crate::mmap::MemoryMappedFile;
use crate::utils::slice_range;

/// Memory access pattern advice for the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmapAdvice {
    /// Normal access pattern (default).
    Normal,
    /// Random access pattern.
    Random,
    /// Sequential access pattern.
    Sequential,
    /// Will need this range soon.
    WillNeed,
    /// Won't need this range soon.
    DontNeed,
}

impl MemoryMappedFile {
    /// Advise the OS about expected access patterns for a memory range.
    ///
    /// The advice is a hint and may be ignored by the OS. It is attached to the
    /// current mapping only; a later [`resize`](Self::resize) discards it.
    ///
    /// # Platform-specific behavior
    ///
    /// - **Unix**: Uses `madvise` system call
    /// - **Other platforms**: no-op
    ///
    /// # Errors
    ///
    /// Returns `MmapStreamError::OutOfBounds` if the range exceeds file bounds.
    /// Returns `MmapStreamError::AdviceFailed` if the system call fails.
    pub fn advise(&self, offset: u64, len: u64, advice: MmapAdvice) -> Result<()> {
        if len == 0 {
            return Ok(());
        }

        self.with_base_ptr(|base, total| {
            let (start, end) = slice_range(offset, len, total)?;

            #[cfg(unix)]
            {
                use libc::{madvise, MADV_DONTNEED, MADV_NORMAL, MADV_RANDOM, MADV_SEQUENTIAL, MADV_WILLNEED};

                let flag = match advice {
                    MmapAdvice::Normal => MADV_NORMAL,
                    MmapAdvice::Random => MADV_RANDOM,
                    MmapAdvice::Sequential => MADV_SEQUENTIAL,
                    MmapAdvice::WillNeed => MADV_WILLNEED,
                    MmapAdvice::DontNeed => MADV_DONTNEED,
                };

                // madvise wants a page-aligned address; widen the range down to the page start.
                let page = crate::utils::page_size();
                let aligned_start = start - start % page;

                // SAFETY: [aligned_start, end) lies inside the mapping, which the
                // caller of with_base_ptr keeps locked for the duration of this call.
                let result = unsafe {
                    madvise(
                        base.add(aligned_start) as *mut libc::c_void,
                        end - aligned_start,
                        flag,
                    )
                };
                if result != 0 {
                    let err = std::io::Error::last_os_error();
                    return Err(MmapStreamError::AdviceFailed(format!("madvise failed: {err}")));
                }
            }

            #[cfg(not(unix))]
            {
                let _ = (base, start, end, advice);
            }

            Ok(())
        })
    }
}
