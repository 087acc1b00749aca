//! Builder-style configuration for [`MmapStream`].

use std::path::Path;

#[cfg(feature = "advise")]
use crate::advise::MmapAdvice;
use crate::errors::Result;
use crate::flush::FlushPolicy;
use crate::mmap::MemoryMappedFile;
use crate::stream::MmapStream;
use crate::utils::{align_up, page_size_u64};

/// Default multiplier applied to the capacity when a write overruns it.
pub const DEFAULT_GROWTH_FACTOR: u64 = 2;

/// Options for opening or wrapping a stream.
///
/// # Examples
///
/// ```no_run
/// use mmap_stream::{FlushPolicy, MmapStream};
///
/// let stream = MmapStream::builder()
///     .initial_capacity(64 * 1024)
///     .growth_factor(4)
///     .flush_policy(FlushPolicy::EveryBytes(1 << 20))
///     .create("out.bin")?;
/// assert_eq!(stream.capacity(), 64 * 1024);
/// # Ok::<(), mmap_stream::MmapStreamError>(())
/// ```
#[derive(Debug, Clone)]
pub struct StreamOptions {
    initial_capacity: u64,
    growth_factor: u64,
    flush_policy: FlushPolicy,
    #[cfg(feature = "advise")]
    advice: Option<MmapAdvice>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            initial_capacity: page_size_u64(),
            growth_factor: DEFAULT_GROWTH_FACTOR,
            flush_policy: FlushPolicy::default(),
            #[cfg(feature = "advise")]
            advice: None,
        }
    }
}

impl StreamOptions {
    /// Options with one page of initial capacity, doubling growth and no implicit flushing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity of a newly created file. Rounded up to whole pages, at least one.
    #[must_use]
    pub fn initial_capacity(mut self, bytes: u64) -> Self {
        self.initial_capacity = bytes;
        self
    }

    /// Capacity multiplier used when a write does not fit. Values below 2 are raised to 2.
    #[must_use]
    pub fn growth_factor(mut self, factor: u64) -> Self {
        self.growth_factor = factor.max(DEFAULT_GROWTH_FACTOR);
        self
    }

    /// When written bytes are flushed without an explicit `flush()`.
    #[must_use]
    pub fn flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    /// Access-pattern hint applied to the mapping now and after every growth.
    #[cfg(feature = "advise")]
    #[must_use]
    pub fn advice(mut self, advice: MmapAdvice) -> Self {
        self.advice = Some(advice);
        self
    }

    pub(crate) fn growth_factor_value(&self) -> u64 {
        self.growth_factor
    }

    pub(crate) fn flush_policy_value(&self) -> FlushPolicy {
        self.flush_policy
    }

    #[cfg(feature = "advise")]
    pub(crate) fn advice_value(&self) -> Option<MmapAdvice> {
        self.advice
    }

    /// Capacity `create` maps: whole pages, at least one.
    #[must_use]
    pub fn effective_initial_capacity(&self) -> u64 {
        let page = page_size_u64();
        align_up(self.initial_capacity.max(1), page)
    }

    /// Create (or truncate) `path` and open a write stream over it.
    ///
    /// # Errors
    ///
    /// Returns errors from `MemoryMappedFile::create_rw`.
    pub fn create<P: AsRef<Path>>(&self, path: P) -> Result<MmapStream> {
        let region = MemoryMappedFile::create_rw(path, self.effective_initial_capacity())?;
        Ok(self.wrap(region))
    }

    /// Open an existing, non-empty file as a write stream.
    ///
    /// Existing bytes are readable only after being written again: the
    /// high-water mark starts at 0, and closing truncates to it.
    ///
    /// # Errors
    ///
    /// Returns errors from `MemoryMappedFile::open_rw`.
    pub fn open_write<P: AsRef<Path>>(&self, path: P) -> Result<MmapStream> {
        Ok(self.wrap(MemoryMappedFile::open_rw(path)?))
    }

    /// Open an existing file as a read stream.
    ///
    /// # Errors
    ///
    /// Returns errors from `MemoryMappedFile::open_ro`.
    pub fn open_read<P: AsRef<Path>>(&self, path: P) -> Result<MmapStream> {
        Ok(self.wrap(MemoryMappedFile::open_ro(path)?))
    }

    /// Build a stream over an existing region, exclusive or shared.
    #[must_use]
    pub fn wrap(&self, region: MemoryMappedFile) -> MmapStream {
        MmapStream::with_options(region, self)
    }
}
