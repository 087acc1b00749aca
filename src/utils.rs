//! Page size, alignment, and range helpers shared by the mapping and the stream.

use std::sync::OnceLock;

use crate::errors::{MmapStreamError, Result};

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// Get the system page size in bytes. Queried once per process.
#[must_use]
pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(|| {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "windows")] {
                windows_page_size()
            } else {
                unix_page_size()
            }
        }
    })
}

#[cfg(target_os = "windows")]
fn windows_page_size() -> usize {
    use std::mem::MaybeUninit;
    #[allow(non_snake_case)]
    #[repr(C)]
    struct SYSTEM_INFO {
        wProcessorArchitecture: u16,
        wReserved: u16,
        dwPageSize: u32,
        lpMinimumApplicationAddress: *mut core::ffi::c_void,
        lpMaximumApplicationAddress: *mut core::ffi::c_void,
        dwActiveProcessorMask: usize,
        dwNumberOfProcessors: u32,
        dwProcessorType: u32,
        dwAllocationGranularity: u32,
        wProcessorLevel: u16,
        wProcessorRevision: u16,
    }
    extern "system" {
        fn GetSystemInfo(lpSystemInfo: *mut SYSTEM_INFO);
    }
    let mut sysinfo = MaybeUninit::<SYSTEM_INFO>::uninit();
    // SAFETY: GetSystemInfo fully initializes the struct it is handed.
    unsafe {
        GetSystemInfo(sysinfo.as_mut_ptr());
        sysinfo.assume_init().dwPageSize as usize
    }
}

#[cfg(not(target_os = "windows"))]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unix_page_size() -> usize {
    // SAFETY: sysconf with _SC_PAGESIZE is safe to call.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if raw <= 0 {
        4096
    } else {
        raw as usize
    }
}

/// Page size as `u64`, the unit every capacity computation is done in.
#[must_use]
pub fn page_size_u64() -> u64 {
    page_size() as u64
}

/// Align a value up to the nearest multiple of `alignment`.
///
/// Saturates instead of wrapping; callers that must not exceed `u64::MAX`
/// use [`checked_align_up`].
#[must_use]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    checked_align_up(value, alignment).unwrap_or(u64::MAX)
}

/// Align a value up to the nearest multiple of `alignment`, or `None` on overflow.
#[must_use]
pub fn checked_align_up(value: u64, alignment: u64) -> Option<u64> {
    if alignment == 0 {
        return Some(value);
    }
    // Fast path for power-of-2 alignments (common case for page sizes)
    if alignment.is_power_of_two() {
        let mask = alignment - 1;
        value.checked_add(mask).map(|v| v & !mask)
    } else {
        value.div_ceil(alignment).checked_mul(alignment)
    }
}

/// Ensure the requested [offset, offset+len) range is within [0, total).
///
/// # Errors
///
/// Returns `MmapStreamError::OutOfBounds` if the range exceeds bounds.
pub fn ensure_in_bounds(offset: u64, len: u64, total: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if offset <= total && end <= total => Ok(()),
        _ => Err(MmapStreamError::OutOfBounds { offset, len, total }),
    }
}

/// Compute a byte slice range for a given total length, returning start..end as a usize tuple.
///
/// # Errors
///
/// Returns `MmapStreamError::OutOfBounds` if the requested range exceeds the total length.
#[allow(clippy::cast_possible_truncation)]
pub fn slice_range(offset: u64, len: u64, total: u64) -> Result<(usize, usize)> {
    ensure_in_bounds(offset, len, total)?;
    // The mapping holding `total` bytes lives in memory, so both ends fit in usize.
    Ok((offset as usize, (offset + len) as usize))
}
