//! # mmap-stream: growable streams over memory-mapped files
//!
//! This crate turns a memory-mapped file into a seekable read/write stream
//! whose capacity grows as data is written, and whose file is cut back to the
//! bytes actually written when the stream is closed.
//!
//! ## Features
//!
//! - **Split cursors**: independent read (get) and write (put) positions
//! - **Transparent growth**: page-aligned, geometric remapping when a write overruns the mapping
//! - **Exact file length**: truncate-on-close to the high-water mark, not the mapped capacity
//! - **Remap safety**: cursors are offsets; the mapping address never leaves the region
//! - **std interop**: `Read`, `Write` and `Seek` implementations
//!
//! ## Quick Start
//!
//! ```no_run
//! use mmap_stream::{create_stream, open_read_stream};
//! use std::io::{Read, Write};
//!
//! let mut out = create_stream("data.bin")?;
//! out.write_all(&[7u8; 5000])?; // grows past the first page
//! out.close()?;                 // file is now exactly 5000 bytes
//!
//! let mut input = open_read_stream("data.bin")?;
//! let mut bytes = Vec::new();
//! input.read_to_end(&mut bytes)?;
//! assert_eq!(bytes.len(), 5000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`errors`]: Error types for all stream and mapping operations
//! - [`utils`]: Page size and alignment helpers
//! - [`mmap`]: The `MemoryMappedFile` region streams are built on
//! - [`streambuf`]: The `StreamBuf` trait and seek vocabulary
//! - [`stream`]: The growable `MmapStream`
//! - [`options`]: Builder-style stream configuration
//! - [`flush`]: Implicit flush policies
//! - [`manager`]: Path-based convenience functions
//!
//! ## Feature Flags
//!
//! - `advise` (default): access-pattern hints applied to stream mappings
//! - `async`: Tokio helpers for creating and closing streams off the runtime threads

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(missing_docs)]

pub mod errors;
pub mod utils;
pub mod mmap;
pub mod streambuf;
pub mod stream;
pub mod options;
pub mod flush;
pub mod manager;
#[cfg(feature = "advise")]
pub mod advise;

pub use errors::{MmapStreamError, Result};
pub use flush::FlushPolicy;
pub use mmap::{MemoryMappedFile, MmapMode};
pub use options::StreamOptions;
pub use stream::MmapStream;
pub use streambuf::{CursorTarget, SeekOrigin, StreamBuf};
#[cfg(feature = "advise")]
pub use advise::MmapAdvice;
pub use manager::{
    copy_stream_file, create_stream, delete_stream_file, open_read_stream, open_write_stream,
};
