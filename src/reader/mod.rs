//! Random-access byte sources the scanners read from.
//!
//! The scanners only ever hold a shared reference to a [`Reader`] and await
//! one read at a time, so implementations do not need to support concurrent
//! calls efficiently, only safely.

use std::future::Future;
use std::io;

use bytes::Bytes;

mod file;
mod http;
mod memory;

pub use file::FileReader;
pub use http::HttpReader;
pub use memory::MemoryReader;

pub trait Reader: Send + Sync {
    /// Total length of the source in bytes.
    fn size(&self) -> u64;

    /// Reads `length` bytes starting at `offset`.
    ///
    /// Returns fewer bytes only when the source ends first; reading at or
    /// past the end yields an empty buffer rather than an error.
    fn read(&self, offset: u64, length: usize) -> impl Future<Output = io::Result<Bytes>> + Send;
}

/// Clamps a requested range to a source of `size` bytes.
pub(crate) fn clamp_range(size: u64, offset: u64, length: usize) -> (u64, usize) {
    let start = offset.min(size);
    let available = size - start;
    let length = (length as u64).min(available) as usize;
    (start, length)
}
