//! Fast WebM metadata probing over random-access sources.
//!
//! ```no_run
//! # async fn run() -> webm_probe::Result<()> {
//! use webm_probe::reader::FileReader;
//!
//! let reader = FileReader::open("recording.webm").await?;
//! let meta = webm_probe::parse_webm(&reader).await?;
//! println!("{:?} ms, {}", meta.duration_milli_seconds, meta.mime_type);
//! # Ok(())
//! # }
//! ```

pub mod axum_range;
pub mod ebml;
pub mod error;
pub mod reader;
pub mod serve;
pub mod synth;
pub mod webm;

pub use error::{Result, WebmError};
pub use reader::{FileReader, HttpReader, MemoryReader, Reader};
pub use webm::{parse_webm, parse_webm_bytes, parse_webm_with, ScanOptions, WebmMeta};
