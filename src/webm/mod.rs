//! WebM metadata probing.
//!
//! [`parse_webm`] reads the segment header for Info and Tracks, then settles
//! the duration with the first of these that succeeds:
//!
//! 1. `Info.Duration`, when the muxer wrote one;
//! 2. the latest `CueTime` of the Cues index the header points at;
//! 3. the latest Cluster/block timecode found by scanning the file tail.
//!
//! Only the header scan is mandatory. Failing to resolve a duration is not
//! an error: the result just has no `duration_milli_seconds`.

use bytes::Bytes;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::error::Result;
use crate::reader::{MemoryReader, Reader};

pub mod cues;
pub mod element;
pub mod header;
pub mod meta;
pub mod tail;

pub use header::HeaderScanResult;
pub use meta::{AudioSettings, VideoSettings, WebmInfo, WebmMeta, WebmTrack};

pub const DEFAULT_HEADER_SCAN_LIMIT: u64 = 64 * 1024;
pub const DEFAULT_TAIL_WINDOW: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct ScanOptions {
    /// How far into the file the Segment and its header children are looked for.
    #[builder(default = DEFAULT_HEADER_SCAN_LIMIT)]
    pub header_scan_limit: u64,
    /// How many trailing bytes the tail scan searches for clusters.
    #[builder(default = DEFAULT_TAIL_WINDOW)]
    pub tail_window: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Where the reported duration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    Info,
    Cues,
    Tail,
}

pub async fn parse_webm<R: Reader>(reader: &R) -> Result<WebmMeta> {
    parse_webm_with(reader, &ScanOptions::default()).await
}

/// Probes an in-memory buffer.
pub async fn parse_webm_bytes(data: impl Into<Bytes>) -> Result<WebmMeta> {
    parse_webm(&MemoryReader::new(data)).await
}

#[tracing::instrument(skip_all, fields(file_size = reader.size()))]
pub async fn parse_webm_with<R: Reader>(reader: &R, options: &ScanOptions) -> Result<WebmMeta> {
    let header = header::scan_header(reader, options).await?;
    debug!(
        tracks = header.tracks.len(),
        cues_offset = ?header.cues_offset,
        timecode_scale = header.info.timecode_scale,
        "header scanned"
    );

    let duration = resolve_duration(reader, &header, options).await?;
    if let Some((millis, source)) = duration {
        debug!(millis, ?source, "duration resolved");
    } else {
        debug!("no duration found");
    }

    Ok(WebmMeta {
        duration_milli_seconds: duration.map(|(millis, _)| millis),
        file_size: reader.size(),
        mime_type: meta::mime_type(&header.tracks),
        info: header.info,
        tracks: header.tracks,
    })
}

async fn resolve_duration<R: Reader>(
    reader: &R,
    header: &HeaderScanResult,
    options: &ScanOptions,
) -> Result<Option<(f64, DurationSource)>> {
    let scale = header.info.timecode_scale;

    if let Some(millis) = header.info.duration_milli_seconds {
        return Ok(Some((millis, DurationSource::Info)));
    }

    if let Some(cues_offset) = header.cues_offset {
        match cues::scan_cues(reader, cues_offset, scale).await {
            Ok(millis) => return Ok(Some((millis, DurationSource::Cues))),
            Err(e) if e.is_not_found() => debug!(error = %e, "falling back to tail scan"),
            Err(e) => return Err(e),
        }
    }

    let millis = tail::scan_tail(reader, scale, options.tail_window).await?;
    Ok(millis.map(|millis| (millis, DurationSource::Tail)))
}
