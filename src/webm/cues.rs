use tracing::debug;

use super::element::{self, read_element, ChildWalker};
use super::meta::ticks_to_millis;
use crate::ebml::ids;
use crate::error::{Result, WebmError};
use crate::reader::Reader;

/// Latest CueTime of the Cues element at `cues_offset`, in milliseconds.
///
/// Fails with [`WebmError::ElementNotFound`] when there is no complete Cues
/// element at that offset; callers treat that as "try the next tier".
/// Cue points are not assumed to be sorted. An empty index yields zero.
#[tracing::instrument(skip(reader))]
pub async fn scan_cues<R: Reader>(reader: &R, cues_offset: u64, timecode_scale: u64) -> Result<f64> {
    let not_found = WebmError::ElementNotFound {
        id: ids::CUES,
        offset: cues_offset,
    };

    if cues_offset >= reader.size() {
        debug!(file_size = reader.size(), "cues offset past end of file");
        return Err(not_found);
    }

    let cues = read_element(reader, cues_offset).await?;
    if cues.id() != ids::CUES {
        debug!(found = %format!("0x{:X}", cues.id()), "no cues element at offset");
        return Err(not_found);
    }
    if cues.end().map_or(true, |end| end > reader.size()) {
        debug!("cues element runs past end of file");
        return Err(not_found);
    }

    let mut max_ticks = 0u64;
    let mut points = 0usize;
    let mut walker = ChildWalker::children_of(reader, &cues);
    while let Some(point) = walker.next().await? {
        if point.id() != ids::CUE_POINT {
            continue;
        }
        points += 1;

        let mut fields = ChildWalker::children_of(reader, &point);
        while let Some(field) = fields.next().await? {
            if field.id() == ids::CUE_TIME {
                max_ticks = max_ticks.max(element::read_uint(reader, &field).await?);
            }
        }
    }

    debug!(points, max_ticks, "scanned cues");
    Ok(ticks_to_millis(max_ticks as f64, timecode_scale))
}
