//! Duration recovery from the end of a live, truncated or damaged file.
//!
//! The tail of the file is searched byte by byte for the Cluster ID rather
//! than walked element by element, because the element boundaries inside a
//! partially written tail cannot be trusted. Every hit is only a candidate:
//! a candidate that fails to decode is dropped and the search continues at
//! the next byte.

use tracing::{debug, trace};

use super::meta::ticks_to_millis;
use crate::ebml::{self, ids, ElementHeader, Size};
use crate::error::{Result, WebmError};
use crate::reader::Reader;

const CLUSTER_SIGNATURE: [u8; 4] = (ids::CLUSTER as u32).to_be_bytes();

/// Latest timecode found in the last `window` bytes, in milliseconds.
///
/// `None` when the window holds no Cluster signature at all.
#[tracing::instrument(skip(reader), fields(file_size = reader.size()))]
pub async fn scan_tail<R: Reader>(reader: &R, timecode_scale: u64, window: u64) -> Result<Option<f64>> {
    let size = reader.size();
    let len = size.min(window);
    let start = size - len;
    let bytes = reader.read(start, len as usize).await?;
    debug!(start, len = bytes.len(), "scanning tail window");

    Ok(latest_timecode(&bytes).map(|ticks| ticks_to_millis(ticks.max(0) as f64, timecode_scale)))
}

/// A Cluster signature whose first child decoded as its Timecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClusterCandidate {
    timecode: i64,
    /// First byte after the Timecode element.
    children_start: usize,
    /// Declared end of the cluster, clipped to the window.
    end: usize,
}

/// Latest absolute timecode, in ticks, reachable from any Cluster signature in `window`.
pub fn latest_timecode(window: &[u8]) -> Option<i64> {
    let mut latest: Option<i64> = None;

    for pos in 0..window.len().saturating_sub(CLUSTER_SIGNATURE.len() - 1) {
        if window[pos..pos + CLUSTER_SIGNATURE.len()] != CLUSTER_SIGNATURE {
            continue;
        }
        let running = latest.get_or_insert(0);

        let candidate = match cluster_candidate(window, pos) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                trace!(pos, "cluster signature without leading timecode");
                continue;
            }
            Err(e) => {
                trace!(pos, error = %e, "dropping cluster candidate");
                continue;
            }
        };
        *running = (*running).max(candidate.timecode);

        // Blocks decoded before a failure still count.
        if let Err(e) = scan_blocks(window, &candidate, running) {
            trace!(pos, error = %e, "stopped block scan in cluster candidate");
        }
    }

    latest
}

fn cluster_candidate(window: &[u8], pos: usize) -> Result<Option<ClusterCandidate>> {
    let size = ebml::read_vint(window, pos + CLUSTER_SIGNATURE.len())?;
    let content_start = pos + CLUSTER_SIGNATURE.len() + size.length;
    let end = match size.value {
        Size::Known(size) => usize::try_from(size)
            .ok()
            .and_then(|size| content_start.checked_add(size))
            .map_or(window.len(), |end| end.min(window.len())),
        Size::Unknown => window.len(),
    };

    let first = ElementHeader::parse(window, content_start)?;
    if first.id != ids::TIMECODE {
        return Ok(None);
    }
    let timecode_size = first
        .size
        .known()
        .and_then(|size| usize::try_from(size).ok())
        .ok_or_else(|| WebmError::invalid(content_start as u64, "timecode of unknown size"))?;
    let data_start = content_start + first.header_len;
    let timecode = ebml::read_uint(window, data_start, timecode_size)?;

    Ok(Some(ClusterCandidate {
        timecode: i64::try_from(timecode)
            .map_err(|_| WebmError::invalid(data_start as u64, "timecode out of range"))?,
        children_start: data_start + timecode_size,
        end,
    }))
}

/// Walks the candidate's children for SimpleBlocks and BlockGroups, raising
/// `latest` to each `cluster timecode + block relative timecode`.
fn scan_blocks(window: &[u8], cluster: &ClusterCandidate, latest: &mut i64) -> Result<()> {
    let mut current = cluster.children_start;

    while current < cluster.end {
        let header = ElementHeader::parse(window, current)?;
        let data_start = current + header.header_len;
        let data_end = element_end(&header, data_start, cluster.end);

        let relative = match header.id {
            ids::SIMPLE_BLOCK => Some(block_relative_timecode(window, data_start, data_end)?),
            ids::BLOCK_GROUP => group_relative_timecode(window, data_start, data_end)?,
            // The next cluster of an unknown-sized one; the outer search reaches it on its own.
            ids::CLUSTER => break,
            _ => None,
        };
        if let Some(relative) = relative {
            *latest = (*latest).max(cluster.timecode.saturating_add(i64::from(relative)));
        }

        if header.size.is_unknown() {
            break;
        }
        current = data_end;
    }

    Ok(())
}

fn element_end(header: &ElementHeader, data_start: usize, bound: usize) -> usize {
    match header.size {
        Size::Known(size) => usize::try_from(size)
            .ok()
            .and_then(|size| data_start.checked_add(size))
            .map_or(bound, |end| end.min(bound)),
        Size::Unknown => bound,
    }
}

fn group_relative_timecode(window: &[u8], start: usize, end: usize) -> Result<Option<i16>> {
    let mut current = start;
    while current < end {
        let header = ElementHeader::parse(window, current)?;
        let data_start = current + header.header_len;
        let data_end = element_end(&header, data_start, end);
        if header.id == ids::BLOCK {
            return block_relative_timecode(window, data_start, data_end).map(Some);
        }
        if header.size.is_unknown() {
            break;
        }
        current = data_end;
    }
    Ok(None)
}

/// Block layout: track number VINT, then a signed 16-bit big-endian timecode.
fn block_relative_timecode(window: &[u8], start: usize, end: usize) -> Result<i16> {
    let track = ebml::read_vint(window, start)?;
    let pos = start + track.length;
    if pos + 2 > end || pos + 2 > window.len() {
        return Err(WebmError::invalid(pos as u64, "block timecode past end of block"));
    }
    Ok(i16::from_be_bytes([window[pos], window[pos + 1]]))
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::ebml::writer;
    use crate::reader::MemoryReader;

    fn simple_block(track: u8, relative: i16) -> BytesMut {
        let mut block = BytesMut::new();
        let rel = relative.to_be_bytes();
        writer::put_bytes(&mut block, ids::SIMPLE_BLOCK, &[0x80 | track, rel[0], rel[1], 0x80, 0, 0]);
        block
    }

    fn cluster(timecode: u64, blocks: &[BytesMut], unknown_size: bool) -> BytesMut {
        let mut content = BytesMut::new();
        writer::put_uint(&mut content, ids::TIMECODE, timecode);
        for block in blocks {
            content.extend_from_slice(block);
        }
        let mut buf = BytesMut::new();
        if unknown_size {
            writer::put_master_unknown(&mut buf, ids::CLUSTER, &content);
        } else {
            writer::put_master(&mut buf, ids::CLUSTER, &content);
        }
        buf
    }

    #[test]
    fn test_latest_cluster_wins() {
        let mut window = BytesMut::new();
        window.extend_from_slice(&cluster(0, &[simple_block(1, 0)], false));
        window.extend_from_slice(&cluster(3000, &[simple_block(1, 40)], false));
        window.extend_from_slice(&cluster(6000, &[simple_block(1, 0), simple_block(1, 500)], false));
        assert_eq!(latest_timecode(&window), Some(6500));
    }

    #[test]
    fn test_tolerates_misaligned_start_and_garbage() {
        let full = cluster(1200, &[simple_block(2, 33)], false);
        let mut window = vec![0x43, 0xB6, 0x75, 0xAA, 0x00];
        window.extend_from_slice(&full);
        window.extend_from_slice(&[0xFF; 1024]);
        assert_eq!(latest_timecode(&window), Some(1233));
    }

    #[test]
    fn test_block_group_and_negative_relative() {
        let mut block = BytesMut::new();
        writer::put_bytes(&mut block, ids::BLOCK, &[0x81, 0x00, 0x64, 0x00]);
        let mut group = BytesMut::new();
        writer::put_uint(&mut group, 0x9B, 40);
        group.extend_from_slice(&block);
        let mut group_element = BytesMut::new();
        writer::put_master(&mut group_element, ids::BLOCK_GROUP, &group);

        let window = cluster(5000, &[simple_block(1, -20), group_element], false);
        assert_eq!(latest_timecode(&window), Some(5100));
    }

    #[test]
    fn test_unknown_size_cluster_scanned_to_window_end() {
        let window = cluster(
            9000,
            &[simple_block(1, 0), simple_block(1, 120), simple_block(1, 240)],
            true,
        );
        assert_eq!(latest_timecode(&window), Some(9240));
    }

    #[test]
    fn test_truncated_block_keeps_cluster_timecode() {
        let full = cluster(700, &[simple_block(1, 10), simple_block(1, 90)], false);
        let window = &full[..full.len() - 6];
        assert_eq!(latest_timecode(window), Some(710));

        let header_only = &full[..full.len() - 15];
        assert_eq!(latest_timecode(header_only), Some(700));
    }

    #[test]
    fn test_huge_cluster_timecode_saturates() {
        let mut window = BytesMut::new();
        writer::put_master(
            &mut window,
            ids::CLUSTER,
            &[
                0xE7, 0x88, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // Timecode i64::MAX
                0xA3, 0x84, 0x81, 0x00, 0x01, 0x80, // SimpleBlock, relative +1
            ],
        );
        assert_eq!(latest_timecode(&window), Some(i64::MAX));
    }

    #[test]
    fn test_no_signature() {
        assert_eq!(latest_timecode(&[0u8; 4096]), None);
        assert_eq!(latest_timecode(&[]), None);
    }

    #[test]
    fn test_signature_without_timecode_counts_as_zero() {
        let mut window = BytesMut::new();
        writer::put_master(&mut window, ids::CLUSTER, &[0xEC, 0x80]);
        assert_eq!(latest_timecode(&window), Some(0));
    }

    #[tokio::test]
    async fn test_scan_tail_reads_only_the_window() {
        let mut file = vec![0u8; 8192];
        file.extend_from_slice(&cluster(100, &[], false));
        file.extend_from_slice(&[0u8; 64]);
        let reader = MemoryReader::new(file);

        let millis = scan_tail(&reader, 1_000_000, 1024).await.unwrap();
        assert_eq!(millis, Some(100.0));

        let mut early = cluster(4000, &[], false).to_vec();
        early.extend_from_slice(&[0u8; 4096]);
        let reader = MemoryReader::new(early);
        assert_eq!(scan_tail(&reader, 1_000_000, 1024).await.unwrap(), None);
    }
}
