//! Synthetic WebM files for fixtures.
//!
//! The output is structurally valid EBML with zero-filled frame payloads;
//! it is meant for exercising the probe, not for playback.

use bytes::{BufMut, BytesMut};

use crate::ebml::{ids, writer};
use crate::webm::meta::DEFAULT_TIMECODE_SCALE;

pub const SYNTH_APP: &str = "webm-probe synth";

#[derive(Debug, Clone, PartialEq)]
pub struct TrackSpec {
    pub number: u64,
    pub track_type: u64,
    pub codec_id: String,
    pub video: Option<(u64, u64)>,
    pub audio: Option<(f64, u64)>,
}

impl TrackSpec {
    pub fn video(number: u64, codec_id: &str, width: u64, height: u64) -> Self {
        Self {
            number,
            track_type: ids::TRACK_TYPE_VIDEO,
            codec_id: codec_id.to_string(),
            video: Some((width, height)),
            audio: None,
        }
    }

    pub fn audio(number: u64, codec_id: &str, sample_rate: f64, channels: u64) -> Self {
        Self {
            number,
            track_type: ids::TRACK_TYPE_AUDIO,
            codec_id: codec_id.to_string(),
            video: None,
            audio: Some((sample_rate, channels)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpec {
    pub track: u64,
    pub relative: i16,
    /// Written as a BlockGroup/Block pair instead of a SimpleBlock.
    pub grouped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub timecode: u64,
    pub blocks: Vec<BlockSpec>,
    pub unknown_size: bool,
}

#[derive(Debug, Clone)]
pub struct SyntheticWebm {
    timecode_scale: u64,
    duration_ticks: Option<f64>,
    tracks: Vec<TrackSpec>,
    clusters: Vec<ClusterSpec>,
    cue_times: Option<Vec<u64>>,
    payload_len: usize,
    cues_before_clusters: bool,
    unknown_segment_size: bool,
    leading_unknown_element: bool,
}

impl Default for SyntheticWebm {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticWebm {
    pub fn new() -> Self {
        Self {
            timecode_scale: DEFAULT_TIMECODE_SCALE,
            duration_ticks: None,
            tracks: vec![],
            clusters: vec![],
            cue_times: None,
            payload_len: 16,
            cues_before_clusters: false,
            unknown_segment_size: false,
            leading_unknown_element: false,
        }
    }

    /// A VP9 + Opus file with `clusters` clusters `cluster_ticks` apart, each
    /// holding a video block at the cluster start and an audio block halfway.
    pub fn sample(clusters: usize, cluster_ticks: u64) -> Self {
        let half = i16::try_from(cluster_ticks / 2).unwrap_or(i16::MAX);
        (0..clusters as u64).fold(
            Self::new().with_tracks(vec![
                TrackSpec::video(1, "V_VP9", 1920, 1080),
                TrackSpec::audio(2, "A_OPUS", 48000.0, 2),
            ]),
            |file, index| file.with_cluster(index * cluster_ticks, vec![(1, 0), (2, half)]),
        )
    }

    pub fn with_timecode_scale(mut self, scale: u64) -> Self {
        self.timecode_scale = scale;
        self
    }

    pub fn with_duration_ticks(mut self, ticks: f64) -> Self {
        self.duration_ticks = Some(ticks);
        self
    }

    pub fn with_tracks(mut self, tracks: Vec<TrackSpec>) -> Self {
        self.tracks = tracks;
        self
    }

    /// Adds a known-size cluster of SimpleBlocks given as `(track, relative timecode)`.
    pub fn with_cluster(self, timecode: u64, blocks: Vec<(u64, i16)>) -> Self {
        self.with_cluster_spec(ClusterSpec {
            timecode,
            blocks: blocks
                .into_iter()
                .map(|(track, relative)| BlockSpec {
                    track,
                    relative,
                    grouped: false,
                })
                .collect(),
            unknown_size: false,
        })
    }

    pub fn with_cluster_spec(mut self, cluster: ClusterSpec) -> Self {
        self.clusters.push(cluster);
        self
    }

    /// Appends a Cues index after the clusters, referenced from a SeekHead.
    /// See [`Self::with_cues_before_clusters`] for the other placement.
    pub fn with_cue_times(mut self, times: Vec<u64>) -> Self {
        self.cue_times = Some(times);
        self
    }

    /// Like [`Self::with_cue_times`] with one cue point per cluster added so far.
    pub fn with_cues_from_clusters(self) -> Self {
        let times = self.clusters.iter().map(|cluster| cluster.timecode).collect();
        self.with_cue_times(times)
    }

    /// Writes the Cues ahead of the first cluster without a SeekHead, so
    /// they are only reachable by walking the segment.
    pub fn with_cues_before_clusters(mut self) -> Self {
        self.cues_before_clusters = true;
        self
    }

    pub fn with_payload_len(mut self, len: usize) -> Self {
        self.payload_len = len;
        self
    }

    pub fn with_unknown_segment_size(mut self) -> Self {
        self.unknown_segment_size = true;
        self
    }

    /// Puts an unknown-sized Tags element ahead of Info and Tracks.
    pub fn with_leading_unknown_sized_element(mut self) -> Self {
        self.leading_unknown_element = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        self.put_ebml_header(&mut out);

        // Laid out first so cluster and cues positions are known; its length
        // does not depend on the position it holds.
        let seek_head_len = self.seek_head(0).len();

        let mut prefix = BytesMut::new();
        if self.leading_unknown_element {
            writer::put_master_unknown(&mut prefix, ids::TAGS, &[]);
        }
        self.put_info(&mut prefix);
        self.put_tracks(&mut prefix);

        // Cue cluster positions are fixed width, so the Cues length is known
        // before the positions are.
        let leading_cues_len = match &self.cue_times {
            Some(times) if self.cues_before_clusters => {
                let mut sized = BytesMut::new();
                put_cues(&mut sized, times, &[]);
                sized.len()
            }
            _ => 0,
        };
        let clusters_start = seek_head_len + prefix.len() + leading_cues_len;

        let mut clusters = BytesMut::new();
        let mut cluster_positions = vec![];
        for cluster in &self.clusters {
            cluster_positions.push((clusters_start + clusters.len()) as u64);
            self.put_cluster(&mut clusters, cluster);
        }

        let mut body = BytesMut::new();
        body.extend_from_slice(&self.seek_head((clusters_start + clusters.len()) as u64));
        body.extend_from_slice(&prefix);
        match &self.cue_times {
            Some(times) if self.cues_before_clusters => {
                put_cues(&mut body, times, &cluster_positions);
                body.extend_from_slice(&clusters);
            }
            Some(times) => {
                body.extend_from_slice(&clusters);
                put_cues(&mut body, times, &cluster_positions);
            }
            None => body.extend_from_slice(&clusters),
        }

        if self.unknown_segment_size {
            writer::put_master_unknown(&mut out, ids::SEGMENT, &body);
        } else {
            writer::put_master(&mut out, ids::SEGMENT, &body);
        }
        out.to_vec()
    }

    fn put_ebml_header(&self, out: &mut BytesMut) {
        let mut header = BytesMut::new();
        writer::put_uint(&mut header, ids::EBML_VERSION, 1);
        writer::put_uint(&mut header, ids::EBML_READ_VERSION, 1);
        writer::put_uint(&mut header, ids::EBML_MAX_ID_LENGTH, 4);
        writer::put_uint(&mut header, ids::EBML_MAX_SIZE_LENGTH, 8);
        writer::put_string(&mut header, ids::DOC_TYPE, "webm");
        writer::put_uint(&mut header, ids::DOC_TYPE_VERSION, 4);
        writer::put_uint(&mut header, ids::DOC_TYPE_READ_VERSION, 2);
        writer::put_master(out, ids::EBML, &header);
    }

    /// Empty unless there are trailing cues to point at.
    fn seek_head(&self, cues_position: u64) -> BytesMut {
        let mut out = BytesMut::new();
        if self.cue_times.is_none() || self.cues_before_clusters {
            return out;
        }
        let mut seek = BytesMut::new();
        writer::put_bytes(&mut seek, ids::SEEK_ID, &(ids::CUES as u32).to_be_bytes());
        writer::put_uint_fixed(&mut seek, ids::SEEK_POSITION, cues_position);
        let mut head = BytesMut::new();
        writer::put_master(&mut head, ids::SEEK, &seek);
        writer::put_master(&mut out, ids::SEEK_HEAD, &head);
        out
    }

    fn put_info(&self, out: &mut BytesMut) {
        let mut info = BytesMut::new();
        writer::put_uint(&mut info, ids::TIMECODE_SCALE, self.timecode_scale);
        if let Some(ticks) = self.duration_ticks {
            writer::put_float(&mut info, ids::DURATION, ticks);
        }
        writer::put_string(&mut info, ids::MUXING_APP, SYNTH_APP);
        writer::put_string(&mut info, ids::WRITING_APP, SYNTH_APP);
        writer::put_master(out, ids::INFO, &info);
    }

    fn put_tracks(&self, out: &mut BytesMut) {
        if self.tracks.is_empty() {
            return;
        }
        let mut tracks = BytesMut::new();
        for track in &self.tracks {
            let mut entry = BytesMut::new();
            writer::put_uint(&mut entry, ids::TRACK_NUMBER, track.number);
            writer::put_uint(&mut entry, ids::TRACK_TYPE, track.track_type);
            writer::put_string(&mut entry, ids::CODEC_ID, &track.codec_id);
            if let Some((width, height)) = track.video {
                let mut video = BytesMut::new();
                writer::put_uint(&mut video, ids::PIXEL_WIDTH, width);
                writer::put_uint(&mut video, ids::PIXEL_HEIGHT, height);
                writer::put_master(&mut entry, ids::VIDEO, &video);
            }
            if let Some((sample_rate, channels)) = track.audio {
                let mut audio = BytesMut::new();
                writer::put_float(&mut audio, ids::SAMPLING_FREQUENCY, sample_rate);
                writer::put_uint(&mut audio, ids::CHANNELS, channels);
                writer::put_master(&mut entry, ids::AUDIO, &audio);
            }
            writer::put_master(&mut tracks, ids::TRACK_ENTRY, &entry);
        }
        writer::put_master(out, ids::TRACKS, &tracks);
    }

    fn put_cluster(&self, out: &mut BytesMut, cluster: &ClusterSpec) {
        let mut content = BytesMut::new();
        writer::put_uint(&mut content, ids::TIMECODE, cluster.timecode);
        for block in &cluster.blocks {
            let mut data = BytesMut::new();
            writer::put_size(&mut data, block.track);
            data.put_i16(block.relative);
            if block.grouped {
                data.put_u8(0x00);
                data.put_bytes(0, self.payload_len);
                let mut group = BytesMut::new();
                writer::put_bytes(&mut group, ids::BLOCK, &data);
                writer::put_master(&mut content, ids::BLOCK_GROUP, &group);
            } else {
                // Keyframe flag.
                data.put_u8(0x80);
                data.put_bytes(0, self.payload_len);
                writer::put_bytes(&mut content, ids::SIMPLE_BLOCK, &data);
            }
        }

        if cluster.unknown_size {
            writer::put_master_unknown(out, ids::CLUSTER, &content);
        } else {
            writer::put_master(out, ids::CLUSTER, &content);
        }
    }
}

fn put_cues(out: &mut BytesMut, times: &[u64], cluster_positions: &[u64]) {
    let mut points = BytesMut::new();
    for (index, time) in times.iter().enumerate() {
        let mut positions = BytesMut::new();
        writer::put_uint(&mut positions, ids::CUE_TRACK, 1);
        let cluster_position = cluster_positions
            .get(index)
            .or(cluster_positions.last())
            .copied()
            .unwrap_or(0);
        writer::put_uint_fixed(&mut positions, ids::CUE_CLUSTER_POSITION, cluster_position);

        let mut point = BytesMut::new();
        writer::put_uint(&mut point, ids::CUE_TIME, *time);
        writer::put_master(&mut point, ids::CUE_TRACK_POSITIONS, &positions);
        writer::put_master(&mut points, ids::CUE_POINT, &point);
    }
    writer::put_master(out, ids::CUES, &points);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml::{ElementHeader, Size};

    #[test]
    fn test_layout() {
        let file = SyntheticWebm::sample(3, 1000).with_cues_from_clusters().build();

        let ebml = ElementHeader::parse(&file, 0).unwrap();
        assert_eq!(ebml.id, ids::EBML);
        let ebml_len = ebml.header_len + ebml.size.known().unwrap() as usize;

        let segment = ElementHeader::parse(&file, ebml_len).unwrap();
        assert_eq!(segment.id, ids::SEGMENT);
        assert_eq!(
            segment.size,
            Size::Known((file.len() - ebml_len - segment.header_len) as u64)
        );

        let first = ElementHeader::parse(&file, ebml_len + segment.header_len).unwrap();
        assert_eq!(first.id, ids::SEEK_HEAD);
    }

    #[test]
    fn test_no_seek_head_without_cues() {
        let file = SyntheticWebm::sample(1, 1000).build();
        let ebml = ElementHeader::parse(&file, 0).unwrap();
        let segment_at = ebml.header_len + ebml.size.known().unwrap() as usize;
        let segment = ElementHeader::parse(&file, segment_at).unwrap();
        let first = ElementHeader::parse(&file, segment_at + segment.header_len).unwrap();
        assert_eq!(first.id, ids::INFO);
    }

    #[test]
    fn test_cues_before_clusters() {
        let file = SyntheticWebm::sample(2, 1000)
            .with_cues_from_clusters()
            .with_cues_before_clusters()
            .build();
        let ebml = ElementHeader::parse(&file, 0).unwrap();
        let segment_at = ebml.header_len + ebml.size.known().unwrap() as usize;
        let segment = ElementHeader::parse(&file, segment_at).unwrap();

        let mut offset = segment_at + segment.header_len;
        let mut order = vec![];
        while offset < file.len() {
            let header = ElementHeader::parse(&file, offset).unwrap();
            order.push(header.id);
            offset += header.header_len + header.size.known().unwrap() as usize;
        }
        assert_eq!(order, vec![ids::INFO, ids::TRACKS, ids::CUES, ids::CLUSTER, ids::CLUSTER]);
    }
}
