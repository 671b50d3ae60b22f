//! Segment header discovery: Info, Tracks and where the Cues live.

use tracing::{debug, warn};

use super::element::{self, read_element, ChildWalker, Element};
use super::meta::{ticks_to_millis, AudioSettings, VideoSettings, WebmInfo, WebmTrack};
use super::ScanOptions;
use crate::ebml::{self, ids};
use crate::error::{Result, WebmError};
use crate::reader::Reader;

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderScanResult {
    pub info: WebmInfo,
    pub tracks: Vec<WebmTrack>,
    /// Absolute offset of the Cues element, if the header points at one.
    pub cues_offset: Option<u64>,
}

/// One SeekHead entry. `position` is relative to the Segment data start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekEntry {
    pub id: u64,
    pub position: u64,
}

#[tracing::instrument(skip_all, fields(file_size = reader.size()))]
pub async fn scan_header<R: Reader>(reader: &R, options: &ScanOptions) -> Result<HeaderScanResult> {
    let limit = reader.size().min(options.header_scan_limit);
    let segment = find_segment(reader, limit).await?;
    let segment_start = segment.data_start();

    let mut end = segment_start
        .saturating_add(options.header_scan_limit)
        .min(reader.size());
    if let Some(segment_end) = segment.end() {
        end = end.min(segment_end);
    }
    debug!(segment_start, end, "walking segment");

    let mut info = WebmInfo::default();
    let mut tracks = vec![];
    let mut cues_offset = None;

    let mut walker = ChildWalker::new(reader, segment_start, end);
    while let Some(child) = walker.next().await? {
        if child.id() == ids::CLUSTER {
            debug!(offset = child.offset, "reached first cluster");
            break;
        }
        if child.size().is_unknown() {
            warn!(
                offset = child.offset,
                name = ids::element_name(child.id()),
                "unknown-sized element in segment header, stopping header scan"
            );
            break;
        }

        match child.id() {
            ids::SEEK_HEAD => {
                let entries = parse_seek_head(reader, &child).await?;
                let cues = entries.iter().find(|entry| entry.id == ids::CUES);
                if let (None, Some(entry)) = (cues_offset, cues) {
                    cues_offset = segment_start.checked_add(entry.position);
                    if cues_offset.is_none() {
                        warn!(position = entry.position, "ignoring out of range Cues seek position");
                    }
                }
            }
            ids::INFO => info = parse_info(reader, &child).await?,
            ids::TRACKS => tracks = parse_tracks(reader, &child).await?,
            ids::CUES => cues_offset = Some(child.offset),
            _ => {}
        }
    }

    Ok(HeaderScanResult {
        info,
        tracks,
        cues_offset,
    })
}

async fn find_segment<R: Reader>(reader: &R, limit: u64) -> Result<Element> {
    let mut offset = 0;
    while offset < limit {
        let element = read_element(reader, offset).await?;
        if element.id() == ids::SEGMENT {
            return Ok(element);
        }
        match element.end() {
            Some(end) => offset = end,
            None => break,
        }
    }
    Err(WebmError::SegmentNotFound { scanned: limit })
}

pub async fn parse_seek_head<R: Reader>(reader: &R, seek_head: &Element) -> Result<Vec<SeekEntry>> {
    let mut entries = vec![];
    let mut walker = ChildWalker::children_of(reader, seek_head);
    while let Some(seek) = walker.next().await? {
        if seek.id() != ids::SEEK {
            continue;
        }

        let mut id = None;
        let mut position = None;
        let mut fields = ChildWalker::children_of(reader, &seek);
        while let Some(field) = fields.next().await? {
            match field.id() {
                ids::SEEK_ID => {
                    let raw = element::read_data(reader, &field).await?;
                    id = Some(
                        ebml::read_uint(&raw, 0, raw.len())
                            .map_err(|e| e.rebase(field.data_start()))?,
                    );
                }
                ids::SEEK_POSITION => position = Some(element::read_uint(reader, &field).await?),
                _ => {}
            }
        }

        if let (Some(id), Some(position)) = (id, position) {
            entries.push(SeekEntry { id, position });
        }
    }
    Ok(entries)
}

pub async fn parse_info<R: Reader>(reader: &R, info_element: &Element) -> Result<WebmInfo> {
    let mut info = WebmInfo::default();
    let mut walker = ChildWalker::children_of(reader, info_element);
    while let Some(child) = walker.next().await? {
        match child.id() {
            ids::TIMECODE_SCALE => {
                let scale = element::read_uint(reader, &child).await?;
                if scale == 0 {
                    warn!("ignoring zero TimecodeScale");
                } else {
                    info.timecode_scale = scale;
                }
            }
            ids::DURATION => info.duration_ticks = Some(element::read_float(reader, &child).await?),
            ids::MUXING_APP => info.muxing_app = Some(element::read_string(reader, &child).await?),
            ids::WRITING_APP => {
                info.writing_app = Some(element::read_string(reader, &child).await?)
            }
            _ => {}
        }
    }

    info.duration_milli_seconds = info
        .duration_ticks
        .map(|ticks| ticks_to_millis(ticks, info.timecode_scale));
    Ok(info)
}

pub async fn parse_tracks<R: Reader>(reader: &R, tracks_element: &Element) -> Result<Vec<WebmTrack>> {
    let mut tracks = vec![];
    let mut walker = ChildWalker::children_of(reader, tracks_element);
    while let Some(child) = walker.next().await? {
        if child.id() == ids::TRACK_ENTRY {
            tracks.push(parse_track_entry(reader, &child).await?);
        }
    }
    Ok(tracks)
}

async fn parse_track_entry<R: Reader>(reader: &R, entry: &Element) -> Result<WebmTrack> {
    let mut track = WebmTrack::default();
    let mut walker = ChildWalker::children_of(reader, entry);
    while let Some(child) = walker.next().await? {
        match child.id() {
            ids::TRACK_NUMBER => track.track_number = element::read_uint(reader, &child).await?,
            ids::TRACK_TYPE => track.track_type = element::read_uint(reader, &child).await?,
            ids::CODEC_ID => track.codec_id = element::read_string(reader, &child).await?,
            ids::VIDEO => track.video = Some(parse_video(reader, &child).await?),
            ids::AUDIO => track.audio = Some(parse_audio(reader, &child).await?),
            _ => {}
        }
    }
    Ok(track)
}

async fn parse_video<R: Reader>(reader: &R, video: &Element) -> Result<VideoSettings> {
    let mut settings = VideoSettings {
        width: 0,
        height: 0,
    };
    let mut walker = ChildWalker::children_of(reader, video);
    while let Some(child) = walker.next().await? {
        match child.id() {
            ids::PIXEL_WIDTH => settings.width = element::read_uint(reader, &child).await?,
            ids::PIXEL_HEIGHT => settings.height = element::read_uint(reader, &child).await?,
            _ => {}
        }
    }
    Ok(settings)
}

async fn parse_audio<R: Reader>(reader: &R, audio: &Element) -> Result<AudioSettings> {
    let mut settings = AudioSettings::default();
    let mut walker = ChildWalker::children_of(reader, audio);
    while let Some(child) = walker.next().await? {
        match child.id() {
            ids::SAMPLING_FREQUENCY => {
                settings.sample_rate = element::read_float(reader, &child).await?
            }
            ids::CHANNELS => settings.channels = element::read_uint(reader, &child).await?,
            _ => {}
        }
    }
    Ok(settings)
}
