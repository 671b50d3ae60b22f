//! Values produced by a probe. These serialize to the stable JSON shape
//! printed by the CLI and served by `/probe`.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Ticks to milliseconds: `ticks * scale` is in nanoseconds.
pub fn ticks_to_millis(ticks: f64, timecode_scale: u64) -> f64 {
    ticks * timecode_scale as f64 / 1e6
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebmInfo {
    /// Nanoseconds per tick, always positive.
    pub timecode_scale: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ticks: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_milli_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muxing_app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writing_app: Option<String>,
}

impl Default for WebmInfo {
    fn default() -> Self {
        Self {
            timecode_scale: DEFAULT_TIMECODE_SCALE,
            duration_ticks: None,
            duration_milli_seconds: None,
            muxing_app: None,
            writing_app: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettings {
    pub width: u64,
    pub height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    pub sample_rate: f64,
    pub channels: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 8000.0,
            channels: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebmTrack {
    pub track_number: u64,
    /// 1 video, 2 audio, other Matroska values passed through.
    pub track_type: u64,
    pub codec_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebmMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_milli_seconds: Option<f64>,
    pub file_size: u64,
    pub mime_type: String,
    pub info: WebmInfo,
    pub tracks: Vec<WebmTrack>,
}

/// `video/webm`, with a `codecs` parameter when any track names a codec.
pub fn mime_type(tracks: &[WebmTrack]) -> String {
    let codecs: Vec<&str> = tracks
        .iter()
        .map(|track| track.codec_id.as_str())
        .filter(|codec| !codec.is_empty())
        .collect();

    if codecs.is_empty() {
        "video/webm".to_string()
    } else {
        format!("video/webm; codecs=\"{}\"", codecs.join(","))
    }
}
