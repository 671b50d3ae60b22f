//! Element IDs used while probing, with their length-marker bits included.

pub const EBML: u64 = 0x1A45DFA3;
pub const EBML_VERSION: u64 = 0x4286;
pub const EBML_READ_VERSION: u64 = 0x42F7;
pub const EBML_MAX_ID_LENGTH: u64 = 0x42F2;
pub const EBML_MAX_SIZE_LENGTH: u64 = 0x42F3;
pub const DOC_TYPE: u64 = 0x4282;
pub const DOC_TYPE_VERSION: u64 = 0x4287;
pub const DOC_TYPE_READ_VERSION: u64 = 0x4285;
pub const VOID: u64 = 0xEC;

pub const SEGMENT: u64 = 0x18538067;

pub const SEEK_HEAD: u64 = 0x114D9B74;
pub const SEEK: u64 = 0x4DBB;
/// Raw ID bytes of the indexed element, not VINT-decoded.
pub const SEEK_ID: u64 = 0x53AB;
/// Segment-relative byte position.
pub const SEEK_POSITION: u64 = 0x53AC;

pub const INFO: u64 = 0x1549A966;
/// Nanoseconds per tick.
pub const TIMECODE_SCALE: u64 = 0x2AD7B1;
/// Float, in ticks.
pub const DURATION: u64 = 0x4489;
pub const MUXING_APP: u64 = 0x4D80;
pub const WRITING_APP: u64 = 0x5741;

pub const TRACKS: u64 = 0x1654AE6B;
pub const TRACK_ENTRY: u64 = 0xAE;
pub const TRACK_NUMBER: u64 = 0xD7;
pub const TRACK_TYPE: u64 = 0x83;
pub const CODEC_ID: u64 = 0x86;
pub const VIDEO: u64 = 0xE0;
pub const PIXEL_WIDTH: u64 = 0xB0;
pub const PIXEL_HEIGHT: u64 = 0xBA;
pub const AUDIO: u64 = 0xE1;
pub const SAMPLING_FREQUENCY: u64 = 0xB5;
pub const CHANNELS: u64 = 0x9F;

pub const CLUSTER: u64 = 0x1F43B675;
/// Cluster base timecode, in ticks.
pub const TIMECODE: u64 = 0xE7;
pub const SIMPLE_BLOCK: u64 = 0xA3;
pub const BLOCK_GROUP: u64 = 0xA0;
pub const BLOCK: u64 = 0xA1;

pub const CUES: u64 = 0x1C53BB6B;
pub const CUE_POINT: u64 = 0xBB;
pub const CUE_TIME: u64 = 0xB3;
pub const CUE_TRACK_POSITIONS: u64 = 0xB7;
pub const CUE_TRACK: u64 = 0xF7;
pub const CUE_CLUSTER_POSITION: u64 = 0xF1;

pub const TAGS: u64 = 0x1254C367;

pub const TRACK_TYPE_VIDEO: u64 = 1;
pub const TRACK_TYPE_AUDIO: u64 = 2;

/// Human readable element name, for logs.
pub fn element_name(id: u64) -> &'static str {
    match id {
        EBML => "EBML",
        EBML_VERSION => "EBMLVersion",
        EBML_READ_VERSION => "EBMLReadVersion",
        EBML_MAX_ID_LENGTH => "EBMLMaxIDLength",
        EBML_MAX_SIZE_LENGTH => "EBMLMaxSizeLength",
        DOC_TYPE => "DocType",
        DOC_TYPE_VERSION => "DocTypeVersion",
        DOC_TYPE_READ_VERSION => "DocTypeReadVersion",
        VOID => "Void",
        SEGMENT => "Segment",
        SEEK_HEAD => "SeekHead",
        SEEK => "Seek",
        SEEK_ID => "SeekID",
        SEEK_POSITION => "SeekPosition",
        INFO => "Info",
        TIMECODE_SCALE => "TimecodeScale",
        DURATION => "Duration",
        MUXING_APP => "MuxingApp",
        WRITING_APP => "WritingApp",
        TRACKS => "Tracks",
        TRACK_ENTRY => "TrackEntry",
        TRACK_NUMBER => "TrackNumber",
        TRACK_TYPE => "TrackType",
        CODEC_ID => "CodecID",
        VIDEO => "Video",
        PIXEL_WIDTH => "PixelWidth",
        PIXEL_HEIGHT => "PixelHeight",
        AUDIO => "Audio",
        SAMPLING_FREQUENCY => "SamplingFrequency",
        CHANNELS => "Channels",
        CLUSTER => "Cluster",
        TIMECODE => "Timecode",
        SIMPLE_BLOCK => "SimpleBlock",
        BLOCK_GROUP => "BlockGroup",
        BLOCK => "Block",
        CUES => "Cues",
        CUE_POINT => "CuePoint",
        CUE_TIME => "CueTime",
        CUE_TRACK_POSITIONS => "CueTrackPositions",
        CUE_TRACK => "CueTrack",
        CUE_CLUSTER_POSITION => "CueClusterPosition",
        TAGS => "Tags",
        _ => "Unknown",
    }
}
