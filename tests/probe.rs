use webm_probe::synth::{BlockSpec, ClusterSpec, SyntheticWebm, TrackSpec};
use webm_probe::webm::{parse_webm_with, AudioSettings, ScanOptions, VideoSettings};
use webm_probe::{parse_webm, parse_webm_bytes, FileReader, MemoryReader, WebmError};

fn vp9_track() -> Vec<TrackSpec> {
    vec![TrackSpec::video(1, "V_VP9", 1280, 720)]
}

#[tokio::test]
async fn info_duration_wins_over_cues_and_clusters() {
    let file = SyntheticWebm::new()
        .with_tracks(vp9_track())
        .with_duration_ticks(5000.0)
        .with_cluster(0, vec![(1, 0)])
        .with_cluster(9000, vec![(1, 0)])
        .with_cue_times(vec![0, 2000])
        .build();

    let meta = parse_webm_bytes(file).await.unwrap();
    assert_eq!(meta.duration_milli_seconds, Some(5000.0));
    assert_eq!(meta.info.duration_milli_seconds, Some(5000.0));
}

#[tokio::test]
async fn cues_used_when_info_has_no_duration() {
    let file = SyntheticWebm::new()
        .with_tracks(vp9_track())
        .with_cluster(0, vec![(1, 0)])
        .with_cluster(9000, vec![(1, 0)])
        .with_cue_times(vec![0, 2000])
        .build();

    let meta = parse_webm_bytes(file).await.unwrap();
    assert_eq!(meta.duration_milli_seconds, Some(2000.0));
    assert_eq!(meta.info.duration_milli_seconds, None);
}

#[tokio::test]
async fn cues_found_by_walking_the_segment() {
    let file = SyntheticWebm::new()
        .with_tracks(vp9_track())
        .with_cluster(0, vec![(1, 0)])
        .with_cluster(9000, vec![(1, 0)])
        .with_cue_times(vec![0, 2000])
        .with_cues_before_clusters()
        .build();

    let meta = parse_webm_bytes(file).await.unwrap();
    assert_eq!(meta.duration_milli_seconds, Some(2000.0));
}

#[tokio::test]
async fn tail_scan_recovers_duration_past_trailing_garbage() {
    let mut file = SyntheticWebm::new()
        .with_tracks(vp9_track())
        .with_cluster(0, vec![(1, 0)])
        .with_cluster(3000, vec![(1, 0)])
        .with_cluster(6000, vec![(1, 0), (1, 500)])
        .build();
    file.extend_from_slice(&[0xFF; 1024]);

    let meta = parse_webm_bytes(file).await.unwrap();
    assert_eq!(meta.duration_milli_seconds, Some(6500.0));
}

#[tokio::test]
async fn tail_scan_honours_timecode_scale() {
    let file = SyntheticWebm::new()
        .with_timecode_scale(10_000_000)
        .with_tracks(vp9_track())
        .with_cluster(0, vec![(1, 0)])
        .with_cluster(400, vec![(1, 20)])
        .build();

    let meta = parse_webm_bytes(file).await.unwrap();
    assert_eq!(meta.info.timecode_scale, 10_000_000);
    assert_eq!(meta.duration_milli_seconds, Some(4200.0));
}

#[tokio::test]
async fn truncated_file_still_probes() {
    let full = SyntheticWebm::sample(200, 1000)
        .with_payload_len(256)
        .with_cues_from_clusters()
        .build();
    let full_meta = parse_webm_bytes(full.clone()).await.unwrap();
    let full_duration = full_meta.duration_milli_seconds.unwrap();
    assert_eq!(full_duration, 199_000.0);

    let truncated = full[..full.len() - 10 * 1024].to_vec();
    let meta = parse_webm_bytes(truncated).await.unwrap();
    let duration = meta.duration_milli_seconds.unwrap();
    assert!(duration > 0.0);
    assert!(duration <= full_duration);
    assert_eq!(meta.tracks, full_meta.tracks);
}

#[tokio::test]
async fn live_recording_with_unknown_sizes() {
    let file = SyntheticWebm::new()
        .with_unknown_segment_size()
        .with_tracks(vp9_track())
        .with_cluster(0, vec![(1, 0), (1, 33)])
        .with_cluster_spec(ClusterSpec {
            timecode: 4000,
            blocks: vec![
                BlockSpec {
                    track: 1,
                    relative: 0,
                    grouped: false,
                },
                BlockSpec {
                    track: 1,
                    relative: 66,
                    grouped: true,
                },
            ],
            unknown_size: true,
        })
        .build();

    let meta = parse_webm_bytes(file).await.unwrap();
    assert_eq!(meta.duration_milli_seconds, Some(4066.0));
    assert_eq!(meta.tracks.len(), 1);
}

#[tokio::test]
async fn multi_track_metadata() {
    let file = SyntheticWebm::sample(3, 1000).with_duration_ticks(3000.0).build();
    let size = file.len() as u64;

    let meta = parse_webm(&MemoryReader::new(file)).await.unwrap();
    assert_eq!(meta.file_size, size);
    assert_eq!(meta.mime_type, "video/webm; codecs=\"V_VP9,A_OPUS\"");
    assert_eq!(meta.tracks.len(), 2);

    let video = &meta.tracks[0];
    assert_eq!(video.track_type, 1);
    assert_eq!(video.video, Some(VideoSettings { width: 1920, height: 1080 }));
    assert_eq!(video.audio, None);

    let audio = &meta.tracks[1];
    assert_eq!(audio.track_number, 2);
    assert_eq!(
        audio.audio,
        Some(AudioSettings {
            sample_rate: 48000.0,
            channels: 2
        })
    );

    let json = serde_json::to_value(&meta).unwrap();
    assert_eq!(json["durationMilliSeconds"], 3000.0);
    assert_eq!(json["tracks"][1]["audio"]["sampleRate"], 48000.0);
}

#[tokio::test]
async fn no_duration_anywhere() {
    let file = SyntheticWebm::new().with_tracks(vp9_track()).build();
    let meta = parse_webm_bytes(file).await.unwrap();
    assert_eq!(meta.duration_milli_seconds, None);
    assert_eq!(meta.tracks[0].codec_id, "V_VP9");
}

#[tokio::test]
async fn tail_window_inside_last_block_finds_nothing() {
    let file = SyntheticWebm::sample(50, 1000).with_payload_len(512).build();
    let options = ScanOptions::builder().tail_window(64).build();

    let meta = parse_webm_with(&MemoryReader::new(file), &options).await.unwrap();
    // The window only covers the payload of the last block.
    assert_eq!(meta.duration_milli_seconds, None);
}

#[tokio::test]
async fn not_webm() {
    let err = parse_webm_bytes(vec![0u8; 256]).await.unwrap_err();
    assert!(matches!(err, WebmError::InvalidEncoding { offset: 0, .. }));
}

#[tokio::test]
async fn probes_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.webm");
    let file = SyntheticWebm::sample(5, 2000).with_cues_from_clusters().build();
    tokio::fs::write(&path, &file).await.unwrap();

    let reader = FileReader::open(&path).await.unwrap();
    let meta = parse_webm(&reader).await.unwrap();
    assert_eq!(meta.file_size, file.len() as u64);
    assert_eq!(meta.duration_milli_seconds, Some(8000.0));
}
