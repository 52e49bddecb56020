//! End-to-end smoke tests. These exercise the real ffmpeg plumbing and
//! are skipped when the tools (or a usable font) are missing.

use std::{path::PathBuf, time::Duration};

use slidecast::{
    PipelineConfig, StructuredContent, TimingMode, VideoRequest,
    encode::ffmpeg::{is_ffmpeg_on_path, is_ffprobe_on_path},
    encode::probe::probe_media_duration,
    speech::{TierPreference, VoiceConfig},
    visual::text::resolve_font_bytes,
};

fn tools_ready(cfg: &PipelineConfig) -> bool {
    is_ffmpeg_on_path() && is_ffprobe_on_path() && resolve_font_bytes(cfg.font_path.as_deref()).is_ok()
}

fn scratch(name: &str) -> PathBuf {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("target/test-e2e");
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

/// Small config that keeps renders fast and avoids waiting on
/// unreachable speech services.
fn test_cfg() -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.canvas.width = 64;
    cfg.canvas.height = 64;
    cfg.subtopic_floor_secs = 2.0;
    cfg.subtopic_ceiling_secs = 10.0;
    cfg.tts_timeout = Duration::from_millis(500);
    cfg.elevenlabs_api_key = None;
    cfg
}

fn free_voice() -> VoiceConfig {
    VoiceConfig {
        max_tier: TierPreference::Free,
        ..Default::default()
    }
}

fn gravity_content() -> StructuredContent {
    serde_json::from_str(
        r#"{
            "topic": "Gravity",
            "level": "beginner",
            "slides": [{
                "title": "What is gravity?",
                "bullets": ["Objects fall", "Mass attracts mass"],
                "narration": "What is gravity? It pulls objects together."
            }]
        }"#,
    )
    .unwrap()
}

#[test]
fn quick_mode_three_slides_runs_about_nine_seconds() {
    let cfg = test_cfg();
    if !tools_ready(&cfg) {
        return;
    }

    let content: StructuredContent = serde_json::from_str(
        r#"{
            "topic": "Rivers",
            "slides": [
                {"title": "Sources", "bullets": ["Rain", "Springs"], "narration": "Rivers start small."},
                {"title": "Flow", "bullets": ["Downhill"], "narration": "Water follows gravity."},
                {"title": "Deltas", "bullets": ["Sediment"], "narration": "Rivers end in deltas."}
            ]
        }"#,
    )
    .unwrap();

    let out = scratch("quick_three.mp4");
    let request = VideoRequest {
        content,
        mode: TimingMode::Quick,
        voice: free_voice(),
        out_path: out.clone(),
    };
    let video = slidecast::generate(&request, &cfg).unwrap();

    assert!(out.exists());
    let measured = probe_media_duration(&out, Duration::from_secs(10)).unwrap();
    assert!(
        (measured - 9.0).abs() <= 0.2 * 3.0,
        "measured {measured}s, expected about 9s"
    );
    assert!((video.total_duration_secs - measured).abs() < 0.5);
}

#[test]
fn detailed_mode_single_slide_meets_the_floor() {
    let cfg = test_cfg();
    if !tools_ready(&cfg) {
        return;
    }

    let out = scratch("detailed_one.mp4");
    let request = VideoRequest {
        content: gravity_content(),
        mode: TimingMode::Detailed,
        voice: free_voice(),
        out_path: out.clone(),
    };
    let video = slidecast::generate(&request, &cfg).unwrap();

    assert!(out.exists());
    let measured = probe_media_duration(&out, Duration::from_secs(10)).unwrap();
    assert!(
        measured + 0.2 >= cfg.subtopic_floor_secs,
        "measured {measured}s is below the {}s slide floor",
        cfg.subtopic_floor_secs
    );
    assert_eq!(video.width, 64);
    assert_eq!(video.height, 64);
}

#[test]
fn malformed_content_degrades_to_topic_stub_video() {
    let cfg = test_cfg();
    if !tools_ready(&cfg) {
        return;
    }

    // No slides at all: validation fails, the topic stub takes over.
    let content: StructuredContent =
        serde_json::from_str(r#"{"topic": "Volcanoes", "slides": []}"#).unwrap();

    let out = scratch("stub.mp4");
    let request = VideoRequest {
        content,
        mode: TimingMode::Quick,
        voice: free_voice(),
        out_path: out.clone(),
    };
    let video = slidecast::generate(&request, &cfg).unwrap();
    assert!(out.exists());
    assert!(video.total_duration_secs > 0.0);
}

#[test]
fn preview_frame_renders_without_audio_or_ffmpeg_mux() {
    let cfg = test_cfg();
    if resolve_font_bytes(cfg.font_path.as_deref()).is_err() {
        return;
    }

    let frame =
        slidecast::pipeline::render_preview_frame(&gravity_content(), 0, 1.0, &cfg).unwrap();
    assert_eq!(frame.width, 64);
    assert_eq!(frame.height, 64);
    assert_eq!(frame.data.len(), 64 * 64 * 4);
    // The gradient background guarantees an opaque, non-black frame.
    assert!(frame.data.chunks_exact(4).all(|px| px[3] == 255));
    assert!(frame.data.chunks_exact(4).any(|px| px[0] > 0 || px[1] > 0 || px[2] > 0));
}
