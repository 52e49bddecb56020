//! Per-slide segment assembly: silent visual track + narration audio.

use std::path::{Path, PathBuf};

use crate::{
    config::PipelineConfig,
    encode::ffmpeg::{EncodeConfig, FfmpegEncoder, run_ffmpeg},
    foundation::error::{SlidecastError, SlidecastResult},
    speech::{AudioClip, backend::write_silence_wav},
    visual::frame::{FrameRenderer, SlideScene},
};

/// One slide's muxed audio+video unit, prior to final concatenation.
/// Transient: lives in the request workspace and is reclaimed with it.
#[derive(Clone, Debug)]
pub struct VideoSegment {
    pub slide_index: usize,
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Assemble one slide into a segment file under `workdir`.
///
/// Fails with [`SlidecastError::Mux`] on any encoder problem; the caller
/// decides whether to skip the slide or abort.
#[tracing::instrument(skip_all, fields(slide = scene.timing.slide_index))]
pub fn assemble(
    scene: &SlideScene,
    clips: &[AudioClip],
    cfg: &PipelineConfig,
    workdir: &Path,
) -> SlidecastResult<VideoSegment> {
    if clips.is_empty() {
        return Err(SlidecastError::validation(
            "segment assembly needs at least one audio clip",
        ));
    }
    let slide_index = scene.timing.slide_index;

    let video_path = workdir.join(format!("slide_{slide_index:03}_video.mp4"));
    encode_silent_video(scene, cfg, &video_path)?;

    let audio_path = build_slide_audio(scene, clips, cfg, workdir)?;

    let out_path = workdir.join(format!("slide_{slide_index:03}.mp4"));
    mux_segment(
        &video_path,
        &audio_path,
        scene.timing.duration_secs,
        cfg,
        &out_path,
    )?;

    Ok(VideoSegment {
        slide_index,
        path: out_path,
        duration_secs: scene.timing.duration_secs,
    })
}

/// Render every frame of the slide and stream it into a silent H.264
/// track. Frames are produced in order; encoding is a pipe, not a file
/// per frame.
fn encode_silent_video(
    scene: &SlideScene,
    cfg: &PipelineConfig,
    out_path: &Path,
) -> SlidecastResult<()> {
    let mut renderer = FrameRenderer::new();
    let mut encoder = FfmpegEncoder::new(
        EncodeConfig {
            width: scene.canvas.width,
            height: scene.canvas.height,
            fps: scene.fps,
            out_path: out_path.to_path_buf(),
            overwrite: true,
        },
        [0, 0, 0, 255],
        cfg.encode_timeout,
    )?;

    let frames = scene.frame_count();
    for frame_index in 0..frames {
        let frame = renderer.render_frame(scene, frame_index)?;
        encoder.encode_frame(&frame)?;
    }
    encoder.finish()?;
    tracing::debug!(frames, out = %out_path.display(), "encoded silent slide video");
    Ok(())
}

/// Every audio stream is normalized to this before concatenation or mux,
/// so stream-copy concatenation of segments always sees matching
/// parameters regardless of what a TTS backend delivered.
const AUDIO_NORM_FILTER: &str = "aresample=24000,aformat=sample_fmts=s16:channel_layouts=mono";

/// One input to the slide audio track: a file, optionally cut to the
/// visual slot it belongs to.
struct AudioPiece {
    path: PathBuf,
    trim_secs: Option<f64>,
}

/// Produce one audio file for the slide.
///
/// Subtopic clips are joined in order with silence filling each visual
/// slot and the inter-subtopic pause, so audio starts line up with the
/// timing plan's offsets. A clip longer than its slot is trimmed to the
/// slot; played audio never overruns the visuals it narrates.
fn build_slide_audio(
    scene: &SlideScene,
    clips: &[AudioClip],
    cfg: &PipelineConfig,
    workdir: &Path,
) -> SlidecastResult<PathBuf> {
    let slide_index = scene.timing.slide_index;
    if clips.len() == 1 {
        let slot = scene.timing.subtopic_slots[0];
        if clips[0].duration_secs() <= slot {
            return Ok(clips[0].path().to_path_buf());
        }
        // Overlong single clip still needs the slot cut; the mux -t only
        // bounds the slide total, not the trailing buffer.
        let out_path = workdir.join(format!("slide_{slide_index:03}_audio.m4a"));
        let piece = AudioPiece {
            path: clips[0].path().to_path_buf(),
            trim_secs: Some(slot),
        };
        concat_audio_pieces(&[piece], cfg, &out_path)?;
        return Ok(out_path);
    }
    if clips.len() != scene.timing.subtopic_slots.len() {
        return Err(SlidecastError::validation(format!(
            "slide {slide_index}: {} clips for {} timing slots",
            clips.len(),
            scene.timing.subtopic_slots.len()
        )));
    }

    // Interleave clips with silence gaps sized to keep each clip starting
    // at its planned offset.
    let mut pieces: Vec<AudioPiece> = Vec::new();
    for (i, clip) in clips.iter().enumerate() {
        let slot = scene.timing.subtopic_slots[i];
        let played = clip.duration_secs().min(slot);
        pieces.push(AudioPiece {
            path: clip.path().to_path_buf(),
            trim_secs: (clip.duration_secs() > slot).then_some(slot),
        });
        let is_last = i + 1 == clips.len();
        if is_last {
            break;
        }
        let gap = (slot - played) + cfg.subtopic_pause_secs;
        if gap > 0.01 {
            let gap_path = workdir.join(format!("slide_{slide_index:03}_gap_{i}.wav"));
            write_silence_wav(&gap_path, gap)?;
            pieces.push(AudioPiece {
                path: gap_path,
                trim_secs: None,
            });
        }
    }

    let out_path = workdir.join(format!("slide_{slide_index:03}_audio.m4a"));
    concat_audio_pieces(&pieces, cfg, &out_path)?;
    Ok(out_path)
}

/// Decode-and-concat arbitrary audio files into one AAC track,
/// resampling everything to a common mono format first and cutting
/// trimmed pieces to their slot length.
fn concat_audio_pieces(
    pieces: &[AudioPiece],
    cfg: &PipelineConfig,
    out_path: &Path,
) -> SlidecastResult<()> {
    let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];
    for piece in pieces {
        args.push("-i".into());
        args.push(piece.path.display().to_string());
    }

    let mut filter = String::new();
    for (i, piece) in pieces.iter().enumerate() {
        match piece.trim_secs {
            Some(secs) => filter.push_str(&format!(
                "[{i}:a]atrim=end={secs:.3},{AUDIO_NORM_FILTER}[a{i}];"
            )),
            None => filter.push_str(&format!("[{i}:a]{AUDIO_NORM_FILTER}[a{i}];")),
        }
    }
    for i in 0..pieces.len() {
        filter.push_str(&format!("[a{i}]"));
    }
    filter.push_str(&format!("concat=n={}:v=0:a=1[aout]", pieces.len()));

    args.extend([
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "[aout]".into(),
        "-c:a".into(),
        "aac".into(),
        out_path.display().to_string(),
    ]);

    run_ffmpeg(&args, out_path, cfg.encode_timeout)
}

/// Mux the silent track with the slide audio. Audio is normalized to the
/// common sample format, padded with silence to the slide duration
/// (`apad`) and the whole output cut at exactly `duration_secs`; the
/// video stream is copied, not re-encoded.
fn mux_segment(
    video: &Path,
    audio: &Path,
    duration_secs: f64,
    cfg: &PipelineConfig,
    out_path: &Path,
) -> SlidecastResult<()> {
    let args: Vec<String> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video.display().to_string(),
        "-i".into(),
        audio.display().to_string(),
        "-filter_complex".into(),
        format!("[1:a]{AUDIO_NORM_FILTER},apad[aout]"),
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "[aout]".into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-t".into(),
        format!("{duration_secs:.3}"),
        out_path.display().to_string(),
    ];
    run_ffmpeg(&args, out_path, cfg.encode_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encode::{
            ffmpeg::{is_ffmpeg_on_path, is_ffprobe_on_path},
            probe::probe_media_duration,
        },
        foundation::core::Canvas,
        timing::planner::{plan_detailed, plan_quick},
        visual::background,
    };
    use std::sync::Arc;

    fn small_scene(canvas: Canvas, timing: crate::timing::SlideTiming) -> SlideScene {
        let bg = background::render_gradient(
            &background::palette(background::TopicCategory::Default)[0],
            canvas,
        )
        .unwrap();
        SlideScene::new(
            canvas,
            24,
            "t".into(),
            vec![],
            timing,
            Arc::new(bg),
            Arc::new(Vec::new()),
        )
        .unwrap()
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("target/test-assemble")
            .join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn assemble_rejects_empty_clip_list() {
        let canvas = Canvas {
            width: 64,
            height: 64,
        };
        let cfg = PipelineConfig::default();
        let timing = plan_quick(1, &cfg).remove(0);
        let scene = small_scene(canvas, timing);

        let dir = scratch_dir("empty-clips");
        let err = assemble(&scene, &[], &cfg, &dir).unwrap_err();
        assert!(matches!(err, SlidecastError::Validation(_)));
    }

    #[test]
    fn gap_audio_is_only_written_for_real_gaps() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let canvas = Canvas {
            width: 64,
            height: 64,
        };
        let mut cfg = PipelineConfig::default();
        cfg.subtopic_floor_secs = 1.0;

        let dir = scratch_dir("gaps");
        let a = write_silence_wav(&dir.join("a.wav"), 2.0).unwrap();
        let b = write_silence_wav(&dir.join("b.wav"), 2.0).unwrap();
        let timing =
            plan_detailed(0, &[a.duration_secs(), b.duration_secs()], &cfg).unwrap();
        let scene = small_scene(canvas, timing);

        let audio = build_slide_audio(&scene, &[a, b], &cfg, &dir).unwrap();
        assert!(audio.exists());
        // Slots equal the clip lengths, so the only gap is the 0.3s pause.
        assert!(dir.join("slide_000_gap_0.wav").exists());
    }

    #[test]
    fn overlong_clips_are_trimmed_to_their_slots() {
        if !is_ffmpeg_on_path() || !is_ffprobe_on_path() {
            return;
        }
        let canvas = Canvas {
            width: 64,
            height: 64,
        };
        let mut cfg = PipelineConfig::default();
        cfg.subtopic_floor_secs = 1.0;
        cfg.subtopic_ceiling_secs = 2.0;

        let dir = scratch_dir("trim");
        // First clip overruns its 2s ceiling slot by 3s.
        let a = write_silence_wav(&dir.join("a.wav"), 5.0).unwrap();
        let b = write_silence_wav(&dir.join("b.wav"), 2.0).unwrap();
        let raw_sum = a.duration_secs() + b.duration_secs();
        let timing =
            plan_detailed(0, &[a.duration_secs(), b.duration_secs()], &cfg).unwrap();
        assert!((timing.subtopic_slots[0] - 2.0).abs() < 1e-9);
        assert!((timing.subtopic_offsets[1] - 2.3).abs() < 1e-9);
        let scene = small_scene(canvas, timing.clone());

        let audio = build_slide_audio(&scene, &[a, b], &cfg, &dir).unwrap();
        let measured = probe_media_duration(&audio, cfg.encode_timeout).unwrap();
        // Track = 2s trimmed clip + 0.3s pause + 2s clip, well under the
        // raw 7s of synthesized audio.
        assert!(measured < raw_sum);
        assert!((measured - 4.3).abs() < 0.2, "audio track is {measured}s");
        // The second clip still starts at its planned offset, and nothing
        // plays past the visual duration.
        assert!(measured <= timing.duration_secs);
    }

    #[test]
    fn overlong_single_clip_is_cut_at_its_slot() {
        if !is_ffmpeg_on_path() || !is_ffprobe_on_path() {
            return;
        }
        let canvas = Canvas {
            width: 64,
            height: 64,
        };
        let mut cfg = PipelineConfig::default();
        cfg.subtopic_floor_secs = 1.0;
        cfg.subtopic_ceiling_secs = 2.0;

        let dir = scratch_dir("trim-single");
        let clip = write_silence_wav(&dir.join("long.wav"), 5.0).unwrap();
        let timing = plan_detailed(0, &[clip.duration_secs()], &cfg).unwrap();
        let scene = small_scene(canvas, timing);

        let audio = build_slide_audio(&scene, &[clip], &cfg, &dir).unwrap();
        // Not the raw clip path: the overrun forces a trimmed rebuild.
        assert!(audio.ends_with("slide_000_audio.m4a"));
        let measured = probe_media_duration(&audio, cfg.encode_timeout).unwrap();
        assert!((measured - 2.0).abs() < 0.2, "audio track is {measured}s");
    }

    #[test]
    fn mux_normalizes_audio_to_common_sample_rate() {
        if !is_ffmpeg_on_path() || !is_ffprobe_on_path() {
            return;
        }
        let canvas = Canvas {
            width: 64,
            height: 64,
        };
        let mut cfg = PipelineConfig::default();
        cfg.quick_secs_per_slide = 2.0;

        let dir = scratch_dir("samplerate");
        // A 44.1kHz source, as a premium TTS backend might deliver.
        let src = dir.join("hi_rate.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&src, spec).unwrap();
        for _ in 0..44_100 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        let clip = AudioClip::new(src, 1.0).unwrap();

        let timing = plan_quick(1, &cfg).remove(0);
        let scene = small_scene(canvas, timing);
        let segment = assemble(&scene, &[clip], &cfg, &dir).unwrap();

        assert_eq!(segment_audio_sample_rate(&segment.path), 24_000);
    }

    fn segment_audio_sample_rate(path: &Path) -> u32 {
        let out = std::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-select_streams",
                "a:0",
                "-show_streams",
                "-print_format",
                "json",
            ])
            .arg(path)
            .output()
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
        parsed["streams"][0]["sample_rate"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap()
    }
}
