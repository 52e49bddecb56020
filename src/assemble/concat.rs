//! Final segment concatenation with graceful degradation.

use std::path::{Path, PathBuf};

use crate::{
    assemble::segment::VideoSegment,
    config::PipelineConfig,
    encode::{
        ffmpeg::{EncodeConfig, FfmpegEncoder, ensure_parent_dir, run_ffmpeg},
        probe::probe_media_duration,
    },
    foundation::{
        core::{FrameRgba, secs_to_frames},
        error::{SlidecastError, SlidecastResult},
    },
    speech::backend::write_silence_wav,
};

/// Tolerance between planned and measured duration, per slide.
const DURATION_TOLERANCE_PER_SEGMENT: f64 = 0.2;

/// The pipeline's sole durable output artifact.
#[derive(Clone, Debug)]
pub struct FinalVideo {
    pub path: PathBuf,
    pub total_duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Losslessly join segments in slide order into `out_path`.
///
/// All segments come from the same encoder settings, so the concat
/// demuxer with stream copy applies; total cost stays linear in duration.
#[tracing::instrument(skip_all, fields(segments = segments.len()))]
pub fn concatenate(
    segments: &[VideoSegment],
    cfg: &PipelineConfig,
    workdir: &Path,
    out_path: &Path,
) -> SlidecastResult<FinalVideo> {
    if segments.is_empty() {
        return Err(SlidecastError::validation("no segments to concatenate"));
    }
    if !segments.windows(2).all(|w| w[0].slide_index < w[1].slide_index) {
        return Err(SlidecastError::validation(
            "segments must be ordered by slide index",
        ));
    }
    ensure_parent_dir(out_path)?;

    let list_path = workdir.join("concat_list.txt");
    let mut list = String::new();
    for segment in segments {
        // concat demuxer quoting: single quotes in paths become '\''.
        let quoted = segment.path.display().to_string().replace('\'', "'\\''");
        list.push_str(&format!("file '{quoted}'\n"));
    }
    std::fs::write(&list_path, &list).map_err(|e| {
        SlidecastError::mux(format!(
            "failed to write concat list '{}': {e}",
            list_path.display()
        ))
    })?;

    let args: Vec<String> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_path.display().to_string(),
        "-c".into(),
        "copy".into(),
        "-movflags".into(),
        "+faststart".into(),
        out_path.display().to_string(),
    ];
    run_ffmpeg(&args, out_path, cfg.encode_timeout)?;

    let planned: f64 = segments.iter().map(|s| s.duration_secs).sum();
    let measured = probe_media_duration(out_path, cfg.encode_timeout)?;
    let tolerance = DURATION_TOLERANCE_PER_SEGMENT * segments.len() as f64;
    if (measured - planned).abs() > tolerance {
        tracing::warn!(
            planned_secs = planned,
            measured_secs = measured,
            tolerance_secs = tolerance,
            "final video duration drifted from the timing plan"
        );
    }

    Ok(FinalVideo {
        path: out_path.to_path_buf(),
        total_duration_secs: measured,
        width: cfg.canvas.width,
        height: cfg.canvas.height,
        fps: cfg.fps,
    })
}

/// Degraded path: promote the first assembled segment to the final
/// artifact when concatenation itself fails.
pub fn promote_first_segment(
    segments: &[VideoSegment],
    cfg: &PipelineConfig,
    out_path: &Path,
) -> SlidecastResult<FinalVideo> {
    let first = segments
        .first()
        .ok_or_else(|| SlidecastError::mux("no segment available to promote"))?;
    ensure_parent_dir(out_path)?;
    std::fs::copy(&first.path, out_path).map_err(|e| {
        SlidecastError::mux(format!(
            "failed to copy segment to '{}': {e}",
            out_path.display()
        ))
    })?;
    tracing::warn!(
        slide = first.slide_index,
        out = %out_path.display(),
        "concatenation failed; emitting first segment alone"
    );
    Ok(FinalVideo {
        path: out_path.to_path_buf(),
        total_duration_secs: first.duration_secs,
        width: cfg.canvas.width,
        height: cfg.canvas.height,
        fps: cfg.fps,
    })
}

/// Last-resort artifact: a static frame with stub silence, so the request
/// still terminates with a playable file.
#[tracing::instrument(skip_all)]
pub fn minimal_fallback(
    frame: &FrameRgba,
    cfg: &PipelineConfig,
    workdir: &Path,
    out_path: &Path,
) -> SlidecastResult<FinalVideo> {
    let duration = cfg.silence_stub_secs;
    let video_path = workdir.join("fallback_video.mp4");
    let mut encoder = FfmpegEncoder::new(
        EncodeConfig {
            width: frame.width,
            height: frame.height,
            fps: cfg.fps,
            out_path: video_path.clone(),
            overwrite: true,
        },
        [0, 0, 0, 255],
        cfg.encode_timeout,
    )?;
    for _ in 0..secs_to_frames(cfg.fps, duration) {
        encoder.encode_frame(frame)?;
    }
    encoder.finish()?;

    let audio_path = workdir.join("fallback_audio.wav");
    write_silence_wav(&audio_path, duration)?;

    ensure_parent_dir(out_path)?;
    let args: Vec<String> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video_path.display().to_string(),
        "-i".into(),
        audio_path.display().to_string(),
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "1:a".into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-t".into(),
        format!("{duration:.3}"),
        out_path.display().to_string(),
    ];
    run_ffmpeg(&args, out_path, cfg.encode_timeout)?;

    Ok(FinalVideo {
        path: out_path.to_path_buf(),
        total_duration_secs: duration,
        width: frame.width,
        height: frame.height,
        fps: cfg.fps,
    })
}
