//! Request orchestration: content in, one video file out.
//!
//! Slides are synthesized and rendered concurrently up to a bounded
//! worker pool; assembly output is then concatenated strictly in slide
//! order. Every request owns a private temp workspace that is reclaimed
//! on all exit paths.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use rayon::prelude::*;

use crate::{
    assemble::{
        FinalVideo, VideoSegment,
        concat::{concatenate, minimal_fallback, promote_first_segment},
        segment::assemble,
    },
    config::PipelineConfig,
    content::{model::StructuredContent, sanitize::sanitize_content},
    foundation::{
        core::FrameRgba,
        error::{SlidecastError, SlidecastResult},
    },
    speech::{AudioClip, VoiceConfig, synthesizer::Synthesizer},
    timing::{
        SlideTiming, TimingMode,
        planner::{clamp_total, plan_detailed},
    },
    visual::{
        background::BackgroundCache,
        frame::{FrameRenderer, SlideScene},
        text::resolve_font_bytes,
    },
};

/// One video generation request.
#[derive(Clone, Debug)]
pub struct VideoRequest {
    pub content: StructuredContent,
    pub mode: TimingMode,
    pub voice: VoiceConfig,
    pub out_path: PathBuf,
}

/// Cooperative cancellation flag, checked between slides.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Private per-request temp directory, removed on drop. Never shared
/// between requests.
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn create() -> SlidecastResult<Self> {
        let pid = std::process::id();
        // create_dir, not create_dir_all: an existing directory means a
        // name collision with another request, so retry with a fresh one.
        for attempt in 0..32u32 {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            let root = std::env::temp_dir().join(format!("slidecast_{pid}_{nanos}_{attempt}"));
            match std::fs::create_dir(&root) {
                Ok(()) => return Ok(Self { root }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(SlidecastError::validation(format!(
                        "failed to create workspace '{}': {e}",
                        root.display()
                    )));
                }
            }
        }
        Err(SlidecastError::validation(
            "could not allocate a fresh workspace directory",
        ))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub fn generate(request: &VideoRequest, cfg: &PipelineConfig) -> SlidecastResult<FinalVideo> {
    generate_with_cancel(request, cfg, &CancelToken::new())
}

#[tracing::instrument(skip_all, fields(topic = %request.content.topic, mode = ?request.mode))]
pub fn generate_with_cancel(
    request: &VideoRequest,
    cfg: &PipelineConfig,
    cancel: &CancelToken,
) -> SlidecastResult<FinalVideo> {
    cfg.validate()?;
    let workspace = Workspace::create()?;

    // Malformed content degrades to a single-slide stub built from the
    // raw topic rather than failing the request.
    let mut content = match request.content.validate() {
        Ok(()) => request.content.clone(),
        Err(e) => {
            tracing::warn!(error = %e, "structured content rejected; using topic stub");
            StructuredContent::topic_stub(&request.content.topic)
        }
    };
    content.normalize();
    sanitize_content(&mut content);

    let font_bytes = Arc::new(resolve_font_bytes(cfg.font_path.as_deref())?);
    let synthesizer = Synthesizer::from_config(cfg);

    // Backgrounds are cheap and shared; rasterize them up front so the
    // parallel section only reads.
    let mut backgrounds = Vec::with_capacity(content.slides.len());
    {
        let mut cache = BackgroundCache::new(cfg.canvas);
        for i in 0..content.slides.len() {
            backgrounds.push(cache.get(&content.topic, i)?);
        }
    }

    let pool = build_worker_pool(cfg.slide_workers)?;

    // Phase 1: narrate and plan every slide. Planning must complete for
    // the whole deck before assembly so the total-duration clamp can
    // rescale all schedules together.
    let planned: Vec<SlidecastResult<Vec<AudioClip>>> = pool.install(|| {
        content
            .slides
            .par_iter()
            .enumerate()
            .map(|(slide_index, slide)| {
                if cancel.is_cancelled() {
                    return Err(SlidecastError::validation("request cancelled"));
                }
                synthesize_slide(
                    slide,
                    slide_index,
                    request.mode,
                    &request.voice,
                    &synthesizer,
                    workspace.path(),
                )
            })
            .collect()
    });
    let mut slide_clips: Vec<Vec<AudioClip>> = Vec::with_capacity(planned.len());
    for result in planned {
        slide_clips.push(result?);
    }
    let mut timings: Vec<SlideTiming> = slide_clips
        .iter()
        .enumerate()
        .map(|(slide_index, clips)| plan_slide(slide_index, request.mode, clips, cfg))
        .collect::<SlidecastResult<_>>()?;

    let scale = clamp_total(&mut timings, cfg.max_total_secs);
    if scale < 1.0 {
        tracing::warn!(
            ceiling_secs = cfg.max_total_secs,
            scale,
            "planned video exceeds the duration ceiling; schedules scaled down"
        );
    }

    // Phase 2: render and mux each slide against its final schedule.
    let results: Vec<SlidecastResult<Option<VideoSegment>>> = pool.install(|| {
        content
            .slides
            .par_iter()
            .zip(timings.into_par_iter())
            .zip(slide_clips.par_iter())
            .enumerate()
            .map(|(slide_index, ((slide, timing), clips))| {
                if cancel.is_cancelled() {
                    return Err(SlidecastError::validation("request cancelled"));
                }
                let scene = SlideScene::new(
                    cfg.canvas,
                    cfg.fps,
                    slide.title.clone(),
                    slide_display_items(slide),
                    timing,
                    backgrounds[slide_index].clone(),
                    font_bytes.clone(),
                )?;

                match assemble(&scene, clips, cfg, workspace.path()) {
                    Ok(segment) => Ok(Some(segment)),
                    // A broken encoder run loses this slide, not the video.
                    Err(e @ (SlidecastError::Mux(_) | SlidecastError::Timeout(_))) => {
                        tracing::warn!(slide = slide_index, error = %e, "segment lost; skipping slide");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .collect()
    });

    let mut segments: Vec<VideoSegment> = Vec::with_capacity(content.slides.len());
    for result in results {
        if let Some(segment) = result? {
            segments.push(segment);
        }
    }

    if segments.is_empty() {
        tracing::warn!("no segment survived assembly; emitting minimal fallback video");
        let frame = fallback_frame(&content, cfg, &font_bytes, &backgrounds)?;
        return minimal_fallback(&frame, cfg, workspace.path(), &request.out_path);
    }

    match concatenate(&segments, cfg, workspace.path(), &request.out_path) {
        Ok(video) => Ok(video),
        Err(e) => {
            tracing::warn!(error = %e, "concatenation failed; degrading");
            match promote_first_segment(&segments, cfg, &request.out_path) {
                Ok(video) => Ok(video),
                Err(e) => {
                    tracing::warn!(error = %e, "segment promotion failed; degrading further");
                    let frame = fallback_frame(&content, cfg, &font_bytes, &backgrounds)?;
                    minimal_fallback(&frame, cfg, workspace.path(), &request.out_path)
                }
            }
        }
    }
}

/// Render one frame of one slide without producing audio; timing comes
/// from the word-count estimate. Used for previews.
pub fn render_preview_frame(
    content: &StructuredContent,
    slide_index: usize,
    at_secs: f64,
    cfg: &PipelineConfig,
) -> SlidecastResult<FrameRgba> {
    cfg.validate()?;
    let mut content = content.clone();
    content.normalize();
    sanitize_content(&mut content);

    let slide = content.slides.get(slide_index).ok_or_else(|| {
        SlidecastError::validation(format!(
            "slide index {slide_index} out of range ({} slides)",
            content.slides.len()
        ))
    })?;

    let estimates: Vec<f64> = slide
        .narration_units()
        .iter()
        .map(|(_, text)| crate::timing::planner::estimate_secs(text, cfg))
        .collect();
    let timing = plan_detailed(slide_index, &estimates, cfg)?;

    let background = BackgroundCache::new(cfg.canvas).get(&content.topic, slide_index)?;
    let font_bytes = Arc::new(resolve_font_bytes(cfg.font_path.as_deref())?);
    let scene = SlideScene::new(
        cfg.canvas,
        cfg.fps,
        slide.title.clone(),
        slide_display_items(slide),
        timing,
        background,
        font_bytes,
    )?;

    let frame_index = crate::foundation::core::secs_to_frames(cfg.fps, at_secs)
        .min(scene.frame_count().saturating_sub(1));
    FrameRenderer::new().render_frame(&scene, frame_index)
}

fn build_worker_pool(workers: usize) -> SlidecastResult<rayon::ThreadPool> {
    if workers == 0 {
        return Err(SlidecastError::validation(
            "slide_workers must be >= 1",
        ));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| {
            SlidecastError::validation(format!("failed to build slide worker pool: {e}"))
        })
}

/// The on-screen list for a slide: subtopic names when present,
/// otherwise its bullets.
fn slide_display_items(slide: &crate::content::model::Slide) -> Vec<String> {
    if !slide.subtopics.is_empty() {
        slide.subtopics.clone()
    } else {
        slide.bullets.clone()
    }
}

fn synthesize_slide(
    slide: &crate::content::model::Slide,
    slide_index: usize,
    mode: TimingMode,
    voice: &VoiceConfig,
    synthesizer: &Synthesizer,
    workdir: &Path,
) -> SlidecastResult<Vec<AudioClip>> {
    let units = slide.narration_units();
    match mode {
        TimingMode::Quick => {
            // One narration string per slide; the mux cuts it at the
            // fixed quick duration.
            let text: String = units
                .iter()
                .map(|(_, t)| t.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let out = workdir.join(format!("slide_{slide_index:03}_narration.mp3"));
            Ok(vec![synthesizer.synthesize(&text, voice, &out)?])
        }
        TimingMode::Detailed => units
            .iter()
            .enumerate()
            .map(|(unit_index, (_, text))| {
                let out =
                    workdir.join(format!("slide_{slide_index:03}_unit_{unit_index:02}.mp3"));
                synthesizer.synthesize(text, voice, &out)
            })
            .collect(),
    }
}

fn plan_slide(
    slide_index: usize,
    mode: TimingMode,
    clips: &[AudioClip],
    cfg: &PipelineConfig,
) -> SlidecastResult<SlideTiming> {
    match mode {
        TimingMode::Quick => Ok(SlideTiming {
            slide_index,
            duration_secs: cfg.quick_secs_per_slide,
            subtopic_offsets: vec![0.0],
            subtopic_slots: vec![cfg.quick_secs_per_slide],
        }),
        TimingMode::Detailed => {
            let durations: Vec<f64> = clips.iter().map(|c| c.duration_secs()).collect();
            plan_detailed(slide_index, &durations, cfg)
        }
    }
}

/// Static frame for the minimal fallback video: the first slide's
/// backdrop with the topic as its only text.
fn fallback_frame(
    content: &StructuredContent,
    cfg: &PipelineConfig,
    font_bytes: &Arc<Vec<u8>>,
    backgrounds: &[Arc<FrameRgba>],
) -> SlidecastResult<FrameRgba> {
    let background = match backgrounds.first() {
        Some(bg) => bg.clone(),
        None => BackgroundCache::new(cfg.canvas).get(&content.topic, 0)?,
    };
    let timing = SlideTiming {
        slide_index: 0,
        duration_secs: cfg.silence_stub_secs,
        subtopic_offsets: vec![0.0],
        subtopic_slots: vec![cfg.silence_stub_secs],
    };
    let scene = SlideScene::new(
        cfg.canvas,
        cfg.fps,
        content.topic.clone(),
        Vec::new(),
        timing,
        background,
        font_bytes.clone(),
    )?;
    // Render past the fade-in so the title is fully visible.
    let frame_index = scene.frame_count().saturating_sub(1);
    FrameRenderer::new().render_frame(&scene, frame_index)
}
