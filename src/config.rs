use std::{path::PathBuf, time::Duration};

use crate::foundation::{
    core::Canvas,
    error::{SlidecastError, SlidecastResult},
};

/// All tunables for one video-generation pipeline.
///
/// Defaults follow the reference deployment: 1280x720 @ 24 fps, detailed
/// subtopic narration floored at 20s, total output capped at 300s.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub canvas: Canvas,
    pub fps: u32,

    /// Hard ceiling on the final video length in seconds.
    pub max_total_secs: f64,

    /// Quick mode: fixed per-slide duration, independent of audio.
    pub quick_secs_per_slide: f64,
    /// Detailed mode: visual floor per subtopic segment.
    pub subtopic_floor_secs: f64,
    /// Detailed mode: visual ceiling per subtopic segment.
    pub subtopic_ceiling_secs: f64,
    /// Silence inserted between consecutive subtopic clips.
    pub subtopic_pause_secs: f64,
    /// Trailing visual buffer after the last narration ends.
    pub trailing_buffer_secs: f64,

    /// Duration of the silence stub emitted when every TTS backend fails.
    pub silence_stub_secs: f64,
    /// TTS language code for the free backend.
    pub tts_language: String,
    /// Premium TTS credentials; absence routes to the free backend.
    pub elevenlabs_api_key: Option<String>,

    /// Bound on any single external encoder/probe invocation.
    pub encode_timeout: Duration,
    /// Bound on any single TTS HTTP request.
    pub tts_timeout: Duration,

    /// Explicit font file for slide text; when unset, well-known system
    /// locations are probed.
    pub font_path: Option<PathBuf>,

    /// Upper bound on concurrently processed slides.
    pub slide_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 1280,
                height: 720,
            },
            fps: 24,
            max_total_secs: 300.0,
            quick_secs_per_slide: 3.0,
            subtopic_floor_secs: 20.0,
            subtopic_ceiling_secs: 60.0,
            subtopic_pause_secs: 0.3,
            trailing_buffer_secs: 1.5,
            silence_stub_secs: 3.0,
            tts_language: "en".to_string(),
            elevenlabs_api_key: None,
            encode_timeout: Duration::from_secs(120),
            tts_timeout: Duration::from_secs(30),
            font_path: None,
            slide_workers: 4,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with `SLIDECAST_*` / `ELEVENLABS_API_KEY` env vars.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(w) = env_parse::<u32>("SLIDECAST_WIDTH") {
            cfg.canvas.width = w;
        }
        if let Some(h) = env_parse::<u32>("SLIDECAST_HEIGHT") {
            cfg.canvas.height = h;
        }
        if let Some(fps) = env_parse::<u32>("SLIDECAST_FPS") {
            cfg.fps = fps;
        }
        if let Some(max) = env_parse::<f64>("SLIDECAST_MAX_TOTAL_SECS") {
            cfg.max_total_secs = max;
        }
        if let Some(lang) = std::env::var("SLIDECAST_TTS_LANGUAGE")
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            cfg.tts_language = lang;
        }
        if let Some(secs) = env_parse::<u64>("SLIDECAST_ENCODE_TIMEOUT_SECS") {
            cfg.encode_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = std::env::var_os("SLIDECAST_FONT_PATH") {
            cfg.font_path = Some(PathBuf::from(path));
        }
        cfg.elevenlabs_api_key = std::env::var("ELEVENLABS_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());
        cfg
    }

    pub fn validate(&self) -> SlidecastResult<()> {
        Canvas::new(self.canvas.width, self.canvas.height)?;
        if self.fps == 0 {
            return Err(SlidecastError::validation("fps must be non-zero"));
        }
        if self.max_total_secs <= 0.0 {
            return Err(SlidecastError::validation("max_total_secs must be > 0"));
        }
        if self.quick_secs_per_slide <= 0.0 {
            return Err(SlidecastError::validation(
                "quick_secs_per_slide must be > 0",
            ));
        }
        if self.subtopic_floor_secs > self.subtopic_ceiling_secs {
            return Err(SlidecastError::validation(
                "subtopic floor must not exceed ceiling",
            ));
        }
        if self.subtopic_pause_secs < 0.0 || self.trailing_buffer_secs < 0.0 {
            return Err(SlidecastError::validation(
                "pause/buffer seconds must be >= 0",
            ));
        }
        if self.silence_stub_secs <= 0.0 {
            return Err(SlidecastError::validation("silence_stub_secs must be > 0"));
        }
        if self.slide_workers == 0 {
            return Err(SlidecastError::validation("slide_workers must be >= 1"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut cfg = PipelineConfig::default();
        cfg.fps = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.canvas.width = 1281;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.subtopic_floor_secs = 90.0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.slide_workers = 0;
        assert!(cfg.validate().is_err());
    }
}
