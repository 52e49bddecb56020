use std::path::Path;

use crate::{
    config::PipelineConfig,
    foundation::error::{SlidecastError, SlidecastResult},
    speech::{
        AudioClip, VoiceConfig,
        backend::{ElevenLabsBackend, GttsBackend, SilenceBackend, SpeechBackend},
    },
};

/// Ordered text-to-speech fallback chain.
///
/// Backends are tried front to back; the first success wins. The chain
/// built by [`Synthesizer::from_config`] ends in [`SilenceBackend`], so a
/// clip with positive duration is produced unless the filesystem itself
/// fails.
pub struct Synthesizer {
    backends: Vec<Box<dyn SpeechBackend>>,
}

impl Synthesizer {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        let mut backends: Vec<Box<dyn SpeechBackend>> = Vec::new();
        // Missing API key means the premium tier is not configured; that
        // is a normal deployment, not a failure to log.
        if let Some(key) = &cfg.elevenlabs_api_key {
            backends.push(Box::new(ElevenLabsBackend::new(
                key.clone(),
                cfg.tts_timeout,
            )));
        }
        backends.push(Box::new(GttsBackend::new(
            cfg.tts_language.clone(),
            cfg.tts_timeout,
        )));
        backends.push(Box::new(SilenceBackend::new(cfg.silence_stub_secs)));
        Self { backends }
    }

    /// Build a chain from explicit backends. Used by tests to inject
    /// failing providers.
    pub fn with_backends(backends: Vec<Box<dyn SpeechBackend>>) -> Self {
        Self { backends }
    }

    #[tracing::instrument(skip(self, text), fields(chars = text.len()))]
    pub fn synthesize(
        &self,
        text: &str,
        voice: &VoiceConfig,
        out_path: &Path,
    ) -> SlidecastResult<AudioClip> {
        let mut last_err: Option<SlidecastError> = None;

        for backend in &self.backends {
            if !voice.max_tier.allows(backend.tier()) {
                tracing::debug!(backend = backend.name(), "skipping backend above allowed tier");
                continue;
            }
            match backend.synthesize(text, voice, out_path) {
                Ok(clip) => {
                    tracing::info!(
                        backend = backend.name(),
                        duration_secs = clip.duration_secs(),
                        out = %out_path.display(),
                        "synthesized narration"
                    );
                    return Ok(clip);
                }
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        error = %e,
                        "backend failed, falling through"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => SlidecastError::synthesis(format!(
                "every speech backend failed; last error: {e}"
            )),
            None => SlidecastError::synthesis("no speech backend is available for this voice"),
        })
    }
}
