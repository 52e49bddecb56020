use std::path::Path;

use slidecast::{
    SlidecastError, SlidecastResult,
    speech::{
        AudioClip, BackendTier, VoiceConfig,
        backend::{SilenceBackend, SpeechBackend, write_silence_wav},
        synthesizer::Synthesizer,
    },
};

struct OutageBackend(BackendTier);

impl SpeechBackend for OutageBackend {
    fn name(&self) -> &'static str {
        "outage"
    }

    fn tier(&self) -> BackendTier {
        self.0
    }

    fn synthesize(
        &self,
        _text: &str,
        _voice: &VoiceConfig,
        _out_path: &Path,
    ) -> SlidecastResult<AudioClip> {
        Err(SlidecastError::synthesis("quota exhausted"))
    }
}

/// Stand-in for a working free backend: produces a real file with a
/// measurable duration, no network involved.
struct FakeFreeBackend;

impl SpeechBackend for FakeFreeBackend {
    fn name(&self) -> &'static str {
        "fake-free"
    }

    fn tier(&self) -> BackendTier {
        BackendTier::Free
    }

    fn synthesize(
        &self,
        _text: &str,
        _voice: &VoiceConfig,
        out_path: &Path,
    ) -> SlidecastResult<AudioClip> {
        write_silence_wav(out_path, 5.0)
    }
}

fn scratch(name: &str) -> std::path::PathBuf {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("target/test-chain");
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn premium_failure_falls_back_to_free_backend() {
    let synth = Synthesizer::with_backends(vec![
        Box::new(OutageBackend(BackendTier::Premium)),
        Box::new(FakeFreeBackend),
        Box::new(SilenceBackend::new(3.0)),
    ]);

    let out = scratch("premium_down.wav");
    let clip = synth
        .synthesize("hello world", &VoiceConfig::default(), &out)
        .unwrap();
    // The free backend's 5s output was used, not the 3s terminal stub.
    assert!((clip.duration_secs() - 5.0).abs() < 1e-9);
    assert!(clip.path().exists());
}

#[test]
fn every_network_backend_down_still_yields_positive_audio() {
    let synth = Synthesizer::with_backends(vec![
        Box::new(OutageBackend(BackendTier::Premium)),
        Box::new(OutageBackend(BackendTier::Free)),
        Box::new(SilenceBackend::new(3.0)),
    ]);

    let out = scratch("all_down.wav");
    let clip = synth
        .synthesize("hello world", &VoiceConfig::default(), &out)
        .unwrap();
    assert!(clip.duration_secs() > 0.0);
}
