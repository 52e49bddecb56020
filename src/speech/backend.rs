use std::{path::Path, time::Duration};

use crate::{
    encode::probe::probe_media_duration,
    foundation::error::{SlidecastError, SlidecastResult},
    speech::{AudioClip, BackendTier, VoiceConfig, VoiceGender},
};

/// A single text-to-speech provider.
///
/// Implementations write one audio file to `out_path` and report its
/// measured duration. Network and quota failures surface as
/// [`SlidecastError::Synthesis`] so the chain can move on.
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn tier(&self) -> BackendTier;
    fn synthesize(&self, text: &str, voice: &VoiceConfig, out_path: &Path)
    -> SlidecastResult<AudioClip>;
}

fn http_client(timeout: Duration) -> SlidecastResult<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SlidecastError::synthesis(format!("failed to build http client: {e}")))
}

fn classify_http_err(backend: &str, e: reqwest::Error) -> SlidecastError {
    if e.is_timeout() {
        SlidecastError::timeout(format!("{backend} request timed out: {e}"))
    } else {
        SlidecastError::synthesis(format!("{backend} request failed: {e}"))
    }
}

fn write_and_probe(
    backend: &str,
    bytes: &[u8],
    out_path: &Path,
    probe_timeout: Duration,
) -> SlidecastResult<AudioClip> {
    if bytes.is_empty() {
        return Err(SlidecastError::synthesis(format!(
            "{backend} returned an empty audio payload"
        )));
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        SlidecastError::synthesis(format!(
            "{backend} could not write '{}': {e}",
            out_path.display()
        ))
    })?;
    let duration = probe_media_duration(out_path, probe_timeout)?;
    AudioClip::new(out_path.to_path_buf(), duration)
}

/// ElevenLabs HTTP API. Requires an API key; skipped entirely by the
/// chain when none is configured.
pub struct ElevenLabsBackend {
    api_key: String,
    timeout: Duration,
}

impl ElevenLabsBackend {
    const API_BASE: &'static str = "https://api.elevenlabs.io/v1/text-to-speech";
    const DEFAULT_FEMALE_VOICE: &'static str = "21m00Tcm4TlvDq8ikWAM"; // Rachel
    const DEFAULT_MALE_VOICE: &'static str = "pNInz6obpgDQGcFmaJgB"; // Adam

    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self { api_key, timeout }
    }

    fn voice_id<'a>(&self, voice: &'a VoiceConfig) -> &'a str {
        match (&voice.voice_name, voice.gender) {
            (Some(name), _) => name,
            (None, VoiceGender::Male) => Self::DEFAULT_MALE_VOICE,
            // Neutral takes the service default voice.
            (None, VoiceGender::Female | VoiceGender::Neutral) => Self::DEFAULT_FEMALE_VOICE,
        }
    }
}

impl SpeechBackend for ElevenLabsBackend {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    fn tier(&self) -> BackendTier {
        BackendTier::Premium
    }

    #[tracing::instrument(skip(self, text), fields(chars = text.len()))]
    fn synthesize(
        &self,
        text: &str,
        voice: &VoiceConfig,
        out_path: &Path,
    ) -> SlidecastResult<AudioClip> {
        let client = http_client(self.timeout)?;
        let url = format!("{}/{}", Self::API_BASE, self.voice_id(voice));

        let resp = client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&serde_json::json!({
                "text": text,
                "model_id": "eleven_multilingual_v2",
            }))
            .send()
            .map_err(|e| classify_http_err("elevenlabs", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SlidecastError::synthesis(format!(
                "elevenlabs returned {status}: {}",
                body.trim()
            )));
        }

        let bytes = resp
            .bytes()
            .map_err(|e| classify_http_err("elevenlabs", e))?;
        write_and_probe("elevenlabs", &bytes, out_path, self.timeout)
    }
}

/// Free Google Translate TTS endpoint. No key required, but rate limited
/// and capped to short utterances, so text is chunked and the mp3 frames
/// concatenated.
pub struct GttsBackend {
    language: String,
    timeout: Duration,
}

impl GttsBackend {
    const ENDPOINT: &'static str = "https://translate.google.com/translate_tts";
    const MAX_CHUNK_CHARS: usize = 200;

    pub fn new(language: String, timeout: Duration) -> Self {
        Self { language, timeout }
    }

    /// Split on whitespace so no chunk exceeds the endpoint's limit.
    /// A single oversized word is hard-split rather than dropped.
    fn chunk_text(text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            if word.len() > Self::MAX_CHUNK_CHARS {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                let mut rest = word;
                while !rest.is_empty() {
                    let mut cut = rest.len().min(Self::MAX_CHUNK_CHARS);
                    while !rest.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    chunks.push(rest[..cut].to_string());
                    rest = &rest[cut..];
                }
                continue;
            }
            if !current.is_empty() && current.len() + 1 + word.len() > Self::MAX_CHUNK_CHARS {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

impl SpeechBackend for GttsBackend {
    fn name(&self) -> &'static str {
        "gtts"
    }

    fn tier(&self) -> BackendTier {
        BackendTier::Free
    }

    #[tracing::instrument(skip(self, text), fields(chars = text.len()))]
    fn synthesize(
        &self,
        text: &str,
        _voice: &VoiceConfig,
        out_path: &Path,
    ) -> SlidecastResult<AudioClip> {
        let chunks = Self::chunk_text(text);
        if chunks.is_empty() {
            return Err(SlidecastError::synthesis("gtts given empty text"));
        }

        let client = http_client(self.timeout)?;
        let total = chunks.len().to_string();
        // MPEG audio frames are self-delimiting, so plain byte
        // concatenation of the per-chunk responses plays back correctly.
        let mut payload = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let resp = client
                .get(Self::ENDPOINT)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.language.as_str()),
                    ("q", chunk.as_str()),
                    ("textlen", &chunk.len().to_string()),
                    ("idx", &idx.to_string()),
                    ("total", &total),
                ])
                .send()
                .map_err(|e| classify_http_err("gtts", e))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(SlidecastError::synthesis(format!(
                    "gtts returned {status} for chunk {idx}"
                )));
            }
            let bytes = resp.bytes().map_err(|e| classify_http_err("gtts", e))?;
            payload.extend_from_slice(&bytes);
        }

        write_and_probe("gtts", &payload, out_path, self.timeout)
    }
}

/// Last-resort backend that writes a silent WAV of fixed length.
///
/// Never touches the network or external tools, so its duration is known
/// exactly from the sample count and the chain can always terminate.
pub struct SilenceBackend {
    stub_secs: f64,
}

impl SilenceBackend {
    const SAMPLE_RATE: u32 = 24_000;

    pub fn new(stub_secs: f64) -> Self {
        Self { stub_secs }
    }
}

impl SpeechBackend for SilenceBackend {
    fn name(&self) -> &'static str {
        "silence"
    }

    fn tier(&self) -> BackendTier {
        BackendTier::Stub
    }

    fn synthesize(
        &self,
        _text: &str,
        _voice: &VoiceConfig,
        out_path: &Path,
    ) -> SlidecastResult<AudioClip> {
        write_silence_wav(out_path, self.stub_secs)
    }
}

/// Write a mono 16-bit silent WAV of `secs` seconds at 24 kHz.
pub fn write_silence_wav(out_path: &Path, secs: f64) -> SlidecastResult<AudioClip> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(SlidecastError::synthesis(format!(
            "silence duration must be positive, got {secs}"
        )));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SilenceBackend::SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let samples = (secs * f64::from(SilenceBackend::SAMPLE_RATE)).round().max(1.0) as u64;

    let mut writer = hound::WavWriter::create(out_path, spec).map_err(|e| {
        SlidecastError::synthesis(format!(
            "failed to create wav '{}': {e}",
            out_path.display()
        ))
    })?;
    for _ in 0..samples {
        writer
            .write_sample(0i16)
            .map_err(|e| SlidecastError::synthesis(format!("failed to write wav sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| SlidecastError::synthesis(format!("failed to finalize wav: {e}")))?;

    let duration = samples as f64 / f64::from(SilenceBackend::SAMPLE_RATE);
    AudioClip::new(out_path.to_path_buf(), duration)
}
