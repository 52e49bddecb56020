//! Media duration probing via `ffprobe`.

use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::{
    encode::ffmpeg::run_with_timeout,
    foundation::error::{SlidecastError, SlidecastResult},
};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Returns the container duration of `path` in seconds.
///
/// Fails on missing files, unparseable containers, and non-positive
/// durations; callers can rely on the returned value being `> 0`.
pub fn probe_media_duration(path: &Path, timeout: Duration) -> SlidecastResult<f64> {
    if !path.exists() {
        return Err(SlidecastError::validation(format!(
            "cannot probe '{}': file does not exist",
            path.display()
        )));
    }

    let args: Vec<String> = [
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain([path.display().to_string()])
    .collect();

    let out = run_with_timeout("ffprobe", &args, timeout)?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(SlidecastError::mux(format!(
            "ffprobe exited with status {} for '{}': {}",
            out.status,
            path.display(),
            stderr.trim()
        )));
    }

    let parsed: ProbeOutput = serde_json::from_slice(&out.stdout).map_err(|e| {
        SlidecastError::mux(format!(
            "failed to parse ffprobe json for '{}': {e}",
            path.display()
        ))
    })?;

    let duration = parsed
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| {
            SlidecastError::mux(format!(
                "ffprobe output for '{}' has no format.duration",
                path.display()
            ))
        })?
        .parse::<f64>()
        .map_err(|e| {
            SlidecastError::mux(format!(
                "ffprobe duration for '{}' is not a number: {e}",
                path.display()
            ))
        })?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(SlidecastError::mux(format!(
            "ffprobe reported non-positive duration {duration} for '{}'",
            path.display()
        )));
    }
    Ok(duration)
}
