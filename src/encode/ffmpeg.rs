use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
    time::{Duration, Instant},
};

use crate::foundation::{
    core::{FrameRgba, mul_div255_u16},
    error::{SlidecastError, SlidecastResult},
};

pub fn is_ffmpeg_on_path() -> bool {
    tool_responds("ffmpeg")
}

pub fn is_ffprobe_on_path() -> bool {
    tool_responds("ffprobe")
}

fn tool_responds(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> SlidecastResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Run an external tool to completion with a hard deadline.
///
/// The child is killed on timeout; the call never hangs on a wedged encoder.
/// stdout/stderr are captured for diagnostics.
pub fn run_with_timeout(
    tool: &str,
    args: &[String],
    timeout: Duration,
) -> SlidecastResult<std::process::Output> {
    tracing::debug!(tool, ?args, "spawning external process");
    let started = Instant::now();

    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            SlidecastError::mux(format!(
                "failed to spawn {tool} (is it installed and on PATH?): {e}"
            ))
        })?;

    let stdout_drain = drain_pipe(child.stdout.take());
    let stderr_drain = drain_pipe(child.stderr.take());

    let status = wait_with_deadline(&mut child, timeout).inspect_err(|_| {
        let _ = child.kill();
        let _ = child.wait();
        tracing::warn!(tool, timeout_secs = timeout.as_secs_f64(), "killed after deadline");
    })?;

    let stdout = join_drain(stdout_drain)?;
    let stderr = join_drain(stderr_drain)?;
    tracing::debug!(
        tool,
        elapsed_ms = started.elapsed().as_millis() as u64,
        code = status.code(),
        "external process finished"
    );

    Ok(std::process::Output {
        status,
        stdout,
        stderr,
    })
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> SlidecastResult<std::process::ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    return Err(SlidecastError::timeout(format!(
                        "external process exceeded {:.0}s bound",
                        timeout.as_secs_f64()
                    )));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                return Err(SlidecastError::mux(format!(
                    "failed to poll external process: {e}"
                )));
            }
        }
    }
}

fn drain_pipe<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut r| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            r.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_drain(
    handle: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
) -> SlidecastResult<Vec<u8>> {
    match handle {
        Some(h) => h
            .join()
            .map_err(|_| SlidecastError::mux("process output drain thread panicked"))?
            .map_err(|e| SlidecastError::mux(format!("process output read failed: {e}"))),
        None => Ok(Vec::new()),
    }
}

/// Run ffmpeg with `args`, mapping non-zero exit and missing output to
/// [`SlidecastError::Mux`]. The exact argv and elapsed time are logged.
pub fn run_ffmpeg(args: &[String], expect_output: &Path, timeout: Duration) -> SlidecastResult<()> {
    let started = Instant::now();
    tracing::info!(cmd = %format!("ffmpeg {}", args.join(" ")), "running ffmpeg");

    let out = run_with_timeout("ffmpeg", args, timeout)?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(SlidecastError::mux(format!(
            "ffmpeg exited with status {}: {}",
            out.status,
            stderr.trim()
        )));
    }
    if !expect_output.exists() {
        return Err(SlidecastError::mux(format!(
            "ffmpeg reported success but output '{}' is missing",
            expect_output.display()
        )));
    }

    tracing::info!(
        out = %expect_output.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ffmpeg finished"
    );
    Ok(())
}

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn validate(&self) -> SlidecastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SlidecastError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(SlidecastError::validation("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // Default settings target yuv420p output for maximum compatibility.
            return Err(SlidecastError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }
}

/// Streams raw RGBA8 frames into a spawned `ffmpeg`, producing a silent
/// H.264 MP4 track.
///
/// Frames are flattened over an opaque background before hitting stdin;
/// ffmpeg does not understand premultiplied alpha.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    bg_rgba: [u8; 4],
    timeout: Duration,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig, bg_rgba: [u8; 4], timeout: Duration) -> SlidecastResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(SlidecastError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(SlidecastError::mux(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.arg(if cfg.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&cfg.out_path);

        tracing::info!(out = %cfg.out_path.display(), fps = cfg.fps, "spawning ffmpeg raw-frame encoder");
        let mut child = cmd.spawn().map_err(|e| {
            SlidecastError::mux(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SlidecastError::mux("failed to open ffmpeg stdin (unexpected)"))?;
        let stderr_drain = drain_pipe(child.stderr.take());

        Ok(Self {
            scratch: vec![0u8; (cfg.width * cfg.height * 4) as usize],
            cfg,
            bg_rgba,
            timeout,
            child,
            stdin: Some(stdin),
            stderr_drain,
        })
    }

    pub fn encode_frame(&mut self, frame: &FrameRgba) -> SlidecastResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(SlidecastError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(SlidecastError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_to_opaque_rgba8(
            &mut self.scratch,
            &frame.data,
            frame.premultiplied,
            self.bg_rgba,
        )?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SlidecastError::mux("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin
            .write_all(&self.scratch)
            .map_err(|e| SlidecastError::mux(format!("failed to write frame to ffmpeg stdin: {e}")))
    }

    /// Close stdin and wait (bounded) for the encoder to finish.
    pub fn finish(mut self) -> SlidecastResult<()> {
        drop(self.stdin.take());

        let status = wait_with_deadline(&mut self.child, self.timeout).inspect_err(|_| {
            let _ = self.child.kill();
            let _ = self.child.wait();
        })?;
        let stderr_bytes = join_drain(self.stderr_drain.take())?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(SlidecastError::mux(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        if !self.cfg.out_path.exists() {
            return Err(SlidecastError::mux(format!(
                "ffmpeg reported success but output '{}' is missing",
                self.cfg.out_path.display()
            )));
        }
        Ok(())
    }
}

fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> SlidecastResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(SlidecastError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            d[3] = 255;
            continue;
        }

        let inv = 255u16 - a;
        let (r, g, b) = if src_is_premul {
            (
                s[0] as u16 + mul_div255_u16(bg_r, inv),
                s[1] as u16 + mul_div255_u16(bg_g, inv),
                s[2] as u16 + mul_div255_u16(bg_b, inv),
            )
        } else {
            (
                mul_div255_u16(s[0] as u16, a) + mul_div255_u16(bg_r, inv),
                mul_div255_u16(s[1] as u16, a) + mul_div255_u16(bg_g, inv),
                mul_div255_u16(s[2] as u16, a) + mul_div255_u16(bg_b, inv),
            )
        };

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}
