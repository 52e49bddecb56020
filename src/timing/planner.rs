//! Slide timing computation.
//!
//! The planner is pure arithmetic over measured clip durations; it never
//! touches audio itself. Offsets and durations are computed once and the
//! resulting [`SlideTiming`] is never mutated afterwards.

use crate::{
    config::PipelineConfig,
    foundation::error::{SlidecastError, SlidecastResult},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TimingMode {
    /// Fixed short duration per slide; audio is truncated to fit.
    Quick,
    /// Audio-driven per-subtopic timing.
    #[default]
    Detailed,
}

/// On-screen schedule for one slide.
#[derive(Clone, Debug, PartialEq)]
pub struct SlideTiming {
    pub slide_index: usize,
    /// Total visual duration, always >= the slide's summed audio.
    pub duration_secs: f64,
    /// Start of each subtopic's segment, relative to slide start.
    /// Always begins with 0.0 and is strictly increasing.
    pub subtopic_offsets: Vec<f64>,
    /// Visual slot width per subtopic (clip duration after floor/ceiling
    /// clamping). Same length as `subtopic_offsets`.
    pub subtopic_slots: Vec<f64>,
}

impl SlideTiming {
    /// Index of the subtopic active at `at_secs`, for emphasis switching.
    pub fn active_subtopic(&self, at_secs: f64) -> usize {
        self.subtopic_offsets
            .iter()
            .rposition(|&off| at_secs >= off)
            .unwrap_or(0)
    }
}

pub fn plan_quick(slide_count: usize, cfg: &PipelineConfig) -> Vec<SlideTiming> {
    (0..slide_count)
        .map(|slide_index| SlideTiming {
            slide_index,
            duration_secs: cfg.quick_secs_per_slide,
            subtopic_offsets: vec![0.0],
            subtopic_slots: vec![cfg.quick_secs_per_slide],
        })
        .collect()
}

/// Detailed-mode timing for one slide from measured clip durations.
///
/// Each subtopic occupies a visual slot of its clip duration clamped to
/// `[subtopic_floor_secs, subtopic_ceiling_secs]`; slots are separated by
/// the inter-subtopic pause and followed by the trailing buffer. Audio
/// shorter than its slot is padded with silence at mux time, never the
/// other way around.
pub fn plan_detailed(
    slide_index: usize,
    clip_durations: &[f64],
    cfg: &PipelineConfig,
) -> SlidecastResult<SlideTiming> {
    if clip_durations.is_empty() {
        return Err(SlidecastError::validation(format!(
            "slide {slide_index} has no narration clips to plan from"
        )));
    }
    if let Some(bad) = clip_durations
        .iter()
        .find(|d| !d.is_finite() || **d <= 0.0)
    {
        return Err(SlidecastError::validation(format!(
            "slide {slide_index} has a non-positive clip duration {bad}"
        )));
    }

    let mut offsets = Vec::with_capacity(clip_durations.len());
    let mut slots = Vec::with_capacity(clip_durations.len());
    let mut cursor = 0.0f64;

    for &clip in clip_durations {
        // The ceiling bounds the visual slot; the assembler trims any
        // clip that overruns its slot, so played audio never exceeds it.
        let slot = clip
            .max(cfg.subtopic_floor_secs)
            .min(cfg.subtopic_ceiling_secs);
        offsets.push(cursor);
        slots.push(slot);
        cursor += slot + cfg.subtopic_pause_secs;
    }
    // Last pause is replaced by the trailing buffer.
    let duration_secs = cursor - cfg.subtopic_pause_secs + cfg.trailing_buffer_secs;

    Ok(SlideTiming {
        slide_index,
        duration_secs,
        subtopic_offsets: offsets,
        subtopic_slots: slots,
    })
}

/// Word-count planning heuristic for when no audio exists yet
/// (~150 words per minute, so words / 2.5 seconds), clamped to the
/// configured per-subtopic bounds.
pub fn estimate_secs(text: &str, cfg: &PipelineConfig) -> f64 {
    let words = text.split_whitespace().count() as f64;
    (words / 2.5 + cfg.trailing_buffer_secs)
        .max(cfg.subtopic_floor_secs)
        .min(cfg.subtopic_ceiling_secs)
}

pub fn total_duration(timings: &[SlideTiming]) -> f64 {
    timings.iter().map(|t| t.duration_secs).sum()
}

/// Scale every slide's schedule down uniformly so the planned total fits
/// `max_total_secs`. Returns the applied scale factor (1.0 when the plan
/// already fits). Offsets and slots shrink together, so clip audio that
/// no longer fits its slot is trimmed at assembly like any other overrun.
pub fn clamp_total(timings: &mut [SlideTiming], max_total_secs: f64) -> f64 {
    let total = total_duration(timings);
    if total <= max_total_secs || total <= 0.0 {
        return 1.0;
    }
    let scale = max_total_secs / total;
    for timing in timings.iter_mut() {
        timing.duration_secs *= scale;
        for offset in &mut timing.subtopic_offsets {
            *offset *= scale;
        }
        for slot in &mut timing.subtopic_slots {
            *slot *= scale;
        }
    }
    scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn quick_mode_is_fixed_per_slide() {
        let timings = plan_quick(3, &cfg());
        assert_eq!(timings.len(), 3);
        for (i, t) in timings.iter().enumerate() {
            assert_eq!(t.slide_index, i);
            assert!((t.duration_secs - 3.0).abs() < 1e-9);
            assert_eq!(t.subtopic_offsets, vec![0.0]);
        }
        assert!((total_duration(&timings) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn detailed_offsets_accumulate_slots_and_pauses() {
        // Three 22s subtopic clips with the default 0.3s pause.
        let t = plan_detailed(0, &[22.0, 22.0, 22.0], &cfg()).unwrap();
        assert_eq!(t.subtopic_offsets.len(), 3);
        assert!((t.subtopic_offsets[0] - 0.0).abs() < 1e-9);
        assert!((t.subtopic_offsets[1] - 22.3).abs() < 1e-9);
        assert!((t.subtopic_offsets[2] - 44.6).abs() < 1e-9);
        // 3*22 + 2*0.3 + 1.5 trailing buffer
        assert!((t.duration_secs - 68.1).abs() < 1e-9);
    }

    #[test]
    fn visual_duration_always_covers_audio() {
        let clips = [4.0, 21.0, 59.0];
        let t = plan_detailed(2, &clips, &cfg()).unwrap();
        let audio_sum: f64 = clips.iter().sum();
        assert!(t.duration_secs >= audio_sum + cfg().trailing_buffer_secs);
    }

    #[test]
    fn short_clips_are_floored_to_minimum_slot() {
        let c = cfg();
        let t = plan_detailed(0, &[2.0, 2.0], &c).unwrap();
        assert!((t.subtopic_slots[0] - c.subtopic_floor_secs).abs() < 1e-9);
        assert!((t.subtopic_offsets[1] - (c.subtopic_floor_secs + c.subtopic_pause_secs)).abs() < 1e-9);
    }

    #[test]
    fn long_clips_are_capped_at_ceiling() {
        let c = cfg();
        let t = plan_detailed(0, &[500.0], &c).unwrap();
        assert!((t.subtopic_slots[0] - c.subtopic_ceiling_secs).abs() < 1e-9);
    }

    #[test]
    fn empty_or_invalid_clips_are_rejected() {
        assert!(plan_detailed(0, &[], &cfg()).is_err());
        assert!(plan_detailed(0, &[5.0, 0.0], &cfg()).is_err());
        assert!(plan_detailed(0, &[f64::NAN], &cfg()).is_err());
    }

    #[test]
    fn estimate_uses_150_wpm_with_clamping() {
        let c = cfg();
        // 100 words -> 40s + 1.5s buffer, inside [20, 60].
        let text = "word ".repeat(100);
        assert!((estimate_secs(&text, &c) - 41.5).abs() < 1e-9);
        // Tiny text clamps up to the floor.
        assert!((estimate_secs("hi there", &c) - c.subtopic_floor_secs).abs() < 1e-9);
        // Huge text clamps down to the ceiling.
        let long = "word ".repeat(100_000);
        assert!((estimate_secs(&long, &c) - c.subtopic_ceiling_secs).abs() < 1e-9);
    }

    #[test]
    fn clamp_total_is_a_noop_under_the_ceiling() {
        let mut timings = plan_quick(3, &cfg());
        let scale = clamp_total(&mut timings, 300.0);
        assert!((scale - 1.0).abs() < 1e-9);
        assert!((total_duration(&timings) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_total_scales_schedules_proportionally() {
        let c = cfg();
        let mut timings = vec![
            plan_detailed(0, &[22.0, 22.0, 22.0], &c).unwrap(),
            plan_detailed(1, &[22.0, 22.0, 22.0], &c).unwrap(),
        ];
        // Two 68.1s slides against a 68.1s ceiling halves everything.
        let scale = clamp_total(&mut timings, 68.1);
        assert!((scale - 0.5).abs() < 1e-9);
        assert!((total_duration(&timings) - 68.1).abs() < 1e-9);
        for t in &timings {
            assert!((t.subtopic_offsets[1] - 11.15).abs() < 1e-9);
            assert!((t.subtopic_slots[0] - 11.0).abs() < 1e-9);
            assert!(t.subtopic_offsets.windows(2).all(|w| w[1] > w[0]));
        }
    }

    #[test]
    fn active_subtopic_follows_offsets() {
        let t = plan_detailed(0, &[22.0, 22.0, 22.0], &cfg()).unwrap();
        assert_eq!(t.active_subtopic(0.0), 0);
        assert_eq!(t.active_subtopic(10.0), 0);
        assert_eq!(t.active_subtopic(22.3), 1);
        assert_eq!(t.active_subtopic(44.59), 1);
        assert_eq!(t.active_subtopic(60.0), 2);
    }
}
