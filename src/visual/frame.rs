//! Slide frame composition.
//!
//! Rendering is pure given `(scene, frame_index)`: the same inputs always
//! produce the same pixels, so frames can be re-rendered or rendered out
//! of order. Each render worker owns its own [`FrameRenderer`]; the
//! shared [`SlideScene`] is immutable.

use std::sync::Arc;

use crate::{
    foundation::{
        core::{Canvas, FrameRgba, frames_to_secs, secs_to_frames},
        error::{SlidecastError, SlidecastResult},
    },
    timing::SlideTiming,
    visual::text::{TextBrush, TextLayoutEngine},
};

const FADE_IN_SECS: f64 = 1.0;
const MARGIN_FRAC: f64 = 0.07;
const TITLE_TOP_FRAC: f64 = 0.07;
const TITLE_SIZE_FRAC: f64 = 0.075;
const TITLE_MAX_HEIGHT_FRAC: f64 = 0.18;
const BODY_TOP_FRAC: f64 = 0.30;
const BODY_SIZE_FRAC: f64 = 0.045;
const ITEM_GAP_FRAC: f64 = 0.02;
/// Character reveal completes within this fraction of the item's segment,
/// keeping text ahead of the narration.
const REVEAL_FRAC: f64 = 0.6;
const DIMMED_ALPHA: u8 = 150;

/// When each on-screen item appears and how long its reveal runs.
#[derive(Clone, Copy, Debug)]
struct ItemSchedule {
    reveal_start: f64,
    reveal_secs: f64,
}

/// Immutable per-slide render input, prebuilt once per slide.
pub struct SlideScene {
    pub canvas: Canvas,
    pub fps: u32,
    pub title: String,
    pub items: Vec<String>,
    pub timing: SlideTiming,
    pub background: Arc<FrameRgba>,
    pub font_bytes: Arc<Vec<u8>>,
    schedules: Vec<ItemSchedule>,
    /// True when items correspond one-to-one with narration segments, so
    /// the active item gets visual emphasis.
    emphasized: bool,
}

impl SlideScene {
    pub fn new(
        canvas: Canvas,
        fps: u32,
        title: String,
        items: Vec<String>,
        timing: SlideTiming,
        background: Arc<FrameRgba>,
        font_bytes: Arc<Vec<u8>>,
    ) -> SlidecastResult<Self> {
        if background.width != canvas.width || background.height != canvas.height {
            return Err(SlidecastError::validation(
                "background raster does not match the canvas size",
            ));
        }
        let emphasized = !items.is_empty() && items.len() == timing.subtopic_offsets.len();

        let schedules = if emphasized {
            timing
                .subtopic_offsets
                .iter()
                .zip(&timing.subtopic_slots)
                .map(|(&start, &slot)| ItemSchedule {
                    reveal_start: start,
                    reveal_secs: (slot * REVEAL_FRAC).max(0.1),
                })
                .collect()
        } else {
            // No per-item narration segments; stagger items evenly across
            // the slide instead.
            let n = items.len().max(1) as f64;
            let step = timing.duration_secs / (n + 1.0);
            (0..items.len())
                .map(|i| ItemSchedule {
                    reveal_start: step * i as f64,
                    reveal_secs: (step * REVEAL_FRAC).max(0.1),
                })
                .collect()
        };

        Ok(Self {
            canvas,
            fps,
            title,
            items,
            timing,
            background,
            font_bytes,
            schedules,
            emphasized,
        })
    }

    pub fn frame_count(&self) -> u64 {
        secs_to_frames(self.fps, self.timing.duration_secs)
    }

    /// Characters of item `i` visible at `at_secs`.
    fn revealed_chars(&self, item: usize, at_secs: f64) -> usize {
        let total = self.items[item].chars().count();
        let sched = self.schedules[item];
        if at_secs < sched.reveal_start {
            return 0;
        }
        let progress = ((at_secs - sched.reveal_start) / sched.reveal_secs).clamp(0.0, 1.0);
        ((total as f64) * progress).ceil() as usize
    }

    fn active_item(&self, at_secs: f64) -> Option<usize> {
        if !self.emphasized {
            return None;
        }
        Some(self.timing.active_subtopic(at_secs))
    }
}

/// One render worker. Parley contexts and the vello render context are
/// reused across frames; the background and font paints are cached by
/// scene identity.
pub struct FrameRenderer {
    engine: TextLayoutEngine,
    ctx: Option<vello_cpu::RenderContext>,
    bg_cache: Option<(usize, vello_cpu::Image)>,
    font_cache: Option<(usize, vello_cpu::peniko::FontData)>,
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRenderer {
    pub fn new() -> Self {
        Self {
            engine: TextLayoutEngine::new(),
            ctx: None,
            bg_cache: None,
            font_cache: None,
        }
    }

    pub fn render_frame(
        &mut self,
        scene: &SlideScene,
        frame_index: u64,
    ) -> SlidecastResult<FrameRgba> {
        let (w16, h16) = canvas_u16(scene.canvas)?;
        let at_secs = frames_to_secs(scene.fps, frame_index);

        let bg = self.background_paint(scene)?;
        let font = self.font_paint(scene);

        let wf = f64::from(scene.canvas.width);
        let hf = f64::from(scene.canvas.height);
        let margin = wf * MARGIN_FRAC;
        let text_width = (wf - 2.0 * margin) as f32;
        let fade = (at_secs / FADE_IN_SECS).clamp(0.0, 1.0);
        let fade_alpha = |base: u8| -> u8 { ((f64::from(base)) * fade).round() as u8 };

        // Lay out all text before touching the render context so the
        // engine borrow ends first.
        let title_layout = self.engine.layout_fitted(
            &scene.title,
            &scene.font_bytes,
            (hf * TITLE_SIZE_FRAC) as f32,
            TextBrush::rgba(255, 255, 255, fade_alpha(255)),
            text_width,
            (hf * TITLE_MAX_HEIGHT_FRAC) as f32,
            true,
        )?;

        let active = scene.active_item(at_secs);
        let body_size = (hf * BODY_SIZE_FRAC) as f32;
        let body_bottom = (hf * (1.0 - MARGIN_FRAC)) as f32;
        let mut cursor_y = (hf * BODY_TOP_FRAC) as f32;
        let gap = (hf * ITEM_GAP_FRAC) as f32;

        let mut item_layouts = Vec::with_capacity(scene.items.len());
        for (i, item) in scene.items.iter().enumerate() {
            let shown = scene.revealed_chars(i, at_secs);
            if shown == 0 {
                continue;
            }
            let visible: String = item.chars().take(shown).collect();
            let text = format!("\u{2022} {visible}");

            let base_alpha = match active {
                Some(a) if a != i => DIMMED_ALPHA,
                _ => 255,
            };
            let brush = TextBrush::rgba(255, 255, 255, fade_alpha(base_alpha));

            let remaining = body_bottom - cursor_y;
            if remaining < body_size {
                break;
            }
            let layout = self.engine.layout_fitted(
                &text,
                &scene.font_bytes,
                body_size,
                brush,
                text_width,
                remaining,
                false,
            )?;
            let height = layout.height();
            item_layouts.push((cursor_y, layout));
            cursor_y += height + gap;
        }

        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w16 && ctx.height() == h16 => ctx,
            _ => vello_cpu::RenderContext::new(w16, h16),
        };
        ctx.reset();

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(bg);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, wf, hf));

        draw_layout(
            &mut ctx,
            &font,
            &title_layout,
            margin,
            hf * TITLE_TOP_FRAC,
        );
        for (y, layout) in &item_layouts {
            draw_layout(&mut ctx, &font, layout, margin, f64::from(*y));
        }

        let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);
        self.ctx = Some(ctx);

        Ok(FrameRgba {
            width: scene.canvas.width,
            height: scene.canvas.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn background_paint(&mut self, scene: &SlideScene) -> SlidecastResult<vello_cpu::Image> {
        let key = Arc::as_ptr(&scene.background) as usize;
        if let Some((cached_key, img)) = &self.bg_cache
            && *cached_key == key
        {
            return Ok(img.clone());
        }
        let img = premul_frame_to_image(&scene.background)?;
        self.bg_cache = Some((key, img.clone()));
        Ok(img)
    }

    fn font_paint(&mut self, scene: &SlideScene) -> vello_cpu::peniko::FontData {
        let key = Arc::as_ptr(&scene.font_bytes) as usize;
        if let Some((cached_key, font)) = &self.font_cache
            && *cached_key == key
        {
            return font.clone();
        }
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(scene.font_bytes.as_ref().clone()),
            0,
        );
        self.font_cache = Some((key, font.clone()));
        font
    }
}

fn draw_layout(
    ctx: &mut vello_cpu::RenderContext,
    font: &vello_cpu::peniko::FontData,
    layout: &parley::Layout<TextBrush>,
    x: f64,
    y: f64,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::translate((x, y)));
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let brush = run.style().brush;
            if brush.a == 0 {
                continue;
            }
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));
            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}

fn canvas_u16(canvas: Canvas) -> SlidecastResult<(u16, u16)> {
    let w: u16 = canvas
        .width
        .try_into()
        .map_err(|_| SlidecastError::validation("canvas width exceeds u16"))?;
    let h: u16 = canvas
        .height
        .try_into()
        .map_err(|_| SlidecastError::validation("canvas height exceeds u16"))?;
    Ok((w, h))
}

fn premul_frame_to_image(frame: &FrameRgba) -> SlidecastResult<vello_cpu::Image> {
    let (w16, h16) = canvas_u16(Canvas {
        width: frame.width,
        height: frame.height,
    })?;
    let expected = (frame.width as usize) * (frame.height as usize) * 4;
    if frame.data.len() != expected {
        return Err(SlidecastError::validation(
            "background buffer size mismatch",
        ));
    }
    if !frame.premultiplied {
        return Err(SlidecastError::validation(
            "background raster must be premultiplied",
        ));
    }
    let mut pixels =
        Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(expected / 4);
    for px in frame.data.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(
            vello_cpu::Pixmap::from_parts_with_opacity(pixels, w16, h16, true),
        )),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}
