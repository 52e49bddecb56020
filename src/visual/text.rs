//! Parley-based text shaping for slide frames.

use std::path::{Path, PathBuf};

use crate::foundation::error::{SlidecastError, SlidecastResult};

/// RGBA8 brush color carried through Parley layout styles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextBrush {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

/// Well-known font locations probed when no explicit font is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
];

/// Load font bytes from the configured path, or probe well-known system
/// locations for a sans-serif face.
pub fn resolve_font_bytes(configured: Option<&Path>) -> SlidecastResult<Vec<u8>> {
    if let Some(path) = configured {
        return std::fs::read(path).map_err(|e| {
            SlidecastError::validation(format!(
                "failed to read configured font '{}': {e}",
                path.display()
            ))
        });
    }
    for candidate in FONT_CANDIDATES {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return std::fs::read(&p).map_err(|e| {
                SlidecastError::validation(format!("failed to read font '{candidate}': {e}"))
            });
        }
    }
    Err(SlidecastError::validation(
        "no usable font found; set a font path explicitly",
    ))
}

/// Stateful helper for building Parley layouts from raw font bytes.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape and lay out plain text with the provided font bytes.
    pub fn layout_plain(
        &mut self,
        text: &str,
        font_bytes: &[u8],
        size_px: f32,
        brush: TextBrush,
        max_width_px: Option<f32>,
        centered: bool,
    ) -> SlidecastResult<parley::Layout<TextBrush>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(SlidecastError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            SlidecastError::validation("no font families registered from font bytes")
        })?;

        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| SlidecastError::validation("registered font family has no name"))?
            .to_string();

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        if let Some(w) = max_width_px {
            layout.break_all_lines(Some(w));
            let alignment = if centered {
                parley::Alignment::Center
            } else {
                parley::Alignment::Start
            };
            layout.align(Some(w), alignment, parley::AlignmentOptions::default());
        } else {
            layout.break_all_lines(None);
        }

        Ok(layout)
    }

    /// Like [`layout_plain`], but when the wrapped text exceeds
    /// `max_height_px` the text is cut at a char boundary and finished
    /// with an ellipsis instead of overflowing.
    ///
    /// [`layout_plain`]: Self::layout_plain
    #[allow(clippy::too_many_arguments)]
    pub fn layout_fitted(
        &mut self,
        text: &str,
        font_bytes: &[u8],
        size_px: f32,
        brush: TextBrush,
        max_width_px: f32,
        max_height_px: f32,
        centered: bool,
    ) -> SlidecastResult<parley::Layout<TextBrush>> {
        let full = self.layout_plain(text, font_bytes, size_px, brush, Some(max_width_px), centered)?;
        if full.height() <= max_height_px {
            return Ok(full);
        }

        // Binary search over char count for the longest prefix that fits.
        let chars: Vec<char> = text.chars().collect();
        let mut lo = 0usize;
        let mut hi = chars.len();
        let mut best: Option<parley::Layout<TextBrush>> = None;

        while lo < hi {
            let mid = lo + (hi - lo).div_ceil(2);
            let candidate = truncate_with_ellipsis(&chars, mid);
            let layout =
                self.layout_plain(&candidate, font_bytes, size_px, brush, Some(max_width_px), centered)?;
            if layout.height() <= max_height_px {
                best = Some(layout);
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        match best {
            Some(layout) => Ok(layout),
            // Not even the bare ellipsis fits; return it anyway rather
            // than fail the frame.
            None => self.layout_plain("\u{2026}", font_bytes, size_px, brush, Some(max_width_px), centered),
        }
    }
}

fn truncate_with_ellipsis(chars: &[char], keep: usize) -> String {
    let mut s: String = chars[..keep.min(chars.len())].iter().collect();
    let trimmed = s.trim_end().len();
    s.truncate(trimmed);
    s.push('\u{2026}');
    s
}
