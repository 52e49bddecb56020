//! Topic-driven gradient backgrounds.
//!
//! Selection is a pure function of `(topic, slide_index)` so renders are
//! reproducible; pixels are cached per request keyed by category and
//! palette index, never in process-wide state.

use std::{collections::HashMap, sync::Arc};

use crate::foundation::{
    core::{Canvas, FrameRgba},
    error::{SlidecastError, SlidecastResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TopicCategory {
    Technology,
    Science,
    Business,
    Education,
    Health,
    Arts,
    Nature,
    Space,
    Default,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GradientDirection {
    Vertical,
    Horizontal,
    Diagonal,
    Radial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GradientSpec {
    pub start: [u8; 3],
    pub end: [u8; 3],
    pub direction: GradientDirection,
}

const fn g(start: [u8; 3], end: [u8; 3], direction: GradientDirection) -> GradientSpec {
    GradientSpec {
        start,
        end,
        direction,
    }
}

use GradientDirection::{Diagonal, Horizontal, Radial, Vertical};

const TECHNOLOGY: &[GradientSpec] = &[
    g([15, 32, 63], [41, 84, 144], Diagonal),
    g([20, 30, 48], [36, 59, 85], Vertical),
    g([12, 42, 74], [0, 120, 160], Radial),
    g([24, 24, 46], [70, 60, 120], Horizontal),
];

const SCIENCE: &[GradientSpec] = &[
    g([10, 36, 52], [26, 83, 92], Vertical),
    g([16, 44, 72], [52, 110, 139], Diagonal),
    g([8, 28, 40], [40, 96, 120], Radial),
];

const BUSINESS: &[GradientSpec] = &[
    g([35, 37, 38], [65, 67, 69], Vertical),
    g([44, 62, 80], [76, 100, 127], Diagonal),
    g([28, 34, 54], [58, 66, 98], Horizontal),
];

const EDUCATION: &[GradientSpec] = &[
    g([26, 42, 108], [60, 90, 170], Vertical),
    g([33, 58, 96], [72, 110, 160], Diagonal),
    g([24, 48, 80], [96, 128, 176], Radial),
];

const HEALTH: &[GradientSpec] = &[
    g([19, 78, 94], [56, 130, 130], Vertical),
    g([14, 60, 70], [38, 110, 105], Diagonal),
    g([22, 70, 82], [70, 140, 140], Horizontal),
];

const ARTS: &[GradientSpec] = &[
    g([88, 28, 92], [150, 60, 120], Diagonal),
    g([70, 24, 80], [130, 70, 150], Radial),
    g([60, 20, 70], [110, 50, 110], Vertical),
];

const NATURE: &[GradientSpec] = &[
    g([22, 58, 34], [60, 110, 60], Vertical),
    g([18, 48, 30], [44, 96, 52], Diagonal),
    g([26, 64, 40], [80, 130, 76], Radial),
];

const SPACE: &[GradientSpec] = &[
    g([8, 8, 24], [30, 24, 66], Radial),
    g([6, 10, 28], [24, 30, 80], Vertical),
    g([12, 8, 34], [46, 28, 90], Diagonal),
];

const DEFAULT: &[GradientSpec] = &[
    g([30, 34, 44], [58, 64, 82], Vertical),
    g([26, 30, 40], [52, 58, 76], Diagonal),
    g([34, 38, 50], [64, 72, 92], Radial),
];

const CATEGORY_KEYWORDS: &[(TopicCategory, &[&str])] = &[
    (
        TopicCategory::Technology,
        &[
            "computer", "software", "program", "code", "internet", "network", "data", "digital",
            "algorithm", "robot", "machine", "technology", "cyber", "ai",
        ],
    ),
    (
        TopicCategory::Science,
        &[
            "physics", "chemistry", "biology", "science", "atom", "molecule", "gravity", "energy",
            "experiment", "cell", "evolution", "quantum",
        ],
    ),
    (
        TopicCategory::Business,
        &[
            "business", "market", "finance", "economy", "money", "startup", "management",
            "investment", "trade", "company",
        ],
    ),
    (
        TopicCategory::Education,
        &[
            "education", "learning", "school", "teaching", "student", "study", "curriculum",
            "literacy",
        ],
    ),
    (
        TopicCategory::Health,
        &[
            "health", "medicine", "medical", "disease", "nutrition", "fitness", "anatomy",
            "wellness", "therapy",
        ],
    ),
    (
        TopicCategory::Arts,
        &[
            "art", "music", "painting", "literature", "poetry", "theater", "design", "film",
            "culture",
        ],
    ),
    (
        TopicCategory::Nature,
        &[
            "nature", "animal", "plant", "forest", "ocean", "climate", "weather", "ecosystem",
            "wildlife", "river",
        ],
    ),
    (
        TopicCategory::Space,
        &[
            "space", "planet", "star", "galaxy", "astronomy", "cosmos", "orbit", "universe",
            "rocket", "moon",
        ],
    ),
];

pub fn palette(category: TopicCategory) -> &'static [GradientSpec] {
    match category {
        TopicCategory::Technology => TECHNOLOGY,
        TopicCategory::Science => SCIENCE,
        TopicCategory::Business => BUSINESS,
        TopicCategory::Education => EDUCATION,
        TopicCategory::Health => HEALTH,
        TopicCategory::Arts => ARTS,
        TopicCategory::Nature => NATURE,
        TopicCategory::Space => SPACE,
        TopicCategory::Default => DEFAULT,
    }
}

/// Keyword-match the topic into a category. A tie between categories (or
/// no match at all) resolves to [`TopicCategory::Default`].
pub fn categorize(topic: &str) -> TopicCategory {
    let lower = topic.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut best = TopicCategory::Default;
    let mut best_hits = 0usize;
    let mut tied = false;

    for (category, keywords) in CATEGORY_KEYWORDS {
        let hits = keywords
            .iter()
            .filter(|kw| words.iter().any(|w| w == *kw))
            .count();
        if hits > best_hits {
            best = *category;
            best_hits = hits;
            tied = false;
        } else if hits == best_hits && hits > 0 {
            tied = true;
        }
    }

    if best_hits == 0 || tied {
        TopicCategory::Default
    } else {
        best
    }
}

/// `select(topic, slide_index)`: deterministic gradient pick, cycling
/// through the category's palette by slide index.
pub fn select(topic: &str, slide_index: usize) -> (TopicCategory, GradientSpec) {
    let category = categorize(topic);
    let gradients = palette(category);
    (category, gradients[slide_index % gradients.len()])
}

/// Rasterize a gradient to an opaque RGBA8 frame. Output alpha is always
/// 255, so the buffer is valid both straight and premultiplied.
pub fn render_gradient(spec: &GradientSpec, canvas: Canvas) -> SlidecastResult<FrameRgba> {
    if canvas.width == 0 || canvas.height == 0 {
        return Err(SlidecastError::validation(
            "background canvas must be non-zero",
        ));
    }
    let w = canvas.width as usize;
    let h = canvas.height as usize;
    let mut data = vec![0u8; w * h * 4];

    let wf = (w.max(2) - 1) as f32;
    let hf = (h.max(2) - 1) as f32;
    let cx = wf / 2.0;
    let cy = hf / 2.0;
    let max_r = (cx * cx + cy * cy).sqrt().max(1.0);

    for y in 0..h {
        for x in 0..w {
            let t = match spec.direction {
                GradientDirection::Vertical => y as f32 / hf,
                GradientDirection::Horizontal => x as f32 / wf,
                GradientDirection::Diagonal => (x as f32 + y as f32) / (wf + hf),
                GradientDirection::Radial => {
                    let dx = x as f32 - cx;
                    let dy = y as f32 - cy;
                    (dx * dx + dy * dy).sqrt() / max_r
                }
            }
            .clamp(0.0, 1.0);

            let idx = (y * w + x) * 4;
            for c in 0..3 {
                let a = spec.start[c] as f32;
                let b = spec.end[c] as f32;
                data[idx + c] = (a + (b - a) * t).round().clamp(0.0, 255.0) as u8;
            }
            data[idx + 3] = 255;
        }
    }

    Ok(FrameRgba {
        width: canvas.width,
        height: canvas.height,
        data,
        premultiplied: true,
    })
}

/// Request-scoped background pixel cache keyed by `(category, palette
/// index)`; slides sharing a gradient share one raster.
pub struct BackgroundCache {
    canvas: Canvas,
    frames: HashMap<(TopicCategory, usize), Arc<FrameRgba>>,
}

impl BackgroundCache {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            frames: HashMap::new(),
        }
    }

    pub fn get(&mut self, topic: &str, slide_index: usize) -> SlidecastResult<Arc<FrameRgba>> {
        let category = categorize(topic);
        let gradients = palette(category);
        let palette_idx = slide_index % gradients.len();
        if let Some(frame) = self.frames.get(&(category, palette_idx)) {
            return Ok(frame.clone());
        }
        let frame = Arc::new(render_gradient(&gradients[palette_idx], self.canvas)?);
        self.frames
            .insert((category, palette_idx), frame.clone());
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorization_matches_keywords() {
        assert_eq!(categorize("Introduction to Quantum Physics"), TopicCategory::Science);
        assert_eq!(categorize("Machine code and the internet"), TopicCategory::Technology);
        assert_eq!(categorize("The planets of our galaxy"), TopicCategory::Space);
        assert_eq!(categorize("Knitting for beginners"), TopicCategory::Default);
    }

    #[test]
    fn ambiguous_topics_resolve_to_default() {
        // One science hit, one space hit.
        assert_eq!(categorize("gravity in orbit"), TopicCategory::Default);
    }

    #[test]
    fn keyword_matching_is_whole_word() {
        // "art" must not match inside "startup".
        assert_eq!(categorize("startup finance"), TopicCategory::Business);
    }

    #[test]
    fn selection_is_deterministic_and_cycles() {
        let (cat_a, grad_a) = select("Gravity and energy", 0);
        let (cat_b, grad_b) = select("Gravity and energy", 0);
        assert_eq!(cat_a, cat_b);
        assert_eq!(grad_a, grad_b);

        let n = palette(cat_a).len();
        let (_, wrapped) = select("Gravity and energy", n);
        assert_eq!(wrapped, grad_a);

        let (_, next) = select("Gravity and energy", 1);
        assert_ne!(next, grad_a);
    }

    #[test]
    fn gradient_pixels_are_opaque_and_interpolate() {
        let canvas = Canvas {
            width: 8,
            height: 8,
        };
        let spec = g([0, 0, 0], [255, 255, 255], Vertical);
        let frame = render_gradient(&spec, canvas).unwrap();
        assert_eq!(frame.data.len(), 8 * 8 * 4);
        // Top row is the start color, bottom row the end color.
        assert_eq!(&frame.data[0..4], &[0, 0, 0, 255]);
        let last = frame.data.len() - 4;
        assert_eq!(&frame.data[last..], &[255, 255, 255, 255]);
        assert!(frame.data.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn cache_returns_shared_rasters() {
        let canvas = Canvas {
            width: 16,
            height: 16,
        };
        let mut cache = BackgroundCache::new(canvas);
        let a = cache.get("physics of the atom", 0).unwrap();
        let b = cache.get("physics of the atom", 0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let n = palette(TopicCategory::Science).len();
        let wrapped = cache.get("physics of the atom", n).unwrap();
        assert!(Arc::ptr_eq(&a, &wrapped));
    }
}
