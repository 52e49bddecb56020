use crate::foundation::error::{SlidecastError, SlidecastResult};

/// Readability bound: on-screen bullets beyond this are dropped at
/// normalization time.
pub const MAX_BULLETS: usize = 5;

/// Slide content handed over by the external content generator.
///
/// Immutable once validated; the pipeline never writes back into it after
/// sanitization.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct StructuredContent {
    pub topic: String,
    #[serde(default)]
    pub level: Level,
    pub slides: Vec<Slide>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Slide {
    pub title: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default)]
    pub narration: Narration,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub visual_prompt_hints: Vec<String>,
    #[serde(default)]
    pub layout_hint: String,
    #[serde(default)]
    pub subtopic_type: SubtopicKind,
}

/// Either one narration string for the whole slide or one unit per subtopic.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Narration {
    Text(String),
    PerSubtopic(Vec<SubtopicNarration>),
}

impl Default for Narration {
    fn default() -> Self {
        Narration::Text(String::new())
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SubtopicNarration {
    pub subtopic: String,
    pub text: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtopicKind {
    #[default]
    Definition,
    Comparison,
    Process,
    AdvantagesDisadvantages,
    CaseStudy,
    Timeline,
    Classification,
    Principles,
}

impl StructuredContent {
    /// Reject malformed input before any rendering starts.
    pub fn validate(&self) -> SlidecastResult<()> {
        if self.topic.trim().is_empty() {
            return Err(SlidecastError::validation("content topic must be non-empty"));
        }
        if self.slides.is_empty() {
            return Err(SlidecastError::validation(
                "content must contain at least one slide",
            ));
        }
        for (i, slide) in self.slides.iter().enumerate() {
            if slide.title.trim().is_empty() {
                return Err(SlidecastError::validation(format!(
                    "slide {i} has an empty title"
                )));
            }
            if let Narration::PerSubtopic(units) = &slide.narration
                && units.is_empty()
            {
                return Err(SlidecastError::validation(format!(
                    "slide {i} declares per-subtopic narration with no units"
                )));
            }
        }
        Ok(())
    }

    /// Enforce readability bounds and drop blank strings in place.
    pub fn normalize(&mut self) {
        for slide in &mut self.slides {
            slide.bullets.retain(|b| !b.trim().is_empty());
            slide.bullets.truncate(MAX_BULLETS);
            slide.subtopics.retain(|s| !s.trim().is_empty());
            slide.examples.retain(|e| !e.trim().is_empty());
        }
    }

    /// Single-slide stub built from the raw topic string, used when
    /// validation rejects the generator's output.
    pub fn topic_stub(topic: &str) -> Self {
        let topic = if topic.trim().is_empty() {
            "this topic"
        } else {
            topic.trim()
        };
        Self {
            topic: topic.to_string(),
            level: Level::Beginner,
            slides: vec![Slide {
                title: format!("About {topic}"),
                subtopics: Vec::new(),
                bullets: vec![
                    format!("Plain-language overview of {topic}"),
                    "Where it is used".to_string(),
                    "Key takeaway".to_string(),
                ],
                narration: Narration::Text(format!(
                    "{topic} explained simply, with the core ideas and why they matter."
                )),
                examples: Vec::new(),
                visual_prompt_hints: vec![format!("Simple diagram of {topic}")],
                layout_hint: String::new(),
                subtopic_type: SubtopicKind::Definition,
            }],
        }
    }
}

impl Slide {
    /// Narration units in playback order: one per subtopic when expanded,
    /// otherwise the whole slide's text, falling back to joined bullets
    /// when the narration field is blank.
    pub fn narration_units(&self) -> Vec<(String, String)> {
        match &self.narration {
            Narration::PerSubtopic(units) => units
                .iter()
                .map(|u| (u.subtopic.clone(), u.text.clone()))
                .collect(),
            Narration::Text(text) => {
                let text = if text.trim().is_empty() {
                    self.bullets.join(". ")
                } else {
                    text.clone()
                };
                vec![(self.title.clone(), text)]
            }
        }
    }
}
