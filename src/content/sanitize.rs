//! Declarative-text sanitizer.
//!
//! Generated narration tends to lean on rhetorical questions, which read
//! poorly on slides and sound worse through TTS. The sanitizer strips every
//! question mark and rewrites interrogative sentence openers into statement
//! openers. The transform is pure and idempotent: applying it to already
//! clean text is a no-op.

use crate::content::model::{Narration, StructuredContent};

/// Ordered opener rewrites; two-word forms must come before their one-word
/// prefixes.
const OPENER_REWRITES: &[(&str, &str)] = &[
    ("what is", "This is"),
    ("what are", "These are"),
    ("how does", "This works by"),
    ("how are", "These work by"),
    ("why do", "This happens because"),
    ("why are", "These exist because"),
    ("when do", "This occurs when"),
    ("when are", "These occur when"),
    ("where do", "This happens in"),
    ("where are", "These exist in"),
    ("which is", "This is"),
    ("which are", "These are"),
    ("what", "This"),
    ("how", "This works by"),
    ("why", "This happens because"),
    ("when", "This occurs when"),
    ("where", "This happens in"),
    ("which", "This"),
];

/// Sanitize one text fragment (title, bullet, narration, example).
pub fn sanitize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let no_questions = trimmed.replace('?', ".");

    let mut rewritten = String::with_capacity(no_questions.len() + 8);
    for (body, terminator) in split_sentences(&no_questions) {
        let body = body.trim();
        if body.is_empty() {
            continue;
        }
        rewritten.push_str(&rewrite_opener(body));
        if let Some(t) = terminator {
            rewritten.push(t);
        }
        rewritten.push(' ');
    }

    let mut out = collapse(&rewritten);
    if !out.is_empty() && !out.ends_with(['.', '!', ':']) {
        out.push('.');
    }
    out
}

/// Apply [`sanitize`] to every user-visible text field of the content.
pub fn sanitize_content(content: &mut StructuredContent) {
    for slide in &mut content.slides {
        slide.title = sanitize(&slide.title);
        for bullet in &mut slide.bullets {
            *bullet = sanitize(bullet);
        }
        for example in &mut slide.examples {
            *example = sanitize(example);
        }
        match &mut slide.narration {
            Narration::Text(text) => *text = sanitize(text),
            Narration::PerSubtopic(units) => {
                for unit in units {
                    unit.text = sanitize(&unit.text);
                }
            }
        }
    }
}

/// Split on sentence terminators, yielding each body with its terminator
/// (`None` for a trailing unterminated fragment).
fn split_sentences(text: &str) -> Vec<(&str, Option<char>)> {
    let mut out = Vec::new();
    let mut start = 0usize;
    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | ':') {
            out.push((&text[start..idx], Some(ch)));
            start = idx + ch.len_utf8();
        }
    }
    if start < text.len() {
        out.push((&text[start..], None));
    }
    out
}

fn rewrite_opener(sentence: &str) -> String {
    let lower = sentence.to_lowercase();
    for &(starter, replacement) in OPENER_REWRITES {
        if let Some(rest) = lower.strip_prefix(starter) {
            // Word boundary: "Whatever" must not match "what".
            if rest.chars().next().is_some_and(|c| c.is_alphanumeric()) {
                continue;
            }
            let tail = &sentence[starter.len()..];
            return format!("{replacement}{tail}");
        }
    }
    sentence.to_string()
}

/// Collapse whitespace runs and doubled punctuation left behind by the
/// rewrite, normalizing spacing around sentence terminators.
fn collapse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for raw in text.chars() {
        let ch = if raw.is_whitespace() { ' ' } else { raw };
        match ch {
            ' ' => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            '.' | '!' | ':' | ',' | ';' => {
                while out.ends_with(' ') {
                    out.pop();
                }
                if !out.is_empty() && !out.ends_with(['.', '!', ':', ',', ';']) {
                    out.push(ch);
                }
            }
            _ => {
                if out.ends_with(['.', '!', ':', ',', ';']) {
                    out.push(' ');
                }
                out.push(ch);
            }
        }
    }
    out.trim().to_string()
}
