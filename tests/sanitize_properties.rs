use slidecast::content::{
    model::{Level, Narration, Slide, StructuredContent, SubtopicKind},
    sanitize::{sanitize, sanitize_content},
};

fn slide(title: &str, bullets: &[&str], narration: &str) -> Slide {
    Slide {
        title: title.to_string(),
        subtopics: Vec::new(),
        bullets: bullets.iter().map(|s| s.to_string()).collect(),
        narration: Narration::Text(narration.to_string()),
        examples: Vec::new(),
        visual_prompt_hints: Vec::new(),
        layout_hint: String::new(),
        subtopic_type: SubtopicKind::Definition,
    }
}

#[test]
fn sanitized_content_has_no_question_marks_anywhere() {
    let mut content = StructuredContent {
        topic: "Gravity".to_string(),
        level: Level::Beginner,
        slides: vec![slide(
            "What is gravity?",
            &["Objects fall?", "Mass attracts mass"],
            "What is gravity? It pulls objects together.",
        )],
    };
    sanitize_content(&mut content);

    let s = &content.slides[0];
    assert!(!s.title.contains('?'));
    assert!(s.bullets.iter().all(|b| !b.contains('?')));
    let Narration::Text(narration) = &s.narration else {
        panic!("narration shape changed");
    };
    assert!(!narration.contains('?'));
    // Interrogative opener rewritten to a declarative one.
    assert!(narration.starts_with("This is gravity."), "got: {narration}");
}

#[test]
fn sanitize_is_a_fixed_point() {
    let inputs = [
        "What is gravity? It pulls objects together.",
        "How does photosynthesis work?",
        "Why do stars shine? Because of fusion!",
        "Already declarative. Nothing to change here.",
        "Which are the largest planets?",
        "",
        "???",
    ];
    for input in inputs {
        let once = sanitize(input);
        let twice = sanitize(&once);
        assert_eq!(once, twice, "not a fixed point for {input:?}");
        assert!(!once.contains('?'), "question mark survived in {once:?}");
    }
}

#[test]
fn per_subtopic_narration_is_sanitized_too() {
    use slidecast::content::model::SubtopicNarration;

    let mut content = StructuredContent {
        topic: "Photosynthesis".to_string(),
        level: Level::Intermediate,
        slides: vec![Slide {
            narration: Narration::PerSubtopic(vec![SubtopicNarration {
                subtopic: "Light reactions".to_string(),
                text: "How does light become energy? Chlorophyll absorbs it.".to_string(),
            }]),
            ..slide("Stages", &[], "")
        }],
    };
    sanitize_content(&mut content);

    let Narration::PerSubtopic(units) = &content.slides[0].narration else {
        panic!("narration shape changed");
    };
    assert!(!units[0].text.contains('?'));
    assert!(units[0].text.starts_with("This works by"), "got: {}", units[0].text);
}
