// Prompt builders. Kept short on purpose; the structure markers used by the
// outline validator are the only part other code depends on.

use crate::models::{
    ChapterRequest, OutlineRequest, PointOfView, StoryRequest, StoryType, SuggestionContext,
    SuggestionKind, TitleRequest, WritingStyle,
};
use crate::outline::{MAX_SECTIONS, OutlineStructure, StoryLength};

impl PointOfView {
    pub fn instruction(self) -> &'static str {
        match self {
            PointOfView::FirstPerson => "Use first-person perspective (I, me, my) consistently.",
            PointOfView::ThirdLimited => {
                "Use third-person limited perspective and stay with one character."
            }
            PointOfView::ThirdOmniscient => {
                "Use third-person omniscient perspective with access to every character."
            }
            PointOfView::SecondPerson => "Use second-person perspective (you) consistently.",
        }
    }
}

impl WritingStyle {
    pub fn instruction(self) -> &'static str {
        match self {
            WritingStyle::Descriptive => "Rich, vivid imagery and sensory detail.",
            WritingStyle::DialogDriven => "Advance the story mainly through dialogue.",
            WritingStyle::Mixed => "Balance description, action and dialogue.",
            WritingStyle::ActionPacked => "Fast pacing, short sentences, high tension.",
            WritingStyle::Literary => "Artistic prose with deeper themes.",
        }
    }
}

fn language_line(language: Option<&str>) -> Option<String> {
    match language {
        Some(lang) if !lang.is_empty() && !lang.eq_ignore_ascii_case("english") => {
            Some(format!("Write entirely in {lang}."))
        }
        _ => None,
    }
}

fn length_guide(story_type: StoryType, length: StoryLength) -> &'static str {
    match (story_type, length) {
        (StoryType::Story, StoryLength::Short) => "approximately 300 words",
        (StoryType::Story, StoryLength::Medium) => "approximately 600 words",
        (StoryType::Story, StoryLength::Long) => "approximately 1000 words",
        (StoryType::Novel, StoryLength::Short) => "at least 1500 words",
        (StoryType::Novel, StoryLength::Medium) => "at least 3000 words",
        (StoryType::Novel, StoryLength::Long) => "at least 5000 words",
    }
}

pub fn story_max_output_tokens(story_type: StoryType) -> u32 {
    match story_type {
        StoryType::Story => 3000,
        StoryType::Novel => 10000,
    }
}

pub fn story_system_prompt(req: &StoryRequest) -> String {
    let kind = match req.story_type {
        StoryType::Story => "short story",
        StoryType::Novel => "novel with chapters headed `## Chapter N`",
    };
    let mut lines = vec![
        format!("You are a professional fiction writer. Write a {kind}."),
        format!("Genre: {}", req.genre),
        format!("Tone: {}", req.tone),
        format!("Length: {}", length_guide(req.story_type, req.length)),
        "Start with the title as `# Title`.".to_string(),
        req.point_of_view.instruction().to_string(),
        req.writing_style.instruction().to_string(),
        "Finish every sentence; never stop mid-thought.".to_string(),
    ];
    lines.extend(language_line(req.language.as_deref()));
    lines.join("\n")
}

fn outline_details(req: &OutlineRequest) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(title) = req.suggested_title.as_deref().filter(|t| !t.is_empty()) {
        lines.push(format!("Title: {title}"));
    }
    lines.push(format!("Concept: {}", req.prompt));
    lines.push(format!("Genre: {}", req.genre));
    lines.push(format!("Tone: {}", req.tone));
    lines.extend(language_line(req.language.as_deref()));
    lines
}

pub fn outline_prompt(req: &OutlineRequest, structure: &OutlineStructure) -> String {
    let arcs = structure.sections;
    let per_arc = structure.items_per_section;
    let total = structure.expected_items();

    let mut lines = vec![
        "You are a professional novel outliner. Create a chapter-by-chapter outline organised into arcs.".to_string(),
        format!("Create exactly {arcs} arcs with exactly {per_arc} chapters in each arc, {total} chapters in total."),
        String::new(),
    ];
    lines.extend(outline_details(req));
    lines.push(format!("Point of view: {}", req.point_of_view.instruction()));
    lines.push(format!("Style: {}", req.writing_style.instruction()));
    lines.push(String::new());
    lines.push("Begin with `# Title`, a `**Logline:**` line and a `## Main Characters` list.".into());
    lines.push("Head every arc `## Arc <number>: <title>` and every chapter `### Chapter <number>: <title>`,".into());
    lines.push("each chapter followed by `**Summary:**` and `**Key Scenes:**`.".into());
    lines.push("Number chapters continuously across arcs.".into());
    lines.join("\n")
}

pub fn strict_outline_prompt(req: &OutlineRequest, structure: &OutlineStructure) -> String {
    let arcs = structure.sections;
    let per_arc = structure.items_per_section;

    let mut lines = vec![
        "STRICT INSTRUCTIONS - FOLLOW EXACTLY:".to_string(),
        format!("- EXACTLY {arcs} arcs, no more, no less"),
        format!("- EXACTLY {per_arc} chapters in EACH arc"),
        format!("- EXACTLY {} chapters in total", structure.expected_items()),
        String::new(),
    ];
    lines.extend(outline_details(req));
    lines.push(String::new());
    lines.push("Format each arc as: ## Arc [NUMBER]: [Title]".into());
    lines.push("Format each chapter as: ### Chapter [NUMBER]: [Title]".into());
    lines.push("followed by **Summary:** [2-3 sentences]".into());
    lines.push(String::new());
    for arc in 1..=arcs.min(MAX_SECTIONS) {
        let first = (arc - 1).saturating_mul(per_arc).saturating_add(1);
        let last = arc.saturating_mul(per_arc);
        lines.push(format!("Arc {arc}: Chapters {first}-{last}"));
    }
    lines.push("Do not skip arcs or chapters.".into());
    lines.join("\n")
}

pub fn chapter_system_prompt(req: &ChapterRequest) -> String {
    let n = req.chapter_number;
    let mut lines = vec![
        format!("You are a professional novelist writing Chapter {n} of a novel."),
        String::new(),
        "NOVEL CONTEXT:".into(),
        req.outline.clone(),
    ];
    if !req.previous_chapters.is_empty() {
        lines.push(String::new());
        lines.push("PREVIOUS CHAPTERS:".into());
        for (idx, ch) in req.previous_chapters.iter().enumerate() {
            let summary = ch.summary.as_deref().unwrap_or("Content generated");
            lines.push(format!("Chapter {}: {summary}", idx + 1));
        }
    }
    lines.push(String::new());
    lines.push(format!("Title: {}", req.chapter_title));
    if let Some(summary) = req.chapter_summary.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Summary: {summary}"));
    }
    lines.push(format!("Genre: {}", req.genre));
    lines.push(format!("Tone: {}", req.tone));
    lines.push("Target 1200-1800 words.".into());
    lines.extend(language_line(req.language.as_deref()));
    lines.push(req.point_of_view.instruction().into());
    lines.push(req.writing_style.instruction().into());
    lines.push(format!(
        "Start with the heading `## Chapter {n}: {}` and end on a complete sentence.",
        req.chapter_title
    ));
    lines.join("\n")
}

pub fn chapter_user_prompt(req: &ChapterRequest) -> String {
    format!(
        "Write Chapter {}: {}\n\nEnd with a complete sentence.",
        req.chapter_number, req.chapter_title
    )
}

pub fn title_prompt(req: &TitleRequest) -> String {
    format!(
        "Generate a captivating novel title.\n\nNOVEL CONCEPT: {}\nGENRE: {}\nTONE: {}\n\n\
         Create a memorable title of 2-6 words.\nRespond with ONLY the title, no quotes, no explanation.",
        req.prompt, req.genre, req.tone
    )
}

/// Strips surrounding whitespace and one leading/trailing quote.
pub fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix(['"', '\''])
        .unwrap_or(trimmed);
    let trimmed = trimmed
        .strip_suffix(['"', '\''])
        .unwrap_or(trimmed);
    trimmed.to_string()
}

fn arc_position(arc: u32) -> &'static str {
    match arc {
        1 => "Beginning/Setup",
        2 => "Middle/Rising Action",
        _ => "Climax/Resolution",
    }
}

pub fn suggestion_prompt(kind: SuggestionKind, ctx: &SuggestionContext) -> String {
    let genre = ctx.genre.as_deref().unwrap_or("fiction");
    let tone = ctx.tone.as_deref().unwrap_or("balanced");
    let arc_number = ctx.arc_number.unwrap_or(1);
    let chapter_number = ctx.chapter_number.unwrap_or(1);
    let novel_context = ctx
        .novel_context
        .as_deref()
        .map(|c| format!("STORY CONTEXT:\n{c}\n\n"))
        .unwrap_or_default();

    match kind {
        SuggestionKind::ArcTitle => format!(
            "Generate a compelling title for a story arc.\n\nNOVEL: {}\nGENRE: {genre}\nTONE: {tone}\n\
             ARC POSITION: {arc_number} ({})\n\n{novel_context}{}\
             Create a 2-5 word title for this arc.\n\nRespond with ONLY the title, nothing else.",
            ctx.novel_title.as_deref().unwrap_or("Untitled"),
            arc_position(arc_number),
            ctx.description
                .as_deref()
                .map(|d| format!("CURRENT DESCRIPTION: {d}\n\n"))
                .unwrap_or_default(),
        ),
        SuggestionKind::ArcDescription => format!(
            "Generate a description for a story arc.\n\nNOVEL: {}\nGENRE: {genre}\nTONE: {tone}\n\
             ARC TITLE: {}\n\n{novel_context}\
             Write a 15-25 word description of the arc's theme, key events and goals.\n\n\
             Respond with ONLY the description, nothing else.",
            ctx.novel_title.as_deref().unwrap_or("Untitled"),
            ctx.arc_title
                .clone()
                .unwrap_or_else(|| format!("Arc {arc_number}")),
        ),
        SuggestionKind::ChapterTitle => format!(
            "Generate a chapter title.\n\nGENRE: {genre}\nTONE: {tone}\nCURRENT TITLE: {}\nARC: {}\n{}\n\
             Create a 2-6 word intriguing title.\n\nRespond with ONLY the title, nothing else.",
            ctx.current_title
                .clone()
                .unwrap_or_else(|| format!("Chapter {chapter_number}")),
            ctx.arc_title.as_deref().unwrap_or("Main Story"),
            ctx.summary
                .as_deref()
                .map(|s| format!("CHAPTER ABOUT: {s}\n"))
                .unwrap_or_default(),
        ),
        SuggestionKind::ChapterSummary => format!(
            "Generate a chapter summary.\n\nGENRE: {genre}\nTONE: {tone}\nCHAPTER: {}\nARC: {}\n{}{}\n\
             Write 2-4 sentences with specific scenes, character actions and plot progression.\n\n\
             Respond with ONLY the summary, nothing else.",
            ctx.chapter_title
                .clone()
                .unwrap_or_else(|| format!("Chapter {chapter_number}")),
            ctx.arc_title.as_deref().unwrap_or("Main Story"),
            ctx.arc_description
                .as_deref()
                .map(|d| format!("ARC THEME: {d}\n"))
                .unwrap_or_default(),
            ctx.previous_chapter
                .as_deref()
                .map(|p| format!("PREVIOUS: {p}\n"))
                .unwrap_or_default(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline_request() -> OutlineRequest {
        OutlineRequest {
            prompt: "a city that forgets".into(),
            genre: "fantasy".into(),
            tone: "whimsical".into(),
            length: StoryLength::Medium,
            language: Some("French".into()),
            point_of_view: PointOfView::FirstPerson,
            writing_style: WritingStyle::Literary,
            number_of_arcs: None,
            chapters_per_arc: None,
            suggested_title: Some("Ink".into()),
        }
    }

    #[test]
    fn outline_prompts_state_the_structure() {
        let req = outline_request();
        let structure = OutlineStructure::new(3, 5);

        let prompt = outline_prompt(&req, &structure);
        assert!(prompt.contains("exactly 3 arcs"));
        assert!(prompt.contains("15 chapters in total"));
        assert!(prompt.contains("Title: Ink"));
        assert!(prompt.contains("Write entirely in French."));

        let strict = strict_outline_prompt(&req, &structure);
        assert!(strict.contains("EXACTLY 5 chapters in EACH arc"));
        assert!(strict.contains("Arc 3: Chapters 11-15"));
    }

    #[test]
    fn english_needs_no_language_line() {
        assert_eq!(language_line(Some("english")), None);
        assert_eq!(language_line(None), None);
        assert_eq!(
            language_line(Some("Arabic")).as_deref(),
            Some("Write entirely in Arabic.")
        );
    }

    #[test]
    fn titles_lose_surrounding_quotes() {
        assert_eq!(clean_title("  \"The Shadow's Crown\"\n"), "The Shadow's Crown");
        assert_eq!(clean_title("'Hearts Unbound'"), "Hearts Unbound");
        assert_eq!(clean_title("Beyond the Void"), "Beyond the Void");
    }

    #[test]
    fn suggestion_prompts_fall_back_to_placeholders() {
        let ctx = SuggestionContext {
            arc_number: Some(2),
            ..Default::default()
        };
        let prompt = suggestion_prompt(SuggestionKind::ArcTitle, &ctx);
        assert!(prompt.contains("NOVEL: Untitled"));
        assert!(prompt.contains("Middle/Rising Action"));

        let prompt = suggestion_prompt(SuggestionKind::ChapterSummary, &ctx);
        assert!(prompt.contains("CHAPTER: Chapter 1"));
        assert!(prompt.contains("ARC: Main Story"));
    }
}
