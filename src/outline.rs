// Outline generation: count `## Arc` / `### Chapter` markers, retry once on mismatch
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::GenerationError;
use crate::metrics::{OUTLINE_DEGRADED, OUTLINE_RETRIES};
use crate::models::OutlineRequest;
use crate::prompts;
use crate::provider::{GenerationRequest, TextGenerator};

pub const OUTLINE_MAX_OUTPUT_TOKENS: u32 = 8000;
pub const INITIAL_TEMPERATURE: f32 = 0.5;
pub const STRICT_TEMPERATURE: f32 = 0.3;
pub const MAX_SECTIONS: u32 = 10;
pub const MAX_ITEMS_PER_SECTION: u32 = 30;

lazy_static! {
    static ref SECTION_MARKER: Regex = Regex::new(r"(?m)^## Arc \d+:").unwrap();
    static ref ITEM_MARKER: Regex = Regex::new(r"(?m)^### Chapter \d+:").unwrap();
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl StoryLength {
    pub fn default_structure(self) -> OutlineStructure {
        match self {
            StoryLength::Short => OutlineStructure::new(2, 4),
            StoryLength::Medium => OutlineStructure::new(3, 5),
            StoryLength::Long => OutlineStructure::new(3, 8),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineStructure {
    pub sections: u32,
    pub items_per_section: u32,
}

impl OutlineStructure {
    pub fn new(sections: u32, items_per_section: u32) -> Self {
        Self {
            sections,
            items_per_section,
        }
    }

    // User counts win, zero or missing falls back to the length default
    pub fn resolve(length: StoryLength, sections: Option<u32>, items: Option<u32>) -> Self {
        let defaults = length.default_structure();
        Self {
            sections: sections
                .filter(|n| *n > 0)
                .unwrap_or(defaults.sections)
                .min(MAX_SECTIONS),
            items_per_section: items
                .filter(|n| *n > 0)
                .unwrap_or(defaults.items_per_section)
                .min(MAX_ITEMS_PER_SECTION),
        }
    }

    /// Rejects requested counts above `MAX_SECTIONS` / `MAX_ITEMS_PER_SECTION`.
    pub fn check_requested(sections: Option<u32>, items: Option<u32>) -> Result<(), String> {
        if sections.is_some_and(|n| n > MAX_SECTIONS) {
            return Err(format!("numberOfArcs must be between 1 and {MAX_SECTIONS}"));
        }
        if items.is_some_and(|n| n > MAX_ITEMS_PER_SECTION) {
            return Err(format!(
                "chaptersPerArc must be between 1 and {MAX_ITEMS_PER_SECTION}"
            ));
        }
        Ok(())
    }

    pub fn expected_items(&self) -> u32 {
        self.sections.saturating_mul(self.items_per_section)
    }

    pub fn validate(&self, text: &str) -> ValidationReport {
        ValidationReport {
            expected: *self,
            actual: count_markers(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarkerCounts {
    pub sections: u32,
    pub items: u32,
}

pub fn count_markers(text: &str) -> MarkerCounts {
    MarkerCounts {
        sections: SECTION_MARKER.find_iter(text).count() as u32,
        items: ITEM_MARKER.find_iter(text).count() as u32,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub expected: OutlineStructure,
    pub actual: MarkerCounts,
}

impl ValidationReport {
    pub fn matched(&self) -> bool {
        self.actual.sections == self.expected.sections
            && self.actual.items == self.expected.expected_items()
    }

    // how far the counts are from the expectation, 0 when matched
    pub fn distance(&self) -> u32 {
        self.actual.sections.abs_diff(self.expected.sections)
            + self.actual.items.abs_diff(self.expected.expected_items())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineStatus {
    Accepted,
    AcceptedDegraded,
}

#[derive(Debug, Clone)]
pub struct OutlineOutcome {
    pub text: String,
    pub status: OutlineStatus,
    pub report: ValidationReport,
    pub attempts: u32,
}

struct Candidate {
    text: String,
    report: ValidationReport,
}

enum State {
    Requesting,
    Validating(Candidate),
    Retrying(Candidate),
    ValidatingRetry { original: Candidate, retry: Candidate },
}

pub struct OutlineWorkflow {
    generator: Arc<dyn TextGenerator>,
    model: Option<String>,
}

impl OutlineWorkflow {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn request(&self, prompt: String, temperature: f32) -> GenerationRequest {
        let req = GenerationRequest::new(prompt)
            .with_temperature(temperature)
            .with_max_output_tokens(OUTLINE_MAX_OUTPUT_TOKENS);
        match &self.model {
            Some(model) => req.with_model(model.clone()),
            None => req,
        }
    }

    // Provider errors on either attempt are returned as-is
    pub async fn run(&self, req: &OutlineRequest) -> Result<OutlineOutcome, GenerationError> {
        let structure =
            OutlineStructure::resolve(req.length, req.number_of_arcs, req.chapters_per_arc);
        let mut state = State::Requesting;

        loop {
            state = match state {
                State::Requesting => {
                    let prompt = prompts::outline_prompt(req, &structure);
                    let text = self
                        .generator
                        .generate(self.request(prompt, INITIAL_TEMPERATURE))
                        .await?;
                    info!(length = text.len(), "generated outline");
                    let report = structure.validate(&text);
                    State::Validating(Candidate { text, report })
                }
                State::Validating(candidate) => {
                    log_report("initial", &candidate.report);
                    if candidate.report.matched() {
                        return Ok(OutlineOutcome {
                            text: candidate.text,
                            status: OutlineStatus::Accepted,
                            report: candidate.report,
                            attempts: 1,
                        });
                    }
                    State::Retrying(candidate)
                }
                State::Retrying(original) => {
                    info!("regenerating outline with stricter prompt");
                    OUTLINE_RETRIES.inc();
                    let prompt = prompts::strict_outline_prompt(req, &structure);
                    let text = self
                        .generator
                        .generate(self.request(prompt, STRICT_TEMPERATURE))
                        .await?;
                    let report = structure.validate(&text);
                    State::ValidatingRetry {
                        original,
                        retry: Candidate { text, report },
                    }
                }
                State::ValidatingRetry { original, retry } => {
                    log_report("retry", &retry.report);
                    return Ok(settle(original, retry));
                }
            };
        }
    }
}

// Terminal decision after the single retry
fn settle(original: Candidate, retry: Candidate) -> OutlineOutcome {
    if retry.report.matched() {
        info!("regenerated outline matches requested structure");
        return OutlineOutcome {
            text: retry.text,
            status: OutlineStatus::Accepted,
            report: retry.report,
            attempts: 2,
        };
    }

    OUTLINE_DEGRADED.inc();
    let best = if retry.report.distance() < original.report.distance() {
        retry
    } else {
        original
    };
    warn!(
        distance = best.report.distance(),
        "returning outline that does not match requested structure"
    );
    OutlineOutcome {
        text: best.text,
        status: OutlineStatus::AcceptedDegraded,
        report: best.report,
        attempts: 2,
    }
}

fn log_report(attempt: &'static str, report: &ValidationReport) {
    let expected = report.expected;
    if report.matched() {
        info!(
            attempt,
            expected_sections = expected.sections,
            expected_items = expected.expected_items(),
            sections = report.actual.sections,
            items = report.actual.items,
            "outline structure validated"
        );
    } else {
        warn!(
            attempt,
            expected_sections = expected.sections,
            expected_items = expected.expected_items(),
            sections = report.actual.sections,
            items = report.actual.items,
            "outline structure mismatch"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // Builds an outline with the given arc/chapter counts
    fn outline(sections: u32, items_per_section: u32) -> String {
        let mut out = String::from("# The Long Night\n\n**Logline:** Someone runs.\n\n");
        let mut chapter = 1;
        for arc in 1..=sections {
            out.push_str(&format!("## Arc {arc}: Part {arc}\n**Theme:** loss\n\n"));
            for _ in 0..items_per_section {
                out.push_str(&format!(
                    "### Chapter {chapter}: Title\n**Summary:** Things happen.\n\n"
                ));
                chapter += 1;
            }
        }
        out
    }

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, GenerationError>>>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Transport("script exhausted".into())))
        }
    }

    fn request(arcs: Option<u32>, chapters: Option<u32>) -> OutlineRequest {
        OutlineRequest {
            prompt: "a lighthouse keeper".into(),
            genre: "mystery".into(),
            tone: "dark".into(),
            length: StoryLength::Short,
            language: None,
            point_of_view: Default::default(),
            writing_style: Default::default(),
            number_of_arcs: arcs,
            chapters_per_arc: chapters,
            suggested_title: None,
        }
    }

    #[test]
    fn counts_only_line_start_markers() {
        let text = "## Arc 1: Start\n### Chapter 1: A\ntext ## Arc 2: inline\n  ### Chapter 2: indented\n### Chapter 3: B\n## Arc two: words\n";
        assert_eq!(count_markers(text), MarkerCounts { sections: 1, items: 2 });
    }

    #[test]
    fn structure_falls_back_to_length_defaults() {
        assert_eq!(
            OutlineStructure::resolve(StoryLength::Short, None, None),
            OutlineStructure::new(2, 4)
        );
        assert_eq!(
            OutlineStructure::resolve(StoryLength::Long, Some(0), Some(6)),
            OutlineStructure::new(3, 6)
        );
        assert_eq!(StoryLength::Medium.default_structure().expected_items(), 15);
    }

    #[test]
    fn oversized_counts_are_rejected_and_clamped() {
        assert!(OutlineStructure::check_requested(Some(10), Some(30)).is_ok());
        assert!(OutlineStructure::check_requested(None, Some(0)).is_ok());
        assert!(OutlineStructure::check_requested(Some(11), None).is_err());
        assert!(OutlineStructure::check_requested(Some(3), Some(70_000)).is_err());

        let huge = OutlineStructure::resolve(StoryLength::Medium, Some(70_000), Some(u32::MAX));
        assert_eq!(huge, OutlineStructure::new(MAX_SECTIONS, MAX_ITEMS_PER_SECTION));
        assert_eq!(huge.expected_items(), 300);
        assert_eq!(
            OutlineStructure::new(u32::MAX, u32::MAX).expected_items(),
            u32::MAX
        );
    }

    #[test]
    fn validation_requires_both_counts() {
        let structure = OutlineStructure::new(3, 5);
        assert!(structure.validate(&outline(3, 5)).matched());

        let short = structure.validate(&outline(2, 5));
        assert!(!short.matched());
        assert_eq!(short.distance(), 1 + 5);

        // right number of chapters spread over the wrong number of arcs
        let text = outline(5, 3);
        assert!(!structure.validate(&text).matched());
    }

    #[tokio::test]
    async fn matching_outline_is_accepted_without_retry() {
        let generator = Scripted::new(vec![Ok(outline(2, 4))]);
        let workflow = OutlineWorkflow::new(generator.clone());

        let outcome = workflow.run(&request(None, None)).await.unwrap();
        assert_eq!(outcome.status, OutlineStatus::Accepted);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn mismatch_triggers_one_stricter_retry() {
        let generator = Scripted::new(vec![Ok(outline(1, 4)), Ok(outline(2, 4))]);
        let workflow = OutlineWorkflow::new(generator.clone());

        let outcome = workflow.run(&request(None, None)).await.unwrap();
        assert_eq!(outcome.status, OutlineStatus::Accepted);
        assert_eq!(outcome.text, outline(2, 4));
        assert_eq!(generator.calls(), 2);

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0].temperature, INITIAL_TEMPERATURE);
        assert_eq!(seen[1].temperature, STRICT_TEMPERATURE);
        assert_ne!(seen[0].prompt, seen[1].prompt);
    }

    #[tokio::test]
    async fn never_issues_a_third_call() {
        let generator = Scripted::new(vec![
            Ok(outline(1, 4)),
            Ok(outline(1, 3)),
            Ok(outline(2, 4)),
        ]);
        let workflow = OutlineWorkflow::new(generator.clone());

        let outcome = workflow.run(&request(None, None)).await.unwrap();
        assert_eq!(outcome.status, OutlineStatus::AcceptedDegraded);
        assert_eq!(generator.calls(), 2);
        // retry was further off, so the original wins
        assert_eq!(outcome.text, outline(1, 4));
    }

    #[tokio::test]
    async fn degraded_prefers_a_strictly_closer_retry() {
        let generator = Scripted::new(vec![Ok(outline(1, 2)), Ok(outline(2, 3))]);
        let workflow = OutlineWorkflow::new(generator.clone());

        let outcome = workflow.run(&request(None, None)).await.unwrap();
        assert_eq!(outcome.status, OutlineStatus::AcceptedDegraded);
        assert_eq!(outcome.text, outline(2, 3));
        assert_eq!(outcome.report.actual, MarkerCounts { sections: 2, items: 6 });
    }

    #[tokio::test]
    async fn first_attempt_error_is_not_retried() {
        let generator = Scripted::new(vec![
            Err(GenerationError::Transport("connection reset".into())),
            Ok(outline(2, 4)),
        ]);
        let workflow = OutlineWorkflow::new(generator.clone());

        let err = workflow.run(&request(None, None)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn retry_error_propagates() {
        let generator = Scripted::new(vec![
            Ok(outline(1, 4)),
            Err(GenerationError::Provider {
                status: 503,
                message: "overloaded".into(),
            }),
        ]);
        let workflow = OutlineWorkflow::new(generator.clone());

        let err = workflow.run(&request(None, None)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Provider { status: 503, .. }));
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn user_counts_override_defaults() {
        let generator = Scripted::new(vec![Ok(outline(4, 2))]);
        let workflow = OutlineWorkflow::new(generator.clone()).with_model("test-model");

        let outcome = workflow.run(&request(Some(4), Some(2))).await.unwrap();
        assert_eq!(outcome.status, OutlineStatus::Accepted);
        assert_eq!(outcome.report.expected, OutlineStructure::new(4, 2));
        assert_eq!(
            generator.seen.lock().unwrap()[0].model.as_deref(),
            Some("test-model")
        );
    }
}
