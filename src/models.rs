use serde::{Deserialize, Serialize};

use crate::credits::CreditTransaction;
use crate::outline::StoryLength;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoryType {
    #[default]
    Story,
    Novel,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PointOfView {
    FirstPerson,
    #[default]
    ThirdLimited,
    ThirdOmniscient,
    SecondPerson,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WritingStyle {
    Descriptive,
    DialogDriven,
    #[default]
    Mixed,
    ActionPacked,
    Literary,
}

// Body of POST /api/generate-story
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StoryRequest {
    pub prompt: String,
    pub genre: String,
    pub tone: String,
    #[serde(default)]
    pub length: StoryLength,
    #[serde(default)]
    pub story_type: StoryType,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub point_of_view: PointOfView,
    #[serde(default)]
    pub writing_style: WritingStyle,
}

// Body of POST /api/generate-outline
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OutlineRequest {
    pub prompt: String,
    pub genre: String,
    pub tone: String,
    #[serde(default)]
    pub length: StoryLength,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub point_of_view: PointOfView,
    #[serde(default)]
    pub writing_style: WritingStyle,
    #[serde(default)]
    pub number_of_arcs: Option<u32>,
    #[serde(default)]
    pub chapters_per_arc: Option<u32>,
    #[serde(default)]
    pub suggested_title: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct PreviousChapter {
    #[serde(default)]
    pub summary: Option<String>,
}

// Body of POST /api/generate-chapter
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRequest {
    pub outline: String,
    pub chapter_number: u32,
    pub chapter_title: String,
    #[serde(default)]
    pub chapter_summary: Option<String>,
    #[serde(default)]
    pub previous_chapters: Vec<PreviousChapter>,
    pub genre: String,
    pub tone: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub point_of_view: PointOfView,
    #[serde(default)]
    pub writing_style: WritingStyle,
    #[serde(default)]
    pub is_first_chapter_of_arc: bool,
}

// Body of POST /api/generate-title
#[derive(Deserialize, Clone, Debug)]
pub struct TitleRequest {
    pub prompt: String,
    pub genre: String,
    pub tone: String,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    ArcTitle,
    ArcDescription,
    ChapterTitle,
    ChapterSummary,
}

// Loose context bag sent by the novel editor; every field is optional
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionContext {
    pub novel_title: Option<String>,
    pub novel_context: Option<String>,
    pub genre: Option<String>,
    pub tone: Option<String>,
    pub arc_number: Option<u32>,
    pub arc_title: Option<String>,
    pub arc_description: Option<String>,
    pub description: Option<String>,
    pub chapter_number: Option<u32>,
    pub chapter_title: Option<String>,
    pub current_title: Option<String>,
    pub summary: Option<String>,
    pub previous_chapter: Option<String>,
}

// Body of POST /api/generate-suggestion
#[derive(Deserialize, Clone, Debug)]
pub struct SuggestionRequest {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    #[serde(default)]
    pub context: SuggestionContext,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct OutlineResponse {
    pub outline: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TitleResponse {
    pub title: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SuggestionResponse {
    pub suggestion: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreditsResponse {
    pub credits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_generated: Option<u32>,
    pub is_anonymous: bool,
}

#[derive(Serialize, Debug)]
pub struct TransactionsResponse {
    pub transactions: Vec<CreditTransaction>,
}
