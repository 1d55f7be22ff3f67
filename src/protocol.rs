//! HTTP request/response DTOs (serde ready).
//! Field names match what the web client sends and reads.

use serde::{Deserialize, Serialize};

use crate::domain::{Learner, Lesson};
use crate::progression::{LessonState, Verdict};

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub storage: &'static str,
    pub ai: bool,
}

#[derive(Debug, Deserialize)]
pub struct LessonsQuery {
    pub unit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonIn {
    pub user_id: String,
}

/// Either a typed/chosen answer or the word-bank selection, in selection order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptIn {
    pub user_id: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub selected_words: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOut {
    pub verdict: Verdict,
    pub correct: bool,
    pub correct_answer: String,
    pub user: Learner,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonMapEntry {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub state: LessonState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseIn {
    pub item_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLessonIn {
    #[serde(default)]
    pub user_id: Option<String>,
    pub user_level: String,
    #[serde(default)]
    pub completed_topics: Vec<String>,
    #[serde(default)]
    pub preferred_exercise_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PronunciationIn {
    pub original_text: String,
    pub spoken_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintIn {
    pub exercise_type: String,
    pub question: String,
    #[serde(default)]
    pub croatian_text: Option<String>,
    #[serde(default)]
    pub english_text: Option<String>,
}

#[derive(Serialize)]
pub struct HintOut {
    pub hint: String,
}
